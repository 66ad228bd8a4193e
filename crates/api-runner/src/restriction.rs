//! # Action Authorization Table
//!
//! Some actions only make sense during specific lifecycle events. Each
//! restricted action declares where it is allowed and where it is still
//! tolerated with a deprecation warning; every other known event denies it.
//!
//! | Behavior | Effect |
//! |----------|--------|
//! | `Allow` | creator passes through unchanged |
//! | `AllowWithDeprecationWarning` | warning reported, then the creator runs |
//! | `Deny` | error reported, nothing dispatched |
//!
//! Actions not listed here are not touched by this layer. For events outside
//! the catalogue (the idle probe) restricted actions are simply absent.

use crate::action::{ActionCreator, ActionCreators};
use crate::event::EventCatalog;
use crate::reporter::{Report, ReportKind, Reporter, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Allow,
    AllowWithDeprecationWarning,
    Deny,
}

#[derive(Debug, Clone, Default)]
pub struct Restriction {
    pub allowed_in: Vec<String>,
    pub deprecated_in: Vec<String>,
}

impl Restriction {
    pub fn allowed_in<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_in: events.into_iter().map(Into::into).collect(),
            deprecated_in: Vec::new(),
        }
    }

    pub fn deprecated_in<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deprecated_in = events.into_iter().map(Into::into).collect();
        self
    }

    fn behavior(&self, event: &str) -> Behavior {
        if self.allowed_in.iter().any(|e| e == event) {
            Behavior::Allow
        } else if self.deprecated_in.iter().any(|e| e == event) {
            Behavior::AllowWithDeprecationWarning
        } else {
            Behavior::Deny
        }
    }

    fn suggestion(&self) -> String {
        self.allowed_in
            .iter()
            .map(|e| format!("`{e}`"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone)]
struct Entry {
    creator: ActionCreator,
    restriction: Restriction,
}

#[derive(Debug, Clone, Default)]
pub struct ActionRestrictions {
    catalog: EventCatalog,
    entries: BTreeMap<String, Entry>,
}

impl ActionRestrictions {
    pub fn new(catalog: EventCatalog) -> Self {
        Self {
            catalog,
            entries: BTreeMap::new(),
        }
    }

    pub fn restrict(
        mut self,
        name: impl Into<String>,
        creator: ActionCreator,
        restriction: Restriction,
    ) -> Self {
        self.entries.insert(
            name.into(),
            Entry {
                creator,
                restriction,
            },
        );
        self
    }

    /// Behavior of one restricted action during `event`; `None` when unrestricted.
    pub fn behavior(&self, action: &str, event: &str) -> Option<Behavior> {
        if !self.catalog.contains(event) {
            return None;
        }
        self.entries
            .get(action)
            .map(|entry| entry.restriction.behavior(event))
    }

    pub fn view_for(&self, event: &str) -> BTreeMap<String, Behavior> {
        if !self.catalog.contains(event) {
            return BTreeMap::new();
        }
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.restriction.behavior(event)))
            .collect()
    }

    /// The creators a handler of `event` gets: `public` plus every restricted
    /// creator wrapped according to its behavior.
    pub fn available_in(
        &self,
        event: &str,
        public: &ActionCreators,
        reporter: &Arc<dyn Reporter>,
    ) -> ActionCreators {
        let mut available = public.clone();
        for (name, behavior) in self.view_for(event) {
            let Some(entry) = self.entries.get(&name) else {
                continue;
            };
            let creator = match behavior {
                Behavior::Allow => entry.creator.clone(),
                Behavior::AllowWithDeprecationWarning => {
                    with_deprecation_warning(&name, entry, event, reporter)
                }
                Behavior::Deny => with_error_message(&name, entry, event, reporter),
            };
            available.insert(name, creator);
        }
        available
    }
}

fn with_deprecation_warning(
    name: &str,
    entry: &Entry,
    event: &str,
    reporter: &Arc<dyn Reporter>,
) -> ActionCreator {
    let message = format!(
        "Calling `{name}` in the `{event}` API is deprecated. Please use: {}.",
        entry.restriction.suggestion()
    );
    let inner = entry.creator.clone();
    let reporter = Arc::clone(reporter);
    let event = event.to_string();
    ActionCreator::new(move |payload, plugin, ctx| {
        reporter.report(
            Report::new(ReportKind::DeprecatedAction, Severity::Warning, message.clone())
                .with_plugin(plugin)
                .with_event(event.clone()),
        );
        inner.create(payload, plugin, ctx)
    })
}

fn with_error_message(
    name: &str,
    entry: &Entry,
    event: &str,
    reporter: &Arc<dyn Reporter>,
) -> ActionCreator {
    let message = format!(
        "`{name}` is not available in the `{event}` API. Please use: {}.",
        entry.restriction.suggestion()
    );
    let reporter = Arc::clone(reporter);
    let event = event.to_string();
    ActionCreator::new(move |_payload, plugin, _ctx| {
        reporter.report(
            Report::new(ReportKind::DeniedAction, Severity::Error, message.clone())
                .with_plugin(plugin)
                .with_event(event.clone()),
        );
        None
    })
}
