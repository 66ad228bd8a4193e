//! # Actions
//!
//! Mutations travel as [`Action`] values into one shared [`ActionSink`] (the
//! host's store). Plugins never build actions themselves; they call named
//! [`ActionCreator`]s, which the binder has already scoped to the calling
//! plugin and trace.

use crate::plugin::PluginIdentity;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// A single mutation headed for the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Reducer discriminator, e.g. `CREATE_PAGE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub plugin: Option<PluginIdentity>,
    pub trace_id: Option<String>,
    pub payload: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            plugin: None,
            trace_id: None,
            payload,
        }
    }

    /// Stamps the plugin and trace the action originates from.
    pub fn attributed(mut self, plugin: &PluginIdentity, ctx: &ActionContext) -> Self {
        self.plugin = Some(plugin.clone());
        self.trace_id = ctx.trace_id.clone();
        self
    }
}

/// Context every scoped action forwards alongside the payload.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    pub trace_id: Option<String>,
    pub span: Option<Span>,
}

/// The serialized mutation sink.
pub trait ActionSink: Send + Sync {
    fn dispatch(&self, action: Action);
}

type CreatorFn = dyn Fn(Value, &PluginIdentity, &ActionContext) -> Option<Action> + Send + Sync;

/// Turns a payload into an action. `None` means nothing is dispatched.
#[derive(Clone)]
pub struct ActionCreator(Arc<CreatorFn>);

impl ActionCreator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value, &PluginIdentity, &ActionContext) -> Option<Action> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Creator that always builds an action of `kind` from the payload.
    pub fn simple(kind: &'static str) -> Self {
        Self::new(move |payload, plugin, ctx| Some(Action::new(kind, payload).attributed(plugin, ctx)))
    }

    pub fn create(&self, payload: Value, plugin: &PluginIdentity, ctx: &ActionContext) -> Option<Action> {
        (self.0)(payload, plugin, ctx)
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionCreator")
    }
}

/// Named set of creators.
#[derive(Debug, Clone, Default)]
pub struct ActionCreators {
    creators: BTreeMap<String, ActionCreator>,
}

impl ActionCreators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, creator: ActionCreator) -> Self {
        self.insert(name, creator);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, creator: ActionCreator) {
        self.creators.insert(name.into(), creator);
    }

    pub fn get(&self, name: &str) -> Option<&ActionCreator> {
        self.creators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionCreator)> {
        self.creators.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_creator_attributes_plugin_and_trace() {
        let creator = ActionCreator::simple("CREATE_PAGE");
        let plugin = PluginIdentity::new("site", "1.0.0");
        let ctx = ActionContext {
            trace_id: Some("t1".into()),
            span: None,
        };
        let action = creator
            .create(json!({ "path": "/" }), &plugin, &ctx)
            .unwrap();
        assert_eq!(action.kind, "CREATE_PAGE");
        assert_eq!(action.plugin, Some(plugin));
        assert_eq!(action.trace_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_action_serializes_kind_as_type() {
        let action = Action::new("DELETE_PAGE", json!({ "path": "/a/" }));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "DELETE_PAGE");
        assert_eq!(value["traceId"], Value::Null);
    }
}
