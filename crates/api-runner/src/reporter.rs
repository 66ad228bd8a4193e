//! # Reporting
//!
//! The engine never decides whether a failure halts the process. It hands a
//! structured [`Report`] to a [`Reporter`] and carries on; the reporter owns
//! the policy. [`TracingReporter`] is the default and only logs.

use crate::plugin::PluginIdentity;
use serde::Serialize;
use tracing::{error, info, warn};

/// Report id used for plugin handler failures.
pub const PLUGIN_HANDLER_ERROR_ID: &str = "11321";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    /// Unknown lifecycle event dispatched.
    ConfigurationError,
    /// A handler returned an error or panicked.
    PluginHandlerError,
    /// A restricted action called from an event that denies it.
    DeniedAction,
    /// A restricted action called from an event where it is deprecated.
    DeprecatedAction,
    /// A guarded action fired after its handler had already finished.
    LateActionCall,
    /// Action creator rejected its input.
    InvalidAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Fatal for the build; the reporter decides whether to stop.
    Panic,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Option<String>,
    pub kind: ReportKind,
    pub severity: Severity,
    pub message: String,
    pub plugin: Option<PluginIdentity>,
    pub event: Option<String>,
    pub location: Option<String>,
}

impl Report {
    pub fn new(kind: ReportKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            severity,
            message: message.into(),
            plugin: None,
            event: None,
            location: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_plugin(mut self, plugin: &PluginIdentity) -> Self {
        self.plugin = Some(plugin.clone());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Receives warnings and errors raised while dispatching.
pub trait Reporter: Send + Sync {
    fn report(&self, report: Report);
}

/// Logs every report through `tracing` and never halts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: Report) {
        let plugin = report.plugin.as_ref().map(ToString::to_string);
        match report.severity {
            Severity::Info => {
                info!(kind = ?report.kind, ?plugin, event = ?report.event, "{}", report.message)
            }
            Severity::Warning => {
                warn!(kind = ?report.kind, ?plugin, event = ?report.event, "{}", report.message)
            }
            Severity::Error | Severity::Panic => error!(
                kind = ?report.kind,
                id = ?report.id,
                ?plugin,
                event = ?report.event,
                location = ?report.location,
                "{}",
                report.message
            ),
        }
    }
}
