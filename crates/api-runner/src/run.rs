//! # Run Records
//!
//! One [`RunRecord`] exists per dispatch call while it is open. Records move
//! through `Created → Running → Completed | Cancelled`; quiescence is not a
//! record state but a property of the per-trace counter kept by the tracker.

use crate::args::InvocationArgs;
use crate::config::RunnerConfig;
use crate::plugin::PluginIdentity;
use serde_json::Value;
use std::fmt::{self, Display};
use tracing::Span;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counter bucket for a trace id. Runs without one share `Untraced`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraceKey {
    Untraced,
    Trace(String),
}

impl From<Option<&str>> for TraceKey {
    fn from(trace_id: Option<&str>) -> Self {
        match trace_id {
            Some(id) => Self::Trace(id.to_string()),
            None => Self::Untraced,
        }
    }
}

impl Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untraced => f.write_str("-"),
            Self::Trace(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Completed,
    Cancelled,
}

/// How the plugin loop of a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => Self::Completed,
            RunOutcome::Cancelled => Self::Cancelled,
        }
    }
}

/// A non-empty result produced by one plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResult {
    pub plugin: PluginIdentity,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: RunId,
    pub event: String,
    pub trace: TraceKey,
    pub plugin_source: Option<String>,
    pub started_at: String,
    pub span: Span,
    pub state: RunState,
    pub results: Vec<PluginResult>,
}

impl RunRecord {
    pub fn new(
        event: &str,
        args: &InvocationArgs,
        plugin_source: Option<&str>,
        span: Span,
        config: &RunnerConfig,
    ) -> Self {
        let started_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        Self {
            id: run_id(event, &started_at, args, config),
            event: event.to_string(),
            trace: TraceKey::from(args.trace_id.as_deref()),
            plugin_source: plugin_source.map(str::to_string),
            started_at,
            span,
            state: RunState::Created,
            results: Vec::new(),
        }
    }
}

/// Builds a run id.
///
/// Hot events use the configured discriminating field so huge payloads are
/// never serialized; everything else embeds the full payload.
pub fn run_id(event: &str, started_at: &str, args: &InvocationArgs, config: &RunnerConfig) -> RunId {
    let trace = args.trace_id.as_deref().unwrap_or("");
    let discriminator = config
        .run_id_fields
        .get(event)
        .and_then(|pointer| args.pointer(pointer))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    match discriminator {
        Some(field) => RunId(format!("{event}|{started_at}|{field}|{trace}")),
        None => RunId(format!("{event}|{started_at}|{trace}|{}", args.payload_json())),
    }
}

/// Whether a handler result counts as "no result".
///
/// Only non-empty strings, arrays and objects are results; scalars such as
/// `true` or `42` are not.
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
