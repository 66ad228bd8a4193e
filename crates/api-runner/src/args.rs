//! # Invocation Arguments
//!
//! The payload bag handed to one dispatch call. Event-specific data lives in
//! `fields` as JSON; the tracing span, trace id, trace tags and the
//! cascading-wait flag are typed because the engine itself acts on them.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::Span;

#[derive(Debug, Clone, Default)]
pub struct InvocationArgs {
    /// Span the call's `run-api` span is parented to.
    pub parent_span: Option<Span>,
    /// Correlates a call with every call its handlers trigger.
    pub trace_id: Option<String>,
    /// Extra tags recorded on the `run-api` span.
    pub trace_tags: BTreeMap<String, String>,
    /// Resolve only once every run sharing `trace_id` has closed.
    pub wait_for_cascading_actions: bool,
    /// Event-specific payload.
    pub fields: Map<String, Value>,
}

impl InvocationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_parent_span(mut self, span: Span) -> Self {
        self.parent_span = Some(span);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.trace_tags.insert(key.into(), value.into());
        self
    }

    pub fn wait_for_cascading_actions(mut self) -> Self {
        self.wait_for_cascading_actions = true;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Builds args from a JSON object; non-object values are ignored.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                fields,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Looks up a nested payload value with a JSON pointer such as `/page/path`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let mut parts = pointer.strip_prefix('/')?.splitn(2, '/');
        let head = self.fields.get(parts.next()?)?;
        match parts.next() {
            Some(rest) => head.pointer(&format!("/{rest}")),
            None => Some(head),
        }
    }

    /// The payload serialized the way run ids embed it.
    ///
    /// The parent span never takes part; trace id and tags are included so two
    /// otherwise identical calls from different traces stay distinguishable.
    pub fn payload_json(&self) -> String {
        let mut payload = self.fields.clone();
        if let Some(trace_id) = &self.trace_id {
            payload.insert("traceId".into(), Value::String(trace_id.clone()));
        }
        if !self.trace_tags.is_empty() {
            let tags = self
                .trace_tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            payload.insert("traceTags".into(), Value::Object(tags));
        }
        if self.wait_for_cascading_actions {
            payload.insert("waitForCascadingActions".into(), Value::Bool(true));
        }
        Value::Object(payload).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pointer_walks_nested_fields() {
        let args = InvocationArgs::from_json(json!({
            "page": { "path": "/blog/", "component": "blog.js" }
        }));
        assert_eq!(args.pointer("/page/path"), Some(&json!("/blog/")));
        assert_eq!(args.pointer("/page"), args.field("page"));
        assert_eq!(args.pointer("/missing/path"), None);
        assert_eq!(args.pointer("page"), None);
    }

    #[test]
    fn test_payload_json_skips_parent_span() {
        let args = InvocationArgs::new()
            .with_parent_span(tracing::info_span!("outer"))
            .with_trace_id("t1")
            .with_field("filename", json!("a.md"));
        let payload: Value = serde_json::from_str(&args.payload_json()).unwrap();
        assert_eq!(payload, json!({ "filename": "a.md", "traceId": "t1" }));
    }
}
