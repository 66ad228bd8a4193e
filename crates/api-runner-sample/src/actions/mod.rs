//! # Action Creators
//!
//! The actions the sample host hands to plugins.
//!
//! - [`public_actions`]: available during every lifecycle event.
//! - [`restricted::restricted_actions`]: schema actions only allowed during
//!   specific events.

pub mod restricted;

pub use restricted::restricted_actions;

use crate::model::Page;
use api_runner::{
    Action, ActionContext, ActionCreator, ActionCreators, PluginIdentity, Report, ReportKind,
    Reporter, Severity,
};
use serde_json::Value;
use std::sync::Arc;

fn invalid(reporter: &Arc<dyn Reporter>, plugin: &PluginIdentity, message: String) {
    reporter.report(
        Report::new(ReportKind::InvalidAction, Severity::Error, message).with_plugin(plugin),
    );
}

/// Validates the page before it reaches the store.
fn create_page(reporter: Arc<dyn Reporter>) -> ActionCreator {
    ActionCreator::new(move |payload: Value, plugin: &PluginIdentity, ctx: &ActionContext| {
        let page: Page = match serde_json::from_value(payload.clone()) {
            Ok(page) => page,
            Err(err) => {
                invalid(
                    &reporter,
                    plugin,
                    format!("\"{}\" passed an invalid page to createPage: {err}", plugin.name),
                );
                return None;
            }
        };
        if !page.path.starts_with('/') {
            invalid(
                &reporter,
                plugin,
                format!("The page path \"{}\" must start with \"/\".", page.path),
            );
            return None;
        }
        if page.component.is_empty() {
            invalid(
                &reporter,
                plugin,
                format!("\"{}\" must set the page component when creating a page.", plugin.name),
            );
            return None;
        }
        Some(Action::new("CREATE_PAGE", payload).attributed(plugin, ctx))
    })
}

fn create_node(reporter: Arc<dyn Reporter>) -> ActionCreator {
    ActionCreator::new(move |payload: Value, plugin: &PluginIdentity, ctx: &ActionContext| {
        let missing = ["/id", "/internal/type", "/internal/contentDigest"]
            .into_iter()
            .find(|pointer| payload.pointer(pointer).and_then(Value::as_str).is_none());
        if let Some(pointer) = missing {
            invalid(
                &reporter,
                plugin,
                format!("\"{}\" created a node without `{pointer}`.", plugin.name),
            );
            return None;
        }
        Some(Action::new("CREATE_NODE", payload).attributed(plugin, ctx))
    })
}

pub fn public_actions(reporter: &Arc<dyn Reporter>) -> ActionCreators {
    ActionCreators::new()
        .with("createPage", create_page(Arc::clone(reporter)))
        .with("deletePage", ActionCreator::simple("DELETE_PAGE"))
        .with("createNode", create_node(Arc::clone(reporter)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_runner::mock::RecordingReporter;
    use serde_json::json;

    #[test]
    fn test_create_page_rejects_relative_paths() {
        let recording = Arc::new(RecordingReporter::default());
        let reporter: Arc<dyn Reporter> = recording.clone();
        let actions = public_actions(&reporter);
        let plugin = PluginIdentity::new("site", "1.0.0");
        let ctx = ActionContext::default();

        let creator = actions.get("createPage").unwrap();
        assert!(creator
            .create(json!({ "path": "about", "component": "about.js" }), &plugin, &ctx)
            .is_none());
        assert!(creator
            .create(json!({ "path": "/about/", "component": "about.js" }), &plugin, &ctx)
            .is_some());
        assert_eq!(recording.of_kind(ReportKind::InvalidAction).len(), 1);
    }

    #[test]
    fn test_create_node_requires_internal_fields() {
        let recording = Arc::new(RecordingReporter::default());
        let reporter: Arc<dyn Reporter> = recording.clone();
        let creator = public_actions(&reporter).get("createNode").cloned().unwrap();
        let plugin = PluginIdentity::new("fs", "1.0.0");

        let action = creator.create(
            json!({ "id": "n1", "internal": { "type": "File" } }),
            &plugin,
            &ActionContext::default(),
        );
        assert!(action.is_none());
        assert!(recording.reports()[0].message.contains("/internal/contentDigest"));
    }
}
