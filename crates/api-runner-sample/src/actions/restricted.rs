//! Schema actions and the events they are available in.
//!
//! | Action | Allowed in | Deprecated in |
//! |--------|------------|---------------|
//! | `createFieldExtension` | `sourceNodes`, `createSchemaCustomization` | |
//! | `createTypes` | `sourceNodes`, `createSchemaCustomization` | `onPreInit`, `onPreBootstrap` |
//! | `addThirdPartySchema` | `sourceNodes`, `createSchemaCustomization` | `onPreInit`, `onPreBootstrap` |

use crate::store::BuildStore;
use api_runner::{
    Action, ActionContext, ActionCreator, ActionRestrictions, EventCatalog, PluginIdentity,
    Report, ReportKind, Reporter, Restriction, Severity,
};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

const SCHEMA_EVENTS: [&str; 2] = ["sourceNodes", "createSchemaCustomization"];
const LEGACY_SCHEMA_EVENTS: [&str; 2] = ["onPreInit", "onPreBootstrap"];

/// Extension names the schema builder uses itself.
pub const RESERVED_EXTENSION_NAMES: &[&str] = &[
    "createdFrom",
    "default",
    "directives",
    "infer",
    "plugin",
    "dateformat",
    "link",
    "fileByRelativePath",
    "proxy",
];

fn create_field_extension(store: Weak<BuildStore>, reporter: Arc<dyn Reporter>) -> ActionCreator {
    ActionCreator::new(move |extension: Value, plugin: &PluginIdentity, ctx: &ActionContext| {
        let fail = |message: String| {
            reporter.report(
                Report::new(ReportKind::InvalidAction, Severity::Error, message).with_plugin(plugin),
            );
            None
        };

        let Some(name) = extension.get("name").and_then(Value::as_str) else {
            return fail("The provided field extension must have a `name` property.".into());
        };
        if RESERVED_EXTENSION_NAMES.contains(&name) {
            return fail(format!(
                "The field extension name `{name}` is reserved for internal use."
            ));
        }
        let store = store.upgrade()?;
        if store.field_extension(name).is_some() {
            return fail(format!(
                "A field extension with the name `{name}` has already been registered."
            ));
        }

        let payload = json!({ "name": name, "extension": extension });
        Some(Action::new("CREATE_FIELD_EXTENSION", payload).attributed(plugin, ctx))
    })
}

fn add_third_party_schema() -> ActionCreator {
    ActionCreator::new(|payload: Value, plugin: &PluginIdentity, ctx: &ActionContext| {
        let schema = payload.get("schema")?.clone();
        Some(Action::new("ADD_THIRD_PARTY_SCHEMA", schema).attributed(plugin, ctx))
    })
}

pub fn restricted_actions(
    catalog: EventCatalog,
    store: &Arc<BuildStore>,
    reporter: &Arc<dyn Reporter>,
) -> ActionRestrictions {
    ActionRestrictions::new(catalog)
        .restrict(
            "createFieldExtension",
            create_field_extension(Arc::downgrade(store), Arc::clone(reporter)),
            Restriction::allowed_in(SCHEMA_EVENTS),
        )
        .restrict(
            "createTypes",
            ActionCreator::simple("CREATE_TYPES"),
            Restriction::allowed_in(SCHEMA_EVENTS).deprecated_in(LEGACY_SCHEMA_EVENTS),
        )
        .restrict(
            "addThirdPartySchema",
            add_third_party_schema(),
            Restriction::allowed_in(SCHEMA_EVENTS).deprecated_in(LEGACY_SCHEMA_EVENTS),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::node_api_catalog;
    use api_runner::mock::RecordingReporter;
    use api_runner::{ActionCreators, ActionSink, Behavior};

    fn setup() -> (Arc<BuildStore>, Arc<RecordingReporter>, ActionCreators) {
        let store = Arc::new(BuildStore::default());
        let recording = Arc::new(RecordingReporter::default());
        let reporter: Arc<dyn Reporter> = recording.clone();
        let available = restricted_actions(node_api_catalog(), &store, &reporter).available_in(
            "createSchemaCustomization",
            &ActionCreators::new(),
            &reporter,
        );
        (store, recording, available)
    }

    #[test]
    fn test_table_matches_schema_lifecycle() {
        let store = Arc::new(BuildStore::default());
        let reporter: Arc<dyn Reporter> = Arc::new(RecordingReporter::default());
        let table = restricted_actions(node_api_catalog(), &store, &reporter);

        assert_eq!(table.behavior("createTypes", "sourceNodes"), Some(Behavior::Allow));
        assert_eq!(
            table.behavior("addThirdPartySchema", "onPreInit"),
            Some(Behavior::AllowWithDeprecationWarning)
        );
        assert_eq!(
            table.behavior("createFieldExtension", "onPreInit"),
            Some(Behavior::Deny)
        );
        assert_eq!(table.behavior("createTypes", "onCreatePage"), Some(Behavior::Deny));
        assert_eq!(table.view_for("onPostBuild").len(), 3);
    }

    #[test]
    fn test_field_extension_validation() {
        let (store, recording, available) = setup();
        let plugin = PluginIdentity::new("remark", "1.0.0");
        let ctx = ActionContext::default();
        let creator = available.get("createFieldExtension").unwrap();

        assert!(creator.create(json!({ "args": {} }), &plugin, &ctx).is_none());
        assert!(creator.create(json!({ "name": "link" }), &plugin, &ctx).is_none());

        let first = creator.create(json!({ "name": "slugify" }), &plugin, &ctx).unwrap();
        store.dispatch(first);
        assert!(creator.create(json!({ "name": "slugify" }), &plugin, &ctx).is_none());

        let messages: Vec<_> = recording.reports().into_iter().map(|r| r.message).collect();
        assert_eq!(
            messages,
            [
                "The provided field extension must have a `name` property.",
                "The field extension name `link` is reserved for internal use.",
                "A field extension with the name `slugify` has already been registered.",
            ]
        );
        assert_eq!(store.field_extension("slugify").unwrap().plugin.as_deref(), Some("remark"));
    }
}
