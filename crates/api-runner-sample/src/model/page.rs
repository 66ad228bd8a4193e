use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A page registered through `createPage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub path: String,
    pub component: String,
    #[serde(default)]
    pub context: Value,
    /// Name of the plugin that created the page; stamped by the store.
    #[serde(default)]
    pub plugin_creator: Option<String>,
}

impl Page {
    pub fn new(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            context: Value::Object(Default::default()),
            plugin_creator: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn is_draft(&self) -> bool {
        self.context.get("draft").and_then(Value::as_bool) == Some(true)
    }
}

/// Payload of `deletePage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDelete {
    pub path: String,
}
