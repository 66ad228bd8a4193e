use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bookkeeping every node carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub kind: String,
    pub content_digest: String,
    /// Plugin that created the node; stamped by the store.
    #[serde(default)]
    pub owner: Option<String>,
}

/// A data node. Type-specific data lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub internal: NodeInternal,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, content_digest: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            internal: NodeInternal {
                kind: kind.into(),
                content_digest: content_digest.into(),
                owner: None,
            },
            fields: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> &str {
        &self.internal.kind
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}
