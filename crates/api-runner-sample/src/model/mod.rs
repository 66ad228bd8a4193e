//! # Build State Model
//!
//! The entities the sample store keeps: pages, data nodes and schema
//! customizations.

pub mod node;
pub mod page;

pub use node::{Node, NodeInternal};
pub use page::{Page, PageDelete};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A field extension registered through `createFieldExtension`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtension {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    pub plugin: Option<String>,
}
