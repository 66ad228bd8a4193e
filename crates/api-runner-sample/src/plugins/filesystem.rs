//! Sources `File` nodes from the file list in the plugin options.

use crate::model::Node;
use api_runner::plugin::async_handler_fn;
use api_runner::{ApiCall, HandlerError, HandlerResult, Plugin};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

pub const NAME: &str = "gatsby-source-filesystem";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub relative_path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
        }
    }

    pub fn extension(&self) -> &str {
        self.relative_path
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }
}

pub fn content_digest(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn file_node(file: &SourceFile) -> Node {
    Node::new(
        format!("file:{}", file.relative_path),
        "File",
        content_digest(&file.content),
    )
    .with_field("relativePath", json!(file.relative_path))
    .with_field("extension", json!(file.extension()))
    .with_field("content", json!(file.content))
}

async fn source_nodes(api: ApiCall) -> HandlerResult {
    let files = api.options.get("files").cloned().unwrap_or(Value::Array(Vec::new()));
    let files: Vec<SourceFile> = serde_json::from_value(files).map_err(HandlerError::from_error)?;

    for file in &files {
        debug!(path = %file.relative_path, "Sourcing file");
        api.actions.invoke("createNode", json!(file_node(file)))?;
        // Let follow-up runs interleave like real I/O would.
        tokio::task::yield_now().await;
    }
    Ok(Some(json!({ "sourced": files.len() })))
}

pub fn plugin(files: Vec<SourceFile>) -> Plugin {
    Plugin::new(NAME, "2.1.0")
        .with_options(json!({ "files": files }))
        .on("sourceNodes", async_handler_fn(source_nodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node_carries_path_and_digest() {
        let file = SourceFile::new("posts/hello.md", "# Hello");
        let node = file_node(&file);
        assert_eq!(node.id, "file:posts/hello.md");
        assert_eq!(node.kind(), "File");
        assert_eq!(node.str_field("extension"), Some("md"));
        assert_eq!(node.internal.content_digest, content_digest("# Hello"));
        assert_ne!(content_digest("a"), content_digest("b"));
    }
}
