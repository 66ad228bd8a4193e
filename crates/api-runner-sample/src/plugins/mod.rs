//! # Sample Plugins
//!
//! A small blog setup, in registry order:
//!
//! 1. [`filesystem`] sources `File` nodes.
//! 2. [`remark`] turns markdown files into `MarkdownRemark` nodes.
//! 3. [`drafts`] deletes draft pages.
//! 4. [`i18n`] copies every page under `/fr`.
//! 5. [`site`] creates the pages.
//!
//! `drafts` runs before `i18n`, so a deleted draft stops the queued copy.

pub mod drafts;
pub mod filesystem;
pub mod i18n;
pub mod remark;
pub mod site;

pub use filesystem::SourceFile;

use crate::store::BuildStore;
use api_runner::Plugin;
use std::sync::Arc;

pub fn default_plugins(store: &Arc<BuildStore>, files: Vec<SourceFile>) -> Vec<Plugin> {
    vec![
        filesystem::plugin(files),
        remark::plugin(),
        drafts::plugin(),
        i18n::plugin(&["fr"]),
        site::plugin(store),
    ]
}

/// Content the binary builds from.
pub fn demo_files() -> Vec<SourceFile> {
    vec![
        SourceFile::new(
            "posts/hello-world.md",
            "---\ntitle: Hello World\n---\n\nFirst post.",
        ),
        SourceFile::new(
            "posts/work-in-progress.md",
            "---\ntitle: Not Yet\ndraft: true\n---\n\nUnfinished.",
        ),
        SourceFile::new("static/robots.txt", "User-agent: *"),
    ]
}
