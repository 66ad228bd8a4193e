//! The project's own node hooks.

use crate::model::Page;
use crate::store::BuildStore;
use api_runner::plugin::{async_handler_fn, handler_fn};
use api_runner::{ApiCall, HandlerResult, Plugin};
use serde_json::json;
use std::sync::{Arc, Weak};

pub const NAME: &str = "default-site-plugin";

pub const BLOG_TEMPLATE: &str = "src/templates/blog-post.js";

/// Still declares its types the old way, before schema customization existed.
fn on_pre_bootstrap(api: ApiCall) -> HandlerResult {
    api.actions
        .invoke("createTypes", json!("type SiteMetadata { title: String }"))?;
    Ok(None)
}

fn pages(store: &BuildStore) -> Vec<Page> {
    let mut pages = vec![
        Page::new("/", "src/pages/index.js"),
        Page::new("/about/", "src/pages/about.js"),
    ];
    for post in store.nodes_of_type("MarkdownRemark") {
        let Some(slug) = post.str_field("slug") else {
            continue;
        };
        let draft = post.fields.get("draft").cloned().unwrap_or(json!(false));
        pages.push(
            Page::new(slug, BLOG_TEMPLATE).with_context(json!({ "id": post.id, "draft": draft })),
        );
    }
    pages
}

async fn create_pages(api: ApiCall, store: Weak<BuildStore>) -> HandlerResult {
    let Some(store) = store.upgrade() else {
        return Ok(None);
    };
    let pages = pages(&store);
    for page in &pages {
        api.actions.invoke("createPage", json!(page))?;
    }
    Ok(Some(json!({ "pages": pages.len() })))
}

pub fn plugin(store: &Arc<BuildStore>) -> Plugin {
    let store = Arc::downgrade(store);
    Plugin::new(NAME, "1.0.0")
        .on("onPreBootstrap", handler_fn(on_pre_bootstrap))
        .on(
            "createPages",
            async_handler_fn(move |api| create_pages(api, store.clone())),
        )
}
