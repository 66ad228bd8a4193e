//! Removes draft pages as soon as they are created.

use crate::model::Page;
use api_runner::plugin::handler_fn;
use api_runner::{ApiCall, HandlerError, HandlerResult, Plugin};
use serde_json::json;
use tracing::info;

pub const NAME: &str = "gatsby-plugin-drafts";

fn on_create_page(api: ApiCall) -> HandlerResult {
    let Some(page) = api.field("page").cloned() else {
        return Ok(None);
    };
    let page: Page = serde_json::from_value(page).map_err(HandlerError::from_error)?;
    if !page.is_draft() {
        return Ok(None);
    }
    info!(path = %page.path, "Dropping draft page");
    api.actions.invoke("deletePage", json!({ "path": page.path }))?;
    Ok(Some(json!({ "deleted": page.path })))
}

pub fn plugin() -> Plugin {
    Plugin::new(NAME, "1.0.0").on("onCreatePage", handler_fn(on_create_page))
}
