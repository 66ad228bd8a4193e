//! Creates a locale-prefixed copy of every page.

use crate::model::Page;
use api_runner::plugin::{callback_handler_fn, Completion};
use api_runner::{ApiCall, HandlerError, HandlerResult, Plugin};
use serde_json::{json, Value};

pub const NAME: &str = "gatsby-plugin-i18n";

fn locales(options: &Value) -> Vec<String> {
    options
        .get("locales")
        .and_then(Value::as_array)
        .map(|locales| {
            locales
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn localize(page: &Page, locale: &str) -> Option<Page> {
    if page.path.starts_with(&format!("/{locale}/")) {
        return None;
    }
    let mut context = page.context.clone();
    if let Value::Object(fields) = &mut context {
        fields.insert("locale".into(), json!(locale));
    }
    Some(
        Page::new(format!("/{locale}{}", page.path), page.component.clone()).with_context(context),
    )
}

fn copy_page(api: &ApiCall) -> HandlerResult {
    let Some(page) = api.field("page").cloned() else {
        return Ok(None);
    };
    let page: Page = serde_json::from_value(page).map_err(HandlerError::from_error)?;
    let mut created = Vec::new();
    for copy in locales(&api.options)
        .iter()
        .filter_map(|locale| localize(&page, locale))
    {
        api.actions.invoke("createPage", json!(copy))?;
        created.push(copy.path);
    }
    Ok((!created.is_empty()).then(|| json!(created)))
}

pub fn plugin(locales: &[&str]) -> Plugin {
    Plugin::new(NAME, "0.4.2")
        .with_options(json!({ "locales": locales }))
        .on(
            "onCreatePage",
            callback_handler_fn(|api: ApiCall, done: Completion| done.done(copy_page(&api))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_copy_is_prefixed_once() {
        let page = Page::new("/about/", "about.js");
        let copy = localize(&page, "fr").unwrap();
        assert_eq!(copy.path, "/fr/about/");
        assert_eq!(copy.context["locale"], "fr");
        assert!(localize(&copy, "fr").is_none());
    }

    #[test]
    fn test_locales_read_from_options() {
        assert_eq!(locales(&json!({ "locales": ["fr", "de"] })), ["fr", "de"]);
        assert!(locales(&json!({})).is_empty());
    }
}
