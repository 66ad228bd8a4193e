//! Turns markdown `File` nodes into `MarkdownRemark` nodes and declares their
//! schema.

use crate::model::Node;
use api_runner::plugin::{callback_handler_fn, handler_fn, Completion};
use api_runner::{ApiCall, HandlerError, HandlerResult, Plugin};
use serde_json::json;

pub const NAME: &str = "gatsby-transformer-remark";

pub const TYPE_DEFS: &str = "type MarkdownRemark implements Node { title: String! slug: String! @slugify draft: Boolean }";

#[derive(Debug, Default, PartialEq)]
struct Markdown<'a> {
    title: Option<&'a str>,
    draft: bool,
    body: &'a str,
}

/// Splits `---` delimited front matter from the body.
fn parse_markdown(content: &str) -> Markdown<'_> {
    let Some((head, body)) = content
        .strip_prefix("---\n")
        .and_then(|rest| rest.split_once("\n---"))
    else {
        return Markdown {
            body: content,
            ..Markdown::default()
        };
    };

    let mut markdown = Markdown {
        body: body.trim_start_matches('\n'),
        ..Markdown::default()
    };
    for (key, value) in head.lines().filter_map(|line| line.split_once(':')) {
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "title" => markdown.title = Some(value),
            "draft" => markdown.draft = value == "true",
            _ => {}
        }
    }
    markdown
}

fn slug(relative_path: &str) -> String {
    let file = relative_path.rsplit('/').next().unwrap_or(relative_path);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    format!("/blog/{stem}/")
}

fn on_create_node(api: ApiCall) -> HandlerResult {
    let Some(node) = api.field("node").cloned() else {
        return Ok(None);
    };
    let node: Node = serde_json::from_value(node).map_err(HandlerError::from_error)?;
    if node.kind() != "File" || node.str_field("extension") != Some("md") {
        return Ok(None);
    }

    let relative_path = node.str_field("relativePath").unwrap_or_default();
    let markdown = parse_markdown(node.str_field("content").unwrap_or_default());
    let slug = slug(relative_path);
    let remark = Node::new(
        format!("{}:remark", node.id),
        "MarkdownRemark",
        node.internal.content_digest.clone(),
    )
    .with_parent(node.id.clone())
    .with_field("title", json!(markdown.title.unwrap_or(relative_path)))
    .with_field("slug", json!(slug))
    .with_field("draft", json!(markdown.draft))
    .with_field("rawMarkdownBody", json!(markdown.body));

    api.actions.invoke("createNode", json!(remark))?;
    Ok(Some(json!({ "transformed": node.id })))
}

fn define_schema(api: &ApiCall) -> HandlerResult {
    api.actions.invoke("createTypes", json!(TYPE_DEFS))?;
    api.actions.invoke(
        "createFieldExtension",
        json!({ "name": "slugify", "args": { "from": { "type": "String" } } }),
    )?;
    Ok(None)
}

pub fn plugin() -> Plugin {
    Plugin::new(NAME, "2.6.0")
        .on("onCreateNode", handler_fn(on_create_node))
        .on(
            "createSchemaCustomization",
            callback_handler_fn(|api: ApiCall, done: Completion| {
                tokio::spawn(async move {
                    let result = define_schema(&api);
                    done.done(result);
                });
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_matter_is_split_from_body() {
        let markdown = parse_markdown("---\ntitle: \"Hello\"\ndraft: true\n---\n\nBody text");
        assert_eq!(
            markdown,
            Markdown {
                title: Some("Hello"),
                draft: true,
                body: "Body text",
            }
        );
        assert_eq!(parse_markdown("no front matter").body, "no front matter");
    }

    #[test]
    fn test_slug_uses_file_stem() {
        assert_eq!(slug("posts/hello-world.md"), "/blog/hello-world/");
        assert_eq!(slug("intro.md"), "/blog/intro/");
    }
}
