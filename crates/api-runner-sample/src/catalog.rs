//! Lifecycle names plugins may implement in the sample host.

use api_runner::EventCatalog;

pub const NODE_APIS: &[&str] = &[
    "resolvableExtensions",
    "onPreInit",
    "onPreBootstrap",
    "sourceNodes",
    "onCreateNode",
    "unstable_shouldOnCreateNode",
    "setFieldsOnGraphQLNodeType",
    "createSchemaCustomization",
    "createResolvers",
    "createPages",
    "createPagesStatefully",
    "onCreatePage",
    "preprocessSource",
    "generateSideEffects",
    "onCreateBabelConfig",
    "onCreateWebpackConfig",
    "onPreExtractQueries",
    "onPostBootstrap",
    "onCreateDevServer",
    "onPreBuild",
    "onPostBuild",
];

pub fn node_api_catalog() -> EventCatalog {
    EventCatalog::new(NODE_APIS.iter().copied())
}
