//! # Plugins & Handlers
//!
//! A [`Plugin`] is an identity plus a map from lifecycle event name to the
//! [`PluginHandler`] implementing it. The registry that loads plugins lives
//! outside the engine; [`PluginRegistry`] is only the ordered, read-only list
//! the dispatcher consumes.
//!
//! # Handler styles
//!
//! Handlers come in three shapes and all of them end up behind the same
//! `async fn call`:
//!
//! - [`handler_fn`]: a synchronous closure returning the result directly.
//! - [`async_handler_fn`]: a closure returning a future.
//! - [`callback_handler_fn`]: a closure that receives a [`Completion`] and
//!   fires it whenever it is done (the legacy completion-callback form).
//!
//! ```rust
//! use api_runner::plugin::{handler_fn, Plugin};
//! use serde_json::json;
//!
//! let plugin = Plugin::new("gatsby-plugin-sitemap", "2.1.0")
//!     .on("onPostBuild", handler_fn(|_api| Ok(Some(json!({ "written": true })))));
//! assert!(plugin.implements("onPostBuild"));
//! ```

use crate::context::ApiCall;
use crate::error::HandlerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a handler settles with. `Ok(None)` means "no result".
pub type HandlerResult = Result<Option<Value>, HandlerError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginIdentity {
    pub name: String,
    pub version: String,
}

impl PluginIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A lifecycle handler.
#[async_trait]
pub trait PluginHandler: Send + Sync {
    async fn call(&self, api: ApiCall) -> HandlerResult;
}

/// A registered plugin. Immutable once handed to the registry.
#[derive(Clone)]
pub struct Plugin {
    pub identity: PluginIdentity,
    /// Plugin options passed to every handler.
    pub options: Value,
    handlers: BTreeMap<String, Arc<dyn PluginHandler>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identity: PluginIdentity::new(name, version),
            options: Value::Object(Default::default()),
            handlers: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Registers the handler for `event`, replacing any previous one.
    pub fn on(mut self, event: impl Into<String>, handler: impl PluginHandler + 'static) -> Self {
        self.handlers.insert(event.into(), Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn implements(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn handler(&self, event: &str) -> Option<Arc<dyn PluginHandler>> {
        self.handlers.get(event).cloned()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("identity", &self.identity)
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Plugins in registration order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Plugins implementing `event`, in order, minus the one named `exclude`.
    pub fn implementing(&self, event: &str, exclude: Option<&str>) -> Vec<Plugin> {
        self.plugins
            .iter()
            .filter(|p| p.implements(event) && Some(p.name()) != exclude)
            .cloned()
            .collect()
    }
}

// --- Adapters ---

pub struct SyncHandler<F>(F);

#[async_trait]
impl<F> PluginHandler for SyncHandler<F>
where
    F: Fn(ApiCall) -> HandlerResult + Send + Sync,
{
    async fn call(&self, api: ApiCall) -> HandlerResult {
        (self.0)(api)
    }
}

/// Wraps a synchronous closure.
pub fn handler_fn<F>(f: F) -> SyncHandler<F>
where
    F: Fn(ApiCall) -> HandlerResult + Send + Sync,
{
    SyncHandler(f)
}

pub struct AsyncHandler<F>(F);

#[async_trait]
impl<F, Fut> PluginHandler for AsyncHandler<F>
where
    F: Fn(ApiCall) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, api: ApiCall) -> HandlerResult {
        (self.0)(api).await
    }
}

/// Wraps a closure returning a future.
pub fn async_handler_fn<F, Fut>(f: F) -> AsyncHandler<F>
where
    F: Fn(ApiCall) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    AsyncHandler(f)
}

/// One-shot completion for callback-style handlers.
///
/// Dropping it without calling [`Completion::done`] fails the handler.
#[derive(Debug)]
pub struct Completion {
    respond_to: oneshot::Sender<HandlerResult>,
}

impl Completion {
    pub fn done(self, result: HandlerResult) {
        let _ = self.respond_to.send(result);
    }

    pub fn ok(self, value: Option<Value>) {
        self.done(Ok(value));
    }

    pub fn fail(self, error: impl Into<HandlerError>) {
        self.done(Err(error.into()));
    }
}

pub struct CallbackHandler<F>(F);

#[async_trait]
impl<F> PluginHandler for CallbackHandler<F>
where
    F: Fn(ApiCall, Completion) + Send + Sync,
{
    async fn call(&self, api: ApiCall) -> HandlerResult {
        let (respond_to, response) = oneshot::channel();
        (self.0)(api, Completion { respond_to });
        response
            .await
            .map_err(|_| HandlerError::new("completion callback dropped without being called"))?
    }
}

/// Wraps a closure using the completion-callback style.
pub fn callback_handler_fn<F>(f: F) -> CallbackHandler<F>
where
    F: Fn(ApiCall, Completion) + Send + Sync,
{
    CallbackHandler(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> SyncHandler<impl Fn(ApiCall) -> HandlerResult + Send + Sync> {
        handler_fn(|_| Ok(None))
    }

    #[test]
    fn test_identity_display() {
        let id = PluginIdentity::new("gatsby-source-filesystem", "2.0.1");
        assert_eq!(id.to_string(), "gatsby-source-filesystem@2.0.1");
    }

    #[test]
    fn test_implementing_keeps_order_and_excludes_source() {
        let registry = PluginRegistry::new(vec![
            Plugin::new("a", "1.0.0").on("X", noop()),
            Plugin::new("b", "1.0.0").on("X", noop()).on("Y", noop()),
            Plugin::new("c", "1.0.0").on("X", noop()),
            Plugin::new("d", "1.0.0").on("Y", noop()),
        ]);

        let names = |plugins: Vec<Plugin>| {
            plugins
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(registry.implementing("X", None)), ["a", "b", "c"]);
        assert_eq!(names(registry.implementing("X", Some("b"))), ["a", "c"]);
        assert_eq!(names(registry.implementing("Y", Some("a"))), ["b", "d"]);
        assert!(registry.implementing("Z", None).is_empty());
    }

    #[test]
    fn test_plugin_options_default_to_empty_object() {
        let plugin = Plugin::new("a", "1.0.0");
        assert_eq!(plugin.options, json!({}));
        let plugin = plugin.with_options(json!({ "path": "src/pages" }));
        assert_eq!(plugin.options["path"], "src/pages");
    }
}
