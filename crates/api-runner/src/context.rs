//! # Handler Context
//!
//! Everything a plugin handler receives for one invocation. `ApiCall` is
//! owned, so handlers can move it into spawned tasks or late closures.

use crate::args::InvocationArgs;
use crate::binder::Actions;
use crate::error::RunnerError;
use crate::plugin::PluginIdentity;
use crate::reporter::Reporter;
use crate::run::PluginResult;
use crate::runner::ApiRunner;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::Span;

#[derive(Clone)]
pub struct ApiCall {
    pub event: String,
    /// The call's args with `parent_span` set to this invocation's span.
    pub args: InvocationArgs,
    pub plugin: PluginIdentity,
    pub options: Value,
    pub actions: Actions,
    pub runner: ApiRunner,
    pub reporter: Arc<dyn Reporter>,
    /// The `run-plugin` span of this invocation.
    pub span: Span,
}

impl ApiCall {
    pub fn trace_id(&self) -> Option<&str> {
        self.args.trace_id.as_deref()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.args.field(key)
    }

    /// Dispatches another event on behalf of this plugin.
    ///
    /// The nested call inherits the trace id and is parented to this
    /// invocation's span. This plugin is excluded from the nested call's
    /// implementers. As with [`ApiRunner::dispatch`] the run is counted before
    /// this returns; spawn the future to fire and forget.
    pub fn dispatch_nested(
        &self,
        event: &str,
        args: InvocationArgs,
    ) -> impl Future<Output = Result<Vec<PluginResult>, RunnerError>> + Send + 'static {
        let mut args = args.with_parent_span(self.span.clone());
        if args.trace_id.is_none() {
            args.trace_id = self.args.trace_id.clone();
        }
        self.runner.dispatch(event, args, Some(&self.plugin.name))
    }
}

impl std::fmt::Debug for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCall")
            .field("event", &self.event)
            .field("plugin", &self.plugin)
            .field("trace_id", &self.args.trace_id)
            .finish_non_exhaustive()
    }
}
