//! # Action Binder
//!
//! Binds the creators available to one event to a plugin and its trace
//! context, so every action the plugin dispatches is attributed without the
//! plugin passing its identity around.
//!
//! Bound sets are cached per `(plugin, event, trace id)`. The cache is scoped
//! to open dispatch calls: each call holds a [`BindingScope`] for its
//! `(event, trace id)` and the entries of that scope are evicted when the last
//! such call finishes.

use crate::action::{Action, ActionContext, ActionCreator, ActionCreators, ActionSink};
use crate::error::RunnerError;
use crate::plugin::PluginIdentity;
use crate::reporter::{Report, ReportKind, Reporter, Severity};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindKey {
    pub plugin: PluginIdentity,
    pub event: String,
    pub trace_id: Option<String>,
}

type ScopeKey = (String, Option<String>);

#[derive(Default)]
struct BinderState {
    cache: HashMap<BindKey, Arc<BoundActions>>,
    scopes: HashMap<ScopeKey, usize>,
}

#[derive(Clone)]
pub struct ActionBinder {
    sink: Arc<dyn ActionSink>,
    state: Arc<Mutex<BinderState>>,
}

impl ActionBinder {
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self {
            sink,
            state: Arc::new(Mutex::new(BinderState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, BinderState> {
        // The maps stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks one dispatch call for `(event, trace_id)` as open.
    pub fn enter_scope(&self, event: &str, trace_id: Option<&str>) -> BindingScope {
        let key = (event.to_string(), trace_id.map(str::to_string));
        *self.state().scopes.entry(key.clone()).or_insert(0) += 1;
        BindingScope {
            binder: self.clone(),
            key,
        }
    }

    fn leave_scope(&self, key: &ScopeKey) {
        let mut state = self.state();
        let Some(open) = state.scopes.get_mut(key) else {
            return;
        };
        *open = open.saturating_sub(1);
        if *open > 0 {
            return;
        }
        state.scopes.remove(key);
        let before = state.cache.len();
        state
            .cache
            .retain(|bind, _| bind.event != key.0 || bind.trace_id != key.1);
        debug!(
            api = %key.0,
            trace_id = ?key.1,
            evicted = before - state.cache.len(),
            "Binding scope closed"
        );
    }

    /// Returns the bound set for `plugin` during `event`, building it with
    /// `make_creators` on first use.
    ///
    /// Outside of an open scope the set is built fresh and not cached.
    pub fn bind(
        &self,
        event: &str,
        plugin: &PluginIdentity,
        context: ActionContext,
        make_creators: impl FnOnce() -> ActionCreators,
    ) -> Arc<BoundActions> {
        let key = BindKey {
            plugin: plugin.clone(),
            event: event.to_string(),
            trace_id: context.trace_id.clone(),
        };
        let scoped = (key.event.clone(), key.trace_id.clone());

        let mut state = self.state();
        if let Some(bound) = state.cache.get(&key) {
            return Arc::clone(bound);
        }
        let bound = Arc::new(BoundActions {
            plugin: plugin.clone(),
            context,
            creators: make_creators(),
            sink: Arc::clone(&self.sink),
        });
        if state.scopes.contains_key(&scoped) {
            state.cache.insert(key, Arc::clone(&bound));
        }
        bound
    }

    pub fn cached(&self) -> usize {
        self.state().cache.len()
    }
}

impl std::fmt::Debug for ActionBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBinder")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

/// RAII guard for one open dispatch call's binding scope.
pub struct BindingScope {
    binder: ActionBinder,
    key: ScopeKey,
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.binder.leave_scope(&self.key);
    }
}

/// Creators bound to one plugin and context. Never mutated after creation.
pub struct BoundActions {
    plugin: PluginIdentity,
    context: ActionContext,
    creators: ActionCreators,
    sink: Arc<dyn ActionSink>,
}

impl BoundActions {
    pub fn plugin(&self) -> &PluginIdentity {
        &self.plugin
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    pub fn get<'a>(&'a self, name: &'a str) -> Option<ScopedAction<'a>> {
        self.creators.get(name).map(|creator| ScopedAction {
            name,
            creator,
            bound: self,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.names()
    }

    fn send(&self, name: &str, action: Option<Action>) -> bool {
        match action {
            Some(action) => {
                debug!(
                    action = name,
                    kind = %action.kind,
                    plugin = %self.plugin,
                    "Dispatch action"
                );
                self.sink.dispatch(action);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for BoundActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundActions")
            .field("plugin", &self.plugin)
            .field("trace_id", &self.context.trace_id)
            .field("creators", &self.creators.names().collect::<Vec<_>>())
            .finish()
    }
}

/// One creator of a bound set.
pub struct ScopedAction<'a> {
    name: &'a str,
    creator: &'a ActionCreator,
    bound: &'a BoundActions,
}

impl ScopedAction<'_> {
    /// Dispatches `payload` attributed to the bound plugin. Returns whether an
    /// action reached the sink.
    pub fn call(&self, payload: Value) -> bool {
        self.call_as(payload, &self.bound.plugin)
    }

    /// Dispatches `payload` attributed to `plugin` instead of the bound one.
    pub fn call_as(&self, payload: Value, plugin: &PluginIdentity) -> bool {
        let action = self.creator.create(payload, plugin, &self.bound.context);
        self.bound.send(self.name, action)
    }
}

/// Warns once when the guarded action fires after the handler finished.
struct LateCallGuard {
    action: String,
    event: String,
    plugin: PluginIdentity,
    reporter: Arc<dyn Reporter>,
    finished: AtomicBool,
    warned: AtomicBool,
}

impl LateCallGuard {
    fn check(&self, name: &str) {
        if name != self.action || !self.finished.load(Ordering::SeqCst) {
            return;
        }
        if self.warned.swap(true, Ordering::SeqCst) {
            return;
        }
        let message = format!(
            "Action `{}` was called outside of its expected asynchronous lifecycle `{}` in {}.\n\
             Ensure that you return a Promise from `{}` and are awaiting any asynchronous method invocations (like `graphql` or http requests).",
            self.action, self.event, self.plugin.name, self.event
        );
        self.reporter.report(
            Report::new(ReportKind::LateActionCall, Severity::Warning, message)
                .with_plugin(&self.plugin)
                .with_event(self.event.clone()),
        );
    }
}

/// The actions handed to one handler invocation.
///
/// Wraps the cached bound set; the late-call guard belongs to this invocation
/// only and never leaks into the cache.
#[derive(Clone)]
pub struct Actions {
    bound: Arc<BoundActions>,
    guard: Option<Arc<LateCallGuard>>,
}

impl Actions {
    pub fn new(bound: Arc<BoundActions>) -> Self {
        Self { bound, guard: None }
    }

    /// Guards `action` for this invocation of `event`.
    pub fn with_late_call_guard(
        mut self,
        event: &str,
        action: &str,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        self.guard = Some(Arc::new(LateCallGuard {
            action: action.to_string(),
            event: event.to_string(),
            plugin: self.bound.plugin.clone(),
            reporter,
            finished: AtomicBool::new(false),
            warned: AtomicBool::new(false),
        }));
        self
    }

    /// Marks the handler's portion of the call as settled.
    pub fn finish(&self) {
        if let Some(guard) = &self.guard {
            guard.finished.store(true, Ordering::SeqCst);
        }
    }

    pub fn bound(&self) -> &Arc<BoundActions> {
        &self.bound
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bound.get(name).is_some()
    }

    /// Calls the named action for the bound plugin.
    pub fn invoke(&self, name: &str, payload: Value) -> Result<bool, RunnerError> {
        let action = self
            .bound
            .get(name)
            .ok_or_else(|| RunnerError::UnknownAction(name.to_string()))?;
        let dispatched = action.call(payload);
        if let Some(guard) = &self.guard {
            guard.check(name);
        }
        Ok(dispatched)
    }

    /// Calls the named action attributed to `plugin`.
    pub fn invoke_as(
        &self,
        name: &str,
        payload: Value,
        plugin: &PluginIdentity,
    ) -> Result<bool, RunnerError> {
        let action = self
            .bound
            .get(name)
            .ok_or_else(|| RunnerError::UnknownAction(name.to_string()))?;
        let dispatched = action.call_as(payload, plugin);
        if let Some(guard) = &self.guard {
            guard.check(name);
        }
        Ok(dispatched)
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("bound", &self.bound)
            .field("guarded", &self.guard.as_ref().map(|g| g.action.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingReporter, RecordingSink};
    use serde_json::json;

    fn creators() -> ActionCreators {
        ActionCreators::new()
            .with("createPage", ActionCreator::simple("CREATE_PAGE"))
            .with("noop", ActionCreator::new(|_, _, _| None))
    }

    fn ctx(trace_id: &str) -> ActionContext {
        ActionContext {
            trace_id: Some(trace_id.into()),
            span: None,
        }
    }

    #[test]
    fn test_call_attributes_bound_plugin_and_call_as_overrides() {
        let sink = Arc::new(RecordingSink::default());
        let binder = ActionBinder::new(sink.clone());
        let plugin = PluginIdentity::new("a", "1.0.0");
        let other = PluginIdentity::new("b", "2.0.0");

        let bound = binder.bind("createPages", &plugin, ctx("t1"), creators);
        assert!(bound.get("createPage").unwrap().call(json!({ "path": "/" })));
        assert!(bound
            .get("createPage")
            .unwrap()
            .call_as(json!({ "path": "/b/" }), &other));
        assert!(!bound.get("noop").unwrap().call(json!(null)));

        let actions = sink.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].plugin.as_ref(), Some(&plugin));
        assert_eq!(actions[1].plugin.as_ref(), Some(&other));
        assert!(actions.iter().all(|a| a.trace_id.as_deref() == Some("t1")));
    }

    #[test]
    fn test_cache_is_scoped_to_open_calls() {
        let binder = ActionBinder::new(Arc::new(RecordingSink::default()));
        let plugin = PluginIdentity::new("a", "1.0.0");

        let outer = binder.enter_scope("onCreateNode", Some("t1"));
        let inner = binder.enter_scope("onCreateNode", Some("t1"));
        let first = binder.bind("onCreateNode", &plugin, ctx("t1"), creators);
        let mut built = false;
        let second = binder.bind("onCreateNode", &plugin, ctx("t1"), || {
            built = true;
            creators()
        });
        assert!(!built);
        assert!(Arc::ptr_eq(&first, &second));

        let other_trace = binder.bind("onCreateNode", &plugin, ctx("t2"), creators);
        assert!(!Arc::ptr_eq(&first, &other_trace));
        assert_eq!(binder.cached(), 1);

        drop(outer);
        assert_eq!(binder.cached(), 1);
        drop(inner);
        assert_eq!(binder.cached(), 0);
    }

    #[test]
    fn test_unknown_action_is_error() {
        let binder = ActionBinder::new(Arc::new(RecordingSink::default()));
        let actions = Actions::new(binder.bind(
            "createPages",
            &PluginIdentity::new("a", "1.0.0"),
            ctx("t1"),
            creators,
        ));
        let err = actions.invoke("deleteEverything", json!({})).unwrap_err();
        assert!(matches!(err, RunnerError::UnknownAction(name) if name == "deleteEverything"));
    }

    #[test]
    fn test_late_call_warns_once_and_still_dispatches() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = Arc::new(RecordingReporter::default());
        let binder = ActionBinder::new(sink.clone());
        let plugin = PluginIdentity::new("gatsby-plugin-late", "1.0.0");
        let actions = Actions::new(binder.bind("createPages", &plugin, ctx("t1"), creators))
            .with_late_call_guard("createPages", "createPage", reporter.clone());

        actions.invoke("createPage", json!({ "path": "/on-time/" })).unwrap();
        assert!(reporter.reports().is_empty());

        actions.finish();
        actions.invoke("createPage", json!({ "path": "/late-1/" })).unwrap();
        actions.invoke("createPage", json!({ "path": "/late-2/" })).unwrap();

        assert_eq!(sink.actions().len(), 3);
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::LateActionCall);
        assert!(reports[0].message.contains("gatsby-plugin-late"));
    }
}
