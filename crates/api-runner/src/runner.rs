//! # Event Dispatcher
//!
//! [`ApiRunner`] runs one lifecycle event across every plugin implementing it.
//!
//! ## Dispatch in two phases
//!
//! [`ApiRunner::dispatch`] does its bookkeeping *before* returning:
//!
//! 1. the event is validated against the catalogue,
//! 2. the `run-api` span and the run record are created,
//! 3. the run is enqueued with the tracker,
//! 4. the removal watch (if configured for the event) is registered.
//!
//! The plugin loop only runs once the returned future is polled. A handler
//! that starts a nested dispatch and does not await it therefore still has
//! that run counted against the trace before its own run closes, which is
//! what cascading-wait callers rely on.
//!
//! ## Plugin loop
//!
//! Plugins run strictly one after another in registration order, minus the
//! plugin the call originated from. A handler error or panic is reported and
//! the loop moves on. The run is always closed, also when the future is
//! dropped half-way through.

use crate::action::{ActionContext, ActionCreators, ActionSink};
use crate::args::InvocationArgs;
use crate::binder::{ActionBinder, Actions, BindingScope};
use crate::client::RunTrackerClient;
use crate::config::RunnerConfig;
use crate::context::ApiCall;
use crate::error::RunnerError;
use crate::event::{EventCatalog, IDLE_PROBE_EVENT};
use crate::plugin::{Plugin, PluginRegistry};
use crate::reporter::{
    Report, ReportKind, Reporter, Severity, TracingReporter, PLUGIN_HANDLER_ERROR_ID,
};
use crate::restriction::ActionRestrictions;
use crate::run::{is_empty_result, PluginResult, RunId, RunOutcome, RunRecord};
use crate::signal::{RemovalWatch, SignalBus};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

struct Inner {
    registry: PluginRegistry,
    catalog: EventCatalog,
    restrictions: ActionRestrictions,
    public: ActionCreators,
    binder: ActionBinder,
    reporter: Arc<dyn Reporter>,
    tracker: RunTrackerClient,
    signals: SignalBus,
    config: RunnerConfig,
}

/// The lifecycle event dispatcher. Cheap to clone; every handler gets one.
#[derive(Clone)]
pub struct ApiRunner {
    inner: Arc<Inner>,
}

pub struct ApiRunnerBuilder {
    registry: PluginRegistry,
    catalog: EventCatalog,
    tracker: RunTrackerClient,
    sink: Arc<dyn ActionSink>,
    restrictions: Option<ActionRestrictions>,
    public: ActionCreators,
    reporter: Arc<dyn Reporter>,
    signals: SignalBus,
    config: RunnerConfig,
}

impl ApiRunnerBuilder {
    /// Restricted creators. Defaults to an empty table over the catalogue.
    pub fn restrictions(mut self, restrictions: ActionRestrictions) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    /// Creators available during every event.
    pub fn public_actions(mut self, public: ActionCreators) -> Self {
        self.public = public;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn signals(mut self, signals: SignalBus) -> Self {
        self.signals = signals;
        self
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ApiRunner {
        let restrictions = self
            .restrictions
            .unwrap_or_else(|| ActionRestrictions::new(self.catalog.clone()));
        ApiRunner {
            inner: Arc::new(Inner {
                registry: self.registry,
                catalog: self.catalog,
                restrictions,
                public: self.public,
                binder: ActionBinder::new(self.sink),
                reporter: self.reporter,
                tracker: self.tracker,
                signals: self.signals,
                config: self.config,
            }),
        }
    }
}

/// Everything the synchronous phase of a dispatch hands to the plugin loop.
struct PreparedRun {
    event: String,
    args: InvocationArgs,
    implementers: Vec<Plugin>,
    span: Span,
    run: OpenRun,
    _scope: BindingScope,
    removal: Option<RemovalWatch>,
}

impl ApiRunner {
    pub fn builder(
        registry: PluginRegistry,
        catalog: EventCatalog,
        tracker: RunTrackerClient,
        sink: Arc<dyn ActionSink>,
    ) -> ApiRunnerBuilder {
        ApiRunnerBuilder {
            registry,
            catalog,
            tracker,
            sink,
            restrictions: None,
            public: ActionCreators::new(),
            reporter: Arc::new(TracingReporter),
            signals: SignalBus::default(),
            config: RunnerConfig::default(),
        }
    }

    /// Runs `event` across its implementing plugins.
    ///
    /// Resolves with the non-empty results in plugin order. With
    /// `args.wait_for_cascading_actions` it resolves only once every run
    /// sharing the trace id has closed.
    ///
    /// An event outside the catalogue is reported as a configuration error and
    /// the returned future fails with [`RunnerError::UnknownEvent`].
    pub fn dispatch(
        &self,
        event: &str,
        args: InvocationArgs,
        plugin_source: Option<&str>,
    ) -> impl Future<Output = Result<Vec<PluginResult>, RunnerError>> + Send + 'static {
        let prepared = self.prepare(event, args, plugin_source);
        let runner = self.clone();
        async move {
            let prepared = prepared?;
            let span = prepared.span.clone();
            runner.execute(prepared).instrument(span).await
        }
    }

    /// Dispatches the idle sentinel. No plugin implements it, so the run only
    /// opens and closes, which publishes "queue empty" once nothing else is
    /// in flight.
    pub fn idle_probe(
        &self,
    ) -> impl Future<Output = Result<Vec<PluginResult>, RunnerError>> + Send + 'static {
        self.dispatch(IDLE_PROBE_EVENT, InvocationArgs::new(), None)
    }

    pub fn wait_for_quiescence(
        &self,
        trace_id: Option<&str>,
    ) -> impl Future<Output = Result<(), RunnerError>> + Send + 'static {
        self.inner.tracker.wait_for_quiescence(trace_id)
    }

    pub async fn wait_idle(&self) -> Result<(), RunnerError> {
        self.inner.tracker.wait_idle().await
    }

    pub fn tracker(&self) -> &RunTrackerClient {
        &self.inner.tracker
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.inner.registry
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.inner.catalog
    }

    pub fn restrictions(&self) -> &ActionRestrictions {
        &self.inner.restrictions
    }

    pub fn signals(&self) -> &SignalBus {
        &self.inner.signals
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.inner.reporter
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    fn prepare(
        &self,
        event: &str,
        args: InvocationArgs,
        plugin_source: Option<&str>,
    ) -> Result<PreparedRun, RunnerError> {
        let inner = &self.inner;
        if !inner.catalog.accepts(event) {
            let err = RunnerError::UnknownEvent(event.to_string());
            inner.reporter.report(
                Report::new(ReportKind::ConfigurationError, Severity::Panic, err.to_string())
                    .with_event(event),
            );
            return Err(err);
        }

        let span = match &args.parent_span {
            Some(parent) => info_span!(
                parent: parent,
                "run-api",
                api = %event,
                trace_id = field::Empty,
                trace_tags = field::Empty
            ),
            None => info_span!(
                "run-api",
                api = %event,
                trace_id = field::Empty,
                trace_tags = field::Empty
            ),
        };
        if let Some(trace_id) = &args.trace_id {
            span.record("trace_id", trace_id.as_str());
        }
        if !args.trace_tags.is_empty() {
            span.record("trace_tags", field::debug(&args.trace_tags));
        }

        let implementers = inner.registry.implementing(event, plugin_source);
        let record = RunRecord::new(event, &args, plugin_source, span.clone(), &inner.config);
        debug!(run_id = %record.id, payload = %args.payload_json(), ?plugin_source, "Prepared run");
        let run = OpenRun::new(inner.tracker.clone(), inner.tracker.open(record));
        let scope = inner.binder.enter_scope(event, args.trace_id.as_deref());

        let removal = inner
            .config
            .removal_watch
            .as_ref()
            .filter(|watch| watch.event == event)
            .and_then(|watch| args.pointer(&watch.path_pointer))
            .and_then(Value::as_str)
            .map(|path| inner.signals.watch_removal(path));

        Ok(PreparedRun {
            event: event.to_string(),
            args,
            implementers,
            span,
            run,
            _scope: scope,
            removal,
        })
    }

    async fn execute(&self, prepared: PreparedRun) -> Result<Vec<PluginResult>, RunnerError> {
        let PreparedRun {
            event,
            args,
            implementers,
            span,
            mut run,
            _scope: scope,
            removal,
        } = prepared;

        let id = run.opened().await?;
        info!(run_id = %id, plugins = implementers.len(), "Running");

        let mut results = Vec::new();
        let mut outcome = RunOutcome::Completed;
        for (position, plugin) in implementers.iter().enumerate() {
            if removal.as_ref().is_some_and(RemovalWatch::removed) {
                info!(
                    run_id = %id,
                    path = removal.as_ref().map(RemovalWatch::path),
                    skipped = implementers.len() - position,
                    "Entity removed, skipping queued plugins"
                );
                outcome = RunOutcome::Cancelled;
                break;
            }
            if let Some(value) = self.invoke(plugin, &event, &args, &span).await {
                results.push(PluginResult {
                    plugin: plugin.identity.clone(),
                    value,
                });
            }
        }
        drop(removal);
        drop(scope);

        let record = run
            .close(outcome, results, args.wait_for_cascading_actions)
            .await?;
        debug!(run_id = %record.id, results = record.results.len(), "Resolved");
        Ok(record.results)
    }

    /// Runs one plugin's handler. Returns its result when non-empty.
    async fn invoke(
        &self,
        plugin: &Plugin,
        event: &str,
        args: &InvocationArgs,
        api_span: &Span,
    ) -> Option<Value> {
        let inner = &self.inner;
        let handler = plugin.handler(event)?;
        let span = info_span!(
            parent: api_span,
            "run-plugin",
            api = %event,
            plugin = %plugin.name()
        );

        let context = ActionContext {
            trace_id: args.trace_id.clone(),
            span: Some(span.clone()),
        };
        let bound = inner.binder.bind(event, &plugin.identity, context, || {
            inner
                .restrictions
                .available_in(event, &inner.public, &inner.reporter)
        });
        let mut actions = Actions::new(bound);
        if let Some(guard) = inner
            .config
            .late_call_guard
            .as_ref()
            .filter(|guard| guard.event == event)
        {
            actions =
                actions.with_late_call_guard(event, &guard.action, Arc::clone(&inner.reporter));
        }

        let call = ApiCall {
            event: event.to_string(),
            args: args.clone().with_parent_span(span.clone()),
            plugin: plugin.identity.clone(),
            options: plugin.options.clone(),
            actions: actions.clone(),
            runner: self.clone(),
            reporter: Arc::clone(&inner.reporter),
            span: span.clone(),
        };

        let settled = AssertUnwindSafe(handler.call(call).instrument(span.clone()))
            .catch_unwind()
            .await;
        actions.finish();

        match settled {
            Ok(Ok(Some(value))) if !is_empty_result(&value) => Some(value),
            Ok(Ok(_)) => None,
            Ok(Err(error)) => {
                self.report_failure(plugin, event, error.message(), &span);
                None
            }
            Err(panic) => {
                self.report_failure(plugin, event, &panic_message(&*panic), &span);
                None
            }
        }
    }

    fn report_failure(&self, plugin: &Plugin, event: &str, message: &str, span: &Span) {
        let name = self.inner.config.display_name(plugin.name());
        span.in_scope(|| warn!(plugin = %plugin.identity, "Handler failed"));
        let message =
            format!("\"{name}\" threw an error while running the {event} lifecycle:\n\n{message}");
        self.inner.reporter.report(
            Report::new(ReportKind::PluginHandlerError, Severity::Panic, message)
            .with_id(PLUGIN_HANDLER_ERROR_ID)
            .with_plugin(&plugin.identity)
            .with_event(event),
        );
    }
}

impl std::fmt::Debug for ApiRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRunner")
            .field("plugins", &self.inner.registry.plugins().len())
            .field("events", &self.inner.catalog.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

enum OpenState {
    /// Enqueued; the tracker has not assigned the final id yet.
    Pending(BoxFuture<'static, Result<RunId, RunnerError>>),
    Open(RunId),
    Closed,
}

/// Tracker side of one dispatch call.
///
/// Dropping it before [`OpenRun::close`] closes the run as cancelled so the
/// trace counter never leaks.
struct OpenRun {
    tracker: RunTrackerClient,
    state: OpenState,
}

impl OpenRun {
    fn new(
        tracker: RunTrackerClient,
        open: impl Future<Output = Result<RunId, RunnerError>> + Send + 'static,
    ) -> Self {
        Self {
            tracker,
            state: OpenState::Pending(open.boxed()),
        }
    }

    async fn opened(&mut self) -> Result<RunId, RunnerError> {
        if let OpenState::Pending(open) = &mut self.state {
            match open.await {
                Ok(id) => self.state = OpenState::Open(id),
                Err(err) => {
                    self.state = OpenState::Closed;
                    return Err(err);
                }
            }
        }
        match &self.state {
            OpenState::Open(id) => Ok(id.clone()),
            _ => Err(RunnerError::TrackerClosed),
        }
    }

    fn close(
        mut self,
        outcome: RunOutcome,
        results: Vec<PluginResult>,
        wait_for_cascade: bool,
    ) -> impl Future<Output = Result<RunRecord, RunnerError>> + Send + 'static {
        let closing = match std::mem::replace(&mut self.state, OpenState::Closed) {
            OpenState::Open(id) => Ok(self.tracker.close(id, outcome, results, wait_for_cascade)),
            _ => Err(RunnerError::TrackerClosed),
        };
        async move { closing?.await }
    }
}

impl Drop for OpenRun {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, OpenState::Closed) {
            OpenState::Closed => {}
            OpenState::Open(id) => {
                warn!(run_id = %id, "Dispatch dropped before completion");
                // Enqueued on call; the response is not needed.
                drop(self.tracker.close(id, RunOutcome::Cancelled, Vec::new(), false));
            }
            OpenState::Pending(mut open) => {
                let tracker = self.tracker.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        if let Ok(id) = open.await {
                            warn!(run_id = %id, "Dispatch dropped before it started");
                            let _ = tracker
                                .close(id, RunOutcome::Cancelled, Vec::new(), false)
                                .await;
                        }
                    });
                } else if let Some(Ok(id)) = (&mut open).now_or_never() {
                    warn!(run_id = %id, "Dispatch dropped before it started");
                    drop(tracker.close(id, RunOutcome::Cancelled, Vec::new(), false));
                } else {
                    // The tracker cancels a run whose open reply finds no receiver.
                    warn!("Dispatch dropped outside a runtime before its run was opened");
                }
            }
        }
    }
}
