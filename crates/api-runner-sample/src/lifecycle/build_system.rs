use crate::actions::{public_actions, restricted_actions};
use crate::catalog::node_api_catalog;
use crate::error::BuildError;
use crate::store::BuildStore;
use api_runner::{
    ApiRunner, InvocationArgs, Plugin, PluginRegistry, PluginResult, Reporter, RunTracker,
    RunnerConfig, TracingReporter,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

/// Events that run once, without a trace, before and after the main steps.
const PRE_STEPS: [&str; 2] = ["onPreInit", "onPreBootstrap"];

/// Events whose whole cascade must settle before the next one starts.
const TRACED_STEPS: [&str; 4] = [
    "sourceNodes",
    "createSchemaCustomization",
    "createPages",
    "createPagesStatefully",
];

/// Results of one bootstrap step.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub event: String,
    pub results: Vec<PluginResult>,
}

#[derive(Debug, Clone, Default)]
pub struct BootstrapSummary {
    pub steps: Vec<StepSummary>,
}

impl BootstrapSummary {
    pub fn step(&self, event: &str) -> Option<&StepSummary> {
        self.steps.iter().find(|step| step.event == event)
    }
}

/// Owns the tracker task, the runner and the store of one build.
///
/// ```ignore
/// let store = Arc::new(BuildStore::default());
/// let system = BuildSystem::new(store.clone(), default_plugins(&store, demo_files()));
/// system.bootstrap().await?;
/// system.shutdown().await?;
/// ```
pub struct BuildSystem {
    pub runner: ApiRunner,
    pub store: Arc<BuildStore>,
    tracker: JoinHandle<()>,
}

impl BuildSystem {
    pub fn new(store: Arc<BuildStore>, plugins: Vec<Plugin>) -> Self {
        Self::with_reporter(store, plugins, Arc::new(TracingReporter), RunnerConfig::default())
    }

    /// Spawns the tracker, builds the runner around `store` and attaches it.
    pub fn with_reporter(
        store: Arc<BuildStore>,
        plugins: Vec<Plugin>,
        reporter: Arc<dyn Reporter>,
        config: RunnerConfig,
    ) -> Self {
        let (tracker, tracker_client) = RunTracker::new();
        let tracker = tokio::spawn(tracker.run());

        let catalog = node_api_catalog();
        let runner = ApiRunner::builder(
            PluginRegistry::new(plugins),
            catalog.clone(),
            tracker_client,
            store.clone(),
        )
        .restrictions(restricted_actions(catalog, &store, &reporter))
        .public_actions(public_actions(&reporter))
        .signals(store.signals().clone())
        .reporter(reporter)
        .config(config)
        .build();
        store.attach_runner(runner.clone());

        Self {
            runner,
            store,
            tracker,
        }
    }

    /// Runs the bootstrap events in order.
    ///
    /// Each traced step waits for its cascade, so nodes created while sourcing
    /// are transformed before the schema step and pages created by
    /// `createPages` have run `onCreatePage` before bootstrap moves on.
    pub async fn bootstrap(&self) -> Result<BootstrapSummary, BuildError> {
        async {
            let mut summary = BootstrapSummary::default();

            for event in PRE_STEPS {
                let results = self.runner.dispatch(event, InvocationArgs::new(), None).await?;
                summary.steps.push(StepSummary {
                    event: event.to_string(),
                    results,
                });
            }

            for event in TRACED_STEPS {
                let args = InvocationArgs::new()
                    .with_trace_id(format!("initial-{event}"))
                    .wait_for_cascading_actions();
                let results = self.runner.dispatch(event, args, None).await?;
                info!(api = event, results = results.len(), "Step settled");
                summary.steps.push(StepSummary {
                    event: event.to_string(),
                    results,
                });
            }

            let results = self
                .runner
                .dispatch("onPostBootstrap", InvocationArgs::new(), None)
                .await?;
            summary.steps.push(StepSummary {
                event: "onPostBootstrap".into(),
                results,
            });

            self.runner.idle_probe().await?;
            self.runner.wait_idle().await?;
            info!(pages = self.store.pages().len(), "Bootstrap finished");
            Ok(summary)
        }
        .instrument(info_span!("bootstrap"))
        .await
    }

    /// Detaches the runner from the store, drops it and waits for the
    /// tracker to drain its queue.
    pub async fn shutdown(self) -> Result<(), BuildError> {
        info!("Shutting down build system...");
        self.store.detach_runner();
        drop(self.runner);
        self.tracker.await?;
        info!("Build system shutdown complete.");
        Ok(())
    }
}
