//! # API Runner Sample
//!
//! Bootstraps a tiny blog through the lifecycle engine:
//!
//! 1. Builds the [`BuildSystem`] with the default plugins.
//! 2. Runs the bootstrap sequence.
//! 3. Logs the resulting pages and shuts down.
//!
//! ```bash
//! RUST_LOG=info cargo run -p api-runner-sample
//! ```

use api_runner::tracing::setup_tracing;
use api_runner_sample::error::BuildError;
use api_runner_sample::lifecycle::BuildSystem;
use api_runner_sample::plugins::{default_plugins, demo_files};
use api_runner_sample::store::BuildStore;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), BuildError> {
    setup_tracing();

    info!("Starting sample build");
    let store = Arc::new(BuildStore::default());
    let system = BuildSystem::new(store.clone(), default_plugins(&store, demo_files()));

    match system.bootstrap().await {
        Ok(summary) => {
            for step in &summary.steps {
                info!(api = %step.event, results = step.results.len(), "Step");
            }
            for page in store.pages() {
                info!(
                    path = %page.path,
                    component = %page.component,
                    plugin = ?page.plugin_creator,
                    "Page"
                );
            }
        }
        Err(e) => error!(error = %e, "Bootstrap failed"),
    }

    system.shutdown().await?;
    info!("Sample build completed");
    Ok(())
}
