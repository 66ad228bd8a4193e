//! # Logging Setup
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter driven
//! by `RUST_LOG`.
//!
//! ```bash
//! RUST_LOG=info cargo run -p api-runner-sample
//! RUST_LOG=api_runner=debug cargo run -p api-runner-sample
//! ```
//!
//! Dispatch logs carry `api`, `run_id` and `trace_id` fields and nest under
//! the `run-api` / `run-plugin` spans, so one bootstrap reads like:
//!
//! ```text
//! INFO run-api: Running run_id=onPreInit|2024-05-01T09:12:44.120Z||{} plugins=2
//! INFO run-api:run-plugin: Created page path="/" plugin=site
//! INFO Closed run_id=onPreInit|... trace_id=- state=Completed remaining=0 open=0
//! INFO Run queue empty
//! ```

/// Installs the global subscriber. Call once, at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
