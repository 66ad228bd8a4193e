use api_runner::RunnerError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Lifecycle dispatch failed: {0}")]
    Runner(#[from] RunnerError),
    #[error("Run tracker task failed: {0}")]
    Tracker(#[from] tokio::task::JoinError),
}
