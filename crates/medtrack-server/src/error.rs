//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] medtrack_feed::FeedError),

    #[error("Registry error: {0}")]
    Registry(#[from] medtrack_registry::RegistryError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] medtrack_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] medtrack_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Shutdown did not complete within {grace_secs}s")]
    ShutdownTimeout { grace_secs: u64 },
}

pub type AppResult<T> = Result<T, AppError>;
