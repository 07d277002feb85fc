//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Exchange info parse error: {0}")]
    ParseError(String),

    #[error("No symbols available: {0}")]
    NoSymbols(String),

    #[error(transparent)]
    Core(#[from] medtrack_core::CoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
