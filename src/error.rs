use thiserror::Error;

/// Errors raised by the orchestration core.
///
/// Expected domain outcomes (a request matching no rule, a plugin reporting
/// a failed export or task) are modelled as result types on the operations
/// that produce them, never as variants here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
