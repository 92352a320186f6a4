//! Error types for purser-core

use thiserror::Error;

/// Main error type for the purser-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Scheduler lifecycle error
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Result type alias for purser-core
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failure, recorded as `error_type` on performance samples.
pub trait ErrorClass {
    fn error_class(&self) -> String;
}

impl ErrorClass for Error {
    fn error_class(&self) -> String {
        match self {
            Error::Database(_) => "DatabaseError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Config(_) => "ConfigError",
            Error::Scheduler(_) => "SchedulerError",
        }
        .to_string()
    }
}

impl ErrorClass for std::io::Error {
    fn error_class(&self) -> String {
        format!("IoError:{:?}", self.kind())
    }
}

impl ErrorClass for String {
    fn error_class(&self) -> String {
        "Error".to_string()
    }
}

impl ErrorClass for &str {
    fn error_class(&self) -> String {
        "Error".to_string()
    }
}
