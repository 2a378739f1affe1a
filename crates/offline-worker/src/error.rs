//! Error types for the offline worker

use crate::types::WorkerState;
use std::fmt;

#[derive(Debug)]
pub enum WorkerError {
    Http(Box<reqwest::Error>),
    Network(String),
    Cache(shell_cache::CacheError),
    CacheMiss(String),
    Config(String),
    Io(Box<std::io::Error>),
    InvalidState {
        expected: &'static str,
        actual: WorkerState,
    },
    Client(String),
    Notification(String),
    Shutdown,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Http(err) => write!(f, "HTTP error: {}", err),
            WorkerError::Network(msg) => write!(f, "Network error: {}", msg),
            WorkerError::Cache(err) => write!(f, "Cache error: {}", err),
            WorkerError::CacheMiss(url) => write!(f, "No cached response for {}", url),
            WorkerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            WorkerError::Io(err) => write!(f, "IO error: {}", err),
            WorkerError::InvalidState { expected, actual } => write!(
                f,
                "Invalid worker state: expected {}, got {}",
                expected, actual
            ),
            WorkerError::Client(msg) => write!(f, "Client error: {}", msg),
            WorkerError::Notification(msg) => write!(f, "Notification error: {}", msg),
            WorkerError::Shutdown => write!(f, "Worker is shut down"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Http(err) => Some(err.as_ref()),
            WorkerError::Cache(err) => Some(err),
            WorkerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        WorkerError::Http(Box::new(err))
    }
}

impl From<shell_cache::CacheError> for WorkerError {
    fn from(err: shell_cache::CacheError) -> Self {
        WorkerError::Cache(err)
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::Io(Box::new(err))
    }
}

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        WorkerError::Config(format!("invalid URL: {}", err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for WorkerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        WorkerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
