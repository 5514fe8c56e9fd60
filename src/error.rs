//! Error taxonomy for the tuning engine.
//!
//! `BackendError` mirrors the closed set of retryable failures a `Backend`
//! may signal (spec.md §4.1, §7). Every variant is treated identically by
//! the core: retried up to `max_retries` times, never fatal to the run.
//! `ConfigError` is a separate, non-retryable class raised only while
//! loading a `TuningConfig` at CLI startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("can't launch job on backend: {0}")]
    Launch(String),
    #[error("can't get job status: {0}")]
    Status(String),
    #[error("can't retrieve job logs: {0}")]
    LogRetrieval(String),
    #[error("can't kill job: {0}")]
    Kill(String),
    #[error("can't determine worker availability: {0}")]
    WorkerAvailability(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown plugin tag: {0}")]
    UnknownPlugin(String),
    #[error("invalid parameter spec for \"{name}\": {reason}")]
    InvalidParameterSpec { name: String, reason: String },
    #[error("invalid constraint spec: {0}")]
    InvalidConstraintSpec(String),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}
