//! The error taxonomy shared by every subsystem.
//!
//! Each variant mirrors a row of the error-kind table in the design: callers
//! match on these to decide whether a failure is fatal to the whole run,
//! demoted to a warning, or simply counted against a task's retry budget.

use std::path::PathBuf;

use thiserror::Error;

/// Sub-kinds of a semantically invalid config, split out so handlers can
/// match on the precise validation rule that failed.
#[derive(Debug, Error)]
pub enum InvalidConfigKind {
    #[error("task has an empty 'cmd'")]
    EmptyCmd,
    #[error("task name '{0}' does not match [A-Za-z0-9_-]+")]
    BadName(String),
    #[error("invalid duration string '{0}'")]
    BadDuration(String),
    #[error("unknown task '{0}'")]
    UnknownTask(String),
    #[error("matrix dimension '{0}' has no values")]
    BadMatrix(String),
    #[error("malformed condition expression: {0}")]
    BadCondition(String),
}

#[derive(Debug, Error)]
pub enum ZrError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] InvalidConfigKind),

    #[error("alias cycle or depth limit exceeded resolving '{name}'")]
    CyclicAlias { name: String },

    #[error("dependency cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("no source-control repository found")]
    NoRepo,

    #[error("unsupported --format value '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid --jobs value '{0}'")]
    InvalidJobs(String),

    #[error("task '{name}' failed after {attempts} attempt(s)")]
    TaskFailed { name: String, attempts: u32 },

    #[error("task '{name}' timed out after {timeout_ms}ms")]
    TaskTimeout { name: String, timeout_ms: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("no configuration file found searching upward from {0}")]
    ConfigNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ZrError>;
