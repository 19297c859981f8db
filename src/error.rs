//! Error taxonomy for daemon lifecycle operations
//!
//! Every failure is returned to the immediate caller. Nothing here is retried
//! or swallowed, with the single exception of `rcctl check` whose non-zero exit
//! is a normal "not running" answer (handled in the rc-script backend).

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = DaemonError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// The host OS has no backend
    #[error("unsupported os: {0}")]
    UnsupportedPlatform(String),

    /// The run-as user could not be resolved
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The working directory is missing or not a directory
    #[error("not directory: {}", .0.display())]
    NotDirectory(PathBuf),

    /// Filesystem failure while writing or removing artifacts
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// External utility could not be started
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    /// External utility exited non-zero
    #[error("{program}: {message}")]
    CommandFailed { program: String, message: String },

    /// External utility output did not have the expected shape
    #[error("unexpected {program} output: {detail}")]
    UnexpectedOutput { program: String, detail: String },

    /// Settings file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),
}

impl DaemonError {
    /// Wrap an I/O error with a short description of the failed step
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn unexpected(program: &str, detail: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            program: program.to_string(),
            detail: detail.into(),
        }
    }
}

/// Attach step context to `std::io::Result` values, mirroring `anyhow::Context`
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| DaemonError::io(f(), e))
    }
}
