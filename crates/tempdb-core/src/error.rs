//! Error types for the ephemeral database lifecycle.
//!
//! Each concern gets its own enum so adapters can report precise failures
//! while callers only ever see [`TempDbError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the service, registry and provider APIs.
#[derive(Debug, Error)]
pub enum TempDbError {
    /// No free port was found within the attempt budget.
    #[error("No unused port found after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// The external server process did not reach a running state.
    #[error("Database server failed to start: {0}")]
    StartupFailed(#[source] LaunchError),

    /// The database driver could not be loaded.
    #[error("Database driver unavailable: {0}")]
    DriverUnavailable(String),

    /// A second singleton construction was attempted.
    #[error("An embedded database instance is already registered for this process")]
    AlreadyInitialized,

    /// The caller invoked a capability the facade does not implement.
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// The service was stopped and cannot be started again.
    #[error("Database server has been stopped and cannot be restarted")]
    ServiceStopped,

    /// Opening a connection against the running server failed.
    #[error("Failed to open connection: {0}")]
    Connection(String),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by a [`crate::ports::ServerLauncher`].
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The server binary could not be located.
    #[error("Database server binary not found (searched: {searched})")]
    BinaryNotFound { searched: String },

    /// Initializing the data directory failed.
    #[error("Failed to initialize data directory {path}: {reason}")]
    InitFailed { path: PathBuf, reason: String },

    /// The server process could not be spawned.
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The server process exited before becoming ready.
    #[error("Server exited during startup ({status}): {log_tail}")]
    Exited { status: String, log_tail: String },

    /// The server did not become ready within the startup timeout.
    #[error("Server not ready on port {port} after {timeout_secs}s")]
    NotReady { port: u16, timeout_secs: u64 },

    /// The launcher returned but the server does not report itself as running.
    #[error("Server does not report itself as running")]
    NotRunning,

    /// A stop was requested while the server was starting.
    #[error("Startup aborted by a concurrent stop request")]
    Aborted,

    /// Creating the fixed database identity failed.
    #[error("Failed to bootstrap database identity: {0}")]
    Bootstrap(String),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by a [`crate::ports::DatabaseDriver`].
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver cannot be used in this process.
    #[error("{0}")]
    Unavailable(String),

    /// The driver is usable but the connection attempt failed.
    #[error("{0}")]
    Connect(String),
}

impl From<DriverError> for TempDbError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Unavailable(reason) => Self::DriverUnavailable(reason),
            DriverError::Connect(reason) => Self::Connection(reason),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A single key carried an unparsable value.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The configuration as a whole is inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TempDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_map_to_caller_taxonomy() {
        let err: TempDbError = DriverError::Unavailable("not compiled in".into()).into();
        assert!(matches!(err, TempDbError::DriverUnavailable(_)));

        let err: TempDbError = DriverError::Connect("refused".into()).into();
        assert!(matches!(err, TempDbError::Connection(_)));
    }

    #[test]
    fn startup_failure_keeps_launch_cause() {
        let err = TempDbError::StartupFailed(LaunchError::NotReady {
            port: 4000,
            timeout_secs: 60,
        });
        assert!(err.to_string().contains("port 4000"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
