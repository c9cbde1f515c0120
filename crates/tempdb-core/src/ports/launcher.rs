//! Server launcher port.
//!
//! A launcher knows how to turn a working directory and a port into a
//! running database server. The returned handle is owned by exactly one
//! service process and is the only way to terminate the server.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::endpoint::ServiceEndpoint;
use crate::error::LaunchError;

/// Everything a launcher needs to start one server.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Endpoint the server must serve, including the fixed identity.
    pub endpoint: ServiceEndpoint,
    /// Directory for the server's on-disk state (already created).
    pub workdir: PathBuf,
    /// Maximum time to wait for readiness.
    pub startup_timeout: Duration,
    /// Raised when the owner wants the launch given up.
    pub abort: AbortSignal,
}

impl LaunchSpec {
    pub fn new(
        endpoint: ServiceEndpoint,
        workdir: impl Into<PathBuf>,
        startup_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            workdir: workdir.into(),
            startup_timeout,
            abort: AbortSignal::default(),
        }
    }

    /// Share `abort` with the launch.
    #[must_use]
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }
}

/// Shared flag asking an in-flight launch to stop.
///
/// Launchers check it between readiness polls, tear down whatever they
/// started and fail with `LaunchError::Aborted`. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// `Err(Aborted)` once raised.
    pub fn check(&self) -> Result<(), LaunchError> {
        if self.is_raised() {
            Err(LaunchError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// Launches external database servers.
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Engine name for logging.
    fn engine(&self) -> &'static str;

    /// Start a server for `spec` and return once it accepts connections.
    ///
    /// Implementations poll `spec.abort` while waiting and clean up after
    /// themselves when it is raised.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningServer>, LaunchError>;
}

/// Handle to a launched server process.
///
/// Methods are synchronous so they can be called from a process-exit hook
/// where no async runtime is available.
pub trait RunningServer: Send {
    /// OS process id, if the server is a separate process.
    fn pid(&self) -> Option<u32>;

    /// Whether the server still reports itself as running.
    fn is_running(&mut self) -> bool;

    /// Ask the server to terminate, escalating after `grace`.
    ///
    /// Must return within a bounded time.
    fn terminate(&mut self, grace: Duration) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::DEFAULT_DATABASE;

    #[test]
    fn abort_is_shared_between_clones() {
        let spec = LaunchSpec::new(
            ServiceEndpoint::loopback(40000, DEFAULT_DATABASE),
            "/tmp/work",
            Duration::from_secs(1),
        );
        let handle = spec.abort.clone();
        assert!(spec.abort.check().is_ok());

        handle.raise();
        assert!(matches!(spec.clone().abort.check(), Err(LaunchError::Aborted)));

        handle.reset();
        assert!(!spec.abort.is_raised());
    }
}
