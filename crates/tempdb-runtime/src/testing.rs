//! In-memory launcher and driver for tests.
//!
//! `StubLauncher` "launches" a server that is nothing but a flag, counting
//! launches and terminations. `StubDriver` records every endpoint it is asked
//! to connect to.

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tempdb_core::{
    DatabaseDriver, DriverError, LaunchError, LaunchSpec, RunningServer, ServerLauncher,
    ServiceEndpoint,
};

/// How often a delayed stub launch looks at the abort signal.
const ABORT_POLL: Duration = Duration::from_millis(10);

/// Launcher that never spawns a process.
#[derive(Debug, Default)]
pub struct StubLauncher {
    launches: AtomicUsize,
    terminations: Arc<AtomicUsize>,
    failures_left: AtomicUsize,
    report_not_running: bool,
    delay: Duration,
    last_spec: Mutex<Option<LaunchSpec>>,
}

impl StubLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` launches with `NotReady`.
    #[must_use]
    pub fn failing(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Return servers that report themselves as not running.
    #[must_use]
    pub const fn not_running(mut self) -> Self {
        self.report_not_running = true;
        self
    }

    /// Take `delay` to become ready. An abort cuts the wait short.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.last_spec
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ServerLauncher for StubLauncher {
    fn engine(&self) -> &'static str {
        "stub"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningServer>, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap_or_else(PoisonError::into_inner) = Some(spec.clone());

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LaunchError::NotReady {
                port: spec.endpoint.port,
                timeout_secs: spec.startup_timeout.as_secs(),
            });
        }

        let mut server = StubServer {
            alive: AtomicBool::new(!self.report_not_running),
            terminations: Arc::clone(&self.terminations),
        };

        // "Readiness" wait, honouring the abort signal like a real launcher
        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if let Err(aborted) = spec.abort.check() {
                server.terminate(Duration::ZERO)?;
                return Err(aborted);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(ABORT_POLL.min(left)).await;
        }

        Ok(Box::new(server))
    }
}

/// Server handle produced by [`StubLauncher`].
#[derive(Debug)]
pub struct StubServer {
    alive: AtomicBool,
    terminations: Arc<AtomicUsize>,
}

impl RunningServer for StubServer {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_running(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn terminate(&mut self, _grace: Duration) -> io::Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connection handed out by [`StubDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConnection {
    pub endpoint: ServiceEndpoint,
}

/// Driver that records connection attempts instead of opening sockets.
#[derive(Debug, Default)]
pub struct StubDriver {
    load_error: Option<String>,
    loads: AtomicUsize,
    connected: Mutex<Vec<ServiceEndpoint>>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose capability check always fails.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            load_error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Endpoints passed to `connect`, in call order.
    pub fn connected(&self) -> Vec<ServiceEndpoint> {
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DatabaseDriver for StubDriver {
    type Connection = StubConnection;

    fn name(&self) -> &'static str {
        "stub"
    }

    fn load(&self) -> Result<(), DriverError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.load_error {
            Some(reason) => Err(DriverError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<StubConnection, DriverError> {
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint.clone());
        Ok(StubConnection {
            endpoint: endpoint.clone(),
        })
    }
}
