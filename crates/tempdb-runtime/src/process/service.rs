//! Lifecycle of the one embedded database server owned by this process.
//!
//! `start` and `stop` are serialized by a single async mutex that owns the
//! lifecycle phase together with the exit-hook flag. A lock-free mirror of
//! the state serves `is_running`/`state` queries, so they never wait behind
//! a launch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tempdb_core::{
    AbortSignal, LaunchError, LaunchSpec, Result, RunningServer, ServerLauncher, ServiceEndpoint,
    ServiceState, TempDbConfig, TempDbError, WorkdirPolicy,
};

use super::ports::PortAllocator;
use super::shutdown::{ExitHook, ShutdownCoordinator, spawn_signal_watcher};
use super::workdir::{self, DeleteOnExit, PendingWorkdir};

/// Poll interval of a stop waiting for an in-flight start.
const STOP_LOCK_POLL: Duration = Duration::from_millis(10);

enum Phase {
    NotStarted,
    Running(Box<dyn RunningServer>),
    Stopped,
}

struct Inner {
    phase: Phase,
    exit_hook_registered: bool,
}

/// Owns one external database server process.
pub struct ServiceProcess {
    config: TempDbConfig,
    launcher: Arc<dyn ServerLauncher>,
    coordinator: Arc<ShutdownCoordinator>,
    allocator: PortAllocator,
    self_ref: Weak<Self>,
    inner: Mutex<Inner>,
    state: AtomicU8,
    abort: AbortSignal,
    endpoint: OnceLock<ServiceEndpoint>,
    cleanup: DeleteOnExit,
}

impl ServiceProcess {
    /// Create a service in the `NotStarted` state. Nothing is launched yet.
    pub fn new(
        config: TempDbConfig,
        launcher: Arc<dyn ServerLauncher>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Arc<Self> {
        let allocator = PortAllocator::from_config(&config);
        Arc::new_cyclic(|self_ref| Self {
            config,
            launcher,
            coordinator,
            allocator,
            self_ref: self_ref.clone(),
            inner: Mutex::new(Inner {
                phase: Phase::NotStarted,
                exit_hook_registered: false,
            }),
            state: AtomicU8::new(ServiceState::NotStarted.as_u8()),
            abort: AbortSignal::default(),
            endpoint: OnceLock::new(),
            cleanup: DeleteOnExit::default(),
        })
    }

    pub const fn config(&self) -> &TempDbConfig {
        &self.config
    }

    pub fn engine(&self) -> &'static str {
        self.launcher.engine()
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    /// Endpoint of the server, published by the first successful start.
    pub fn endpoint(&self) -> Option<&ServiceEndpoint> {
        self.endpoint.get()
    }

    /// Start the server unless it is already running.
    ///
    /// Concurrent callers serialize on the lifecycle lock: exactly one of
    /// them launches, the others observe `Running` and return. A failed
    /// start leaves the service `NotStarted`, so a later call retries from
    /// scratch with a new port.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            Phase::Running(_) => return Ok(()),
            Phase::Stopped => return Err(TempDbError::ServiceStopped),
            Phase::NotStarted => {}
        }
        self.config.validate()?;
        self.abort.reset();

        let port = match self.config.port {
            Some(port) => port,
            None => self.allocator.pick_port()?,
        };
        let endpoint = ServiceEndpoint::loopback(port, self.config.database.clone());
        let workdir = self.config.workdir_for(port);
        workdir::materialize(&workdir)?;
        let pending = self.pending_workdir(workdir.clone());
        if self.config.delete_workdir_on_exit {
            self.cleanup.mark(workdir.clone());
        }

        let spec = LaunchSpec::new(endpoint.clone(), &workdir, self.config.startup_timeout())
            .with_abort(self.abort.clone());
        info!(
            engine = %self.engine(),
            port = %port,
            workdir = %workdir.display(),
            "Starting embedded database server"
        );

        let server = match self.launch(&spec).await {
            Ok(server) => server,
            Err(err) => {
                warn!(port = %port, error = %err, "Embedded database server failed to start");
                return Err(TempDbError::StartupFailed(err));
            }
        };
        pending.keep();

        if !inner.exit_hook_registered {
            self.register_exit_hook();
            inner.exit_hook_registered = true;
        }

        if self.endpoint.set(endpoint).is_err() {
            debug!("Endpoint already published");
        }
        inner.phase = Phase::Running(server);
        self.state
            .store(ServiceState::Running.as_u8(), Ordering::SeqCst);
        info!(pid = ?self.pid_hint(&inner), port = %port, "Embedded database server running");
        Ok(())
    }

    /// Stop the server if it is running; otherwise do nothing.
    ///
    /// Synchronous and bounded so it can run from an exit hook. A stop that
    /// finds a start in flight raises the launch's abort signal and waits at
    /// most the stop grace period for the lock. The launcher notices the
    /// abort within one readiness poll and tears down what it started.
    pub fn stop(&self) {
        let deadline = Instant::now() + self.config.stop_grace();
        let mut inner = loop {
            match self.inner.try_lock() {
                Ok(guard) => break guard,
                Err(_) if Instant::now() < deadline => {
                    self.abort.raise();
                    thread::sleep(STOP_LOCK_POLL);
                }
                Err(_) => {
                    warn!("Gave up waiting for an in-flight start, it will abort on its own");
                    return;
                }
            }
        };

        let Phase::Running(server) = &mut inner.phase else {
            debug!(state = %self.state(), "Stop ignored, server not running");
            return;
        };

        info!(pid = ?server.pid(), "Stopping embedded database server");
        if let Err(e) = server.terminate(self.config.stop_grace()) {
            warn!(error = %e, "Failed to terminate embedded database server cleanly");
        }
        inner.phase = Phase::Stopped;
        self.state
            .store(ServiceState::Stopped.as_u8(), Ordering::SeqCst);
    }

    async fn launch(
        &self,
        spec: &LaunchSpec,
    ) -> std::result::Result<Box<dyn RunningServer>, LaunchError> {
        let mut server = self.launcher.launch(spec).await?;

        if !server.is_running() {
            self.terminate_quietly(server.as_mut());
            return Err(LaunchError::NotRunning);
        }
        if let Err(aborted) = self.abort.check() {
            self.terminate_quietly(server.as_mut());
            return Err(aborted);
        }
        Ok(server)
    }

    fn terminate_quietly(&self, server: &mut dyn RunningServer) {
        if let Err(e) = server.terminate(self.config.stop_grace()) {
            warn!(error = %e, "Failed to terminate half-started server");
        }
    }

    fn register_exit_hook(&self) {
        let hook: Weak<dyn ExitHook> = self.self_ref.clone();
        if self.coordinator.ensure_stop_on_exit(hook) {
            debug!("Embedded database will be stopped at process exit");
        }
        if self.config.stop_on_signal && spawn_signal_watcher(Arc::clone(&self.coordinator)) {
            debug!("Embedded database will be stopped on SIGINT/SIGTERM");
        }
    }

    // Fixed working directories are meant to be reused, so keep them.
    fn pending_workdir(&self, workdir: PathBuf) -> PendingWorkdir {
        if self.config.workdir == WorkdirPolicy::PerPort {
            PendingWorkdir::discard_on_drop(workdir)
        } else {
            PendingWorkdir::retained()
        }
    }

    fn pid_hint(&self, inner: &Inner) -> Option<u32> {
        match &inner.phase {
            Phase::Running(server) => server.pid(),
            Phase::NotStarted | Phase::Stopped => None,
        }
    }
}

impl ExitHook for ServiceProcess {
    fn name(&self) -> &str {
        self.launcher.engine()
    }

    fn on_exit(&self) {
        self.stop();
        self.cleanup.purge();
    }
}
