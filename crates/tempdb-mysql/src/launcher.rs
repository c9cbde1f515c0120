//! `ServerLauncher` implementation that runs a local `mysqld`.
//!
//! Launch sequence:
//! 1. Resolve and identify the server binary (once per launcher)
//! 2. Initialize the data directory if it is empty
//! 3. Spawn the server detached from our stdio
//! 4. Poll until it accepts TCP and a root connection over the socket
//! 5. Create the fixed database and account
//!
//! The launch's abort signal is checked while initializing and on every
//! readiness poll. An aborted launch kills what it started.

use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, MySqlConnection};
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use tempdb_core::{
    AbortSignal, LOOPBACK_HOST, LaunchError, LaunchSpec, RunningServer, ServerLauncher,
    TempDbConfig,
};

use crate::binary::{Flavor, ServerBinary};
use crate::bootstrap;
use crate::layout::{ServerLayout, tail};
use crate::server::MysqldServer;

/// Interval between readiness checks.
const READY_POLL: Duration = Duration::from_millis(250);

/// Timeout of a single readiness connection attempt.
const READY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Grace period when tearing down a server that failed to come up.
const FAILED_START_GRACE: Duration = Duration::from_secs(2);

/// Lines of the error log attached to startup failures.
const LOG_TAIL_LINES: usize = 20;

/// Launches `mysqld` (MySQL or MariaDB) from a local installation.
#[derive(Debug, Default)]
pub struct MysqldLauncher {
    binary_override: Option<PathBuf>,
    binary: OnceCell<ServerBinary>,
}

impl MysqldLauncher {
    /// Launcher using `binary` if given, otherwise the usual search order.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary_override: binary,
            binary: OnceCell::new(),
        }
    }

    pub fn from_config(config: &TempDbConfig) -> Self {
        Self::new(config.server_binary.clone())
    }

    /// Resolved server binary, detected on first use.
    pub async fn binary(&self) -> Result<&ServerBinary, LaunchError> {
        self.binary
            .get_or_try_init(|| ServerBinary::detect(self.binary_override.as_deref()))
            .await
    }

    async fn initialize(
        binary: &ServerBinary,
        layout: &ServerLayout,
        abort: &AbortSignal,
    ) -> Result<(), LaunchError> {
        let program = match binary.flavor {
            Flavor::MySql => binary.path.clone(),
            Flavor::MariaDb => {
                binary
                    .mariadb_install_db()
                    .ok_or_else(|| LaunchError::InitFailed {
                        path: layout.data_dir.clone(),
                        reason: "mariadb-install-db not found".to_string(),
                    })?
            }
        };

        info!(program = %program.display(), data_dir = %layout.data_dir.display(), "Initializing data directory");
        let init = Command::new(&program)
            .args(layout.init_args(binary.flavor, running_as_root()))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::select! {
            output = init => output.map_err(|source| LaunchError::Spawn {
                binary: program.clone(),
                source,
            })?,
            () = aborted(abort) => {
                warn!(data_dir = %layout.data_dir.display(), "Initialization aborted");
                return Err(LaunchError::Aborted);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(LaunchError::InitFailed {
                path: layout.data_dir.clone(),
                reason: format!("{}: {}", output.status, tail(&detail, LOG_TAIL_LINES)),
            });
        }
        debug!(data_dir = %layout.data_dir.display(), "Data directory initialized");
        Ok(())
    }

    fn spawn(
        binary: &ServerBinary,
        layout: &ServerLayout,
        port: u16,
    ) -> Result<MysqldServer, LaunchError> {
        // Detached stdio: the server outlives whatever reads our pipes
        let child = StdCommand::new(&binary.path)
            .args(layout.run_args(binary.flavor, port, running_as_root()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                binary: binary.path.clone(),
                source,
            })?;
        debug!(pid = %child.id(), port = %port, "Spawned mysqld");
        Ok(MysqldServer::new(child, port, layout.clone()))
    }

    async fn wait_ready(
        server: &mut MysqldServer,
        timeout: Duration,
        abort: &AbortSignal,
    ) -> Result<MySqlConnection, LaunchError> {
        let deadline = Instant::now() + timeout;
        let port = server.port();
        let root = root_options(&server.layout().socket);

        loop {
            abort.check()?;
            if let Some(status) = server.exit_status()? {
                return Err(LaunchError::Exited {
                    status,
                    log_tail: server.layout().error_log_tail(LOG_TAIL_LINES),
                });
            }

            if accepts_tcp(port).await {
                match tokio::time::timeout(READY_ATTEMPT_TIMEOUT, MySqlConnection::connect_with(&root)).await {
                    Ok(Ok(conn)) => return Ok(conn),
                    Ok(Err(e)) => debug!(port = %port, error = %e, "Root connection not yet possible"),
                    Err(_) => debug!(port = %port, "Root connection attempt timed out"),
                }
            }

            if Instant::now() >= deadline {
                return Err(LaunchError::NotReady {
                    port,
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl ServerLauncher for MysqldLauncher {
    fn engine(&self) -> &'static str {
        "mysqld"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RunningServer>, LaunchError> {
        let binary = self.binary().await?;
        let layout = ServerLayout::new(&spec.workdir);

        if layout.needs_init()? {
            Self::initialize(binary, &layout, &spec.abort).await?;
        }
        spec.abort.check()?;

        let mut server = Self::spawn(binary, &layout, spec.endpoint.port)?;
        let ready = Self::wait_ready(&mut server, spec.startup_timeout, &spec.abort).await;
        let outcome = match ready {
            Ok(mut root) => {
                let created = bootstrap::create_identity(&mut root, &spec.endpoint).await;
                if let Err(e) = root.close().await {
                    debug!(error = %e, "Closing root connection failed");
                }
                created
            }
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            if let Err(term) = server.terminate(FAILED_START_GRACE) {
                warn!(error = %term, "Failed to stop mysqld after failed start");
            }
            return Err(e);
        }

        info!(
            flavor = %binary.flavor,
            version = %binary.version,
            port = %spec.endpoint.port,
            "mysqld ready"
        );
        Ok(Box::new(server))
    }
}

fn root_options(socket: &std::path::Path) -> MySqlConnectOptions {
    MySqlConnectOptions::new().socket(socket).username("root")
}

/// Resolves once `abort` is raised.
fn aborted(abort: &AbortSignal) -> impl std::future::Future<Output = ()> + Send + '_ {
    async move {
        while !abort.is_raised() {
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

async fn accepts_tcp(port: u16) -> bool {
    matches!(
        tokio::time::timeout(READY_ATTEMPT_TIMEOUT, TcpStream::connect((LOOPBACK_HOST, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
const fn running_as_root() -> bool {
    false
}
