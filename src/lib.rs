//! # tempdb
//!
//! A throwaway MySQL/MariaDB server for tests. The server is started on the
//! first connection request, listens on a random unprivileged loopback port,
//! and is stopped when the process exits.
//!
//! ```rust,ignore
//! let factory = tempdb::TempDbFactory::global()?;
//! let mut conn = factory.get_connection().await?;
//! sqlx::query("CREATE TABLE t (c VARCHAR(512))").execute(&mut conn).await?;
//! ```
//!
//! Every connection uses the fixed identity `pseudo`/`embedded` against the
//! `embeddedmysql` database. Credentials supplied by callers are ignored
//! (or rejected, see [`CredentialPolicy`]).
//!
//! ## Crates
//!
//! - `tempdb_core` - domain types, configuration, errors and ports
//! - `tempdb_runtime` - process lifecycle, port allocation, exit hooks
//! - `tempdb_mysql` - the `mysqld` launcher and the sqlx driver

use std::sync::Arc;
use tracing::debug;

pub use tempdb_core::{
    ConfigError, ConnectionProperties, CredentialPolicy, DEFAULT_DATABASE, FIXED_PASSWORD,
    FIXED_USERNAME, LaunchError, Result, ServiceEndpoint, ServiceState, TempDbConfig,
    TempDbError, WorkdirPolicy,
};
pub use tempdb_mysql::{MySqlConnection, MySqlDriver, MysqldLauncher};
pub use tempdb_runtime::{
    ConnectionProvider, ExitHook, IgnoredConnectionProperties, InstanceRegistry, ServiceProcess,
    SharedLogWriter, ShutdownCoordinator,
};

/// Build an unstarted MySQL service for `config`.
///
/// Its exit hook is registered with the process-wide coordinator.
pub fn build_service(config: TempDbConfig) -> Arc<ServiceProcess> {
    let launcher = Arc::new(MysqldLauncher::from_config(&config));
    ServiceProcess::new(config, launcher, ShutdownCoordinator::global())
}

/// Data-source facade over the process-wide embedded server.
pub struct TempDbFactory {
    provider: ConnectionProvider<'static, MySqlDriver>,
}

impl TempDbFactory {
    /// Factory over the process-wide instance, created from the environment
    /// on first use.
    pub fn global() -> Result<Self> {
        let registry = InstanceRegistry::global();
        if let Some(service) = registry.get() {
            return Ok(Self::over(service));
        }

        let config = TempDbConfig::from_env()?;
        config.validate()?;
        Ok(Self::over(registry.get_or_init(|| build_service(config))))
    }

    /// Create the process-wide instance explicitly.
    ///
    /// Fails with `AlreadyInitialized` if it already exists, whether it was
    /// created explicitly or through [`Self::global`].
    pub fn with_config(config: TempDbConfig) -> Result<Self> {
        config.validate()?;
        let service = InstanceRegistry::global().initialize(|| build_service(config))?;
        debug!("Process-wide instance created from explicit configuration");
        Ok(Self::over(service))
    }

    fn over(service: &'static ServiceProcess) -> Self {
        Self {
            provider: ConnectionProvider::new(service, MySqlDriver::new()),
        }
    }

    pub const fn connection_provider(&self) -> &ConnectionProvider<'static, MySqlDriver> {
        &self.provider
    }

    pub const fn service(&self) -> &'static ServiceProcess {
        self.provider.service()
    }

    /// Start the server if needed and open a connection with the fixed identity.
    pub async fn get_connection(&self) -> Result<MySqlConnection> {
        self.provider.get_connection().await
    }

    /// See [`ConnectionProvider::get_connection_with`].
    pub async fn get_connection_with(&self, username: &str, password: &str) -> Result<MySqlConnection> {
        self.provider.get_connection_with(username, password).await
    }

    /// Properties object handed to frameworks that want to configure the
    /// data source.
    pub fn connection_properties(&self) -> Result<Box<dyn ConnectionProperties>> {
        properties_for(self.provider.credential_policy())
    }

    /// Stop the server and remove its working directory if configured to.
    ///
    /// Terminal: the process-wide instance cannot be restarted afterwards.
    pub fn shutdown(&self) {
        self.service().on_exit();
    }
}

fn properties_for(policy: CredentialPolicy) -> Result<Box<dyn ConnectionProperties>> {
    match policy {
        CredentialPolicy::Ignore => Ok(Box::new(IgnoredConnectionProperties)),
        CredentialPolicy::Reject => Err(TempDbError::UnsupportedOperation(
            "connection_properties: the embedded server uses a fixed configuration",
        )),
    }
}
