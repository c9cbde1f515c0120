//! Connection-factory facade over the embedded service.
//!
//! The provider borrows the service; it never owns or stops it. The first
//! connection request starts the server. Everything beyond "give me a
//! connection" is deliberately unsupported.

mod log_writer;
mod properties;

pub use log_writer::{SharedLogWriter, TracingLogWriter};
pub use properties::IgnoredConnectionProperties;

use std::any::type_name;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::debug;

use tempdb_core::{CredentialPolicy, DatabaseDriver, Result, TempDbError};

use crate::process::ServiceProcess;

/// Hands out connections to the embedded server using its fixed identity.
pub struct ConnectionProvider<'a, D: DatabaseDriver> {
    service: &'a ServiceProcess,
    driver: D,
    driver_check: OnceLock<std::result::Result<(), String>>,
    log_writer: Mutex<SharedLogWriter>,
}

impl<'a, D: DatabaseDriver> ConnectionProvider<'a, D> {
    /// Provider using the service's configured credential policy.
    pub fn new(service: &'a ServiceProcess, driver: D) -> Self {
        Self {
            service,
            driver,
            driver_check: OnceLock::new(),
            log_writer: Mutex::new(TracingLogWriter::shared()),
        }
    }

    pub const fn service(&self) -> &'a ServiceProcess {
        self.service
    }

    pub const fn driver(&self) -> &D {
        &self.driver
    }

    pub const fn credential_policy(&self) -> CredentialPolicy {
        self.service.config().credentials
    }

    /// Start the server if needed and open a new connection to it.
    pub async fn get_connection(&self) -> Result<D::Connection> {
        self.ensure_driver_loaded()?;
        self.service.start().await?;

        let endpoint = self.service.endpoint().ok_or_else(|| {
            TempDbError::Connection("service is running without an endpoint".to_string())
        })?;
        debug!(url = %endpoint.display_url(), driver = %self.driver.name(), "Opening connection");
        Ok(self.driver.connect(endpoint).await?)
    }

    /// Credentialed variant of [`Self::get_connection`].
    ///
    /// The supplied credentials are never forwarded: under
    /// `CredentialPolicy::Ignore` they are dropped and the fixed identity is
    /// used, under `CredentialPolicy::Reject` the call fails.
    pub async fn get_connection_with(&self, username: &str, _password: &str) -> Result<D::Connection> {
        match self.credential_policy() {
            CredentialPolicy::Ignore => {
                debug!(username = %username, "get_connection_with called with credentials, ignoring them");
                self.get_connection().await
            }
            CredentialPolicy::Reject => Err(TempDbError::UnsupportedOperation(
                "get_connection_with: the embedded server uses a fixed identity",
            )),
        }
    }

    /// Always zero: no login timeout is applied.
    pub const fn login_timeout(&self) -> u32 {
        0
    }

    pub const fn set_login_timeout(&self, _seconds: u32) -> Result<()> {
        Err(TempDbError::UnsupportedOperation("set_login_timeout"))
    }

    pub const fn unwrap_as<T: 'static>(&self) -> Result<&T> {
        Err(TempDbError::UnsupportedOperation("unwrap"))
    }

    pub fn is_wrapper_for<T: ?Sized + 'static>(&self) -> bool {
        debug!(target_type = %type_name::<T>(), "Asked if provider wraps type");
        false
    }

    /// Current diagnostic log sink.
    pub fn log_writer(&self) -> SharedLogWriter {
        self.log_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the diagnostic log sink.
    pub fn set_log_writer(&self, writer: SharedLogWriter) {
        *self.log_writer.lock().unwrap_or_else(PoisonError::into_inner) = writer;
    }

    // Runs the driver's capability check once per provider.
    fn ensure_driver_loaded(&self) -> Result<()> {
        self.driver_check
            .get_or_init(|| {
                let outcome = self.driver.load().map_err(|e| e.to_string());
                debug!(driver = %self.driver.name(), ok = %outcome.is_ok(), "Driver capability check");
                outcome
            })
            .clone()
            .map_err(TempDbError::DriverUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShutdownCoordinator;
    use crate::testing::{StubDriver, StubLauncher};
    use std::io::Write;
    use std::sync::Arc;
    use tempdb_core::{FIXED_PASSWORD, FIXED_USERNAME, TempDbConfig};
    use tempfile::TempDir;

    fn stub_service(base: &TempDir, policy: CredentialPolicy) -> Arc<ServiceProcess> {
        let config = TempDbConfig::default()
            .with_base_dir(base.path())
            .with_credentials(policy);
        ServiceProcess::new(
            config,
            Arc::new(StubLauncher::new()),
            Arc::new(ShutdownCoordinator::new()),
        )
    }

    #[tokio::test]
    async fn first_connection_starts_the_service() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::new());

        assert!(!service.is_running());
        let conn = provider.get_connection().await.unwrap();

        assert!(service.is_running());
        assert_eq!(Some(&conn.endpoint), service.endpoint());
    }

    #[tokio::test]
    async fn supplied_credentials_are_never_forwarded() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::new());

        let conn = provider
            .get_connection_with("mallory", "hunter2")
            .await
            .unwrap();

        assert_eq!(conn.endpoint.username, FIXED_USERNAME);
        assert_eq!(conn.endpoint.password, FIXED_PASSWORD);
        for endpoint in provider.driver().connected() {
            assert_ne!(endpoint.username, "mallory");
            assert_ne!(endpoint.password, "hunter2");
        }
    }

    #[tokio::test]
    async fn reject_policy_refuses_credentials() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Reject);
        let provider = ConnectionProvider::new(&service, StubDriver::new());
        assert!(matches!(provider.credential_policy(), CredentialPolicy::Reject));

        let err = provider.get_connection_with("a", "b").await.unwrap_err();
        assert!(matches!(err, TempDbError::UnsupportedOperation(_)));
        assert!(!service.is_running());
        assert!(provider.driver().connected().is_empty());

        // The plain call still works
        provider.get_connection().await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_driver_fails_before_starting() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::unavailable("no mysql support"));

        for _ in 0..2 {
            let err = provider.get_connection().await.unwrap_err();
            assert!(matches!(err, TempDbError::DriverUnavailable(ref r) if r.contains("no mysql")));
        }
        assert_eq!(provider.driver().loads(), 1);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn stopped_service_refuses_connections() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::new());

        provider.get_connection().await.unwrap();
        service.stop();

        assert!(matches!(
            provider.get_connection().await,
            Err(TempDbError::ServiceStopped)
        ));
    }

    #[test]
    fn extended_capabilities_are_unsupported() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::new());

        assert_eq!(provider.login_timeout(), 0);
        assert!(matches!(
            provider.set_login_timeout(30),
            Err(TempDbError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            provider.unwrap_as::<String>(),
            Err(TempDbError::UnsupportedOperation(_))
        ));
        assert!(!provider.is_wrapper_for::<ServiceProcess>());
        assert!(!provider.is_wrapper_for::<dyn std::io::Write>());
    }

    #[test]
    fn log_writer_can_be_replaced() {
        let base = TempDir::new().unwrap();
        let service = stub_service(&base, CredentialPolicy::Ignore);
        let provider = ConnectionProvider::new(&service, StubDriver::new());

        let captured = Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));
        let sink: SharedLogWriter = Arc::new(std::sync::Mutex::new(SinkInto(Arc::clone(&captured))));
        provider.set_log_writer(Arc::clone(&sink));
        assert!(Arc::ptr_eq(&provider.log_writer(), &sink));

        writeln!(provider.log_writer().lock().unwrap(), "hello").unwrap();
        assert_eq!(captured.lock().unwrap().as_slice(), b"hello\n");
    }

    struct SinkInto(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SinkInto {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
