//! Database client driver port.

use async_trait::async_trait;

use crate::endpoint::ServiceEndpoint;
use crate::error::DriverError;

/// Client driver used to open connections against the running server.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Connection type handed to callers.
    type Connection: Send;

    /// Short driver name for logging.
    fn name(&self) -> &'static str;

    /// One-time capability check performed before the first connection.
    ///
    /// Failure means the driver can never be used in this process.
    fn load(&self) -> Result<(), DriverError>;

    /// Open a new connection to `endpoint` using its credentials.
    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<Self::Connection, DriverError>;
}
