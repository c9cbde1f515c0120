//! `DatabaseDriver` backed by sqlx's MySQL connection.

use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, MySqlConnection};
use std::str::FromStr;
use tracing::debug;

use tempdb_core::{DatabaseDriver, DriverError, ServiceEndpoint};

/// URL parsed by the capability check.
const PROBE_URL: &str = "mysql://localhost";

/// Opens plain `MySqlConnection`s to the embedded server.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub const fn new() -> Self {
        Self
    }

    /// Connect options for `endpoint`, credentials included.
    pub fn connect_options(endpoint: &ServiceEndpoint) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&endpoint.host)
            .port(endpoint.port)
            .username(&endpoint.username)
            .password(&endpoint.password)
            .database(&endpoint.database)
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    type Connection = MySqlConnection;

    fn name(&self) -> &'static str {
        "sqlx-mysql"
    }

    fn load(&self) -> Result<(), DriverError> {
        MySqlConnectOptions::from_str(PROBE_URL)
            .map(|_| ())
            .map_err(|e| DriverError::Unavailable(e.to_string()))
    }

    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<MySqlConnection, DriverError> {
        debug!(url = %endpoint.display_url(), "Connecting");
        MySqlConnection::connect_with(&Self::connect_options(endpoint))
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))
    }
}
