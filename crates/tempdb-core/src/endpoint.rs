//! Service endpoint and lifecycle state types.

use serde::Serialize;
use std::fmt;

/// Loopback address every embedded server binds to.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Fixed account created inside every embedded server.
pub const FIXED_USERNAME: &str = "pseudo";

/// Password of [`FIXED_USERNAME`].
pub const FIXED_PASSWORD: &str = "embedded";

/// Database created on first start.
pub const DEFAULT_DATABASE: &str = "embeddedmysql";

/// Host/port/credential tuple used to reach a running server.
///
/// Built once the port is known and never mutated afterwards.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub database: String,
}

impl ServiceEndpoint {
    /// Endpoint on the loopback interface with the fixed identity.
    pub fn loopback(port: u16, database: impl Into<String>) -> Self {
        Self {
            host: LOOPBACK_HOST.to_string(),
            port,
            username: FIXED_USERNAME.to_string(),
            password: FIXED_PASSWORD.to_string(),
            database: database.into(),
        }
    }

    /// Connection URL without the password, for logging.
    pub fn display_url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

// Keep the password out of debug output.
impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a service process.
///
/// `NotStarted -> Running -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl ServiceState {
    /// Decode the value stored in an atomic mirror.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}
