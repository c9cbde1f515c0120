//! Core domain types, configuration and port definitions for tempdb.
//!
//! This crate has no process or database dependencies; the runtime and the
//! engine adapters build on the types defined here.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod ports;

pub use config::{CredentialPolicy, TempDbConfig, WorkdirPolicy};
pub use endpoint::{
    DEFAULT_DATABASE, FIXED_PASSWORD, FIXED_USERNAME, LOOPBACK_HOST, ServiceEndpoint,
    ServiceState,
};
pub use error::{ConfigError, DriverError, LaunchError, Result, TempDbError};
pub use ports::{
    AbortSignal, ConnectionProperties, DatabaseDriver, LaunchSpec, RunningServer, ServerLauncher,
};
