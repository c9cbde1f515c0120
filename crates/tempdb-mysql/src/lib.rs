//! MySQL and MariaDB adapter for tempdb.
//!
//! - [`MysqldLauncher`] implements `ServerLauncher` by running a locally
//!   installed `mysqld`/`mariadbd` in a private working directory
//! - [`MySqlDriver`] implements `DatabaseDriver` with sqlx connections

pub mod binary;
mod bootstrap;
mod driver;
pub mod layout;
mod launcher;
mod server;

pub use binary::{Flavor, ServerBinary};
pub use driver::MySqlDriver;
pub use launcher::MysqldLauncher;
pub use server::MysqldServer;

/// Re-exported so callers can name the connection type without a direct sqlx dependency.
pub use sqlx::MySqlConnection;
