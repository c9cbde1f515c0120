//! Common test utilities.
//!
//! Tracing setup and detection of a local server installation.

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to debug output for the tempdb crates.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tempdb=debug,tempdb_runtime=debug,tempdb_mysql=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Whether a `mysqld`/`mariadbd` binary can be found on this machine.
pub fn mysqld_available() -> bool {
    match tempdb_mysql::binary::resolve(None) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Using local server binary");
            true
        }
        Err(e) => {
            eprintln!("skipping: {e}");
            false
        }
    }
}
