//! Connection properties that cannot be changed.

use tempdb_core::ConnectionProperties;
use tracing::debug;

/// Accepts every setter and changes nothing.
///
/// The embedded server's driver, URL and identity are fixed; frameworks that
/// insist on configuring them get a sink that logs the attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IgnoredConnectionProperties;

impl ConnectionProperties for IgnoredConnectionProperties {
    fn set_driver(&mut self, driver: &str) {
        debug!(driver = %driver, "set_driver ignored");
    }

    fn set_url(&mut self, url: &str) {
        debug!(url = %url, "set_url ignored");
    }

    fn set_username(&mut self, username: &str) {
        debug!(username = %username, "set_username ignored");
    }

    fn set_password(&mut self, _password: &str) {
        debug!("set_password ignored");
    }
}
