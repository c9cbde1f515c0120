//! Host-framework connection configuration port.

/// Setters a surrounding test framework uses to configure a data source.
///
/// The embedded server's connection parameters are fixed, so implementations
/// provided by tempdb never change anything.
pub trait ConnectionProperties: Send + Sync {
    fn set_driver(&mut self, driver: &str);
    fn set_url(&mut self, url: &str);
    fn set_username(&mut self, username: &str);
    fn set_password(&mut self, password: &str);
}
