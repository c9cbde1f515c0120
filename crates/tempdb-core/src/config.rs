//! Configuration for the embedded database service.
//!
//! All fields carry defaults so a bare `TempDbConfig::default()` works out of
//! the box. Values can be overridden programmatically (`with_*` builders),
//! from any serde source, or from `TEMPDB_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::endpoint::DEFAULT_DATABASE;
use crate::error::ConfigError;

/// Default number of random ports probed before giving up.
pub const DEFAULT_MAX_PORT_ATTEMPTS: u32 = 10;

/// Default timeout of a single port probe, in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 100;

/// Default time allowed for the server to become ready, in seconds.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 60;

/// Default grace period between SIGTERM and SIGKILL, in milliseconds.
pub const DEFAULT_STOP_GRACE_MS: u64 = 5000;

/// Prefix of per-port working directories under the base directory.
pub const WORKDIR_PREFIX: &str = "tempdb-mysqld-";

pub const ENV_PORT: &str = "TEMPDB_PORT";
pub const ENV_MAX_PORT_ATTEMPTS: &str = "TEMPDB_MAX_PORT_ATTEMPTS";
pub const ENV_PROBE_TIMEOUT_MS: &str = "TEMPDB_PROBE_TIMEOUT_MS";
pub const ENV_BASE_DIR: &str = "TEMPDB_BASE_DIR";
pub const ENV_WORKDIR: &str = "TEMPDB_WORKDIR";
pub const ENV_CREDENTIALS: &str = "TEMPDB_CREDENTIALS";
pub const ENV_STARTUP_TIMEOUT_SECS: &str = "TEMPDB_STARTUP_TIMEOUT_SECS";
pub const ENV_STOP_GRACE_MS: &str = "TEMPDB_STOP_GRACE_MS";
pub const ENV_KEEP_WORKDIR: &str = "TEMPDB_KEEP_WORKDIR";
pub const ENV_STOP_ON_SIGNAL: &str = "TEMPDB_STOP_ON_SIGNAL";
pub const ENV_MYSQLD: &str = "TEMPDB_MYSQLD";

/// How caller-supplied credentials are treated.
///
/// The embedded server always uses one fixed identity, so credentials passed
/// by callers are either ignored (logged and dropped) or rejected outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    #[default]
    Ignore,
    Reject,
}

impl FromStr for CredentialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected 'ignore' or 'reject', got '{other}'")),
        }
    }
}

/// Where the server keeps its on-disk state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkdirPolicy {
    /// `<base>/tempdb-mysqld-<port>`, fresh for every run.
    #[default]
    PerPort,
    /// `<base>/<sub-path>`, reused across runs.
    Fixed(PathBuf),
}

/// Embedded database service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempDbConfig {
    /// Pre-chosen port. When `None` a free port is picked at start.
    pub port: Option<u16>,

    /// Random ports probed before allocation fails.
    pub max_port_attempts: u32,

    /// Timeout of one port probe.
    pub probe_timeout_ms: u64,

    /// Base directory for working directories (system temp dir when `None`).
    pub base_dir: Option<PathBuf>,

    /// Working-directory naming policy.
    pub workdir: WorkdirPolicy,

    /// Database created and selected on connect.
    pub database: String,

    /// Treatment of caller-supplied credentials.
    pub credentials: CredentialPolicy,

    /// Time allowed for the server to become ready.
    pub startup_timeout_secs: u64,

    /// Grace period between SIGTERM and SIGKILL on stop.
    pub stop_grace_ms: u64,

    /// Remove the working directory at process exit.
    pub delete_workdir_on_exit: bool,

    /// Also stop the server on SIGINT/SIGTERM, then exit with status 130.
    pub stop_on_signal: bool,

    /// Explicit path of the server binary.
    pub server_binary: Option<PathBuf>,
}

impl Default for TempDbConfig {
    fn default() -> Self {
        Self {
            port: None,
            max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            base_dir: None,
            workdir: WorkdirPolicy::PerPort,
            database: DEFAULT_DATABASE.to_string(),
            credentials: CredentialPolicy::Ignore,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            delete_workdir_on_exit: true,
            stop_on_signal: false,
            server_binary: None,
        }
    }
}

impl TempDbConfig {
    /// Load configuration from `TEMPDB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value lookup.
    ///
    /// Unset keys keep their defaults; the result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_PORT) {
            config.port = Some(parse_value(ENV_PORT, &value)?);
        }
        if let Some(value) = get(ENV_MAX_PORT_ATTEMPTS) {
            config.max_port_attempts = parse_value(ENV_MAX_PORT_ATTEMPTS, &value)?;
        }
        if let Some(value) = get(ENV_PROBE_TIMEOUT_MS) {
            config.probe_timeout_ms = parse_value(ENV_PROBE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = get(ENV_BASE_DIR) {
            config.base_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_WORKDIR) {
            config.workdir = WorkdirPolicy::Fixed(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_CREDENTIALS) {
            config.credentials = parse_value(ENV_CREDENTIALS, &value)?;
        }
        if let Some(value) = get(ENV_STARTUP_TIMEOUT_SECS) {
            config.startup_timeout_secs = parse_value(ENV_STARTUP_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(ENV_STOP_GRACE_MS) {
            config.stop_grace_ms = parse_value(ENV_STOP_GRACE_MS, &value)?;
        }
        if let Some(value) = get(ENV_KEEP_WORKDIR) {
            config.delete_workdir_on_exit = !parse_flag(ENV_KEEP_WORKDIR, &value)?;
        }
        if let Some(value) = get(ENV_STOP_ON_SIGNAL) {
            config.stop_on_signal = parse_flag(ENV_STOP_ON_SIGNAL, &value)?;
        }
        if let Some(value) = get(ENV_MYSQLD) {
            config.server_binary = Some(PathBuf::from(value));
        }

        config.validate()?;
        Ok(config)
    }

    /// Use a pre-chosen port instead of allocating one.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the port allocation attempt budget.
    #[must_use]
    pub const fn with_max_port_attempts(mut self, attempts: u32) -> Self {
        self.max_port_attempts = attempts;
        self
    }

    /// Set the base directory for working directories.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the working-directory policy.
    #[must_use]
    pub fn with_workdir(mut self, policy: WorkdirPolicy) -> Self {
        self.workdir = policy;
        self
    }

    /// Set the credential policy.
    #[must_use]
    pub const fn with_credentials(mut self, policy: CredentialPolicy) -> Self {
        self.credentials = policy;
        self
    }

    /// Set the startup timeout.
    #[must_use]
    pub const fn with_startup_timeout_secs(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = secs;
        self
    }

    /// Set the stop grace period.
    #[must_use]
    pub const fn with_stop_grace_ms(mut self, ms: u64) -> Self {
        self.stop_grace_ms = ms;
        self
    }

    /// Keep or remove the working directory at exit.
    #[must_use]
    pub const fn with_delete_workdir_on_exit(mut self, delete: bool) -> Self {
        self.delete_workdir_on_exit = delete;
        self
    }

    /// Set an explicit server binary.
    #[must_use]
    pub fn with_server_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.server_binary = Some(path.into());
        self
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Effective base directory (system temp dir fallback).
    pub fn effective_base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Working directory for a server bound to `port`.
    pub fn workdir_for(&self, port: u16) -> PathBuf {
        let base = self.effective_base_dir();
        match &self.workdir {
            WorkdirPolicy::PerPort => base.join(format!("{WORKDIR_PREFIX}{port}")),
            WorkdirPolicy::Fixed(sub) => base.join(sub),
        }
    }

    /// Check the configuration for inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_port_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_port_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(port) = self.port {
            if port < 1024 {
                return Err(ConfigError::Invalid(format!(
                    "port {port} is privileged, use a port >= 1024"
                )));
            }
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "startup_timeout_secs must be greater than zero".to_string(),
            ));
        }
        validate_database_name(&self.database)?;
        if let WorkdirPolicy::Fixed(sub) = &self.workdir {
            validate_sub_path(sub)?;
        }
        Ok(())
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected a boolean flag".to_string(),
        }),
    }
}

// The name ends up as an SQL identifier during bootstrap.
fn validate_database_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > 64 {
        return Err(ConfigError::Invalid(
            "database name must be 1-64 characters".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Invalid(format!(
            "database name '{name}' may only contain ASCII letters, digits and '_'"
        )));
    }
    Ok(())
}

fn validate_sub_path(sub: &Path) -> Result<(), ConfigError> {
    if sub.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(
            "fixed workdir must not be empty".to_string(),
        ));
    }
    let escapes = sub
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConfigError::Invalid(format!(
            "fixed workdir {} must be a relative path below the base directory",
            sub.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = TempDbConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_port_attempts, 10);
        assert_eq!(config.probe_timeout(), Duration::from_millis(100));
        assert_eq!(config.credentials, CredentialPolicy::Ignore);
        assert!(config.delete_workdir_on_exit);
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = TempDbConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, TempDbConfig::default());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = TempDbConfig::from_lookup(lookup(&[
            (ENV_PORT, "33306"),
            (ENV_MAX_PORT_ATTEMPTS, "3"),
            (ENV_CREDENTIALS, "Reject"),
            (ENV_WORKDIR, "tempdb/shared"),
            (ENV_KEEP_WORKDIR, "yes"),
            (ENV_STOP_ON_SIGNAL, "1"),
        ]))
        .unwrap();

        assert_eq!(config.port, Some(33306));
        assert_eq!(config.max_port_attempts, 3);
        assert_eq!(config.credentials, CredentialPolicy::Reject);
        assert_eq!(
            config.workdir,
            WorkdirPolicy::Fixed(PathBuf::from("tempdb/shared"))
        );
        assert!(!config.delete_workdir_on_exit);
        assert!(config.stop_on_signal);
    }

    #[test]
    fn unparsable_value_names_the_key() {
        let err = TempDbConfig::from_lookup(lookup(&[(ENV_PORT, "not-a-port")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, ENV_PORT);
                assert_eq!(value, "not-a-port");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn privileged_port_is_rejected() {
        let err = TempDbConfig::from_lookup(lookup(&[(ENV_PORT, "80")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_attempt_budget_is_rejected() {
        let config = TempDbConfig::default().with_max_port_attempts(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn fixed_workdir_cannot_escape_base() {
        let config = TempDbConfig::default().with_workdir(WorkdirPolicy::Fixed("../etc".into()));
        assert!(config.validate().is_err());

        let config = TempDbConfig::default().with_workdir(WorkdirPolicy::Fixed("/abs".into()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn database_name_must_be_an_identifier() {
        let mut config = TempDbConfig::default();
        config.database = "bad`name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn workdir_follows_policy() {
        let config = TempDbConfig::default().with_base_dir("/var/tmp");
        assert_eq!(
            config.workdir_for(40001),
            PathBuf::from("/var/tmp/tempdb-mysqld-40001")
        );

        let config = config.with_workdir(WorkdirPolicy::Fixed("shared".into()));
        assert_eq!(config.workdir_for(40001), PathBuf::from("/var/tmp/shared"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TempDbConfig =
            serde_json::from_str(r#"{"port": 45000, "credentials": "reject"}"#).unwrap();
        assert_eq!(config.port, Some(45000));
        assert_eq!(config.credentials, CredentialPolicy::Reject);
        assert_eq!(config.max_port_attempts, DEFAULT_MAX_PORT_ATTEMPTS);
        assert_eq!(config.database, DEFAULT_DATABASE);
    }
}
