//! Locating the `mysqld` binary and telling MySQL from MariaDB.
//!
//! Resolution order:
//! 1. Explicit path from configuration
//! 2. `TEMPDB_MYSQLD` environment variable
//! 3. `mysqld` / `mariadbd` on `PATH`
//! 4. Well-known install locations

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use tempdb_core::LaunchError;
use tempdb_core::config::ENV_MYSQLD;

/// Server binary names probed on `PATH`, in order.
const SERVER_CANDIDATES: &[&str] = &["mysqld", "mariadbd"];

/// Install locations probed when nothing is on `PATH`.
const FALLBACK_LOCATIONS: &[&str] = &[
    "/usr/sbin/mysqld",
    "/usr/sbin/mariadbd",
    "/usr/local/mysql/bin/mysqld",
];

/// MariaDB data-directory initializers, newest name first.
const MARIADB_INSTALL_DB: &[&str] = &["mariadb-install-db", "mysql_install_db"];

/// Server family, which decides initialization and a few run flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    MySql,
    MariaDb,
}

impl Flavor {
    /// Detect the flavor from `mysqld --version` output.
    pub fn from_version_output(output: &str) -> Self {
        if output.to_ascii_lowercase().contains("mariadb") {
            Self::MariaDb
        } else {
            Self::MySql
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => write!(f, "mysql"),
            Self::MariaDb => write!(f, "mariadb"),
        }
    }
}

/// A resolved and identified server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBinary {
    pub path: PathBuf,
    pub flavor: Flavor,
    /// First line of `--version`.
    pub version: String,
}

impl ServerBinary {
    /// Resolve the binary and run `--version` on it.
    pub async fn detect(explicit: Option<&Path>) -> Result<Self, LaunchError> {
        let path = resolve(explicit)?;

        let output = Command::new(&path)
            .arg("--version")
            .output()
            .await
            .map_err(|source| LaunchError::Spawn {
                binary: path.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().trim().to_string();
        let flavor = Flavor::from_version_output(&stdout);

        debug!(path = %path.display(), flavor = %flavor, version = %version, "Detected server binary");
        Ok(Self {
            path,
            flavor,
            version,
        })
    }

    /// Locate the MariaDB initializer belonging to this server.
    ///
    /// Looks beside the server binary, then in a sibling `bin` directory
    /// (`/usr/sbin/mariadbd` pairs with `/usr/bin/mariadb-install-db`), then
    /// on `PATH`.
    pub fn mariadb_install_db(&self) -> Option<PathBuf> {
        let dir = self.path.parent()?;
        let sibling_bin = dir.parent().map(|root| root.join("bin"));

        MARIADB_INSTALL_DB.iter().find_map(|name| {
            let beside = dir.join(name);
            if beside.is_file() {
                return Some(beside);
            }
            if let Some(candidate) = sibling_bin.as_ref().map(|bin| bin.join(name)) {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            which::which(name).ok()
        })
    }
}

/// Resolve the server binary path without running it.
pub fn resolve(explicit: Option<&Path>) -> Result<PathBuf, LaunchError> {
    let env_override = std::env::var_os(ENV_MYSQLD).map(PathBuf::from);
    let fallbacks: Vec<PathBuf> = FALLBACK_LOCATIONS.iter().map(PathBuf::from).collect();
    resolve_with(
        explicit,
        env_override.as_deref(),
        |name| which::which(name).ok(),
        &fallbacks,
    )
}

fn resolve_with(
    explicit: Option<&Path>,
    env_override: Option<&Path>,
    on_path: impl Fn(&str) -> Option<PathBuf>,
    fallbacks: &[PathBuf],
) -> Result<PathBuf, LaunchError> {
    // An explicit choice is never second-guessed
    if let Some(path) = explicit.or(env_override) {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(LaunchError::BinaryNotFound {
                searched: path.display().to_string(),
            })
        };
    }

    if let Some(found) = SERVER_CANDIDATES.iter().find_map(|name| on_path(name)) {
        return Ok(found);
    }

    if let Some(found) = fallbacks.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let mut searched: Vec<String> = SERVER_CANDIDATES
        .iter()
        .map(|name| format!("{name} on PATH"))
        .collect();
    searched.extend(fallbacks.iter().map(|path| path.display().to_string()));
    Err(LaunchError::BinaryNotFound {
        searched: searched.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn flavor_from_version_output() {
        assert_eq!(
            Flavor::from_version_output("/usr/sbin/mysqld  Ver 8.0.36 for Linux on x86_64 (MySQL Community Server - GPL)"),
            Flavor::MySql
        );
        assert_eq!(
            Flavor::from_version_output("/usr/sbin/mariadbd  Ver 10.11.6-MariaDB-0+deb12u1 for debian-linux-gnu on x86_64"),
            Flavor::MariaDb
        );
        assert_eq!(Flavor::from_version_output(""), Flavor::MySql);
    }

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("custom-mysqld");
        fs::write(&explicit, b"").unwrap();

        let resolved = resolve_with(
            Some(&explicit),
            Some(Path::new("/nope")),
            |_| Some(PathBuf::from("/usr/bin/mysqld")),
            &[],
        )
        .unwrap();
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn missing_explicit_path_does_not_fall_back() {
        let err = resolve_with(
            Some(Path::new("/definitely/not/mysqld")),
            None,
            |_| Some(PathBuf::from("/usr/bin/mysqld")),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::BinaryNotFound { ref searched } if searched.contains("/definitely/not")));
    }

    #[test]
    fn env_override_used_without_explicit_path() {
        let dir = TempDir::new().unwrap();
        let from_env = dir.path().join("mysqld");
        fs::write(&from_env, b"").unwrap();

        let resolved = resolve_with(None, Some(&from_env), |_| None, &[]).unwrap();
        assert_eq!(resolved, from_env);
    }

    #[test]
    fn path_lookup_prefers_mysqld_then_mariadbd() {
        let resolved = resolve_with(
            None,
            None,
            |name| (name == "mariadbd").then(|| PathBuf::from("/opt/bin/mariadbd")),
            &[],
        )
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/bin/mariadbd"));
    }

    #[test]
    fn fallback_locations_checked_last() {
        let dir = TempDir::new().unwrap();
        let installed = dir.path().join("mysqld");
        fs::write(&installed, b"").unwrap();
        let fallbacks = vec![dir.path().join("absent"), installed.clone()];

        let resolved = resolve_with(None, None, |_| None, &fallbacks).unwrap();
        assert_eq!(resolved, installed);
    }

    #[test]
    fn not_found_lists_everything_searched() {
        let fallbacks = vec![PathBuf::from("/no/such/mysqld")];
        let err = resolve_with(None, None, |_| None, &fallbacks).unwrap_err();
        let LaunchError::BinaryNotFound { searched } = err else {
            panic!("expected BinaryNotFound");
        };
        assert!(searched.contains("mysqld on PATH"));
        assert!(searched.contains("mariadbd on PATH"));
        assert!(searched.contains("/no/such/mysqld"));
    }

    #[test]
    fn install_db_found_in_sibling_bin_directory() {
        let root = TempDir::new().unwrap();
        let sbin = root.path().join("sbin");
        let bin = root.path().join("bin");
        fs::create_dir_all(&sbin).unwrap();
        fs::create_dir_all(&bin).unwrap();
        fs::write(sbin.join("mariadbd"), b"").unwrap();
        fs::write(bin.join("mariadb-install-db"), b"").unwrap();

        let binary = ServerBinary {
            path: sbin.join("mariadbd"),
            flavor: Flavor::MariaDb,
            version: String::new(),
        };
        assert_eq!(binary.mariadb_install_db(), Some(bin.join("mariadb-install-db")));
    }
}
