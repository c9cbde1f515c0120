//! On-disk layout of one server instance and the command lines built from it.
//!
//! ```text
//! <workdir>/
//!   data/          data directory
//!   mysqld.sock    unix socket (root bootstrap connection)
//!   mysqld.pid
//!   mysqld.err     server error log
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempdb_core::LOOPBACK_HOST;

use crate::binary::Flavor;

/// Paths of one server instance below its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    pub workdir: PathBuf,
    pub data_dir: PathBuf,
    pub socket: PathBuf,
    pub pid_file: PathBuf,
    pub error_log: PathBuf,
}

impl ServerLayout {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            data_dir: workdir.join("data"),
            socket: workdir.join("mysqld.sock"),
            pid_file: workdir.join("mysqld.pid"),
            error_log: workdir.join("mysqld.err"),
        }
    }

    /// Whether the data directory still has to be initialized.
    pub fn needs_init(&self) -> io::Result<bool> {
        match fs::read_dir(&self.data_dir) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Last `lines` lines of the error log, empty if it cannot be read.
    pub fn error_log_tail(&self, lines: usize) -> String {
        fs::read(&self.error_log)
            .map(|bytes| tail(&String::from_utf8_lossy(&bytes), lines))
            .unwrap_or_default()
    }

    /// Arguments for data-directory initialization.
    ///
    /// MySQL initializes through the server binary itself; MariaDB goes
    /// through its separate install-db tool, which takes the same flags
    /// apart from the mode switch.
    pub fn init_args(&self, flavor: Flavor, run_as_root: bool) -> Vec<OsString> {
        let mut args = vec![OsString::from("--no-defaults")];
        match flavor {
            Flavor::MySql => args.push("--initialize-insecure".into()),
            Flavor::MariaDb => args.push("--auth-root-authentication-method=normal".into()),
        }
        args.push(flag("--datadir=", &self.data_dir));
        if run_as_root {
            args.push("--user=root".into());
        }
        args
    }

    /// Arguments for running the server on `port`.
    pub fn run_args(&self, flavor: Flavor, port: u16, run_as_root: bool) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("--no-defaults"),
            flag("--datadir=", &self.data_dir),
            format!("--port={port}").into(),
            format!("--bind-address={LOOPBACK_HOST}").into(),
            flag("--socket=", &self.socket),
            flag("--pid-file=", &self.pid_file),
            flag("--log-error=", &self.error_log),
            flag("--secure-file-priv=", &self.workdir),
            "--skip-name-resolve".into(),
        ];
        if flavor == Flavor::MySql {
            args.push("--mysqlx=OFF".into());
        }
        if run_as_root {
            args.push("--user=root".into());
        }
        args
    }
}

fn flag(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(path.as_os_str());
    arg
}

/// Last `lines` lines of `text`.
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
