//! Working directories for server state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Create the working directory (and parents) if missing.
pub fn materialize(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    debug!(path = %path.display(), "Working directory ready");
    Ok(())
}

/// Remove a working directory, logging instead of failing.
pub fn discard(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "Removed working directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove working directory"),
    }
}

/// A freshly created working directory that is removed again on drop
/// unless [`keep`](Self::keep) is called.
///
/// Covers a start that fails as well as a start future that is dropped
/// half way.
#[derive(Debug)]
pub struct PendingWorkdir {
    path: Option<PathBuf>,
}

impl PendingWorkdir {
    /// Remove `path` on drop.
    pub const fn discard_on_drop(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Leave the directory alone whatever happens.
    pub const fn retained() -> Self {
        Self { path: None }
    }

    /// The start went through; keep the directory.
    pub fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PendingWorkdir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            discard(&path);
        }
    }
}

/// Paths to remove on a best-effort basis when the process exits.
#[derive(Debug, Default)]
pub struct DeleteOnExit {
    paths: Mutex<Vec<PathBuf>>,
}

impl DeleteOnExit {
    pub fn mark(&self, path: PathBuf) {
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn is_marked(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p == path)
    }

    /// Remove every marked path. Failures are logged only.
    pub fn purge(&self) {
        let paths = std::mem::take(&mut *self.paths.lock().unwrap_or_else(PoisonError::into_inner));
        for path in paths {
            discard(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn materialize_creates_nested_directories() {
        let base = TempDir::new().unwrap();
        let dir = base.path().join("a").join("b");
        materialize(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn discard_tolerates_missing_directory() {
        let base = TempDir::new().unwrap();
        discard(&base.path().join("never-created"));
    }

    #[test]
    fn pending_workdir_is_removed_unless_kept() {
        let base = TempDir::new().unwrap();
        let dropped = base.path().join("tempdb-mysqld-40001");
        let kept = base.path().join("tempdb-mysqld-40002");
        let retained = base.path().join("fixed");
        for dir in [&dropped, &kept, &retained] {
            materialize(dir).unwrap();
        }

        drop(PendingWorkdir::discard_on_drop(dropped.clone()));
        PendingWorkdir::discard_on_drop(kept.clone()).keep();
        drop(PendingWorkdir::retained());

        assert!(!dropped.exists());
        assert!(kept.is_dir());
        assert!(retained.is_dir());
    }

    #[test]
    fn purge_removes_marked_directories_once() {
        let base = TempDir::new().unwrap();
        let dir = base.path().join("tempdb-mysqld-40000");
        materialize(&dir).unwrap();
        fs::write(dir.join("ibdata1"), b"x").unwrap();

        let cleanup = DeleteOnExit::default();
        cleanup.mark(dir.clone());
        cleanup.mark(dir.clone());
        assert!(cleanup.is_marked(&dir));

        cleanup.purge();
        assert!(!dir.exists());
        assert!(!cleanup.is_marked(&dir));
    }
}
