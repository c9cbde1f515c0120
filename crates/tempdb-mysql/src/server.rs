//! Handle to a running `mysqld` process.

use std::io;
use std::process::Child;
use std::time::Duration;
use tracing::{debug, warn};

use tempdb_core::RunningServer;
use tempdb_runtime::terminate_child;

use crate::layout::ServerLayout;

/// Grace period used when a handle is dropped while the server still runs.
const DROP_GRACE: Duration = Duration::from_secs(2);

/// A spawned server process.
///
/// Uses a `std` child rather than a tokio one so that it can be terminated
/// from a process-exit hook after every runtime is gone.
#[derive(Debug)]
pub struct MysqldServer {
    child: Child,
    port: u16,
    layout: ServerLayout,
}

impl MysqldServer {
    pub(crate) const fn new(child: Child, port: u16, layout: ServerLayout) -> Self {
        Self {
            child,
            port,
            layout,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn layout(&self) -> &ServerLayout {
        &self.layout
    }

    /// Exit status if the process is gone, as text for diagnostics.
    pub(crate) fn exit_status(&mut self) -> io::Result<Option<String>> {
        Ok(self.child.try_wait()?.map(|status| status.to_string()))
    }
}

impl RunningServer for MysqldServer {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        match terminate_child(&mut self.child, grace)? {
            Some(status) => debug!(port = %self.port, status = %status, "mysqld exited"),
            None => warn!(port = %self.port, "mysqld killed but not yet reaped"),
        }
        Ok(())
    }
}

impl Drop for MysqldServer {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.terminate(DROP_GRACE) {
                warn!(port = %self.port, error = %e, "Failed to stop mysqld on drop");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn sleeper() -> MysqldServer {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        MysqldServer::new(child, 40000, ServerLayout::new(std::path::Path::new("/tmp/x")))
    }

    #[test]
    fn terminate_stops_the_process() {
        let mut server = sleeper();
        assert!(server.is_running());
        assert!(server.pid().is_some());

        server.terminate(Duration::from_secs(2)).unwrap();
        assert!(!server.is_running());
        assert!(server.exit_status().unwrap().is_some());
    }

    #[test]
    fn drop_terminates_a_running_process() {
        let server = sleeper();
        let pid = server.pid().unwrap();
        drop(server);

        let alive = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap()),
            None,
        )
        .is_ok();
        assert!(!alive);
    }
}
