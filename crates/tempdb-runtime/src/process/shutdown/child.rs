//! Bounded SIGTERM → SIGKILL termination for `std::process::Child`.
//!
//! This is synchronous on purpose: it runs from process-exit hooks where no
//! async runtime is left.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Interval between exit checks while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for reaping after SIGKILL.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Terminate a child process, waiting at most `grace` before escalating.
///
/// # Strategy
/// 1. Send SIGTERM and poll for exit for up to `grace`
/// 2. If still running, send SIGKILL
/// 3. Poll for reaping for up to one more second
///
/// # Platform behavior
/// - Unix: SIGTERM via nix, SIGKILL via `Child::kill`
/// - Windows: `Child::kill` immediately
///
/// # Returns
/// - `Ok(Some(status))` once the process has been reaped
/// - `Ok(None)` if it was killed but not yet reaped within the timeout
pub fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    if let Some(status) = child.try_wait()? {
        return Ok(Some(status));
    }

    #[cfg(unix)]
    {
        let pid = Pid::from_raw(i32::try_from(child.id()).map_err(io::Error::other)?);
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) => {}
            // Already gone, just reap it
            Err(Errno::ESRCH) => return child.try_wait(),
            Err(e) => return Err(io::Error::other(e)),
        }

        if let Some(status) = wait_with_deadline(child, grace)? {
            return Ok(Some(status));
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill()?;
    wait_with_deadline(child, KILL_REAP_TIMEOUT)
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
