//! Optional SIGINT/SIGTERM watcher.
//!
//! Exit destructors do not run when the process is killed by a signal, so
//! callers that expect Ctrl-C can opt into this watcher. It runs on its own
//! thread with its own single-threaded runtime: once tokio has taken over a
//! signal it never restores the default disposition, so the listener has to
//! live as long as the process and not as long as the caller's runtime.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::coordinator::ShutdownCoordinator;

/// Exit status used after a termination signal (128 + SIGINT).
const SIGNAL_EXIT_CODE: i32 = 130;

const WATCHER_THREAD_NAME: &str = "tempdb-signals";

/// Set once the process-wide watcher is installed.
static WATCHING: AtomicBool = AtomicBool::new(false);

/// Install the process-wide watcher: on SIGINT/SIGTERM it runs the exit
/// hooks of `coordinator` and exits with status 130.
///
/// Only the first successful call installs a watcher. Returns whether this
/// call did.
pub fn spawn_signal_watcher(coordinator: Arc<ShutdownCoordinator>) -> bool {
    if WATCHING.swap(true, Ordering::SeqCst) {
        return false;
    }

    match watch_signals_with(coordinator, |code| std::process::exit(code)) {
        Ok(_detached) => true,
        Err(e) => {
            warn!(error = %e, "Failed to watch for termination signals");
            WATCHING.store(false, Ordering::SeqCst);
            false
        }
    }
}

/// Run `coordinator`'s exit hooks on the first SIGINT/SIGTERM, then call
/// `on_signal` with the exit status to use.
///
/// Returns once the signal handlers are installed. The watcher thread does
/// not depend on any runtime of the caller.
pub fn watch_signals_with<F>(
    coordinator: Arc<ShutdownCoordinator>,
    on_signal: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce(i32) + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<()>>(1);

    let thread = thread::Builder::new()
        .name(WATCHER_THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let mut listener = match Listener::install() {
                    Ok(listener) => listener,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let signal = listener.recv().await;
                info!(signal = %signal, "Termination signal received, stopping embedded database");
                coordinator.run_exit_hooks();
                on_signal(SIGNAL_EXIT_CODE);
            });
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => {
            debug!(thread = %WATCHER_THREAD_NAME, "Watching for termination signals");
            Ok(thread)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::other("signal watcher thread exited early")),
    }
}

#[cfg(unix)]
struct Listener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Listener {
    fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct Listener {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl Listener {
    fn install() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "Ctrl-C"
    }
}
