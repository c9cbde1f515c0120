//! Process shutdown handling.
//!
//! - `ShutdownCoordinator`: registry of exit hooks, run exactly once
//! - `terminate_child`: bounded SIGTERM → SIGKILL for a server process
//! - `spawn_signal_watcher`: optional Ctrl-C / SIGTERM trigger on its own thread
//!
//! The global coordinator's hooks also run from a process-exit destructor.

mod child;
mod coordinator;
mod exit_hook;
mod signals;

pub use child::terminate_child;
pub use coordinator::{ExitHook, ShutdownCoordinator};
pub use signals::{spawn_signal_watcher, watch_signals_with};
