//! Process management for the embedded database server.
//!
//! # Structure
//!
//! - `ServiceProcess` - lifecycle of the single server (start/stop/state)
//! - `PortAllocator` - random unprivileged port selection with a TCP probe
//! - `shutdown` - exit hooks, signal watcher and child termination
//! - `workdir` - per-port working directories and delete-on-exit cleanup

pub mod ports;
mod service;
pub mod shutdown;
pub mod workdir;

pub use ports::{PortAllocator, PortProbe, TcpPortProbe, UNPRIVILEGED_OFFSET, remap_privileged};
pub use service::ServiceProcess;
pub use shutdown::{
    ExitHook, ShutdownCoordinator, spawn_signal_watcher, terminate_child, watch_signals_with,
};
pub use workdir::{DeleteOnExit, PendingWorkdir};
