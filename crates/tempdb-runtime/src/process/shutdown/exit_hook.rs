//! Runs the global coordinator's hooks when the process exits normally.
//!
//! Statics are never dropped in Rust, so a process-wide server would outlive
//! the test binary without this destructor.

#![allow(unsafe_code)]

use super::coordinator::ShutdownCoordinator;

#[ctor::dtor]
unsafe fn stop_embedded_servers_on_exit() {
    if let Some(coordinator) = ShutdownCoordinator::installed() {
        coordinator.run_exit_hooks();
    }
}
