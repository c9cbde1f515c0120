//! Runtime for an embedded, throwaway database server.
//!
//! Owns the server process lifecycle, allocates its port, guarantees it is
//! stopped when the host process exits, and exposes a connection-provider
//! facade over it. Engine-specific launching and connecting are injected
//! through the `ServerLauncher` and `DatabaseDriver` ports of `tempdb-core`.

#![deny(unsafe_code)]

pub mod process;
pub mod provider;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use process::{
    ExitHook, PortAllocator, PortProbe, ServiceProcess, ShutdownCoordinator, TcpPortProbe,
    spawn_signal_watcher, terminate_child, watch_signals_with,
};
pub use provider::{
    ConnectionProvider, IgnoredConnectionProperties, SharedLogWriter, TracingLogWriter,
};
pub use registry::InstanceRegistry;
