//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the lifecycle core expects from the database
//! engine, the client driver and the host framework.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No process implementation details beyond "is it running"
//! - Methods callable from an exit hook are synchronous

pub mod connection_properties;
pub mod driver;
pub mod launcher;

pub use connection_properties::ConnectionProperties;
pub use driver::DatabaseDriver;
pub use launcher::{AbortSignal, LaunchSpec, RunningServer, ServerLauncher};
