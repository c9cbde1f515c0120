//! Process-wide holder of the embedded service.
//!
//! One registry owns at most one [`ServiceProcess`]. The global registry
//! backs the public facade; separate registries can be created for tests.

use std::sync::{Arc, OnceLock};
use tracing::info;

use tempdb_core::{Result, TempDbError};

use crate::process::ServiceProcess;

/// Global registry used by the facade.
static GLOBAL_REGISTRY: InstanceRegistry = InstanceRegistry::new();

/// Holds the single [`ServiceProcess`] of a process.
#[derive(Default)]
pub struct InstanceRegistry {
    slot: OnceLock<Arc<ServiceProcess>>,
}

impl InstanceRegistry {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Get the process-wide registry.
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Get the instance, constructing it with `init` on first access.
    ///
    /// Concurrent first callers are serialized; `init` runs at most once.
    pub fn get_or_init<F>(&self, init: F) -> &ServiceProcess
    where
        F: FnOnce() -> Arc<ServiceProcess>,
    {
        self.slot.get_or_init(|| {
            let service = init();
            info!(engine = %service.engine(), "Registered embedded database instance");
            service
        })
    }

    /// Construct the instance explicitly.
    ///
    /// Fails with `AlreadyInitialized` if an instance exists; `init` is not
    /// called in that case.
    pub fn initialize<F>(&self, init: F) -> Result<&ServiceProcess>
    where
        F: FnOnce() -> Arc<ServiceProcess>,
    {
        let mut created = false;
        let service = self.get_or_init(|| {
            created = true;
            init()
        });
        if created {
            Ok(service)
        } else {
            Err(TempDbError::AlreadyInitialized)
        }
    }

    /// The instance, if it was created.
    pub fn get(&self) -> Option<&ServiceProcess> {
        self.slot.get().map(Arc::as_ref)
    }
}
