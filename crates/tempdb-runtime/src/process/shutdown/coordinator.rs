//! Exit-time stop registration.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Process-wide coordinator, created on first use.
static GLOBAL_COORDINATOR: OnceLock<Arc<ShutdownCoordinator>> = OnceLock::new();

/// Something that must run when the process exits.
///
/// Implementations must not block indefinitely and must not rely on an
/// async runtime being available.
pub trait ExitHook: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Release the resource. Failures are logged by the implementation.
    fn on_exit(&self);
}

/// Holds non-owning references to exit hooks and runs each of them once.
#[derive(Default)]
pub struct ShutdownCoordinator {
    hooks: Mutex<Vec<Weak<dyn ExitHook>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide coordinator whose hooks run at process exit.
    pub fn global() -> Arc<Self> {
        GLOBAL_COORDINATOR
            .get_or_init(|| Arc::new(Self::new()))
            .clone()
    }

    /// The process-wide coordinator, if anything ever asked for it.
    pub(crate) fn installed() -> Option<&'static Arc<Self>> {
        GLOBAL_COORDINATOR.get()
    }

    /// Register `hook` to run at exit.
    ///
    /// Returns `false` if the same hook is already registered.
    pub fn ensure_stop_on_exit(&self, hook: Weak<dyn ExitHook>) -> bool {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.retain(|existing| existing.strong_count() > 0);

        if hooks.iter().any(|existing| existing.ptr_eq(&hook)) {
            debug!("Exit hook already registered");
            return false;
        }

        hooks.push(hook);
        debug!(registered = %hooks.len(), "Registered exit hook");
        true
    }

    /// Number of live registered hooks.
    pub fn registered(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|hook| hook.strong_count() > 0)
            .count()
    }

    /// Run and forget every registered hook.
    ///
    /// Panics inside hooks are caught and logged; nothing propagates to the
    /// caller. Returns the number of hooks that completed.
    pub fn run_exit_hooks(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner));
        if hooks.is_empty() {
            return 0;
        }

        info!(count = %hooks.len(), "Running exit hooks");
        let mut completed = 0;
        for hook in hooks {
            let Some(hook) = hook.upgrade() else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| hook.on_exit())) {
                Ok(()) => completed += 1,
                Err(_) => warn!(hook = %hook.name(), "Exit hook panicked, ignoring"),
            }
        }
        completed
    }
}
