use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Poison-tolerant access to the maps behind in-process storage backends.
///
/// A panic while a guard is held leaves the map in whatever state the
/// panicking writer reached. Storage is a best-effort cache, so the map is
/// used as-is instead of propagating the panic to every later caller.
pub(super) trait RecoverLock<T> {
    fn read_or_recover(&self, backend: &'static str, op: &'static str) -> RwLockReadGuard<'_, T>;

    fn write_or_recover(&self, backend: &'static str, op: &'static str)
    -> RwLockWriteGuard<'_, T>;
}

impl<T> RecoverLock<T> for RwLock<T> {
    fn read_or_recover(&self, backend: &'static str, op: &'static str) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| {
            log_recovery(backend, op, "read");
            poisoned.into_inner()
        })
    }

    fn write_or_recover(
        &self,
        backend: &'static str,
        op: &'static str,
    ) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| {
            log_recovery(backend, op, "write");
            poisoned.into_inner()
        })
    }
}

fn log_recovery(backend: &'static str, op: &'static str, access: &'static str) {
    warn!(
        target = backend,
        op,
        access,
        result = "poisoned_recovered",
        "Recovered session storage after a panic in another thread"
    );
}
