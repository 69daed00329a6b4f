use std::sync::{Mutex, MutexGuard, PoisonError};

static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that touch process-wide state.
pub fn global_lock() -> MutexGuard<'static, ()> {
    GLOBAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
