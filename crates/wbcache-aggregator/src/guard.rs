//! Single-flight guard for pipeline ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "a tick is running" flag.
///
/// Cloning shares the flag. Only one [`RunGuard`] can exist at a time.
#[derive(Debug, Clone, Default)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag, or returns `None` if a tick already holds it.
    #[must_use]
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(Arc::clone(&self.0)))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, including on early return or panic.
#[derive(Debug)]
pub struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
