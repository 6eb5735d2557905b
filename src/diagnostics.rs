//! One-shot gate for diagnostic output.
//!
//! Shared through application state so every handler sees the same flag.
//! The first [`DiagnosticThrottle::should_emit`] call wins; later calls are
//! suppressed until [`DiagnosticThrottle::reset`].

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct DiagnosticThrottle {
    emitted: AtomicBool,
}

impl DiagnosticThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once until the throttle is reset.
    pub fn should_emit(&self) -> bool {
        !self.emitted.swap(true, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.emitted.store(false, Ordering::Release);
    }

    pub fn has_emitted(&self) -> bool {
        self.emitted.load(Ordering::Acquire)
    }
}
