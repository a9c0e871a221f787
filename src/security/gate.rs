//! Runtime switch for unauthenticated protocol access
//!
//! The protocol layer consults the gate on every inbound request, so reads
//! never block and a write is visible to the very next request.

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide policy flag permitting unauthenticated requests
///
/// Defaults to denying unauthenticated access. The value is not persisted;
/// a restart returns to the compiled-in default unless the caller seeds it.
#[derive(Debug, Default)]
pub struct AuthGate {
    allow_unauthenticated: AtomicBool,
}

impl AuthGate {
    /// Create a gate with an explicit initial value
    #[must_use]
    pub const fn new(allow_unauthenticated: bool) -> Self {
        Self {
            allow_unauthenticated: AtomicBool::new(allow_unauthenticated),
        }
    }

    /// Set whether unauthenticated requests are allowed
    ///
    /// Returns the previous value
    pub fn set_allow_unauthenticated(&self, allow: bool) -> bool {
        let previous = self.allow_unauthenticated.swap(allow, Ordering::SeqCst);
        if previous != allow {
            tracing::warn!(allow, "unauthenticated access policy changed");
        }
        previous
    }

    /// Whether unauthenticated requests are currently allowed
    #[must_use]
    pub fn get_allow_unauthenticated(&self) -> bool {
        self.allow_unauthenticated.load(Ordering::SeqCst)
    }
}
