use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of transient resource usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Render surfaces currently alive.
    pub surfaces_active: usize,
    /// Capture sessions whose worker has not been joined yet.
    pub capture_sessions_active: usize,
    /// Render surfaces ever allocated through this ledger.
    pub surfaces_created: u64,
    /// Capture sessions ever started through this ledger.
    pub capture_sessions_created: u64,
}

#[derive(Debug, Default)]
struct Counters {
    surfaces_active: AtomicUsize,
    sessions_active: AtomicUsize,
    surfaces_created: AtomicU64,
    sessions_created: AtomicU64,
}

/// Shared counters of live surfaces and capture sessions.
///
/// Each resource holds a [`ResourceLease`]; the count drops when the lease is dropped, so the
/// numbers reflect actual teardown rather than bookkeeping calls.
#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    inner: Arc<Counters>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeaseKind {
    Surface,
    CaptureSession,
}

impl ResourceLedger {
    /// Fresh ledger with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters.
    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            surfaces_active: self.inner.surfaces_active.load(Ordering::Acquire),
            capture_sessions_active: self.inner.sessions_active.load(Ordering::Acquire),
            surfaces_created: self.inner.surfaces_created.load(Ordering::Acquire),
            capture_sessions_created: self.inner.sessions_created.load(Ordering::Acquire),
        }
    }

    pub(crate) fn lease_surface(&self) -> ResourceLease {
        self.inner.surfaces_created.fetch_add(1, Ordering::AcqRel);
        self.inner.surfaces_active.fetch_add(1, Ordering::AcqRel);
        ResourceLease {
            ledger: self.clone(),
            kind: LeaseKind::Surface,
        }
    }

    pub(crate) fn lease_capture_session(&self) -> ResourceLease {
        self.inner.sessions_created.fetch_add(1, Ordering::AcqRel);
        self.inner.sessions_active.fetch_add(1, Ordering::AcqRel);
        ResourceLease {
            ledger: self.clone(),
            kind: LeaseKind::CaptureSession,
        }
    }
}

/// RAII registration of one live resource in a [`ResourceLedger`].
#[derive(Debug)]
pub(crate) struct ResourceLease {
    ledger: ResourceLedger,
    kind: LeaseKind,
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        let counter = match self.kind {
            LeaseKind::Surface => &self.ledger.inner.surfaces_active,
            LeaseKind::CaptureSession => &self.ledger.inner.sessions_active,
        };
        counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/ledger.rs"]
mod tests;
