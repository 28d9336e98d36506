//! Allocation probe used to check that the paint loop does not grow memory per frame.
//!
//! Only instrumented with the `alloc-track` feature; otherwise every probe reports zero.
#![allow(dead_code)]

#[cfg(feature = "alloc-track")]
mod imp {
    use stats_alloc::{INSTRUMENTED_SYSTEM, Region, StatsAlloc};
    use std::alloc::System;

    #[global_allocator]
    static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

    pub(crate) const INSTRUMENTED: bool = true;

    pub(crate) struct AllocProbe {
        region: Region<'static, System>,
    }

    impl AllocProbe {
        pub(crate) fn start() -> Self {
            Self {
                region: Region::new(GLOBAL),
            }
        }

        pub(crate) fn delta(&self) -> super::AllocDelta {
            let s = self.region.change();
            super::AllocDelta {
                allocations: s.allocations,
                bytes_allocated: s.bytes_allocated,
                bytes_deallocated: s.bytes_deallocated,
            }
        }
    }
}

#[cfg(not(feature = "alloc-track"))]
mod imp {
    pub(crate) const INSTRUMENTED: bool = false;

    pub(crate) struct AllocProbe;

    impl AllocProbe {
        pub(crate) fn start() -> Self {
            Self
        }

        pub(crate) fn delta(&self) -> super::AllocDelta {
            super::AllocDelta::default()
        }
    }
}

/// Allocation activity observed since a probe started.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AllocDelta {
    pub(crate) allocations: usize,
    pub(crate) bytes_allocated: usize,
    pub(crate) bytes_deallocated: usize,
}

impl AllocDelta {
    /// Bytes still held (allocated minus freed) since the probe started.
    pub(crate) fn retained_bytes(self) -> isize {
        self.bytes_allocated as isize - self.bytes_deallocated as isize
    }
}

pub(crate) use imp::{AllocProbe, INSTRUMENTED};
