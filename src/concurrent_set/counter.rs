//! C2: an approximate distributed counter, read by summation.
//!
//! Increments vastly outnumber reads (every successful insert/erase bumps
//! a counter, but reads only happen on the cheap load-check path and on
//! generation construction). A single shared atomic would serialize every
//! mutator on one cache line; instead each thread owns a padded slot it
//! alone writes, and reads sum across all slots without coordination.

use std::sync::atomic::{AtomicI64, Ordering};

/// One thread's counter slot, padded to a cache line so neighboring slots
/// never false-share.
#[repr(align(64))]
struct PaddedSlot(AtomicI64);

pub(crate) struct DistributedCounter {
    slots: Box<[PaddedSlot]>,
}

impl DistributedCounter {
    pub(crate) fn new(num_threads: usize) -> Self {
        let mut slots = Vec::with_capacity(num_threads);
        slots.resize_with(num_threads, || PaddedSlot(AtomicI64::new(0)));
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    /// Wait-free single store into the caller's own slot.
    #[inline]
    pub(crate) fn inc(&self, tid: usize) {
        self.slots[tid].0.fetch_add(1, Ordering::SeqCst);
    }

    /// Approximate sum across all slots. Racy: a concurrent `inc` on any
    /// slot may or may not be reflected.
    pub(crate) fn get(&self) -> i64 {
        self.slots.iter().map(|s| s.0.load(Ordering::SeqCst)).sum()
    }

    /// Semantically the same read as `get`, used at call sites that treat
    /// it as a confirmation read after the cheap path already suspects the
    /// threshold was crossed.
    #[inline]
    pub(crate) fn get_accurate(&self) -> i64 {
        self.get()
    }
}
