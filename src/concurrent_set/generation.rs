//! C3: one version of the cell array, plus the bookkeeping an expansion
//! needs to migrate out of its predecessor.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::cell::{self, CHUNK_SIZE, EXPANSION_FACTOR};
use super::counter::DistributedCounter;

/// One version of the backing array. At most two of these are ever
/// reachable at once: the current generation, and (while a migration
/// drains) its predecessor, held alive through `old`.
pub(crate) struct Generation {
    pub(crate) data: Box<[AtomicI32]>,
    pub(crate) capacity: usize,

    /// The predecessor this generation is migrating out of, if any.
    /// Cleared (dropping the `Arc`) by the publishing thread once
    /// `chunks_done == total_chunks`, which is the only point at which the
    /// predecessor's cell array is released. See the open question in the
    /// design notes about why this must not happen earlier.
    pub(crate) old: Mutex<Option<Arc<Generation>>>,
    pub(crate) old_capacity: usize,
    pub(crate) total_chunks: usize,

    pub(crate) insert_counter: DistributedCounter,
    pub(crate) delete_counter: DistributedCounter,

    pub(crate) chunks_claimed: AtomicUsize,
    pub(crate) chunks_done: AtomicUsize,
}

fn new_cells(capacity: usize) -> Box<[AtomicI32]> {
    let mut cells = Vec::with_capacity(capacity);
    cells.resize_with(capacity, || AtomicI32::new(cell::EMPTY));
    cells.into_boxed_slice()
}

impl Generation {
    /// The very first generation a set is constructed with: no predecessor.
    pub(crate) fn initial(capacity: usize, num_threads: usize) -> Self {
        let capacity = capacity.max(1);
        tracing::debug!(capacity, "constructing initial generation");
        Self {
            data: new_cells(capacity),
            capacity,
            old: Mutex::new(None),
            old_capacity: 0,
            total_chunks: 0,
            insert_counter: DistributedCounter::new(num_threads),
            delete_counter: DistributedCounter::new(num_threads),
            chunks_claimed: AtomicUsize::new(0),
            chunks_done: AtomicUsize::new(0),
        }
    }

    /// A generation created by the expansion controller, sized off the
    /// predecessor's approximate population.
    pub(crate) fn expand_from(predecessor: Arc<Generation>, num_threads: usize) -> Self {
        let old_capacity = predecessor.capacity;
        let population = predecessor.insert_counter.get() - predecessor.delete_counter.get();
        let capacity = (population.max(0) as usize)
            .max(old_capacity)
            .saturating_mul(EXPANSION_FACTOR)
            .max(1);
        let total_chunks = old_capacity.div_ceil(CHUNK_SIZE);
        tracing::debug!(
            old_capacity,
            approx_population = population,
            new_capacity = capacity,
            total_chunks,
            "constructing expansion generation"
        );
        Self {
            data: new_cells(capacity),
            capacity,
            old: Mutex::new(Some(predecessor)),
            old_capacity,
            total_chunks,
            insert_counter: DistributedCounter::new(num_threads),
            delete_counter: DistributedCounter::new(num_threads),
            chunks_claimed: AtomicUsize::new(0),
            chunks_done: AtomicUsize::new(0),
        }
    }

    /// Releases the predecessor's cell array. Must only be called once the
    /// caller has confirmed `chunks_done >= total_chunks`.
    pub(crate) fn release_predecessor(&self) {
        debug_assert!(self.chunks_done.load(Ordering::SeqCst) >= self.total_chunks);
        self.old.lock().take();
    }

    /// Snapshot of the predecessor, if migration out of it is still
    /// (possibly) in progress. Cloning the `Arc` is cheap and keeps the
    /// predecessor alive for the duration of this migration step even if
    /// another thread concurrently releases it right after.
    pub(crate) fn predecessor(&self) -> Option<Arc<Generation>> {
        self.old.lock().clone()
    }
}
