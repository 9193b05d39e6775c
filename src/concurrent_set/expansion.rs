//! C5: deciding when to resize, installing a new generation, and
//! coordinating migration through chunk claims.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::{Atomic, Guard, Owned};

use super::cell::{self, CHUNK_SIZE, MAX_PROBE};
use super::generation::Generation;
use super::probe;

/// Starts an expansion off `snapshot` if it is still the current
/// generation, then helps drain whichever generation ends up current
/// (the one this thread just installed, or one a racing thread did).
pub(crate) fn start_expand(
    current: &Atomic<Arc<Generation>>,
    tid: usize,
    num_threads: usize,
    snapshot: &Arc<Generation>,
    guard: &Guard,
) {
    let current_shared = current.load(Ordering::SeqCst, guard);
    let current_ref = unsafe { current_shared.deref() };

    if !Arc::ptr_eq(current_ref, snapshot) {
        // Someone else already advanced the generation; just help them.
        help_expand(tid, current_ref);
        return;
    }

    let expanded = Owned::new(Arc::new(Generation::expand_from(
        Arc::clone(snapshot),
        num_threads,
    )));

    match current.compare_exchange(
        current_shared,
        expanded,
        Ordering::SeqCst,
        Ordering::SeqCst,
        guard,
    ) {
        Ok(installed_shared) => {
            // SAFETY: no other thread can still be dereferencing the old
            // `Arc`-holding box through `current` after the CAS above; it
            // is only reachable via this epoch's guard from here on.
            unsafe { guard.defer_destroy(current_shared) };
            let installed = unsafe { installed_shared.deref() };
            help_expand(tid, installed);
            // `help_expand` only returns once chunks_done == total_chunks,
            // so it is now safe for the publisher (and only the
            // publisher) to release the predecessor's cell array.
            installed.release_predecessor();
            tracing::info!(
                old_capacity = snapshot.capacity,
                new_capacity = installed.capacity,
                total_chunks = installed.total_chunks,
                "expansion complete"
            );
        }
        Err(_) => {
            // Lost the race to install; our `expanded` generation is
            // dropped here, and we help whichever generation won instead.
            let current_ref = unsafe { current.load(Ordering::SeqCst, guard).deref() };
            help_expand(tid, current_ref);
        }
    }
}

/// Drains migration work for `t` out of its predecessor, if any. Returns
/// immediately if `t` has no predecessor or nothing to migrate. Every
/// caller that reaches this function, whether or not it claims any
/// chunks itself, blocks until the whole migration has drained.
pub(crate) fn help_expand(tid: usize, t: &Generation) {
    let total_chunks = t.total_chunks;
    if total_chunks == 0 {
        return;
    }

    loop {
        if t.chunks_claimed.load(Ordering::Relaxed) >= total_chunks {
            break;
        }
        let my_chunk = t.chunks_claimed.fetch_add(1, Ordering::Relaxed);
        if my_chunk < total_chunks {
            migrate_chunk(tid, t, my_chunk);
            // Release: publishes this chunk's copied-in keys to whatever
            // thread observes chunks_done reaching total_chunks below.
            t.chunks_done.fetch_add(1, Ordering::Release);
        }
    }

    // Acquire: synchronizes-with the Release increment above, so once this
    // loop exits every migrated key from every chunk is visible here.
    while t.chunks_done.load(Ordering::Acquire) < total_chunks {
        std::hint::spin_loop();
    }
}

/// Migrates one chunk of the predecessor's cell array into `t`: marks
/// every cell in range immutable, then re-inserts every live key.
fn migrate_chunk(tid: usize, t: &Generation, chunk: usize) {
    let Some(predecessor) = t.predecessor() else {
        // Another thread already fully drained and released it; nothing
        // left for this chunk to do (chunks_claimed only goes this far
        // once, so in practice this path is not reachable, but it keeps
        // the function total rather than panicking on a race we can't
        // fully rule out from this vantage point).
        return;
    };

    let lo = chunk * CHUNK_SIZE;
    let hi = ((chunk + 1) * CHUNK_SIZE).min(t.old_capacity);
    let old_data = &predecessor.data;

    // Phase 1: mark every cell in range, freezing it for the rest of the
    // predecessor's life.
    for slot in old_data[lo..hi].iter() {
        loop {
            let v = slot.load(Ordering::SeqCst);
            if slot
                .compare_exchange(v, v | cell::MARK, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }
    }

    // Phase 2: decide whether a concurrent insert could still be probing
    // across this chunk's boundary into a cell we're about to copy out of
    // order. If the neighbors on both sides are (and were before marking)
    // EMPTY, no in-flight probe chain could reach into this chunk, so
    // plain stores into EMPTY destination cells are sound; otherwise we
    // must CAS.
    let is_boundary_empty = |idx: usize| -> bool {
        let v = old_data[idx].load(Ordering::SeqCst);
        cell::unmark(v) == cell::EMPTY
    };
    let left_safe = lo == 0 || is_boundary_empty(lo - 1);
    let right_safe = hi == t.old_capacity || is_boundary_empty(hi);
    let safe = left_safe && right_safe;

    for slot in old_data[lo..hi].iter() {
        let v = cell::unmark(slot.load(Ordering::SeqCst));
        if v != cell::EMPTY && v != cell::TOMBSTONE {
            probe::insert_during_migration(t, tid, v, safe);
        }
    }
}

/// The per-probe-step expansion trigger consulted by `insertIfAbsent`.
/// Helps drain any migration already in progress on `snapshot`, then
/// checks whether load has crossed the resize threshold; if so, starts
/// (or helps) an expansion and tells the caller to restart. Mirrors the
/// original source's choice to read `insertCounter` alone rather than
/// `insertCounter - deleteCounter`: this makes the load estimate
/// monotonic upward, so a heavily churned but sparsely populated table
/// can still trigger an expansion it doesn't strictly need.
pub(crate) fn maybe_expand(
    current: &Atomic<Arc<Generation>>,
    tid: usize,
    num_threads: usize,
    snapshot: &Arc<Generation>,
    probe_step: usize,
    guard: &Guard,
) -> bool {
    help_expand(tid, snapshot);

    let half_capacity = (snapshot.capacity / 2) as i64;
    let over_threshold = snapshot.insert_counter.get() > half_capacity
        || (probe_step > MAX_PROBE && snapshot.insert_counter.get_accurate() > half_capacity);

    if over_threshold {
        start_expand(current, tid, num_threads, snapshot, guard);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch as epoch;

    fn load_current<'g>(
        current: &Atomic<Arc<Generation>>,
        guard: &'g Guard,
    ) -> &'g Arc<Generation> {
        unsafe { current.load(Ordering::SeqCst, guard).deref() }
    }

    #[test]
    fn expansion_migrates_all_live_keys_and_drops_tombstones() {
        let guard = epoch::pin();
        let initial = Arc::new(Generation::initial(8, 1));
        for key in [1, 2, 3, 4] {
            assert!(probe::insert_during_migration(&initial, 0, key, true));
        }
        assert!(matches!(
            probe::erase(&initial, 0, 2, |_| {}),
            probe::EraseOutcome::Erased
        ));

        let current = Atomic::new(Arc::clone(&initial));
        start_expand(&current, 0, 1, &initial, &guard);

        let installed = load_current(&current, &guard);
        assert!(installed.capacity >= initial.capacity);
        assert!(installed.predecessor().is_none());

        let mut present: Vec<i32> = installed
            .data
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .filter(|&v| v != cell::EMPTY && v != cell::TOMBSTONE)
            .collect();
        present.sort_unstable();
        assert_eq!(present, vec![1, 3, 4]);

        unsafe {
            drop(current.into_owned());
        }
    }

    #[test]
    fn losing_the_install_race_still_helps_the_winner() {
        let guard = epoch::pin();
        let initial = Arc::new(Generation::initial(4, 1));
        probe::insert_during_migration(&initial, 0, 1, true);
        let current = Atomic::new(Arc::clone(&initial));

        // Simulate a racing thread winning the CAS first.
        start_expand(&current, 0, 1, &initial, &guard);
        // This call now observes `current != initial` and should just help.
        start_expand(&current, 0, 1, &initial, &guard);

        let installed = load_current(&current, &guard);
        assert!(installed.chunks_done.load(Ordering::SeqCst) >= installed.total_chunks);

        unsafe {
            drop(current.into_owned());
        }
    }
}
