//! C4: linear probing over a single generation.
//!
//! These functions never look past their own generation: observing a
//! marked cell means this generation is (or was) being migrated out of,
//! and the caller must resolve that against C5/C6 rather than this module
//! guessing at it.

use std::sync::atomic::Ordering;

use super::cell::{self, EMPTY, MARK, TOMBSTONE};
use super::generation::Generation;
use super::hash;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    Inserted,
    AlreadyPresent,
    /// The slot this call would have used was marked for migration; the
    /// caller must retry against the current generation.
    Migrated,
    Exhausted,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EraseOutcome {
    Erased,
    Absent,
    Migrated,
}

/// Attempts to insert `key` into `gen`. `before_step(step)` is invoked
/// before every probe position is examined (mirroring the original
/// source's interleaving of the expansion trigger with the probe loop);
/// if it returns `true`, probing stops immediately and the caller should
/// restart the whole operation against a possibly-new current generation.
pub(crate) fn insert_if_absent(
    gen: &Generation,
    tid: usize,
    key: i32,
    mut before_step: impl FnMut(usize) -> bool,
) -> InsertOutcome {
    debug_assert!(cell::is_legal_key(key));
    let start = hash::probe_start(key, gen.capacity);

    for step in 0..gen.capacity {
        if before_step(step) {
            return InsertOutcome::Migrated;
        }

        let index = hash::probe_index(start, step, gen.capacity);
        let slot = &gen.data[index];
        let found = slot.load(Ordering::SeqCst);

        if cell::is_marked(found) {
            return InsertOutcome::Migrated;
        }
        if found == key {
            return InsertOutcome::AlreadyPresent;
        }
        if found == EMPTY {
            match slot.compare_exchange(EMPTY, key, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    gen.insert_counter.inc(tid);
                    return InsertOutcome::Inserted;
                }
                Err(observed) => {
                    if cell::is_marked(observed) {
                        return InsertOutcome::Migrated;
                    }
                    if observed == key {
                        return InsertOutcome::AlreadyPresent;
                    }
                    // Lost the race for this slot to some other key; it is
                    // no longer empty, so move on rather than re-probing it.
                }
            }
        }
    }
    InsertOutcome::Exhausted
}

/// Attempts to erase `key` from `gen`. `before_step` is invoked before
/// every probe position purely to let erase help an in-progress
/// expansion; unlike insert it never causes a restart on its own.
pub(crate) fn erase(
    gen: &Generation,
    tid: usize,
    key: i32,
    mut before_step: impl FnMut(usize),
) -> EraseOutcome {
    debug_assert!(cell::is_legal_key(key));
    let start = hash::probe_start(key, gen.capacity);

    for step in 0..gen.capacity {
        before_step(step);

        let index = hash::probe_index(start, step, gen.capacity);
        let slot = &gen.data[index];
        let found = slot.load(Ordering::SeqCst);

        if cell::is_marked(found) {
            return EraseOutcome::Migrated;
        }
        if found == EMPTY {
            return EraseOutcome::Absent;
        }
        if found == key {
            match slot.compare_exchange(key, TOMBSTONE, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    gen.delete_counter.inc(tid);
                    return EraseOutcome::Erased;
                }
                Err(observed) => {
                    if cell::is_marked(observed) {
                        return EraseOutcome::Migrated;
                    }
                    if observed == TOMBSTONE {
                        return EraseOutcome::Absent;
                    }
                    // CAS lost to a concurrent erase of a different key
                    // that landed here after a prior tombstone; keep going.
                }
            }
        }
    }
    EraseOutcome::Absent
}

/// Re-inserts a key that survived migration marking into the destination
/// generation. `safe` permits relaxed loads/plain stores into cells that
/// are provably unreachable from any in-flight client insert (see
/// `expansion::migrate_chunk`); duplicates are silently dropped since the
/// key may already have been copied by another migrator or inserted
/// directly by a concurrent client operation.
pub(crate) fn insert_during_migration(gen: &Generation, tid: usize, key: i32, safe: bool) -> bool {
    debug_assert!(cell::is_legal_key(key));
    let start = hash::probe_start(key, gen.capacity);

    for step in 0..gen.capacity {
        let index = hash::probe_index(start, step, gen.capacity);
        let slot = &gen.data[index];

        if safe {
            // Known unreachable from concurrent writers: relaxed is sound.
            let found = slot.load(Ordering::Relaxed);
            if found == EMPTY {
                slot.store(key, Ordering::Relaxed);
                gen.insert_counter.inc(tid);
                return true;
            }
            if found == key {
                return false;
            }
        } else {
            let found = slot.load(Ordering::SeqCst);
            if found == EMPTY {
                if slot
                    .compare_exchange(EMPTY, key, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    gen.insert_counter.inc(tid);
                    return true;
                }
            } else if found == key {
                return false;
            }
        }
    }
    false
}
