//! C6: the public value type. Publishes the current generation, routes
//! operations to the probe engine (C4), and retries against a fresh
//! generation whenever it observes a migration in progress (C5).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::{self as epoch, Atomic};

use super::cell;
use super::error::SetError;
use super::expansion;
use super::generation::Generation;
use super::probe::{self, EraseOutcome, InsertOutcome};

/// A concurrent set of 32-bit integers in `[1, 0x7FFFFFFE]`.
///
/// Callers identify themselves with a stable `tid` in `[0, num_threads)`,
/// fixed for the lifetime of the set. There is no thread registration API:
/// `num_threads` is declared once, at construction.
pub struct ConcurrentU32Set {
    current: Atomic<Arc<Generation>>,
    num_threads: usize,
}

impl ConcurrentU32Set {
    /// Creates a set sized for up to `num_threads` concurrent callers and
    /// an initial capacity of `initial_capacity` slots (rounded up to at
    /// least 1).
    pub fn new(num_threads: usize, initial_capacity: usize) -> Self {
        assert!(num_threads >= 1, "a set needs at least one thread slot");
        let initial = Arc::new(Generation::initial(initial_capacity, num_threads));
        Self {
            current: Atomic::new(initial),
            num_threads,
        }
    }

    fn validate(&self, tid: usize, key: i32) -> Result<(), SetError> {
        if tid >= self.num_threads {
            return Err(SetError::InvalidThreadId {
                tid,
                num_threads: self.num_threads,
            });
        }
        if !cell::is_legal_key(key) {
            return Err(SetError::KeyOutOfRange { key });
        }
        Ok(())
    }

    /// Inserts `key` if it is not already present. Returns `Ok(true)` if
    /// this call changed the set's state.
    pub fn insert_if_absent(&self, tid: usize, key: i32) -> Result<bool, SetError> {
        self.validate(tid, key)?;
        let guard = epoch::pin();

        loop {
            let shared = self.current.load(Ordering::SeqCst, &guard);
            let snapshot = unsafe { shared.deref() };

            let outcome = probe::insert_if_absent(snapshot, tid, key, |step| {
                expansion::maybe_expand(
                    &self.current,
                    tid,
                    self.num_threads,
                    snapshot,
                    step,
                    &guard,
                )
            });

            match outcome {
                InsertOutcome::Inserted => return Ok(true),
                InsertOutcome::AlreadyPresent => return Ok(false),
                InsertOutcome::Exhausted => return Ok(false),
                InsertOutcome::Migrated => continue,
            }
        }
    }

    /// Erases `key` if present. Returns `Ok(true)` if this call changed
    /// the set's state.
    pub fn erase(&self, tid: usize, key: i32) -> Result<bool, SetError> {
        self.validate(tid, key)?;
        let guard = epoch::pin();

        loop {
            let shared = self.current.load(Ordering::SeqCst, &guard);
            let snapshot = unsafe { shared.deref() };

            let outcome = probe::erase(snapshot, tid, key, |_step| {
                expansion::help_expand(tid, snapshot);
            });

            match outcome {
                EraseOutcome::Erased => return Ok(true),
                EraseOutcome::Absent => return Ok(false),
                EraseOutcome::Migrated => continue,
            }
        }
    }

    /// The arithmetic sum of every key currently present. Meaningful only
    /// when called in quiescence (no concurrent `insert_if_absent`/`erase`
    /// calls), as it walks the current generation without synchronizing
    /// against them.
    pub fn sum_of_keys(&self) -> i64 {
        let guard = epoch::pin();
        let shared = self.current.load(Ordering::SeqCst, &guard);
        let gen = unsafe { shared.deref() };

        gen.data
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .filter(|&v| v != cell::EMPTY && v != cell::TOMBSTONE)
            .map(i64::from)
            .sum()
    }

    /// Logs and returns a human-readable summary of the current
    /// generation: capacity, approximate population, and a breakdown of
    /// live/tombstone/empty slot counts.
    pub fn print_diagnostics(&self) -> String {
        let guard = epoch::pin();
        let shared = self.current.load(Ordering::SeqCst, &guard);
        let gen = unsafe { shared.deref() };

        let mut live = 0usize;
        let mut tombstones = 0usize;
        let mut empty = 0usize;
        for c in gen.data.iter() {
            match c.load(Ordering::Relaxed) {
                cell::EMPTY => empty += 1,
                cell::TOMBSTONE => tombstones += 1,
                _ => live += 1,
            }
        }
        let approx_population = gen.insert_counter.get() - gen.delete_counter.get();

        tracing::info!(
            capacity = gen.capacity,
            approx_population,
            live,
            tombstones,
            empty,
            "set diagnostics"
        );

        format!(
            "capacity={} approx_population={} live={} tombstones={} empty={}",
            gen.capacity, approx_population, live, tombstones, empty
        )
    }
}

impl Drop for ConcurrentU32Set {
    fn drop(&mut self) {
        // The set is assumed to be quiescent at teardown: no in-flight
        // operation is still dereferencing the current generation. Under
        // that assumption `unprotected` is sound, matching the original
        // source's destructor, which likewise does not wait for in-flight
        // operations.
        unsafe {
            let shared = self.current.load(Ordering::SeqCst, epoch::unprotected());
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

// SAFETY: every field is either `Sync` (`Atomic<Arc<Generation>>`) or a
// plain `usize`; the set has no interior mutability that isn't already
// behind an atomic or a `parking_lot::Mutex`.
unsafe impl Sync for ConcurrentU32Set {}
unsafe impl Send for ConcurrentU32Set {}
