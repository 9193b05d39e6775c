//! C3: the single-word cell encoding shared by every slot in a generation.
//!
//! A cell is a plain `AtomicI32`. Packing EMPTY/TOMBSTONE/key/MARK into one
//! word (rather than a wider struct) is what keeps every slot update a
//! single CAS; see the design notes on cell encoding.

/// Empty slot, never written to.
pub(crate) const EMPTY: i32 = 0;
/// Sentinel written over an erased key. Traversed (not skipped) by probing.
pub(crate) const TOMBSTONE: i32 = 0x7FFF_FFFF;
/// High bit. Set on a cell by the migration marker to freeze it for the
/// remainder of its generation's life.
pub(crate) const MARK: i32 = i32::MIN; // 0x8000_0000 as i32

/// Smallest legal key.
pub(crate) const MIN_KEY: i32 = 1;
/// Largest legal key. One below TOMBSTONE.
pub(crate) const MAX_KEY: i32 = 0x7FFF_FFFE;

pub(crate) const CHUNK_SIZE: usize = 4096;
pub(crate) const EXPANSION_FACTOR: usize = 4;
pub(crate) const MAX_PROBE: usize = 100;

#[inline]
pub(crate) fn is_marked(raw: i32) -> bool {
    raw & MARK != 0
}

#[inline]
pub(crate) fn unmark(raw: i32) -> i32 {
    raw & !MARK
}

#[inline]
pub(crate) fn is_legal_key(key: i32) -> bool {
    (MIN_KEY..=MAX_KEY).contains(&key)
}
