//! A concurrent, fixed-key-domain set of 32-bit integers.
//!
//! The table is open-addressed with linear probing and resizes itself
//! cooperatively: any thread may observe that load has crossed a threshold
//! and start an expansion, but the actual migration work is performed by
//! whichever threads next touch the table (the thread that started the
//! expansion, plus any other caller that helps drain it). At most two
//! generations of the backing array are ever reachable at once.
//!
//! See [`ConcurrentU32Set`] for the public API.

mod concurrent_set;

pub use concurrent_set::error::SetError;
pub use concurrent_set::set::ConcurrentU32Set;
