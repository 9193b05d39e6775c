//! Model-checks the single-slot CAS race at the heart of `insert_if_absent`
//! under every thread interleaving loom can enumerate for a small table.
//!
//! This models the cell-level protocol in isolation (two threads racing to
//! claim one EMPTY slot, and a third marking it mid-race) rather than
//! running the full crate under loom: the production code paths use
//! `crossbeam_epoch` and `parking_lot`, neither of which loom understands,
//! so driving the whole `ConcurrentU32Set` through loom isn't possible
//! without a parallel sync-abstraction layer (see `vasi_sync::sync` for
//! what that looks like at scale). The race this test checks is exactly
//! the one `probe::insert_if_absent` resolves: at most one of two
//! concurrent inserts of *distinct* keys into the same EMPTY slot wins,
//! and a concurrent mark makes the slot immutable from then on.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --test loom_probe --release`

#![cfg(loom)]

use loom::sync::atomic::{AtomicI32, Ordering};
use loom::sync::Arc;
use loom::thread;

const EMPTY: i32 = 0;
const MARK: i32 = i32::MIN;

fn try_insert(cell: &AtomicI32, key: i32) -> bool {
    let found = cell.load(Ordering::SeqCst);
    if found & MARK != 0 || found == key {
        return false;
    }
    if found == EMPTY {
        return cell
            .compare_exchange(EMPTY, key, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
    }
    false
}

#[test]
fn two_inserts_of_distinct_keys_never_both_win() {
    loom::model(|| {
        let cell = Arc::new(AtomicI32::new(EMPTY));

        let c1 = Arc::clone(&cell);
        let t1 = thread::spawn(move || try_insert(&c1, 11));
        let c2 = Arc::clone(&cell);
        let t2 = thread::spawn(move || try_insert(&c2, 22));

        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();

        assert!(!(r1 && r2), "both inserts cannot win the same empty slot");
        let final_value = cell.load(Ordering::SeqCst);
        if r1 {
            assert_eq!(final_value, 11);
        }
        if r2 {
            assert_eq!(final_value, 22);
        }
    });
}

#[test]
fn mark_wins_freeze_the_slot_for_any_later_insert() {
    loom::model(|| {
        let cell = Arc::new(AtomicI32::new(EMPTY));

        let c1 = Arc::clone(&cell);
        let marker = thread::spawn(move || loop {
            let v = c1.load(Ordering::SeqCst);
            if c1
                .compare_exchange(v, v | MARK, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        });
        let c2 = Arc::clone(&cell);
        let inserter = thread::spawn(move || try_insert(&c2, 7));

        marker.join().unwrap();
        let inserted = inserter.join().unwrap();

        let final_value = cell.load(Ordering::SeqCst);
        assert!(final_value & MARK != 0, "slot must end up marked");
        if inserted {
            assert_eq!(final_value & !MARK, 7);
        }
    });
}
