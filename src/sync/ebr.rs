/*
 * Created on Sun Mar 10 2024
 *
 * This file is a part of Artex
 * Artex is a concurrent adaptive radix tree written by Sayan Nandan
 * ("the Author") with the vision to provide a fast in-memory index for
 * write heavy workloads without compromising on read side latency.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

/*
    epoch based reclamation
    ---
    Readers announce themselves in a per-thread slot (active flag + the epoch
    they observed) and then traverse without any further synchronization.
    Writers hand unlinked objects to `retire`, which files them under the
    current global epoch. The epoch only ever advances when every active
    reader has caught up with it, which means a reader can lag the global
    epoch by at most one. With three buckets in rotation, the bucket two
    steps behind the fresh epoch is therefore unobservable and safe to free.

    One deliberate difference from the usual textbook sketch: draining a
    bucket swaps its head to null atomically instead of load + free + store.
    A retirement that stalled between reading the global epoch and pushing
    can then never interleave with a drain of the same bucket; the late push
    lands in the emptied bucket and simply waits one more rotation.
*/

use {
    super::{tid, ORD_ACQ, ORD_ACR, ORD_REL, ORD_RLX},
    crossbeam_utils::CachePadded,
    std::{
        marker::PhantomData,
        ptr,
        sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU8, AtomicUsize},
    },
};

/// Number of epoch buckets in rotation
pub const EPOCHS: usize = 3;
/// Retirements between opportunistic GC attempts
const GC_THRESHOLD: u32 = tid::READER_CAPACITY as u32;

/// An object that can be handed to the reclaimer once it has been unlinked
/// from the live structure.
pub trait Reclaim {
    /// Free `this`. Must not follow outgoing links: anything reachable from
    /// the object may still be live under a replacement parent.
    unsafe fn reclaim(this: *mut Self);
}

struct ReaderSlot {
    active: AtomicBool,
    epoch: AtomicU8,
}

impl ReaderSlot {
    const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            epoch: AtomicU8::new(0),
        }
    }
}

struct Retired<T> {
    obj: *mut T,
    next: *mut Retired<T>,
}

/// The reclaimer. One instance per tree; reader slots are indexed by the
/// process-wide dense thread id, so the same thread can read any number of
/// trees through the one registration.
pub struct Ebr<T: Reclaim> {
    global_epoch: CachePadded<AtomicU8>,
    slots: Box<[CachePadded<ReaderSlot>]>,
    retired: [AtomicPtr<Retired<T>>; EPOCHS],
    /// at most one thread runs GC at a time
    update: AtomicBool,
    /// retirements since the last successful epoch bump
    write_cnt: AtomicU32,
    reclaimed: AtomicUsize,
}

/// RAII read session. While this is live, nothing the guard's thread can
/// reach through the protected structure will be freed.
pub struct ReadGuard<'a, T: Reclaim> {
    slot: &'a ReaderSlot,
    _t: PhantomData<&'a Ebr<T>>,
}

impl<T: Reclaim> Drop for ReadGuard<'_, T> {
    #[inline(always)]
    fn drop(&mut self) {
        self.slot.active.store(false, ORD_REL);
    }
}

impl<T: Reclaim> Ebr<T> {
    const NULL_BUCKET: AtomicPtr<Retired<T>> = AtomicPtr::new(ptr::null_mut());
    pub fn new() -> Self {
        Self {
            global_epoch: CachePadded::new(AtomicU8::new(0)),
            slots: (0..tid::READER_CAPACITY)
                .map(|_| CachePadded::new(ReaderSlot::new()))
                .collect(),
            retired: [Self::NULL_BUCKET; EPOCHS],
            update: AtomicBool::new(false),
            write_cnt: AtomicU32::new(0),
            reclaimed: AtomicUsize::new(0),
        }
    }
    /// Open a read session for the calling thread. Guards must not nest: a
    /// fresh guard re-announces the thread's observed epoch, which would
    /// void the protection of an outer guard on the same thread.
    pub fn pin(&self) -> ReadGuard<'_, T> {
        let slot = &*self.slots[tid::current()];
        debug_assert!(!slot.active.load(ORD_RLX), "logic,nested read guards");
        slot.active.store(true, ORD_REL);
        slot.epoch.store(self.global_epoch.load(ORD_ACQ), ORD_REL);
        ReadGuard {
            slot,
            _t: PhantomData,
        }
    }
    /// File an unlinked object for deferred destruction. The caller asserts
    /// that the object can no longer be reached from the structure's root
    /// by any traversal that starts after this call.
    pub fn retire(&self, obj: *mut T) {
        let epoch = self.global_epoch.load(ORD_ACQ) as usize;
        let node = Box::into_raw(Box::new(Retired {
            obj,
            next: ptr::null_mut(),
        }));
        let bucket = &self.retired[epoch];
        let mut head = bucket.load(ORD_ACQ);
        loop {
            unsafe {
                // UNSAFE(@ohsayan): node is ours until the CAS below succeeds
                (*node).next = head;
            }
            match bucket.compare_exchange_weak(head, node, ORD_ACR, ORD_ACQ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        if self.write_cnt.fetch_add(1, ORD_RLX) > GC_THRESHOLD {
            self.opportunistic_gc();
        }
    }
    fn opportunistic_gc(&self) {
        if self.update.swap(true, ORD_ACR) {
            // someone else is on it
            return;
        }
        self.try_gc();
        self.update.store(false, ORD_REL);
    }
    /// Attempt one epoch bump. Succeeds only if every active reader has
    /// observed the current epoch; the bucket two steps behind the fresh
    /// epoch is then unobservable and gets freed.
    fn try_gc(&self) {
        let epoch = self.global_epoch.load(ORD_ACQ);
        for slot in self.slots.iter() {
            if slot.active.load(ORD_ACQ) && slot.epoch.load(ORD_ACQ) != epoch {
                // lagging reader; try again after more retirements
                return;
            }
        }
        self.global_epoch
            .store((epoch + 1) % EPOCHS as u8, ORD_REL);
        let freed = self.clear_bucket((epoch as usize + 2) % EPOCHS);
        self.write_cnt.store(0, ORD_RLX);
        log::trace!(
            "ebr: epoch {epoch} -> {}, freed {freed}",
            (epoch + 1) % EPOCHS as u8
        );
    }
    fn clear_bucket(&self, idx: usize) -> usize {
        let mut cur = self.retired[idx].swap(ptr::null_mut(), ORD_ACQ);
        let mut freed = 0;
        while !cur.is_null() {
            let retired = unsafe {
                // UNSAFE(@ohsayan): we own the whole chain after the swap
                Box::from_raw(cur)
            };
            unsafe {
                // UNSAFE(@ohsayan): filed exactly once, by contract of retire
                T::reclaim(retired.obj);
            }
            cur = retired.next;
            freed += 1;
        }
        self.reclaimed.fetch_add(freed, ORD_RLX);
        freed
    }
    /// Free everything in all buckets, irrespective of epochs. Only sound
    /// once no reader can still be inside a session (enforced by callers
    /// holding `&mut` ownership of the structure being torn down).
    pub fn drain_all(&self) -> usize {
        (0..EPOCHS).map(|idx| self.clear_bucket(idx)).sum()
    }
    /// Objects freed so far (includes drains)
    pub fn reclaimed(&self) -> usize {
        self.reclaimed.load(ORD_RLX)
    }
}

impl<T: Reclaim> Drop for Ebr<T> {
    fn drop(&mut self) {
        let pending = self.drain_all();
        if pending != 0 {
            log::trace!("ebr: freed {pending} pending objects on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{Ebr, Reclaim, GC_THRESHOLD},
        std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Reclaim for Counted {
        unsafe fn reclaim(this: *mut Self) {
            drop(Box::from_raw(this));
        }
    }

    fn retire_n(ebr: &Ebr<Counted>, drops: &Arc<AtomicUsize>, n: usize) {
        for _ in 0..n {
            ebr.retire(Box::into_raw(Box::new(Counted(drops.clone()))));
        }
    }

    #[test]
    fn everything_freed_on_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ebr: Ebr<Counted> = Ebr::new();
        retire_n(&ebr, &drops, 100);
        drop(ebr);
        assert_eq!(drops.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn idle_readers_let_the_epoch_turn() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ebr: Ebr<Counted> = Ebr::new();
        // enough traffic for several epoch bumps; with no readers pinned,
        // earlier buckets must start draining before the ebr is dropped
        retire_n(&ebr, &drops, GC_THRESHOLD as usize * 8);
        assert!(drops.load(Ordering::Relaxed) > 0);
        drop(ebr);
        assert_eq!(drops.load(Ordering::Relaxed), GC_THRESHOLD as usize * 8);
    }

    #[test]
    fn stale_reader_blocks_reclamation() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ebr: Ebr<Counted> = Ebr::new();
        let g = ebr.pin();
        let total = GC_THRESHOLD as usize * 8;
        retire_n(&ebr, &drops, total);
        // the pinned reader went stale after the first bump; at least one
        // bucket stays held back until it unpins
        assert!(drops.load(Ordering::Relaxed) < total);
        drop(g);
        retire_n(&ebr, &drops, GC_THRESHOLD as usize * 8);
        drop(ebr);
        assert_eq!(drops.load(Ordering::Relaxed), total + GC_THRESHOLD as usize * 8);
    }
}
