/*
 * Created on Sat Mar 09 2024
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

//! Dense reader thread ids.
//!
//! Every thread that runs a read operation gets a small integer in
//! `[0, READER_CAPACITY)` on first use, which indexes that thread's slot in
//! every tree's reclaimer. The id is scoped to the thread: a thread-local
//! holder returns it to the process-wide pool when the thread exits, so ids
//! get recycled and the slot arrays stay small and dense.

use parking_lot::Mutex;

/// Upper bound on reader threads registered at any one time. Trees size
/// their reclaimer slot arrays to this, so going past it is a deployment
/// configuration error, not a runtime condition.
pub const READER_CAPACITY: usize = 64;

struct IdPool {
    /// ids returned by exited threads, reused LIFO
    free: Vec<u16>,
    /// next never-used id
    next: u16,
}

static POOL: Mutex<IdPool> = Mutex::new(IdPool {
    free: Vec::new(),
    next: 0,
});

/// Scoped holder for one reader id. Lives in a `thread_local`; dropping it
/// (thread exit) hands the id back.
struct ThreadId {
    id: u16,
}

impl ThreadId {
    fn acquire() -> Self {
        let mut pool = POOL.lock();
        let id = match pool.free.pop() {
            Some(id) => id,
            None => {
                let fresh = pool.next;
                assert!(
                    (fresh as usize) < READER_CAPACITY,
                    "more than {READER_CAPACITY} concurrent reader threads; raise READER_CAPACITY"
                );
                pool.next += 1;
                fresh
            }
        };
        log::trace!("tid: thread registered as reader {id}");
        Self { id }
    }
}

impl Drop for ThreadId {
    fn drop(&mut self) {
        POOL.lock().free.push(self.id);
        log::trace!("tid: reader {} released", self.id);
    }
}

thread_local! {
    static SELF_ID: ThreadId = ThreadId::acquire();
}

/// Returns the calling thread's reader id, registering it on first use
#[inline(always)]
pub(crate) fn current() -> usize {
    SELF_ID.with(|tid| tid.id as usize)
}

#[cfg(test)]
mod tests {
    use {
        super::{current, READER_CAPACITY},
        std::thread,
    };

    #[test]
    fn stable_within_thread() {
        assert_eq!(current(), current());
    }

    #[test]
    fn dense_and_recycled() {
        let mut seen = vec![];
        for _ in 0..4 {
            // sequential spawns: each thread dies before the next starts, so
            // its id goes back to the pool and the set stays small
            let id = thread::spawn(current).join().unwrap();
            seen.push(id);
        }
        assert!(seen.iter().all(|&id| id < READER_CAPACITY));
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }
}
