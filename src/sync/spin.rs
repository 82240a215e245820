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

use {
    super::{ORD_ACQ, ORD_REL, ORD_RLX},
    std::{hint, sync::atomic::AtomicU8, thread, time::Duration},
};

const FREE: u8 = 0;
const LOCKED: u8 = 1;
/// Pause-hint iterations before a waiter degrades to sleeping
const MAX_ACTIVE_SPIN: u32 = 4_000;
const SLEEP_TIME: Duration = Duration::from_micros(500);

/// Adaptive busy-wait state. Burns a few thousand pause hints first and only
/// then starts yielding the core in short sleeps, so uncontended handoffs
/// stay in userspace.
pub struct Sleeper {
    spin_count: u32,
}

impl Sleeper {
    pub const fn new() -> Self {
        Self { spin_count: 0 }
    }
    #[inline(always)]
    pub fn wait(&mut self) {
        if self.spin_count < MAX_ACTIVE_SPIN {
            self.spin_count += 1;
            hint::spin_loop();
        } else {
            thread::sleep(SLEEP_TIME);
        }
    }
}

/// A one byte test-and-set lock. Writers use it for per-node mutual
/// exclusion; readers never touch it. No fairness of any kind.
pub struct SpinLock {
    state: AtomicU8,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
        }
    }
    #[inline(always)]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(FREE, LOCKED, ORD_ACQ, ORD_RLX)
            .is_ok()
    }
    pub fn lock(&self) {
        let mut sleeper = Sleeper::new();
        while !self.try_lock() {
            // wait for the holder to let go before retrying the CAS; spinning
            // on the load keeps the line shared instead of bouncing it
            loop {
                sleeper.wait();
                if self.state.load(ORD_RLX) != LOCKED {
                    break;
                }
            }
        }
    }
    #[inline(always)]
    pub fn unlock(&self) {
        self.state.store(FREE, ORD_REL);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::SpinLock,
        std::{
            sync::{
                atomic::{AtomicUsize, Ordering},
                Arc,
            },
            thread,
        },
    };

    #[test]
    fn uncontended() {
        let lock = SpinLock::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        lock.unlock();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn mutual_exclusion() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 10_000;
        let lock = Arc::new(SpinLock::new());
        let shared = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let lock = lock.clone();
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        lock.lock();
                        // unsynchronized rmw; only correct if the lock is
                        let cur = shared.load(Ordering::Relaxed);
                        shared.store(cur + 1, Ordering::Relaxed);
                        lock.unlock();
                    }
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());
        assert_eq!(shared.load(Ordering::Relaxed), THREADS * ROUNDS);
    }
}
