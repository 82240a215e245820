/*
 * Created on Fri Mar 15 2024
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

pub mod imp;
pub mod node;
mod patch;
#[cfg(test)]
mod tests;

/*
    the engine
    ---
    Readers pin the reclaimer and walk the radix path with acquire loads;
    they never lock, never CAS. Writers run hand over hand: a node's lock is
    only ever taken while its parent's lock is held, and the sentinel lock
    above the real root gives the very first hop the same shape as every
    other one. Structural changes build a replacement subtree off to the
    side, swap it into the parent's slot with a release store, and hand the
    displaced node to the reclaimer; the one in-place mutation is appending
    a child to a node with a free slot.

    A writer that descends releases the grandparent's lock and keeps the
    current node's, so a retired node can never have a writer still spinning
    on it: reaching a node requires holding its parent's lock, and whoever
    retires a node holds exactly that lock while unlinking it.
*/

use {
    self::{
        node::{AddChild, NodeHead, MAX_KEY_SIZE},
        patch::{PatchWrite, WRITEMODE_FRESH, WRITEMODE_REFRESH},
    },
    crate::sync::{ebr::Ebr, spin::SpinLock, ORD_ACQ, ORD_REL, ORD_RLX},
    std::{
        ptr,
        sync::{
            atomic::{AtomicPtr, AtomicUsize},
            Arc,
        },
    },
};

#[cfg(debug_assertions)]
struct ArtMetricsData {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

/// Per tree node accounting. Every allocation and every destruction is
/// tallied in debug builds so tests can assert exact reclamation; compiles
/// down to nothing in release builds.
pub struct ArtRuntimeLog {
    #[cfg(debug_assertions)]
    data: ArtMetricsData,
    #[cfg(not(debug_assertions))]
    data: (),
}

impl ArtRuntimeLog {
    fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            data: ArtMetricsData {
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            },
            #[cfg(not(debug_assertions))]
            data: (),
        }
    }
    #[cfg(debug_assertions)]
    #[inline(always)]
    fn hit_created(&self, n: usize) {
        self.data.created.fetch_add(n, ORD_RLX);
    }
    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn hit_created(&self, _: usize) {
        let _ = self.data;
    }
    #[cfg(debug_assertions)]
    #[inline(always)]
    fn hit_destroyed(&self, n: usize) {
        self.data.destroyed.fetch_add(n, ORD_RLX);
    }
    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn hit_destroyed(&self, _: usize) {}
    #[cfg(debug_assertions)]
    pub(crate) fn created(&self) -> usize {
        self.data.created.load(ORD_RLX)
    }
    #[cfg(debug_assertions)]
    pub(crate) fn destroyed(&self) -> usize {
        self.data.destroyed.load(ORD_RLX)
    }
}

/// Failure modes of [`RawTree::insert`]
#[derive(Debug, PartialEq, Eq)]
pub enum InsertError<V> {
    /// the key is empty or at least [`MAX_KEY_SIZE`] bytes long
    InvalidKey,
    /// the key already holds a value; a copy of it is returned
    Exists(V),
}

#[inline(always)]
fn key_ok(key: &[u8]) -> bool {
    !key.is_empty() && key.len() < MAX_KEY_SIZE
}

/// The adaptive radix tree engine. `WRITE_LOCK = false` compiles every
/// per-node lock operation out for single writer deployments; nothing else
/// changes.
pub struct RawTree<V, const WRITE_LOCK: bool = true> {
    root: AtomicPtr<NodeHead<V>>,
    /// sentinel lock above the real root. Mutations start by taking this,
    /// which makes the root swap an ordinary "parent slot" swap
    root_parent: SpinLock,
    ebr: Ebr<NodeHead<V>>,
    len: AtomicUsize,
    m: Arc<ArtRuntimeLog>,
}

// UNSAFE(@ohsayan): values are cloned out by arbitrary reader threads and
// dropped by whichever thread turns the epoch, hence the double bound
unsafe impl<V: Send + Sync, const WRITE_LOCK: bool> Send for RawTree<V, WRITE_LOCK> {}
unsafe impl<V: Send + Sync, const WRITE_LOCK: bool> Sync for RawTree<V, WRITE_LOCK> {}

impl<V, const WRITE_LOCK: bool> RawTree<V, WRITE_LOCK> {
    pub fn new() -> Self {
        Self {
            root: AtomicPtr::new(ptr::null_mut()),
            root_parent: SpinLock::new(),
            ebr: Ebr::new(),
            len: AtomicUsize::new(0),
            m: Arc::new(ArtRuntimeLog::new()),
        }
    }
    /// Number of keys currently holding a value
    pub fn len(&self) -> usize {
        self.len.load(ORD_RLX)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[inline(always)]
    fn incr_len(&self) {
        self.len.fetch_add(1, ORD_RLX);
    }
    #[inline(always)]
    fn decr_len(&self) {
        self.len.fetch_sub(1, ORD_RLX);
    }
    #[inline(always)]
    fn wlock(lock: &SpinLock) {
        if WRITE_LOCK {
            lock.lock()
        }
    }
    #[inline(always)]
    fn wunlock(lock: &SpinLock) {
        if WRITE_LOCK {
            lock.unlock()
        }
    }
}

// read path
impl<V, const WRITE_LOCK: bool> RawTree<V, WRITE_LOCK> {
    /// Run `f` against the value stored under `key`, if any. The whole
    /// traversal happens inside one reclaimer session and never blocks.
    fn with_entry<T>(&self, key: &[u8], f: impl FnOnce(&V) -> T) -> Option<T> {
        if !key_ok(key) {
            return None;
        }
        let _g = self.ebr.pin();
        let mut rem = key;
        let mut cur = self.root.load(ORD_ACQ);
        while !cur.is_null() {
            let node = unsafe {
                // UNSAFE(@ohsayan): non-null, and the pin keeps it alive
                &*cur
            };
            let p = node.common_prefix_len(rem);
            if p < node.key_len() {
                // diverged inside the segment
                return None;
            }
            if rem.len() == p {
                return node.value().map(f);
            }
            let slot = node.child_slot(rem[p])?;
            let next = slot.load(ORD_ACQ);
            if next.is_null() {
                return None;
            }
            rem = &rem[p + 1..];
            cur = next;
        }
        None
    }
    /// Returns a copy of the value stored under `key`
    pub fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        self.with_entry(key, V::clone)
    }
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.with_entry(key, |_| ()).is_some()
    }
}

// write path
impl<V: Clone, const WRITE_LOCK: bool> RawTree<V, WRITE_LOCK> {
    /// Store `value` under `key` if and only if the key is vacant; on
    /// conflict a copy of the resident value is returned
    pub fn insert(&self, key: &[u8], value: V) -> Result<(), InsertError<V>> {
        if !key_ok(key) {
            return Err(InsertError::InvalidKey);
        }
        self.patch_write(key, patch::Insert::new(value))
    }
    /// Replace the value under `key` if and only if the key is occupied
    pub fn update(&self, key: &[u8], value: V) -> bool {
        if !key_ok(key) {
            return false;
        }
        self.patch_write(key, patch::Update::new(value))
    }
    /// Store `value` under `key` unconditionally. Fails only on an invalid
    /// key
    pub fn upsert(&self, key: &[u8], value: V) -> bool {
        if !key_ok(key) {
            return false;
        }
        self.patch_write(key, patch::Upsert::new(value))
    }
    fn patch_write<P: PatchWrite<V>>(&self, key: &[u8], mut patch: P) -> P::Ret {
        Self::wlock(&self.root_parent);
        if self.root.load(ORD_RLX).is_null() {
            if P::WMODE == WRITEMODE_REFRESH {
                Self::wunlock(&self.root_parent);
                return P::miss_ret();
            }
            let leaf = NodeHead::new_leaf(key, patch.take_value());
            self.m.hit_created(1);
            self.root.store(leaf, ORD_REL);
            self.incr_len();
            Self::wunlock(&self.root_parent);
            return P::nx_ret();
        }
        let mut slot: &AtomicPtr<NodeHead<V>> = &self.root;
        let mut parent_lock: &SpinLock = &self.root_parent;
        let mut rem: &[u8] = key;
        loop {
            let n = slot.load(ORD_RLX);
            debug_assert!(!n.is_null(), "logic,null slot under parent lock");
            let node = unsafe {
                // UNSAFE(@ohsayan): the parent's lock pins this slot
                &*n
            };
            Self::wlock(&node.lock);
            let m = node.common_prefix_len(rem);
            if m < rem.len() && m < node.key_len() {
                // key diverges inside this node's segment: joint branch
                // with the old node (stripped) and a fresh leaf as tails
                if P::WMODE == WRITEMODE_REFRESH {
                    Self::wunlock(&node.lock);
                    Self::wunlock(parent_lock);
                    return P::miss_ret();
                }
                let joint = NodeHead::new_branch(&rem[..m]);
                unsafe {
                    // UNSAFE(@ohsayan): joint is unpublished (sole owner);
                    // node's lock is held for the strip copy
                    let _ = (*joint).add_child(node.key()[m], node.copy_strip_prefix(m + 1));
                    let _ = (*joint).add_child(
                        rem[m],
                        NodeHead::new_leaf(&rem[m + 1..], patch.take_value()),
                    );
                }
                self.m.hit_created(3);
                slot.store(joint, ORD_REL);
                self.incr_len();
                Self::wunlock(parent_lock);
                self.ebr.retire(n);
                return P::nx_ret();
            }
            if m == rem.len() && m < node.key_len() {
                // key ends inside this node's segment: valued joint above
                // the stripped old node
                if P::WMODE == WRITEMODE_REFRESH {
                    Self::wunlock(&node.lock);
                    Self::wunlock(parent_lock);
                    return P::miss_ret();
                }
                let joint = NodeHead::new_branch_with_value(&rem[..m], patch.take_value());
                unsafe {
                    // UNSAFE(@ohsayan): same as above
                    let _ = (*joint).add_child(node.key()[m], node.copy_strip_prefix(m + 1));
                }
                self.m.hit_created(2);
                slot.store(joint, ORD_REL);
                self.incr_len();
                Self::wunlock(parent_lock);
                self.ebr.retire(n);
                return P::nx_ret();
            }
            if m == rem.len() {
                // exact terminal
                debug_assert_eq!(m, node.key_len());
                match node.value() {
                    Some(current) if P::WMODE == WRITEMODE_FRESH => {
                        let ret = P::ex_ret(current);
                        Self::wunlock(&node.lock);
                        Self::wunlock(parent_lock);
                        return ret;
                    }
                    Some(_) => {
                        let swapped = unsafe {
                            // UNSAFE(@ohsayan): lock held
                            node.copy_add_value(patch.take_value())
                        };
                        self.m.hit_created(1);
                        slot.store(swapped, ORD_REL);
                        Self::wunlock(parent_lock);
                        self.ebr.retire(n);
                        return P::rx_ret();
                    }
                    None if P::WMODE == WRITEMODE_REFRESH => {
                        Self::wunlock(&node.lock);
                        Self::wunlock(parent_lock);
                        return P::miss_ret();
                    }
                    None => {
                        let swapped = unsafe {
                            // UNSAFE(@ohsayan): lock held
                            node.copy_add_value(patch.take_value())
                        };
                        self.m.hit_created(1);
                        slot.store(swapped, ORD_REL);
                        self.incr_len();
                        Self::wunlock(parent_lock);
                        self.ebr.retire(n);
                        return P::nx_ret();
                    }
                }
            }
            // key extends past this node's segment: descend, or hang a
            // fresh leaf here
            let byte = rem[m];
            let existing = node
                .child_slot(byte)
                .filter(|slot| !slot.load(ORD_RLX).is_null());
            if let Some(child_slot) = existing {
                Self::wunlock(parent_lock);
                // this node's lock stays held: it is the parent now
                parent_lock = &node.lock;
                slot = child_slot;
                rem = &rem[m + 1..];
                continue;
            }
            if P::WMODE == WRITEMODE_REFRESH {
                Self::wunlock(&node.lock);
                Self::wunlock(parent_lock);
                return P::miss_ret();
            }
            let leaf = NodeHead::new_leaf(&rem[m + 1..], patch.take_value());
            self.m.hit_created(1);
            match unsafe {
                // UNSAFE(@ohsayan): lock held, edge verified absent above
                node.add_child(byte, leaf)
            } {
                AddChild::Done => {
                    Self::wunlock(&node.lock);
                    Self::wunlock(parent_lock);
                }
                AddChild::Grown(bigger) => {
                    self.m.hit_created(1);
                    slot.store(bigger, ORD_REL);
                    Self::wunlock(parent_lock);
                    // still locked, but nothing can reach it anymore
                    self.ebr.retire(n);
                }
            }
            self.incr_len();
            return P::nx_ret();
        }
    }
    /// Remove the value under `key`. The carrying node stays behind as a
    /// valueless structural node; no compaction is attempted.
    pub fn remove(&self, key: &[u8]) -> bool {
        if !key_ok(key) {
            return false;
        }
        Self::wlock(&self.root_parent);
        if self.root.load(ORD_RLX).is_null() {
            Self::wunlock(&self.root_parent);
            return false;
        }
        let mut slot: &AtomicPtr<NodeHead<V>> = &self.root;
        let mut parent_lock: &SpinLock = &self.root_parent;
        let mut rem: &[u8] = key;
        loop {
            let n = slot.load(ORD_RLX);
            let node = unsafe {
                // UNSAFE(@ohsayan): the parent's lock pins this slot
                &*n
            };
            Self::wlock(&node.lock);
            let m = node.common_prefix_len(rem);
            if m < node.key_len() {
                Self::wunlock(&node.lock);
                Self::wunlock(parent_lock);
                return false;
            }
            if m == rem.len() {
                if !node.has_value() {
                    Self::wunlock(&node.lock);
                    Self::wunlock(parent_lock);
                    return false;
                }
                let swapped = unsafe {
                    // UNSAFE(@ohsayan): lock held
                    node.copy_delete_value()
                };
                self.m.hit_created(1);
                slot.store(swapped, ORD_REL);
                self.decr_len();
                Self::wunlock(parent_lock);
                self.ebr.retire(n);
                return true;
            }
            let existing = node
                .child_slot(rem[m])
                .filter(|slot| !slot.load(ORD_RLX).is_null());
            match existing {
                Some(child_slot) => {
                    Self::wunlock(parent_lock);
                    parent_lock = &node.lock;
                    slot = child_slot;
                    rem = &rem[m + 1..];
                }
                None => {
                    Self::wunlock(&node.lock);
                    Self::wunlock(parent_lock);
                    return false;
                }
            }
        }
    }
}

impl<V, const WRITE_LOCK: bool> Drop for RawTree<V, WRITE_LOCK> {
    fn drop(&mut self) {
        let root = self.root.load(ORD_RLX);
        let direct = if root.is_null() {
            0
        } else {
            unsafe {
                // UNSAFE(@ohsayan): exclusive ownership; nobody is inside
                node::destroy_subtree(root)
            }
        };
        self.ebr.drain_all();
        // drain counts into the reclaimer's total, so this is every node
        // this tree ever freed
        self.m.hit_destroyed(direct + self.ebr.reclaimed());
    }
}
