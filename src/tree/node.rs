/*
 * Created on Tue Mar 12 2024
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
    the node family
    ---
    Five physical layouts share one header: four inner fan-outs (4, 16, 48,
    256 children) and a childless leaf. Every node carries a prefix
    compressed key segment and, orthogonally to being a branch, may carry a
    value for the exact key its path spells.

    A node is immutable once a parent slot points at it, with exactly two
    exceptions: its lock byte, and appending a child into a free slot while
    the owner holds the lock. The append publishes through a single release
    store (child_cnt for N4/N16, the index entry for N48, the slot itself
    for N256) that the reader side acquire-loads before dereferencing, so a
    half written slot is never visible. Everything else - key bytes, the
    value, occupied slots - changes only by allocating a morphed copy and
    swapping the parent's pointer.

    Variants are reached by casting the header pointer on the tag; the tag
    is needed for morphs anyway, so there is no point paying for vtables
    (same call as the mtchm design this borrows from).
*/

use {
    crate::sync::{spin::SpinLock, ORD_ACQ, ORD_REL, ORD_RLX},
    std::{
        ptr,
        sync::atomic::{AtomicPtr, AtomicU16, AtomicU8},
    },
};

/// Exclusive upper bound on key length. Rejected at the API boundary, so
/// node level code never sees anything longer.
pub const MAX_KEY_SIZE: usize = 1 << 23;
/// Absent marker in the N48 byte -> slot index
const ABSENT48: u8 = 0xFF;

pub type NodePtr<V> = *mut NodeHead<V>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    N4 = 1,
    N16 = 2,
    N48 = 3,
    N256 = 4,
    Leaf = 5,
}

/// Common node header. Every variant embeds this as its first field
/// (`repr(C)`), which is what makes the tag dispatched casts legal.
#[repr(C)]
pub struct NodeHead<V> {
    /// writer side mutual exclusion; readers never touch this
    pub(super) lock: SpinLock,
    tag: NodeTag,
    /// occupied child slots. Bumped last (release) on in-place appends so
    /// that readers bounding their scan by it never see a torn slot
    child_cnt: AtomicU16,
    /// this node's segment of the radix path
    key: Box<[u8]>,
    /// payload for the exact key spelled by the path up to and including
    /// this node's segment
    value: Option<V>,
}

/// Outcome of [`NodeHead::add_child`]
pub(super) enum AddChild<V> {
    /// appended into a free slot in place
    Done,
    /// the receiver was full: a morphed copy one size class up now holds
    /// the edge. The caller installs it and retires the receiver.
    Grown(NodePtr<V>),
}

impl<V> NodeHead<V> {
    fn new(tag: NodeTag, key: &[u8], value: Option<V>) -> Self {
        debug_assert!(key.len() < MAX_KEY_SIZE);
        Self {
            lock: SpinLock::new(),
            tag,
            child_cnt: AtomicU16::new(0),
            key: key.into(),
            value,
        }
    }
    #[inline(always)]
    pub fn tag(&self) -> NodeTag {
        self.tag
    }
    #[inline(always)]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
    #[inline(always)]
    pub fn key_len(&self) -> usize {
        self.key.len()
    }
    #[inline(always)]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }
    #[inline(always)]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
    #[inline(always)]
    pub fn child_cnt(&self) -> usize {
        self.child_cnt.load(ORD_ACQ) as usize
    }
    /// Length of the shared prefix of this node's key segment and `key`
    pub fn common_prefix_len(&self, key: &[u8]) -> usize {
        self.key
            .iter()
            .zip(key)
            .take_while(|(a, b)| a == b)
            .count()
    }
}

// variant casts
impl<V> NodeHead<V> {
    unsafe fn as_n4(&self) -> &Node4<V> {
        debug_assert_eq!(self.tag, NodeTag::N4);
        &*(self as *const Self as *const Node4<V>)
    }
    unsafe fn as_n16(&self) -> &Node16<V> {
        debug_assert_eq!(self.tag, NodeTag::N16);
        &*(self as *const Self as *const Node16<V>)
    }
    unsafe fn as_n48(&self) -> &Node48<V> {
        debug_assert_eq!(self.tag, NodeTag::N48);
        &*(self as *const Self as *const Node48<V>)
    }
    unsafe fn as_n256(&self) -> &Node256<V> {
        debug_assert_eq!(self.tag, NodeTag::N256);
        &*(self as *const Self as *const Node256<V>)
    }
}

// create
impl<V> NodeHead<V> {
    /// A leaf holding `value` under `key`
    pub fn new_leaf(key: &[u8], value: V) -> NodePtr<V> {
        LeafNode::alloc(key, Some(value))
    }
    /// A valueless N4, used as the joint when two keys diverge
    pub fn new_branch(key: &[u8]) -> NodePtr<V> {
        Node4::alloc(key, None)
    }
    /// An N4 that terminates `key` with `value` and can take children
    pub fn new_branch_with_value(key: &[u8], value: V) -> NodePtr<V> {
        Node4::alloc(key, Some(value))
    }
}

// lookup
impl<V> NodeHead<V> {
    /// The slot for `byte`, if this variant has one. A returned slot may
    /// still hold null (N256); callers treat a null load as a miss. Safe
    /// for unlocked readers: scans are bounded by acquire loads of the
    /// variant's publication word.
    pub fn child_slot(&self, byte: u8) -> Option<&AtomicPtr<NodeHead<V>>> {
        match self.tag {
            NodeTag::N4 => unsafe {
                // UNSAFE(@ohsayan): tagck
                self.as_n4().lookup(byte)
            },
            NodeTag::N16 => unsafe {
                // UNSAFE(@ohsayan): tagck
                self.as_n16().lookup(byte)
            },
            NodeTag::N48 => unsafe {
                // UNSAFE(@ohsayan): tagck
                self.as_n48().lookup(byte)
            },
            NodeTag::N256 => unsafe {
                // UNSAFE(@ohsayan): tagck
                Some(self.as_n256().slot(byte))
            },
            NodeTag::Leaf => None,
        }
    }
}

// morph
impl<V: Clone> NodeHead<V> {
    /// Attach `child` under `byte`.
    ///
    /// ## Safety
    /// The caller must hold this node's lock or be its sole owner, and
    /// `byte` must not already map to a child.
    pub(super) unsafe fn add_child(&self, byte: u8, child: NodePtr<V>) -> AddChild<V> {
        debug_assert!(self
            .child_slot(byte)
            .map_or(true, |slot| slot.load(ORD_RLX).is_null()));
        match self.tag {
            NodeTag::N4 => self.as_n4().add(byte, child),
            NodeTag::N16 => self.as_n16().add(byte, child),
            NodeTag::N48 => self.as_n48().add(byte, child),
            NodeTag::N256 => self.as_n256().add(byte, child),
            NodeTag::Leaf => {
                // a leaf has nowhere to put an edge; it becomes an N4
                // carrying the same key segment and payload
                let n4 = Node4::boxed(&self.key, self.value.clone());
                n4.edge[0].store(byte, ORD_RLX);
                n4.child[0].store(child, ORD_RLX);
                n4.head.child_cnt.store(1, ORD_RLX);
                AddChild::Grown(Box::into_raw(n4) as NodePtr<V>)
            }
        }
    }
    /// Same variant minus the first `n` bytes of the key segment. Children
    /// and value carry over.
    ///
    /// ## Safety
    /// Lock held or sole owner; `n <= key_len`.
    pub(super) unsafe fn copy_strip_prefix(&self, n: usize) -> NodePtr<V> {
        debug_assert!(n <= self.key.len(), "logic,stripping past the segment");
        self.clone_shallow(&self.key[n..], self.value.clone())
    }
    /// Same variant with the payload set to `value`
    ///
    /// ## Safety
    /// Lock held or sole owner.
    pub(super) unsafe fn copy_add_value(&self, value: V) -> NodePtr<V> {
        self.clone_shallow(&self.key, Some(value))
    }
    /// Same variant with the payload removed; the old payload dies when the
    /// source is reclaimed
    ///
    /// ## Safety
    /// Lock held or sole owner.
    pub(super) unsafe fn copy_delete_value(&self) -> NodePtr<V> {
        self.clone_shallow(&self.key, None)
    }
    unsafe fn clone_shallow(&self, key: &[u8], value: Option<V>) -> NodePtr<V> {
        match self.tag {
            NodeTag::N4 => self.as_n4().clone_shallow(key, value),
            NodeTag::N16 => self.as_n16().clone_shallow(key, value),
            NodeTag::N48 => self.as_n48().clone_shallow(key, value),
            NodeTag::N256 => self.as_n256().clone_shallow(key, value),
            NodeTag::Leaf => LeafNode::alloc(key, value),
        }
    }
}

/// Release the node's payload and memory. Never follows child pointers:
/// after a morph they are owned by the replacement.
pub(super) unsafe fn destroy<V>(n: NodePtr<V>) {
    match (*n).tag {
        NodeTag::N4 => drop(Box::from_raw(n as *mut Node4<V>)),
        NodeTag::N16 => drop(Box::from_raw(n as *mut Node16<V>)),
        NodeTag::N48 => drop(Box::from_raw(n as *mut Node48<V>)),
        NodeTag::N256 => drop(Box::from_raw(n as *mut Node256<V>)),
        NodeTag::Leaf => drop(Box::from_raw(n as *mut LeafNode<V>)),
    }
}

/// Post-order teardown of a whole subtree. Only for tree destruction, when
/// no other thread can be inside the structure. Returns the number of nodes
/// freed.
pub(super) unsafe fn destroy_subtree<V>(n: NodePtr<V>) -> usize {
    let mut freed = 1;
    let head = &*n;
    match head.tag {
        NodeTag::N4 => {
            let n4 = head.as_n4();
            for i in 0..head.child_cnt.load(ORD_RLX) as usize {
                freed += destroy_subtree(n4.child[i].load(ORD_RLX));
            }
        }
        NodeTag::N16 => {
            let n16 = head.as_n16();
            for i in 0..head.child_cnt.load(ORD_RLX) as usize {
                freed += destroy_subtree(n16.child[i].load(ORD_RLX));
            }
        }
        NodeTag::N48 => {
            // slots [0, child_cnt) are dense by construction
            let n48 = head.as_n48();
            for i in 0..head.child_cnt.load(ORD_RLX) as usize {
                freed += destroy_subtree(n48.child[i].load(ORD_RLX));
            }
        }
        NodeTag::N256 => {
            let n256 = head.as_n256();
            for slot in n256.child.iter() {
                let child = slot.load(ORD_RLX);
                if !child.is_null() {
                    freed += destroy_subtree(child);
                }
            }
        }
        NodeTag::Leaf => {}
    }
    destroy(n);
    freed
}

impl<V> crate::sync::ebr::Reclaim for NodeHead<V> {
    unsafe fn reclaim(this: *mut Self) {
        destroy(this)
    }
}

/// Relaxed element-wise copy between atomic arrays. Only legal under the
/// source node's lock (or sole ownership), where the slots are stable.
macro_rules! copy_slots {
    ($src:expr => $dst:expr, $n:expr) => {
        for i in 0..$n {
            $dst[i].store($src[i].load(ORD_RLX), ORD_RLX);
        }
    };
}

#[repr(C)]
pub(super) struct Node4<V> {
    head: NodeHead<V>,
    edge: [AtomicU8; 4],
    child: [AtomicPtr<NodeHead<V>>; 4],
}

#[repr(C)]
pub(super) struct Node16<V> {
    head: NodeHead<V>,
    edge: [AtomicU8; 16],
    child: [AtomicPtr<NodeHead<V>>; 16],
}

#[repr(C)]
pub(super) struct Node48<V> {
    head: NodeHead<V>,
    /// byte -> slot, `ABSENT48` where unmapped
    index: [AtomicU8; 256],
    child: [AtomicPtr<NodeHead<V>>; 48],
}

#[repr(C)]
pub(super) struct Node256<V> {
    head: NodeHead<V>,
    child: [AtomicPtr<NodeHead<V>>; 256],
}

#[repr(C)]
pub(super) struct LeafNode<V> {
    head: NodeHead<V>,
}

impl<V> Node4<V> {
    const NULL: AtomicPtr<NodeHead<V>> = AtomicPtr::new(ptr::null_mut());
    const E0: AtomicU8 = AtomicU8::new(0);
    fn boxed(key: &[u8], value: Option<V>) -> Box<Self> {
        Box::new(Self {
            head: NodeHead::new(NodeTag::N4, key, value),
            edge: [Self::E0; 4],
            child: [Self::NULL; 4],
        })
    }
    fn alloc(key: &[u8], value: Option<V>) -> NodePtr<V> {
        Box::into_raw(Self::boxed(key, value)) as NodePtr<V>
    }
    fn lookup(&self, byte: u8) -> Option<&AtomicPtr<NodeHead<V>>> {
        let cnt = self.head.child_cnt.load(ORD_ACQ) as usize;
        (0..cnt)
            .find(|&i| self.edge[i].load(ORD_RLX) == byte)
            .map(|i| &self.child[i])
    }
    unsafe fn add(&self, byte: u8, child: NodePtr<V>) -> AddChild<V>
    where
        V: Clone,
    {
        let cnt = self.head.child_cnt.load(ORD_RLX) as usize;
        if cnt < 4 {
            self.edge[cnt].store(byte, ORD_RLX);
            self.child[cnt].store(child, ORD_RLX);
            // publication point: readers acquire-load child_cnt
            self.head.child_cnt.store(cnt as u16 + 1, ORD_REL);
            return AddChild::Done;
        }
        log::trace!("node: n4 full, morphing to n16");
        let n16 = Node16::boxed(&self.head.key, self.head.value.clone());
        copy_slots!(self.edge => n16.edge, 4);
        copy_slots!(self.child => n16.child, 4);
        n16.edge[4].store(byte, ORD_RLX);
        n16.child[4].store(child, ORD_RLX);
        n16.head.child_cnt.store(5, ORD_RLX);
        AddChild::Grown(Box::into_raw(n16) as NodePtr<V>)
    }
    unsafe fn clone_shallow(&self, key: &[u8], value: Option<V>) -> NodePtr<V> {
        let new = Self::boxed(key, value);
        let cnt = self.head.child_cnt.load(ORD_RLX);
        copy_slots!(self.edge => new.edge, cnt as usize);
        copy_slots!(self.child => new.child, cnt as usize);
        new.head.child_cnt.store(cnt, ORD_RLX);
        Box::into_raw(new) as NodePtr<V>
    }
}

impl<V> Node16<V> {
    const NULL: AtomicPtr<NodeHead<V>> = AtomicPtr::new(ptr::null_mut());
    const E0: AtomicU8 = AtomicU8::new(0);
    fn boxed(key: &[u8], value: Option<V>) -> Box<Self> {
        Box::new(Self {
            head: NodeHead::new(NodeTag::N16, key, value),
            edge: [Self::E0; 16],
            child: [Self::NULL; 16],
        })
    }
    fn lookup(&self, byte: u8) -> Option<&AtomicPtr<NodeHead<V>>> {
        let cnt = self.head.child_cnt.load(ORD_ACQ) as usize;
        (0..cnt)
            .find(|&i| self.edge[i].load(ORD_RLX) == byte)
            .map(|i| &self.child[i])
    }
    unsafe fn add(&self, byte: u8, child: NodePtr<V>) -> AddChild<V>
    where
        V: Clone,
    {
        let cnt = self.head.child_cnt.load(ORD_RLX) as usize;
        if cnt < 16 {
            self.edge[cnt].store(byte, ORD_RLX);
            self.child[cnt].store(child, ORD_RLX);
            self.head.child_cnt.store(cnt as u16 + 1, ORD_REL);
            return AddChild::Done;
        }
        log::trace!("node: n16 full, morphing to n48");
        let n48 = Node48::boxed(&self.head.key, self.head.value.clone());
        for i in 0..16 {
            n48.index[self.edge[i].load(ORD_RLX) as usize].store(i as u8, ORD_RLX);
        }
        copy_slots!(self.child => n48.child, 16);
        n48.index[byte as usize].store(16, ORD_RLX);
        n48.child[16].store(child, ORD_RLX);
        n48.head.child_cnt.store(17, ORD_RLX);
        AddChild::Grown(Box::into_raw(n48) as NodePtr<V>)
    }
    unsafe fn clone_shallow(&self, key: &[u8], value: Option<V>) -> NodePtr<V> {
        let new = Self::boxed(key, value);
        let cnt = self.head.child_cnt.load(ORD_RLX);
        copy_slots!(self.edge => new.edge, cnt as usize);
        copy_slots!(self.child => new.child, cnt as usize);
        new.head.child_cnt.store(cnt, ORD_RLX);
        Box::into_raw(new) as NodePtr<V>
    }
}

impl<V> Node48<V> {
    const NULL: AtomicPtr<NodeHead<V>> = AtomicPtr::new(ptr::null_mut());
    const ABSENT: AtomicU8 = AtomicU8::new(ABSENT48);
    fn boxed(key: &[u8], value: Option<V>) -> Box<Self> {
        Box::new(Self {
            head: NodeHead::new(NodeTag::N48, key, value),
            index: [Self::ABSENT; 256],
            child: [Self::NULL; 48],
        })
    }
    fn lookup(&self, byte: u8) -> Option<&AtomicPtr<NodeHead<V>>> {
        // publication point: the index entry (release-stored after the slot)
        let slot = self.index[byte as usize].load(ORD_ACQ);
        (slot != ABSENT48).then(|| &self.child[slot as usize])
    }
    unsafe fn add(&self, byte: u8, child: NodePtr<V>) -> AddChild<V>
    where
        V: Clone,
    {
        let cnt = self.head.child_cnt.load(ORD_RLX) as usize;
        if cnt < 48 {
            self.child[cnt].store(child, ORD_RLX);
            self.index[byte as usize].store(cnt as u8, ORD_REL);
            self.head.child_cnt.store(cnt as u16 + 1, ORD_REL);
            return AddChild::Done;
        }
        log::trace!("node: n48 full, morphing to n256");
        let n256 = Node256::boxed(&self.head.key, self.head.value.clone());
        for b in 0..256 {
            let slot = self.index[b].load(ORD_RLX);
            if slot != ABSENT48 {
                n256.child[b].store(self.child[slot as usize].load(ORD_RLX), ORD_RLX);
            }
        }
        n256.child[byte as usize].store(child, ORD_RLX);
        n256.head.child_cnt.store(49, ORD_RLX);
        AddChild::Grown(Box::into_raw(n256) as NodePtr<V>)
    }
    unsafe fn clone_shallow(&self, key: &[u8], value: Option<V>) -> NodePtr<V> {
        let new = Self::boxed(key, value);
        let cnt = self.head.child_cnt.load(ORD_RLX);
        for b in 0..256 {
            new.index[b].store(self.index[b].load(ORD_RLX), ORD_RLX);
        }
        copy_slots!(self.child => new.child, cnt as usize);
        new.head.child_cnt.store(cnt, ORD_RLX);
        Box::into_raw(new) as NodePtr<V>
    }
}

impl<V> Node256<V> {
    const NULL: AtomicPtr<NodeHead<V>> = AtomicPtr::new(ptr::null_mut());
    fn boxed(key: &[u8], value: Option<V>) -> Box<Self> {
        Box::new(Self {
            head: NodeHead::new(NodeTag::N256, key, value),
            child: [Self::NULL; 256],
        })
    }
    fn slot(&self, byte: u8) -> &AtomicPtr<NodeHead<V>> {
        &self.child[byte as usize]
    }
    unsafe fn add(&self, byte: u8, child: NodePtr<V>) -> AddChild<V> {
        // publication point: the slot itself; never grows
        self.child[byte as usize].store(child, ORD_REL);
        self.head.child_cnt.fetch_add(1, ORD_RLX);
        AddChild::Done
    }
    unsafe fn clone_shallow(&self, key: &[u8], value: Option<V>) -> NodePtr<V> {
        let new = Self::boxed(key, value);
        copy_slots!(self.child => new.child, 256);
        new.head
            .child_cnt
            .store(self.head.child_cnt.load(ORD_RLX), ORD_RLX);
        Box::into_raw(new) as NodePtr<V>
    }
}

impl<V> LeafNode<V> {
    fn alloc(key: &[u8], value: Option<V>) -> NodePtr<V> {
        Box::into_raw(Box::new(Self {
            head: NodeHead::new(NodeTag::Leaf, key, value),
        })) as NodePtr<V>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &[u8], v: &str) -> NodePtr<String> {
        NodeHead::new_leaf(key, v.to_owned())
    }

    /// Attach and, if the node morphed, free the outgrown shell (its
    /// children now belong to the replacement)
    unsafe fn attach(node: NodePtr<String>, byte: u8, child: NodePtr<String>) -> NodePtr<String> {
        match (*node).add_child(byte, child) {
            AddChild::Done => node,
            AddChild::Grown(bigger) => {
                destroy(node);
                bigger
            }
        }
    }

    #[test]
    fn common_prefix() {
        unsafe {
            let n = leaf(b"abc", "v");
            assert_eq!((*n).common_prefix_len(b"abd"), 2);
            assert_eq!((*n).common_prefix_len(b"abc"), 3);
            assert_eq!((*n).common_prefix_len(b"abcdef"), 3);
            assert_eq!((*n).common_prefix_len(b"ab"), 2);
            assert_eq!((*n).common_prefix_len(b"xyz"), 0);
            destroy(n);
        }
    }

    #[test]
    fn leaf_grows_into_n4() {
        unsafe {
            let n = attach(leaf(b"stem", "v"), b'x', leaf(b"tail", "w"));
            let head = &*n;
            assert_eq!(head.tag(), NodeTag::N4);
            assert_eq!(head.key(), b"stem");
            assert_eq!(head.value(), Some(&"v".to_owned()));
            assert_eq!(head.child_cnt(), 1);
            assert_eq!(destroy_subtree(n), 2);
        }
    }

    #[test]
    fn fanout_walks_every_class() {
        unsafe {
            let mut node = NodeHead::new_branch(b"p");
            for b in 0..=255u8 {
                node = attach(node, b, leaf(b"", "x"));
                let head = &*node;
                let expect = match head.child_cnt() {
                    1..=4 => NodeTag::N4,
                    5..=16 => NodeTag::N16,
                    17..=48 => NodeTag::N48,
                    _ => NodeTag::N256,
                };
                assert_eq!(head.tag(), expect, "after {} children", b as usize + 1);
                for edge in 0..=b {
                    let slot = head.child_slot(edge).expect("edge lost in growth");
                    assert!(!slot.load(ORD_RLX).is_null());
                }
            }
            assert!((&*node).child_slot(0).is_some());
            // 256 leaves plus the final shell; the outgrown shells are gone
            assert_eq!(destroy_subtree(node), 257);
        }
    }

    #[test]
    fn strip_prefix_keeps_children_and_value() {
        unsafe {
            let mut n = NodeHead::new_branch_with_value(b"abcdef", "v".to_owned());
            n = attach(n, b'1', leaf(b"one", "1"));
            n = attach(n, b'2', leaf(b"two", "2"));
            let stripped = (*n).copy_strip_prefix(2);
            let head = &*stripped;
            assert_eq!(head.key(), b"cdef");
            assert_eq!(head.value(), Some(&"v".to_owned()));
            assert_eq!(head.child_cnt(), 2);
            for edge in [b'1', b'2'] {
                let expect = (*n).child_slot(edge).unwrap().load(ORD_RLX);
                assert_eq!(head.child_slot(edge).unwrap().load(ORD_RLX), expect);
            }
            // source and copy share children: free the source shallowly
            destroy(n);
            assert_eq!(destroy_subtree(stripped), 3);
        }
    }

    #[test]
    fn value_morphs() {
        unsafe {
            let n = leaf(b"k", "a");
            let with_b = (*n).copy_add_value("b".to_owned());
            assert_eq!((*with_b).value(), Some(&"b".to_owned()));
            let without = (*with_b).copy_delete_value();
            assert!(!(*without).has_value());
            assert_eq!((*without).key(), b"k");
            destroy(n);
            destroy(with_b);
            destroy(without);
        }
    }
}
