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

//! # Artex
//!
//! An adaptive radix tree keyed by arbitrary byte strings, tuned for many
//! concurrent writers and readers that must never block. Readers traverse
//! with plain acquire loads (no locks, no CAS); writers use hand-over-hand
//! per-node spin locks and replace nodes copy-on-modify. Unlinked nodes are
//! handed to an epoch based reclaimer and freed once no reader can still
//! observe them.
//!
//! The two entry points are [`Artex`] for the standard multi-writer tree and
//! [`ArtexSingle`] for single-writer deployments where every per-node lock
//! operation compiles down to a no-op.
//!
//! ```
//! use artex::Artex;
//!
//! let tree: Artex<u64> = Artex::new();
//! assert!(tree.upsert(b"hello", 100));
//! assert_eq!(tree.get(b"hello"), Some(100));
//! assert!(tree.remove(b"hello"));
//! assert_eq!(tree.get(b"hello"), None);
//! ```

#![deny(unreachable_patterns)]

mod sync;
mod tree;

pub use {
    sync::tid::READER_CAPACITY,
    tree::{
        imp::{Artex, ArtexSingle},
        node::MAX_KEY_SIZE,
        InsertError, RawTree,
    },
};
