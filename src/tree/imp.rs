/*
 * Created on Sat Mar 16 2024
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

use super::RawTree;

/// The standard tree: any number of concurrent readers and writers
pub type Artex<V> = RawTree<V, true>;
/// Single writer tree: per-node lock operations are compiled out. Readers
/// remain fully concurrent with the one writer.
pub type ArtexSingle<V> = RawTree<V, false>;

impl<V, const WRITE_LOCK: bool> Default for RawTree<V, WRITE_LOCK> {
    fn default() -> Self {
        Self::new()
    }
}
