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

//! Write modes. Insert, update and upsert run the exact same locked walk
//! and differ only in what they do at the terminal node, so the walk is
//! written once and parameterized over a patch.

use super::InsertError;

pub type WriteFlag = u8;
/// Write only if the key is absent (insert)
pub const WRITEMODE_FRESH: WriteFlag = 0b01;
/// Write only if the key is present (update)
pub const WRITEMODE_REFRESH: WriteFlag = 0b10;
/// Write either way (upsert)
pub const WRITEMODE_ANY: WriteFlag = 0b11;

pub trait PatchWrite<V> {
    const WMODE: WriteFlag;
    type Ret;
    /// Take the value out of the patch. Called at most once per walk.
    fn take_value(&mut self) -> V;
    /// The key was written fresh
    fn nx_ret() -> Self::Ret;
    /// An existing value was replaced
    fn rx_ret() -> Self::Ret;
    /// The key already had a value and `WMODE` forbids replacing it
    fn ex_ret(current: &V) -> Self::Ret;
    /// The key was not found and `WMODE` forbids writing it fresh
    fn miss_ret() -> Self::Ret;
}

pub struct Insert<V>(Option<V>);

impl<V> Insert<V> {
    pub fn new(v: V) -> Self {
        Self(Some(v))
    }
}

impl<V: Clone> PatchWrite<V> for Insert<V> {
    const WMODE: WriteFlag = WRITEMODE_FRESH;
    type Ret = Result<(), InsertError<V>>;
    fn take_value(&mut self) -> V {
        self.0.take().expect("logic,value taken twice")
    }
    fn nx_ret() -> Self::Ret {
        Ok(())
    }
    fn rx_ret() -> Self::Ret {
        unreachable!()
    }
    fn ex_ret(current: &V) -> Self::Ret {
        Err(InsertError::Exists(current.clone()))
    }
    fn miss_ret() -> Self::Ret {
        unreachable!()
    }
}

pub struct Update<V>(Option<V>);

impl<V> Update<V> {
    pub fn new(v: V) -> Self {
        Self(Some(v))
    }
}

impl<V> PatchWrite<V> for Update<V> {
    const WMODE: WriteFlag = WRITEMODE_REFRESH;
    type Ret = bool;
    fn take_value(&mut self) -> V {
        self.0.take().expect("logic,value taken twice")
    }
    fn nx_ret() -> Self::Ret {
        unreachable!()
    }
    fn rx_ret() -> Self::Ret {
        true
    }
    fn ex_ret(_: &V) -> Self::Ret {
        unreachable!()
    }
    fn miss_ret() -> Self::Ret {
        false
    }
}

pub struct Upsert<V>(Option<V>);

impl<V> Upsert<V> {
    pub fn new(v: V) -> Self {
        Self(Some(v))
    }
}

impl<V> PatchWrite<V> for Upsert<V> {
    const WMODE: WriteFlag = WRITEMODE_ANY;
    type Ret = bool;
    fn take_value(&mut self) -> V {
        self.0.take().expect("logic,value taken twice")
    }
    fn nx_ret() -> Self::Ret {
        true
    }
    fn rx_ret() -> Self::Ret {
        true
    }
    fn ex_ret(_: &V) -> Self::Ret {
        unreachable!()
    }
    fn miss_ret() -> Self::Ret {
        unreachable!()
    }
}
