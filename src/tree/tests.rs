/*
 * Created on Sun Mar 17 2024
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
    super::{
        imp::{Artex, ArtexSingle},
        node::NodeTag,
        InsertError,
    },
    crate::sync::ORD_ACQ,
    rand::{rngs::StdRng, Rng, SeedableRng},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, RwLock,
        },
        thread::{self, JoinHandle},
    },
};

type Map = Artex<String>;

fn s(x: impl ToString) -> String {
    x.to_string()
}

// -- basics --

#[test]
fn drop_empty() {
    let t = Map::new();
    drop(t);
}

#[test]
fn get_empty() {
    let t = Map::new();
    assert_eq!(t.get(b"x"), None);
}

#[test]
fn update_on_empty() {
    let t = Map::new();
    assert!(!t.update(b"x", s("y")));
    assert!(t.is_empty());
}

#[test]
fn upsert_then_overwrite() {
    let t = Map::new();
    assert!(t.upsert(b"k", s("a")));
    assert!(t.upsert(b"k", s("b")));
    assert_eq!(t.get(b"k"), Some(s("b")));
    assert_eq!(t.len(), 1);
}

#[test]
fn insert_conflict_returns_current() {
    let t = Map::new();
    assert_eq!(t.insert(b"k", s("v")), Ok(()));
    assert_eq!(t.insert(b"k", s("w")), Err(InsertError::Exists(s("v"))));
    assert_eq!(t.get(b"k"), Some(s("v")));
    assert_eq!(t.len(), 1);
}

#[test]
fn double_delete() {
    let t = Map::new();
    assert!(t.upsert(b"k", s("v")));
    assert!(t.remove(b"k"));
    assert!(!t.remove(b"k"));
    assert_eq!(t.get(b"k"), None);
}

#[test]
fn empty_key_rejected_everywhere() {
    let t = Map::new();
    assert_eq!(t.get(b""), None);
    assert_eq!(t.insert(b"", s("v")), Err(InsertError::InvalidKey));
    assert!(!t.update(b"", s("v")));
    assert!(!t.upsert(b"", s("v")));
    assert!(!t.remove(b""));
    assert!(t.is_empty());
}

#[test]
fn oversized_key_rejected() {
    let t = Map::new();
    let key = vec![7u8; super::node::MAX_KEY_SIZE];
    assert_eq!(t.insert(&key, s("v")), Err(InsertError::InvalidKey));
    assert!(!t.upsert(&key, s("v")));
    assert_eq!(t.get(&key), None);
}

// -- structural paths --

const PREFIX_KEYS: [&[u8]; 6] = [b"abcdefg", b"ab", b"abcght", b"abqert", b"abcghq", b"abcgh"];

fn prefix_tree() -> Map {
    let t = Map::new();
    for (i, key) in PREFIX_KEYS.iter().enumerate() {
        assert_eq!(t.insert(key, s(i)), Ok(()));
    }
    t
}

#[test]
fn sequential_insert_then_find() {
    let t = prefix_tree();
    assert_eq!(t.len(), PREFIX_KEYS.len());
    for (i, key) in PREFIX_KEYS.iter().enumerate() {
        assert_eq!(t.get(key), Some(s(i)), "key {i}");
    }
}

#[test]
fn partial_deletion() {
    let t = prefix_tree();
    for key in &PREFIX_KEYS[..3] {
        assert!(t.remove(key));
    }
    for key in &PREFIX_KEYS[..3] {
        assert_eq!(t.get(key), None);
    }
    for (i, key) in PREFIX_KEYS.iter().enumerate().skip(3) {
        assert_eq!(t.get(key), Some(s(i)));
    }
    assert_eq!(t.len(), 3);
}

#[test]
fn strict_prefix_insert_makes_valued_inner_node() {
    let t = Map::new();
    assert_eq!(t.insert(b"abcdefg", s("long")), Ok(()));
    assert_eq!(t.insert(b"abc", s("short")), Ok(()));
    assert_eq!(t.get(b"abc"), Some(s("short")));
    assert_eq!(t.get(b"abcdefg"), Some(s("long")));
    // the shorter key must now terminate at a valued branch node
    let root = unsafe { &*t.root.load(ORD_ACQ) };
    assert_eq!(root.tag(), NodeTag::N4);
    assert!(root.has_value());
    assert_eq!(root.key(), b"abc");
    assert_eq!(root.child_cnt(), 1);
}

#[test]
fn delete_leaves_structural_node() {
    let t = Map::new();
    assert!(t.upsert(b"solo", s("v")));
    assert!(t.remove(b"solo"));
    assert_eq!(t.get(b"solo"), None);
    assert!(t.is_empty());
    // the node is still there, just valueless
    let root = unsafe { &*t.root.load(ORD_ACQ) };
    assert!(!root.has_value());
    assert_eq!(root.key(), b"solo");
    // and it can take the key right back
    assert_eq!(t.insert(b"solo", s("w")), Ok(()));
    assert_eq!(t.get(b"solo"), Some(s("w")));
}

#[test]
fn growth_to_n256() {
    let t = Map::new();
    let keys: Vec<[u8; 2]> = (0..=255u8).map(|b| [b'k', b]).collect();
    for (i, key) in keys.iter().enumerate() {
        assert!(t.upsert(key, s(i)));
    }
    assert_eq!(t.len(), 256);
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(t.get(key), Some(s(i)), "child {i}");
    }
    // 256 distinct edges under one branch: every fan-out was outgrown
    let root = unsafe { &*t.root.load(ORD_ACQ) };
    assert_eq!(root.tag(), NodeTag::N256);
    assert_eq!(root.key(), b"k");
    assert_eq!(root.child_cnt(), 256);
    // and the branch itself can still pick up a value
    assert_eq!(t.insert(b"k", s("branch")), Ok(()));
    assert_eq!(t.get(b"k"), Some(s("branch")));
}

#[test]
fn single_writer_mode() {
    // lock ops are compiled out; semantics must not change
    let t: ArtexSingle<String> = ArtexSingle::new();
    assert_eq!(t.insert(b"k", s("v")), Ok(()));
    assert_eq!(t.insert(b"k", s("w")), Err(InsertError::Exists(s("v"))));
    assert!(t.update(b"k", s("w")));
    assert_eq!(t.get(b"k"), Some(s("w")));
    assert!(t.remove(b"k"));
    assert!(t.is_empty());
}

#[test]
fn contains_key() {
    let t = prefix_tree();
    assert!(t.contains_key(b"abcgh"));
    assert!(!t.contains_key(b"abcg"));
    assert!(!t.contains_key(b"zzz"));
}

// -- larger workloads --

fn tagged_random_keys(n: usize, tag: u8, rng: &mut StdRng) -> Vec<[u8; 20]> {
    (0..n)
        .map(|_| {
            let mut key = [0u8; 20];
            rng.fill(&mut key[..]);
            // batch tag keeps independently generated batches disjoint
            key[0] = tag;
            key
        })
        .collect()
}

#[test]
fn random_workload() {
    const KEYS: usize = 100_000;
    const UPDATED: usize = 10_000;
    let mut rng = StdRng::seed_from_u64(2024);
    let t = Map::new();
    let batch_a = tagged_random_keys(KEYS, 0xAA, &mut rng);
    for (i, key) in batch_a.iter().enumerate() {
        assert!(t.upsert(key, s(i)));
    }
    assert_eq!(t.len(), KEYS);
    for (i, key) in batch_a.iter().enumerate() {
        assert_eq!(t.get(key), Some(s(i)));
    }
    // update a slice, everyone else keeps their value
    for (i, key) in batch_a.iter().take(UPDATED).enumerate() {
        assert!(t.update(key, s(i + 10_000_000)));
    }
    for (i, key) in batch_a.iter().enumerate() {
        let expect = if i < UPDATED { i + 10_000_000 } else { i };
        assert_eq!(t.get(key), Some(s(expect)));
    }
    // delete the whole batch, move in a fresh one
    for key in &batch_a {
        assert!(t.remove(key));
    }
    assert_eq!(t.len(), 0);
    let batch_b = tagged_random_keys(KEYS, 0xBB, &mut rng);
    for (i, key) in batch_b.iter().enumerate() {
        assert_eq!(t.insert(key, s(i)), Ok(()));
    }
    for key in &batch_a {
        assert_eq!(t.get(key), None);
    }
    for (i, key) in batch_b.iter().enumerate() {
        assert_eq!(t.get(key), Some(s(i)));
    }
    assert_eq!(t.len(), KEYS);
}

// -- concurrency --

const SMOKE_KEYS: usize = 80_000;
const SMOKE_THREADS: usize = 8;

#[test]
fn concurrent_smoke() {
    let mut rng = StdRng::seed_from_u64(86);
    let keys = Arc::new(tagged_random_keys(SMOKE_KEYS, 0xCC, &mut rng));
    let t = Arc::new(Map::new());
    let gate = Arc::new(RwLock::new(()));
    let hold = gate.write().unwrap();
    let writers: Vec<JoinHandle<_>> = (0..SMOKE_THREADS)
        .map(|w| {
            let t = t.clone();
            let keys = keys.clone();
            let gate = gate.clone();
            thread::Builder::new()
                .name(format!("writer-{w}"))
                .spawn(move || {
                    let _gate = gate.read().unwrap();
                    let per = SMOKE_KEYS / SMOKE_THREADS;
                    for i in (w * per)..((w + 1) * per) {
                        assert!(t.upsert(&keys[i], s(i)));
                    }
                })
                .unwrap()
        })
        .collect();
    let readers: Vec<JoinHandle<_>> = (0..SMOKE_THREADS)
        .map(|r| {
            let t = t.clone();
            let keys = keys.clone();
            let gate = gate.clone();
            thread::Builder::new()
                .name(format!("reader-{r}"))
                .spawn(move || {
                    let _gate = gate.read().unwrap();
                    let mut rng = StdRng::seed_from_u64(r as u64);
                    for _ in 0..20_000 {
                        let i = rng.gen_range(0..SMOKE_KEYS);
                        // absent or fully written; never torn
                        match t.get(&keys[i]) {
                            None => {}
                            Some(v) => assert_eq!(v, s(i)),
                        }
                    }
                })
                .unwrap()
        })
        .collect();
    // everyone in position; go
    drop(hold);
    writers
        .into_iter()
        .chain(readers)
        .for_each(|h| h.join().unwrap());
    assert_eq!(t.len(), SMOKE_KEYS);
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(t.get(key), Some(s(i)));
    }
}

#[test]
fn concurrent_churn() {
    // writers flip a fixed key set between present and absent while readers
    // verify they only ever observe the one legal value or a miss
    const CHURN_KEYS: usize = 64;
    const ROUNDS: usize = 1_000;
    let keys: Arc<Vec<[u8; 20]>> = Arc::new(tagged_random_keys(
        CHURN_KEYS,
        0xDD,
        &mut StdRng::seed_from_u64(13),
    ));
    let t = Arc::new(Map::new());
    let done = Arc::new(AtomicBool::new(false));
    let writers: Vec<JoinHandle<_>> = (0..4)
        .map(|w| {
            let t = t.clone();
            let keys = keys.clone();
            thread::Builder::new()
                .name(format!("churn-w{w}"))
                .spawn(move || {
                    for round in 0..ROUNDS {
                        for (i, key) in keys.iter().enumerate() {
                            if (round + w) % 2 == 0 {
                                t.upsert(key, s(i));
                            } else {
                                t.remove(key);
                            }
                        }
                    }
                })
                .unwrap()
        })
        .collect();
    let readers: Vec<JoinHandle<_>> = (0..4)
        .map(|r| {
            let t = t.clone();
            let keys = keys.clone();
            let done = done.clone();
            thread::Builder::new()
                .name(format!("churn-r{r}"))
                .spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        for (i, key) in keys.iter().enumerate() {
                            match t.get(key) {
                                None => {}
                                Some(v) => assert_eq!(v, s(i)),
                            }
                        }
                    }
                })
                .unwrap()
        })
        .collect();
    writers.into_iter().for_each(|h| h.join().unwrap());
    done.store(true, Ordering::Relaxed);
    readers.into_iter().for_each(|h| h.join().unwrap());
}

// -- reclamation accounting --

#[cfg(debug_assertions)]
#[test]
fn create_destroy_balance() {
    let metrics;
    {
        let t = Map::new();
        metrics = t.m.clone();
        let mut rng = StdRng::seed_from_u64(7);
        let keys = tagged_random_keys(10_000, 0xEE, &mut rng);
        for (i, key) in keys.iter().enumerate() {
            assert!(t.upsert(key, s(i)));
        }
        for key in keys.iter().step_by(2) {
            assert!(t.remove(key));
        }
        for (i, key) in keys.iter().enumerate().skip(1).step_by(2) {
            assert!(t.update(key, s(i + 1)));
        }
        // growth pressure on one branch for good measure
        for b in 0..=255u8 {
            assert!(t.upsert(&[0xEF, b], s(b)));
        }
    }
    // the tree is gone: every node it ever allocated must be gone too
    assert_eq!(metrics.created(), metrics.destroyed());
    assert_ne!(metrics.created(), 0);
}
