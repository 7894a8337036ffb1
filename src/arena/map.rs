//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A primary mapping of `K -> V`, effectively a typed wrapper around `Vec<V>`
/// that can only be indexed with the right key type.
#[derive(Clone)]
pub(crate) struct ArenaMap<K: ArenaKey, V> {
    slots: Vec<V>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates a new, empty arena.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::default(),
            _unused: PhantomData,
        }
    }

    /// Creates an empty arena with an initial capacity.
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _unused: PhantomData,
        }
    }

    /// Adds an item into the arena, and returns the key for it.
    #[inline]
    pub(crate) fn insert(&mut self, value: V) -> K {
        self.slots.push(value);

        K::key_new(self.slots.len() - 1)
    }

    /// Gets the number of elements in the arena.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over every `(key, value)` pair in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &V)> + DoubleEndedIterator + ExactSizeIterator {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, value)| (K::key_new(i), value))
    }
}

impl<K: ArenaKey, V> Index<K> for ArenaMap<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, key: K) -> &V {
        &self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V> IndexMut<K> for ArenaMap<K, V> {
    #[inline]
    fn index_mut(&mut self, key: K) -> &mut V {
        &mut self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V> FromIterator<V> for ArenaMap<K, V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self {
            slots: Vec::from_iter(iter),
            _unused: PhantomData,
        }
    }
}

impl<K: ArenaKey, V> Default for ArenaMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: Debug> Debug for ArenaMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaMap ")?;

        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::arena_key;

    arena_key! { struct Key(u16); }

    #[test]
    fn inserts_hand_out_keys_in_order() {
        let mut map = ArenaMap::<Key, &str>::default();
        let a = map.insert("a");
        let b = map.insert("b");

        assert_eq!(a.key_index(), 0);
        assert_eq!(b.key_index(), 1);
        assert_eq!(map[b], "b");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn collect_then_mutate() {
        let mut map: ArenaMap<Key, i32> = std::iter::repeat(0).take(3).collect();

        map[Key::key_new(2)] = 7;

        let values: Vec<_> = map.iter().map(|(k, v)| (k.key_index(), *v)).collect();

        assert_eq!(values, vec![(0, 0), (1, 0), (2, 7)]);
    }
}
