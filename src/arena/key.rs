//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::Debug;

/// Models a type that can act as a key for an `ArenaMap`.
///
/// Prefer the `arena_key!` or `dense_arena_key!` macros over implementing
/// this by hand.
pub(crate) trait ArenaKey: Copy + Eq + Debug {
    /// Creates a key from an arena index. Panics if the index does not fit
    /// in the key's storage type.
    fn key_new(index: usize) -> Self;

    /// Converts the key back into an arena index.
    fn key_index(self) -> usize;
}

/// Creates a type-safe key for an `ArenaMap`.
///
/// The storage type can be given explicitly, otherwise `usize` is used.
macro_rules! arena_key {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident($ty:ty); $($rest:tt)* ) => {
        $(#[$outer])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        $vis struct $name($ty);

        impl $crate::arena::ArenaKey for $name {
            #[inline]
            fn key_new(index: usize) -> Self {
                use std::convert::TryInto;

                Self(index.try_into().expect("index is not representable with key type"))
            }

            #[inline]
            fn key_index(self) -> usize {
                self.0 as usize
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                std::write!(f, "{}({})", std::stringify!($name), self.0)
            }
        }

        $crate::arena::arena_key!($($rest)*);
    };

    ( $(#[$outer:meta])* $vis:vis struct $name:ident; $($rest:tt)* ) => {
        $crate::arena::arena_key! { $(#[$outer])* $vis struct $name(usize); $($rest)* }
    };

    () => {}
}

/// Acts just like `arena_key!` but with [`u32`] as the default storage type.
macro_rules! dense_arena_key {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident; $($rest:tt)* ) => {
        $crate::arena::arena_key! { $(#[$outer])* $vis struct $name(u32); }

        $crate::arena::dense_arena_key!($($rest)*);
    };

    () => {}
}

pub(crate) use arena_key;
pub(crate) use dense_arena_key;
