//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module.
//!
//! These arenas do not allow deletion and provide configurable index sizes.
//! The JIT uses them for the register files and block tables of compiled
//! functions, where everything is allocated once and thrown away together.

mod key;
mod map;

pub(crate) use key::{arena_key, dense_arena_key, ArenaKey};
pub(crate) use map::ArenaMap;
