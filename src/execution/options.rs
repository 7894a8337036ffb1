//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The knobs an execution engine is created with.
///
/// These are fixed for the lifetime of the engine, and are also applied to
/// every module that is later added to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct EngineOptions {
    /// How hard the JIT works when compiling a function. At `0` code is
    /// compiled as written, anything higher folds constant expressions.
    ///
    /// The interpreter ignores this.
    pub opt_level: u8,
    /// Whether modules are verified before the engine accepts them. Running
    /// unverified IR gives unspecified (but memory-safe) results.
    pub verify_modules: bool,
    /// How deep calls may nest before a run is aborted.
    pub max_call_depth: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            opt_level: 2,
            verify_modules: true,
            max_call_depth: 1024,
        }
    }
}
