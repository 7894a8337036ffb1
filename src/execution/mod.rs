//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Running IR: execution engines and the values passed in and out of them.

mod engine;
mod generic_value;
mod options;

pub use engine::*;
pub use generic_value::*;
pub use options::*;

pub use crate::sys::{EngineKind, GenericValueKind};
