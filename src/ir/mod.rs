//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Safe wrappers over the IR side of the toolkit.
//!
//! [`Context`], [`Module`], [`Builder`] and [`TargetData`] own what they
//! wrap and free it on drop. Everything else ([`Type`], [`Value`],
//! [`Function`], ...) is a `Copy` name for an entity owned by some module,
//! and fails with [`crate::Error::InvalidReference`] once that entity is gone.

mod builder;
mod context;
mod metadata;
mod module;
mod target;
mod types;
mod values;

pub use builder::*;
pub use context::*;
pub use metadata::*;
pub use module::*;
pub use target::*;
pub use types::*;
pub use values::*;

pub use crate::sys::{
    IntPredicate, MetadataKind, ModuleFlagBehavior, Opcode, RealPredicate, TypeKind, ValueCategory,
};

use crate::sys::Key;

// the toolkit reports "nothing" with a null handle
pub(crate) fn non_null<H: Key>(raw: H) -> Option<H> {
    (!raw.is_null()).then_some(raw)
}
