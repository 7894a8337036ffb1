//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The toolkit's C-level API.
//!
//! Everything the toolkit manages (contexts, modules, types, values, blocks,
//! metadata, builders, execution engines, generic values and target data) lives
//! inside of one process-wide store, and is named by an opaque handle. Handles are
//! generational keys, so a handle that outlives its entity is reported as stale
//! instead of silently referring to whatever reused the slot.
//!
//! Every function in here is a thin, one-call-per-operation entry point in
//! the style of a C API: they take handles, return handles, and use the null handle
//! to signal "nothing". Nothing in this module tracks *ownership*, that is the job of
//! the safe wrappers in [`crate::ir`] and [`crate::execution`].
//!
//! ```
//! # use garnet::sys;
//! # use slotmap::Key;
//! let m = sys::module_create_with_name("example");
//!
//! assert!(sys::get_first_function(m).unwrap().is_null());
//! sys::dispose_module(m).unwrap();
//! assert!(sys::get_module_identifier(m).is_err());
//! ```

mod builder;
mod engine;
mod eval;
mod interp;
mod jit;
mod linker;
mod metadata;
mod module;
mod opcode;
mod printer;
mod store;
mod target;
mod types;
mod verify;

pub use builder::*;
pub use engine::*;
pub use linker::*;
pub use metadata::*;
pub use module::*;
pub use opcode::*;
pub use printer::*;
pub use target::*;
pub use types::*;
pub use verify::*;

pub(crate) use eval::{Scalar, ScalarTy};
pub(crate) use store::*;

use crate::handle::NativeHandle;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use static_assertions::assert_eq_size;
use thiserror::Error;

pub use slotmap::Key;

macro_rules! native_handles {
    ( $( $(#[$outer:meta])* $name:ident => $kind:literal; )* ) => {
        $(
            slotmap::new_key_type! {
                $(#[$outer])*
                pub struct $name;
            }

            impl NativeHandle for $name {
                const KIND: &'static str = $kind;
            }

            assert_eq_size!($name, u64);
        )*
    };
}

native_handles! {
    /// Names a context, the owner of a group of modules.
    ContextRef => "context";
    /// Names a module.
    ModuleRef => "module";
    /// Names an interned type. Types are never freed.
    TypeRef => "type";
    /// Names a value: a function, global, argument, constant or instruction.
    ValueRef => "value";
    /// Names a basic block.
    BlockRef => "basic block";
    /// Names a metadata string, node or value wrapper.
    MetadataRef => "metadata";
    /// Names a module-level named metadata node.
    NamedMetadataRef => "named metadata";
    /// Names an instruction builder.
    BuilderRef => "builder";
    /// Names an execution engine.
    EngineRef => "execution engine";
    /// Names a generic value record.
    GenericValueRef => "generic value";
    /// Names a parsed target data layout.
    TargetDataRef => "target data";
}

/// The ways that a toolkit call can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The handle names an entity that no longer exists (or never did).
    #[error("stale {0} handle")]
    StaleHandle(&'static str),
    /// The toolkit refused the request, the text explains why.
    #[error("{0}")]
    Diagnostic(String),
}

/// The result of a toolkit call.
pub type NativeResult<T> = Result<T, NativeError>;

pub(crate) fn diag<T>(message: impl Into<String>) -> NativeResult<T> {
    Err(NativeError::Diagnostic(message.into()))
}

lazy_static! {
    static ref STORE: Mutex<Store> = Mutex::new(Store::new());
}

// every public entry point goes through here exactly once, entry points never
// call each other while holding the lock.
pub(crate) fn with_store<T>(f: impl FnOnce(&mut Store) -> T) -> T {
    f(&mut STORE.lock())
}
