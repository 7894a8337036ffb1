//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![warn(missing_docs, unreachable_pub)]

//! # Garnet
//!
//! Ownership-checked wrappers over a handle-based IR toolkit.
//!
//! The toolkit itself lives in [`sys`]: every entity it manages (modules,
//! values, engines, ...) is named by an opaque generational handle, and every
//! call either succeeds or reports a [`sys::NativeError`]. The rest of the
//! crate wraps those handles so that disposal happens exactly once, ownership
//! transfers between modules and engines are tracked, and stale handles are
//! reported as [`Error::InvalidReference`] instead of being handed back to
//! the toolkit.
//!
//! ```
//! # use garnet::collections::NameLookup;
//! # use garnet::execution::{Engine, GenericValue, Interpreter};
//! # use garnet::ir::{Builder, Function, Module, Type};
//! let mut m = Module::new("demo");
//! let i32 = Type::i32();
//! let sum = Function::new(&m, "sum", Type::function(i32, &[i32, i32], false)?)?;
//!
//! Builder::with(|b| {
//!     b.position_at_end(sum.append_block("entry")?)?;
//!     let result = b.build_add(sum.param(0)?, sum.param(1)?, "result")?;
//!     b.build_ret(result)?;
//!
//!     Ok(())
//! })?;
//!
//! let three = Interpreter::with(&mut m, |engine| {
//!     let args = [GenericValue::from_int(i32, 1)?, GenericValue::from_int(i32, 2)?];
//!     let f = engine.functions().get("sum")?;
//!
//!     engine.run(f, &args)?.to_int::<i32>()
//! })?;
//!
//! assert_eq!(three, 3);
//! # Ok::<(), garnet::Error>(())
//! ```

pub mod collections;
pub mod error;
pub mod execution;
pub mod handle;
pub mod ir;
pub mod scope;
pub mod sys;

mod arena;

pub use error::{Error, Result};
