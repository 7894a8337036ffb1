//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::error::Result;
use crate::handle::{Dispose, HandleCell};
use crate::scope::scoped;
use crate::sys::{self, ContextRef};
use log::warn;

/// An isolated group of modules. Disposing a context frees every module that
/// was created in it.
///
/// Modules created with [`crate::ir::Module::new`] live in the toolkit's
/// global context instead, which is never freed.
#[derive(Debug)]
pub struct Context {
    handle: HandleCell<ContextRef>,
}

impl Context {
    /// Creates a new, empty context.
    pub fn new() -> Self {
        Self {
            handle: HandleCell::of(sys::context_create()),
        }
    }

    /// Creates a context, lends it to `body` and disposes it afterwards.
    pub fn with<T>(body: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
        scoped(|| Ok(Self::new()), body)
    }

    pub(crate) fn raw(&self) -> Result<ContextRef> {
        self.handle.get()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispose for Context {
    fn dispose(&mut self) {
        if let Some(raw) = self.handle.take() {
            if let Err(err) = sys::context_dispose(raw) {
                warn!("failed to dispose context {raw:?}: {err}");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::LinkedCollection;
    use crate::ir::Module;

    #[test]
    fn disposing_a_context_frees_its_modules() {
        let mut ctx = Context::new();
        let m = Module::new_in("in-context", &ctx).unwrap();

        assert_eq!(m.name().unwrap(), "in-context");

        ctx.dispose();

        assert!(ctx.is_disposed());
        assert!(m.name().unwrap_err().is_invalid_reference());
        assert!(m.functions().iter().next().unwrap().unwrap_err().is_invalid_reference());
        assert!(Module::new_in("late", &ctx).unwrap_err().is_invalid_reference());
    }

    #[test]
    fn scoped_contexts() {
        let ir = Context::with(|ctx| {
            let m = Module::new_in("scoped-ctx", ctx)?;

            m.to_ir_string()
        })
        .unwrap();

        assert!(ir.contains("scoped-ctx"));
    }
}
