//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Validity tracking for owned native handles.
//!
//! A [`HandleCell`] is the one place an owned handle lives. Once it has been
//! emptied (the resource was disposed, or ownership moved elsewhere) every
//! accessor fails with [`Error::InvalidReference`] instead of handing the
//! toolkit a handle it should no longer see.

use crate::error::{Error, Result};
use slotmap::Key;

/// Models an opaque handle type from [`crate::sys`].
pub trait NativeHandle: Key {
    /// What the handle names, for error messages.
    const KIND: &'static str;
}

/// Holds one native handle that the holder is responsible for.
///
/// ```
/// # use garnet::handle::HandleCell;
/// # use garnet::sys;
/// let mut cell = HandleCell::of(sys::create_builder());
///
/// assert!(cell.get().is_ok());
///
/// let raw = cell.take().unwrap();
/// sys::dispose_builder(raw).unwrap();
///
/// assert!(cell.get().unwrap_err().is_invalid_reference());
/// assert!(cell.take().is_none());
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct HandleCell<H: NativeHandle> {
    raw: H,
}

impl<H: NativeHandle> HandleCell<H> {
    /// Wraps a handle that was just handed out by the toolkit.
    pub fn of(raw: H) -> Self {
        debug_assert!(!raw.is_null(), "wrapping a null {} handle", H::KIND);

        Self { raw }
    }

    /// Gets the handle, or fails if the cell has been emptied.
    #[inline]
    pub fn get(&self) -> Result<H> {
        if self.raw.is_null() {
            Err(Error::InvalidReference(H::KIND))
        } else {
            Ok(self.raw)
        }
    }

    /// Empties the cell, returning the handle if it still held one. The caller
    /// becomes responsible for the resource.
    pub fn take(&mut self) -> Option<H> {
        let raw = std::mem::take(&mut self.raw);

        (!raw.is_null()).then_some(raw)
    }

    /// Checks whether the cell has been emptied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_null()
    }

    /// Gets the handle without checking it. This is only useful for identity
    /// comparisons, the toolkit must never see a handle obtained this way.
    #[inline]
    pub fn peek(&self) -> H {
        self.raw
    }
}

/// Models a wrapper that owns a native resource and can free it early.
///
/// Every implementor also frees the resource when dropped, so `dispose` only
/// needs to be called to control *when* that happens.
pub trait Dispose {
    /// Frees the resource. Calling this again afterwards does nothing.
    fn dispose(&mut self);

    /// Checks whether [`Self::dispose`] has already run (or ownership of the
    /// resource was handed elsewhere).
    fn is_disposed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys;

    #[test]
    fn empty_cells_are_invalid_references() {
        let mut cell = HandleCell::of(sys::module_create_with_name("handle-cell"));
        let raw = cell.take().unwrap();

        assert!(cell.is_empty());
        assert_eq!(cell.get(), Err(Error::InvalidReference("module")));
        assert_eq!(cell.peek(), sys::ModuleRef::null());

        sys::dispose_module(raw).unwrap();
    }
}
