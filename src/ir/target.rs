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
use crate::ir::Type;
use crate::sys::{self, DataLayout, TargetDataRef};
use log::warn;

/// A parsed data layout: how big values are and how they are laid out in memory.
///
/// ```
/// # use garnet::ir::{TargetData, Type};
/// let td = TargetData::new("E-p:32:32")?;
///
/// assert!(td.is_big_endian()?);
/// assert_eq!(td.pointer_size()?, 4);
/// assert_eq!(td.int_ptr_type()?, Type::i32());
/// assert_eq!(td.store_size(Type::i1())?, 1);
/// # Ok::<(), garnet::Error>(())
/// ```
#[derive(Debug)]
pub struct TargetData {
    handle: HandleCell<TargetDataRef>,
}

impl TargetData {
    /// Parses a layout string. The empty string describes the host.
    pub fn new(layout: &str) -> Result<Self> {
        Ok(Self::from_raw(sys::create_target_data(layout)?))
    }

    pub(crate) fn from_raw(raw: TargetDataRef) -> Self {
        Self {
            handle: HandleCell::of(raw),
        }
    }

    /// Gets the width of a pointer, in bytes.
    pub fn pointer_size(&self) -> Result<u32> {
        Ok(sys::pointer_size(self.handle.get()?)?)
    }

    /// Checks if the most significant byte is stored first.
    pub fn is_big_endian(&self) -> Result<bool> {
        Ok(sys::is_big_endian(self.handle.get()?)?)
    }

    /// Gets the integer type as wide as a pointer.
    pub fn int_ptr_type(&self) -> Result<Type> {
        Ok(Type::from_raw(sys::int_ptr_type(self.handle.get()?)?))
    }

    /// Gets the number of bits in a `ty`.
    pub fn size_in_bits(&self, ty: Type) -> Result<u64> {
        Ok(sys::size_of_type_in_bits(self.handle.get()?, ty.raw())?)
    }

    /// Gets the number of bytes that storing a `ty` may overwrite.
    pub fn store_size(&self, ty: Type) -> Result<u64> {
        Ok(sys::store_size_of_type(self.handle.get()?, ty.raw())?)
    }

    /// Gets the alignment of a `ty`, in bytes.
    pub fn abi_alignment(&self, ty: Type) -> Result<u64> {
        Ok(sys::abi_alignment_of_type(self.handle.get()?, ty.raw())?)
    }

    /// Gets a copy of the parsed layout.
    pub fn layout(&self) -> Result<DataLayout> {
        Ok(sys::get_target_data_layout(self.handle.get()?)?)
    }

    /// Renders the layout in its canonical string form.
    pub fn string_rep(&self) -> Result<String> {
        Ok(sys::copy_string_rep_of_target_data(self.handle.get()?)?)
    }
}

impl Dispose for TargetData {
    fn dispose(&mut self) {
        if let Some(raw) = self.handle.take() {
            if let Err(err) = sys::dispose_target_data(raw) {
                warn!("failed to dispose target data {raw:?}: {err}");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for TargetData {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_layout() {
        let td = TargetData::new("").unwrap();

        assert_eq!(td.layout().unwrap(), DataLayout::host());
        assert_eq!(td.pointer_size().unwrap() as usize, std::mem::size_of::<usize>());
        assert_eq!(td.size_in_bits(Type::f64()).unwrap(), 64);
        assert_eq!(td.abi_alignment(Type::i32()).unwrap(), 4);
    }

    #[test]
    fn malformed_layouts_are_native_errors() {
        assert!(TargetData::new("p:0:0").unwrap_err().is_native());
    }

    #[test]
    fn disposed_target_data() {
        let mut td = TargetData::new("e-p:64:64").unwrap();

        td.dispose();

        assert!(td.is_disposed());
        assert!(td.pointer_size().unwrap_err().is_invalid_reference());
    }
}
