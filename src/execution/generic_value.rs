//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::error::{Error, Result};
use crate::handle::{Dispose, HandleCell};
use crate::ir::{Type, TypeKind};
use crate::sys::{self, GenericValueKind, GenericValueRef};
use log::warn;

/// Models a host integer type that can be moved in and out of a [`GenericValue`].
pub trait HostInt: Copy {
    /// Whether the type is signed. This decides how the bits of a
    /// [`GenericValue`] are read back.
    const SIGNED: bool;

    /// Widens the value losslessly.
    fn to_wide(self) -> i128;

    /// Narrows a value back, or gives `None` if it does not fit.
    fn from_wide(wide: i128) -> Option<Self>;
}

macro_rules! host_ints {
    ( $( $ty:ty => $signed:literal ),* $(,)? ) => {
        $(
            impl HostInt for $ty {
                const SIGNED: bool = $signed;

                #[inline]
                fn to_wide(self) -> i128 {
                    self as i128
                }

                #[inline]
                fn from_wide(wide: i128) -> Option<Self> {
                    <$ty>::try_from(wide).ok()
                }
            }
        )*
    };
}

host_ints! {
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
    isize => true,
    u8 => false,
    u16 => false,
    u32 => false,
    u64 => false,
    usize => false,
}

impl HostInt for bool {
    const SIGNED: bool = false;

    fn to_wide(self) -> i128 {
        self as i128
    }

    fn from_wide(wide: i128) -> Option<Self> {
        match wide {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

/// An argument to, or the result of, running a function on an execution engine.
///
/// A generic value remembers which category of value it was created with
/// (integer, floating-point or pointer), and it can only be read back as that
/// same category.
///
/// ```
/// # use garnet::execution::GenericValue;
/// # use garnet::ir::Type;
/// let x = GenericValue::from_int(Type::i32(), -7)?;
///
/// assert_eq!(x.to_int::<i32>()?, -7);
/// assert_eq!(x.to_int::<u32>()?, (-7i32) as u32);
/// assert!(x.to_f64().unwrap_err().is_type_mismatch());
/// # Ok::<(), garnet::Error>(())
/// ```
#[derive(Debug)]
pub struct GenericValue {
    handle: HandleCell<GenericValueRef>,
}

fn mismatch<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::TypeMismatch(message.into()))
}

impl GenericValue {
    pub(crate) fn from_raw(raw: GenericValueRef) -> Self {
        Self {
            handle: HandleCell::of(raw),
        }
    }

    pub(crate) fn raw(&self) -> Result<GenericValueRef> {
        self.handle.get()
    }

    /// Creates an integer of type `ty`. The value must be representable in
    /// `ty`'s width, either as a signed or as an unsigned number.
    pub fn from_int<T: HostInt>(ty: Type, value: T) -> Result<Self> {
        if ty.kind()? != TypeKind::Integer {
            return mismatch(format!("cannot create an integer generic value of type `{ty}`"));
        }

        let width = ty.int_width()?;
        let wide = value.to_wide();
        let (min, max) = (-(1i128 << (width - 1)), (1i128 << width) - 1);

        if wide < min || wide > max {
            return mismatch(format!("{wide} does not fit in `{ty}`"));
        }

        // keeps the low bits, which is the two's complement form for negatives
        let bits = wide as u64;

        Ok(Self::from_raw(sys::create_generic_value_of_int(ty.raw(), bits)?))
    }

    /// Creates a `float` or `double`, depending on `ty`. A `float` is rounded
    /// to single precision immediately.
    pub fn from_float(ty: Type, value: f64) -> Result<Self> {
        if !ty.is_floating() {
            return mismatch(format!("cannot create a floating generic value of type `{ty}`"));
        }

        Ok(Self::from_raw(sys::create_generic_value_of_float(ty.raw(), value)?))
    }

    /// Creates a raw address.
    pub fn from_pointer<T>(ptr: *const T) -> Self {
        Self::from_raw(sys::create_generic_value_of_pointer(ptr as usize as u64))
    }

    /// Gets the category of value held.
    pub fn kind(&self) -> Result<GenericValueKind> {
        Ok(sys::get_generic_value_kind(self.raw()?)?)
    }

    fn require_kind(&self, expected: &[GenericValueKind], wanted: &str) -> Result<GenericValueKind> {
        let actual = self.kind()?;

        if expected.contains(&actual) {
            Ok(actual)
        } else {
            mismatch(format!("expected {wanted} generic value, found {actual:?}"))
        }
    }

    /// Gets the width of the integer held.
    pub fn int_width(&self) -> Result<u32> {
        self.require_kind(&[GenericValueKind::Int], "an integer")?;

        Ok(sys::generic_value_int_width(self.raw()?)?)
    }

    /// Reads the integer back. The bits are read as signed or unsigned based
    /// on `T`, and the result must fit in `T`.
    pub fn to_int<T: HostInt>(&self) -> Result<T> {
        let width = self.int_width()?;
        let raw = self.raw()?;

        let wide = if T::SIGNED {
            sys::generic_value_to_int(raw, true)? as i64 as i128
        } else {
            sys::generic_value_to_int(raw, false)? as i128
        };

        match T::from_wide(wide) {
            Some(value) => Ok(value),
            None => mismatch(format!(
                "the i{width} value {wide} does not fit in `{}`",
                std::any::type_name::<T>()
            )),
        }
    }

    /// Reads a floating value back at double precision.
    pub fn to_f64(&self) -> Result<f64> {
        self.to_float(Type::f64())
    }

    /// Reads a floating value back, rounded to single precision.
    pub fn to_f32(&self) -> Result<f32> {
        Ok(self.to_float(Type::f32())? as f32)
    }

    /// Reads a floating value back at the precision of `ty`.
    pub fn to_float(&self, ty: Type) -> Result<f64> {
        self.require_kind(&[GenericValueKind::Float, GenericValueKind::Double], "a floating")?;

        if !ty.is_floating() {
            return mismatch(format!("cannot read a generic value as `{ty}`"));
        }

        Ok(sys::generic_value_to_float(ty.raw(), self.raw()?)?)
    }

    /// Reads an address back.
    pub fn to_pointer(&self) -> Result<*const ()> {
        self.require_kind(&[GenericValueKind::Pointer], "a pointer")?;

        let address = sys::generic_value_to_pointer(self.raw()?)?;

        Ok(address as usize as *const ())
    }

    /// Checks whether this is the "result" of a function returning `void`.
    pub fn is_void(&self) -> Result<bool> {
        Ok(self.kind()? == GenericValueKind::Void)
    }
}

impl Dispose for GenericValue {
    fn dispose(&mut self) {
        if let Some(raw) = self.handle.take() {
            if let Err(err) = sys::dispose_generic_value(raw) {
                warn!("failed to dispose generic value {raw:?}: {err}");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for GenericValue {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integers_round_trip() {
        for value in [0i64, 1, -1, 42, i64::MIN, i64::MAX] {
            assert_eq!(GenericValue::from_int(Type::i64(), value).unwrap().to_int::<i64>(), Ok(value));
        }

        assert_eq!(GenericValue::from_int(Type::i64(), u64::MAX).unwrap().to_int::<u64>(), Ok(u64::MAX));
        assert_eq!(GenericValue::from_int(Type::i8(), -128).unwrap().to_int::<i8>(), Ok(-128));
        assert_eq!(GenericValue::from_int(Type::i16(), 65535u16).unwrap().to_int::<u16>(), Ok(65535));
    }

    #[test]
    fn small_unsigned_values_read_the_same_both_ways() {
        let one = GenericValue::from_int(Type::i32(), 1u32).unwrap();

        assert_eq!(one.to_int::<u32>(), Ok(1));
        assert_eq!(one.to_int::<i32>(), Ok(1));
        assert_eq!(one.to_int::<i64>(), Ok(1));
        assert_eq!(one.int_width(), Ok(32));
    }

    #[test]
    fn signedness_comes_from_the_host_type() {
        let minus_one = GenericValue::from_int(Type::i8(), -1).unwrap();

        assert_eq!(minus_one.to_int::<i8>(), Ok(-1));
        assert_eq!(minus_one.to_int::<u8>(), Ok(255));
        assert!(minus_one.to_int::<u64>().is_ok());
        assert!(minus_one.to_int::<bool>().unwrap_err().is_type_mismatch());
    }

    #[test]
    fn values_must_fit_their_type() {
        assert!(GenericValue::from_int(Type::i8(), 256).unwrap_err().is_type_mismatch());
        assert!(GenericValue::from_int(Type::i8(), -129).unwrap_err().is_type_mismatch());
        assert!(GenericValue::from_int(Type::i8(), 255).is_ok());
        assert!(GenericValue::from_int(Type::i1(), 2).unwrap_err().is_type_mismatch());
        assert_eq!(GenericValue::from_int(Type::i1(), true).unwrap().to_int::<bool>(), Ok(true));
    }

    #[test]
    fn categories_must_match() {
        assert!(GenericValue::from_int(Type::f32(), 1).unwrap_err().is_type_mismatch());
        assert!(GenericValue::from_float(Type::i32(), 1.0).unwrap_err().is_type_mismatch());

        let x = GenericValue::from_float(Type::f64(), 1.5).unwrap();

        assert!(x.to_int::<i32>().unwrap_err().is_type_mismatch());
        assert!(x.to_pointer().unwrap_err().is_type_mismatch());
        assert!(x.to_float(Type::i32()).unwrap_err().is_type_mismatch());
        assert!(x.int_width().unwrap_err().is_type_mismatch());
    }

    #[test]
    fn doubles_round_trip() {
        let value = 0.1f64 + 0.2;
        let x = GenericValue::from_float(Type::f64(), value).unwrap();

        assert_eq!(x.kind(), Ok(GenericValueKind::Double));
        assert_eq!(x.to_f64(), Ok(value));
        assert_eq!(x.to_f32(), Ok(value as f32));
        assert_eq!(x.to_float(Type::f32()), Ok(value as f32 as f64));
    }

    #[test]
    fn floats_are_rounded_on_creation() {
        let x = GenericValue::from_float(Type::f32(), 0.1).unwrap();

        assert_eq!(x.kind(), Ok(GenericValueKind::Float));
        assert_eq!(x.to_f64(), Ok(0.1f32 as f64));
        assert_eq!(x.to_f32(), Ok(0.1f32));
    }

    #[test]
    fn pointers_round_trip() {
        let target = 17u64;
        let x = GenericValue::from_pointer(&target as *const u64);

        assert_eq!(x.to_pointer(), Ok(&target as *const u64 as *const ()));
        assert!(x.to_int::<u64>().unwrap_err().is_type_mismatch());
    }

    #[test]
    fn disposed_values_are_invalid_references() {
        let mut x = GenericValue::from_int(Type::i32(), 3).unwrap();

        x.dispose();
        x.dispose();

        assert!(x.is_disposed());
        assert_eq!(x.to_int::<i32>(), Err(Error::InvalidReference("generic value")));
        assert!(x.kind().unwrap_err().is_invalid_reference());
    }
}
