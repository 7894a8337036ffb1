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
use crate::sys::{self, TypeKind, TypeRef};
use paste::paste;
use std::fmt;
use std::fmt::{Display, Formatter};

/// An interned IR type. Types are never freed, so these are always valid.
///
/// ```
/// # use garnet::ir::Type;
/// let sig = Type::function(Type::i32(), &[Type::i8(), Type::f32()], true).unwrap();
///
/// assert_eq!(sig.to_string(), "i32 (i8, float, ...)");
/// assert_eq!(sig.param_types().unwrap(), vec![Type::i8(), Type::f32()]);
/// ```
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type(TypeRef);

macro_rules! int_shorthands {
    ( $( $width:literal ),* ) => {
        paste! {
            $(
                #[doc = "Gets the `i" $width "` type."]
                #[inline]
                pub fn [<i $width>]() -> Self {
                    // always in range
                    Self(sys::int_type($width).unwrap_or_default())
                }
            )*
        }
    };
}

impl Type {
    pub(crate) fn from_raw(raw: TypeRef) -> Self {
        Self(raw)
    }

    /// Gets the underlying handle.
    #[inline]
    pub fn raw(self) -> TypeRef {
        self.0
    }

    /// Gets `void`.
    pub fn void() -> Self {
        Self(sys::void_type())
    }

    /// Gets the integer type with `width` bits. Widths outside of `1..=64` are
    /// rejected by the toolkit.
    pub fn int(width: u32) -> Result<Self> {
        Ok(Self(sys::int_type(width)?))
    }

    int_shorthands!(1, 8, 16, 32, 64);

    /// Gets `float`.
    pub fn f32() -> Self {
        Self(sys::float_type())
    }

    /// Gets `double`.
    pub fn f64() -> Self {
        Self(sys::double_type())
    }

    /// Gets the opaque pointer type.
    pub fn ptr() -> Self {
        Self(sys::pointer_type())
    }

    /// Gets the type of a function.
    pub fn function(ret: Type, params: &[Type], vararg: bool) -> Result<Self> {
        let params: Vec<_> = params.iter().map(|ty| ty.0).collect();

        Ok(Self(sys::function_type(ret.0, &params, vararg)?))
    }

    /// Gets the broad category of the type.
    pub fn kind(self) -> Result<TypeKind> {
        Ok(sys::get_type_kind(self.0)?)
    }

    /// Gets the width of an integer type.
    pub fn int_width(self) -> Result<u32> {
        Ok(sys::get_int_type_width(self.0)?)
    }

    /// Gets the return type of a function type.
    pub fn return_type(self) -> Result<Type> {
        Ok(Self(sys::get_return_type(self.0)?))
    }

    /// Gets the parameter types of a function type.
    pub fn param_types(self) -> Result<Vec<Type>> {
        Ok(sys::get_param_types(self.0)?.into_iter().map(Self).collect())
    }

    /// Checks if a function type accepts extra arguments.
    pub fn is_vararg(self) -> Result<bool> {
        Ok(sys::is_function_var_arg(self.0)?)
    }

    /// Checks if this is `float` or `double`.
    pub fn is_floating(self) -> bool {
        matches!(self.kind(), Ok(TypeKind::Float | TypeKind::Double))
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = sys::print_type_to_string(self.0).map_err(|_| fmt::Error)?;

        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_interned() {
        assert_eq!(Type::int(32).unwrap(), Type::i32());
        assert_ne!(Type::i32(), Type::i64());
        assert_eq!(Type::i16().int_width(), Ok(16));
    }

    #[test]
    fn bad_widths_are_native_errors() {
        assert!(Type::int(0).unwrap_err().is_native());
        assert!(Type::int(65).unwrap_err().is_native());
    }

    #[test]
    fn function_queries() {
        let sig = Type::function(Type::void(), &[Type::ptr()], false).unwrap();

        assert_eq!(sig.kind(), Ok(TypeKind::Function));
        assert_eq!(sig.return_type(), Ok(Type::void()));
        assert_eq!(sig.is_vararg(), Ok(false));
        assert!(Type::i1().return_type().is_err());
        assert!(Type::f64().is_floating());
        assert_eq!(sig.to_string(), "void (ptr)");
    }
}
