//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::sys::*;
use smallvec::SmallVec;
use std::fmt::Write;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The widest integer type that the toolkit supports.
pub const MAX_INT_WIDTH: u32 = 64;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) enum TypeData {
    Void,
    Int(u32),
    Float,
    Double,
    Pointer,
    Function {
        ret: TypeRef,
        params: SmallVec<[TypeRef; 4]>,
        vararg: bool,
    },
}

/// The broad category that a type falls into.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum TypeKind {
    /// `void`, the type of "nothing"
    Void,
    /// `iN` for some `N`
    Integer,
    /// `float`, single-precision IEEE-754
    Float,
    /// `double`, double-precision IEEE-754
    Double,
    /// `ptr`, an opaque pointer
    Pointer,
    /// The type of a function
    Function,
}

impl Store {
    pub(crate) fn intern_type(&mut self, data: TypeData) -> TypeRef {
        if let Some(ty) = self.type_lookup.get(&data) {
            return *ty;
        }

        let ty = self.types.insert(data.clone());
        self.type_lookup.insert(data, ty);

        ty
    }

    pub(crate) fn int_width(&self, ty: TypeRef) -> Option<u32> {
        match self.types.get(ty) {
            Some(TypeData::Int(width)) => Some(*width),
            _ => None,
        }
    }

    pub(crate) fn is_void(&self, ty: TypeRef) -> bool {
        matches!(self.types.get(ty), Some(TypeData::Void))
    }

    pub(crate) fn is_floating(&self, ty: TypeRef) -> bool {
        matches!(self.types.get(ty), Some(TypeData::Float | TypeData::Double))
    }

    pub(crate) fn is_pointer(&self, ty: TypeRef) -> bool {
        matches!(self.types.get(ty), Some(TypeData::Pointer))
    }

    /// Gets the return and parameter types of a function type.
    pub(crate) fn signature(&self, ty: TypeRef) -> NativeResult<(TypeRef, &[TypeRef], bool)> {
        match self.ty(ty)? {
            TypeData::Function {
                ret,
                params,
                vararg,
            } => Ok((*ret, params.as_slice(), *vararg)),
            _ => diag("type is not a function type"),
        }
    }

    pub(crate) fn type_name(&self, ty: TypeRef) -> String {
        let mut out = String::default();

        self.write_type(&mut out, ty);

        out
    }

    fn write_type(&self, out: &mut String, ty: TypeRef) {
        // writing into a `String` cannot fail
        let _ = match self.types.get(ty) {
            None => write!(out, "<stale>"),
            Some(TypeData::Void) => write!(out, "void"),
            Some(TypeData::Int(width)) => write!(out, "i{width}"),
            Some(TypeData::Float) => write!(out, "float"),
            Some(TypeData::Double) => write!(out, "double"),
            Some(TypeData::Pointer) => write!(out, "ptr"),
            Some(TypeData::Function {
                ret,
                params,
                vararg,
            }) => {
                self.write_type(out, *ret);
                out.push_str(" (");

                for (i, param) in params.iter().enumerate() {
                    if i != 0 {
                        out.push_str(", ");
                    }

                    self.write_type(out, *param);
                }

                if *vararg {
                    out.push_str(if params.is_empty() { "..." } else { ", ..." });
                }

                write!(out, ")")
            }
        };
    }
}

/// Gets the `void` type.
pub fn void_type() -> TypeRef {
    with_store(|store| store.intern_type(TypeData::Void))
}

/// Gets the integer type with `width` bits, `width` must be in `1..=64`.
pub fn int_type(width: u32) -> NativeResult<TypeRef> {
    if width == 0 || width > MAX_INT_WIDTH {
        return diag(format!(
            "integer width {width} is outside of the supported range 1..={MAX_INT_WIDTH}"
        ));
    }

    Ok(with_store(|store| store.intern_type(TypeData::Int(width))))
}

/// Gets the single-precision floating-point type.
pub fn float_type() -> TypeRef {
    with_store(|store| store.intern_type(TypeData::Float))
}

/// Gets the double-precision floating-point type.
pub fn double_type() -> TypeRef {
    with_store(|store| store.intern_type(TypeData::Double))
}

/// Gets the opaque pointer type.
pub fn pointer_type() -> TypeRef {
    with_store(|store| store.intern_type(TypeData::Pointer))
}

/// Gets the type of a function returning `ret` and taking `params`.
pub fn function_type(ret: TypeRef, params: &[TypeRef], vararg: bool) -> NativeResult<TypeRef> {
    with_store(|store| {
        if let TypeData::Function { .. } = store.ty(ret)? {
            return diag("functions cannot return functions");
        }

        for param in params {
            match store.ty(*param)? {
                TypeData::Void => return diag("function parameters cannot be `void`"),
                TypeData::Function { .. } => return diag("function parameters cannot be functions"),
                _ => {}
            }
        }

        Ok(store.intern_type(TypeData::Function {
            ret,
            params: params.iter().copied().collect(),
            vararg,
        }))
    })
}

/// Gets the category that `ty` belongs to.
pub fn get_type_kind(ty: TypeRef) -> NativeResult<TypeKind> {
    with_store(|store| {
        Ok(match store.ty(ty)? {
            TypeData::Void => TypeKind::Void,
            TypeData::Int(_) => TypeKind::Integer,
            TypeData::Float => TypeKind::Float,
            TypeData::Double => TypeKind::Double,
            TypeData::Pointer => TypeKind::Pointer,
            TypeData::Function { .. } => TypeKind::Function,
        })
    })
}

/// Gets the width of an integer type.
pub fn get_int_type_width(ty: TypeRef) -> NativeResult<u32> {
    with_store(|store| match store.ty(ty)? {
        TypeData::Int(width) => Ok(*width),
        _ => diag("type is not an integer type"),
    })
}

/// Gets the return type of a function type.
pub fn get_return_type(fn_ty: TypeRef) -> NativeResult<TypeRef> {
    with_store(|store| store.signature(fn_ty).map(|(ret, _, _)| ret))
}

/// Gets the parameter types of a function type.
pub fn get_param_types(fn_ty: TypeRef) -> NativeResult<Vec<TypeRef>> {
    with_store(|store| store.signature(fn_ty).map(|(_, params, _)| params.to_vec()))
}

/// Checks if a function type accepts extra arguments.
pub fn is_function_var_arg(fn_ty: TypeRef) -> NativeResult<bool> {
    with_store(|store| store.signature(fn_ty).map(|(_, _, vararg)| vararg))
}

/// Renders a type the way the printer does.
pub fn print_type_to_string(ty: TypeRef) -> NativeResult<String> {
    with_store(|store| {
        store.ty(ty)?;

        Ok(store.type_name(ty))
    })
}
