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
use std::fmt;
use std::fmt::{Display, Formatter};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A parsed data layout. Every size and alignment is measured in bits.
///
/// This is parsed from the usual `-` separated layout strings, e.g.
/// `e-p:64:64-i64:64-f80:128-n8:16:32:64-S128`. Only byte order, pointer,
/// integer and float components are understood, the rest are accepted and ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DataLayout {
    /// Whether multi-byte values are stored most-significant byte first.
    pub big_endian: bool,
    /// The width of a pointer.
    pub pointer_size: u32,
    /// The ABI alignment of a pointer.
    pub pointer_align: u32,
    /// `(width, abi alignment)` pairs for integers, sorted by width.
    pub int_aligns: Vec<(u32, u32)>,
    /// The ABI alignment of `float`.
    pub float_align: u32,
    /// The ABI alignment of `double`.
    pub double_align: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::host()
    }
}

fn parse_bits(component: &str, text: &str) -> NativeResult<u32> {
    match text.parse::<u32>() {
        Ok(bits) if bits > 0 => Ok(bits),
        _ => diag(format!("malformed data layout component `{component}`")),
    }
}

impl DataLayout {
    /// The layout of the machine the toolkit is running on.
    pub fn host() -> Self {
        let pointer = usize::BITS;

        Self {
            big_endian: cfg!(target_endian = "big"),
            pointer_size: pointer,
            pointer_align: pointer,
            int_aligns: vec![(1, 8), (8, 8), (16, 16), (32, 32), (64, 64)],
            float_align: 32,
            double_align: 64,
        }
    }

    /// Parses a layout string. An empty string gives [`Self::host`].
    pub fn parse(layout: &str) -> NativeResult<Self> {
        let mut out = Self::host();

        if layout.is_empty() {
            return Ok(out);
        }

        for component in layout.split('-') {
            let mut pieces = component.split(':');
            let head = pieces.next().unwrap_or_default();
            let args: Vec<&str> = pieces.collect();

            match head.chars().next() {
                Some('e') if head.len() == 1 => out.big_endian = false,
                Some('E') if head.len() == 1 => out.big_endian = true,
                Some('p') if head == "p" || head == "p0" => {
                    let (size, abi) = match args.as_slice() {
                        [size, abi, ..] => (parse_bits(component, size)?, parse_bits(component, abi)?),
                        _ => return diag(format!("malformed data layout component `{component}`")),
                    };

                    out.pointer_size = size;
                    out.pointer_align = abi;
                }
                // other address spaces have no meaning here
                Some('p') => {}
                Some('i') => {
                    let width = parse_bits(component, &head[1..])?;
                    let abi = match args.first() {
                        Some(abi) => parse_bits(component, abi)?,
                        None => return diag(format!("malformed data layout component `{component}`")),
                    };

                    match out.int_aligns.iter_mut().find(|(w, _)| *w == width) {
                        Some(entry) => entry.1 = abi,
                        None => {
                            out.int_aligns.push((width, abi));
                            out.int_aligns.sort_unstable();
                        }
                    }
                }
                Some('f') => {
                    let width = parse_bits(component, &head[1..])?;
                    let abi = match args.first() {
                        Some(abi) => parse_bits(component, abi)?,
                        None => return diag(format!("malformed data layout component `{component}`")),
                    };

                    match width {
                        32 => out.float_align = abi,
                        64 => out.double_align = abi,
                        _ => {}
                    }
                }
                Some('n' | 'S' | 'm' | 'a' | 'A' | 'P' | 'G' | 'v' | 'F') => {}
                _ => return diag(format!("malformed data layout component `{component}`")),
            }
        }

        Ok(out)
    }

    /// Checks whether code built for this layout can run natively on the host.
    pub fn matches_host(&self) -> bool {
        let host = Self::host();

        self.big_endian == host.big_endian && self.pointer_size == host.pointer_size
    }

    fn int_align(&self, width: u32) -> u32 {
        self.int_aligns
            .iter()
            .find(|(w, _)| *w >= width)
            .or_else(|| self.int_aligns.last())
            .map_or(64, |(_, abi)| *abi)
    }

    pub(crate) fn size_in_bits(&self, ty: &TypeData) -> NativeResult<u64> {
        Ok(match ty {
            TypeData::Void => 0,
            TypeData::Int(width) => *width as u64,
            TypeData::Float => 32,
            TypeData::Double => 64,
            TypeData::Pointer => self.pointer_size as u64,
            TypeData::Function { .. } => return diag("function types do not have a size"),
        })
    }

    pub(crate) fn abi_align_in_bits(&self, ty: &TypeData) -> NativeResult<u64> {
        Ok(match ty {
            TypeData::Void => 8,
            TypeData::Int(width) => self.int_align(*width) as u64,
            TypeData::Float => self.float_align as u64,
            TypeData::Double => self.double_align as u64,
            TypeData::Pointer => self.pointer_align as u64,
            TypeData::Function { .. } => return diag("function types do not have an alignment"),
        })
    }
}

impl Display for DataLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-p:{}:{}",
            if self.big_endian { "E" } else { "e" },
            self.pointer_size,
            self.pointer_align
        )?;

        for (width, abi) in self.int_aligns.iter() {
            write!(f, "-i{width}:{abi}")?;
        }

        write!(f, "-f32:{}-f64:{}", self.float_align, self.double_align)
    }
}

/// Gets the triple of the machine the toolkit is running on.
pub fn get_default_target_triple() -> String {
    format!(
        "{}-unknown-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}

/// Parses a layout string into a new target data object.
pub fn create_target_data(layout: &str) -> NativeResult<TargetDataRef> {
    let parsed = DataLayout::parse(layout)?;

    Ok(with_store(|store| store.target_data.insert(parsed)))
}

/// Frees a target data object.
pub fn dispose_target_data(td: TargetDataRef) -> NativeResult<()> {
    with_store(|store| {
        store
            .target_data
            .remove(td)
            .map(|_| ())
            .ok_or(NativeError::StaleHandle("target data"))
    })
}

/// Renders the canonical form of the layout.
pub fn copy_string_rep_of_target_data(td: TargetDataRef) -> NativeResult<String> {
    with_store(|store| Ok(store.layout(td)?.to_string()))
}

/// Gets a copy of the parsed layout.
pub fn get_target_data_layout(td: TargetDataRef) -> NativeResult<DataLayout> {
    with_store(|store| Ok(store.layout(td)?.clone()))
}

/// Gets the size of a pointer in bytes.
pub fn pointer_size(td: TargetDataRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.layout(td)?.pointer_size / 8))
}

/// Checks whether the layout is big-endian.
pub fn is_big_endian(td: TargetDataRef) -> NativeResult<bool> {
    with_store(|store| Ok(store.layout(td)?.big_endian))
}

/// Gets the integer type that is as wide as a pointer.
pub fn int_ptr_type(td: TargetDataRef) -> NativeResult<TypeRef> {
    with_store(|store| {
        let width = store.layout(td)?.pointer_size;

        Ok(store.intern_type(TypeData::Int(width)))
    })
}

/// Gets the number of bits in a value of type `ty`.
pub fn size_of_type_in_bits(td: TargetDataRef, ty: TypeRef) -> NativeResult<u64> {
    with_store(|store| store.layout(td)?.size_in_bits(store.ty(ty)?))
}

/// Gets the maximum number of bytes that storing a value of type `ty` may overwrite.
pub fn store_size_of_type(td: TargetDataRef, ty: TypeRef) -> NativeResult<u64> {
    size_of_type_in_bits(td, ty).map(|bits| (bits + 7) / 8)
}

/// Gets the ABI-required alignment of `ty` in bytes.
pub fn abi_alignment_of_type(td: TargetDataRef, ty: TypeRef) -> NativeResult<u64> {
    with_store(|store| {
        store
            .layout(td)?
            .abi_align_in_bits(store.ty(ty)?)
            .map(|bits| bits / 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_layout_is_host() {
        assert_eq!(DataLayout::parse("").unwrap(), DataLayout::host());
        assert!(DataLayout::host().matches_host());
    }

    #[test]
    fn parses_known_components() {
        let layout = DataLayout::parse("E-p:32:32-i64:32-f64:32-n8:16:32-S64").unwrap();

        assert!(layout.big_endian);
        assert_eq!(layout.pointer_size, 32);
        assert_eq!(layout.int_align(64), 32);
        assert_eq!(layout.int_align(12), 16);
        assert_eq!(layout.double_align, 32);
    }

    #[test]
    fn rejects_malformed_components() {
        assert!(DataLayout::parse("e-p:sixty-four:64").is_err());
        assert!(DataLayout::parse("e-q42").is_err());
        assert!(DataLayout::parse("e-i32").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let layout = DataLayout::parse("e-p:64:64-i128:128").unwrap();

        assert_eq!(DataLayout::parse(&layout.to_string()).unwrap(), layout);
    }

    #[test]
    fn target_data_queries() {
        let td = create_target_data("e-p:32:32").unwrap();
        let i17 = int_type(17).unwrap();

        assert_eq!(pointer_size(td).unwrap(), 4);
        assert_eq!(get_int_type_width(int_ptr_type(td).unwrap()).unwrap(), 32);
        assert_eq!(size_of_type_in_bits(td, i17).unwrap(), 17);
        assert_eq!(store_size_of_type(td, i17).unwrap(), 3);
        assert_eq!(abi_alignment_of_type(td, i17).unwrap(), 4);
        assert_eq!(abi_alignment_of_type(td, double_type()).unwrap(), 8);

        dispose_target_data(td).unwrap();
        assert!(pointer_size(td).is_err());
    }

    #[cfg(feature = "enable-serde")]
    #[test]
    fn layout_serializes() {
        use serde_test::{assert_tokens, Token};

        let layout = DataLayout {
            big_endian: false,
            pointer_size: 64,
            pointer_align: 64,
            int_aligns: vec![(32, 32)],
            float_align: 32,
            double_align: 64,
        };

        assert_tokens(
            &layout,
            &[
                Token::Struct {
                    name: "DataLayout",
                    len: 6,
                },
                Token::Str("big_endian"),
                Token::Bool(false),
                Token::Str("pointer_size"),
                Token::U32(64),
                Token::Str("pointer_align"),
                Token::U32(64),
                Token::Str("int_aligns"),
                Token::Seq { len: Some(1) },
                Token::Tuple { len: 2 },
                Token::U32(32),
                Token::U32(32),
                Token::TupleEnd,
                Token::SeqEnd,
                Token::Str("float_align"),
                Token::U32(32),
                Token::Str("double_align"),
                Token::U32(64),
                Token::StructEnd,
            ],
        );
    }
}
