//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The value semantics shared by both engines and by the constant folder.
//!
//! Integers are stored zero-extended in a `u64` and re-masked after every
//! operation, so two `Scalar`s of the same width compare equal exactly when
//! they hold the same bit pattern.

use crate::sys::*;

/// One execution-time value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Scalar {
    Int { width: u32, bits: u64 },
    Float(f32),
    Double(f64),
    Pointer(u64),
    Void,
}

/// The shape of a first-class type, as far as the engines care.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ScalarTy {
    Void,
    Int(u32),
    Float,
    Double,
    Pointer,
}

#[inline]
pub(crate) fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
pub(crate) fn sign_extend(bits: u64, width: u32) -> i64 {
    let shift = 64 - width;

    ((bits << shift) as i64) >> shift
}

impl Scalar {
    pub(crate) fn int(width: u32, bits: u64) -> Self {
        Self::Int {
            width,
            bits: bits & mask(width),
        }
    }

    pub(crate) fn bool(value: bool) -> Self {
        Self::int(1, value as u64)
    }

    pub(crate) fn zero(ty: ScalarTy) -> Self {
        match ty {
            ScalarTy::Void => Self::Void,
            ScalarTy::Int(width) => Self::int(width, 0),
            ScalarTy::Float => Self::Float(0.0),
            ScalarTy::Double => Self::Double(0.0),
            ScalarTy::Pointer => Self::Pointer(0),
        }
    }

    pub(crate) fn ty(self) -> ScalarTy {
        match self {
            Self::Int { width, .. } => ScalarTy::Int(width),
            Self::Float(_) => ScalarTy::Float,
            Self::Double(_) => ScalarTy::Double,
            Self::Pointer(_) => ScalarTy::Pointer,
            Self::Void => ScalarTy::Void,
        }
    }

    pub(crate) fn is_true(self) -> NativeResult<bool> {
        match self {
            Self::Int { width: 1, bits } => Ok(bits != 0),
            _ => diag("branch condition is not an `i1`"),
        }
    }
}

impl Store {
    pub(crate) fn scalar_ty(&self, ty: TypeRef) -> NativeResult<ScalarTy> {
        Ok(match self.ty(ty)? {
            TypeData::Void => ScalarTy::Void,
            TypeData::Int(width) => ScalarTy::Int(*width),
            TypeData::Float => ScalarTy::Float,
            TypeData::Double => ScalarTy::Double,
            TypeData::Pointer => ScalarTy::Pointer,
            TypeData::Function { .. } => return diag("function types are not first-class"),
        })
    }

    /// Gets the value of a constant, or `None` if `value` is not a constant.
    pub(crate) fn constant_scalar(&self, value: ValueRef) -> NativeResult<Option<Scalar>> {
        let data = self.value(value)?;
        let ty = self.scalar_ty(data.ty)?;

        Ok(match (&data.kind, ty) {
            (ValueKind::ConstInt(bits), ScalarTy::Int(width)) => Some(Scalar::int(width, *bits)),
            (ValueKind::ConstReal(real), ScalarTy::Float) => Some(Scalar::Float(*real as f32)),
            (ValueKind::ConstReal(real), ScalarTy::Double) => Some(Scalar::Double(*real)),
            (ValueKind::ConstNull, _) => Some(Scalar::Pointer(0)),
            (ValueKind::Undef, ty) => Some(Scalar::zero(ty)),
            _ => None,
        })
    }
}

fn int_operands(lhs: Scalar, rhs: Scalar) -> NativeResult<(u32, u64, u64)> {
    match (lhs, rhs) {
        (Scalar::Int { width: w1, bits: a }, Scalar::Int { width: w2, bits: b }) if w1 == w2 => {
            Ok((w1, a, b))
        }
        _ => diag(format!("integer operation on mismatched operands {lhs:?} and {rhs:?}")),
    }
}

/// Evaluates one of the two-operand arithmetic/bitwise opcodes.
pub(crate) fn binary(op: Opcode, lhs: Scalar, rhs: Scalar) -> NativeResult<Scalar> {
    if op.is_float_binary() {
        return match (lhs, rhs) {
            (Scalar::Float(a), Scalar::Float(b)) => Ok(Scalar::Float(match op {
                Opcode::FAdd => a + b,
                Opcode::FSub => a - b,
                Opcode::FMul => a * b,
                _ => a / b,
            })),
            (Scalar::Double(a), Scalar::Double(b)) => Ok(Scalar::Double(match op {
                Opcode::FAdd => a + b,
                Opcode::FSub => a - b,
                Opcode::FMul => a * b,
                _ => a / b,
            })),
            _ => diag(format!("`{}` on non-floating operands", op.mnemonic())),
        };
    }

    let (width, a, b) = int_operands(lhs, rhs)?;
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));

    let bits = match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::UDiv | Opcode::URem | Opcode::SDiv | Opcode::SRem if b == 0 => {
            return diag("integer division by zero")
        }
        Opcode::UDiv => a / b,
        Opcode::URem => a % b,
        Opcode::SDiv | Opcode::SRem => {
            // `MIN / -1` overflows the narrow type even when it fits in an i64
            if sb == -1 && a == 1u64 << (width - 1) {
                return diag("signed division overflow");
            }

            match op {
                Opcode::SDiv => sa.wrapping_div(sb) as u64,
                _ => sa.wrapping_rem(sb) as u64,
            }
        }
        Opcode::Shl | Opcode::LShr | Opcode::AShr if b >= width as u64 => {
            return diag(format!("shift amount {b} is too large for `i{width}`"))
        }
        Opcode::Shl => a << b,
        Opcode::LShr => a >> b,
        Opcode::AShr => (sa >> b) as u64,
        _ => return diag(format!("`{}` is not a binary opcode", op.mnemonic())),
    };

    Ok(Scalar::int(width, bits))
}

/// Evaluates an `icmp`. Pointers compare as unsigned integers.
pub(crate) fn icmp(pred: IntPredicate, lhs: Scalar, rhs: Scalar) -> NativeResult<Scalar> {
    let (width, a, b) = match (lhs, rhs) {
        (Scalar::Pointer(a), Scalar::Pointer(b)) => (64, a, b),
        _ => int_operands(lhs, rhs)?,
    };

    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));

    Ok(Scalar::bool(match pred {
        IntPredicate::Eq => a == b,
        IntPredicate::Ne => a != b,
        IntPredicate::Ugt => a > b,
        IntPredicate::Uge => a >= b,
        IntPredicate::Ult => a < b,
        IntPredicate::Ule => a <= b,
        IntPredicate::Sgt => sa > sb,
        IntPredicate::Sge => sa >= sb,
        IntPredicate::Slt => sa < sb,
        IntPredicate::Sle => sa <= sb,
    }))
}

/// Evaluates an `fcmp`. Every predicate is ordered, so any NaN gives `false`.
pub(crate) fn fcmp(pred: RealPredicate, lhs: Scalar, rhs: Scalar) -> NativeResult<Scalar> {
    let (a, b) = match (lhs, rhs) {
        (Scalar::Float(a), Scalar::Float(b)) => (a as f64, b as f64),
        (Scalar::Double(a), Scalar::Double(b)) => (a, b),
        _ => return diag("`fcmp` on non-floating operands"),
    };

    if a.is_nan() || b.is_nan() {
        return Ok(Scalar::bool(false));
    }

    Ok(Scalar::bool(match pred {
        RealPredicate::Oeq => a == b,
        RealPredicate::One => a != b,
        RealPredicate::Ogt => a > b,
        RealPredicate::Oge => a >= b,
        RealPredicate::Olt => a < b,
        RealPredicate::Ole => a <= b,
    }))
}

pub(crate) fn select(cond: Scalar, if_true: Scalar, if_false: Scalar) -> NativeResult<Scalar> {
    Ok(if cond.is_true()? { if_true } else { if_false })
}

fn float_value(value: Scalar) -> NativeResult<f64> {
    match value {
        Scalar::Float(f) => Ok(f as f64),
        Scalar::Double(d) => Ok(d),
        _ => diag("expected a floating-point operand"),
    }
}

fn float_to_int(value: f64, width: u32, signed: bool) -> NativeResult<u64> {
    let truncated = value.trunc();
    let (low, high) = if signed {
        let half = 2f64.powi(width as i32 - 1);

        (-half, half)
    } else {
        (0.0, 2f64.powi(width as i32))
    };

    // written so that NaN fails the check as well
    if !(truncated >= low && truncated < high) {
        return diag(format!("{value} does not fit in `i{width}`"));
    }

    Ok(if signed {
        truncated as i64 as u64
    } else {
        truncated as u64
    })
}

/// Evaluates one of the conversion opcodes, producing a value of type `to`.
pub(crate) fn cast(op: Opcode, value: Scalar, to: ScalarTy) -> NativeResult<Scalar> {
    let result = match (op, value, to) {
        (Opcode::ZExt | Opcode::Trunc, Scalar::Int { bits, .. }, ScalarTy::Int(w)) => {
            Scalar::int(w, bits)
        }
        (Opcode::SExt, Scalar::Int { width, bits }, ScalarTy::Int(w)) => {
            Scalar::int(w, sign_extend(bits, width) as u64)
        }
        (Opcode::SIToFP, Scalar::Int { width, bits }, ScalarTy::Float) => {
            Scalar::Float(sign_extend(bits, width) as f32)
        }
        (Opcode::SIToFP, Scalar::Int { width, bits }, ScalarTy::Double) => {
            Scalar::Double(sign_extend(bits, width) as f64)
        }
        (Opcode::UIToFP, Scalar::Int { bits, .. }, ScalarTy::Float) => Scalar::Float(bits as f32),
        (Opcode::UIToFP, Scalar::Int { bits, .. }, ScalarTy::Double) => Scalar::Double(bits as f64),
        (Opcode::FPToSI, v, ScalarTy::Int(w)) => Scalar::int(w, float_to_int(float_value(v)?, w, true)?),
        (Opcode::FPToUI, v, ScalarTy::Int(w)) => Scalar::int(w, float_to_int(float_value(v)?, w, false)?),
        (Opcode::FPExt, Scalar::Float(f), ScalarTy::Double) => Scalar::Double(f as f64),
        (Opcode::FPTrunc, Scalar::Double(d), ScalarTy::Float) => Scalar::Float(d as f32),
        (Opcode::PtrToInt, Scalar::Pointer(p), ScalarTy::Int(w)) => Scalar::int(w, p),
        (Opcode::IntToPtr, Scalar::Int { bits, .. }, ScalarTy::Pointer) => Scalar::Pointer(bits),
        _ => {
            return diag(format!(
                "invalid `{}` from {value:?} to {to:?}",
                op.mnemonic()
            ))
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps_at_width() {
        let a = Scalar::int(8, 250);
        let b = Scalar::int(8, 10);

        assert_eq!(binary(Opcode::Add, a, b).unwrap(), Scalar::int(8, 4));
        assert_eq!(binary(Opcode::Sub, b, a).unwrap(), Scalar::int(8, 16));
    }

    #[test]
    fn signed_division_uses_sign() {
        let minus_six = Scalar::int(32, (-6i64) as u64);
        let two = Scalar::int(32, 2);

        assert_eq!(
            binary(Opcode::SDiv, minus_six, two).unwrap(),
            Scalar::int(32, (-3i64) as u64)
        );
        assert_eq!(
            binary(Opcode::AShr, minus_six, Scalar::int(32, 1)).unwrap(),
            Scalar::int(32, (-3i64) as u64)
        );
    }

    #[test]
    fn division_by_zero_is_diagnosed() {
        let err = binary(Opcode::UDiv, Scalar::int(32, 1), Scalar::int(32, 0)).unwrap_err();

        assert_eq!(err, NativeError::Diagnostic("integer division by zero".into()));
    }

    #[test]
    fn signed_overflow_is_diagnosed() {
        let min = Scalar::int(8, 0x80);
        let minus_one = Scalar::int(8, 0xFF);

        assert!(binary(Opcode::SDiv, min, minus_one).is_err());
    }

    #[test]
    fn icmp_signedness() {
        let minus_one = Scalar::int(16, 0xFFFF);
        let one = Scalar::int(16, 1);

        assert_eq!(icmp(IntPredicate::Slt, minus_one, one).unwrap(), Scalar::bool(true));
        assert_eq!(icmp(IntPredicate::Ult, minus_one, one).unwrap(), Scalar::bool(false));
    }

    #[test]
    fn fcmp_is_ordered() {
        let nan = Scalar::Double(f64::NAN);
        let one = Scalar::Double(1.0);

        assert_eq!(fcmp(RealPredicate::One, nan, one).unwrap(), Scalar::bool(false));
        assert_eq!(fcmp(RealPredicate::One, one, Scalar::Double(2.0)).unwrap(), Scalar::bool(true));
    }

    #[test]
    fn casts() {
        let minus_one = Scalar::int(8, 0xFF);

        assert_eq!(
            cast(Opcode::SExt, minus_one, ScalarTy::Int(32)).unwrap(),
            Scalar::int(32, 0xFFFF_FFFF)
        );
        assert_eq!(
            cast(Opcode::ZExt, minus_one, ScalarTy::Int(32)).unwrap(),
            Scalar::int(32, 0xFF)
        );
        assert_eq!(
            cast(Opcode::SIToFP, minus_one, ScalarTy::Double).unwrap(),
            Scalar::Double(-1.0)
        );
        assert_eq!(
            cast(Opcode::FPToSI, Scalar::Double(-2.75), ScalarTy::Int(8)).unwrap(),
            Scalar::int(8, (-2i64) as u64)
        );
        assert!(cast(Opcode::FPToUI, Scalar::Double(-1.0), ScalarTy::Int(8)).is_err());
        assert!(cast(Opcode::FPToSI, Scalar::Double(f64::NAN), ScalarTy::Int(8)).is_err());
    }
}
