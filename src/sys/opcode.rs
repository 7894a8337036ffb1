//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Every instruction opcode that the toolkit understands.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    /// Wrapping integer addition
    Add,
    /// Wrapping integer subtraction
    Sub,
    /// Wrapping integer multiplication
    Mul,
    /// Signed integer division
    SDiv,
    /// Unsigned integer division
    UDiv,
    /// Signed integer remainder
    SRem,
    /// Unsigned integer remainder
    URem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Left shift
    Shl,
    /// Logical (zero-filling) right shift
    LShr,
    /// Arithmetic (sign-filling) right shift
    AShr,
    /// Floating-point addition
    FAdd,
    /// Floating-point subtraction
    FSub,
    /// Floating-point multiplication
    FMul,
    /// Floating-point division
    FDiv,
    /// Integer/pointer comparison
    ICmp,
    /// Floating-point comparison
    FCmp,
    /// `cond ? a : b` without control flow
    Select,
    /// Zero-extension to a wider integer
    ZExt,
    /// Sign-extension to a wider integer
    SExt,
    /// Truncation to a narrower integer
    Trunc,
    /// Signed integer to floating-point
    SIToFP,
    /// Unsigned integer to floating-point
    UIToFP,
    /// Floating-point to signed integer
    FPToSI,
    /// Floating-point to unsigned integer
    FPToUI,
    /// `float` to `double`
    FPExt,
    /// `double` to `float`
    FPTrunc,
    /// Pointer to integer
    PtrToInt,
    /// Integer to pointer
    IntToPtr,
    /// Picks a value based on the predecessor block
    Phi,
    /// Direct call to a function
    Call,
    /// Unconditional branch
    Br,
    /// Two-way conditional branch
    CondBr,
    /// Return from the function
    Ret,
    /// Marks unreachable code
    Unreachable,
}

impl Opcode {
    /// Checks if this opcode ends a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br | Opcode::CondBr | Opcode::Ret | Opcode::Unreachable
        )
    }

    /// Checks if this is one of the two-operand arithmetic/bitwise opcodes.
    pub fn is_binary(self) -> bool {
        self.is_int_binary() || self.is_float_binary()
    }

    /// Checks if this is a binary opcode over integers.
    pub fn is_int_binary(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::SDiv
                | Opcode::UDiv
                | Opcode::SRem
                | Opcode::URem
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::Shl
                | Opcode::LShr
                | Opcode::AShr
        )
    }

    /// Checks if this is a binary opcode over floating-point values.
    pub fn is_float_binary(self) -> bool {
        matches!(
            self,
            Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv
        )
    }

    /// Checks if this is one of the conversion opcodes.
    pub fn is_cast(self) -> bool {
        matches!(
            self,
            Opcode::ZExt
                | Opcode::SExt
                | Opcode::Trunc
                | Opcode::SIToFP
                | Opcode::UIToFP
                | Opcode::FPToSI
                | Opcode::FPToUI
                | Opcode::FPExt
                | Opcode::FPTrunc
                | Opcode::PtrToInt
                | Opcode::IntToPtr
        )
    }

    /// Gets the textual mnemonic of the opcode.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::SDiv => "sdiv",
            Opcode::UDiv => "udiv",
            Opcode::SRem => "srem",
            Opcode::URem => "urem",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::LShr => "lshr",
            Opcode::AShr => "ashr",
            Opcode::FAdd => "fadd",
            Opcode::FSub => "fsub",
            Opcode::FMul => "fmul",
            Opcode::FDiv => "fdiv",
            Opcode::ICmp => "icmp",
            Opcode::FCmp => "fcmp",
            Opcode::Select => "select",
            Opcode::ZExt => "zext",
            Opcode::SExt => "sext",
            Opcode::Trunc => "trunc",
            Opcode::SIToFP => "sitofp",
            Opcode::UIToFP => "uitofp",
            Opcode::FPToSI => "fptosi",
            Opcode::FPToUI => "fptoui",
            Opcode::FPExt => "fpext",
            Opcode::FPTrunc => "fptrunc",
            Opcode::PtrToInt => "ptrtoint",
            Opcode::IntToPtr => "inttoptr",
            Opcode::Phi => "phi",
            Opcode::Call => "call",
            Opcode::Br | Opcode::CondBr => "br",
            Opcode::Ret => "ret",
            Opcode::Unreachable => "unreachable",
        }
    }
}

/// The comparisons that `icmp` can perform.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum IntPredicate {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// unsigned `>`
    Ugt,
    /// unsigned `>=`
    Uge,
    /// unsigned `<`
    Ult,
    /// unsigned `<=`
    Ule,
    /// signed `>`
    Sgt,
    /// signed `>=`
    Sge,
    /// signed `<`
    Slt,
    /// signed `<=`
    Sle,
}

impl IntPredicate {
    /// Gets the textual name of the predicate.
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }
}

/// The comparisons that `fcmp` can perform. All of these are *ordered*, i.e.
/// they evaluate to `false` if either operand is NaN.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum RealPredicate {
    /// ordered `==`
    Oeq,
    /// ordered `!=`
    One,
    /// ordered `>`
    Ogt,
    /// ordered `>=`
    Oge,
    /// ordered `<`
    Olt,
    /// ordered `<=`
    Ole,
}

impl RealPredicate {
    /// Gets the textual name of the predicate.
    pub fn mnemonic(self) -> &'static str {
        match self {
            RealPredicate::Oeq => "oeq",
            RealPredicate::One => "one",
            RealPredicate::Ogt => "ogt",
            RealPredicate::Oge => "oge",
            RealPredicate::Olt => "olt",
            RealPredicate::Ole => "ole",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Predicate {
    Int(IntPredicate),
    Real(RealPredicate),
}

impl Predicate {
    pub(crate) fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Int(pred) => pred.mnemonic(),
            Predicate::Real(pred) => pred.mnemonic(),
        }
    }
}
