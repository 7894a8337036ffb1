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
use crate::ir::{BasicBlock, Function, IntPredicate, Opcode, RealPredicate, Type, Value};
use crate::scope::scoped;
use crate::sys::{self, BuilderRef};
use log::warn;
use paste::paste;

/// Appends instructions to the end of a block.
///
/// ```
/// # use garnet::ir::{Builder, Function, Module, Type};
/// let m = Module::new("builder-doc");
/// let i32 = Type::i32();
/// let f = Function::new(&m, "double", Type::function(i32, &[i32], false)?)?;
///
/// Builder::with(|b| {
///     b.position_at_end(f.append_block("entry")?)?;
///     let x = f.param(0)?;
///     let sum = b.build_add(x, x, "sum")?;
///     b.build_ret(sum)?;
///
///     Ok(())
/// })?;
///
/// m.verify()?;
/// # Ok::<(), garnet::Error>(())
/// ```
#[derive(Debug)]
pub struct Builder {
    handle: HandleCell<BuilderRef>,
}

macro_rules! binary_builders {
    ( $( $name:ident => $opcode:ident ),* $(,)? ) => {
        paste! {
            $(
                #[doc = "Builds a `" $name "` of `lhs` and `rhs`."]
                pub fn [<build_ $name>](&self, lhs: Value, rhs: Value, name: &str) -> Result<Value> {
                    self.build_binary(Opcode::$opcode, lhs, rhs, name)
                }
            )*
        }
    };
}

macro_rules! cast_builders {
    ( $( $name:ident => $opcode:ident ),* $(,)? ) => {
        paste! {
            $(
                #[doc = "Builds a `" $name "` of `value` to `dest`."]
                pub fn [<build_ $name>](&self, value: Value, dest: Type, name: &str) -> Result<Value> {
                    self.build_cast(Opcode::$opcode, value, dest, name)
                }
            )*
        }
    };
}

impl Builder {
    /// Creates a builder that is not positioned anywhere yet.
    pub fn new() -> Self {
        Self {
            handle: HandleCell::of(sys::create_builder()),
        }
    }

    /// Creates a builder, lends it to `body` and disposes it afterwards.
    pub fn with<T>(body: impl FnOnce(&mut Builder) -> Result<T>) -> Result<T> {
        scoped(|| Ok(Self::new()), body)
    }

    /// Moves the builder to the end of `block`.
    pub fn position_at_end(&self, block: BasicBlock) -> Result<()> {
        Ok(sys::position_builder_at_end(self.handle.get()?, block.raw())?)
    }

    /// Gets the block the builder is appending to.
    pub fn insert_block(&self) -> Result<BasicBlock> {
        Ok(BasicBlock::from_raw(sys::get_insert_block(self.handle.get()?)?))
    }

    /// Builds any of the two-operand arithmetic or bitwise instructions.
    pub fn build_binary(&self, op: Opcode, lhs: Value, rhs: Value, name: &str) -> Result<Value> {
        let raw = sys::build_binary(self.handle.get()?, op, lhs.raw(), rhs.raw(), name)?;

        Ok(Value::from_raw(raw))
    }

    binary_builders! {
        add => Add,
        sub => Sub,
        mul => Mul,
        sdiv => SDiv,
        udiv => UDiv,
        srem => SRem,
        urem => URem,
        and => And,
        or => Or,
        xor => Xor,
        shl => Shl,
        lshr => LShr,
        ashr => AShr,
        fadd => FAdd,
        fsub => FSub,
        fmul => FMul,
        fdiv => FDiv,
    }

    /// Builds any of the conversion instructions.
    pub fn build_cast(&self, op: Opcode, value: Value, dest: Type, name: &str) -> Result<Value> {
        let raw = sys::build_cast(self.handle.get()?, op, value.raw(), dest.raw(), name)?;

        Ok(Value::from_raw(raw))
    }

    cast_builders! {
        zext => ZExt,
        sext => SExt,
        trunc => Trunc,
        sitofp => SIToFP,
        uitofp => UIToFP,
        fptosi => FPToSI,
        fptoui => FPToUI,
        fpext => FPExt,
        fptrunc => FPTrunc,
        ptrtoint => PtrToInt,
        inttoptr => IntToPtr,
    }

    /// Builds an integer comparison.
    pub fn build_icmp(&self, pred: IntPredicate, lhs: Value, rhs: Value, name: &str) -> Result<Value> {
        let raw = sys::build_icmp(self.handle.get()?, pred, lhs.raw(), rhs.raw(), name)?;

        Ok(Value::from_raw(raw))
    }

    /// Builds a floating-point comparison.
    pub fn build_fcmp(&self, pred: RealPredicate, lhs: Value, rhs: Value, name: &str) -> Result<Value> {
        let raw = sys::build_fcmp(self.handle.get()?, pred, lhs.raw(), rhs.raw(), name)?;

        Ok(Value::from_raw(raw))
    }

    /// Builds `cond ? if_true : if_false`.
    pub fn build_select(&self, cond: Value, if_true: Value, if_false: Value, name: &str) -> Result<Value> {
        let raw = sys::build_select(self.handle.get()?, cond.raw(), if_true.raw(), if_false.raw(), name)?;

        Ok(Value::from_raw(raw))
    }

    /// Builds a `phi` with no incoming values, see [`Value::add_incoming`].
    pub fn build_phi(&self, ty: Type, name: &str) -> Result<Value> {
        Ok(Value::from_raw(sys::build_phi(self.handle.get()?, ty.raw(), name)?))
    }

    /// Builds a direct call.
    pub fn build_call(&self, callee: Function, args: &[Value], name: &str) -> Result<Value> {
        let args: Vec<_> = args.iter().map(|arg| arg.raw()).collect();
        let raw = sys::build_call(self.handle.get()?, callee.as_value().raw(), &args, name)?;

        Ok(Value::from_raw(raw))
    }

    /// Builds an unconditional branch.
    pub fn build_br(&self, dest: BasicBlock) -> Result<Value> {
        Ok(Value::from_raw(sys::build_br(self.handle.get()?, dest.raw())?))
    }

    /// Builds a two-way branch on an `i1`.
    pub fn build_cond_br(&self, cond: Value, then: BasicBlock, otherwise: BasicBlock) -> Result<Value> {
        let raw = sys::build_cond_br(self.handle.get()?, cond.raw(), then.raw(), otherwise.raw())?;

        Ok(Value::from_raw(raw))
    }

    /// Builds `ret value`.
    pub fn build_ret(&self, value: Value) -> Result<Value> {
        Ok(Value::from_raw(sys::build_ret(self.handle.get()?, value.raw())?))
    }

    /// Builds `ret void`.
    pub fn build_ret_void(&self) -> Result<Value> {
        Ok(Value::from_raw(sys::build_ret_void(self.handle.get()?)?))
    }

    /// Builds `unreachable`.
    pub fn build_unreachable(&self) -> Result<Value> {
        Ok(Value::from_raw(sys::build_unreachable(self.handle.get()?)?))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispose for Builder {
    fn dispose(&mut self) {
        if let Some(raw) = self.handle.take() {
            if let Err(err) = sys::dispose_builder(raw) {
                warn!("failed to dispose builder {raw:?}: {err}");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Module;

    #[test]
    fn disposed_builders_reject_everything() {
        let m = Module::new("builder-disposed");
        let f = Function::new(&m, "f", Type::function(Type::void(), &[], false).unwrap()).unwrap();
        let entry = f.append_block("entry").unwrap();
        let mut b = Builder::new();

        b.dispose();
        b.dispose();

        assert!(b.is_disposed());
        assert!(b.position_at_end(entry).unwrap_err().is_invalid_reference());
        assert!(b.build_ret_void().unwrap_err().is_invalid_reference());
    }

    #[test]
    fn builds_casts_and_compares() {
        let m = Module::new("builder-casts");
        let sig = Type::function(Type::i64(), &[Type::i32(), Type::f32()], false).unwrap();
        let f = Function::new(&m, "mix", sig).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();

        let wide = b.build_sext(f.param(0).unwrap(), Type::i64(), "wide").unwrap();
        let real = b.build_fptosi(f.param(1).unwrap(), Type::i64(), "real").unwrap();
        let less = b.build_icmp(IntPredicate::Slt, wide, real, "less").unwrap();
        let min = b.build_select(less, wide, real, "min").unwrap();

        b.build_ret(min).unwrap();

        assert_eq!(wide.opcode().unwrap(), Opcode::SExt);
        assert_eq!(min.ty().unwrap(), Type::i64());
        assert_eq!(b.insert_block().unwrap(), f.entry_block().unwrap().unwrap());
        assert_eq!(m.verify(), Ok(()));
    }

    #[test]
    fn type_errors_are_native() {
        let m = Module::new("builder-errors");
        let f = Function::new(&m, "f", Type::function(Type::void(), &[], false).unwrap()).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();

        let one = Value::const_int(Type::i32(), 1).unwrap();
        let half = Value::const_real(Type::f32(), 0.5).unwrap();

        assert!(b.build_add(one, half, "bad").unwrap_err().is_native());
    }
}
