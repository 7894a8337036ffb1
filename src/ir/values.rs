//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::collections::LinkedCollection;
use crate::error::{Error, Result};
use crate::ir::{non_null, Module, Opcode, Type, ValueCategory};
use crate::sys::{self, BlockRef, ValueRef};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Names any value: a constant, argument, instruction, function or global.
///
/// Values belong to the module they were created in (constants are shared by
/// every module). Once that module is disposed, or the value itself is erased,
/// every accessor fails with [`Error::InvalidReference`].
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Value(ValueRef);

impl Value {
    pub(crate) fn from_raw(raw: ValueRef) -> Self {
        Self(raw)
    }

    /// Gets the underlying handle.
    #[inline]
    pub fn raw(self) -> ValueRef {
        self.0
    }

    /// Gets an integer constant. `value` is truncated to the width of `ty`.
    pub fn const_int(ty: Type, value: i64) -> Result<Self> {
        Self::const_uint(ty, value as u64)
    }

    /// Gets an integer constant from its unsigned bit pattern.
    pub fn const_uint(ty: Type, bits: u64) -> Result<Self> {
        Ok(Self(sys::const_int(ty.raw(), bits)?))
    }

    /// Gets a `float` or `double` constant.
    pub fn const_real(ty: Type, value: f64) -> Result<Self> {
        Ok(Self(sys::const_real(ty.raw(), value)?))
    }

    /// Gets the zero value of `ty`.
    pub fn const_null(ty: Type) -> Result<Self> {
        Ok(Self(sys::const_null(ty.raw())?))
    }

    /// Gets `undef` of type `ty`.
    pub fn undef(ty: Type) -> Result<Self> {
        Ok(Self(sys::get_undef(ty.raw())?))
    }

    /// Gets the name. Unnamed values have an empty name.
    pub fn name(self) -> Result<String> {
        Ok(sys::get_value_name(self.0)?)
    }

    /// Renames the value.
    pub fn set_name(self, name: &str) -> Result<()> {
        Ok(sys::set_value_name(self.0, name)?)
    }

    /// Gets the type.
    pub fn ty(self) -> Result<Type> {
        Ok(Type::from_raw(sys::type_of(self.0)?))
    }

    /// Gets what kind of value this is.
    pub fn category(self) -> Result<ValueCategory> {
        Ok(sys::get_value_category(self.0)?)
    }

    /// Checks if this is a constant.
    pub fn is_constant(self) -> Result<bool> {
        Ok(sys::is_constant(self.0)?)
    }

    /// Gets the opcode of an instruction.
    pub fn opcode(self) -> Result<Opcode> {
        Ok(sys::get_instruction_opcode(self.0)?)
    }

    /// Gets the number of operands of an instruction.
    pub fn num_operands(self) -> Result<u32> {
        Ok(sys::get_num_operands(self.0)?)
    }

    /// Gets operand `index` of an instruction.
    pub fn operand(self, index: u32) -> Result<Value> {
        Ok(Self(sys::get_operand(self.0, index)?))
    }

    /// Gets the block an instruction is in.
    pub fn parent_block(self) -> Result<BasicBlock> {
        Ok(BasicBlock(sys::get_instruction_parent(self.0)?))
    }

    /// Gets the value of an integer constant, sign-extended.
    pub fn sext_value(self) -> Result<i64> {
        Ok(sys::const_int_get_sext_value(self.0)?)
    }

    /// Gets the value of an integer constant, zero-extended.
    pub fn zext_value(self) -> Result<u64> {
        Ok(sys::const_int_get_zext_value(self.0)?)
    }

    /// Gets the value of a floating-point constant.
    pub fn real_value(self) -> Result<f64> {
        Ok(sys::const_real_get_double(self.0)?)
    }

    /// Adds incoming `(value, predecessor)` pairs to a `phi`.
    pub fn add_incoming(self, incoming: &[(Value, BasicBlock)]) -> Result<()> {
        let (values, blocks): (Vec<_>, Vec<_>) = incoming.iter().map(|(v, b)| (v.0, b.0)).unzip();

        Ok(sys::add_incoming(self.0, &values, &blocks)?)
    }

    /// Gets the incoming pairs of a `phi`, in the order they were added.
    pub fn incoming(self) -> Result<Vec<(Value, BasicBlock)>> {
        (0..sys::count_incoming(self.0)?)
            .map(|i| {
                let (value, block) = sys::get_incoming(self.0, i)?;

                Ok((Value(value), BasicBlock(block)))
            })
            .collect()
    }

    /// Replaces every use of `self` with `other`.
    pub fn replace_all_uses_with(self, other: Value) -> Result<()> {
        Ok(sys::replace_all_uses_with(self.0, other.0)?)
    }
}

/// A function, either declared or defined.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Function(ValueRef);

impl Function {
    pub(crate) fn from_raw(raw: ValueRef) -> Self {
        Self(raw)
    }

    /// Adds a function declaration of type `ty` to `module`. It becomes a
    /// definition once a block is appended. If `name` is already taken the
    /// function is given a unique name instead.
    pub fn new(module: &Module, name: &str, ty: Type) -> Result<Self> {
        Ok(Self(sys::add_function(module.raw()?, name, ty.raw())?))
    }

    /// Views the function as a plain value, e.g. to call it.
    #[inline]
    pub fn as_value(self) -> Value {
        Value(self.0)
    }

    /// Gets the function's name.
    pub fn name(self) -> Result<String> {
        Ok(sys::get_value_name(self.0)?)
    }

    /// Gets the function type.
    pub fn ty(self) -> Result<Type> {
        Ok(Type::from_raw(sys::get_function_type(self.0)?))
    }

    /// Gets every parameter.
    pub fn params(self) -> Result<Vec<Value>> {
        Ok(sys::get_params(self.0)?.into_iter().map(Value).collect())
    }

    /// Gets parameter `index`.
    pub fn param(self, index: u32) -> Result<Value> {
        Ok(Value(sys::get_param(self.0, index)?))
    }

    /// Appends a new, empty block.
    pub fn append_block(self, name: &str) -> Result<BasicBlock> {
        Ok(BasicBlock(sys::append_basic_block(self.0, name)?))
    }

    /// Views the blocks of the function, in layout order.
    pub fn blocks(self) -> Blocks {
        Blocks { func: self.0 }
    }

    /// Gets the entry block, or `None` for a declaration.
    pub fn entry_block(self) -> Result<Option<BasicBlock>> {
        Ok(non_null(sys::get_first_basic_block(self.0)?).map(BasicBlock))
    }

    /// Checks if the function has no body.
    pub fn is_declaration(self) -> Result<bool> {
        Ok(sys::is_declaration(self.0)?)
    }

    /// Removes the function from its module. It must not be used anymore.
    pub fn erase(self) -> Result<()> {
        Ok(sys::delete_function(self.0)?)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        func.as_value()
    }
}

impl TryFrom<Value> for Function {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        expect_category(value, ValueCategory::Function)?;

        Ok(Self(value.0))
    }
}

/// A module-level variable.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct GlobalVariable(ValueRef);

impl GlobalVariable {
    pub(crate) fn from_raw(raw: ValueRef) -> Self {
        Self(raw)
    }

    /// Adds a global holding a `ty` to `module`.
    pub fn new(module: &Module, ty: Type, name: &str) -> Result<Self> {
        Ok(Self(sys::add_global(module.raw()?, ty.raw(), name)?))
    }

    /// Views the global as a plain value.
    #[inline]
    pub fn as_value(self) -> Value {
        Value(self.0)
    }

    /// Gets the global's name.
    pub fn name(self) -> Result<String> {
        Ok(sys::get_value_name(self.0)?)
    }

    /// Gets the type of the value the global holds.
    pub fn value_type(self) -> Result<Type> {
        Ok(Type::from_raw(sys::get_global_value_type(self.0)?))
    }

    /// Gets the initializer, if the global has one.
    pub fn initializer(self) -> Result<Option<Value>> {
        Ok(non_null(sys::get_initializer(self.0)?).map(Value))
    }

    /// Sets the initializer, which must be a constant of [`Self::value_type`].
    pub fn set_initializer(self, init: Value) -> Result<()> {
        Ok(sys::set_initializer(self.0, init.0)?)
    }

    /// Checks if the global is marked constant.
    pub fn is_constant(self) -> Result<bool> {
        Ok(sys::is_global_constant(self.0)?)
    }

    /// Marks the global as constant (or not).
    pub fn set_constant(self, constant: bool) -> Result<()> {
        Ok(sys::set_global_constant(self.0, constant)?)
    }

    /// Removes the global from its module.
    pub fn erase(self) -> Result<()> {
        Ok(sys::delete_global(self.0)?)
    }
}

impl From<GlobalVariable> for Value {
    fn from(global: GlobalVariable) -> Self {
        global.as_value()
    }
}

impl TryFrom<Value> for GlobalVariable {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        expect_category(value, ValueCategory::GlobalVariable)?;

        Ok(Self(value.0))
    }
}

/// A basic block inside of a function.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct BasicBlock(BlockRef);

impl BasicBlock {
    pub(crate) fn from_raw(raw: BlockRef) -> Self {
        Self(raw)
    }

    /// Gets the underlying handle.
    #[inline]
    pub fn raw(self) -> BlockRef {
        self.0
    }

    /// Gets the block's name.
    pub fn name(self) -> Result<String> {
        Ok(sys::get_basic_block_name(self.0)?)
    }

    /// Gets the function the block is in.
    pub fn parent(self) -> Result<Function> {
        Ok(Function(sys::get_basic_block_parent(self.0)?))
    }

    /// Views the instructions of the block, in order.
    pub fn instructions(self) -> Instructions {
        Instructions { block: self.0 }
    }

    /// Gets the terminator, if the block has one yet.
    pub fn terminator(self) -> Result<Option<Value>> {
        Ok(non_null(sys::get_basic_block_terminator(self.0)?).map(Value))
    }
}

/// The blocks of a [`Function`].
#[derive(Copy, Clone, Debug)]
pub struct Blocks {
    func: ValueRef,
}

impl LinkedCollection for Blocks {
    type Cursor = BlockRef;
    type Item = BasicBlock;

    const KIND: &'static str = "basic blocks";

    fn first(&self) -> Result<Option<BlockRef>> {
        Ok(non_null(sys::get_first_basic_block(self.func)?))
    }

    fn next(&self, cursor: BlockRef) -> Result<Option<BlockRef>> {
        Ok(non_null(sys::get_next_basic_block(cursor)?))
    }

    fn last(&self) -> Result<Option<BlockRef>> {
        Ok(non_null(sys::get_last_basic_block(self.func)?))
    }

    fn item(&self, cursor: BlockRef) -> Result<BasicBlock> {
        Ok(BasicBlock(cursor))
    }
}

/// The instructions of a [`BasicBlock`].
#[derive(Copy, Clone, Debug)]
pub struct Instructions {
    block: BlockRef,
}

impl LinkedCollection for Instructions {
    type Cursor = ValueRef;
    type Item = Value;

    const KIND: &'static str = "instructions";

    fn first(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_first_instruction(self.block)?))
    }

    fn next(&self, cursor: ValueRef) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_next_instruction(cursor)?))
    }

    fn last(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_last_instruction(self.block)?))
    }

    fn item(&self, cursor: ValueRef) -> Result<Value> {
        Ok(Value(cursor))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match sys::get_value_name(self.0) {
            Ok(name) if !name.is_empty() => write!(f, "%{name}"),
            Ok(_) => write!(f, "<unnamed>"),
            Err(_) => write!(f, "<stale>"),
        }
    }
}

fn expect_category(value: Value, expected: ValueCategory) -> Result<()> {
    let actual = value.category()?;

    if actual == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch(format!("expected a {expected:?}, found a {actual:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Builder;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocks_and_instructions_are_views() {
        let m = Module::new("values-views");
        let i32 = Type::i32();
        let f = Function::new(&m, "id", Type::function(i32, &[i32], false).unwrap()).unwrap();

        assert!(f.is_declaration().unwrap());
        assert_eq!(f.entry_block().unwrap(), None);
        assert!(f.blocks().is_empty().unwrap());

        let entry = f.append_block("entry").unwrap();
        let b = Builder::new();

        b.position_at_end(entry).unwrap();
        let ret = b.build_ret(f.param(0).unwrap()).unwrap();

        assert_eq!(f.entry_block().unwrap(), Some(entry));
        assert_eq!(f.blocks().iter().collect::<Result<Vec<_>>>(), Ok(vec![entry]));
        assert_eq!(entry.instructions().iter().collect::<Result<Vec<_>>>(), Ok(vec![ret]));
        assert_eq!(entry.terminator().unwrap(), Some(ret));
        assert_eq!(entry.parent().unwrap(), f);
        assert_eq!(ret.opcode().unwrap(), Opcode::Ret);
        assert_eq!(ret.operand(0).unwrap(), f.param(0).unwrap());
    }

    #[test]
    fn constants() {
        let c = Value::const_int(Type::i8(), -1).unwrap();

        assert_eq!(c.sext_value().unwrap(), -1);
        assert_eq!(c.zext_value().unwrap(), 255);
        assert_eq!(c.category().unwrap(), ValueCategory::ConstantInt);
        assert_eq!(Value::const_real(Type::f64(), 0.5).unwrap().real_value().unwrap(), 0.5);
        assert_eq!(Value::const_null(Type::ptr()).unwrap().category().unwrap(), ValueCategory::ConstantNull);
        assert!(Value::undef(Type::void()).unwrap_err().is_native());
    }

    #[test]
    fn globals() {
        let m = Module::new("values-globals");
        let g = GlobalVariable::new(&m, Type::i64(), "counter").unwrap();

        assert_eq!(g.initializer().unwrap(), None);

        let init = Value::const_int(Type::i64(), 10).unwrap();

        g.set_initializer(init).unwrap();
        g.set_constant(true).unwrap();

        assert_eq!(g.initializer().unwrap(), Some(init));
        assert!(g.is_constant().unwrap());
        assert_eq!(g.value_type().unwrap(), Type::i64());

        g.erase().unwrap();

        assert!(g.name().unwrap_err().is_invalid_reference());
    }

    #[test]
    fn erased_functions_are_invalid_references() {
        let m = Module::new("values-erase");
        let f = Function::new(&m, "gone", Type::function(Type::void(), &[], false).unwrap()).unwrap();

        assert_eq!(Function::try_from(f.as_value()), Ok(f));
        assert!(GlobalVariable::try_from(f.as_value()).unwrap_err().is_type_mismatch());

        f.erase().unwrap();

        assert!(f.name().unwrap_err().is_invalid_reference());
        assert!(f.as_value().ty().unwrap_err().is_invalid_reference());
    }
}
