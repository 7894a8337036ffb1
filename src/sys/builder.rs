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
use smallvec::{smallvec, SmallVec};

struct Insertion {
    block: BlockRef,
    function: ValueRef,
    module: ModuleRef,
}

impl Store {
    fn insertion(&self, b: BuilderRef) -> NativeResult<Insertion> {
        let block = match self.builder(b)?.block {
            Some(block) => block,
            None => return diag("builder is not positioned in a block"),
        };

        let function = self.block(block)?.function;
        let module = self.parent_module(function)?;

        Ok(Insertion {
            block,
            function,
            module,
        })
    }

    /// Checks that `value` can be used from inside of `at`, and gets its type.
    fn operand(&self, at: &Insertion, value: ValueRef) -> NativeResult<TypeRef> {
        let data = self.value(value)?;

        match &data.kind {
            ValueKind::Inst(_) | ValueKind::Argument { .. } => {
                if self.enclosing_function(value)? != at.function {
                    return diag("operand belongs to a different function");
                }
            }
            ValueKind::Function(_) | ValueKind::Global(_) => {
                if self.parent_module(value)? != at.module {
                    return diag("operand belongs to a different module");
                }
            }
            _ => {}
        }

        Ok(data.ty)
    }

    fn target(&self, at: &Insertion, block: BlockRef) -> NativeResult<BlockRef> {
        if self.block(block)?.function != at.function {
            return diag("branch target belongs to a different function");
        }

        Ok(block)
    }

    fn mismatch<T>(&self, what: &str, lhs: TypeRef, rhs: TypeRef) -> NativeResult<T> {
        diag(format!(
            "{what}: `{}` and `{}` do not match",
            self.type_name(lhs),
            self.type_name(rhs)
        ))
    }

    fn emit(
        &mut self,
        at: Insertion,
        ty: TypeRef,
        name: &str,
        opcode: Opcode,
        operands: SmallVec<[ValueRef; 3]>,
        targets: SmallVec<[BlockRef; 2]>,
        predicate: Option<Predicate>,
    ) -> NativeResult<ValueRef> {
        // `void` results cannot be referred to by name
        let name = if self.is_void(ty) { "" } else { name };
        let inst = InstData {
            block: at.block,
            opcode,
            operands,
            targets,
            predicate,
        };

        self.append_inst(at.block, ty, name, inst)
    }
}

/// Creates a builder that is not positioned anywhere.
pub fn create_builder() -> BuilderRef {
    with_store(|store| store.builders.insert(BuilderData { block: None }))
}

/// Frees a builder.
pub fn dispose_builder(b: BuilderRef) -> NativeResult<()> {
    with_store(|store| {
        store.builder(b)?;
        store.builders.remove(b);

        Ok(())
    })
}

/// Makes the builder append to the end of `bb`.
pub fn position_builder_at_end(b: BuilderRef, bb: BlockRef) -> NativeResult<()> {
    with_store(|store| {
        store.block(bb)?;
        store.builder_mut(b)?.block = Some(bb);

        Ok(())
    })
}

/// Gets the block the builder appends to, or null.
pub fn get_insert_block(b: BuilderRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.builder(b)?.block.unwrap_or_default()))
}

/// Builds one of the two-operand arithmetic or bitwise instructions.
pub fn build_binary(b: BuilderRef, op: Opcode, lhs: ValueRef, rhs: ValueRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let (lt, rt) = (store.operand(&at, lhs)?, store.operand(&at, rhs)?);

        if !op.is_binary() {
            return diag(format!("`{}` is not a binary opcode", op.mnemonic()));
        }

        if lt != rt {
            return store.mismatch(op.mnemonic(), lt, rt);
        }

        let valid = if op.is_int_binary() {
            store.int_width(lt).is_some()
        } else {
            store.is_floating(lt)
        };

        if !valid {
            return diag(format!(
                "`{}` cannot operate on `{}`",
                op.mnemonic(),
                store.type_name(lt)
            ));
        }

        store.emit(at, lt, name, op, smallvec![lhs, rhs], SmallVec::new(), None)
    })
}

/// Builds an integer (or pointer) comparison.
pub fn build_icmp(b: BuilderRef, pred: IntPredicate, lhs: ValueRef, rhs: ValueRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let (lt, rt) = (store.operand(&at, lhs)?, store.operand(&at, rhs)?);

        if lt != rt {
            return store.mismatch("icmp", lt, rt);
        }

        if store.int_width(lt).is_none() && !store.is_pointer(lt) {
            return diag("`icmp` operands must be integers or pointers");
        }

        let i1 = store.intern_type(TypeData::Int(1));

        store.emit(
            at,
            i1,
            name,
            Opcode::ICmp,
            smallvec![lhs, rhs],
            SmallVec::new(),
            Some(Predicate::Int(pred)),
        )
    })
}

/// Builds a floating-point comparison.
pub fn build_fcmp(b: BuilderRef, pred: RealPredicate, lhs: ValueRef, rhs: ValueRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let (lt, rt) = (store.operand(&at, lhs)?, store.operand(&at, rhs)?);

        if lt != rt {
            return store.mismatch("fcmp", lt, rt);
        }

        if !store.is_floating(lt) {
            return diag("`fcmp` operands must be floating-point");
        }

        let i1 = store.intern_type(TypeData::Int(1));

        store.emit(
            at,
            i1,
            name,
            Opcode::FCmp,
            smallvec![lhs, rhs],
            SmallVec::new(),
            Some(Predicate::Real(pred)),
        )
    })
}

/// Builds `cond ? if_true : if_false`.
pub fn build_select(
    b: BuilderRef,
    cond: ValueRef,
    if_true: ValueRef,
    if_false: ValueRef,
    name: &str,
) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let ct = store.operand(&at, cond)?;
        let (tt, ft) = (store.operand(&at, if_true)?, store.operand(&at, if_false)?);

        if store.int_width(ct) != Some(1) {
            return diag("`select` condition must be an `i1`");
        }

        if tt != ft {
            return store.mismatch("select", tt, ft);
        }

        store.emit(
            at,
            tt,
            name,
            Opcode::Select,
            smallvec![cond, if_true, if_false],
            SmallVec::new(),
            None,
        )
    })
}

/// Builds one of the conversion instructions.
pub fn build_cast(b: BuilderRef, op: Opcode, value: ValueRef, dest: TypeRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let from = store.scalar_ty(store.operand(&at, value)?)?;
        let to = store.scalar_ty(dest)?;

        let valid = match (op, from, to) {
            (Opcode::ZExt | Opcode::SExt, ScalarTy::Int(f), ScalarTy::Int(t)) => f < t,
            (Opcode::Trunc, ScalarTy::Int(f), ScalarTy::Int(t)) => f > t,
            (Opcode::SIToFP | Opcode::UIToFP, ScalarTy::Int(_), ScalarTy::Float | ScalarTy::Double) => true,
            (Opcode::FPToSI | Opcode::FPToUI, ScalarTy::Float | ScalarTy::Double, ScalarTy::Int(_)) => true,
            (Opcode::FPExt, ScalarTy::Float, ScalarTy::Double) => true,
            (Opcode::FPTrunc, ScalarTy::Double, ScalarTy::Float) => true,
            (Opcode::PtrToInt, ScalarTy::Pointer, ScalarTy::Int(_)) => true,
            (Opcode::IntToPtr, ScalarTy::Int(_), ScalarTy::Pointer) => true,
            _ => false,
        };

        if !valid {
            return diag(format!(
                "invalid cast `{}` from `{}` to `{}`",
                op.mnemonic(),
                store.type_name(store.value(value)?.ty),
                store.type_name(dest)
            ));
        }

        store.emit(at, dest, name, op, smallvec![value], SmallVec::new(), None)
    })
}

/// Builds an empty `phi` of type `ty`. Incoming values are added with [`add_incoming`].
pub fn build_phi(b: BuilderRef, ty: TypeRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;

        if store.scalar_ty(ty)? == ScalarTy::Void {
            return diag("`phi` cannot have type `void`");
        }

        store.emit(at, ty, name, Opcode::Phi, SmallVec::new(), SmallVec::new(), None)
    })
}

/// Builds a direct call to `callee`.
pub fn build_call(b: BuilderRef, callee: ValueRef, args: &[ValueRef], name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;

        store.function(callee)?;
        store.operand(&at, callee)?;

        let (ret, params, vararg) = store.signature(store.value(callee)?.ty)?;

        if args.len() < params.len() || (args.len() > params.len() && !vararg) {
            return diag(format!(
                "call passes {} argument(s) to a function taking {}",
                args.len(),
                params.len()
            ));
        }

        for (i, arg) in args.iter().enumerate() {
            let actual = store.operand(&at, *arg)?;

            match params.get(i) {
                Some(expected) if *expected != actual => {
                    return store.mismatch(&format!("call argument {i}"), *expected, actual)
                }
                _ => {}
            }
        }

        let operands = std::iter::once(callee).chain(args.iter().copied()).collect();

        store.emit(at, ret, name, Opcode::Call, operands, SmallVec::new(), None)
    })
}

/// Builds an unconditional branch.
pub fn build_br(b: BuilderRef, dest: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let dest = store.target(&at, dest)?;
        let void = store.intern_type(TypeData::Void);

        store.emit(at, void, "", Opcode::Br, SmallVec::new(), smallvec![dest], None)
    })
}

/// Builds a two-way branch on an `i1`.
pub fn build_cond_br(b: BuilderRef, cond: ValueRef, then: BlockRef, otherwise: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;

        if store.int_width(store.operand(&at, cond)?) != Some(1) {
            return diag("branch condition must be an `i1`");
        }

        let targets = smallvec![store.target(&at, then)?, store.target(&at, otherwise)?];
        let void = store.intern_type(TypeData::Void);

        store.emit(at, void, "", Opcode::CondBr, smallvec![cond], targets, None)
    })
}

/// Builds `ret value`. The type is checked by the verifier, not here.
pub fn build_ret(b: BuilderRef, value: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;

        store.operand(&at, value)?;

        let void = store.intern_type(TypeData::Void);

        store.emit(at, void, "", Opcode::Ret, smallvec![value], SmallVec::new(), None)
    })
}

/// Builds `ret void`.
pub fn build_ret_void(b: BuilderRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let void = store.intern_type(TypeData::Void);

        store.emit(at, void, "", Opcode::Ret, SmallVec::new(), SmallVec::new(), None)
    })
}

/// Builds `unreachable`.
pub fn build_unreachable(b: BuilderRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let at = store.insertion(b)?;
        let void = store.intern_type(TypeData::Void);

        store.emit(at, void, "", Opcode::Unreachable, SmallVec::new(), SmallVec::new(), None)
    })
}
