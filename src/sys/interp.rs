//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! An interpreter that walks the IR of a function directly.
//!
//! Calls do not recurse on the host stack. Every active call is an
//! activation on an explicit stack, so `max_call_depth` is the only limit
//! on how deep a program can go.

use crate::sys::eval;
use crate::sys::*;
use ahash::AHashMap;
use smallvec::SmallVec;

type Frame = AHashMap<ValueRef, Scalar>;

enum Flow {
    Next,
    Jump(BlockRef),
    Call(ValueRef, SmallVec<[Scalar; 4]>),
    Return(Scalar),
}

/// One function call in progress.
struct Activation {
    frame: Frame,
    block: BlockRef,
    prev: Option<BlockRef>,
    insts: Vec<ValueRef>,
    pc: usize,
    // the `call` waiting on the activation above this one
    pending: Option<ValueRef>,
}

struct Interpreter<'s> {
    store: &'s Store,
    engine: EngineRef,
    max_depth: u32,
}

impl<'s> Interpreter<'s> {
    fn operand(&self, frame: &Frame, value: ValueRef) -> NativeResult<Scalar> {
        if let Some(scalar) = frame.get(&value) {
            return Ok(*scalar);
        }

        if let Some(scalar) = self.store.constant_scalar(value)? {
            return Ok(scalar);
        }

        match self.store.value(value)?.kind {
            ValueKind::Function(_) | ValueKind::Global(_) => {
                diag("functions and globals cannot be used as values by the interpreter")
            }
            _ => diag(format!("`%{}` was used before it was defined", self.store.value(value)?.name)),
        }
    }

    fn push(&self, stack: &mut Vec<Activation>, callee: ValueRef, args: &[Scalar]) -> NativeResult<()> {
        if stack.len() >= self.max_depth as usize {
            return diag(format!("call depth limit of {} exceeded", self.max_depth));
        }

        let func = self.store.resolve_callee(self.engine, callee)?;
        let data = self.store.function(func)?;
        let entry = match data.blocks.first {
            Some(entry) => entry,
            None => return diag("function has no body"),
        };

        let mut activation = Activation {
            frame: data.params.iter().copied().zip(args.iter().copied()).collect(),
            block: entry,
            prev: None,
            insts: Vec::new(),
            pc: 0,
            pending: None,
        };

        self.enter_block(&mut activation, entry)?;
        stack.push(activation);

        Ok(())
    }

    fn enter_block(&self, activation: &mut Activation, block: BlockRef) -> NativeResult<()> {
        activation.insts = self.store.block(block)?.insts.collect(&self.store.values);
        activation.pc = self.enter(&mut activation.frame, &activation.insts, activation.prev)?;
        activation.block = block;

        Ok(())
    }

    fn call(&self, func: ValueRef, args: &[Scalar]) -> NativeResult<Scalar> {
        let mut stack = Vec::new();

        self.push(&mut stack, func, args)?;

        loop {
            let top = match stack.last_mut() {
                Some(top) => top,
                None => return diag("no function is running"),
            };

            let inst = match top.insts.get(top.pc) {
                Some(inst) => *inst,
                None => {
                    return diag(format!("block `{}` has no terminator", self.store.block(top.block)?.name));
                }
            };

            top.pc += 1;

            match self.step(&mut top.frame, inst)? {
                Flow::Next => {}
                Flow::Jump(next) => {
                    top.prev = Some(top.block);
                    self.enter_block(top, next)?;
                }
                Flow::Call(callee, args) => {
                    top.pending = Some(inst);
                    self.push(&mut stack, callee, &args)?;
                }
                Flow::Return(value) => {
                    stack.pop();

                    match stack.last_mut() {
                        Some(caller) => {
                            if let Some(call) = caller.pending.take() {
                                if value != Scalar::Void {
                                    caller.frame.insert(call, value);
                                }
                            }
                        }
                        None => return Ok(value),
                    }
                }
            }
        }
    }

    /// Evaluates the leading `phi`s of a block all at once, and returns how many
    /// there were.
    fn enter(&self, frame: &mut Frame, insts: &[ValueRef], prev: Option<BlockRef>) -> NativeResult<usize> {
        let mut incoming: SmallVec<[(ValueRef, Scalar); 4]> = SmallVec::new();

        for inst in insts {
            let data = self.store.inst(*inst)?;

            if data.opcode != Opcode::Phi {
                break;
            }

            let index = prev.and_then(|prev| data.targets.iter().position(|b| *b == prev));

            match index {
                Some(index) => incoming.push((*inst, self.operand(frame, data.operands[index])?)),
                None => return diag("`phi` has no incoming value for the block control came from"),
            }
        }

        let count = incoming.len();

        frame.extend(incoming);

        Ok(count)
    }

    fn step(&self, frame: &mut Frame, inst: ValueRef) -> NativeResult<Flow> {
        let store = self.store;
        let data = store.inst(inst)?;
        let ops = &data.operands;

        let result = match (data.opcode, data.predicate) {
            (op, _) if op.is_binary() => {
                eval::binary(op, self.operand(frame, ops[0])?, self.operand(frame, ops[1])?)?
            }
            (Opcode::ICmp, Some(Predicate::Int(pred))) => {
                eval::icmp(pred, self.operand(frame, ops[0])?, self.operand(frame, ops[1])?)?
            }
            (Opcode::FCmp, Some(Predicate::Real(pred))) => {
                eval::fcmp(pred, self.operand(frame, ops[0])?, self.operand(frame, ops[1])?)?
            }
            (Opcode::Select, _) => eval::select(
                self.operand(frame, ops[0])?,
                self.operand(frame, ops[1])?,
                self.operand(frame, ops[2])?,
            )?,
            (op, _) if op.is_cast() => {
                let to = store.scalar_ty(store.value(inst)?.ty)?;

                eval::cast(op, self.operand(frame, ops[0])?, to)?
            }
            (Opcode::Call, _) => {
                let args = ops[1..]
                    .iter()
                    .map(|arg| self.operand(frame, *arg))
                    .collect::<NativeResult<SmallVec<[Scalar; 4]>>>()?;

                return Ok(Flow::Call(ops[0], args));
            }
            (Opcode::Br, _) => return Ok(Flow::Jump(data.targets[0])),
            (Opcode::CondBr, _) => {
                let taken = if self.operand(frame, ops[0])?.is_true()? {
                    data.targets[0]
                } else {
                    data.targets[1]
                };

                return Ok(Flow::Jump(taken));
            }
            (Opcode::Ret, _) => {
                return Ok(Flow::Return(match ops.first() {
                    Some(value) => self.operand(frame, *value)?,
                    None => Scalar::Void,
                }))
            }
            (Opcode::Unreachable, _) => return diag("reached `unreachable`"),
            (Opcode::Phi, _) => return diag("`phi` is not at the start of its block"),
            (op, _) => return diag(format!("cannot interpret `{}`", op.mnemonic())),
        };

        if result != Scalar::Void {
            frame.insert(inst, result);
        }

        Ok(Flow::Next)
    }
}

/// Runs `func` to completion with the interpreter of `engine`.
pub(crate) fn run(store: &Store, engine: EngineRef, func: ValueRef, args: &[Scalar]) -> NativeResult<Scalar> {
    let interpreter = Interpreter {
        store,
        engine,
        max_depth: store.engine(engine)?.options.max_call_depth,
    };

    interpreter.call(func, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::EngineOptions;

    struct Fixture {
        module: ModuleRef,
        builder: BuilderRef,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            Self {
                module: module_create_with_name(name),
                builder: create_builder(),
            }
        }

        fn run(self, name: &str, args: &[Scalar], options: EngineOptions) -> NativeResult<Scalar> {
            dispose_builder(self.builder)?;

            let e = create_interpreter_for_module(self.module, options)?;
            let f = find_function(e, name)?;
            let result = with_store(|store| run(store, e, f, args));

            dispose_execution_engine(e)?;

            result
        }
    }

    #[test]
    fn loops_with_phis() {
        // sum of 1..=n
        let i32 = int_type(32).unwrap();
        let fx = Fixture::new("interp-loop");
        let f = add_function(fx.module, "tri", function_type(i32, &[i32], false).unwrap()).unwrap();
        let n = get_param(f, 0).unwrap();
        let (entry, body, exit) = (
            append_basic_block(f, "entry").unwrap(),
            append_basic_block(f, "body").unwrap(),
            append_basic_block(f, "exit").unwrap(),
        );
        let (zero, one) = (const_int(i32, 0).unwrap(), const_int(i32, 1).unwrap());
        let b = fx.builder;

        position_builder_at_end(b, entry).unwrap();
        build_br(b, body).unwrap();

        position_builder_at_end(b, body).unwrap();
        let i = build_phi(b, i32, "i").unwrap();
        let acc = build_phi(b, i32, "acc").unwrap();
        let acc2 = build_binary(b, Opcode::Add, acc, i, "acc2").unwrap();
        let i2 = build_binary(b, Opcode::Add, i, one, "i2").unwrap();
        let done = build_icmp(b, IntPredicate::Sgt, i2, n, "done").unwrap();
        build_cond_br(b, done, exit, body).unwrap();

        add_incoming(i, &[one, i2], &[entry, body]).unwrap();
        add_incoming(acc, &[zero, acc2], &[entry, body]).unwrap();

        position_builder_at_end(b, exit).unwrap();
        build_ret(b, acc2).unwrap();

        let out = fx.run("tri", &[Scalar::int(32, 10)], EngineOptions::default());

        assert_eq!(out, Ok(Scalar::int(32, 55)));
    }

    #[test]
    fn phis_read_their_inputs_in_parallel() {
        // swaps `a` and `b` once, then returns `a`
        let i32 = int_type(32).unwrap();
        let fx = Fixture::new("interp-swap");
        let f = add_function(fx.module, "swap", function_type(i32, &[i32, i32], false).unwrap()).unwrap();
        let (x, y) = (get_param(f, 0).unwrap(), get_param(f, 1).unwrap());
        let (entry, head, exit) = (
            append_basic_block(f, "entry").unwrap(),
            append_basic_block(f, "head").unwrap(),
            append_basic_block(f, "exit").unwrap(),
        );
        let b = fx.builder;

        position_builder_at_end(b, entry).unwrap();
        build_br(b, head).unwrap();

        position_builder_at_end(b, head).unwrap();
        let a = build_phi(b, i32, "a").unwrap();
        let bb = build_phi(b, i32, "b").unwrap();
        let first = build_phi(b, int_type(1).unwrap(), "first").unwrap();
        build_cond_br(b, first, head, exit).unwrap();

        let (t, f1) = (const_int(int_type(1).unwrap(), 1).unwrap(), const_int(int_type(1).unwrap(), 0).unwrap());

        add_incoming(a, &[x, bb], &[entry, head]).unwrap();
        add_incoming(bb, &[y, a], &[entry, head]).unwrap();
        add_incoming(first, &[t, f1], &[entry, head]).unwrap();

        position_builder_at_end(b, exit).unwrap();
        build_ret(b, a).unwrap();

        let out = fx.run("swap", &[Scalar::int(32, 1), Scalar::int(32, 2)], EngineOptions::default());

        assert_eq!(out, Ok(Scalar::int(32, 2)));
    }

    #[test]
    fn recursion_is_bounded() {
        let i32 = int_type(32).unwrap();
        let fx = Fixture::new("interp-recurse");
        let f = add_function(fx.module, "forever", function_type(i32, &[], false).unwrap()).unwrap();
        let b = fx.builder;

        position_builder_at_end(b, append_basic_block(f, "entry").unwrap()).unwrap();
        let r = build_call(b, f, &[], "r").unwrap();
        build_ret(b, r).unwrap();

        let options = EngineOptions {
            max_call_depth: 16,
            ..EngineOptions::default()
        };

        assert_eq!(
            fx.run("forever", &[], options),
            Err(NativeError::Diagnostic("call depth limit of 16 exceeded".into()))
        );
    }

    // i32 @down(i32 %n) = n == 0 ? 0 : @down(n - 1) + 1
    fn with_down(fx: &Fixture) {
        let i32 = int_type(32).unwrap();
        let f = add_function(fx.module, "down", function_type(i32, &[i32], false).unwrap()).unwrap();
        let n = get_param(f, 0).unwrap();
        let (entry, base, recurse) = (
            append_basic_block(f, "entry").unwrap(),
            append_basic_block(f, "base").unwrap(),
            append_basic_block(f, "recurse").unwrap(),
        );
        let (zero, one) = (const_int(i32, 0).unwrap(), const_int(i32, 1).unwrap());
        let b = fx.builder;

        position_builder_at_end(b, entry).unwrap();
        let done = build_icmp(b, IntPredicate::Eq, n, zero, "done").unwrap();
        build_cond_br(b, done, base, recurse).unwrap();

        position_builder_at_end(b, base).unwrap();
        build_ret(b, zero).unwrap();

        position_builder_at_end(b, recurse).unwrap();
        let smaller = build_binary(b, Opcode::Sub, n, one, "smaller").unwrap();
        let rest = build_call(b, f, &[smaller], "rest").unwrap();
        let total = build_binary(b, Opcode::Add, rest, one, "total").unwrap();
        build_ret(b, total).unwrap();
    }

    #[test]
    fn recursion_near_the_default_limit() {
        let deep = Fixture::new("interp-deep");
        let too_deep = Fixture::new("interp-too-deep");

        with_down(&deep);
        with_down(&too_deep);

        assert_eq!(
            deep.run("down", &[Scalar::int(32, 1023)], EngineOptions::default()),
            Ok(Scalar::int(32, 1023))
        );
        assert_eq!(
            too_deep.run("down", &[Scalar::int(32, 1024)], EngineOptions::default()),
            Err(NativeError::Diagnostic("call depth limit of 1024 exceeded".into()))
        );
    }

    #[test]
    fn runtime_failures_are_diagnostics() {
        let i32 = int_type(32).unwrap();
        let fx = Fixture::new("interp-fail");
        let f = add_function(fx.module, "div", function_type(i32, &[i32], false).unwrap()).unwrap();
        let x = get_param(f, 0).unwrap();
        let b = fx.builder;

        position_builder_at_end(b, append_basic_block(f, "entry").unwrap()).unwrap();
        let q = build_binary(b, Opcode::SDiv, const_int(i32, 7).unwrap(), x, "q").unwrap();
        build_ret(b, q).unwrap();

        assert_eq!(
            fx.run("div", &[Scalar::int(32, 0)], EngineOptions::default()),
            Err(NativeError::Diagnostic("integer division by zero".into()))
        );
    }

    #[test]
    fn unreachable_is_reported() {
        let fx = Fixture::new("interp-unreachable");
        let f = add_function(fx.module, "trap", function_type(void_type(), &[], false).unwrap()).unwrap();

        position_builder_at_end(fx.builder, append_basic_block(f, "entry").unwrap()).unwrap();
        build_unreachable(fx.builder).unwrap();

        assert_eq!(
            fx.run("trap", &[], EngineOptions::default()),
            Err(NativeError::Diagnostic("reached `unreachable`".into()))
        );
    }
}
