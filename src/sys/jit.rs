//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The JIT. Each function is lowered once into a small register machine:
//! every SSA value gets its own register, `phi`s turn into parallel moves on
//! the edges that lead into their block, and calls are bound to the callee's
//! definition at compile time. Compiled code is cached on the engine until the
//! set of modules it owns changes.
//!
//! When the engine's optimization level is above zero, integer operations on
//! constant operands are folded while lowering. Folds that would fail (division
//! by zero, overflowing shifts) are left for the machine to report at runtime.

use crate::arena::{dense_arena_key, ArenaKey, ArenaMap};
use crate::sys::eval;
use crate::sys::*;
use ahash::AHashMap;
use log::trace;
use smallvec::SmallVec;

dense_arena_key! {
    /// A virtual register in a compiled function.
    pub(crate) struct Reg;

    /// A block of compiled code.
    pub(crate) struct Code;
}

#[derive(Copy, Clone, Debug)]
enum Operand {
    Reg(Reg),
    Imm(Scalar),
}

#[derive(Clone, Debug)]
enum Op {
    Move {
        dest: Reg,
        src: Operand,
    },
    Binary {
        dest: Reg,
        op: Opcode,
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        dest: Reg,
        pred: IntPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    FCmp {
        dest: Reg,
        pred: RealPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        dest: Reg,
        cond: Operand,
        if_true: Operand,
        if_false: Operand,
    },
    Cast {
        dest: Reg,
        op: Opcode,
        value: Operand,
        to: ScalarTy,
    },
    Call {
        dest: Option<Reg>,
        callee: ValueRef,
        args: SmallVec<[Operand; 4]>,
    },
}

/// A control-flow edge, along with the `phi` moves that happen when it's taken.
#[derive(Clone, Debug)]
struct Edge {
    target: Code,
    moves: SmallVec<[(Reg, Operand); 2]>,
}

#[derive(Clone, Debug)]
enum Exit {
    Jump(Edge),
    Branch {
        cond: Operand,
        then: Edge,
        otherwise: Edge,
    },
    Return(Option<Operand>),
    Unreachable,
}

#[derive(Clone, Debug)]
struct CodeBlock {
    ops: Vec<Op>,
    exit: Exit,
}

/// A function after lowering.
#[derive(Clone, Debug)]
pub(crate) struct CompiledFunction {
    name: String,
    params: SmallVec<[Reg; 4]>,
    regs: usize,
    blocks: ArenaMap<Code, CodeBlock>,
    entry: Code,
}

struct Compiler<'s> {
    store: &'s Store,
    engine: EngineRef,
    fold: bool,
    regs: AHashMap<ValueRef, Reg>,
    folded: AHashMap<ValueRef, Scalar>,
    codes: AHashMap<BlockRef, Code>,
    callees: Vec<ValueRef>,
}

impl<'s> Compiler<'s> {
    fn new(store: &'s Store, engine: EngineRef, fold: bool) -> Self {
        Self {
            store,
            engine,
            fold,
            regs: AHashMap::default(),
            folded: AHashMap::default(),
            codes: AHashMap::default(),
            callees: Vec::default(),
        }
    }

    fn alloc(&mut self, value: ValueRef) -> Reg {
        let reg = Reg::key_new(self.regs.len());

        self.regs.insert(value, reg);

        reg
    }

    fn reg(&self, value: ValueRef) -> NativeResult<Reg> {
        match self.regs.get(&value) {
            Some(reg) => Ok(*reg),
            None => diag("instruction has no register"),
        }
    }

    fn operand(&self, value: ValueRef) -> NativeResult<Operand> {
        if let Some(scalar) = self.folded.get(&value) {
            return Ok(Operand::Imm(*scalar));
        }

        if let Some(reg) = self.regs.get(&value) {
            return Ok(Operand::Reg(*reg));
        }

        match self.store.constant_scalar(value)? {
            Some(scalar) => Ok(Operand::Imm(scalar)),
            None => diag("functions and globals cannot be used as values by the JIT"),
        }
    }

    fn edge(&self, from: BlockRef, to: BlockRef) -> NativeResult<Edge> {
        let store = self.store;
        let mut moves = SmallVec::new();

        for inst in store.block(to)?.insts.collect(&store.values) {
            let data = store.inst(inst)?;

            if data.opcode != Opcode::Phi {
                break;
            }

            match data.targets.iter().position(|b| *b == from) {
                Some(index) => moves.push((self.reg(inst)?, self.operand(data.operands[index])?)),
                None => {
                    return diag(format!(
                        "`phi` in block `{}` has no incoming value for `{}`",
                        store.block(to)?.name,
                        store.block(from)?.name
                    ))
                }
            }
        }

        match self.codes.get(&to) {
            Some(target) => Ok(Edge {
                target: *target,
                moves,
            }),
            None => diag("branch target is not in the function being compiled"),
        }
    }

    /// Tries to fold an integer operation with two immediate operands.
    fn fold(&mut self, inst: ValueRef, op: Opcode, lhs: Operand, rhs: Operand) -> Option<Scalar> {
        if !self.fold || !(op.is_int_binary() || op == Opcode::ICmp) {
            return None;
        }

        let (Operand::Imm(a), Operand::Imm(b)) = (lhs, rhs) else {
            return None;
        };

        let folded = match self.store.inst(inst).ok()?.predicate {
            Some(Predicate::Int(pred)) => eval::icmp(pred, a, b),
            _ => eval::binary(op, a, b),
        };

        let value = folded.ok()?;

        self.folded.insert(inst, value);

        Some(value)
    }

    fn lower_block(&mut self, block: BlockRef) -> NativeResult<CodeBlock> {
        let store = self.store;
        let mut ops = Vec::default();

        for inst in store.block(block)?.insts.collect(&store.values) {
            let data = store.inst(inst)?;
            let dest = self.regs.get(&inst).copied();
            let operands = data
                .operands
                .iter()
                .map(|value| self.operand(*value))
                .collect::<NativeResult<SmallVec<[Operand; 4]>>>();

            // calls may name a function, which is not an operand of the machine
            let operands = if data.opcode == Opcode::Call {
                SmallVec::new()
            } else {
                operands?
            };

            let op = match (data.opcode, data.predicate, dest) {
                (Opcode::Phi, _, _) => continue,
                (op, _, Some(dest)) if op.is_binary() || op == Opcode::ICmp => {
                    let (lhs, rhs) = (operands[0], operands[1]);

                    match self.fold(inst, op, lhs, rhs) {
                        Some(value) => Op::Move {
                            dest,
                            src: Operand::Imm(value),
                        },
                        None => match data.predicate {
                            Some(Predicate::Int(pred)) => Op::ICmp { dest, pred, lhs, rhs },
                            _ => Op::Binary { dest, op, lhs, rhs },
                        },
                    }
                }
                (Opcode::FCmp, Some(Predicate::Real(pred)), Some(dest)) => Op::FCmp {
                    dest,
                    pred,
                    lhs: operands[0],
                    rhs: operands[1],
                },
                (Opcode::Select, _, Some(dest)) => Op::Select {
                    dest,
                    cond: operands[0],
                    if_true: operands[1],
                    if_false: operands[2],
                },
                (op, _, Some(dest)) if op.is_cast() => Op::Cast {
                    dest,
                    op,
                    value: operands[0],
                    to: store.scalar_ty(store.value(inst)?.ty)?,
                },
                (Opcode::Call, _, dest) => {
                    let callee = store.resolve_callee(self.engine, data.operands[0])?;
                    let args = data.operands[1..]
                        .iter()
                        .map(|arg| self.operand(*arg))
                        .collect::<NativeResult<_>>()?;

                    self.callees.push(callee);

                    Op::Call { dest, callee, args }
                }
                (Opcode::Br, _, _) => {
                    let exit = Exit::Jump(self.edge(block, data.targets[0])?);

                    return Ok(CodeBlock { ops, exit });
                }
                (Opcode::CondBr, _, _) => {
                    let exit = Exit::Branch {
                        cond: operands[0],
                        then: self.edge(block, data.targets[0])?,
                        otherwise: self.edge(block, data.targets[1])?,
                    };

                    return Ok(CodeBlock { ops, exit });
                }
                (Opcode::Ret, _, _) => {
                    let exit = Exit::Return(operands.first().copied());

                    return Ok(CodeBlock { ops, exit });
                }
                (Opcode::Unreachable, _, _) => {
                    return Ok(CodeBlock {
                        ops,
                        exit: Exit::Unreachable,
                    })
                }
                (op, _, _) => return diag(format!("cannot compile `{}`", op.mnemonic())),
            };

            ops.push(op);
        }

        diag(format!("block `{}` has no terminator", store.block(block)?.name))
    }

    fn compile(mut self, func: ValueRef) -> NativeResult<(CompiledFunction, Vec<ValueRef>)> {
        let store = self.store;
        let data = store.function(func)?;
        let blocks = data.blocks.collect(&store.blocks);
        let params = data.params.iter().map(|param| self.alloc(*param)).collect();

        // registers and block numbers are handed out up front, so that uses can
        // be lowered before their definitions
        for (index, block) in blocks.iter().enumerate() {
            self.codes.insert(*block, Code::key_new(index));

            for inst in store.block(*block)?.insts.collect(&store.values) {
                if !store.is_void(store.value(inst)?.ty) {
                    self.alloc(inst);
                }
            }
        }

        let entry = match blocks.first() {
            Some(entry) => *entry,
            None => return diag("function has no body"),
        };

        if let Some(first) = store.block(entry)?.insts.first {
            if store.inst(first)?.opcode == Opcode::Phi {
                return diag("`phi` in the entry block");
            }
        }

        let mut code = ArenaMap::with_capacity(blocks.len());

        for block in blocks {
            let lowered = self.lower_block(block)?;

            code.insert(lowered);
        }

        let compiled = CompiledFunction {
            name: store.value(func)?.name.clone(),
            params,
            regs: self.regs.len(),
            blocks: code,
            entry: Code::key_new(0),
        };

        Ok((compiled, self.callees))
    }
}

impl Store {
    /// Compiles `root` and everything it can call, skipping whatever is cached.
    fn jit_compile(&mut self, engine: EngineRef, root: ValueRef) -> NativeResult<()> {
        let fold = self.engine(engine)?.options.opt_level > 0;
        let mut worklist = vec![root];

        while let Some(func) = worklist.pop() {
            if self.engine(engine)?.compiled.contains_key(&func) {
                continue;
            }

            let (compiled, callees) = Compiler::new(self, engine, fold).compile(func)?;

            trace!(
                "compiled `@{}` into {} block(s) using {} register(s)",
                compiled.name,
                compiled.blocks.len(),
                compiled.regs
            );

            self.engine_mut(engine)?.compiled.insert(func, compiled);
            worklist.extend(callees);
        }

        Ok(())
    }
}

fn read(regs: &ArenaMap<Reg, Scalar>, operand: Operand) -> Scalar {
    match operand {
        Operand::Reg(reg) => regs[reg],
        Operand::Imm(value) => value,
    }
}

/// One compiled function in progress.
struct Frame<'c> {
    code: &'c CompiledFunction,
    regs: ArenaMap<Reg, Scalar>,
    at: Code,
    pc: usize,
    // where the result of the call in progress goes
    pending: Option<Reg>,
}

impl<'c> Frame<'c> {
    fn take(&mut self, edge: &Edge) {
        // every source is read before any destination is written
        let values: SmallVec<[Scalar; 2]> = edge.moves.iter().map(|(_, src)| read(&self.regs, *src)).collect();

        for ((dest, _), value) in edge.moves.iter().zip(values) {
            self.regs[*dest] = value;
        }

        self.at = edge.target;
        self.pc = 0;
    }
}

/// Runs compiled code. Calls push a frame onto a heap stack instead of
/// recursing, so deep IR recursion is bounded by `max_depth` alone.
struct Machine<'c> {
    cache: &'c AHashMap<ValueRef, CompiledFunction>,
    max_depth: u32,
}

impl<'c> Machine<'c> {
    fn push(&self, stack: &mut Vec<Frame<'c>>, func: ValueRef, args: &[Scalar]) -> NativeResult<()> {
        if stack.len() >= self.max_depth as usize {
            return diag(format!("call depth limit of {} exceeded", self.max_depth));
        }

        let code = match self.cache.get(&func) {
            Some(code) => code,
            None => return diag("function was not compiled"),
        };

        let mut regs: ArenaMap<Reg, Scalar> = std::iter::repeat(Scalar::Void).take(code.regs).collect();

        for (reg, arg) in code.params.iter().zip(args) {
            regs[*reg] = *arg;
        }

        stack.push(Frame {
            code,
            regs,
            at: code.entry,
            pc: 0,
            pending: None,
        });

        Ok(())
    }

    fn execute(&self, func: ValueRef, args: &[Scalar]) -> NativeResult<Scalar> {
        let mut stack = Vec::new();

        self.push(&mut stack, func, args)?;

        loop {
            let top = match stack.last_mut() {
                Some(top) => top,
                None => return diag("no function is running"),
            };

            let code: &'c CompiledFunction = top.code;
            let block = &code.blocks[top.at];

            if let Some(op) = block.ops.get(top.pc) {
                let regs = &mut top.regs;

                top.pc += 1;

                match op {
                    Op::Move { dest, src } => regs[*dest] = read(regs, *src),
                    Op::Binary { dest, op, lhs, rhs } => {
                        regs[*dest] = eval::binary(*op, read(regs, *lhs), read(regs, *rhs))?
                    }
                    Op::ICmp { dest, pred, lhs, rhs } => {
                        regs[*dest] = eval::icmp(*pred, read(regs, *lhs), read(regs, *rhs))?
                    }
                    Op::FCmp { dest, pred, lhs, rhs } => {
                        regs[*dest] = eval::fcmp(*pred, read(regs, *lhs), read(regs, *rhs))?
                    }
                    Op::Select {
                        dest,
                        cond,
                        if_true,
                        if_false,
                    } => regs[*dest] = eval::select(read(regs, *cond), read(regs, *if_true), read(regs, *if_false))?,
                    Op::Cast { dest, op, value, to } => regs[*dest] = eval::cast(*op, read(regs, *value), *to)?,
                    Op::Call { dest, callee, args } => {
                        let args: SmallVec<[Scalar; 4]> = args.iter().map(|arg| read(regs, *arg)).collect();

                        top.pending = *dest;
                        self.push(&mut stack, *callee, &args)?;
                    }
                }

                continue;
            }

            match &block.exit {
                Exit::Jump(edge) => top.take(edge),
                Exit::Branch {
                    cond,
                    then,
                    otherwise,
                } => {
                    let edge = if read(&top.regs, *cond).is_true()? { then } else { otherwise };

                    top.take(edge);
                }
                Exit::Return(value) => {
                    let result = value.map_or(Scalar::Void, |v| read(&top.regs, v));

                    stack.pop();

                    match stack.last_mut() {
                        Some(caller) => {
                            if let Some(dest) = caller.pending.take() {
                                caller.regs[dest] = result;
                            }
                        }
                        None => return Ok(result),
                    }
                }
                Exit::Unreachable => return diag("reached `unreachable`"),
            }
        }
    }
}

/// Compiles `func` if needed and runs it with the JIT of `engine`.
pub(crate) fn run(store: &mut Store, engine: EngineRef, func: ValueRef, args: &[Scalar]) -> NativeResult<Scalar> {
    let root = store.resolve_callee(engine, func)?;

    store.jit_compile(engine, root)?;

    let data = store.engine(engine)?;
    let machine = Machine {
        cache: &data.compiled,
        max_depth: data.options.max_call_depth,
    };

    machine.execute(root, args)
}
