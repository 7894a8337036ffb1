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
use ahash::{AHashMap, AHashSet};

macro_rules! verify_assert {
    ($self:expr, $cond:expr, $($explanation:tt)+) => {
        if !($cond) {
            let context = $self.context();

            $self.errors.push(format!("{context}: {}", format!($($explanation)+)));
        }
    };
}

struct Verifier<'s> {
    store: &'s Store,
    errors: Vec<String>,
    function: String,
    block: String,
}

impl<'s> Verifier<'s> {
    fn context(&self) -> String {
        if self.block.is_empty() {
            format!("in `@{}`", self.function)
        } else {
            format!("in `@{}`, block `{}`", self.function, self.block)
        }
    }

    fn walk(&mut self, module: ModuleRef) -> NativeResult<()> {
        let store = self.store;
        let data = store.module(module)?;

        for global in data.globals.collect(&store.values) {
            let value_type = store.global(global)?.value_type;

            self.function = store.value(global)?.name.clone();
            self.block.clear();

            if let Some(init) = store.global(global)?.initializer {
                let ty = store.values.get(init).map(|v| v.ty);

                verify_assert!(
                    self,
                    ty == Some(value_type),
                    "initializer is stale or does not have type `{}`",
                    store.type_name(value_type)
                );
            }
        }

        for func in data.functions.collect(&store.values) {
            self.function = store.value(func)?.name.clone();
            self.block.clear();
            self.walk_function(module, func)?;
        }

        Ok(())
    }

    fn walk_function(&mut self, module: ModuleRef, func: ValueRef) -> NativeResult<()> {
        let store = self.store;
        let data = store.function(func)?;
        let (ret, _, _) = store.signature(store.value(func)?.ty)?;
        let blocks = data.blocks.collect(&store.blocks);
        let preds = self.predecessors(&blocks)?;

        for block in blocks {
            let bb = store.block(block)?;
            let insts = bb.insts.collect(&store.values);

            self.block = bb.name.clone();

            verify_assert!(self, !insts.is_empty(), "block is empty");

            let mut seen_non_phi = false;

            for (i, inst) in insts.iter().enumerate() {
                let inst_data = store.inst(*inst)?;
                let last = i + 1 == insts.len();

                verify_assert!(
                    self,
                    inst_data.opcode.is_terminator() == last,
                    "{}",
                    if last {
                        "block does not end in a terminator"
                    } else {
                        "terminator in the middle of a block"
                    }
                );

                for operand in inst_data.operands.iter() {
                    let alive = match store.values.get(*operand) {
                        Some(ValueData {
                            kind: ValueKind::Function(f),
                            ..
                        }) => f.module == module,
                        Some(ValueData {
                            kind: ValueKind::Global(g),
                            ..
                        }) => g.module == module,
                        Some(_) => true,
                        None => false,
                    };

                    verify_assert!(self, alive, "operand refers to a deleted or foreign value");
                }

                match inst_data.opcode {
                    Opcode::Phi => {
                        verify_assert!(self, !seen_non_phi, "`phi` is not at the start of its block");

                        for incoming in inst_data.targets.iter() {
                            let same = store.blocks.get(*incoming).map(|b| b.function) == Some(func);

                            verify_assert!(self, same, "`phi` incoming block is not in the same function");
                        }

                        let expected = preds.get(&block).cloned().unwrap_or_default();
                        let actual: AHashSet<BlockRef> = inst_data.targets.iter().copied().collect();

                        verify_assert!(
                            self,
                            expected == actual,
                            "`phi` incoming blocks do not match the block's predecessors"
                        );
                    }
                    Opcode::Ret => {
                        seen_non_phi = true;

                        match inst_data.operands.first() {
                            Some(value) => {
                                let ty = store.values.get(*value).map(|v| v.ty);

                                verify_assert!(
                                    self,
                                    ty == Some(ret),
                                    "`ret` value does not match return type `{}`",
                                    store.type_name(ret)
                                );
                            }
                            None => verify_assert!(
                                self,
                                store.is_void(ret),
                                "`ret void` in a function returning `{}`",
                                store.type_name(ret)
                            ),
                        }
                    }
                    _ => seen_non_phi = true,
                }
            }
        }

        Ok(())
    }

    fn predecessors(&self, blocks: &[BlockRef]) -> NativeResult<AHashMap<BlockRef, AHashSet<BlockRef>>> {
        let mut preds: AHashMap<BlockRef, AHashSet<BlockRef>> = AHashMap::default();

        for block in blocks {
            if let Some(last) = self.store.block(*block)?.insts.last {
                let data = self.store.inst(last)?;

                if matches!(data.opcode, Opcode::Br | Opcode::CondBr) {
                    for target in data.targets.iter() {
                        preds.entry(*target).or_default().insert(*block);
                    }
                }
            }
        }

        Ok(preds)
    }
}

impl Store {
    pub(crate) fn verify_module(&self, module: ModuleRef) -> NativeResult<()> {
        let mut verifier = Verifier {
            store: self,
            errors: Vec::default(),
            function: String::default(),
            block: String::default(),
        };

        verifier.walk(module)?;

        if verifier.errors.is_empty() {
            Ok(())
        } else {
            diag(verifier.errors.join("\n"))
        }
    }
}

/// Checks that a module is well-formed. On failure, the diagnostic lists every
/// problem that was found, one per line.
pub fn verify_module(m: ModuleRef) -> NativeResult<()> {
    with_store(|store| store.verify_module(m))
}
