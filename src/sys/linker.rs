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
use ahash::AHashMap;
use log::debug;

impl Store {
    fn clone_module(&mut self, src: ModuleRef) -> NativeResult<ModuleRef> {
        let data = self.module(src)?;
        let (name, context) = (data.name.clone(), data.context);
        let (triple, layout) = (data.triple.clone(), data.data_layout.clone());
        let functions = data.functions.collect(&self.values);
        let globals = data.globals.collect(&self.values);
        let named = data.named_metadata.collect(&self.named_metadata);

        let dest = self.new_module(&name, context)?;
        let mut values: AHashMap<ValueRef, ValueRef> = AHashMap::default();
        let mut insts = Vec::default();

        {
            let data = self.module_mut(dest)?;

            data.triple = triple;
            data.data_layout = layout;
        }

        // every symbol exists before any body is copied, bodies may refer forward
        for global in globals.iter().copied() {
            let (value_type, constant) = {
                let data = self.global(global)?;

                (data.value_type, data.constant)
            };

            let name = self.value(global)?.name.clone();
            let copy = self.add_global(dest, value_type, &name)?;

            self.global_mut(copy)?.constant = constant;
            values.insert(global, copy);
        }

        for func in functions.iter().copied() {
            let (ty, name) = {
                let data = self.value(func)?;

                (data.ty, data.name.clone())
            };

            let copy = self.add_function(dest, &name, ty)?;
            let pairs: Vec<_> = self
                .function(func)?
                .params
                .iter()
                .copied()
                .zip(self.function(copy)?.params.iter().copied())
                .collect();

            values.extend(pairs);
            values.insert(func, copy);
        }

        for global in globals {
            if let Some(init) = self.global(global)?.initializer {
                let init = values.get(&init).copied().unwrap_or(init);

                self.global_mut(values[&global])?.initializer = Some(init);
            }
        }

        for func in functions {
            let blocks = self.function(func)?.blocks.collect(&self.blocks);
            let mut mapped: AHashMap<BlockRef, BlockRef> = AHashMap::default();

            for block in blocks.iter() {
                let name = self.block(*block)?.name.clone();

                mapped.insert(*block, self.append_block(values[&func], &name)?);
            }

            for block in blocks.iter() {
                for inst in self.block(*block)?.insts.collect(&self.values) {
                    let (ty, name) = {
                        let data = self.value(inst)?;

                        (data.ty, data.name.clone())
                    };

                    let data = self.inst(inst)?;
                    let copy = InstData {
                        block: mapped[block],
                        opcode: data.opcode,
                        operands: data.operands.clone(),
                        targets: data.targets.iter().map(|t| mapped[t]).collect(),
                        predicate: data.predicate,
                    };

                    let copy = self.append_inst(mapped[block], ty, &name, copy)?;

                    values.insert(inst, copy);
                    insts.push(copy);
                }
            }
        }

        // operands still name the original values until now
        for inst in insts {
            for operand in self.inst_mut(inst)?.operands.iter_mut() {
                if let Some(copy) = values.get(operand) {
                    *operand = *copy;
                }
            }
        }

        for node in named {
            let (name, operands) = {
                let data = self.named(node)?;

                (data.name.clone(), data.operands.clone())
            };

            let copy = self.named_metadata_get_or_insert(dest, &name)?;

            self.named_mut(copy)?.operands = operands;
        }

        debug!("cloned module {src:?} into {dest:?}");

        Ok(dest)
    }

    /// Checks every symbol that both modules define, before anything is moved.
    fn check_link(&self, dest: ModuleRef, src: ModuleRef) -> NativeResult<()> {
        let (d, s) = (self.module(dest)?, self.module(src)?);

        if d.owner.is_some() || s.owner.is_some() {
            return diag("modules owned by an execution engine cannot be linked");
        }

        if d.context != s.context {
            return diag("modules from different contexts cannot be linked");
        }

        for (name, incoming) in s.symbols.iter() {
            let existing = match d.symbols.get(name) {
                Some(existing) => *existing,
                None => continue,
            };

            let (a, b) = (self.value(existing)?, self.value(*incoming)?);

            let same_type = match (&a.kind, &b.kind) {
                (ValueKind::Function(_), ValueKind::Function(_)) => a.ty == b.ty,
                (ValueKind::Global(x), ValueKind::Global(y)) => x.value_type == y.value_type,
                _ => return diag(format!("`@{name}` is a function in one module and a global in the other")),
            };

            if !same_type {
                return diag(format!("`@{name}` is declared with conflicting types"));
            }

            if self.is_definition(existing) && self.is_definition(*incoming) {
                return diag(format!("`@{name}` is defined in both modules"));
            }
        }

        Ok(())
    }

    /// Moves one function or global out of `src` and into `dest`. Returns the
    /// pair `(replaced, replacement)` when the symbol was merged with one that
    /// already existed.
    fn move_symbol(&mut self, dest: ModuleRef, value: ValueRef) -> NativeResult<Option<(ValueRef, ValueRef)>> {
        let is_function = matches!(self.value(value)?.kind, ValueKind::Function(_));

        if is_function {
            self.unlink_function(value)?;
        } else {
            self.unlink_global(value)?;
        }

        let name = self.value(value)?.name.clone();
        let existing = self.module(dest)?.symbols.get(&name).copied();

        // the existing symbol wins unless only the incoming one is a definition
        if let Some(existing) = existing {
            if !self.is_definition(value) || self.is_definition(existing) {
                return Ok(Some((value, existing)));
            }

            if is_function {
                self.unlink_function(existing)?;
            } else {
                self.unlink_global(existing)?;
            }
        }

        match &mut self.value_mut(value)?.kind {
            ValueKind::Function(data) => data.module = dest,
            ValueKind::Global(data) => data.module = dest,
            _ => {}
        }

        if is_function {
            self.link_function(dest, value, name)?;
        } else {
            self.link_global(dest, value, name)?;
        }

        Ok(existing.map(|existing| (existing, value)))
    }

    fn link_modules(&mut self, dest: ModuleRef, src: ModuleRef) -> NativeResult<()> {
        if dest == src {
            return diag("a module cannot be linked into itself");
        }

        self.check_link(dest, src)?;

        let data = self.module(src)?;
        let symbols: Vec<_> = data
            .globals
            .collect(&self.values)
            .into_iter()
            .chain(data.functions.collect(&self.values))
            .collect();
        let named = data.named_metadata.collect(&self.named_metadata);
        let mut replaced = Vec::default();

        for value in symbols {
            if let Some(pair) = self.move_symbol(dest, value)? {
                replaced.push(pair);
            }
        }

        for (old, new) in replaced.iter().copied() {
            self.replace_uses(old, new);
        }

        for (old, _) in replaced {
            self.free_function_body(old);
            self.values.remove(old);
        }

        for node in named {
            let (name, operands) = {
                let data = self.named(node)?;

                (data.name.clone(), data.operands.clone())
            };

            let merged = self.named_metadata_get_or_insert(dest, &name)?;

            self.named_mut(merged)?.operands.extend(operands);
        }

        self.free_module(src);

        debug!("linked module {src:?} into {dest:?}");

        Ok(())
    }
}

/// Deep-copies a module into a new module in the same context. Metadata is
/// shared between the two, everything else is copied.
pub fn clone_module(m: ModuleRef) -> NativeResult<ModuleRef> {
    with_store(|store| store.clone_module(m))
}

/// Moves everything in `src` into `dest`, resolving declarations in either
/// module against definitions in the other. `src` is freed afterwards.
///
/// Conflicts (two definitions of one name, mismatched types) are found before
/// anything is moved, so a failed link leaves both modules untouched.
pub fn link_modules(dest: ModuleRef, src: ModuleRef) -> NativeResult<()> {
    with_store(|store| store.link_modules(dest, src))
}
