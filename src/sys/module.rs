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
use log::debug;
use smallvec::SmallVec;

/// What a [`ValueRef`] actually names.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ValueCategory {
    /// A function, declared or defined
    Function,
    /// A global variable
    GlobalVariable,
    /// A function parameter
    Argument,
    /// An integer constant
    ConstantInt,
    /// A floating-point constant
    ConstantFloat,
    /// The null pointer
    ConstantNull,
    /// An `undef` of some type
    Undef,
    /// The result of an instruction
    Instruction,
}

impl Store {
    pub(crate) fn new_module(&mut self, name: &str, context: ContextRef) -> NativeResult<ModuleRef> {
        self.context(context)?;

        let module = self.modules.insert(ModuleData::new(name, context));

        debug!("created module `{name}` ({module:?})");

        Ok(module)
    }

    pub(crate) fn add_function(
        &mut self,
        module: ModuleRef,
        name: &str,
        fn_ty: TypeRef,
    ) -> NativeResult<ValueRef> {
        let param_types = self.signature(fn_ty)?.1.to_vec();
        let unique = self.module(module)?.unique_symbol(name);

        let data = FunctionData {
            module,
            params: Default::default(),
            blocks: Chain::default(),
        };

        let func = self
            .values
            .insert(ValueData::new(fn_ty, &unique, ValueKind::Function(data)));

        let params: SmallVec<[ValueRef; 4]> = param_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                let kind = ValueKind::Argument {
                    function: func,
                    index: index as u32,
                };

                self.values.insert(ValueData::new(ty, "", kind))
            })
            .collect();

        self.function_mut(func)?.params = params;
        self.link_function(module, func, unique)?;

        Ok(func)
    }

    /// Appends an existing function value to the module's function list, and
    /// registers it under `name` (which must already be unique).
    pub(crate) fn link_function(&mut self, module: ModuleRef, func: ValueRef, name: String) -> NativeResult<()> {
        let mut chain = self.module(module)?.functions;

        chain.push_back(&mut self.values, func);

        let data = self.module_mut(module)?;

        data.functions = chain;
        data.symbols.insert(name, func);

        Ok(())
    }

    /// Removes a function from its module's list and symbol table, but does
    /// not free it.
    pub(crate) fn unlink_function(&mut self, func: ValueRef) -> NativeResult<ModuleRef> {
        let module = self.parent_module(func)?;
        let name = self.value(func)?.name.clone();
        let mut chain = self.module(module)?.functions;

        chain.unlink(&mut self.values, func);

        let data = self.module_mut(module)?;

        data.functions = chain;

        if data.symbols.get(&name) == Some(&func) {
            data.symbols.remove(&name);
        }

        Ok(module)
    }

    pub(crate) fn add_global(&mut self, module: ModuleRef, value_type: TypeRef, name: &str) -> NativeResult<ValueRef> {
        match self.ty(value_type)? {
            TypeData::Void | TypeData::Function { .. } => {
                return diag("global variables must have a first-class type")
            }
            _ => {}
        }

        let unique = self.module(module)?.unique_symbol(name);
        let ptr = self.intern_type(TypeData::Pointer);
        let data = GlobalData {
            module,
            value_type,
            initializer: None,
            constant: false,
        };

        let global = self
            .values
            .insert(ValueData::new(ptr, &unique, ValueKind::Global(data)));

        self.link_global(module, global, unique)?;

        Ok(global)
    }

    pub(crate) fn link_global(&mut self, module: ModuleRef, global: ValueRef, name: String) -> NativeResult<()> {
        let mut chain = self.module(module)?.globals;

        chain.push_back(&mut self.values, global);

        let data = self.module_mut(module)?;

        data.globals = chain;
        data.symbols.insert(name, global);

        Ok(())
    }

    pub(crate) fn unlink_global(&mut self, global: ValueRef) -> NativeResult<ModuleRef> {
        let module = self.parent_module(global)?;
        let name = self.value(global)?.name.clone();
        let mut chain = self.module(module)?.globals;

        chain.unlink(&mut self.values, global);

        let data = self.module_mut(module)?;

        data.globals = chain;

        if data.symbols.get(&name) == Some(&global) {
            data.symbols.remove(&name);
        }

        Ok(module)
    }

    pub(crate) fn append_block(&mut self, func: ValueRef, name: &str) -> NativeResult<BlockRef> {
        let mut chain = self.function(func)?.blocks;
        let block = self.blocks.insert(BlockData {
            function: func,
            name: name.to_owned(),
            links: Links::default(),
            insts: Chain::default(),
        });

        chain.push_back(&mut self.blocks, block);
        self.function_mut(func)?.blocks = chain;

        Ok(block)
    }

    /// Creates an instruction at the end of `block`.
    pub(crate) fn append_inst(&mut self, block: BlockRef, ty: TypeRef, name: &str, inst: InstData) -> NativeResult<ValueRef> {
        let mut chain = self.block(block)?.insts;
        let value = self.values.insert(ValueData::new(ty, name, ValueKind::Inst(inst)));

        chain.push_back(&mut self.values, value);
        self.block_mut(block)?.insts = chain;

        Ok(value)
    }

    pub(crate) fn const_int(&mut self, ty: TypeRef, bits: u64) -> NativeResult<ValueRef> {
        let width = match self.ty(ty)? {
            TypeData::Int(width) => *width,
            _ => return diag("integer constants must have an integer type"),
        };

        let bits = bits & eval::mask(width);

        Ok(self.intern_constant(ConstKey::Int(ty, bits), ty, ValueKind::ConstInt(bits)))
    }

    pub(crate) fn const_real(&mut self, ty: TypeRef, value: f64) -> NativeResult<ValueRef> {
        let value = match self.ty(ty)? {
            TypeData::Float => value as f32 as f64,
            TypeData::Double => value,
            _ => return diag("floating-point constants must have a floating-point type"),
        };

        Ok(self.intern_constant(
            ConstKey::Real(ty, value.to_bits()),
            ty,
            ValueKind::ConstReal(value),
        ))
    }

    /// Replaces every use of `old` as an instruction operand or global
    /// initializer with `new`.
    pub(crate) fn replace_uses(&mut self, old: ValueRef, new: ValueRef) {
        for (_, data) in self.values.iter_mut() {
            match &mut data.kind {
                ValueKind::Inst(inst) => {
                    for operand in inst.operands.iter_mut().filter(|op| **op == old) {
                        *operand = new;
                    }
                }
                ValueKind::Global(global) if global.initializer == Some(old) => {
                    global.initializer = Some(new);
                }
                _ => {}
            }
        }
    }
}

fn next_of(store: &Store, value: ValueRef) -> NativeResult<ValueRef> {
    Ok(store.value(value)?.links.next.unwrap_or_default())
}

fn prev_of(store: &Store, value: ValueRef) -> NativeResult<ValueRef> {
    Ok(store.value(value)?.links.prev.unwrap_or_default())
}

/// Creates a new context.
pub fn context_create() -> ContextRef {
    with_store(|store| {
        let ctx = store.contexts.insert(ContextData { global: false });

        debug!("created context {ctx:?}");

        ctx
    })
}

/// Gets the context that modules are created in by default. It lives forever.
pub fn get_global_context() -> ContextRef {
    with_store(|store| store.global_context)
}

/// Frees a context along with every module created in it. Modules owned by
/// an engine are detached from that engine first.
pub fn context_dispose(ctx: ContextRef) -> NativeResult<()> {
    with_store(|store| {
        if store.context(ctx)?.global {
            return diag("the global context cannot be disposed");
        }

        let modules: Vec<_> = store
            .modules
            .iter()
            .filter(|(_, data)| data.context == ctx)
            .map(|(module, _)| module)
            .collect();

        debug!("disposing context {ctx:?} and its {} module(s)", modules.len());

        for module in modules {
            store.free_module(module);
        }

        store.contexts.remove(ctx);

        Ok(())
    })
}

/// Creates a new module in the global context.
pub fn module_create_with_name(name: &str) -> ModuleRef {
    with_store(|store| {
        let ctx = store.global_context;

        // the global context always exists
        store.new_module(name, ctx).unwrap_or_default()
    })
}

/// Creates a new module in `ctx`.
pub fn module_create_with_name_in_context(name: &str, ctx: ContextRef) -> NativeResult<ModuleRef> {
    with_store(|store| store.new_module(name, ctx))
}

/// Frees a module and everything in it.
pub fn dispose_module(m: ModuleRef) -> NativeResult<()> {
    with_store(|store| {
        store.module(m)?;

        debug!("disposing module {m:?}");
        store.free_module(m);

        Ok(())
    })
}

/// Gets the context a module was created in.
pub fn get_module_context(m: ModuleRef) -> NativeResult<ContextRef> {
    with_store(|store| Ok(store.module(m)?.context))
}

/// Gets the engine that currently owns a module, or null.
pub fn get_module_engine(m: ModuleRef) -> NativeResult<EngineRef> {
    with_store(|store| Ok(store.module(m)?.owner.unwrap_or_default()))
}

/// Gets the module's name.
pub fn get_module_identifier(m: ModuleRef) -> NativeResult<String> {
    with_store(|store| Ok(store.module(m)?.name.clone()))
}

/// Renames the module.
pub fn set_module_identifier(m: ModuleRef, name: &str) -> NativeResult<()> {
    with_store(|store| {
        store.module_mut(m)?.name = name.to_owned();

        Ok(())
    })
}

/// Gets the module's target triple.
pub fn get_target(m: ModuleRef) -> NativeResult<String> {
    with_store(|store| Ok(store.module(m)?.triple.clone()))
}

/// Sets the module's target triple. This is not interpreted.
pub fn set_target(m: ModuleRef, triple: &str) -> NativeResult<()> {
    with_store(|store| {
        store.module_mut(m)?.triple = triple.to_owned();

        Ok(())
    })
}

/// Gets the module's data layout string.
pub fn get_data_layout_str(m: ModuleRef) -> NativeResult<String> {
    with_store(|store| Ok(store.module(m)?.data_layout.clone()))
}

/// Sets the module's data layout. The layout is validated first.
pub fn set_data_layout(m: ModuleRef, layout: &str) -> NativeResult<()> {
    DataLayout::parse(layout)?;

    with_store(|store| {
        store.module_mut(m)?.data_layout = layout.to_owned();

        Ok(())
    })
}

/// Adds a function with type `fn_ty` to the module. If `name` is taken, the
/// function gets a uniqued name instead.
pub fn add_function(m: ModuleRef, name: &str, fn_ty: TypeRef) -> NativeResult<ValueRef> {
    with_store(|store| store.add_function(m, name, fn_ty))
}

/// Finds a function by name, or returns null.
pub fn get_named_function(m: ModuleRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        Ok(match store.module(m)?.symbols.get(name) {
            Some(value) if store.function(*value).is_ok() => *value,
            _ => ValueRef::null(),
        })
    })
}

/// Gets the first function of the module, or null.
pub fn get_first_function(m: ModuleRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.module(m)?.functions.first.unwrap_or_default()))
}

/// Gets the last function of the module, or null.
pub fn get_last_function(m: ModuleRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.module(m)?.functions.last.unwrap_or_default()))
}

/// Gets the function after `f`, or null.
pub fn get_next_function(f: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.function(f)?;

        next_of(store, f)
    })
}

/// Gets the function before `f`, or null.
pub fn get_previous_function(f: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.function(f)?;

        prev_of(store, f)
    })
}

/// Removes a function from its module and frees it, along with its body.
pub fn delete_function(f: ValueRef) -> NativeResult<()> {
    with_store(|store| {
        store.unlink_function(f)?;
        store.free_function_body(f);
        store.values.remove(f);

        Ok(())
    })
}

/// Gets the signature of a function.
pub fn get_function_type(f: ValueRef) -> NativeResult<TypeRef> {
    with_store(|store| {
        store.function(f)?;

        Ok(store.value(f)?.ty)
    })
}

/// Gets the parameters of a function.
pub fn get_params(f: ValueRef) -> NativeResult<Vec<ValueRef>> {
    with_store(|store| Ok(store.function(f)?.params.to_vec()))
}

/// Gets the number of parameters of a function.
pub fn count_params(f: ValueRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.function(f)?.params.len() as u32))
}

/// Gets parameter `index` of a function.
pub fn get_param(f: ValueRef, index: u32) -> NativeResult<ValueRef> {
    with_store(|store| match store.function(f)?.params.get(index as usize) {
        Some(param) => Ok(*param),
        None => diag(format!("parameter index {index} is out of range")),
    })
}

/// Checks if a function has no body, or if a global has no initializer.
pub fn is_declaration(value: ValueRef) -> NativeResult<bool> {
    with_store(|store| match &store.value(value)?.kind {
        ValueKind::Function(data) => Ok(data.blocks.is_empty()),
        ValueKind::Global(data) => Ok(data.initializer.is_none()),
        _ => diag("value is not a function or global variable"),
    })
}

/// Gets the module that a function or global lives in.
pub fn get_global_parent(value: ValueRef) -> NativeResult<ModuleRef> {
    with_store(|store| store.parent_module(value))
}

/// Adds a global variable holding a value of type `ty`. The global itself is a `ptr`.
pub fn add_global(m: ModuleRef, ty: TypeRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| store.add_global(m, ty, name))
}

/// Finds a global variable by name, or returns null.
pub fn get_named_global(m: ModuleRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| {
        Ok(match store.module(m)?.symbols.get(name) {
            Some(value) if store.global(*value).is_ok() => *value,
            _ => ValueRef::null(),
        })
    })
}

/// Gets the first global of the module, or null.
pub fn get_first_global(m: ModuleRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.module(m)?.globals.first.unwrap_or_default()))
}

/// Gets the last global of the module, or null.
pub fn get_last_global(m: ModuleRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.module(m)?.globals.last.unwrap_or_default()))
}

/// Gets the global after `g`, or null.
pub fn get_next_global(g: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.global(g)?;

        next_of(store, g)
    })
}

/// Gets the global before `g`, or null.
pub fn get_previous_global(g: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.global(g)?;

        prev_of(store, g)
    })
}

/// Removes a global from its module and frees it.
pub fn delete_global(g: ValueRef) -> NativeResult<()> {
    with_store(|store| {
        store.unlink_global(g)?;
        store.values.remove(g);

        Ok(())
    })
}

/// Gets the type of the value a global holds.
pub fn get_global_value_type(g: ValueRef) -> NativeResult<TypeRef> {
    with_store(|store| Ok(store.global(g)?.value_type))
}

/// Gets the initializer of a global, or null.
pub fn get_initializer(g: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.global(g)?.initializer.unwrap_or_default()))
}

/// Sets the initializer of a global. It must be a constant of the global's value type.
pub fn set_initializer(g: ValueRef, init: ValueRef) -> NativeResult<()> {
    with_store(|store| {
        let expected = store.global(g)?.value_type;
        let data = store.value(init)?;

        if !data.is_constant() {
            return diag("global initializers must be constants");
        }

        if data.ty != expected {
            return diag(format!(
                "initializer has type `{}` but the global holds `{}`",
                store.type_name(data.ty),
                store.type_name(expected)
            ));
        }

        store.global_mut(g)?.initializer = Some(init);

        Ok(())
    })
}

/// Checks if a global is marked as constant.
pub fn is_global_constant(g: ValueRef) -> NativeResult<bool> {
    with_store(|store| Ok(store.global(g)?.constant))
}

/// Marks a global as constant (or not).
pub fn set_global_constant(g: ValueRef, constant: bool) -> NativeResult<()> {
    with_store(|store| {
        store.global_mut(g)?.constant = constant;

        Ok(())
    })
}

/// Adds a new, empty block at the end of a function.
pub fn append_basic_block(f: ValueRef, name: &str) -> NativeResult<BlockRef> {
    with_store(|store| store.append_block(f, name))
}

/// Gets the first block of a function, or null for a declaration.
pub fn get_first_basic_block(f: ValueRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.function(f)?.blocks.first.unwrap_or_default()))
}

/// Gets the last block of a function, or null for a declaration.
pub fn get_last_basic_block(f: ValueRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.function(f)?.blocks.last.unwrap_or_default()))
}

/// Gets the block after `bb`, or null.
pub fn get_next_basic_block(bb: BlockRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.block(bb)?.links.next.unwrap_or_default()))
}

/// Gets the block before `bb`, or null.
pub fn get_previous_basic_block(bb: BlockRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.block(bb)?.links.prev.unwrap_or_default()))
}

/// Gets the number of blocks in a function.
pub fn count_basic_blocks(f: ValueRef) -> NativeResult<u32> {
    with_store(|store| {
        let blocks = store.function(f)?.blocks;

        Ok(blocks.collect(&store.blocks).len() as u32)
    })
}

/// Gets the function a block belongs to.
pub fn get_basic_block_parent(bb: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.block(bb)?.function))
}

/// Gets the name of a block.
pub fn get_basic_block_name(bb: BlockRef) -> NativeResult<String> {
    with_store(|store| Ok(store.block(bb)?.name.clone()))
}

/// Gets the terminator of a block, or null if it does not end in one yet.
pub fn get_basic_block_terminator(bb: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        let last = match store.block(bb)?.insts.last {
            Some(last) => last,
            None => return Ok(ValueRef::null()),
        };

        Ok(if store.inst(last)?.opcode.is_terminator() {
            last
        } else {
            ValueRef::null()
        })
    })
}

/// Gets the first instruction of a block, or null.
pub fn get_first_instruction(bb: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.block(bb)?.insts.first.unwrap_or_default()))
}

/// Gets the last instruction of a block, or null.
pub fn get_last_instruction(bb: BlockRef) -> NativeResult<ValueRef> {
    with_store(|store| Ok(store.block(bb)?.insts.last.unwrap_or_default()))
}

/// Gets the instruction after `inst`, or null.
pub fn get_next_instruction(inst: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.inst(inst)?;

        next_of(store, inst)
    })
}

/// Gets the instruction before `inst`, or null.
pub fn get_previous_instruction(inst: ValueRef) -> NativeResult<ValueRef> {
    with_store(|store| {
        store.inst(inst)?;

        prev_of(store, inst)
    })
}

/// Gets the block an instruction is in.
pub fn get_instruction_parent(inst: ValueRef) -> NativeResult<BlockRef> {
    with_store(|store| Ok(store.inst(inst)?.block))
}

/// Gets the opcode of an instruction.
pub fn get_instruction_opcode(inst: ValueRef) -> NativeResult<Opcode> {
    with_store(|store| Ok(store.inst(inst)?.opcode))
}

/// Gets the number of value operands of an instruction. Branch targets are
/// not counted.
pub fn get_num_operands(inst: ValueRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.inst(inst)?.operands.len() as u32))
}

/// Gets operand `index` of an instruction.
pub fn get_operand(inst: ValueRef, index: u32) -> NativeResult<ValueRef> {
    with_store(|store| match store.inst(inst)?.operands.get(index as usize) {
        Some(operand) => Ok(*operand),
        None => diag(format!("operand index {index} is out of range")),
    })
}

/// Gets the branch targets of a terminator.
pub fn get_successors(inst: ValueRef) -> NativeResult<Vec<BlockRef>> {
    with_store(|store| {
        let data = store.inst(inst)?;

        Ok(match data.opcode {
            Opcode::Br | Opcode::CondBr => data.targets.to_vec(),
            _ => Vec::default(),
        })
    })
}

/// Gets the predicate of an `icmp`.
pub fn get_icmp_predicate(inst: ValueRef) -> NativeResult<IntPredicate> {
    with_store(|store| match store.inst(inst)?.predicate {
        Some(Predicate::Int(pred)) => Ok(pred),
        _ => diag("instruction is not an `icmp`"),
    })
}

/// Gets the predicate of an `fcmp`.
pub fn get_fcmp_predicate(inst: ValueRef) -> NativeResult<RealPredicate> {
    with_store(|store| match store.inst(inst)?.predicate {
        Some(Predicate::Real(pred)) => Ok(pred),
        _ => diag("instruction is not an `fcmp`"),
    })
}

/// Adds incoming `(value, block)` pairs to a `phi`.
pub fn add_incoming(phi: ValueRef, values: &[ValueRef], blocks: &[BlockRef]) -> NativeResult<()> {
    with_store(|store| {
        if values.len() != blocks.len() {
            return diag("`phi` needs exactly one block per incoming value");
        }

        let (ty, opcode) = (store.value(phi)?.ty, store.inst(phi)?.opcode);

        if opcode != Opcode::Phi {
            return diag("instruction is not a `phi`");
        }

        for (value, block) in values.iter().zip(blocks) {
            store.block(*block)?;

            let actual = store.value(*value)?.ty;

            if actual != ty {
                return diag(format!(
                    "incoming value of type `{}` does not match `phi` type `{}`",
                    store.type_name(actual),
                    store.type_name(ty)
                ));
            }
        }

        let data = store.inst_mut(phi)?;

        data.operands.extend_from_slice(values);
        data.targets.extend_from_slice(blocks);

        Ok(())
    })
}

/// Gets the number of incoming values of a `phi`.
pub fn count_incoming(phi: ValueRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.inst(phi)?.targets.len() as u32))
}

/// Gets incoming pair `index` of a `phi`.
pub fn get_incoming(phi: ValueRef, index: u32) -> NativeResult<(ValueRef, BlockRef)> {
    with_store(|store| {
        let data = store.inst(phi)?;
        let index = index as usize;

        match (data.operands.get(index), data.targets.get(index)) {
            (Some(value), Some(block)) if data.opcode == Opcode::Phi => Ok((*value, *block)),
            _ => diag(format!("incoming index {index} is out of range")),
        }
    })
}

/// Gets the type of a value.
pub fn type_of(value: ValueRef) -> NativeResult<TypeRef> {
    with_store(|store| Ok(store.value(value)?.ty))
}

/// Gets what a value is.
pub fn get_value_category(value: ValueRef) -> NativeResult<ValueCategory> {
    with_store(|store| {
        Ok(match store.value(value)?.kind {
            ValueKind::Function(_) => ValueCategory::Function,
            ValueKind::Global(_) => ValueCategory::GlobalVariable,
            ValueKind::Argument { .. } => ValueCategory::Argument,
            ValueKind::ConstInt(_) => ValueCategory::ConstantInt,
            ValueKind::ConstReal(_) => ValueCategory::ConstantFloat,
            ValueKind::ConstNull => ValueCategory::ConstantNull,
            ValueKind::Undef => ValueCategory::Undef,
            ValueKind::Inst(_) => ValueCategory::Instruction,
        })
    })
}

/// Checks if a value is a constant.
pub fn is_constant(value: ValueRef) -> NativeResult<bool> {
    with_store(|store| Ok(store.value(value)?.is_constant()))
}

/// Gets the name of a value. Unnamed values have an empty name.
pub fn get_value_name(value: ValueRef) -> NativeResult<String> {
    with_store(|store| Ok(store.value(value)?.name.clone()))
}

/// Renames a value. Functions and globals are renamed in their module's
/// symbol table and get a uniqued name if `name` is taken. Constants cannot
/// be named.
pub fn set_value_name(value: ValueRef, name: &str) -> NativeResult<()> {
    with_store(|store| {
        let data = store.value(value)?;

        if data.is_constant() {
            return diag("constants cannot be named");
        }

        if data.name == name {
            return Ok(());
        }

        let old = data.name.clone();
        let is_symbol = matches!(data.kind, ValueKind::Function(_) | ValueKind::Global(_));

        let name = if is_symbol {
            let module = store.parent_module(value)?;

            store.module_mut(module)?.symbols.remove(&old);

            let unique = store.module(module)?.unique_symbol(name);

            store.module_mut(module)?.symbols.insert(unique.clone(), value);

            unique
        } else {
            name.to_owned()
        };

        store.value_mut(value)?.name = name;

        Ok(())
    })
}

/// Replaces every use of `old` with `new`. Both must have the same type.
pub fn replace_all_uses_with(old: ValueRef, new: ValueRef) -> NativeResult<()> {
    with_store(|store| {
        if store.value(old)?.ty != store.value(new)?.ty {
            return diag("replacement value has a different type");
        }

        store.replace_uses(old, new);

        Ok(())
    })
}

/// Gets an integer constant. `bits` is truncated to the type's width, so
/// negative values can be passed as their two's complement.
pub fn const_int(ty: TypeRef, bits: u64) -> NativeResult<ValueRef> {
    with_store(|store| store.const_int(ty, bits))
}

/// Gets a floating-point constant of type `float` or `double`.
pub fn const_real(ty: TypeRef, value: f64) -> NativeResult<ValueRef> {
    with_store(|store| store.const_real(ty, value))
}

/// Gets the zero value of a type: `null` for pointers, `0` otherwise.
pub fn const_null(ty: TypeRef) -> NativeResult<ValueRef> {
    with_store(|store| match store.ty(ty)? {
        TypeData::Pointer => Ok(store.intern_constant(ConstKey::Null(ty), ty, ValueKind::ConstNull)),
        TypeData::Int(_) => store.const_int(ty, 0),
        TypeData::Float | TypeData::Double => store.const_real(ty, 0.0),
        _ => diag("type has no zero value"),
    })
}

/// Gets the `undef` value of a first-class type.
pub fn get_undef(ty: TypeRef) -> NativeResult<ValueRef> {
    with_store(|store| match store.ty(ty)? {
        TypeData::Void | TypeData::Function { .. } => diag("type has no values"),
        _ => Ok(store.intern_constant(ConstKey::Undef(ty), ty, ValueKind::Undef)),
    })
}

/// Gets the value of an integer constant, zero-extended.
pub fn const_int_get_zext_value(c: ValueRef) -> NativeResult<u64> {
    with_store(|store| match store.value(c)?.kind {
        ValueKind::ConstInt(bits) => Ok(bits),
        _ => diag("value is not an integer constant"),
    })
}

/// Gets the value of an integer constant, sign-extended.
pub fn const_int_get_sext_value(c: ValueRef) -> NativeResult<i64> {
    with_store(|store| {
        let data = store.value(c)?;

        match (&data.kind, store.int_width(data.ty)) {
            (ValueKind::ConstInt(bits), Some(width)) => Ok(eval::sign_extend(*bits, width)),
            _ => diag("value is not an integer constant"),
        }
    })
}

/// Gets the value of a floating-point constant.
pub fn const_real_get_double(c: ValueRef) -> NativeResult<f64> {
    with_store(|store| match store.value(c)?.kind {
        ValueKind::ConstReal(value) => Ok(value),
        _ => diag("value is not a floating-point constant"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_fn() -> TypeRef {
        let i32 = int_type(32).unwrap();

        function_type(i32, &[i32, i32], false).unwrap()
    }

    #[test]
    fn functions_keep_declaration_order() {
        let m = module_create_with_name("order");
        let a = add_function(m, "a", i32_fn()).unwrap();
        let b = add_function(m, "b", i32_fn()).unwrap();

        assert_eq!(get_first_function(m).unwrap(), a);
        assert_eq!(get_next_function(a).unwrap(), b);
        assert!(get_next_function(b).unwrap().is_null());
        assert_eq!(get_last_function(m).unwrap(), b);
        assert_eq!(get_previous_function(b).unwrap(), a);

        dispose_module(m).unwrap();
    }

    #[test]
    fn clashing_names_are_uniqued() {
        let m = module_create_with_name("names");
        let f = add_function(m, "thing", i32_fn()).unwrap();
        let g = add_global(m, int_type(8).unwrap(), "thing").unwrap();

        assert_eq!(get_value_name(f).unwrap(), "thing");
        assert_eq!(get_value_name(g).unwrap(), "thing.1");
        assert_eq!(get_named_function(m, "thing").unwrap(), f);
        assert!(get_named_global(m, "thing").unwrap().is_null());
        assert_eq!(get_named_global(m, "thing.1").unwrap(), g);

        dispose_module(m).unwrap();
    }

    #[test]
    fn deleted_functions_are_stale() {
        let m = module_create_with_name("delete");
        let f = add_function(m, "f", i32_fn()).unwrap();
        let p = get_param(f, 0).unwrap();

        delete_function(f).unwrap();

        assert!(get_named_function(m, "f").unwrap().is_null());
        assert!(get_first_function(m).unwrap().is_null());
        assert_eq!(get_value_name(f), Err(NativeError::StaleHandle("value")));
        assert!(type_of(p).is_err());

        dispose_module(m).unwrap();
    }

    #[test]
    fn disposing_a_context_frees_its_modules() {
        let ctx = context_create();
        let m = module_create_with_name_in_context("in-ctx", ctx).unwrap();

        context_dispose(ctx).unwrap();

        assert!(get_module_identifier(m).is_err());
        assert!(module_create_with_name_in_context("late", ctx).is_err());
        assert!(context_dispose(get_global_context()).is_err());
    }

    #[test]
    fn constants_are_interned_and_truncated() {
        let i8 = int_type(8).unwrap();
        let a = const_int(i8, 0x1FF).unwrap();
        let b = const_int(i8, 0xFF).unwrap();

        assert_eq!(a, b);
        assert_eq!(const_int_get_zext_value(a).unwrap(), 0xFF);
        assert_eq!(const_int_get_sext_value(a).unwrap(), -1);
        assert!(const_int(float_type(), 1).is_err());
    }

    #[test]
    fn initializers_must_match() {
        let m = module_create_with_name("globals");
        let i32 = int_type(32).unwrap();
        let g = add_global(m, i32, "g").unwrap();

        assert!(is_declaration(g).unwrap());
        assert!(set_initializer(g, const_int(int_type(64).unwrap(), 1).unwrap()).is_err());

        set_initializer(g, const_int(i32, 7).unwrap()).unwrap();

        assert!(!is_declaration(g).unwrap());
        assert_eq!(const_int_get_zext_value(get_initializer(g).unwrap()).unwrap(), 7);

        dispose_module(m).unwrap();
    }

    #[test]
    fn data_layout_is_validated() {
        let m = module_create_with_name("layout");

        assert!(set_data_layout(m, "e-p:64:64").is_ok());
        assert!(set_data_layout(m, "not a layout").is_err());
        assert_eq!(get_data_layout_str(m).unwrap(), "e-p:64:64");

        dispose_module(m).unwrap();
    }
}
