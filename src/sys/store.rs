//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::execution::EngineOptions;
use crate::handle::NativeHandle;
use crate::sys::jit::CompiledFunction;
use crate::sys::*;
use ahash::AHashMap;
use paste::paste;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// The previous/next pointers threaded through every entity that lives
/// inside of an ordered native list.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Links<K> {
    pub(crate) prev: Option<K>,
    pub(crate) next: Option<K>,
}

impl<K> Default for Links<K> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

pub(crate) trait Linked<K> {
    fn links(&self) -> &Links<K>;

    fn links_mut(&mut self) -> &mut Links<K>;
}

/// The head and tail of an intrusive doubly-linked list. The nodes themselves
/// live in a [`SlotMap`] and carry their own [`Links`].
#[derive(Copy, Clone, Debug)]
pub(crate) struct Chain<K> {
    pub(crate) first: Option<K>,
    pub(crate) last: Option<K>,
}

impl<K> Default for Chain<K> {
    fn default() -> Self {
        Self {
            first: None,
            last: None,
        }
    }
}

impl<K: Key> Chain<K> {
    pub(crate) fn push_back<V: Linked<K>>(&mut self, nodes: &mut SlotMap<K, V>, node: K) {
        let prev = self.last;

        match prev {
            Some(prev) => nodes[prev].links_mut().next = Some(node),
            None => self.first = Some(node),
        }

        *nodes[node].links_mut() = Links { prev, next: None };
        self.last = Some(node);
    }

    pub(crate) fn unlink<V: Linked<K>>(&mut self, nodes: &mut SlotMap<K, V>, node: K) {
        let Links { prev, next } = *nodes[node].links();

        match prev {
            Some(prev) => nodes[prev].links_mut().next = next,
            None => self.first = next,
        }

        match next {
            Some(next) => nodes[next].links_mut().prev = prev,
            None => self.last = prev,
        }

        *nodes[node].links_mut() = Links::default();
    }

    pub(crate) fn collect<V: Linked<K>>(&self, nodes: &SlotMap<K, V>) -> Vec<K> {
        let mut out = Vec::default();
        let mut curr = self.first;

        while let Some(node) = curr {
            out.push(node);
            curr = nodes[node].links().next;
        }

        out
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

pub(crate) struct ContextData {
    pub(crate) global: bool,
}

pub(crate) struct ModuleData {
    pub(crate) context: ContextRef,
    pub(crate) name: String,
    pub(crate) triple: String,
    pub(crate) data_layout: String,
    pub(crate) functions: Chain<ValueRef>,
    pub(crate) globals: Chain<ValueRef>,
    pub(crate) named_metadata: Chain<NamedMetadataRef>,
    // functions and globals share one namespace
    pub(crate) symbols: AHashMap<String, ValueRef>,
    pub(crate) named_lookup: AHashMap<String, NamedMetadataRef>,
    pub(crate) owner: Option<EngineRef>,
}

impl ModuleData {
    pub(crate) fn new(name: &str, context: ContextRef) -> Self {
        Self {
            context,
            name: name.to_owned(),
            triple: String::default(),
            data_layout: String::default(),
            functions: Chain::default(),
            globals: Chain::default(),
            named_metadata: Chain::default(),
            symbols: AHashMap::default(),
            named_lookup: AHashMap::default(),
            owner: None,
        }
    }

    /// Picks a name that is not used by any function or global in the module,
    /// starting with `name` and then trying `name.1`, `name.2`, ...
    pub(crate) fn unique_symbol(&self, name: &str) -> String {
        if !self.symbols.contains_key(name) {
            return name.to_owned();
        }

        let mut n = 1u64;

        loop {
            let candidate = format!("{name}.{n}");

            if !self.symbols.contains_key(&candidate) {
                return candidate;
            }

            n += 1;
        }
    }
}

pub(crate) struct FunctionData {
    pub(crate) module: ModuleRef,
    pub(crate) params: SmallVec<[ValueRef; 4]>,
    pub(crate) blocks: Chain<BlockRef>,
}

pub(crate) struct GlobalData {
    pub(crate) module: ModuleRef,
    pub(crate) value_type: TypeRef,
    pub(crate) initializer: Option<ValueRef>,
    pub(crate) constant: bool,
}

pub(crate) struct InstData {
    pub(crate) block: BlockRef,
    pub(crate) opcode: Opcode,
    pub(crate) operands: SmallVec<[ValueRef; 3]>,
    // branch targets, or the incoming blocks of a `phi` (parallel to `operands`)
    pub(crate) targets: SmallVec<[BlockRef; 2]>,
    pub(crate) predicate: Option<Predicate>,
}

pub(crate) enum ValueKind {
    Function(FunctionData),
    Global(GlobalData),
    Argument { function: ValueRef, index: u32 },
    ConstInt(u64),
    ConstReal(f64),
    ConstNull,
    Undef,
    Inst(InstData),
}

pub(crate) struct ValueData {
    pub(crate) ty: TypeRef,
    pub(crate) name: String,
    pub(crate) links: Links<ValueRef>,
    pub(crate) kind: ValueKind,
}

impl ValueData {
    pub(crate) fn new(ty: TypeRef, name: &str, kind: ValueKind) -> Self {
        Self {
            ty,
            name: name.to_owned(),
            links: Links::default(),
            kind,
        }
    }

    pub(crate) fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt(_) | ValueKind::ConstReal(_) | ValueKind::ConstNull | ValueKind::Undef
        )
    }
}

impl Linked<ValueRef> for ValueData {
    fn links(&self) -> &Links<ValueRef> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<ValueRef> {
        &mut self.links
    }
}

pub(crate) struct BlockData {
    pub(crate) function: ValueRef,
    pub(crate) name: String,
    pub(crate) links: Links<BlockRef>,
    pub(crate) insts: Chain<ValueRef>,
}

impl Linked<BlockRef> for BlockData {
    fn links(&self) -> &Links<BlockRef> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<BlockRef> {
        &mut self.links
    }
}

pub(crate) enum MetadataData {
    String(String),
    Node(SmallVec<[MetadataRef; 4]>),
    Value(ValueRef),
}

pub(crate) struct NamedMetadataData {
    pub(crate) module: ModuleRef,
    pub(crate) name: String,
    pub(crate) links: Links<NamedMetadataRef>,
    pub(crate) operands: Vec<MetadataRef>,
}

impl Linked<NamedMetadataRef> for NamedMetadataData {
    fn links(&self) -> &Links<NamedMetadataRef> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<NamedMetadataRef> {
        &mut self.links
    }
}

pub(crate) struct BuilderData {
    pub(crate) block: Option<BlockRef>,
}

pub(crate) struct EngineData {
    pub(crate) kind: EngineKind,
    pub(crate) options: EngineOptions,
    pub(crate) modules: Vec<ModuleRef>,
    pub(crate) layout: DataLayout,
    // keyed by the function definition that was compiled
    pub(crate) compiled: AHashMap<ValueRef, CompiledFunction>,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) enum ConstKey {
    Int(TypeRef, u64),
    Real(TypeRef, u64),
    Null(TypeRef),
    Undef(TypeRef),
}

/// All of the toolkit's state.
pub(crate) struct Store {
    pub(crate) contexts: SlotMap<ContextRef, ContextData>,
    pub(crate) global_context: ContextRef,
    pub(crate) modules: SlotMap<ModuleRef, ModuleData>,
    pub(crate) types: SlotMap<TypeRef, TypeData>,
    pub(crate) type_lookup: AHashMap<TypeData, TypeRef>,
    pub(crate) values: SlotMap<ValueRef, ValueData>,
    pub(crate) constants: AHashMap<ConstKey, ValueRef>,
    pub(crate) blocks: SlotMap<BlockRef, BlockData>,
    pub(crate) metadata: SlotMap<MetadataRef, MetadataData>,
    pub(crate) named_metadata: SlotMap<NamedMetadataRef, NamedMetadataData>,
    pub(crate) builders: SlotMap<BuilderRef, BuilderData>,
    pub(crate) engines: SlotMap<EngineRef, EngineData>,
    pub(crate) generic_values: SlotMap<GenericValueRef, Scalar>,
    pub(crate) target_data: SlotMap<TargetDataRef, DataLayout>,
}

macro_rules! accessors {
    ( $( $name:ident: $field:ident[$key:ty] -> $data:ty; )* ) => {
        paste! {
            $(
                pub(crate) fn $name(&self, key: $key) -> NativeResult<&$data> {
                    self.$field
                        .get(key)
                        .ok_or(NativeError::StaleHandle(<$key as NativeHandle>::KIND))
                }

                pub(crate) fn [<$name _mut>](&mut self, key: $key) -> NativeResult<&mut $data> {
                    self.$field
                        .get_mut(key)
                        .ok_or(NativeError::StaleHandle(<$key as NativeHandle>::KIND))
                }
            )*
        }
    };
}

impl Store {
    pub(crate) fn new() -> Self {
        let mut contexts = SlotMap::with_key();
        let global_context = contexts.insert(ContextData { global: true });

        Self {
            contexts,
            global_context,
            modules: SlotMap::with_key(),
            types: SlotMap::with_key(),
            type_lookup: AHashMap::default(),
            values: SlotMap::with_key(),
            constants: AHashMap::default(),
            blocks: SlotMap::with_key(),
            metadata: SlotMap::with_key(),
            named_metadata: SlotMap::with_key(),
            builders: SlotMap::with_key(),
            engines: SlotMap::with_key(),
            generic_values: SlotMap::with_key(),
            target_data: SlotMap::with_key(),
        }
    }

    accessors! {
        context: contexts[ContextRef] -> ContextData;
        module: modules[ModuleRef] -> ModuleData;
        ty: types[TypeRef] -> TypeData;
        value: values[ValueRef] -> ValueData;
        block: blocks[BlockRef] -> BlockData;
        md: metadata[MetadataRef] -> MetadataData;
        named: named_metadata[NamedMetadataRef] -> NamedMetadataData;
        builder: builders[BuilderRef] -> BuilderData;
        engine: engines[EngineRef] -> EngineData;
        generic_value: generic_values[GenericValueRef] -> Scalar;
        layout: target_data[TargetDataRef] -> DataLayout;
    }

    pub(crate) fn function(&self, func: ValueRef) -> NativeResult<&FunctionData> {
        match &self.value(func)?.kind {
            ValueKind::Function(data) => Ok(data),
            _ => diag("value is not a function"),
        }
    }

    pub(crate) fn function_mut(&mut self, func: ValueRef) -> NativeResult<&mut FunctionData> {
        match &mut self.value_mut(func)?.kind {
            ValueKind::Function(data) => Ok(data),
            _ => diag("value is not a function"),
        }
    }

    pub(crate) fn global(&self, global: ValueRef) -> NativeResult<&GlobalData> {
        match &self.value(global)?.kind {
            ValueKind::Global(data) => Ok(data),
            _ => diag("value is not a global variable"),
        }
    }

    pub(crate) fn global_mut(&mut self, global: ValueRef) -> NativeResult<&mut GlobalData> {
        match &mut self.value_mut(global)?.kind {
            ValueKind::Global(data) => Ok(data),
            _ => diag("value is not a global variable"),
        }
    }

    pub(crate) fn inst(&self, inst: ValueRef) -> NativeResult<&InstData> {
        match &self.value(inst)?.kind {
            ValueKind::Inst(data) => Ok(data),
            _ => diag("value is not an instruction"),
        }
    }

    pub(crate) fn inst_mut(&mut self, inst: ValueRef) -> NativeResult<&mut InstData> {
        match &mut self.value_mut(inst)?.kind {
            ValueKind::Inst(data) => Ok(data),
            _ => diag("value is not an instruction"),
        }
    }

    /// Gets the module that a function or global lives in.
    pub(crate) fn parent_module(&self, value: ValueRef) -> NativeResult<ModuleRef> {
        match &self.value(value)?.kind {
            ValueKind::Function(data) => Ok(data.module),
            ValueKind::Global(data) => Ok(data.module),
            _ => diag("value is not a function or global variable"),
        }
    }

    /// Gets the function that an instruction (or argument) lives in.
    pub(crate) fn enclosing_function(&self, value: ValueRef) -> NativeResult<ValueRef> {
        match &self.value(value)?.kind {
            ValueKind::Inst(data) => Ok(self.block(data.block)?.function),
            ValueKind::Argument { function, .. } => Ok(*function),
            _ => diag("value is not local to a function"),
        }
    }

    /// Frees a function along with every block, instruction and argument in it.
    ///
    /// The function must already be unlinked from its module.
    pub(crate) fn free_function_body(&mut self, func: ValueRef) {
        let (params, blocks) = match self.values.get(func).map(|v| &v.kind) {
            Some(ValueKind::Function(data)) => (data.params.clone(), data.blocks),
            _ => return,
        };

        for block in blocks.collect(&self.blocks) {
            self.free_block(block);
        }

        for param in params {
            self.values.remove(param);
        }
    }

    pub(crate) fn free_block(&mut self, block: BlockRef) {
        if let Some(data) = self.blocks.remove(block) {
            for inst in data.insts.collect(&self.values) {
                self.values.remove(inst);
            }
        }
    }

    /// Frees a module and everything inside of it. If an engine owns the
    /// module, the engine forgets about it.
    pub(crate) fn free_module(&mut self, module: ModuleRef) {
        let data = match self.modules.remove(module) {
            Some(data) => data,
            None => return,
        };

        if let Some(engine) = data.owner.and_then(|e| self.engines.get_mut(e)) {
            engine.modules.retain(|m| *m != module);
            engine.compiled.clear();
        }

        for func in data.functions.collect(&self.values) {
            self.free_function_body(func);
            self.values.remove(func);
        }

        for global in data.globals.collect(&self.values) {
            self.values.remove(global);
        }

        for node in data.named_metadata.collect(&self.named_metadata) {
            self.named_metadata.remove(node);
        }
    }

    pub(crate) fn intern_constant(&mut self, key: ConstKey, ty: TypeRef, kind: ValueKind) -> ValueRef {
        if let Some(existing) = self.constants.get(&key) {
            return *existing;
        }

        let value = self.values.insert(ValueData::new(ty, "", kind));
        self.constants.insert(key, value);

        value
    }
}
