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
use std::fmt::Write;

struct WriterImpl<'s> {
    store: &'s Store,
    whole: String,
    values: AHashMap<ValueRef, String>,
    blocks: AHashMap<BlockRef, String>,
    used: AHashSet<String>,
    next: u32,
    metadata: AHashMap<MetadataRef, u32>,
    pending: Vec<MetadataRef>,
}

impl<'s> WriterImpl<'s> {
    fn new(store: &'s Store) -> Self {
        Self {
            store,
            whole: String::default(),
            values: AHashMap::default(),
            blocks: AHashMap::default(),
            used: AHashSet::default(),
            next: 0,
            metadata: AHashMap::default(),
            pending: Vec::default(),
        }
    }

    fn ty(&self, ty: TypeRef) -> String {
        self.store.type_name(ty)
    }

    /// Picks the printed name for a local: its own name if it has one that is
    /// not taken yet, otherwise the next number.
    fn local_name(&mut self, name: &str) -> String {
        let mut candidate = if name.is_empty() {
            let n = self.next;

            self.next += 1;

            n.to_string()
        } else {
            name.to_owned()
        };

        if !name.is_empty() {
            let mut suffix = 1;

            while self.used.contains(&candidate) {
                candidate = format!("{name}.{suffix}");
                suffix += 1;
            }
        }

        self.used.insert(candidate.clone());

        candidate
    }

    fn name(&self, value: ValueRef) -> String {
        if let Some(local) = self.values.get(&value) {
            return format!("%{local}");
        }

        let data = match self.store.values.get(value) {
            Some(data) => data,
            None => return "<stale>".to_owned(),
        };

        match (&data.kind, self.store.int_width(data.ty)) {
            (ValueKind::ConstInt(bits), Some(1)) => (*bits != 0).to_string(),
            (ValueKind::ConstInt(bits), Some(width)) => eval::sign_extend(*bits, width).to_string(),
            (ValueKind::ConstReal(real), _) => format!("{real:?}"),
            (ValueKind::ConstNull, _) => "null".to_owned(),
            (ValueKind::Undef, _) => "undef".to_owned(),
            (ValueKind::Function(_) | ValueKind::Global(_), _) => format!("@{}", data.name),
            _ => "<unknown>".to_owned(),
        }
    }

    fn name_ty(&self, value: ValueRef) -> String {
        let ty = self
            .store
            .values
            .get(value)
            .map_or_else(|| "<stale>".to_owned(), |data| self.ty(data.ty));

        format!("{ty} {}", self.name(value))
    }

    fn label(&self, block: BlockRef) -> String {
        match self.blocks.get(&block) {
            Some(name) => format!("%{name}"),
            None => "<stale>".to_owned(),
        }
    }

    fn walk(&mut self, module: ModuleRef) -> NativeResult<()> {
        let store = self.store;
        let data = store.module(module)?;

        writeln!(self.whole, "; module `{}`", data.name).ok();

        if !data.triple.is_empty() {
            writeln!(self.whole, "target triple = \"{}\"", data.triple).ok();
        }

        if !data.data_layout.is_empty() {
            writeln!(self.whole, "target datalayout = \"{}\"", data.data_layout).ok();
        }

        let globals = data.globals.collect(&store.values);

        if !globals.is_empty() {
            self.whole.push('\n');
        }

        for global in globals {
            self.global(global)?;
        }

        for func in data.functions.collect(&store.values) {
            self.whole.push('\n');
            self.function(func)?;
        }

        let named = data.named_metadata.collect(&store.named_metadata);

        if !named.is_empty() {
            self.whole.push('\n');
        }

        for node in named {
            let node = store.named(node)?;
            let ops: Vec<String> = node.operands.iter().map(|op| self.md_ref(*op)).collect();

            writeln!(self.whole, "!{} = !{{{}}}", node.name, ops.join(", ")).ok();
        }

        // nodes are numbered as they are first reached, so this grows while we walk it
        let mut i = 0;

        while i < self.pending.len() {
            let md = self.pending[i];
            let text = match store.md(md)? {
                MetadataData::Node(ops) => {
                    let ops: Vec<String> = ops.iter().map(|op| self.md_ref(*op)).collect();

                    format!("!{{{}}}", ops.join(", "))
                }
                _ => self.md_ref(md),
            };

            writeln!(self.whole, "!{i} = {text}").ok();
            i += 1;
        }

        Ok(())
    }

    fn md_ref(&mut self, md: MetadataRef) -> String {
        match self.store.metadata.get(md) {
            Some(MetadataData::String(text)) => format!("!{text:?}"),
            Some(MetadataData::Value(value)) => self.name_ty(*value),
            Some(MetadataData::Node(_)) => {
                let next = self.metadata.len() as u32;
                let number = *self.metadata.entry(md).or_insert(next);

                if number == next {
                    self.pending.push(md);
                }

                format!("!{number}")
            }
            None => "<stale>".to_owned(),
        }
    }

    fn global(&mut self, global: ValueRef) -> NativeResult<()> {
        let value = self.store.value(global)?;
        let data = self.store.global(global)?;
        let kind = if data.constant { "constant" } else { "global" };

        let _ = match data.initializer {
            Some(init) => writeln!(
                self.whole,
                "@{} = {kind} {} {}",
                value.name,
                self.ty(data.value_type),
                self.name(init)
            ),
            None => writeln!(
                self.whole,
                "@{} = external {kind} {}",
                value.name,
                self.ty(data.value_type)
            ),
        };

        Ok(())
    }

    fn function(&mut self, func: ValueRef) -> NativeResult<()> {
        let store = self.store;
        let value = store.value(func)?;
        let data = store.function(func)?;
        let (ret, params, vararg) = store.signature(value.ty)?;

        self.values.clear();
        self.blocks.clear();
        self.used.clear();
        self.next = 0;

        if data.blocks.is_empty() {
            let mut tys: Vec<String> = params.iter().map(|ty| self.ty(*ty)).collect();

            if vararg {
                tys.push("...".to_owned());
            }

            writeln!(self.whole, "declare {} @{}({})", self.ty(ret), value.name, tys.join(", ")).ok();

            return Ok(());
        }

        let mut args = Vec::default();

        for param in data.params.iter() {
            let name = self.local_name(&store.value(*param)?.name);

            args.push(format!("{} %{name}", self.ty(store.value(*param)?.ty)));
            self.values.insert(*param, name);
        }

        if vararg {
            args.push("...".to_owned());
        }

        let blocks = data.blocks.collect(&store.blocks);

        // every name has to be known up front, branches and phis refer forward
        for block in blocks.iter() {
            let name = self.local_name(&store.block(*block)?.name);

            self.blocks.insert(*block, name);

            for inst in store.block(*block)?.insts.collect(&store.values) {
                let inst_value = store.value(inst)?;

                if !store.is_void(inst_value.ty) {
                    let name = self.local_name(&inst_value.name);

                    self.values.insert(inst, name);
                }
            }
        }

        writeln!(self.whole, "define {} @{}({}) {{", self.ty(ret), value.name, args.join(", ")).ok();

        for (i, block) in blocks.iter().enumerate() {
            if i != 0 {
                self.whole.push('\n');
            }

            writeln!(self.whole, "{}:", self.blocks[block]).ok();

            for inst in store.block(*block)?.insts.collect(&store.values) {
                let text = self.inst(inst)?;

                writeln!(self.whole, "  {text}").ok();
            }
        }

        self.whole.push_str("}\n");

        Ok(())
    }

    fn inst(&self, inst: ValueRef) -> NativeResult<String> {
        let value = self.store.value(inst)?;
        let data = self.store.inst(inst)?;
        let ops = &data.operands;
        let result = match self.values.get(&inst) {
            Some(name) => format!("%{name} = "),
            None => String::default(),
        };

        let body = match data.opcode {
            op if op.is_binary() => format!(
                "{} {} {}, {}",
                op.mnemonic(),
                self.ty(value.ty),
                self.name(ops[0]),
                self.name(ops[1])
            ),
            Opcode::ICmp | Opcode::FCmp => format!(
                "{} {} {}, {}",
                data.opcode.mnemonic(),
                data.predicate.map_or("?", |pred| pred.mnemonic()),
                self.name_ty(ops[0]),
                self.name(ops[1])
            ),
            Opcode::Select => format!(
                "select {}, {}, {}",
                self.name_ty(ops[0]),
                self.name_ty(ops[1]),
                self.name_ty(ops[2])
            ),
            op if op.is_cast() => format!(
                "{} {} to {}",
                op.mnemonic(),
                self.name_ty(ops[0]),
                self.ty(value.ty)
            ),
            Opcode::Phi => {
                let incoming: Vec<String> = ops
                    .iter()
                    .zip(data.targets.iter())
                    .map(|(v, bb)| format!("[ {}, {} ]", self.name(*v), self.label(*bb)))
                    .collect();

                format!("phi {} {}", self.ty(value.ty), incoming.join(", "))
            }
            Opcode::Call => {
                let args: Vec<String> = ops[1..].iter().map(|arg| self.name_ty(*arg)).collect();

                format!("call {} {}({})", self.ty(value.ty), self.name(ops[0]), args.join(", "))
            }
            Opcode::Br => format!("br label {}", self.label(data.targets[0])),
            Opcode::CondBr => format!(
                "br {}, label {}, label {}",
                self.name_ty(ops[0]),
                self.label(data.targets[0]),
                self.label(data.targets[1])
            ),
            Opcode::Ret => match ops.first() {
                Some(v) => format!("ret {}", self.name_ty(*v)),
                None => "ret void".to_owned(),
            },
            Opcode::Unreachable => "unreachable".to_owned(),
            _ => return diag(format!("cannot print `{}`", data.opcode.mnemonic())),
        };

        Ok(result + &body)
    }
}

/// Renders a whole module as text.
pub fn print_module_to_string(m: ModuleRef) -> NativeResult<String> {
    with_store(|store| {
        let mut writer = WriterImpl::new(store);

        writer.walk(m)?;

        Ok(writer.whole)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_declarations_and_globals() {
        let i32 = int_type(32).unwrap();
        let m = module_create_with_name("printed");
        let g = add_global(m, i32, "answer").unwrap();

        set_initializer(g, const_int(i32, 42).unwrap()).unwrap();
        set_global_constant(g, true).unwrap();
        add_function(m, "ext", function_type(i32, &[i32], true).unwrap()).unwrap();

        assert_eq!(
            print_module_to_string(m).unwrap(),
            "; module `printed`\n\n@answer = constant i32 42\n\ndeclare i32 @ext(i32, ...)\n"
        );

        dispose_module(m).unwrap();
    }

    #[test]
    fn prints_definitions() {
        let i32 = int_type(32).unwrap();
        let m = module_create_with_name("sum");
        let f = add_function(m, "sum", function_type(i32, &[i32, i32], false).unwrap()).unwrap();
        let entry = append_basic_block(f, "entry").unwrap();
        let b = create_builder();
        let (x, y) = (get_param(f, 0).unwrap(), get_param(f, 1).unwrap());

        set_value_name(x, "x").unwrap();
        position_builder_at_end(b, entry).unwrap();

        let s = build_binary(b, Opcode::Add, x, y, "").unwrap();
        let c = build_icmp(b, IntPredicate::Slt, s, const_int(i32, (-1i64) as u64).unwrap(), "c").unwrap();
        let r = build_select(b, c, s, y, "r").unwrap();

        build_ret(b, r).unwrap();

        assert_eq!(
            print_module_to_string(m).unwrap(),
            "; module `sum`\n\n\
             define i32 @sum(i32 %x, i32 %0) {\n\
             entry:\n  \
             %1 = add i32 %x, %0\n  \
             %c = icmp slt i32 %1, -1\n  \
             %r = select i1 %c, i32 %1, i32 %0\n  \
             ret i32 %r\n\
             }\n"
        );

        dispose_module(m).unwrap();
        dispose_builder(b).unwrap();
    }

    #[test]
    fn prints_named_metadata() {
        let m = module_create_with_name("md-print");
        let node = get_or_insert_named_metadata(m, "notes").unwrap();
        let inner = md_node(&[md_string("hi")]).unwrap();

        add_named_metadata_operand(node, inner).unwrap();

        assert_eq!(
            print_module_to_string(m).unwrap(),
            "; module `md-print`\n\n!notes = !{!0}\n!0 = !{!\"hi\"}\n"
        );

        dispose_module(m).unwrap();
    }
}
