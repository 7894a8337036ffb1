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

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The named metadata node that module flags are stored in.
pub const MODULE_FLAGS_NODE: &str = "garnet.module.flags";

/// The three shapes that metadata can take.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum MetadataKind {
    /// A string
    String,
    /// A tuple of other metadata
    Node,
    /// Wraps an IR value
    Value,
}

/// How a module flag behaves when two modules that both carry it are linked.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum ModuleFlagBehavior {
    /// Differing values are an error
    Error = 1,
    /// Differing values are a warning, the first value wins
    Warning,
    /// The value must be present in the other module with the same value
    Require,
    /// The last value wins
    Override,
    /// The values are appended
    Append,
    /// The values are appended, dropping duplicates
    AppendUnique,
}

impl ModuleFlagBehavior {
    /// Converts the numeric form back into a behavior.
    pub fn from_raw(raw: u64) -> Option<Self> {
        Some(match raw {
            1 => Self::Error,
            2 => Self::Warning,
            3 => Self::Require,
            4 => Self::Override,
            5 => Self::Append,
            6 => Self::AppendUnique,
            _ => return None,
        })
    }
}

impl Store {
    pub(crate) fn named_metadata_lookup(&self, m: ModuleRef, name: &str) -> NativeResult<Option<NamedMetadataRef>> {
        Ok(self.module(m)?.named_lookup.get(name).copied())
    }

    pub(crate) fn named_metadata_get_or_insert(&mut self, m: ModuleRef, name: &str) -> NativeResult<NamedMetadataRef> {
        if let Some(existing) = self.named_metadata_lookup(m, name)? {
            return Ok(existing);
        }

        let mut chain = self.module(m)?.named_metadata;
        let node = self.named_metadata.insert(NamedMetadataData {
            module: m,
            name: name.to_owned(),
            links: Links::default(),
            operands: Vec::default(),
        });

        chain.push_back(&mut self.named_metadata, node);

        let data = self.module_mut(m)?;

        data.named_metadata = chain;
        data.named_lookup.insert(name.to_owned(), node);

        Ok(node)
    }

    fn flag_entry(&self, flag: MetadataRef) -> NativeResult<(ModuleFlagBehavior, String, MetadataRef)> {
        let malformed = || diag("malformed module flag");

        let ops = match self.md(flag)? {
            MetadataData::Node(ops) if ops.len() == 3 => ops,
            _ => return malformed(),
        };

        let behavior = match self.md(ops[0])? {
            MetadataData::Value(v) => match self.value(*v)?.kind {
                ValueKind::ConstInt(raw) => ModuleFlagBehavior::from_raw(raw),
                _ => None,
            },
            _ => None,
        };

        match (behavior, self.md(ops[1])?) {
            (Some(behavior), MetadataData::String(key)) => Ok((behavior, key.clone(), ops[2])),
            _ => malformed(),
        }
    }

    fn flag_nodes(&self, m: ModuleRef) -> NativeResult<&[MetadataRef]> {
        Ok(match self.named_metadata_lookup(m, MODULE_FLAGS_NODE)? {
            Some(node) => self.named(node)?.operands.as_slice(),
            None => &[],
        })
    }
}

/// Creates a metadata string.
pub fn md_string(text: &str) -> MetadataRef {
    with_store(|store| store.metadata.insert(MetadataData::String(text.to_owned())))
}

/// Creates a metadata tuple of `operands`.
pub fn md_node(operands: &[MetadataRef]) -> NativeResult<MetadataRef> {
    with_store(|store| {
        for op in operands {
            store.md(*op)?;
        }

        Ok(store
            .metadata
            .insert(MetadataData::Node(operands.iter().copied().collect())))
    })
}

/// Wraps an IR value as metadata.
pub fn value_as_metadata(value: ValueRef) -> NativeResult<MetadataRef> {
    with_store(|store| {
        store.value(value)?;

        Ok(store.metadata.insert(MetadataData::Value(value)))
    })
}

/// Gets the shape of a piece of metadata.
pub fn get_metadata_kind(md: MetadataRef) -> NativeResult<MetadataKind> {
    with_store(|store| {
        Ok(match store.md(md)? {
            MetadataData::String(_) => MetadataKind::String,
            MetadataData::Node(_) => MetadataKind::Node,
            MetadataData::Value(_) => MetadataKind::Value,
        })
    })
}

/// Gets the text of a metadata string.
pub fn get_md_string(md: MetadataRef) -> NativeResult<String> {
    with_store(|store| match store.md(md)? {
        MetadataData::String(text) => Ok(text.clone()),
        _ => diag("metadata is not a string"),
    })
}

/// Gets the operands of a metadata tuple.
pub fn get_md_node_operands(md: MetadataRef) -> NativeResult<Vec<MetadataRef>> {
    with_store(|store| match store.md(md)? {
        MetadataData::Node(ops) => Ok(ops.to_vec()),
        _ => diag("metadata is not a node"),
    })
}

/// Gets the value wrapped by value metadata.
pub fn get_metadata_value(md: MetadataRef) -> NativeResult<ValueRef> {
    with_store(|store| match store.md(md)? {
        MetadataData::Value(value) => Ok(*value),
        _ => diag("metadata does not wrap a value"),
    })
}

/// Finds a named metadata node, creating an empty one if it does not exist.
pub fn get_or_insert_named_metadata(m: ModuleRef, name: &str) -> NativeResult<NamedMetadataRef> {
    with_store(|store| store.named_metadata_get_or_insert(m, name))
}

/// Finds a named metadata node, or returns null.
pub fn get_named_metadata(m: ModuleRef, name: &str) -> NativeResult<NamedMetadataRef> {
    with_store(|store| Ok(store.named_metadata_lookup(m, name)?.unwrap_or_default()))
}

/// Gets the first named metadata node of the module, or null.
pub fn get_first_named_metadata(m: ModuleRef) -> NativeResult<NamedMetadataRef> {
    with_store(|store| Ok(store.module(m)?.named_metadata.first.unwrap_or_default()))
}

/// Gets the last named metadata node of the module, or null.
pub fn get_last_named_metadata(m: ModuleRef) -> NativeResult<NamedMetadataRef> {
    with_store(|store| Ok(store.module(m)?.named_metadata.last.unwrap_or_default()))
}

/// Gets the named metadata node after `node`, or null.
pub fn get_next_named_metadata(node: NamedMetadataRef) -> NativeResult<NamedMetadataRef> {
    with_store(|store| Ok(store.named(node)?.links.next.unwrap_or_default()))
}

/// Gets the named metadata node before `node`, or null.
pub fn get_previous_named_metadata(node: NamedMetadataRef) -> NativeResult<NamedMetadataRef> {
    with_store(|store| Ok(store.named(node)?.links.prev.unwrap_or_default()))
}

/// Gets the name of a named metadata node.
pub fn get_named_metadata_name(node: NamedMetadataRef) -> NativeResult<String> {
    with_store(|store| Ok(store.named(node)?.name.clone()))
}

/// Gets the number of operands of a named metadata node.
pub fn get_named_metadata_num_operands(node: NamedMetadataRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.named(node)?.operands.len() as u32))
}

/// Gets operand `index` of a named metadata node.
pub fn get_named_metadata_operand(node: NamedMetadataRef, index: u32) -> NativeResult<MetadataRef> {
    with_store(|store| match store.named(node)?.operands.get(index as usize) {
        Some(op) => Ok(*op),
        None => diag(format!("operand index {index} is out of range")),
    })
}

/// Appends an operand to a named metadata node.
pub fn add_named_metadata_operand(node: NamedMetadataRef, md: MetadataRef) -> NativeResult<()> {
    with_store(|store| {
        store.md(md)?;
        store.named_mut(node)?.operands.push(md);

        Ok(())
    })
}

/// Adds a module flag. Flags are never overwritten, adding a flag with an
/// existing key adds a second entry.
pub fn add_module_flag(m: ModuleRef, behavior: ModuleFlagBehavior, key: &str, value: MetadataRef) -> NativeResult<()> {
    with_store(|store| {
        store.md(value)?;

        let i32 = store.intern_type(TypeData::Int(32));
        let raw = store.const_int(i32, behavior as u64)?;
        let behavior = store.metadata.insert(MetadataData::Value(raw));
        let key = store.metadata.insert(MetadataData::String(key.to_owned()));
        let flag = store
            .metadata
            .insert(MetadataData::Node([behavior, key, value].into_iter().collect()));

        let node = store.named_metadata_get_or_insert(m, MODULE_FLAGS_NODE)?;

        store.named_mut(node)?.operands.push(flag);

        Ok(())
    })
}

/// Gets the value of the first module flag with `key`, or null.
pub fn get_module_flag(m: ModuleRef, key: &str) -> NativeResult<MetadataRef> {
    with_store(|store| {
        for flag in store.flag_nodes(m)? {
            let (_, name, value) = store.flag_entry(*flag)?;

            if name == key {
                return Ok(value);
            }
        }

        Ok(MetadataRef::null())
    })
}

/// Gets the number of module flags.
pub fn get_module_flag_count(m: ModuleRef) -> NativeResult<u32> {
    with_store(|store| Ok(store.flag_nodes(m)?.len() as u32))
}

/// Gets module flag `index` as a `(behavior, key, value)` triple.
pub fn get_module_flag_entry(m: ModuleRef, index: u32) -> NativeResult<(ModuleFlagBehavior, String, MetadataRef)> {
    with_store(|store| match store.flag_nodes(m)?.get(index as usize) {
        Some(flag) => store.flag_entry(*flag),
        None => diag(format!("module flag index {index} is out of range")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_or_insert_creates_once() {
        let m = module_create_with_name("md");

        assert!(get_named_metadata(m, "a").unwrap().is_null());

        let a = get_or_insert_named_metadata(m, "a").unwrap();
        let again = get_or_insert_named_metadata(m, "a").unwrap();

        assert_eq!(a, again);
        assert_eq!(get_named_metadata(m, "a").unwrap(), a);
        assert_eq!(get_named_metadata_num_operands(a).unwrap(), 0);
        assert_eq!(get_first_named_metadata(m).unwrap(), a);

        dispose_module(m).unwrap();
        assert!(get_named_metadata_name(a).is_err());
    }

    #[test]
    fn operands_are_appended_in_order() {
        let m = module_create_with_name("md-ops");
        let node = get_or_insert_named_metadata(m, "list").unwrap();
        let first = md_string("first");
        let second = md_node(&[first]).unwrap();

        add_named_metadata_operand(node, first).unwrap();
        add_named_metadata_operand(node, second).unwrap();

        assert_eq!(get_named_metadata_operand(node, 0).unwrap(), first);
        assert_eq!(get_named_metadata_operand(node, 1).unwrap(), second);
        assert_eq!(get_md_node_operands(second).unwrap(), vec![first]);
        assert!(get_named_metadata_operand(node, 2).is_err());

        dispose_module(m).unwrap();
    }

    #[test]
    fn flags_append_and_first_wins() {
        let m = module_create_with_name("flags");
        let one = md_string("one");
        let two = md_string("two");

        add_module_flag(m, ModuleFlagBehavior::Warning, "key", one).unwrap();
        add_module_flag(m, ModuleFlagBehavior::Override, "key", two).unwrap();

        assert_eq!(get_module_flag_count(m).unwrap(), 2);
        assert_eq!(get_module_flag(m, "key").unwrap(), one);
        assert!(get_module_flag(m, "missing").unwrap().is_null());

        let (behavior, key, value) = get_module_flag_entry(m, 1).unwrap();

        assert_eq!(behavior, ModuleFlagBehavior::Override);
        assert_eq!(key, "key");
        assert_eq!(value, two);

        dispose_module(m).unwrap();
    }
}
