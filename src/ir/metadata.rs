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
use crate::error::Result;
use crate::ir::{MetadataKind, Value};
use crate::sys::{self, MetadataRef, NamedMetadataRef};

/// A piece of metadata: a string, a tuple of other metadata, or a wrapped value.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Metadata(MetadataRef);

impl Metadata {
    pub(crate) fn from_raw(raw: MetadataRef) -> Self {
        Self(raw)
    }

    /// Gets the underlying handle.
    #[inline]
    pub fn raw(self) -> MetadataRef {
        self.0
    }

    /// Creates a metadata string.
    pub fn string(text: &str) -> Self {
        Self(sys::md_string(text))
    }

    /// Creates a tuple of metadata.
    pub fn node(operands: &[Metadata]) -> Result<Self> {
        let raw: Vec<_> = operands.iter().map(|md| md.0).collect();

        Ok(Self(sys::md_node(&raw)?))
    }

    /// Wraps a value.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self(sys::value_as_metadata(value.raw())?))
    }

    /// Gets which shape the metadata has.
    pub fn kind(self) -> Result<MetadataKind> {
        Ok(sys::get_metadata_kind(self.0)?)
    }

    /// Gets the text of a string.
    pub fn as_string(self) -> Result<String> {
        Ok(sys::get_md_string(self.0)?)
    }

    /// Gets the operands of a tuple.
    pub fn operands(self) -> Result<Vec<Metadata>> {
        Ok(sys::get_md_node_operands(self.0)?.into_iter().map(Self).collect())
    }

    /// Gets the value that is wrapped.
    pub fn as_value(self) -> Result<Value> {
        Ok(Value::from_raw(sys::get_metadata_value(self.0)?))
    }
}

/// A module-level list of metadata, found by name.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct NamedMetadata(NamedMetadataRef);

impl NamedMetadata {
    pub(crate) fn from_raw(raw: NamedMetadataRef) -> Self {
        Self(raw)
    }

    /// Gets the node's name.
    pub fn name(self) -> Result<String> {
        Ok(sys::get_named_metadata_name(self.0)?)
    }

    /// Views the node's operands. They can be appended to, but never replaced
    /// or removed.
    pub fn operands(self) -> Operands {
        Operands { node: self.0 }
    }
}

/// The operands of a [`NamedMetadata`], in the order they were added.
#[derive(Copy, Clone, Debug)]
pub struct Operands {
    node: NamedMetadataRef,
}

impl Operands {
    /// Appends an operand.
    pub fn push(&self, md: Metadata) -> Result<()> {
        Ok(sys::add_named_metadata_operand(self.node, md.0)?)
    }

    /// Gets the number of operands.
    pub fn len(&self) -> Result<u32> {
        Ok(sys::get_named_metadata_num_operands(self.node)?)
    }
}

impl LinkedCollection for Operands {
    type Cursor = u32;
    type Item = Metadata;

    const KIND: &'static str = "named metadata operands";

    fn first(&self) -> Result<Option<u32>> {
        Ok((self.len()? > 0).then_some(0))
    }

    fn next(&self, cursor: u32) -> Result<Option<u32>> {
        Ok((cursor + 1 < self.len()?).then_some(cursor + 1))
    }

    fn last(&self) -> Result<Option<u32>> {
        Ok(self.len()?.checked_sub(1))
    }

    fn item(&self, cursor: u32) -> Result<Metadata> {
        Ok(Metadata(sys::get_named_metadata_operand(self.node, cursor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::NameLookup;
    use crate::ir::{Module, Type};
    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_shapes() {
        let s = Metadata::string("hello");
        let v = Metadata::from_value(Value::const_int(Type::i32(), 3).unwrap()).unwrap();
        let n = Metadata::node(&[s, v]).unwrap();

        assert_eq!(s.kind().unwrap(), MetadataKind::String);
        assert_eq!(n.kind().unwrap(), MetadataKind::Node);
        assert_eq!(n.operands().unwrap(), vec![s, v]);
        assert_eq!(s.as_string().unwrap(), "hello");
        assert_eq!(v.as_value().unwrap().zext_value().unwrap(), 3);
        assert!(n.as_string().unwrap_err().is_native());
    }

    #[test]
    fn operands_are_append_only() {
        let m = Module::new("md-operands");
        let node = m.metadata().get("list").unwrap();
        let ops = node.operands();

        assert!(ops.is_empty().unwrap());

        ops.push(Metadata::string("a")).unwrap();
        ops.push(Metadata::string("b")).unwrap();

        let texts: Vec<_> = ops.iter().map(|md| md.unwrap().as_string().unwrap()).collect();

        assert_eq!(texts, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(ops.last_item().unwrap().unwrap().as_string().unwrap(), "b");
        assert_eq!(node.name().unwrap(), "list");
    }
}
