//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::collections::{LinkedCollection, NameLookup};
use crate::error::{Error, Result};
use crate::handle::{Dispose, HandleCell, NativeHandle};
use crate::ir::{non_null, Context, Function, GlobalVariable, Metadata, ModuleFlagBehavior, NamedMetadata};
use crate::scope::scoped;
use crate::sys::{self, EngineRef, Key, ModuleRef, NamedMetadataRef, ValueRef};
use log::debug;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Who is currently responsible for freeing a module.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ModuleOwnership {
    /// The [`Module`] object owns it and frees it on drop.
    Standalone,
    /// An execution engine owns it, the [`Module`] object cannot be used
    /// until the module is removed from that engine.
    OwnedByEngine(EngineRef),
    /// It has been freed.
    Disposed,
}

/// An opaque identity for a module. Two [`Module`] objects never share one,
/// and an identity is never reused while its module is alive.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ModuleIdentity(u64);

/// A unit of IR: a set of functions, globals and metadata.
///
/// ```
/// # use garnet::collections::{LinkedCollection, NameLookup};
/// # use garnet::ir::{Function, Module, Type};
/// let mut m = Module::new("example");
/// let f = Function::new(&m, "main", Type::function(Type::i32(), &[], false)?)?;
///
/// assert!(m.functions().has("main")?);
/// assert_eq!(m.functions().get("main")?, f);
/// assert!(m.globals().is_empty()?);
///
/// m.set_triple("x86_64-unknown-linux")?;
/// assert_eq!(m.triple()?, "x86_64-unknown-linux");
/// # Ok::<(), garnet::Error>(())
/// ```
#[derive(Debug)]
pub struct Module {
    handle: HandleCell<ModuleRef>,
    owner: Option<EngineRef>,
}

impl Module {
    /// Creates an empty module in the toolkit's global context.
    pub fn new(name: &str) -> Self {
        Self::from_raw(sys::module_create_with_name(name))
    }

    /// Creates an empty module in `ctx`. It is freed with the context if it
    /// is still alive when the context is disposed.
    pub fn new_in(name: &str, ctx: &Context) -> Result<Self> {
        Ok(Self::from_raw(sys::module_create_with_name_in_context(name, ctx.raw()?)?))
    }

    /// Creates a module, lends it to `body` and disposes it afterwards.
    pub fn with<T>(name: &str, body: impl FnOnce(&mut Module) -> Result<T>) -> Result<T> {
        scoped(|| Ok(Self::new(name)), body)
    }

    fn from_raw(raw: ModuleRef) -> Self {
        Self {
            handle: HandleCell::of(raw),
            owner: None,
        }
    }

    // usable only while standalone
    pub(crate) fn raw(&self) -> Result<ModuleRef> {
        match self.owner {
            Some(_) => Err(Error::InvalidReference(ModuleRef::KIND)),
            None => self.handle.get(),
        }
    }

    /// Marks the module as handed to `engine`. The toolkit side of the
    /// transfer must already have happened.
    pub(crate) fn transfer_to(&mut self, engine: EngineRef) {
        debug_assert!(self.owner.is_none());

        self.owner = Some(engine);
    }

    /// Marks the module as handed back by `engine`.
    pub(crate) fn release_from(&mut self, engine: EngineRef) {
        debug_assert_eq!(self.owner, Some(engine));

        self.owner = None;
    }

    /// Gets the handle whoever owns the module, for the engine to name it.
    pub(crate) fn raw_unowned(&self) -> Result<ModuleRef> {
        self.handle.get()
    }

    pub(crate) fn owner(&self) -> Option<EngineRef> {
        self.owner
    }

    /// Checks who is responsible for the module right now.
    pub fn ownership(&self) -> ModuleOwnership {
        let raw = match self.handle.get() {
            Ok(raw) => raw,
            Err(_) => return ModuleOwnership::Disposed,
        };

        // an engine (or context) may have freed the module behind our back
        match (self.owner, sys::get_module_engine(raw)) {
            (_, Err(_)) => ModuleOwnership::Disposed,
            (Some(engine), Ok(_)) => ModuleOwnership::OwnedByEngine(engine),
            (None, Ok(_)) => ModuleOwnership::Standalone,
        }
    }

    /// Gets the module's identity. This works even while an engine owns it.
    pub fn identity(&self) -> Result<ModuleIdentity> {
        Ok(ModuleIdentity(self.handle.get()?.data().as_ffi()))
    }

    /// Deep-copies the module into a new, standalone module in the same
    /// context. Metadata is shared between the two.
    pub fn try_clone(&self) -> Result<Module> {
        Ok(Self::from_raw(sys::clone_module(self.raw()?)?))
    }

    /// Checks the module for malformed IR. The error text describes the
    /// first problem found.
    pub fn verify(&self) -> Result<()> {
        Ok(sys::verify_module(self.raw()?)?)
    }

    /// Renders the module as textual IR.
    pub fn to_ir_string(&self) -> Result<String> {
        Ok(sys::print_module_to_string(self.raw()?)?)
    }

    /// Moves everything in `other` into this module, resolving declarations in
    /// either module against definitions in the other. On success `other` is
    /// used up and becomes disposed, on failure neither module is changed.
    pub fn link(&mut self, other: &mut Module) -> Result<()> {
        sys::link_modules(self.raw()?, other.raw()?)?;

        if let Some(src) = other.handle.take() {
            debug!("module {src:?} was consumed by linking");
        }

        Ok(())
    }

    /// Gets the module's name.
    pub fn name(&self) -> Result<String> {
        Ok(sys::get_module_identifier(self.raw()?)?)
    }

    /// Renames the module.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        Ok(sys::set_module_identifier(self.raw()?, name)?)
    }

    /// Gets the target triple. New modules have an empty one.
    pub fn triple(&self) -> Result<String> {
        Ok(sys::get_target(self.raw()?)?)
    }

    /// Sets the target triple.
    pub fn set_triple(&mut self, triple: &str) -> Result<()> {
        Ok(sys::set_target(self.raw()?, triple)?)
    }

    /// Gets the data layout string. New modules have an empty one, which
    /// describes the host.
    pub fn data_layout(&self) -> Result<String> {
        Ok(sys::get_data_layout_str(self.raw()?)?)
    }

    /// Sets the data layout. Malformed layouts are rejected by the toolkit.
    pub fn set_data_layout(&mut self, layout: &str) -> Result<()> {
        Ok(sys::set_data_layout(self.raw()?, layout)?)
    }

    /// Views the module's functions, in declaration order.
    pub fn functions(&self) -> Functions<'_> {
        Functions { module: self }
    }

    /// Views the module's globals, in declaration order.
    pub fn globals(&self) -> Globals<'_> {
        Globals { module: self }
    }

    /// Views the module's named metadata nodes.
    pub fn metadata(&self) -> NamedMetadataNodes<'_> {
        NamedMetadataNodes { module: self }
    }

    /// Views the module's flags.
    pub fn flags(&self) -> ModuleFlags<'_> {
        ModuleFlags { module: self }
    }
}

impl Dispose for Module {
    fn dispose(&mut self) {
        let raw = match self.handle.take() {
            Some(raw) => raw,
            None => return,
        };

        // the engine frees it when it is done with it
        if let Some(engine) = self.owner {
            debug!("dropping module {raw:?} while it is owned by {engine:?}");
            return;
        }

        if let Err(err) = sys::dispose_module(raw) {
            debug!("module {raw:?} was already freed: {err}");
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The functions of a [`Module`]. Lookups fail with [`Error::NotFound`] on a miss.
#[derive(Copy, Clone, Debug)]
pub struct Functions<'m> {
    module: &'m Module,
}

impl<'m> LinkedCollection for Functions<'m> {
    type Cursor = ValueRef;
    type Item = Function;

    const KIND: &'static str = "functions";

    fn first(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_first_function(self.module.raw()?)?))
    }

    fn next(&self, cursor: ValueRef) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_next_function(cursor)?))
    }

    fn last(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_last_function(self.module.raw()?)?))
    }

    fn item(&self, cursor: ValueRef) -> Result<Function> {
        Ok(Function::from_raw(cursor))
    }
}

impl<'m> NameLookup for Functions<'m> {
    type Item = Function;

    const KIND: &'static str = "function";

    fn lookup(&self, name: &str) -> Result<Option<Function>> {
        let raw = sys::get_named_function(self.module.raw()?, name)?;

        Ok(non_null(raw).map(Function::from_raw))
    }
}

/// The global variables of a [`Module`]. Lookups fail with [`Error::NotFound`]
/// on a miss.
#[derive(Copy, Clone, Debug)]
pub struct Globals<'m> {
    module: &'m Module,
}

impl<'m> LinkedCollection for Globals<'m> {
    type Cursor = ValueRef;
    type Item = GlobalVariable;

    const KIND: &'static str = "globals";

    fn first(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_first_global(self.module.raw()?)?))
    }

    fn next(&self, cursor: ValueRef) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_next_global(cursor)?))
    }

    fn last(&self) -> Result<Option<ValueRef>> {
        Ok(non_null(sys::get_last_global(self.module.raw()?)?))
    }

    fn item(&self, cursor: ValueRef) -> Result<GlobalVariable> {
        Ok(GlobalVariable::from_raw(cursor))
    }
}

impl<'m> NameLookup for Globals<'m> {
    type Item = GlobalVariable;

    const KIND: &'static str = "global";

    fn lookup(&self, name: &str) -> Result<Option<GlobalVariable>> {
        let raw = sys::get_named_global(self.module.raw()?, name)?;

        Ok(non_null(raw).map(GlobalVariable::from_raw))
    }
}

/// The named metadata of a [`Module`].
///
/// Unlike the other views, [`NameLookup::get`] never fails on a miss: it
/// creates an empty node with that name instead. [`NameLookup::has`] and
/// [`NameLookup::lookup`] never create anything.
#[derive(Copy, Clone, Debug)]
pub struct NamedMetadataNodes<'m> {
    module: &'m Module,
}

impl<'m> LinkedCollection for NamedMetadataNodes<'m> {
    type Cursor = NamedMetadataRef;
    type Item = NamedMetadata;

    const KIND: &'static str = "named metadata";

    fn first(&self) -> Result<Option<NamedMetadataRef>> {
        Ok(non_null(sys::get_first_named_metadata(self.module.raw()?)?))
    }

    fn next(&self, cursor: NamedMetadataRef) -> Result<Option<NamedMetadataRef>> {
        Ok(non_null(sys::get_next_named_metadata(cursor)?))
    }

    fn last(&self) -> Result<Option<NamedMetadataRef>> {
        Ok(non_null(sys::get_last_named_metadata(self.module.raw()?)?))
    }

    fn item(&self, cursor: NamedMetadataRef) -> Result<NamedMetadata> {
        Ok(NamedMetadata::from_raw(cursor))
    }
}

impl<'m> NameLookup for NamedMetadataNodes<'m> {
    type Item = NamedMetadata;

    const KIND: &'static str = "named metadata";

    fn lookup(&self, name: &str) -> Result<Option<NamedMetadata>> {
        let raw = sys::get_named_metadata(self.module.raw()?, name)?;

        Ok(non_null(raw).map(NamedMetadata::from_raw))
    }

    fn get(&self, name: &str) -> Result<NamedMetadata> {
        let raw = sys::get_or_insert_named_metadata(self.module.raw()?, name)?;

        Ok(NamedMetadata::from_raw(raw))
    }
}

/// One module flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleFlag {
    /// How the flag is merged when modules are linked.
    pub behavior: ModuleFlagBehavior,
    /// The flag's name.
    pub key: String,
    /// The flag's value.
    pub value: Metadata,
}

/// The flags of a [`Module`], in the order they were set.
#[derive(Copy, Clone, Debug)]
pub struct ModuleFlags<'m> {
    module: &'m Module,
}

impl<'m> ModuleFlags<'m> {
    /// Adds a flag. This always adds a new entry, even if a flag named `key`
    /// already exists. [`NameLookup::get`] keeps finding the first one.
    pub fn set(&self, key: &str, behavior: ModuleFlagBehavior, value: Metadata) -> Result<()> {
        Ok(sys::add_module_flag(self.module.raw()?, behavior, key, value.raw())?)
    }

    /// Gets the number of flag entries.
    pub fn len(&self) -> Result<u32> {
        Ok(sys::get_module_flag_count(self.module.raw()?)?)
    }
}

impl<'m> LinkedCollection for ModuleFlags<'m> {
    type Cursor = u32;
    type Item = ModuleFlag;

    const KIND: &'static str = "module flags";

    fn first(&self) -> Result<Option<u32>> {
        Ok((self.len()? > 0).then_some(0))
    }

    fn next(&self, cursor: u32) -> Result<Option<u32>> {
        Ok((cursor + 1 < self.len()?).then_some(cursor + 1))
    }

    fn last(&self) -> Result<Option<u32>> {
        Ok(self.len()?.checked_sub(1))
    }

    fn item(&self, cursor: u32) -> Result<ModuleFlag> {
        let (behavior, key, value) = sys::get_module_flag_entry(self.module.raw()?, cursor)?;

        Ok(ModuleFlag {
            behavior,
            key,
            value: Metadata::from_raw(value),
        })
    }
}

impl<'m> NameLookup for ModuleFlags<'m> {
    type Item = Metadata;

    const KIND: &'static str = "module flag";

    fn lookup(&self, name: &str) -> Result<Option<Metadata>> {
        let raw = sys::get_module_flag(self.module.raw()?, name)?;

        Ok(non_null(raw).map(Metadata::from_raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, Type, Value};
    use pretty_assertions::assert_eq;

    fn constant_fn(m: &Module, name: &str, value: i64) -> Function {
        let i32 = Type::i32();
        let f = Function::new(m, name, Type::function(i32, &[], false).unwrap()).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();
        b.build_ret(Value::const_int(i32, value).unwrap()).unwrap();

        f
    }

    #[test]
    fn disposed_modules_reject_everything() {
        let mut m = Module::new("disposed");

        m.dispose();
        m.dispose();

        assert!(m.is_disposed());
        assert_eq!(m.ownership(), ModuleOwnership::Disposed);
        assert_eq!(m.name(), Err(Error::InvalidReference("module")));
        assert!(m.to_ir_string().unwrap_err().is_invalid_reference());
        assert!(m.functions().has("main").unwrap_err().is_invalid_reference());
        assert!(m.identity().unwrap_err().is_invalid_reference());
        assert_eq!(m.functions().iter().next(), Some(Err(Error::InvalidReference("module"))));
        assert!(m.globals().iter().collect::<Result<Vec<_>>>().unwrap_err().is_invalid_reference());
        assert!(m.metadata().is_empty().unwrap_err().is_invalid_reference());
    }

    #[test]
    fn fresh_modules_have_empty_views() {
        let m = Module::new("fresh");

        assert_eq!(m.ownership(), ModuleOwnership::Standalone);
        assert!(m.globals().is_empty().unwrap());
        assert_eq!(m.globals().iter().count(), 0);
        assert_eq!(m.globals().iter().collect::<Result<Vec<_>>>(), Ok(vec![]));
        assert!(m.functions().is_empty().unwrap());
        assert_eq!(m.functions().last_item().unwrap(), None);
        assert!(m.metadata().is_empty().unwrap());
        assert!(m.flags().is_empty().unwrap());
    }

    #[test]
    fn views_follow_declaration_order() {
        let m = Module::new("ordered");
        let fs: Vec<_> = ["c", "a", "b"].iter().map(|name| constant_fn(&m, name, 0)).collect();
        let g = GlobalVariable::new(&m, Type::f64(), "g").unwrap();

        assert_eq!(m.functions().iter().collect::<Result<Vec<_>>>(), Ok(fs.clone()));
        assert_eq!(m.functions().last_item().unwrap(), Some(fs[2]));
        assert_eq!(m.globals().iter().collect::<Result<Vec<_>>>(), Ok(vec![g]));
        assert_eq!(m.globals().get("g").unwrap(), g);
        assert_eq!(
            m.globals().get("nope"),
            Err(Error::NotFound {
                kind: "global",
                name: "nope".into()
            })
        );
        assert!(!m.functions().has("g").unwrap());
    }

    #[test]
    fn named_metadata_get_inserts() {
        let m = Module::new("md");

        assert!(!m.metadata().has("notes").unwrap());
        assert_eq!(m.metadata().lookup("notes").unwrap(), None);

        let notes = m.metadata().get("notes").unwrap();

        assert!(m.metadata().has("notes").unwrap());
        assert!(notes.operands().is_empty().unwrap());
        assert_eq!(m.metadata().get("notes").unwrap(), notes);
        assert_eq!(m.metadata().iter().collect::<Result<Vec<_>>>(), Ok(vec![notes]));

        // the other views do not insert
        assert!(m.functions().get("notes").unwrap_err().is_not_found());
        assert!(!m.functions().has("notes").unwrap());
    }

    #[test]
    fn flags_append() {
        let m = Module::new("flags");
        let flags = m.flags();
        let (one, two) = (Metadata::string("one"), Metadata::string("two"));

        flags.set("mode", ModuleFlagBehavior::Warning, one).unwrap();
        flags.set("mode", ModuleFlagBehavior::Override, two).unwrap();

        assert_eq!(flags.len().unwrap(), 2);
        assert_eq!(flags.get("mode").unwrap(), one);
        assert!(flags.get("other").unwrap_err().is_not_found());
        assert_eq!(
            flags.iter().collect::<Result<Vec<_>>>(),
            Ok(vec![
                ModuleFlag {
                    behavior: ModuleFlagBehavior::Warning,
                    key: "mode".into(),
                    value: one,
                },
                ModuleFlag {
                    behavior: ModuleFlagBehavior::Override,
                    key: "mode".into(),
                    value: two,
                },
            ])
        );
    }

    #[test]
    fn accessors() {
        let mut m = Module::new("before");

        m.set_name("after").unwrap();
        m.set_data_layout("e-p:64:64").unwrap();

        assert_eq!(m.name().unwrap(), "after");
        assert_eq!(m.triple().unwrap(), "");
        assert_eq!(m.data_layout().unwrap(), "e-p:64:64");
        assert!(m.set_data_layout("q:what").unwrap_err().is_native());
        assert_eq!(m.data_layout().unwrap(), "e-p:64:64");
    }

    #[test]
    fn clones_are_deep() {
        let m = Module::new("original");

        constant_fn(&m, "seven", 7);

        let copy = m.try_clone().unwrap();

        assert_ne!(copy.identity().unwrap(), m.identity().unwrap());
        assert_eq!(copy.to_ir_string().unwrap(), m.to_ir_string().unwrap());

        copy.functions().get("seven").unwrap().erase().unwrap();

        assert!(!copy.functions().has("seven").unwrap());
        assert!(m.functions().has("seven").unwrap());
    }

    #[test]
    fn linking_consumes_the_source() {
        let mut dest = Module::new("dest");
        let mut src = Module::new("src");
        let i32 = Type::i32();

        Function::new(&dest, "answer", Type::function(i32, &[], false).unwrap()).unwrap();
        let def = constant_fn(&src, "answer", 42);

        dest.link(&mut src).unwrap();

        assert!(src.is_disposed());
        assert_eq!(src.ownership(), ModuleOwnership::Disposed);
        assert_eq!(dest.functions().get("answer").unwrap(), def);
        assert!(!def.is_declaration().unwrap());
        assert_eq!(dest.verify(), Ok(()));
    }

    #[test]
    fn failed_links_change_nothing() {
        let mut dest = Module::new("dest-dup");
        let mut src = Module::new("src-dup");

        constant_fn(&dest, "f", 1);
        constant_fn(&src, "f", 2);

        assert!(dest.link(&mut src).unwrap_err().is_native());
        assert_eq!(src.ownership(), ModuleOwnership::Standalone);
        assert!(src.functions().has("f").unwrap());
    }

    #[test]
    fn scoped_modules() {
        let text = Module::with("scoped", |m| {
            constant_fn(m, "one", 1);

            m.to_ir_string()
        })
        .unwrap();

        assert!(text.contains("@one"));
    }
}
