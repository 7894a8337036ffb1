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
use crate::sys::*;
use ahash::AHashMap;
use log::{debug, trace};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The strategy an execution engine uses to run code.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum EngineKind {
    /// Walks the IR directly.
    Interpreter,
    /// Compiles each function once into register-machine code and runs that.
    Jit,
}

/// The category of value a generic value record holds.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum GenericValueKind {
    /// An integer of some width
    Int,
    /// A single-precision float
    Float,
    /// A double-precision float
    Double,
    /// A raw address
    Pointer,
    /// The "result" of a `void` function
    Void,
}

impl Store {
    fn create_engine(
        &mut self,
        m: ModuleRef,
        kind: Option<EngineKind>,
        options: EngineOptions,
    ) -> NativeResult<EngineRef> {
        let data = self.module(m)?;

        if data.owner.is_some() {
            return diag("module is already owned by an execution engine");
        }

        let layout = DataLayout::parse(&data.data_layout)?;

        if options.verify_modules {
            self.verify_module(m)?;
        }

        let kind = match kind {
            Some(EngineKind::Jit) if !layout.matches_host() => {
                return diag("the JIT can only target the host's data layout")
            }
            Some(kind) => kind,
            None if layout.matches_host() => EngineKind::Jit,
            None => EngineKind::Interpreter,
        };

        let engine = self.engines.insert(EngineData {
            kind,
            options,
            modules: vec![m],
            layout,
            compiled: AHashMap::default(),
        });

        self.module_mut(m)?.owner = Some(engine);

        debug!("created {kind:?} engine {engine:?} owning module {m:?}");

        Ok(engine)
    }

    pub(crate) fn is_definition(&self, value: ValueRef) -> bool {
        match self.values.get(value).map(|v| &v.kind) {
            Some(ValueKind::Function(data)) => !data.blocks.is_empty(),
            Some(ValueKind::Global(data)) => data.initializer.is_some(),
            _ => false,
        }
    }

    /// Finds the function body that a call to `callee` runs. Declarations are
    /// resolved by name against every module the engine owns, in the order they
    /// were added.
    pub(crate) fn resolve_callee(&self, engine: EngineRef, callee: ValueRef) -> NativeResult<ValueRef> {
        self.function(callee)?;

        if self.is_definition(callee) {
            return Ok(callee);
        }

        let name = &self.value(callee)?.name;

        for module in self.engine(engine)?.modules.iter() {
            match self.module(*module)?.symbols.get(name) {
                Some(found) if self.is_definition(*found) && self.function(*found).is_ok() => {
                    return Ok(*found)
                }
                _ => {}
            }
        }

        diag(format!("unresolved external function `{name}`"))
    }

    fn engine_symbol(&self, e: EngineRef, name: &str, functions: bool) -> NativeResult<ValueRef> {
        for module in self.engine(e)?.modules.iter() {
            if let Some(found) = self.module(*module)?.symbols.get(name) {
                let is_function = matches!(self.value(*found)?.kind, ValueKind::Function(_));

                if is_function == functions {
                    return Ok(*found);
                }
            }
        }

        Ok(ValueRef::null())
    }
}

/// Creates an interpreter that takes ownership of `m`.
pub fn create_interpreter_for_module(m: ModuleRef, options: EngineOptions) -> NativeResult<EngineRef> {
    with_store(|store| store.create_engine(m, Some(EngineKind::Interpreter), options))
}

/// Creates a JIT compiler that takes ownership of `m`. The module's data layout
/// must match the host's.
pub fn create_jit_compiler_for_module(m: ModuleRef, options: EngineOptions) -> NativeResult<EngineRef> {
    with_store(|store| store.create_engine(m, Some(EngineKind::Jit), options))
}

/// Creates whichever engine suits `m`: the JIT when the module targets the host,
/// the interpreter otherwise.
pub fn create_execution_engine_for_module(m: ModuleRef, options: EngineOptions) -> NativeResult<EngineRef> {
    with_store(|store| store.create_engine(m, None, options))
}

/// Frees an engine along with every module it still owns.
pub fn dispose_execution_engine(e: EngineRef) -> NativeResult<()> {
    with_store(|store| {
        let data = store
            .engines
            .remove(e)
            .ok_or(NativeError::StaleHandle(EngineRef::KIND))?;

        debug!("disposing engine {e:?} and its {} module(s)", data.modules.len());

        for module in data.modules {
            store.free_module(module);
        }

        Ok(())
    })
}

/// Hands ownership of another module to the engine.
pub fn add_module(e: EngineRef, m: ModuleRef) -> NativeResult<()> {
    with_store(|store| {
        let verify = store.engine(e)?.options.verify_modules;

        if store.module(m)?.owner.is_some() {
            return diag("module is already owned by an execution engine");
        }

        if verify {
            store.verify_module(m)?;
        }

        let engine = store.engine_mut(e)?;

        engine.modules.push(m);
        engine.compiled.clear();
        store.module_mut(m)?.owner = Some(e);

        debug!("engine {e:?} took ownership of module {m:?}");

        Ok(())
    })
}

/// Takes a module back from the engine, the caller owns it again.
pub fn remove_module(e: EngineRef, m: ModuleRef) -> NativeResult<()> {
    with_store(|store| {
        store.engine(e)?;

        if store.module(m)?.owner != Some(e) {
            return diag("module is not owned by this engine");
        }

        let engine = store.engine_mut(e)?;

        engine.modules.retain(|owned| *owned != m);
        engine.compiled.clear();
        store.module_mut(m)?.owner = None;

        debug!("engine {e:?} released module {m:?}");

        Ok(())
    })
}

/// Finds a function by name across every module the engine owns, or null.
pub fn find_function(e: EngineRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| store.engine_symbol(e, name, true))
}

/// Finds a global variable by name across every module the engine owns, or null.
pub fn find_global(e: EngineRef, name: &str) -> NativeResult<ValueRef> {
    with_store(|store| store.engine_symbol(e, name, false))
}

/// Creates a new target data object describing the layout the engine runs with.
pub fn get_execution_engine_target_data(e: EngineRef) -> NativeResult<TargetDataRef> {
    with_store(|store| {
        let layout = store.engine(e)?.layout.clone();

        Ok(store.target_data.insert(layout))
    })
}

/// Gets the strategy that the engine uses.
pub fn get_execution_engine_kind(e: EngineRef) -> NativeResult<EngineKind> {
    with_store(|store| Ok(store.engine(e)?.kind))
}

/// Gets the options the engine was created with.
pub fn get_execution_engine_options(e: EngineRef) -> NativeResult<EngineOptions> {
    with_store(|store| Ok(store.engine(e)?.options))
}

/// Runs `f` with `args` and returns a new generic value holding the result.
///
/// `f` must live in a module the engine owns. Arguments are checked against
/// the function's parameter types, extra arguments to a variadic function are
/// accepted and ignored.
pub fn run_function(e: EngineRef, f: ValueRef, args: &[GenericValueRef]) -> NativeResult<GenericValueRef> {
    with_store(|store| {
        let module = store.parent_module(f)?;
        let engine = store.engine(e)?;
        let kind = engine.kind;

        if !engine.modules.contains(&module) {
            return diag("function does not belong to a module owned by this engine");
        }

        let value = store.value(f)?;
        let (_, params, vararg) = store.signature(value.ty)?;

        if args.len() < params.len() || (args.len() > params.len() && !vararg) {
            return diag(format!(
                "`@{}` takes {} argument(s) but was given {}",
                value.name,
                params.len(),
                args.len()
            ));
        }

        let mut values = Vec::with_capacity(args.len());

        for (i, arg) in args.iter().enumerate() {
            let scalar = *store.generic_value(*arg)?;

            match params.get(i) {
                Some(param) if store.scalar_ty(*param)? != scalar.ty() => {
                    return diag(format!(
                        "argument {i} of `@{}` must be a `{}`",
                        value.name,
                        store.type_name(*param)
                    ))
                }
                _ => values.push(scalar),
            }
        }

        trace!("running `@{}` on {kind:?} engine {e:?} with {values:?}", value.name);

        let result = match kind {
            EngineKind::Interpreter => interp::run(store, e, f, &values)?,
            EngineKind::Jit => jit::run(store, e, f, &values)?,
        };

        trace!("`@{}` returned {result:?}", store.value(f)?.name);

        Ok(store.generic_values.insert(result))
    })
}

/// Creates a generic value holding an integer of type `ty`. Bits above the
/// type's width are discarded.
pub fn create_generic_value_of_int(ty: TypeRef, bits: u64) -> NativeResult<GenericValueRef> {
    with_store(|store| match store.scalar_ty(ty)? {
        ScalarTy::Int(width) => Ok(store.generic_values.insert(Scalar::int(width, bits))),
        _ => diag("generic integer values need an integer type"),
    })
}

/// Creates a generic value holding a `float` or `double`, depending on `ty`.
pub fn create_generic_value_of_float(ty: TypeRef, value: f64) -> NativeResult<GenericValueRef> {
    with_store(|store| {
        let scalar = match store.scalar_ty(ty)? {
            ScalarTy::Float => Scalar::Float(value as f32),
            ScalarTy::Double => Scalar::Double(value),
            _ => return diag("generic floating values need a floating-point type"),
        };

        Ok(store.generic_values.insert(scalar))
    })
}

/// Creates a generic value holding a raw address.
pub fn create_generic_value_of_pointer(address: u64) -> GenericValueRef {
    with_store(|store| store.generic_values.insert(Scalar::Pointer(address)))
}

/// Gets the category of value held.
pub fn get_generic_value_kind(gv: GenericValueRef) -> NativeResult<GenericValueKind> {
    with_store(|store| {
        Ok(match store.generic_value(gv)? {
            Scalar::Int { .. } => GenericValueKind::Int,
            Scalar::Float(_) => GenericValueKind::Float,
            Scalar::Double(_) => GenericValueKind::Double,
            Scalar::Pointer(_) => GenericValueKind::Pointer,
            Scalar::Void => GenericValueKind::Void,
        })
    })
}

/// Gets the width of the integer held.
pub fn generic_value_int_width(gv: GenericValueRef) -> NativeResult<u32> {
    with_store(|store| match store.generic_value(gv)? {
        Scalar::Int { width, .. } => Ok(*width),
        _ => diag("generic value does not hold an integer"),
    })
}

/// Gets the integer held, either zero- or sign-extended to 64 bits.
pub fn generic_value_to_int(gv: GenericValueRef, signed: bool) -> NativeResult<u64> {
    with_store(|store| match store.generic_value(gv)? {
        Scalar::Int { width, bits } if signed => Ok(eval::sign_extend(*bits, *width) as u64),
        Scalar::Int { bits, .. } => Ok(*bits),
        _ => diag("generic value does not hold an integer"),
    })
}

/// Gets the floating value held, rounded to the precision of `ty`.
pub fn generic_value_to_float(ty: TypeRef, gv: GenericValueRef) -> NativeResult<f64> {
    with_store(|store| {
        let value = match store.generic_value(gv)? {
            Scalar::Float(f) => *f as f64,
            Scalar::Double(d) => *d,
            _ => return diag("generic value does not hold a floating-point value"),
        };

        match store.scalar_ty(ty)? {
            ScalarTy::Float => Ok(value as f32 as f64),
            ScalarTy::Double => Ok(value),
            _ => diag("floating conversions need a floating-point type"),
        }
    })
}

/// Gets the address held.
pub fn generic_value_to_pointer(gv: GenericValueRef) -> NativeResult<u64> {
    with_store(|store| match store.generic_value(gv)? {
        Scalar::Pointer(address) => Ok(*address),
        _ => diag("generic value does not hold a pointer"),
    })
}

/// Frees a generic value.
pub fn dispose_generic_value(gv: GenericValueRef) -> NativeResult<()> {
    with_store(|store| {
        store
            .generic_values
            .remove(gv)
            .map(|_| ())
            .ok_or(NativeError::StaleHandle(GenericValueRef::KIND))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // i32 @answer() { ret 42 } and i32 @twice(i32) calling a declared @answer
    fn answer_module(name: &str) -> ModuleRef {
        let i32 = int_type(32).unwrap();
        let m = module_create_with_name(name);
        let f = add_function(m, "answer", function_type(i32, &[], false).unwrap()).unwrap();
        let b = create_builder();

        position_builder_at_end(b, append_basic_block(f, "entry").unwrap()).unwrap();
        build_ret(b, const_int(i32, 42).unwrap()).unwrap();
        dispose_builder(b).unwrap();

        m
    }

    fn caller_module(name: &str) -> ModuleRef {
        let i32 = int_type(32).unwrap();
        let m = module_create_with_name(name);
        let answer = add_function(m, "answer", function_type(i32, &[], false).unwrap()).unwrap();
        let f = add_function(m, "twice", function_type(i32, &[], false).unwrap()).unwrap();
        let b = create_builder();

        position_builder_at_end(b, append_basic_block(f, "entry").unwrap()).unwrap();

        let x = build_call(b, answer, &[], "x").unwrap();
        let y = build_binary(b, Opcode::Add, x, x, "y").unwrap();

        build_ret(b, y).unwrap();
        dispose_builder(b).unwrap();

        m
    }

    fn run_int(e: EngineRef, f: ValueRef) -> NativeResult<u64> {
        let gv = run_function(e, f, &[])?;
        let out = generic_value_to_int(gv, false);

        dispose_generic_value(gv)?;

        out
    }

    #[test]
    fn engines_own_their_modules() {
        let m = answer_module("engine-own");
        let e = create_interpreter_for_module(m, EngineOptions::default()).unwrap();

        assert_eq!(get_module_engine(m).unwrap(), e);
        assert!(create_interpreter_for_module(m, EngineOptions::default()).is_err());

        dispose_execution_engine(e).unwrap();

        assert_eq!(get_module_identifier(m), Err(NativeError::StaleHandle("module")));
    }

    #[test]
    fn declarations_resolve_across_modules() {
        for kind in [EngineKind::Interpreter, EngineKind::Jit] {
            let caller = caller_module("engine-caller");
            let e = match kind {
                EngineKind::Interpreter => create_interpreter_for_module(caller, EngineOptions::default()),
                EngineKind::Jit => create_jit_compiler_for_module(caller, EngineOptions::default()),
            }
            .unwrap();

            let twice = find_function(e, "twice").unwrap();
            let err = run_function(e, twice, &[]).unwrap_err();

            assert_eq!(
                err,
                NativeError::Diagnostic("unresolved external function `answer`".into())
            );

            add_module(e, answer_module("engine-callee")).unwrap();

            assert_eq!(run_int(e, twice).unwrap(), 84);

            dispose_execution_engine(e).unwrap();
        }
    }

    #[test]
    fn removed_modules_are_not_searched() {
        let m = answer_module("engine-remove");
        let e = create_interpreter_for_module(m, EngineOptions::default()).unwrap();

        assert!(!find_function(e, "answer").unwrap().is_null());

        remove_module(e, m).unwrap();

        assert!(find_function(e, "answer").unwrap().is_null());
        assert!(get_module_engine(m).unwrap().is_null());
        assert!(remove_module(e, m).is_err());

        dispose_execution_engine(e).unwrap();

        assert_eq!(get_module_identifier(m).unwrap(), "engine-remove");

        dispose_module(m).unwrap();
    }

    #[test]
    fn arguments_are_checked() {
        let i32 = int_type(32).unwrap();
        let m = answer_module("engine-args");
        let e = create_execution_engine_for_module(m, EngineOptions::default()).unwrap();
        let f = find_function(e, "answer").unwrap();
        let extra = create_generic_value_of_int(i32, 1).unwrap();

        assert!(run_function(e, f, &[extra]).is_err());

        dispose_generic_value(extra).unwrap();
        dispose_execution_engine(e).unwrap();
    }

    #[test]
    fn generic_value_conversions() {
        let i8 = int_type(8).unwrap();
        let gv = create_generic_value_of_int(i8, 0xFF).unwrap();

        assert_eq!(generic_value_int_width(gv).unwrap(), 8);
        assert_eq!(generic_value_to_int(gv, false).unwrap(), 255);
        assert_eq!(generic_value_to_int(gv, true).unwrap() as i64, -1);
        assert!(generic_value_to_pointer(gv).is_err());

        let d = create_generic_value_of_float(double_type(), 0.1).unwrap();

        assert_eq!(generic_value_to_float(double_type(), d).unwrap(), 0.1);
        assert_eq!(generic_value_to_float(float_type(), d).unwrap(), 0.1f32 as f64);
        assert_eq!(get_generic_value_kind(d).unwrap(), GenericValueKind::Double);

        dispose_generic_value(gv).unwrap();
        dispose_generic_value(d).unwrap();

        assert!(get_generic_value_kind(gv).is_err());
    }

    #[test]
    fn jit_rejects_foreign_layouts() {
        let m = answer_module("engine-layout");

        set_data_layout(m, "E-p:16:16").unwrap();

        assert!(create_jit_compiler_for_module(m, EngineOptions::default()).is_err());

        let e = create_execution_engine_for_module(m, EngineOptions::default()).unwrap();

        assert_eq!(get_execution_engine_kind(e).unwrap(), EngineKind::Interpreter);

        let td = get_execution_engine_target_data(e).unwrap();

        assert_eq!(pointer_size(td).unwrap(), 2);
        assert!(is_big_endian(td).unwrap());

        dispose_target_data(td).unwrap();
        dispose_execution_engine(e).unwrap();
    }
}
