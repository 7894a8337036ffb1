//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::collections::NameLookup;
use crate::error::{Error, Result};
use crate::execution::{EngineOptions, GenericValue};
use crate::handle::{Dispose, HandleCell};
use crate::ir::{non_null, Function, GlobalVariable, Module, TargetData, Type, TypeKind};
use crate::scope::scoped;
use crate::sys::{self, EngineKind, EngineRef, GenericValueKind};
use log::{debug, warn};
use std::ops::{Deref, DerefMut};

/// Models one of the execution engine flavors.
///
/// Creating an engine takes ownership of the module it is created from. The
/// [`Module`] object stays around, but rejects direct use until the module is
/// handed back with [`ExecutionEngine::remove_module`].
pub trait Engine: Dispose + Sized {
    /// Creates the engine with default options, taking ownership of `module`.
    fn with_module(module: &mut Module) -> Result<Self>;

    /// Gets the engine underneath.
    fn engine(&self) -> &ExecutionEngine;

    /// Gets the engine underneath.
    fn engine_mut(&mut self) -> &mut ExecutionEngine;

    /// Creates an engine, lends it to `body` and disposes it afterwards. Any
    /// module still owned by the engine at that point is disposed with it.
    fn with<T>(module: &mut Module, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        scoped(|| Self::with_module(module), body)
    }
}

/// An engine whose strategy is picked by the toolkit: the JIT if the module's
/// data layout matches the host, the interpreter otherwise.
///
/// ```
/// # use garnet::collections::NameLookup;
/// # use garnet::execution::{Engine, ExecutionEngine, GenericValue};
/// # use garnet::ir::{Builder, Function, Module, Type, Value};
/// let mut m = Module::new("doc");
/// let f = Function::new(&m, "answer", Type::function(Type::i64(), &[], false)?)?;
///
/// Builder::with(|b| {
///     b.position_at_end(f.append_block("entry")?)?;
///     b.build_ret(Value::const_int(Type::i64(), 42)?)?;
///
///     Ok(())
/// })?;
///
/// let answer = ExecutionEngine::with(&mut m, |engine| {
///     let f = engine.functions().get("answer")?;
///
///     engine.run(f, &[])?.to_int::<i64>()
/// })?;
///
/// assert_eq!(answer, 42);
/// assert!(m.to_ir_string().unwrap_err().is_invalid_reference());
/// # Ok::<(), garnet::Error>(())
/// ```
#[derive(Debug)]
pub struct ExecutionEngine {
    handle: HandleCell<EngineRef>,
}

impl ExecutionEngine {
    fn create(module: &mut Module, kind: Option<EngineKind>, options: EngineOptions) -> Result<Self> {
        let m = module.raw()?;

        let raw = match kind {
            Some(EngineKind::Interpreter) => sys::create_interpreter_for_module(m, options)?,
            Some(EngineKind::Jit) => sys::create_jit_compiler_for_module(m, options)?,
            None => sys::create_execution_engine_for_module(m, options)?,
        };

        module.transfer_to(raw);

        Ok(Self {
            handle: HandleCell::of(raw),
        })
    }

    /// Creates an engine with default options, taking ownership of `module`.
    pub fn with_module(module: &mut Module) -> Result<Self> {
        Self::create(module, None, EngineOptions::default())
    }

    /// Creates an engine with `options`, taking ownership of `module`.
    pub fn with_options(module: &mut Module, options: EngineOptions) -> Result<Self> {
        Self::create(module, None, options)
    }

    fn raw(&self) -> Result<EngineRef> {
        self.handle.get()
    }

    /// Hands ownership of another standalone module to the engine.
    pub fn add_module(&mut self, module: &mut Module) -> Result<()> {
        let engine = self.raw()?;

        sys::add_module(engine, module.raw()?)?;
        module.transfer_to(engine);

        Ok(())
    }

    /// Takes a module back from the engine. Afterwards `module` is standalone
    /// and usable again, and the engine can no longer see its functions.
    pub fn remove_module(&mut self, module: &mut Module) -> Result<()> {
        let engine = self.raw()?;
        let m = module.raw_unowned()?;

        if module.owner() != Some(engine) {
            let name = sys::get_module_identifier(m)?;

            return Err(Error::not_found("module owned by this engine", &name));
        }

        sys::remove_module(engine, m)?;
        module.release_from(engine);

        debug!("module {m:?} is standalone again");

        Ok(())
    }

    /// Views the functions of every module the engine owns.
    pub fn functions(&self) -> EngineFunctions<'_> {
        EngineFunctions { engine: self }
    }

    /// Views the globals of every module the engine owns.
    pub fn globals(&self) -> EngineGlobals<'_> {
        EngineGlobals { engine: self }
    }

    /// Runs `function` to completion on the calling thread.
    ///
    /// The arguments must match the function's parameters in number, category
    /// and width. They are only borrowed, the caller still owns them.
    pub fn run(&self, function: Function, args: &[GenericValue]) -> Result<GenericValue> {
        let engine = self.raw()?;
        let ty = function.ty()?;
        let params = ty.param_types()?;

        if args.len() < params.len() || (args.len() > params.len() && !ty.is_vararg()?) {
            return Err(Error::TypeMismatch(format!(
                "`@{}` takes {} argument(s) but was given {}",
                function.name()?,
                params.len(),
                args.len()
            )));
        }

        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            if !accepts(*param, arg)? {
                return Err(Error::TypeMismatch(format!(
                    "argument {i} of `@{}` must be a `{param}`",
                    function.name()?
                )));
            }
        }

        let raw = args.iter().map(|arg| arg.raw()).collect::<Result<Vec<_>>>()?;
        let result = sys::run_function(engine, function.as_value().raw(), &raw)?;

        Ok(GenericValue::from_raw(result))
    }

    /// Gets the data layout the engine runs code with.
    pub fn target_data(&self) -> Result<TargetData> {
        Ok(TargetData::from_raw(sys::get_execution_engine_target_data(self.raw()?)?))
    }

    /// Gets the strategy the engine uses.
    pub fn kind(&self) -> Result<EngineKind> {
        Ok(sys::get_execution_engine_kind(self.raw()?)?)
    }

    /// Gets the options the engine was created with.
    pub fn options(&self) -> Result<EngineOptions> {
        Ok(sys::get_execution_engine_options(self.raw()?)?)
    }
}

fn accepts(param: Type, arg: &GenericValue) -> Result<bool> {
    Ok(match (param.kind()?, arg.kind()?) {
        (TypeKind::Integer, GenericValueKind::Int) => param.int_width()? == arg.int_width()?,
        (TypeKind::Float, GenericValueKind::Float) => true,
        (TypeKind::Double, GenericValueKind::Double) => true,
        (TypeKind::Pointer, GenericValueKind::Pointer) => true,
        _ => false,
    })
}

impl Engine for ExecutionEngine {
    fn with_module(module: &mut Module) -> Result<Self> {
        ExecutionEngine::with_module(module)
    }

    fn engine(&self) -> &ExecutionEngine {
        self
    }

    fn engine_mut(&mut self) -> &mut ExecutionEngine {
        self
    }
}

impl Dispose for ExecutionEngine {
    fn dispose(&mut self) {
        if let Some(raw) = self.handle.take() {
            if let Err(err) = sys::dispose_execution_engine(raw) {
                warn!("failed to dispose execution engine {raw:?}: {err}");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

macro_rules! engine_flavor {
    ( $(#[$outer:meta])* $name:ident => $kind:ident ) => {
        $(#[$outer])*
        #[derive(Debug)]
        pub struct $name(ExecutionEngine);

        impl $name {
            /// Creates the engine with default options, taking ownership of `module`.
            pub fn with_module(module: &mut Module) -> Result<Self> {
                Self::with_options(module, EngineOptions::default())
            }

            /// Creates the engine with `options`, taking ownership of `module`.
            pub fn with_options(module: &mut Module, options: EngineOptions) -> Result<Self> {
                ExecutionEngine::create(module, Some(EngineKind::$kind), options).map(Self)
            }
        }

        impl Engine for $name {
            fn with_module(module: &mut Module) -> Result<Self> {
                $name::with_module(module)
            }

            fn engine(&self) -> &ExecutionEngine {
                &self.0
            }

            fn engine_mut(&mut self) -> &mut ExecutionEngine {
                &mut self.0
            }
        }

        impl Deref for $name {
            type Target = ExecutionEngine;

            fn deref(&self) -> &ExecutionEngine {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut ExecutionEngine {
                &mut self.0
            }
        }

        impl Dispose for $name {
            fn dispose(&mut self) {
                self.0.dispose()
            }

            fn is_disposed(&self) -> bool {
                self.0.is_disposed()
            }
        }
    };
}

engine_flavor! {
    /// An engine that walks the IR of each function as it runs.
    Interpreter => Interpreter
}

engine_flavor! {
    /// An engine that compiles each function once, the first time it runs,
    /// and caches the result. Only modules laid out like the host can be
    /// compiled.
    Jit => Jit
}

/// The functions visible to an engine. These can be looked up by name, but
/// not enumerated.
#[derive(Copy, Clone, Debug)]
pub struct EngineFunctions<'e> {
    engine: &'e ExecutionEngine,
}

impl<'e> EngineFunctions<'e> {
    /// Always fails with [`Error::Unsupported`]: the toolkit has no way to
    /// walk every function an engine can see.
    pub fn iter(&self) -> Result<std::vec::IntoIter<Function>> {
        self.engine.raw()?;

        Err(Error::Unsupported("enumerating the functions of an execution engine"))
    }
}

impl<'e> NameLookup for EngineFunctions<'e> {
    type Item = Function;

    const KIND: &'static str = "function";

    fn lookup(&self, name: &str) -> Result<Option<Function>> {
        let raw = sys::find_function(self.engine.raw()?, name)?;

        Ok(non_null(raw).map(Function::from_raw))
    }
}

/// The globals visible to an engine. These can be looked up by name, but
/// not enumerated.
#[derive(Copy, Clone, Debug)]
pub struct EngineGlobals<'e> {
    engine: &'e ExecutionEngine,
}

impl<'e> EngineGlobals<'e> {
    /// Always fails with [`Error::Unsupported`].
    pub fn iter(&self) -> Result<std::vec::IntoIter<GlobalVariable>> {
        self.engine.raw()?;

        Err(Error::Unsupported("enumerating the globals of an execution engine"))
    }
}

impl<'e> NameLookup for EngineGlobals<'e> {
    type Item = GlobalVariable;

    const KIND: &'static str = "global";

    fn lookup(&self, name: &str) -> Result<Option<GlobalVariable>> {
        let raw = sys::find_global(self.engine.raw()?, name)?;

        Ok(non_null(raw).map(GlobalVariable::from_raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::LinkedCollection;
    use crate::ir::{Builder, IntPredicate, ModuleOwnership, Value};
    use pretty_assertions::assert_eq;

    fn constant_module(name: &str, func: &str, value: i64) -> Module {
        let m = Module::new(name);
        let i32 = Type::i32();
        let f = Function::new(&m, func, Type::function(i32, &[], false).unwrap()).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();
        b.build_ret(Value::const_int(i32, value).unwrap()).unwrap();

        m
    }

    fn sum_module(name: &str) -> Module {
        let m = Module::new(name);
        let i32 = Type::i32();
        let f = Function::new(&m, "sum", Type::function(i32, &[i32, i32], false).unwrap()).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();
        let sum = b.build_add(f.param(0).unwrap(), f.param(1).unwrap(), "sum").unwrap();
        b.build_ret(sum).unwrap();

        m
    }

    // a > b ? a + 2 : b - 5, with a real branch and a phi
    fn pick_module(name: &str) -> Module {
        let m = Module::new(name);
        let i32 = Type::i32();
        let f = Function::new(&m, "pick", Type::function(i32, &[i32, i32], false).unwrap()).unwrap();
        let (a, b) = (f.param(0).unwrap(), f.param(1).unwrap());
        let entry = f.append_block("entry").unwrap();
        let then = f.append_block("then").unwrap();
        let otherwise = f.append_block("otherwise").unwrap();
        let merge = f.append_block("merge").unwrap();
        let builder = Builder::new();

        builder.position_at_end(entry).unwrap();
        let cond = builder.build_icmp(IntPredicate::Sgt, a, b, "cond").unwrap();
        builder.build_cond_br(cond, then, otherwise).unwrap();

        builder.position_at_end(then).unwrap();
        let plus = builder
            .build_add(a, Value::const_int(i32, 2).unwrap(), "plus")
            .unwrap();
        builder.build_br(merge).unwrap();

        builder.position_at_end(otherwise).unwrap();
        let minus = builder
            .build_sub(b, Value::const_int(i32, 5).unwrap(), "minus")
            .unwrap();
        builder.build_br(merge).unwrap();

        builder.position_at_end(merge).unwrap();
        let result = builder.build_phi(i32, "result").unwrap();
        result.add_incoming(&[(plus, then), (minus, otherwise)]).unwrap();
        builder.build_ret(result).unwrap();

        m
    }

    // i32 @down(i32 %n) = n == 0 ? 0 : @down(n - 1) + 1
    fn down_module(name: &str) -> Module {
        let m = Module::new(name);
        let i32 = Type::i32();
        let f = Function::new(&m, "down", Type::function(i32, &[i32], false).unwrap()).unwrap();
        let n = f.param(0).unwrap();
        let (zero, one) = (Value::const_int(i32, 0).unwrap(), Value::const_int(i32, 1).unwrap());
        let entry = f.append_block("entry").unwrap();
        let base = f.append_block("base").unwrap();
        let recurse = f.append_block("recurse").unwrap();
        let b = Builder::new();

        b.position_at_end(entry).unwrap();
        let done = b.build_icmp(IntPredicate::Eq, n, zero, "done").unwrap();
        b.build_cond_br(done, base, recurse).unwrap();

        b.position_at_end(base).unwrap();
        b.build_ret(zero).unwrap();

        b.position_at_end(recurse).unwrap();
        let smaller = b.build_sub(n, one, "smaller").unwrap();
        let rest = b.build_call(f, &[smaller], "rest").unwrap();
        let total = b.build_add(rest, one, "total").unwrap();
        b.build_ret(total).unwrap();

        m
    }

    fn int(value: i32) -> GenericValue {
        GenericValue::from_int(Type::i32(), value).unwrap()
    }

    fn run_i32(engine: &ExecutionEngine, name: &str, args: &[GenericValue]) -> Result<i32> {
        engine.run(engine.functions().get(name)?, args)?.to_int::<i32>()
    }

    #[test]
    fn engines_own_their_modules() {
        crate::testing::init_logging();

        let mut m = sum_module("owned");
        let mut engine = Interpreter::with_module(&mut m).unwrap();

        assert!(matches!(m.ownership(), ModuleOwnership::OwnedByEngine(_)));
        assert!(m.to_ir_string().unwrap_err().is_invalid_reference());
        assert!(m.functions().has("sum").unwrap_err().is_invalid_reference());
        assert!(m.functions().iter().next().unwrap().unwrap_err().is_invalid_reference());
        assert!(m.globals().is_empty().unwrap_err().is_invalid_reference());
        assert!(m.identity().is_ok());

        engine.remove_module(&mut m).unwrap();

        assert_eq!(m.ownership(), ModuleOwnership::Standalone);
        assert!(m.to_ir_string().unwrap().contains("@sum"));
        assert_eq!(m.functions().iter().count(), 1);
        assert!(m.functions().iter().all(|f| f.is_ok()));
        assert!(!engine.functions().has("sum").unwrap());
    }

    #[test]
    fn added_modules_are_owned_too() {
        let mut first = constant_module("first", "f", 1);
        let mut second = constant_module("second", "g", 2);
        let mut elsewhere = constant_module("elsewhere", "h", 3);
        let mut engine = Interpreter::with_module(&mut first).unwrap();
        let mut other = Interpreter::with_module(&mut elsewhere).unwrap();

        engine.add_module(&mut second).unwrap();

        assert!(matches!(second.ownership(), ModuleOwnership::OwnedByEngine(_)));
        assert_eq!(second.ownership(), first.ownership());
        assert!(second.to_ir_string().unwrap_err().is_invalid_reference());
        assert!(second.functions().has("g").unwrap_err().is_invalid_reference());
        assert!(second.functions().iter().next().unwrap().unwrap_err().is_invalid_reference());
        assert_eq!(run_i32(&engine, "g", &[]), Ok(2));

        // one engine at a time
        assert!(other.add_module(&mut second).unwrap_err().is_invalid_reference());
        assert!(other.remove_module(&mut second).unwrap_err().is_not_found());
        assert!(!other.functions().has("g").unwrap());
        assert!(other.functions().has("h").unwrap());
        assert!(engine.functions().has("g").unwrap());
        assert_eq!(second.ownership(), first.ownership());

        engine.remove_module(&mut second).unwrap();

        assert_eq!(second.ownership(), ModuleOwnership::Standalone);
        assert!(second.to_ir_string().unwrap().contains("@g"));
        assert!(second.functions().has("g").unwrap());
        assert!(!engine.functions().has("g").unwrap());

        other.add_module(&mut second).unwrap();

        assert_eq!(second.ownership(), elsewhere.ownership());
        assert!(second.to_ir_string().unwrap_err().is_invalid_reference());
        assert!(second.functions().has("g").unwrap_err().is_invalid_reference());
        assert_eq!(run_i32(&other, "g", &[]), Ok(2));
        assert!(!engine.functions().has("g").unwrap());
    }

    #[test]
    fn deep_recursion_is_bounded_by_call_depth_alone() {
        // much less host stack than 1024 nested host calls would need
        let worker = std::thread::Builder::new()
            .stack_size(512 * 1024)
            .spawn(|| {
                let mut interpreted = down_module("down-interp");
                let mut compiled = down_module("down-jit");
                let interpreter = Interpreter::with_module(&mut interpreted).unwrap();
                let jit = Jit::with_module(&mut compiled).unwrap();
                let limit = Err(Error::Native("call depth limit of 1024 exceeded".into()));

                for engine in [&*interpreter, &*jit] {
                    assert_eq!(run_i32(engine, "down", &[int(1000)]), Ok(1000));
                    assert_eq!(run_i32(engine, "down", &[int(1023)]), Ok(1023));
                    assert_eq!(run_i32(engine, "down", &[int(1024)]), limit);
                    assert_eq!(run_i32(engine, "down", &[int(5000)]), limit);
                }
            })
            .unwrap();

        worker.join().unwrap();
    }

    #[test]
    fn disposing_an_engine_disposes_its_modules() {
        let mut m = constant_module("doomed", "f", 1);
        let mut engine = Jit::with_module(&mut m).unwrap();

        engine.dispose();
        engine.dispose();

        assert!(engine.is_disposed());
        assert_eq!(m.ownership(), ModuleOwnership::Disposed);
        assert!(m.name().unwrap_err().is_invalid_reference());
        assert!(engine.functions().has("f").unwrap_err().is_invalid_reference());
        assert!(engine.kind().unwrap_err().is_invalid_reference());
    }

    #[test]
    fn modules_cannot_be_given_away_twice() {
        let mut m = constant_module("twice", "f", 1);
        let _first = Interpreter::with_module(&mut m).unwrap();

        assert!(Jit::with_module(&mut m).unwrap_err().is_invalid_reference());
    }

    #[test]
    fn interpreter_sums() {
        let mut m = sum_module("sum-interp");
        let engine = Interpreter::with_module(&mut m).unwrap();

        assert_eq!(engine.kind(), Ok(EngineKind::Interpreter));
        assert_eq!(run_i32(&engine, "sum", &[int(1), int(2)]), Ok(3));
    }

    #[test]
    fn jit_returns_constants() {
        let mut m = constant_module("const-jit", "answer", 42);
        let engine = Jit::with_module(&mut m).unwrap();

        assert_eq!(engine.kind(), Ok(EngineKind::Jit));
        assert_eq!(run_i32(&engine, "answer", &[]), Ok(42));
    }

    #[test]
    fn branches_merge_under_every_engine() {
        let mut a = pick_module("pick-interp");
        let mut b = pick_module("pick-jit");
        let interp = Interpreter::with_module(&mut a).unwrap();
        let jit = Jit::with_options(
            &mut b,
            EngineOptions {
                opt_level: 0,
                ..EngineOptions::default()
            },
        )
        .unwrap();

        for engine in [&*interp, &*jit] {
            assert_eq!(run_i32(engine, "pick", &[int(1), int(2)]), Ok(-3));
            assert_eq!(run_i32(engine, "pick", &[int(2), int(1)]), Ok(4));
        }

        assert_eq!(jit.options().unwrap().opt_level, 0);
    }

    #[test]
    fn functions_can_be_looked_up_but_not_listed() {
        let mut m1 = constant_module("m1", "f", 1);
        let mut m2 = constant_module("m2", "g", 7);
        let mut engine = Interpreter::with_module(&mut m1).unwrap();

        assert!(engine.functions().has("f").unwrap());
        assert!(!engine.functions().has("g").unwrap());
        assert!(engine.functions().iter().unwrap_err().is_unsupported());
        assert!(engine.globals().iter().unwrap_err().is_unsupported());

        engine.remove_module(&mut m1).unwrap();

        assert!(!engine.functions().has("f").unwrap());
        assert_eq!(
            engine.functions().get("f"),
            Err(Error::NotFound {
                kind: "function",
                name: "f".into()
            })
        );

        engine.add_module(&mut m2).unwrap();

        assert!(engine.functions().has("g").unwrap());
        assert_eq!(run_i32(&engine, "g", &[]), Ok(7));
        assert!(m1.functions().has("f").unwrap());
    }

    #[test]
    fn removing_a_foreign_module_is_not_found() {
        let mut owned = constant_module("owned-here", "f", 1);
        let mut other = constant_module("elsewhere", "g", 2);
        let mut engine = Interpreter::with_module(&mut owned).unwrap();

        assert_eq!(
            engine.remove_module(&mut other),
            Err(Error::NotFound {
                kind: "module owned by this engine",
                name: "elsewhere".into()
            })
        );
        assert_eq!(other.ownership(), ModuleOwnership::Standalone);
    }

    #[test]
    fn arguments_are_checked_before_running() {
        let mut m = sum_module("sum-args");
        let engine = Interpreter::with_module(&mut m).unwrap();
        let sum = engine.functions().get("sum").unwrap();
        let wide = GenericValue::from_int(Type::i64(), 1).unwrap();
        let real = GenericValue::from_float(Type::f64(), 1.0).unwrap();

        assert!(engine.run(sum, &[int(1)]).unwrap_err().is_type_mismatch());
        assert!(engine.run(sum, &[int(1), int(2), int(3)]).unwrap_err().is_type_mismatch());
        assert!(engine.run(sum, &[int(1), wide]).unwrap_err().is_type_mismatch());
        assert!(engine.run(sum, &[real, int(1)]).unwrap_err().is_type_mismatch());

        // the arguments are still usable afterwards
        let x = int(20);

        assert_eq!(engine.run(sum, &[int(22), x]).unwrap().to_int::<i32>(), Ok(42));
    }

    #[test]
    fn failures_while_running_are_native() {
        let mut m = Module::new("div");
        let i32 = Type::i32();
        let f = Function::new(&m, "div", Type::function(i32, &[i32], false).unwrap()).unwrap();
        let b = Builder::new();

        b.position_at_end(f.append_block("entry").unwrap()).unwrap();
        let q = b.build_sdiv(Value::const_int(i32, 1).unwrap(), f.param(0).unwrap(), "q").unwrap();
        b.build_ret(q).unwrap();

        let result = Interpreter::with(&mut m, |engine| run_i32(engine, "div", &[int(0)]));

        assert_eq!(result, Err(Error::Native("integer division by zero".into())));
        assert_eq!(m.ownership(), ModuleOwnership::Disposed);
    }

    #[test]
    fn unverifiable_modules_are_refused() {
        let mut m = Module::new("broken");
        let f = Function::new(&m, "f", Type::function(Type::i32(), &[], false).unwrap()).unwrap();

        // a block with no terminator
        f.append_block("entry").unwrap();

        assert!(Interpreter::with_module(&mut m).unwrap_err().is_native());
        assert_eq!(m.ownership(), ModuleOwnership::Standalone);
    }

    #[test]
    fn engine_globals() {
        let mut m = Module::new("globals");
        let g = GlobalVariable::new(&m, Type::i64(), "counter").unwrap();

        g.set_initializer(Value::const_int(Type::i64(), 0).unwrap()).unwrap();

        let engine = ExecutionEngine::with_module(&mut m).unwrap();

        assert_eq!(engine.globals().get("counter"), Ok(g));
        assert!(engine.globals().get("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn engines_describe_their_layout() {
        let mut native = constant_module("host", "f", 1);
        let mut emulated = constant_module("foreign", "f", 1);

        emulated.set_data_layout("E-p:16:16").unwrap();

        let host = ExecutionEngine::with_module(&mut native).unwrap();
        let foreign = ExecutionEngine::with_module(&mut emulated).unwrap();

        assert_eq!(host.kind(), Ok(EngineKind::Jit));
        assert_eq!(foreign.kind(), Ok(EngineKind::Interpreter));
        assert_eq!(foreign.target_data().unwrap().pointer_size(), Ok(2));
        assert_eq!(run_i32(&foreign, "f", &[]), Ok(1));
    }
}
