//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Acquire/use/release for anything that implements [`Dispose`].
//!
//! ```
//! # use garnet::ir::Module;
//! # use garnet::scope::Scoped;
//! # use garnet::handle::Dispose;
//! let mut outer = Scoped::new(Module::new("outer"));
//!
//! {
//!     let inner = Scoped::new(Module::new("inner"));
//!
//!     assert_eq!(inner.name().unwrap(), "inner");
//! } // `inner` is disposed here
//!
//! outer.set_name("renamed").unwrap();
//! assert!(!outer.is_disposed());
//! ```

use crate::error::Result;
use crate::handle::Dispose;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

/// Disposes the resource it holds when it goes out of scope, whether that is
/// through a normal return, an early `?` return or a panic.
///
/// Guards in one scope are dropped in reverse order of declaration, so nested
/// resources are released in reverse order of acquisition.
#[derive(Debug)]
pub struct Scoped<R: Dispose> {
    resource: ManuallyDrop<R>,
}

impl<R: Dispose> Scoped<R> {
    /// Takes responsibility for disposing `resource`.
    pub fn new(resource: R) -> Self {
        Self {
            resource: ManuallyDrop::new(resource),
        }
    }

    /// Releases the guard without disposing the resource.
    pub fn into_inner(self) -> R {
        let mut this = ManuallyDrop::new(self);

        // SAFETY: `this` is never dropped, so the resource is moved out exactly once
        unsafe { ManuallyDrop::take(&mut this.resource) }
    }
}

impl<R: Dispose> Deref for Scoped<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R: Dispose> DerefMut for Scoped<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

impl<R: Dispose> Drop for Scoped<R> {
    fn drop(&mut self) {
        self.resource.dispose();

        // SAFETY: the resource is not touched again after this
        unsafe { ManuallyDrop::drop(&mut self.resource) }
    }
}

/// Runs `acquire`, lends the resource to `body`, and disposes it afterwards no
/// matter how `body` exits. If `acquire` fails, `body` never runs.
///
/// ```
/// # use garnet::ir::Module;
/// # use garnet::scope::scoped;
/// let name = scoped(|| Ok(Module::new("scoped")), |m| m.name()).unwrap();
///
/// assert_eq!(name, "scoped");
/// ```
pub fn scoped<R, T>(acquire: impl FnOnce() -> Result<R>, body: impl FnOnce(&mut R) -> Result<T>) -> Result<T>
where
    R: Dispose,
{
    let mut guard = Scoped::new(acquire()?);

    body(&mut guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        disposed: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Self {
            Self {
                name,
                log: log.clone(),
                disposed: false,
            }
        }
    }

    impl Dispose for Probe {
        fn dispose(&mut self) {
            if !self.disposed {
                self.disposed = true;
                self.log.borrow_mut().push(self.name);
            }
        }

        fn is_disposed(&self) -> bool {
            self.disposed
        }
    }

    #[test]
    fn guards_release_in_reverse_order() {
        let log = Rc::default();

        {
            let _a = Scoped::new(Probe::new("a", &log));
            let _b = Scoped::new(Probe::new("b", &log));
        }

        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn errors_still_dispose() {
        let log = Rc::default();
        let result: Result<()> = scoped(
            || Ok(Probe::new("a", &log)),
            |_| Err(Error::Unsupported("testing")),
        );

        assert_eq!(result, Err(Error::Unsupported("testing")));
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn failed_acquire_skips_body() {
        let mut ran = false;
        let result: Result<()> = scoped(
            || Err::<Probe, _>(Error::Native("no".into())),
            |_| {
                ran = true;
                Ok(())
            },
        );

        assert!(result.is_err());
        assert!(!ran);
    }

    #[test]
    fn panics_still_dispose() {
        let log = Rc::default();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _guard = Scoped::new(Probe::new("a", &log));

            panic!("boom");
        }));

        assert!(outcome.is_err());
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn into_inner_defuses() {
        let log = Rc::default();
        let probe = Scoped::new(Probe::new("a", &log)).into_inner();

        assert!(log.borrow().is_empty());
        assert!(!probe.is_disposed());
    }
}
