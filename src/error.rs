//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::sys::NativeError;
use thiserror::Error;

/// Every way that a call through the bindings can fail.
///
/// None of these are retried: a call that reports one of these has had no
/// effect on the toolkit's state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The handle was disposed, or its ownership was handed to someone else.
    #[error("invalid reference to {0}: it was disposed or is no longer owned by this handle")]
    InvalidReference(&'static str),
    /// A name-keyed lookup found nothing.
    #[error("no {kind} named `{name}`")]
    NotFound {
        /// What was being looked up, e.g. `"function"`.
        kind: &'static str,
        /// The name that was asked for.
        name: String,
    },
    /// A value was used with the wrong type, width or category.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The toolkit does not expose the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The toolkit itself rejected the request.
    #[error("{0}")]
    Native(String),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_owned(),
        }
    }

    /// Checks if this is an [`Error::InvalidReference`].
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidReference(_))
    }

    /// Checks if this is an [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is an [`Error::TypeMismatch`].
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch(_))
    }

    /// Checks if this is an [`Error::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Checks if this is an [`Error::Native`].
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::StaleHandle(kind) => Self::InvalidReference(kind),
            NativeError::Diagnostic(text) => Self::Native(text),
        }
    }
}

/// Shorthand for results produced by the bindings.
pub type Result<T, E = Error> = std::result::Result<T, E>;
