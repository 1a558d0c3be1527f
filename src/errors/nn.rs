// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the wasi-nn host functions.
//!
//! Every failure inside the host core is an [`NnError`]. The guest never sees
//! these values directly: the dispatch layer collapses them into the small
//! [`ErrNo`] code space of the `wasi_ephemeral_nn` ABI. Native engine failures
//! arrive as [`EngineError`] and are classified by the adapter that called the
//! engine, since only the adapter knows whether a failed call means "the model
//! is bad", "a required object is missing" or "the engine gave up".

use crate::nn::{Backend, ExecutionTarget};
use thiserror::Error;

/// Error codes returned to the guest as the `i32` result of every operation.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrNo {
    Success = 0,
    InvalidArgument = 1,
    MissingMemory = 2,
    Busy = 3,
}

impl ErrNo {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Failure of one wasi-nn operation.
#[derive(Error, Debug)]
pub enum NnError {
    /// Bad handle, bad shape, bad type, bad builder count and similar caller errors.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A guest pointer did not resolve to a valid region of linear memory.
    #[error("Guest memory access rejected: {0}")]
    GuestMemory(&'static str),

    /// An expected native object is absent.
    #[error("Missing memory: {0}")]
    MissingMemory(String),

    /// The native engine failed or refused the request.
    #[error("Backend busy: {0}")]
    Busy(String),

    /// The backend is known but no adapter was registered for it.
    #[error("{0} backend is not built into this host")]
    BackendNotBuilt(Backend),

    /// The graph encoding id does not name any backend this host knows.
    #[error("Unsupported graph encoding: {0}")]
    UnsupportedBackend(u32),

    /// Only CPU execution is available.
    #[error("Unsupported execution target: {0:?}")]
    UnsupportedTarget(ExecutionTarget),

    /// Unrecognised execution target id.
    #[error("Unknown execution target: {0}")]
    UnknownTarget(u32),

    /// A handle does not name an entry of the registry.
    #[error("{kind} handle {handle} does not exist (registry holds {len})")]
    InvalidHandle {
        kind: &'static str,
        handle: u32,
        len: usize,
    },

    /// An execution context was routed to an adapter for a different backend.
    #[error("Context belongs to {actual} but was dispatched to {expected}")]
    BackendMismatch { expected: Backend, actual: Backend },
}

impl NnError {
    pub fn errno(&self) -> ErrNo {
        match self {
            NnError::MissingMemory(_) => ErrNo::MissingMemory,
            NnError::Busy(_) => ErrNo::Busy,
            NnError::InvalidArgument(_)
            | NnError::GuestMemory(_)
            | NnError::BackendNotBuilt(_)
            | NnError::UnsupportedBackend(_)
            | NnError::UnsupportedTarget(_)
            | NnError::UnknownTarget(_)
            | NnError::InvalidHandle { .. }
            | NnError::BackendMismatch { .. } => ErrNo::InvalidArgument,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        NnError::InvalidArgument(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        NnError::MissingMemory(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        NnError::Busy(msg.into())
    }
}

/// Result type alias for wasi-nn operations.
pub type NnResult<T> = Result<T, NnError>;

/// Failure reported by a native engine through its seam.
///
/// The engine bindings keep the native library's message; the adapter decides
/// which [`NnError`] class it belongs to.
#[derive(Error, Debug)]
#[error("{operation} failed: {message}")]
pub struct EngineError {
    pub operation: &'static str,
    pub message: String,
}

impl EngineError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Wraps any displayable native error.
    pub fn from_native(operation: &'static str, error: impl std::fmt::Display) -> Self {
        Self::new(operation, error.to_string())
    }

    pub fn into_invalid(self) -> NnError {
        NnError::InvalidArgument(self.to_string())
    }

    pub fn into_missing(self) -> NnError {
        NnError::MissingMemory(self.to_string())
    }

    pub fn into_busy(self) -> NnError {
        NnError::Busy(self.to_string())
    }
}

/// Result type alias for engine seam calls.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_classification() {
        let cases: Vec<(NnError, ErrNo)> = vec![
            (NnError::invalid("x"), ErrNo::InvalidArgument),
            (NnError::GuestMemory("tensor"), ErrNo::InvalidArgument),
            (NnError::missing("x"), ErrNo::MissingMemory),
            (NnError::busy("x"), ErrNo::Busy),
            (NnError::BackendNotBuilt(Backend::PyTorch), ErrNo::InvalidArgument),
            (NnError::UnsupportedBackend(1), ErrNo::InvalidArgument),
            (NnError::UnsupportedTarget(ExecutionTarget::Gpu), ErrNo::InvalidArgument),
            (NnError::UnknownTarget(9), ErrNo::InvalidArgument),
            (
                NnError::InvalidHandle {
                    kind: "graph",
                    handle: 3,
                    len: 0,
                },
                ErrNo::InvalidArgument,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.errno(), expected, "wrong class for {}", error);
        }
    }

    #[test]
    fn test_errno_codes_match_abi() {
        assert_eq!(ErrNo::Success.code(), 0);
        assert_eq!(ErrNo::InvalidArgument.code(), 1);
        assert_eq!(ErrNo::MissingMemory.code(), 2);
        assert_eq!(ErrNo::Busy.code(), 3);
    }

    #[test]
    fn test_engine_error_keeps_native_message() {
        let error = EngineError::from_native("read network", "bad xml at line 3");
        assert_eq!(error.to_string(), "read network failed: bad xml at line 3");
        assert!(matches!(error.into_busy(), NnError::Busy(msg) if msg.contains("bad xml")));
    }
}
