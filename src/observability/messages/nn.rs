// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for wasi-nn host function and backend adapter events.
//!
//! This module contains message types for logging events related to:
//! * Backend registration at start-up
//! * Graph loading and execution context creation
//! * Input binding, inference and output copy-back
//! * Failed host calls and the error code returned to the guest

use std::fmt::{Display, Formatter};

use crate::errors::{ErrNo, NnError};
use crate::nn::Backend;

/// A native engine adapter was registered.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BackendRegistered {
    pub backend: Backend,
}

impl Display for BackendRegistered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Registered wasi-nn backend: {}", self.backend)
    }
}

/// A compiled-in backend was left out because the configuration does not enable it.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BackendDisabled {
    pub backend: Backend,
}

impl Display for BackendDisabled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "wasi-nn backend {} is compiled in but disabled by configuration",
            self.backend
        )
    }
}

/// A graph was loaded and committed to the registry.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_nn_host::nn::Backend;
/// use wasi_nn_host::observability::messages::nn::GraphLoaded;
///
/// let msg = GraphLoaded {
///     backend: Backend::PyTorch,
///     graph: 0,
///     model_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct GraphLoaded {
    pub backend: Backend,
    pub graph: u32,
    pub model_bytes: usize,
}

impl Display for GraphLoaded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} graph {} ({} bytes of model data)",
            self.backend, self.graph, self.model_bytes
        )
    }
}

/// An execution context was created.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct ContextCreated {
    pub backend: Backend,
    pub graph: u32,
    pub context: u32,
}

impl Display for ContextCreated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created {} execution context {} for graph {}",
            self.backend, self.context, self.graph
        )
    }
}

/// Inference finished for one context.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct ComputeCompleted {
    pub backend: Backend,
    pub context: u32,
    pub duration: std::time::Duration,
}

impl Display for ComputeCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} compute on context {} completed in {:?}",
            self.backend, self.context, self.duration
        )
    }
}

/// The guest buffer was shorter than the tensor, so the copy was cut short.
///
/// # Log Level
/// `warn!` - Data loss the guest can only detect from the byte count
pub struct OutputTruncated {
    pub backend: Backend,
    pub index: u32,
    pub available: usize,
    pub written: usize,
}

impl Display for OutputTruncated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} output {} truncated: {} of {} bytes copied to guest",
            self.backend, self.index, self.written, self.available
        )
    }
}

/// Input data length differs from the size implied by its shape.
///
/// # Log Level
/// `warn!` - The adapter proceeds with a clamped copy
pub struct InputSizeMismatch {
    pub backend: Backend,
    pub index: u32,
    pub expected: usize,
    pub actual: usize,
}

impl Display for InputSizeMismatch {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} input {}: shape needs {} bytes but guest supplied {}",
            self.backend, self.index, self.expected, self.actual
        )
    }
}

/// A temporary SavedModel export directory was prepared.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct ExportDirectoryCreated<'a> {
    pub path: &'a std::path::Path,
}

impl Display for ExportDirectoryCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Wrote SavedModel export to {}", self.path.display())
    }
}

/// A TFLite model was optimized into a runnable plan for one interpreter.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
///
/// # Example
/// ```
/// use wasi_nn_host::observability::messages::nn::InterpreterPlanned;
///
/// let msg = InterpreterPlanned { inputs: 1, outputs: 2 };
/// assert_eq!(msg.to_string(), "Planned TFLite interpreter with 1 inputs and 2 outputs");
/// ```
pub struct InterpreterPlanned {
    pub inputs: usize,
    pub outputs: usize,
}

impl Display for InterpreterPlanned {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Planned TFLite interpreter with {} inputs and {} outputs",
            self.inputs, self.outputs
        )
    }
}

/// A host function returned a non-success code to the guest.
///
/// # Log Level
/// `warn!` - Failure the guest is expected to handle
pub struct HostCallFailed<'a> {
    pub function: &'static str,
    pub errno: ErrNo,
    pub error: &'a NnError,
}

impl Display for HostCallFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "wasi-nn {} returned {:?}: {}",
            self.function, self.errno, self.error
        )
    }
}
