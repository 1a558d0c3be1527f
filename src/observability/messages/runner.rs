// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for guest module loading and execution events.
//!
//! This module contains message types for logging events related to:
//! * Guest module loading and encoding detection
//! * Wasmtime engine creation
//! * Guest execution lifecycle

use std::fmt::{Display, Formatter};

/// Guest module loaded successfully.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_nn_host::observability::messages::runner::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     module_path: "guests/classify.wasm",
///     size_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub module_path: &'a str,
    pub size_bytes: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded WASM module: {} ({} bytes)",
            self.module_path, self.size_bytes
        )
    }
}

/// Guest module loading failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ModuleLoadFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load WASM module '{}': {}",
            self.module_path, self.error
        )
    }
}

/// Wasmtime engine created.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct EngineCreated {
    pub fuel_level: u64,
}

impl Display for EngineCreated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created wasmtime engine for core modules with fuel_level={}",
            self.fuel_level
        )
    }
}

/// Guest execution started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExecutionStarted<'a> {
    pub module_path: &'a str,
    pub backends: &'a [String],
}

impl Display for ExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running '{}' with wasi-nn backends [{}]",
            self.module_path,
            self.backends.join(", ")
        )
    }
}

/// Guest execution finished.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExecutionCompleted<'a> {
    pub module_path: &'a str,
    pub graphs: usize,
    pub contexts: usize,
    pub duration: std::time::Duration,
}

impl Display for ExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Guest '{}' finished in {:?} ({} graphs, {} execution contexts)",
            self.module_path, self.duration, self.graphs, self.contexts
        )
    }
}

/// Guest execution failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ExecutionFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Guest '{}' failed: {}", self.module_path, self.error)
    }
}
