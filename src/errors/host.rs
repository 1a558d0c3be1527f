// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the guest runner.
//!
//! Covers everything outside the wasi-nn host functions themselves: reading
//! and classifying the guest binary, building the wasmtime engine, linking
//! and running `_start`.

use thiserror::Error;

/// Message for binaries encoded as components rather than core modules.
///
/// `wasi_ephemeral_nn` is a preview 1 import module, so only core modules can
/// import it.
pub const COMPONENT_BINARY_UNSUPPORTED: &str = "Unsupported WASM binary: component model \
binaries cannot import wasi_ephemeral_nn. Build the guest as a core module (wasm32-wasip1).";

#[derive(Error, Debug)]
pub enum HostError {
    /// Invalid or malformed WASM binary format.
    #[error("Invalid WASM binary: {0}")]
    InvalidWasmBinary(String),

    /// A valid binary in an encoding the runner does not execute.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Module compilation, linking or instantiation error.
    #[error("WASM module error: {0}")]
    ModuleError(String),

    /// The guest does not export the WASI command entry point.
    #[error("Guest module has no `_start` export")]
    MissingEntryPoint,

    /// The guest called `proc_exit` with a non-zero status.
    #[error("Guest exited with status {0}")]
    GuestExit(i32),

    /// File I/O error during module loading.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wasmtime runtime execution error.
    #[error("WASM execution error: {0}")]
    ExecutionError(#[from] wasmtime::Error),

    /// Wasmtime engine creation or configuration error.
    #[error("Engine creation error: {0}")]
    EngineError(String),

    /// WASM binary parsing error from wasmparser.
    #[error("WASM parser error: {0}")]
    ParserError(#[from] wasmparser::BinaryReaderError),
}

/// Result type alias for runner operations.
pub type HostResult<T> = Result<T, HostError>;
