// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest binary encoding detection.
//!
//! `wasi_ephemeral_nn` is a preview 1 import module, so the runner only
//! executes classic core modules. Components are recognised from their
//! version header and rejected before compilation.

use wasmparser::{Encoding, Parser, Payload};

use crate::errors::{HostError, HostResult, COMPONENT_BINARY_UNSUPPORTED};

/// Binary encodings a WebAssembly file can declare in its header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GuestEncoding {
    /// Core module (binary version 1).
    CoreModule,
    /// Component model binary.
    Component,
}

/// Reads the version header with `wasmparser` and validates the rest of the
/// payload stream.
///
/// # Errors
/// Returns an error if the input is empty, truncated or otherwise malformed.
pub fn detect_encoding(bytes: &[u8]) -> HostResult<GuestEncoding> {
    let mut encoding = None;

    for payload in Parser::new(0).parse_all(bytes) {
        if let Payload::Version { encoding: enc, .. } = payload? {
            // Nested modules inside a component report their own version.
            encoding.get_or_insert(enc);
        }
    }

    match encoding {
        Some(Encoding::Component) => Ok(GuestEncoding::Component),
        Some(Encoding::Module) => Ok(GuestEncoding::CoreModule),
        None => Err(HostError::InvalidWasmBinary("Invalid WASM binary".to_string())),
    }
}

/// Accepts core modules only.
pub fn require_core_module(bytes: &[u8]) -> HostResult<()> {
    match detect_encoding(bytes)? {
        GuestEncoding::CoreModule => Ok(()),
        GuestEncoding::Component => Err(HostError::UnsupportedEncoding(
            COMPONENT_BINARY_UNSUPPORTED.to_string(),
        )),
    }
}
