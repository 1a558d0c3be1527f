// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use wasmtime::{Config, Engine};

use crate::errors::{HostError, HostResult};

/// Creates the wasmtime engine guests run on.
///
/// Core modules only, with fuel metering so a runaway guest stops. Time spent
/// inside a native inference engine is not metered.
pub fn create_engine() -> HostResult<Engine> {
    let mut config = Config::new();
    config.wasm_component_model(false);

    config.wasm_threads(false);
    config.wasm_simd(false);
    config.wasm_relaxed_simd(false);
    config.wasm_multi_memory(false);
    config.wasm_memory64(false);
    config.consume_fuel(true);
    config.epoch_interruption(false);

    Engine::new(&config).map_err(|e| HostError::EngineError(e.to_string()))
}
