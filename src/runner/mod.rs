// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runs a WASI preview 1 command module with `wasi_ephemeral_nn` linked in.
//!
//! # Flow
//!
//! ```text
//! read bytes ─> require_core_module ─> create_engine ─> Module::new
//!     ─> Linker { wasi_snapshot_preview1, wasi_ephemeral_nn } ─> _start
//! ```
//!
//! Each run gets a fresh store, so graphs and execution contexts never
//! outlive the guest that created them.

pub mod detector;
pub mod engine;

use std::path::Path;
use std::time::{Duration, Instant};

use wasmtime::{Linker, Module, Store};
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::{I32Exit, WasiCtxBuilder};

use crate::backends::BackendSet;
use crate::config::HostConfig;
use crate::errors::{HostError, HostResult};
use crate::nn::{self, WasiNnCtx};
use crate::observability::messages::runner::{
    EngineCreated, ExecutionCompleted, ExecutionFailed, ExecutionStarted, ModuleLoadFailed,
    ModuleLoaded,
};

/// Store data for one guest run.
pub struct HostState {
    pub wasi: WasiP1Ctx,
    pub nn: WasiNnCtx,
}

fn nn_ctx(state: &mut HostState) -> &mut WasiNnCtx {
    &mut state.nn
}

/// What a finished guest left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRun {
    pub graphs: usize,
    pub contexts: usize,
    pub duration: Duration,
}

/// Reads `module_path` and runs it with the backends `config` enables.
///
/// `args` become the guest's `argv`, after the module path itself.
pub fn run_guest(module_path: &Path, args: &[String], config: &HostConfig) -> HostResult<GuestRun> {
    let shown = module_path.display().to_string();
    let bytes = std::fs::read(module_path).map_err(|e| {
        tracing::error!(
            "{}",
            ModuleLoadFailed {
                module_path: &shown,
                error: &e,
            }
        );
        HostError::IoError(e)
    })?;
    tracing::info!(
        "{}",
        ModuleLoaded {
            module_path: &shown,
            size_bytes: bytes.len(),
        }
    );

    let backends = BackendSet::with_compiled(&config.backends);
    run_module(&bytes, &shown, args, config.wasm.fuel.effective(), backends)
}

/// Runs an in-memory guest binary against `backends`.
///
/// A `proc_exit(0)` counts as success; any other status is
/// [`HostError::GuestExit`].
pub fn run_module(
    bytes: &[u8],
    module_name: &str,
    args: &[String],
    fuel: u64,
    backends: BackendSet,
) -> HostResult<GuestRun> {
    let result = execute(bytes, module_name, args, fuel, backends);
    if let Err(e) = &result {
        tracing::error!(
            "{}",
            ExecutionFailed {
                module_path: module_name,
                error: e,
            }
        );
    }
    result
}

fn execute(
    bytes: &[u8],
    module_name: &str,
    args: &[String],
    fuel: u64,
    backends: BackendSet,
) -> HostResult<GuestRun> {
    detector::require_core_module(bytes)?;

    let engine = engine::create_engine()?;
    tracing::debug!("{}", EngineCreated { fuel_level: fuel });
    let module =
        Module::new(&engine, bytes).map_err(|e| HostError::ModuleError(e.to_string()))?;

    let mut linker: Linker<HostState> = Linker::new(&engine);
    wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |state: &mut HostState| &mut state.wasi)?;
    nn::add_to_linker(&mut linker, nn_ctx)?;

    let argv: Vec<&str> = std::iter::once(module_name)
        .chain(args.iter().map(String::as_str))
        .collect();
    let wasi = WasiCtxBuilder::new()
        .inherit_stdio()
        .inherit_env()
        .args(argv.as_slice())
        .build_p1();

    let available: Vec<String> = backends.available().iter().map(|b| b.to_string()).collect();
    let mut store = Store::new(
        &engine,
        HostState {
            wasi,
            nn: WasiNnCtx::new(backends),
        },
    );
    store.set_fuel(fuel)?;

    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|e| HostError::ModuleError(e.to_string()))?;
    let start = instance
        .get_typed_func::<(), ()>(&mut store, "_start")
        .map_err(|_| HostError::MissingEntryPoint)?;

    tracing::info!(
        "{}",
        ExecutionStarted {
            module_path: module_name,
            backends: &available,
        }
    );
    let started = Instant::now();
    if let Err(e) = start.call(&mut store, ()) {
        match e.downcast_ref::<I32Exit>() {
            Some(I32Exit(0)) => {}
            Some(I32Exit(status)) => return Err(HostError::GuestExit(*status)),
            None => return Err(HostError::ExecutionError(e)),
        }
    }

    let registry = store.data().nn.registry();
    let run = GuestRun {
        graphs: registry.graph_count(),
        contexts: registry.context_count(),
        duration: started.elapsed(),
    };
    tracing::info!(
        "{}",
        ExecutionCompleted {
            module_path: module_name,
            graphs: run.graphs,
            contexts: run.contexts,
            duration: run.duration,
        }
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub;
    use std::io::Write;

    /// Loads a one-builder TFLite graph, creates a context when that worked,
    /// and exits with the errno of `load`.
    const TFLITE_LOADER: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "proc_exit" (func $exit (param i32)))
          (import "wasi_ephemeral_nn" "load"
            (func $load (param i32 i32 i32 i32 i32) (result i32)))
          (import "wasi_ephemeral_nn" "init_execution_context"
            (func $init (param i32 i32) (result i32)))
          (memory (export "memory") 1)
          (data (i32.const 0x100) "\00\02\00\00\04\00\00\00")
          (data (i32.const 0x200) "TFL3")
          (func (export "_start")
            (local $errno i32)
            (local.set $errno
              (call $load (i32.const 0x100) (i32.const 1) (i32.const 4) (i32.const 0) (i32.const 0x10)))
            (if (i32.eqz (local.get $errno))
              (then (drop (call $init (i32.load (i32.const 0x10)) (i32.const 0x14)))))
            (call $exit (local.get $errno))))
    "#;

    fn compile(wat: &str) -> Vec<u8> {
        wat::parse_str(wat).unwrap()
    }

    #[test]
    fn test_guest_that_returns_from_start_succeeds() {
        let bytes = compile(r#"(module (memory (export "memory") 1) (func (export "_start")))"#);
        let run = run_module(&bytes, "noop.wasm", &[], 1_000_000, BackendSet::empty()).unwrap();
        assert_eq!(run.graphs, 0);
        assert_eq!(run.contexts, 0);
    }

    #[test]
    fn test_guest_loads_through_stub_backend() {
        let bytes = compile(TFLITE_LOADER);
        let run = run_module(&bytes, "loader.wasm", &[], 1_000_000, stub::identity_set()).unwrap();
        assert_eq!(run.graphs, 1);
        assert_eq!(run.contexts, 1);
    }

    #[test]
    fn test_errno_from_unbuilt_backend_reaches_the_guest() {
        let bytes = compile(TFLITE_LOADER);
        let err = run_module(&bytes, "loader.wasm", &[], 1_000_000, BackendSet::empty()).unwrap_err();
        assert!(matches!(err, HostError::GuestExit(1)));
    }

    #[test]
    fn test_missing_start_is_reported() {
        let bytes = compile(r#"(module (memory (export "memory") 1))"#);
        let err = run_module(&bytes, "lib.wasm", &[], 1_000_000, BackendSet::empty()).unwrap_err();
        assert!(matches!(err, HostError::MissingEntryPoint));
    }

    #[test]
    fn test_component_binaries_are_rejected_before_compilation() {
        let bytes = compile("(component)");
        let err = run_module(&bytes, "c.wasm", &[], 1_000_000, BackendSet::empty()).unwrap_err();
        assert!(matches!(err, HostError::UnsupportedEncoding(_)));
    }

    #[test]
    fn test_unknown_import_fails_instantiation() {
        let bytes = compile(
            r#"(module
                 (import "wasi_ephemeral_nn" "unload" (func (param i32) (result i32)))
                 (func (export "_start")))"#,
        );
        let err = run_module(&bytes, "bad.wasm", &[], 1_000_000, BackendSet::empty()).unwrap_err();
        assert!(matches!(err, HostError::ModuleError(_)));
    }

    #[test]
    fn test_runaway_guest_runs_out_of_fuel() {
        let bytes = compile(r#"(module (func (export "_start") (loop (br 0))))"#);
        let err = run_module(&bytes, "spin.wasm", &[], 10_000, BackendSet::empty()).unwrap_err();
        assert!(matches!(err, HostError::ExecutionError(_)));
    }

    #[test]
    fn test_run_guest_reads_module_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&compile(r#"(module (func (export "_start")))"#))
            .unwrap();

        let run = run_guest(file.path(), &[], &HostConfig::default()).unwrap();
        assert_eq!(run.graphs, 0);
    }

    #[test]
    fn test_run_guest_reports_missing_file() {
        let err = run_guest(
            Path::new("/nonexistent/guest.wasm"),
            &[],
            &HostConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HostError::IoError(_)));
    }
}
