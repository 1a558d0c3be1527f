// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The five `wasi_ephemeral_nn` operations over one guest's state.
//!
//! Each operation validates its result pointers before doing any work, so a
//! graph or context is only committed to the registry when its handle can be
//! written back. Operations return [`NnResult`]; [`errno_of`] collapses that
//! into the code the guest receives and logs the failure.

use std::time::Instant;

use crate::backends::BackendSet;
use crate::errors::{ErrNo, NnError, NnResult};
use crate::nn::tensor::decode_builders;
use crate::nn::{Backend, ExecutionTarget, GuestMemory, Registry, Tensor};
use crate::observability::messages::nn::{ComputeCompleted, ContextCreated, GraphLoaded, HostCallFailed};

/// Per-guest wasi-nn state: the adapters it may use and everything it loaded.
pub struct WasiNnCtx {
    registry: Registry,
    backends: BackendSet,
}

impl Default for WasiNnCtx {
    fn default() -> Self {
        Self::new(BackendSet::empty())
    }
}

impl WasiNnCtx {
    pub fn new(backends: BackendSet) -> Self {
        Self {
            registry: Registry::new(),
            backends,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Loads a graph from `builder_len` builders at `builder_ptr` and writes
    /// its handle to `graph_out`.
    pub fn load(
        &mut self,
        memory: &mut GuestMemory<'_>,
        builder_ptr: u32,
        builder_len: u32,
        encoding: u32,
        target: u32,
        graph_out: u32,
    ) -> NnResult<u32> {
        memory.require_u32_slot(graph_out, "graph handle result")?;
        let backend = Backend::from_encoding(encoding)?;
        let target = ExecutionTarget::from_id(target)?;
        let adapter = self.backends.get(backend);

        let (handle, model_bytes) = {
            let builders = decode_builders(memory, builder_ptr, builder_len)?;
            let model_bytes: usize = builders.iter().map(|b| b.len()).sum();
            let handle = self
                .registry
                .add_graph_with(|| adapter.load(&builders, target))?;
            (handle, model_bytes)
        };

        memory.store_u32(graph_out, handle, "graph handle result")?;
        tracing::info!(
            "{}",
            GraphLoaded {
                backend,
                graph: handle,
                model_bytes,
            }
        );
        Ok(handle)
    }

    /// Creates an execution context for `graph` and writes its handle to `ctx_out`.
    pub fn init_execution_context(
        &mut self,
        memory: &mut GuestMemory<'_>,
        graph: u32,
        ctx_out: u32,
    ) -> NnResult<u32> {
        memory.require_u32_slot(ctx_out, "context handle result")?;
        let backend = self.registry.graph(graph)?.backend();
        let adapter = self.backends.get(backend);

        let handle = self
            .registry
            .add_context_with(graph, |graph| adapter.init_execution_context(graph))?;

        memory.store_u32(ctx_out, handle, "context handle result")?;
        tracing::info!(
            "{}",
            ContextCreated {
                backend,
                graph,
                context: handle,
            }
        );
        Ok(handle)
    }

    pub fn set_input(&mut self, memory: &GuestMemory<'_>, ctx: u32, index: u32, tensor_ptr: u32) -> NnResult<()> {
        let tensor = Tensor::decode(memory, tensor_ptr)?;
        let context = self.registry.context_mut(ctx)?;
        self.backends
            .get(context.backend())
            .set_input(context, index, &tensor)
    }

    pub fn compute(&mut self, ctx: u32) -> NnResult<()> {
        let context = self.registry.context_mut(ctx)?;
        let backend = context.backend();

        let started = Instant::now();
        self.backends.get(backend).compute(context)?;
        tracing::debug!(
            "{}",
            ComputeCompleted {
                backend,
                context: ctx,
                duration: started.elapsed(),
            }
        );
        Ok(())
    }

    /// Copies output `index` into the guest buffer at `out_ptr` (at most
    /// `out_max` bytes) and writes the byte count to `written_out`.
    pub fn get_output(
        &mut self,
        memory: &mut GuestMemory<'_>,
        ctx: u32,
        index: u32,
        out_ptr: u32,
        out_max: u32,
        written_out: u32,
    ) -> NnResult<u32> {
        memory.require_u32_slot(written_out, "bytes written result")?;

        let written = {
            let out = memory
                .slice_mut(out_ptr, out_max)
                .ok_or(NnError::GuestMemory("output buffer"))?;
            let context = self.registry.context_mut(ctx)?;
            self.backends
                .get(context.backend())
                .get_output(context, index, out)?
        };

        memory.store_u32(written_out, written, "bytes written result")?;
        Ok(written)
    }
}

/// Maps an operation's outcome to the guest's error code, logging failures.
pub fn errno_of<T>(function: &'static str, result: NnResult<T>) -> ErrNo {
    match result {
        Ok(_) => ErrNo::Success,
        Err(error) => {
            let errno = error.errno();
            tracing::warn!(
                "{}",
                HostCallFailed {
                    function,
                    errno,
                    error: &error,
                }
            );
            errno
        }
    }
}
