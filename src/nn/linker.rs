// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Registers the `wasi_ephemeral_nn` imports on a wasmtime [`Linker`].
//!
//! Every function resolves the caller's exported `memory` first; a guest
//! without one traps instead of receiving an error code.

use anyhow::bail;
use wasmtime::{Caller, Extern, Linker};

use crate::nn::ctx::errno_of;
use crate::nn::{GuestMemory, WasiNnCtx};

/// Import module name the guest links against.
pub const WASI_NN_MODULE: &str = "wasi_ephemeral_nn";

fn guest_state<'a, T: 'static>(
    caller: &'a mut Caller<'_, T>,
    get: fn(&mut T) -> &mut WasiNnCtx,
) -> anyhow::Result<(GuestMemory<'a>, &'a mut WasiNnCtx)> {
    let memory = match caller.get_export("memory") {
        Some(Extern::Memory(memory)) => memory,
        _ => bail!("{}: guest does not export a linear memory named `memory`", WASI_NN_MODULE),
    };
    let (bytes, data) = memory.data_and_store_mut(caller);
    Ok((GuestMemory::new(bytes), get(data)))
}

/// Adds the five wasi-nn functions; `get` projects the store data onto the
/// guest's [`WasiNnCtx`].
pub fn add_to_linker<T: 'static>(
    linker: &mut Linker<T>,
    get: fn(&mut T) -> &mut WasiNnCtx,
) -> anyhow::Result<()> {
    linker.func_wrap(
        WASI_NN_MODULE,
        "load",
        move |mut caller: Caller<'_, T>,
              builder_ptr: u32,
              builder_len: u32,
              encoding: u32,
              target: u32,
              graph_out: u32|
              -> anyhow::Result<i32> {
            let (mut memory, nn) = guest_state(&mut caller, get)?;
            let result = nn.load(&mut memory, builder_ptr, builder_len, encoding, target, graph_out);
            Ok(errno_of("load", result).code() as i32)
        },
    )?;

    linker.func_wrap(
        WASI_NN_MODULE,
        "init_execution_context",
        move |mut caller: Caller<'_, T>, graph: u32, ctx_out: u32| -> anyhow::Result<i32> {
            let (mut memory, nn) = guest_state(&mut caller, get)?;
            let result = nn.init_execution_context(&mut memory, graph, ctx_out);
            Ok(errno_of("init_execution_context", result).code() as i32)
        },
    )?;

    linker.func_wrap(
        WASI_NN_MODULE,
        "set_input",
        move |mut caller: Caller<'_, T>, ctx: u32, index: u32, tensor_ptr: u32| -> anyhow::Result<i32> {
            let (memory, nn) = guest_state(&mut caller, get)?;
            let result = nn.set_input(&memory, ctx, index, tensor_ptr);
            Ok(errno_of("set_input", result).code() as i32)
        },
    )?;

    linker.func_wrap(
        WASI_NN_MODULE,
        "get_output",
        move |mut caller: Caller<'_, T>,
              ctx: u32,
              index: u32,
              out_ptr: u32,
              out_max: u32,
              written_out: u32|
              -> anyhow::Result<i32> {
            let (mut memory, nn) = guest_state(&mut caller, get)?;
            let result = nn.get_output(&mut memory, ctx, index, out_ptr, out_max, written_out);
            Ok(errno_of("get_output", result).code() as i32)
        },
    )?;

    linker.func_wrap(
        WASI_NN_MODULE,
        "compute",
        move |mut caller: Caller<'_, T>, ctx: u32| -> anyhow::Result<i32> {
            let (_, nn) = guest_state(&mut caller, get)?;
            Ok(errno_of("compute", nn.compute(ctx)).code() as i32)
        },
    )?;

    Ok(())
}
