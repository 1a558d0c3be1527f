// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! PyTorch (TorchScript) adapter.
//!
//! A TorchScript module exposes no input arity the host can inspect, so
//! inputs are a positional slot list that grows as the guest binds indices.
//! Growth stops at a configured cap and `compute` refuses any unset slot.

#[cfg(feature = "pytorch")]
pub mod native;

use std::sync::Arc;

use crate::backends::{check_index, copy_output, NnBackend};
use crate::errors::{EngineResult, NnError, NnResult};
use crate::nn::tensor::require_builder_count;
use crate::nn::{cpu_device, Backend, ExecutionContext, ExecutionTarget, Graph, Tensor, TensorType};

pub trait TorchEngine: Send + Sync {
    /// Deserializes a TorchScript archive.
    fn load_module(&self, archive: &[u8]) -> EngineResult<Box<dyn TorchModule>>;
}

pub trait TorchModule: Send + Sync {
    /// Runs `forward`. Tensors in the result hold float32 data.
    fn forward(&self, inputs: &[TorchTensor]) -> EngineResult<TorchOutput>;
}

/// Scalar kinds the adapter can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchKind {
    Float,
    Half,
    Uint8,
    Int,
    Double,
}

impl TorchKind {
    pub fn from_tensor_type(ty: TensorType) -> Self {
        match ty {
            TensorType::F32 => TorchKind::Float,
            TensorType::F16 => TorchKind::Half,
            TensorType::U8 => TorchKind::Uint8,
            TensorType::I32 => TorchKind::Int,
        }
    }

    pub fn to_tensor_type(self) -> Option<TensorType> {
        match self {
            TorchKind::Float => Some(TensorType::F32),
            TorchKind::Half => Some(TensorType::F16),
            TorchKind::Uint8 => Some(TensorType::U8),
            TorchKind::Int => Some(TensorType::I32),
            TorchKind::Double => None,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TorchKind::Float | TorchKind::Int => 4,
            TorchKind::Half => 2,
            TorchKind::Uint8 => 1,
            TorchKind::Double => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TorchTensor {
    pub kind: TorchKind,
    pub dims: Vec<i64>,
    pub data: Vec<u8>,
}

/// What `forward` returned.
#[derive(Debug)]
pub enum TorchOutput {
    Tensor(TorchTensor),
    TensorList(Vec<TorchTensor>),
    /// Any other value; carries a description for the error message.
    Other(String),
}

pub struct TorchGraph {
    module: Box<dyn TorchModule>,
}

pub struct TorchContext {
    graph: Arc<TorchGraph>,
    inputs: Vec<Option<TorchTensor>>,
    outputs: Option<Vec<TorchTensor>>,
}

impl TorchContext {
    pub fn bound_inputs(&self) -> usize {
        self.inputs.iter().filter(|slot| slot.is_some()).count()
    }
}

pub struct PyTorchBackend {
    engine: Box<dyn TorchEngine>,
    max_input_slots: u32,
}

impl PyTorchBackend {
    pub fn new(engine: Box<dyn TorchEngine>, max_input_slots: u32) -> Self {
        Self {
            engine,
            max_input_slots,
        }
    }

    fn context<'c>(&self, ctx: &'c mut ExecutionContext) -> NnResult<&'c mut TorchContext> {
        match ctx {
            ExecutionContext::PyTorch(ctx) => Ok(ctx),
            other => Err(NnError::BackendMismatch {
                expected: Backend::PyTorch,
                actual: other.backend(),
            }),
        }
    }
}

impl NnBackend for PyTorchBackend {
    fn kind(&self) -> Backend {
        Backend::PyTorch
    }

    fn load(&self, builders: &[&[u8]], target: ExecutionTarget) -> NnResult<Graph> {
        require_builder_count(builders, 1, "PyTorch")?;
        cpu_device(target)?;

        let module = self
            .engine
            .load_module(builders[0])
            .map_err(|e| e.into_invalid())?;
        Ok(Graph::PyTorch(Arc::new(TorchGraph { module })))
    }

    fn init_execution_context(&self, graph: &Graph) -> NnResult<ExecutionContext> {
        let Graph::PyTorch(graph) = graph else {
            return Err(NnError::BackendMismatch {
                expected: Backend::PyTorch,
                actual: graph.backend(),
            });
        };
        Ok(ExecutionContext::PyTorch(TorchContext {
            graph: Arc::clone(graph),
            inputs: Vec::new(),
            outputs: None,
        }))
    }

    fn set_input(&self, ctx: &mut ExecutionContext, index: u32, tensor: &Tensor<'_>) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        let slot = check_index(index, self.max_input_slots as usize, "PyTorch input")?;
        tensor.require_f32()?;
        tensor.require_exact_len()?;

        if ctx.inputs.len() <= slot {
            ctx.inputs.resize(slot + 1, None);
        }
        ctx.inputs[slot] = Some(TorchTensor {
            kind: TorchKind::from_tensor_type(tensor.ty),
            dims: tensor.dims_i64(),
            data: tensor.data.to_vec(),
        });
        Ok(())
    }

    fn compute(&self, ctx: &mut ExecutionContext) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        if ctx.inputs.is_empty() {
            return Err(NnError::invalid("PyTorch compute called with no inputs set"));
        }
        let inputs = ctx
            .inputs
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.clone()
                    .ok_or_else(|| NnError::invalid(format!("PyTorch input {} is not set", i)))
            })
            .collect::<NnResult<Vec<_>>>()?;

        let outputs = match ctx.graph.module.forward(&inputs).map_err(|e| e.into_busy())? {
            TorchOutput::Tensor(tensor) => vec![tensor],
            TorchOutput::TensorList(list) => list,
            TorchOutput::Other(what) => {
                return Err(NnError::invalid(format!(
                    "PyTorch forward returned {}, expected a tensor or tensor list",
                    what
                )))
            }
        };
        ctx.outputs = Some(outputs);
        Ok(())
    }

    fn get_output(&self, ctx: &mut ExecutionContext, index: u32, out: &mut [u8]) -> NnResult<u32> {
        let ctx = self.context(ctx)?;
        let outputs = ctx
            .outputs
            .as_ref()
            .ok_or_else(|| NnError::invalid("get_output called before compute"))?;
        let slot = check_index(index, outputs.len(), "PyTorch output")?;
        copy_output(Backend::PyTorch, index, &outputs[slot].data, out)
    }
}
