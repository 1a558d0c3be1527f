// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! OpenVINO adapter.
//!
//! A graph is an XML topology plus a binary weights buffer, compiled for the
//! CPU device. Inputs and outputs are addressed by the network's own port
//! order. Each execution context owns one infer request.

#[cfg(feature = "openvino")]
pub mod native;

use std::sync::Arc;

use crate::backends::{check_index, copy_output, NnBackend};
use crate::config::consts::MAX_INPUT_BLOB_BYTES;
use crate::errors::{EngineResult, NnError, NnResult};
use crate::nn::tensor::require_builder_count;
use crate::nn::{cpu_device, Backend, ExecutionContext, ExecutionTarget, Graph, Tensor, TensorType};
use crate::observability::messages::nn::InputSizeMismatch;

/// Entry point of the OpenVINO runtime.
pub trait OpenVinoEngine: Send + Sync {
    fn read_network(&self, xml: &[u8], weights: Blob) -> EngineResult<Box<dyn OpenVinoNetwork>>;
}

/// A parsed, not yet compiled, network.
pub trait OpenVinoNetwork: Send + Sync {
    fn input_names(&self) -> EngineResult<Vec<String>>;
    fn output_names(&self) -> EngineResult<Vec<String>>;
    fn compile(&self, device: &str) -> EngineResult<Box<dyn OpenVinoExecutable>>;
}

/// A network compiled for one device.
pub trait OpenVinoExecutable: Send + Sync {
    fn create_infer_request(&self) -> EngineResult<Box<dyn OpenVinoInferRequest>>;
}

pub trait OpenVinoInferRequest: Send {
    fn set_blob(&mut self, name: &str, blob: &Blob) -> EngineResult<()>;
    fn infer(&mut self) -> EngineResult<()>;
    fn output_blob(&mut self, name: &str) -> EngineResult<Blob>;
}

/// Native element precisions the adapter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp32,
    Fp16,
    U8,
    I32,
    I64,
}

impl Precision {
    pub fn from_tensor_type(ty: TensorType) -> Self {
        match ty {
            TensorType::F32 => Precision::Fp32,
            TensorType::F16 => Precision::Fp16,
            TensorType::U8 => Precision::U8,
            TensorType::I32 => Precision::I32,
        }
    }

    /// `None` for precisions with no wasi-nn tensor type.
    pub fn to_tensor_type(self) -> Option<TensorType> {
        match self {
            Precision::Fp32 => Some(TensorType::F32),
            Precision::Fp16 => Some(TensorType::F16),
            Precision::U8 => Some(TensorType::U8),
            Precision::I32 => Some(TensorType::I32),
            Precision::I64 => None,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            Precision::Fp32 | Precision::I32 => 4,
            Precision::Fp16 => 2,
            Precision::U8 => 1,
            Precision::I64 => 8,
        }
    }
}

/// Host-owned tensor exchanged with the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub precision: Precision,
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

impl Blob {
    /// One-dimensional U8 blob holding a copy of `bytes`.
    pub fn weights(bytes: &[u8]) -> Self {
        Self {
            precision: Precision::U8,
            dims: vec![bytes.len()],
            data: bytes.to_vec(),
        }
    }

    /// Byte size of a blob with this precision and shape, `None` on overflow.
    pub fn byte_len(precision: Precision, dims: &[usize]) -> Option<usize> {
        dims.iter()
            .try_fold(precision.element_size(), |acc, &dim| acc.checked_mul(dim))
    }
}

pub struct OpenVinoGraph {
    executable: Box<dyn OpenVinoExecutable>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl OpenVinoGraph {
    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

pub struct OpenVinoContext {
    graph: Arc<OpenVinoGraph>,
    request: Box<dyn OpenVinoInferRequest>,
    bound: Vec<bool>,
    computed: bool,
}

pub struct OpenVinoBackend {
    engine: Box<dyn OpenVinoEngine>,
}

impl OpenVinoBackend {
    pub fn new(engine: Box<dyn OpenVinoEngine>) -> Self {
        Self { engine }
    }

    fn context<'c>(&self, ctx: &'c mut ExecutionContext) -> NnResult<&'c mut OpenVinoContext> {
        match ctx {
            ExecutionContext::OpenVino(ctx) => Ok(ctx),
            other => Err(NnError::BackendMismatch {
                expected: Backend::OpenVino,
                actual: other.backend(),
            }),
        }
    }

    /// FP32 blob shaped like `tensor`. A data length that does not match the
    /// shape is logged; the copy is clamped and the rest left zeroed.
    ///
    /// The blob is sized from the declared shape, not from the data, so the
    /// shape is capped at [`MAX_INPUT_BLOB_BYTES`] before anything is allocated.
    fn input_blob(index: u32, tensor: &Tensor<'_>) -> NnResult<Blob> {
        let dims = tensor.dims_usize();
        let size = Blob::byte_len(Precision::Fp32, &dims)
            .filter(|&size| size <= MAX_INPUT_BLOB_BYTES)
            .ok_or_else(|| {
                NnError::invalid(format!(
                    "tensor shape {:?} exceeds the {} byte input limit",
                    dims, MAX_INPUT_BLOB_BYTES
                ))
            })?;

        if size != tensor.data.len() {
            tracing::warn!(
                "{}",
                InputSizeMismatch {
                    backend: Backend::OpenVino,
                    index,
                    expected: size,
                    actual: tensor.data.len(),
                }
            );
        }

        let mut data = vec![0u8; size];
        let copied = size.min(tensor.data.len());
        data[..copied].copy_from_slice(&tensor.data[..copied]);

        Ok(Blob {
            precision: Precision::Fp32,
            dims,
            data,
        })
    }
}

impl NnBackend for OpenVinoBackend {
    fn kind(&self) -> Backend {
        Backend::OpenVino
    }

    fn load(&self, builders: &[&[u8]], target: ExecutionTarget) -> NnResult<Graph> {
        require_builder_count(builders, 2, "OpenVINO")?;
        let device = cpu_device(target)?;
        let (xml, weights) = (builders[0], builders[1]);

        let network = self
            .engine
            .read_network(xml, Blob::weights(weights))
            .map_err(|e| e.into_busy())?;
        let inputs = network.input_names().map_err(|e| e.into_missing())?;
        let outputs = network.output_names().map_err(|e| e.into_missing())?;
        let executable = network.compile(device).map_err(|e| e.into_busy())?;

        Ok(Graph::OpenVino(Arc::new(OpenVinoGraph {
            executable,
            inputs,
            outputs,
        })))
    }

    fn init_execution_context(&self, graph: &Graph) -> NnResult<ExecutionContext> {
        let Graph::OpenVino(graph) = graph else {
            return Err(NnError::BackendMismatch {
                expected: Backend::OpenVino,
                actual: graph.backend(),
            });
        };
        let request = graph
            .executable
            .create_infer_request()
            .map_err(|e| e.into_busy())?;

        Ok(ExecutionContext::OpenVino(OpenVinoContext {
            bound: vec![false; graph.inputs.len()],
            graph: Arc::clone(graph),
            request,
            computed: false,
        }))
    }

    fn set_input(&self, ctx: &mut ExecutionContext, index: u32, tensor: &Tensor<'_>) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        let slot = check_index(index, ctx.graph.inputs.len(), "OpenVINO input")?;
        tensor.require_f32()?;

        let blob = Self::input_blob(index, tensor)?;
        ctx.request
            .set_blob(&ctx.graph.inputs[slot], &blob)
            .map_err(|e| e.into_busy())?;
        ctx.bound[slot] = true;
        Ok(())
    }

    fn compute(&self, ctx: &mut ExecutionContext) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        if let Some(missing) = ctx.bound.iter().position(|bound| !bound) {
            return Err(NnError::invalid(format!(
                "OpenVINO input {} ('{}') is not set",
                missing, ctx.graph.inputs[missing]
            )));
        }
        ctx.request.infer().map_err(|e| e.into_busy())?;
        ctx.computed = true;
        Ok(())
    }

    fn get_output(&self, ctx: &mut ExecutionContext, index: u32, out: &mut [u8]) -> NnResult<u32> {
        let ctx = self.context(ctx)?;
        if !ctx.computed {
            return Err(NnError::invalid("get_output called before compute"));
        }
        let slot = check_index(index, ctx.graph.outputs.len(), "OpenVINO output")?;
        let blob = ctx
            .request
            .output_blob(&ctx.graph.outputs[slot])
            .map_err(|e| e.into_invalid())?;
        copy_output(Backend::OpenVino, index, &blob.data, out)
    }
}
