// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! TensorflowLite adapter.
//!
//! The graph holds the parsed flatbuffer; every execution context gets its own
//! interpreter with tensors already allocated. Interpreters run on the calling
//! thread.

#[cfg(feature = "tflite")]
pub mod native;

use std::sync::Arc;

use crate::backends::{check_index, copy_output, NnBackend};
use crate::errors::{EngineResult, NnError, NnResult};
use crate::nn::tensor::require_builder_count;
use crate::nn::{cpu_device, Backend, ExecutionContext, ExecutionTarget, Graph, Tensor, TensorType};

pub trait TfLiteEngine: Send + Sync {
    fn create_model(&self, flatbuffer: &[u8]) -> EngineResult<Box<dyn TfLiteModel>>;
}

pub trait TfLiteModel: Send + Sync {
    fn create_interpreter(&self) -> EngineResult<Box<dyn TfLiteInterpreter>>;
}

pub trait TfLiteInterpreter: Send {
    fn allocate_tensors(&mut self) -> EngineResult<()>;
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn input_type(&self, index: usize) -> EngineResult<TfLiteType>;
    /// Fails when `data` does not fill the input tensor exactly.
    fn copy_to_input(&mut self, index: usize, data: &[u8]) -> EngineResult<()>;
    fn invoke(&mut self) -> EngineResult<()>;
    fn output_data(&self, index: usize) -> EngineResult<&[u8]>;
}

/// TFLite tensor element types the adapter can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfLiteType {
    Float32,
    Float16,
    UInt8,
    Int32,
    Int64,
}

impl TfLiteType {
    pub fn from_tensor_type(ty: TensorType) -> Self {
        match ty {
            TensorType::F32 => TfLiteType::Float32,
            TensorType::F16 => TfLiteType::Float16,
            TensorType::U8 => TfLiteType::UInt8,
            TensorType::I32 => TfLiteType::Int32,
        }
    }

    pub fn to_tensor_type(self) -> Option<TensorType> {
        match self {
            TfLiteType::Float32 => Some(TensorType::F32),
            TfLiteType::Float16 => Some(TensorType::F16),
            TfLiteType::UInt8 => Some(TensorType::U8),
            TfLiteType::Int32 => Some(TensorType::I32),
            TfLiteType::Int64 => None,
        }
    }
}

pub struct TfLiteGraph {
    model: Box<dyn TfLiteModel>,
}

pub struct TfLiteContext {
    interpreter: Box<dyn TfLiteInterpreter>,
    bound: Vec<bool>,
    computed: bool,
}

pub struct TfLiteBackend {
    engine: Box<dyn TfLiteEngine>,
}

impl TfLiteBackend {
    pub fn new(engine: Box<dyn TfLiteEngine>) -> Self {
        Self { engine }
    }

    fn context<'c>(&self, ctx: &'c mut ExecutionContext) -> NnResult<&'c mut TfLiteContext> {
        match ctx {
            ExecutionContext::TensorflowLite(ctx) => Ok(ctx),
            other => Err(NnError::BackendMismatch {
                expected: Backend::TensorflowLite,
                actual: other.backend(),
            }),
        }
    }
}

impl NnBackend for TfLiteBackend {
    fn kind(&self) -> Backend {
        Backend::TensorflowLite
    }

    fn load(&self, builders: &[&[u8]], target: ExecutionTarget) -> NnResult<Graph> {
        require_builder_count(builders, 1, "TensorflowLite")?;
        cpu_device(target)?;

        let model = self
            .engine
            .create_model(builders[0])
            .map_err(|e| e.into_invalid())?;
        Ok(Graph::TensorflowLite(Arc::new(TfLiteGraph { model })))
    }

    fn init_execution_context(&self, graph: &Graph) -> NnResult<ExecutionContext> {
        let Graph::TensorflowLite(graph) = graph else {
            return Err(NnError::BackendMismatch {
                expected: Backend::TensorflowLite,
                actual: graph.backend(),
            });
        };
        let mut interpreter = graph
            .model
            .create_interpreter()
            .map_err(|e| e.into_busy())?;
        interpreter.allocate_tensors().map_err(|e| e.into_busy())?;

        Ok(ExecutionContext::TensorflowLite(TfLiteContext {
            bound: vec![false; interpreter.input_count()],
            interpreter,
            computed: false,
        }))
    }

    fn set_input(&self, ctx: &mut ExecutionContext, index: u32, tensor: &Tensor<'_>) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        let slot = check_index(index, ctx.interpreter.input_count(), "TensorflowLite input")?;
        tensor.require_f32()?;

        let declared = ctx.interpreter.input_type(slot).map_err(|e| e.into_busy())?;
        match declared.to_tensor_type() {
            Some(ty) if ty == tensor.ty => {}
            Some(ty) => {
                return Err(NnError::invalid(format!(
                    "TensorflowLite input {} is {:?} but the tensor is {:?}",
                    slot, ty, tensor.ty
                )))
            }
            None => {
                return Err(NnError::invalid(format!(
                    "TensorflowLite input {} has unsupported type {:?}",
                    slot, declared
                )))
            }
        }

        ctx.interpreter
            .copy_to_input(slot, tensor.data)
            .map_err(|e| e.into_busy())?;
        ctx.bound[slot] = true;
        Ok(())
    }

    fn compute(&self, ctx: &mut ExecutionContext) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        if let Some(missing) = ctx.bound.iter().position(|bound| !bound) {
            return Err(NnError::invalid(format!(
                "TensorflowLite input {} is not set",
                missing
            )));
        }
        ctx.interpreter.invoke().map_err(|e| e.into_busy())?;
        ctx.computed = true;
        Ok(())
    }

    fn get_output(&self, ctx: &mut ExecutionContext, index: u32, out: &mut [u8]) -> NnResult<u32> {
        let ctx = self.context(ctx)?;
        if !ctx.computed {
            return Err(NnError::invalid("get_output called before compute"));
        }
        let slot = check_index(index, ctx.interpreter.output_count(), "TensorflowLite output")?;
        let data = ctx.interpreter.output_data(slot).map_err(|e| e.into_busy())?;
        copy_output(Backend::TensorflowLite, index, data, out)
    }
}
