// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tensorflow (SavedModel) adapter.
//!
//! The three graph builders are the `saved_model.pb` bytes, the tag-set name
//! and the signature name. The engine only loads SavedModels from disk, so the
//! bytes are written into a scoped temporary export directory that is removed
//! as soon as loading returns.
//!
//! Signature inputs and outputs are addressed by index into their tensor
//! names sorted lexicographically; the SavedModel format gives no order.

#[cfg(feature = "tensorflow")]
pub mod native;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::backends::{check_index, copy_output, NnBackend};
use crate::config::consts::DEFAULT_TF_TEMP_DIR_PREFIX;
use crate::errors::{EngineResult, NnError, NnResult};
use crate::nn::tensor::require_builder_count;
use crate::nn::{cpu_device, Backend, ExecutionContext, ExecutionTarget, Graph, Tensor, TensorType};
use crate::observability::messages::nn::ExportDirectoryCreated;

/// File name the engine looks for inside an export directory.
pub const SAVED_MODEL_FILE: &str = "saved_model.pb";

pub trait TensorflowEngine: Send + Sync {
    /// Loads the SavedModel in `export_dir` with the given tag set.
    fn load_saved_model(&self, export_dir: &Path, tags: &[&str]) -> EngineResult<Box<dyn TfSavedModel>>;
}

pub trait TfSavedModel: Send + Sync {
    fn signature(&self, name: &str) -> Option<TfSignature>;

    /// Runs the session, feeding and fetching tensors by name. Results come
    /// back in `fetches` order.
    fn run(&self, feeds: &[(&str, &TfTensor)], fetches: &[&str]) -> EngineResult<Vec<TfTensor>>;
}

/// Tensor names declared by one signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TfSignature {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfDataType {
    Float,
    Half,
    UInt8,
    Int32,
    Double,
}

impl TfDataType {
    pub fn from_tensor_type(ty: TensorType) -> Self {
        match ty {
            TensorType::F32 => TfDataType::Float,
            TensorType::F16 => TfDataType::Half,
            TensorType::U8 => TfDataType::UInt8,
            TensorType::I32 => TfDataType::Int32,
        }
    }

    pub fn to_tensor_type(self) -> Option<TensorType> {
        match self {
            TfDataType::Float => Some(TensorType::F32),
            TfDataType::Half => Some(TensorType::F16),
            TfDataType::UInt8 => Some(TensorType::U8),
            TfDataType::Int32 => Some(TensorType::I32),
            TfDataType::Double => None,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TfDataType::Float | TfDataType::Int32 => 4,
            TfDataType::Half => 2,
            TfDataType::UInt8 => 1,
            TfDataType::Double => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfTensor {
    pub dtype: TfDataType,
    pub dims: Vec<u64>,
    pub data: Vec<u8>,
}

pub struct TfGraph {
    model: Box<dyn TfSavedModel>,
    signature: String,
}

pub struct TfContext {
    graph: Arc<TfGraph>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    feeds: Vec<Option<TfTensor>>,
    results: Option<Vec<TfTensor>>,
}

impl TfContext {
    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

pub struct TensorflowBackend {
    engine: Box<dyn TensorflowEngine>,
    temp_dir_prefix: String,
}

impl TensorflowBackend {
    pub fn new(engine: Box<dyn TensorflowEngine>, temp_dir_prefix: impl Into<String>) -> Self {
        Self {
            engine,
            temp_dir_prefix: temp_dir_prefix.into(),
        }
    }

    pub fn with_default_prefix(engine: Box<dyn TensorflowEngine>) -> Self {
        Self::new(engine, DEFAULT_TF_TEMP_DIR_PREFIX)
    }

    fn context<'c>(&self, ctx: &'c mut ExecutionContext) -> NnResult<&'c mut TfContext> {
        match ctx {
            ExecutionContext::Tensorflow(ctx) => Ok(ctx),
            other => Err(NnError::BackendMismatch {
                expected: Backend::Tensorflow,
                actual: other.backend(),
            }),
        }
    }

    fn utf8<'b>(bytes: &'b [u8], what: &str) -> NnResult<&'b str> {
        std::str::from_utf8(bytes)
            .map_err(|e| NnError::invalid(format!("Tensorflow {} is not UTF-8: {}", what, e)))
    }

    /// Writes the model into a fresh export directory and loads it. The
    /// directory is gone by the time this returns, whatever the outcome.
    fn load_from_export(&self, saved_model: &[u8], tags: &[&str]) -> NnResult<Box<dyn TfSavedModel>> {
        let export = tempfile::Builder::new()
            .prefix(&self.temp_dir_prefix)
            .tempdir()
            .map_err(|e| NnError::invalid(format!("cannot create Tensorflow export directory: {}", e)))?;
        tracing::debug!("{}", ExportDirectoryCreated { path: export.path() });

        let model_path = export.path().join(SAVED_MODEL_FILE);
        fs::write(&model_path, saved_model)
            .map_err(|e| NnError::invalid(format!("cannot write {}: {}", model_path.display(), e)))?;
        if !model_path.is_file() {
            return Err(NnError::invalid(format!(
                "no SavedModel export at {}",
                model_path.display()
            )));
        }

        self.engine
            .load_saved_model(export.path(), tags)
            .map_err(|e| e.into_busy())
    }
}

impl NnBackend for TensorflowBackend {
    fn kind(&self) -> Backend {
        Backend::Tensorflow
    }

    fn load(&self, builders: &[&[u8]], target: ExecutionTarget) -> NnResult<Graph> {
        require_builder_count(builders, 3, "Tensorflow")?;
        cpu_device(target)?;

        let tag = Self::utf8(builders[1], "tag set")?;
        let signature = Self::utf8(builders[2], "signature")?;
        let tags: Vec<&str> = if tag.is_empty() { Vec::new() } else { vec![tag] };

        let model = self.load_from_export(builders[0], &tags)?;
        Ok(Graph::Tensorflow(Arc::new(TfGraph {
            model,
            signature: signature.to_string(),
        })))
    }

    fn init_execution_context(&self, graph: &Graph) -> NnResult<ExecutionContext> {
        let Graph::Tensorflow(graph) = graph else {
            return Err(NnError::BackendMismatch {
                expected: Backend::Tensorflow,
                actual: graph.backend(),
            });
        };
        let TfSignature {
            mut inputs,
            mut outputs,
        } = graph.model.signature(&graph.signature).ok_or_else(|| {
            NnError::invalid(format!("signature '{}' not found in model", graph.signature))
        })?;
        inputs.sort();
        outputs.sort();

        Ok(ExecutionContext::Tensorflow(TfContext {
            graph: Arc::clone(graph),
            feeds: vec![None; inputs.len()],
            inputs,
            outputs,
            results: None,
        }))
    }

    fn set_input(&self, ctx: &mut ExecutionContext, index: u32, tensor: &Tensor<'_>) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        let slot = check_index(index, ctx.inputs.len(), "Tensorflow input")?;
        tensor.require_f32()?;
        tensor.require_exact_len()?;

        ctx.feeds[slot] = Some(TfTensor {
            dtype: TfDataType::from_tensor_type(tensor.ty),
            dims: tensor.dims.iter().map(|&d| u64::from(d)).collect(),
            data: tensor.data.to_vec(),
        });
        Ok(())
    }

    fn compute(&self, ctx: &mut ExecutionContext) -> NnResult<()> {
        let ctx = self.context(ctx)?;
        let feeds = ctx
            .inputs
            .iter()
            .zip(&ctx.feeds)
            .map(|(name, feed)| {
                feed.as_ref()
                    .map(|tensor| (name.as_str(), tensor))
                    .ok_or_else(|| NnError::invalid(format!("Tensorflow input '{}' is not set", name)))
            })
            .collect::<NnResult<Vec<_>>>()?;
        let fetches: Vec<&str> = ctx.outputs.iter().map(String::as_str).collect();

        let results = ctx
            .graph
            .model
            .run(&feeds, &fetches)
            .map_err(|e| e.into_busy())?;
        ctx.results = Some(results);
        Ok(())
    }

    fn get_output(&self, ctx: &mut ExecutionContext, index: u32, out: &mut [u8]) -> NnResult<u32> {
        let ctx = self.context(ctx)?;
        let results = ctx
            .results
            .as_ref()
            .ok_or_else(|| NnError::invalid("get_output called before compute"))?;
        let slot = check_index(index, results.len(), "Tensorflow output")?;
        copy_output(Backend::Tensorflow, index, &results[slot].data, out)
    }
}
