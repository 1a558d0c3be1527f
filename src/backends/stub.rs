// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory engines for every backend seam.
//!
//! Each stub behaves as an identity model (outputs echo inputs) and can be
//! told to fail at one named step. Probes share state with the stub so a test
//! can observe what the adapter asked of the engine after handing the stub
//! over.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backends::openvino::{
    Blob, OpenVinoBackend, OpenVinoEngine, OpenVinoExecutable, OpenVinoInferRequest, OpenVinoNetwork,
};
use crate::backends::pytorch::{PyTorchBackend, TorchEngine, TorchModule, TorchOutput, TorchTensor};
use crate::backends::tensorflow::{
    TensorflowBackend, TensorflowEngine, TfSavedModel, TfSignature, TfTensor, SAVED_MODEL_FILE,
};
use crate::backends::tflite::{TfLiteBackend, TfLiteEngine, TfLiteInterpreter, TfLiteModel, TfLiteType};
use crate::backends::{BackendSet, NnBackend};
use crate::config::consts::DEFAULT_TORCH_INPUT_SLOTS;
use crate::errors::{EngineError, EngineResult};
use crate::nn::{ExecutionContext, ExecutionTarget};

/// Signature name the Tensorflow stub answers to.
pub const STUB_SIGNATURE: &str = "serving_default";

fn fail_if<F: PartialEq>(failure: Option<F>, step: F, operation: &'static str) -> EngineResult<()> {
    if failure == Some(step) {
        Err(EngineError::new(operation, "injected failure"))
    } else {
        Ok(())
    }
}

/// Shared counter readable after the stub has been boxed.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// OpenVINO

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenVinoFailure {
    ReadNetwork,
    QueryNames,
    Compile,
    CreateRequest,
    SetBlob,
    Infer,
    GetBlob,
}

pub struct StubOpenVino {
    inputs: Vec<String>,
    outputs: Vec<String>,
    failure: Option<OpenVinoFailure>,
    calls: CallCounter,
}

impl StubOpenVino {
    /// Every output returns whatever blob was bound to the first input.
    pub fn identity(inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            failure: None,
            calls: CallCounter::default(),
        }
    }

    pub fn failing(mut self, failure: OpenVinoFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Counts `read_network` calls.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl OpenVinoEngine for StubOpenVino {
    fn read_network(&self, _xml: &[u8], _weights: Blob) -> EngineResult<Box<dyn OpenVinoNetwork>> {
        self.calls.bump();
        fail_if(self.failure, OpenVinoFailure::ReadNetwork, "read network")?;
        Ok(Box::new(StubNetwork {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            failure: self.failure,
        }))
    }
}

struct StubNetwork {
    inputs: Vec<String>,
    outputs: Vec<String>,
    failure: Option<OpenVinoFailure>,
}

impl OpenVinoNetwork for StubNetwork {
    fn input_names(&self) -> EngineResult<Vec<String>> {
        fail_if(self.failure, OpenVinoFailure::QueryNames, "query inputs")?;
        Ok(self.inputs.clone())
    }

    fn output_names(&self) -> EngineResult<Vec<String>> {
        fail_if(self.failure, OpenVinoFailure::QueryNames, "query outputs")?;
        Ok(self.outputs.clone())
    }

    fn compile(&self, _device: &str) -> EngineResult<Box<dyn OpenVinoExecutable>> {
        fail_if(self.failure, OpenVinoFailure::Compile, "compile network")?;
        Ok(Box::new(StubExecutable {
            first_input: self.inputs.first().cloned(),
            failure: self.failure,
        }))
    }
}

struct StubExecutable {
    first_input: Option<String>,
    failure: Option<OpenVinoFailure>,
}

impl OpenVinoExecutable for StubExecutable {
    fn create_infer_request(&self) -> EngineResult<Box<dyn OpenVinoInferRequest>> {
        fail_if(self.failure, OpenVinoFailure::CreateRequest, "create infer request")?;
        Ok(Box::new(StubInferRequest {
            first_input: self.first_input.clone(),
            failure: self.failure,
            bound: None,
            result: None,
        }))
    }
}

struct StubInferRequest {
    first_input: Option<String>,
    failure: Option<OpenVinoFailure>,
    bound: Option<Blob>,
    result: Option<Blob>,
}

impl OpenVinoInferRequest for StubInferRequest {
    fn set_blob(&mut self, name: &str, blob: &Blob) -> EngineResult<()> {
        fail_if(self.failure, OpenVinoFailure::SetBlob, "set blob")?;
        if self.first_input.as_deref() == Some(name) {
            self.bound = Some(blob.clone());
        }
        Ok(())
    }

    fn infer(&mut self) -> EngineResult<()> {
        fail_if(self.failure, OpenVinoFailure::Infer, "infer")?;
        self.result = self.bound.clone();
        Ok(())
    }

    fn output_blob(&mut self, _name: &str) -> EngineResult<Blob> {
        fail_if(self.failure, OpenVinoFailure::GetBlob, "get blob")?;
        self.result
            .clone()
            .ok_or_else(|| EngineError::new("get blob", "no inference result"))
    }
}

// PyTorch

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchFailure {
    Load,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorchReturn {
    First,
    List,
    Other,
}

/// Flips a loaded stub module into failing `forward`.
#[derive(Clone, Default)]
pub struct ForwardSwitch(Arc<AtomicBool>);

impl ForwardSwitch {
    pub fn fail(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn failed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StubTorch {
    returns: TorchReturn,
    failure: Option<TorchFailure>,
    switch: ForwardSwitch,
}

impl StubTorch {
    /// `forward` returns its first input.
    pub fn identity() -> Self {
        Self {
            returns: TorchReturn::First,
            failure: None,
            switch: ForwardSwitch::default(),
        }
    }

    /// `forward` returns all inputs as a tensor list.
    pub fn returning_list(mut self) -> Self {
        self.returns = TorchReturn::List;
        self
    }

    /// `forward` returns something that is not a tensor.
    pub fn returning_other(mut self) -> Self {
        self.returns = TorchReturn::Other;
        self
    }

    pub fn failing(mut self, failure: TorchFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn forward_switch(&self) -> ForwardSwitch {
        self.switch.clone()
    }
}

impl TorchEngine for StubTorch {
    fn load_module(&self, _archive: &[u8]) -> EngineResult<Box<dyn TorchModule>> {
        fail_if(self.failure, TorchFailure::Load, "load TorchScript module")?;
        Ok(Box::new(StubTorchModule {
            returns: self.returns,
            failure: self.failure,
            switch: self.switch.clone(),
        }))
    }
}

struct StubTorchModule {
    returns: TorchReturn,
    failure: Option<TorchFailure>,
    switch: ForwardSwitch,
}

impl TorchModule for StubTorchModule {
    fn forward(&self, inputs: &[TorchTensor]) -> EngineResult<TorchOutput> {
        fail_if(self.failure, TorchFailure::Forward, "forward")?;
        if self.switch.failed() {
            return Err(EngineError::new("forward", "switched off"));
        }
        match self.returns {
            TorchReturn::First => inputs
                .first()
                .cloned()
                .map(TorchOutput::Tensor)
                .ok_or_else(|| EngineError::new("forward", "no inputs")),
            TorchReturn::List => Ok(TorchOutput::TensorList(inputs.to_vec())),
            TorchReturn::Other => Ok(TorchOutput::Other("a tuple".to_string())),
        }
    }
}

pub fn torch_backend(engine: StubTorch) -> Box<dyn NnBackend> {
    Box::new(PyTorchBackend::new(Box::new(engine), DEFAULT_TORCH_INPUT_SLOTS))
}

/// A live PyTorch context, for feeding adapters a context they do not own.
pub fn torch_context() -> ExecutionContext {
    let backend = torch_backend(StubTorch::identity());
    let graph = backend
        .load(&[b"torchscript".as_slice()], ExecutionTarget::Cpu)
        .expect("stub load");
    backend.init_execution_context(&graph).expect("stub context")
}

// Tensorflow

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorflowFailure {
    Load,
    Run,
}

/// What the stub saw in one `load_saved_model` call.
#[derive(Debug, Clone)]
pub struct ExportSeen {
    pub dir: PathBuf,
    pub model: Vec<u8>,
    pub tags: Vec<String>,
}

#[derive(Clone, Default)]
pub struct ExportProbe(Arc<Mutex<Vec<ExportSeen>>>);

impl ExportProbe {
    pub fn last(&self) -> Option<ExportSeen> {
        self.0.lock().ok()?.last().cloned()
    }

    fn record(&self, seen: ExportSeen) {
        if let Ok(mut seen_all) = self.0.lock() {
            seen_all.push(seen);
        }
    }
}

pub struct StubTensorflow {
    signature: TfSignature,
    failure: Option<TensorflowFailure>,
    probe: ExportProbe,
}

impl StubTensorflow {
    /// Signature [`STUB_SIGNATURE`] with the given tensor names. `run`
    /// returns feed `i` as fetch `i`.
    pub fn identity(inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            signature: TfSignature {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
            },
            failure: None,
            probe: ExportProbe::default(),
        }
    }

    pub fn failing(mut self, failure: TensorflowFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn export_probe(&self) -> ExportProbe {
        self.probe.clone()
    }
}

impl TensorflowEngine for StubTensorflow {
    fn load_saved_model(&self, export_dir: &Path, tags: &[&str]) -> EngineResult<Box<dyn TfSavedModel>> {
        let model = std::fs::read(export_dir.join(SAVED_MODEL_FILE))
            .map_err(|e| EngineError::from_native("read export", e))?;
        self.probe.record(ExportSeen {
            dir: export_dir.to_path_buf(),
            model,
            tags: tags.iter().map(|s| s.to_string()).collect(),
        });
        fail_if(self.failure, TensorflowFailure::Load, "load SavedModel")?;
        Ok(Box::new(StubSavedModel {
            signature: self.signature.clone(),
            failure: self.failure,
        }))
    }
}

struct StubSavedModel {
    signature: TfSignature,
    failure: Option<TensorflowFailure>,
}

impl TfSavedModel for StubSavedModel {
    fn signature(&self, name: &str) -> Option<TfSignature> {
        (name == STUB_SIGNATURE).then(|| self.signature.clone())
    }

    fn run(&self, feeds: &[(&str, &TfTensor)], fetches: &[&str]) -> EngineResult<Vec<TfTensor>> {
        fail_if(self.failure, TensorflowFailure::Run, "run session")?;
        (0..fetches.len())
            .map(|i| {
                feeds
                    .get(i)
                    .map(|(_, tensor)| (*tensor).clone())
                    .ok_or_else(|| EngineError::new("run session", format!("nothing feeds output {}", i)))
            })
            .collect()
    }
}

// TensorflowLite

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfLiteFailure {
    CreateModel,
    CreateInterpreter,
    AllocateTensors,
    Invoke,
}

/// Number of interpreters created so far.
#[derive(Clone, Default)]
pub struct InterpreterProbe(Arc<AtomicU32>);

impl InterpreterProbe {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StubTfLite {
    elements: usize,
    input_type: TfLiteType,
    failure: Option<TfLiteFailure>,
    interpreters: InterpreterProbe,
}

impl StubTfLite {
    /// One float32 input of `elements` values, echoed to the single output.
    pub fn identity(elements: usize) -> Self {
        Self {
            elements,
            input_type: TfLiteType::Float32,
            failure: None,
            interpreters: InterpreterProbe::default(),
        }
    }

    pub fn with_input_type(mut self, input_type: TfLiteType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn failing(mut self, failure: TfLiteFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn interpreter_probe(&self) -> InterpreterProbe {
        self.interpreters.clone()
    }
}

impl TfLiteEngine for StubTfLite {
    fn create_model(&self, _flatbuffer: &[u8]) -> EngineResult<Box<dyn TfLiteModel>> {
        fail_if(self.failure, TfLiteFailure::CreateModel, "create model")?;
        Ok(Box::new(StubTfLiteModel {
            elements: self.elements,
            input_type: self.input_type,
            failure: self.failure,
            interpreters: self.interpreters.clone(),
        }))
    }
}

struct StubTfLiteModel {
    elements: usize,
    input_type: TfLiteType,
    failure: Option<TfLiteFailure>,
    interpreters: InterpreterProbe,
}

impl TfLiteModel for StubTfLiteModel {
    fn create_interpreter(&self) -> EngineResult<Box<dyn TfLiteInterpreter>> {
        fail_if(self.failure, TfLiteFailure::CreateInterpreter, "create interpreter")?;
        self.interpreters.0.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubInterpreter {
            byte_len: self.elements * 4,
            input_type: self.input_type,
            failure: self.failure,
            input: None,
            output: None,
        }))
    }
}

struct StubInterpreter {
    byte_len: usize,
    input_type: TfLiteType,
    failure: Option<TfLiteFailure>,
    input: Option<Vec<u8>>,
    output: Option<Vec<u8>>,
}

impl TfLiteInterpreter for StubInterpreter {
    fn allocate_tensors(&mut self) -> EngineResult<()> {
        fail_if(self.failure, TfLiteFailure::AllocateTensors, "allocate tensors")
    }

    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        1
    }

    fn input_type(&self, _index: usize) -> EngineResult<TfLiteType> {
        Ok(self.input_type)
    }

    fn copy_to_input(&mut self, _index: usize, data: &[u8]) -> EngineResult<()> {
        if data.len() != self.byte_len {
            return Err(EngineError::new(
                "copy input",
                format!("input needs {} bytes, got {}", self.byte_len, data.len()),
            ));
        }
        self.input = Some(data.to_vec());
        Ok(())
    }

    fn invoke(&mut self) -> EngineResult<()> {
        fail_if(self.failure, TfLiteFailure::Invoke, "invoke")?;
        self.output = self.input.clone();
        Ok(())
    }

    fn output_data(&self, _index: usize) -> EngineResult<&[u8]> {
        self.output
            .as_deref()
            .ok_or_else(|| EngineError::new("read output", "not invoked"))
    }
}

/// A set with an identity stub registered for every backend.
///
/// OpenVINO: input `input`, output `output`. Tensorflow: signature
/// [`STUB_SIGNATURE`] with `x:0` -> `y:0`. TensorflowLite: 4 float32 values.
pub fn identity_set() -> BackendSet {
    let mut set = BackendSet::empty();
    set.register(Box::new(OpenVinoBackend::new(Box::new(StubOpenVino::identity(
        &["input"],
        &["output"],
    )))));
    set.register(torch_backend(StubTorch::identity()));
    set.register(Box::new(TensorflowBackend::with_default_prefix(Box::new(
        StubTensorflow::identity(&["x:0"], &["y:0"]),
    ))));
    set.register(Box::new(TfLiteBackend::new(Box::new(StubTfLite::identity(4)))));
    set
}
