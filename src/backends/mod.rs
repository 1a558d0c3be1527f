// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Inference backend adapters for the wasi-nn host.
//!
//! Each adapter implements [`NnBackend`] for one engine family and translates the
//! backend-neutral graph builders and tensors into that engine's API. Adapters
//! never link a native library directly: they talk to a narrow engine seam
//! (`OpenVinoEngine`, `TorchEngine`, ...) and the native bindings implement the
//! seam behind a cargo feature.
//!
//! # Available Backends
//!
//! ## OpenVINO (`openvino` feature)
//! - **Model**: XML topology plus binary weights (2 builders)
//! - **Inputs**: fixed, named; bound with precision FP32 blobs
//!
//! ## PyTorch (`pytorch` feature)
//! - **Model**: TorchScript archive (1 builder)
//! - **Inputs**: positional slot list that grows on demand up to a cap
//!
//! ## Tensorflow (`tensorflow` feature)
//! - **Model**: `saved_model.pb`, tag set, signature name (3 builders)
//! - **Inputs**: signature tensors in lexicographic name order
//!
//! ## TensorflowLite (`tflite` feature)
//! - **Model**: TFLite flatbuffer (1 builder)
//! - **Inputs**: interpreter inputs by index
//!
//! ## Stub Engines (Test-Only)
//! In-memory implementations of every seam with injectable failure points, used
//! to exercise adapter logic without any native library.
//!
//! # Capability Lookup
//!
//! ```text
//! HostConfig ─> BackendSet::with_compiled ─> [adapter | Unavailable] per Backend
//! ```
//!
//! A backend without a registered adapter still resolves, to [`Unavailable`],
//! whose every operation fails with `BackendNotBuilt`.

pub mod openvino;
pub mod pytorch;
#[cfg(test)]
pub mod stub;
pub mod tensorflow;
pub mod tflite;

use crate::config::BackendsConfig;
use crate::errors::{NnError, NnResult};
use crate::nn::{Backend, ExecutionContext, ExecutionTarget, Graph, Tensor};
use crate::observability::messages::nn::{BackendDisabled, BackendRegistered, OutputTruncated};

/// One inference engine behind the wasi-nn contract.
///
/// Adapters receive only their own [`Graph`] and [`ExecutionContext`] variants
/// in normal dispatch; any other variant is rejected with `BackendMismatch`.
pub trait NnBackend: Send + Sync {
    fn kind(&self) -> Backend;

    /// False only for the placeholder of a backend that was not built.
    fn is_available(&self) -> bool {
        true
    }

    /// Builds a graph from the guest's builder buffers. The buffers borrow
    /// guest memory; anything the graph keeps must be copied.
    fn load(&self, builders: &[&[u8]], target: ExecutionTarget) -> NnResult<Graph>;

    fn init_execution_context(&self, graph: &Graph) -> NnResult<ExecutionContext>;

    fn set_input(&self, ctx: &mut ExecutionContext, index: u32, tensor: &Tensor<'_>) -> NnResult<()>;

    fn compute(&self, ctx: &mut ExecutionContext) -> NnResult<()>;

    /// Copies output `index` into `out` and returns the bytes written.
    fn get_output(&self, ctx: &mut ExecutionContext, index: u32, out: &mut [u8]) -> NnResult<u32>;
}

/// Placeholder for a backend with no adapter in this build.
pub struct Unavailable {
    backend: Backend,
}

impl Unavailable {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl NnBackend for Unavailable {
    fn kind(&self) -> Backend {
        self.backend
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load(&self, _builders: &[&[u8]], _target: ExecutionTarget) -> NnResult<Graph> {
        Err(NnError::BackendNotBuilt(self.backend))
    }

    fn init_execution_context(&self, _graph: &Graph) -> NnResult<ExecutionContext> {
        Err(NnError::BackendNotBuilt(self.backend))
    }

    fn set_input(&self, _ctx: &mut ExecutionContext, _index: u32, _tensor: &Tensor<'_>) -> NnResult<()> {
        Err(NnError::BackendNotBuilt(self.backend))
    }

    fn compute(&self, _ctx: &mut ExecutionContext) -> NnResult<()> {
        Err(NnError::BackendNotBuilt(self.backend))
    }

    fn get_output(&self, _ctx: &mut ExecutionContext, _index: u32, _out: &mut [u8]) -> NnResult<u32> {
        Err(NnError::BackendNotBuilt(self.backend))
    }
}

fn slot_of(backend: Backend) -> usize {
    match backend {
        Backend::OpenVino => 0,
        Backend::Tensorflow => 1,
        Backend::PyTorch => 2,
        Backend::TensorflowLite => 3,
    }
}

/// The adapters available to one host, one entry per [`Backend`].
pub struct BackendSet {
    slots: [Box<dyn NnBackend>; 4],
}

impl Default for BackendSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl BackendSet {
    /// Every backend resolves to [`Unavailable`].
    pub fn empty() -> Self {
        Self {
            slots: Backend::ALL.map(|backend| Box::new(Unavailable::new(backend)) as Box<dyn NnBackend>),
        }
    }

    /// Registers every compiled-in native engine that `config` enables.
    pub fn with_compiled(config: &BackendsConfig) -> Self {
        let mut set = Self::empty();

        for backend in Backend::ALL {
            let Some(adapter) = native_adapter(backend, config) else {
                continue;
            };
            if config.is_enabled(backend) {
                set.register(adapter);
            } else {
                tracing::info!("{}", BackendDisabled { backend });
            }
        }
        set
    }

    /// Installs `adapter` for its backend, replacing whatever was there.
    pub fn register(&mut self, adapter: Box<dyn NnBackend>) {
        let backend = adapter.kind();
        tracing::info!("{}", BackendRegistered { backend });
        self.slots[slot_of(backend)] = adapter;
    }

    pub fn get(&self, backend: Backend) -> &dyn NnBackend {
        self.slots[slot_of(backend)].as_ref()
    }

    pub fn available(&self) -> Vec<Backend> {
        Backend::ALL
            .into_iter()
            .filter(|&backend| self.get(backend).is_available())
            .collect()
    }
}

#[allow(unused_variables)]
fn native_adapter(backend: Backend, config: &BackendsConfig) -> Option<Box<dyn NnBackend>> {
    match backend {
        #[cfg(feature = "openvino")]
        Backend::OpenVino => Some(Box::new(openvino::OpenVinoBackend::new(Box::new(
            openvino::native::NativeOpenVino,
        )))),
        #[cfg(feature = "pytorch")]
        Backend::PyTorch => Some(Box::new(pytorch::PyTorchBackend::new(
            Box::new(pytorch::native::NativeTorch),
            config.pytorch.get_max_input_slots(),
        ))),
        #[cfg(feature = "tensorflow")]
        Backend::Tensorflow => Some(Box::new(tensorflow::TensorflowBackend::new(
            Box::new(tensorflow::native::NativeTensorflow),
            config.tensorflow.get_temp_dir_prefix(),
        ))),
        #[cfg(feature = "tflite")]
        Backend::TensorflowLite => Some(Box::new(tflite::TfLiteBackend::new(Box::new(
            tflite::native::NativeTfLite,
        )))),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Copies as much of `src` as fits into `out` and returns the count.
pub(crate) fn copy_output(backend: Backend, index: u32, src: &[u8], out: &mut [u8]) -> NnResult<u32> {
    let written = src.len().min(out.len());
    out[..written].copy_from_slice(&src[..written]);
    if written < src.len() {
        tracing::warn!(
            "{}",
            OutputTruncated {
                backend,
                index,
                available: src.len(),
                written,
            }
        );
    }
    u32::try_from(written).map_err(|_| NnError::invalid("output larger than guest address space"))
}

/// Rejects an index outside `0..count`.
pub(crate) fn check_index(index: u32, count: usize, what: &str) -> NnResult<usize> {
    let index = index as usize;
    if index < count {
        Ok(index)
    } else {
        Err(NnError::invalid(format!(
            "{} index {} out of range (have {})",
            what, index, count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::TensorType;

    #[test]
    fn test_empty_set_reports_backend_not_built() {
        let set = BackendSet::empty();
        assert!(set.available().is_empty());

        for backend in Backend::ALL {
            let adapter = set.get(backend);
            assert_eq!(adapter.kind(), backend);
            assert!(!adapter.is_available());
            let result = adapter.load(&[&b"model"[..]], ExecutionTarget::Cpu);
            assert!(matches!(result, Err(NnError::BackendNotBuilt(b)) if b == backend));
        }
    }

    #[test]
    fn test_unavailable_rejects_every_operation() {
        let adapter = Unavailable::new(Backend::OpenVino);
        let mut ctx = stub::torch_context();
        let data = [0u8; 4];
        let tensor = Tensor {
            dims: vec![1],
            ty: TensorType::F32,
            data: &data,
        };

        assert!(adapter.set_input(&mut ctx, 0, &tensor).is_err());
        assert!(adapter.compute(&mut ctx).is_err());
        assert!(adapter.get_output(&mut ctx, 0, &mut [0u8; 4]).is_err());
    }

    #[test]
    fn test_register_replaces_unavailable() {
        let mut set = BackendSet::empty();
        set.register(stub::torch_backend(stub::StubTorch::identity()));

        assert_eq!(set.available(), vec![Backend::PyTorch]);
        assert!(set.get(Backend::PyTorch).is_available());
        assert!(!set.get(Backend::OpenVino).is_available());
    }

    #[test]
    fn test_config_can_disable_everything() {
        let config: BackendsConfig = serde_yaml::from_str("enabled: []").unwrap();
        let set = BackendSet::with_compiled(&config);
        assert!(set.available().is_empty());
    }

    #[test]
    fn test_copy_output_truncates() {
        let src = [1u8, 2, 3, 4, 5, 6];

        let mut small = [0u8; 4];
        assert_eq!(copy_output(Backend::PyTorch, 0, &src, &mut small).unwrap(), 4);
        assert_eq!(small, [1, 2, 3, 4]);

        let mut large = [9u8; 8];
        assert_eq!(copy_output(Backend::PyTorch, 0, &src, &mut large).unwrap(), 6);
        assert_eq!(large, [1, 2, 3, 4, 5, 6, 9, 9]);
    }

    #[test]
    fn test_check_index() {
        assert_eq!(check_index(1, 2, "input").unwrap(), 1);
        assert!(matches!(check_index(2, 2, "input"), Err(NnError::InvalidArgument(_))));
    }
}
