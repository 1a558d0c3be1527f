// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host core of the `wasi_ephemeral_nn` interface.
//!
//! The guest hands the host model bytes and tensors through its own linear
//! memory; the host loads models into one of the registered inference
//! backends, runs them, and copies results back.
//!
//! # Layers
//!
//! ```text
//! guest ──> ctx (pointer validation, handle resolution)
//!              ├─> memory   bounds-checked view of linear memory
//!              ├─> tensor   wire layout of builders and tensor descriptors
//!              ├─> registry graphs and execution contexts by handle
//!              └─> backends one adapter per inference engine
//! ```
//!
//! [`linker::add_to_linker`] exposes the five operations to a wasmtime guest.

pub mod ctx;
pub mod linker;
pub mod memory;
pub mod registry;
pub mod tensor;


pub use ctx::WasiNnCtx;
pub use linker::{add_to_linker, WASI_NN_MODULE};
pub use memory::GuestMemory;
pub use registry::{Arena, ExecutionContext, Graph, Registry};
pub use tensor::{Tensor, MAX_TENSOR_RANK};

use std::fmt;

use crate::errors::NnError;

/// Inference engine family, as encoded in the `load` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    OpenVino,
    Tensorflow,
    PyTorch,
    TensorflowLite,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::OpenVino,
        Backend::Tensorflow,
        Backend::PyTorch,
        Backend::TensorflowLite,
    ];

    /// Decodes the graph encoding id. Id 1 (ONNX) is part of the ABI but has
    /// no adapter in this host.
    pub fn from_encoding(encoding: u32) -> Result<Self, NnError> {
        match encoding {
            0 => Ok(Backend::OpenVino),
            2 => Ok(Backend::Tensorflow),
            3 => Ok(Backend::PyTorch),
            4 => Ok(Backend::TensorflowLite),
            other => Err(NnError::UnsupportedBackend(other)),
        }
    }

    pub fn encoding(self) -> u32 {
        match self {
            Backend::OpenVino => 0,
            Backend::Tensorflow => 2,
            Backend::PyTorch => 3,
            Backend::TensorflowLite => 4,
        }
    }

    /// Name used in configuration files.
    pub fn config_name(self) -> &'static str {
        match self {
            Backend::OpenVino => "openvino",
            Backend::Tensorflow => "tensorflow",
            Backend::PyTorch => "pytorch",
            Backend::TensorflowLite => "tensorflowlite",
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openvino" => Some(Backend::OpenVino),
            "tensorflow" => Some(Backend::Tensorflow),
            "pytorch" | "torch" => Some(Backend::PyTorch),
            "tensorflowlite" | "tflite" => Some(Backend::TensorflowLite),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::OpenVino => "OpenVINO",
            Backend::Tensorflow => "Tensorflow",
            Backend::PyTorch => "PyTorch",
            Backend::TensorflowLite => "TensorflowLite",
        };
        f.write_str(name)
    }
}

/// Element type of a tensor crossing the guest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorType {
    F16,
    F32,
    U8,
    I32,
}

impl TensorType {
    pub const ALL: [TensorType; 4] = [TensorType::F16, TensorType::F32, TensorType::U8, TensorType::I32];

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(TensorType::F16),
            1 => Some(TensorType::F32),
            2 => Some(TensorType::U8),
            3 => Some(TensorType::I32),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            TensorType::F16 => 0,
            TensorType::F32 => 1,
            TensorType::U8 => 2,
            TensorType::I32 => 3,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TensorType::F16 => 2,
            TensorType::F32 => 4,
            TensorType::U8 => 1,
            TensorType::I32 => 4,
        }
    }
}

/// Device the graph should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Cpu,
    Gpu,
    Tpu,
}

impl ExecutionTarget {
    pub fn from_id(id: u32) -> Result<Self, NnError> {
        match id {
            0 => Ok(ExecutionTarget::Cpu),
            1 => Ok(ExecutionTarget::Gpu),
            2 => Ok(ExecutionTarget::Tpu),
            other => Err(NnError::UnknownTarget(other)),
        }
    }

    /// Device name handed to engines; `None` for targets this host cannot use.
    pub fn device_name(self) -> Option<&'static str> {
        match self {
            ExecutionTarget::Cpu => Some("CPU"),
            ExecutionTarget::Gpu | ExecutionTarget::Tpu => None,
        }
    }
}

/// Rejects every target except CPU.
pub fn cpu_device(target: ExecutionTarget) -> Result<&'static str, NnError> {
    target.device_name().ok_or(NnError::UnsupportedTarget(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_encoding_ids() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_encoding(backend.encoding()).unwrap(), backend);
        }
        assert!(matches!(Backend::from_encoding(1), Err(NnError::UnsupportedBackend(1))));
        assert!(matches!(Backend::from_encoding(42), Err(NnError::UnsupportedBackend(42))));
    }

    #[test]
    fn test_backend_config_names() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_config_name(backend.config_name()), Some(backend));
        }
        assert_eq!(Backend::from_config_name("TFLite"), Some(Backend::TensorflowLite));
        assert_eq!(Backend::from_config_name("onnx"), None);
    }

    #[test]
    fn test_tensor_type_tags() {
        for ty in TensorType::ALL {
            assert_eq!(TensorType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(TensorType::from_tag(4), None);
        assert_eq!(TensorType::F32.element_size(), 4);
        assert_eq!(TensorType::F16.element_size(), 2);
    }

    #[test]
    fn test_only_cpu_has_a_device() {
        assert_eq!(cpu_device(ExecutionTarget::from_id(0).unwrap()).unwrap(), "CPU");
        assert!(matches!(
            cpu_device(ExecutionTarget::from_id(1).unwrap()),
            Err(NnError::UnsupportedTarget(ExecutionTarget::Gpu))
        ));
        assert!(matches!(ExecutionTarget::from_id(7), Err(NnError::UnknownTarget(7))));
    }
}
