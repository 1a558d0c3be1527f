// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! OpenVINO runtime bindings (`openvino` feature).

use std::sync::Mutex;

use openvino::{CompiledModel, Core, DeviceType, ElementType, InferRequest, Model, Shape, Tensor};

use super::{Blob, OpenVinoEngine, OpenVinoExecutable, OpenVinoInferRequest, OpenVinoNetwork, Precision};
use crate::errors::{EngineError, EngineResult};

pub struct NativeOpenVino;

fn element_type(precision: Precision) -> ElementType {
    match precision {
        Precision::Fp32 => ElementType::F32,
        Precision::Fp16 => ElementType::F16,
        Precision::U8 => ElementType::U8,
        Precision::I32 => ElementType::I32,
        Precision::I64 => ElementType::I64,
    }
}

fn precision(element_type: ElementType) -> EngineResult<Precision> {
    match element_type {
        ElementType::F32 => Ok(Precision::Fp32),
        ElementType::F16 => Ok(Precision::Fp16),
        ElementType::U8 => Ok(Precision::U8),
        ElementType::I32 => Ok(Precision::I32),
        ElementType::I64 => Ok(Precision::I64),
        other => Err(EngineError::new(
            "map element type",
            format!("unsupported element type {:?}", other),
        )),
    }
}

fn to_native(blob: &Blob) -> EngineResult<Tensor> {
    let dims: Vec<i64> = blob.dims.iter().map(|&d| d as i64).collect();
    let shape = Shape::new(&dims).map_err(|e| EngineError::from_native("create shape", e))?;
    let mut tensor = Tensor::new(element_type(blob.precision), &shape)
        .map_err(|e| EngineError::from_native("create blob", e))?;
    let buffer = tensor
        .get_raw_data_mut()
        .map_err(|e| EngineError::from_native("map blob", e))?;
    let len = buffer.len().min(blob.data.len());
    buffer[..len].copy_from_slice(&blob.data[..len]);
    Ok(tensor)
}

fn from_native(tensor: &Tensor) -> EngineResult<Blob> {
    let precision = precision(
        tensor
            .get_element_type()
            .map_err(|e| EngineError::from_native("get element type", e))?,
    )?;
    let shape = tensor
        .get_shape()
        .map_err(|e| EngineError::from_native("get shape", e))?;
    let dims = shape.get_dimensions().iter().map(|&d| d as usize).collect();
    let data = tensor
        .get_raw_data()
        .map_err(|e| EngineError::from_native("read blob", e))?
        .to_vec();
    Ok(Blob {
        precision,
        dims,
        data,
    })
}

impl OpenVinoEngine for NativeOpenVino {
    fn read_network(&self, xml: &[u8], weights: Blob) -> EngineResult<Box<dyn OpenVinoNetwork>> {
        let mut core = Core::new().map_err(|e| EngineError::from_native("create core", e))?;
        let weights = to_native(&weights)?;
        let model = core
            .read_model_from_buffer(xml, Some(&weights))
            .map_err(|e| EngineError::from_native("read network", e))?;
        Ok(Box::new(NativeNetwork {
            core: Mutex::new(core),
            model: Mutex::new(model),
        }))
    }
}

struct NativeNetwork {
    core: Mutex<Core>,
    model: Mutex<Model>,
}

impl NativeNetwork {
    fn port_names(
        &self,
        count: impl Fn(&Model) -> Result<usize, openvino::InferenceError>,
        name_at: impl Fn(&Model, usize) -> Result<String, openvino::InferenceError>,
    ) -> EngineResult<Vec<String>> {
        let model = self
            .model
            .lock()
            .map_err(|_| EngineError::new("count ports", "model lock poisoned"))?;
        let len = count(&*model).map_err(|e| EngineError::from_native("count ports", e))?;
        (0..len)
            .map(|i| name_at(&*model, i).map_err(|e| EngineError::from_native("get port name", e)))
            .collect()
    }
}

impl OpenVinoNetwork for NativeNetwork {
    fn input_names(&self) -> EngineResult<Vec<String>> {
        self.port_names(Model::get_inputs_len, |model, i| {
            model.get_input_by_index(i)?.get_name()
        })
    }

    fn output_names(&self) -> EngineResult<Vec<String>> {
        self.port_names(Model::get_outputs_len, |model, i| {
            model.get_output_by_index(i)?.get_name()
        })
    }

    fn compile(&self, device: &str) -> EngineResult<Box<dyn OpenVinoExecutable>> {
        let device = match device {
            "CPU" => DeviceType::CPU,
            other => {
                return Err(EngineError::new(
                    "compile network",
                    format!("device {} is not supported", other),
                ))
            }
        };
        let mut core = self
            .core
            .lock()
            .map_err(|_| EngineError::new("compile network", "core lock poisoned"))?;
        let model = self
            .model
            .lock()
            .map_err(|_| EngineError::new("compile network", "model lock poisoned"))?;
        let compiled = core
            .compile_model(&*model, device)
            .map_err(|e| EngineError::from_native("compile network", e))?;
        Ok(Box::new(NativeExecutable {
            compiled: Mutex::new(compiled),
        }))
    }
}

struct NativeExecutable {
    compiled: Mutex<CompiledModel>,
}

impl OpenVinoExecutable for NativeExecutable {
    fn create_infer_request(&self) -> EngineResult<Box<dyn OpenVinoInferRequest>> {
        let mut compiled = self
            .compiled
            .lock()
            .map_err(|_| EngineError::new("create infer request", "model lock poisoned"))?;
        let request = compiled
            .create_infer_request()
            .map_err(|e| EngineError::from_native("create infer request", e))?;
        Ok(Box::new(NativeInferRequest { request }))
    }
}

struct NativeInferRequest {
    request: InferRequest,
}

impl OpenVinoInferRequest for NativeInferRequest {
    fn set_blob(&mut self, name: &str, blob: &Blob) -> EngineResult<()> {
        let tensor = to_native(blob)?;
        self.request
            .set_tensor(name, &tensor)
            .map_err(|e| EngineError::from_native("set blob", e))
    }

    fn infer(&mut self) -> EngineResult<()> {
        self.request
            .infer()
            .map_err(|e| EngineError::from_native("infer", e))
    }

    fn output_blob(&mut self, name: &str) -> EngineResult<Blob> {
        let tensor = self
            .request
            .get_tensor(name)
            .map_err(|e| EngineError::from_native("get blob", e))?;
        from_native(&tensor)
    }
}
