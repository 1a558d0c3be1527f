// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! libtorch bindings (`pytorch` feature).

use std::io::Cursor;
use std::sync::Mutex;

use tch::{CModule, IValue, Kind, Tensor};

use super::{TorchEngine, TorchKind, TorchModule, TorchOutput, TorchTensor};
use crate::errors::{EngineError, EngineResult};

pub struct NativeTorch;

impl TorchEngine for NativeTorch {
    fn load_module(&self, archive: &[u8]) -> EngineResult<Box<dyn TorchModule>> {
        let mut cursor = Cursor::new(archive);
        let module = CModule::load_data(&mut cursor)
            .map_err(|e| EngineError::from_native("load TorchScript module", e))?;
        Ok(Box::new(NativeModule {
            module: Mutex::new(module),
        }))
    }
}

struct NativeModule {
    module: Mutex<CModule>,
}

fn kind(kind: TorchKind) -> Kind {
    match kind {
        TorchKind::Float => Kind::Float,
        TorchKind::Half => Kind::Half,
        TorchKind::Uint8 => Kind::Uint8,
        TorchKind::Int => Kind::Int,
        TorchKind::Double => Kind::Double,
    }
}

fn to_native(tensor: &TorchTensor) -> EngineResult<Tensor> {
    Tensor::f_from_data_size(&tensor.data, &tensor.dims, kind(tensor.kind))
        .map_err(|e| EngineError::from_native("create input tensor", e))
}

fn from_native(tensor: &Tensor) -> EngineResult<TorchTensor> {
    let read = |e: tch::TchError| EngineError::from_native("read output tensor", e);

    let float = tensor.f_to_kind(Kind::Float).map_err(read)?;
    let dims = float.size();
    let flat = float.f_flatten(0, -1).map_err(read)?;
    let values = Vec::<f32>::try_from(&flat).map_err(read)?;

    Ok(TorchTensor {
        kind: TorchKind::Float,
        dims,
        data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    })
}

impl TorchModule for NativeModule {
    fn forward(&self, inputs: &[TorchTensor]) -> EngineResult<TorchOutput> {
        let inputs = inputs
            .iter()
            .map(|t| to_native(t).map(IValue::Tensor))
            .collect::<EngineResult<Vec<_>>>()?;

        let module = self
            .module
            .lock()
            .map_err(|_| EngineError::new("forward", "module lock poisoned"))?;
        let output = module
            .forward_is(&inputs)
            .map_err(|e| EngineError::from_native("forward", e))?;

        match output {
            IValue::Tensor(tensor) => Ok(TorchOutput::Tensor(from_native(&tensor)?)),
            IValue::TensorList(list) => Ok(TorchOutput::TensorList(
                list.iter().map(from_native).collect::<EngineResult<Vec<_>>>()?,
            )),
            other => Ok(TorchOutput::Other(format!("{:?}", other))),
        }
    }
}
