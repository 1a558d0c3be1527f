// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! TFLite flatbuffer execution through tract (`tflite` feature).
//!
//! tract runs a plan on the calling thread.

use std::io::Cursor;

use tract_tflite::prelude::*;

use super::{TfLiteEngine, TfLiteInterpreter, TfLiteModel, TfLiteType};
use crate::errors::{EngineError, EngineResult};
use crate::observability::messages::nn::InterpreterPlanned;

pub struct NativeTfLite;

impl TfLiteEngine for NativeTfLite {
    fn create_model(&self, flatbuffer: &[u8]) -> EngineResult<Box<dyn TfLiteModel>> {
        let model = tract_tflite::tflite()
            .model_for_read(&mut Cursor::new(flatbuffer))
            .map_err(|e| EngineError::from_native("create model", e))?;
        Ok(Box::new(NativeModel { model }))
    }
}

struct NativeModel {
    model: TypedModel,
}

impl TfLiteModel for NativeModel {
    fn create_interpreter(&self) -> EngineResult<Box<dyn TfLiteInterpreter>> {
        Ok(Box::new(NativeInterpreter {
            model: Some(self.model.clone()),
            plan: None,
            inputs: Vec::new(),
            outputs: None,
        }))
    }
}

struct NativeInterpreter {
    /// Taken by `allocate_tensors`.
    model: Option<TypedModel>,
    plan: Option<TypedRunnableModel<TypedModel>>,
    inputs: Vec<Option<Tensor>>,
    outputs: Option<TVec<TValue>>,
}

impl NativeInterpreter {
    fn plan(&self, operation: &'static str) -> EngineResult<&TypedRunnableModel<TypedModel>> {
        self.plan
            .as_ref()
            .ok_or_else(|| EngineError::new(operation, "tensors are not allocated"))
    }

    fn input_fact(&self, index: usize) -> EngineResult<TypedFact> {
        let plan = self.plan("inspect input")?;
        plan.model()
            .input_fact(index)
            .cloned()
            .map_err(|e| EngineError::from_native("inspect input", e))
    }
}

impl TfLiteInterpreter for NativeInterpreter {
    fn allocate_tensors(&mut self) -> EngineResult<()> {
        let model = self
            .model
            .take()
            .ok_or_else(|| EngineError::new("allocate tensors", "tensors already allocated"))?;
        let plan = model
            .into_optimized()
            .and_then(|optimized| optimized.into_runnable())
            .map_err(|e| EngineError::from_native("allocate tensors", e))?;
        tracing::debug!(
            "{}",
            InterpreterPlanned {
                inputs: plan.model().inputs.len(),
                outputs: plan.model().outputs.len(),
            }
        );
        self.inputs = vec![None; plan.model().inputs.len()];
        self.plan = Some(plan);
        Ok(())
    }

    fn input_count(&self) -> usize {
        self.plan
            .as_ref()
            .map_or(0, |plan| plan.model().inputs.len())
    }

    fn output_count(&self) -> usize {
        self.plan
            .as_ref()
            .map_or(0, |plan| plan.model().outputs.len())
    }

    fn input_type(&self, index: usize) -> EngineResult<TfLiteType> {
        let fact = self.input_fact(index)?;
        match fact.datum_type {
            DatumType::F32 => Ok(TfLiteType::Float32),
            DatumType::F16 => Ok(TfLiteType::Float16),
            DatumType::U8 => Ok(TfLiteType::UInt8),
            DatumType::I32 => Ok(TfLiteType::Int32),
            DatumType::I64 => Ok(TfLiteType::Int64),
            other => Err(EngineError::new(
                "inspect input",
                format!("unsupported datum type {:?}", other),
            )),
        }
    }

    fn copy_to_input(&mut self, index: usize, data: &[u8]) -> EngineResult<()> {
        let fact = self.input_fact(index)?;
        if fact.datum_type != DatumType::F32 {
            return Err(EngineError::new("copy input", "only float32 inputs can be copied"));
        }
        let shape = fact
            .shape
            .as_concrete()
            .ok_or_else(|| EngineError::new("copy input", "input shape is symbolic"))?
            .to_vec();
        let expected = shape.iter().product::<usize>() * std::mem::size_of::<f32>();
        if data.len() != expected {
            return Err(EngineError::new(
                "copy input",
                format!("input {} needs {} bytes, got {}", index, expected, data.len()),
            ));
        }

        let values: Vec<f32> = data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let tensor = Tensor::from_shape(&shape, &values)
            .map_err(|e| EngineError::from_native("copy input", e))?;
        self.inputs[index] = Some(tensor);
        Ok(())
    }

    fn invoke(&mut self) -> EngineResult<()> {
        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.clone()
                    .map(TValue::from)
                    .ok_or_else(|| EngineError::new("invoke", format!("input {} is empty", i)))
            })
            .collect::<EngineResult<TVec<TValue>>>()?;
        let outputs = self
            .plan("invoke")?
            .run(inputs)
            .map_err(|e| EngineError::from_native("invoke", e))?;
        self.outputs = Some(outputs);
        Ok(())
    }

    fn output_data(&self, index: usize) -> EngineResult<&[u8]> {
        let outputs = self
            .outputs
            .as_ref()
            .ok_or_else(|| EngineError::new("read output", "interpreter has not been invoked"))?;
        let value = outputs
            .get(index)
            .ok_or_else(|| EngineError::new("read output", format!("no output {}", index)))?;
        Ok(value.as_bytes())
    }
}
