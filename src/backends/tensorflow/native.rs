// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! libtensorflow bindings (`tensorflow` feature).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ::tensorflow::{Graph, SavedModelBundle, SessionOptions, SessionRunArgs, Tensor, TensorInfo};

use super::{TensorflowEngine, TfDataType, TfSavedModel, TfSignature, TfTensor};
use crate::errors::{EngineError, EngineResult};

pub struct NativeTensorflow;

impl TensorflowEngine for NativeTensorflow {
    fn load_saved_model(&self, export_dir: &Path, tags: &[&str]) -> EngineResult<Box<dyn TfSavedModel>> {
        let mut graph = Graph::new();
        let bundle = SavedModelBundle::load(&SessionOptions::new(), tags, &mut graph, export_dir)
            .map_err(|e| EngineError::from_native("load SavedModel", e))?;
        Ok(Box::new(NativeSavedModel {
            session: Mutex::new(Session { graph, bundle }),
        }))
    }
}

struct Session {
    graph: Graph,
    bundle: SavedModelBundle,
}

struct NativeSavedModel {
    session: Mutex<Session>,
}

/// Splits `"op:index"`; a bare op name means output 0.
fn parse_tensor_name(name: &str) -> (&str, i32) {
    match name.rsplit_once(':') {
        Some((op, index)) => match index.parse() {
            Ok(index) => (op, index),
            Err(_) => (name, 0),
        },
        None => (name, 0),
    }
}

fn f32_values(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl TfSavedModel for NativeSavedModel {
    fn signature(&self, name: &str) -> Option<TfSignature> {
        let session = self.session.lock().ok()?;
        let signature = session.bundle.meta_graph_def().get_signature(name).ok()?;
        let names = |infos: &HashMap<String, TensorInfo>| -> Vec<String> {
            infos
                .values()
                .map(|info| format!("{}:{}", info.name().name, info.name().index))
                .collect()
        };
        Some(TfSignature {
            inputs: names(signature.inputs()),
            outputs: names(signature.outputs()),
        })
    }

    fn run(&self, feeds: &[(&str, &TfTensor)], fetches: &[&str]) -> EngineResult<Vec<TfTensor>> {
        let session = self
            .session
            .lock()
            .map_err(|_| EngineError::new("run session", "session lock poisoned"))?;

        let inputs = feeds
            .iter()
            .map(|(_, tensor)| {
                Tensor::<f32>::new(&tensor.dims)
                    .with_values(&f32_values(&tensor.data))
                    .map_err(|e| EngineError::from_native("create input tensor", e))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let mut args = SessionRunArgs::new();
        for ((name, _), tensor) in feeds.iter().zip(&inputs) {
            let (op, index) = parse_tensor_name(name);
            let operation = session
                .graph
                .operation_by_name_required(op)
                .map_err(|e| EngineError::from_native("resolve input", e))?;
            args.add_feed(&operation, index, tensor);
        }

        let mut tokens = Vec::with_capacity(fetches.len());
        for name in fetches {
            let (op, index) = parse_tensor_name(name);
            let operation = session
                .graph
                .operation_by_name_required(op)
                .map_err(|e| EngineError::from_native("resolve output", e))?;
            tokens.push(args.request_fetch(&operation, index));
        }

        session
            .bundle
            .session
            .run(&mut args)
            .map_err(|e| EngineError::from_native("run session", e))?;

        tokens
            .into_iter()
            .map(|token| {
                let output: Tensor<f32> = args
                    .fetch(token)
                    .map_err(|e| EngineError::from_native("fetch output", e))?;
                Ok(TfTensor {
                    dtype: TfDataType::Float,
                    dims: output.dims().to_vec(),
                    data: output.iter().flat_map(|v| v.to_le_bytes()).collect(),
                })
            })
            .collect()
    }
}
