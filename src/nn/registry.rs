// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph and execution-context storage.
//!
//! Both live in append-only arenas addressed by u32 handles. A handle is the
//! entry's index; entries are never removed, so a handle stays valid for the
//! registry's whole lifetime. New entries are built against a reserved slot
//! and only become reachable once committed.

use std::sync::Arc;

use crate::backends::openvino::{OpenVinoContext, OpenVinoGraph};
use crate::backends::pytorch::{TorchContext, TorchGraph};
use crate::backends::tensorflow::{TfContext, TfGraph};
use crate::backends::tflite::{TfLiteContext, TfLiteGraph};
use crate::errors::{NnError, NnResult};
use crate::nn::Backend;

/// A loaded model. Backend state sits behind an `Arc` so contexts can share
/// it and appending to the arena never moves it.
#[derive(Clone)]
pub enum Graph {
    OpenVino(Arc<OpenVinoGraph>),
    Tensorflow(Arc<TfGraph>),
    PyTorch(Arc<TorchGraph>),
    TensorflowLite(Arc<TfLiteGraph>),
}

impl Graph {
    pub fn backend(&self) -> Backend {
        match self {
            Graph::OpenVino(_) => Backend::OpenVino,
            Graph::Tensorflow(_) => Backend::Tensorflow,
            Graph::PyTorch(_) => Backend::PyTorch,
            Graph::TensorflowLite(_) => Backend::TensorflowLite,
        }
    }
}

/// One inference session bound to a graph.
pub enum ExecutionContext {
    OpenVino(OpenVinoContext),
    Tensorflow(TfContext),
    PyTorch(TorchContext),
    TensorflowLite(TfLiteContext),
}

impl ExecutionContext {
    pub fn backend(&self) -> Backend {
        match self {
            ExecutionContext::OpenVino(_) => Backend::OpenVino,
            ExecutionContext::Tensorflow(_) => Backend::Tensorflow,
            ExecutionContext::PyTorch(_) => Backend::PyTorch,
            ExecutionContext::TensorflowLite(_) => Backend::TensorflowLite,
        }
    }
}

/// Append-only storage with reserve/commit insertion.
pub struct Arena<T> {
    kind: &'static str,
    items: Vec<T>,
    limit: u32,
}

/// A reserved, not yet reachable, arena slot. Dropping it discards the slot.
pub struct Slot<'a, T> {
    arena: &'a mut Arena<T>,
    handle: u32,
}

impl<'a, T> Slot<'a, T> {
    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn commit(self, value: T) -> u32 {
        self.arena.items.push(value);
        self.handle
    }
}

impl<T> Arena<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: Vec::new(),
            limit: u32::MAX,
        }
    }

    #[cfg(test)]
    fn with_limit(kind: &'static str, limit: u32) -> Self {
        Self {
            kind,
            items: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reserves the next handle. Fails `Busy` once the handle space is used up.
    pub fn reserve(&mut self) -> NnResult<Slot<'_, T>> {
        let handle = u32::try_from(self.items.len())
            .ok()
            .filter(|&handle| handle < self.limit)
            .ok_or_else(|| NnError::busy(format!("no free {} handles", self.kind)))?;
        Ok(Slot {
            arena: self,
            handle,
        })
    }

    /// Builds a value for the next handle and commits it only on success.
    pub fn insert_with<F>(&mut self, build: F) -> NnResult<u32>
    where
        F: FnOnce(u32) -> NnResult<T>,
    {
        let slot = self.reserve()?;
        let value = build(slot.handle())?;
        Ok(slot.commit(value))
    }

    pub fn get(&self, handle: u32) -> NnResult<&T> {
        let len = self.items.len();
        self.items
            .get(handle as usize)
            .ok_or(NnError::InvalidHandle {
                kind: self.kind,
                handle,
                len,
            })
    }

    pub fn get_mut(&mut self, handle: u32) -> NnResult<&mut T> {
        let len = self.items.len();
        let kind = self.kind;
        self.items
            .get_mut(handle as usize)
            .ok_or(NnError::InvalidHandle { kind, handle, len })
    }
}

/// Every graph and context created through one [`crate::nn::WasiNnCtx`].
pub struct Registry {
    graphs: Arena<Graph>,
    contexts: Arena<ExecutionContext>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            graphs: Arena::new("graph"),
            contexts: Arena::new("execution context"),
        }
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Appends the graph produced by `build`; nothing is appended on failure.
    pub fn add_graph_with<F>(&mut self, build: F) -> NnResult<u32>
    where
        F: FnOnce() -> NnResult<Graph>,
    {
        self.graphs.insert_with(|_| build())
    }

    /// Appends a context for `graph_handle`; nothing is appended on failure.
    pub fn add_context_with<F>(&mut self, graph_handle: u32, build: F) -> NnResult<u32>
    where
        F: FnOnce(&Graph) -> NnResult<ExecutionContext>,
    {
        let graph = self.graphs.get(graph_handle)?;
        self.contexts.insert_with(|_| build(graph))
    }

    pub fn graph(&self, handle: u32) -> NnResult<&Graph> {
        self.graphs.get(handle)
    }

    pub fn context(&self, handle: u32) -> NnResult<&ExecutionContext> {
        self.contexts.get(handle)
    }

    pub fn context_mut(&mut self, handle: u32) -> NnResult<&mut ExecutionContext> {
        self.contexts.get_mut(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_indices() {
        let mut arena: Arena<&str> = Arena::new("graph");

        assert_eq!(arena.insert_with(|_| Ok("a")).unwrap(), 0);
        assert_eq!(arena.insert_with(|_| Ok("b")).unwrap(), 1);
        assert_eq!(*arena.get(0).unwrap(), "a");
        assert_eq!(*arena.get(1).unwrap(), "b");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_failed_build_appends_nothing() {
        let mut arena: Arena<u8> = Arena::new("graph");
        arena.insert_with(|_| Ok(1)).unwrap();

        let result = arena.insert_with(|handle| {
            assert_eq!(handle, 1);
            Err(NnError::busy("engine refused"))
        });

        assert!(matches!(result, Err(NnError::Busy(_))));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.insert_with(|_| Ok(2)).unwrap(), 1);
    }

    #[test]
    fn test_dropped_slot_is_discarded() {
        let mut arena: Arena<u8> = Arena::new("graph");
        {
            let slot = arena.reserve().unwrap();
            assert_eq!(slot.handle(), 0);
        }
        assert!(arena.is_empty());
    }

    #[test]
    fn test_out_of_range_handles_are_invalid() {
        let mut arena: Arena<u8> = Arena::new("execution context");
        arena.insert_with(|_| Ok(7)).unwrap();

        for handle in [1, 2, u32::MAX] {
            let error = arena.get(handle).unwrap_err();
            assert!(matches!(
                error,
                NnError::InvalidHandle { kind: "execution context", len: 1, .. }
            ));
            assert!(arena.get_mut(handle).is_err());
        }
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_exhausted_handle_space_is_busy() {
        let mut arena: Arena<u8> = Arena::with_limit("graph", 2);
        arena.insert_with(|_| Ok(0)).unwrap();
        arena.insert_with(|_| Ok(1)).unwrap();

        let mut built = false;
        let result = arena.insert_with(|_| {
            built = true;
            Ok(2)
        });
        assert!(matches!(result, Err(NnError::Busy(_))));
        assert!(!built, "builder must not run without a handle");
    }

    #[test]
    fn test_registry_rejects_context_for_unknown_graph() {
        let mut registry = Registry::new();

        let mut built = false;
        let result = registry.add_context_with(0, |_| {
            built = true;
            Err(NnError::invalid("unreachable"))
        });

        assert!(matches!(result, Err(NnError::InvalidHandle { kind: "graph", .. })));
        assert!(!built);
        assert_eq!(registry.context_count(), 0);
        assert!(registry.graph(0).is_err());
        assert!(registry.context(0).is_err());
        assert!(registry.context_mut(0).is_err());
    }
}
