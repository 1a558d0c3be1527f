// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire layout of graph builders and tensor descriptors.
//!
//! Both live in guest memory as little-endian u32 words:
//!
//! ```text
//! builder block:     [ptr0, len0, ptr1, len1, ...]          (builder_len pairs)
//! tensor descriptor: [dims_ptr, dims_len, type, data_ptr, data_len]
//! ```
//!
//! Decoded values borrow the guest memory they came from and are only valid
//! for the host call that produced them.

use crate::errors::{NnError, NnResult};
use crate::nn::{GuestMemory, TensorType};

/// Highest tensor rank accepted from a guest.
pub const MAX_TENSOR_RANK: usize = 8;

/// Number of u32 words in one tensor descriptor.
pub const TENSOR_DESCRIPTOR_WORDS: u32 = 5;

/// Backend-neutral tensor handed to an adapter's `set_input`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<'a> {
    pub dims: Vec<u32>,
    pub ty: TensorType,
    pub data: &'a [u8],
}

impl<'a> Tensor<'a> {
    /// Decodes the descriptor stored at `ptr`.
    ///
    /// A rank above [`MAX_TENSOR_RANK`] is rejected before the dimension
    /// array is read. A rank or data length of zero is passed through.
    pub fn decode(memory: &'a GuestMemory<'_>, ptr: u32) -> NnResult<Self> {
        let header = memory.require_words(ptr, TENSOR_DESCRIPTOR_WORDS, "tensor descriptor")?;
        let (dims_ptr, dims_len, type_tag, data_ptr, data_len) =
            (header[0], header[1], header[2], header[3], header[4]);

        if dims_len as usize > MAX_TENSOR_RANK {
            return Err(NnError::invalid(format!(
                "tensor rank {} exceeds the maximum of {}",
                dims_len, MAX_TENSOR_RANK
            )));
        }
        let ty = TensorType::from_tag(type_tag)
            .ok_or_else(|| NnError::invalid(format!("unknown tensor type tag {}", type_tag)))?;

        let dims = if dims_len == 0 {
            Vec::new()
        } else {
            memory.require_words(dims_ptr, dims_len, "tensor dimensions")?
        };
        let data = memory.require_slice(data_ptr, data_len, "tensor data")?;

        Ok(Tensor { dims, ty, data })
    }

    /// Product of the dimensions, `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim as usize))
    }

    /// Byte length implied by shape and element type, `None` on overflow.
    pub fn expected_byte_len(&self) -> Option<usize> {
        self.element_count()?.checked_mul(self.ty.element_size())
    }

    /// Every adapter only accepts F32 input.
    pub fn require_f32(&self) -> NnResult<()> {
        if self.ty == TensorType::F32 {
            Ok(())
        } else {
            Err(NnError::invalid(format!(
                "only F32 tensors are supported, got {:?}",
                self.ty
            )))
        }
    }

    /// Rejects a buffer whose length differs from the declared shape.
    pub fn require_exact_len(&self) -> NnResult<()> {
        match self.expected_byte_len() {
            Some(expected) if expected == self.data.len() => Ok(()),
            Some(expected) => Err(NnError::invalid(format!(
                "tensor data is {} bytes but shape {:?} needs {}",
                self.data.len(),
                self.dims,
                expected
            ))),
            None => Err(NnError::invalid(format!(
                "tensor shape {:?} overflows",
                self.dims
            ))),
        }
    }

    pub fn dims_i64(&self) -> Vec<i64> {
        self.dims.iter().map(|&d| i64::from(d)).collect()
    }

    pub fn dims_usize(&self) -> Vec<usize> {
        self.dims.iter().map(|&d| d as usize).collect()
    }
}

/// Resolves `count` `(ptr, len)` pairs starting at `ptr` into byte views.
pub fn decode_builders<'a>(
    memory: &'a GuestMemory<'_>,
    ptr: u32,
    count: u32,
) -> NnResult<Vec<&'a [u8]>> {
    let word_count = count
        .checked_mul(2)
        .ok_or(NnError::GuestMemory("graph builder array"))?;
    let words = memory.require_words(ptr, word_count, "graph builder array")?;

    words
        .chunks_exact(2)
        .map(|pair| memory.require_slice(pair[0], pair[1], "graph builder"))
        .collect()
}

/// Checks the builder count an adapter expects before the engine is touched.
pub fn require_builder_count(builders: &[&[u8]], expected: usize, backend: &str) -> NnResult<()> {
    if builders.len() == expected {
        Ok(())
    } else {
        Err(NnError::invalid(format!(
            "{} expects {} graph builder(s), got {}",
            backend,
            expected,
            builders.len()
        )))
    }
}
