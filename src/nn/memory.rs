// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounds-checked view over a guest's linear memory.
//!
//! Every guest pointer the host functions touch goes through this type. All
//! accessors fail closed: an out-of-range, overflowing or (for word access)
//! misaligned request yields `None` and nothing is read or written.

use crate::errors::{NnError, NnResult};

const WORD: usize = std::mem::size_of::<u32>();

/// Linear memory of the calling instance, borrowed for one host call.
pub struct GuestMemory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> GuestMemory<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(&self, ptr: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(ptr).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    pub fn slice(&self, ptr: u32, len: u32) -> Option<&[u8]> {
        let range = self.range(ptr, usize::try_from(len).ok()?)?;
        Some(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, ptr: u32, len: u32) -> Option<&mut [u8]> {
        let range = self.range(ptr, usize::try_from(len).ok()?)?;
        Some(&mut self.bytes[range])
    }

    /// Reads `count` little-endian u32 words starting at `ptr`.
    pub fn words(&self, ptr: u32, count: u32) -> Option<Vec<u32>> {
        if ptr as usize % WORD != 0 {
            return None;
        }
        let byte_len = usize::try_from(count).ok()?.checked_mul(WORD)?;
        let range = self.range(ptr, byte_len)?;
        let words = self.bytes[range]
            .chunks_exact(WORD)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(words)
    }

    /// True when a u32 result can be written at `ptr`.
    pub fn check_u32(&self, ptr: u32) -> bool {
        ptr as usize % WORD == 0 && self.range(ptr, WORD).is_some()
    }

    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Option<()> {
        if !self.check_u32(ptr) {
            return None;
        }
        let range = self.range(ptr, WORD)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Some(())
    }

    /// Like [`GuestMemory::slice`], naming `what` in the error.
    pub fn require_slice(&self, ptr: u32, len: u32, what: &'static str) -> NnResult<&[u8]> {
        self.slice(ptr, len).ok_or(NnError::GuestMemory(what))
    }

    /// Like [`GuestMemory::words`], naming `what` in the error.
    pub fn require_words(&self, ptr: u32, count: u32, what: &'static str) -> NnResult<Vec<u32>> {
        self.words(ptr, count).ok_or(NnError::GuestMemory(what))
    }

    /// Validates a result pointer up front so a later write cannot fail.
    pub fn require_u32_slot(&self, ptr: u32, what: &'static str) -> NnResult<()> {
        if self.check_u32(ptr) {
            Ok(())
        } else {
            Err(NnError::GuestMemory(what))
        }
    }

    pub fn store_u32(&mut self, ptr: u32, value: u32, what: &'static str) -> NnResult<()> {
        self.write_u32(ptr, value).ok_or(NnError::GuestMemory(what))
    }
}
