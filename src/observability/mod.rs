// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! This module provides centralized message types for diagnostic and operational
//! logging in the wasi-nn host. Message types follow a struct-based pattern with
//! `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered through the adapters
//! * Keep log wording consistent between backends
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::nn` - host function calls, backend registration and adapter events
//! * `messages::runner` - guest loading, engine creation and execution events
//!
//! # Usage
//!
//! ```rust
//! use wasi_nn_host::nn::Backend;
//! use wasi_nn_host::observability::messages::nn::OutputTruncated;
//!
//! let msg = OutputTruncated {
//!     backend: Backend::OpenVino,
//!     index: 0,
//!     available: 4000,
//!     written: 1024,
//! };
//!
//! tracing::warn!("{}", msg);
//! ```

pub mod messages;
