// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display`; call sites log them with
//! `tracing::info!("{}", msg)` and friends.
//!
//! * `nn` - wasi-nn host function and backend adapter events
//! * `runner` - guest module loading and execution events

pub mod nn;
pub mod runner;
