// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // inference backend adapters
pub mod config;     // host config
pub mod errors;     // error handling
pub mod nn;         // wasi_ephemeral_nn host functions
pub mod observability;
pub mod runner;     // guest execution
