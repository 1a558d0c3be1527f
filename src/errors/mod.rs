// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod host;
mod nn;

pub use config::ConfigError;
pub use host::{HostError, HostResult, COMPONENT_BINARY_UNSUPPORTED};
pub use nn::{EngineError, EngineResult, ErrNo, NnError, NnResult};
