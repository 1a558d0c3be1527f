// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default fuel level for guest execution (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Input slots a PyTorch execution context may grow to
pub const DEFAULT_TORCH_INPUT_SLOTS: u32 = 64;
pub const MAX_TORCH_INPUT_SLOTS: u32 = 1024;

/// Name prefix of the temporary SavedModel export directories
pub const DEFAULT_TF_TEMP_DIR_PREFIX: &str = "WASINN_TF_";

/// `EnvFilter` directive used when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest input blob the OpenVINO adapter will build from a guest shape
pub const MAX_INPUT_BLOB_BYTES: usize = 256 * 1024 * 1024;
