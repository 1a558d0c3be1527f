// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_FUEL_LEVEL, DEFAULT_LOG_FILTER, DEFAULT_TF_TEMP_DIR_PREFIX, DEFAULT_TORCH_INPUT_SLOTS,
    MAX_FUEL_LEVEL, MAX_TORCH_INPUT_SLOTS, MIN_FUEL_LEVEL,
};
use crate::errors::ConfigError;
use crate::nn::Backend;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main configuration structure for the wasi-nn host.
///
/// Every section is optional; an empty file (or no file at all) yields a host
/// with every compiled-in backend enabled and built-in defaults everywhere.
///
/// # Fields
/// * `backends` - Which inference backends to expose and their tuning knobs
/// * `logging` - Log filter used when `RUST_LOG` is not set
/// * `wasm` - Guest execution limits
///
/// # Example
/// ```yaml
/// backends:
///   enabled: [openvino, tflite]
///   pytorch:
///     max_input_slots: 16
/// logging:
///   filter: "wasi_nn_host=debug,info"
/// wasm:
///   fuel:
///     default: 100000000
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wasm: WasmConfig,
}

impl HostConfig {
    /// Checks every value that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backends.enabled_backends()?;
        check_range(
            "backends.pytorch.max_input_slots",
            self.backends.pytorch.max_input_slots,
            1,
            MAX_TORCH_INPUT_SLOTS,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: Option<u32>, min: u32, max: u32) -> Result<(), ConfigError> {
    match value {
        Some(v) if v < min || v > max => Err(ConfigError::OutOfRange {
            field,
            value: u64::from(v),
            min: u64::from(min),
            max: u64::from(max),
        }),
        _ => Ok(()),
    }
}

/// Backend selection and per-backend options.
///
/// # Fields
/// * `enabled` - Backend names to expose; `None` exposes everything compiled in
/// * `pytorch` - PyTorch adapter options
/// * `tensorflow` - Tensorflow adapter options
#[derive(Debug, Default, Deserialize)]
pub struct BackendsConfig {
    pub enabled: Option<Vec<String>>,
    #[serde(default)]
    pub pytorch: PyTorchOptions,
    #[serde(default)]
    pub tensorflow: TensorflowOptions,
}

impl BackendsConfig {
    /// Resolves `enabled` into backend tags. `None` means no restriction.
    pub fn enabled_backends(&self) -> Result<Option<Vec<Backend>>, ConfigError> {
        let Some(names) = &self.enabled else {
            return Ok(None);
        };
        names
            .iter()
            .map(|name| {
                Backend::from_config_name(name)
                    .ok_or_else(|| ConfigError::UnknownBackend { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// True when `backend` may be registered.
    pub fn is_enabled(&self, backend: Backend) -> bool {
        match &self.enabled {
            None => true,
            Some(names) => names
                .iter()
                .any(|name| Backend::from_config_name(name) == Some(backend)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PyTorchOptions {
    pub max_input_slots: Option<u32>,
}

impl PyTorchOptions {
    pub fn get_max_input_slots(&self) -> u32 {
        self.max_input_slots.unwrap_or(DEFAULT_TORCH_INPUT_SLOTS)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TensorflowOptions {
    pub temp_dir_prefix: Option<String>,
}

impl TensorflowOptions {
    pub fn get_temp_dir_prefix(&self) -> &str {
        self.temp_dir_prefix
            .as_deref()
            .unwrap_or(DEFAULT_TF_TEMP_DIR_PREFIX)
    }
}

/// Logging options.
///
/// `filter` is an `EnvFilter` directive string. `RUST_LOG` wins when set.
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Guest execution options.
///
/// # Example
/// ```yaml
/// wasm:
///   fuel:
///     default: 100000000
///     minimum: 1000000
///     maximum: 500000000
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct WasmConfig {
    #[serde(default)]
    pub fuel: FuelConfig,
}

/// Fuel consumption configuration for guest execution.
///
/// Fuel limits stop runaway guests by bounding the number of instructions they
/// may execute. Inference inside a native engine does not consume fuel.
///
/// # Fields
/// * `default` - Fuel given to each guest run (defaults to 100M)
/// * `minimum` - Minimum allowed fuel level (defaults to 1M)
/// * `maximum` - Maximum allowed fuel level (defaults to 500M) - security limit
#[derive(Debug, Default, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    /// Get the default fuel level, using built-in default if not configured.
    pub fn get_default(&self) -> u64 {
        self.default.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    /// Get the minimum fuel level, using built-in default if not configured.
    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    /// Get the maximum fuel level, using built-in default if not configured.
    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamp a fuel level to the configured bounds.
    ///
    /// # Example
    /// ```
    /// use wasi_nn_host::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// let fuel = config.validate_and_clamp(1_000_000_000); // Too high
    /// assert_eq!(fuel, 500_000_000); // Clamped to maximum
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum().max(min);

        let clamped = requested.clamp(min, max);
        if clamped != requested {
            tracing::warn!(
                "Fuel level {} outside [{}, {}], using {}",
                requested,
                min,
                max,
                clamped
            );
        }
        clamped
    }

    /// The fuel each guest run starts with.
    pub fn effective(&self) -> u64 {
        self.validate_and_clamp(self.get_default())
    }
}

/// Load and validate a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HostConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    // An empty document deserializes to null, not an empty map.
    let cfg: HostConfig = if content.trim().is_empty() {
        HostConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    cfg.validate()?;
    Ok(cfg)
}
