// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors raised while reading or validating a host configuration file
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        path: String,
        source: std::io::Error,
    },
    /// The file is not valid YAML for the configuration schema
    Parse(serde_yaml::Error),
    /// `backends.enabled` names something that is not a wasi-nn backend
    UnknownBackend {
        /// The name as written in the file
        name: String,
    },
    /// A numeric option is outside its accepted range
    OutOfRange {
        /// Dotted path of the option, e.g. `backends.pytorch.max_input_slots`
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config '{}': {}", path, source)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::UnknownBackend { name } => {
                write!(
                    f,
                    "Unknown backend '{}' (expected one of openvino, tensorflow, pytorch, tensorflowlite)",
                    name
                )
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(
                    f,
                    "'{}' is {} but must be between {} and {}",
                    field, value, min, max
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err)
    }
}
