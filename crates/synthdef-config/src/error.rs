//! Error types for configuration operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A compiler or codec setting is out of range
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Dotted key of the setting.
        key: &'static str,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// A unit generator entry is inconsistent
    #[error("invalid unit generator '{name}': {reason}")]
    InvalidUGen {
        /// Name of the entry.
        name: String,
        /// Description of why the entry is invalid.
        reason: String,
    },

    /// A unit generator name is declared twice or already registered
    #[error("duplicate unit generator: {0}")]
    DuplicateUGen(String),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid unit generator error.
    pub fn invalid_ugen(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidUGen {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
