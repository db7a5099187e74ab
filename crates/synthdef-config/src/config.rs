//! Configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use synthdef_codec::Decoder;
use synthdef_core::{CompileOptions, DEFAULT_MAX_NODES, UGenSpec};
use synthdef_registry::{RegistryError, UGenRegistry};

use crate::error::ConfigError;
use crate::ugen_config::UGenConfig;

/// Compiler settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Maximum number of nodes one compilation may emit.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

/// Codec settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodecConfig {
    /// Check decoded node names against the registry.
    #[serde(default = "default_validate_names")]
    pub validate_names: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            validate_names: true,
        }
    }
}

fn default_validate_names() -> bool {
    true
}

/// Compiler configuration, including user-defined unit generators.
///
/// # TOML Format
///
/// ```toml
/// [compiler]
/// max_nodes = 65536
///
/// [codec]
/// validate_names = true
///
/// [[ugens]]
/// name = "Blip"
/// rate = "audio"
/// rates = ["audio", "control"]
///
/// [[ugens.inputs]]
/// name = "freq"
/// rate = "match_audio"
///
/// [[ugens.inputs]]
/// name = "numharm"
/// ```
///
/// Every section is optional; missing values take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Codec settings.
    #[serde(default)]
    pub codec: CodecConfig,

    /// User-defined unit generators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ugens: Vec<UGenConfig>,
}

impl Config {
    /// Create a configuration with default settings and no unit generators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the node cap.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.compiler.max_nodes = max_nodes;
        self
    }

    /// Add a unit generator entry.
    pub fn with_ugen(mut self, ugen: UGenConfig) -> Self {
        self.ugens.push(ugen);
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a configuration from a TOML string.
    ///
    /// The parsed configuration is validated with [`validate()`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the settings and every unit generator entry.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidSetting`] for a zero node cap.
    /// - [`ConfigError::InvalidUGen`] for an inconsistent entry.
    /// - [`ConfigError::DuplicateUGen`] if two entries share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.specs().map(|_| ())
    }

    /// Compiler options described by the `[compiler]` section.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::default().with_max_nodes(self.compiler.max_nodes)
    }

    /// Decoder described by the `[codec]` section.
    ///
    /// With `validate_names` set, the decoder checks node names against
    /// `registry`.
    pub fn decoder<'r>(&self, registry: &'r UGenRegistry) -> Decoder<'r> {
        if self.codec.validate_names {
            Decoder::new().with_registry(registry)
        } else {
            Decoder::new()
        }
    }

    /// Register every unit generator entry with `registry`.
    ///
    /// Either all entries are registered or none is.
    ///
    /// # Errors
    ///
    /// - The errors of [`validate()`](Self::validate).
    /// - [`ConfigError::DuplicateUGen`] if an entry's name is already
    ///   registered.
    pub fn register_ugens(&self, registry: &mut UGenRegistry) -> Result<Vec<Arc<UGenSpec>>, ConfigError> {
        let specs = self.specs()?;
        if let Some(taken) = specs.iter().find(|s| registry.contains(&s.name)) {
            return Err(ConfigError::DuplicateUGen(taken.name.clone()));
        }

        specs
            .into_iter()
            .map(|spec| {
                let ugen = spec.name.clone();
                registry.register(spec).map_err(|e| match e {
                    RegistryError::Duplicate(name) => ConfigError::DuplicateUGen(name),
                    RegistryError::Invalid(err) => ConfigError::invalid_ugen(ugen, err.to_string()),
                })
            })
            .collect()
    }

    /// Validated descriptors for every entry, in file order.
    fn specs(&self) -> Result<Vec<UGenSpec>, ConfigError> {
        if self.compiler.max_nodes == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "compiler.max_nodes",
                reason: "must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.ugens.len());
        for ugen in &self.ugens {
            if !seen.insert(ugen.name.as_str()) {
                return Err(ConfigError::DuplicateUGen(ugen.name.clone()));
            }
            specs.push(ugen.to_spec()?);
        }
        Ok(specs)
    }
}
