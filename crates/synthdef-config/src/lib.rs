//! Configuration for the synthdef compiler.
//!
//! Loads compiler and codec settings, and user-defined unit generator
//! descriptors, from TOML files.
//!
//! # Features
//!
//! - **Settings**: Node cap for compilation, name checking for decoding
//! - **Catalog extensions**: Describe extra unit generators in TOML and
//!   register them with a [`UGenRegistry`]
//! - **Validation**: Inconsistent entries are rejected before anything is
//!   registered
//!
//! # Example
//!
//! ```rust
//! use synthdef_config::Config;
//! use synthdef_registry::UGenRegistry;
//!
//! let config = Config::from_toml(r#"
//!     [compiler]
//!     max_nodes = 4096
//!
//!     [[ugens]]
//!     name = "Blip"
//!     rate = "audio"
//!     [[ugens.inputs]]
//!     name = "freq"
//!     [[ugens.inputs]]
//!     name = "numharm"
//! "#).unwrap();
//!
//! let mut registry = UGenRegistry::new();
//! config.register_ugens(&mut registry).unwrap();
//! assert!(registry.contains("Blip"));
//! assert_eq!(config.compile_options().max_nodes, 4096);
//! ```

mod config;
mod error;
mod ugen_config;

pub use config::{CodecConfig, CompilerConfig, Config};
pub use error::ConfigError;
pub use ugen_config::{InputConfig, InputRate, OutputKeyword, OutputsConfig, RateName, UGenConfig};

/// Re-export the registry the catalog extensions are added to.
pub use synthdef_registry::UGenRegistry;
