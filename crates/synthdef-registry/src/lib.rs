//! Unit-generator descriptor registry.
//!
//! A [`UGenRegistry`] maps descriptor names to shared [`UGenSpec`]s. Graph
//! code looks descriptors up by name before adding instances, and the decoder
//! checks every node name of an incoming graph against it.
//!
//! Registries are plain values: create one, extend it, pass it where it is
//! needed. There is no global registry.
//!
//! # Example
//!
//! ```rust
//! use synthdef_core::{CompileOptions, GE, GraphBuilder, compile};
//! use synthdef_registry::UGenRegistry;
//!
//! let registry = UGenRegistry::new();
//! let sin = registry.get("SinOsc").unwrap();
//! let out = registry.get("Out").unwrap();
//!
//! let mut b = GraphBuilder::new();
//! let sig = b.add(sin, [GE::Const(440.0), GE::Const(0.0)]).unwrap();
//! b.add(out, [GE::Const(0.0), sig]).unwrap();
//!
//! let graph = compile(&b, &CompileOptions::default()).unwrap();
//! assert!(graph.nodes.iter().all(|n| registry.contains(&n.name)));
//! ```

mod catalog;

use std::sync::Arc;

use synthdef_core::{CompileError, UGenSpec};
use thiserror::Error;

pub use catalog::mix;

/// Errors raised when registering a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The descriptor is internally inconsistent.
    #[error(transparent)]
    Invalid(#[from] CompileError),

    /// A descriptor with this name is already registered.
    #[error("unit generator '{0}' is already registered")]
    Duplicate(String),
}

/// Registry of unit-generator descriptors, in registration order.
#[derive(Debug, Clone)]
pub struct UGenRegistry {
    entries: Vec<Arc<UGenSpec>>,
}

impl Default for UGenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UGenRegistry {
    /// Creates a registry holding the builtin catalog.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for spec in catalog::builtins() {
            registry.entries.push(Arc::new(spec));
        }
        registry
    }

    /// Creates a registry with no descriptors.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a descriptor and returns the shared handle to it.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Invalid`] if [`UGenSpec::validate`] fails.
    /// - [`RegistryError::Duplicate`] if the name is taken.
    pub fn register(&mut self, spec: UGenSpec) -> Result<Arc<UGenSpec>, RegistryError> {
        spec.validate()?;
        if self.contains(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        let spec = Arc::new(spec);
        self.entries.push(Arc::clone(&spec));
        Ok(spec)
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&Arc<UGenSpec>> {
        self.entries.iter().find(|s| s.name == name)
    }

    /// Returns true if a descriptor with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns all descriptors in registration order.
    pub fn all(&self) -> Vec<&Arc<UGenSpec>> {
        self.entries.iter().collect()
    }

    /// Iterates over the descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<UGenSpec>> {
        self.entries.iter()
    }

    /// Returns the number of registered descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no descriptors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a UGenRegistry {
    type Item = &'a Arc<UGenSpec>;
    type IntoIter = std::slice::Iter<'a, Arc<UGenSpec>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthdef_core::{OutputArity, Rate, RateSpec};

    const BUILTIN_COUNT: usize = 22;

    #[test]
    fn test_registry_creation() {
        let registry = UGenRegistry::new();
        assert_eq!(registry.len(), BUILTIN_COUNT);
        assert!(!registry.is_empty());
        assert!(UGenRegistry::empty().is_empty());
    }

    #[test]
    fn test_all_builtins_validate() {
        for spec in &UGenRegistry::new() {
            assert_eq!(spec.validate(), Ok(()), "builtin '{}' is invalid", spec.name);
        }
    }

    #[test]
    fn test_builtin_names_unique() {
        let registry = UGenRegistry::new();
        for spec in registry.iter() {
            let count = registry.iter().filter(|s| s.name == spec.name).count();
            assert_eq!(count, 1, "duplicate builtin '{}'", spec.name);
        }
    }

    #[test]
    fn test_get_descriptor() {
        let registry = UGenRegistry::new();

        let pan = registry.get("Pan2").unwrap();
        assert_eq!(pan.outputs, OutputArity::Fixed(2));
        assert_eq!(pan.inputs.len(), 3);

        assert!(registry.get("Nonexistent").is_none());
        assert!(!registry.contains("sinosc"));
    }

    #[test]
    fn test_builtin_flags() {
        let registry = UGenRegistry::new();
        assert!(registry.get("WhiteNoise").unwrap().flags.individual);
        assert!(registry.get("PinkNoise").unwrap().flags.individual);
        assert!(registry.get("Out").unwrap().flags.side_effect);
        assert!(registry.get("FFT").unwrap().flags.side_effect);
        assert!(registry.get("Line").unwrap().flags.done_flag);
        assert_eq!(registry.get("Dseq").unwrap().rate, RateSpec::Fixed(Rate::Demand));
        assert!(matches!(
            registry.get("Demand").unwrap().outputs,
            OutputArity::PerChannel(2)
        ));
        assert!(registry.get("Mix").unwrap().expand.is_some());
    }

    #[test]
    fn test_registration_order() {
        let registry = UGenRegistry::new();
        let names: Vec<&str> = registry
            .all()
            .into_iter()
            .take(4)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Control", "AudioControl", "K2A", "A2K"]);
    }

    #[test]
    fn test_register_custom() {
        let mut registry = UGenRegistry::new();
        let spec = registry
            .register(UGenSpec::new("Blip", Rate::Audio).input("freq").input("numharm"))
            .unwrap();
        assert_eq!(spec.name, "Blip");
        assert_eq!(registry.len(), BUILTIN_COUNT + 1);
        assert!(Arc::ptr_eq(registry.get("Blip").unwrap(), &spec));
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let mut registry = UGenRegistry::new();
        let err = registry
            .register(UGenSpec::new("SinOsc", Rate::Audio))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("SinOsc".into()));
        assert_eq!(registry.len(), BUILTIN_COUNT);
    }

    #[test]
    fn test_register_invalid_rejected() {
        let mut registry = UGenRegistry::empty();
        let err = registry
            .register(UGenSpec::new("Lag", RateSpec::Maybe { primary: 2 }).input("in"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Invalid(CompileError::InvalidSpec { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UGenRegistry>();
        assert_send_sync::<synthdef_core::GraphBuilder>();
        assert_send_sync::<synthdef_core::SynthDef>();

        let registry = Arc::new(UGenRegistry::new());
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get("SinOsc").map(|s| s.name.clone()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("SinOsc"));
        }
    }
}
