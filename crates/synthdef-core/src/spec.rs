//! Unit-generator descriptors.
//!
//! A [`UGenSpec`] is the whole contract the compiler needs from the catalog:
//! a name, a declared rate, the inputs, the output arity shape, behavioural
//! flags, and optionally a custom expansion. The expander depends only on
//! this type, never on concrete generator types.

use core::fmt;

use crate::error::CompileError;
use crate::expand::{Expansion, Signal};
use crate::rate::{Rate, RateRequirement, RateSpec};

/// Custom expansion hook.
///
/// Receives the expanded arguments (one [`Signal`] per declared input) and the
/// rate requested for this instance, and builds the result through the
/// [`Expansion`] context. Descriptors without a hook use the generic
/// multichannel expansion.
pub type ExpandFn = fn(&mut Expansion<'_>, RateSpec, Vec<Signal>) -> Result<Signal, CompileError>;

/// Output arity shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputArity {
    /// A fixed number of outputs.
    Fixed(u32),
    /// One output per channel of the given variadic input.
    PerChannel(usize),
    /// No outputs (pure sinks such as bus writers).
    Zero,
}

/// Behavioural flags of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UGenFlags {
    /// Carries hidden state that must not be shared with an identical twin.
    pub individual: bool,
    /// Acts on the server outside its outputs; never merged, order preserved.
    pub side_effect: bool,
    /// Produces a completion flag the server can observe.
    pub done_flag: bool,
}

/// Declared input of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSpec {
    /// Argument name, used in error messages.
    pub name: String,
    /// Rate the argument must carry.
    pub rate: RateRequirement,
    /// Consumes a whole bundle as a flat input list instead of fanning out.
    pub variadic: bool,
}

impl InputSpec {
    /// A single-channel input accepting any rate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate: RateRequirement::Any,
            variadic: false,
        }
    }

    /// A variadic input accepting any rate.
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            variadic: true,
            ..Self::new(name)
        }
    }

    /// Sets the rate requirement.
    pub fn with_rate(mut self, rate: RateRequirement) -> Self {
        self.rate = rate;
        self
    }
}

/// Descriptor of one unit generator.
#[derive(Clone)]
pub struct UGenSpec {
    /// Name as sent to the server.
    pub name: String,
    /// Declared rate.
    pub rate: RateSpec,
    /// Rates an instance may be explicitly created at. Empty means only the
    /// declared rate (or anything, for `Maybe` descriptors).
    pub rates: Vec<Rate>,
    /// Declared inputs, in argument order.
    pub inputs: Vec<InputSpec>,
    /// Output arity shape.
    pub outputs: OutputArity,
    /// Behavioural flags.
    pub flags: UGenFlags,
    /// Custom expansion, if any.
    pub expand: Option<ExpandFn>,
}

impl fmt::Debug for UGenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UGenSpec")
            .field("name", &self.name)
            .field("rate", &self.rate)
            .field("rates", &self.rates)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("flags", &self.flags)
            .field("custom_expand", &self.expand.is_some())
            .finish()
    }
}

impl UGenSpec {
    /// Creates a single-output descriptor with no inputs.
    pub fn new(name: impl Into<String>, rate: impl Into<RateSpec>) -> Self {
        Self {
            name: name.into(),
            rate: rate.into(),
            rates: Vec::new(),
            inputs: Vec::new(),
            outputs: OutputArity::Fixed(1),
            flags: UGenFlags::default(),
            expand: None,
        }
    }

    /// Appends a single-channel input accepting any rate.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputSpec::new(name));
        self
    }

    /// Appends an input with a rate requirement.
    pub fn input_at(mut self, name: impl Into<String>, rate: RateRequirement) -> Self {
        self.inputs.push(InputSpec::new(name).with_rate(rate));
        self
    }

    /// Appends a variadic input.
    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputSpec::variadic(name));
        self
    }

    /// Sets the rates an instance may be created at.
    pub fn rates(mut self, rates: impl IntoIterator<Item = Rate>) -> Self {
        self.rates = rates.into_iter().collect();
        self
    }

    /// Sets the output arity shape.
    pub fn outputs(mut self, outputs: OutputArity) -> Self {
        self.outputs = outputs;
        self
    }

    /// Marks the descriptor as individual.
    pub fn individual(mut self) -> Self {
        self.flags.individual = true;
        self
    }

    /// Marks the descriptor as side-effecting.
    pub fn side_effect(mut self) -> Self {
        self.flags.side_effect = true;
        self
    }

    /// Marks the descriptor as producing a done flag.
    pub fn done_flag(mut self) -> Self {
        self.flags.done_flag = true;
        self
    }

    /// Installs a custom expansion.
    pub fn with_expand(mut self, expand: ExpandFn) -> Self {
        self.expand = Some(expand);
        self
    }

    /// Whether an instance may be created at `rate`.
    pub fn supports_rate(&self, rate: Rate) -> bool {
        if self.rates.contains(&rate) {
            return true;
        }
        match self.rate {
            RateSpec::Fixed(declared) => declared == rate,
            RateSpec::Maybe { .. } => self.rates.is_empty(),
        }
    }

    /// Checks the descriptor's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidSpec`] if the name is empty, a `Maybe`
    /// primary input does not exist, or a per-channel output shape does not
    /// name a variadic input.
    pub fn validate(&self) -> Result<(), CompileError> {
        let invalid = |reason: String| CompileError::InvalidSpec {
            ugen: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty".into()));
        }
        if let RateSpec::Maybe { primary } = self.rate
            && primary >= self.inputs.len()
        {
            return Err(invalid(format!(
                "primary input {primary} out of range ({} inputs)",
                self.inputs.len()
            )));
        }
        if let OutputArity::PerChannel(index) = self.outputs {
            match self.inputs.get(index) {
                Some(input) if input.variadic => {}
                Some(input) => {
                    return Err(invalid(format!(
                        "per-channel outputs follow input '{}', which is not variadic",
                        input.name
                    )));
                }
                None => {
                    return Err(invalid(format!(
                        "per-channel outputs follow input {index}, which does not exist"
                    )));
                }
            }
        }
        Ok(())
    }
}
