//! Unit generator entries of the configuration file.

use serde::{Deserialize, Serialize};
use synthdef_core::{
    CompileError, InputSpec, OutputArity, Rate, RateRequirement, RateSpec, UGenFlags, UGenSpec,
};

use crate::error::ConfigError;

/// Rate of a unit generator entry, as written in TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateName {
    /// Evaluated once.
    Scalar,
    /// Evaluated once per control block.
    Control,
    /// Evaluated once per sample.
    Audio,
    /// Evaluated when pulled.
    Demand,
    /// Follows the rate of the primary input.
    Maybe,
}

impl RateName {
    /// The concrete rate, or `None` for `maybe`.
    pub fn fixed(self) -> Option<Rate> {
        match self {
            RateName::Scalar => Some(Rate::Scalar),
            RateName::Control => Some(Rate::Control),
            RateName::Audio => Some(Rate::Audio),
            RateName::Demand => Some(Rate::Demand),
            RateName::Maybe => None,
        }
    }
}

/// Rate requirement of an input, as written in TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputRate {
    /// Any rate.
    #[default]
    Any,
    /// Audio rate whenever the node runs at audio rate.
    MatchAudio,
    /// Exactly scalar rate.
    Scalar,
    /// Exactly control rate.
    Control,
    /// Exactly audio rate.
    Audio,
    /// Exactly demand rate.
    Demand,
}

impl From<InputRate> for RateRequirement {
    fn from(rate: InputRate) -> Self {
        match rate {
            InputRate::Any => RateRequirement::Any,
            InputRate::MatchAudio => RateRequirement::MatchAudio,
            InputRate::Scalar => RateRequirement::Exactly(Rate::Scalar),
            InputRate::Control => RateRequirement::Exactly(Rate::Control),
            InputRate::Audio => RateRequirement::Exactly(Rate::Audio),
            InputRate::Demand => RateRequirement::Exactly(Rate::Demand),
        }
    }
}

/// Keyword forms of [`OutputsConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputKeyword {
    /// No outputs.
    Zero,
}

/// Output shape of an entry: an integer, `"zero"`, or `{ per_channel = n }`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutputsConfig {
    /// A fixed number of outputs.
    Count(u32),
    /// A keyword shape.
    Keyword(OutputKeyword),
    /// One output per channel of the variadic input at this index.
    PerChannel {
        /// Input index.
        per_channel: usize,
    },
}

impl Default for OutputsConfig {
    fn default() -> Self {
        OutputsConfig::Count(1)
    }
}

impl From<OutputsConfig> for OutputArity {
    fn from(outputs: OutputsConfig) -> Self {
        match outputs {
            OutputsConfig::Count(n) => OutputArity::Fixed(n),
            OutputsConfig::Keyword(OutputKeyword::Zero) => OutputArity::Zero,
            OutputsConfig::PerChannel { per_channel } => OutputArity::PerChannel(per_channel),
        }
    }
}

/// One declared input of an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Input name.
    pub name: String,

    /// Rate requirement.
    #[serde(default)]
    pub rate: InputRate,

    /// Whether the input takes any number of channels.
    #[serde(default)]
    pub variadic: bool,
}

impl InputConfig {
    /// Create a plain input accepting any rate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate: InputRate::Any,
            variadic: false,
        }
    }

    /// Set the rate requirement.
    pub fn with_rate(mut self, rate: InputRate) -> Self {
        self.rate = rate;
        self
    }

    /// Mark the input variadic.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// A user-defined unit generator descriptor.
///
/// # TOML Format
///
/// ```toml
/// [[ugens]]
/// name = "Lag"
/// rate = "maybe"
/// primary = 0
/// outputs = 1
///
/// [[ugens.inputs]]
/// name = "in"
/// rate = "match_audio"
///
/// [[ugens.inputs]]
/// name = "time"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UGenConfig {
    /// Descriptor name.
    pub name: String,

    /// Declared rate.
    pub rate: RateName,

    /// Primary input of a `maybe` entry (defaults to 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<usize>,

    /// Rates instances may be created at, besides the declared one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rates: Vec<RateName>,

    /// Acts on the server outside its outputs.
    #[serde(default)]
    pub side_effect: bool,

    /// Never merged with an identical instance.
    #[serde(default)]
    pub individual: bool,

    /// Produces a completion flag.
    #[serde(default)]
    pub done_flag: bool,

    /// Output shape.
    #[serde(default)]
    pub outputs: OutputsConfig,

    /// Declared inputs, in argument order.
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
}

impl UGenConfig {
    /// Create an entry with one output and no inputs.
    pub fn new(name: impl Into<String>, rate: RateName) -> Self {
        Self {
            name: name.into(),
            rate,
            primary: None,
            rates: Vec::new(),
            side_effect: false,
            individual: false,
            done_flag: false,
            outputs: OutputsConfig::default(),
            inputs: Vec::new(),
        }
    }

    /// Add an input.
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.inputs.push(input);
        self
    }

    /// Set the output shape.
    pub fn with_outputs(mut self, outputs: OutputsConfig) -> Self {
        self.outputs = outputs;
        self
    }

    /// Build the descriptor this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUGen`] if `primary` is given for a
    /// fixed-rate entry, `maybe` appears among `rates`, or the resulting
    /// descriptor fails [`UGenSpec::validate`].
    pub fn to_spec(&self) -> Result<UGenSpec, ConfigError> {
        let invalid = |reason: &str| ConfigError::invalid_ugen(&self.name, reason);

        let rate = match (self.rate.fixed(), self.primary) {
            (Some(rate), None) => RateSpec::Fixed(rate),
            (Some(_), Some(_)) => {
                return Err(invalid("'primary' is only allowed with rate = \"maybe\""));
            }
            (None, primary) => RateSpec::Maybe {
                primary: primary.unwrap_or(0),
            },
        };

        let rates = self
            .rates
            .iter()
            .map(|r| r.fixed().ok_or_else(|| invalid("'maybe' is not an instance rate")))
            .collect::<Result<Vec<_>, _>>()?;

        let mut spec = UGenSpec::new(&self.name, rate)
            .rates(rates)
            .outputs(self.outputs.into());
        spec.flags = UGenFlags {
            individual: self.individual,
            side_effect: self.side_effect,
            done_flag: self.done_flag,
        };
        spec.inputs = self
            .inputs
            .iter()
            .map(|input| {
                let base = if input.variadic {
                    InputSpec::variadic(&input.name)
                } else {
                    InputSpec::new(&input.name)
                };
                base.with_rate(input.rate.into())
            })
            .collect();

        spec.validate().map_err(|e| match e {
            CompileError::InvalidSpec { reason, .. } => invalid(&reason),
            other => invalid(&other.to_string()),
        })?;
        Ok(spec)
    }
}
