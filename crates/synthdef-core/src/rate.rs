//! Execution rates.
//!
//! Every expanded node runs at exactly one [`Rate`]. Descriptors whose rate
//! depends on their inputs declare [`RateSpec::Maybe`]; the expander resolves
//! it to a definite rate before the node exists, so an undecided rate can
//! never reach the orderer or the codec.

use core::fmt;

/// Execution frequency class of a node.
///
/// The ordering (`Scalar < Control < Audio < Demand`) follows the wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rate {
    /// Computed once when the synth starts.
    Scalar,
    /// Computed once per control block.
    Control,
    /// Computed once per audio sample.
    Audio,
    /// Computed on request from a demand-driven consumer.
    Demand,
}

impl Rate {
    /// All rates in tag order.
    pub const ALL: [Rate; 4] = [Rate::Scalar, Rate::Control, Rate::Audio, Rate::Demand];

    /// Wire tag of this rate.
    pub const fn tag(self) -> u8 {
        match self {
            Rate::Scalar => 0,
            Rate::Control => 1,
            Rate::Audio => 2,
            Rate::Demand => 3,
        }
    }

    /// Inverse of [`tag()`](Self::tag). Returns `None` for unknown tags.
    pub const fn from_tag(tag: u8) -> Option<Rate> {
        match tag {
            0 => Some(Rate::Scalar),
            1 => Some(Rate::Control),
            2 => Some(Rate::Audio),
            3 => Some(Rate::Demand),
            _ => None,
        }
    }

    /// Short lowercase name (`"scalar"`, `"control"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Rate::Scalar => "scalar",
            Rate::Control => "control",
            Rate::Audio => "audio",
            Rate::Demand => "demand",
        }
    }

    /// Parses the lowercase name produced by [`name()`](Self::name).
    pub fn from_name(name: &str) -> Option<Rate> {
        Rate::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared rate of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateSpec {
    /// The node always runs at this rate.
    Fixed(Rate),
    /// The node adopts the rate of input `primary` once it is expanded.
    ///
    /// A constant primary input resolves to [`Rate::Control`].
    Maybe {
        /// Index of the input whose rate is adopted.
        primary: usize,
    },
}

impl RateSpec {
    /// `Maybe` with the conventional primary input 0.
    pub const MAYBE: RateSpec = RateSpec::Maybe { primary: 0 };

    /// Returns the fixed rate, or `None` for `Maybe`.
    pub const fn fixed(self) -> Option<Rate> {
        match self {
            RateSpec::Fixed(rate) => Some(rate),
            RateSpec::Maybe { .. } => None,
        }
    }
}

impl From<Rate> for RateSpec {
    fn from(rate: Rate) -> Self {
        RateSpec::Fixed(rate)
    }
}

/// Rate a node input must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateRequirement {
    /// Any rate is accepted.
    #[default]
    Any,
    /// Must run at audio rate whenever the consuming node runs at audio rate.
    MatchAudio,
    /// Must run at exactly this rate.
    Exactly(Rate),
}

impl RateRequirement {
    /// Rate required from an input of a node running at `node_rate`, if any.
    pub const fn required(self, node_rate: Rate) -> Option<Rate> {
        match self {
            RateRequirement::Any => None,
            RateRequirement::MatchAudio => match node_rate {
                Rate::Audio => Some(Rate::Audio),
                _ => None,
            },
            RateRequirement::Exactly(rate) => Some(rate),
        }
    }
}

/// How a signal at `actual` rate reaches an input that requires `required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// The input can be read as-is.
    Direct,
    /// A conversion node with this name must be inserted.
    Convert(&'static str),
    /// No legal conversion exists.
    Impossible,
}

/// Name of the control-to-audio conversion node.
pub const K2A: &str = "K2A";
/// Name of the audio-to-control conversion node.
pub const A2K: &str = "A2K";

/// Decides how a signal running at `actual` rate feeds an input requiring `required`.
pub const fn coercion(actual: Rate, required: Rate) -> Coercion {
    match (actual, required) {
        (a, r) if a as u8 == r as u8 => Coercion::Direct,
        (Rate::Demand, _) | (_, Rate::Demand) => Coercion::Impossible,
        (Rate::Scalar | Rate::Control, Rate::Audio) => Coercion::Convert(K2A),
        (Rate::Audio, Rate::Control) => Coercion::Convert(A2K),
        (Rate::Scalar, Rate::Control) => Coercion::Direct,
        _ => Coercion::Impossible,
    }
}
