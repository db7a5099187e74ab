//! Error types for graph building and compilation.

use thiserror::Error;

use crate::ge::{NodeRef, PendingId};
use crate::rate::Rate;

/// Errors raised while building or compiling a graph.
///
/// Every failure is detected synchronously; no partial graph is ever
/// returned alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A descriptor received the wrong number of arguments.
    #[error("'{ugen}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        /// Descriptor name.
        ugen: String,
        /// Declared input count.
        expected: usize,
        /// Supplied argument count.
        found: usize,
    },

    /// An input runs at a rate that cannot be converted to the required one.
    #[error("input '{input}' of '{ugen}' requires {required} rate, got {actual}")]
    RateMismatch {
        /// Descriptor name.
        ugen: String,
        /// Input name.
        input: String,
        /// Rate the input requires.
        required: Rate,
        /// Rate of the supplied signal.
        actual: Rate,
    },

    /// An instance was requested at a rate its descriptor does not support.
    #[error("'{ugen}' cannot run at {rate} rate")]
    UnsupportedRate {
        /// Descriptor or control name.
        ugen: String,
        /// Requested rate.
        rate: Rate,
    },

    /// The primary input of a rate-polymorphic descriptor carries no signal.
    #[error("cannot resolve the rate of '{ugen}': its primary input carries no signal")]
    UnresolvedMaybeRate {
        /// Descriptor name.
        ugen: String,
    },

    /// The pending nodes reference each other in a cycle.
    #[error("cycle detected through '{ugen}'")]
    CyclicGraph {
        /// Name of a descriptor on the cycle.
        ugen: String,
    },

    /// A zero-output signal was used as a single-channel input.
    #[error("input '{input}' of '{ugen}' receives a signal with no channels")]
    EmptyInput {
        /// Descriptor name.
        ugen: String,
        /// Input name.
        input: String,
    },

    /// A multichannel value without channels was supplied.
    #[error("multichannel value has no channels")]
    EmptyBundle,

    /// Two controls share a name.
    #[error("control '{0}' already exists")]
    DuplicateControl(String),

    /// A node reference does not point at an existing node output.
    #[error("reference {0} does not name an existing node output")]
    InvalidReference(NodeRef),

    /// The pending id does not belong to this builder.
    #[error("{0} is not known to this builder")]
    UnknownPending(PendingId),

    /// A forward declaration was defined twice.
    #[error("'{ugen}' ({id}) is already defined")]
    AlreadyDefined {
        /// Descriptor name.
        ugen: String,
        /// Pending id of the declaration.
        id: PendingId,
    },

    /// A forward declaration was never given its arguments.
    #[error("'{ugen}' ({id}) was declared but never defined")]
    Undefined {
        /// Descriptor name.
        ugen: String,
        /// Pending id of the declaration.
        id: PendingId,
    },

    /// Expansion produced more nodes than the configured limit.
    #[error("expansion exceeds the limit of {limit} nodes")]
    TooManyNodes {
        /// Configured maximum.
        limit: usize,
    },

    /// A descriptor is internally inconsistent.
    #[error("invalid descriptor '{ugen}': {reason}")]
    InvalidSpec {
        /// Descriptor name.
        ugen: String,
        /// What is wrong.
        reason: String,
    },
}
