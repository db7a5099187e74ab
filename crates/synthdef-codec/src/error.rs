//! Codec error types.

use synthdef_core::GraphViolation;
use thiserror::Error;

/// Errors raised while encoding or decoding graph definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A name does not fit a length-prefixed string.
    #[error("name '{name}' is {len} bytes long, the limit is 255")]
    NameTooLong {
        /// The offending name.
        name: String,
        /// Its length in bytes.
        len: usize,
    },

    /// A table has more entries than its count field can express.
    #[error("too many {what}: {count} (at most {max})")]
    TooMany {
        /// What is being counted.
        what: &'static str,
        /// Number of entries.
        count: usize,
        /// Largest encodable count.
        max: usize,
    },

    /// A definition handed to the encoder breaks a structural invariant.
    #[error("definition '{def}': {violation}")]
    InvalidGraph {
        /// Definition name.
        def: String,
        /// The broken invariant.
        violation: GraphViolation,
    },

    /// The byte buffer is not a well-formed graph definition file.
    #[error("corrupt encoding at byte {offset}: {kind}")]
    CorruptEncoding {
        /// Byte offset at which the problem was detected.
        offset: usize,
        /// What is wrong.
        kind: Corruption,
    },

    /// A decoded node names a unit generator the registry does not know.
    #[error("definition '{def}': node {node} uses unknown unit generator '{name}'")]
    UnknownDescriptor {
        /// Definition name.
        def: String,
        /// Node index within the definition.
        node: usize,
        /// Unit generator name.
        name: String,
    },
}

/// The ways a byte buffer can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
    /// The file does not start with the expected magic.
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),

    /// The format version is not supported.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(i32),

    /// The buffer ends in the middle of a field.
    #[error("truncated: needed {needed} more bytes, {available} available")]
    Truncated {
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// A rate tag is outside the known set.
    #[error("unknown rate tag {0}")]
    UnknownRate(u8),

    /// An input tag is neither constant nor node.
    #[error("unknown input tag {0:#04x}")]
    UnknownInputTag(u8),

    /// A flags byte sets bits with no assigned meaning.
    #[error("reserved flag bits set in {0:#04x}")]
    ReservedFlags(u8),

    /// A name is not valid UTF-8.
    #[error("name is not valid UTF-8")]
    InvalidUtf8,

    /// Bytes remain after the last definition.
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),

    /// A single definition was expected.
    #[error("expected exactly one definition, found {0}")]
    DefinitionCount(u16),

    /// The decoded graph breaks a structural invariant.
    #[error(transparent)]
    Invalid(#[from] GraphViolation),
}
