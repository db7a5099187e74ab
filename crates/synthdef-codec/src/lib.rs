//! Synthdef Codec - binary graph definition files
//!
//! Encodes compiled [`SynthDef`](synthdef_core::SynthDef)s into the byte
//! format a synthesis server loads, and decodes such files back.
//!
//! # Format
//!
//! All integers and floats are big-endian; strings are a one-byte length
//! followed by UTF-8 bytes.
//!
//! ```text
//! file     := "SCgf" | version:i32 (= 2) | def_count:u16 | def*
//! def      := name:pstring | graph
//! graph    := const_count:u32 | f32*
//!           | control_count:u32 | control*
//!           | node_count:u32 | node*
//! control  := name:pstring | rate:u8 | default:f32 | index:u32
//! node     := name:pstring | rate:u8
//!           | input_count:u32 | input*
//!           | output_count:u32 | rate:u8*
//!           | flags:u8                  (bit 0 side effect, bit 1 done flag)
//! input    := 0x00 constant:u32
//!           | 0x01 node:u32 output:u32
//! ```
//!
//! # Example
//!
//! ```rust
//! use synthdef_codec::{decode, encode};
//! use synthdef_core::{CompileOptions, GE, GraphBuilder, compile_def};
//! use synthdef_registry::UGenRegistry;
//!
//! let registry = UGenRegistry::new();
//! let mut b = GraphBuilder::new();
//! let sig = b.add(registry.get("WhiteNoise").unwrap(), []).unwrap();
//! b.add(registry.get("Out").unwrap(), [GE::Const(0.0), sig]).unwrap();
//! let def = compile_def("noise", &b, &CompileOptions::default()).unwrap();
//!
//! let bytes = encode(&def).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), def);
//! ```

pub mod decode;
pub mod encode;
pub mod error;

pub use decode::{Decoder, decode, decode_all, decode_with_registry};
pub use encode::{encode, encode_all};
pub use error::{CodecError, Corruption};

/// File magic.
pub const MAGIC: [u8; 4] = *b"SCgf";
/// The only supported format version.
pub const FORMAT_VERSION: i32 = 2;

pub(crate) const TAG_CONSTANT: u8 = 0x00;
pub(crate) const TAG_NODE: u8 = 0x01;

pub(crate) const FLAG_SIDE_EFFECT: u8 = 0b01;
pub(crate) const FLAG_DONE: u8 = 0b10;
