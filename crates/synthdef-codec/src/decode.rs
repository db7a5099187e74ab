//! Decoder: bytes to [`SynthDef`].
//!
//! The decoder trusts nothing. Every count is checked against the bytes that
//! remain, every tag against its closed set, and every decoded graph against
//! [`SynthGraph::validate`], so a buffer either decodes to a well-formed
//! definition or fails with [`CodecError::CorruptEncoding`].

use synthdef_core::{Control, Input, NodeRef, Rate, SynthDef, SynthGraph, UGen};
use synthdef_registry::UGenRegistry;

use crate::error::{CodecError, Corruption};
use crate::{FLAG_DONE, FLAG_SIDE_EFFECT, FORMAT_VERSION, MAGIC, TAG_CONSTANT, TAG_NODE};

/// Smallest possible encoded size of one control record.
const MIN_CONTROL_LEN: usize = 1 + 1 + 4 + 4;
/// Smallest possible encoded size of one node record.
const MIN_NODE_LEN: usize = 1 + 1 + 4 + 4 + 1;
/// Smallest possible encoded size of one input.
const MIN_INPUT_LEN: usize = 1 + 4;

/// Configurable decoder.
///
/// Without a registry, any node name is accepted. With one, every node name
/// must be registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder<'r> {
    registry: Option<&'r UGenRegistry>,
}

impl<'r> Decoder<'r> {
    /// Creates a decoder that accepts any node name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks node names against `registry`.
    pub fn with_registry(mut self, registry: &'r UGenRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Decodes every definition in `bytes`.
    ///
    /// # Errors
    ///
    /// - [`CodecError::CorruptEncoding`] for any malformed input.
    /// - [`CodecError::UnknownDescriptor`] if a registry is set and a node
    ///   name is not in it.
    pub fn decode_all(&self, bytes: &[u8]) -> Result<Vec<SynthDef>, CodecError> {
        let mut r = Reader::new(bytes);

        let magic = r.array::<4>()?;
        if magic != MAGIC {
            return Err(r.corrupt_at(0, Corruption::BadMagic(magic)));
        }
        let version = r.i32()?;
        if version != FORMAT_VERSION {
            return Err(r.corrupt_at(4, Corruption::UnsupportedVersion(version)));
        }

        let count = r.u16()?;
        let mut defs = Vec::with_capacity(usize::from(count).min(r.remaining()));
        for _ in 0..count {
            let name = r.pstring()?;
            let graph = r.graph()?;
            defs.push(SynthDef::new(name, graph));
        }

        if r.remaining() > 0 {
            return Err(r.corrupt(Corruption::TrailingBytes(r.remaining())));
        }

        if let Some(registry) = self.registry {
            check_names(&defs, registry)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("decode: {} definitions from {} bytes", defs.len(), bytes.len());

        Ok(defs)
    }

    /// Decodes a file holding exactly one definition.
    ///
    /// # Errors
    ///
    /// Same as [`decode_all()`](Self::decode_all), plus
    /// [`Corruption::DefinitionCount`] when the file holds zero or several
    /// definitions.
    pub fn decode(&self, bytes: &[u8]) -> Result<SynthDef, CodecError> {
        let mut defs = self.decode_all(bytes)?;
        if defs.len() != 1 {
            return Err(CodecError::CorruptEncoding {
                offset: 8,
                kind: Corruption::DefinitionCount(u16::try_from(defs.len()).unwrap_or(u16::MAX)),
            });
        }
        Ok(defs.swap_remove(0))
    }
}

/// Decodes a file holding exactly one definition, accepting any node name.
///
/// # Errors
///
/// See [`Decoder::decode`].
pub fn decode(bytes: &[u8]) -> Result<SynthDef, CodecError> {
    Decoder::new().decode(bytes)
}

/// Decodes every definition of a file, accepting any node name.
///
/// # Errors
///
/// See [`Decoder::decode_all`].
pub fn decode_all(bytes: &[u8]) -> Result<Vec<SynthDef>, CodecError> {
    Decoder::new().decode_all(bytes)
}

/// Decodes every definition of a file and checks node names against `registry`.
///
/// # Errors
///
/// See [`Decoder::decode_all`].
pub fn decode_with_registry(bytes: &[u8], registry: &UGenRegistry) -> Result<Vec<SynthDef>, CodecError> {
    Decoder::new().with_registry(registry).decode_all(bytes)
}

fn check_names(defs: &[SynthDef], registry: &UGenRegistry) -> Result<(), CodecError> {
    for def in defs {
        for (node, ugen) in def.graph.nodes.iter().enumerate() {
            if !registry.contains(&ugen.name) {
                return Err(CodecError::UnknownDescriptor {
                    def: def.name.clone(),
                    node,
                    name: ugen.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Big-endian cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn corrupt(&self, kind: Corruption) -> CodecError {
        self.corrupt_at(self.pos, kind)
    }

    fn corrupt_at(&self, offset: usize, kind: Corruption) -> CodecError {
        CodecError::CorruptEncoding { offset, kind }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let Some(bytes) = self.data.get(self.pos..self.pos + n) else {
            return Err(self.corrupt(Corruption::Truncated {
                needed: n,
                available: self.remaining(),
            }));
        };
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    /// Reads a u32 count and checks that `count * min_len` bytes remain.
    fn count(&mut self, min_len: usize) -> Result<usize, CodecError> {
        let count = self.u32()? as usize;
        let needed = count.saturating_mul(min_len);
        if needed > self.remaining() {
            return Err(self.corrupt(Corruption::Truncated {
                needed,
                available: self.remaining(),
            }));
        }
        Ok(count)
    }

    fn pstring(&mut self) -> Result<String, CodecError> {
        let len = usize::from(self.u8()?);
        let start = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| self.corrupt_at(start, Corruption::InvalidUtf8))
    }

    fn rate(&mut self) -> Result<Rate, CodecError> {
        let tag = self.u8()?;
        Rate::from_tag(tag).ok_or_else(|| self.corrupt_at(self.pos - 1, Corruption::UnknownRate(tag)))
    }

    fn input(&mut self) -> Result<Input, CodecError> {
        match self.u8()? {
            TAG_CONSTANT => Ok(Input::Constant(self.u32()?)),
            TAG_NODE => {
                let node = self.u32()?;
                let output = self.u32()?;
                Ok(Input::Node(NodeRef::new(node, output)))
            }
            tag => Err(self.corrupt_at(self.pos - 1, Corruption::UnknownInputTag(tag))),
        }
    }

    fn control(&mut self) -> Result<Control, CodecError> {
        let name = self.pstring()?;
        let rate = self.rate()?;
        let default = self.f32()?;
        let index = self.u32()?;
        Ok(Control {
            name,
            rate,
            default,
            index,
        })
    }

    fn node(&mut self) -> Result<UGen, CodecError> {
        let name = self.pstring()?;
        let rate = self.rate()?;

        let input_count = self.count(MIN_INPUT_LEN)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(self.input()?);
        }

        let output_count = self.count(1)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(self.rate()?);
        }

        let flags = self.u8()?;
        if flags & !(FLAG_SIDE_EFFECT | FLAG_DONE) != 0 {
            return Err(self.corrupt_at(self.pos - 1, Corruption::ReservedFlags(flags)));
        }

        Ok(UGen {
            name,
            rate,
            inputs,
            outputs,
            side_effect: flags & FLAG_SIDE_EFFECT != 0,
            done_flag: flags & FLAG_DONE != 0,
        })
    }

    fn graph(&mut self) -> Result<SynthGraph, CodecError> {
        let start = self.pos;

        let constant_count = self.count(4)?;
        let mut constants = Vec::with_capacity(constant_count);
        for _ in 0..constant_count {
            constants.push(self.f32()?);
        }

        let control_count = self.count(MIN_CONTROL_LEN)?;
        let mut controls = Vec::with_capacity(control_count);
        for _ in 0..control_count {
            controls.push(self.control()?);
        }

        let node_count = self.count(MIN_NODE_LEN)?;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            nodes.push(self.node()?);
        }

        let graph = SynthGraph {
            constants,
            controls,
            nodes,
        };
        graph
            .validate()
            .map_err(|v| self.corrupt_at(start, Corruption::Invalid(v)))?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use synthdef_core::GraphViolation;

    use super::*;
    use crate::encode::encode;

    fn header(count: u16) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&count.to_be_bytes());
        bytes
    }

    /// One definition named "d" holding a single node record.
    fn one_node(record: &[u8]) -> Vec<u8> {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[1, b'd']);
        bytes.extend_from_slice(&0u32.to_be_bytes()); // constants
        bytes.extend_from_slice(&0u32.to_be_bytes()); // controls
        bytes.extend_from_slice(&1u32.to_be_bytes()); // nodes
        bytes.extend_from_slice(record);
        bytes
    }

    fn kind(err: CodecError) -> Corruption {
        match err {
            CodecError::CorruptEncoding { kind, .. } => kind,
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    /// Record of a zero-input, one-output node with the given tags.
    fn record(rate: u8, flags: u8) -> Vec<u8> {
        let mut r = vec![1, b'N', rate];
        r.extend_from_slice(&0u32.to_be_bytes());
        r.extend_from_slice(&1u32.to_be_bytes());
        r.push(rate);
        r.push(flags);
        r
    }

    #[test]
    fn test_minimal_node_decodes() {
        let def = decode(&one_node(&record(2, FLAG_DONE))).unwrap();
        assert_eq!(def.name, "d");
        assert_eq!(def.graph.nodes[0].rate, Rate::Audio);
        assert!(def.graph.nodes[0].done_flag);
        assert!(!def.graph.nodes[0].side_effect);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = header(0);
        bytes[0] = b'X';
        assert_eq!(kind(decode_all(&bytes).unwrap_err()), Corruption::BadMagic(*b"XCgf"));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = header(0);
        bytes[7] = 1;
        assert_eq!(
            kind(decode_all(&bytes).unwrap_err()),
            Corruption::UnsupportedVersion(1)
        );
    }

    #[test]
    fn test_unknown_rate_tag() {
        let err = decode(&one_node(&record(9, 0))).unwrap_err();
        assert_eq!(kind(err), Corruption::UnknownRate(9));
    }

    #[test]
    fn test_reserved_flags() {
        let err = decode(&one_node(&record(2, 0x04))).unwrap_err();
        assert_eq!(kind(err), Corruption::ReservedFlags(0x04));
    }

    #[test]
    fn test_unknown_input_tag() {
        let mut r = vec![1, b'N', 2];
        r.extend_from_slice(&1u32.to_be_bytes());
        r.push(0x02);
        r.extend_from_slice(&[0; 8]);
        r.extend_from_slice(&0u32.to_be_bytes());
        r.push(0);
        let err = decode(&one_node(&r)).unwrap_err();
        assert_eq!(kind(err), Corruption::UnknownInputTag(2));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut r = vec![1, b'N', 2];
        r.extend_from_slice(&1u32.to_be_bytes());
        r.push(TAG_NODE);
        r.extend_from_slice(&0u32.to_be_bytes());
        r.extend_from_slice(&0u32.to_be_bytes());
        r.extend_from_slice(&1u32.to_be_bytes());
        r.push(2);
        r.push(0);
        let err = decode(&one_node(&r)).unwrap_err();
        assert!(matches!(kind(err), Corruption::Invalid(_)));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[2, 0xff, 0xfe]);
        let err = decode_all(&bytes).unwrap_err();
        assert_eq!(
            err,
            CodecError::CorruptEncoding {
                offset: 11,
                kind: Corruption::InvalidUtf8
            }
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = header(0);
        bytes.push(0);
        assert_eq!(kind(decode_all(&bytes).unwrap_err()), Corruption::TrailingBytes(1));
    }

    #[test]
    fn test_huge_count_is_truncation() {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[1, b'd']);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            kind(decode_all(&bytes).unwrap_err()),
            Corruption::Truncated { .. }
        ));
    }

    #[test]
    fn test_decode_requires_one_definition() {
        let bytes = header(0);
        assert_eq!(
            kind(decode(&bytes).unwrap_err()),
            Corruption::DefinitionCount(0)
        );
        assert!(decode_all(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_registry_rejects_unknown_names() {
        let registry = UGenRegistry::new();
        let bytes = one_node(&record(2, 0));
        let err = decode_with_registry(&bytes, &registry).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownDescriptor {
                def: "d".into(),
                node: 0,
                name: "N".into()
            }
        );
        assert!(Decoder::new().decode(&bytes).is_ok());
    }

    #[test]
    fn test_demand_control_rejected() {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[1, b'd']);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&[1, b'c', 3]);
        bytes.extend_from_slice(&0.0f32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(
            decode_all(&bytes).unwrap_err(),
            CodecError::CorruptEncoding {
                offset: 12,
                kind: Corruption::Invalid(GraphViolation::InvalidControlRate {
                    name: "c".into(),
                    rate: Rate::Demand,
                }),
            }
        );
    }

    #[test]
    fn test_duplicate_control_index_rejected() {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[1, b'd']);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        for name in [b'a', b'b'] {
            bytes.extend_from_slice(&[1, name, 1]);
            bytes.extend_from_slice(&0.5f32.to_be_bytes());
            bytes.extend_from_slice(&0u32.to_be_bytes());
        }
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            kind(decode_all(&bytes).unwrap_err()),
            Corruption::Invalid(GraphViolation::DuplicateControlIndex { index: 0, .. })
        ));
    }

    #[test]
    fn test_encoded_graph_decodes() {
        let def = decode(&one_node(&record(1, FLAG_SIDE_EFFECT))).unwrap();
        assert_eq!(decode(&encode(&def).unwrap()).unwrap(), def);
    }
}
