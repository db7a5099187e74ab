//! Encoder: [`SynthDef`] to bytes.

use synthdef_core::{Input, SynthDef, SynthGraph};

use crate::error::CodecError;
use crate::{FLAG_DONE, FLAG_SIDE_EFFECT, FORMAT_VERSION, MAGIC, TAG_CONSTANT, TAG_NODE};

/// Encodes a single definition as a complete file.
///
/// # Errors
///
/// See [`encode_all()`].
pub fn encode(def: &SynthDef) -> Result<Vec<u8>, CodecError> {
    encode_all(std::slice::from_ref(def))
}

/// Encodes several definitions as one file.
///
/// Encoding is deterministic: equal definitions always yield equal bytes.
///
/// # Errors
///
/// - [`CodecError::NameTooLong`] if a definition, control or node name is
///   longer than 255 bytes.
/// - [`CodecError::TooMany`] if a table exceeds its count field.
/// - [`CodecError::InvalidGraph`] if a graph fails
///   [`SynthGraph::validate`]; nothing is written for such a graph.
pub fn encode_all(defs: &[SynthDef]) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::default();
    w.bytes(&MAGIC);
    w.i32(FORMAT_VERSION);
    w.u16(count_u16("definitions", defs.len())?);

    for def in defs {
        def.graph.validate().map_err(|violation| CodecError::InvalidGraph {
            def: def.name.clone(),
            violation,
        })?;
        w.pstring(&def.name)?;
        w.graph(&def.graph)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("encode: {} definitions, {} bytes", defs.len(), w.data.len());

    Ok(w.data)
}

/// Big-endian byte sink.
#[derive(Default)]
struct Writer {
    data: Vec<u8>,
}

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_be_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.bytes(&v.to_be_bytes());
    }

    fn count(&mut self, what: &'static str, n: usize) -> Result<(), CodecError> {
        let n = u32::try_from(n).map_err(|_| CodecError::TooMany {
            what,
            count: n,
            max: u32::MAX as usize,
        })?;
        self.u32(n);
        Ok(())
    }

    fn pstring(&mut self, s: &str) -> Result<(), CodecError> {
        let len = u8::try_from(s.len()).map_err(|_| CodecError::NameTooLong {
            name: s.to_string(),
            len: s.len(),
        })?;
        self.u8(len);
        self.bytes(s.as_bytes());
        Ok(())
    }

    fn graph(&mut self, graph: &SynthGraph) -> Result<(), CodecError> {
        self.count("constants", graph.constants.len())?;
        for &c in &graph.constants {
            self.f32(c);
        }

        self.count("controls", graph.controls.len())?;
        for control in &graph.controls {
            self.pstring(&control.name)?;
            self.u8(control.rate.tag());
            self.f32(control.default);
            self.u32(control.index);
        }

        self.count("nodes", graph.nodes.len())?;
        for node in &graph.nodes {
            self.pstring(&node.name)?;
            self.u8(node.rate.tag());

            self.count("inputs", node.inputs.len())?;
            for input in &node.inputs {
                match *input {
                    Input::Constant(index) => {
                        self.u8(TAG_CONSTANT);
                        self.u32(index);
                    }
                    Input::Node(r) => {
                        self.u8(TAG_NODE);
                        self.u32(r.node);
                        self.u32(r.output);
                    }
                }
            }

            self.count("outputs", node.outputs.len())?;
            for rate in &node.outputs {
                self.u8(rate.tag());
            }

            let mut flags = 0u8;
            if node.side_effect {
                flags |= FLAG_SIDE_EFFECT;
            }
            if node.done_flag {
                flags |= FLAG_DONE;
            }
            self.u8(flags);
        }
        Ok(())
    }
}

fn count_u16(what: &'static str, n: usize) -> Result<u16, CodecError> {
    u16::try_from(n).map_err(|_| CodecError::TooMany {
        what,
        count: n,
        max: u16::MAX as usize,
    })
}
