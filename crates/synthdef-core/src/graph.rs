//! The compiled artifact.
//!
//! A [`SynthGraph`] is flat and ordered: a constants pool, a controls pool,
//! and a node table in which every input points strictly backwards. It is
//! what the codec serializes and what the decoder reconstructs.

use core::fmt;

use thiserror::Error;

use crate::ge::NodeRef;
use crate::rate::Rate;

/// A resolved node input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// Index into the constants pool.
    Constant(u32),
    /// Output of an earlier node.
    Node(NodeRef),
}

/// One node of a compiled graph.
#[derive(Debug, Clone, PartialEq)]
pub struct UGen {
    /// Descriptor name.
    pub name: String,
    /// Resolved rate.
    pub rate: Rate,
    /// Resolved inputs.
    pub inputs: Vec<Input>,
    /// Rate of each output; its length is the output arity.
    pub outputs: Vec<Rate>,
    /// Acts on the server outside its outputs.
    pub side_effect: bool,
    /// Produces a completion flag.
    pub done_flag: bool,
}

impl UGen {
    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Iterates over the node references among the inputs.
    pub fn node_inputs(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            Input::Node(r) => Some(*r),
            Input::Constant(_) => None,
        })
    }
}

/// A named external parameter of a compiled graph.
///
/// Defaults compare by bit pattern, so a NaN default equals itself.
#[derive(Debug, Clone)]
pub struct Control {
    /// Parameter name.
    pub name: String,
    /// Parameter rate.
    pub rate: Rate,
    /// Initial value.
    pub default: f32,
    /// Position in the server's flat control array.
    pub index: u32,
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.rate == other.rate
            && self.default.to_bits() == other.default.to_bits()
            && self.index == other.index
    }
}

/// Flat, ordered, fully resolved unit-generator graph.
///
/// Equality compares constants by bit pattern, matching how the compiler
/// pools them and how the codec stores them.
#[derive(Debug, Clone, Default)]
pub struct SynthGraph {
    /// Constants pool, in first-use order.
    pub constants: Vec<f32>,
    /// Controls pool, ordered by control index.
    pub controls: Vec<Control>,
    /// Node table, in emission order.
    pub nodes: Vec<UGen>,
}

impl PartialEq for SynthGraph {
    fn eq(&self, other: &Self) -> bool {
        self.constants.len() == other.constants.len()
            && self
                .constants
                .iter()
                .zip(&other.constants)
                .all(|(a, b)| a.to_bits() == b.to_bits())
            && self.controls == other.controls
            && self.nodes == other.nodes
    }
}

/// A named [`SynthGraph`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynthDef {
    /// Definition name.
    pub name: String,
    /// The compiled graph.
    pub graph: SynthGraph,
}

impl SynthDef {
    /// Pairs a name with a graph.
    pub fn new(name: impl Into<String>, graph: SynthGraph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }
}

/// A broken structural invariant of a [`SynthGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphViolation {
    /// A node reads from itself or from a later node.
    #[error("node {node} reads from node {target}, which is not earlier")]
    ForwardReference {
        /// Index of the reading node.
        node: usize,
        /// Referenced node index.
        target: u32,
    },
    /// A node reads an output slot its producer does not have.
    #[error("node {node} reads output {output} of node {target}, which has {available}")]
    OutputOutOfRange {
        /// Index of the reading node.
        node: usize,
        /// Referenced node index.
        target: u32,
        /// Referenced output slot.
        output: u32,
        /// Output count of the referenced node.
        available: usize,
    },
    /// A node reads a constant that is not in the pool.
    #[error("node {node} reads constant {index}, pool has {available}")]
    ConstantOutOfRange {
        /// Index of the reading node.
        node: usize,
        /// Referenced constant index.
        index: u32,
        /// Pool size.
        available: usize,
    },
    /// A control's index lies outside the control array.
    #[error("control '{name}' has index {index}, but there are {available} controls")]
    ControlOutOfRange {
        /// Control name.
        name: String,
        /// Declared index.
        index: u32,
        /// Number of controls.
        available: usize,
    },
    /// A control is declared at a rate controls cannot have.
    #[error("control '{name}' cannot run at {rate} rate")]
    InvalidControlRate {
        /// Control name.
        name: String,
        /// Declared rate.
        rate: Rate,
    },
    /// Two controls share one index.
    #[error("controls '{first}' and '{second}' share index {index}")]
    DuplicateControlIndex {
        /// Earlier control with the index.
        first: String,
        /// Later control with the index.
        second: String,
        /// Shared index.
        index: u32,
    },
}

impl SynthGraph {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Indices of the nodes with the given name, in emission order.
    pub fn find_all(&self, name: &str) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.name == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Looks up a control by name.
    pub fn control(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.name == name)
    }

    /// Value of a constant input, or `None` for node inputs and bad indices.
    pub fn constant_value(&self, input: Input) -> Option<f32> {
        match input {
            Input::Constant(index) => self.constants.get(index as usize).copied(),
            Input::Node(_) => None,
        }
    }

    /// Checks that every reference points backwards at an existing output,
    /// that every constant index is in range, and that the control indices
    /// are distinct positions of the control array held by non-demand
    /// controls.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphViolation`] found.
    pub fn validate(&self) -> Result<(), GraphViolation> {
        for (node, ugen) in self.nodes.iter().enumerate() {
            for input in &ugen.inputs {
                match *input {
                    Input::Constant(index) => {
                        if index as usize >= self.constants.len() {
                            return Err(GraphViolation::ConstantOutOfRange {
                                node,
                                index,
                                available: self.constants.len(),
                            });
                        }
                    }
                    Input::Node(r) => {
                        if r.node as usize >= node {
                            return Err(GraphViolation::ForwardReference {
                                node,
                                target: r.node,
                            });
                        }
                        let available = self.nodes[r.node as usize].output_count();
                        if r.output as usize >= available {
                            return Err(GraphViolation::OutputOutOfRange {
                                node,
                                target: r.node,
                                output: r.output,
                                available,
                            });
                        }
                    }
                }
            }
        }
        let mut owners: Vec<Option<&str>> = vec![None; self.controls.len()];
        for control in &self.controls {
            if control.rate == Rate::Demand {
                return Err(GraphViolation::InvalidControlRate {
                    name: control.name.clone(),
                    rate: control.rate,
                });
            }
            let Some(owner) = owners.get_mut(control.index as usize) else {
                return Err(GraphViolation::ControlOutOfRange {
                    name: control.name.clone(),
                    index: control.index,
                    available: self.controls.len(),
                });
            };
            if let Some(first) = *owner {
                return Err(GraphViolation::DuplicateControlIndex {
                    first: first.to_string(),
                    second: control.name.clone(),
                    index: control.index,
                });
            }
            *owner = Some(control.name.as_str());
        }
        Ok(())
    }
}

impl fmt::Display for SynthGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ugen) in self.nodes.iter().enumerate() {
            write!(f, "[{i}] {} @{} (", ugen.name, ugen.rate)?;
            for (k, input) in ugen.inputs.iter().enumerate() {
                if k > 0 {
                    f.write_str(", ")?;
                }
                match input {
                    Input::Constant(c) => match self.constants.get(*c as usize) {
                        Some(v) => write!(f, "{v}")?,
                        None => write!(f, "const[{c}]")?,
                    },
                    Input::Node(r) => write!(f, "{r}")?,
                }
            }
            writeln!(f, ") -> {} out", ugen.outputs.len())?;
        }
        Ok(())
    }
}
