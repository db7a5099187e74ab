//! Multichannel expansion and rate resolution.
//!
//! The expander turns the builder's pending nodes into a flat list of
//! concrete nodes. Pending nodes are visited depth-first in post-order, so a
//! node is only expanded once every one of its inputs is concrete; that is
//! what lets a rate-polymorphic node read the rate of its primary input.
//!
//! # Multichannel expansion
//!
//! When a non-variadic argument is a bundle of width *n*, the descriptor is
//! instantiated *n* times, once per channel, with the other arguments
//! broadcast. Several bundles expand to the widest one; narrower bundles wrap
//! around (`channel = i % width`) rather than being padded. Nested bundles
//! expand recursively.
//!
//! # Rate coercion
//!
//! An input whose signal runs at the wrong rate gets a conversion node
//! (`K2A` or `A2K`) spliced in front of it. Constants satisfy every
//! requirement. When no conversion exists the expansion fails with
//! [`CompileError::RateMismatch`].

use std::collections::HashMap;

use crate::builder::GraphBuilder;
use crate::error::CompileError;
use crate::ge::{GE, NodeRef, PendingId};
use crate::graph::Input;
use crate::rate::{Coercion, Rate, RateSpec, coercion};
use crate::spec::{InputSpec, OutputArity, UGenFlags, UGenSpec};

/// Name of the node carrying scalar and control-rate controls.
pub const CONTROL: &str = "Control";
/// Name of the node carrying audio-rate controls.
pub const AUDIO_CONTROL: &str = "AudioControl";

/// An expanded value: the GE algebra without pending nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Numeric constant.
    Const(f32),
    /// One output of a concrete node.
    Out(NodeRef),
    /// Parallel channels. Empty for zero-output nodes.
    Bundle(Vec<Signal>),
}

impl Signal {
    /// Top-level channels of this signal.
    pub fn channels(self) -> Vec<Signal> {
        match self {
            Signal::Bundle(channels) => channels,
            other => vec![other],
        }
    }

    /// Appends every leaf (constant or node output), depth-first.
    pub fn flatten_into(&self, out: &mut Vec<Signal>) {
        match self {
            Signal::Bundle(channels) => {
                for ch in channels {
                    ch.flatten_into(out);
                }
            }
            leaf => out.push(leaf.clone()),
        }
    }

    /// Every leaf of this signal, depth-first.
    pub fn leaves(&self) -> Vec<Signal> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

/// A concrete node as produced by the expander, before ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ExpandedNode {
    pub name: String,
    pub rate: Rate,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Rate>,
    pub flags: UGenFlags,
}

/// Output of a full expansion pass.
#[derive(Debug, Clone)]
pub(crate) struct Expanded {
    /// Nodes in discovery order. Inputs only refer to earlier nodes.
    pub nodes: Vec<ExpandedNode>,
    /// Constants pool in discovery order.
    pub constants: Vec<f32>,
}

/// Expansion context.
///
/// Owns the growing node table and constants pool. Custom
/// [`ExpandFn`](crate::ExpandFn) hooks receive it to build their result.
pub struct Expansion<'a> {
    builder: &'a GraphBuilder,
    nodes: Vec<ExpandedNode>,
    constants: Vec<f32>,
    constant_index: HashMap<u32, u32>,
    max_nodes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnPath,
    Done,
}

/// Expands every pending node of `builder`.
pub(crate) fn expand(builder: &GraphBuilder, max_nodes: usize) -> Result<Expanded, CompileError> {
    let mut ex = Expansion {
        builder,
        nodes: Vec::new(),
        constants: Vec::new(),
        constant_index: HashMap::new(),
        max_nodes,
    };
    ex.emit_controls()?;

    let count = builder.len();
    let mut values: Vec<Option<Signal>> = vec![None; count];
    let mut state = vec![Visit::Unvisited; count];

    for root in builder.pending_ids() {
        if state[root.0 as usize] == Visit::Done {
            continue;
        }
        // (id, children_done)
        let mut stack: Vec<(PendingId, bool)> = vec![(root, false)];
        while let Some((id, children_done)) = stack.pop() {
            let idx = id.0 as usize;
            let node = builder
                .pending_node(id)
                .ok_or(CompileError::UnknownPending(id))?;
            let args = node.args.as_ref().ok_or_else(|| CompileError::Undefined {
                ugen: node.spec.name.clone(),
                id,
            })?;

            if children_done {
                let signals = args
                    .iter()
                    .map(|ge| ex.resolve(ge, &values))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = ex.expand(&node.spec, node.rate, signals)?;
                values[idx] = Some(value);
                state[idx] = Visit::Done;
                continue;
            }

            match state[idx] {
                Visit::Done => continue,
                Visit::OnPath => {
                    return Err(CompileError::CyclicGraph {
                        ugen: node.spec.name.clone(),
                    });
                }
                Visit::Unvisited => {}
            }
            state[idx] = Visit::OnPath;
            stack.push((id, true));

            let mut deps = Vec::new();
            for arg in args {
                arg.collect_pending(&mut deps);
            }
            // Reversed so the first argument is expanded first.
            for dep in deps.into_iter().rev() {
                match state[dep.0 as usize] {
                    Visit::Done => {}
                    Visit::OnPath => {
                        return Err(CompileError::CyclicGraph {
                            ugen: builder
                                .pending_node(dep)
                                .map_or_else(|| dep.to_string(), |n| n.spec.name.clone()),
                        });
                    }
                    Visit::Unvisited => stack.push((dep, false)),
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "expand: {} pending nodes -> {} nodes, {} constants",
        count,
        ex.nodes.len(),
        ex.constants.len()
    );

    Ok(Expanded {
        nodes: ex.nodes,
        constants: ex.constants,
    })
}

impl Expansion<'_> {
    /// Expands one instance of `spec`, using its custom hook if it has one.
    ///
    /// # Errors
    ///
    /// Any expansion error of the descriptor or its hook.
    pub fn expand(
        &mut self,
        spec: &UGenSpec,
        rate: RateSpec,
        args: Vec<Signal>,
    ) -> Result<Signal, CompileError> {
        match spec.expand {
            Some(hook) => hook(self, rate, args),
            None => self.instantiate(spec, rate, args),
        }
    }

    /// Generic multichannel expansion of one instance of `spec`.
    ///
    /// Ignores the descriptor's custom hook, so hooks can call it for the
    /// descriptors they are built from.
    ///
    /// # Errors
    ///
    /// - [`CompileError::ArityMismatch`] if `args` does not match the inputs.
    /// - [`CompileError::EmptyInput`] / [`CompileError::UnresolvedMaybeRate`]
    ///   for zero-channel arguments.
    /// - Rate and limit errors from node emission.
    pub fn instantiate(
        &mut self,
        spec: &UGenSpec,
        rate: RateSpec,
        args: Vec<Signal>,
    ) -> Result<Signal, CompileError> {
        if args.len() != spec.inputs.len() {
            return Err(CompileError::ArityMismatch {
                ugen: spec.name.clone(),
                expected: spec.inputs.len(),
                found: args.len(),
            });
        }

        let mut width = 0;
        for (k, (arg, input)) in args.iter().zip(&spec.inputs).enumerate() {
            if input.variadic {
                continue;
            }
            if let Signal::Bundle(channels) = arg {
                if channels.is_empty() {
                    return Err(Self::empty_input(spec, rate, k, input));
                }
                width = width.max(channels.len());
            }
        }

        if width == 0 {
            return self.emit(spec, rate, &args);
        }

        let mut out = Vec::with_capacity(width);
        for i in 0..width {
            let channel_args = args
                .iter()
                .zip(&spec.inputs)
                .map(|(arg, input)| match arg {
                    Signal::Bundle(channels) if !input.variadic => {
                        channels[i % channels.len()].clone()
                    }
                    other => other.clone(),
                })
                .collect();
            out.push(self.instantiate(spec, rate, channel_args)?);
        }
        Ok(Signal::Bundle(out))
    }

    /// Rate of a leaf signal; `None` for constants and bundles.
    pub fn rate_of(&self, signal: &Signal) -> Option<Rate> {
        match signal {
            Signal::Out(r) => self.output_rate(*r).ok(),
            Signal::Const(_) | Signal::Bundle(_) => None,
        }
    }

    /// Number of nodes emitted so far.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // --- Internal helpers ---

    fn empty_input(spec: &UGenSpec, rate: RateSpec, k: usize, input: &InputSpec) -> CompileError {
        match rate {
            RateSpec::Maybe { primary } if primary == k => CompileError::UnresolvedMaybeRate {
                ugen: spec.name.clone(),
            },
            _ => CompileError::EmptyInput {
                ugen: spec.name.clone(),
                input: input.name.clone(),
            },
        }
    }

    /// Converts a GE whose pending nodes are all expanded into a signal.
    fn resolve(&self, ge: &GE, values: &[Option<Signal>]) -> Result<Signal, CompileError> {
        match ge {
            GE::Const(v) => Ok(Signal::Const(*v)),
            GE::Single(r) => {
                self.output_rate(*r)?;
                Ok(Signal::Out(*r))
            }
            GE::Multi(channels) => channels
                .iter()
                .map(|ch| self.resolve(ch, values))
                .collect::<Result<Vec<_>, _>>()
                .map(Signal::Bundle),
            GE::Unexpanded(id) => values
                .get(id.0 as usize)
                .and_then(Clone::clone)
                .ok_or_else(|| CompileError::CyclicGraph {
                    ugen: self
                        .builder
                        .pending_node(*id)
                        .map_or_else(|| id.to_string(), |n| n.spec.name.clone()),
                }),
        }
    }

    fn output_rate(&self, r: NodeRef) -> Result<Rate, CompileError> {
        self.nodes
            .get(r.node as usize)
            .and_then(|n| n.outputs.get(r.output as usize))
            .copied()
            .ok_or(CompileError::InvalidReference(r))
    }

    fn intern(&mut self, value: f32) -> u32 {
        let next = self.constants.len() as u32;
        let index = *self.constant_index.entry(value.to_bits()).or_insert(next);
        if index == next {
            self.constants.push(value);
        }
        index
    }

    fn push_node(&mut self, node: ExpandedNode) -> Result<u32, CompileError> {
        if self.nodes.len() >= self.max_nodes {
            return Err(CompileError::TooManyNodes {
                limit: self.max_nodes,
            });
        }
        self.nodes.push(node);
        Ok((self.nodes.len() - 1) as u32)
    }

    /// Emits one control node per rate group, at indices `0..groups`.
    fn emit_controls(&mut self) -> Result<(), CompileError> {
        for &(rate, count) in self.builder.control_groups() {
            let name = if rate == Rate::Audio { AUDIO_CONTROL } else { CONTROL };
            self.push_node(ExpandedNode {
                name: name.to_string(),
                rate,
                inputs: Vec::new(),
                outputs: vec![rate; count as usize],
                flags: UGenFlags {
                    individual: true,
                    ..UGenFlags::default()
                },
            })?;
        }
        Ok(())
    }

    fn resolve_rate(&self, spec: &UGenSpec, rate: RateSpec, args: &[Signal]) -> Result<Rate, CompileError> {
        let primary = match rate {
            RateSpec::Fixed(rate) => return Ok(rate),
            RateSpec::Maybe { primary } => primary,
        };
        let unresolved = || CompileError::UnresolvedMaybeRate {
            ugen: spec.name.clone(),
        };
        let arg = args.get(primary).ok_or_else(unresolved)?;
        let first = match arg {
            Signal::Bundle(_) => arg.leaves().into_iter().next().ok_or_else(unresolved)?,
            leaf => leaf.clone(),
        };
        match first {
            Signal::Out(r) => self.output_rate(r),
            _ => Ok(Rate::Control),
        }
    }

    /// Emits a single concrete node. Non-variadic arguments are leaves.
    fn emit(&mut self, spec: &UGenSpec, rate: RateSpec, args: &[Signal]) -> Result<Signal, CompileError> {
        let node_rate = self.resolve_rate(spec, rate, args)?;

        let mut inputs = Vec::new();
        let mut per_input_counts = Vec::with_capacity(args.len());
        for (arg, input) in args.iter().zip(&spec.inputs) {
            let leaves = arg.leaves();
            per_input_counts.push(leaves.len());
            for leaf in leaves {
                let resolved = self.coerce(spec, input, node_rate, leaf)?;
                inputs.push(resolved);
            }
        }

        let output_count = match spec.outputs {
            OutputArity::Fixed(n) => n as usize,
            OutputArity::PerChannel(k) => per_input_counts.get(k).copied().unwrap_or(0),
            OutputArity::Zero => 0,
        };

        let index = self.push_node(ExpandedNode {
            name: spec.name.clone(),
            rate: node_rate,
            inputs,
            outputs: vec![node_rate; output_count],
            flags: spec.flags,
        })?;

        Ok(match output_count {
            0 => Signal::Bundle(Vec::new()),
            1 => Signal::Out(NodeRef::new(index, 0)),
            n => Signal::Bundle(
                (0..n as u32)
                    .map(|slot| Signal::Out(NodeRef::new(index, slot)))
                    .collect(),
            ),
        })
    }

    fn coerce(
        &mut self,
        spec: &UGenSpec,
        input: &InputSpec,
        node_rate: Rate,
        leaf: Signal,
    ) -> Result<Input, CompileError> {
        let r = match leaf {
            Signal::Const(v) => return Ok(Input::Constant(self.intern(v))),
            Signal::Out(r) => r,
            Signal::Bundle(_) => {
                return Err(CompileError::EmptyInput {
                    ugen: spec.name.clone(),
                    input: input.name.clone(),
                });
            }
        };
        let actual = self.output_rate(r)?;
        let Some(required) = input.rate.required(node_rate) else {
            return Ok(Input::Node(r));
        };
        match coercion(actual, required) {
            Coercion::Direct => Ok(Input::Node(r)),
            Coercion::Convert(name) => {
                let index = self.push_node(ExpandedNode {
                    name: name.to_string(),
                    rate: required,
                    inputs: vec![Input::Node(r)],
                    outputs: vec![required],
                    flags: UGenFlags::default(),
                })?;
                #[cfg(feature = "tracing")]
                tracing::debug!("expand: {name} inserted for input '{}' of '{}'", input.name, spec.name);
                Ok(Input::Node(NodeRef::new(index, 0)))
            }
            Coercion::Impossible => Err(CompileError::RateMismatch {
                ugen: spec.name.clone(),
                input: input.name.clone(),
                required,
                actual,
            }),
        }
    }
}
