//! Compilation entry point: expand, order, assemble.

use crate::builder::GraphBuilder;
use crate::error::CompileError;
use crate::expand::expand;
use crate::graph::{Control, SynthDef, SynthGraph, UGen};
use crate::order::order;

/// Default cap on the number of expanded nodes.
pub const DEFAULT_MAX_NODES: usize = 65_536;

/// Options for one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Maximum number of nodes the expander may emit, conversion and
    /// control nodes included. Guards against combinatorial blow-up of
    /// nested multichannel expansion.
    pub max_nodes: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl CompileOptions {
    /// Sets the node cap.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

/// Compiles `builder` into a flat, ordered [`SynthGraph`].
///
/// Compilation is a pure function of the builder and the options: the same
/// input always yields the same graph.
///
/// # Errors
///
/// Returns the first [`CompileError`] raised by expansion or ordering. No
/// partial graph is produced.
pub fn compile(builder: &GraphBuilder, options: &CompileOptions) -> Result<SynthGraph, CompileError> {
    let expanded = expand(builder, options.max_nodes)?;
    let ordered = order(expanded)?;

    let nodes = ordered
        .nodes
        .into_iter()
        .map(|node| UGen {
            name: node.name,
            rate: node.rate,
            inputs: node.inputs,
            outputs: node.outputs,
            side_effect: node.flags.side_effect,
            done_flag: node.flags.done_flag,
        })
        .collect();

    let graph = SynthGraph {
        constants: ordered.constants,
        controls: controls_pool(builder),
        nodes,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!("compile: {} nodes\n{graph}", graph.node_count());

    Ok(graph)
}

/// Compiles `builder` and names the result.
///
/// # Errors
///
/// See [`compile()`].
pub fn compile_def(
    name: impl Into<String>,
    builder: &GraphBuilder,
    options: &CompileOptions,
) -> Result<SynthDef, CompileError> {
    Ok(SynthDef::new(name, compile(builder, options)?))
}

/// Flattens the builder's controls into the server's control array layout:
/// group by group in node order, slot order within a group.
fn controls_pool(builder: &GraphBuilder) -> Vec<Control> {
    let mut offsets = Vec::with_capacity(builder.control_groups().len());
    let mut next = 0u32;
    for &(_, count) in builder.control_groups() {
        offsets.push(next);
        next += count;
    }

    let mut controls: Vec<Control> = builder
        .controls()
        .iter()
        .map(|decl| Control {
            name: decl.name.clone(),
            rate: decl.rate,
            default: decl.default,
            index: offsets[decl.group as usize] + decl.slot,
        })
        .collect();
    controls.sort_by_key(|c| c.index);
    controls
}
