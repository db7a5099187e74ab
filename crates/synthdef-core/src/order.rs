//! Ordering and common-subexpression elimination.
//!
//! Runs three passes over the expander's node list:
//!
//! 1. **Merge** — walking in discovery order, a pure node (neither
//!    side-effecting nor individual) identical to an earlier one is dropped
//!    and every later reference is rewritten to the survivor.
//! 2. **Sort** — Kahn's algorithm over the rewritten references. The ready
//!    set is a min-heap on discovery index, so independent nodes keep their
//!    first-discovery order. Each side-effecting node also depends on the
//!    previous side-effecting node, which pins their relative order.
//! 3. **Renumber** — references are rewritten to emission indices and the
//!    constants pool is rebuilt in first-use order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::CompileError;
use crate::expand::{Expanded, ExpandedNode};
use crate::ge::NodeRef;
use crate::graph::Input;

/// Nodes and constants in emission order.
#[derive(Debug, Clone)]
pub(crate) struct Ordered {
    pub nodes: Vec<ExpandedNode>,
    pub constants: Vec<f32>,
}

pub(crate) fn order(expanded: Expanded) -> Result<Ordered, CompileError> {
    let Expanded {
        mut nodes,
        constants,
    } = expanded;

    // --- Pass 1: merge identical pure nodes ---
    let mut canon: Vec<u32> = Vec::with_capacity(nodes.len());
    let mut kept = vec![false; nodes.len()];
    let mut seen: HashMap<ExpandedNode, u32> = HashMap::new();

    for (i, node) in nodes.iter_mut().enumerate() {
        for input in &mut node.inputs {
            if let Input::Node(r) = input {
                *r = NodeRef::new(canon[r.node as usize], r.output);
            }
        }
        let pure = !node.flags.side_effect && !node.flags.individual;
        if pure {
            if let Some(&survivor) = seen.get(&*node) {
                #[cfg(feature = "tracing")]
                tracing::debug!("order: node {i} '{}' merged into {survivor}", node.name);
                canon.push(survivor);
                continue;
            }
            seen.insert(node.clone(), i as u32);
        }
        canon.push(i as u32);
        kept[i] = true;
    }

    // --- Pass 2: Kahn's sort with first-discovery tie break ---
    let mut in_degree = vec![0u32; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut last_effect: Option<usize> = None;
    let mut kept_count = 0usize;

    for (i, node) in nodes.iter().enumerate() {
        if !kept[i] {
            continue;
        }
        kept_count += 1;
        let mut deps: Vec<usize> = node.inputs.iter().filter_map(node_of).collect();
        if node.flags.side_effect {
            if let Some(prev) = last_effect {
                deps.push(prev);
            }
            last_effect = Some(i);
        }
        deps.sort_unstable();
        deps.dedup();
        in_degree[i] = deps.len() as u32;
        for dep in deps {
            dependents[dep].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..nodes.len())
        .filter(|&i| kept[i] && in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut sorted = Vec::with_capacity(kept_count);

    while let Some(Reverse(i)) = ready.pop() {
        sorted.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }

    if sorted.len() != kept_count {
        let stuck = (0..nodes.len())
            .find(|&i| kept[i] && in_degree[i] > 0)
            .map_or_else(String::new, |i| nodes[i].name.clone());
        return Err(CompileError::CyclicGraph { ugen: stuck });
    }

    // --- Pass 3: renumber nodes and constants ---
    let mut position = vec![0u32; nodes.len()];
    for (pos, &i) in sorted.iter().enumerate() {
        position[i] = pos as u32;
    }

    let mut constant_map: Vec<Option<u32>> = vec![None; constants.len()];
    let mut pool = Vec::new();
    let mut slots: Vec<Option<ExpandedNode>> = nodes.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(sorted.len());

    for &i in &sorted {
        let Some(mut node) = slots[i].take() else {
            continue;
        };
        for input in &mut node.inputs {
            match input {
                Input::Node(r) => *r = NodeRef::new(position[r.node as usize], r.output),
                Input::Constant(c) => {
                    let old = *c as usize;
                    *c = *constant_map[old].get_or_insert_with(|| {
                        pool.push(constants[old]);
                        (pool.len() - 1) as u32
                    });
                }
            }
        }
        ordered.push(node);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "order: {} nodes emitted, {} merged, {} constants",
        ordered.len(),
        canon.len() - ordered.len(),
        pool.len()
    );

    Ok(Ordered {
        nodes: ordered,
        constants: pool,
    })
}

fn node_of(input: &Input) -> Option<usize> {
    match input {
        Input::Node(r) => Some(r.node as usize),
        Input::Constant(_) => None,
    }
}
