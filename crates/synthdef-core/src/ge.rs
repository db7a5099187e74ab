//! Graph elements.
//!
//! A [`GE`] is the value application code passes around while building a
//! graph: a constant, one output of a node, a bundle of parallel channels, or
//! a node that has not been expanded yet. Pending nodes live in the
//! [`GraphBuilder`](crate::GraphBuilder) arena and are referenced by
//! [`PendingId`], so a GE never holds an object reference.

use core::fmt;

/// Typed pointer to one output of a node in the flat node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    /// Index of the node.
    pub node: u32,
    /// Output slot on that node.
    pub output: u32,
}

impl NodeRef {
    /// Creates a reference to output `output` of node `node`.
    pub const fn new(node: u32, output: u32) -> Self {
        Self { node, output }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node[{}].out[{}]", self.node, self.output)
    }
}

/// Identifier of a pending node in a [`GraphBuilder`](crate::GraphBuilder).
///
/// Ids are assigned sequentially and are only meaningful for the builder that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(pub(crate) u32);

impl PendingId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingId({})", self.0)
    }
}

/// A graph element.
#[derive(Debug, Clone, PartialEq)]
pub enum GE {
    /// Numeric constant.
    Const(f32),
    /// Exactly one channel: an output of a concrete node.
    Single(NodeRef),
    /// Parallel channels. Must not be empty.
    Multi(Vec<GE>),
    /// A node whose concrete shape is not known until expansion.
    Unexpanded(PendingId),
}

impl GE {
    /// Bundles channels into a multichannel value.
    pub fn multi(channels: impl IntoIterator<Item = GE>) -> GE {
        GE::Multi(channels.into_iter().collect())
    }

    /// Bundles constants into a multichannel value.
    pub fn consts(values: impl IntoIterator<Item = f32>) -> GE {
        GE::Multi(values.into_iter().map(GE::Const).collect())
    }

    /// Number of top-level channels (1 for everything except `Multi`).
    pub fn width(&self) -> usize {
        match self {
            GE::Multi(channels) => channels.len(),
            _ => 1,
        }
    }

    /// Returns the pending id if this is an unexpanded node.
    pub fn pending(&self) -> Option<PendingId> {
        match self {
            GE::Unexpanded(id) => Some(*id),
            _ => None,
        }
    }

    /// Pushes every pending id reachable through nested bundles onto `out`.
    pub(crate) fn collect_pending(&self, out: &mut Vec<PendingId>) {
        match self {
            GE::Unexpanded(id) => out.push(*id),
            GE::Multi(channels) => {
                for ch in channels {
                    ch.collect_pending(out);
                }
            }
            GE::Const(_) | GE::Single(_) => {}
        }
    }
}

impl From<f32> for GE {
    fn from(value: f32) -> Self {
        GE::Const(value)
    }
}

impl From<NodeRef> for GE {
    fn from(r: NodeRef) -> Self {
        GE::Single(r)
    }
}

impl From<PendingId> for GE {
    fn from(id: PendingId) -> Self {
        GE::Unexpanded(id)
    }
}

impl From<Vec<GE>> for GE {
    fn from(channels: Vec<GE>) -> Self {
        GE::Multi(channels)
    }
}
