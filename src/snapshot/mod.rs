//! Heap snapshots
//!
//! A [`HeapSnapshot`] is an immutable, point-in-time capture of every object
//! reachable from the engine's roots. Nodes and edges live in two flat arenas;
//! edges refer to their target by [`NodeIndex`], and the outgoing edges of a
//! node occupy one contiguous run of the edge arena.
//!
//! - [`capture`]: builds snapshots from the heap ([`HeapProfiler`])
//! - [`query`]: typed, named traversal and per-node facts
//!
//! # Graph Shape
//!
//! ```text
//! (root) ─┬─ [0] (GC roots) ─┬─ [0] (Stack roots) ── active scopes
//!         │                  └─ [1] (Microtask queue) ── queued callbacks
//!         └─ [1] global object ── map, properties, ...
//! ```
//!
//! Node type and edge kind tags are engine-defined; both enums carry an
//! `Other` variant for tags this host does not name.

pub mod capture;
pub mod query;

pub use capture::{GcRoots, HeapProfiler};
pub use query::{extract_facts, find_edge, haunt, GraphLookupMiss, HauntReport, NodeFacts};

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Node type tag. This is the engine's whole tag vocabulary; capture emits a
/// subset of it and reports shapes as `Hidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    Hidden,
    Array,
    String,
    Object,
    Code,
    Closure,
    RegExp,
    Number,
    Native,
    Synthetic,
    ConsString,
    SlicedString,
    Symbol,
    BigInt,
    ObjectShape,
    Other(u8),
}

impl NodeType {
    pub fn tag(self) -> u8 {
        match self {
            NodeType::Hidden => 0,
            NodeType::Array => 1,
            NodeType::String => 2,
            NodeType::Object => 3,
            NodeType::Code => 4,
            NodeType::Closure => 5,
            NodeType::RegExp => 6,
            NodeType::Number => 7,
            NodeType::Native => 8,
            NodeType::Synthetic => 9,
            NodeType::ConsString => 10,
            NodeType::SlicedString => 11,
            NodeType::Symbol => 12,
            NodeType::BigInt => 13,
            NodeType::ObjectShape => 14,
            NodeType::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => NodeType::Hidden,
            1 => NodeType::Array,
            2 => NodeType::String,
            3 => NodeType::Object,
            4 => NodeType::Code,
            5 => NodeType::Closure,
            6 => NodeType::RegExp,
            7 => NodeType::Number,
            8 => NodeType::Native,
            9 => NodeType::Synthetic,
            10 => NodeType::ConsString,
            11 => NodeType::SlicedString,
            12 => NodeType::Symbol,
            13 => NodeType::BigInt,
            14 => NodeType::ObjectShape,
            other => NodeType::Other(other),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Hidden => "hidden",
            NodeType::Array => "array",
            NodeType::String => "string",
            NodeType::Object => "object",
            NodeType::Code => "code",
            NodeType::Closure => "closure",
            NodeType::RegExp => "regexp",
            NodeType::Number => "number",
            NodeType::Native => "native",
            NodeType::Synthetic => "synthetic",
            NodeType::ConsString => "concatenated string",
            NodeType::SlicedString => "sliced string",
            NodeType::Symbol => "symbol",
            NodeType::BigInt => "bigint",
            NodeType::ObjectShape => "object shape",
            NodeType::Other(tag) => return write!(f, "type {}", tag),
        };
        f.write_str(name)
    }
}

/// Edge kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Variable captured in a function context
    ContextVariable,
    /// Indexed array slot
    Element,
    /// Named, user-visible property
    Property,
    /// Implementation-only slot, such as the shape pointer
    Internal,
    Hidden,
    Shortcut,
    Weak,
    Other(u8),
}

impl EdgeKind {
    pub fn tag(self) -> u8 {
        match self {
            EdgeKind::ContextVariable => 0,
            EdgeKind::Element => 1,
            EdgeKind::Property => 2,
            EdgeKind::Internal => 3,
            EdgeKind::Hidden => 4,
            EdgeKind::Shortcut => 5,
            EdgeKind::Weak => 6,
            EdgeKind::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => EdgeKind::ContextVariable,
            1 => EdgeKind::Element,
            2 => EdgeKind::Property,
            3 => EdgeKind::Internal,
            4 => EdgeKind::Hidden,
            5 => EdgeKind::Shortcut,
            6 => EdgeKind::Weak,
            other => EdgeKind::Other(other),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::ContextVariable => "context",
            EdgeKind::Element => "element",
            EdgeKind::Property => "property",
            EdgeKind::Internal => "internal",
            EdgeKind::Hidden => "hidden",
            EdgeKind::Shortcut => "shortcut",
            EdgeKind::Weak => "weak",
            EdgeKind::Other(tag) => return write!(f, "kind {}", tag),
        };
        f.write_str(name)
    }
}

/// Edge name: a property/variable/slot name, or an element index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeName {
    Named(Rc<str>),
    Index(u32),
}

impl EdgeName {
    /// Exact, case-sensitive comparison; indices compare by their decimal form
    pub fn matches(&self, name: &str) -> bool {
        match self {
            EdgeName::Named(n) => &**n == name,
            EdgeName::Index(i) => name.parse::<u32>().is_ok_and(|n| n == *i)
                && !(name.len() > 1 && name.starts_with('0')),
        }
    }
}

impl fmt::Display for EdgeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeName::Named(n) => f.write_str(n),
            EdgeName::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Position of a node in its snapshot's node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct HeapNode {
    pub id: u32,
    pub node_type: NodeType,
    pub name: Rc<str>,
    pub shallow_size: usize,
    pub(crate) first_edge: usize,
    pub(crate) edge_count: usize,
}

#[derive(Debug, Clone)]
pub struct HeapEdge {
    pub kind: EdgeKind,
    pub name: EdgeName,
    pub to: NodeIndex,
}

/// An immutable capture of the reachable object graph
#[derive(Debug)]
pub struct HeapSnapshot {
    uid: u32,
    nodes: Vec<HeapNode>,
    edges: Vec<HeapEdge>,
    id_index: FxHashMap<u32, NodeIndex>,
}

impl HeapSnapshot {
    pub(crate) fn new(uid: u32, nodes: Vec<HeapNode>, edges: Vec<HeapEdge>) -> Self {
        let id_index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, NodeIndex(i)))
            .collect();
        HeapSnapshot {
            uid,
            nodes,
            edges,
            id_index,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// The synthetic root, always the first node
    pub fn root(&self) -> HeapNodeRef<'_> {
        self.node(NodeIndex(0))
    }

    pub fn node(&self, index: NodeIndex) -> HeapNodeRef<'_> {
        HeapNodeRef {
            snapshot: self,
            index,
        }
    }

    pub fn node_by_id(&self, id: u32) -> Option<HeapNodeRef<'_>> {
        self.id_index.get(&id).map(|&index| self.node(index))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = HeapNodeRef<'_>> + '_ {
        (0..self.nodes.len()).map(move |i| self.node(NodeIndex(i)))
    }
}

/// Borrowed handle to one node of a snapshot
#[derive(Debug, Clone, Copy)]
pub struct HeapNodeRef<'a> {
    snapshot: &'a HeapSnapshot,
    index: NodeIndex,
}

impl<'a> HeapNodeRef<'a> {
    fn data(&self) -> &'a HeapNode {
        &self.snapshot.nodes[self.index.0]
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn id(&self) -> u32 {
        self.data().id
    }

    pub fn node_type(&self) -> NodeType {
        self.data().node_type
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn shallow_size(&self) -> usize {
        self.data().shallow_size
    }

    pub fn edge_count(&self) -> usize {
        self.data().edge_count
    }

    /// Outgoing edges in stored order
    pub fn edges(&self) -> impl Iterator<Item = HeapEdgeRef<'a>> + 'a {
        let snapshot = self.snapshot;
        let node = self.data();
        snapshot.edges[node.first_edge..node.first_edge + node.edge_count]
            .iter()
            .map(move |edge| HeapEdgeRef { snapshot, edge })
    }

    pub fn edge(&self, position: usize) -> Option<HeapEdgeRef<'a>> {
        self.edges().nth(position)
    }

    /// Target of the outgoing edge at `position`
    pub fn child(&self, position: usize) -> Option<HeapNodeRef<'a>> {
        self.edge(position).map(|edge| edge.to())
    }
}

impl PartialEq for HeapNodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.snapshot, other.snapshot) && self.index == other.index
    }
}

/// Borrowed handle to one edge of a snapshot
#[derive(Debug, Clone, Copy)]
pub struct HeapEdgeRef<'a> {
    snapshot: &'a HeapSnapshot,
    edge: &'a HeapEdge,
}

impl<'a> HeapEdgeRef<'a> {
    pub fn kind(&self) -> EdgeKind {
        self.edge.kind
    }

    pub fn name(&self) -> &'a EdgeName {
        &self.edge.name
    }

    pub fn to(&self) -> HeapNodeRef<'a> {
        self.snapshot.node(self.edge.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip_with_unknown_variant() {
        assert_eq!(NodeType::from_tag(14), NodeType::ObjectShape);
        assert_eq!(NodeType::from_tag(42), NodeType::Other(42));
        assert_eq!(NodeType::Other(42).tag(), 42);
        assert_eq!(EdgeKind::from_tag(3), EdgeKind::Internal);
        assert_eq!(EdgeKind::from_tag(9), EdgeKind::Other(9));
    }

    #[test]
    fn test_edge_name_matching() {
        assert!(EdgeName::Named(Rc::from("map")).matches("map"));
        assert!(!EdgeName::Named(Rc::from("map")).matches("Map"));
        assert!(EdgeName::Index(3).matches("3"));
        assert!(!EdgeName::Index(3).matches("03"));
    }
}
