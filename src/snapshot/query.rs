//! Heap graph queries
//!
//! - [`find_edge`]: resolve a typed, named outgoing edge of a node
//! - [`extract_facts`]: read a node's diagnostic attributes
//! - [`haunt`]: the composed diagnostic query behind the `haunt()` built-in

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::capture::{GcRoots, HeapProfiler};
use super::{EdgeKind, HeapNodeRef, HeapSnapshot, NodeType};
use crate::memory::heap::Heap;

/// A lookup that was required to resolve found no matching edge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Heap graph lookup failed: node @{from} has no {kind} edge '{name}'")]
pub struct GraphLookupMiss {
    pub from: u32,
    pub kind: EdgeKind,
    pub name: String,
}

/// Target of the first outgoing edge of `node`, in stored order, whose kind is
/// `kind` and whose name is exactly `name`. Element edges match on their
/// decimal index.
pub fn find_edge<'a>(node: HeapNodeRef<'a>, kind: EdgeKind, name: &str) -> Option<HeapNodeRef<'a>> {
    node.edges()
        .find(|edge| edge.kind() == kind && edge.name().matches(name))
        .map(|edge| edge.to())
}

/// Like [`find_edge`], but a miss is an error
pub fn require_edge<'a>(
    node: HeapNodeRef<'a>,
    kind: EdgeKind,
    name: &str,
) -> Result<HeapNodeRef<'a>, GraphLookupMiss> {
    find_edge(node, kind, name).ok_or_else(|| GraphLookupMiss {
        from: node.id(),
        kind,
        name: name.to_string(),
    })
}

/// Diagnostic attributes of a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFacts {
    pub name: Rc<str>,
    pub shallow_size: usize,
    pub node_type: NodeType,
}

pub fn extract_facts(node: HeapNodeRef<'_>) -> NodeFacts {
    NodeFacts {
        name: Rc::from(node.name()),
        shallow_size: node.shallow_size(),
        node_type: node.node_type(),
    }
}

/// Result of the composed global-object query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HauntReport {
    pub node_count: usize,
    /// Facts about the global object's shape
    pub map: NodeFacts,
    pub global_id: u32,
}

impl fmt::Display for HauntReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes count: {}", self.node_count)?;
        writeln!(f, "Node name: {}", self.map.name)?;
        writeln!(f, "Node size: {}", self.map.shallow_size)?;
        writeln!(f, "Node type: {}", self.map.node_type.tag())?;
        writeln!(f, "Global id: @{}", self.global_id)?;
        write!(f, "========================")
    }
}

/// Capture a snapshot, descend from the root to the global object and on to its
/// internal `map` edge, and report on it. Every snapshot held by `profiler` is
/// released before returning, on success and on failure.
pub fn haunt(
    profiler: &mut HeapProfiler,
    heap: &Heap,
    roots: &GcRoots,
) -> Result<HauntReport, GraphLookupMiss> {
    let snapshot = profiler.take_snapshot(heap, roots);
    report_and_release(profiler, &snapshot)
}

fn report_and_release(
    profiler: &mut HeapProfiler,
    snapshot: &HeapSnapshot,
) -> Result<HauntReport, GraphLookupMiss> {
    let report = describe_global_map(snapshot);
    profiler.delete_all_snapshots();
    report
}

fn describe_global_map(snapshot: &HeapSnapshot) -> Result<HauntReport, GraphLookupMiss> {
    let root = snapshot.root();
    let global = root.child(1).ok_or_else(|| GraphLookupMiss {
        from: root.id(),
        kind: EdgeKind::Shortcut,
        name: "1".to_string(),
    })?;
    let map = require_edge(global, EdgeKind::Internal, "map")?;

    Ok(HauntReport {
        node_count: snapshot.node_count(),
        map: extract_facts(map),
        global_id: global.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::constants::SHAPE_SIZE;
    use crate::memory::heap::ObjectKind;
    use crate::memory::value::Value;
    use crate::snapshot::{EdgeName, HeapEdge, HeapNode, NodeIndex};

    fn global_with(properties: &[(&str, Value)]) -> (Heap, GcRoots) {
        let mut heap = Heap::default();
        let global = heap.allocate(ObjectKind::Global).unwrap();
        for (key, value) in properties {
            heap.set_property(global, key, value.clone()).unwrap();
        }
        let roots = GcRoots {
            global,
            stack_scopes: Vec::new(),
            microtasks: Vec::new(),
        };
        (heap, roots)
    }

    #[test]
    fn test_find_edge_returns_first_match() {
        let (mut heap, roots) = global_with(&[]);
        let array = heap
            .allocate(ObjectKind::Array(vec![Value::string("a"), Value::string("b")]))
            .unwrap();
        heap.set_property(roots.global, "list", Value::Object(array))
            .unwrap();

        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);
        let global = snapshot.root().child(1).unwrap();

        let list = find_edge(global, EdgeKind::Property, "list").unwrap();
        assert_eq!(list.node_type(), NodeType::Array);
        assert_eq!(find_edge(list, EdgeKind::Element, "1").unwrap().name(), "b");

        let first_internal = list
            .edges()
            .find(|e| e.kind() == EdgeKind::Internal)
            .unwrap();
        assert_eq!(first_internal.name(), &EdgeName::Named(Rc::from("map")));
        assert_eq!(find_edge(list, EdgeKind::Internal, "map"), Some(first_internal.to()));
    }

    #[test]
    fn test_find_edge_not_found() {
        let (heap, roots) = global_with(&[("answer", Value::string("x"))]);
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);
        let global = snapshot.root().child(1).unwrap();

        assert!(find_edge(global, EdgeKind::Property, "missing").is_none());
        assert!(find_edge(global, EdgeKind::Property, "Answer").is_none());
        // Right name, wrong kind
        assert!(find_edge(global, EdgeKind::Internal, "answer").is_none());
        assert!(find_edge(global, EdgeKind::Property, "answer").is_some());
    }

    #[test]
    fn test_find_edge_ignores_other_kinds() {
        let (mut heap, roots) = global_with(&[]);
        // A property literally named "map" next to the internal shape edge
        heap.set_property(roots.global, "map", Value::string("user map"))
            .unwrap();

        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);
        let global = snapshot.root().child(1).unwrap();

        let shape = find_edge(global, EdgeKind::Internal, "map").unwrap();
        assert_eq!(shape.name(), "system / Map");
        let user = find_edge(global, EdgeKind::Property, "map").unwrap();
        assert_eq!(user.name(), "user map");
    }

    #[test]
    fn test_extract_facts() {
        let (heap, roots) = global_with(&[]);
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);

        let facts = extract_facts(snapshot.root().child(0).unwrap());
        assert_eq!(
            facts,
            NodeFacts {
                name: Rc::from("(GC roots)"),
                shallow_size: 0,
                node_type: NodeType::Synthetic,
            }
        );
    }

    #[test]
    fn test_haunt_reports_global_map_and_disposes() {
        let (heap, roots) = global_with(&[("a", Value::Number(1.0))]);
        let mut profiler = HeapProfiler::new();

        let report = haunt(&mut profiler, &heap, &roots).unwrap();
        assert_eq!(profiler.snapshot_count(), 0);
        assert_eq!(report.map.name.as_ref(), "system / Map");
        assert_eq!(report.map.shallow_size, SHAPE_SIZE);
        assert_eq!(report.map.node_type, NodeType::Hidden);
        assert_eq!(report.global_id, heap.object(roots.global).stable_id);

        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Node name: system / Map");
        assert_eq!(lines[3], "Node type: 0");
        assert_eq!(lines[5], "========================");
    }

    #[test]
    fn test_require_edge_miss() {
        let (heap, roots) = global_with(&[]);
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);
        let gc_roots = snapshot.root().child(0).unwrap();

        let err = require_edge(gc_roots, EdgeKind::Internal, "map").unwrap_err();
        assert_eq!(err.kind, EdgeKind::Internal);
        assert_eq!(err.from, gc_roots.id());
    }

    fn node(
        id: u32,
        node_type: NodeType,
        name: &str,
        first_edge: usize,
        edge_count: usize,
    ) -> HeapNode {
        HeapNode {
            id,
            node_type,
            name: Rc::from(name),
            shallow_size: 0,
            first_edge,
            edge_count,
        }
    }

    fn edge(kind: EdgeKind, name: EdgeName, to: usize) -> HeapEdge {
        HeapEdge {
            kind,
            name,
            to: NodeIndex(to),
        }
    }

    #[test]
    fn test_haunt_without_map_edge_fails_and_disposes() {
        // The global object has a property called "map" but no internal one
        let snapshot = HeapSnapshot::new(
            1,
            vec![
                node(1, NodeType::Synthetic, "", 0, 2),
                node(2, NodeType::Synthetic, "(GC roots)", 2, 0),
                node(101, NodeType::Object, "Object", 2, 1),
                node(4, NodeType::String, "not a shape", 3, 0),
            ],
            vec![
                edge(EdgeKind::Shortcut, EdgeName::Index(0), 1),
                edge(EdgeKind::Shortcut, EdgeName::Index(1), 2),
                edge(EdgeKind::Property, EdgeName::Named(Rc::from("map")), 3),
            ],
        );
        let (heap, roots) = global_with(&[]);
        let mut profiler = HeapProfiler::new();
        profiler.take_snapshot(&heap, &roots);

        let err = report_and_release(&mut profiler, &snapshot).unwrap_err();
        assert_eq!(
            err,
            GraphLookupMiss {
                from: 101,
                kind: EdgeKind::Internal,
                name: "map".to_string(),
            }
        );
        assert_eq!(profiler.snapshot_count(), 0);
    }

    #[test]
    fn test_haunt_without_global_fails_and_disposes() {
        let snapshot = HeapSnapshot::new(
            1,
            vec![
                node(1, NodeType::Synthetic, "", 0, 1),
                node(2, NodeType::Synthetic, "(GC roots)", 1, 0),
            ],
            vec![edge(EdgeKind::Shortcut, EdgeName::Index(0), 1)],
        );
        let (heap, roots) = global_with(&[]);
        let mut profiler = HeapProfiler::new();
        profiler.take_snapshot(&heap, &roots);
        profiler.take_snapshot(&heap, &roots);

        let err = report_and_release(&mut profiler, &snapshot).unwrap_err();
        assert_eq!(err.from, 1);
        assert_eq!(profiler.snapshot_count(), 0);
    }
}
