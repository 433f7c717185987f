//! Snapshot capture
//!
//! [`HeapProfiler`] owns every snapshot taken until they are released with
//! [`HeapProfiler::delete_all_snapshots`]. Capture walks the heap breadth-first
//! from the roots, using the node arena itself as the work queue: a node's
//! outgoing edges are appended while that node is being expanded, so each node
//! owns one contiguous run of the edge arena.
//!
//! Heap objects and shapes keep their allocation-time (odd) ids. Nodes that only
//! exist in the snapshot (synthetic roots, strings, heap numbers, oddballs, code)
//! get even ids, counting up from 2 in discovery order.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::{EdgeKind, EdgeName, HeapEdge, HeapNode, HeapSnapshot, NodeIndex, NodeType};
use crate::interpreter::constants::*;
use crate::memory::heap::{Heap, ObjectKind, ShapeId};
use crate::memory::value::{is_small_integer, number_to_string, ObjectId, Value};
use crate::parser::ast::FunctionDef;

/// Entry points of the object graph at the moment of capture
#[derive(Debug, Clone)]
pub struct GcRoots {
    pub global: ObjectId,
    /// Scope objects of the active call frames, outermost first
    pub stack_scopes: Vec<ObjectId>,
    /// Callbacks waiting in the microtask queue, in run order
    pub microtasks: Vec<Value>,
}

/// Owner of captured snapshots
#[derive(Debug, Default)]
pub struct HeapProfiler {
    snapshots: Vec<Rc<HeapSnapshot>>,
    next_uid: u32,
}

impl HeapProfiler {
    pub fn new() -> Self {
        HeapProfiler::default()
    }

    /// Capture the graph reachable from `roots`. The snapshot is retained until
    /// [`delete_all_snapshots`](Self::delete_all_snapshots).
    pub fn take_snapshot(&mut self, heap: &Heap, roots: &GcRoots) -> Rc<HeapSnapshot> {
        self.next_uid += 1;
        let snapshot = Rc::new(SnapshotBuilder::new(heap, roots).build(self.next_uid));
        info!(
            uid = snapshot.uid(),
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            "heap snapshot captured"
        );
        self.snapshots.push(Rc::clone(&snapshot));
        snapshot
    }

    /// Release every held snapshot, returning how many were released
    pub fn delete_all_snapshots(&mut self) -> usize {
        let released = self.snapshots.len();
        self.snapshots.clear();
        if released > 0 {
            debug!(released, "heap snapshots deleted");
        }
        released
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn snapshot(&self, position: usize) -> Option<Rc<HeapSnapshot>> {
        self.snapshots.get(position).cloned()
    }
}

/// What a node stands for, consulted when the node is expanded
#[derive(Debug, Clone, Copy)]
enum Entity {
    Root,
    GcRoots,
    StackRoots,
    MicrotaskQueue,
    Object(ObjectId),
    Shape(ShapeId),
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Oddball {
    Undefined,
    Null,
    True,
    False,
}

impl Oddball {
    fn name(self) -> &'static str {
        match self {
            Oddball::Undefined => "undefined",
            Oddball::Null => "null",
            Oddball::True => "true",
            Oddball::False => "false",
        }
    }
}

struct SnapshotBuilder<'h> {
    heap: &'h Heap,
    roots: &'h GcRoots,
    nodes: Vec<HeapNode>,
    entities: Vec<Entity>,
    edges: Vec<HeapEdge>,
    objects: FxHashMap<ObjectId, NodeIndex>,
    shapes: FxHashMap<ShapeId, NodeIndex>,
    strings: FxHashMap<Rc<str>, NodeIndex>,
    numbers: FxHashMap<u64, NodeIndex>,
    oddballs: FxHashMap<Oddball, NodeIndex>,
    code: FxHashMap<*const FunctionDef, NodeIndex>,
    next_local_id: u32,
}

impl<'h> SnapshotBuilder<'h> {
    fn new(heap: &'h Heap, roots: &'h GcRoots) -> Self {
        SnapshotBuilder {
            heap,
            roots,
            nodes: Vec::new(),
            entities: Vec::new(),
            edges: Vec::new(),
            objects: FxHashMap::default(),
            shapes: FxHashMap::default(),
            strings: FxHashMap::default(),
            numbers: FxHashMap::default(),
            oddballs: FxHashMap::default(),
            code: FxHashMap::default(),
            next_local_id: 2,
        }
    }

    fn build(mut self, uid: u32) -> HeapSnapshot {
        self.push_node(
            ROOT_NODE_ID,
            NodeType::Synthetic,
            Rc::from(""),
            0,
            Entity::Root,
        );

        let mut cursor = 0;
        while cursor < self.nodes.len() {
            let first_edge = self.edges.len();
            self.expand(self.entities[cursor]);
            let node = &mut self.nodes[cursor];
            node.first_edge = first_edge;
            node.edge_count = self.edges.len() - first_edge;
            cursor += 1;
        }

        HeapSnapshot::new(uid, self.nodes, self.edges)
    }

    fn expand(&mut self, entity: Entity) {
        let roots = self.roots;
        match entity {
            Entity::Root => {
                let gc_roots = self.synthetic("(GC roots)", Entity::GcRoots);
                self.edge(EdgeKind::Element, EdgeName::Index(0), gc_roots);
                let global = self.object_node(roots.global);
                self.edge(EdgeKind::Shortcut, EdgeName::Index(1), global);
            }
            Entity::GcRoots => {
                let stack = self.synthetic("(Stack roots)", Entity::StackRoots);
                self.edge(EdgeKind::Element, EdgeName::Index(0), stack);
                let queue = self.synthetic("(Microtask queue)", Entity::MicrotaskQueue);
                self.edge(EdgeKind::Element, EdgeName::Index(1), queue);
            }
            Entity::StackRoots => {
                for (i, &scope) in roots.stack_scopes.iter().enumerate() {
                    let target = self.object_node(scope);
                    self.edge(EdgeKind::Element, EdgeName::Index(i as u32), target);
                }
            }
            Entity::MicrotaskQueue => {
                for (i, task) in roots.microtasks.iter().enumerate() {
                    if let Some(target) = self.value_node(task) {
                        self.edge(EdgeKind::Element, EdgeName::Index(i as u32), target);
                    }
                }
            }
            Entity::Object(id) => self.expand_object(id),
            Entity::Shape(id) => self.expand_shape(id),
            Entity::Leaf => {}
        }
    }

    fn expand_object(&mut self, id: ObjectId) {
        let heap = self.heap;
        let object = heap.object(id);

        let map = self.shape_node(object.shape);
        self.edge(EdgeKind::Internal, named("map"), map);

        for (key, value) in heap.shape(object.shape).keys.iter().zip(&object.slots) {
            if let Some(target) = self.value_node(value) {
                self.edge(EdgeKind::Property, EdgeName::Named(key.clone()), target);
            }
        }

        match &object.kind {
            ObjectKind::Array(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    if let Some(target) = self.value_node(element) {
                        self.edge(EdgeKind::Element, EdgeName::Index(i as u32), target);
                    }
                }
            }
            ObjectKind::Closure {
                function, scope, ..
            } => {
                let global = self.roots.global;
                let context = self.object_node(scope.unwrap_or(global));
                self.edge(EdgeKind::Internal, named("context"), context);
                let code = self.code_node(function);
                self.edge(EdgeKind::Internal, named("code"), code);
            }
            ObjectKind::Scope { parent, bindings } => {
                for binding in bindings {
                    if let Some(target) = self.value_node(&binding.value) {
                        self.edge(
                            EdgeKind::ContextVariable,
                            EdgeName::Named(binding.name.clone()),
                            target,
                        );
                    }
                }
                if let Some(parent) = parent {
                    let previous = self.object_node(*parent);
                    self.edge(EdgeKind::Internal, named("previous"), previous);
                }
            }
            ObjectKind::Ordinary
            | ObjectKind::Global
            | ObjectKind::Native(_)
            | ObjectKind::Error(_) => {}
        }
    }

    fn expand_shape(&mut self, id: ShapeId) {
        let heap = self.heap;
        let shape = heap.shape(id);

        if let Some(parent) = shape.back_pointer {
            let target = self.shape_node(parent);
            self.edge(EdgeKind::Internal, named("back_pointer"), target);
        }
        for (key, next) in &shape.transitions {
            let target = self.shape_node(*next);
            self.edge(EdgeKind::Weak, EdgeName::Named(key.clone()), target);
        }
    }

    /// Node for a value, or `None` for immediates that have no heap presence
    fn value_node(&mut self, value: &Value) -> Option<NodeIndex> {
        match value {
            Value::Undefined => Some(self.oddball_node(Oddball::Undefined)),
            Value::Null => Some(self.oddball_node(Oddball::Null)),
            Value::Bool(true) => Some(self.oddball_node(Oddball::True)),
            Value::Bool(false) => Some(self.oddball_node(Oddball::False)),
            Value::Number(n) if is_small_integer(*n) => None,
            Value::Number(n) => Some(self.number_node(*n)),
            Value::String(s) => Some(self.string_node(s)),
            Value::Object(id) => Some(self.object_node(*id)),
        }
    }

    fn object_node(&mut self, id: ObjectId) -> NodeIndex {
        if let Some(&index) = self.objects.get(&id) {
            return index;
        }

        let heap = self.heap;
        let object = heap.object(id);
        let (node_type, name): (NodeType, Rc<str>) = match &object.kind {
            ObjectKind::Ordinary => (NodeType::Object, Rc::from("Object")),
            ObjectKind::Global => (NodeType::Object, Rc::from("global")),
            ObjectKind::Array(_) => (NodeType::Array, Rc::from("Array")),
            ObjectKind::Closure { function, .. } => (
                NodeType::Closure,
                Rc::from(function.name.as_deref().unwrap_or("")),
            ),
            ObjectKind::Native(builtin) => (NodeType::Closure, Rc::from(builtin.name())),
            ObjectKind::Error(kind) => (NodeType::Object, Rc::from(kind.name())),
            ObjectKind::Scope { .. } => (NodeType::Hidden, Rc::from("system / Context")),
        };

        let index = self.push_node(
            object.stable_id,
            node_type,
            name,
            object.shallow_size(),
            Entity::Object(id),
        );
        self.objects.insert(id, index);
        index
    }

    fn shape_node(&mut self, id: ShapeId) -> NodeIndex {
        if let Some(&index) = self.shapes.get(&id) {
            return index;
        }

        let heap = self.heap;
        let shape = heap.shape(id);
        let index = self.push_node(
            shape.stable_id,
            NodeType::Hidden,
            Rc::from("system / Map"),
            SHAPE_SIZE,
            Entity::Shape(id),
        );
        self.shapes.insert(id, index);
        index
    }

    fn string_node(&mut self, s: &Rc<str>) -> NodeIndex {
        if let Some(&index) = self.strings.get(s) {
            return index;
        }
        let id = self.local_id();
        let index = self.push_node(
            id,
            NodeType::String,
            s.clone(),
            STRING_HEADER_SIZE + s.len(),
            Entity::Leaf,
        );
        self.strings.insert(s.clone(), index);
        index
    }

    fn number_node(&mut self, n: f64) -> NodeIndex {
        if let Some(&index) = self.numbers.get(&n.to_bits()) {
            return index;
        }
        let id = self.local_id();
        let index = self.push_node(
            id,
            NodeType::Number,
            Rc::from(number_to_string(n)),
            HEAP_NUMBER_SIZE,
            Entity::Leaf,
        );
        self.numbers.insert(n.to_bits(), index);
        index
    }

    fn oddball_node(&mut self, oddball: Oddball) -> NodeIndex {
        if let Some(&index) = self.oddballs.get(&oddball) {
            return index;
        }
        let id = self.local_id();
        let index = self.push_node(
            id,
            NodeType::Hidden,
            Rc::from(oddball.name()),
            ODDBALL_SIZE,
            Entity::Leaf,
        );
        self.oddballs.insert(oddball, index);
        index
    }

    fn code_node(&mut self, function: &Rc<FunctionDef>) -> NodeIndex {
        let key = Rc::as_ptr(function);
        if let Some(&index) = self.code.get(&key) {
            return index;
        }
        let id = self.local_id();
        let name = function.name.as_deref().unwrap_or("(anonymous)");
        let index = self.push_node(
            id,
            NodeType::Code,
            Rc::from(name),
            CODE_HEADER_SIZE + function.location.len,
            Entity::Leaf,
        );
        self.code.insert(key, index);
        index
    }

    fn synthetic(&mut self, name: &str, entity: Entity) -> NodeIndex {
        let id = self.local_id();
        self.push_node(id, NodeType::Synthetic, Rc::from(name), 0, entity)
    }

    fn push_node(
        &mut self,
        id: u32,
        node_type: NodeType,
        name: Rc<str>,
        shallow_size: usize,
        entity: Entity,
    ) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(HeapNode {
            id,
            node_type,
            name,
            shallow_size,
            first_edge: 0,
            edge_count: 0,
        });
        self.entities.push(entity);
        index
    }

    fn edge(&mut self, kind: EdgeKind, name: EdgeName, to: NodeIndex) {
        self.edges.push(HeapEdge { kind, name, to });
    }

    fn local_id(&mut self) -> u32 {
        let id = self.next_local_id;
        self.next_local_id += HEAP_ID_STEP;
        id
    }
}

fn named(name: &str) -> EdgeName {
    EdgeName::Named(Rc::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    fn sample_heap() -> (Heap, GcRoots) {
        let mut heap = Heap::default();
        let global = heap.allocate(ObjectKind::Global).unwrap();
        let point = heap.allocate(ObjectKind::Ordinary).unwrap();
        heap.set_property(point, "x", Value::Number(1.5)).unwrap();
        heap.set_property(point, "label", Value::string("p")).unwrap();
        heap.set_property(global, "point", Value::Object(point)).unwrap();
        heap.set_property(global, "again", Value::Object(point)).unwrap();
        heap.set_property(global, "name", Value::string("p")).unwrap();

        let roots = GcRoots {
            global,
            stack_scopes: Vec::new(),
            microtasks: Vec::new(),
        };
        (heap, roots)
    }

    #[test]
    fn test_snapshot_integrity() {
        let (heap, roots) = sample_heap();
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);

        let mut ids = FxHashSet::default();
        for node in snapshot.nodes() {
            assert!(ids.insert(node.id()), "duplicate id {}", node.id());
        }
        for node in snapshot.nodes() {
            for edge in node.edges() {
                assert!(snapshot.node_by_id(edge.to().id()).is_some());
            }
        }
    }

    #[test]
    fn test_root_layout() {
        let (heap, roots) = sample_heap();
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);

        let root = snapshot.root();
        assert_eq!(root.id(), ROOT_NODE_ID);
        assert_eq!(root.child(0).unwrap().name(), "(GC roots)");
        let global = root.child(1).unwrap();
        assert_eq!(global.name(), "global");
        assert_eq!(global.id(), heap.object(roots.global).stable_id);
    }

    #[test]
    fn test_shared_values_appear_once() {
        let (heap, roots) = sample_heap();
        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);

        let objects = snapshot.nodes().filter(|n| n.name() == "Object").count();
        let strings = snapshot
            .nodes()
            .filter(|n| n.node_type() == NodeType::String && n.name() == "p")
            .count();
        assert_eq!(objects, 1);
        assert_eq!(strings, 1);
    }

    #[test]
    fn test_small_integers_have_no_node() {
        let mut heap = Heap::default();
        let global = heap.allocate(ObjectKind::Global).unwrap();
        heap.set_property(global, "n", Value::Number(7.0)).unwrap();
        let roots = GcRoots {
            global,
            stack_scopes: Vec::new(),
            microtasks: Vec::new(),
        };

        let mut profiler = HeapProfiler::new();
        let snapshot = profiler.take_snapshot(&heap, &roots);
        assert!(snapshot.nodes().all(|n| n.node_type() != NodeType::Number));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (heap, roots) = sample_heap();
        let mut profiler = HeapProfiler::new();
        assert_eq!(profiler.delete_all_snapshots(), 0);

        profiler.take_snapshot(&heap, &roots);
        assert_eq!(profiler.snapshot_count(), 1);
        assert_eq!(profiler.delete_all_snapshots(), 1);
        assert_eq!(profiler.delete_all_snapshots(), 0);
        assert_eq!(profiler.snapshot_count(), 0);
    }
}
