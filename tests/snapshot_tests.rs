// Integration tests for heap snapshots of script-created objects

use std::collections::HashSet;

use spectre::config::HostConfig;
use spectre::console::MockConsole;
use spectre::interpreter::engine::Interpreter;
use spectre::snapshot::{extract_facts, find_edge, EdgeKind, HeapNodeRef, HeapSnapshot, NodeType};
use spectre::source::MemorySources;

fn interpreter_with(source: &str) -> Interpreter {
    let console = MockConsole::new();
    let mut interpreter = Interpreter::new(
        &HostConfig::default(),
        Box::new(console.clone()),
        Box::new(MemorySources::new()),
    )
    .expect("Context creation failed");
    assert!(
        interpreter.execute(source, "setup.js", false, true),
        "setup failed: {}",
        console.stderr()
    );
    interpreter
}

fn global(snapshot: &HeapSnapshot) -> HeapNodeRef<'_> {
    snapshot.root().child(1).expect("global root")
}

fn property<'a>(node: HeapNodeRef<'a>, name: &str) -> HeapNodeRef<'a> {
    find_edge(node, EdgeKind::Property, name)
        .unwrap_or_else(|| panic!("no property edge '{}'", name))
}

#[test]
fn test_snapshot_has_no_dangling_edges() {
    let mut interpreter = interpreter_with(
        r#"
        var point = { x: 1, y: "hi", z: 0.5 };
        var list = [point, point, null, true];
        function make(a) { var inner = a; return () => inner; }
        var getter = make(list);
        "#,
    );
    let snapshot = interpreter.take_heap_snapshot();

    let mut ids = HashSet::new();
    for node in snapshot.nodes() {
        assert!(ids.insert(node.id()), "duplicate id {}", node.id());
    }
    for node in snapshot.nodes() {
        for edge in node.edges() {
            let target = edge.to();
            assert!(snapshot.node_by_id(target.id()).is_some());
        }
    }
    assert_eq!(snapshot.root().id(), 1);
}

#[test]
fn test_script_objects_in_graph() {
    let mut interpreter = interpreter_with(
        r#"
        var point = { x: 1, y: "hi", z: 0.5 };
        var list = [point, 2.5];
        function greet(name) { return "hi " + name; }
        "#,
    );
    let snapshot = interpreter.take_heap_snapshot();
    let global = global(&snapshot);
    assert_eq!(global.name(), "global");

    let point = property(global, "point");
    assert_eq!(point.node_type(), NodeType::Object);
    assert_eq!(property(point, "y").name(), "hi");
    assert_eq!(property(point, "y").node_type(), NodeType::String);
    assert_eq!(property(point, "z").node_type(), NodeType::Number);
    // Small integers are immediates
    assert!(find_edge(point, EdgeKind::Property, "x").is_none());

    let list = property(global, "list");
    assert_eq!(list.node_type(), NodeType::Array);
    assert_eq!(find_edge(list, EdgeKind::Element, "0").map(|n| n.id()), Some(point.id()));
    assert_eq!(find_edge(list, EdgeKind::Element, "1").map(|n| n.name()), Some("2.5"));
    assert!(find_edge(list, EdgeKind::Property, "0").is_none());

    let greet = property(global, "greet");
    let facts = extract_facts(greet);
    assert_eq!(&*facts.name, "greet");
    assert_eq!(facts.node_type, NodeType::Closure);
    let code = find_edge(greet, EdgeKind::Internal, "code").expect("code edge");
    assert_eq!(code.node_type(), NodeType::Code);
    assert!(find_edge(greet, EdgeKind::Internal, "context").is_some());

    let print = property(global, "print");
    assert_eq!(print.name(), "print");
}

#[test]
fn test_objects_with_same_keys_share_a_shape() {
    let mut interpreter = interpreter_with(
        r#"
        var a = { p: 1, q: 2 };
        var b = { p: 3, q: 4 };
        var c = { q: 5, p: 6 };
        "#,
    );
    let snapshot = interpreter.take_heap_snapshot();
    let global = global(&snapshot);

    let map_of = |name: &str| {
        find_edge(property(global, name), EdgeKind::Internal, "map")
            .expect("map edge")
            .id()
    };
    assert_eq!(map_of("a"), map_of("b"));
    assert_ne!(map_of("a"), map_of("c"));

    let map = find_edge(property(global, "a"), EdgeKind::Internal, "map").expect("map edge");
    assert_eq!(map.name(), "system / Map");
    assert!(find_edge(map, EdgeKind::Internal, "back_pointer").is_some());
}

#[test]
fn test_captured_variables_are_context_edges() {
    let mut interpreter = interpreter_with(
        r#"
        function make() { var secret = "kept"; return function reveal() { return secret; }; }
        var reveal = make();
        "#,
    );
    let snapshot = interpreter.take_heap_snapshot();
    let closure = property(global(&snapshot), "reveal");

    let context = find_edge(closure, EdgeKind::Internal, "context").expect("context edge");
    assert_eq!(context.name(), "system / Context");
    let secret = find_edge(context, EdgeKind::ContextVariable, "secret").expect("secret");
    assert_eq!(secret.name(), "kept");
}

#[test]
fn test_object_ids_are_stable_across_snapshots() {
    let mut interpreter = interpreter_with("var keep = { v: \"x\" };");

    let first = interpreter.take_heap_snapshot();
    let first_id = property(global(&first), "keep").id();
    assert_eq!(interpreter.delete_heap_snapshots(), 1);

    assert!(interpreter.execute("var extra = [1, 2, 3];", "more.js", false, true));
    let second = interpreter.take_heap_snapshot();
    assert_eq!(property(global(&second), "keep").id(), first_id);
    assert!(second.node_count() > first.node_count());
    assert_ne!(first.uid(), second.uid());
}

#[test]
fn test_dispose_all_is_idempotent() {
    let mut interpreter = interpreter_with("var x = 1;");

    assert_eq!(interpreter.delete_heap_snapshots(), 0);
    interpreter.take_heap_snapshot();
    assert_eq!(interpreter.profiler().snapshot_count(), 1);
    assert_eq!(interpreter.delete_heap_snapshots(), 1);
    assert_eq!(interpreter.delete_heap_snapshots(), 0);
    assert_eq!(interpreter.profiler().snapshot_count(), 0);
}
