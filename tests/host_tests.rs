// Integration tests for script execution, reporting and the session loops

use std::io::Cursor;

use spectre::config::HostConfig;
use spectre::console::{MockConsole, Stream};
use spectre::interpreter::engine::Interpreter;
use spectre::session::{run_batch, run_interactive};
use spectre::source::MemorySources;

fn host_with(config: HostConfig, sources: MemorySources) -> (Interpreter, MockConsole) {
    let console = MockConsole::new();
    let interpreter = Interpreter::new(&config, Box::new(console.clone()), Box::new(sources))
        .expect("Context creation failed");
    (interpreter, console)
}

fn host(sources: MemorySources) -> (Interpreter, MockConsole) {
    host_with(HostConfig::default(), sources)
}

/// Run one unit in a fresh host with printing and reporting on
fn run(source: &str) -> (bool, MockConsole) {
    let (mut interpreter, console) = host(MemorySources::new());
    let ok = interpreter.execute(source, "test.js", true, true);
    interpreter.run_microtasks();
    (ok, console)
}

#[test]
fn test_execution_is_deterministic() {
    let source = r#"
        var list = [1, 2.5, "three", null, undefined];
        var total = 0;
        for (var i = 0; i < 10; i++) { total += i; }
        print(list, total, typeof list, 7 / 2);
    "#;

    let (first_ok, first) = run(source);
    let (second_ok, second) = run(source);

    assert!(first_ok && second_ok);
    assert_eq!(first.stdout(), second.stdout());
    assert_eq!(first.stdout(), "1,2.5,three,, 45 object 3.5\n");
}

#[test]
fn test_bindings_accumulate_across_units() {
    let (mut interpreter, console) = host(MemorySources::new());

    assert!(interpreter.execute("var x = 1;", "(shell)", true, true));
    assert!(interpreter.execute("x + 1;", "(shell)", true, true));

    assert_eq!(console.stdout(), "2\n");
}

#[test]
fn test_undefined_result_is_not_printed() {
    let (ok, console) = run("var a = 5; print; undefined;");
    assert!(ok);
    assert_eq!(console.stdout(), "");
}

#[test]
fn test_compile_error_report() {
    let (mut interpreter, console) = host(MemorySources::new());

    assert!(!interpreter.execute("}", "bad.js", false, true));

    let lines = console.lines(Stream::Err);
    assert!(lines[0].starts_with("bad.js:1:"), "got {:?}", lines);
    assert!(lines[0].contains("SyntaxError"));
    assert_eq!(lines[1], "}");
    assert_eq!(lines[2], "^");
}

#[test]
fn test_report_can_be_suppressed() {
    let (mut interpreter, console) = host(MemorySources::new());
    assert!(!interpreter.execute("throw 1;", "quiet.js", false, false));
    assert_eq!(console.stderr(), "");
}

#[test]
fn test_caret_under_undeclared_identifier() {
    let (ok, console) = run("x.y;");
    assert!(!ok);

    let lines = console.lines(Stream::Err);
    assert_eq!(lines[0], "test.js:1: ReferenceError: x is not defined");
    assert_eq!(lines[1], "x.y;");
    assert_eq!(lines[2], "^");
    assert_eq!(lines[3], "ReferenceError: x is not defined");
    assert_eq!(lines[4], "    at test.js:1:1");
}

#[test]
fn test_caret_under_property_of_undefined() {
    let (ok, console) = run("var x; x.y;");
    assert!(!ok);

    let lines = console.lines(Stream::Err);
    assert_eq!(
        lines[0],
        "test.js:1: TypeError: Cannot read properties of undefined (reading 'y')"
    );
    assert_eq!(lines[1], "var x; x.y;");
    assert_eq!(lines[2], "         ^");
}

#[test]
fn test_stack_trace_lists_frames() {
    let source = "function inner() { throw Error(\"boom\"); }\nfunction outer() { inner(); }\nouter();";
    let (ok, console) = run(source);
    assert!(!ok);

    let stderr = console.stderr();
    assert!(stderr.starts_with("test.js:1: Error: boom\n"), "got {}", stderr);
    assert!(stderr.ends_with(
        "Error: boom\n    at inner (test.js:1:26)\n    at outer (test.js:2:20)\n    at test.js:3:1\n"
    ));
}

#[test]
fn test_caught_errors_are_objects() {
    let source = r#"
        try { missing(); } catch (e) { print(e.name, e.message); }
        try { null.field = 1; } catch (e) { print(e); }
        try { throw "plain"; } catch (e) { print(typeof e, e); }
        var log = [];
        try { log[0] = "try"; } finally { log[1] = "finally"; }
        print(log);
    "#;
    let (ok, console) = run(source);
    assert!(ok, "stderr: {}", console.stderr());

    assert_eq!(
        console.lines(Stream::Out),
        vec![
            "ReferenceError missing is not defined",
            "TypeError: Cannot set properties of null (setting 'field')",
            "string plain",
            "try,finally",
        ]
    );
}

#[test]
fn test_rethrown_error_keeps_creation_trace() {
    let source = "var saved;\ntry { throw Error(\"first\"); } catch (e) { saved = e; }\nthrow saved;";
    let (ok, console) = run(source);
    assert!(!ok);

    let lines = console.lines(Stream::Err);
    assert_eq!(lines[0], "test.js:3: Error: first");
    assert_eq!(lines.last().map(String::as_str), Some("    at test.js:2:13"));
}

#[test]
fn test_closures_and_scopes() {
    let source = r#"
        function counter() {
            var count = 0;
            return function () { count++; return count; };
        }
        var next = counter();
        next(); next();
        const double = x => x * 2;
        var point = { x: 1, y: 2 };
        point.z = point.x + point.y;
        print(next(), double(21), point.z, "a" + 1, 1 + 2 + "b");
    "#;
    let (ok, console) = run(source);
    assert!(ok, "stderr: {}", console.stderr());
    assert_eq!(console.stdout(), "3 42 3 a1 3b\n");
}

#[test]
fn test_const_rejects_assignment() {
    let (mut interpreter, console) = host(MemorySources::new());

    assert!(interpreter.execute("const limit = 3;", "(shell)", true, true));
    assert!(!interpreter.execute("limit = 4;", "(shell)", true, true));
    assert!(interpreter.execute("limit;", "(shell)", true, true));

    assert!(console
        .stderr()
        .contains("TypeError: Assignment to constant variable."));
    assert_eq!(console.stdout(), "3\n");
}

#[test]
fn test_recursion_limit() {
    let config = HostConfig {
        max_call_depth: 50,
        ..HostConfig::default()
    };
    let (mut interpreter, console) = host_with(config, MemorySources::new());

    let source = "function down(n) { return down(n + 1); }\ntry { down(0); } catch (e) { print(e.name); }\ndown(0);";
    assert!(!interpreter.execute(source, "deep.js", false, true));

    assert_eq!(console.stdout(), "RangeError\n");
    let lines = console.lines(Stream::Err);
    assert_eq!(lines[0], "deep.js:1: RangeError: Maximum call stack size exceeded");
    // The trace is capped at ten frames
    assert_eq!(lines.iter().filter(|line| line.starts_with("    at ")).count(), 10);
}

#[test]
fn test_read_builtin() {
    let sources = MemorySources::new().with("data.txt", "hello");
    let (mut interpreter, console) = host(sources);

    assert!(interpreter.execute("print(read(\"data.txt\"));", "r.js", false, true));
    assert_eq!(console.stdout(), "hello\n");

    assert!(!interpreter.execute("read();", "r.js", false, true));
    assert!(console.stderr().starts_with("r.js:1: Error: Bad parameters\n"));

    console.clear();
    assert!(!interpreter.execute("read(\"missing.txt\");", "r.js", false, true));
    assert!(console.stderr().starts_with("r.js:1: Error: Error loading file\n"));
}

#[test]
fn test_ghostify_runs_nested_units() {
    let sources = MemorySources::new()
        .with("lib.js", "var shared = 40;\nfunction add(a, b) { return a + b; }")
        .with("broken.js", "var ok = 1;\nfail();");
    let (mut interpreter, console) = host(sources);

    assert!(interpreter.execute("ghostify(\"lib.js\"); print(add(shared, 2));", "main.js", false, true));
    assert_eq!(console.stdout(), "42\n");

    assert!(!interpreter.execute("ghostify(\"broken.js\");", "main.js", false, true));
    let lines = console.lines(Stream::Err);
    assert_eq!(lines[0], "broken.js:2: ReferenceError: fail is not defined");
    assert_eq!(lines[lines.len() - 2], "    at broken.js:2:1");
    assert_eq!(lines[lines.len() - 1], "    at main.js:1:1");

    // Bindings made before the failure persist
    assert!(interpreter.execute("ok;", "main.js", true, true));
    assert!(console.stdout().ends_with("1\n"));

    console.clear();
    assert!(!interpreter.execute("ghostify(\"nowhere.js\");", "main.js", false, true));
    assert!(console.stderr().starts_with("main.js:1: Error: Error loading file\n"));
}

#[test]
fn test_haunt_output() {
    let (mut interpreter, console) = host(MemorySources::new());

    assert!(interpreter.execute("var answer = 42; haunt();", "h.js", false, true));

    let lines = console.lines(Stream::Out);
    assert_eq!(lines.len(), 6);
    let count: usize = lines[0]
        .strip_prefix("Nodes count: ")
        .and_then(|n| n.parse().ok())
        .expect("node count line");
    assert!(count > 1);
    assert_eq!(lines[1], "Node name: system / Map");
    assert_eq!(lines[2], "Node size: 80");
    assert_eq!(lines[3], "Node type: 0");
    assert!(lines[4].starts_with("Global id: @"));
    assert_eq!(lines[5], "========================");

    assert_eq!(interpreter.profiler().snapshot_count(), 0);
}

#[test]
fn test_microtasks_run_in_order_after_unit() {
    let (mut interpreter, console) = host(MemorySources::new());

    let source = r#"
        queueMicrotask(function () { print("first"); queueMicrotask(() => print("third")); });
        queueMicrotask(function () { print("second"); });
        print("sync");
    "#;
    assert!(interpreter.execute(source, "m.js", false, true));
    assert_eq!(console.stdout(), "sync\n");

    assert!(interpreter.run_microtasks());
    assert_eq!(console.lines(Stream::Out), vec!["sync", "first", "second", "third"]);

    assert!(!interpreter.execute("queueMicrotask(1);", "m.js", false, true));
    assert!(console.stderr().contains("TypeError"));
}

#[test]
fn test_failed_microtask_is_reported_and_draining_continues() {
    let (mut interpreter, console) = host(MemorySources::new());

    let source = "queueMicrotask(() => missing);\nqueueMicrotask(() => print(\"after\"));";
    assert!(interpreter.execute(source, "m.js", false, true));
    assert!(!interpreter.run_microtasks());

    assert_eq!(console.stdout(), "after\n");
    assert!(console
        .stderr()
        .starts_with("m.js:1: ReferenceError: missing is not defined\n"));
}

#[test]
fn test_batch_stops_at_first_failure() {
    let sources = MemorySources::new()
        .with("one.js", "print(\"one\");")
        .with("two.js", "}")
        .with("three.js", "print(\"three\");");
    let (mut interpreter, console) = host(sources);

    let status = run_batch(&mut interpreter, &["one.js", "two.js", "three.js"]);

    assert_eq!(status, 1);
    assert_eq!(console.stdout(), "one\n");
    assert!(console.stderr().starts_with("two.js:1:"));
}

#[test]
fn test_batch_success_and_unreadable_files() {
    let sources = MemorySources::new()
        .with("a.js", "var total = 1;")
        .with("b.js", "print(total + 1);");
    let (mut interpreter, console) = host(sources);

    let status = run_batch(&mut interpreter, &["a.js", "gone.js", "b.js"]);

    assert_eq!(status, 0);
    assert_eq!(console.stdout(), "2\n");
    assert_eq!(console.stderr(), "Error reading 'gone.js'\n");
}

#[test]
fn test_interactive_session() {
    let (mut interpreter, console) = host(MemorySources::new());
    let input = Cursor::new("var n = 2\nn * 21\nboom\nn\n");

    let status = run_interactive(&mut interpreter, input);

    assert_eq!(status, 0);
    // Prompts share the error stream with reports; results alone reach stdout
    assert_eq!(console.stdout(), "42\n2\n");
    let stderr = console.stderr();
    assert!(stderr.starts_with(&format!("Welcome to Spectre {}\n> > > ", spectre::VERSION)));
    assert!(stderr.contains("> > > (shell):1: ReferenceError: boom is not defined\n"));
    assert!(stderr.ends_with("> > \n"));
}

#[test]
fn test_interactive_session_survives_invalid_utf8() {
    let (mut interpreter, console) = host(MemorySources::new());
    let input = Cursor::new(b"print(1)\n\"\xff\"\nprint(2)\n".to_vec());

    let status = run_interactive(&mut interpreter, input);

    assert_eq!(status, 0);
    assert_eq!(console.stdout(), "1\n\u{fffd}\n2\n");
}

#[test]
fn test_deep_nesting_is_a_compile_error() {
    let (stdout, stderr) = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let (mut interpreter, console) = host(MemorySources::new());
            let depth = 1_000_000;
            let source = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));

            assert!(!interpreter.execute(&source, "deep.js", true, true));
            assert!(interpreter.execute("1 + 1", "(shell)", true, true));
            (console.stdout(), console.stderr())
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(stdout, "2\n");
    assert!(stderr.starts_with("deep.js:1: SyntaxError: Maximum call stack size exceeded\n"));
}

#[test]
fn test_expression_depth_limit() {
    let config = HostConfig {
        max_expression_depth: 20,
        ..HostConfig::default()
    };
    let (mut interpreter, console) = host_with(config, MemorySources::new());

    let source = format!("{}1{}", "[".repeat(30), "]".repeat(30));
    assert!(!interpreter.execute(&source, "deep.js", true, true));
    assert!(interpreter.execute("[[[7]]][0][0][0]", "(shell)", true, true));

    assert!(console
        .stderr()
        .starts_with("deep.js:1: RangeError: Maximum call stack size exceeded\n"));
    assert_eq!(console.stdout(), "7\n");
}

#[test]
fn test_deeply_nested_array_display() {
    let config = HostConfig {
        max_expression_depth: 5,
        ..HostConfig::default()
    };
    let (mut interpreter, console) = host_with(config, MemorySources::new());

    let source = "var a = [1]; for (var i = 0; i < 100000; i++) { a = [a]; } print(a); print([[2]]);";
    assert!(interpreter.execute(source, "deep.js", true, true));
    assert_eq!(console.stdout(), "\n2\n");
}

#[test]
fn test_oversized_array_keys() {
    let (ok, console) = run(r#"
        var a = [];
        a["18446744073709551615"] = 1;
        a["2305843009213693952"] = 2;
        a[4294967295] = 3;
        print(a.length, a["18446744073709551615"], a["2305843009213693952"], a[4294967295]);
        try { a[4294967294] = 4; } catch (e) { print(e.name, a.length); }
    "#);

    assert!(ok);
    assert_eq!(console.stdout(), "0 1 2 3\nRangeError 0\n");
}

#[test]
fn test_interactive_lines_are_truncated() {
    let config = HostConfig {
        max_line_length: 4,
        ..HostConfig::default()
    };
    let (mut interpreter, console) = host_with(config, MemorySources::new());

    run_interactive(&mut interpreter, Cursor::new("1 + 2 + 3\n"));

    // Only "1 + " is evaluated
    assert!(console.stderr().contains("SyntaxError"));
    assert!(!console.stdout().contains('6'));
}
