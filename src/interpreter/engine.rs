//! Execution engine for the script host
//!
//! [`Interpreter`] ties the pieces together: it compiles each unit into the
//! shared [`ExecutionContext`], runs it, reports failures, and owns the heap
//! profiler and the host streams. Statement and expression evaluation live in
//! the sibling `statements` and `expressions` modules as further `impl
//! Interpreter` blocks; built-ins live in `builtins`.

use std::rc::Rc;

use tracing::debug;

use crate::config::HostConfig;
use crate::console::Console;
use crate::interpreter::builtins;
use crate::interpreter::constants::STACK_TRACE_LIMIT;
use crate::interpreter::context::{ExecutionContext, ScriptId};
use crate::interpreter::errors::{ErrorKind, Exception, HostError, RuntimeError, ThrowSite};
use crate::interpreter::report::{render_report, ReportSite};
use crate::memory::heap::{HeapError, ObjectKind};
use crate::memory::stack::StackFrame;
use crate::memory::value::{ObjectId, Value};
use crate::parser::ast::{AstNode, DeclKind, FunctionBody, FunctionDef, Program, SourceLocation};
use crate::parser::parse;
use crate::snapshot::{HeapProfiler, HeapSnapshot};
use crate::source::{LoadError, SourceProvider};

pub type ExecResult<T> = Result<T, Exception>;

/// How a statement completed
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// The script host: one persistent context plus the host services
pub struct Interpreter {
    pub(crate) context: ExecutionContext,
    pub(crate) profiler: HeapProfiler,
    pub(crate) console: Box<dyn Console>,
    pub(crate) sources: Box<dyn SourceProvider>,
    /// Expressions currently being evaluated, across all active calls
    pub(crate) expression_depth: usize,
    config: HostConfig,
}

impl Interpreter {
    /// Create the execution context and install the built-ins
    pub fn new(
        config: &HostConfig,
        console: Box<dyn Console>,
        sources: Box<dyn SourceProvider>,
    ) -> Result<Self, HeapError> {
        let mut context = ExecutionContext::new(config)?;
        builtins::install(&mut context)?;

        Ok(Interpreter {
            context,
            profiler: HeapProfiler::new(),
            console,
            sources,
            expression_depth: 0,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn profiler(&self) -> &HeapProfiler {
        &self.profiler
    }

    pub fn console_mut(&mut self) -> &mut dyn Console {
        self.console.as_mut()
    }

    /// Capture the live heap; the snapshot is held until
    /// [`Interpreter::delete_heap_snapshots`]
    pub fn take_heap_snapshot(&mut self) -> Rc<HeapSnapshot> {
        let roots = self.context.roots();
        self.profiler.take_snapshot(&self.context.heap, &roots)
    }

    /// Release every held snapshot; returns how many were released
    pub fn delete_heap_snapshots(&mut self) -> usize {
        self.profiler.delete_all_snapshots()
    }

    /// Resolve a source name through the host's source provider
    pub fn load_source(&self, name: &str) -> Result<String, LoadError> {
        self.sources.load_source(name)
    }

    /// Compile and run one unit.
    ///
    /// With `print_result`, a completion value other than `undefined` is
    /// written to the output stream. With `report_exceptions`, a failure is
    /// rendered to the error stream. Returns whether the unit succeeded.
    pub fn execute(
        &mut self,
        source: &str,
        origin: &str,
        print_result: bool,
        report_exceptions: bool,
    ) -> bool {
        match self.run_unit(source, origin, None) {
            Ok(value) => {
                if print_result && !value.is_undefined() {
                    let text = self.display_string(&value);
                    self.console.out(&format!("{}\n", text));
                }
                true
            }
            Err(exception) => {
                debug!(origin, error = %exception, "unit failed");
                if report_exceptions {
                    self.report_exception(&exception);
                }
                false
            }
        }
    }

    /// Compile and run a unit, returning its completion value.
    ///
    /// `call_site` is set when the unit is run on behalf of script code
    /// (`ghostify`) and links the unit's frame to the caller in stack traces.
    pub fn run_unit(
        &mut self,
        source: &str,
        origin: &str,
        call_site: Option<SourceLocation>,
    ) -> ExecResult<Value> {
        let script = self.context.register_script(origin, source);
        debug!(origin, script = script.0, "compiling unit");

        let program = parse(source).map_err(|err| Exception {
            error: RuntimeError::Syntax {
                message: err.message,
                location: err.location,
            },
            site: Some(ThrowSite {
                script,
                location: err.location,
            }),
            stack_trace: None,
        })?;

        let base_depth = self.context.stack.depth();
        let frame = StackFrame {
            call_site,
            ..StackFrame::top_level(script)
        };
        if !self.context.stack.push_frame(frame) {
            return Err(self.raise(RuntimeError::StackOverflow {
                location: call_site.unwrap_or_default(),
            }));
        }

        let result = self.run_program(&program);
        self.context.stack.truncate(base_depth);
        result
    }

    fn run_program(&mut self, program: &Program) -> ExecResult<Value> {
        self.hoist_declarations(&program.nodes)?;

        // The completion value is that of the last expression statement
        let mut completion = Value::Undefined;
        for node in &program.nodes {
            match node {
                AstNode::ExpressionStatement { expr, .. } => {
                    completion = self.evaluate_expr(expr)?;
                }
                _ => {
                    self.execute_statement(node)?;
                }
            }
        }
        Ok(completion)
    }

    /// Drain the microtask queue in FIFO order, including tasks queued while
    /// draining. Failures are reported and draining continues. Returns whether
    /// every task succeeded.
    pub fn run_microtasks(&mut self) -> bool {
        let mut succeeded = true;
        let mut ran = 0usize;

        while let Some(task) = self.context.microtasks.pop_front() {
            let Some(callee) = task.as_object() else {
                continue;
            };
            ran += 1;
            if let Err(exception) = self.call_function(callee, Vec::new(), None) {
                succeeded = false;
                self.report_exception(&exception);
            }
        }

        if ran > 0 {
            debug!(ran, succeeded, "microtasks drained");
        }
        succeeded
    }

    /// Render an exception to the error stream
    pub fn report_exception(&mut self, exception: &Exception) {
        let message = exception.message();
        let site = exception.site.and_then(|site| {
            let script = self.context.script(site.script)?;
            Some(ReportSite {
                origin: &script.origin,
                location: site.location,
                line_text: script.line_text(site.location.line).unwrap_or(""),
            })
        });
        let report = render_report(&message, site, exception.stack_trace.as_deref());
        self.console.err(&report);
    }

    // ===== Exceptions =====

    /// Turn an engine error into an exception thrown from the running frame
    pub(crate) fn raise(&self, error: RuntimeError) -> Exception {
        let location = *error.location();
        let stack_trace = Some(self.capture_stack_trace(&error.headline(), location));
        Exception {
            site: self.throw_site(location),
            error,
            stack_trace,
        }
    }

    /// Exception for a `throw` of a script value. Error objects carry the
    /// trace captured when they were created.
    pub(crate) fn throw_value(&self, value: Value, location: SourceLocation) -> Exception {
        let stack_trace = value
            .as_object()
            .filter(|&id| matches!(self.context.heap.object(id).kind, ObjectKind::Error(_)))
            .and_then(|id| self.context.heap.get_property(id, "stack"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Exception {
            site: self.throw_site(location),
            error: RuntimeError::Thrown {
                display: self.display_string(&value),
                value,
                location,
            },
            stack_trace,
        }
    }

    pub(crate) fn heap_failure(&self, err: HeapError, location: SourceLocation) -> Exception {
        self.raise(RuntimeError::Host {
            kind: ErrorKind::RangeError,
            message: err.to_string(),
            location,
        })
    }

    fn host_failure(&self, err: HostError, location: SourceLocation) -> Exception {
        match err {
            HostError::Throw { kind, message } => self.raise(RuntimeError::Host {
                kind,
                message,
                location,
            }),
            HostError::Propagate(exception) => *exception,
        }
    }

    fn throw_site(&self, location: SourceLocation) -> Option<ThrowSite> {
        self.context
            .current_script()
            .map(|script| ThrowSite { script, location })
    }

    /// `headline` followed by one `    at ...` line per active frame, innermost
    /// first
    pub(crate) fn capture_stack_trace(&self, headline: &str, location: SourceLocation) -> String {
        let mut trace = headline.to_string();
        let mut location = Some(location);

        for frame in self.context.stack.frames().iter().rev().take(STACK_TRACE_LIMIT) {
            let Some(at) = location else { break };
            let origin = self
                .context
                .script(frame.script)
                .map(|script| script.origin.as_str())
                .unwrap_or("<unknown>");

            if frame.function_name.is_empty() {
                trace.push_str(&format!("\n    at {}:{}:{}", origin, at.line, at.column));
            } else {
                trace.push_str(&format!(
                    "\n    at {} ({}:{}:{})",
                    frame.function_name, origin, at.line, at.column
                ));
            }
            location = frame.call_site;
        }

        trace
    }

    /// Script value seen by a `catch` clause
    pub(crate) fn exception_value(&mut self, exception: &Exception) -> ExecResult<Value> {
        match &exception.error {
            RuntimeError::Thrown { value, .. } => Ok(value.clone()),
            error => {
                let kind = error.kind().unwrap_or(ErrorKind::Error);
                let location = *error.location();
                let id = self
                    .new_error_object(kind, &error.to_string(), exception.stack_trace.as_deref())
                    .map_err(|err| self.heap_failure(err, location))?;
                Ok(Value::Object(id))
            }
        }
    }

    pub(crate) fn new_error_object(
        &mut self,
        kind: ErrorKind,
        message: &str,
        stack: Option<&str>,
    ) -> Result<ObjectId, HeapError> {
        let heap = &mut self.context.heap;
        let id = heap.allocate(ObjectKind::Error(kind))?;
        heap.set_property(id, "message", Value::string(message))?;
        if let Some(stack) = stack {
            heap.set_property(id, "stack", Value::string(stack))?;
        }
        Ok(id)
    }

    // ===== Functions =====

    /// Create a closure over the running scope
    pub(crate) fn make_closure(&mut self, function: &Rc<FunctionDef>) -> ExecResult<Value> {
        let kind = ObjectKind::Closure {
            function: Rc::clone(function),
            scope: self.context.current_scope(),
            script: self.context.current_script().unwrap_or(ScriptId(0)),
        };
        self.context
            .heap
            .allocate(kind)
            .map(Value::Object)
            .map_err(|err| self.heap_failure(err, function.location))
    }

    /// Invoke a callable object
    pub(crate) fn call_function(
        &mut self,
        callee: ObjectId,
        args: Vec<Value>,
        call_site: Option<SourceLocation>,
    ) -> ExecResult<Value> {
        let location = call_site.unwrap_or_default();

        match &self.context.heap.object(callee).kind {
            ObjectKind::Native(builtin) => {
                let builtin = *builtin;
                self.call_builtin(builtin, &args, location)
                    .map_err(|err| self.host_failure(err, location))
            }
            ObjectKind::Closure {
                function,
                scope,
                script,
            } => {
                let (function, scope, script) = (Rc::clone(function), *scope, *script);
                self.call_closure(callee, &function, scope, script, args, call_site)
            }
            _ => Err(self.raise(RuntimeError::NotCallable {
                callee: self.display_string(&Value::Object(callee)),
                location,
            })),
        }
    }

    fn call_closure(
        &mut self,
        callee: ObjectId,
        function: &FunctionDef,
        parent: Option<ObjectId>,
        script: ScriptId,
        args: Vec<Value>,
        call_site: Option<SourceLocation>,
    ) -> ExecResult<Value> {
        let location = call_site.unwrap_or(function.location);
        let scope = self.new_function_scope(callee, function, parent, args)
            .map_err(|err| self.heap_failure(err, location))?;

        let frame = StackFrame {
            function_name: Rc::from(function.name.as_deref().unwrap_or("")),
            script,
            scope: Some(scope),
            call_site,
        };
        let base_depth = self.context.stack.depth();
        if !self.context.stack.push_frame(frame) {
            return Err(self.raise(RuntimeError::StackOverflow { location }));
        }

        let result = self.run_function_body(function);
        self.context.stack.truncate(base_depth);
        result
    }

    /// Scope for one activation: the function's own name, then its parameters
    fn new_function_scope(
        &mut self,
        callee: ObjectId,
        function: &FunctionDef,
        parent: Option<ObjectId>,
        args: Vec<Value>,
    ) -> Result<ObjectId, HeapError> {
        let heap = &mut self.context.heap;
        let scope = heap.allocate(ObjectKind::Scope {
            parent,
            bindings: Vec::new(),
        })?;

        if let Some(name) = &function.name {
            heap.declare_binding(scope, Rc::from(name.as_str()), Value::Object(callee), true)?;
        }
        let mut args = args.into_iter();
        for param in &function.params {
            let value = args.next().unwrap_or_default();
            heap.declare_binding(scope, Rc::from(param.as_str()), value, true)?;
        }
        Ok(scope)
    }

    fn run_function_body(&mut self, function: &FunctionDef) -> ExecResult<Value> {
        match &function.body {
            FunctionBody::Expression(expr) => self.evaluate_expr(expr),
            FunctionBody::Block(body) => {
                self.hoist_declarations(body)?;
                for stmt in body {
                    if let ControlFlow::Return(value) = self.execute_statement(stmt)? {
                        return Ok(value);
                    }
                }
                Ok(Value::Undefined)
            }
        }
    }

    // ===== Variables =====

    /// Bind every `var` name and function declaration of a body before it runs.
    /// Nested function bodies are left alone.
    pub(crate) fn hoist_declarations(&mut self, body: &[AstNode]) -> ExecResult<()> {
        let mut vars = Vec::new();
        let mut functions = Vec::new();
        collect_hoisted(body, &mut vars, &mut functions);

        for (name, location) in vars {
            self.hoist_var(&name, location)?;
        }
        for function in functions {
            let closure = self.make_closure(&function)?;
            if let Some(name) = &function.name {
                self.declare_variable(DeclKind::Var, name, closure, function.location)?;
            }
        }
        Ok(())
    }

    fn hoist_var(&mut self, name: &str, location: SourceLocation) -> ExecResult<()> {
        let result = match self.context.current_scope() {
            Some(scope) => {
                if self.lookup_binding(scope, name).is_some() {
                    return Ok(());
                }
                self.context
                    .heap
                    .declare_binding(scope, Rc::from(name), Value::Undefined, true)
            }
            None => {
                let global = self.context.global;
                if self.context.heap.has_property(global, name) {
                    return Ok(());
                }
                self.context.heap.set_property(global, name, Value::Undefined)
            }
        };
        result.map_err(|err| self.heap_failure(err, location))
    }

    /// Bind a declared name in the running scope
    pub(crate) fn declare_variable(
        &mut self,
        kind: DeclKind,
        name: &str,
        value: Value,
        location: SourceLocation,
    ) -> ExecResult<()> {
        let result = match self.context.current_scope() {
            Some(scope) => self.context.heap.declare_binding(
                scope,
                Rc::from(name),
                value,
                kind != DeclKind::Const,
            ),
            None => {
                if self.context.const_globals.contains(name) {
                    return Err(self.raise(RuntimeError::Redeclaration {
                        name: name.to_string(),
                        location,
                    }));
                }
                let global = self.context.global;
                let result = self.context.heap.set_property(global, name, value);
                if kind == DeclKind::Const {
                    self.context.const_globals.insert(Rc::from(name));
                }
                result
            }
        };
        result.map_err(|err| self.heap_failure(err, location))
    }

    /// Resolve a name through the scope chain, then the global object
    pub(crate) fn read_variable(&self, name: &str) -> Option<Value> {
        if let Some((scope, index)) = self.find_binding(name) {
            if let ObjectKind::Scope { bindings, .. } = &self.context.heap.object(scope).kind {
                return Some(bindings[index].value.clone());
            }
        }
        self.context
            .heap
            .get_property(self.context.global, name)
            .cloned()
    }

    /// Assign to a name; unknown names become globals
    pub(crate) fn write_variable(
        &mut self,
        name: &str,
        value: Value,
        location: SourceLocation,
    ) -> ExecResult<()> {
        if let Some((scope, index)) = self.find_binding(name) {
            if let ObjectKind::Scope { bindings, .. } =
                &mut self.context.heap.object_mut(scope).kind
            {
                if bindings[index].mutable {
                    bindings[index].value = value;
                    return Ok(());
                }
            }
            return Err(self.raise(RuntimeError::ConstAssignment { location }));
        }

        if self.context.const_globals.contains(name) {
            return Err(self.raise(RuntimeError::ConstAssignment { location }));
        }
        let global = self.context.global;
        self.context
            .heap
            .set_property(global, name, value)
            .map_err(|err| self.heap_failure(err, location))
    }

    fn find_binding(&self, name: &str) -> Option<(ObjectId, usize)> {
        let mut scope = self.context.current_scope();
        while let Some(id) = scope {
            if let Some(index) = self.lookup_binding(id, name) {
                return Some((id, index));
            }
            scope = match &self.context.heap.object(id).kind {
                ObjectKind::Scope { parent, .. } => *parent,
                _ => None,
            };
        }
        None
    }

    fn lookup_binding(&self, scope: ObjectId, name: &str) -> Option<usize> {
        match &self.context.heap.object(scope).kind {
            ObjectKind::Scope { bindings, .. } => {
                bindings.iter().position(|binding| &*binding.name == name)
            }
            _ => None,
        }
    }

    // ===== Display =====

    /// String conversion used by `print`, the shell and string concatenation
    pub fn display_string(&self, value: &Value) -> String {
        let mut visiting = Vec::new();
        self.display_inner(value, &mut visiting)
    }

    fn display_inner(&self, value: &Value, visiting: &mut Vec<ObjectId>) -> String {
        let Value::Object(id) = value else {
            return value.to_string();
        };
        let heap = &self.context.heap;

        match &heap.object(*id).kind {
            ObjectKind::Array(elements) => {
                // Cycles and arrays nested past the expression depth limit render empty
                if visiting.contains(id) || visiting.len() >= self.config.max_expression_depth {
                    return String::new();
                }
                visiting.push(*id);
                let text = elements
                    .iter()
                    .map(|element| {
                        if element.is_nullish() {
                            String::new()
                        } else {
                            self.display_inner(element, visiting)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                visiting.pop();
                text
            }
            ObjectKind::Closure {
                function, script, ..
            } => self
                .context
                .script(*script)
                .map(|script| script.slice(function.location.offset, function.location.len))
                .unwrap_or_else(|| "function () { [code] }".to_string()),
            ObjectKind::Native(builtin) => {
                format!("function {}() {{ [native code] }}", builtin.name())
            }
            ObjectKind::Error(kind) => {
                let message = heap
                    .get_property(*id, "message")
                    .map(|message| self.display_inner(message, visiting))
                    .unwrap_or_default();
                if message.is_empty() {
                    kind.to_string()
                } else {
                    format!("{}: {}", kind, message)
                }
            }
            ObjectKind::Global => "[object global]".to_string(),
            ObjectKind::Ordinary | ObjectKind::Scope { .. } => "[object Object]".to_string(),
        }
    }
}

/// Collect `var` names and function declarations of a body, descending into
/// nested blocks but not nested functions
fn collect_hoisted(
    body: &[AstNode],
    vars: &mut Vec<(String, SourceLocation)>,
    functions: &mut Vec<Rc<FunctionDef>>,
) {
    for node in body {
        match node {
            AstNode::VarDecl {
                kind: DeclKind::Var,
                declarations,
                ..
            } => {
                vars.extend(
                    declarations
                        .iter()
                        .map(|decl| (decl.name.clone(), decl.location)),
                );
            }
            AstNode::FunctionDecl { function } => functions.push(Rc::clone(function)),
            AstNode::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_hoisted(then_branch, vars, functions);
                if let Some(else_branch) = else_branch {
                    collect_hoisted(else_branch, vars, functions);
                }
            }
            AstNode::While { body, .. } | AstNode::DoWhile { body, .. } => {
                collect_hoisted(body, vars, functions);
            }
            AstNode::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_hoisted(std::slice::from_ref(init.as_ref()), vars, functions);
                }
                collect_hoisted(body, vars, functions);
            }
            AstNode::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                collect_hoisted(block, vars, functions);
                if let Some(handler) = handler {
                    collect_hoisted(&handler.body, vars, functions);
                }
                if let Some(finalizer) = finalizer {
                    collect_hoisted(finalizer, vars, functions);
                }
            }
            AstNode::Block { statements, .. } => collect_hoisted(statements, vars, functions),
            _ => {}
        }
    }
}
