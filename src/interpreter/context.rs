//! The execution context
//!
//! [`ExecutionContext`] is the single persistent namespace scripts run in. It
//! owns the heap (and with it the global object), the call stack, the registry
//! of every script unit compiled so far, and the microtask queue. It is created
//! once by the host and passed explicitly to everything that needs it.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::config::HostConfig;
use crate::memory::heap::{Heap, HeapError, ObjectKind};
use crate::memory::stack::CallStack;
use crate::memory::value::{ObjectId, Value};
use crate::snapshot::GcRoots;

/// Index of a compiled unit in the script registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(pub usize);

/// A unit of source text and the name it was compiled under
#[derive(Debug, Clone)]
pub struct Script {
    pub origin: String,
    pub source: Rc<str>,
}

impl Script {
    /// Text of the 1-based `line`, without its terminator
    pub fn line_text(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|index| self.source.lines().nth(index))
    }

    /// Text covered by a character span
    pub fn slice(&self, offset: usize, len: usize) -> String {
        self.source.chars().skip(offset).take(len).collect()
    }
}

#[derive(Debug)]
pub struct ExecutionContext {
    pub heap: Heap,
    pub global: ObjectId,
    pub stack: CallStack,
    /// Top-level names bound with `const`
    pub const_globals: FxHashSet<Rc<str>>,
    pub microtasks: VecDeque<Value>,
    scripts: Vec<Script>,
}

impl ExecutionContext {
    pub fn new(config: &HostConfig) -> Result<Self, HeapError> {
        let mut heap = Heap::new(config.heap_limit);
        let global = heap.allocate(ObjectKind::Global)?;

        Ok(ExecutionContext {
            heap,
            global,
            stack: CallStack::new(config.max_call_depth),
            const_globals: FxHashSet::default(),
            microtasks: VecDeque::new(),
            scripts: Vec::new(),
        })
    }

    pub fn register_script(&mut self, origin: &str, source: &str) -> ScriptId {
        self.scripts.push(Script {
            origin: origin.to_string(),
            source: Rc::from(source),
        });
        ScriptId(self.scripts.len() - 1)
    }

    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(id.0)
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Scope of the running frame; `None` means the global scope
    pub fn current_scope(&self) -> Option<ObjectId> {
        self.stack.current_frame().and_then(|frame| frame.scope)
    }

    pub fn current_script(&self) -> Option<ScriptId> {
        self.stack.current_frame().map(|frame| frame.script)
    }

    /// Snapshot roots: the global object, every active frame's scope and the
    /// pending microtasks
    pub fn roots(&self) -> GcRoots {
        GcRoots {
            global: self.global,
            stack_scopes: self
                .stack
                .frames()
                .iter()
                .filter_map(|frame| frame.scope)
                .collect(),
            microtasks: self.microtasks.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_lines() {
        let mut context = ExecutionContext::new(&HostConfig::default()).unwrap();
        let id = context.register_script("a.js", "var a = 1;\nvar b = 2;\n");
        let script = context.script(id).unwrap();

        assert_eq!(script.origin, "a.js");
        assert_eq!(script.line_text(2), Some("var b = 2;"));
        assert_eq!(script.line_text(0), None);
        assert_eq!(script.slice(4, 1), "a");
    }

    #[test]
    fn test_roots_without_frames() {
        let context = ExecutionContext::new(&HostConfig::default()).unwrap();
        let roots = context.roots();
        assert_eq!(roots.global, context.global);
        assert!(roots.stack_scopes.is_empty());
    }
}
