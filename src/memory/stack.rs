//! Call stack implementation
//!
//! This module provides the call stack for function execution:
//! - [`CallStack`]: The stack of active frames, bounded by a maximum depth
//! - [`StackFrame`]: A single activation record
//!
//! Frames do not hold variables themselves; those live in heap scope objects
//! so closures can capture them. A frame records which scope it runs in (a
//! snapshot root) and where it was called from (for stack traces).

use std::rc::Rc;

use super::value::ObjectId;
use crate::interpreter::context::ScriptId;
use crate::parser::ast::SourceLocation;

/// Stack frame for a function call or a top-level unit
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Empty for top-level code and anonymous functions
    pub function_name: Rc<str>,
    /// Script the running code was compiled from
    pub script: ScriptId,
    /// Scope object for the frame's variables; `None` at top level
    pub scope: Option<ObjectId>,
    /// Location in the caller that invoked this frame
    pub call_site: Option<SourceLocation>,
}

impl StackFrame {
    pub fn top_level(script: ScriptId) -> Self {
        StackFrame {
            function_name: Rc::from(""),
            script,
            scope: None,
            call_site: None,
        }
    }
}

/// The call stack
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<StackFrame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a new stack frame; returns false if the stack is full
    pub fn push_frame(&mut self, frame: StackFrame) -> bool {
        if self.frames.len() >= self.max_depth {
            return false;
        }
        self.frames.push(frame);
        true
    }

    /// Pop the top stack frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Get the current (top) frame
    pub fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Get all frames, outermost first
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Get the depth of the call stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop frames above `depth`, used when an exception unwinds several frames
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let mut stack = CallStack::new(2);
        assert!(stack.push_frame(StackFrame::top_level(ScriptId(0))));
        assert!(stack.push_frame(StackFrame::top_level(ScriptId(0))));
        assert!(!stack.push_frame(StackFrame::top_level(ScriptId(0))));
        assert_eq!(stack.depth(), 2);

        stack.truncate(0);
        assert!(stack.is_empty());
    }
}
