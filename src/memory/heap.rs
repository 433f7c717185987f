//! Heap implementation for the interpreter
//!
//! This module provides the object arena backing every script value with
//! identity:
//! - Bump allocation into a `Vec` arena, addressed by [`ObjectId`]
//! - Hidden classes ([`Shape`]): objects that received the same keys in the same
//!   order share a shape; adding a key follows (or creates) a transition
//! - Stable ids: every object and shape receives an odd id at allocation, which
//!   heap snapshots report as the node id
//! - A byte budget enforced on allocation and growth
//!
//! Nothing is ever freed; a snapshot only reports what is reachable from the
//! roots, so garbage is simply invisible to it.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::value::{ObjectId, Value};
use crate::interpreter::builtins::Builtin;
use crate::interpreter::constants::*;
use crate::interpreter::context::ScriptId;
use crate::interpreter::errors::ErrorKind;
use crate::parser::ast::FunctionDef;

/// Heap failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("Out of memory: requested {requested} bytes, {used} already in use, limit is {limit}")]
    OutOfMemory {
        requested: usize,
        used: usize,
        limit: usize,
    },
}

/// Index of a shape in the heap's shape table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

/// Family of root shapes; objects of different families never share a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFamily {
    Ordinary,
    Global,
    Array,
    Function,
    Error,
    Scope,
}

/// A hidden class: the ordered key layout shared by objects
#[derive(Debug, Clone)]
pub struct Shape {
    pub stable_id: u32,
    pub family: ShapeFamily,
    pub keys: Vec<Rc<str>>,
    /// The shape this one was derived from by adding its last key
    pub back_pointer: Option<ShapeId>,
    /// Shapes derived from this one, keyed by the added property
    pub transitions: Vec<(Rc<str>, ShapeId)>,
}

impl Shape {
    pub fn slot_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| &**k == key)
    }
}

/// A variable slot in a scope object
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Rc<str>,
    pub value: Value,
    pub mutable: bool,
}

/// What kind of object a heap slot holds, with its kind-specific payload
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Ordinary,
    Global,
    Array(Vec<Value>),
    Closure {
        function: Rc<FunctionDef>,
        scope: Option<ObjectId>,
        script: ScriptId,
    },
    Native(Builtin),
    Error(ErrorKind),
    /// A function activation's variables
    Scope {
        parent: Option<ObjectId>,
        bindings: Vec<Binding>,
    },
}

impl ObjectKind {
    pub fn family(&self) -> ShapeFamily {
        match self {
            ObjectKind::Ordinary => ShapeFamily::Ordinary,
            ObjectKind::Global => ShapeFamily::Global,
            ObjectKind::Array(_) => ShapeFamily::Array,
            ObjectKind::Closure { .. } | ObjectKind::Native(_) => ShapeFamily::Function,
            ObjectKind::Error(_) => ShapeFamily::Error,
            ObjectKind::Scope { .. } => ShapeFamily::Scope,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ObjectKind::Closure { .. } | ObjectKind::Native(_))
    }

    fn base_size(&self) -> usize {
        match self {
            ObjectKind::Ordinary | ObjectKind::Global | ObjectKind::Error(_) => {
                OBJECT_HEADER_SIZE
            }
            ObjectKind::Array(elements) => ARRAY_HEADER_SIZE + elements.len() * POINTER_SIZE,
            ObjectKind::Closure { .. } => CLOSURE_SIZE,
            ObjectKind::Native(_) => NATIVE_FUNCTION_SIZE,
            ObjectKind::Scope { bindings, .. } => {
                SCOPE_HEADER_SIZE + bindings.len() * POINTER_SIZE
            }
        }
    }
}

/// An object in the heap
#[derive(Debug, Clone)]
pub struct HeapObject {
    pub stable_id: u32,
    pub shape: ShapeId,
    /// Property values, in the order of the shape's keys
    pub slots: Vec<Value>,
    pub kind: ObjectKind,
}

impl HeapObject {
    /// Bytes owned directly by this object
    pub fn shallow_size(&self) -> usize {
        self.kind.base_size() + self.slots.len() * POINTER_SIZE
    }
}

/// The heap
#[derive(Debug, Clone)]
pub struct Heap {
    objects: Vec<HeapObject>,
    shapes: Vec<Shape>,
    root_shapes: FxHashMap<ShapeFamily, ShapeId>,
    next_stable_id: u32,
    used_bytes: usize,
    max_heap_size: usize,
}

impl Heap {
    /// Create a new heap with a maximum size limit
    pub fn new(max_heap_size: usize) -> Self {
        Heap {
            objects: Vec::new(),
            shapes: Vec::new(),
            root_shapes: FxHashMap::default(),
            next_stable_id: FIRST_HEAP_ID,
            used_bytes: 0,
            max_heap_size,
        }
    }

    /// Allocate an object of the given kind with no properties
    pub fn allocate(&mut self, kind: ObjectKind) -> Result<ObjectId, HeapError> {
        self.charge(kind.base_size())?;

        let shape = self.root_shape(kind.family())?;
        let id = ObjectId(self.objects.len());
        let stable_id = self.next_id();
        self.objects.push(HeapObject {
            stable_id,
            shape,
            slots: Vec::new(),
            kind,
        });
        Ok(id)
    }

    pub fn object(&self, id: ObjectId) -> &HeapObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut HeapObject {
        &mut self.objects[id.0]
    }

    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }

    pub fn shape_of(&self, id: ObjectId) -> &Shape {
        self.shape(self.object(id).shape)
    }

    /// Read an own property
    pub fn get_property(&self, id: ObjectId, key: &str) -> Option<&Value> {
        let object = self.object(id);
        self.shape(object.shape)
            .slot_of(key)
            .map(|slot| &object.slots[slot])
    }

    pub fn has_property(&self, id: ObjectId, key: &str) -> bool {
        self.shape_of(id).slot_of(key).is_some()
    }

    /// Write an own property, transitioning the object's shape if the key is new
    pub fn set_property(&mut self, id: ObjectId, key: &str, value: Value) -> Result<(), HeapError> {
        let shape_id = self.object(id).shape;
        if let Some(slot) = self.shape(shape_id).slot_of(key) {
            self.objects[id.0].slots[slot] = value;
            return Ok(());
        }

        self.charge(POINTER_SIZE)?;
        let next = self.transition(shape_id, key)?;
        let object = &mut self.objects[id.0];
        object.shape = next;
        object.slots.push(value);
        Ok(())
    }

    /// Own property keys in insertion order
    pub fn own_keys(&self, id: ObjectId) -> &[Rc<str>] {
        &self.shape_of(id).keys
    }

    /// Store an array element, growing the array with `undefined` holes as needed
    pub fn set_element(&mut self, id: ObjectId, index: usize, value: Value) -> Result<(), HeapError> {
        let len = match &self.objects[id.0].kind {
            ObjectKind::Array(elements) => elements.len(),
            _ => return Ok(()),
        };
        if index >= len {
            let bytes = (index - len)
                .checked_add(1)
                .and_then(|slots| slots.checked_mul(POINTER_SIZE))
                .ok_or(HeapError::OutOfMemory {
                    requested: usize::MAX,
                    used: self.used_bytes,
                    limit: self.max_heap_size,
                })?;
            self.charge(bytes)?;
        }
        if let ObjectKind::Array(elements) = &mut self.objects[id.0].kind {
            if index >= elements.len() {
                elements.resize(index + 1, Value::Undefined);
            }
            elements[index] = value;
        }
        Ok(())
    }

    /// Add a variable to a scope object
    pub fn declare_binding(
        &mut self,
        scope: ObjectId,
        name: Rc<str>,
        value: Value,
        mutable: bool,
    ) -> Result<(), HeapError> {
        if let ObjectKind::Scope { bindings, .. } = &mut self.objects[scope.0].kind {
            if let Some(existing) = bindings.iter_mut().find(|b| b.name == name) {
                existing.value = value;
                existing.mutable = mutable;
                return Ok(());
            }
        }
        self.charge(POINTER_SIZE)?;
        if let ObjectKind::Scope { bindings, .. } = &mut self.objects[scope.0].kind {
            bindings.push(Binding {
                name,
                value,
                mutable,
            });
        }
        Ok(())
    }

    /// Number of objects ever allocated
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get total bytes charged against the heap limit
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Get max heap size
    pub fn max_size(&self) -> usize {
        self.max_heap_size
    }

    fn root_shape(&mut self, family: ShapeFamily) -> Result<ShapeId, HeapError> {
        if let Some(&shape) = self.root_shapes.get(&family) {
            return Ok(shape);
        }
        let shape = self.new_shape(family, Vec::new(), None)?;
        self.root_shapes.insert(family, shape);
        Ok(shape)
    }

    fn transition(&mut self, from: ShapeId, key: &str) -> Result<ShapeId, HeapError> {
        if let Some((_, to)) = self.shapes[from.0]
            .transitions
            .iter()
            .find(|(k, _)| &**k == key)
        {
            return Ok(*to);
        }

        let key: Rc<str> = Rc::from(key);
        let parent = &self.shapes[from.0];
        let family = parent.family;
        let mut keys = parent.keys.clone();
        keys.push(key.clone());

        let to = self.new_shape(family, keys, Some(from))?;
        self.shapes[from.0].transitions.push((key, to));
        Ok(to)
    }

    fn new_shape(
        &mut self,
        family: ShapeFamily,
        keys: Vec<Rc<str>>,
        back_pointer: Option<ShapeId>,
    ) -> Result<ShapeId, HeapError> {
        self.charge(SHAPE_SIZE)?;
        let id = ShapeId(self.shapes.len());
        let stable_id = self.next_id();
        self.shapes.push(Shape {
            stable_id,
            family,
            keys,
            back_pointer,
            transitions: Vec::new(),
        });
        Ok(id)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_stable_id;
        self.next_stable_id += HEAP_ID_STEP;
        id
    }

    fn charge(&mut self, bytes: usize) -> Result<(), HeapError> {
        if self
            .used_bytes
            .checked_add(bytes)
            .map_or(true, |total| total > self.max_heap_size)
        {
            return Err(HeapError::OutOfMemory {
                requested: bytes,
                used: self.used_bytes,
                limit: self.max_heap_size,
            });
        }
        self.used_bytes += bytes;
        Ok(())
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(DEFAULT_HEAP_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_with_same_keys_share_shape() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Ordinary).unwrap();
        let b = heap.allocate(ObjectKind::Ordinary).unwrap();

        heap.set_property(a, "x", Value::Number(1.0)).unwrap();
        heap.set_property(a, "y", Value::Number(2.0)).unwrap();
        heap.set_property(b, "x", Value::Number(3.0)).unwrap();
        heap.set_property(b, "y", Value::Number(4.0)).unwrap();

        assert_eq!(heap.object(a).shape, heap.object(b).shape);
        assert_eq!(heap.get_property(b, "y"), Some(&Value::Number(4.0)));
    }

    #[test]
    fn test_key_order_selects_shape() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Ordinary).unwrap();
        let b = heap.allocate(ObjectKind::Ordinary).unwrap();

        heap.set_property(a, "x", Value::Null).unwrap();
        heap.set_property(a, "y", Value::Null).unwrap();
        heap.set_property(b, "y", Value::Null).unwrap();
        heap.set_property(b, "x", Value::Null).unwrap();

        assert_ne!(heap.object(a).shape, heap.object(b).shape);
        let keys: Vec<&str> = heap.own_keys(b).iter().map(|k| &**k).collect();
        assert_eq!(keys, vec!["y", "x"]);
    }

    #[test]
    fn test_overwrite_keeps_shape() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Ordinary).unwrap();
        heap.set_property(a, "x", Value::Number(1.0)).unwrap();
        let shape = heap.object(a).shape;

        heap.set_property(a, "x", Value::Number(2.0)).unwrap();
        assert_eq!(heap.object(a).shape, shape);
        assert_eq!(heap.object(a).slots.len(), 1);
    }

    #[test]
    fn test_stable_ids_are_odd_and_unique() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Ordinary).unwrap();
        let b = heap.allocate(ObjectKind::Array(Vec::new())).unwrap();

        let ids = [
            heap.object(a).stable_id,
            heap.object(b).stable_id,
            heap.shape_of(a).stable_id,
            heap.shape_of(b).stable_id,
        ];
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id % 2, 1);
            assert!(!ids[i + 1..].contains(id));
        }
    }

    #[test]
    fn test_heap_limit() {
        let mut heap = Heap::new(200);
        let a = heap.allocate(ObjectKind::Array(Vec::new())).unwrap();

        let err = heap.set_element(a, 100, Value::Null).unwrap_err();
        assert!(matches!(err, HeapError::OutOfMemory { limit: 200, .. }));
    }

    #[test]
    fn test_huge_element_index_is_out_of_memory() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Array(Vec::new())).unwrap();

        for index in [usize::MAX, usize::MAX / 4 + 1] {
            let err = heap.set_element(a, index, Value::Null).unwrap_err();
            assert!(matches!(err, HeapError::OutOfMemory { .. }));
        }
    }

    #[test]
    fn test_array_grows_with_holes() {
        let mut heap = Heap::default();
        let a = heap.allocate(ObjectKind::Array(Vec::new())).unwrap();
        heap.set_element(a, 2, Value::Bool(true)).unwrap();

        match &heap.object(a).kind {
            ObjectKind::Array(elements) => {
                assert_eq!(elements, &vec![Value::Undefined, Value::Undefined, Value::Bool(true)]);
            }
            other => panic!("Expected array, got {:?}", other),
        }
    }
}
