//! Memory model for the script engine
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation (primitives and object references)
//! - [`heap`]: Object arena with hidden classes (shapes) and a byte budget
//! - [`stack`]: Call stack frames used for stack traces and snapshot roots
//!
//! # Object Layout
//!
//! Every heap object points at a [`heap::Shape`] describing its property keys in
//! insertion order; the object itself only stores the values. Objects built the
//! same way share one shape:
//!
//! ```text
//! {}  --x-->  {x}  --y-->  {x, y}
//!               \
//!                --z-->  {x, z}
//! ```

pub mod heap;
pub mod stack;
pub mod value;
