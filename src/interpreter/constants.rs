// Constants for the script host

/// Stable id of the first heap object or shape; ids advance by [`HEAP_ID_STEP`].
/// Snapshot-local nodes (strings, numbers, oddballs, code) use even ids, so heap
/// ids are kept odd.
pub const FIRST_HEAP_ID: u32 = 101;
pub const HEAP_ID_STEP: u32 = 2;

/// Stable id of the synthetic snapshot root
pub const ROOT_NODE_ID: u32 = 1;

// Shallow sizes (bytes) reported for heap objects, modelled on a 64-bit engine
pub const POINTER_SIZE: usize = 8;
pub const OBJECT_HEADER_SIZE: usize = 24;
pub const ARRAY_HEADER_SIZE: usize = 32;
pub const CLOSURE_SIZE: usize = 64;
pub const NATIVE_FUNCTION_SIZE: usize = 56;
pub const SCOPE_HEADER_SIZE: usize = 16;
pub const SHAPE_SIZE: usize = 80;
pub const HEAP_NUMBER_SIZE: usize = 16;
pub const ODDBALL_SIZE: usize = 32;
pub const STRING_HEADER_SIZE: usize = 16;
pub const CODE_HEADER_SIZE: usize = 48;

/// Default limits, overridable through the command line or environment
pub const DEFAULT_MAX_CALL_DEPTH: usize = 400;
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 10_000;
pub const DEFAULT_HEAP_LIMIT: usize = 64 * 1024 * 1024;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 256;

/// Origin name for units typed at the interactive prompt
pub const SHELL_ORIGIN: &str = "(shell)";

/// Frames listed in a captured stack trace
pub const STACK_TRACE_LIMIT: usize = 10;
