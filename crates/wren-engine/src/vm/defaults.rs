//! Default constants for VM configuration and compiler limits.

/// Default heap size that triggers the first collection (10 MiB).
pub const DEFAULT_INITIAL_HEAP_SIZE: usize = 10 * 1024 * 1024;

/// Default floor for the collection threshold (1 MiB).
pub const DEFAULT_MIN_HEAP_SIZE: usize = 1024 * 1024;

/// Default percentage the heap may grow past its live size before the next
/// collection.
pub const DEFAULT_HEAP_GROWTH_PERCENT: usize = 50;

/// Default number of nested call frames a fiber may hold before a call fails
/// with "Stack overflow.".
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64 * 1024;

/// Capacity of the temporary root stack.
pub const MAX_TEMP_ROOTS: usize = 8;

/// Initial call frame capacity of a new fiber.
pub const INITIAL_CALL_FRAMES: usize = 4;

/// Maximum number of parameters (and arguments) of a method.
pub const MAX_PARAMETERS: usize = 16;

/// Maximum length of a method name.
pub const MAX_METHOD_NAME: usize = 64;

/// Maximum length of a variable name, also used to truncate error labels.
pub const MAX_VARIABLE_NAME: usize = 64;

/// Maximum number of fields of a class, inherited ones included.
pub const MAX_FIELDS: usize = 255;

/// Maximum number of locals in scope in one function.
pub const MAX_LOCALS: usize = 256;

/// Maximum number of upvalues one function may capture.
pub const MAX_UPVALUES: usize = 256;

/// Maximum number of unique constants in one function.
pub const MAX_CONSTANTS: usize = 1 << 16;

/// Maximum number of top-level variables in one module.
pub const MAX_MODULE_VARS: usize = 1 << 16;

/// Maximum forward or backward jump distance.
pub const MAX_JUMP: usize = 1 << 16;

/// Maximum nesting of string interpolation.
pub const MAX_INTERPOLATION_NESTING: usize = 8;
