//! Host configuration
//!
//! Every hook is optional. Without a `write` hook `System.print` output is
//! discarded; without an `error` hook errors are only returned as
//! [`VmError`](crate::vm::VmError)s.

use std::fmt;

use crate::vm::defaults::{
    DEFAULT_HEAP_GROWTH_PERCENT, DEFAULT_INITIAL_HEAP_SIZE, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MIN_HEAP_SIZE,
};
use crate::vm::object::{ForeignClassMethods, ForeignMethodFn};
use crate::vm::ErrorKind;

/// Receives text written by `System.print` and friends
pub type WriteFn = Box<dyn FnMut(&str)>;

/// Receives errors: `(kind, module, line, message)`.
///
/// Compile errors arrive once per error. A runtime error arrives as one
/// `Runtime` call with the message, then one `StackTrace` call per frame,
/// innermost first, whose message is the function name.
pub type ErrorFn = Box<dyn FnMut(ErrorKind, Option<&str>, i32, &str)>;

/// Maps `(importer, name)` to a canonical module name, or `None` to fail the import
pub type ResolveModuleFn = Box<dyn FnMut(&str, &str) -> Option<String>>;

/// Returns the source of a module by canonical name
pub type LoadModuleFn = Box<dyn FnMut(&str) -> Option<String>>;

/// Finds the host function for `(module, class, is_static, signature)`
pub type BindForeignMethodFn = Box<dyn FnMut(&str, &str, bool, &str) -> Option<ForeignMethodFn>>;

/// Finds the allocation hooks for `(module, class)`
pub type BindForeignClassFn = Box<dyn FnMut(&str, &str) -> Option<ForeignClassMethods>>;

/// VM configuration
pub struct VmOptions {
    /// Output hook for `System.print`, `System.write` and friends
    pub write: Option<WriteFn>,

    /// Error reporting hook
    pub error: Option<ErrorFn>,

    /// Import name resolution hook
    pub resolve_module: Option<ResolveModuleFn>,

    /// Module source loading hook
    pub load_module: Option<LoadModuleFn>,

    /// Foreign method binding hook
    pub bind_foreign_method: Option<BindForeignMethodFn>,

    /// Foreign class binding hook
    pub bind_foreign_class: Option<BindForeignClassFn>,

    /// Bytes allocated before the first collection
    pub initial_heap_size: usize,

    /// Lower bound for the collection threshold
    pub min_heap_size: usize,

    /// How far past its live size the heap may grow before the next collection
    pub heap_growth_percent: usize,

    /// Nested call frames one fiber may hold
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            write: None,
            error: None,
            resolve_module: None,
            load_module: None,
            bind_foreign_method: None,
            bind_foreign_class: None,
            initial_heap_size: DEFAULT_INITIAL_HEAP_SIZE,
            min_heap_size: DEFAULT_MIN_HEAP_SIZE,
            heap_growth_percent: DEFAULT_HEAP_GROWTH_PERCENT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl fmt::Debug for VmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmOptions")
            .field("write", &self.write.is_some())
            .field("error", &self.error.is_some())
            .field("resolve_module", &self.resolve_module.is_some())
            .field("load_module", &self.load_module.is_some())
            .field("bind_foreign_method", &self.bind_foreign_method.is_some())
            .field("bind_foreign_class", &self.bind_foreign_class.is_some())
            .field("initial_heap_size", &self.initial_heap_size)
            .field("min_heap_size", &self.min_heap_size)
            .field("heap_growth_percent", &self.heap_growth_percent)
            .field("max_call_depth", &self.max_call_depth)
            .finish()
    }
}
