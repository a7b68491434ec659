//! GC root tracking
//!
//! Besides the VM's own fields (core classes, current fiber, modules), two
//! explicit root sets keep objects alive:
//! - **Temporary roots**: a tiny LIFO stack that protects objects under
//!   construction while Rust code allocates more.
//! - **Handles**: strong references held by the host.

use crate::vm::defaults::MAX_TEMP_ROOTS;
use crate::vm::object::ObjRef;
use crate::vm::value::Value;

/// Bounded stack of temporary roots
#[derive(Debug, Default)]
pub struct TempRoots {
    stack: Vec<ObjRef>,
}

impl TempRoots {
    /// Create an empty stack
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(MAX_TEMP_ROOTS),
        }
    }

    /// Protect `obj` until the matching [`pop`](Self::pop)
    ///
    /// # Panics
    ///
    /// Panics when more than `MAX_TEMP_ROOTS` objects are pushed.
    pub fn push(&mut self, obj: ObjRef) {
        assert!(self.stack.len() < MAX_TEMP_ROOTS, "too many temporary roots");
        self.stack.push(obj);
    }

    /// Release the most recent root, which must be `expected`
    pub fn pop(&mut self, expected: ObjRef) {
        let top = self.stack.pop();
        assert_eq!(top, Some(expected), "temporary roots released out of order");
    }

    /// Iterate over all temporary roots
    pub fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.stack.iter().copied()
    }

    /// Number of live temporary roots
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// A host-held strong reference to a value
///
/// Handles must be released with [`Vm::release_handle`]; until then the
/// referenced object survives every collection.
///
/// [`Vm::release_handle`]: crate::vm::Vm::release_handle
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Table index of this handle
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Slab of handle values with free-slot reuse
#[derive(Debug, Default)]
pub struct HandleTable {
    values: Vec<Option<Value>>,
    free: Vec<u32>,
}

impl HandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return a handle to it
    pub fn insert(&mut self, value: Value) -> Handle {
        match self.free.pop() {
            Some(index) => {
                self.values[index as usize] = Some(value);
                Handle(index)
            }
            None => {
                self.values.push(Some(value));
                Handle(self.values.len() as u32 - 1)
            }
        }
    }

    /// Value behind `handle`
    pub fn get(&self, handle: &Handle) -> Option<Value> {
        self.values.get(handle.0 as usize).copied().flatten()
    }

    /// Drop `handle`, returning the value it held
    pub fn remove(&mut self, handle: Handle) -> Option<Value> {
        let value = self.values.get_mut(handle.0 as usize)?.take()?;
        self.free.push(handle.0);
        Some(value)
    }

    /// Values of all live handles
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.values.iter().filter_map(|v| *v)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.values.len() - self.free.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
