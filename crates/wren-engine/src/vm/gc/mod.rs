//! Garbage collection
//!
//! - [`heap`]: the object arena and typed accessors
//! - [`header`]: per-object GC metadata
//! - [`roots`]: temporary roots and host handles
//! - [`collector`]: mark/sweep with a gray worklist

pub mod collector;
pub mod header;
pub mod heap;
pub mod roots;

pub use collector::{GarbageCollector, GcStats};
pub use header::{GcHeader, HeapObject};
pub use heap::Heap;
pub use roots::{Handle, HandleTable, TempRoots};
