//! GC object header
//!
//! Every heap slot stores a header next to the object body. The header holds
//! what the collector and method dispatch need without looking at the body.

use crate::vm::object::{Obj, ObjKind, ObjRef};

/// Per-object metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct GcHeader {
    /// Dark (reached) during the current mark phase
    dark: bool,

    /// Class of the object. Set for classes (their metaclass), instances and
    /// foreign objects; built-in kinds resolve their class from the VM.
    pub class: Option<ObjRef>,
}

impl GcHeader {
    /// Create a header for an object of `class`
    pub fn new(class: Option<ObjRef>) -> Self {
        Self { dark: false, class }
    }

    /// Check if this object has been reached
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.dark
    }

    /// Mark this object as reachable
    #[inline]
    pub fn mark(&mut self) {
        self.dark = true;
    }

    /// Clear the mark for the next cycle
    #[inline]
    pub fn unmark(&mut self) {
        self.dark = false;
    }
}

/// A header plus the object it describes
#[derive(Debug)]
pub struct HeapObject {
    /// GC metadata
    pub header: GcHeader,

    /// Object body
    pub obj: Obj,
}

impl HeapObject {
    /// Type tag of the body
    #[inline]
    pub fn kind(&self) -> ObjKind {
        self.obj.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_mark_unmark() {
        let mut header = GcHeader::new(None);
        assert!(!header.is_marked());

        header.mark();
        assert!(header.is_marked());

        header.unmark();
        assert!(!header.is_marked());
    }

    #[test]
    fn test_header_keeps_class() {
        let class = ObjRef::from_index(7);
        let header = GcHeader::new(Some(class));
        assert_eq!(header.class, Some(class));
    }
}
