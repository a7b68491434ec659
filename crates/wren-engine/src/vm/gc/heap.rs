//! Object arena
//!
//! All GC-managed objects live in one `Vec` of slots addressed by
//! [`ObjRef`]. Freed slots go on a free list and are reused by later
//! allocations. The heap tracks an estimate of the bytes it owns so the
//! collector can decide when to run.

use super::header::{GcHeader, HeapObject};
use crate::vm::fiber::ObjFiber;
use crate::vm::map::ObjMap;
use crate::vm::object::{
    Obj, ObjClass, ObjClosure, ObjFn, ObjForeign, ObjInstance, ObjKind, ObjList, ObjModule, ObjRange, ObjRef,
    ObjString, ObjUpvalue,
};
use crate::vm::value::Value;

/// Arena of heap objects
#[derive(Debug, Default)]
pub struct Heap {
    /// Object slots; `None` marks a free slot
    slots: Vec<Option<HeapObject>>,

    /// Indices of free slots
    free: Vec<u32>,

    /// Number of live objects
    live: usize,

    /// Estimated bytes owned by live objects plus growth since the last sweep
    bytes_allocated: usize,
}

#[cold]
#[inline(never)]
fn wrong_kind(expected: &str, found: &Obj) -> ! {
    panic!("expected {} object, found {:?}", expected, found.kind())
}

macro_rules! typed_accessors {
    ($($variant:ident => $get:ident, $get_mut:ident, $try_get:ident: $ty:ty;)*) => {
        $(
            #[doc = concat!("Borrow the `", stringify!($variant), "` object at `obj`.")]
            ///
            /// # Panics
            ///
            /// Panics if the object is of another kind.
            #[inline]
            pub fn $get(&self, obj: ObjRef) -> &$ty {
                match self.obj(obj) {
                    Obj::$variant(inner) => inner,
                    other => wrong_kind(stringify!($variant), other),
                }
            }

            #[doc = concat!("Mutably borrow the `", stringify!($variant), "` object at `obj`.")]
            #[inline]
            pub fn $get_mut(&mut self, obj: ObjRef) -> &mut $ty {
                match self.obj_mut(obj) {
                    Obj::$variant(inner) => inner,
                    other => wrong_kind(stringify!($variant), other),
                }
            }

            #[doc = concat!("Borrow `value` as a `", stringify!($variant), "` if it is one.")]
            #[inline]
            pub fn $try_get(&self, value: Value) -> Option<&$ty> {
                match self.obj(value.try_obj()?) {
                    Obj::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `obj` into the arena
    pub fn insert(&mut self, class: Option<ObjRef>, obj: Obj) -> ObjRef {
        self.bytes_allocated += obj.size_in_bytes();
        self.live += 1;

        let entry = HeapObject {
            header: GcHeader::new(class),
            obj,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(entry);
                ObjRef::from_index(index)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Some(entry));
                ObjRef::from_index(index)
            }
        }
    }

    /// Release the slot at `obj`, returning the object that lived there
    pub fn remove(&mut self, obj: ObjRef) -> Option<HeapObject> {
        let entry = self.slots.get_mut(obj.index() as usize)?.take()?;
        self.live -= 1;
        self.free.push(obj.index());
        Some(entry)
    }

    /// Whether `obj` names a live slot
    #[inline]
    pub fn contains(&self, obj: ObjRef) -> bool {
        matches!(self.slots.get(obj.index() as usize), Some(Some(_)))
    }

    /// Slot entry for `obj`
    ///
    /// # Panics
    ///
    /// Panics if the slot is free: a dangling reference is a GC rooting bug.
    #[inline]
    pub fn entry(&self, obj: ObjRef) -> &HeapObject {
        match self.slots.get(obj.index() as usize) {
            Some(Some(entry)) => entry,
            _ => panic!("dangling object reference {:?}", obj),
        }
    }

    /// Mutable slot entry for `obj`
    #[inline]
    pub fn entry_mut(&mut self, obj: ObjRef) -> &mut HeapObject {
        match self.slots.get_mut(obj.index() as usize) {
            Some(Some(entry)) => entry,
            _ => panic!("dangling object reference {:?}", obj),
        }
    }

    /// Object body at `obj`
    #[inline]
    pub fn obj(&self, obj: ObjRef) -> &Obj {
        &self.entry(obj).obj
    }

    /// Mutable object body at `obj`
    #[inline]
    pub fn obj_mut(&mut self, obj: ObjRef) -> &mut Obj {
        &mut self.entry_mut(obj).obj
    }

    /// Header at `obj`
    #[inline]
    pub fn header(&self, obj: ObjRef) -> &GcHeader {
        &self.entry(obj).header
    }

    /// Mutable header at `obj`
    #[inline]
    pub fn header_mut(&mut self, obj: ObjRef) -> &mut GcHeader {
        &mut self.entry_mut(obj).header
    }

    /// Kind of the object `value` refers to, if it is an object
    #[inline]
    pub fn kind_of(&self, value: Value) -> Option<ObjKind> {
        value.try_obj().map(|obj| self.entry(obj).kind())
    }

    /// Whether `value` is an object of `kind`
    #[inline]
    pub fn is_kind(&self, value: Value, kind: ObjKind) -> bool {
        self.kind_of(value) == Some(kind)
    }

    typed_accessors! {
        Class => class, class_mut, try_class: ObjClass;
        Closure => closure, closure_mut, try_closure: ObjClosure;
        Fiber => fiber, fiber_mut, try_fiber: ObjFiber;
        Fn => func, func_mut, try_func: ObjFn;
        Foreign => foreign, foreign_mut, try_foreign: ObjForeign;
        Instance => instance, instance_mut, try_instance: ObjInstance;
        List => list, list_mut, try_list: ObjList;
        Map => map, map_mut, try_map: ObjMap;
        Module => module, module_mut, try_module: ObjModule;
        Range => range, range_mut, try_range: ObjRange;
        String => string, string_mut, try_string: ObjString;
        Upvalue => upvalue, upvalue_mut, try_upvalue: ObjUpvalue;
    }

    /// Text of a string object, with invalid UTF-8 replaced
    pub fn str_lossy(&self, obj: ObjRef) -> String {
        self.string(obj).to_str_lossy().into_owned()
    }

    /// Name of a class as text
    pub fn class_name(&self, class: ObjRef) -> String {
        self.str_lossy(self.class(class).name)
    }

    /// Number of live objects
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no objects are live
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, live or free
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Estimated bytes in use
    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Record growth of an existing object (stack, table, list storage)
    #[inline]
    pub(crate) fn track_bytes(&mut self, bytes: usize) {
        self.bytes_allocated += bytes;
    }

    /// Replace the estimate with an exact recount
    #[inline]
    pub(crate) fn set_bytes_allocated(&mut self, bytes: usize) {
        self.bytes_allocated = bytes;
    }

    /// Live slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, &HeapObject)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|entry| (ObjRef::from_index(i as u32), entry)))
    }

    /// Raw slot at `index`, used by the sweeper
    #[inline]
    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut HeapObject> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }
}
