//! Tri-color mark-sweep garbage collector
//!
//! Marking is iterative: roots are marked dark and pushed on a gray
//! worklist, then each gray object is popped and its children marked in
//! turn. Sweep walks the arena once, releasing every slot left unmarked.

use std::time::{Duration, Instant};

use super::heap::Heap;
use crate::vm::defaults::{DEFAULT_HEAP_GROWTH_PERCENT, DEFAULT_INITIAL_HEAP_SIZE, DEFAULT_MIN_HEAP_SIZE};
use crate::vm::object::{Method, Obj, ObjRef, UpvalueState};
use crate::vm::value::Value;

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total objects freed
    pub objects_freed: usize,

    /// Total pause time across all collections
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,

    /// Maximum pause time
    pub max_pause_time: Duration,

    /// Objects marked in last collection
    pub last_marked_count: usize,

    /// Objects freed in last collection
    pub last_freed_count: usize,

    /// Live objects after last collection
    pub live_objects: usize,

    /// Live bytes after last collection
    pub live_bytes: usize,
}

impl GcStats {
    fn update(&mut self, pause_time: Duration, marked: usize, freed: usize, live_objects: usize, live_bytes: usize) {
        self.collections += 1;
        self.objects_freed += freed;
        self.total_pause_time += pause_time;
        self.last_pause_time = pause_time;
        if pause_time > self.max_pause_time {
            self.max_pause_time = pause_time;
        }
        self.last_marked_count = marked;
        self.last_freed_count = freed;
        self.live_objects = live_objects;
        self.live_bytes = live_bytes;
    }
}

/// Collector state: the gray worklist, pacing threshold and statistics
#[derive(Debug)]
pub struct GarbageCollector {
    /// Marked objects whose children have not been visited
    gray: Vec<ObjRef>,

    /// Children of the object being blackened
    scratch: Vec<ObjRef>,

    /// Collect once the heap grows past this many bytes
    next_gc: usize,

    /// Floor for `next_gc`
    min_heap_size: usize,

    /// How far past the live size the heap may grow before the next cycle
    heap_growth_percent: usize,

    /// Objects marked in the current cycle
    marked: usize,

    /// Statistics
    stats: GcStats,
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_HEAP_SIZE, DEFAULT_MIN_HEAP_SIZE, DEFAULT_HEAP_GROWTH_PERCENT)
    }
}

impl GarbageCollector {
    /// Create a collector with the given pacing parameters
    pub fn new(initial_heap_size: usize, min_heap_size: usize, heap_growth_percent: usize) -> Self {
        Self {
            gray: Vec::new(),
            scratch: Vec::new(),
            next_gc: initial_heap_size,
            min_heap_size,
            heap_growth_percent,
            marked: 0,
            stats: GcStats::default(),
        }
    }

    /// Whether the heap has outgrown the current threshold
    #[inline]
    pub fn should_collect(&self, heap: &Heap) -> bool {
        cfg!(feature = "gc-stress") || heap.bytes_allocated() > self.next_gc
    }

    /// Threshold that triggers the next collection
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    /// Collection statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Start a cycle. Returns the start time for [`finish`](Self::finish).
    pub fn begin(&mut self) -> Instant {
        self.gray.clear();
        self.marked = 0;
        Instant::now()
    }

    /// Mark `value` if it is an object
    #[inline]
    pub fn mark_value(&mut self, heap: &mut Heap, value: Value) {
        if let Some(obj) = value.try_obj() {
            self.mark_object(heap, obj);
        }
    }

    /// Mark `obj` dark and queue it for blackening
    pub fn mark_object(&mut self, heap: &mut Heap, obj: ObjRef) {
        let header = heap.header_mut(obj);
        if header.is_marked() {
            return;
        }
        header.mark();
        self.marked += 1;
        self.gray.push(obj);
    }

    /// Drain the gray worklist
    pub fn trace(&mut self, heap: &mut Heap) {
        while let Some(obj) = self.gray.pop() {
            let mut children = std::mem::take(&mut self.scratch);
            children.clear();
            collect_children(heap, obj, &mut children);
            for &child in &children {
                self.mark_object(heap, child);
            }
            self.scratch = children;
        }
    }

    /// Free unmarked objects, running foreign finalizers first.
    /// Returns the number of objects freed.
    pub fn sweep(&mut self, heap: &mut Heap) -> usize {
        let mut dead = Vec::new();
        let mut live_bytes = 0;

        for index in 0..heap.slot_count() {
            let Some(entry) = heap.slot_mut(index) else {
                continue;
            };
            if entry.header.is_marked() {
                entry.header.unmark();
                live_bytes += entry.obj.size_in_bytes();
            } else {
                dead.push(ObjRef::from_index(index as u32));
            }
        }

        // Classes of dead foreign objects may be dying in the same cycle, so
        // run every finalizer before releasing anything.
        for &obj in &dead {
            let finalize = match heap.obj(obj) {
                Obj::Foreign(_) => heap
                    .header(obj)
                    .class
                    .and_then(|class| heap.class(class).foreign)
                    .and_then(|methods| methods.finalize),
                _ => None,
            };
            if let Some(finalize) = finalize {
                finalize(&mut heap.foreign_mut(obj).data);
            }
        }

        for &obj in &dead {
            heap.remove(obj);
        }

        heap.set_bytes_allocated(live_bytes);
        dead.len()
    }

    /// End a cycle: recompute the threshold and record statistics
    pub fn finish(&mut self, heap: &Heap, started: Instant, freed: usize) {
        let live_bytes = heap.bytes_allocated();
        self.next_gc = (live_bytes * (100 + self.heap_growth_percent) / 100).max(self.min_heap_size);
        self.stats
            .update(started.elapsed(), self.marked, freed, heap.len(), live_bytes);

        log::debug!(
            "gc: marked {} freed {} live {} ({} bytes), next at {} bytes",
            self.marked,
            freed,
            heap.len(),
            live_bytes,
            self.next_gc
        );
    }
}

#[inline]
fn push_value(out: &mut Vec<ObjRef>, value: Value) {
    if let Some(obj) = value.try_obj() {
        out.push(obj);
    }
}

/// Every object directly referenced by `obj`
fn collect_children(heap: &Heap, obj: ObjRef, out: &mut Vec<ObjRef>) {
    let entry = heap.entry(obj);
    out.extend(entry.header.class);

    match &entry.obj {
        Obj::Class(class) => {
            out.push(class.name);
            out.extend(class.superclass);
            for method in &class.methods {
                if let Method::Block(closure) = method {
                    out.push(*closure);
                }
            }
            push_value(out, class.attributes);
        }
        Obj::Closure(closure) => {
            out.push(closure.function);
            out.extend(closure.upvalues.iter().copied());
            out.extend(closure.owner);
        }
        Obj::Fiber(fiber) => {
            for &value in &fiber.stack {
                push_value(out, value);
            }
            out.extend(fiber.frames.iter().map(|frame| frame.closure));
            out.extend(fiber.open_upvalues);
            out.extend(fiber.caller);
            push_value(out, fiber.error);
        }
        Obj::Fn(function) => {
            for &constant in &function.constants {
                push_value(out, constant);
            }
            out.push(function.module);
        }
        Obj::Instance(instance) => {
            for &field in instance.fields.iter() {
                push_value(out, field);
            }
        }
        Obj::List(list) => {
            for &element in &list.elements {
                push_value(out, element);
            }
        }
        Obj::Map(map) => {
            for (key, value) in map.iter() {
                push_value(out, key);
                push_value(out, value);
            }
        }
        Obj::Module(module) => {
            out.extend(module.name);
            for &variable in &module.variables {
                push_value(out, variable);
            }
        }
        Obj::Upvalue(upvalue) => {
            match upvalue.state {
                UpvalueState::Open { fiber, .. } => out.push(fiber),
                UpvalueState::Closed(value) => push_value(out, value),
            }
            out.extend(upvalue.next);
        }
        Obj::Foreign(_) | Obj::Range(_) | Obj::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::{ObjList, ObjString};

    fn string(heap: &mut Heap, text: &str) -> ObjRef {
        heap.insert(None, Obj::String(ObjString::new(text.as_bytes())))
    }

    fn collect(gc: &mut GarbageCollector, heap: &mut Heap, roots: &[ObjRef]) -> usize {
        let started = gc.begin();
        for &root in roots {
            gc.mark_object(heap, root);
        }
        gc.trace(heap);
        let freed = gc.sweep(heap);
        gc.finish(heap, started, freed);
        freed
    }

    #[test]
    fn test_gc_frees_unreachable() {
        let mut heap = Heap::new();
        let mut gc = GarbageCollector::default();

        let kept = string(&mut heap, "kept");
        for i in 0..10 {
            string(&mut heap, &format!("garbage {}", i));
        }

        let freed = collect(&mut gc, &mut heap, &[kept]);
        assert_eq!(freed, 10);
        assert_eq!(heap.len(), 1);
        assert!(heap.contains(kept));
        assert_eq!(gc.stats().collections, 1);
    }

    #[test]
    fn test_gc_traces_through_containers() {
        let mut heap = Heap::new();
        let mut gc = GarbageCollector::default();

        let inner = string(&mut heap, "inner");
        let nested = heap.insert(
            None,
            Obj::List(ObjList {
                elements: vec![Value::from(inner), Value::num(1.0)],
            }),
        );
        let outer = heap.insert(
            None,
            Obj::List(ObjList {
                elements: vec![Value::from(nested)],
            }),
        );
        let _garbage = string(&mut heap, "garbage");

        collect(&mut gc, &mut heap, &[outer]);
        assert_eq!(heap.len(), 3);
        assert!(heap.contains(inner));
    }

    #[test]
    fn test_gc_handles_cycles() {
        let mut heap = Heap::new();
        let mut gc = GarbageCollector::default();

        let a = heap.insert(None, Obj::List(ObjList::default()));
        let b = heap.insert(None, Obj::List(ObjList::default()));
        heap.list_mut(a).elements.push(Value::from(b));
        heap.list_mut(b).elements.push(Value::from(a));

        collect(&mut gc, &mut heap, &[a]);
        assert_eq!(heap.len(), 2);

        collect(&mut gc, &mut heap, &[]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_gc_marks_are_cleared_after_cycle() {
        let mut heap = Heap::new();
        let mut gc = GarbageCollector::default();
        let a = string(&mut heap, "a");

        collect(&mut gc, &mut heap, &[a]);
        assert!(!heap.header(a).is_marked());
    }

    #[test]
    fn test_gc_threshold_respects_minimum() {
        let mut heap = Heap::new();
        let mut gc = GarbageCollector::new(0, 4096, 50);
        string(&mut heap, "x");

        assert!(gc.should_collect(&heap));
        collect(&mut gc, &mut heap, &[]);
        assert_eq!(gc.next_gc(), 4096);
    }
}
