//! Fibers: value stack, call frames and open upvalues
//!
//! A fiber owns a growable value stack and a stack of call frames. Frames
//! and open upvalues address the stack by index rather than by pointer, so
//! the stack can be reallocated on growth without rebasing anything.

use crate::vm::defaults::INITIAL_CALL_FRAMES;
use crate::vm::object::{Obj, ObjRef, ObjUpvalue, UpvalueState};
use crate::vm::value::Value;
use crate::vm::Vm;

/// One active function invocation
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    /// Offset of the next instruction in the closure's bytecode
    pub ip: usize,

    /// Closure being executed
    pub closure: ObjRef,

    /// Stack index of slot 0 (the receiver) for this frame
    pub stack_start: usize,
}

/// How a fiber was entered, which decides where its errors go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    /// Run with `try()`: errors stop here and return to the caller
    Try,
    /// Entered directly by the host
    Root,
    /// Anything else
    Other,
}

/// Observable lifecycle of a fiber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberStatus {
    /// Created but never run
    New,
    /// Has frames left and no error
    Suspended,
    /// Ran to completion
    Done,
    /// Aborted with an error
    Failed,
}

/// A coroutine
#[derive(Debug, Clone)]
pub struct ObjFiber {
    /// Value stack. `len()` is the stack top.
    pub stack: Vec<Value>,

    /// Call frames, innermost last
    pub frames: Vec<CallFrame>,

    /// Open upvalues, sorted by descending stack slot
    pub open_upvalues: Option<ObjRef>,

    /// Fiber that resumed this one and gets control back on yield/return
    pub caller: Option<ObjRef>,

    /// Error value if the fiber aborted, otherwise null
    pub error: Value,

    /// How the fiber was entered
    pub state: FiberState,
}

impl ObjFiber {
    /// Create a fiber that will run `closure`, reserving `max_slots` slots.
    ///
    /// Slot 0 holds the closure itself, matching the receiver slot every
    /// function expects.
    pub fn new(closure: Option<ObjRef>, max_slots: usize) -> Self {
        let capacity = (max_slots + 1).next_power_of_two();
        let mut fiber = Self {
            stack: Vec::with_capacity(capacity),
            frames: Vec::with_capacity(INITIAL_CALL_FRAMES),
            open_upvalues: None,
            caller: None,
            error: Value::NULL,
            state: FiberState::Other,
        };
        if let Some(closure) = closure {
            fiber.frames.push(CallFrame {
                ip: 0,
                closure,
                stack_start: 0,
            });
            fiber.stack.push(Value::from(closure));
        }
        fiber
    }

    /// Whether the fiber aborted
    #[inline]
    pub fn has_error(&self) -> bool {
        !self.error.is_null()
    }

    /// Whether the fiber can no longer be resumed
    #[inline]
    pub fn is_done(&self) -> bool {
        self.frames.is_empty() || self.has_error()
    }

    /// Whether the fiber has not executed any instruction yet
    pub fn is_new(&self) -> bool {
        self.frames.len() == 1 && self.frames[0].ip == 0
    }

    /// Current lifecycle state
    pub fn status(&self) -> FiberStatus {
        if self.has_error() {
            FiberStatus::Failed
        } else if self.frames.is_empty() {
            FiberStatus::Done
        } else if self.is_new() {
            FiberStatus::New
        } else {
            FiberStatus::Suspended
        }
    }

    /// Push a value
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop a value
    #[inline]
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::NULL)
    }

    /// Value `distance` slots below the top (0 = top)
    #[inline]
    pub fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    /// Replace the top value
    #[inline]
    pub fn set_top(&mut self, value: Value) {
        if let Some(top) = self.stack.last_mut() {
            *top = value;
        }
    }

    /// Make room for `needed` more slots above the current top.
    /// Returns the number of bytes the stack grew by.
    pub fn ensure_stack(&mut self, needed: usize) -> usize {
        let required = self.stack.len() + needed;
        let capacity = self.stack.capacity();
        if required <= capacity {
            return 0;
        }

        let new_capacity = required.next_power_of_two();
        self.stack.reserve_exact(new_capacity - self.stack.len());
        log::trace!("fiber stack grew from {} to {} slots", capacity, self.stack.capacity());
        (self.stack.capacity() - capacity) * std::mem::size_of::<Value>()
    }
}

impl Vm {
    /// Allocate a fiber ready to run `closure` (or an empty one)
    pub(crate) fn new_fiber(&mut self, closure: Option<ObjRef>) -> ObjRef {
        let max_slots = closure.map_or(0, |c| self.heap.func(self.heap.closure(c).function).max_slots);
        let fiber = ObjFiber::new(closure, max_slots);
        self.allocate(None, Obj::Fiber(fiber))
    }

    /// Find or create the upvalue for stack `slot` of `fiber`
    pub(crate) fn capture_upvalue(&mut self, fiber: ObjRef, slot: usize) -> ObjRef {
        let mut prev: Option<ObjRef> = None;
        let mut current = self.heap.fiber(fiber).open_upvalues;

        // The list is sorted with the highest slot first.
        while let Some(upvalue) = current {
            let open = self.heap.upvalue(upvalue);
            match open.open_slot() {
                Some(s) if s > slot => {
                    prev = current;
                    current = open.next;
                }
                Some(s) if s == slot => return upvalue,
                _ => break,
            }
        }

        let created = self.allocate(
            None,
            Obj::Upvalue(ObjUpvalue {
                state: UpvalueState::Open { fiber, slot },
                next: current,
            }),
        );
        match prev {
            Some(prev) => self.heap.upvalue_mut(prev).next = Some(created),
            None => self.heap.fiber_mut(fiber).open_upvalues = Some(created),
        }
        created
    }

    /// Close every open upvalue of `fiber` at or above stack slot `last`
    pub(crate) fn close_upvalues(&mut self, fiber: ObjRef, last: usize) {
        while let Some(upvalue) = self.heap.fiber(fiber).open_upvalues {
            let open = *self.heap.upvalue(upvalue);
            let Some(slot) = open.open_slot() else {
                break;
            };
            if slot < last {
                break;
            }

            let value = self.heap.fiber(fiber).stack[slot];
            let closed = self.heap.upvalue_mut(upvalue);
            closed.state = UpvalueState::Closed(value);
            closed.next = None;
            self.heap.fiber_mut(fiber).open_upvalues = open.next;
        }
    }

    /// Current value of a captured variable
    #[inline]
    pub(crate) fn upvalue_get(&self, upvalue: ObjRef) -> Value {
        match self.heap.upvalue(upvalue).state {
            UpvalueState::Open { fiber, slot } => self.heap.fiber(fiber).stack[slot],
            UpvalueState::Closed(value) => value,
        }
    }

    /// Assign a captured variable
    #[inline]
    pub(crate) fn upvalue_set(&mut self, upvalue: ObjRef, value: Value) {
        match self.heap.upvalue(upvalue).state {
            UpvalueState::Open { fiber, slot } => self.heap.fiber_mut(fiber).stack[slot] = value,
            UpvalueState::Closed(_) => self.heap.upvalue_mut(upvalue).state = UpvalueState::Closed(value),
        }
    }

    /// Reserve stack space for a call to `closure` and push its frame
    pub(crate) fn push_call_frame(&mut self, fiber: ObjRef, closure: ObjRef, stack_start: usize) {
        let max_slots = self.heap.func(self.heap.closure(closure).function).max_slots;
        let f = self.heap.fiber_mut(fiber);
        let grown = f.ensure_stack(max_slots);
        f.frames.push(CallFrame {
            ip: 0,
            closure,
            stack_start,
        });
        if grown > 0 {
            self.heap.track_bytes(grown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fiber_holds_closure_in_slot_zero() {
        let closure = ObjRef::from_index(3);
        let fiber = ObjFiber::new(Some(closure), 5);

        assert_eq!(fiber.stack, vec![Value::from(closure)]);
        assert_eq!(fiber.frames.len(), 1);
        assert!(fiber.stack.capacity() >= 6);
        assert_eq!(fiber.status(), FiberStatus::New);
    }

    #[test]
    fn test_empty_fiber_is_done() {
        let fiber = ObjFiber::new(None, 0);
        assert!(fiber.is_done());
        assert_eq!(fiber.status(), FiberStatus::Done);
    }

    #[test]
    fn test_error_marks_failed() {
        let mut fiber = ObjFiber::new(Some(ObjRef::from_index(0)), 1);
        fiber.error = Value::num(1.0);
        assert!(fiber.is_done());
        assert_eq!(fiber.status(), FiberStatus::Failed);
    }

    #[test]
    fn test_ensure_stack_grows_to_power_of_two() {
        let mut fiber = ObjFiber::new(None, 0);
        for i in 0..3 {
            fiber.push(Value::num(i as f64));
        }

        let grown = fiber.ensure_stack(100);
        assert!(grown > 0);
        assert!(fiber.stack.capacity() >= 103);
        assert_eq!(fiber.ensure_stack(10), 0);

        // Growth keeps existing slots.
        assert_eq!(fiber.peek(0), Value::num(2.0));
        assert_eq!(fiber.pop(), Value::num(2.0));
    }
}
