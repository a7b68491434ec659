//! Bytecode interpreter
//!
//! - [`execution`]: the dispatch loop
//! - [`call`]: method dispatch, closures, foreign calls and stack overflow checks
//! - [`core`]: class creation, method binding, imports and error unwinding

mod call;
mod core;
mod execution;

use std::rc::Rc;

use crate::vm::object::ObjRef;
use crate::vm::value::Value;
use crate::vm::Vm;

/// What a primitive method did
#[derive(Debug, Clone, Copy)]
pub enum PrimitiveResult {
    /// Returned a value, which replaces the receiver and arguments
    Value(Value),
    /// Aborted the current fiber with an error value
    Error(Value),
    /// Switched to another fiber (or suspended the VM). The primitive has
    /// already arranged both stacks.
    Switch,
}

/// Cached state of the innermost call frame of the running fiber
pub(crate) struct Frame {
    pub ip: usize,
    pub closure: ObjRef,
    pub function: ObjRef,
    pub code: Rc<[u8]>,
    pub stack_start: usize,
    /// Index of the first field declared by the closure's class
    pub field_base: usize,
}

impl Frame {
    #[inline]
    fn read_byte(&mut self) -> u8 {
        let byte = self.code[self.ip];
        self.ip += 1;
        byte
    }

    #[inline]
    fn read_short(&mut self) -> usize {
        let value = u16::from_be_bytes([self.code[self.ip], self.code[self.ip + 1]]);
        self.ip += 2;
        value as usize
    }
}

impl Vm {
    /// Load the innermost frame of `fiber`, which must have one
    pub(crate) fn load_frame(&self, fiber: ObjRef) -> Frame {
        let Some(call) = self.heap.fiber(fiber).frames.last().copied() else {
            panic!("fiber {:?} has no frame to run", fiber);
        };
        let closure = self.heap.closure(call.closure);
        let field_base = closure
            .owner
            .and_then(|owner| self.heap.class(owner).superclass)
            .map_or(0, |superclass| self.heap.class(superclass).num_fields);

        Frame {
            ip: call.ip,
            closure: call.closure,
            function: closure.function,
            code: Rc::clone(&self.heap.func(closure.function).code),
            stack_start: call.stack_start,
            field_base,
        }
    }

    /// Write the cached instruction pointer back into the fiber
    #[inline]
    pub(crate) fn store_frame(&mut self, fiber: ObjRef, frame: &Frame) {
        if let Some(call) = self.heap.fiber_mut(fiber).frames.last_mut() {
            call.ip = frame.ip;
        }
    }

    /// Allocate `message` as a string to use as an error value
    pub(crate) fn error_value(&mut self, message: &str) -> Value {
        self.string_value(message)
    }

    /// Primitive result for a runtime error with `message`
    pub(crate) fn primitive_error(&mut self, message: &str) -> PrimitiveResult {
        PrimitiveResult::Error(self.error_value(message))
    }
}
