//! Method dispatch and calls
//!
//! Every `CALL`/`SUPER` lands in [`Vm::invoke`], which looks the symbol up
//! in the class's method table and runs whatever is bound there.

use super::PrimitiveResult;
use crate::vm::api::ApiStack;
use crate::vm::object::{ForeignMethodFn, Method, ObjRef};
use crate::vm::value::Value;
use crate::vm::Vm;

/// Outcome of a method invocation, as seen by the dispatch loop
pub(crate) enum Dispatch {
    /// The result is on the stack; carry on in the same frame
    Done,
    /// A new frame was pushed on the running fiber
    Entered,
    /// The running fiber changed
    Switched,
    /// The call failed with this error value
    Error(Value),
}

impl Vm {
    /// Invoke method `symbol` of `class` on the `argc` arguments plus
    /// receiver on top of `fiber`'s stack.
    ///
    /// The caller's instruction pointer must already be stored.
    pub(crate) fn invoke(&mut self, fiber: ObjRef, class: ObjRef, symbol: usize, argc: usize) -> Dispatch {
        let args_start = self.heap.fiber(fiber).stack.len() - argc - 1;

        match self.heap.class(class).method(symbol) {
            Method::None => {
                let message = self.method_not_found(class, symbol);
                Dispatch::Error(self.error_value(&message))
            }
            Method::Primitive(primitive) => {
                let args: Vec<Value> = self.heap.fiber(fiber).stack[args_start..].to_vec();
                match primitive(self, &args) {
                    PrimitiveResult::Value(value) => {
                        self.finish_call(fiber, args_start, value);
                        Dispatch::Done
                    }
                    PrimitiveResult::Error(error) => Dispatch::Error(error),
                    PrimitiveResult::Switch => Dispatch::Switched,
                }
            }
            Method::FunctionCall => self.call_function_value(fiber, args_start, argc),
            Method::Foreign(method) => {
                self.call_foreign(fiber, method, args_start);
                if self.heap.fiber(fiber).has_error() {
                    let error = self.heap.fiber(fiber).error;
                    return Dispatch::Error(error);
                }
                Dispatch::Done
            }
            Method::Block(closure) => match self.call_closure(fiber, closure, args_start) {
                Ok(()) => Dispatch::Entered,
                Err(error) => Dispatch::Error(error),
            },
        }
    }

    /// `"<Class> does not implement '<signature>'."`
    pub(crate) fn method_not_found(&self, class: ObjRef, symbol: usize) -> String {
        format!(
            "{} does not implement '{}'.",
            self.heap.class_name(class),
            self.method_names.get(symbol).unwrap_or("<unknown>")
        )
    }

    /// Replace the receiver and arguments starting at `args_start` with `value`
    #[inline]
    pub(crate) fn finish_call(&mut self, fiber: ObjRef, args_start: usize, value: Value) {
        let stack = &mut self.heap.fiber_mut(fiber).stack;
        stack.truncate(args_start + 1);
        stack[args_start] = value;
    }

    /// Push a frame running `closure` with its receiver at `args_start`
    pub(crate) fn call_closure(&mut self, fiber: ObjRef, closure: ObjRef, args_start: usize) -> Result<(), Value> {
        if self.heap.fiber(fiber).frames.len() >= self.options.max_call_depth {
            return Err(self.error_value("Stack overflow."));
        }
        self.push_call_frame(fiber, closure, args_start);
        Ok(())
    }

    /// `Fn.call(...)`: the receiver is the closure to run
    fn call_function_value(&mut self, fiber: ObjRef, args_start: usize, argc: usize) -> Dispatch {
        let closure = self.heap.fiber(fiber).stack[args_start].as_obj();
        let arity = self.heap.func(self.heap.closure(closure).function).arity;

        if argc < arity {
            return Dispatch::Error(self.error_value("Function expects more arguments."));
        }

        // Extra arguments are dropped.
        self.heap.fiber_mut(fiber).stack.truncate(args_start + arity + 1);

        match self.call_closure(fiber, closure, args_start) {
            Ok(()) => Dispatch::Entered,
            Err(error) => Dispatch::Error(error),
        }
    }

    /// Run a host method with the slot window over the receiver and arguments
    pub(crate) fn call_foreign(&mut self, fiber: ObjRef, method: ForeignMethodFn, args_start: usize) {
        let saved = self.api_stack.replace(ApiStack {
            fiber,
            start: args_start,
        });
        method(self);
        self.api_stack = saved;

        // Slot 0 holds the result.
        let stack = &mut self.heap.fiber_mut(fiber).stack;
        stack.truncate(args_start + 1);
    }

    /// Run a foreign class's allocator for the class in the frame's slot 0
    pub(crate) fn foreign_construct(&mut self, fiber: ObjRef, stack_start: usize) -> Result<(), Value> {
        let class = self.heap.fiber(fiber).stack[stack_start].as_obj();
        let Some(methods) = self.heap.class(class).foreign else {
            let message = format!("Foreign class '{}' has no allocator.", self.heap.class_name(class));
            return Err(self.error_value(&message));
        };

        let saved = self.api_stack.replace(ApiStack {
            fiber,
            start: stack_start,
        });
        (methods.allocate)(self);
        self.api_stack = saved;

        let fiber_ref = self.heap.fiber(fiber);
        if fiber_ref.has_error() {
            return Err(fiber_ref.error);
        }
        Ok(())
    }
}
