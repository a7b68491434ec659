//! `Fiber`
//!
//! Switching primitives leave both stacks ready for the fiber that runs
//! next: the slot holding the receiver on the suspended side receives
//! whatever value is passed back when it resumes.

use super::{ok, primitive, static_primitive, validate_fn};
use crate::vm::fiber::FiberState;
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::ObjRef;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let fiber = vm.core.fiber;

    static_primitive(vm, fiber, "new(_)", fiber_new);
    static_primitive(vm, fiber, "abort(_)", fiber_abort);
    static_primitive(vm, fiber, "current", |vm, _| ok(running(vm)));
    static_primitive(vm, fiber, "suspend()", fiber_suspend);
    static_primitive(vm, fiber, "yield()", fiber_yield);
    static_primitive(vm, fiber, "yield(_)", fiber_yield_value);

    primitive(vm, fiber, "call()", |vm, args| {
        run_fiber(vm, args, Entry::Call, false)
    });
    primitive(vm, fiber, "call(_)", |vm, args| {
        run_fiber(vm, args, Entry::Call, true)
    });
    primitive(vm, fiber, "error", |vm, args| ok(vm.heap.fiber(args[0].as_obj()).error));
    primitive(vm, fiber, "isDone", |vm, args| ok(vm.heap.fiber(args[0].as_obj()).is_done()));
    primitive(vm, fiber, "transfer()", |vm, args| {
        run_fiber(vm, args, Entry::Transfer, false)
    });
    primitive(vm, fiber, "transfer(_)", |vm, args| {
        run_fiber(vm, args, Entry::Transfer, true)
    });
    primitive(vm, fiber, "transferError(_)", fiber_transfer_error);
    primitive(vm, fiber, "try()", |vm, args| fiber_try(vm, args, false));
    primitive(vm, fiber, "try(_)", |vm, args| fiber_try(vm, args, true));
}

/// How a fiber is being entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// `call`/`try`: the target returns to the current fiber
    Call,
    /// `transfer`: control moves without a way back
    Transfer,
}

impl Entry {
    fn verb(self) -> &'static str {
        match self {
            Entry::Call => "call",
            Entry::Transfer => "transfer to",
        }
    }
}

/// Fiber executing the primitive
fn running(vm: &Vm) -> ObjRef {
    match vm.fiber {
        Some(fiber) => fiber,
        None => panic!("fiber primitive called with no running fiber"),
    }
}

fn fiber_new(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let closure = check!(validate_fn(vm, args[1], "Argument"));
    if vm.heap.func(vm.heap.closure(closure).function).arity > 1 {
        return vm.primitive_error("Function cannot take more than one parameter.");
    }
    ok(vm.new_fiber(Some(closure)))
}

fn fiber_abort(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    // Aborting with null is a no-op.
    if args[1].is_null() {
        return ok(Value::NULL);
    }
    PrimitiveResult::Error(args[1])
}

/// Switch from the running fiber to the receiver.
///
/// With `has_value` the argument is passed in: as the parameter of a fiber
/// that has not started yet, otherwise as the result of the `yield` it is
/// paused in.
fn run_fiber(vm: &mut Vm, args: &[Value], entry: Entry, has_value: bool) -> PrimitiveResult {
    let target = args[0].as_obj();
    let current = running(vm);
    let verb = entry.verb();

    let fiber = vm.heap.fiber(target);
    if fiber.has_error() {
        return vm.primitive_error(&format!("Cannot {} an aborted fiber.", verb));
    }
    if entry == Entry::Call {
        if fiber.caller.is_some() {
            return vm.primitive_error("Fiber has already been called.");
        }
        if fiber.state == FiberState::Root {
            return vm.primitive_error("Cannot call root fiber.");
        }
    }
    if fiber.frames.is_empty() {
        return vm.primitive_error(&format!("Cannot {} a finished fiber.", verb));
    }

    // The fiber calling itself would wait on itself forever.
    if target == current && entry == Entry::Call {
        return vm.primitive_error("Fiber has already been called.");
    }

    let is_new = fiber.is_new();
    let takes_value = vm.heap.func(vm.heap.closure(fiber.frames[0].closure).function).arity == 1;

    if entry == Entry::Call {
        vm.heap.fiber_mut(target).caller = Some(current);
    }
    // Leave the receiver on top to take the result.
    if has_value {
        vm.heap.fiber_mut(current).pop();
    }

    let value = if has_value { args[1] } else { Value::NULL };
    let next = vm.heap.fiber_mut(target);
    if is_new {
        if takes_value {
            next.push(value);
        }
    } else {
        next.set_top(value);
    }

    log::trace!("switching from fiber {:?} to {:?}", current, target);
    vm.fiber = Some(target);
    PrimitiveResult::Switch
}

fn fiber_try(vm: &mut Vm, args: &[Value], has_value: bool) -> PrimitiveResult {
    let result = run_fiber(vm, args, Entry::Call, has_value);
    if let PrimitiveResult::Switch = result {
        vm.heap.fiber_mut(args[0].as_obj()).state = FiberState::Try;
    }
    result
}

fn fiber_transfer_error(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let result = run_fiber(vm, args, Entry::Transfer, true);
    if let PrimitiveResult::Switch = result {
        vm.heap.fiber_mut(args[0].as_obj()).error = args[1];
    }
    result
}

fn fiber_suspend(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    log::trace!("suspending the vm");
    vm.fiber = None;
    vm.api_stack = None;
    PrimitiveResult::Switch
}

/// Hand control back to the fiber that called the running one
fn yield_to_caller(vm: &mut Vm, value: Value) -> PrimitiveResult {
    let current = running(vm);
    let fiber = vm.heap.fiber_mut(current);
    let caller = fiber.caller.take();
    fiber.state = FiberState::Other;

    vm.fiber = caller;
    if let Some(caller) = caller {
        // `call` left its receiver slot on top for the result.
        vm.heap.fiber_mut(caller).set_top(value);
    }
    PrimitiveResult::Switch
}

fn fiber_yield(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    yield_to_caller(vm, Value::NULL)
}

fn fiber_yield_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    // The receiver slot takes the value passed in on resume.
    let current = running(vm);
    vm.heap.fiber_mut(current).pop();
    yield_to_caller(vm, args[1])
}
