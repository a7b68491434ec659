//! `Object`, `Class`, `Bool` and `Null`

use super::{ok, primitive};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::{ObjKind, ObjRef};
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind_object(vm: &mut Vm, object: ObjRef) {
    primitive(vm, object, "!", object_not);
    primitive(vm, object, "==(_)", object_eq);
    primitive(vm, object, "!=(_)", object_neq);
    primitive(vm, object, "is(_)", object_is);
    primitive(vm, object, "toString", object_to_string);
    primitive(vm, object, "type", object_type);
}

pub(super) fn bind_object_metaclass(vm: &mut Vm, metaclass: ObjRef) {
    primitive(vm, metaclass, "same(_,_)", object_same);
}

pub(super) fn bind_class(vm: &mut Vm, class: ObjRef) {
    primitive(vm, class, "name", class_name);
    primitive(vm, class, "supertype", class_supertype);
    primitive(vm, class, "toString", class_name);
    primitive(vm, class, "attributes", class_attributes);
}

pub(super) fn bind_bool(vm: &mut Vm) {
    let class = vm.core.bool_class;
    primitive(vm, class, "!", bool_not);
    primitive(vm, class, "toString", bool_to_string);
}

pub(super) fn bind_null(vm: &mut Vm) {
    let class = vm.core.null;
    primitive(vm, class, "!", null_not);
    primitive(vm, class, "toString", null_to_string);
}

// ============================================================================
// Object
// ============================================================================

fn object_not(_vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(false)
}

fn object_eq(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.heap.values_equal(args[0], args[1]))
}

fn object_neq(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(!vm.heap.values_equal(args[0], args[1]))
}

fn object_is(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let Some(class) = args[1].try_obj().filter(|obj| vm.heap.entry(*obj).kind() == ObjKind::Class) else {
        return vm.primitive_error("Right operand must be a class.");
    };
    let receiver_class = vm.class_of(args[0]);
    ok(vm.is_subclass(receiver_class, class))
}

fn object_to_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let class = vm.class_of(args[0]);
    let text = format!("instance of {}", vm.heap.class_name(class));
    ok(vm.string_value(&text))
}

fn object_type(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.class_of(args[0]))
}

fn object_same(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.heap.values_equal(args[1], args[2]))
}

// ============================================================================
// Class
// ============================================================================

fn class_name(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.heap.class(args[0].as_obj()).name)
}

fn class_supertype(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    match vm.heap.class(args[0].as_obj()).superclass {
        Some(superclass) => ok(superclass),
        None => ok(Value::NULL),
    }
}

fn class_attributes(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.heap.class(args[0].as_obj()).attributes)
}

// ============================================================================
// Bool and Null
// ============================================================================

fn bool_not(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(!args[0].as_bool())
}

fn bool_to_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let text = if args[0].as_bool() { "true" } else { "false" };
    ok(vm.string_value(text))
}

fn null_not(_vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(true)
}

fn null_to_string(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(vm.string_value("null"))
}
