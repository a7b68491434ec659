//! `List`

use super::{calculate_range, ok, primitive, static_primitive, validate_index, validate_int};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::{Obj, ObjList};
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let list = vm.core.list;

    static_primitive(vm, list, "new()", list_new);
    static_primitive(vm, list, "filled(_,_)", list_filled);

    primitive(vm, list, "[_]", list_subscript);
    primitive(vm, list, "[_]=(_)", list_subscript_setter);
    primitive(vm, list, "add(_)", list_add);
    primitive(vm, list, "addCore_(_)", list_add_core);
    primitive(vm, list, "clear()", list_clear);
    primitive(vm, list, "count", list_count);
    primitive(vm, list, "insert(_,_)", list_insert);
    primitive(vm, list, "iterate(_)", list_iterate);
    primitive(vm, list, "iteratorValue(_)", list_iterator_value);
    primitive(vm, list, "removeAt(_)", list_remove_at);
    primitive(vm, list, "remove(_)", list_remove_value);
    primitive(vm, list, "indexOf(_)", list_index_of);
    primitive(vm, list, "swap(_,_)", list_swap);
}

fn new_list(vm: &mut Vm, elements: Vec<Value>) -> Value {
    Value::from(vm.allocate(None, Obj::List(ObjList { elements })))
}

fn elements(vm: &Vm, list: Value) -> &Vec<Value> {
    &vm.heap.list(list.as_obj()).elements
}

fn elements_mut(vm: &mut Vm, list: Value) -> &mut Vec<Value> {
    &mut vm.heap.list_mut(list.as_obj()).elements
}

fn list_new(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(new_list(vm, Vec::new()))
}

fn list_filled(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let size = check!(validate_int(vm, args[1], "Size"));
    if size < 0.0 {
        return vm.primitive_error("Size cannot be negative.");
    }
    ok(new_list(vm, vec![args[2]; size as usize]))
}

fn list_subscript(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();

    if args[1].is_num() {
        let index = check!(validate_index(vm, args[1], count, "Subscript"));
        return ok(elements(vm, args[0])[index]);
    }

    let Some(range) = vm.heap.try_range(args[1]).copied() else {
        return vm.primitive_error("Subscript must be a number or a range.");
    };
    let slice = check!(calculate_range(vm, range, count));
    let source = elements(vm, args[0]);
    let picked: Vec<Value> = slice.indices().map(|i| source[i]).collect();
    ok(new_list(vm, picked))
}

fn list_subscript_setter(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], count, "Subscript"));
    elements_mut(vm, args[0])[index] = args[2];
    ok(args[2])
}

fn list_add(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    elements_mut(vm, args[0]).push(args[1]);
    ok(args[1])
}

/// Used by list literals: returns the list so the next element can be added
fn list_add_core(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    elements_mut(vm, args[0]).push(args[1]);
    ok(args[0])
}

fn list_clear(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    elements_mut(vm, args[0]).clear();
    ok(Value::NULL)
}

fn list_count(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(elements(vm, args[0]).len() as f64)
}

fn list_insert(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    // One past the end appends.
    let count = elements(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], count + 1, "Index"));
    elements_mut(vm, args[0]).insert(index, args[2]);
    ok(args[2])
}

fn list_iterate(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();
    if args[1].is_null() {
        return if count == 0 { ok(false) } else { ok(0.0) };
    }

    let index = check!(validate_int(vm, args[1], "Iterator"));
    if index < 0.0 || index >= (count as f64) - 1.0 {
        return ok(false);
    }
    ok(index + 1.0)
}

fn list_iterator_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], count, "Iterator"));
    ok(elements(vm, args[0])[index])
}

fn list_remove_at(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], count, "Index"));
    ok(elements_mut(vm, args[0]).remove(index))
}

fn position(vm: &Vm, list: Value, value: Value) -> Option<usize> {
    elements(vm, list)
        .iter()
        .position(|element| vm.heap.values_equal(*element, value))
}

fn list_remove_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    match position(vm, args[0], args[1]) {
        Some(index) => ok(elements_mut(vm, args[0]).remove(index)),
        None => ok(Value::NULL),
    }
}

fn list_index_of(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(position(vm, args[0], args[1]).map_or(-1.0, |index| index as f64))
}

fn list_swap(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = elements(vm, args[0]).len();
    let a = check!(validate_index(vm, args[1], count, "Index 0"));
    let b = check!(validate_index(vm, args[2], count, "Index 1"));
    elements_mut(vm, args[0]).swap(a, b);
    ok(Value::NULL)
}
