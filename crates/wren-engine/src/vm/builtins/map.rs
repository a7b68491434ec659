//! `Map`

use super::{ok, primitive, static_primitive, validate_index, validate_int, validate_key};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::Obj;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let map = vm.core.map;

    static_primitive(vm, map, "new()", map_new);

    primitive(vm, map, "[_]", map_subscript);
    primitive(vm, map, "[_]=(_)", map_subscript_setter);
    primitive(vm, map, "addCore_(_,_)", map_add_core);
    primitive(vm, map, "clear()", map_clear);
    primitive(vm, map, "containsKey(_)", map_contains_key);
    primitive(vm, map, "count", map_count);
    primitive(vm, map, "remove(_)", map_remove);
    primitive(vm, map, "iterate(_)", map_iterate);
    primitive(vm, map, "keyIteratorValue_(_)", map_key_iterator_value);
    primitive(vm, map, "valueIteratorValue_(_)", map_value_iterator_value);
}

fn map_new(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(vm.allocate(None, Obj::Map(Default::default())))
}

fn map_subscript(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_key(vm, args[1]));
    ok(vm.heap.map_get(args[0].as_obj(), args[1]).unwrap_or(Value::NULL))
}

fn map_subscript_setter(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_key(vm, args[1]));
    vm.heap.map_set(args[0].as_obj(), args[1], args[2]);
    ok(args[2])
}

/// Used by map literals: returns the map so the next entry can be added
fn map_add_core(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_key(vm, args[1]));
    vm.heap.map_set(args[0].as_obj(), args[1], args[2]);
    ok(args[0])
}

fn map_clear(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    vm.heap.map_clear(args[0].as_obj());
    ok(Value::NULL)
}

fn map_contains_key(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_key(vm, args[1]));
    ok(vm.heap.map_contains(args[0].as_obj(), args[1]))
}

fn map_count(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(vm.heap.map(args[0].as_obj()).count() as f64)
}

fn map_remove(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_key(vm, args[1]));
    ok(vm.heap.map_remove(args[0].as_obj(), args[1]).unwrap_or(Value::NULL))
}

/// Iterators are slot indices into the entry table
fn map_iterate(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let map = args[0].as_obj();
    if vm.heap.map(map).count() == 0 {
        return ok(false);
    }

    let mut start = 0;
    if !args[1].is_null() {
        let iterator = check!(validate_int(vm, args[1], "Iterator"));
        if iterator < 0.0 {
            return ok(false);
        }
        // Resume after the entry returned last time.
        start = iterator as usize + 1;
    }

    match vm.heap.map(map).next_live(start) {
        Some(index) => ok(index as f64),
        None => ok(false),
    }
}

/// Validate a map iterator and return the live slot it points at
fn iterator_slot(vm: &mut Vm, args: &[Value]) -> Result<usize, PrimitiveResult> {
    let capacity = vm.heap.map(args[0].as_obj()).capacity();
    let index = validate_index(vm, args[1], capacity, "Iterator")?;
    if !vm.heap.map(args[0].as_obj()).entries()[index].is_live() {
        return Err(vm.primitive_error("Invalid map iterator."));
    }
    Ok(index)
}

fn map_key_iterator_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let index = check!(iterator_slot(vm, args));
    ok(vm.heap.map(args[0].as_obj()).entries()[index].key)
}

fn map_value_iterator_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let index = check!(iterator_slot(vm, args));
    ok(vm.heap.map(args[0].as_obj()).entries()[index].value)
}
