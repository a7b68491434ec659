//! `System` primitives. Printing itself is written in Wren on top of
//! `writeString_`.

use super::{ok, static_primitive, validate_string};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::ObjRef;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm, system: ObjRef) {
    static_primitive(vm, system, "clock", system_clock);
    static_primitive(vm, system, "gc()", system_gc);
    static_primitive(vm, system, "writeString_(_)", system_write_string);
}

/// Seconds since the VM was created
fn system_clock(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    ok(vm.started.elapsed().as_secs_f64())
}

fn system_gc(vm: &mut Vm, _args: &[Value]) -> PrimitiveResult {
    vm.collect_garbage();
    ok(Value::NULL)
}

fn system_write_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let string = check!(validate_string(vm, args[1], "Argument"));
    let text = vm.heap.string(string).to_str_lossy().into_owned();
    vm.write(&text);
    ok(args[1])
}
