//! `Range`

use super::num::format_num;
use super::{ok, primitive, validate_num};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::ObjRange;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let range = vm.core.range;

    primitive(vm, range, "from", |vm, args| ok(range_of(vm, args[0]).from));
    primitive(vm, range, "to", |vm, args| ok(range_of(vm, args[0]).to));
    primitive(vm, range, "min", |vm, args| {
        let range = range_of(vm, args[0]);
        ok(range.from.min(range.to))
    });
    primitive(vm, range, "max", |vm, args| {
        let range = range_of(vm, args[0]);
        ok(range.from.max(range.to))
    });
    primitive(vm, range, "isInclusive", |vm, args| ok(range_of(vm, args[0]).is_inclusive));
    primitive(vm, range, "iterate(_)", range_iterate);
    primitive(vm, range, "iteratorValue(_)", |_, args| ok(args[1]));
    primitive(vm, range, "toString", range_to_string);
}

#[inline]
fn range_of(vm: &Vm, value: Value) -> ObjRange {
    *vm.heap.range(value.as_obj())
}

fn range_iterate(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let range = range_of(vm, args[0]);

    // An exclusive range with equal ends is empty.
    if range.from == range.to && !range.is_inclusive {
        return ok(false);
    }
    if args[1].is_null() {
        return ok(range.from);
    }

    let mut iterator = check!(validate_num(vm, args[1], "Iterator"));
    if range.from < range.to {
        iterator += 1.0;
        if iterator > range.to {
            return ok(false);
        }
    } else {
        iterator -= 1.0;
        if iterator < range.to {
            return ok(false);
        }
    }

    if !range.is_inclusive && iterator == range.to {
        return ok(false);
    }
    ok(iterator)
}

fn range_to_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let range = range_of(vm, args[0]);
    let dots = if range.is_inclusive { ".." } else { "..." };
    let text = format!("{}{}{}", format_num(range.from), dots, format_num(range.to));
    ok(vm.string_value(&text))
}
