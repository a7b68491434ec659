//! `Fn`

use super::{ok, primitive, static_primitive, validate_fn};
use crate::vm::defaults::MAX_PARAMETERS;
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::Method;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let class = vm.core.fn_class;

    static_primitive(vm, class, "new(_)", fn_new);
    primitive(vm, class, "arity", fn_arity);
    primitive(vm, class, "toString", |vm, _| ok(vm.string_value("<fn>")));

    // call() through call(_,...,_) run the receiver itself.
    for argc in 0..=MAX_PARAMETERS {
        let signature = call_signature(argc);
        let symbol = vm.method_names.ensure(&signature);
        vm.heap.class_mut(class).bind_method(symbol, Method::FunctionCall);
    }
}

fn call_signature(argc: usize) -> String {
    format!("call({})", vec!["_"; argc].join(","))
}

fn fn_new(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    // Block arguments are already closures.
    check!(validate_fn(vm, args[1], "Argument"));
    ok(args[1])
}

fn fn_arity(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let function = vm.heap.closure(args[0].as_obj()).function;
    ok(vm.heap.func(function).arity as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_signatures() {
        assert_eq!(call_signature(0), "call()");
        assert_eq!(call_signature(1), "call(_)");
        assert_eq!(call_signature(3), "call(_,_,_)");
    }
}
