//! Core library
//!
//! Bootstrapping happens in three steps. `Object` and `Class` are wired up
//! by hand because every other class depends on them. Then `core.wren`
//! declares the remaining core classes and the methods written in Wren.
//! Finally the primitives are bound onto the classes `core.wren` created.
//!
//! Methods are inherited by copying when a subclass is created, so
//! primitives on a class must be bound before anything subclasses it.

/// Unwrap a validation result, returning the error from the primitive
macro_rules! check {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => return error,
        }
    };
}

mod fiber;
mod function;
mod list;
mod map;
pub(crate) mod num;
mod object;
mod range;
mod string;
mod system;

use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::{Method, Obj, ObjClass, ObjKind, ObjRange, ObjRef, Primitive};
use crate::vm::value::Value;
use crate::vm::Vm;

const CORE_SOURCE: &str = include_str!("core.wren");

/// Load the core library into a fresh VM
pub(crate) fn initialize(vm: &mut Vm) {
    let object = vm.core.object;
    define_core_variable(vm, "Object", Value::from(object));
    object::bind_object(vm, object);

    // Class is a subclass of Object, and the class of every metaclass.
    let name = vm.new_string_obj(b"Class");
    vm.push_root(name);
    let class = vm.allocate(None, Obj::Class(ObjClass::new(name, 0, false)));
    vm.pop_root(name);
    vm.bind_superclass(class, object);
    vm.core.class = class;
    define_core_variable(vm, "Class", Value::from(class));
    object::bind_class(vm, class);

    // Object's metaclass closes the loop: Object -> Object metaclass -> Class -> Class.
    let name = vm.new_string_obj(b"Object metaclass");
    vm.push_root(name);
    let object_metaclass = vm.allocate(
        Some(class),
        Obj::Class(ObjClass::new(name, 0, false)),
    );
    vm.pop_root(name);
    vm.bind_superclass(object_metaclass, class);
    vm.heap.header_mut(object).class = Some(object_metaclass);
    vm.heap.header_mut(class).class = Some(class);
    object::bind_object_metaclass(vm, object_metaclass);

    run_core_source(vm);

    vm.core.bool_class = core_class(vm, "Bool");
    vm.core.fiber = core_class(vm, "Fiber");
    vm.core.fn_class = core_class(vm, "Fn");
    vm.core.null = core_class(vm, "Null");
    vm.core.num = core_class(vm, "Num");
    vm.core.string = core_class(vm, "String");
    vm.core.list = core_class(vm, "List");
    vm.core.map = core_class(vm, "Map");
    vm.core.range = core_class(vm, "Range");

    object::bind_bool(vm);
    object::bind_null(vm);
    fiber::bind(vm);
    function::bind(vm);
    num::bind(vm);
    string::bind(vm);
    list::bind(vm);
    map::bind(vm);
    range::bind(vm);

    let system = core_class(vm, "System");
    system::bind(vm, system);

    log::debug!(
        "core library loaded: {} objects, {} method symbols",
        vm.heap.len(),
        vm.method_names.len()
    );
}

fn define_core_variable(vm: &mut Vm, name: &str, value: Value) {
    let module = vm.heap.module_mut(vm.core_module);
    module.variable_names.add(name);
    module.variables.push(value);
}

fn run_core_source(vm: &mut Vm) {
    let closure = match vm.compile_in_module(vm.core_module, CORE_SOURCE, false, true) {
        Ok(closure) => closure,
        Err(errors) => {
            for error in &errors {
                log::error!("core library: {}", error);
            }
            return;
        }
    };
    if let Err(error) = vm.run_closure(closure) {
        log::error!("core library failed to run: {}", error);
    }
}

/// Class defined by the core library under `name`
fn core_class(vm: &Vm, name: &str) -> ObjRef {
    let module = vm.heap.module(vm.core_module);
    let value = module
        .variable_names
        .find(name)
        .and_then(|symbol| module.variables.get(symbol).copied())
        .and_then(Value::try_obj)
        .filter(|obj| vm.heap.entry(*obj).kind() == ObjKind::Class);
    match value {
        Some(class) => class,
        None => panic!("core library does not define class {}", name),
    }
}

// ============================================================================
// Binding helpers
// ============================================================================

/// Bind an instance primitive
pub(crate) fn primitive(vm: &mut Vm, class: ObjRef, signature: &str, function: Primitive) {
    let symbol = vm.method_names.ensure(signature);
    vm.heap.class_mut(class).bind_method(symbol, Method::Primitive(function));
}

/// Bind a primitive on the class's metaclass
pub(crate) fn static_primitive(vm: &mut Vm, class: ObjRef, signature: &str, function: Primitive) {
    let metaclass = vm.class_of(Value::from(class));
    primitive(vm, metaclass, signature, function);
}

/// Successful primitive result
#[inline]
pub(crate) fn ok(value: impl Into<Value>) -> PrimitiveResult {
    PrimitiveResult::Value(value.into())
}

// ============================================================================
// Argument validation
// ============================================================================

pub(crate) type Checked<T> = Result<T, PrimitiveResult>;

pub(crate) fn validate_num(vm: &mut Vm, value: Value, arg_name: &str) -> Checked<f64> {
    match value.try_num() {
        Some(n) => Ok(n),
        None => Err(vm.primitive_error(&format!("{} must be a number.", arg_name))),
    }
}

pub(crate) fn validate_int_value(vm: &mut Vm, n: f64, arg_name: &str) -> Checked<f64> {
    if n.trunc() == n {
        Ok(n)
    } else {
        Err(vm.primitive_error(&format!("{} must be an integer.", arg_name)))
    }
}

pub(crate) fn validate_int(vm: &mut Vm, value: Value, arg_name: &str) -> Checked<f64> {
    let n = validate_num(vm, value, arg_name)?;
    validate_int_value(vm, n, arg_name)
}

/// Index into a sequence of `count` elements. Negative indices count back
/// from the end.
pub(crate) fn validate_index_value(vm: &mut Vm, n: f64, count: usize, arg_name: &str) -> Checked<usize> {
    let mut index = validate_int_value(vm, n, arg_name)?;
    if index < 0.0 {
        index += count as f64;
    }
    if index >= 0.0 && index < count as f64 {
        Ok(index as usize)
    } else {
        Err(vm.primitive_error(&format!("{} out of bounds.", arg_name)))
    }
}

pub(crate) fn validate_index(vm: &mut Vm, value: Value, count: usize, arg_name: &str) -> Checked<usize> {
    let n = validate_num(vm, value, arg_name)?;
    validate_index_value(vm, n, count, arg_name)
}

pub(crate) fn validate_string(vm: &mut Vm, value: Value, arg_name: &str) -> Checked<ObjRef> {
    match value.try_obj() {
        Some(obj) if vm.heap.entry(obj).kind() == ObjKind::String => Ok(obj),
        _ => Err(vm.primitive_error(&format!("{} must be a string.", arg_name))),
    }
}

pub(crate) fn validate_fn(vm: &mut Vm, value: Value, arg_name: &str) -> Checked<ObjRef> {
    match value.try_obj() {
        Some(obj) if vm.heap.entry(obj).kind() == ObjKind::Closure => Ok(obj),
        _ => Err(vm.primitive_error(&format!("{} must be a function.", arg_name))),
    }
}

pub(crate) fn validate_key(vm: &mut Vm, value: Value) -> Checked<()> {
    if vm.heap.is_valid_key(value) {
        Ok(())
    } else {
        Err(vm.primitive_error("Key must be a value type."))
    }
}

/// Elements a range selects out of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slice {
    /// First index
    pub start: usize,
    /// Number of elements
    pub count: usize,
    /// Direction: 1 forwards, -1 backwards, 0 when empty
    pub step: isize,
}

impl Slice {
    /// The selected indices in order
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..self.count).map(move |i| (self.start as isize + i as isize * self.step) as usize)
    }
}

/// Resolve a subscript range against a sequence of `length` elements
pub(crate) fn calculate_range(vm: &mut Vm, range: ObjRange, length: usize) -> Checked<Slice> {
    let len = length as f64;

    // An empty range just past the end is allowed.
    let empty_end = if range.is_inclusive { -1.0 } else { len };
    if range.from == len && range.to == empty_end {
        return Ok(Slice {
            start: 0,
            count: 0,
            step: 0,
        });
    }

    let from = validate_index_value(vm, range.from, length, "Range start")?;

    let mut to = validate_int_value(vm, range.to, "Range end")?;
    if to < 0.0 {
        to += len;
    }

    if !range.is_inclusive {
        if to == from as f64 {
            return Ok(Slice {
                start: from,
                count: 0,
                step: 0,
            });
        }
        to += if to >= from as f64 { -1.0 } else { 1.0 };
    }

    if to < 0.0 || to >= len {
        return Err(vm.primitive_error("Range end out of bounds."));
    }

    let to = to as usize;
    Ok(Slice {
        start: from,
        count: from.abs_diff(to) + 1,
        step: if from <= to { 1 } else { -1 },
    })
}
