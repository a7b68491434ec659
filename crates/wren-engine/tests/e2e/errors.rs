//! Runtime and compile errors as the host sees them

use std::cell::RefCell;
use std::rc::Rc;

use wren_engine::{Vm, VmError};

use super::*;

#[test]
fn test_method_not_found() {
    expect_runtime_error("1.frobnicate", "Num does not implement 'frobnicate'.");
    expect_runtime_error("\"s\".pad(1, 2)", "String does not implement 'pad(_,_)'.");
}

#[test]
fn test_static_method_not_found() {
    expect_runtime_error(
        r#"
class Foo {}
Foo.bar()
"#,
        "Foo metaclass does not implement 'bar()'.",
    );
}

#[test]
fn test_error_reports_message_then_stack_trace() {
    let output = expect_runtime_error(
        r#"
class Foo {
  static fail() {
    null.nope
  }
}
System.print("start")
Foo.fail()
"#,
        "Null does not implement 'nope'.",
    );
    assert_eq!(output.stdout, "start\n");
    assert_eq!(output.errors[0], "Null does not implement 'nope'.");
    // Innermost frame first, the module body last.
    assert_eq!(output.errors.len(), 3, "{:#?}", output.errors);
    assert!(output.errors[1].starts_with("[main line 4] in "), "{:#?}", output.errors);
    assert_eq!(output.errors[2], "[main line 8] in (script)");
}

#[test]
fn test_stack_trace_in_result() {
    let output = run("\nFiber.abort(\"bad\")\n");
    match output.result {
        Err(VmError::Runtime { message, stack_trace }) => {
            assert_eq!(message, "bad");
            assert_eq!(stack_trace.len(), 1);
            assert_eq!(stack_trace[0].module, "main");
            assert_eq!(stack_trace[0].line, 2);
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_stack_overflow() {
    let stdout = Rc::new(RefCell::new(String::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut options = capturing_options(stdout, Rc::clone(&errors));
    options.max_call_depth = 200;

    let mut vm = Vm::new(options);
    let result = vm.interpret(
        "main",
        r#"
class Deep {
  static down(n) { down(n + 1) }
}
Deep.down(0)
"#,
    );
    match result {
        Err(VmError::Runtime { message, .. }) => assert_eq!(message, "Stack overflow."),
        other => panic!("expected stack overflow, got {:?}", other),
    }
}

#[test]
fn test_recursion_below_the_limit() {
    expect_output(
        r#"
class Count {
  static down(n) { n == 0 ? "bottom" : down(n - 1) }
}
System.print(Count.down(1000))
"#,
        "bottom\n",
    );
}

#[test]
fn test_fields_outside_instances() {
    expect_compile_error(
        r#"
_x = 1
"#,
        "Cannot reference a field outside of a class definition.",
    );
}

#[test]
fn test_undefined_variable() {
    let output = expect_compile_error("System.print(missing)\n", "Variable is used but not defined.");
    assert!(output.errors.iter().any(|line| line.starts_with("[main line 1] ")), "{:#?}", output.errors);
}

#[test]
fn test_undefined_variable_reports_first_use() {
    expect_compile_error(
        r#"
System.print(Later)
"#,
        "Variable is used but not defined.",
    );
}

#[test]
fn test_compile_errors_carry_location() {
    let output = run("var a = 1\nvar b = )\n");
    match output.result {
        Err(VmError::Compile(errors)) => {
            assert_eq!(errors[0].module, "main");
            assert_eq!(errors[0].line, 2);
            assert!(errors[0].message.contains("Expected expression."), "{:#?}", errors);
        }
        other => panic!("expected compile errors, got {:?}", other),
    }
}

#[test]
fn test_duplicate_method() {
    expect_compile_error(
        r#"
class Foo {
  bar() { 1 }
  bar() { 2 }
}
"#,
        "Class Foo already defines a method 'bar()'.",
    );
}

#[test]
fn test_redeclared_variable() {
    expect_compile_error(
        r#"
var a = 1
var a = 2
"#,
        "Module variable is already defined.",
    );
    expect_compile_error(
        r#"
{
  var a = 1
  var a = 2
}
"#,
        "Variable is already declared in this scope.",
    );
}

#[test]
fn test_constructor_cannot_return_value() {
    expect_compile_error(
        r#"
class Foo {
  construct new() {
    return 1
  }
}
"#,
        "A constructor cannot return a value.",
    );
}

#[test]
fn test_compile_error_runs_nothing() {
    let output = run("System.print(\"ran\")\nvar = 1\n");
    assert!(matches!(output.result, Err(VmError::Compile(_))));
    assert_eq!(output.stdout, "");
}

#[test]
fn test_calling_non_function() {
    expect_runtime_error(
        r#"
var notFn = 3
notFn.call()
"#,
        "Num does not implement 'call()'.",
    );
}

#[test]
fn test_non_string_error_object() {
    expect_runtime_error("Fiber.abort(123)", "[error object]");
}

#[test]
fn test_vm_usable_after_runtime_error() {
    let stdout = Rc::new(RefCell::new(String::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut vm = Vm::new(capturing_options(Rc::clone(&stdout), errors));

    assert!(vm.interpret("main", "var x = 1\nnull.boom").is_err());
    vm.interpret("main", "System.print(x + 1)").unwrap();
    assert_eq!(stdout.borrow().as_str(), "2\n");
}
