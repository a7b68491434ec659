//! Fibers: call, yield, transfer, try and abort

use super::harness::*;

#[test]
fn test_generator_yields_then_finishes() {
    expect_output(
        r#"
var fiber = Fiber.new {
  Fiber.yield(1)
  Fiber.yield(2)
  Fiber.yield(3)
}
System.print(fiber.call())
System.print(fiber.call())
System.print(fiber.call())
System.print(fiber.isDone)
System.print(fiber.call())
System.print(fiber.isDone)
"#,
        "1\n2\n3\nfalse\nnull\ntrue\n",
    );
}

#[test]
fn test_values_passed_both_ways() {
    expect_output(
        r#"
var fiber = Fiber.new { |first|
  System.print("got %(first)")
  var second = Fiber.yield("out")
  System.print("got %(second)")
  return "done"
}
System.print(fiber.call("a"))
System.print(fiber.call("b"))
"#,
        "got a\nout\ngot b\ndone\n",
    );
}

#[test]
fn test_yield_without_value_returns_null() {
    expect_output(
        r#"
var fiber = Fiber.new {
  var resumed = Fiber.yield()
  System.print(resumed)
}
System.print(fiber.call())
fiber.call()
"#,
        "null\nnull\n",
    );
}

#[test]
fn test_calling_finished_fiber_is_an_error() {
    expect_runtime_error(
        "var f = Fiber.new { 1 }\nf.call()\nf.call()",
        "Cannot call a finished fiber.",
    );
}

#[test]
fn test_try_catches_abort() {
    expect_output(
        r#"
var fiber = Fiber.new {
  Fiber.abort("boom")
  System.print("unreachable")
}
var error = fiber.try()
System.print(error)
System.print(fiber.error)
System.print(fiber.isDone)
"#,
        "boom\nboom\ntrue\n",
    );
}

#[test]
fn test_try_catches_runtime_errors_from_nested_calls() {
    expect_output(
        r#"
class Deep {
  static go(n) {
    if (n == 0) return null.missing
    return go(n - 1)
  }
}
var fiber = Fiber.new { Deep.go(5) }
System.print(fiber.try())
System.print("after")
"#,
        "Null does not implement 'missing'.\nafter\n",
    );
}

#[test]
fn test_error_propagates_through_plain_call() {
    expect_output(
        r#"
var inner = Fiber.new { Fiber.abort("inner failed") }
var outer = Fiber.new { inner.call() }
System.print(outer.try())
System.print(inner.error)
"#,
        "inner failed\ninner failed\n",
    );
}

#[test]
fn test_abort_with_non_string_error() {
    expect_output(
        r#"
var fiber = Fiber.new { Fiber.abort(42) }
System.print(fiber.try() + 1)
"#,
        "43\n",
    );
}

#[test]
fn test_abort_null_does_nothing() {
    expect_output("Fiber.abort(null)\nSystem.print(\"still running\")", "still running\n");
}

#[test]
fn test_uncaught_abort_fails_the_script() {
    expect_runtime_error("Fiber.abort(\"fatal\")", "fatal");
}

#[test]
fn test_transfer_moves_control() {
    expect_output(
        r#"
var main = Fiber.current
var worker = Fiber.new {
  System.print("worker")
  main.transfer("back")
}
var fiber = Fiber.new {
  System.print(worker.transfer())
}
System.print("before")
fiber.call()
"#,
        "before\nworker\n",
    );
}

#[test]
fn test_transfer_error_raises_in_target() {
    // The target yielded, so nothing is waiting to catch the error.
    let output = expect_runtime_error(
        r#"
var target = Fiber.new {
  Fiber.yield()
  System.print("never")
}
target.call()
target.transferError("injected")
System.print("never either")
"#,
        "injected",
    );
    assert_eq!(output.stdout, "");
}

#[test]
fn test_fiber_cannot_be_called_twice() {
    expect_runtime_error(
        r#"
var a
a = Fiber.new { a.call() }
a.call()
"#,
        "Fiber has already been called.",
    );
}

#[test]
fn test_calling_the_root_fiber_is_an_error() {
    expect_runtime_error(
        "var root = Fiber.current\nFiber.new { root.call() }.call()",
        "Cannot call root fiber.",
    );
}

#[test]
fn test_fiber_new_validates_function() {
    expect_runtime_error("Fiber.new(1)", "Argument must be a function.");
    expect_runtime_error(
        "Fiber.new { |a, b| a }",
        "Function cannot take more than one parameter.",
    );
}

#[test]
fn test_suspend_stops_the_vm() {
    expect_output(
        r#"
System.print("before")
Fiber.suspend()
System.print("after")
"#,
        "before\n",
    );
}

#[test]
fn test_generators_in_a_loop() {
    expect_output(
        r#"
var range = Fn.new { |from, to|
  return Fiber.new {
    for (i in from..to) Fiber.yield(i)
  }
}
var gen = range.call(1, 4)
var total = 0
while (true) {
  var value = gen.call()
  if (gen.isDone) break
  total = total + value
}
System.print(total)
"#,
        "10\n",
    );
}
