//! Closures and upvalues

use super::harness::*;

#[test]
fn test_closure_captures_local() {
    expect_output(
        r#"
var makeAdder = Fn.new { |n|
  return Fn.new { |x| x + n }
}
var add5 = makeAdder.call(5)
System.print(add5.call(10))
"#,
        "15\n",
    );
}

#[test]
fn test_counter_shares_upvalue() {
    expect_output(
        r#"
var counter = Fn.new {
  var count = 0
  var increment = Fn.new { count = count + 1 }
  var read = Fn.new { count }
  return [increment, read]
}.call()
counter[0].call()
counter[0].call()
System.print(counter[1].call())
"#,
        "2\n",
    );
}

#[test]
fn test_each_loop_iteration_captures_a_fresh_variable() {
    expect_output(
        r#"
var fns = []
for (i in 1..3) {
  fns.add(Fn.new { i })
}
for (f in fns) System.print(f.call())
"#,
        "1\n2\n3\n",
    );
}

#[test]
fn test_block_scoped_capture_in_while_loop() {
    expect_output(
        r#"
var fns = []
var i = 0
while (i < 3) {
  var j = i * 10
  fns.add(Fn.new { j })
  i = i + 1
}
System.print(fns.map { |f| f.call() }.toList)
"#,
        "[0, 10, 20]\n",
    );
}

#[test]
fn test_closure_outlives_its_frame() {
    expect_output(
        r#"
var f
{
  var local = "kept"
  f = Fn.new { local }
}
System.print(f.call())
"#,
        "kept\n",
    );
}

#[test]
fn test_nested_upvalues() {
    expect_output(
        r#"
var outer = Fn.new {
  var a = "a"
  return Fn.new {
    var b = "b"
    return Fn.new { a + b }
  }
}
System.print(outer.call().call().call())
"#,
        "ab\n",
    );
}

#[test]
fn test_closure_in_method_sees_fields_and_this() {
    expect_output(
        r#"
class Box {
  construct new(value) { _value = value }
  getter { Fn.new { _value } }
  describe { Fn.new { this.toString } }
  toString { "Box" }
}
var box = Box.new(42)
System.print(box.getter.call())
System.print(box.describe.call())
"#,
        "42\nBox\n",
    );
}

#[test]
fn test_deep_recursion_with_open_upvalues() {
    // Deep enough to force the fiber stack to grow while upvalues are open.
    expect_output(
        r#"
var captured = []
var recurse
recurse = Fn.new { |n|
  var local = n
  captured.add(Fn.new { local })
  if (n > 0) recurse.call(n - 1)
}
recurse.call(500)
System.print(captured[0].call())
System.print(captured[500].call())
System.print(captured.count)
"#,
        "500\n0\n501\n",
    );
}

#[test]
fn test_open_upvalue_survives_stack_growth() {
    // The captured local is still open while the recursion grows the stack.
    expect_output(
        r#"
var deep
deep = Fn.new { |n| n == 0 ? 0 : 1 + deep.call(n - 1) }
var check = Fn.new {
  var local = "start"
  var read = Fn.new { local }
  var write = Fn.new { |value| local = value }
  System.print(read.call())
  System.print(deep.call(2000))
  System.print(read.call())
  local = "changed"
  System.print(read.call())
  write.call("written")
  System.print(local)
}
check.call()
"#,
        "start\n2000\nstart\nchanged\nwritten\n",
    );
}

#[test]
fn test_fn_arity_and_extra_arguments() {
    expect_output(
        r#"
var f = Fn.new { |a, b| a }
System.print(f.arity)
System.print(f.call(1, 2, 3))
System.print(Fn.new {}.arity)
System.print(f)
"#,
        "2\n1\n0\n<fn>\n",
    );
}

#[test]
fn test_too_few_arguments_is_an_error() {
    expect_runtime_error("Fn.new { |a, b| a }.call(1)", "Function expects more arguments.");
}
