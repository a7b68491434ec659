//! Control flow: conditionals, loops, logical operators

use super::harness::*;

#[test]
fn test_if_else_chain() {
    expect_output(
        r#"
for (n in [1, 5, 10]) {
  if (n < 3) {
    System.print("small")
  } else if (n < 8) {
    System.print("medium")
  } else {
    System.print("large")
  }
}
"#,
        "small\nmedium\nlarge\n",
    );
}

#[test]
fn test_truthiness() {
    expect_output(
        r#"
System.print(0 ? "yes" : "no")
System.print("" ? "yes" : "no")
System.print(null ? "yes" : "no")
System.print(false ? "yes" : "no")
"#,
        "yes\nyes\nno\nno\n",
    );
}

#[test]
fn test_while_with_break_and_continue() {
    expect_output(
        r#"
var i = 0
var sum = 0
while (true) {
  i = i + 1
  if (i > 10) break
  if (i % 2 == 0) continue
  sum = sum + i
}
System.print(sum)
"#,
        "25\n",
    );
}

#[test]
fn test_for_over_ranges() {
    expect_output(
        r#"
var out = []
for (i in 0...3) out.add(i)
for (i in 3..1) out.add(i)
System.print(out)
"#,
        "[0, 1, 2, 3, 2, 1]\n",
    );
}

#[test]
fn test_nested_loops_break_inner_only() {
    expect_output(
        r#"
for (i in 1..3) {
  for (j in 1..3) {
    if (j == 2) break
    System.print("%(i),%(j)")
  }
}
"#,
        "1,1\n2,1\n3,1\n",
    );
}

#[test]
fn test_logical_operators_short_circuit() {
    expect_output(
        r#"
var calls = 0
var touch = Fn.new {
  calls = calls + 1
  return true
}
System.print(false && touch.call())
System.print(true || touch.call())
System.print(null || "fallback")
System.print(1 && 2)
System.print(calls)
"#,
        "false\ntrue\nfallback\n2\n0\n",
    );
}

#[test]
fn test_return_from_nested_block() {
    expect_output(
        r#"
var find = Fn.new { |list, target|
  for (item in list) {
    if (item == target) return "found"
  }
  return "missing"
}
System.print(find.call([1, 2, 3], 2))
System.print(find.call([1, 2, 3], 9))
"#,
        "found\nmissing\n",
    );
}

#[test]
fn test_string_interpolation_nests() {
    expect_output(
        r#"
var name = "wren"
System.print("a %(name) b %("inner %(1 + 2)") c")
"#,
        "a wren b inner 3 c\n",
    );
}

#[test]
fn test_break_outside_loop_is_a_compile_error() {
    expect_compile_error("break", "Cannot use 'break' outside of a loop.");
}
