//! Core library classes

use super::harness::*;

// ============================================================================
// Num
// ============================================================================

#[test]
fn test_num_formatting() {
    expect_output(
        r#"
System.print(1 / 3)
System.print(10 / 2)
System.print(1e20)
System.print(-0)
System.print(0 / 0)
System.print(1 / 0)
System.print(123.456)
"#,
        "0.33333333333333\n5\n1e+20\n-0\nnan\ninfinity\n123.456\n",
    );
}

#[test]
fn test_num_methods() {
    expect_output(
        r#"
System.print((-3.7).abs)
System.print(3.2.ceil)
System.print(3.7.floor)
System.print(2.5.round)
System.print(9.sqrt)
System.print(2.pow(10))
System.print(3.min(5))
System.print(3.max(5))
System.print(12.clamp(0, 10))
System.print(-4.5.truncate)
System.print(-4.5.fraction)
System.print(-2.sign)
System.print(4.isInteger)
System.print(4.5.isInteger)
System.print(7 % 3)
"#,
        "3.7\n4\n3\n3\n3\n1024\n3\n5\n10\n-4\n-0.5\n-1\ntrue\nfalse\n1\n",
    );
}

#[test]
fn test_num_bitwise() {
    expect_output(
        r#"
System.print(12 & 10)
System.print(12 | 10)
System.print(12 ^ 10)
System.print(1 << 4)
System.print(256 >> 4)
System.print(~0)
"#,
        "8\n14\n6\n16\n16\n4294967295\n",
    );
}

#[test]
fn test_num_from_string() {
    expect_output(
        r#"
System.print(Num.fromString("42"))
System.print(Num.fromString(" -1.5 "))
System.print(Num.fromString("0x1f"))
System.print(Num.fromString("nope"))
System.print(Num.fromString(""))
"#,
        "42\n-1.5\n31\nnull\nnull\n",
    );
}

#[test]
fn test_num_constants() {
    expect_output(
        r#"
System.print(Num.pi > 3.14 && Num.pi < 3.15)
System.print(Num.infinity)
System.print(Num.nan.isNan)
System.print(Num.largest > 1e308)
System.print(Num.maxSafeInteger)
"#,
        "true\ninfinity\ntrue\ntrue\n9.007199254741e+15\n",
    );
}

#[test]
fn test_num_operand_must_be_number() {
    expect_runtime_error("1 + \"a\"", "Right operand must be a number.");
}

#[test]
fn test_num_equality_with_other_types() {
    expect_output("System.print(1 == \"1\")\nSystem.print(1 != null)\n", "false\ntrue\n");
}

// ============================================================================
// String
// ============================================================================

#[test]
fn test_string_basics() {
    expect_output(
        r#"
var s = "hello world"
System.print(s.count)
System.print(s.contains("lo w"))
System.print(s.startsWith("hell"))
System.print(s.endsWith("world"))
System.print(s.indexOf("o"))
System.print(s.indexOf("o", 5))
System.print(s.indexOf("z"))
System.print(s[0])
System.print(s[-1])
System.print(s[0..4])
System.print(s[6...11])
System.print("ab" + "cd")
System.print("ab" == "a" + "b")
"#,
        "11\ntrue\ntrue\ntrue\n4\n7\n-1\nh\nd\nhello\nworld\nabcd\ntrue\n",
    );
}

#[test]
fn test_string_utf8() {
    expect_output(
        r#"
var s = "a€b"
System.print(s.count)
System.print(s.byteCount)
System.print(s.codePoints.toList)
System.print(s.bytes.toList)
for (c in s) System.print(c)
System.print(String.fromCodePoint(8364))
System.print(String.fromByte(65))
"#,
        "3\n5\n[97, 8364, 98]\n[97, 226, 130, 172, 98]\na\n€\nb\n€\nA\n",
    );
}

#[test]
fn test_string_core_methods() {
    expect_output(
        r#"
System.print("a,b,,c".split(","))
System.print("one two one".replace("one", "1"))
System.print("  padded \t".trim())
System.print("xxhixx".trimStart("x"))
System.print("xxhixx".trimEnd("x"))
System.print("ab" * 3)
System.print("abc".map { |c| c + c }.join("-"))
"#,
        "[a, b, , c]\n1 two 1\npadded\nhixx\nxxhi\nababab\naa-bb-cc\n",
    );
}

#[test]
fn test_string_subscript_out_of_bounds() {
    expect_runtime_error("\"abc\"[3]", "Subscript out of bounds.");
}

#[test]
fn test_from_code_point_range_check() {
    expect_runtime_error(
        "String.fromCodePoint(0x110000)",
        "Code point cannot be greater than 0x10ffff.",
    );
}

// ============================================================================
// List
// ============================================================================

#[test]
fn test_list_operations() {
    expect_output(
        r#"
var list = [1, 2, 3]
list.add(4)
list.insert(0, 0)
list.insert(-1, 99)
System.print(list)
System.print(list.removeAt(-2))
System.print(list.remove(2))
System.print(list.remove(42))
System.print(list.indexOf(3))
list.swap(0, 1)
System.print(list)
list[0] = "first"
System.print(list[0])
System.print(list.count)
list.clear()
System.print(list.isEmpty)
"#,
        "[0, 1, 2, 3, 4, 99]\n4\n2\nnull\n2\n[1, 0, 3, 99]\nfirst\n4\ntrue\n",
    );
}

#[test]
fn test_list_ranges_and_helpers() {
    expect_output(
        r#"
var list = [5, 3, 8, 1]
System.print(list[1..2])
System.print(list[-2..-1])
System.print(list[3..0])
System.print(list[4..-1])
System.print(list.sort())
System.print(List.filled(3, 0))
System.print([1, 2] + [3])
System.print([1, 2] * 2)
System.print([1, 2, 3].where { |x| x > 1 }.toList)
System.print([1, 2, 3].reduce { |a, b| a + b })
System.print([1, 2, 3].reduce(10) { |a, b| a + b })
System.print([1, 2, 3].all { |x| x > 0 })
System.print([1, 2, 3].any { |x| x > 2 })
System.print([1, 2, 3].contains(2))
System.print([1, 2, 3, 4].skip(1).take(2).toList)
System.print([1, 2, 3].count { |x| x != 2 })
"#,
        "[3, 8]\n[8, 1]\n[1, 8, 3, 5]\n[]\n[1, 3, 5, 8]\n[0, 0, 0]\n[1, 2, 3]\n[1, 2, 1, 2]\n[2, 3]\n6\n16\ntrue\ntrue\ntrue\n[2, 3]\n2\n",
    );
}

#[test]
fn test_list_index_errors() {
    expect_runtime_error("[1, 2][2]", "Subscript out of bounds.");
    expect_runtime_error("[1, 2][0.5]", "Subscript must be an integer.");
    expect_runtime_error("[1, 2][\"a\"]", "Subscript must be a number or a range.");
    expect_runtime_error("List.filled(-1, 0)", "Size cannot be negative.");
}

// ============================================================================
// Map
// ============================================================================

#[test]
fn test_map_operations() {
    expect_output(
        r#"
var map = {"a": 1, "b": 2}
map["c"] = 3
System.print(map.count)
System.print(map["b"])
System.print(map["zzz"])
System.print(map.containsKey("a"))
System.print(map.remove("a"))
System.print(map.remove("a"))
System.print(map.containsKey("a"))
map[1..2] = "range"
map[Num] = "class"
map[true] = "bool"
System.print(map[1..2])
System.print(map[Num])
System.print(map[true])
map.clear()
System.print(map.count)
"#,
        "3\n2\nnull\ntrue\n1\nnull\nfalse\nrange\nclass\nbool\n0\n",
    );
}

#[test]
fn test_map_iteration() {
    expect_output(
        r#"
var map = {}
for (i in 1..20) map[i] = i * i
var sum = 0
for (entry in map) sum = sum + entry.value
System.print(sum)
System.print(map.keys.reduce { |a, b| a + b })
System.print({"only": 1})
System.print({"k": "v"}.toList[0])
"#,
        "2870\n210\n{only: 1}\nk:v\n",
    );
}

#[test]
fn test_map_key_must_be_value_type() {
    expect_runtime_error("var m = {}\nm[[]] = 1", "Key must be a value type.");
}

// ============================================================================
// Range, Bool, Null, Object
// ============================================================================

#[test]
fn test_range_members() {
    expect_output(
        r#"
var r = 1..5
System.print(r)
System.print(r.from)
System.print(r.to)
System.print(r.isInclusive)
System.print((5...1).min)
System.print((5...1).max)
System.print((1...1).toList)
System.print((1..1).toList)
System.print(1..3 == 1..3)
"#,
        "1..5\n1\n5\ntrue\n1\n5\n[]\n[1]\ntrue\n",
    );
}

#[test]
fn test_bool_null_object() {
    expect_output(
        r#"
System.print(!true)
System.print(!null)
System.print(null)
System.print(true.toString)
System.print(Object.same(1, 1))
System.print(Object.same([], []))
System.print(!"string")
"#,
        "false\ntrue\nnull\ntrue\ntrue\nfalse\nfalse\n",
    );
}

#[test]
fn test_is_requires_class() {
    expect_runtime_error("1 is 2", "Right operand must be a class.");
}

// ============================================================================
// System
// ============================================================================

#[test]
fn test_system_write_functions() {
    expect_output(
        r#"
System.write("a")
System.write(1)
System.print()
System.printAll([1, "b", null])
System.writeAll(["x", "y"])
System.print()
System.print(System.clock >= 0)
"#,
        "a1\n1bnull\nxy\ntrue\n",
    );
}

#[test]
fn test_print_returns_its_argument() {
    expect_output("var x = System.print(\"v\")\nSystem.print(x == \"v\")", "v\ntrue\n");
}

#[test]
fn test_invalid_to_string() {
    expect_output(
        r#"
class Weird {
  construct new() {}
  toString { 42 }
}
System.print(Weird.new())
"#,
        "[invalid toString]\n",
    );
}
