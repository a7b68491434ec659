//! Classes: construction, fields, methods, inheritance and metaclasses

use super::harness::*;

#[test]
fn test_constructor_and_fields() {
    expect_output(
        r#"
class Point {
  construct new(x, y) {
    _x = x
    _y = y
  }
  x { _x }
  y { _y }
  toString { "(%(_x), %(_y))" }
}
var p = Point.new(1, 2)
System.print(p.x + p.y)
System.print(p)
"#,
        "3\n(1, 2)\n",
    );
}

#[test]
fn test_constructor_results_land_in_the_caller() {
    // Empty bodies, a statement call whose result is dropped, and
    // construction nested inside another frame's expression.
    expect_output(
        r#"
class Empty {
  construct new() {}
}
class P {
  construct new(v) { _v = v }
  v { _v }
}
class Pair {
  construct new(a, b) {
    _a = P.new(a)
    _b = P.new(b)
  }
  sum { _a.v + _b.v }
}
Empty.new()
System.print(P.new(42).v)
System.print(Pair.new(1, 2).sum + P.new(3).v)
var list = [P.new(5), Empty.new(), P.new(6)]
System.print(list[0].v + list[2].v)
System.print(list[1] is Empty)
"#,
        "42\n6\n11\ntrue\n",
    );
}

#[test]
fn test_setters_and_operators() {
    expect_output(
        r#"
class Vec {
  construct new(x, y) {
    _x = x
    _y = y
  }
  x { _x }
  x=(value) { _x = value }
  +(other) { Vec.new(_x + other.x, _y + other.y) }
  - { Vec.new(-_x, -_y) }
  [index] { index == 0 ? _x : _y }
  y { _y }
}
var v = Vec.new(1, 2) + Vec.new(10, 20)
v.x = 100
System.print(v[0])
System.print(v[1])
System.print((-v).x)
"#,
        "100\n22\n-100\n",
    );
}

#[test]
fn test_inherited_fields_do_not_collide() {
    expect_output(
        r#"
class Base {
  construct new() { _a = "base" }
  a { _a }
}
class Derived is Base {
  construct new() {
    super()
    _b = "derived"
  }
  b { _b }
}
var d = Derived.new()
System.print(d.a)
System.print(d.b)
"#,
        "base\nderived\n",
    );
}

#[test]
fn test_super_calls_and_overrides() {
    expect_output(
        r#"
class Animal {
  construct new(name) { _name = name }
  name { _name }
  speak() { "%(name) makes a sound" }
}
class Dog is Animal {
  construct new(name) { super(name) }
  speak() { super.speak() + ", woof" }
}
System.print(Dog.new("Rex").speak())
"#,
        "Rex makes a sound, woof\n",
    );
}

#[test]
fn test_static_methods_and_fields() {
    expect_output(
        r#"
class Counter {
  static next() {
    if (__count == null) __count = 0
    __count = __count + 1
    return __count
  }
}
Counter.next()
Counter.next()
System.print(Counter.next())
"#,
        "3\n",
    );
}

#[test]
fn test_is_and_type() {
    expect_output(
        r#"
class A {
  construct new() {}
}
class B is A {
  construct new() {}
}
var b = B.new()
System.print(b is A)
System.print(b is B)
System.print(A.new() is B)
System.print(b.type)
System.print(B.supertype)
System.print(1 is Num)
System.print("s" is Object)
"#,
        "true\ntrue\nfalse\nB\nA\ntrue\ntrue\n",
    );
}

#[test]
fn test_metaclass_chain() {
    expect_output(
        r#"
class Foo {}
System.print(Foo.type)
System.print(Foo.type.type)
System.print(Object.type)
System.print(Class.type)
System.print(Class.supertype)
"#,
        "Foo metaclass\nClass\nObject metaclass\nClass\nObject\n",
    );
}

#[test]
fn test_default_to_string() {
    expect_output(
        r#"
class Thing {
  construct new() {}
}
System.print(Thing.new())
"#,
        "instance of Thing\n",
    );
}

#[test]
fn test_method_overloading_by_arity() {
    expect_output(
        r#"
class Greeter {
  static greet() { "hello" }
  static greet(name) { "hello %(name)" }
  static greet(a, b) { "hello %(a) and %(b)" }
}
System.print(Greeter.greet())
System.print(Greeter.greet("bob"))
System.print(Greeter.greet("bob", "ann"))
"#,
        "hello\nhello bob\nhello bob and ann\n",
    );
}

#[test]
fn test_class_attributes() {
    expect_output(
        r#"
#!runtime = 1
#!group(key = "value")
#ignored
class Tagged {
  #!method
  run() {}
}
System.print(Tagged.attributes.self[null]["runtime"])
System.print(Tagged.attributes.self["group"]["key"])
System.print(Tagged.attributes.methods["run()"].containsKey(null))
"#,
        "[1]\n[value]\ntrue\n",
    );
}

#[test]
fn test_inheriting_from_builtin_is_an_error() {
    expect_runtime_error("class MyList is List {}", "Class 'MyList' cannot inherit from built-in class 'List'.");
}

#[test]
fn test_inheriting_from_non_class_is_an_error() {
    expect_runtime_error(
        "var x = 1\nclass Bad is x {}",
        "Class 'Bad' cannot inherit from a non-class object.",
    );
}
