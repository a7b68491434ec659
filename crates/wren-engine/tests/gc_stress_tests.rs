//! Garbage collection stress tests
//!
//! Scripts run with a tiny heap so collections happen constantly in the
//! middle of allocation-heavy code. A missing root shows up as a wrong
//! result or a panic on a freed slot.
//!
//! ```bash
//! cargo test --test gc_stress_tests
//! cargo test --test gc_stress_tests --features gc-stress
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use wren_engine::{Vm, VmOptions};

/// A VM that collects after every kilobyte or so, printing into `stdout`
fn small_heap_vm(stdout: Rc<RefCell<String>>) -> Vm {
    let mut options = VmOptions::default();
    options.write = Some(Box::new(move |text| stdout.borrow_mut().push_str(text)));
    options.initial_heap_size = 1024;
    options.min_heap_size = 1024;
    options.heap_growth_percent = 10;
    Vm::new(options)
}

fn run_small_heap(source: &str) -> (Vm, String) {
    let stdout = Rc::new(RefCell::new(String::new()));
    let mut vm = small_heap_vm(Rc::clone(&stdout));
    if let Err(error) = vm.interpret("main", source) {
        panic!("script failed: {}\nsource:\n{}", error, source);
    }
    let output = stdout.borrow().clone();
    (vm, output)
}

// ===== Collection basics =====

#[test]
fn test_collect_frees_unreachable_objects() {
    let mut vm = Vm::new(VmOptions::default());
    vm.collect_garbage();
    let baseline = vm.object_count();

    for i in 0..100 {
        vm.new_string(&format!("garbage {}", i));
    }
    assert_eq!(vm.object_count(), baseline + 100);

    vm.collect_garbage();
    assert_eq!(vm.object_count(), baseline);
    assert!(vm.gc_stats().last_freed_count >= 100);
}

#[test]
fn test_handles_keep_values_alive() {
    let mut vm = Vm::new(VmOptions::default());
    let text = vm.new_string("kept");
    let list = vm.new_list(vec![text]);
    let handle = vm.make_handle(list);

    vm.collect_garbage();
    vm.collect_garbage();

    let list = vm.handle_value(&handle).unwrap();
    let elements = vm.list_elements(list).unwrap().to_vec();
    assert_eq!(elements.len(), 1);
    assert_eq!(vm.string_text(elements[0]).as_deref(), Some("kept"));

    let before = vm.object_count();
    vm.release_handle(handle);
    vm.collect_garbage();
    assert_eq!(vm.object_count(), before - 2);
}

#[test]
fn test_module_variables_are_roots() {
    let (mut vm, _) = run_small_heap("var kept = [1, 2, 3].map { |n| \"item %(n)\" }.toList\n");
    vm.collect_garbage();

    let kept = vm.get_variable("main", "kept").unwrap();
    let elements = vm.list_elements(kept).unwrap().to_vec();
    let texts: Vec<_> = elements.iter().filter_map(|value| vm.string_text(*value)).collect();
    assert_eq!(texts, vec!["item 1", "item 2", "item 3"]);
}

#[test]
fn test_stats_count_collections() {
    let (vm, _) = run_small_heap(
        r#"
for (i in 0...2000) {
  var garbage = "string %(i)"
}
"#,
    );
    let stats = vm.gc_stats();
    assert!(stats.collections > 0);
    assert!(stats.objects_freed > 0);
}

#[test]
fn test_system_gc_from_script() {
    let (vm, output) = run_small_heap(
        r#"
var keep = "still here"
System.gc()
System.print(keep)
"#,
    );
    assert_eq!(output, "still here\n");
    assert!(vm.gc_stats().collections > 0);
}

// ===== Allocation-heavy scripts =====

#[test]
fn test_building_lists_under_pressure() {
    let (_, output) = run_small_heap(
        r#"
var lists = []
for (i in 0...200) {
  lists.add([i, "%(i)", [i * 2]])
}
var total = 0
for (entry in lists) total = total + entry[2][0]
System.print(total)
System.print(lists[199][1])
"#,
    );
    assert_eq!(output, "39800\n199\n");
}

#[test]
fn test_maps_under_pressure() {
    let (_, output) = run_small_heap(
        r#"
var map = {}
for (i in 0...300) map["key %(i)"] = [i]
for (i in 0...300) {
  if (i % 2 == 0) map.remove("key %(i)")
}
System.print(map.count)
System.print(map["key 299"][0])
"#,
    );
    assert_eq!(output, "150\n299\n");
}

#[test]
fn test_string_building_under_pressure() {
    let (_, output) = run_small_heap(
        r#"
var text = ""
for (i in 0...100) text = text + "x"
System.print(text.count)
System.print(["a", "b", "c"].join("-") * 2)
"#,
    );
    assert_eq!(output, "100\na-b-ca-b-c\n");
}

#[test]
fn test_instances_and_closures_under_pressure() {
    let (_, output) = run_small_heap(
        r#"
class Node {
  construct new(value, next) {
    _value = value
    _next = next
  }
  value { _value }
  next { _next }
}

var head = null
for (i in 1..100) head = Node.new(i, head)

var makers = []
for (i in 0...50) makers.add(Fn.new { i * 2 })

var sum = 0
var node = head
while (node != null) {
  sum = sum + node.value
  node = node.next
}
System.print(sum)
System.print(makers[49].call())
"#,
    );
    assert_eq!(output, "5050\n98\n");
}

#[test]
fn test_fibers_under_pressure() {
    let (_, output) = run_small_heap(
        r#"
var fibers = []
for (i in 0...20) {
  fibers.add(Fiber.new {
    for (j in 0...3) Fiber.yield("fiber %(i) step %(j)")
  })
}
var count = 0
for (round in 0...3) {
  for (fiber in fibers) {
    if (fiber.call() is String) count = count + 1
  }
}
System.print(count)
"#,
    );
    assert_eq!(output, "60\n");
}

#[test]
fn test_deep_stack_with_open_upvalues() {
    let (_, output) = run_small_heap(
        r#"
class Deep {
  static down(n, captured) {
    var local = "depth %(n)"
    var read = Fn.new { local + captured }
    if (n == 0) return read.call()
    return down(n - 1, captured)
  }
}
System.print(Deep.down(300, "!"))
"#,
    );
    assert_eq!(output, "depth 0!\n");
}

#[test]
fn test_cyclic_garbage_is_collected() {
    let (mut vm, _) = run_small_heap(
        r#"
class Cell {
  construct new() {}
  other=(value) { _other = value }
}
for (i in 0...100) {
  var a = Cell.new()
  var b = Cell.new()
  a.other = b
  b.other = a
}
"#,
    );
    vm.collect_garbage();
    let after_first = vm.object_count();
    vm.collect_garbage();
    assert_eq!(vm.object_count(), after_first);
}
