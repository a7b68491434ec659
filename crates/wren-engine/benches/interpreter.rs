use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wren_engine::{Lexer, Vm, VmOptions};

const FIB: &str = r#"
class Fib {
  static get(n) {
    if (n < 2) return n
    return get(n - 1) + get(n - 2)
  }
}
Fib.get(20)
"#;

const LOOPS: &str = r#"
var total = 0
for (i in 0...100000) total = total + i
var j = 0
while (j < 100000) j = j + 1
"#;

const METHOD_CALLS: &str = r#"
class Toggle {
  construct new(state) { _state = state }
  value { _state }
  activate() {
    _state = !_state
    return this
  }
}
var toggle = Toggle.new(true)
for (i in 0...50000) toggle.activate().value
"#;

const STRINGS_AND_LISTS: &str = r#"
var list = []
for (i in 0...500) list.add("item %(i)")
var map = {}
for (item in list) map[item] = item.count
list.sort { |a, b| a.count > b.count }.join(",")
"#;

fn run(source: &str) {
    let mut vm = Vm::new(VmOptions::default());
    vm.interpret("main", source).unwrap();
}

fn bench_scripts(c: &mut Criterion) {
    let mut group = c.benchmark_group("scripts");
    group.sample_size(20);

    for (name, source) in [
        ("fib", FIB),
        ("loops", LOOPS),
        ("method_calls", METHOD_CALLS),
        ("strings_and_lists", STRINGS_AND_LISTS),
    ] {
        group.bench_with_input(BenchmarkId::new("interpret", name), &source, |b, source| {
            b.iter(|| run(black_box(source)));
        });
    }
    group.finish();
}

fn bench_startup(c: &mut Criterion) {
    c.bench_function("vm_new", |b| {
        b.iter(|| Vm::new(VmOptions::default()));
    });
}

fn bench_lexer(c: &mut Criterion) {
    c.bench_function("lex_method_calls", |b| {
        b.iter(|| Lexer::new(black_box(METHOD_CALLS)).tokenize());
    });
}

criterion_group!(benches, bench_scripts, bench_startup, bench_lexer);
criterion_main!(benches);
