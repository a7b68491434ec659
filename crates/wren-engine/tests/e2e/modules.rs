//! `import` and module variables

use std::cell::RefCell;
use std::rc::Rc;

use wren_engine::{Vm, VmError};

use super::*;

fn expect_modules_output(source: &str, modules: &[(&str, &str)], expected: &str) {
    let output = run_with_modules(source, modules);
    if let Err(error) = &output.result {
        panic!("script failed: {}\nerrors: {:#?}", error, output.errors);
    }
    assert_eq!(output.stdout, expected);
}

#[test]
fn test_import_variables() {
    expect_modules_output(
        r#"
import "shapes" for Square, area
System.print(area.call(Square.new(3)))
"#,
        &[(
            "shapes",
            r#"
class Square {
  construct new(side) { _side = side }
  side { _side }
}
var area = Fn.new { |square| square.side * square.side }
"#,
        )],
        "9\n",
    );
}

#[test]
fn test_import_with_alias() {
    expect_modules_output(
        r#"
var value = "main"
import "other" for value as otherValue
System.print(value)
System.print(otherValue)
"#,
        &[("other", "var value = \"other\"\n")],
        "main\nother\n",
    );
}

#[test]
fn test_module_body_runs_once() {
    expect_modules_output(
        r#"
import "counter"
import "counter" for hits
import "counter"
System.print(hits)
"#,
        &[("counter", "System.print(\"loading\")\nvar hits = 1\n")],
        "loading\n1\n",
    );
}

#[test]
fn test_modules_share_imports() {
    expect_modules_output(
        r#"
import "a"
import "b"
"#,
        &[
            ("a", "import \"shared\"\nSystem.print(\"a\")\n"),
            ("b", "import \"shared\"\nSystem.print(\"b\")\n"),
            ("shared", "System.print(\"shared\")\n"),
        ],
        "shared\na\nb\n",
    );
}

#[test]
fn test_modules_are_isolated() {
    let output = run_with_modules(
        r#"
import "lib"
System.print(secret)
"#,
        &[("lib", "var secret = 1\n")],
    );
    assert!(matches!(output.result, Err(VmError::Compile(_))), "{:?}", output.result);
}

#[test]
fn test_modules_see_core_classes() {
    expect_modules_output(
        "import \"lib\" for described\nSystem.print(described)\n",
        &[("lib", "var described = [1, 2].map { |n| n * 10 }.toList.toString\n")],
        "[10, 20]\n",
    );
}

#[test]
fn test_missing_module() {
    let output = run_with_modules("import \"nowhere\"\n", &[]);
    match output.result {
        Err(VmError::Runtime { message, .. }) => assert_eq!(message, "Could not load module 'nowhere'."),
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_missing_variable() {
    let output = run_with_modules("import \"lib\" for nope\n", &[("lib", "var yes = 1\n")]);
    match output.result {
        Err(VmError::Runtime { message, .. }) => {
            assert_eq!(message, "Could not find a variable named 'nope' in module 'lib'.")
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_module_compile_error() {
    let output = run_with_modules("import \"broken\"\n", &[("broken", "var = 1\n")]);
    match &output.result {
        Err(VmError::Runtime { message, .. }) => assert_eq!(message, "Could not compile module 'broken'."),
        other => panic!("expected runtime error, got {:?}", other),
    }
    // The module's own compile error is reported first.
    assert!(output.errors[0].starts_with("[broken line 1] "), "{:#?}", output.errors);
}

#[test]
fn test_import_cycle() {
    expect_modules_output(
        "import \"a\"\n",
        &[
            ("a", "System.print(\"a start\")\nimport \"b\"\nSystem.print(\"a end\")\n"),
            ("b", "System.print(\"b start\")\nimport \"a\"\nSystem.print(\"b end\")\n"),
        ],
        "a start\nb start\nb end\na end\n",
    );
}

#[test]
fn test_resolve_hook_renames_imports() {
    let stdout = Rc::new(RefCell::new(String::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut options = capturing_options(Rc::clone(&stdout), errors);
    options.resolve_module = Some(Box::new(|importer, name| Some(format!("{}/{}", importer, name))));
    options.load_module = Some(Box::new(|name| match name {
        "main/util" => Some("var where = \"resolved\"\n".to_string()),
        _ => None,
    }));

    let mut vm = Vm::new(options);
    vm.interpret("main", "import \"util\" for where\nSystem.print(where)\n").unwrap();
    assert_eq!(stdout.borrow().as_str(), "resolved\n");
    assert!(vm.has_module("main/util"));
    assert!(vm.has_variable("main/util", "where"));
}

#[test]
fn test_host_reads_module_variables() {
    let stdout = Rc::new(RefCell::new(String::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut vm = Vm::new(capturing_options(stdout, errors));

    vm.interpret("config", "var answer = 42\n").unwrap();
    let answer = vm.get_variable("config", "answer").unwrap();
    assert_eq!(answer.as_num(), 42.0);
    assert!(vm.get_variable("config", "question").is_none());
    assert!(!vm.has_module("elsewhere"));
}
