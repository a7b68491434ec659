//! Integration tests for the `wren` binary.
//!
//! Scripts are written into a temporary directory and run through the real
//! executable, checking stdout, stderr and the exit status.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn wren(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wren"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch wren")
}

fn write_script(dir: &TempDir, name: &str, source: &str) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, source).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// wren run
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_run_prints_output() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "main.wren", "System.print(\"Hello, %(\"world\")!\")\n");

    let output = wren(&["run", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "Hello, world!\n");
}

#[test]
fn test_run_follows_imports() {
    let dir = TempDir::new().unwrap();
    write_script(
        &dir,
        "main.wren",
        "import \"lib/shapes\" for Square\nSystem.print(Square.new(4).area)\n",
    );
    write_script(
        &dir,
        "lib/shapes.wren",
        r#"
import "./units" for Unit
class Square {
  construct new(side) { _side = side }
  area { "%(_side * _side) %(Unit)" }
}
"#,
    );
    write_script(&dir, "lib/units.wren", "var Unit = \"cm2\"\n");

    let output = wren(&["run", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "16 cm2\n");
}

#[test]
fn test_run_missing_import() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "main.wren", "import \"nowhere\"\n");

    let output = wren(&["run", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(70));
    assert!(stderr(&output).contains("Could not load module 'nowhere'."));
}

#[test]
fn test_run_compile_error() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "main.wren", "System.print(\"never\")\nvar = 3\n");

    let output = wren(&["run", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("[main line 2] Error at '='"), "stderr: {}", stderr(&output));
}

#[test]
fn test_run_runtime_error_prints_stack_trace() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "main.wren", "System.print(\"before\")\n1.nope\n");

    let output = wren(&["run", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(70));
    assert_eq!(stdout(&output), "before\n");
    let errors = stderr(&output);
    assert!(errors.contains("Num does not implement 'nope'."), "stderr: {}", errors);
    assert!(errors.contains("[main line 2] in (script)"), "stderr: {}", errors);
}

#[test]
fn test_run_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = wren(&["run", "absent.wren"], dir.path());
    assert_eq!(output.status.code(), Some(66));
    assert!(stderr(&output).contains("absent.wren"));
}

// ────────────────────────────────────────────────────────────────────────────
// wren eval
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_eval_expression_prints_value() {
    let dir = TempDir::new().unwrap();
    let output = wren(&["eval", "[1, 2, 3].map { |n| n * n }.toList"], dir.path());
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "[1, 4, 9]\n");
}

#[test]
fn test_eval_statements() {
    let dir = TempDir::new().unwrap();
    let output = wren(&["eval", "var x = 20\nSystem.print(x + 1)"], dir.path());
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "21\n");
}

#[test]
fn test_eval_runtime_error() {
    let dir = TempDir::new().unwrap();
    let output = wren(&["eval", "Fiber.abort(\"stop\")"], dir.path());
    assert_eq!(output.status.code(), Some(70));
    assert!(stderr(&output).contains("stop"));
}

// ────────────────────────────────────────────────────────────────────────────
// wren disasm
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_disasm_lists_functions() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "main.wren", "var add = Fn.new { |a, b| a + b }\nSystem.print(add.call(1, 2))\n");

    let output = wren(&["disasm", "main.wren"], dir.path());
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let listing = stdout(&output);
    assert!(listing.contains("== (script) =="), "{}", listing);
    assert!(listing.contains("block argument"), "{}", listing);
    // Compiling does not run anything.
    assert!(!listing.contains("\n3\n"));
}
