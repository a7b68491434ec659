//! Test harness: run scripts and capture their output and errors

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wren_engine::{ErrorKind, Vm, VmError, VmOptions};

/// Everything a script run produced
#[derive(Debug)]
pub struct RunOutput {
    /// Text written through `System.print` and friends
    pub stdout: String,
    /// Lines passed to the error hook, formatted like the CLI prints them
    pub errors: Vec<String>,
    /// What `interpret` returned
    pub result: Result<(), VmError>,
}

/// Options with output captured into `stdout` and errors into `errors`
pub fn capturing_options(stdout: Rc<RefCell<String>>, errors: Rc<RefCell<Vec<String>>>) -> VmOptions {
    let mut options = VmOptions::default();
    options.write = Some(Box::new(move |text| stdout.borrow_mut().push_str(text)));
    options.error = Some(Box::new(move |kind, module, line, message| {
        let line = match kind {
            ErrorKind::Compile => format!("[{} line {}] {}", module.unwrap_or("?"), line, message),
            ErrorKind::Runtime => message.to_string(),
            ErrorKind::StackTrace => format!("[{} line {}] in {}", module.unwrap_or("?"), line, message),
        };
        errors.borrow_mut().push(line);
    }));
    options
}

/// Run `source` as the `main` module, with `modules` available to `import`
pub fn run_with_modules(source: &str, modules: &[(&str, &str)]) -> RunOutput {
    let stdout = Rc::new(RefCell::new(String::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));

    let mut options = capturing_options(Rc::clone(&stdout), Rc::clone(&errors));
    let sources: HashMap<String, String> = modules
        .iter()
        .map(|(name, source)| (name.to_string(), source.to_string()))
        .collect();
    options.load_module = Some(Box::new(move |name| sources.get(name).cloned()));

    let mut vm = Vm::new(options);
    let result = vm.interpret("main", source);
    drop(vm);

    let stdout = stdout.borrow().clone();
    let errors = errors.borrow().clone();
    RunOutput { stdout, errors, result }
}

/// Run `source` as the `main` module
pub fn run(source: &str) -> RunOutput {
    run_with_modules(source, &[])
}

/// Run `source` and expect it to succeed printing exactly `expected`
pub fn expect_output(source: &str, expected: &str) {
    let output = run(source);
    if let Err(error) = &output.result {
        panic!(
            "script failed: {}\nerrors: {:#?}\nsource:\n{}",
            error, output.errors, source
        );
    }
    assert_eq!(output.stdout, expected, "wrong output for:\n{}", source);
}

/// Run `source` and expect an uncaught runtime error with `message`
pub fn expect_runtime_error(source: &str, message: &str) -> RunOutput {
    let output = run(source);
    match &output.result {
        Err(VmError::Runtime { message: actual, .. }) => {
            assert_eq!(actual, message, "wrong error for:\n{}", source);
        }
        other => panic!("expected runtime error '{}', got {:?}\nsource:\n{}", message, other, source),
    }
    output
}

/// Run `source` and expect a compile error whose message contains `fragment`
pub fn expect_compile_error(source: &str, fragment: &str) -> RunOutput {
    let output = run(source);
    match &output.result {
        Err(VmError::Compile(errors)) => {
            assert!(
                errors.iter().any(|e| e.message.contains(fragment)),
                "no compile error containing '{}' in {:#?}\nsource:\n{}",
                fragment,
                errors,
                source
            );
        }
        other => panic!("expected compile error '{}', got {:?}\nsource:\n{}", fragment, other, source),
    }
    output
}
