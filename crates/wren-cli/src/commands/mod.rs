//! Subcommands

pub mod disasm;
pub mod eval;
pub mod repl;
pub mod run;

use std::path::Path;

use termcolor::ColorChoice;
use wren_engine::{Vm, VmError, VmOptions};

use crate::loader::ModuleLoader;
use crate::output::{self, ErrorPrinter};

/// Exit status for a script that failed to compile (`EX_DATAERR`)
pub const EXIT_COMPILE_ERROR: i32 = 65;

/// Exit status for an uncaught runtime error (`EX_SOFTWARE`)
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Exit status for a missing input file (`EX_NOINPUT`)
pub const EXIT_NO_INPUT: i32 = 66;

/// A VM printing to stdout, reporting errors to stderr and loading modules
/// from `root`
pub fn create_vm(root: &Path, color: ColorChoice) -> Vm {
    let mut options = VmOptions::default();
    options.write = Some(Box::new(output::write_stdout));

    let mut printer = ErrorPrinter::new(color);
    options.error = Some(Box::new(move |kind, module, line, message| {
        printer.report(kind, module, line, message)
    }));

    ModuleLoader::new(root).install(&mut options);
    Vm::new(options)
}

/// Exit status for the outcome of running a script
pub fn exit_code(result: &Result<(), VmError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(VmError::Compile(_)) => EXIT_COMPILE_ERROR,
        Err(VmError::Runtime { .. }) => EXIT_RUNTIME_ERROR,
    }
}

/// Evaluate `source` in `module`, the way the REPL does: an expression's
/// value is returned so it can be printed, while statements just run.
///
/// Compile errors are reported only when `source` is not an expression
/// either.
pub fn evaluate(vm: &mut Vm, module: &str, source: &str) -> Result<Option<String>, VmError> {
    match vm.interpret_expression(module, source) {
        Ok(value) if value.is_null() => Ok(None),
        Ok(value) => vm.to_display_string(value).map(Some),
        Err(VmError::Compile(_)) => vm.interpret(module, source).map(|()| None),
        Err(error) => Err(error),
    }
}
