//! `wren disasm`: print the bytecode of a script and its functions.

use std::path::Path;

use termcolor::ColorChoice;
use wren_engine::disassemble_function;

use super::{create_vm, EXIT_COMPILE_ERROR, EXIT_NO_INPUT};
use crate::loader::module_name_for;
use crate::output::ErrorPrinter;

pub fn execute(file: &Path, color: ColorChoice) -> anyhow::Result<i32> {
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(error) => {
            ErrorPrinter::new(color).message(&format!("Could not read {}: {}", file.display(), error));
            return Ok(EXIT_NO_INPUT);
        }
    };

    let root = file.parent().unwrap_or(Path::new("."));
    let mut vm = create_vm(root, color);

    // Imports are not followed: only this file is compiled.
    match vm.compile_source(&module_name_for(file), &source, false, true) {
        Ok(closure) => {
            print!("{}", disassemble_function(&vm, closure));
            Ok(0)
        }
        Err(_) => Ok(EXIT_COMPILE_ERROR),
    }
}
