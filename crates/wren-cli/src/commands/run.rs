//! `wren run`: run a script file.

use std::path::Path;

use termcolor::ColorChoice;

use super::{create_vm, exit_code, EXIT_NO_INPUT};
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
    let module = module_name_for(file);
    log::info!("running {} as module '{}'", file.display(), module);

    let mut vm = create_vm(root, color);
    let result = vm.interpret(&module, &source);
    Ok(exit_code(&result))
}
