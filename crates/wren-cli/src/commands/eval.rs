//! `wren eval`: run a snippet, printing the value if it is an expression.

use termcolor::ColorChoice;

use super::{create_vm, evaluate, EXIT_COMPILE_ERROR, EXIT_RUNTIME_ERROR};
use wren_engine::VmError;

pub fn execute(code: &str, color: ColorChoice) -> anyhow::Result<i32> {
    let root = std::env::current_dir()?;
    let mut vm = create_vm(&root, color);

    match evaluate(&mut vm, "main", code) {
        Ok(Some(text)) => {
            println!("{}", text);
            Ok(0)
        }
        Ok(None) => Ok(0),
        Err(VmError::Compile(_)) => Ok(EXIT_COMPILE_ERROR),
        Err(VmError::Runtime { .. }) => Ok(EXIT_RUNTIME_ERROR),
    }
}
