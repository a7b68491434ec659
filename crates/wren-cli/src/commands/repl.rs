//! `wren repl`: Interactive REPL.
//!
//! One VM lives for the whole session, so variables and classes defined in
//! one input stay visible to the next. Expressions print their value.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use termcolor::ColorChoice;

use super::{create_vm, evaluate};

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = "| ";
const MODULE: &str = "repl";

pub fn execute(color: ColorChoice) -> anyhow::Result<i32> {
    let root = std::env::current_dir()?;
    let mut vm = create_vm(&root, color);
    let mut editor = DefaultEditor::new()?;

    let history_path = dirs::home_dir().map(|home| home.join(".wren_history"));
    if let Some(ref path) = history_path {
        let _ = editor.load_history(path);
    }

    println!("wren v{}", env!("CARGO_PKG_VERSION"));

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION_PROMPT };

        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if is_incomplete(&buffer) {
                    continue;
                }

                let code = std::mem::take(&mut buffer);
                let _ = editor.add_history_entry(code.as_str());

                // Errors were already printed by the error hook.
                if let Ok(Some(text)) = evaluate(&mut vm, MODULE, &code) {
                    println!("{}", text);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C drops a half-typed block.
                if !buffer.is_empty() {
                    buffer.clear();
                }
                println!();
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        }
    }

    if let Some(ref path) = history_path {
        let _ = editor.save_history(path);
    }
    Ok(0)
}

/// Whether `source` has unclosed brackets and needs more lines
fn is_incomplete(source: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '/' if chars.peek() == Some(&'/') => {
                // Line comment: skip to the end of the line.
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    depth > 0 || in_string
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_input() {
        assert!(!is_incomplete("System.print(1)"));
        assert!(!is_incomplete("class Foo {}"));
        assert!(!is_incomplete("var s = \"{\""));
        assert!(!is_incomplete("var x = 1 // {"));
    }

    #[test]
    fn test_incomplete_input() {
        assert!(is_incomplete("class Foo {"));
        assert!(is_incomplete("System.print(\n1"));
        assert!(is_incomplete("var s = \"open"));
        assert!(is_incomplete("if (true) {\n  var x = [1,"));
    }

    #[test]
    fn test_extra_closers_are_complete() {
        // Let the compiler report it.
        assert!(!is_incomplete("}"));
    }
}
