//! Colored error output.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects the `NO_COLOR` environment variable and the `--color` flag.

use std::io::{self, IsTerminal, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use wren_engine::ErrorKind;

/// Resolve `ColorChoice` from the CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > whether stderr is a terminal.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    color_choice(
        std::env::var_os("NO_COLOR").is_some(),
        flag,
        io::stderr().is_terminal(),
    )
}

fn color_choice(no_color: bool, flag: Option<&str>, stderr_is_terminal: bool) -> ColorChoice {
    if no_color {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        // termcolor's `Auto` only looks at TERM, so piped output is checked here.
        _ if !stderr_is_terminal => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Format one error hook call the way the CLI prints it
pub fn format_error(kind: ErrorKind, module: Option<&str>, line: i32, message: &str) -> String {
    match kind {
        ErrorKind::Compile => format!("[{} line {}] {}", module.unwrap_or("?"), line, message),
        ErrorKind::Runtime => message.to_string(),
        ErrorKind::StackTrace => format!("[{} line {}] in {}", module.unwrap_or("?"), line, message),
    }
}

/// Writes VM errors to stderr: messages in red, stack frames dimmed
pub struct ErrorPrinter {
    stderr: StandardStream,
}

impl ErrorPrinter {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stderr: StandardStream::stderr(choice),
        }
    }

    /// Print one error hook call
    pub fn report(&mut self, kind: ErrorKind, module: Option<&str>, line: i32, message: &str) {
        let text = format_error(kind, module, line, message);
        let mut spec = ColorSpec::new();
        match kind {
            ErrorKind::Compile | ErrorKind::Runtime => {
                spec.set_fg(Some(Color::Red)).set_bold(true);
            }
            ErrorKind::StackTrace => {
                spec.set_dimmed(true);
            }
        }
        let _ = self.stderr.set_color(&spec);
        let _ = writeln!(self.stderr, "{}", text);
        let _ = self.stderr.reset();
    }

    /// Print a CLI-level problem, like an unreadable file
    pub fn message(&mut self, text: &str) {
        let _ = self.stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(self.stderr, "error: ");
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, "{}", text);
    }
}

/// Script output goes straight to stdout
pub fn write_stdout(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        assert_eq!(
            format_error(ErrorKind::Compile, Some("main"), 3, "Error at 'x': Expect expression."),
            "[main line 3] Error at 'x': Expect expression."
        );
        assert_eq!(format_error(ErrorKind::Runtime, None, -1, "boom"), "boom");
        assert_eq!(
            format_error(ErrorKind::StackTrace, Some("lib/util"), 7, "(script)"),
            "[lib/util line 7] in (script)"
        );
    }

    #[test]
    fn test_color_flag() {
        assert_eq!(color_choice(false, Some("never"), true), ColorChoice::Never);
        assert_eq!(color_choice(false, Some("always"), true), ColorChoice::Always);
        assert_eq!(color_choice(false, None, true), ColorChoice::Auto);
    }

    #[test]
    fn test_no_color_wins() {
        assert_eq!(color_choice(true, Some("always"), true), ColorChoice::Never);
        assert_eq!(color_choice(true, None, true), ColorChoice::Never);
    }

    #[test]
    fn test_piped_stderr_is_plain() {
        assert_eq!(color_choice(false, None, false), ColorChoice::Never);
        assert_eq!(color_choice(false, Some("auto"), false), ColorChoice::Never);
        // An explicit request still colors a pipe.
        assert_eq!(color_choice(false, Some("always"), false), ColorChoice::Always);
    }
}
