//! Single-pass compiler
//!
//! Turns Wren source straight into bytecode for the VM, with no syntax tree
//! in between. The result is an [`ObjFn`](crate::vm::object::ObjFn) for the
//! module body (or for a single expression, in the REPL's case).

pub mod bytecode;
pub mod error;

#[allow(clippy::module_inception)]
mod compiler;
mod expr;
mod signature;
mod stmt;

pub use bytecode::Opcode;
pub use error::CompileError;

use crate::vm::object::ObjRef;
use crate::vm::Vm;

/// Compile `source` into a function that runs in `module`.
///
/// Variables the source defines at the top level are added to the module as
/// they are declared, and removed again if compilation fails. When
/// `print_errors` is set every error is also passed to the VM's error hook as
/// it is found.
pub(crate) fn compile(
    vm: &mut Vm,
    module: ObjRef,
    source: &str,
    is_expression: bool,
    print_errors: bool,
) -> Result<ObjRef, Vec<CompileError>> {
    compiler::Compiler::new(vm, module, source, print_errors).compile(is_expression)
}
