//! Wren Language Engine
//!
//! This crate provides a complete, embeddable implementation of the Wren
//! scripting language:
//! - **Parser**: logos-backed lexer with string interpolation (`parser` module)
//! - **Compiler**: single-pass Pratt compiler straight to bytecode (`compiler` module)
//! - **VM**: NaN-tagged values, arena heap, mark/sweep GC, fibers, and the
//!   core library (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use wren_engine::{Vm, VmOptions};
//!
//! let mut options = VmOptions::default();
//! options.write = Some(Box::new(|text| print!("{}", text)));
//!
//! let mut vm = Vm::new(options);
//! vm.interpret("main", r#"
//!     class Greeter {
//!         construct new(name) { _name = name }
//!         greet() { "Hello, %(_name)!" }
//!     }
//!     System.print(Greeter.new("world").greet())
//! "#)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

// ============================================================================
// Core Modules
// ============================================================================

/// Parser module: tokens and the lexer
pub mod parser;

/// Compiler module: single-pass bytecode compiler
pub mod compiler;

/// VM module: values, heap, GC, fibers, interpreter and core library
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use compiler::{CompileError, Opcode};
pub use parser::{Lexer, Token, TokenKind};
pub use vm::{
    disassemble_function, ErrorKind, ForeignClassMethods, ForeignMethodFn, GcStats, Handle,
    ObjRef, SlotType, StackTraceEntry, Value, Vm, VmError, VmOptions, VmResult,
};
