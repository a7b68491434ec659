//! Wren VM bytecode definitions

pub mod opcode;

pub use opcode::Opcode;
