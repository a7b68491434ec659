//! End-to-end tests for the Wren engine
//!
//! Each test runs a script through a fresh VM and checks what it printed,
//! or which error it stopped with.

mod harness;

mod builtins;
mod classes;
mod closures;
mod control_flow;
mod errors;
mod fibers;
mod modules;

pub use harness::*;
