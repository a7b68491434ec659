//! Stack traces and bytecode disassembly

use std::fmt::{self, Write as _};

use crate::compiler::Opcode;
use crate::vm::builtins::num::format_num;
use crate::vm::object::{Obj, ObjRef};
use crate::vm::value::Value;
use crate::vm::Vm;

/// One frame of a runtime error's stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceEntry {
    /// Module the function belongs to
    pub module: String,
    /// Line being executed
    pub line: u32,
    /// Function or method signature
    pub function: String,
}

impl fmt::Display for StackTraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} line {}] in {}", self.module, self.line, self.function)
    }
}

/// Disassemble a function (or a closure's function) and every function
/// nested in its constants.
///
/// Each line shows the source line (or `|` when unchanged), the offset, the
/// opcode and its operands:
///
/// ```text
/// == (script) ==
///    1  0000  CONSTANT             1 'hello'
///    |  0003  CALL                 1 'print(_)'
/// ```
pub fn disassemble_function(vm: &Vm, function: ObjRef) -> String {
    let function = match vm.heap.obj(function) {
        Obj::Closure(closure) => closure.function,
        _ => function,
    };

    let mut out = String::new();
    let mut pending = vec![function];
    while let Some(function) = pending.pop() {
        if !out.is_empty() {
            out.push('\n');
        }
        disassemble_one(vm, function, &mut out);

        let nested = vm
            .heap
            .func(function)
            .constants
            .iter()
            .rev()
            .filter_map(|c| vm.heap.try_func(*c).map(|_| c.as_obj()));
        pending.extend(nested);
    }
    out
}

fn disassemble_one(vm: &Vm, function: ObjRef, out: &mut String) {
    let func = vm.heap.func(function);
    let _ = writeln!(out, "== {} ==", func.debug.name);

    let mut last_line = None;
    let mut ip = 0;
    while ip < func.code.len() {
        let line = func.line_at(ip);
        if line == last_line {
            out.push_str("   |");
        } else {
            let _ = write!(out, "{:4}", line.unwrap_or(0));
            last_line = line;
        }
        ip = disassemble_instruction(vm, function, ip, out);
        out.push('\n');
    }
}

/// Write one instruction, returning the offset of the next
fn disassemble_instruction(vm: &Vm, function: ObjRef, ip: usize, out: &mut String) -> usize {
    let func = vm.heap.func(function);
    let code = &func.code;
    let byte_at = |i: usize| code.get(i).copied().unwrap_or(0);
    let short_at = |i: usize| u16::from_be_bytes([byte_at(i), byte_at(i + 1)]) as usize;

    let _ = write!(out, "  {:04}  ", ip);
    let Some(op) = Opcode::from_u8(code[ip]) else {
        let _ = write!(out, "<invalid {:#04x}>", code[ip]);
        return ip + 1;
    };
    let _ = write!(out, "{:<18}", op.name());

    let mut next = ip + 1 + op.operand_len();
    match op {
        Opcode::Constant | Opcode::ImportModule | Opcode::ImportVariable => {
            let index = short_at(ip + 1);
            let constant = func.constants.get(index).copied().unwrap_or(Value::NULL);
            let _ = write!(out, "{:5} '{}'", index, describe(vm, constant));
        }
        Opcode::LoadModuleVar | Opcode::StoreModuleVar => {
            let symbol = short_at(ip + 1);
            let module = vm.heap.module(func.module);
            let _ = write!(out, "{:5} '{}'", symbol, module.variable_names.get(symbol).unwrap_or("?"));
        }
        Opcode::Call | Opcode::Super => {
            let argc = byte_at(ip + 1);
            let symbol = short_at(ip + 2);
            let _ = write!(out, "{:5} '{}'", argc, vm.method_names.get(symbol).unwrap_or("?"));
        }
        Opcode::MethodInstance | Opcode::MethodStatic => {
            let symbol = short_at(ip + 1);
            let _ = write!(out, "{:5} '{}'", symbol, vm.method_names.get(symbol).unwrap_or("?"));
        }
        Opcode::Jump | Opcode::JumpIf | Opcode::And | Opcode::Or => {
            let offset = short_at(ip + 1);
            let _ = write!(out, "{:5} to {}", offset, ip + 3 + offset);
        }
        Opcode::Loop => {
            let offset = short_at(ip + 1);
            let _ = write!(out, "{:5} to {}", offset, (ip + 3).saturating_sub(offset));
        }
        Opcode::Closure => {
            let index = short_at(ip + 1);
            let constant = func.constants.get(index).copied().unwrap_or(Value::NULL);
            let _ = write!(out, "{:5} {}", index, describe(vm, constant));

            let num_upvalues = vm.heap.try_func(constant).map_or(0, |f| f.num_upvalues);
            for _ in 0..num_upvalues {
                let kind = if byte_at(next) != 0 { "local" } else { "upvalue" };
                let _ = write!(out, " {} {}", kind, byte_at(next + 1));
                next += 2;
            }
        }
        _ if op.operand_len() == 1 => {
            let _ = write!(out, "{:5}", byte_at(ip + 1));
        }
        _ => {}
    }
    next
}

/// Short description of a constant
fn describe(vm: &Vm, value: Value) -> String {
    if let Some(n) = value.try_num() {
        return format_num(n);
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_bool() {
        return value.as_bool().to_string();
    }
    match vm.heap.obj(value.as_obj()) {
        Obj::String(s) => s.to_str_lossy().into_owned(),
        Obj::Fn(f) => format!("<fn {}>", f.debug.name),
        other => format!("<{:?}>", other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmOptions;

    #[test]
    fn test_stack_trace_entry_display() {
        let entry = StackTraceEntry {
            module: "main".to_string(),
            line: 3,
            function: "foo(_)".to_string(),
        };
        assert_eq!(entry.to_string(), "[main line 3] in foo(_)");
    }

    #[test]
    fn test_disassemble_script() {
        let mut vm = Vm::new(VmOptions::default());
        let closure = vm
            .compile_source("main", "var f = Fn.new { |x| x + 1 }\nSystem.print(f.call(2))", false, false)
            .unwrap();
        let text = disassemble_function(&vm, closure);

        assert!(text.starts_with("== (script) =="));
        assert!(text.contains("CLOSURE"));
        assert!(text.contains("'print(_)'"));
        assert!(text.contains("'call(_)'"));
        assert!(text.contains("END_MODULE"));
        // The block argument is listed after the script.
        assert!(text.contains("== new(_) block argument =="));
    }
}
