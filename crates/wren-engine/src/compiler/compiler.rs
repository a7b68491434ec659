//! Compiler state, token stream handling and bytecode emission
//!
//! The compiler makes a single pass over the token stream. Functions being
//! compiled form a stack of [`FnCompiler`] frames: the module body at the
//! bottom, then any enclosing class bodies, methods and block arguments on
//! top. Grammar rules live in `expr.rs` and `stmt.rs`; this file holds the
//! machinery they share.

use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::bytecode::Opcode;
use super::error::{CompileError, ErrorLabel};
use super::signature::Signature;
use super::stmt::Attributes;
use crate::parser::{Lexer, Span, Token, TokenKind};
use crate::vm::defaults::{MAX_CONSTANTS, MAX_LOCALS, MAX_MODULE_VARS, MAX_UPVALUES, MAX_VARIABLE_NAME};
use crate::vm::object::{FnDebug, Obj, ObjFn, ObjRef, ObjString};
use crate::vm::symbol::SymbolTable;
use crate::vm::value::Value;
use crate::vm::{ErrorKind, Vm};

/// A local variable in scope
#[derive(Debug, Clone)]
pub(super) struct Local {
    /// Name; `this` for a method's receiver, empty for a function's
    pub name: String,

    /// Scope depth the local was declared at
    pub depth: i32,

    /// Whether a closure captures it, so leaving scope must close it
    pub is_upvalue: bool,
}

/// A variable captured by the function being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CompilerUpvalue {
    /// Captures a local of the enclosing function rather than one of its upvalues
    pub is_local: bool,

    /// Slot or upvalue index in the enclosing function
    pub index: usize,
}

/// An enclosing loop
#[derive(Debug, Clone)]
pub(super) struct Loop {
    /// Offset of the first instruction of the condition
    pub start: usize,

    /// Operand offset of the jump that exits the loop
    pub exit_jump: usize,

    /// Scope depth of the loop itself; locals deeper than this belong to the body
    pub scope_depth: i32,

    /// Operand offsets of `break` jumps to patch at the end
    pub breaks: Vec<usize>,
}

/// Bookkeeping for the class whose body is being compiled
#[derive(Debug, Clone)]
pub(super) struct ClassInfo {
    /// Class name, for error messages
    pub name: String,

    /// Fields referenced so far, in slot order
    pub fields: SymbolTable,

    /// Instance method symbols defined so far
    pub methods: Vec<usize>,

    /// Static method symbols defined so far
    pub static_methods: Vec<usize>,

    /// Declared with `foreign class`
    pub is_foreign: bool,

    /// Currently compiling a static method
    pub in_static: bool,

    /// Signature of the method being compiled
    pub signature: Option<Signature>,

    /// Runtime attributes on the class itself
    pub class_attributes: Option<Attributes>,

    /// Runtime attributes of each method, keyed by decorated signature
    pub method_attributes: Vec<(String, Attributes)>,
}

/// A resolved variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Variable {
    /// Stack slot in the current function
    Local(usize),
    /// Upvalue index in the current function
    Upvalue(usize),
    /// Module variable symbol
    Module(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Num(u64),
    Str(Vec<u8>),
}

/// Per-function compilation state
#[derive(Debug)]
pub(super) struct FnCompiler {
    pub locals: Vec<Local>,
    pub upvalues: Vec<CompilerUpvalue>,

    /// -1 at module level, otherwise the block nesting depth
    pub scope_depth: i32,

    /// Stack slots in use at the current instruction
    pub num_slots: i32,

    /// High-water mark of `num_slots`
    pub max_slots: i32,

    pub loops: Vec<Loop>,

    /// Set while this function is compiling a class body
    pub class: Option<ClassInfo>,

    /// Compiling a `construct` method: bare `return` yields `this`
    pub is_initializer: bool,

    pub arity: usize,

    code: Vec<u8>,
    lines: Vec<u32>,
    constants: Vec<Value>,
    constant_index: FxHashMap<ConstantKey, usize>,
}

impl FnCompiler {
    fn new(is_method: bool, scope_depth: i32) -> Self {
        // Slot 0 holds the receiver or the closure itself. Only methods can
        // name it, as `this`.
        let receiver = Local {
            name: if is_method { "this".to_string() } else { String::new() },
            depth: -1,
            is_upvalue: false,
        };
        Self {
            locals: vec![receiver],
            upvalues: Vec::new(),
            scope_depth,
            num_slots: 1,
            max_slots: 1,
            loops: Vec::new(),
            class: None,
            is_initializer: false,
            arity: 0,
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
            constant_index: FxHashMap::default(),
        }
    }
}

/// Whether a name starts lowercase, which makes a bare use inside a class a
/// call on `this`
pub(super) fn is_local_name(name: &str) -> bool {
    name.as_bytes().first().is_some_and(u8::is_ascii_lowercase)
}

/// Token text for an error label, shortened if very long
fn label_text(text: &str) -> String {
    if text.len() <= MAX_VARIABLE_NAME {
        return text.to_string();
    }
    let mut end = MAX_VARIABLE_NAME;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Single-pass compiler for one module or expression
pub(crate) struct Compiler<'src, 'vm> {
    pub(super) vm: &'vm mut Vm,
    pub(super) module: ObjRef,
    module_name: String,
    pub(super) source: &'src str,
    lexer: Lexer<'src>,

    pub(super) previous: Token,
    pub(super) current: Token,
    pub(super) next: Token,

    /// Functions being compiled, innermost last
    pub(super) frames: Vec<FnCompiler>,

    errors: Vec<CompileError>,
    print_errors: bool,

    /// Runtime attributes parsed but not yet attached
    pub(super) attributes: Attributes,

    /// Attributes of any kind parsed but not yet attached
    pub(super) num_attributes: usize,

    /// Module variables used before any definition, with the line of first use
    implicit: BTreeMap<usize, u32>,
}

impl<'src, 'vm> Compiler<'src, 'vm> {
    /// Prepare to compile `source` into `module`
    pub(crate) fn new(vm: &'vm mut Vm, module: ObjRef, source: &'src str, print_errors: bool) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let module_name = match vm.heap.module(module).name {
            Some(name) => vm.heap.str_lossy(name),
            None => "core".to_string(),
        };
        let placeholder = Token::new(TokenKind::Eof, Span::default());

        Self {
            vm,
            module,
            module_name,
            source,
            lexer: Lexer::new(source),
            previous: placeholder.clone(),
            current: placeholder.clone(),
            next: placeholder,
            frames: Vec::new(),
            errors: Vec::new(),
            print_errors,
            attributes: Attributes::default(),
            num_attributes: 0,
            implicit: BTreeMap::new(),
        }
    }

    /// Compile the whole source. In expression mode the source must be a
    /// single expression whose value the function returns.
    pub(crate) fn compile(mut self, is_expression: bool) -> Result<ObjRef, Vec<CompileError>> {
        let roots_base = self.vm.compiler_roots.len();
        let variables_base = self.vm.heap.module(self.module).variables.len();

        // Fill `current` and `next`.
        self.advance();
        self.advance();

        self.frames.push(FnCompiler::new(false, -1));
        self.ignore_newlines();

        if is_expression {
            self.expression();
            self.ignore_newlines();
            self.consume(TokenKind::Eof, "Expect end of expression.");
        } else {
            while !self.match_token(TokenKind::Eof) {
                self.definition();

                // Without a newline, this has to be the end of the file.
                if !self.match_line() {
                    self.consume(TokenKind::Eof, "Expect end of file.");
                    break;
                }
            }
            self.emit_op(Opcode::EndModule);
        }
        self.emit_op(Opcode::Return);

        self.report_undefined_variables();
        let function = self.end_compiler("(script)");
        self.vm.compiler_roots.truncate(roots_base);

        match function {
            Some(function) if self.errors.is_empty() => {
                log::debug!("compiled module '{}'", self.module_name);
                Ok(function)
            }
            _ => {
                // Forget the variables this compile declared so a later
                // attempt can define them again.
                let module = self.vm.heap.module_mut(self.module);
                module.variables.truncate(variables_base);
                module.variable_names.truncate(variables_base);
                Err(self.errors)
            }
        }
    }

    // ========================================================================
    // Token stream
    // ========================================================================

    /// Shift the token window forward by one
    pub(super) fn advance(&mut self) {
        let next = self.lexer.next_token();
        for error in self.lexer.take_errors() {
            self.report(ErrorLabel::Lexer, error.line, &error.message);
        }
        let current = std::mem::replace(&mut self.next, next);
        self.previous = std::mem::replace(&mut self.current, current);
    }

    /// Kind of the token about to be consumed
    #[inline]
    pub(super) fn peek(&self) -> TokenKind {
        self.current.kind
    }

    /// Text of the most recently consumed token
    pub(super) fn previous_text(&self) -> &'src str {
        self.previous.text(self.source)
    }

    /// Consume the current token if it is `kind`
    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.current.kind != kind {
            return false;
        }
        self.advance();
        true
    }

    /// Consume a token of `kind`, reporting `message` otherwise
    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) {
        self.advance();
        if self.previous.kind != kind {
            self.error(message);

            // If the token we wanted is next, the one before it was probably
            // just spurious. Skip it to avoid cascading errors.
            if self.current.kind == kind {
                self.advance();
            }
        }
    }

    /// Consume one or more newlines. Returns whether any were found.
    pub(super) fn match_line(&mut self) -> bool {
        if !self.match_token(TokenKind::Line) {
            return false;
        }
        while self.match_token(TokenKind::Line) {}
        true
    }

    /// Skip any newlines
    #[inline]
    pub(super) fn ignore_newlines(&mut self) {
        self.match_line();
    }

    /// Require a newline, then skip any that follow
    pub(super) fn consume_line(&mut self, message: &str) {
        self.consume(TokenKind::Line, message);
        self.ignore_newlines();
    }

    /// Let a method chain continue on the next line: `foo\n  .bar`
    pub(super) fn allow_line_before_dot(&mut self) {
        if self.current.kind == TokenKind::Line && self.next.kind == TokenKind::Dot {
            self.advance();
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Report `message` at the previous token
    pub(super) fn error(&mut self, message: &str) {
        let span = self.previous.span;
        match self.previous.kind {
            // The lexer already reported why this token is bad.
            TokenKind::Error => {}
            TokenKind::Line => self.report(ErrorLabel::Newline, span.line, message),
            TokenKind::Eof => self.report(ErrorLabel::EndOfFile, span.line, message),
            _ => {
                let text = label_text(self.previous_text());
                self.report(ErrorLabel::Token(&text), span.line, message);
            }
        }
    }

    fn report(&mut self, label: ErrorLabel<'_>, line: u32, message: &str) {
        let message = format!("{}: {}", label, message);
        if self.print_errors {
            self.vm
                .report_error(ErrorKind::Compile, Some(&self.module_name), line as i32, &message);
        }
        self.errors.push(CompileError {
            module: self.module_name.clone(),
            line,
            message,
        });
    }

    /// Whether any error has been reported so far
    #[inline]
    pub(super) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn report_undefined_variables(&mut self) {
        let implicit = std::mem::take(&mut self.implicit);
        for (symbol, line) in implicit {
            let name = self.vm.heap.module(self.module).variable_names.name(symbol).to_string();
            let text = label_text(&name);
            self.report(ErrorLabel::Token(&text), line, "Variable is used but not defined.");
        }
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Index of the innermost function
    #[inline]
    pub(super) fn top(&self) -> usize {
        self.frames.len() - 1
    }

    #[inline]
    pub(super) fn frame(&self) -> &FnCompiler {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("no function is being compiled"),
        }
    }

    #[inline]
    pub(super) fn frame_mut(&mut self) -> &mut FnCompiler {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("no function is being compiled"),
        }
    }

    /// Start compiling a nested function or method
    pub(super) fn push_frame(&mut self, is_method: bool) {
        self.frames.push(FnCompiler::new(is_method, 0));
    }

    /// Frame index of the innermost class body, if any
    pub(super) fn enclosing_class_frame(&self) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.class.is_some())
    }

    /// The innermost class being compiled
    pub(super) fn enclosing_class_mut(&mut self) -> Option<&mut ClassInfo> {
        self.frames.iter_mut().rev().find_map(|frame| frame.class.as_mut())
    }

    /// Finish the innermost function, allocate it, and in the enclosing
    /// function emit the code that wraps it in a closure.
    ///
    /// Returns `None` once any error has been reported.
    pub(super) fn end_compiler(&mut self, debug_name: &str) -> Option<ObjRef> {
        if self.has_errors() {
            self.frames.pop();
            return None;
        }

        // Functions may return early, so END marks where the code stops.
        self.emit_op(Opcode::End);

        let frame = self.frames.pop()?;
        let function = ObjFn {
            code: Rc::from(frame.code),
            constants: frame.constants,
            module: self.module,
            max_slots: frame.max_slots.max(1) as usize,
            num_upvalues: frame.upvalues.len(),
            arity: frame.arity,
            debug: FnDebug {
                name: debug_name.to_string(),
                source_lines: frame.lines,
            },
        };
        let function = self.vm.allocate(None, Obj::Fn(function));
        self.vm.compiler_roots.push(function);

        if !self.frames.is_empty() {
            let constant = self.push_constant(None, Value::from(function));
            self.emit_short_arg(Opcode::Closure, constant);
            for upvalue in &frame.upvalues {
                self.emit_byte(upvalue.is_local as u8);
                self.emit_byte(upvalue.index as u8);
            }
        }
        Some(function)
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Offset where the next byte will be written
    #[inline]
    pub(super) fn code_len(&self) -> usize {
        self.frame().code.len()
    }

    /// Write a raw byte into `frame`, returning its offset
    pub(super) fn emit_byte_to(&mut self, frame: usize, byte: u8) -> usize {
        let line = self.previous.line();
        let frame = &mut self.frames[frame];
        frame.code.push(byte);
        frame.lines.push(line);
        frame.code.len() - 1
    }

    /// Write a raw byte without tracking its stack effect
    #[inline]
    pub(super) fn emit_byte(&mut self, byte: u8) -> usize {
        let top = self.top();
        self.emit_byte_to(top, byte)
    }

    /// Write a big-endian operand
    pub(super) fn emit_short(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.emit_byte(hi);
        self.emit_byte(lo);
    }

    /// Write an opcode into `frame`, tracking its stack effect
    pub(super) fn emit_op_to(&mut self, frame: usize, op: Opcode) -> usize {
        let offset = self.emit_byte_to(frame, op.to_u8());
        self.adjust_slots(frame, op.stack_effect());
        offset
    }

    /// Write an opcode, tracking its stack effect
    pub(super) fn emit_op(&mut self, op: Opcode) -> usize {
        let top = self.top();
        self.emit_op_to(top, op)
    }

    /// Write an opcode with a one-byte operand. Returns the operand's offset.
    pub(super) fn emit_byte_arg(&mut self, op: Opcode, arg: u8) -> usize {
        self.emit_op(op);
        self.emit_byte(arg)
    }

    /// Write an opcode with a two-byte operand
    pub(super) fn emit_short_arg(&mut self, op: Opcode, arg: usize) {
        self.emit_op(op);
        self.emit_short(arg as u16);
    }

    pub(super) fn adjust_slots(&mut self, frame: usize, delta: i32) {
        let frame = &mut self.frames[frame];
        frame.num_slots += delta;
        frame.max_slots = frame.max_slots.max(frame.num_slots);
    }

    /// Overwrite one already emitted byte
    pub(super) fn patch_byte(&mut self, offset: usize, byte: u8) {
        self.frame_mut().code[offset] = byte;
    }

    /// Emit a forward jump with a placeholder offset. Returns the operand
    /// offset for [`patch_jump`](Self::patch_jump).
    pub(super) fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff) - 1
    }

    /// Point the jump whose operand is at `offset` to the current position
    pub(super) fn patch_jump(&mut self, offset: usize) {
        let jump = self.code_len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let [hi, lo] = (jump as u16).to_be_bytes();
        let code = &mut self.frame_mut().code;
        code[offset] = hi;
        code[offset + 1] = lo;
    }

    /// Jump back to the start of the innermost loop
    pub(super) fn emit_loop(&mut self) {
        let Some(start) = self.frame().loops.last().map(|l| l.start) else {
            return;
        };
        self.emit_op(Opcode::Loop);
        let offset = self.code_len() + 2 - start;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_short(offset as u16);
    }

    /// Emit `CALL`/`SUPER` for a method symbol with `arity` arguments
    pub(super) fn emit_call(&mut self, op: Opcode, arity: usize, symbol: usize) {
        self.emit_op(op);
        self.emit_byte(arity as u8);
        self.emit_short(symbol as u16);
        let top = self.top();
        self.adjust_slots(top, -(arity as i32));
    }

    /// Method symbol for `signature`
    pub(super) fn signature_symbol(&mut self, signature: &Signature) -> usize {
        self.vm.method_names.ensure(&signature.to_string())
    }

    /// Call the method named by `signature`
    pub(super) fn call_signature(&mut self, op: Opcode, signature: &Signature) {
        let symbol = self.signature_symbol(signature);
        self.emit_call(op, signature.arity, symbol);
    }

    /// Call a method by its full signature string
    pub(super) fn call_method(&mut self, arity: usize, signature: &str) {
        let symbol = self.vm.method_names.ensure(signature);
        self.emit_call(Opcode::Call, arity, symbol);
    }

    // ========================================================================
    // Constants
    // ========================================================================

    fn push_constant(&mut self, key: Option<ConstantKey>, value: Value) -> usize {
        if self.frame().constants.len() >= MAX_CONSTANTS {
            self.error(&format!("A function may only contain {} unique constants.", MAX_CONSTANTS));
            return 0;
        }
        let frame = self.frame_mut();
        let index = frame.constants.len();
        frame.constants.push(value);
        if let Some(key) = key {
            frame.constant_index.insert(key, index);
        }
        index
    }

    /// Constant index for a number, reusing an equal one
    pub(super) fn num_constant(&mut self, n: f64) -> usize {
        let key = ConstantKey::Num(n.to_bits());
        if let Some(&index) = self.frame().constant_index.get(&key) {
            return index;
        }
        self.push_constant(Some(key), Value::num(n))
    }

    /// Constant index for a string, reusing an equal one
    pub(super) fn string_constant(&mut self, bytes: &[u8]) -> usize {
        let key = ConstantKey::Str(bytes.to_vec());
        if let Some(&index) = self.frame().constant_index.get(&key) {
            return index;
        }
        let string = self.vm.allocate(None, Obj::String(ObjString::new(bytes)));
        self.vm.compiler_roots.push(string);
        self.push_constant(Some(key), Value::from(string))
    }

    /// Push a constant
    pub(super) fn emit_constant(&mut self, index: usize) {
        self.emit_short_arg(Opcode::Constant, index);
    }

    // ========================================================================
    // Scopes and variables
    // ========================================================================

    pub(super) fn push_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    pub(super) fn pop_scope(&mut self) {
        let depth = self.frame().scope_depth;
        let popped = self.discard_locals(depth);
        let frame = self.frame_mut();
        let remaining = frame.locals.len() - popped;
        frame.locals.truncate(remaining);
        frame.num_slots -= popped as i32;
        frame.scope_depth -= 1;
    }

    /// Emit code to drop every local at `depth` or deeper, without forgetting
    /// them. Used both when a scope ends and when `break` or `continue` jumps
    /// out of one. Returns how many locals were dropped.
    pub(super) fn discard_locals(&mut self, depth: i32) -> usize {
        let ops: Vec<Opcode> = self
            .frame()
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth >= depth)
            .map(|local| if local.is_upvalue { Opcode::CloseUpvalue } else { Opcode::Pop })
            .collect();

        // Raw bytes: the locals stay in scope for the code that follows a
        // `break`, so the slot count must not change.
        for op in &ops {
            self.emit_byte(op.to_u8());
        }
        ops.len()
    }

    /// Add a local to the innermost function
    pub(super) fn add_local(&mut self, name: &str) -> usize {
        let frame = self.frame_mut();
        frame.locals.push(Local {
            name: name.to_string(),
            depth: frame.scope_depth,
            is_upvalue: false,
        });
        frame.locals.len() - 1
    }

    /// Declare `name` in `frame`, as a module variable at the top level or a
    /// local otherwise. Returns the symbol or slot.
    pub(super) fn declare_variable(&mut self, frame: usize, name: &str) -> usize {
        if name.len() > MAX_VARIABLE_NAME {
            self.error(&format!(
                "Variable name cannot be longer than {} characters.",
                MAX_VARIABLE_NAME
            ));
        }

        if self.frames[frame].scope_depth == -1 {
            return self.declare_module_variable(name);
        }

        // Shadowing an outer scope is fine; redeclaring in this one is not.
        let target = &self.frames[frame];
        let duplicate = target
            .locals
            .iter()
            .enumerate()
            .rev()
            .take_while(|(_, local)| local.depth >= target.scope_depth)
            .find(|(_, local)| local.name == name)
            .map(|(slot, _)| slot);
        if let Some(slot) = duplicate {
            self.error("Variable is already declared in this scope.");
            return slot;
        }

        if self.frames[frame].locals.len() >= MAX_LOCALS {
            self.error(&format!("Cannot declare more than {} variables in one scope.", MAX_LOCALS));
            return 0;
        }

        let target = &mut self.frames[frame];
        target.locals.push(Local {
            name: name.to_string(),
            depth: target.scope_depth,
            is_upvalue: false,
        });
        target.locals.len() - 1
    }

    /// Consume a name and declare it in the innermost function
    pub(super) fn declare_named_variable(&mut self) -> usize {
        self.consume(TokenKind::Name, "Expect variable name.");
        let name = self.previous_text();
        let top = self.top();
        self.declare_variable(top, name)
    }

    /// Store the just-compiled initializer into a declared variable. Locals
    /// already live in the right slot.
    pub(super) fn define_variable(&mut self, frame: usize, symbol: usize) {
        if self.frames[frame].scope_depth >= 0 {
            return;
        }
        self.emit_op_to(frame, Opcode::StoreModuleVar);
        self.emit_byte_to(frame, (symbol >> 8) as u8);
        self.emit_byte_to(frame, symbol as u8);
        self.emit_op_to(frame, Opcode::Pop);
    }

    /// Symbol of a module variable, if declared
    pub(super) fn module_variable(&self, name: &str) -> Option<usize> {
        self.vm.heap.module(self.module).variable_names.find(name)
    }

    fn add_module_variable(&mut self, name: &str) -> Option<usize> {
        let module = self.vm.heap.module_mut(self.module);
        if module.variables.len() >= MAX_MODULE_VARS {
            return None;
        }
        let symbol = module.variable_names.add(name);
        module.variables.push(Value::NULL);
        Some(symbol)
    }

    fn declare_module_variable(&mut self, name: &str) -> usize {
        let Some(symbol) = self.module_variable(name) else {
            return match self.add_module_variable(name) {
                Some(symbol) => symbol,
                None => {
                    self.error("Too many module variables defined.");
                    0
                }
            };
        };

        match self.implicit.remove(&symbol) {
            // Used earlier in the module, now really defined. That is only
            // fine for names that could be classes defined later.
            Some(line) => {
                if is_local_name(name) {
                    self.error(&format!(
                        "Variable '{}' referenced before this definition (first use at line {}).",
                        name, line
                    ));
                }
            }
            None => self.error("Module variable is already defined."),
        }
        symbol
    }

    /// Declare a module variable on first use, in the hope a definition follows
    pub(super) fn declare_implicit(&mut self, name: &str, line: u32) -> usize {
        match self.add_module_variable(name) {
            Some(symbol) => {
                self.implicit.insert(symbol, line);
                symbol
            }
            None => {
                self.error("Too many module variables defined.");
                0
            }
        }
    }

    /// Slot of a local named `name` in `frame`, innermost first
    pub(super) fn resolve_local(&self, frame: usize, name: &str) -> Option<usize> {
        self.frames[frame].locals.iter().rposition(|local| local.name == name)
    }

    fn add_upvalue(&mut self, frame: usize, is_local: bool, index: usize) -> usize {
        let upvalue = CompilerUpvalue { is_local, index };
        if let Some(existing) = self.frames[frame].upvalues.iter().position(|u| *u == upvalue) {
            return existing;
        }
        if self.frames[frame].upvalues.len() >= MAX_UPVALUES {
            self.error(&format!("Function may not have more than {} upvalues.", MAX_UPVALUES));
            return 0;
        }
        self.frames[frame].upvalues.push(upvalue);
        self.frames[frame].upvalues.len() - 1
    }

    /// Capture `name` from the functions enclosing `frame`.
    ///
    /// Lookup stops at a method boundary: methods cannot see the locals of
    /// the code around their class, except for static fields, which are
    /// locals of the class body.
    pub(super) fn find_upvalue(&mut self, frame: usize, name: &str) -> Option<usize> {
        if frame == 0 {
            return None;
        }
        let parent = frame - 1;
        if !name.starts_with('_') && self.frames[parent].class.is_some() {
            return None;
        }

        if let Some(local) = self.resolve_local(parent, name) {
            self.frames[parent].locals[local].is_upvalue = true;
            return Some(self.add_upvalue(frame, true, local));
        }

        let upvalue = self.find_upvalue(parent, name)?;
        Some(self.add_upvalue(frame, false, upvalue))
    }

    /// Resolve `name` as a local or upvalue of the innermost function
    pub(super) fn resolve_nonmodule(&mut self, name: &str) -> Option<Variable> {
        let top = self.top();
        if let Some(slot) = self.resolve_local(top, name) {
            return Some(Variable::Local(slot));
        }
        self.find_upvalue(top, name).map(Variable::Upvalue)
    }

    /// Push the value of `variable`
    pub(super) fn load_variable(&mut self, variable: Variable) {
        match variable {
            Variable::Local(slot) => self.load_local(slot),
            Variable::Upvalue(index) => {
                self.emit_byte_arg(Opcode::LoadUpvalue, index as u8);
            }
            Variable::Module(symbol) => self.emit_short_arg(Opcode::LoadModuleVar, symbol),
        }
    }

    /// Push a local, using the short form for low slots
    pub(super) fn load_local(&mut self, slot: usize) {
        match Opcode::load_local_shortcut(slot) {
            Some(op) => {
                self.emit_op(op);
            }
            None => {
                self.emit_byte_arg(Opcode::LoadLocal, slot as u8);
            }
        }
    }

    /// Push the receiver of the enclosing method
    pub(super) fn load_this(&mut self) {
        if let Some(variable) = self.resolve_nonmodule("this") {
            self.load_variable(variable);
        }
    }

    /// Push a variable of the core module. Every module starts with a copy of
    /// them; while compiling the core module itself the class may not be
    /// defined yet, so it is declared like any other forward reference.
    pub(super) fn load_core_variable(&mut self, name: &str) {
        let symbol = match self.module_variable(name) {
            Some(symbol) => symbol,
            None => {
                let line = self.previous.line();
                self.declare_implicit(name, line)
            }
        };
        self.emit_short_arg(Opcode::LoadModuleVar, symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_names() {
        assert!(is_local_name("foo"));
        assert!(!is_local_name("Foo"));
        assert!(!is_local_name("_foo"));
        assert!(!is_local_name(""));
    }

    #[test]
    fn test_label_text_truncates_on_char_boundary() {
        assert_eq!(label_text("short"), "short");

        let long = "é".repeat(40);
        let label = label_text(&long);
        assert!(label.ends_with("..."));
        assert!(label.len() <= MAX_VARIABLE_NAME + 3);
    }

    #[test]
    fn test_new_function_reserves_receiver_slot() {
        let method = FnCompiler::new(true, 0);
        assert_eq!(method.locals[0].name, "this");
        assert_eq!(method.num_slots, 1);

        let function = FnCompiler::new(false, 0);
        assert!(function.locals[0].name.is_empty());
    }
}
