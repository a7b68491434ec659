//! Statements, definitions and classes

use super::bytecode::Opcode;
use super::compiler::{ClassInfo, Compiler, Loop, Variable};
use super::expr::Precedence;
use super::signature::{signature_rule, Signature, SignatureKind};
use crate::parser::{Literal, TokenKind};
use crate::vm::defaults::{MAX_FIELDS, MAX_LOCALS};

/// A literal attribute value
#[derive(Debug, Clone, PartialEq)]
pub(super) enum AttrValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(Vec<u8>),
}

/// Runtime attributes, grouped as `group -> key -> [values]`.
///
/// Ungrouped attributes live in the `None` group. Insertion order is kept so
/// the generated code is deterministic.
#[derive(Debug, Clone, Default)]
pub(super) struct Attributes {
    pub groups: Vec<(Option<String>, Vec<(String, Vec<AttrValue>)>)>,
}

impl Attributes {
    pub fn add(&mut self, group: Option<&str>, key: &str, value: AttrValue) {
        let index = match self.groups.iter().position(|(name, _)| name.as_deref() == group) {
            Some(index) => index,
            None => {
                self.groups.push((group.map(str::to_string), Vec::new()));
                self.groups.len() - 1
            }
        };
        let items = &mut self.groups[index].1;
        match items.iter_mut().find(|(name, _)| name == key) {
            Some((_, values)) => values.push(value),
            None => items.push((key.to_string(), vec![value])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Compiler<'_, '_> {
    /// A top-level or block-level definition: a class, an import, a variable
    /// or a statement
    pub(super) fn definition(&mut self) {
        if self.match_attribute() {
            self.definition();
            return;
        }

        if self.match_token(TokenKind::Class) {
            self.class_definition(false);
            return;
        }
        if self.match_token(TokenKind::Foreign) {
            self.consume(TokenKind::Class, "Expect 'class' after 'foreign'.");
            self.class_definition(true);
            return;
        }

        self.disallow_attributes();

        if self.match_token(TokenKind::Import) {
            self.import();
        } else if self.match_token(TokenKind::Var) {
            self.variable_definition();
        } else {
            self.statement();
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Parse one `#key`, `#key = value` or `#group(key = value, ...)` line.
    /// Only `#!` attributes are kept for runtime access.
    fn match_attribute(&mut self) -> bool {
        if !self.match_token(TokenKind::Hash) {
            return false;
        }

        self.num_attributes += 1;
        let runtime_access = self.match_token(TokenKind::Bang);

        if self.match_token(TokenKind::Name) {
            let group = self.previous_text();
            let ahead = self.peek();
            if ahead == TokenKind::Eq || ahead == TokenKind::Line {
                let mut value = AttrValue::Null;
                if self.match_token(TokenKind::Eq) {
                    value = self.consume_literal(
                        "Expect a Bool, Num, String or Identifier literal for an attribute value.",
                    );
                }
                if runtime_access {
                    self.attributes.add(None, group, value);
                }
            } else if self.match_token(TokenKind::LeftParen) {
                self.ignore_newlines();
                if self.match_token(TokenKind::RightParen) {
                    self.error("Expected attributes in group, group cannot be empty.");
                } else {
                    while self.peek() != TokenKind::RightParen {
                        self.consume(TokenKind::Name, "Expect name for attribute key.");
                        let key = self.previous_text();
                        let mut value = AttrValue::Null;
                        if self.match_token(TokenKind::Eq) {
                            value = self.consume_literal(
                                "Expect a Bool, Num, String or Identifier literal for an attribute value.",
                            );
                        }
                        if runtime_access {
                            self.attributes.add(Some(group), key, value);
                        }
                        self.ignore_newlines();
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                        self.ignore_newlines();
                    }

                    self.ignore_newlines();
                    self.consume(TokenKind::RightParen, "Expected ')' after grouped attributes.");
                }
            } else {
                self.error("Expect an equal, newline or grouping after an attribute key.");
            }
        } else {
            self.error("Expect an attribute definition after #.");
        }

        self.consume_line("Expect newline after attribute.");
        true
    }

    fn consume_literal(&mut self, message: &str) -> AttrValue {
        if self.match_token(TokenKind::False) {
            return AttrValue::Bool(false);
        }
        if self.match_token(TokenKind::True) {
            return AttrValue::Bool(true);
        }
        if self.match_token(TokenKind::Number) || self.match_token(TokenKind::String) {
            return match std::mem::take(&mut self.previous.literal) {
                Literal::Num(n) => AttrValue::Num(n),
                Literal::Str(bytes) => AttrValue::Str(bytes),
                Literal::None => AttrValue::Null,
            };
        }
        if self.match_token(TokenKind::Name) {
            return AttrValue::Str(self.previous_text().as_bytes().to_vec());
        }

        self.error(message);
        self.advance();
        AttrValue::Null
    }

    fn disallow_attributes(&mut self) {
        if self.num_attributes > 0 {
            self.error("Attributes can only specified before a class or a method");
            self.attributes = Default::default();
            self.num_attributes = 0;
        }
    }

    /// Push `Map.new()` filled with `attributes`
    fn emit_attributes(&mut self, attributes: &Attributes) {
        self.load_core_variable("Map");
        self.call_method(0, "new()");

        for (group, items) in &attributes.groups {
            match group {
                Some(name) => {
                    let constant = self.string_constant(name.as_bytes());
                    self.emit_constant(constant);
                }
                None => {
                    self.emit_op(Opcode::Null);
                }
            }

            self.load_core_variable("Map");
            self.call_method(0, "new()");
            for (key, values) in items {
                let constant = self.string_constant(key.as_bytes());
                self.emit_constant(constant);

                self.load_core_variable("List");
                self.call_method(0, "new()");
                for value in values {
                    self.emit_attr_value(value);
                    self.call_method(1, "addCore_(_)");
                }
                self.call_method(2, "addCore_(_,_)");
            }
            self.call_method(2, "addCore_(_,_)");
        }
    }

    fn emit_attr_value(&mut self, value: &AttrValue) {
        match value {
            AttrValue::Null => {
                self.emit_op(Opcode::Null);
            }
            AttrValue::Bool(true) => {
                self.emit_op(Opcode::True);
            }
            AttrValue::Bool(false) => {
                self.emit_op(Opcode::False);
            }
            AttrValue::Num(n) => {
                let constant = self.num_constant(*n);
                self.emit_constant(constant);
            }
            AttrValue::Str(bytes) => {
                let constant = self.string_constant(bytes);
                self.emit_constant(constant);
            }
        }
    }

    /// Push `ClassAttributes.new(classAttributes, methodAttributes)`
    fn emit_class_attributes(&mut self, class: &ClassInfo) {
        self.load_core_variable("ClassAttributes");

        match &class.class_attributes {
            Some(attributes) => self.emit_attributes(attributes),
            None => {
                self.emit_op(Opcode::Null);
            }
        }

        if class.method_attributes.is_empty() {
            self.emit_op(Opcode::Null);
        } else {
            self.load_core_variable("Map");
            self.call_method(0, "new()");
            for (signature, attributes) in &class.method_attributes {
                let constant = self.string_constant(signature.as_bytes());
                self.emit_constant(constant);
                self.emit_attributes(attributes);
                self.call_method(2, "addCore_(_,_)");
            }
        }

        self.call_method(2, "new(_,_)");
    }

    /// Move the pending attributes onto the method being defined
    fn copy_method_attributes(&mut self, is_foreign: bool, is_static: bool, signature: &str) {
        self.num_attributes = 0;
        if self.attributes.is_empty() {
            return;
        }
        let attributes = std::mem::take(&mut self.attributes);

        let prefix = match (is_foreign, is_static) {
            (true, true) => "foreign static ",
            (true, false) => "foreign ",
            (false, true) => "static ",
            (false, false) => "",
        };
        let key = format!("{}{}", prefix, signature);
        if let Some(class) = self.enclosing_class_mut() {
            class.method_attributes.push((key, attributes));
        }
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn class_definition(&mut self, is_foreign: bool) {
        self.consume(TokenKind::Name, "Expect class name.");
        let name = self.previous_text();
        let top = self.top();
        let symbol = self.declare_variable(top, name);
        let class_variable = if self.frame().scope_depth == -1 {
            Variable::Module(symbol)
        } else {
            Variable::Local(symbol)
        };

        let constant = self.string_constant(name.as_bytes());
        self.emit_constant(constant);

        if self.match_token(TokenKind::Is) {
            self.parse_precedence(Precedence::Call);
        } else {
            self.load_core_variable("Object");
        }

        // The field count is only known once every method has been compiled.
        let num_fields_operand = if is_foreign {
            self.emit_op(Opcode::ForeignClass);
            None
        } else {
            Some(self.emit_byte_arg(Opcode::Class, 255))
        };

        self.define_variable(top, symbol);

        // Static fields become locals of this scope.
        self.push_scope();

        let class_attributes = if self.attributes.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.attributes))
        };
        self.num_attributes = 0;

        self.frame_mut().class = Some(ClassInfo {
            name: name.to_string(),
            fields: Default::default(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            is_foreign,
            in_static: false,
            signature: None,
            class_attributes,
            method_attributes: Vec::new(),
        });

        self.consume(TokenKind::LeftBrace, "Expect '{' after class declaration.");
        self.match_line();

        while !self.match_token(TokenKind::RightBrace) {
            if !self.method(class_variable) {
                break;
            }

            // No newline needed after the last definition.
            if self.match_token(TokenKind::RightBrace) {
                break;
            }

            self.consume_line("Expect newline after definition in class.");
        }

        let class = self.frame_mut().class.take();
        if let Some(class) = class {
            if class.class_attributes.is_some() || !class.method_attributes.is_empty() {
                self.emit_class_attributes(&class);
                self.load_variable(class_variable);
                self.emit_op(Opcode::EndClass);
            }

            if let Some(operand) = num_fields_operand {
                let count = class.fields.len().min(MAX_FIELDS);
                self.patch_byte(operand, count as u8);
            }
        }

        self.pop_scope();
    }

    /// Compile one method definition in a class body. Returns `false` if no
    /// method could be parsed, so the caller stops.
    fn method(&mut self, class_variable: Variable) -> bool {
        if self.match_attribute() {
            return self.method(class_variable);
        }

        let is_foreign = self.match_token(TokenKind::Foreign);
        let is_static = self.match_token(TokenKind::Static);
        if let Some(class) = self.enclosing_class_mut() {
            class.in_static = is_static;
        }

        let rule = signature_rule(self.peek());
        self.advance();
        let Some(rule) = rule else {
            self.error("Expect method definition.");
            return false;
        };

        let mut signature = self.signature_from_token(SignatureKind::Getter);

        // Parameters are locals of the method.
        self.push_frame(true);
        self.parse_signature(rule, &mut signature);

        let is_initializer = signature.kind == SignatureKind::Initializer;
        self.frame_mut().is_initializer = is_initializer;
        self.frame_mut().arity = signature.arity;

        if is_static && is_initializer {
            self.error("A constructor cannot be static.");
        }

        let full_signature = signature.to_string();
        self.copy_method_attributes(is_foreign, is_static, &full_signature);
        let symbol = self.declare_method(&signature, &full_signature);

        if let Some(class) = self.enclosing_class_mut() {
            class.signature = Some(signature.clone());
        }

        if is_foreign {
            // The method has no body, only a name the host binds.
            self.frames.pop();
            let constant = self.string_constant(full_signature.as_bytes());
            self.emit_constant(constant);
        } else {
            self.consume(TokenKind::LeftBrace, "Expect '{' to begin method body.");
            self.finish_body();
            self.end_compiler(&full_signature);
        }

        self.define_method(class_variable, is_static, symbol);

        if is_initializer {
            // Also define the matching constructor on the metaclass.
            signature.kind = SignatureKind::Method;
            let constructor = self.signature_symbol(&signature);
            self.create_constructor(&signature, symbol);
            self.define_method(class_variable, true, constructor);
        }

        true
    }

    /// Record a method symbol, reporting a duplicate definition
    fn declare_method(&mut self, signature: &Signature, full_signature: &str) -> usize {
        let symbol = self.signature_symbol(signature);

        let Some(class) = self.enclosing_class_mut() else {
            return symbol;
        };
        let in_static = class.in_static;
        let methods = if in_static {
            &mut class.static_methods
        } else {
            &mut class.methods
        };

        let duplicate = methods.contains(&symbol);
        methods.push(symbol);

        if duplicate {
            let message = format!(
                "Class {} already defines a {}method '{}'.",
                class.name,
                if in_static { "static " } else { "" },
                full_signature
            );
            self.error(&message);
        }
        symbol
    }

    /// Bind the method on top of the stack to the class
    fn define_method(&mut self, class_variable: Variable, is_static: bool, symbol: usize) {
        // Static fields may sit above the class on the stack, so load it afresh.
        self.load_variable(class_variable);
        let op = if is_static {
            Opcode::MethodStatic
        } else {
            Opcode::MethodInstance
        };
        self.emit_short_arg(op, symbol);
    }

    /// Compile the metaclass method that allocates an instance and runs its
    /// initializer
    fn create_constructor(&mut self, signature: &Signature, initializer: usize) {
        let is_foreign = self
            .enclosing_class_mut()
            .map(|class| class.is_foreign)
            .unwrap_or(false);

        self.push_frame(true);
        let top = self.top();
        self.adjust_slots(top, signature.arity as i32);
        self.frame_mut().arity = signature.arity;

        let op = if is_foreign {
            Opcode::ForeignConstruct
        } else {
            Opcode::Construct
        };
        self.emit_op(op);
        self.emit_call(Opcode::Call, signature.arity, initializer);
        self.emit_op(Opcode::Return);

        self.end_compiler(&signature.to_string());
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn import(&mut self) {
        self.ignore_newlines();
        self.consume(TokenKind::String, "Expect a string after 'import'.");
        let name = match std::mem::take(&mut self.previous.literal) {
            Literal::Str(bytes) => bytes,
            _ => Vec::new(),
        };
        let module_constant = self.string_constant(&name);

        self.emit_short_arg(Opcode::ImportModule, module_constant);
        // Discard the module body's result.
        self.emit_op(Opcode::Pop);

        if !self.match_token(TokenKind::For) {
            return;
        }

        loop {
            self.ignore_newlines();
            self.consume(TokenKind::Name, "Expect variable name.");
            let source_name = self.previous_text();
            let source_constant = self.string_constant(source_name.as_bytes());

            let top = self.top();
            let slot = if self.match_token(TokenKind::As) {
                self.declare_named_variable()
            } else {
                self.declare_variable(top, source_name)
            };

            self.emit_short_arg(Opcode::ImportVariable, source_constant);
            self.define_variable(top, slot);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
    }

    fn variable_definition(&mut self) {
        // Not in scope until after its own initializer.
        self.consume(TokenKind::Name, "Expect variable name.");
        let name = self.previous_text();

        if self.match_token(TokenKind::Eq) {
            self.ignore_newlines();
            self.expression();
        } else {
            self.emit_op(Opcode::Null);
        }

        let top = self.top();
        let symbol = self.declare_variable(top, name);
        self.define_variable(top, symbol);
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn statement(&mut self) {
        if self.match_token(TokenKind::Break) {
            self.break_statement();
        } else if self.match_token(TokenKind::Continue) {
            self.continue_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.push_scope();
            if self.finish_block() {
                // An expression block's value is unused here.
                self.emit_op(Opcode::Pop);
            }
            self.pop_scope();
        } else {
            self.expression();
            self.emit_op(Opcode::Pop);
        }
    }

    fn break_statement(&mut self) {
        let Some(depth) = self.frame().loops.last().map(|l| l.scope_depth) else {
            self.error("Cannot use 'break' outside of a loop.");
            return;
        };

        self.discard_locals(depth + 1);
        let jump = self.emit_jump(Opcode::Jump);
        if let Some(innermost) = self.frame_mut().loops.last_mut() {
            innermost.breaks.push(jump);
        }
    }

    fn continue_statement(&mut self) {
        let Some(depth) = self.frame().loops.last().map(|l| l.scope_depth) else {
            self.error("Cannot use 'continue' outside of a loop.");
            return;
        };

        self.discard_locals(depth + 1);
        self.emit_loop();
    }

    fn return_statement(&mut self) {
        let bare = matches!(
            self.peek(),
            TokenKind::Line | TokenKind::RightBrace | TokenKind::Eof
        );

        if bare {
            // Initializers return the new instance, everything else null.
            let op = if self.frame().is_initializer {
                Opcode::LoadLocal0
            } else {
                Opcode::Null
            };
            self.emit_op(op);
        } else {
            if self.frame().is_initializer {
                self.error("A constructor cannot return a value.");
            }
            self.expression();
        }

        self.emit_op(Opcode::Return);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.");

        let if_jump = self.emit_jump(Opcode::JumpIf);
        self.statement();

        // `else` may start the next line.
        if self.peek() == TokenKind::Line && self.next.kind == TokenKind::Else {
            self.advance();
        }

        if self.match_token(TokenKind::Else) {
            let else_jump = self.emit_jump(Opcode::Jump);
            self.patch_jump(if_jump);
            self.statement();
            self.patch_jump(else_jump);
        } else {
            self.patch_jump(if_jump);
        }
    }

    fn start_loop(&mut self) {
        let start = self.code_len();
        let scope_depth = self.frame().scope_depth;
        self.frame_mut().loops.push(Loop {
            start,
            exit_jump: 0,
            scope_depth,
            breaks: Vec::new(),
        });
    }

    /// Jump out of the loop if the condition on the stack is falsy
    fn test_exit_loop(&mut self) {
        let jump = self.emit_jump(Opcode::JumpIf);
        if let Some(innermost) = self.frame_mut().loops.last_mut() {
            innermost.exit_jump = jump;
        }
    }

    fn end_loop(&mut self) {
        self.emit_loop();

        if let Some(finished) = self.frame_mut().loops.pop() {
            self.patch_jump(finished.exit_jump);
            for jump in finished.breaks {
                self.patch_jump(jump);
            }
        }
    }

    fn while_statement(&mut self) {
        self.start_loop();

        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after while condition.");

        self.test_exit_loop();
        self.statement();
        self.end_loop();
    }

    /// `for (x in seq) body` is compiled roughly as:
    ///
    /// ```text
    /// {
    ///   var seq_ = seq
    ///   var iter_ = null
    ///   while (iter_ = seq_.iterate(iter_)) {
    ///     var x = seq_.iteratorValue(iter_)
    ///     body
    ///   }
    /// }
    /// ```
    fn for_statement(&mut self) {
        // Scope for the hidden sequence and iterator locals.
        self.push_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        self.consume(TokenKind::Name, "Expect for loop variable name.");
        let name = self.previous_text();

        self.consume(TokenKind::In, "Expect 'in' after loop variable.");
        self.ignore_newlines();

        self.expression();

        if self.frame().locals.len() + 2 > MAX_LOCALS {
            self.error(&format!(
                "Cannot declare more than {} variables in one scope. (Not enough space for for-loops internal variables)",
                MAX_LOCALS
            ));
            return;
        }
        // The spaces keep these from colliding with user names.
        let seq_slot = self.add_local("seq ");
        self.emit_op(Opcode::Null);
        let iter_slot = self.add_local("iter ");

        self.consume(TokenKind::RightParen, "Expect ')' after loop expression.");

        self.start_loop();

        self.load_local(seq_slot);
        self.load_local(iter_slot);
        self.call_method(1, "iterate(_)");
        self.emit_byte_arg(Opcode::StoreLocal, iter_slot as u8);
        self.test_exit_loop();

        self.load_local(seq_slot);
        self.load_local(iter_slot);
        self.call_method(1, "iteratorValue(_)");

        // A fresh variable per iteration, so closures capture each value.
        self.push_scope();
        self.add_local(name);

        self.statement();

        self.pop_scope();
        self.end_loop();
        self.pop_scope();
    }

    // ========================================================================
    // Blocks and bodies
    // ========================================================================

    /// Compile the rest of a block after its `{`. Returns whether it was a
    /// single expression on one line, whose value is left on the stack.
    pub(super) fn finish_block(&mut self) -> bool {
        if self.match_token(TokenKind::RightBrace) {
            return false;
        }

        // No newline after the `{`: a single expression body.
        if !self.match_line() {
            self.expression();
            self.consume(TokenKind::RightBrace, "Expect '}' at end of block.");
            return true;
        }

        if self.match_token(TokenKind::RightBrace) {
            return false;
        }

        loop {
            self.definition();
            self.consume_line("Expect newline after statement.");
            if matches!(self.peek(), TokenKind::RightBrace | TokenKind::Eof) {
                break;
            }
        }

        self.consume(TokenKind::RightBrace, "Expect '}' at end of block.");
        false
    }

    /// Compile a function or method body after its `{`, including the
    /// implicit return
    pub(super) fn finish_body(&mut self) {
        let is_expression = self.finish_block();

        if self.frame().is_initializer {
            if is_expression {
                self.emit_op(Opcode::Pop);
            }
            self.emit_op(Opcode::LoadLocal0);
        } else if !is_expression {
            self.emit_op(Opcode::Null);
        }

        self.emit_op(Opcode::Return);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_group_and_keep_order() {
        let mut attributes = Attributes::default();
        assert!(attributes.is_empty());

        attributes.add(None, "hidden", AttrValue::Null);
        attributes.add(Some("doc"), "author", AttrValue::Str(b"ann".to_vec()));
        attributes.add(Some("doc"), "author", AttrValue::Str(b"bo".to_vec()));
        attributes.add(Some("doc"), "since", AttrValue::Num(2.0));

        assert_eq!(attributes.groups.len(), 2);
        assert_eq!(attributes.groups[0].0, None);

        let (group, items) = &attributes.groups[1];
        assert_eq!(group.as_deref(), Some("doc"));
        assert_eq!(items[0].0, "author");
        assert_eq!(items[0].1.len(), 2);
        assert_eq!(items[1], ("since".to_string(), vec![AttrValue::Num(2.0)]));
    }
}
