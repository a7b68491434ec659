//! Bytecode opcodes for the Wren VM
//!
//! Every instruction is one opcode byte followed by zero or more operand
//! bytes. Multi-byte operands are big-endian `u16`s.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Constants & stack
//! - 0x10-0x1F: Locals & upvalues
//! - 0x20-0x2F: Module variables & fields
//! - 0x30-0x3F: Method calls
//! - 0x40-0x4F: Control flow
//! - 0x50-0x5F: Closures & classes
//! - 0x60-0x6F: Modules
//! - 0xFF: End of function marker

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Constants & Stack (0x00-0x0F) =====
    /// Push a constant (operand: u16 constant index)
    Constant = 0x00,
    /// Push null
    Null = 0x01,
    /// Push false
    False = 0x02,
    /// Push true
    True = 0x03,
    /// Discard the top of stack
    Pop = 0x04,

    // ===== Locals & Upvalues (0x10-0x1F) =====
    /// Push local 0 (the receiver)
    LoadLocal0 = 0x10,
    /// Push local 1
    LoadLocal1 = 0x11,
    /// Push local 2
    LoadLocal2 = 0x12,
    /// Push local 3
    LoadLocal3 = 0x13,
    /// Push local 4
    LoadLocal4 = 0x14,
    /// Push local 5
    LoadLocal5 = 0x15,
    /// Push local 6
    LoadLocal6 = 0x16,
    /// Push local 7
    LoadLocal7 = 0x17,
    /// Push local 8
    LoadLocal8 = 0x18,
    /// Push a local (operand: u8 slot)
    LoadLocal = 0x19,
    /// Store top of stack into a local without popping (operand: u8 slot)
    StoreLocal = 0x1A,
    /// Push an upvalue (operand: u8 index)
    LoadUpvalue = 0x1B,
    /// Store top of stack into an upvalue without popping (operand: u8 index)
    StoreUpvalue = 0x1C,
    /// Close the upvalue for the top slot, then pop it
    CloseUpvalue = 0x1D,

    // ===== Module Variables & Fields (0x20-0x2F) =====
    /// Push a module variable (operand: u16 symbol)
    LoadModuleVar = 0x20,
    /// Store top of stack into a module variable (operand: u16 symbol)
    StoreModuleVar = 0x21,
    /// Push a field of the receiver (operand: u8 field)
    LoadFieldThis = 0x22,
    /// Store top of stack into a field of the receiver (operand: u8 field)
    StoreFieldThis = 0x23,
    /// Pop an instance and push one of its fields (operand: u8 field)
    LoadField = 0x24,
    /// Pop an instance, store the next value into its field (operand: u8 field)
    StoreField = 0x25,

    // ===== Method Calls (0x30-0x3F) =====
    /// Invoke a method on the receiver below the arguments
    /// (operands: u8 argument count, u16 method symbol)
    Call = 0x30,
    /// Invoke a superclass method (operands: u8 argument count, u16 method symbol)
    Super = 0x31,

    // ===== Control Flow (0x40-0x4F) =====
    /// Jump forward (operand: u16 offset)
    Jump = 0x40,
    /// Jump backward (operand: u16 offset)
    Loop = 0x41,
    /// Pop the condition and jump forward if it is falsy (operand: u16 offset)
    JumpIf = 0x42,
    /// Short-circuit `&&`: jump if falsy, else pop (operand: u16 offset)
    And = 0x43,
    /// Short-circuit `||`: jump if truthy, else pop (operand: u16 offset)
    Or = 0x44,
    /// Return the top of stack from the current frame
    Return = 0x45,

    // ===== Closures & Classes (0x50-0x5F) =====
    /// Create a closure (operand: u16 function constant, then one
    /// `is_local: u8, index: u8` pair per upvalue)
    Closure = 0x50,
    /// Replace the class in slot 0 with a new instance of it
    Construct = 0x51,
    /// Replace the foreign class in slot 0 with a new foreign instance
    ForeignConstruct = 0x52,
    /// Create a class from name and superclass (operand: u8 field count)
    Class = 0x53,
    /// Create a foreign class from name and superclass
    ForeignClass = 0x54,
    /// Attach attributes to a finished class, popping both
    EndClass = 0x55,
    /// Bind an instance method (operand: u16 method symbol)
    MethodInstance = 0x56,
    /// Bind a static method (operand: u16 method symbol)
    MethodStatic = 0x57,

    // ===== Modules (0x60-0x6F) =====
    /// Record the running module as the last one loaded and push null
    EndModule = 0x60,
    /// Load (if needed) and run a module (operand: u16 name constant)
    ImportModule = 0x61,
    /// Push a variable from the last imported module (operand: u16 name constant)
    ImportVariable = 0x62,

    /// Marks the end of a function's code. Never executed.
    End = 0xFF,
}

impl Opcode {
    /// Convert byte to opcode
    ///
    /// Returns None if the byte does not correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => Self::Constant,
            0x01 => Self::Null,
            0x02 => Self::False,
            0x03 => Self::True,
            0x04 => Self::Pop,
            0x10 => Self::LoadLocal0,
            0x11 => Self::LoadLocal1,
            0x12 => Self::LoadLocal2,
            0x13 => Self::LoadLocal3,
            0x14 => Self::LoadLocal4,
            0x15 => Self::LoadLocal5,
            0x16 => Self::LoadLocal6,
            0x17 => Self::LoadLocal7,
            0x18 => Self::LoadLocal8,
            0x19 => Self::LoadLocal,
            0x1A => Self::StoreLocal,
            0x1B => Self::LoadUpvalue,
            0x1C => Self::StoreUpvalue,
            0x1D => Self::CloseUpvalue,
            0x20 => Self::LoadModuleVar,
            0x21 => Self::StoreModuleVar,
            0x22 => Self::LoadFieldThis,
            0x23 => Self::StoreFieldThis,
            0x24 => Self::LoadField,
            0x25 => Self::StoreField,
            0x30 => Self::Call,
            0x31 => Self::Super,
            0x40 => Self::Jump,
            0x41 => Self::Loop,
            0x42 => Self::JumpIf,
            0x43 => Self::And,
            0x44 => Self::Or,
            0x45 => Self::Return,
            0x50 => Self::Closure,
            0x51 => Self::Construct,
            0x52 => Self::ForeignConstruct,
            0x53 => Self::Class,
            0x54 => Self::ForeignClass,
            0x55 => Self::EndClass,
            0x56 => Self::MethodInstance,
            0x57 => Self::MethodStatic,
            0x60 => Self::EndModule,
            0x61 => Self::ImportModule,
            0x62 => Self::ImportVariable,
            0xFF => Self::End,
            _ => return None,
        };
        Some(op)
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// `LoadLocalN` shortcut for `slot`, if there is one
    pub fn load_local_shortcut(slot: usize) -> Option<Self> {
        let op = match slot {
            0 => Self::LoadLocal0,
            1 => Self::LoadLocal1,
            2 => Self::LoadLocal2,
            3 => Self::LoadLocal3,
            4 => Self::LoadLocal4,
            5 => Self::LoadLocal5,
            6 => Self::LoadLocal6,
            7 => Self::LoadLocal7,
            8 => Self::LoadLocal8,
            _ => return None,
        };
        Some(op)
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "CONSTANT",
            Self::Null => "NULL",
            Self::False => "FALSE",
            Self::True => "TRUE",
            Self::Pop => "POP",
            Self::LoadLocal0 => "LOAD_LOCAL_0",
            Self::LoadLocal1 => "LOAD_LOCAL_1",
            Self::LoadLocal2 => "LOAD_LOCAL_2",
            Self::LoadLocal3 => "LOAD_LOCAL_3",
            Self::LoadLocal4 => "LOAD_LOCAL_4",
            Self::LoadLocal5 => "LOAD_LOCAL_5",
            Self::LoadLocal6 => "LOAD_LOCAL_6",
            Self::LoadLocal7 => "LOAD_LOCAL_7",
            Self::LoadLocal8 => "LOAD_LOCAL_8",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadUpvalue => "LOAD_UPVALUE",
            Self::StoreUpvalue => "STORE_UPVALUE",
            Self::CloseUpvalue => "CLOSE_UPVALUE",
            Self::LoadModuleVar => "LOAD_MODULE_VAR",
            Self::StoreModuleVar => "STORE_MODULE_VAR",
            Self::LoadFieldThis => "LOAD_FIELD_THIS",
            Self::StoreFieldThis => "STORE_FIELD_THIS",
            Self::LoadField => "LOAD_FIELD",
            Self::StoreField => "STORE_FIELD",
            Self::Call => "CALL",
            Self::Super => "SUPER",
            Self::Jump => "JUMP",
            Self::Loop => "LOOP",
            Self::JumpIf => "JUMP_IF",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Return => "RETURN",
            Self::Closure => "CLOSURE",
            Self::Construct => "CONSTRUCT",
            Self::ForeignConstruct => "FOREIGN_CONSTRUCT",
            Self::Class => "CLASS",
            Self::ForeignClass => "FOREIGN_CLASS",
            Self::EndClass => "END_CLASS",
            Self::MethodInstance => "METHOD_INSTANCE",
            Self::MethodStatic => "METHOD_STATIC",
            Self::EndModule => "END_MODULE",
            Self::ImportModule => "IMPORT_MODULE",
            Self::ImportVariable => "IMPORT_VARIABLE",
            Self::End => "END",
        }
    }

    /// Bytes of fixed operands following the opcode.
    ///
    /// `Closure` is additionally followed by two bytes per upvalue of the
    /// function it creates.
    pub fn operand_len(self) -> usize {
        match self {
            Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadUpvalue
            | Self::StoreUpvalue
            | Self::LoadFieldThis
            | Self::StoreFieldThis
            | Self::LoadField
            | Self::StoreField
            | Self::Class => 1,

            Self::Constant
            | Self::LoadModuleVar
            | Self::StoreModuleVar
            | Self::Jump
            | Self::Loop
            | Self::JumpIf
            | Self::And
            | Self::Or
            | Self::Closure
            | Self::MethodInstance
            | Self::MethodStatic
            | Self::ImportModule
            | Self::ImportVariable => 2,

            Self::Call | Self::Super => 3,

            _ => 0,
        }
    }

    /// Net change in stack height when the instruction runs.
    ///
    /// For `Call` and `Super` this excludes the arguments, which the
    /// compiler subtracts itself.
    pub fn stack_effect(self) -> i32 {
        match self {
            Self::Constant | Self::Null | Self::False | Self::True => 1,
            Self::Pop => -1,
            Self::LoadLocal0
            | Self::LoadLocal1
            | Self::LoadLocal2
            | Self::LoadLocal3
            | Self::LoadLocal4
            | Self::LoadLocal5
            | Self::LoadLocal6
            | Self::LoadLocal7
            | Self::LoadLocal8
            | Self::LoadLocal
            | Self::LoadUpvalue
            | Self::LoadModuleVar
            | Self::LoadFieldThis => 1,
            Self::StoreLocal | Self::StoreUpvalue | Self::StoreModuleVar | Self::StoreFieldThis => 0,
            Self::CloseUpvalue => -1,
            Self::LoadField => 0,
            Self::StoreField => -1,
            Self::Call | Self::Super => 0,
            Self::Jump | Self::Loop => 0,
            Self::JumpIf | Self::And | Self::Or => -1,
            Self::Return => 0,
            Self::Closure => 1,
            Self::Construct | Self::ForeignConstruct => 0,
            Self::Class | Self::ForeignClass => -1,
            Self::EndClass => -2,
            Self::MethodInstance | Self::MethodStatic => -2,
            Self::EndModule | Self::ImportModule | Self::ImportVariable => 1,
            Self::End => 0,
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::Loop | Self::JumpIf | Self::And | Self::Or)
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::Super)
    }
}
