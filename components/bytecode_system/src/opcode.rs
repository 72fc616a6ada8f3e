//! Bytecode opcodes
//!
//! Each instruction is a single opcode byte followed by zero or more operand
//! bytes. Jump distances are big-endian `u16`s.

/// Descriptor for a captured variable (upvalue), emitted as two bytes after
/// a `Closure` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpvalueDescriptor {
    /// true if the variable is a local slot of the enclosing frame, false if
    /// it is one of the enclosing closure's own upvalues
    pub is_local: bool,
    /// Stack slot (if local) or upvalue index (if not)
    pub index: u8,
}

impl UpvalueDescriptor {
    /// Create a new upvalue descriptor
    pub fn new(is_local: bool, index: u8) -> Self {
        Self { is_local, index }
    }
}

/// Operand layout of an instruction, used by the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// No operands
    None,
    /// One raw byte (slot, upvalue index or argument count)
    Byte,
    /// One constant-pool index byte
    Constant,
    /// Big-endian `u16` constant-pool index
    ConstantLong,
    /// Constant index byte followed by an argument count byte
    Invoke,
    /// Forward `u16` jump
    JumpForward,
    /// Backward `u16` jump
    JumpBackward,
    /// Function constant index followed by upvalue descriptor pairs
    Closure,
}

/// Bytecode instruction set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Unary and output
    /// Logical not of the top value
    Not,
    /// Numeric negation of the top value
    Negate,
    /// Pop and print the top value
    Print,

    // Control flow
    /// Jump backward by a `u16` distance
    Loop,
    /// Jump forward by a `u16` distance
    Jump,
    /// Jump forward when the top value is falsey (does not pop)
    JumpIfFalse,
    /// Call the value below `argc` arguments
    Call,
    /// Fused property lookup and call: name constant, argc
    Invoke,
    /// Fused superclass method lookup and call: name constant, argc
    SuperInvoke,
    /// Create a closure from a function constant
    Closure,
    /// Close the upvalue for the top stack slot and pop it
    CloseUpvalue,
    /// Return from the current frame
    Return,

    // Literals
    /// Push a constant (byte index)
    Constant,
    /// Push nil
    Nil,
    /// Push true
    True,
    /// Push false
    False,
    /// Discard the top value
    Pop,

    // Variables
    /// Push a frame-relative local slot
    GetLocal,
    /// Store the top value into a local slot
    SetLocal,
    /// Push a global by name constant
    GetGlobal,
    /// Define a global from the top value and pop it
    DefineGlobal,
    /// Assign an existing global
    SetGlobal,
    /// Push a captured variable
    GetUpvalue,
    /// Assign a captured variable
    SetUpvalue,
    /// Read a field or bind a method
    GetProperty,
    /// Assign a field, leaving the assigned value
    SetProperty,
    /// Assign a field, leaving the receiver
    SetPropertyShadowed,
    /// Bind a superclass method
    GetSuper,

    // Comparison and arithmetic
    /// Equality
    Equal,
    /// Numeric greater-than
    Greater,
    /// Numeric less-than
    Less,
    /// Numeric addition or string concatenation
    Add,
    /// Numeric subtraction
    Subtract,
    /// Numeric multiplication
    Multiply,
    /// Numeric division
    Divide,

    // Declarations
    /// Push a new class named by a constant
    Class,
    /// Copy superclass methods into the subclass
    Inherit,
    /// Add the closure on top to the class below it
    Method,

    /// Push a constant (`u16` index)
    ConstantLong,
}

impl OpCode {
    /// Every opcode in encoding order.
    pub const ALL: [OpCode; 39] = [
        OpCode::Not,
        OpCode::Negate,
        OpCode::Print,
        OpCode::Loop,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::Call,
        OpCode::Invoke,
        OpCode::SuperInvoke,
        OpCode::Closure,
        OpCode::CloseUpvalue,
        OpCode::Return,
        OpCode::Constant,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::GetLocal,
        OpCode::SetLocal,
        OpCode::GetGlobal,
        OpCode::DefineGlobal,
        OpCode::SetGlobal,
        OpCode::GetUpvalue,
        OpCode::SetUpvalue,
        OpCode::GetProperty,
        OpCode::SetProperty,
        OpCode::SetPropertyShadowed,
        OpCode::GetSuper,
        OpCode::Equal,
        OpCode::Greater,
        OpCode::Less,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Class,
        OpCode::Inherit,
        OpCode::Method,
        OpCode::ConstantLong,
    ];

    /// Decodes an opcode byte.
    #[inline]
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        OpCode::ALL.get(byte as usize).copied()
    }

    /// Mnemonic used in disassembly listings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Print => "OP_PRINT",
            OpCode::Loop => "OP_LOOP",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Call => "OP_CALL",
            OpCode::Invoke => "OP_INVOKE",
            OpCode::SuperInvoke => "OP_SUPER_INVOKE",
            OpCode::Closure => "OP_CLOSURE",
            OpCode::CloseUpvalue => "OP_CLOSE_UPVALUE",
            OpCode::Return => "OP_RETURN",
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetUpvalue => "OP_GET_UPVALUE",
            OpCode::SetUpvalue => "OP_SET_UPVALUE",
            OpCode::GetProperty => "OP_GET_PROPERTY",
            OpCode::SetProperty => "OP_SET_PROPERTY",
            OpCode::SetPropertyShadowed => "OP_SET_PROPERTY_SHADOWED",
            OpCode::GetSuper => "OP_GET_SUPER",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Class => "OP_CLASS",
            OpCode::Inherit => "OP_INHERIT",
            OpCode::Method => "OP_METHOD",
            OpCode::ConstantLong => "OP_CONSTANT_LONG",
        }
    }

    /// Operand layout following the opcode byte.
    pub fn operands(self) -> OperandShape {
        match self {
            OpCode::Constant
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::SetPropertyShadowed
            | OpCode::GetSuper
            | OpCode::Class
            | OpCode::Method => OperandShape::Constant,
            OpCode::ConstantLong => OperandShape::ConstantLong,
            OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::Call => OperandShape::Byte,
            OpCode::Invoke | OpCode::SuperInvoke => OperandShape::Invoke,
            OpCode::Jump | OpCode::JumpIfFalse => OperandShape::JumpForward,
            OpCode::Loop => OperandShape::JumpBackward,
            OpCode::Closure => OperandShape::Closure,
            _ => OperandShape::None,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}
