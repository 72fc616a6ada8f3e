//! Function assembler
//!
//! [`FunctionBuilder`] emits bytecode with symbolic constants and turns it
//! into a heap function object in one step, interning strings and nested
//! functions while keeping everything rooted. It is how the builtin
//! interpreted routines are produced, and what compilers and tests can use
//! when they do not want to manage the constant pool by hand.

use bytecode_system::{Chunk, ChunkError, OpCode, UpvalueDescriptor};
use core_types::{ObjRef, Value};
use memory_manager::{Function, Object};

use crate::vm::Vm;

/// Constant-pool entry before it is placed on the heap.
#[derive(Debug, Clone)]
pub enum Constant {
    /// Number literal
    Number(f64),
    /// String literal or identifier, interned when built
    Str(String),
    /// Nested function, assembled when built
    Function(Box<FunctionBuilder>),
}

impl Constant {
    fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// A forward jump whose distance has not been patched yet.
///
/// Created by [`FunctionBuilder::jump`] and
/// [`FunctionBuilder::jump_if_false`]; resolve it with
/// [`FunctionBuilder::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    /// Position of the u16 distance bytes
    offset_pos: usize,
}

/// Builds one function's bytecode.
///
/// # Examples
///
/// ```
/// use interpreter::{FunctionBuilder, Vm};
/// use bytecode_system::OpCode;
/// use core_types::Value;
///
/// let mut vm = Vm::new();
/// let mut double = FunctionBuilder::new("double", 1);
/// double.get_local(1).get_local(1).op(OpCode::Add).op(OpCode::Return);
///
/// let mut script = FunctionBuilder::script();
/// script
///     .closure(double, &[])
///     .number(21.0)
///     .call(1)
///     .op(OpCode::Return);
/// let function = script.build(&mut vm).unwrap();
/// assert_eq!(vm.run_function(function).unwrap(), Value::number(42.0));
/// ```
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    name: Option<String>,
    arity: u8,
    upvalue_count: usize,
    chunk: Chunk,
    constants: Vec<Constant>,
    line: u32,
    error: Option<ChunkError>,
}

impl FunctionBuilder {
    /// Starts a named function taking `arity` parameters
    pub fn new(name: &str, arity: u8) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::script()
        }
        .with_arity(arity)
    }

    /// Starts a top-level script
    pub fn script() -> Self {
        Self {
            name: None,
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            constants: Vec::new(),
            line: 1,
            error: None,
        }
    }

    fn with_arity(mut self, arity: u8) -> Self {
        self.arity = arity;
        self
    }

    /// Current byte offset in the code
    pub fn current_offset(&self) -> usize {
        self.chunk.code.len()
    }

    /// Source line recorded for subsequently emitted bytes
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit(&mut self, byte: u8) {
        self.chunk.write(byte, self.line);
    }

    fn record(&mut self, result: Result<(), ChunkError>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    fn add_constant(&mut self, constant: Constant) -> usize {
        if let Some(index) = self.constants.iter().position(|c| c.same_as(&constant)) {
            return index;
        }
        self.constants.push(constant);
        self.constants.len() - 1
    }

    /// Emits `op` with a one-byte constant-pool operand.
    fn emit_with_constant(&mut self, op: OpCode, constant: Constant) {
        let index = self.add_constant(constant);
        match u8::try_from(index) {
            Ok(index) => {
                self.chunk.write_op(op, self.line);
                self.emit(index);
            }
            Err(_) => self.record(Err(ChunkError::TooManyConstants)),
        }
    }

    fn load_constant(&mut self, constant: Constant) -> &mut Self {
        let index = self.add_constant(constant);
        if let Ok(short) = u8::try_from(index) {
            self.chunk.write_op(OpCode::Constant, self.line);
            self.emit(short);
        } else if let Ok(long) = u16::try_from(index) {
            let [hi, lo] = long.to_be_bytes();
            self.chunk.write_op(OpCode::ConstantLong, self.line);
            self.emit(hi);
            self.emit(lo);
        } else {
            self.record(Err(ChunkError::TooManyConstants));
        }
        self
    }

    // ── instructions ───────────────────────────────────────────────

    /// Emits an operand-less instruction
    pub fn op(&mut self, op: OpCode) -> &mut Self {
        self.chunk.write_op(op, self.line);
        self
    }

    /// Emits an instruction with a raw byte operand
    pub fn op_byte(&mut self, op: OpCode, operand: u8) -> &mut Self {
        self.chunk.write_op(op, self.line);
        self.emit(operand);
        self
    }

    /// Loads a number constant
    pub fn number(&mut self, n: f64) -> &mut Self {
        self.load_constant(Constant::Number(n))
    }

    /// Loads a string constant
    pub fn string(&mut self, text: &str) -> &mut Self {
        self.load_constant(Constant::Str(text.to_string()))
    }

    /// `GetLocal <slot>`
    pub fn get_local(&mut self, slot: u8) -> &mut Self {
        self.op_byte(OpCode::GetLocal, slot)
    }

    /// `SetLocal <slot>`
    pub fn set_local(&mut self, slot: u8) -> &mut Self {
        self.op_byte(OpCode::SetLocal, slot)
    }

    /// `GetUpvalue <index>`
    pub fn get_upvalue(&mut self, index: u8) -> &mut Self {
        self.op_byte(OpCode::GetUpvalue, index)
    }

    /// `SetUpvalue <index>`
    pub fn set_upvalue(&mut self, index: u8) -> &mut Self {
        self.op_byte(OpCode::SetUpvalue, index)
    }

    /// `Call <argc>`
    pub fn call(&mut self, argc: u8) -> &mut Self {
        self.op_byte(OpCode::Call, argc)
    }

    /// Emits an instruction whose operand names a global, property,
    /// method or class
    pub fn named(&mut self, op: OpCode, name: &str) -> &mut Self {
        self.emit_with_constant(op, Constant::Str(name.to_string()));
        self
    }

    /// `GetGlobal <name>`
    pub fn get_global(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::GetGlobal, name)
    }

    /// `DefineGlobal <name>`
    pub fn define_global(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::DefineGlobal, name)
    }

    /// `SetGlobal <name>`
    pub fn set_global(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::SetGlobal, name)
    }

    /// `GetProperty <name>`
    pub fn get_property(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::GetProperty, name)
    }

    /// `SetProperty <name>`
    pub fn set_property(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::SetProperty, name)
    }

    /// `Class <name>`
    pub fn class(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::Class, name)
    }

    /// `Method <name>`
    pub fn method(&mut self, name: &str) -> &mut Self {
        self.named(OpCode::Method, name)
    }

    /// `Invoke <name> <argc>`
    pub fn invoke(&mut self, name: &str, argc: u8) -> &mut Self {
        self.named(OpCode::Invoke, name);
        self.emit(argc);
        self
    }

    /// `SuperInvoke <name> <argc>`
    pub fn super_invoke(&mut self, name: &str, argc: u8) -> &mut Self {
        self.named(OpCode::SuperInvoke, name);
        self.emit(argc);
        self
    }

    /// `Closure <function>` followed by one descriptor per capture
    pub fn closure(&mut self, mut function: FunctionBuilder, captures: &[UpvalueDescriptor]) -> &mut Self {
        function.upvalue_count = captures.len();
        self.emit_with_constant(OpCode::Closure, Constant::Function(Box::new(function)));
        for capture in captures {
            self.chunk.write_upvalue(*capture, self.line);
        }
        self
    }

    /// `Jump` with an unpatched distance
    pub fn jump(&mut self) -> Label {
        Label {
            offset_pos: self.chunk.emit_jump(OpCode::Jump, self.line),
        }
    }

    /// `JumpIfFalse` with an unpatched distance
    pub fn jump_if_false(&mut self) -> Label {
        Label {
            offset_pos: self.chunk.emit_jump(OpCode::JumpIfFalse, self.line),
        }
    }

    /// Points a forward jump at the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let result = self.chunk.patch_jump(label.offset_pos);
        self.record(result);
        self
    }

    /// `Loop` back to an offset obtained from [`FunctionBuilder::current_offset`]
    pub fn loop_to(&mut self, loop_start: usize) -> &mut Self {
        let result = self.chunk.emit_loop(loop_start, self.line);
        self.record(result);
        self
    }

    /// `Nil` `Return`, the implicit end of every function body
    pub fn ret_nil(&mut self) -> &mut Self {
        self.op(OpCode::Nil).op(OpCode::Return)
    }

    // ── materialization ────────────────────────────────────────────

    /// Places the function, its constants and nested functions on the heap
    ///
    /// # Returns
    ///
    /// The unrooted function object, or the first emission error
    pub fn build(self, vm: &mut Vm) -> Result<ObjRef, ChunkError> {
        let mark = vm.root_mark();
        let result = self.materialize(vm);
        vm.release_roots(mark);
        result
    }

    fn materialize(self, vm: &mut Vm) -> Result<ObjRef, ChunkError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut chunk = self.chunk;
        for constant in self.constants {
            let value = match constant {
                Constant::Number(n) => Value::number(n),
                Constant::Str(text) => Value::object(vm.intern(&text)),
                Constant::Function(function) => Value::object((*function).materialize(vm)?),
            };
            vm.add_root(value);
            chunk.constants.push(value);
        }
        let name = self.name.map(|name| vm.intern(&name));
        if let Some(name) = name {
            vm.add_root(Value::object(name));
        }
        Ok(vm.alloc(Object::Function(Function {
            arity: self.arity,
            upvalue_count: self.upvalue_count,
            chunk,
            name,
        })))
    }
}
