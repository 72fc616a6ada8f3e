//! Dispatch loop for bytecode execution
//!
//! Handles individual opcode execution. The running frame is kept in a
//! local copy; its `ip` is written back to the frame array before anything
//! that can push a frame, raise an error or inspect the call stack.

use bytecode_system::{Chunk, OpCode};
use core_types::{ErrorKind, ObjRef, RuntimeError, Value};
use memory_manager::{Class, Closure, Object, Table};

use crate::call::CallOutcome;
use crate::call_frame::CallFrame;
use crate::vm::Vm;

macro_rules! binary_op {
    ($vm:ident, $frame:ident, $wrap:path, $op:tt) => {{
        match ($vm.peek(1).as_number(), $vm.peek(0).as_number()) {
            (Some(a), Some(b)) => {
                $vm.pop();
                $vm.pop();
                $vm.push($wrap(a $op b));
            }
            _ => return Err($vm.fail(&$frame, ErrorKind::Type, "Operands must be numbers.")),
        }
    }};
}

impl Vm {
    /// Executes instructions until the frame count drops back to
    /// `exit_depth`, returning the value of the last `Return`.
    pub(crate) fn run(&mut self, exit_depth: usize) -> Result<Value, RuntimeError> {
        let Some(mut frame) = self.frames.last().copied() else {
            return Err(RuntimeError::new(ErrorKind::InvalidBytecode, "No active call frame."));
        };

        loop {
            if self.config.trace_execution {
                self.trace_instruction(&frame);
            }

            let instruction = self.read_byte(&mut frame);
            let Some(op) = OpCode::from_byte(instruction) else {
                return Err(self.fail(
                    &frame,
                    ErrorKind::InvalidBytecode,
                    format!("Unknown opcode {}.", instruction),
                ));
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant(&mut frame);
                    self.push(value);
                }
                OpCode::ConstantLong => {
                    let index = self.read_short(&mut frame) as usize;
                    let value = self.chunk(frame.function).constants[index];
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::NIL),
                OpCode::True => self.push(Value::TRUE),
                OpCode::False => self.push(Value::FALSE),
                OpCode::Pop => {
                    self.pop();
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte(&mut frame) as usize;
                    let value = self.stack[frame.base + slot];
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte(&mut frame) as usize;
                    self.stack[frame.base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_string(&mut frame)?;
                    let key = self.heap.key(name);
                    match self.globals.get(key) {
                        Some(value) => self.push(value),
                        None => return Err(self.undefined_variable(&frame, name)),
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string(&mut frame)?;
                    let key = self.heap.key(name);
                    self.globals.set(key, self.peek(0));
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string(&mut frame)?;
                    let key = self.heap.key(name);
                    if self.globals.set(key, self.peek(0)) {
                        self.globals.delete(key);
                        return Err(self.undefined_variable(&frame, name));
                    }
                }
                OpCode::GetUpvalue => {
                    let index = self.read_byte(&mut frame) as usize;
                    let upvalue = self.frame_upvalue(&frame, index);
                    let value = self.read_upvalue(upvalue);
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let index = self.read_byte(&mut frame) as usize;
                    let upvalue = self.frame_upvalue(&frame, index);
                    self.write_upvalue(upvalue, self.peek(0));
                }

                OpCode::GetProperty => {
                    let name = self.read_string(&mut frame)?;
                    self.save_frame(&frame);
                    self.get_property(name)?;
                }
                OpCode::SetProperty => {
                    let name = self.read_string(&mut frame)?;
                    self.save_frame(&frame);
                    self.set_property(name, false)?;
                }
                OpCode::SetPropertyShadowed => {
                    let name = self.read_string(&mut frame)?;
                    self.save_frame(&frame);
                    self.set_property(name, true)?;
                }
                OpCode::GetSuper => {
                    let name = self.read_string(&mut frame)?;
                    self.save_frame(&frame);
                    let superclass = self.pop();
                    let class = self.expect_class(&frame, superclass)?;
                    self.bind_method(class, name)?;
                }

                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::bool(a == b));
                }
                OpCode::Greater => binary_op!(self, frame, Value::bool, >),
                OpCode::Less => binary_op!(self, frame, Value::bool, <),
                OpCode::Add => {
                    let (a, b) = (self.peek(1), self.peek(0));
                    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
                        self.pop();
                        self.pop();
                        self.push(Value::number(x + y));
                    } else if let (Some(x), Some(y)) = (self.as_string(a), self.as_string(b)) {
                        self.concatenate(x, y);
                    } else {
                        return Err(self.fail(
                            &frame,
                            ErrorKind::Type,
                            "Operands must be two numbers or two strings.",
                        ));
                    }
                }
                OpCode::Subtract => binary_op!(self, frame, Value::number, -),
                OpCode::Multiply => binary_op!(self, frame, Value::number, *),
                OpCode::Divide => binary_op!(self, frame, Value::number, /),
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::bool(value.is_falsey()));
                }
                OpCode::Negate => match self.peek(0).as_number() {
                    Some(n) => {
                        self.pop();
                        self.push(Value::number(-n));
                    }
                    None => {
                        return Err(self.fail(&frame, ErrorKind::Type, "Operand must be a number."))
                    }
                },

                OpCode::Print => {
                    let value = self.pop();
                    let mut text = self.heap.format_value(value);
                    text.push('\n');
                    self.write_output(&text);
                }

                OpCode::Jump => {
                    let offset = self.read_short(&mut frame) as usize;
                    frame.ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short(&mut frame) as usize;
                    if self.peek(0).is_falsey() {
                        frame.ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short(&mut frame) as usize;
                    frame.ip -= offset;
                }

                OpCode::Call => {
                    let argc = self.read_byte(&mut frame);
                    self.save_frame(&frame);
                    let callee = self.peek(argc as usize);
                    if self.call_value(callee, argc)? == CallOutcome::Entered {
                        frame = self.reload_frame(frame);
                    }
                }
                OpCode::Invoke => {
                    let name = self.read_string(&mut frame)?;
                    let argc = self.read_byte(&mut frame);
                    self.save_frame(&frame);
                    if self.invoke(name, argc)? == CallOutcome::Entered {
                        frame = self.reload_frame(frame);
                    }
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string(&mut frame)?;
                    let argc = self.read_byte(&mut frame);
                    self.save_frame(&frame);
                    let superclass = self.pop();
                    let class = self.expect_class(&frame, superclass)?;
                    if self.invoke_from_class(class, name, argc)? == CallOutcome::Entered {
                        frame = self.reload_frame(frame);
                    }
                }
                OpCode::Closure => {
                    let function = match self.read_constant(&mut frame).as_object() {
                        Some(function) => function,
                        None => {
                            return Err(self.fail(
                                &frame,
                                ErrorKind::InvalidBytecode,
                                "Closure operand is not a function.",
                            ))
                        }
                    };
                    self.save_frame(&frame);
                    self.make_closure(&mut frame, function);
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    self.close_upvalues(frame.base);
                    self.frames.pop();
                    self.stack.truncate(frame.base);
                    if self.frames.len() <= exit_depth {
                        return Ok(result);
                    }
                    self.push(result);
                    frame = self.reload_frame(frame);
                }

                OpCode::Class => {
                    let name = self.read_string(&mut frame)?;
                    self.save_frame(&frame);
                    let class = self.alloc(Object::Class(Class {
                        name,
                        methods: Table::new(),
                    }));
                    self.push(Value::object(class));
                }
                OpCode::Inherit => {
                    let superclass = self.peek(1);
                    let Some(superclass) = superclass
                        .as_object()
                        .filter(|obj| self.heap.get(*obj).as_class().is_some())
                    else {
                        return Err(self.fail(&frame, ErrorKind::Type, "Superclass must be a class."));
                    };
                    let subclass = self.peek(0).as_object();
                    let methods = self
                        .heap
                        .get(superclass)
                        .as_class()
                        .map(|class| class.methods.clone())
                        .unwrap_or_default();
                    if let Some(subclass) = subclass {
                        if let Some(class) = self.heap.get_mut(subclass).as_class_mut() {
                            methods.add_all(&mut class.methods);
                        }
                        self.recharge(subclass);
                    }
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string(&mut frame)?;
                    self.define_method(name);
                }
            }
        }
    }

    fn chunk(&self, function: ObjRef) -> &Chunk {
        match self.heap.get(function) {
            Object::Function(function) => &function.chunk,
            other => panic!("call frame holds a {} instead of a function", other.kind()),
        }
    }

    fn read_byte(&self, frame: &mut CallFrame) -> u8 {
        let byte = self.chunk(frame.function).code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_short(&self, frame: &mut CallFrame) -> u16 {
        let value = self.chunk(frame.function).read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn read_constant(&self, frame: &mut CallFrame) -> Value {
        let index = self.read_byte(frame) as usize;
        self.chunk(frame.function).constants[index]
    }

    fn read_string(&mut self, frame: &mut CallFrame) -> Result<ObjRef, RuntimeError> {
        let value = self.read_constant(frame);
        match self.as_string(value) {
            Some(string) => Ok(string),
            None => Err(self.fail(frame, ErrorKind::InvalidBytecode, "Name operand is not a string.")),
        }
    }

    fn as_string(&self, value: Value) -> Option<ObjRef> {
        value
            .as_object()
            .filter(|obj| self.heap.get(*obj).as_string().is_some())
    }

    fn save_frame(&mut self, frame: &CallFrame) {
        if let Some(top) = self.frames.last_mut() {
            top.ip = frame.ip;
        }
    }

    fn reload_frame(&self, current: CallFrame) -> CallFrame {
        self.frames.last().copied().unwrap_or(current)
    }

    /// Saves the frame and raises a runtime error.
    fn fail(&mut self, frame: &CallFrame, kind: ErrorKind, message: impl Into<String>) -> RuntimeError {
        self.save_frame(frame);
        self.runtime_error(kind, message)
    }

    fn undefined_variable(&mut self, frame: &CallFrame, name: ObjRef) -> RuntimeError {
        let text = self.heap.string_text(name).unwrap_or_default();
        self.fail(frame, ErrorKind::UndefinedVariable, format!("Undefined variable '{}'.", text))
    }

    fn expect_class(&mut self, frame: &CallFrame, value: Value) -> Result<ObjRef, RuntimeError> {
        match value.as_object() {
            Some(obj) if self.heap.get(obj).as_class().is_some() => Ok(obj),
            _ => Err(self.fail(frame, ErrorKind::Type, "Superclass must be a class.")),
        }
    }

    fn frame_upvalue(&self, frame: &CallFrame, index: usize) -> ObjRef {
        match self.heap.get(frame.closure) {
            Object::Closure(closure) => closure.upvalues[index],
            other => panic!("call frame holds a {} instead of a closure", other.kind()),
        }
    }

    fn concatenate(&mut self, a: ObjRef, b: ObjRef) {
        let mut bytes = Vec::new();
        for part in [a, b] {
            if let Some(s) = self.heap.get(part).as_string() {
                bytes.extend_from_slice(s.as_bytes());
            }
        }
        let result = self.intern_bytes(&bytes);
        self.pop();
        self.pop();
        self.push(Value::object(result));
    }

    /// Reads the upvalue descriptors following a `Closure` instruction and
    /// pushes the new closure.
    fn make_closure(&mut self, frame: &mut CallFrame, function: ObjRef) {
        let count = self
            .heap
            .get(function)
            .as_function()
            .map_or(0, |f| f.upvalue_count);
        let mut upvalues = Vec::with_capacity(count);
        for _ in 0..count {
            let is_local = self.read_byte(frame);
            let index = self.read_byte(frame) as usize;
            let upvalue = if is_local == 1 {
                self.capture_upvalue(frame.base + index)
            } else {
                self.frame_upvalue(frame, index)
            };
            upvalues.push(upvalue);
        }
        let closure = self.alloc(Object::Closure(Closure {
            function,
            upvalues: upvalues.into_boxed_slice(),
        }));
        self.push(Value::object(closure));
    }

    fn define_method(&mut self, name: ObjRef) {
        let method = self.peek(0);
        let key = self.heap.key(name);
        if let Some(class) = self.peek(1).as_object() {
            if let Some(class_ref) = self.heap.get_mut(class).as_class_mut() {
                class_ref.methods.set(key, method);
            }
            self.recharge(class);
        }
        self.pop();
    }
}
