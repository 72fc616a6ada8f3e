//! Virtual Machine for bytecode execution
//!
//! Main entry point for running compiled functions. The [`Vm`] owns the
//! heap, the value stack, the frame array, the globals table and the
//! native registry.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use arrayvec::ArrayVec;
use core_types::{
    CompileError, ErrorKind, InterpretError, ObjRef, RuntimeError, StackFrame, Value,
};
use memory_manager::{Closure, GcConfig, Heap, LoxString, Object, Table};
use serde::{Deserialize, Serialize};

use crate::backend::{Compiler, ExecutionBackend};
use crate::call::CallOutcome;
use crate::call_frame::CallFrame;
use crate::module::ModuleInit;
use crate::native::NativeEntry;

/// Maximum call depth
pub const FRAMES_MAX: usize = 64;

/// Value stack capacity reserved up front
pub const STACK_MAX: usize = FRAMES_MAX * (u8::MAX as usize + 1);

/// Runtime settings for a [`Vm`].
///
/// # Examples
///
/// ```
/// use interpreter::VmConfig;
/// use memory_manager::GcConfig;
///
/// let config = VmConfig::default().with_gc(GcConfig::default().with_stress(true));
/// assert!(config.gc.stress);
/// assert!(!config.trace_execution);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Collector tuning
    pub gc: GcConfig,
    /// Log every executed instruction at trace level
    pub trace_execution: bool,
}

impl VmConfig {
    /// Sets the collector configuration
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Enables or disables instruction tracing
    pub fn with_trace_execution(mut self, trace: bool) -> Self {
        self.trace_execution = trace;
        self
    }
}

/// The bytecode virtual machine.
///
/// # Examples
///
/// ```
/// use interpreter::{FunctionBuilder, Vm};
/// use bytecode_system::OpCode;
/// use core_types::Value;
///
/// let mut vm = Vm::new();
/// let mut script = FunctionBuilder::script();
/// script.number(1.0).number(2.0).op(OpCode::Add).op(OpCode::Return);
/// let function = script.build(&mut vm).unwrap();
///
/// assert_eq!(vm.run_function(function).unwrap(), Value::number(3.0));
/// assert_eq!(vm.stack_len(), 0);
/// ```
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: ArrayVec<CallFrame, FRAMES_MAX>,
    pub(crate) globals: Table,
    pub(crate) open_upvalues: Option<ObjRef>,
    pub(crate) init_string: ObjRef,
    pub(crate) pinned: Vec<Value>,
    pub(crate) natives: Vec<NativeEntry>,
    pub(crate) modules: HashMap<String, ModuleInit>,
    pub(crate) module_count: usize,
    pub(crate) compiler: Option<Box<dyn Compiler>>,
    pub(crate) backend: Option<Box<dyn ExecutionBackend>>,
    pub(crate) output: Box<dyn Write>,
    pub(crate) config: VmConfig,
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("stack_len", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.len())
            .field("natives", &self.natives.len())
            .field("bytes_allocated", &self.heap.bytes_allocated())
            .finish()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a VM with default settings, printing to stdout
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with the given settings
    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::new(config.gc);
        let init_string = heap.allocate(Object::String(LoxString::new(b"init")));
        heap.intern_insert(init_string);

        Self {
            heap,
            stack: Vec::with_capacity(STACK_MAX),
            frames: ArrayVec::new(),
            globals: Table::new(),
            open_upvalues: None,
            init_string,
            pinned: Vec::new(),
            natives: Vec::new(),
            modules: HashMap::new(),
            module_count: 0,
            compiler: None,
            backend: None,
            output: Box::new(io::stdout()),
            config,
        }
    }

    /// Runtime settings
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The object heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable access to the object heap.
    ///
    /// Objects created through this handle bypass the collection trigger
    /// and must be rooted before the next VM allocation.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Redirects `print` and the logging natives
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Writes text to the VM's output sink
    pub fn write_output(&mut self, text: &str) {
        if let Err(e) = self.output.write_all(text.as_bytes()) {
            log::warn!("failed to write program output: {}", e);
        }
    }

    /// Installs the source compiler used by [`Vm::interpret`]
    pub fn set_compiler(&mut self, compiler: Box<dyn Compiler>) {
        self.compiler = Some(compiler);
    }

    /// Installs an alternative execution backend consulted on every
    /// closure call
    pub fn set_backend(&mut self, backend: Box<dyn ExecutionBackend>) {
        self.backend = Some(backend);
    }

    /// Removes the execution backend
    pub fn clear_backend(&mut self) -> Option<Box<dyn ExecutionBackend>> {
        self.backend.take()
    }

    /// Number of values on the stack
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Number of active call frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The interned `"init"` string
    pub fn init_string(&self) -> ObjRef {
        self.init_string
    }

    /// Compiles and runs a program with the installed compiler
    ///
    /// # Arguments
    ///
    /// * `source` - Program text
    ///
    /// # Returns
    ///
    /// The script's return value, or the compile or runtime error
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        let function = self.compile(source)?;
        Ok(self.run_function(function)?)
    }

    /// Compiles source text into a top-level function without running it
    pub fn compile(&mut self, source: &str) -> Result<ObjRef, CompileError> {
        let mut compiler = self
            .compiler
            .take()
            .ok_or_else(|| CompileError::new("No compiler installed."))?;
        let result = compiler.compile(source, self);
        self.compiler = Some(compiler);
        result
    }

    /// Wraps a compiled function in a closure and runs it to completion
    ///
    /// # Arguments
    ///
    /// * `function` - A zero-arity function object
    ///
    /// # Returns
    ///
    /// The value returned by the function. On error the stack has been
    /// reset.
    pub fn run_function(&mut self, function: ObjRef) -> Result<Value, RuntimeError> {
        self.push(Value::object(function));
        let closure = self.alloc(Object::Closure(Closure {
            function,
            upvalues: Box::new([]),
        }));
        self.pop();
        self.call(Value::object(closure), &[])
    }

    /// Calls any callable value with arguments and runs it to completion
    ///
    /// # Arguments
    ///
    /// * `callee` - Closure, class, bound method, native or bound native
    /// * `args` - Call arguments
    ///
    /// # Returns
    ///
    /// The call's result; the stack is left as it was before the call
    pub fn call(&mut self, callee: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let argc = u8::try_from(args.len()).map_err(|_| {
            RuntimeError::new(ErrorKind::Arity, "Can't have more than 255 arguments.")
        })?;
        let depth = self.frames.len();
        self.push(callee);
        self.stack.extend_from_slice(args);
        match self.call_value(callee, argc)? {
            CallOutcome::Completed => Ok(self.pop()),
            CallOutcome::Entered => self.run(depth),
        }
    }

    /// Defines or overwrites a global variable
    pub fn define_global(&mut self, name: &str, value: Value) {
        let mut vm = self.pin(value);
        let name = vm.intern(name);
        let key = vm.heap.key(name);
        vm.globals.set(key, value);
    }

    /// Reads a global variable
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let name = self.heap.intern_lookup(name.as_bytes())?;
        self.globals.get(self.heap.key(name))
    }

    /// The globals table
    pub fn globals(&self) -> &Table {
        &self.globals
    }

    /// Text of a string value, or `None` for any other value
    pub fn string_value(&self, value: Value) -> Option<String> {
        value.as_object().and_then(|obj| self.heap.string_text(obj))
    }

    /// Printable form of a value
    pub fn format_value(&self, value: Value) -> String {
        self.heap.format_value(value)
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    pub(crate) fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    /// Builds a runtime error with the current traceback and resets the
    /// stack.
    ///
    /// The caller must have stored the running frame's `ip` back into the
    /// frame array.
    pub(crate) fn runtime_error(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> RuntimeError {
        let mut error = RuntimeError::new(kind, message);
        for frame in self.frames.iter().rev() {
            let function = self.heap.get(frame.function).as_function();
            let line = function.map_or(0, |f| f.chunk.line_at(frame.ip.saturating_sub(1)));
            let function_name = function
                .and_then(|f| f.name)
                .and_then(|name| self.heap.string_text(name));
            error.stack.push(StackFrame {
                function_name,
                line,
            });
        }
        log::debug!("runtime error: {}", error.traceback());
        self.reset_stack();
        error
    }

    pub(crate) fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
    }
}
