//! Native function bridge
//!
//! Host functions are plain `fn` pointers stored in a registry on the VM
//! and referenced from heap objects by [`NativeId`]. A native receives the
//! VM, the bound receiver (for methods) and a copy of its arguments; the
//! originals stay on the stack, so they remain rooted while the native
//! allocates.
//!
//! A native registered with `calls_lox` does not return a result. It must
//! finish by calling [`Vm::call_lox_code`], which rewrites its stack
//! window into a call of an interpreted global function, so the dispatch
//! loop continues in bytecode instead of recursing through the host stack.

use core_types::{ErrorKind, ObjRef, RuntimeError, Value};
use memory_manager::{Native, NativeId, ObjKind, Object};
use thiserror::Error;

use crate::call::CallOutcome;
use crate::vm::Vm;

/// Signature of every host function.
///
/// Arguments: the VM, the receiver for bound natives, and the call
/// arguments.
pub type NativeFn = fn(&mut Vm, Option<Value>, &[Value]) -> Result<Value, NativeError>;

/// Failure reported by a native function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Plain message; the VM attaches the traceback
    #[error("{0}")]
    Message(String),
    /// Error from a nested call, already carrying its traceback
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl NativeError {
    /// Creates a message error
    pub fn new(message: impl Into<String>) -> Self {
        NativeError::Message(message.into())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NativeEntry {
    pub(crate) name: String,
    pub(crate) function: NativeFn,
}

impl Vm {
    /// Adds a host function to the registry without creating an object
    pub fn register_native(&mut self, name: &str, function: NativeFn) -> NativeId {
        let id = NativeId(self.natives.len() as u32);
        self.natives.push(NativeEntry {
            name: name.to_string(),
            function,
        });
        log::debug!("registered native {} as #{}", name, id.0);
        id
    }

    /// Registers a host function and wraps it in a native object
    ///
    /// # Arguments
    ///
    /// * `name` - Name shown in diagnostics
    /// * `function` - The host function
    /// * `calls_lox` - Whether the function ends in [`Vm::call_lox_code`]
    ///
    /// # Returns
    ///
    /// The unrooted native object
    pub fn new_native(&mut self, name: &str, function: NativeFn, calls_lox: bool) -> ObjRef {
        let id = self.register_native(name, function);
        let name = self.intern(name);
        let mut vm = self.pin(Value::object(name));
        vm.alloc(Object::Native(Native {
            name,
            id,
            calls_lox,
        }))
    }

    /// Binds a global name to a host function
    ///
    /// # Examples
    ///
    /// ```
    /// use interpreter::{NativeError, Vm};
    /// use core_types::Value;
    ///
    /// fn double(_vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    ///     let n = args.first().and_then(|v| v.as_number()).unwrap_or(0.0);
    ///     Ok(Value::number(n * 2.0))
    /// }
    ///
    /// let mut vm = Vm::new();
    /// vm.define_native("double", double);
    /// let native = vm.get_global("double").unwrap();
    /// assert_eq!(vm.call(native, &[Value::number(21.0)]).unwrap(), Value::number(42.0));
    /// ```
    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        self.define_native_with(name, function, false);
    }

    /// Binds a global name to a host function, choosing its call mode
    pub fn define_native_with(&mut self, name: &str, function: NativeFn, calls_lox: bool) {
        let native = self.new_native(name, function, calls_lox);
        self.define_global(name, Value::object(native));
    }

    /// Registers a method callable on every object of `kind`
    ///
    /// The method is stored in the globals table under `"<Kind>.<name>"`,
    /// e.g. `"Array.push"`.
    pub fn define_native_method(&mut self, kind: ObjKind, name: &str, function: NativeFn, calls_lox: bool) {
        let key = format!("{}.{}", kind.name(), name);
        self.define_native_with(&key, function, calls_lox);
    }

    /// Name a native was registered under
    pub fn native_name(&self, id: NativeId) -> Option<&str> {
        self.natives.get(id.0 as usize).map(|entry| entry.name.as_str())
    }

    /// Tail-calls the interpreted global function `name` from a calls-lox
    /// native.
    ///
    /// The native's callee slot and arguments are replaced by the function,
    /// `receiver` and `args`; a frame is pushed and the dispatch loop runs
    /// it once the native returns.
    ///
    /// # Arguments
    ///
    /// * `name` - Global holding a closure whose first parameter receives
    ///   `receiver`
    /// * `receiver` - Value passed as the first argument
    /// * `args` - Remaining arguments, normally the native's own
    ///
    /// # Returns
    ///
    /// A placeholder `nil`; the real result arrives when the frame returns
    pub fn call_lox_code(&mut self, name: &str, receiver: Value, args: &[Value]) -> Result<Value, NativeError> {
        let closure = self
            .get_global(name)
            .and_then(|value| value.as_object())
            .filter(|obj| self.heap.get(*obj).as_closure().is_some())
            .ok_or_else(|| NativeError::new(format!("Undefined function '{}'.", name)))?;
        let argc = u8::try_from(args.len() + 1)
            .map_err(|_| NativeError::new("Can't have more than 255 arguments."))?;

        let base = self.stack.len().saturating_sub(args.len() + 1);
        self.stack.truncate(base);
        self.push(Value::object(closure));
        self.push(receiver);
        self.stack.extend_from_slice(args);

        match self.call_closure(closure, argc)? {
            CallOutcome::Entered | CallOutcome::Completed => Ok(Value::NIL),
        }
    }

    /// Converts a native failure into a runtime error with traceback.
    pub(crate) fn native_failure(&mut self, error: NativeError) -> RuntimeError {
        match error {
            NativeError::Message(message) => self.runtime_error(ErrorKind::Native, message),
            NativeError::Runtime(error) => {
                self.reset_stack();
                error
            }
        }
    }
}
