//! Call protocol
//!
//! Every call site leaves the callee followed by `argc` arguments on the
//! stack. Depending on the callee this either pushes a new [`CallFrame`]
//! (closures, initializers, calls-lox natives) or replaces the callee and
//! arguments with a result right away (plain natives, classes without an
//! initializer, calls completed by an execution backend).

use core_types::{ErrorKind, ObjRef, RuntimeError, Value};
use memory_manager::{BoundMethod, BoundNative, Instance, Native, NativeId, ObjKind, Object, Table};

use crate::backend::BackendOutcome;
use crate::call_frame::CallFrame;
use crate::vm::Vm;

/// What a call did to the frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The result already replaced the callee and arguments
    Completed,
    /// A new frame was pushed; the dispatch loop must continue in it
    Entered,
}

#[derive(Clone, Copy)]
enum Callee {
    Bound(BoundMethod),
    Class,
    Closure,
    Native(Native),
    BoundNative(BoundNative),
    Other,
}

impl Vm {
    /// Calls the value at `stack[len - argc - 1]`.
    pub(crate) fn call_value(&mut self, callee: Value, argc: u8) -> Result<CallOutcome, RuntimeError> {
        let Some(obj) = callee.as_object() else {
            return Err(self.runtime_error(ErrorKind::NotCallable, "Can only call functions and classes."));
        };
        let slot = self.stack.len() - argc as usize - 1;
        let target = match self.heap.get(obj) {
            Object::BoundMethod(bound) => Callee::Bound(*bound),
            Object::Class(_) => Callee::Class,
            Object::Closure(_) => Callee::Closure,
            Object::Native(native) => Callee::Native(*native),
            Object::BoundNative(bound) => Callee::BoundNative(*bound),
            _ => Callee::Other,
        };

        match target {
            Callee::Bound(bound) => {
                self.stack[slot] = bound.receiver;
                self.call_method(Value::object(bound.method), argc)
            }
            Callee::Class => {
                let instance = self.alloc(Object::Instance(Instance {
                    class: obj,
                    fields: Table::new(),
                }));
                self.stack[slot] = Value::object(instance);
                let init_key = self.heap.key(self.init_string);
                let initializer = self
                    .heap
                    .get(obj)
                    .as_class()
                    .and_then(|class| class.methods.get(init_key));
                match initializer {
                    Some(initializer) => self.call_method(initializer, argc),
                    None if argc != 0 => Err(self.runtime_error(
                        ErrorKind::Arity,
                        format!("Expected 0 arguments but got {}.", argc),
                    )),
                    None => Ok(CallOutcome::Completed),
                }
            }
            Callee::Closure => self.call_closure(obj, argc),
            Callee::Native(native) => self.call_native(native.id, None, argc, native.calls_lox),
            Callee::BoundNative(bound) => {
                self.call_native(bound.id, Some(bound.receiver), argc, bound.calls_lox)
            }
            Callee::Other => Err(self.runtime_error(
                ErrorKind::NotCallable,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Calls a method whose receiver already sits in the callee slot.
    fn call_method(&mut self, method: Value, argc: u8) -> Result<CallOutcome, RuntimeError> {
        let receiver = self.peek(argc as usize);
        let native = method
            .as_object()
            .and_then(|obj| self.heap.get(obj).as_native().copied());
        match (method.as_object(), native) {
            (_, Some(native)) => self.call_native(native.id, Some(receiver), argc, native.calls_lox),
            (Some(obj), None) if matches!(self.heap.get(obj), Object::Closure(_)) => {
                self.call_closure(obj, argc)
            }
            _ => self.call_value(method, argc),
        }
    }

    /// Pushes a frame for `closure` after checking arity and depth.
    pub(crate) fn call_closure(&mut self, closure: ObjRef, argc: u8) -> Result<CallOutcome, RuntimeError> {
        let function = match self.heap.get(closure).as_closure() {
            Some(closure) => closure.function,
            None => {
                return Err(self.runtime_error(ErrorKind::NotCallable, "Can only call functions and classes."))
            }
        };
        let arity = self.heap.get(function).as_function().map_or(0, |f| f.arity);
        if argc != arity {
            return Err(self.runtime_error(
                ErrorKind::Arity,
                format!("Expected {} arguments but got {}.", arity, argc),
            ));
        }
        if self.frames.is_full() {
            return Err(self.runtime_error(ErrorKind::StackOverflow, "Stack overflow."));
        }

        let base = self.stack.len() - argc as usize - 1;
        if let Some(result) = self.try_backend(closure, argc)? {
            self.stack.truncate(base);
            self.push(result);
            return Ok(CallOutcome::Completed);
        }

        self.frames.push(CallFrame::new(closure, function, base));
        Ok(CallOutcome::Entered)
    }

    fn try_backend(&mut self, closure: ObjRef, argc: u8) -> Result<Option<Value>, RuntimeError> {
        let Some(mut backend) = self.backend.take() else {
            return Ok(None);
        };
        let outcome = backend.execute(self, closure, argc);
        self.backend = Some(backend);
        match outcome {
            Ok(BackendOutcome::Unsupported) => Ok(None),
            Ok(BackendOutcome::Returned(value)) => Ok(Some(value)),
            Err(error) => Err(self.native_failure(error)),
        }
    }

    /// Runs a host function with the arguments on top of the stack.
    pub(crate) fn call_native(
        &mut self,
        id: NativeId,
        receiver: Option<Value>,
        argc: u8,
        calls_lox: bool,
    ) -> Result<CallOutcome, RuntimeError> {
        let Some(function) = self.natives.get(id.0 as usize).map(|entry| entry.function) else {
            return Err(self.runtime_error(ErrorKind::Native, format!("Unknown native function #{}.", id.0)));
        };
        let base = self.stack.len() - argc as usize - 1;
        let args = self.stack[base + 1..].to_vec();
        let depth = self.frames.len();

        let result = function(self, receiver, &args);
        let value = match result {
            Ok(value) => value,
            Err(error) => return Err(self.native_failure(error)),
        };

        if calls_lox {
            // A backend may have finished the routine in place.
            return Ok(if self.frames.len() > depth {
                CallOutcome::Entered
            } else {
                CallOutcome::Completed
            });
        }
        self.stack.truncate(base);
        self.push(value);
        Ok(CallOutcome::Completed)
    }

    /// Calls method `name` on the receiver below the arguments.
    pub(crate) fn invoke(&mut self, name: ObjRef, argc: u8) -> Result<CallOutcome, RuntimeError> {
        let receiver = self.peek(argc as usize);
        let Some(obj) = receiver.as_object() else {
            return Err(self.runtime_error(ErrorKind::Type, "Only instances have methods."));
        };

        let (class, field) = match self.heap.get(obj) {
            Object::Instance(instance) => (
                Some(instance.class),
                instance.fields.get(self.heap.key(name)),
            ),
            _ => (None, None),
        };

        match (class, field) {
            (Some(_), Some(value)) => {
                let slot = self.stack.len() - argc as usize - 1;
                self.stack[slot] = value;
                self.call_value(value, argc)
            }
            (Some(class), None) => self.invoke_from_class(class, name, argc),
            (None, _) => {
                let kind = self.heap.get(obj).kind();
                match self.native_method(kind, name) {
                    Some(native) => {
                        self.call_native(native.id, Some(receiver), argc, native.calls_lox)
                    }
                    None => Err(self.runtime_error(ErrorKind::Type, "Only instances have methods.")),
                }
            }
        }
    }

    /// Calls `class`'s method `name` with the receiver already in place.
    pub(crate) fn invoke_from_class(
        &mut self,
        class: ObjRef,
        name: ObjRef,
        argc: u8,
    ) -> Result<CallOutcome, RuntimeError> {
        match self.find_method(class, name) {
            Some(method) => self.call_method(method, argc),
            None => Err(self.undefined_property(name)),
        }
    }

    /// Replaces the receiver on top of the stack with `class`'s method
    /// `name` bound to it.
    pub(crate) fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let Some(method) = self.find_method(class, name) else {
            return Err(self.undefined_property(name));
        };
        let receiver = self.peek(0);
        let bound = match method.as_object() {
            Some(obj) => match self.heap.get(obj) {
                Object::Native(native) => Object::BoundNative(BoundNative {
                    receiver,
                    id: native.id,
                    calls_lox: native.calls_lox,
                }),
                _ => Object::BoundMethod(BoundMethod {
                    receiver,
                    method: obj,
                }),
            },
            None => {
                self.pop();
                self.push(method);
                return Ok(());
            }
        };
        let bound = self.alloc(bound);
        self.pop();
        self.push(Value::object(bound));
        Ok(())
    }

    /// Replaces the receiver on top of the stack with the value of its
    /// property `name`.
    pub(crate) fn get_property(&mut self, name: ObjRef) -> Result<(), RuntimeError> {
        let receiver = self.peek(0);
        let Some(obj) = receiver.as_object() else {
            return Err(self.runtime_error(ErrorKind::Type, "Only instances have properties."));
        };

        let (class, field) = match self.heap.get(obj) {
            Object::Instance(instance) => (
                Some(instance.class),
                instance.fields.get(self.heap.key(name)),
            ),
            _ => (None, None),
        };

        match (class, field) {
            (Some(_), Some(value)) => {
                self.pop();
                self.push(value);
                Ok(())
            }
            (Some(class), None) => self.bind_method(class, name),
            (None, _) => {
                let kind = self.heap.get(obj).kind();
                let Some(native) = self.native_method(kind, name) else {
                    return Err(self.undefined_property(name));
                };
                let bound = self.alloc(Object::BoundNative(BoundNative {
                    receiver,
                    id: native.id,
                    calls_lox: native.calls_lox,
                }));
                self.pop();
                self.push(Value::object(bound));
                Ok(())
            }
        }
    }

    /// Stores the value on top of the stack into field `name` of the
    /// instance below it.
    ///
    /// Leaves the assigned value on the stack, or the instance when
    /// `shadowed` is set.
    pub(crate) fn set_property(&mut self, name: ObjRef, shadowed: bool) -> Result<(), RuntimeError> {
        let target = self.peek(1);
        let value = self.peek(0);
        let key = self.heap.key(name);
        let Some(obj) = target.as_object().filter(|obj| self.heap.get(*obj).as_instance().is_some()) else {
            return Err(self.runtime_error(ErrorKind::Type, "Only instances have fields."));
        };
        if let Some(instance) = self.heap.get_mut(obj).as_instance_mut() {
            instance.fields.set(key, value);
        }
        self.recharge(obj);

        self.pop();
        self.pop();
        self.push(if shadowed { target } else { value });
        Ok(())
    }

    /// Looks up a method in a class's method table.
    pub(crate) fn find_method(&self, class: ObjRef, name: ObjRef) -> Option<Value> {
        let key = self.heap.key(name);
        self.heap
            .get(class)
            .as_class()
            .and_then(|class| class.methods.get(key))
    }

    /// Native method registered for an object kind under `name`.
    ///
    /// Native methods live in the globals table under `"<Kind>.<name>"`;
    /// when that key was never interned no method can exist, so the lookup
    /// never allocates.
    pub(crate) fn native_method(&self, kind: ObjKind, name: ObjRef) -> Option<Native> {
        let method = self.heap.string_text(name)?;
        let key = format!("{}.{}", kind.name(), method);
        self.get_global(&key)
            .and_then(|value| value.as_object())
            .and_then(|obj| self.heap.get(obj).as_native().copied())
    }

    fn undefined_property(&mut self, name: ObjRef) -> RuntimeError {
        let text = self.heap.string_text(name).unwrap_or_default();
        self.runtime_error(ErrorKind::UndefinedProperty, format!("Undefined property '{}'.", text))
    }
}
