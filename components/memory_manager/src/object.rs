//! Heap object model.
//!
//! Every heap record is one variant of [`Object`]. Objects refer to each other
//! only through [`ObjRef`] handles, so arbitrary cycles are fine; liveness is
//! decided by the tracing collector in [`crate::gc`].

use crate::table::Table;
use bytecode_system::Chunk;
use core_types::{ObjRef, Value};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::mem::size_of;

/// Type tag of a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// Receiver paired with a closure
    BoundMethod,
    /// Class with a method table
    Class,
    /// Class instance with a field table
    Instance,
    /// Function plus captured variables
    Closure,
    /// Compiled function
    Function,
    /// Host-implemented function
    Native,
    /// Interned immutable byte string
    String,
    /// Captured variable
    Upvalue,
    /// Growable sequence of values
    Array,
    /// Receiver paired with a native function
    BoundNative,
    /// Growable sequence of bytes
    Buffer,
    /// Opaque handle to an external resource
    Ref,
}

impl ObjKind {
    /// Type name used for synthesized native method keys (`"Array.push"`).
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::BoundMethod => "BoundMethod",
            ObjKind::Class => "Class",
            ObjKind::Instance => "Instance",
            ObjKind::Closure => "Closure",
            ObjKind::Function => "Function",
            ObjKind::Native => "Native",
            ObjKind::String => "String",
            ObjKind::Upvalue => "Upvalue",
            ObjKind::Array => "Array",
            ObjKind::BoundNative => "BoundNative",
            ObjKind::Buffer => "Buffer",
            ObjKind::Ref => "Ref",
        }
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of a host function in the VM's native registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// 32-bit FNV-1a hash used for string interning.
///
/// # Examples
///
/// ```
/// use memory_manager::hash_bytes;
///
/// assert_eq!(hash_bytes(b""), 2166136261);
/// assert_eq!(hash_bytes(b"a"), 0xe40c292c);
/// ```
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Immutable byte string with its cached hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoxString {
    bytes: Box<[u8]>,
    hash: u32,
}

impl LoxString {
    /// Copies `bytes` and computes their hash.
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.into(),
            hash: hash_bytes(bytes),
        }
    }

    /// Raw content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content as UTF-8, replacing invalid sequences.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Cached FNV-1a hash.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for the empty string.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Compiled function.
#[derive(Debug, Clone, Default)]
pub struct Function {
    /// Declared parameter count
    pub arity: u8,
    /// Number of variables captured by closures over this function
    pub upvalue_count: usize,
    /// Bytecode, constants and line table
    pub chunk: Chunk,
    /// Function name; `None` for the top-level script
    pub name: Option<ObjRef>,
}

/// Function instance with resolved captures.
#[derive(Debug, Clone)]
pub struct Closure {
    /// The shared function
    pub function: ObjRef,
    /// One upvalue per captured variable
    pub upvalues: Box<[ObjRef]>,
}

/// Where a captured variable currently lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueState {
    /// Still on the value stack at this absolute slot
    Open(usize),
    /// Moved off the stack after the defining frame returned
    Closed(Value),
}

/// Captured variable.
#[derive(Debug, Clone)]
pub struct Upvalue {
    /// Open or closed storage
    pub state: UpvalueState,
    /// Next entry of the VM's open-upvalue list (descending slot order)
    pub next: Option<ObjRef>,
}

/// Class with its method dictionary.
#[derive(Debug, Clone)]
pub struct Class {
    /// Class name string
    pub name: ObjRef,
    /// Method name to closure or native
    pub methods: Table,
}

/// Instance of a class.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The instance's class
    pub class: ObjRef,
    /// Field name to value
    pub fields: Table,
}

/// Method bound to a receiver by property access.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    /// Value that becomes slot 0 of the call
    pub receiver: Value,
    /// Closure to call
    pub method: ObjRef,
}

/// Host function.
#[derive(Debug, Clone, Copy)]
pub struct Native {
    /// Name string, used by diagnostics
    pub name: ObjRef,
    /// Registry index of the host function
    pub id: NativeId,
    /// Whether the function pushes an interpreted frame instead of returning
    pub calls_lox: bool,
}

/// Host function bound to a receiver.
#[derive(Debug, Clone, Copy)]
pub struct BoundNative {
    /// Receiver passed to the function
    pub receiver: Value,
    /// Registry index of the host function
    pub id: NativeId,
    /// Whether the function pushes an interpreted frame instead of returning
    pub calls_lox: bool,
}

/// Destructor invoked on a [`ExternalRef`] payload when it is collected.
pub type RefDestructor = fn(Box<dyn Any>);

/// Opaque handle to a resource owned outside the object model.
///
/// The destructor runs exactly once, when the object is swept or the heap
/// is dropped.
pub struct ExternalRef {
    /// Type tag chosen by the owner
    pub tag: String,
    /// Human-readable description
    pub description: String,
    payload: Option<Box<dyn Any>>,
    dispose: Option<RefDestructor>,
}

impl ExternalRef {
    /// Wraps a payload with an optional destructor.
    pub fn new(
        tag: impl Into<String>,
        description: impl Into<String>,
        payload: Box<dyn Any>,
        dispose: Option<RefDestructor>,
    ) -> Self {
        Self {
            tag: tag.into(),
            description: description.into(),
            payload: Some(payload),
            dispose,
        }
    }

    /// Borrows the payload as `T`.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref())
    }

    /// Mutably borrows the payload as `T`.
    pub fn payload_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.payload.as_mut().and_then(|p| p.downcast_mut())
    }
}

impl Drop for ExternalRef {
    fn drop(&mut self) {
        if let (Some(payload), Some(dispose)) = (self.payload.take(), self.dispose) {
            dispose(payload);
        }
    }
}

impl fmt::Debug for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalRef")
            .field("tag", &self.tag)
            .field("description", &self.description)
            .finish()
    }
}

/// A heap record.
#[derive(Debug)]
pub enum Object {
    /// See [`BoundMethod`]
    BoundMethod(BoundMethod),
    /// See [`Class`]
    Class(Class),
    /// See [`Instance`]
    Instance(Instance),
    /// See [`Closure`]
    Closure(Closure),
    /// See [`Function`]
    Function(Function),
    /// See [`Native`]
    Native(Native),
    /// See [`LoxString`]
    String(LoxString),
    /// See [`Upvalue`]
    Upvalue(Upvalue),
    /// Growable sequence of values
    Array(Vec<Value>),
    /// See [`BoundNative`]
    BoundNative(BoundNative),
    /// Growable sequence of bytes
    Buffer(Vec<u8>),
    /// See [`ExternalRef`]
    Ref(ExternalRef),
}

macro_rules! accessors {
    ($($variant:ident => $as_ref:ident, $as_mut:ident, $ty:ty;)*) => {
        $(
            #[doc = concat!("Borrows the object if it is a `", stringify!($variant), "`.")]
            pub fn $as_ref(&self) -> Option<&$ty> {
                match self {
                    Object::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            #[doc = concat!("Mutably borrows the object if it is a `", stringify!($variant), "`.")]
            pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                match self {
                    Object::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl Object {
    accessors! {
        String => as_string, as_string_mut, LoxString;
        Array => as_array, as_array_mut, Vec<Value>;
        Buffer => as_buffer, as_buffer_mut, Vec<u8>;
        Function => as_function, as_function_mut, Function;
        Closure => as_closure, as_closure_mut, Closure;
        Upvalue => as_upvalue, as_upvalue_mut, Upvalue;
        Class => as_class, as_class_mut, Class;
        Instance => as_instance, as_instance_mut, Instance;
        BoundMethod => as_bound_method, as_bound_method_mut, BoundMethod;
        Native => as_native, as_native_mut, Native;
        BoundNative => as_bound_native, as_bound_native_mut, BoundNative;
        Ref => as_external_ref, as_external_ref_mut, ExternalRef;
    }

    /// Type tag of this object.
    pub fn kind(&self) -> ObjKind {
        match self {
            Object::BoundMethod(_) => ObjKind::BoundMethod,
            Object::Class(_) => ObjKind::Class,
            Object::Instance(_) => ObjKind::Instance,
            Object::Closure(_) => ObjKind::Closure,
            Object::Function(_) => ObjKind::Function,
            Object::Native(_) => ObjKind::Native,
            Object::String(_) => ObjKind::String,
            Object::Upvalue(_) => ObjKind::Upvalue,
            Object::Array(_) => ObjKind::Array,
            Object::BoundNative(_) => ObjKind::BoundNative,
            Object::Buffer(_) => ObjKind::Buffer,
            Object::Ref(_) => ObjKind::Ref,
        }
    }

    /// Bytes charged to the allocator for this object: the record itself plus
    /// the capacity of any buffers it owns.
    pub fn heap_size(&self) -> usize {
        let payload = match self {
            Object::String(s) => s.len(),
            Object::Array(values) => values.capacity() * size_of::<Value>(),
            Object::Buffer(bytes) => bytes.capacity(),
            Object::Function(function) => function.chunk.heap_size(),
            Object::Closure(closure) => closure.upvalues.len() * size_of::<ObjRef>(),
            Object::Class(class) => class.methods.heap_size(),
            Object::Instance(instance) => instance.fields.heap_size(),
            Object::Ref(handle) => handle.tag.capacity() + handle.description.capacity(),
            Object::BoundMethod(_)
            | Object::Native(_)
            | Object::BoundNative(_)
            | Object::Upvalue(_) => 0,
        };
        size_of::<Object>() + payload
    }

    /// Pushes every object this one references onto `out`.
    pub fn trace(&self, out: &mut Vec<ObjRef>) {
        let mut value = |v: Value| {
            if let Some(obj) = v.as_object() {
                out.push(obj);
            }
        };
        match self {
            Object::BoundMethod(bound) => {
                value(bound.receiver);
                value(Value::object(bound.method));
            }
            Object::Class(class) => {
                value(Value::object(class.name));
                for (key, method) in class.methods.iter() {
                    value(Value::object(key.obj));
                    value(method);
                }
            }
            Object::Instance(instance) => {
                value(Value::object(instance.class));
                for (key, field) in instance.fields.iter() {
                    value(Value::object(key.obj));
                    value(field);
                }
            }
            Object::Closure(closure) => {
                value(Value::object(closure.function));
                for upvalue in closure.upvalues.iter() {
                    value(Value::object(*upvalue));
                }
            }
            Object::Function(function) => {
                if let Some(name) = function.name {
                    value(Value::object(name));
                }
                for constant in &function.chunk.constants {
                    value(*constant);
                }
            }
            Object::Upvalue(upvalue) => {
                if let UpvalueState::Closed(closed) = upvalue.state {
                    value(closed);
                }
            }
            Object::Array(values) => {
                for element in values {
                    value(*element);
                }
            }
            Object::Native(native) => value(Value::object(native.name)),
            Object::BoundNative(bound) => value(bound.receiver),
            Object::String(_) | Object::Buffer(_) | Object::Ref(_) => {}
        }
    }
}
