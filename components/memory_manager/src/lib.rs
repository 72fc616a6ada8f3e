//! Memory Manager - object heap and garbage collector
//!
//! This component provides:
//! - The heap object model (strings, arrays, buffers, functions, closures,
//!   upvalues, classes, instances, bound methods, natives, external refs)
//! - An open-addressed [`Table`] keyed by interned strings
//! - A generational-handle arena with an intrusive allocation list
//! - String interning with a weak intern set
//! - A stop-the-world mark-sweep collector driven by an allocation budget

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod display;
pub mod gc;
pub mod heap;
pub mod object;
pub mod table;

// Re-export main types
pub use config::GcConfig;
pub use display::OBJECT_CLASS_NAME;
pub use gc::{CollectionStats, GcStats, Marker, RootSource};
pub use heap::{Header, Heap};
pub use object::{
    hash_bytes, BoundMethod, BoundNative, Class, Closure, ExternalRef, Function, Instance,
    LoxString, Native, NativeId, ObjKind, Object, RefDestructor, Upvalue, UpvalueState,
};
pub use table::{StrKey, Table};
