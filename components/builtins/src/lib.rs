//! Standard native library
//!
//! This crate installs the globals scripts expect to find:
//! - `clock`, `randN`, `getEnvVar` and `systemImport`
//! - `log`, `logln`, `scanToEOF` and `printMethods`
//! - JSON `parse` and `stringify`
//! - The `Object` class and instance-field reflection
//! - `Array` and `Buffer` constructors with their methods, and the
//!   methods every string answers to
//! - The interpreted prelude behind `filter`, `map`, `forEach`, `slice`
//!   and `replace`
//!
//! Built-in natives report malformed calls (wrong argument count or
//! type) by returning `nil` rather than raising a runtime error.
//!
//! # Example
//!
//! ```
//! use bytecode_system::OpCode;
//! use interpreter::{FunctionBuilder, Vm};
//!
//! let mut vm = Vm::new();
//! builtins::install(&mut vm).unwrap();
//!
//! // Array(1, 2, 3).count()
//! let mut script = FunctionBuilder::script();
//! script
//!     .get_global("Array")
//!     .number(1.0)
//!     .number(2.0)
//!     .number(3.0)
//!     .call(3)
//!     .invoke("count", 0)
//!     .op(OpCode::Return);
//!
//! let function = script.build(&mut vm).unwrap();
//! let count = vm.run_function(function).unwrap();
//! assert_eq!(count.as_number(), Some(3.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod array;
mod buffer;
mod console;
mod json;
mod object;
mod prelude;
mod string;
mod system;
mod value;

use bytecode_system::ChunkError;
use interpreter::Vm;

/// Installs the whole library into a VM
///
/// Natives are registered first so the prelude routines can refer to
/// them by name.
///
/// # Errors
///
/// Fails only if a prelude routine cannot be assembled.
pub fn install(vm: &mut Vm) -> Result<(), ChunkError> {
    object::install(vm);
    array::install(vm);
    string::install(vm);
    buffer::install(vm);
    json::install(vm);
    console::install(vm);
    system::install(vm);
    prelude::install(vm)?;
    log::debug!("standard library installed");
    Ok(())
}

/// JSON text of a value, as the `stringify` native renders it
///
/// Returns `None` for values with no JSON form, such as functions.
pub fn stringify(vm: &Vm, value: core_types::Value) -> Option<String> {
    json::to_json(vm.heap(), value)
}
