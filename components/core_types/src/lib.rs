//! Core value and error types for the bytecode interpreter.
//!
//! # Overview
//!
//! - [`Value`] - NaN-boxed scalar (nil, bool, number, object reference)
//! - [`ObjRef`] - Generational handle to a heap object
//! - [`RuntimeError`] - Runtime failure with a frame-by-frame traceback
//! - [`InterpretError`] - Compile or runtime failure of a whole program
//! - [`format_number`] - `%g` style number printing
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, RuntimeError, Value};
//!
//! let n = Value::number(42.0);
//! assert_eq!(n.as_number(), Some(42.0));
//!
//! let error = RuntimeError::new(ErrorKind::Type, "Operand must be a number.");
//! assert_eq!(error.to_string(), "Operand must be a number.");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod number;
mod source;
mod value;

pub use error::{CompileError, ErrorKind, InterpretError, RuntimeError};
pub use number::{format_number, format_number_with_precision};
pub use source::StackFrame;
pub use value::{ObjRef, Value, ValueKind};
