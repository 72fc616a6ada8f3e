//! Interpreter error types.
//!
//! Execution has exactly three outcomes: success, a compile error reported
//! by the external compiler, or a runtime error raised by the VM.

use crate::StackFrame;
use thiserror::Error;

/// Classification of a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand of the wrong type for an operator
    Type,
    /// Read or assignment of an undefined global
    UndefinedVariable,
    /// Lookup of a missing field or method
    UndefinedProperty,
    /// Wrong number of arguments
    Arity,
    /// Call on a value that is neither a function nor a class
    NotCallable,
    /// Frame array exhausted
    StackOverflow,
    /// Failure reported by a native function
    Native,
    /// Malformed instruction stream
    InvalidBytecode,
}

/// A runtime error with the call stack captured at the point of failure.
///
/// `Display` renders only the message; [`RuntimeError::traceback`] adds the
/// frames.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Call stack at the time of the error, innermost frame first
    pub stack: Vec<StackFrame>,
}

impl RuntimeError {
    /// Creates an error without a traceback.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Message followed by one `[line N] in ...` line per frame.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::{ErrorKind, RuntimeError, StackFrame};
    ///
    /// let mut err = RuntimeError::new(ErrorKind::StackOverflow, "Stack overflow.");
    /// err.stack.push(StackFrame { function_name: Some("f".into()), line: 2 });
    /// err.stack.push(StackFrame { function_name: None, line: 5 });
    /// assert_eq!(err.traceback(), "Stack overflow.\n[line 2] in f()\n[line 5] in script");
    /// ```
    pub fn traceback(&self) -> String {
        let mut out = self.message.clone();
        for frame in &self.stack {
            out.push('\n');
            out.push_str(&frame.to_string());
        }
        out
    }
}

/// Failure signal from an external compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .messages.join("\n"))]
pub struct CompileError {
    /// Diagnostics in the order they were reported
    pub messages: Vec<String>,
}

impl CompileError {
    /// Creates a compile error with a single diagnostic.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

/// Result of interpreting a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretError {
    /// The compiler rejected the source
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// Execution failed
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Conventional process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpretError::Compile(_) => 65,
            InterpretError::Runtime(_) => 70,
        }
    }
}
