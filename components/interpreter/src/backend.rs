//! Pluggable front and back ends
//!
//! The VM does not parse source text itself; a [`Compiler`] turns source
//! into a function object. An [`ExecutionBackend`] may take over closure
//! calls, for instance to run them as native code, and must leave the VM
//! in the same state the dispatch loop would.

use core_types::{CompileError, ObjRef, Value};

use crate::native::NativeError;
use crate::vm::Vm;

/// Source-to-bytecode compiler used by [`Vm::interpret`].
pub trait Compiler {
    /// Compiles a whole program into a zero-arity function.
    ///
    /// Objects created while compiling must stay rooted (see
    /// [`Vm::add_root`]) until the returned function is in use.
    fn compile(&mut self, source: &str, vm: &mut Vm) -> Result<ObjRef, CompileError>;
}

/// Result of offering a call to an [`ExecutionBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendOutcome {
    /// The backend cannot run this closure; the interpreter will
    Unsupported,
    /// The backend ran the call to completion with this result
    Returned(Value),
}

/// Alternative executor consulted before a closure frame is pushed.
pub trait ExecutionBackend {
    /// Runs `closure` whose callee slot and `argc` arguments are on top of
    /// the stack.
    ///
    /// The backend must not pop the arguments; on `Returned` the VM
    /// replaces the callee and arguments with the result.
    fn execute(&mut self, vm: &mut Vm, closure: ObjRef, argc: u8) -> Result<BackendOutcome, NativeError>;
}
