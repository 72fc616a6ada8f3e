//! Bytecode interpreter core
//!
//! This crate provides the virtual machine that runs compiled functions:
//! - Stack-based dispatch loop over single-byte opcodes
//! - Call frames with arity checks and a fixed depth limit
//! - Closures with upvalues that are shared while open and closed on return
//! - Classes, instances, bound methods and single inheritance
//! - A native bridge, including natives that tail-call interpreted code
//! - Garbage collection roots and scoped pinning for host code
//! - Native modules and pluggable compiler/execution backends
//!
//! # Example
//!
//! ```
//! use interpreter::{FunctionBuilder, Vm};
//! use bytecode_system::OpCode;
//! use core_types::Value;
//!
//! let mut vm = Vm::new();
//! let mut script = FunctionBuilder::script();
//! script
//!     .number(42.0)
//!     .define_global("answer")
//!     .get_global("answer")
//!     .op(OpCode::Return);
//!
//! let function = script.build(&mut vm).unwrap();
//! assert_eq!(vm.run_function(function).unwrap(), Value::number(42.0));
//! assert_eq!(vm.get_global("answer"), Some(Value::number(42.0)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembler;
pub mod backend;
pub mod call;
pub mod call_frame;
pub mod debug;
pub mod dispatch;
pub mod gc_integration;
pub mod module;
pub mod native;
pub mod upvalue;
pub mod vm;

// Re-export main types at crate root
pub use assembler::{Constant, FunctionBuilder, Label};
pub use backend::{BackendOutcome, Compiler, ExecutionBackend};
pub use call::CallOutcome;
pub use call_frame::CallFrame;
pub use gc_integration::{Pinned, RootMark};
pub use module::{ModuleInit, ModuleRegistrar};
pub use native::{NativeError, NativeFn};
pub use vm::{Vm, VmConfig, FRAMES_MAX, STACK_MAX};
