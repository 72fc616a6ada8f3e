//! Bytecode system for the interpreter
//!
//! This crate provides the instruction set, the chunk container that
//! compilers emit into, and a textual disassembler.
//!
//! # Features
//!
//! - Single-byte opcodes with byte or big-endian `u16` operands
//! - Pooled constants and a per-byte line table
//! - Jump emission and back-patching
//! - Classic `0000  123 OP_NAME` disassembly listings
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Chunk, OpCode};
//! use core_types::Value;
//!
//! let mut chunk = Chunk::new();
//! chunk.write_constant(Value::number(42.0), 1).unwrap();
//! chunk.write_op(OpCode::Return, 1);
//!
//! assert_eq!(chunk.code.len(), 3);
//! assert_eq!(chunk.constants.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod disassembler;
pub mod opcode;

// Re-export main types at crate root
pub use chunk::{Chunk, ChunkError};
pub use disassembler::{disassemble_chunk, disassemble_instruction, ConstantDescriber};
pub use opcode::{OpCode, OperandShape, UpvalueDescriptor};
