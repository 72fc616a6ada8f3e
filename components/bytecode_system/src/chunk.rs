//! Bytecode chunk - compiled bytecode container
//!
//! A chunk holds the raw instruction bytes, the constant pool and a line
//! table with one entry per code byte.

use crate::opcode::{OpCode, UpvalueDescriptor};
use core_types::Value;
use thiserror::Error;

/// Errors raised while emitting bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// Constant pool exceeded the `u16` index space
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    /// Forward jump distance does not fit in a `u16`
    #[error("Too much code to jump over.")]
    JumpTooLarge,
    /// Backward jump distance does not fit in a `u16`
    #[error("Loop body too large.")]
    LoopTooLarge,
}

/// A compiled bytecode chunk containing instructions and constants
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// Instruction stream
    pub code: Vec<u8>,
    /// Constant pool for literal values
    pub constants: Vec<Value>,
    /// Source line of each byte in `code`
    pub lines: Vec<u32>,
}

impl Chunk {
    /// Create a new empty bytecode chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw byte tagged with its source line
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append an opcode
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Append an upvalue descriptor pair after a `Closure` instruction
    pub fn write_upvalue(&mut self, upvalue: UpvalueDescriptor, line: u32) {
        self.write(upvalue.is_local as u8, line);
        self.write(upvalue.index, line);
    }

    /// Add a constant to the pool and return its index.
    ///
    /// A value already in the pool is reused. Numbers are matched by bit
    /// pattern so `0` and `-0` stay distinct.
    pub fn add_constant(&mut self, value: Value) -> Result<usize, ChunkError> {
        if let Some(index) = self
            .constants
            .iter()
            .position(|c| c.to_bits() == value.to_bits())
        {
            return Ok(index);
        }
        if self.constants.len() > u16::MAX as usize {
            return Err(ChunkError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    /// Emit a load of `value`, choosing `Constant` or `ConstantLong` by index
    pub fn write_constant(&mut self, value: Value, line: u32) -> Result<(), ChunkError> {
        let index = self.add_constant(value)?;
        if let Ok(byte) = u8::try_from(index) {
            self.write_op(OpCode::Constant, line);
            self.write(byte, line);
        } else {
            let [hi, lo] = (index as u16).to_be_bytes();
            self.write_op(OpCode::ConstantLong, line);
            self.write(hi, line);
            self.write(lo, line);
        }
        Ok(())
    }

    /// Emit a forward jump with a placeholder distance; returns the offset of
    /// the distance bytes for [`Chunk::patch_jump`].
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        self.write(0xff, line);
        self.write(0xff, line);
        self.code.len() - 2
    }

    /// Point a previously emitted jump at the current end of the code
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), ChunkError> {
        let distance = self.code.len() - offset - 2;
        let distance = u16::try_from(distance).map_err(|_| ChunkError::JumpTooLarge)?;
        let [hi, lo] = distance.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
        Ok(())
    }

    /// Emit a backward jump to `loop_start`
    pub fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), ChunkError> {
        self.write_op(OpCode::Loop, line);
        let distance = self.code.len() - loop_start + 2;
        let distance = u16::try_from(distance).map_err(|_| ChunkError::LoopTooLarge)?;
        let [hi, lo] = distance.to_be_bytes();
        self.write(hi, line);
        self.write(lo, line);
        Ok(())
    }

    /// Read a big-endian `u16` operand
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.code[offset], self.code[offset + 1]])
    }

    /// Source line of the byte at `offset`, or 0 when out of range
    pub fn line_at(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Bytes owned by this chunk, for heap accounting
    pub fn heap_size(&self) -> usize {
        self.code.capacity()
            + self.constants.capacity() * std::mem::size_of::<Value>()
            + self.lines.capacity() * std::mem::size_of::<u32>()
    }
}
