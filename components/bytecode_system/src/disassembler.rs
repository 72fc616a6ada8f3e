//! Textual disassembler
//!
//! Constants are opaque to this crate, so rendering them is delegated to a
//! [`ConstantDescriber`] supplied by whoever owns the heap.

use crate::chunk::Chunk;
use crate::opcode::{OpCode, OperandShape};
use core_types::Value;
use std::fmt::Write;

/// Renders constant-pool entries for the disassembler.
pub trait ConstantDescriber {
    /// Printable form of a constant
    fn describe(&self, value: Value) -> String;

    /// Number of upvalue descriptor pairs following a `Closure` whose
    /// function constant is `value`
    fn upvalue_count(&self, value: Value) -> usize;
}

/// Disassemble a whole chunk under a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str, constants: &dyn ConstantDescriber) -> String {
    let mut out = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (text, next) = disassemble_instruction(chunk, offset, constants);
        out.push_str(&text);
        out.push('\n');
        offset = next;
    }
    out
}

/// Disassemble the instruction at `offset`.
///
/// # Returns
///
/// The rendered line(s) and the offset of the next instruction.
pub fn disassemble_instruction(
    chunk: &Chunk,
    offset: usize,
    constants: &dyn ConstantDescriber,
) -> (String, usize) {
    let mut out = format!("{:04} ", offset);
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        out.push_str("   | ");
    } else {
        let _ = write!(out, "{:4} ", chunk.line_at(offset));
    }

    let byte = chunk.code[offset];
    let op = match OpCode::from_byte(byte) {
        Some(op) => op,
        None => {
            let _ = write!(out, "Unknown opcode {}", byte);
            return (out, offset + 1);
        }
    };
    let name = op.mnemonic();
    let operand = |i: usize| chunk.code.get(offset + i).copied().unwrap_or(0);
    let constant = |index: usize| match chunk.constants.get(index) {
        Some(value) => constants.describe(*value),
        None => "<bad constant>".to_string(),
    };

    let next = match op.operands() {
        OperandShape::None => {
            out.push_str(name);
            offset + 1
        }
        OperandShape::Byte => {
            let _ = write!(out, "{:<16} {:4}", name, operand(1));
            offset + 2
        }
        OperandShape::Constant => {
            let index = operand(1) as usize;
            let _ = write!(out, "{:<16} {:4} '{}'", name, index, constant(index));
            offset + 2
        }
        OperandShape::ConstantLong => {
            let index = u16::from_be_bytes([operand(1), operand(2)]) as usize;
            let _ = write!(out, "{:<16} {:4} '{}'", name, index, constant(index));
            offset + 3
        }
        OperandShape::Invoke => {
            let index = operand(1) as usize;
            let _ = write!(
                out,
                "{:<16} ({} args) {:4} '{}'",
                name,
                operand(2),
                index,
                constant(index)
            );
            offset + 3
        }
        OperandShape::JumpForward | OperandShape::JumpBackward => {
            let distance = u16::from_be_bytes([operand(1), operand(2)]) as usize;
            let target = if op.operands() == OperandShape::JumpForward {
                offset + 3 + distance
            } else {
                (offset + 3).saturating_sub(distance)
            };
            let _ = write!(out, "{:<16} {:4} -> {}", name, offset, target);
            offset + 3
        }
        OperandShape::Closure => {
            let index = operand(1) as usize;
            let _ = write!(out, "{:<16} {:4} {}", name, index, constant(index));
            let count = chunk
                .constants
                .get(index)
                .map(|v| constants.upvalue_count(*v))
                .unwrap_or(0);
            let mut cursor = offset + 2;
            for _ in 0..count {
                let is_local = chunk.code.get(cursor).copied().unwrap_or(0);
                let slot = chunk.code.get(cursor + 1).copied().unwrap_or(0);
                let _ = write!(
                    out,
                    "\n{:04}      |                     {} {}",
                    cursor,
                    if is_local == 1 { "local" } else { "upvalue" },
                    slot
                );
                cursor += 2;
            }
            cursor
        }
    };
    (out, next)
}
