//! Contract tests for the bytecode encoding shared with external compilers

use bytecode_system::{disassemble_chunk, Chunk, ConstantDescriber, OpCode, OperandShape};
use core_types::Value;

struct Plain;

impl ConstantDescriber for Plain {
    fn describe(&self, value: Value) -> String {
        format!("{:?}", value)
    }

    fn upvalue_count(&self, _value: Value) -> usize {
        0
    }
}

#[test]
fn test_contract_opcode_bytes_are_stable_within_a_build() {
    assert_eq!(OpCode::Not as u8, 0);
    assert_eq!(OpCode::Return as u8, 11);
    assert_eq!(OpCode::Constant as u8, 12);
    assert_eq!(OpCode::Method as u8, 37);
}

#[test]
fn test_contract_every_opcode_has_a_mnemonic() {
    for op in OpCode::ALL {
        assert!(op.mnemonic().starts_with("OP_"));
    }
}

#[test]
fn test_contract_jumps_use_two_operand_bytes() {
    for op in [OpCode::Jump, OpCode::JumpIfFalse, OpCode::Loop] {
        assert!(matches!(
            op.operands(),
            OperandShape::JumpForward | OperandShape::JumpBackward
        ));
    }
}

#[test]
fn test_contract_disassembly_walks_every_instruction() {
    let mut chunk = Chunk::new();
    chunk.write_op(OpCode::Nil, 1);
    chunk.write_op(OpCode::GetLocal, 1);
    chunk.write(1, 1);
    chunk.write_op(OpCode::Invoke, 2);
    chunk.write(0, 2);
    chunk.write(2, 2);
    chunk.add_constant(Value::number(7.0)).unwrap();
    chunk.write_op(OpCode::Return, 3);

    let listing = disassemble_chunk(&chunk, "script", &Plain);
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines[0], "== script ==");
    assert_eq!(lines.len(), 5);
    assert!(lines[3].contains("OP_INVOKE        (2 args)    0 '7'"));
    assert!(lines[4].ends_with("OP_RETURN"));
}
