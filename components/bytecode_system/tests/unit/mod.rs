//! Unit tests for chunk emission

use bytecode_system::{Chunk, ChunkError, OpCode, UpvalueDescriptor};
use core_types::Value;

// ============================================================================
// Chunk Tests
// ============================================================================

#[test]
fn test_chunk_creation() {
    let chunk = Chunk::new();
    assert!(chunk.code.is_empty());
    assert!(chunk.constants.is_empty());
    assert!(chunk.lines.is_empty());
}

#[test]
fn test_chunk_line_table_parallel_to_code() {
    let mut chunk = Chunk::new();
    chunk.write_constant(Value::number(1.0), 10).unwrap();
    chunk.write_op(OpCode::Print, 11);
    assert_eq!(chunk.code.len(), chunk.lines.len());
    assert_eq!(chunk.lines, vec![10, 10, 11]);
}

#[test]
fn test_chunk_upvalue_pairs() {
    let mut chunk = Chunk::new();
    chunk.write_upvalue(UpvalueDescriptor::new(true, 3), 1);
    chunk.write_upvalue(UpvalueDescriptor::new(false, 7), 1);
    assert_eq!(chunk.code, vec![1, 3, 0, 7]);
}

#[test]
fn test_chunk_reuses_identical_object_constants() {
    let mut chunk = Chunk::new();
    let obj = Value::object(core_types::ObjRef::new(4, 0));
    assert_eq!(chunk.add_constant(obj), Ok(0));
    assert_eq!(chunk.add_constant(Value::TRUE), Ok(1));
    assert_eq!(chunk.add_constant(obj), Ok(0));
}

#[test]
fn test_chunk_loop_too_large() {
    let mut chunk = Chunk::new();
    chunk.code.resize(70_000, OpCode::Nil as u8);
    chunk.lines.resize(70_000, 1);
    assert_eq!(chunk.emit_loop(0, 1), Err(ChunkError::LoopTooLarge));
}

#[test]
fn test_chunk_heap_size_counts_buffers() {
    let mut chunk = Chunk::new();
    assert_eq!(chunk.heap_size(), 0);
    chunk.write_op(OpCode::Nil, 1);
    assert!(chunk.heap_size() >= 1 + std::mem::size_of::<u32>());
}
