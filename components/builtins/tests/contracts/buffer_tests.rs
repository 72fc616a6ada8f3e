//! Contract tests for Buffer

use bytecode_system::OpCode;
use core_types::Value;
use interpreter::FunctionBuilder;

use super::{call_global, run, run_shown, setup, text};

#[test]
fn test_buffer_from_string_round_trips() {
    let (mut vm, output) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Buffer")
        .string("hi")
        .call(1)
        .define_global("b")
        .get_global("b")
        .invoke("asArray", 0)
        .op(OpCode::Print)
        .get_global("b")
        .invoke("asString", 0)
        .op(OpCode::Return);
    assert_eq!(run_shown(&mut vm, script), "hi");
    assert_eq!(output.text(), "Array(104, 105)\n");
}

#[test]
fn test_buffer_from_array() {
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Buffer")
        .get_global("Array")
        .number(72.0)
        .number(105.0)
        .call(2)
        .call(1)
        .invoke("asString", 0)
        .op(OpCode::Return);
    assert_eq!(run_shown(&mut vm, script), "Hi");
}

#[test]
fn test_buffer_from_array_with_bad_byte_is_nil() {
    let (mut vm, _) = setup();
    let array = vm.alloc(memory_manager::Object::Array(vec![Value::number(300.0)]));
    let result = call_global(&mut vm, "Buffer", &[Value::object(array)]).unwrap();
    assert_eq!(result, Value::NIL);
}

#[test]
fn test_set_get_length() {
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Buffer")
        .number(4.0)
        .call(1)
        .define_global("b")
        .get_global("b")
        .number(2.0)
        .number(9.0)
        .invoke("set", 2)
        .op(OpCode::Pop)
        .get_global("b")
        .number(2.0)
        .invoke("get", 1)
        .get_global("b")
        .invoke("length", 0)
        .op(OpCode::Add)
        .op(OpCode::Return);
    assert_eq!(run(&mut vm, script).unwrap(), Value::number(13.0));
}

#[test]
fn test_append_returns_receiver() {
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Buffer")
        .string("ab")
        .call(1)
        .get_global("Buffer")
        .string("cd")
        .call(1)
        .invoke("append", 1)
        .invoke("asString", 0)
        .op(OpCode::Return);
    assert_eq!(run_shown(&mut vm, script), "abcd");
}

#[test]
fn test_buffer_prints_size() {
    let (mut vm, _) = setup();
    let source = text(&mut vm, "xyz");
    let buffer = call_global(&mut vm, "Buffer", &[source]).unwrap();
    assert_eq!(vm.format_value(buffer), "<buffer 3>");
    let empty = call_global(&mut vm, "Buffer", &[]).unwrap();
    assert_eq!(vm.format_value(empty), "<buffer 0>");
}
