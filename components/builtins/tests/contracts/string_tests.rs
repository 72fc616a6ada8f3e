//! Contract tests for String methods

use bytecode_system::OpCode;
use core_types::Value;
use interpreter::{FunctionBuilder, Vm};

use super::{run, run_shown, setup, setup_stressed};

/// Runs `receiver.method(args...)` and returns the printable result
fn string_method(vm: &mut Vm, receiver: &str, method: &str, args: &[Value]) -> String {
    let mut script = FunctionBuilder::script();
    script.string(receiver);
    for arg in args {
        match arg.as_number() {
            Some(n) => script.number(n),
            None => script.op(OpCode::Nil),
        };
    }
    script.invoke(method, args.len() as u8).op(OpCode::Return);
    run_shown(vm, script)
}

/// Runs `receiver.method(text args...)`
fn string_method_str(vm: &mut Vm, receiver: &str, method: &str, args: &[&str]) -> String {
    let mut script = FunctionBuilder::script();
    script.string(receiver);
    for arg in args {
        script.string(arg);
    }
    script.invoke(method, args.len() as u8).op(OpCode::Return);
    run_shown(vm, script)
}

#[test]
fn test_length_and_get() {
    let (mut vm, _) = setup();
    assert_eq!(string_method(&mut vm, "hello", "length", &[]), "5");
    assert_eq!(string_method(&mut vm, "", "length", &[]), "0");
    assert_eq!(string_method(&mut vm, "hello", "get", &[Value::number(1.0)]), "e");
    assert_eq!(string_method(&mut vm, "hello", "get", &[Value::number(9.0)]), "nil");
    assert_eq!(string_method(&mut vm, "hello", "get", &[Value::NIL]), "nil");
}

#[test]
fn test_find() {
    let (mut vm, _) = setup();
    assert_eq!(string_method_str(&mut vm, "hello", "find", &["ll"]), "2");
    assert_eq!(string_method_str(&mut vm, "hello", "find", &["xyz"]), "nil");
    assert_eq!(string_method(&mut vm, "hello", "find", &[Value::number(1.0)]), "nil");
}

#[test]
fn test_substring() {
    let (mut vm, _) = setup();
    let sub = |vm: &mut Vm, start: f64, len: f64| {
        string_method(vm, "interpreter", "substring", &[Value::number(start), Value::number(len)])
    };
    assert_eq!(sub(&mut vm, 0.0, 5.0), "inter");
    assert_eq!(sub(&mut vm, 5.0, 100.0), "preter");
    assert_eq!(sub(&mut vm, 11.0, 1.0), "");
    assert_eq!(sub(&mut vm, 12.0, 1.0), "nil");
    assert_eq!(sub(&mut vm, -1.0, 1.0), "nil");
}

#[test]
fn test_split() {
    let (mut vm, _) = setup();
    assert_eq!(string_method_str(&mut vm, "a,b,,c", "split", &[","]), "Array(a, b, , c)");
    assert_eq!(string_method_str(&mut vm, "a--b", "split", &["--"]), "Array(a, b)");
    assert_eq!(string_method_str(&mut vm, "abc", "split", &[""]), "Array(abc)");
    assert_eq!(string_method_str(&mut vm, "abc", "split", &[";"]), "Array(abc)");
}

#[test]
fn test_split_pieces_are_interned() {
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .string("x y")
        .string(" ")
        .invoke("split", 1)
        .number(1.0)
        .invoke("get", 1)
        .string("y")
        .op(OpCode::Equal)
        .op(OpCode::Return);
    assert_eq!(run(&mut vm, script).unwrap(), Value::TRUE);
}

#[test]
fn test_replace_every_occurrence() {
    let (mut vm, _) = setup();
    assert_eq!(string_method_str(&mut vm, "a-b-c", "replace", &["-", "+"]), "a+b+c");
    assert_eq!(string_method_str(&mut vm, "abc", "replace", &["c", "!"]), "ab!");
    assert_eq!(string_method_str(&mut vm, "aaaa", "replace", &["aa", "b"]), "bb");
    assert_eq!(string_method_str(&mut vm, "abc", "replace", &["z", "!"]), "abc");
    assert_eq!(string_method_str(&mut vm, "abc", "replace", &["", "!"]), "abc");
    assert_eq!(string_method_str(&mut vm, "", "replace", &["a", "b"]), "");
}

#[test]
fn test_replace_survives_stress_collection() {
    let (mut vm, _) = setup_stressed();
    assert_eq!(
        string_method_str(&mut vm, "one two three", "replace", &[" ", "_"]),
        "one_two_three"
    );
}

#[test]
fn test_method_read_as_property() {
    let (mut vm, _) = setup();
    // var f = "abc".length; return f();
    let mut script = FunctionBuilder::script();
    script
        .string("abc")
        .get_property("length")
        .define_global("f")
        .get_global("f")
        .call(0)
        .op(OpCode::Return);
    assert_eq!(run(&mut vm, script).unwrap(), Value::number(3.0));
    let f = vm.get_global("f").unwrap();
    assert_eq!(vm.format_value(f), "<bound native fn>");
}
