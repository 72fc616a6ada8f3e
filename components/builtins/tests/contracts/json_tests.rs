//! Contract tests for parse and stringify

use bytecode_system::OpCode;
use core_types::Value;
use interpreter::{FunctionBuilder, Vm};
use proptest::prelude::*;

use super::{call_global, run, setup, setup_stressed, text};

fn parse(vm: &mut Vm, source: &str) -> Value {
    let source = text(vm, source);
    call_global(vm, "parse", &[source]).unwrap()
}

fn stringify(vm: &mut Vm, value: Value) -> Option<String> {
    let result = call_global(vm, "stringify", &[value]).unwrap();
    vm.string_value(result)
}

// ============================================================================
// parse
// ============================================================================

#[test]
fn test_parse_scalars() {
    let (mut vm, _) = setup();
    assert_eq!(parse(&mut vm, "42"), Value::number(42.0));
    assert_eq!(parse(&mut vm, "-1.5e2"), Value::number(-150.0));
    assert_eq!(parse(&mut vm, "true"), Value::TRUE);
    assert_eq!(parse(&mut vm, "null"), Value::NIL);
    let s = parse(&mut vm, r#""a\"b""#);
    assert_eq!(vm.string_value(s).as_deref(), Some("a\"b"));
}

#[test]
fn test_parse_containers() {
    let (mut vm, _) = setup();
    let value = parse(&mut vm, r#"[1, "two", true, null, {"k": 3}]"#);
    assert_eq!(vm.format_value(value), "Array(1, two, true, nil, .{ k: 3 })");
}

#[test]
fn test_parsed_object_fields_are_reachable() {
    let (mut vm, _) = setup();
    let object = parse(&mut vm, r#"{"name": "lox", "tags": ["a", "b"]}"#);
    let key = text(&mut vm, "tags");
    let tags = call_global(&mut vm, "getInstanceFieldValueByKey", &[object, key]).unwrap();
    assert_eq!(vm.format_value(tags), "Array(a, b)");

    let fields = call_global(&mut vm, "getInstanceFields", &[object]).unwrap();
    let mut names: Vec<String> = vm
        .heap()
        .get(fields.as_object().unwrap())
        .as_array()
        .unwrap()
        .iter()
        .map(|name| vm.string_value(*name).unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["name", "tags"]);
}

#[test]
fn test_parse_rejects_bad_input() {
    let (mut vm, _) = setup();
    assert_eq!(parse(&mut vm, "{not json"), Value::NIL);
    assert_eq!(parse(&mut vm, ""), Value::NIL);
    assert_eq!(call_global(&mut vm, "parse", &[Value::number(1.0)]).unwrap(), Value::NIL);
    assert_eq!(call_global(&mut vm, "parse", &[]).unwrap(), Value::NIL);
}

#[test]
fn test_parse_nested_under_stress_collection() {
    let (mut vm, _) = setup_stressed();
    let value = parse(&mut vm, r#"{"a": [{"b": ["x", "y"]}, "z"]}"#);
    assert_eq!(vm.format_value(value), ".{ a: Array(.{ b: Array(x, y) }, z) }");
    assert!(vm.heap().stats().collections > 0);
}

// ============================================================================
// stringify
// ============================================================================

#[test]
fn test_stringify_scalars() {
    let (mut vm, _) = setup();
    assert_eq!(stringify(&mut vm, Value::NIL).as_deref(), Some("null"));
    assert_eq!(stringify(&mut vm, Value::FALSE).as_deref(), Some("false"));
    assert_eq!(stringify(&mut vm, Value::number(2.0)).as_deref(), Some("2"));
    assert_eq!(stringify(&mut vm, Value::number(0.1 + 0.2)).as_deref(), Some("0.3"));
    let quoted = text(&mut vm, "say \"hi\"");
    assert_eq!(stringify(&mut vm, quoted).as_deref(), Some(r#""say \"hi\"""#));
}

#[test]
fn test_stringify_containers() {
    let (mut vm, _) = setup();
    let value = parse(&mut vm, r#"{"a": [1, 2.5, "x"]}"#);
    assert_eq!(stringify(&mut vm, value).as_deref(), Some(r#"{ "a": [1, 2.5, "x"] }"#));
    let empty = parse(&mut vm, "{}");
    assert_eq!(stringify(&mut vm, empty).as_deref(), Some("{  }"));
    let list = parse(&mut vm, "[]");
    assert_eq!(stringify(&mut vm, list).as_deref(), Some("[]"));
}

#[test]
fn test_stringify_skips_values_without_json_form() {
    let (mut vm, _) = setup();
    // Array(1, clock, 2)
    let mut script = FunctionBuilder::script();
    script
        .get_global("stringify")
        .get_global("Array")
        .number(1.0)
        .get_global("clock")
        .number(2.0)
        .call(3)
        .call(1)
        .op(OpCode::Return);
    let result = run(&mut vm, script).unwrap();
    assert_eq!(vm.string_value(result).as_deref(), Some("[1, 2]"));

    let clock = vm.get_global("clock").unwrap();
    assert_eq!(call_global(&mut vm, "stringify", &[clock]).unwrap(), Value::NIL);
    assert_eq!(builtins::stringify(&vm, clock), None);
}

#[test]
fn test_stringify_array_holding_itself_twice() {
    // var a = Array(); a.push(a); a.push(a); return a;
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Array")
        .call(0)
        .define_global("a")
        .get_global("a")
        .get_global("a")
        .invoke("push", 1)
        .get_global("a")
        .invoke("push", 1)
        .op(OpCode::Return);
    let array = run(&mut vm, script).unwrap();
    assert_eq!(stringify(&mut vm, array).as_deref(), Some("[null, null]"));
    assert_eq!(vm.format_value(array), "Array(..., ...)");
}

#[test]
fn test_stringify_non_finite_numbers() {
    // return Array(0 / 0, 1 / 0);
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Array")
        .number(0.0)
        .number(0.0)
        .op(OpCode::Divide)
        .number(1.0)
        .number(0.0)
        .op(OpCode::Divide)
        .call(2)
        .op(OpCode::Return);
    let array = run(&mut vm, script).unwrap();
    let json = stringify(&mut vm, array).unwrap();
    assert_eq!(json, "[null, null]");
    let back = parse(&mut vm, &json);
    assert_eq!(vm.format_value(back), "Array(nil, nil)");
}

proptest! {
    #[test]
    fn prop_integers_survive_stringify_then_parse(n in -1_000_000_000i64..1_000_000_000) {
        let (mut vm, _) = setup();
        let json = stringify(&mut vm, Value::number(n as f64)).unwrap();
        prop_assert_eq!(parse(&mut vm, &json), Value::number(n as f64));
    }

    #[test]
    fn prop_strings_survive_stringify_then_parse(s in "[ -~]{0,24}") {
        let (mut vm, _) = setup();
        let original = text(&mut vm, &s);
        let json = stringify(&mut vm, original).unwrap();
        prop_assert_eq!(parse(&mut vm, &json), original);
    }
}
