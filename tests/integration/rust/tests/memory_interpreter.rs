//! Integration tests: collector <-> interpreter
//!
//! Tests cover:
//! - Interning across literals and strings built by natives
//! - Unreachable cycles through instance fields and closed upvalues
//! - Reachable graphs surviving collection on every allocation
//! - Automatic collection and allocation accounting

use bytecode_system::{OpCode, UpvalueDescriptor};
use core_types::Value;
use integration_tests::{run, setup, setup_stressed, setup_with};
use interpreter::{FunctionBuilder, Vm};
use memory_manager::GcConfig;

fn run_value(vm: &mut Vm, build: impl FnOnce(&mut FunctionBuilder)) -> Value {
    let mut script = FunctionBuilder::script();
    build(&mut script);
    script.op(OpCode::Return);
    run(vm, script).unwrap()
}

/// Live bytes according to the object headers
fn charged_bytes(vm: &Vm) -> usize {
    let heap = vm.heap();
    heap.objects().map(|obj| heap.header(obj).size).sum()
}

// ============================================================================
// Interning
// ============================================================================

#[test]
fn test_strings_from_natives_are_interned() {
    let (mut vm, _) = setup();
    let literal = run_value(&mut vm, |s| {
        s.string("hello");
    });
    vm.define_global("literal", literal);
    let from_buffer = run_value(&mut vm, |s| {
        s.get_global("Buffer").string("hello").call(1).invoke("asString", 0);
    });
    let from_substring = run_value(&mut vm, |s| {
        s.string("say hello").number(4.0).number(5.0).invoke("substring", 2);
    });
    let from_split = run_value(&mut vm, |s| {
        s.string("a hello").string(" ").invoke("split", 1).number(1.0).invoke("get", 1);
    });
    let concatenated = run_value(&mut vm, |s| {
        s.string("hel").string("lo").op(OpCode::Add);
    });

    assert!(literal.as_object().is_some());
    for value in [from_buffer, from_substring, from_split, concatenated] {
        assert_eq!(value.as_object(), literal.as_object());
    }
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_self_referencing_instance_is_freed() {
    // var o = Object(); o.ref = o;
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Object")
        .call(0)
        .define_global("o")
        .get_global("o")
        .get_global("o")
        .set_property("ref")
        .op(OpCode::Pop)
        .ret_nil();
    run(&mut vm, script).unwrap();

    let instance = vm.get_global("o").and_then(|o| o.as_object()).unwrap();
    vm.collect_garbage();
    assert!(vm.heap().contains(instance));

    vm.define_global("o", Value::NIL);
    let stats = vm.collect_garbage();
    assert!(!vm.heap().contains(instance));
    assert!(stats.objects_freed >= 1);
}

#[test]
fn test_closure_upvalue_cycle_is_freed() {
    // fun outer() { var f; fun g() { return f; } f = g; }
    let mut g = FunctionBuilder::new("g", 0);
    g.get_upvalue(0).op(OpCode::Return);
    let mut outer = FunctionBuilder::new("outer", 0);
    outer
        .op(OpCode::Nil)
        .closure(g, &[UpvalueDescriptor::new(true, 1)])
        .get_local(2)
        .set_local(1)
        .op(OpCode::Pop)
        .ret_nil();

    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script.closure(outer, &[]).define_global("outer").ret_nil();
    run(&mut vm, script).unwrap();
    vm.collect_garbage();
    let baseline = vm.heap().object_count();

    let outer = vm.get_global("outer").unwrap();
    for _ in 0..10 {
        assert_eq!(vm.call(outer, &[]).unwrap(), Value::NIL);
    }
    assert!(vm.heap().object_count() > baseline);

    vm.collect_garbage();
    assert_eq!(vm.heap().object_count(), baseline);
}

#[test]
fn test_reachable_cycle_survives_stress_collection() {
    // var a = Object(); var b = Object();
    // a.next = b; b.next = a; b.items = Array("x", Buffer("y"));
    // var same = a.next.next == a;
    // return a.next.items.get(1).asString();
    let (mut vm, _) = setup_stressed();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Object")
        .call(0)
        .define_global("a")
        .get_global("Object")
        .call(0)
        .define_global("b")
        .get_global("a")
        .get_global("b")
        .set_property("next")
        .op(OpCode::Pop)
        .get_global("b")
        .get_global("a")
        .set_property("next")
        .op(OpCode::Pop)
        .get_global("b")
        .get_global("Array")
        .string("x")
        .get_global("Buffer")
        .string("y")
        .call(1)
        .call(2)
        .set_property("items")
        .op(OpCode::Pop)
        .get_global("a")
        .get_property("next")
        .get_property("next")
        .get_global("a")
        .op(OpCode::Equal)
        .define_global("same")
        .get_global("a")
        .get_property("next")
        .get_property("items")
        .number(1.0)
        .invoke("get", 1)
        .invoke("asString", 0)
        .op(OpCode::Return);
    let result = run(&mut vm, script).unwrap();

    assert_eq!(vm.string_value(result).as_deref(), Some("y"));
    assert_eq!(vm.get_global("same"), Some(Value::TRUE));
    assert!(vm.heap().stats().collections > 0);
}

// ============================================================================
// Accounting
// ============================================================================

#[test]
fn test_collection_runs_when_threshold_is_crossed() {
    // var i = 0; while (i < 500) { Array(i); i = i + 1; }
    let gc = GcConfig::default()
        .with_initial_threshold(8 * 1024)
        .with_min_threshold(8 * 1024);
    let (mut vm, _) = setup_with(gc);
    let before = vm.heap().stats().collections;

    let mut script = FunctionBuilder::script();
    script.number(0.0);
    let start = script.current_offset();
    script.get_local(1).number(500.0).op(OpCode::Less);
    let exit = script.jump_if_false();
    script
        .op(OpCode::Pop)
        .get_global("Array")
        .get_local(1)
        .call(1)
        .op(OpCode::Pop)
        .get_local(1)
        .number(1.0)
        .op(OpCode::Add)
        .set_local(1)
        .op(OpCode::Pop)
        .loop_to(start)
        .bind(exit)
        .op(OpCode::Pop)
        .get_local(1)
        .op(OpCode::Return);
    assert_eq!(run(&mut vm, script).unwrap(), Value::number(500.0));

    let heap = vm.heap();
    assert!(heap.stats().collections > before);
    assert!(heap.next_gc() >= 8 * 1024);
    assert!(heap.bytes_allocated() <= heap.next_gc());
}

#[test]
fn test_bytes_allocated_matches_live_set() {
    let (mut vm, _) = setup();
    let mut script = FunctionBuilder::script();
    script
        .get_global("Array")
        .string("kept")
        .call(1)
        .define_global("kept")
        .get_global("Buffer")
        .number(256.0)
        .call(1)
        .op(OpCode::Pop)
        .string("a,b,c,d")
        .string(",")
        .invoke("split", 1)
        .op(OpCode::Pop)
        .ret_nil();
    run(&mut vm, script).unwrap();
    assert_eq!(vm.heap().bytes_allocated(), charged_bytes(&vm));

    let stats = vm.collect_garbage();
    assert!(stats.bytes_after < stats.bytes_before);
    assert_eq!(stats.bytes_after, vm.heap().bytes_allocated());
    assert_eq!(vm.heap().bytes_allocated(), charged_bytes(&vm));
    assert!(vm.heap().objects().all(|obj| !vm.heap().header(obj).marked));

    let kept = vm.get_global("kept").unwrap();
    assert_eq!(vm.format_value(kept), "Array(kept)");
}

#[test]
fn test_push_growth_triggers_collection() {
    // var a = Array(); var push = a.push;
    let gc = GcConfig::default()
        .with_initial_threshold(64 * 1024)
        .with_min_threshold(64 * 1024);
    let (mut vm, _) = setup_with(gc);
    let mut script = FunctionBuilder::script();
    script
        .get_global("Array")
        .call(0)
        .define_global("a")
        .get_global("a")
        .get_property("push")
        .define_global("push")
        .ret_nil();
    run(&mut vm, script).unwrap();

    let push = vm.get_global("push").unwrap();
    let before = vm.heap().stats().collections;
    for i in 0..20_000 {
        vm.call(push, &[Value::number(i as f64)]).unwrap();
        assert!(vm.heap().bytes_allocated() <= vm.heap().next_gc());
    }
    assert!(vm.heap().stats().collections > before);

    let array = vm.get_global("a").and_then(|a| a.as_object()).unwrap();
    assert_eq!(vm.heap().get(array).as_array().map(Vec::len), Some(20_000));
    assert_eq!(vm.heap().bytes_allocated(), charged_bytes(&vm));
}
