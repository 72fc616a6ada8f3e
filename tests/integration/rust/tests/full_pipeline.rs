//! Full pipeline tests: Compiler -> Vm::interpret -> outcome
//!
//! A canned compiler stands in for the source front end so programs run
//! through the same path an embedding host uses, including exit statuses,
//! native modules with interpreted bodies and an execution backend that
//! claims some calls.

use bytecode_system::{OpCode, UpvalueDescriptor};
use core_types::{CompileError, ErrorKind, InterpretError, ObjRef, Value};
use integration_tests::{setup, setup_stressed};
use interpreter::{BackendOutcome, Compiler, ExecutionBackend, FunctionBuilder, ModuleRegistrar, NativeError, Vm};

struct CannedCompiler;

/// fun makeCounter() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }
fn make_counter() -> FunctionBuilder {
    let mut inc = FunctionBuilder::new("inc", 0);
    inc.get_upvalue(0)
        .number(1.0)
        .op(OpCode::Add)
        .set_upvalue(0)
        .op(OpCode::Pop)
        .get_upvalue(0)
        .op(OpCode::Return);
    let mut make = FunctionBuilder::new("makeCounter", 0);
    make.number(0.0)
        .closure(inc, &[UpvalueDescriptor::new(true, 1)])
        .op(OpCode::Return);
    make
}

impl CannedCompiler {
    fn program(source: &str) -> Option<FunctionBuilder> {
        let mut script = FunctionBuilder::script();
        match source {
            // var c = makeCounter(); var d = makeCounter();
            // var first = c(); var second = c(); return d();
            "counter" => {
                script
                    .closure(make_counter(), &[])
                    .define_global("makeCounter")
                    .get_global("makeCounter")
                    .call(0)
                    .define_global("c")
                    .get_global("makeCounter")
                    .call(0)
                    .define_global("d")
                    .get_global("c")
                    .call(0)
                    .define_global("first")
                    .get_global("c")
                    .call(0)
                    .define_global("second")
                    .get_global("d")
                    .call(0)
                    .op(OpCode::Return);
            }
            // fun pair(a, b) { return Array(a, b); } return pair(1);
            "arity" => {
                let mut pair = FunctionBuilder::new("pair", 2);
                pair.line(2)
                    .get_global("Array")
                    .get_local(1)
                    .get_local(2)
                    .call(2)
                    .op(OpCode::Return);
                script
                    .closure(pair, &[])
                    .define_global("pair")
                    .line(3)
                    .get_global("pair")
                    .number(1.0)
                    .call(1)
                    .op(OpCode::Return);
            }
            // missing = 1;
            "assign" => {
                script.number(1.0).set_global("missing").op(OpCode::Return);
            }
            // return systemImport("greeter").greet("lox");
            "import" => {
                script
                    .get_global("systemImport")
                    .string("greeter")
                    .call(1)
                    .string("lox")
                    .invoke("greet", 1)
                    .op(OpCode::Return);
            }
            // this.prefix = "hello, ";
            "greeter body" => {
                script
                    .get_local(0)
                    .string("hello, ")
                    .set_property("prefix")
                    .op(OpCode::Pop)
                    .ret_nil();
            }
            // return Array(1, 2).map(clock);
            "map clock" => {
                script
                    .get_global("Array")
                    .number(1.0)
                    .number(2.0)
                    .call(2)
                    .get_global("clock")
                    .invoke("map", 1)
                    .op(OpCode::Return);
            }
            _ => return None,
        }
        Some(script)
    }
}

impl Compiler for CannedCompiler {
    fn compile(&mut self, source: &str, vm: &mut Vm) -> Result<ObjRef, CompileError> {
        let script = Self::program(source).ok_or_else(|| CompileError::new("Expect expression."))?;
        script.build(vm).map_err(|e| CompileError::new(e.to_string()))
    }
}

fn compiled_vm() -> Vm {
    let (mut vm, _) = setup();
    vm.set_compiler(Box::new(CannedCompiler));
    vm
}

// ============================================================================
// Outcomes
// ============================================================================

#[test]
fn test_counters_keep_independent_state() {
    let mut vm = compiled_vm();
    assert_eq!(vm.interpret("counter").unwrap(), Value::number(1.0));
    assert_eq!(vm.get_global("first"), Some(Value::number(1.0)));
    assert_eq!(vm.get_global("second"), Some(Value::number(2.0)));

    let c = vm.get_global("c").unwrap();
    assert_eq!(vm.call(c, &[]).unwrap(), Value::number(3.0));
}

#[test]
fn test_counters_under_stress_collection() {
    let (mut vm, _) = setup_stressed();
    vm.set_compiler(Box::new(CannedCompiler));
    assert_eq!(vm.interpret("counter").unwrap(), Value::number(1.0));
    assert_eq!(vm.get_global("second"), Some(Value::number(2.0)));
}

#[test]
fn test_compile_error_exit_code() {
    let mut vm = compiled_vm();
    let objects = vm.heap().object_count();
    let err = vm.interpret("var = ;").unwrap_err();
    assert_eq!(err.exit_code(), 65);
    assert!(matches!(err, InterpretError::Compile(_)));
    assert_eq!(vm.heap().object_count(), objects);
}

#[test]
fn test_wrong_argument_count_is_runtime_error() {
    let mut vm = compiled_vm();
    let err = vm.interpret("arity").unwrap_err();
    assert_eq!(err.exit_code(), 70);
    let InterpretError::Runtime(err) = err else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.kind, ErrorKind::Arity);
    assert_eq!(err.message, "Expected 2 arguments but got 1.");
    assert_eq!(err.traceback(), "Expected 2 arguments but got 1.\n[line 3] in script");
    assert_eq!(vm.stack_len(), 0);
    assert_eq!(vm.frame_count(), 0);
}

#[test]
fn test_assigning_undefined_global_does_not_create_it() {
    let mut vm = compiled_vm();
    let err = vm.interpret("assign").unwrap_err();
    let InterpretError::Runtime(err) = err else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    assert_eq!(err.message, "Undefined variable 'missing'.");
    assert_eq!(vm.get_global("missing"), None);
}

#[test]
fn test_vm_is_reusable_after_runtime_error() {
    let mut vm = compiled_vm();
    assert!(vm.interpret("arity").is_err());
    assert_eq!(vm.interpret("counter").unwrap(), Value::number(1.0));
}

// ============================================================================
// Native modules
// ============================================================================

fn greet(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let key = vm.intern("prefix");
    let key = vm.heap().key(key);
    let prefix = receiver
        .and_then(|r| r.as_object())
        .and_then(|r| vm.heap().get(r).as_instance())
        .and_then(|instance| instance.fields.get(key))
        .and_then(|v| vm.string_value(v));
    let name = args.first().and_then(|v| vm.string_value(*v));
    match (prefix, name) {
        (Some(prefix), Some(name)) => Ok(Value::object(vm.intern(&format!("{}{}", prefix, name)))),
        _ => Err(NativeError::new("greet expects a name.")),
    }
}

fn greeter(module: &mut ModuleRegistrar<'_>) -> Result<(), NativeError> {
    module.native_method("greet", greet);
    module.lox_code("greeter body")?;
    Ok(())
}

#[test]
fn test_system_import_runs_module_body() {
    let mut vm = compiled_vm();
    vm.register_module("greeter", greeter);
    let result = vm.interpret("import").unwrap();
    assert_eq!(vm.string_value(result).as_deref(), Some("hello, lox"));
}

// ============================================================================
// Execution backend
// ============================================================================

/// Completes `_array_map` in place and counts the calls it sees.
struct MapShortcut {
    seen: usize,
}

impl ExecutionBackend for MapShortcut {
    fn execute(&mut self, vm: &mut Vm, closure: ObjRef, argc: u8) -> Result<BackendOutcome, NativeError> {
        self.seen += 1;
        let name = vm
            .heap()
            .get(closure)
            .as_closure()
            .and_then(|c| vm.heap().get(c.function).as_function())
            .and_then(|f| f.name)
            .and_then(|n| vm.heap().string_text(n));
        if name.as_deref() != Some("_array_map") {
            return Ok(BackendOutcome::Unsupported);
        }
        assert_eq!(argc, 2);
        Ok(BackendOutcome::Returned(Value::number(7.0)))
    }
}

#[test]
fn test_backend_can_complete_calls_lox_routines() {
    let mut vm = compiled_vm();
    vm.set_backend(Box::new(MapShortcut { seen: 0 }));
    assert_eq!(vm.interpret("map clock").unwrap(), Value::number(7.0));
    assert_eq!(vm.stack_len(), 0);

    // Same call from the host through a bound native
    let mut script = FunctionBuilder::script();
    script
        .get_global("Array")
        .call(0)
        .get_property("map")
        .op(OpCode::Return);
    let function = script.build(&mut vm).unwrap();
    let mapper = vm.run_function(function).unwrap();
    vm.define_global("mapper", mapper);
    let clock = vm.get_global("clock").unwrap();
    assert_eq!(vm.call(mapper, &[clock]).unwrap(), Value::number(7.0));
    assert_eq!(vm.stack_len(), 0);
    assert!(vm.clear_backend().is_some());
}

#[test]
fn test_unsupported_backend_falls_back_to_dispatch_loop() {
    let mut vm = compiled_vm();
    vm.set_backend(Box::new(MapShortcut { seen: 0 }));
    assert_eq!(vm.interpret("counter").unwrap(), Value::number(1.0));
    assert_eq!(vm.get_global("second"), Some(Value::number(2.0)));
}
