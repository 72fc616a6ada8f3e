//! Console natives: `log`, `logln`, `scanToEOF` and `printMethods`
//!
//! Output goes through the VM's output sink so hosts and tests can
//! capture it the same way they capture `print`.

use std::io::Read;

use core_types::Value;
use interpreter::{NativeError, Vm};
use memory_manager::Object;

pub(crate) fn install(vm: &mut Vm) {
    vm.define_native("log", write_log);
    vm.define_native("logln", write_logln);
    vm.define_native("scanToEOF", scan_to_eof);
    vm.define_native("printMethods", print_methods);
}

/// Writes every argument followed by a space
fn write_log(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let text: String = args
        .iter()
        .map(|value| format!("{} ", vm.format_value(*value)))
        .collect();
    vm.write_output(&text);
    Ok(Value::NIL)
}

/// Same as `log`, then a newline
fn write_logln(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    write_log(vm, receiver, args)?;
    vm.write_output("\n");
    Ok(Value::NIL)
}

/// Reads standard input to the end
fn scan_to_eof(vm: &mut Vm, _receiver: Option<Value>, _args: &[Value]) -> Result<Value, NativeError> {
    let mut input = Vec::new();
    if let Err(err) = std::io::stdin().lock().read_to_end(&mut input) {
        log::warn!("scanToEOF: {}", err);
    }
    Ok(Value::object(vm.intern_bytes(&input)))
}

/// Writes the method names of an instance's class (or of a class), one
/// per line in name order
fn print_methods(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let Some(obj) = args.first().and_then(|value| value.as_object()) else {
        return Ok(Value::NIL);
    };
    let heap = vm.heap();
    let class = match heap.get(obj) {
        Object::Instance(instance) => instance.class,
        Object::Class(_) => obj,
        _ => return Ok(Value::NIL),
    };
    let mut names: Vec<String> = heap
        .get(class)
        .as_class()
        .map(|class| {
            class
                .methods
                .iter()
                .filter_map(|(key, _)| heap.string_text(key.obj))
                .collect()
        })
        .unwrap_or_default();
    names.sort();

    let text: String = names.iter().map(|name| format!("{}\n", name)).collect();
    vm.write_output(&text);
    Ok(Value::NIL)
}
