//! Process-level natives: time, randomness, environment and modules

use std::sync::OnceLock;
use std::time::Instant;

use core_types::Value;
use interpreter::{NativeError, Vm};
use rand::Rng;

use crate::value::{number_arg, string_bytes};

static START: OnceLock<Instant> = OnceLock::new();

pub(crate) fn install(vm: &mut Vm) {
    START.get_or_init(Instant::now);
    vm.define_native("clock", clock);
    vm.define_native("randN", rand_n);
    vm.define_native("getEnvVar", get_env_var);
    vm.define_native("systemImport", system_import);
}

/// Seconds since the library was first installed in this process
fn clock(_vm: &mut Vm, _receiver: Option<Value>, _args: &[Value]) -> Result<Value, NativeError> {
    let start = START.get_or_init(Instant::now);
    Ok(Value::number(start.elapsed().as_secs_f64()))
}

/// `randN(n)`: uniform integer in `[0, n)`; `nil` unless `n >= 1`
fn rand_n(_vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (1, Some(max)) = (args.len(), number_arg(args, 0)) else {
        return Ok(Value::NIL);
    };
    let max = max as i64;
    if max < 1 {
        return Ok(Value::NIL);
    }
    let n = rand::thread_rng().gen_range(0..max);
    Ok(Value::number(n as f64))
}

/// Value of an environment variable, or `nil` when unset
fn get_env_var(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let Some(name) = string_bytes(vm, args.first().copied()) else {
        return Ok(Value::NIL);
    };
    let name = String::from_utf8_lossy(&name);
    match std::env::var_os(&*name) {
        Some(value) => {
            let value = value.to_string_lossy().into_owned();
            Ok(Value::object(vm.intern(&value)))
        }
        None => Ok(Value::NIL),
    }
}

/// `systemImport(name)`: the instance of a registered native module
///
/// Unknown modules are a runtime error; a non-string name gives `nil`.
fn system_import(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [name] = args else {
        return Ok(Value::NIL);
    };
    let Some(name) = string_bytes(vm, Some(*name)) else {
        return Ok(Value::NIL);
    };
    let name = String::from_utf8_lossy(&name).into_owned();
    vm.import_module(&name)
}
