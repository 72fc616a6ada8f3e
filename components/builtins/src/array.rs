//! Array constructor and methods
//!
//! `filter`, `map`, `forEach` and `slice` are calls-lox natives: they hand
//! the receiver and their arguments to the interpreted prelude routines
//! instead of calling back into the interpreter from the host stack.

use core_types::Value;
use interpreter::{NativeError, Vm};
use memory_manager::{ObjKind, Object};

use crate::value::{index_in, number_arg, object_of};

pub(crate) fn install(vm: &mut Vm) {
    vm.define_native("Array", array);
    vm.define_native_method(ObjKind::Array, "count", count, false);
    vm.define_native_method(ObjKind::Array, "push", push, false);
    vm.define_native_method(ObjKind::Array, "get", get, false);
    vm.define_native_method(ObjKind::Array, "pop", pop, false);
    vm.define_native_method(ObjKind::Array, "filter", filter, true);
    vm.define_native_method(ObjKind::Array, "map", map, true);
    vm.define_native_method(ObjKind::Array, "forEach", for_each, true);
    vm.define_native_method(ObjKind::Array, "slice", slice, true);
}

/// `Array(a, b, ...)`
fn array(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    // The arguments are still on the stack, so they survive this allocation.
    let array = vm.alloc(Object::Array(args.to_vec()));
    Ok(Value::object(array))
}

fn count(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let Some(array) = object_of(vm, receiver, ObjKind::Array) else {
        return Ok(Value::NIL);
    };
    if !args.is_empty() {
        return Ok(Value::NIL);
    }
    let len = vm.heap().get(array).as_array().map_or(0, Vec::len);
    Ok(Value::number(len as f64))
}

/// Appends one value and returns the array
fn push(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(array), [value]) = (object_of(vm, receiver, ObjKind::Array), args) else {
        return Ok(Value::NIL);
    };
    if let Some(values) = vm.heap_mut().get_mut(array).as_array_mut() {
        values.push(*value);
    }
    vm.recharge(array);
    Ok(Value::object(array))
}

fn get(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let Some(array) = object_of(vm, receiver, ObjKind::Array) else {
        return Ok(Value::NIL);
    };
    let (1, Some(n)) = (args.len(), number_arg(args, 0)) else {
        return Ok(Value::NIL);
    };
    let values = vm.heap().get(array).as_array().map(Vec::as_slice).unwrap_or_default();
    Ok(index_in(n, values.len()).map_or(Value::NIL, |i| values[i]))
}

/// Removes the last value; `nil` when empty
fn pop(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let Some(array) = object_of(vm, receiver, ObjKind::Array) else {
        return Ok(Value::NIL);
    };
    if !args.is_empty() {
        return Ok(Value::NIL);
    }
    let last = vm
        .heap_mut()
        .get_mut(array)
        .as_array_mut()
        .and_then(Vec::pop)
        .unwrap_or(Value::NIL);
    vm.heap_mut().adjust_size(array);
    Ok(last)
}

fn filter(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    vm.call_lox_code("_array_filter", receiver.unwrap_or_default(), args)
}

fn map(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    vm.call_lox_code("_array_map", receiver.unwrap_or_default(), args)
}

fn for_each(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    vm.call_lox_code("_array_foreach", receiver.unwrap_or_default(), args)
}

fn slice(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    vm.call_lox_code("_array_slice", receiver.unwrap_or_default(), args)
}
