//! Byte buffers

use core_types::{Value, ValueKind};
use interpreter::{NativeError, Vm};
use memory_manager::{ObjKind, Object};

use crate::value::{index_in, number_arg, object_of};

pub(crate) fn install(vm: &mut Vm) {
    vm.define_native("Buffer", buffer);
    vm.define_native_method(ObjKind::Buffer, "length", length, false);
    vm.define_native_method(ObjKind::Buffer, "get", get, false);
    vm.define_native_method(ObjKind::Buffer, "set", set, false);
    vm.define_native_method(ObjKind::Buffer, "asArray", as_array, false);
    vm.define_native_method(ObjKind::Buffer, "asString", as_string, false);
    vm.define_native_method(ObjKind::Buffer, "append", append, false);
}

/// `Buffer(size | buffer | array | string)`
///
/// A number gives a zeroed buffer, a buffer is copied, an array must hold
/// only numbers in `0..=255` (otherwise `nil`), a string contributes its
/// bytes. Anything else gives an empty buffer.
fn buffer(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let bytes = match args {
        [arg] => match initial_bytes(vm, *arg) {
            Some(bytes) => bytes,
            None => return Ok(Value::NIL),
        },
        _ => Vec::new(),
    };
    Ok(Value::object(vm.alloc(Object::Buffer(bytes))))
}

fn initial_bytes(vm: &Vm, arg: Value) -> Option<Vec<u8>> {
    let obj = match arg.kind() {
        ValueKind::Number(n) => return Some(vec![0; n.max(0.0) as usize]),
        ValueKind::Object(obj) => obj,
        _ => return Some(Vec::new()),
    };
    match vm.heap().get(obj) {
        Object::Buffer(bytes) => Some(bytes.clone()),
        Object::String(s) => Some(s.as_bytes().to_vec()),
        Object::Array(values) => values
            .iter()
            .map(|value| match value.as_number() {
                Some(n) if (0.0..=255.0).contains(&n) => Some(n as u8),
                _ => None,
            })
            .collect(),
        _ => Some(Vec::new()),
    }
}

fn bytes_of(vm: &Vm, receiver: Option<Value>) -> Option<&[u8]> {
    let buffer = object_of(vm, receiver, ObjKind::Buffer)?;
    vm.heap().get(buffer).as_buffer().map(Vec::as_slice)
}

fn length(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), true) = (bytes_of(vm, receiver), args.is_empty()) else {
        return Ok(Value::NIL);
    };
    Ok(Value::number(bytes.len() as f64))
}

fn get(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), 1, Some(n)) = (bytes_of(vm, receiver), args.len(), number_arg(args, 0)) else {
        return Ok(Value::NIL);
    };
    Ok(index_in(n, bytes.len()).map_or(Value::NIL, |i| Value::number(f64::from(bytes[i]))))
}

/// `set(index, byte)`; the byte is truncated to eight bits
fn set(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(buffer), 2, Some(n), Some(byte)) = (
        object_of(vm, receiver, ObjKind::Buffer),
        args.len(),
        number_arg(args, 0),
        number_arg(args, 1),
    ) else {
        return Ok(Value::NIL);
    };
    if let Some(bytes) = vm.heap_mut().get_mut(buffer).as_buffer_mut() {
        if let Some(i) = index_in(n, bytes.len()) {
            bytes[i] = byte as i64 as u8;
        }
    }
    Ok(Value::NIL)
}

fn as_array(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), true) = (bytes_of(vm, receiver), args.is_empty()) else {
        return Ok(Value::NIL);
    };
    let values = bytes.iter().map(|b| Value::number(f64::from(*b))).collect();
    Ok(Value::object(vm.alloc(Object::Array(values))))
}

fn as_string(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), true) = (bytes_of(vm, receiver), args.is_empty()) else {
        return Ok(Value::NIL);
    };
    let bytes = bytes.to_vec();
    Ok(Value::object(vm.intern_bytes(&bytes)))
}

/// Appends another buffer's bytes in place and returns the receiver
fn append(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(buffer), [other]) = (object_of(vm, receiver, ObjKind::Buffer), args) else {
        return Ok(Value::NIL);
    };
    let Some(extra) = bytes_of(vm, Some(*other)).map(<[u8]>::to_vec) else {
        return Ok(Value::NIL);
    };
    if let Some(bytes) = vm.heap_mut().get_mut(buffer).as_buffer_mut() {
        bytes.extend_from_slice(&extra);
    }
    vm.recharge(buffer);
    Ok(Value::object(buffer))
}
