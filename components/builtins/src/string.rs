//! String methods
//!
//! Strings are immutable byte strings; every method that produces text
//! returns a new interned string. Positions are byte offsets.

use core_types::Value;
use interpreter::{NativeError, Vm};
use memory_manager::{ObjKind, Object};

use crate::value::{index_in, number_arg, string_bytes};

pub(crate) fn install(vm: &mut Vm) {
    vm.define_native_method(ObjKind::String, "length", length, false);
    vm.define_native_method(ObjKind::String, "get", get, false);
    vm.define_native_method(ObjKind::String, "find", find, false);
    vm.define_native_method(ObjKind::String, "substring", substring, false);
    vm.define_native_method(ObjKind::String, "split", split, false);
    vm.define_native_method(ObjKind::String, "replace", replace, true);
}

fn length(vm: &mut Vm, receiver: Option<Value>, _args: &[Value]) -> Result<Value, NativeError> {
    Ok(string_bytes(vm, receiver).map_or(Value::NIL, |bytes| Value::number(bytes.len() as f64)))
}

/// One-byte string at an offset
fn get(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), 1, Some(n)) = (string_bytes(vm, receiver), args.len(), number_arg(args, 0)) else {
        return Ok(Value::NIL);
    };
    Ok(match index_in(n, bytes.len()) {
        Some(i) => Value::object(vm.intern_bytes(&bytes[i..=i])),
        None => Value::NIL,
    })
}

/// Offset of the first occurrence of the argument, or `nil`
fn find(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(haystack), [needle]) = (string_bytes(vm, receiver), args) else {
        return Ok(Value::NIL);
    };
    let Some(needle) = string_bytes(vm, Some(*needle)) else {
        return Ok(Value::NIL);
    };
    Ok(find_bytes(&haystack, &needle).map_or(Value::NIL, |at| Value::number(at as f64)))
}

/// `substring(start, length)`; the length is clipped to the end
///
/// A start equal to the length yields the empty string, any other
/// start outside the string yields `nil`.
fn substring(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), 2, Some(start), Some(len)) = (
        string_bytes(vm, receiver),
        args.len(),
        number_arg(args, 0),
        number_arg(args, 1),
    ) else {
        return Ok(Value::NIL);
    };
    let (start, mut len) = (start as i64, len as i64);
    let total = bytes.len() as i64;
    if start < 0 || start > total {
        return Ok(Value::NIL);
    }
    if start.saturating_add(len) > total {
        len = total - start;
    }
    if len < 0 {
        return Ok(Value::NIL);
    }
    let (start, len) = (start as usize, len as usize);
    Ok(Value::object(vm.intern_bytes(&bytes[start..start + len])))
}

/// Splits on every occurrence of the separator into an array
///
/// An empty separator yields a one-element array holding the receiver.
fn split(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let (Some(bytes), [separator]) = (string_bytes(vm, receiver), args) else {
        return Ok(Value::NIL);
    };
    let Some(separator) = string_bytes(vm, Some(*separator)) else {
        return Ok(Value::NIL);
    };

    let array = vm.alloc(Object::Array(Vec::new()));
    let mut vm = vm.pin(Value::object(array));
    let pieces: Vec<&[u8]> = if separator.is_empty() {
        vec![&bytes[..]]
    } else {
        split_bytes(&bytes, &separator)
    };
    for piece in pieces {
        let piece = Value::object(vm.intern_bytes(piece));
        if let Some(values) = vm.heap_mut().get_mut(array).as_array_mut() {
            values.push(piece);
        }
    }
    vm.recharge(array);
    Ok(Value::object(array))
}

fn replace(vm: &mut Vm, receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    vm.call_lox_code("_string_replace", receiver.unwrap_or_default(), args)
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn split_bytes<'a>(bytes: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut rest = bytes;
    while let Some(at) = find_bytes(rest, separator) {
        pieces.push(&rest[..at]);
        rest = &rest[at + separator.len()..];
    }
    pieces.push(rest);
    pieces
}
