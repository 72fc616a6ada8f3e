//! JSON conversion: `parse` and `stringify`
//!
//! Objects map to instances of the built-in `Object` class, arrays to
//! `Array` objects. Text is parsed with `serde_json`; the output of
//! `stringify` is produced here so numbers keep their `%.14g` form.
//! NaN and the infinities have no JSON spelling and come out as `null`,
//! as does a container reached again from inside itself.

use std::collections::HashSet;

use core_types::{format_number_with_precision, ObjRef, Value, ValueKind};
use interpreter::{NativeError, Vm};
use memory_manager::{Heap, Instance, Object, Table};
use serde_json::Value as Json;

use crate::object::object_class;
use crate::value::string_bytes;

const MAX_DEPTH: usize = 64;

pub(crate) fn install(vm: &mut Vm) {
    vm.define_native("parse", parse);
    vm.define_native("stringify", stringify);
}

/// `parse(text)`; malformed input gives `nil`
fn parse(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [text] = args else {
        return Ok(Value::NIL);
    };
    let Some(text) = string_bytes(vm, Some(*text)) else {
        return Ok(Value::NIL);
    };
    let json: Json = match serde_json::from_slice(&text) {
        Ok(json) => json,
        Err(err) => {
            log::debug!("parse: {}", err);
            return Ok(Value::NIL);
        }
    };

    let mark = vm.root_mark();
    let value = from_json(vm, &json);
    vm.release_roots(mark);
    Ok(value)
}

/// Builds the value for a JSON tree; every container is rooted until
/// the caller releases the mark it took.
fn from_json(vm: &mut Vm, json: &Json) -> Value {
    match json {
        Json::Null => Value::NIL,
        Json::Bool(b) => Value::bool(*b),
        Json::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::object(vm.intern(s)),
        Json::Array(items) => {
            let array = vm.alloc(Object::Array(Vec::with_capacity(items.len())));
            vm.add_root(Value::object(array));
            for item in items {
                let value = from_json(vm, item);
                if let Some(values) = vm.heap_mut().get_mut(array).as_array_mut() {
                    values.push(value);
                }
            }
            vm.recharge(array);
            Value::object(array)
        }
        Json::Object(members) => {
            let Some(class) = object_class(vm) else {
                return Value::NIL;
            };
            let instance = vm.alloc(Object::Instance(Instance {
                class,
                fields: Table::new(),
            }));
            vm.add_root(Value::object(instance));
            for (name, item) in members {
                let name = vm.intern(name);
                vm.add_root(Value::object(name));
                let value = from_json(vm, item);
                let key = vm.heap().key(name);
                if let Some(record) = vm.heap_mut().get_mut(instance).as_instance_mut() {
                    record.fields.set(key, value);
                }
            }
            vm.recharge(instance);
            Value::object(instance)
        }
    }
}

/// `stringify(value)`; `nil` when the value has no JSON form
fn stringify(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [value] = args else {
        return Ok(Value::NIL);
    };
    Ok(match to_json(vm.heap(), *value) {
        Some(text) => Value::object(vm.intern(&text)),
        None => Value::NIL,
    })
}

/// JSON text of a value; members without a JSON form are left out
pub(crate) fn to_json(heap: &Heap, value: Value) -> Option<String> {
    write_json(heap, value, &mut HashSet::new())
}

/// `open` holds the containers currently being written.
fn write_json(heap: &Heap, value: Value, open: &mut HashSet<ObjRef>) -> Option<String> {
    match value.kind() {
        ValueKind::Nil => Some("null".to_string()),
        ValueKind::Bool(b) => Some(b.to_string()),
        ValueKind::Number(n) if !n.is_finite() => Some("null".to_string()),
        ValueKind::Number(n) => Some(format_number_with_precision(n, 14)),
        ValueKind::Object(obj) => {
            let container = matches!(heap.get(obj), Object::Array(_) | Object::Instance(_));
            if container && (open.len() > MAX_DEPTH || open.contains(&obj)) {
                return Some("null".to_string());
            }
            if container {
                open.insert(obj);
            }
            let text = match heap.get(obj) {
                Object::String(s) => Some(quote(&s.as_str())),
                Object::Array(values) => {
                    let items: Vec<String> = values
                        .iter()
                        .filter_map(|item| write_json(heap, *item, open))
                        .collect();
                    Some(format!("[{}]", items.join(", ")))
                }
                Object::Instance(instance) => {
                    let members: Vec<String> = instance
                        .fields
                        .iter()
                        .filter_map(|(key, item)| {
                            let name = heap.string_text(key.obj)?;
                            let text = write_json(heap, item, open)?;
                            Some(format!("{}: {}", quote(&name), text))
                        })
                        .collect();
                    Some(format!("{{ {} }}", members.join(", ")))
                }
                _ => None,
            };
            open.remove(&obj);
            text
        }
    }
}

fn quote(text: &str) -> String {
    Json::String(text.to_string()).to_string()
}
