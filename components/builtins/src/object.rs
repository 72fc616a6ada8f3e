//! The `Object` class and instance-field reflection

use core_types::{ObjRef, Value};
use interpreter::{NativeError, Vm};
use memory_manager::{Class, ObjKind, Object, Table, OBJECT_CLASS_NAME};

use crate::value::object_of;

pub(crate) fn install(vm: &mut Vm) {
    let name = vm.intern(OBJECT_CLASS_NAME);
    let mut vm = vm.pin(Value::object(name));
    let class = vm.alloc(Object::Class(Class {
        name,
        methods: Table::new(),
    }));
    vm.define_global(OBJECT_CLASS_NAME, Value::object(class));

    vm.define_native("getInstanceFields", get_instance_fields);
    vm.define_native("getInstanceFieldValueByKey", get_field);
    vm.define_native("setInstanceFieldValueByKey", set_field);
}

/// The class bound to the global `Object`, if it is still a class
pub(crate) fn object_class(vm: &Vm) -> Option<ObjRef> {
    object_of(vm, vm.get_global(OBJECT_CLASS_NAME), ObjKind::Class)
}

/// Array of an instance's field names
fn get_instance_fields(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [target] = args else {
        return Ok(Value::NIL);
    };
    let Some(instance) = object_of(vm, Some(*target), ObjKind::Instance) else {
        return Ok(Value::NIL);
    };
    // The names stay reachable through the instance, which is on the stack.
    let names: Vec<Value> = vm
        .heap()
        .get(instance)
        .as_instance()
        .map(|instance| instance.fields.iter().map(|(key, _)| Value::object(key.obj)).collect())
        .unwrap_or_default();
    Ok(Value::object(vm.alloc(Object::Array(names))))
}

fn get_field(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [target, name] = args else {
        return Ok(Value::NIL);
    };
    let (Some(instance), Some(name)) = (
        object_of(vm, Some(*target), ObjKind::Instance),
        object_of(vm, Some(*name), ObjKind::String),
    ) else {
        return Ok(Value::NIL);
    };
    let key = vm.heap().key(name);
    Ok(vm
        .heap()
        .get(instance)
        .as_instance()
        .and_then(|instance| instance.fields.get(key))
        .unwrap_or(Value::NIL))
}

/// Sets a field by name and returns the stored value
fn set_field(vm: &mut Vm, _receiver: Option<Value>, args: &[Value]) -> Result<Value, NativeError> {
    let [target, name, value] = args else {
        return Ok(Value::NIL);
    };
    let (Some(instance), Some(name)) = (
        object_of(vm, Some(*target), ObjKind::Instance),
        object_of(vm, Some(*name), ObjKind::String),
    ) else {
        return Ok(Value::NIL);
    };
    let key = vm.heap().key(name);
    if let Some(record) = vm.heap_mut().get_mut(instance).as_instance_mut() {
        record.fields.set(key, *value);
    }
    vm.recharge(instance);
    Ok(*value)
}
