//! Argument and receiver helpers shared by the natives
//!
//! Built-in natives treat a wrongly shaped call as a soft failure and
//! return `nil`; these helpers answer "is this argument what I expect"
//! with an `Option` so the natives can bail out with `?`-like `let else`.

use core_types::{ObjRef, Value};
use interpreter::Vm;
use memory_manager::ObjKind;

/// Number at `index`, if present and numeric
pub(crate) fn number_arg(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(|value| value.as_number())
}

/// The object behind `value` when it has the given kind
pub(crate) fn object_of(vm: &Vm, value: Option<Value>, kind: ObjKind) -> Option<ObjRef> {
    let obj = value?.as_object()?;
    (vm.heap().get(obj).kind() == kind).then_some(obj)
}

/// Copy of a string object's bytes
pub(crate) fn string_bytes(vm: &Vm, value: Option<Value>) -> Option<Vec<u8>> {
    let obj = object_of(vm, value, ObjKind::String)?;
    vm.heap().get(obj).as_string().map(|s| s.as_bytes().to_vec())
}

/// Truncates `n` toward zero and checks it against `len`
pub(crate) fn index_in(n: f64, len: usize) -> Option<usize> {
    let index = n as i64;
    if index < 0 || index as u64 >= len as u64 {
        None
    } else {
        Some(index as usize)
    }
}
