//! Printable form of values.

use crate::heap::Heap;
use crate::object::Object;
use core_types::{format_number, ObjRef, Value, ValueKind};
use std::collections::HashSet;

/// Instances of this class print as `.{ key: value }` literals.
pub const OBJECT_CLASS_NAME: &str = "Object";

const MAX_DEPTH: usize = 16;

impl Heap {
    /// Renders a value the way the `print` instruction shows it.
    ///
    /// A container met again while it is still being printed shows as
    /// `...`, as does anything nested deeper than a fixed limit.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    /// use memory_manager::{Heap, Object};
    ///
    /// let mut heap = Heap::default();
    /// let array = heap.allocate(Object::Array(vec![Value::number(1.0), Value::TRUE]));
    /// assert_eq!(heap.format_value(Value::object(array)), "Array(1, true)");
    /// assert_eq!(heap.format_value(Value::number(2.5)), "2.5");
    /// ```
    pub fn format_value(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, &mut HashSet::new());
        out
    }

    /// Content of a string object, or `None` if `obj` is not a string.
    pub fn string_text(&self, obj: ObjRef) -> Option<String> {
        self.get(obj).as_string().map(|s| s.as_str().into_owned())
    }

    fn write_value(&self, out: &mut String, value: Value, open: &mut HashSet<ObjRef>) {
        match value.kind() {
            ValueKind::Nil => out.push_str("nil"),
            ValueKind::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            ValueKind::Number(n) => out.push_str(&format_number(n)),
            ValueKind::Object(obj) => self.write_object(out, obj, open),
        }
    }

    fn write_object(&self, out: &mut String, obj: ObjRef, open: &mut HashSet<ObjRef>) {
        if open.len() > MAX_DEPTH || open.contains(&obj) {
            out.push_str("...");
            return;
        }
        match self.get(obj) {
            Object::String(s) => out.push_str(&s.as_str()),
            Object::Array(values) => {
                open.insert(obj);
                out.push_str("Array(");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, *value, open);
                }
                out.push(')');
                open.remove(&obj);
            }
            Object::Buffer(bytes) => out.push_str(&format!("<buffer {}>", bytes.len())),
            Object::Function(function) => match function.name {
                Some(name) => {
                    out.push_str("<fn ");
                    self.write_object(out, name, open);
                    out.push('>');
                }
                None => out.push_str("<script>"),
            },
            Object::Closure(closure) => self.write_object(out, closure.function, open),
            Object::BoundMethod(bound) => self.write_object(out, bound.method, open),
            Object::Upvalue(_) => out.push_str("upvalue"),
            Object::Class(class) => self.write_object(out, class.name, open),
            Object::Instance(instance) => {
                let class_name = self
                    .get(instance.class)
                    .as_class()
                    .and_then(|class| self.string_text(class.name))
                    .unwrap_or_default();
                if class_name == OBJECT_CLASS_NAME {
                    open.insert(obj);
                    out.push_str(".{ ");
                    for (i, (key, value)) in instance.fields.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_object(out, key.obj, open);
                        out.push_str(": ");
                        self.write_value(out, value, open);
                    }
                    out.push_str(" }");
                    open.remove(&obj);
                } else {
                    out.push_str(&class_name);
                    out.push_str(" instance");
                }
            }
            Object::Native(_) => out.push_str("<native fn>"),
            Object::BoundNative(_) => out.push_str("<bound native fn>"),
            Object::Ref(handle) => {
                out.push_str(&format!("<ref {}: {}>", handle.tag, handle.description))
            }
        }
    }
}
