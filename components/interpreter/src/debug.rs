//! Disassembly and execution tracing

use bytecode_system::{disassemble_chunk, disassemble_instruction, ConstantDescriber};
use core_types::{ObjRef, Value};
use memory_manager::Heap;

use crate::call_frame::CallFrame;
use crate::vm::Vm;

struct HeapConstants<'h>(&'h Heap);

impl ConstantDescriber for HeapConstants<'_> {
    fn describe(&self, value: Value) -> String {
        self.0.format_value(value)
    }

    fn upvalue_count(&self, value: Value) -> usize {
        value
            .as_object()
            .and_then(|obj| self.0.get(obj).as_function())
            .map_or(0, |f| f.upvalue_count)
    }
}

impl Vm {
    /// Disassembles a function and, recursively, every function in its
    /// constant pool.
    pub fn disassemble(&self, function: ObjRef) -> String {
        let Some(f) = self.heap.get(function).as_function() else {
            return String::new();
        };
        let name = match f.name.and_then(|name| self.heap.string_text(name)) {
            Some(name) => name,
            None => "<script>".to_string(),
        };
        let mut out = disassemble_chunk(&f.chunk, &name, &HeapConstants(&self.heap));
        for constant in &f.chunk.constants {
            if let Some(nested) = constant.as_object() {
                if self.heap.get(nested).as_function().is_some() {
                    out.push('\n');
                    out.push_str(&self.disassemble(nested));
                }
            }
        }
        out
    }

    pub(crate) fn trace_instruction(&self, frame: &CallFrame) {
        let stack: Vec<String> = self.stack.iter().map(|v| self.heap.format_value(*v)).collect();
        log::trace!("          [ {} ]", stack.join(" ] [ "));
        if let Some(function) = self.heap.get(frame.function).as_function() {
            let (line, _) = disassemble_instruction(&function.chunk, frame.ip, &HeapConstants(&self.heap));
            log::trace!("{}", line);
        }
    }
}
