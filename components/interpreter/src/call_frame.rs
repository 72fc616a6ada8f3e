//! Call frame for function call stack management

use core_types::ObjRef;

/// Call frame representing an active closure invocation
///
/// Frames live in a fixed-capacity array on the VM; slot 0 of a frame
/// (`base`) holds the callee, followed by its arguments and locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// Closure being executed
    pub closure: ObjRef,
    /// The closure's function, cached to avoid a lookup per instruction
    pub function: ObjRef,
    /// Offset of the next instruction in the function's chunk
    pub ip: usize,
    /// Index of the frame's first stack slot
    pub base: usize,
}

impl CallFrame {
    /// Create a frame positioned at the start of the function
    pub fn new(closure: ObjRef, function: ObjRef, base: usize) -> Self {
        Self {
            closure,
            function,
            ip: 0,
            base,
        }
    }
}
