//! Garbage collection integration
//!
//! All VM allocations go through [`Vm::alloc`], which runs a collection
//! first when the heap's budget would be exceeded. Objects that grow in
//! place are recharged through [`Vm::recharge`], which collects once the
//! new total is over budget. The roots are:
//!
//! - every value on the stack
//! - the closure of every active frame
//! - the open-upvalue list
//! - the globals table
//! - values pinned by host code
//! - the interned `"init"` string
//!
//! Host code that holds a fresh object across another allocation must root
//! it first, either with the scoped [`Pinned`] guard or with the
//! [`Vm::root_mark`]/[`Vm::add_root`]/[`Vm::release_roots`] triple.

use std::ops::{Deref, DerefMut};

use arrayvec::ArrayVec;
use core_types::{ObjRef, Value};
use memory_manager::{CollectionStats, LoxString, Marker, Object, RootSource, Table};

use crate::call_frame::CallFrame;
use crate::vm::{Vm, FRAMES_MAX};

/// Position in the host root stack, returned by [`Vm::root_mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootMark(usize);

struct VmRoots<'a> {
    stack: &'a [Value],
    frames: &'a ArrayVec<CallFrame, FRAMES_MAX>,
    open_upvalues: Option<ObjRef>,
    globals: &'a Table,
    pinned: &'a [Value],
    init_string: ObjRef,
}

impl RootSource for VmRoots<'_> {
    fn mark_roots(&self, marker: &mut Marker<'_>) {
        for value in self.stack {
            marker.mark_value(*value);
        }
        for frame in self.frames {
            marker.mark_object(frame.closure);
        }

        let mut upvalue = self.open_upvalues;
        while let Some(obj) = upvalue {
            marker.mark_object(obj);
            upvalue = marker.heap().get(obj).as_upvalue().and_then(|u| u.next);
        }

        marker.mark_table(self.globals);
        for value in self.pinned {
            marker.mark_value(*value);
        }
        marker.mark_object(self.init_string);
    }
}

impl Vm {
    /// Allocates an object, collecting first if the budget is exhausted.
    ///
    /// The new object is unrooted; push or pin it before the next
    /// allocation.
    pub fn alloc(&mut self, object: Object) -> ObjRef {
        if self.heap.should_collect(object.heap_size()) {
            self.collect_garbage();
        }
        self.heap.allocate(object)
    }

    /// Re-charges `obj` after it grew or shrank in place, collecting when
    /// growth pushed the heap over budget.
    ///
    /// `obj` must be reachable from a root.
    pub fn recharge(&mut self, obj: ObjRef) {
        let before = self.heap.bytes_allocated();
        self.heap.adjust_size(obj);
        if self.heap.bytes_allocated() > before && self.heap.should_collect(0) {
            self.collect_garbage();
        }
    }

    /// Returns the canonical string object for `text`
    pub fn intern(&mut self, text: &str) -> ObjRef {
        self.intern_bytes(text.as_bytes())
    }

    /// Returns the canonical string object for arbitrary bytes
    pub fn intern_bytes(&mut self, bytes: &[u8]) -> ObjRef {
        if let Some(existing) = self.heap.intern_lookup(bytes) {
            return existing;
        }
        let string = self.alloc(Object::String(LoxString::new(bytes)));
        self.heap.intern_insert(string);
        string
    }

    /// Runs a full collection over the VM's roots
    pub fn collect_garbage(&mut self) -> CollectionStats {
        let roots = VmRoots {
            stack: &self.stack,
            frames: &self.frames,
            open_upvalues: self.open_upvalues,
            globals: &self.globals,
            pinned: &self.pinned,
            init_string: self.init_string,
        };
        self.heap.collect(&roots)
    }

    /// Roots `value` until the returned guard is dropped
    ///
    /// # Examples
    ///
    /// ```
    /// use interpreter::Vm;
    /// use core_types::Value;
    /// use memory_manager::Object;
    ///
    /// let mut vm = Vm::new();
    /// let array = vm.alloc(Object::Array(Vec::new()));
    /// {
    ///     let mut vm = vm.pin(Value::object(array));
    ///     vm.collect_garbage();
    ///     assert!(vm.heap().contains(array));
    /// }
    /// vm.collect_garbage();
    /// assert!(!vm.heap().contains(array));
    /// ```
    pub fn pin(&mut self, value: Value) -> Pinned<'_> {
        let mark = self.pinned.len();
        self.pinned.push(value);
        Pinned { vm: self, mark }
    }

    /// Current depth of the host root stack
    pub fn root_mark(&self) -> RootMark {
        RootMark(self.pinned.len())
    }

    /// Roots a value until the matching [`Vm::release_roots`]
    pub fn add_root(&mut self, value: Value) {
        self.pinned.push(value);
    }

    /// Drops every root added since `mark`
    pub fn release_roots(&mut self, mark: RootMark) {
        self.pinned.truncate(mark.0);
    }
}

/// Scoped root returned by [`Vm::pin`].
///
/// Dereferences to the VM so that allocation can continue while the value
/// stays live.
pub struct Pinned<'vm> {
    vm: &'vm mut Vm,
    mark: usize,
}

impl Deref for Pinned<'_> {
    type Target = Vm;

    fn deref(&self) -> &Vm {
        self.vm
    }
}

impl DerefMut for Pinned<'_> {
    fn deref_mut(&mut self) -> &mut Vm {
        self.vm
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        self.vm.pinned.truncate(self.mark);
    }
}
