//! Upvalue capture and closing
//!
//! Open upvalues form an intrusive singly linked list through
//! [`Upvalue::next`], sorted by stack slot in descending order, so at most
//! one upvalue exists per captured slot and closing a frame only walks the
//! head of the list.

use core_types::{ObjRef, Value};
use memory_manager::{Object, Upvalue, UpvalueState};

use crate::vm::Vm;

impl Vm {
    /// Returns the open upvalue for `slot`, creating it if needed
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        let mut previous = None;
        let mut current = self.open_upvalues;
        while let Some(upvalue) = current {
            let (location, next) = self.open_slot(upvalue);
            if location == slot {
                return upvalue;
            }
            if location < slot {
                break;
            }
            previous = Some(upvalue);
            current = next;
        }

        let created = self.alloc(Object::Upvalue(Upvalue {
            state: UpvalueState::Open(slot),
            next: current,
        }));
        match previous {
            Some(previous) => {
                if let Some(upvalue) = self.heap.get_mut(previous).as_upvalue_mut() {
                    upvalue.next = Some(created);
                }
            }
            None => self.open_upvalues = Some(created),
        }
        created
    }

    /// Closes every open upvalue at or above stack slot `last`
    pub(crate) fn close_upvalues(&mut self, last: usize) {
        while let Some(head) = self.open_upvalues {
            let (slot, next) = self.open_slot(head);
            if slot < last {
                break;
            }
            let value = self.stack[slot];
            if let Some(upvalue) = self.heap.get_mut(head).as_upvalue_mut() {
                upvalue.state = UpvalueState::Closed(value);
                upvalue.next = None;
            }
            self.open_upvalues = next;
        }
    }

    pub(crate) fn read_upvalue(&self, upvalue: ObjRef) -> Value {
        match self.heap.get(upvalue).as_upvalue().map(|u| u.state) {
            Some(UpvalueState::Open(slot)) => self.stack[slot],
            Some(UpvalueState::Closed(value)) => value,
            None => Value::NIL,
        }
    }

    pub(crate) fn write_upvalue(&mut self, upvalue: ObjRef, value: Value) {
        let state = self.heap.get(upvalue).as_upvalue().map(|u| u.state);
        match state {
            Some(UpvalueState::Open(slot)) => self.stack[slot] = value,
            Some(UpvalueState::Closed(_)) => {
                if let Some(upvalue) = self.heap.get_mut(upvalue).as_upvalue_mut() {
                    upvalue.state = UpvalueState::Closed(value);
                }
            }
            None => {}
        }
    }

    /// Stack slot and successor of an upvalue on the open list
    fn open_slot(&self, upvalue: ObjRef) -> (usize, Option<ObjRef>) {
        match self.heap.get(upvalue).as_upvalue() {
            Some(Upvalue {
                state: UpvalueState::Open(slot),
                next,
            }) => (*slot, *next),
            _ => (0, None),
        }
    }

    /// Number of upvalues on the open list
    pub fn open_upvalue_count(&self) -> usize {
        std::iter::successors(self.open_upvalues, |u| self.open_slot(*u).1).count()
    }
}
