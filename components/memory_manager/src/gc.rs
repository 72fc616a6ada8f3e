//! Stop-the-world mark-sweep collector.
//!
//! A collection runs in four steps:
//! - the embedder marks its roots through a [`Marker`]
//! - gray objects are popped from the worklist and their references marked
//! - unmarked strings are dropped from the intern set, which is weak
//! - the allocation list is swept, freeing every unmarked object and
//!   clearing the mark on survivors
//!
//! Afterwards `bytes_allocated` equals the live-set size and `next_gc` is
//! rescaled from it.

use crate::heap::Heap;
use crate::table::Table;
use core_types::{ObjRef, Value};

/// Cumulative collector statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collection cycles
    pub collections: usize,
    /// Objects freed over all cycles
    pub objects_freed: usize,
    /// Bytes freed over all cycles
    pub bytes_freed: usize,
}

/// Outcome of a single collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    /// `bytes_allocated` when the cycle started
    pub bytes_before: usize,
    /// Live-set size after the sweep
    pub bytes_after: usize,
    /// Objects freed by this cycle
    pub objects_freed: usize,
    /// New collection threshold
    pub next_gc: usize,
}

/// Something that holds references the collector must treat as live.
pub trait RootSource {
    /// Marks every root through `marker`.
    fn mark_roots(&self, marker: &mut Marker<'_>);
}

/// Root-marking handle passed to a [`RootSource`].
pub struct Marker<'h> {
    heap: &'h mut Heap,
}

impl Marker<'_> {
    /// Marks the object a value refers to, if any.
    pub fn mark_value(&mut self, value: Value) {
        if let Some(obj) = value.as_object() {
            self.heap.mark_object(obj);
        }
    }

    /// Marks an object and queues it for tracing.
    pub fn mark_object(&mut self, obj: ObjRef) {
        self.heap.mark_object(obj);
    }

    /// Read access to the heap, for roots held in linked objects.
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Marks every key and value of a table.
    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.iter() {
            self.heap.mark_object(key.obj);
            self.mark_value(value);
        }
    }
}

impl Heap {
    /// Runs a full collection cycle.
    ///
    /// # Arguments
    ///
    /// * `roots` - Every reference held outside the heap
    pub fn collect(&mut self, roots: &dyn RootSource) -> CollectionStats {
        let bytes_before = self.bytes_allocated;
        log::debug!("-- gc begin ({} bytes allocated)", bytes_before);

        roots.mark_roots(&mut Marker { heap: self });
        self.trace_references();
        self.remove_white_strings();
        let objects_freed = self.sweep();

        self.next_gc = (self.bytes_allocated * self.config.growth_factor).max(self.config.min_threshold);
        self.stats.collections += 1;
        self.stats.objects_freed += objects_freed;
        self.stats.bytes_freed += bytes_before.saturating_sub(self.bytes_allocated);

        log::debug!(
            "-- gc end: collected {} bytes (from {} to {}), freed {} objects, next at {}",
            bytes_before.saturating_sub(self.bytes_allocated),
            bytes_before,
            self.bytes_allocated,
            objects_freed,
            self.next_gc
        );

        CollectionStats {
            bytes_before,
            bytes_after: self.bytes_allocated,
            objects_freed,
            next_gc: self.next_gc,
        }
    }

    fn mark_object(&mut self, obj: ObjRef) {
        let header = &mut self.entry_mut(obj).header;
        if header.marked {
            return;
        }
        header.marked = true;
        log::trace!("{:?} mark", obj);
        self.gray.push(obj);
    }

    fn trace_references(&mut self) {
        let mut children = Vec::new();
        while let Some(obj) = self.gray.pop() {
            self.get(obj).trace(&mut children);
            for child in children.drain(..) {
                self.mark_object(child);
            }
        }
    }

    fn remove_white_strings(&mut self) {
        let slots = &self.slots;
        self.strings.retain_keys(|key| {
            slots
                .get(key.obj.index())
                .and_then(|slot| slot.entry.as_ref())
                .map_or(false, |entry| entry.header.marked)
        });
    }

    fn sweep(&mut self) -> usize {
        let mut previous: Option<ObjRef> = None;
        let mut current = self.head;
        let mut live_bytes = 0;
        let mut freed = 0;

        while let Some(obj) = current {
            let entry = self.entry_mut(obj);
            let next = entry.header.next;
            if entry.header.marked {
                entry.header.marked = false;
                entry.header.size = entry.object.heap_size();
                live_bytes += entry.header.size;
                previous = Some(obj);
            } else {
                match previous {
                    Some(prev) => self.entry_mut(prev).header.next = next,
                    None => self.head = next,
                }
                self.free_slot(obj);
                freed += 1;
            }
            current = next;
        }

        self.bytes_allocated = live_bytes;
        freed
    }
}
