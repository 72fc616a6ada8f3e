//! Object heap
//!
//! Objects live in a slot arena addressed by generational [`ObjRef`]
//! handles. Every allocated object is additionally threaded onto an
//! intrusive allocation list through its [`Header`], newest first, which is
//! what the sweep phase walks.
//!
//! The heap never collects on its own. The VM asks [`Heap::should_collect`]
//! before allocating and runs [`Heap::collect`] with its roots when needed.

use crate::config::GcConfig;
use crate::gc::GcStats;
use crate::object::{hash_bytes, LoxString, Object};
use crate::table::{StrKey, Table};
use core_types::ObjRef;

/// Per-object collector bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    /// Reachability mark; only set during a collection
    pub marked: bool,
    /// Next object in the allocation list
    pub next: Option<ObjRef>,
    /// Bytes currently charged for this object
    pub size: usize,
}

#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub(crate) header: Header,
    pub(crate) object: Object,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) generation: u16,
    pub(crate) entry: Option<HeapEntry>,
}

/// The object heap.
///
/// # Examples
///
/// ```
/// use memory_manager::{GcConfig, Heap, Object};
///
/// let mut heap = Heap::new(GcConfig::default());
/// let array = heap.allocate(Object::Array(Vec::new()));
/// assert!(heap.get(array).as_array().is_some());
/// assert_eq!(heap.object_count(), 1);
/// ```
#[derive(Debug)]
pub struct Heap {
    pub(crate) slots: Vec<Slot>,
    pub(crate) free: Vec<u32>,
    pub(crate) head: Option<ObjRef>,
    pub(crate) strings: Table,
    pub(crate) bytes_allocated: usize,
    pub(crate) next_gc: usize,
    pub(crate) gray: Vec<ObjRef>,
    pub(crate) config: GcConfig,
    pub(crate) stats: GcStats,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

impl Heap {
    /// Creates an empty heap.
    pub fn new(config: GcConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: config.initial_threshold,
            gray: Vec::new(),
            config,
            stats: GcStats::default(),
        }
    }

    /// Stores `object`, links it at the head of the allocation list and
    /// charges its size.
    ///
    /// # Arguments
    ///
    /// * `object` - The record to store
    ///
    /// # Returns
    ///
    /// A handle that stays valid until a collection finds the object
    /// unreachable.
    pub fn allocate(&mut self, object: Object) -> ObjRef {
        let size = object.heap_size();
        let kind = object.kind();
        let entry = HeapEntry {
            header: Header {
                marked: false,
                next: self.head,
                size,
            },
            object,
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        let obj = ObjRef::new(index, slot.generation);

        self.head = Some(obj);
        self.bytes_allocated += size;
        log::trace!("{:?} allocate {} for {}", obj, size, kind);
        obj
    }

    /// Whether allocating `incoming` more bytes should first run a
    /// collection.
    pub fn should_collect(&self, incoming: usize) -> bool {
        self.config.stress || self.bytes_allocated + incoming > self.next_gc
    }

    /// Borrows a live object.
    ///
    /// # Panics
    ///
    /// Panics if `obj` refers to a freed object.
    pub fn get(&self, obj: ObjRef) -> &Object {
        &self.entry(obj).object
    }

    /// Mutably borrows a live object.
    ///
    /// # Panics
    ///
    /// Panics if `obj` refers to a freed object.
    pub fn get_mut(&mut self, obj: ObjRef) -> &mut Object {
        &mut self.entry_mut(obj).object
    }

    /// Borrows an object if the handle is still live.
    pub fn try_get(&self, obj: ObjRef) -> Option<&Object> {
        match self.slots.get(obj.index()) {
            Some(Slot {
                generation,
                entry: Some(entry),
            }) if *generation == obj.generation() => Some(&entry.object),
            _ => None,
        }
    }

    /// Returns `true` if the handle refers to a live object.
    pub fn contains(&self, obj: ObjRef) -> bool {
        self.try_get(obj).is_some()
    }

    /// Header of a live object.
    pub fn header(&self, obj: ObjRef) -> &Header {
        &self.entry(obj).header
    }

    /// Recharges an object after its owned buffers changed size.
    pub fn adjust_size(&mut self, obj: ObjRef) {
        let entry = self.entry_mut(obj);
        let size = entry.object.heap_size();
        let old = std::mem::replace(&mut entry.header.size, size);
        self.bytes_allocated = (self.bytes_allocated + size).saturating_sub(old);
    }

    /// Table key for an interned string.
    pub fn key(&self, string: ObjRef) -> StrKey {
        let hash = self.get(string).as_string().map_or(0, LoxString::hash);
        StrKey::new(string, hash)
    }

    /// Finds the interned string with this content.
    pub fn intern_lookup(&self, bytes: &[u8]) -> Option<ObjRef> {
        let hash = hash_bytes(bytes);
        let slots = &self.slots;
        self.strings.find_string(hash, |candidate| {
            slots
                .get(candidate.index())
                .and_then(|slot| slot.entry.as_ref())
                .and_then(|entry| entry.object.as_string())
                .map_or(false, |s| s.as_bytes() == bytes)
        })
    }

    /// Registers a freshly allocated string in the intern set.
    pub fn intern_insert(&mut self, string: ObjRef) {
        let key = self.key(string);
        self.strings.set(key, core_types::Value::NIL);
    }

    /// Number of strings in the intern set.
    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    /// Total bytes charged to live and not-yet-collected objects.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Threshold that triggers the next collection.
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    /// Collector configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Cumulative collector statistics.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Number of objects on the allocation list.
    pub fn object_count(&self) -> usize {
        self.objects().count()
    }

    /// Walks the allocation list, newest first.
    pub fn objects(&self) -> impl Iterator<Item = ObjRef> + '_ {
        std::iter::successors(self.head, move |obj| self.entry(*obj).header.next)
    }

    pub(crate) fn entry(&self, obj: ObjRef) -> &HeapEntry {
        match self.slots.get(obj.index()) {
            Some(Slot {
                generation,
                entry: Some(entry),
            }) if *generation == obj.generation() => entry,
            _ => panic!("stale object handle {:?}", obj),
        }
    }

    pub(crate) fn entry_mut(&mut self, obj: ObjRef) -> &mut HeapEntry {
        match self.slots.get_mut(obj.index()) {
            Some(Slot {
                generation,
                entry: Some(entry),
            }) if *generation == obj.generation() => entry,
            _ => panic!("stale object handle {:?}", obj),
        }
    }

    /// Releases the slot of an object already unlinked from the list.
    pub(crate) fn free_slot(&mut self, obj: ObjRef) -> Option<HeapEntry> {
        let slot = self.slots.get_mut(obj.index())?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(obj.index() as u32);
        log::trace!("{:?} free type {}", obj, entry.object.kind());
        Some(entry)
    }
}
