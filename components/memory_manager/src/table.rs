//! Open-addressed hash table keyed by interned strings.
//!
//! Capacity is always a power of two and probing is linear. Deleted entries
//! become tombstones so probe chains that ran through them stay intact;
//! tombstones count toward the load factor and are dropped on resize.

use core_types::{ObjRef, Value};
use std::mem::size_of;

const MIN_CAPACITY: usize = 8;

/// Table key: an interned string handle plus its cached hash.
///
/// Because strings are interned, two keys are equal exactly when their
/// handles are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrKey {
    /// The interned string
    pub obj: ObjRef,
    /// Its FNV-1a hash
    pub hash: u32,
}

impl StrKey {
    /// Pairs a string handle with its hash.
    pub fn new(obj: ObjRef, hash: u32) -> Self {
        Self { obj, hash }
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Empty,
    Tombstone,
    Occupied(StrKey, Value),
}

/// Hash map from interned strings to values.
///
/// # Examples
///
/// ```
/// use core_types::{ObjRef, Value};
/// use memory_manager::{StrKey, Table};
///
/// let key = StrKey::new(ObjRef::new(0, 0), 42);
/// let mut table = Table::new();
/// assert!(table.set(key, Value::number(1.0)));
/// assert!(!table.set(key, Value::number(2.0)));
/// assert_eq!(table.get(key), Some(Value::number(2.0)));
/// assert!(table.delete(key));
/// assert_eq!(table.get(key), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Entry>,
    live: usize,
    tombstones: usize,
}

impl Table {
    /// Creates an empty table. No storage is allocated until the first insert.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Looks up `key`.
    pub fn get(&self, key: StrKey) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        match self.entries[find_slot(&self.entries, key)] {
            Entry::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Returns
    ///
    /// `true` if the key was not present before.
    pub fn set(&mut self, key: StrKey, value: Value) -> bool {
        if (self.live + self.tombstones + 1) * 4 > self.entries.len() * 3 {
            let capacity = (self.entries.len() * 2).max(MIN_CAPACITY);
            self.resize(capacity);
        }

        let slot = find_slot(&self.entries, key);
        let is_new = match self.entries[slot] {
            Entry::Empty => {
                self.live += 1;
                true
            }
            Entry::Tombstone => {
                self.live += 1;
                self.tombstones -= 1;
                true
            }
            Entry::Occupied(..) => false,
        };
        self.entries[slot] = Entry::Occupied(key, value);
        is_new
    }

    /// Removes `key`, leaving a tombstone.
    ///
    /// # Returns
    ///
    /// `true` if the key was present.
    pub fn delete(&mut self, key: StrKey) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let slot = find_slot(&self.entries, key);
        if let Entry::Occupied(..) = self.entries[slot] {
            self.entries[slot] = Entry::Tombstone;
            self.live -= 1;
            self.tombstones += 1;
            true
        } else {
            false
        }
    }

    /// Copies every live entry of `self` into `to`, overwriting duplicates.
    pub fn add_all(&self, to: &mut Table) {
        for (key, value) in self.iter() {
            to.set(key, value);
        }
    }

    /// Finds a key by hash and content rather than by identity.
    ///
    /// Used by string interning before the string object exists; `matches`
    /// compares a candidate's bytes with the string being interned.
    pub fn find_string(&self, hash: u32, mut matches: impl FnMut(ObjRef) -> bool) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            match self.entries[index] {
                Entry::Empty => return None,
                Entry::Occupied(key, _) if key.hash == hash && matches(key.obj) => {
                    return Some(key.obj)
                }
                _ => {}
            }
            index = (index + 1) & mask;
        }
    }

    /// Deletes every entry whose key fails `keep`.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(StrKey) -> bool) {
        for entry in self.entries.iter_mut() {
            if let Entry::Occupied(key, _) = *entry {
                if !keep(key) {
                    *entry = Entry::Tombstone;
                    self.live -= 1;
                    self.tombstones += 1;
                }
            }
        }
    }

    /// Iterates over live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (StrKey, Value)> + '_ {
        self.entries.iter().filter_map(|entry| match *entry {
            Entry::Occupied(key, value) => Some((key, value)),
            _ => None,
        })
    }

    /// Bytes owned by the slot array.
    pub fn heap_size(&self) -> usize {
        self.entries.capacity() * size_of::<Entry>()
    }

    fn resize(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![Entry::Empty; capacity]);
        self.live = 0;
        self.tombstones = 0;
        for entry in old {
            if let Entry::Occupied(key, value) = entry {
                let slot = find_slot(&self.entries, key);
                self.entries[slot] = Entry::Occupied(key, value);
                self.live += 1;
            }
        }
    }
}

/// Probe for `key`: its own slot if present, otherwise the first tombstone
/// passed on the way, otherwise the empty slot that ended the chain.
fn find_slot(entries: &[Entry], key: StrKey) -> usize {
    let mask = entries.len() - 1;
    let mut index = key.hash as usize & mask;
    let mut tombstone = None;
    loop {
        match entries[index] {
            Entry::Empty => return tombstone.unwrap_or(index),
            Entry::Tombstone => {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
            Entry::Occupied(existing, _) if existing.obj == key.obj => return index,
            Entry::Occupied(..) => {}
        }
        index = (index + 1) & mask;
    }
}
