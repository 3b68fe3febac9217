//! `Map` value storage: open addressing with linear probing and tombstones
//! (§3 object kinds table; algorithm ported from
//! `original_source/src/valuetable.c`).
//!
//! `Nil`-key slots are empty; a tombstone is a `Nil` key paired with a
//! non-`Nil` value (`Bool(true)`, exactly as the reference `valueTableDelete`
//! leaves it), so deletion never has to shift entries. Load factor is kept
//! at or under 0.75; growth doubles capacity and rehashes, which also
//! reclaims tombstones (§3 Invariants).

use crate::{heap::Heap, value::Value};

const MAX_LOAD: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Entry {
    hash: u32,
    key: Value,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Self { hash: 0, key: Value::Nil, value: Value::Nil }
    }
}

#[derive(Debug, Default)]
pub struct SaffronMap {
    entries: Vec<Entry>,
    count: usize,
}

impl SaffronMap {
    pub fn new() -> Self {
        Self { entries: Vec::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn find_slot(entries: &[Entry], key: &Value, hash: u32, heap: &Heap) -> usize {
        let capacity = entries.len();
        let mut index = (hash as usize) & (capacity - 1);
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            if entry.key.is_nil() {
                if entry.value.is_nil() {
                    return tombstone.unwrap_or(index);
                }
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            } else if entry.hash == hash && entry.key.equals(key, heap) {
                return index;
            }
            index = (index + 1) & (capacity - 1);
        }
    }

    fn grow(&mut self, heap: &Heap) {
        let new_capacity = if self.entries.is_empty() { INITIAL_CAPACITY } else { self.entries.len() * 2 };
        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut count = 0;
        for entry in &self.entries {
            if entry.key.is_nil() {
                continue;
            }
            let slot = Self::find_slot(&new_entries, &entry.key, entry.hash, heap);
            new_entries[slot] = *entry;
            count += 1;
        }
        self.entries = new_entries;
        self.count = count;
    }

    pub fn get(&self, key: &Value, heap: &Heap) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = key.hash(heap);
        let slot = Self::find_slot(&self.entries, key, hash, heap);
        let entry = &self.entries[slot];
        if entry.key.is_nil() { None } else { Some(entry.value) }
    }

    /// Inserts or overwrites. Returns `true` if this created a new key.
    pub fn set(&mut self, key: Value, value: Value, heap: &Heap) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD {
            self.grow(heap);
        }
        let hash = key.hash(heap);
        let slot = Self::find_slot(&self.entries, &key, hash, heap);
        let is_new = self.entries[slot].key.is_nil();
        if is_new {
            self.count += 1;
        }
        self.entries[slot] = Entry { hash, key, value };
        is_new
    }

    /// Deletes by key, leaving a tombstone. Returns whether a key was removed.
    pub fn delete(&mut self, key: &Value, heap: &Heap) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let hash = key.hash(heap);
        let slot = Self::find_slot(&self.entries, key, hash, heap);
        if self.entries[slot].key.is_nil() {
            return false;
        }
        self.entries[slot] = Entry { hash, key: Value::Nil, value: Value::Bool(true) };
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.entries.iter().filter(|e| !e.key.is_nil()).map(|e| (e.key, e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::heap::Heap;

    #[test]
    fn insert_then_delete_then_reinsert_sees_the_latest_value() {
        let heap = Heap::new();
        let mut map = SaffronMap::new();
        let key = Value::Number(1.0);
        map.set(key, Value::Number(10.0), &heap);
        map.delete(&key, &heap);
        map.set(key, Value::Number(20.0), &heap);
        assert_eq!(map.get(&key, &heap), Some(Value::Number(20.0)));
    }

    #[test]
    fn never_exceeds_load_factor_of_three_quarters() {
        let heap = Heap::new();
        let mut map = SaffronMap::new();
        for i in 0..100 {
            map.set(Value::Number(f64::from(i)), Value::Bool(true), &heap);
        }
        assert!((map.count as f64) <= map.entries.len() as f64 * MAX_LOAD);
    }
}
