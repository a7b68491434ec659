//! Hash map object
//!
//! Open addressing with linear probing. Each entry is in one of three states:
//!
//! | key         | value   | state      |
//! |-------------|---------|------------|
//! | `UNDEFINED` | `false` | empty      |
//! | `UNDEFINED` | `true`  | tombstone  |
//! | anything    | any     | live       |
//!
//! Tombstones keep probe chains intact after removal. They count against the
//! load factor and are purged whenever the table is rebuilt.

use crate::vm::gc::Heap;
use crate::vm::object::{Obj, ObjRef};
use crate::vm::value::Value;

/// Smallest non-zero capacity
pub const MIN_CAPACITY: usize = 16;

/// Capacity multiplier on growth
pub const GROW_FACTOR: usize = 2;

/// Percentage of slots (live + tombstones) that may be occupied
pub const LOAD_PERCENT: usize = 75;

/// One slot of the table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEntry {
    /// Key, or `UNDEFINED` for empty slots and tombstones
    pub key: Value,
    /// Value; for unused slots, `false` marks empty and `true` a tombstone
    pub value: Value,
}

impl MapEntry {
    const EMPTY: MapEntry = MapEntry {
        key: Value::UNDEFINED,
        value: Value::FALSE,
    };

    const TOMBSTONE: MapEntry = MapEntry {
        key: Value::UNDEFINED,
        value: Value::TRUE,
    };

    /// Whether this slot holds a live entry
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.key.is_undefined()
    }

    #[inline]
    fn is_tombstone(&self) -> bool {
        self.key.is_undefined() && self.value == Value::TRUE
    }
}

/// Hash map from value-type keys to values
#[derive(Debug, Clone, Default)]
pub struct ObjMap {
    entries: Vec<MapEntry>,
    count: usize,
    tombstones: usize,
}

impl ObjMap {
    /// Create an empty map with no storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of tombstones currently in the table
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// All slots, live or not. Index order is the iteration order.
    #[inline]
    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    /// Live entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.is_live())
            .map(|entry| (entry.key, entry.value))
    }

    /// Index of the first live slot at or after `start`
    pub fn next_live(&self, start: usize) -> Option<usize> {
        (start..self.entries.len()).find(|&i| self.entries[i].is_live())
    }
}

/// Probe for `key`. `Ok(i)` if found at slot `i`, otherwise `Err(i)` with the
/// slot to insert into (the first tombstone passed, or the empty slot ending
/// the chain).
fn find_entry(
    entries: &[MapEntry],
    key: Value,
    hash: u32,
    mut matches: impl FnMut(Value) -> bool,
) -> Result<usize, Option<usize>> {
    let capacity = entries.len();
    if capacity == 0 {
        return Err(None);
    }

    let start = hash as usize % capacity;
    let mut index = start;
    let mut tombstone = None;

    loop {
        let entry = &entries[index];
        if !entry.is_live() {
            if entry.is_tombstone() {
                tombstone.get_or_insert(index);
            } else {
                return Err(Some(tombstone.unwrap_or(index)));
            }
        } else if Value::same(entry.key, key) || matches(entry.key) {
            return Ok(index);
        }

        index = (index + 1) % capacity;
        if index == start {
            // Every slot is live or a tombstone; the load factor guarantees
            // at least one tombstone in that case.
            return Err(tombstone);
        }
    }
}

/// Thomas Wang's 64-bit integer mix, truncated to 30 bits
fn hash_bits(mut hash: u64) -> u32 {
    hash = (!hash).wrapping_add(hash << 18);
    hash ^= hash >> 31;
    hash = hash.wrapping_mul(21);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 6);
    hash ^= hash >> 22;
    (hash & 0x3fff_ffff) as u32
}

impl Heap {
    /// Whether `value` may be used as a map key (immutable value types only)
    pub fn is_valid_key(&self, value: Value) -> bool {
        if !value.is_obj() {
            return !value.is_undefined();
        }
        matches!(self.obj(value.as_obj()), Obj::Class(_) | Obj::Range(_) | Obj::String(_))
    }

    /// Hash of a valid map key
    pub fn hash_value(&self, value: Value) -> u32 {
        let Some(obj) = value.try_obj() else {
            return hash_bits(value.to_bits());
        };
        match self.obj(obj) {
            Obj::String(s) => s.hash(),
            Obj::Class(c) => self.string(c.name).hash(),
            Obj::Range(r) => hash_bits(r.from.to_bits()) ^ hash_bits(r.to.to_bits()),
            other => panic!("cannot hash {:?} object", other.kind()),
        }
    }

    /// Language-level equality: identity, or equal contents for strings and ranges
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        if Value::same(a, b) {
            return true;
        }
        let (Some(a), Some(b)) = (a.try_obj(), b.try_obj()) else {
            return false;
        };
        match (self.obj(a), self.obj(b)) {
            (Obj::String(x), Obj::String(y)) => x.hash() == y.hash() && x.as_bytes() == y.as_bytes(),
            (Obj::Range(x), Obj::Range(y)) => x == y,
            _ => false,
        }
    }

    /// Look up `key`
    pub fn map_get(&self, map: ObjRef, key: Value) -> Option<Value> {
        let entries = self.map(map).entries();
        let hash = self.hash_value(key);
        find_entry(entries, key, hash, |k| self.values_equal(k, key))
            .ok()
            .map(|i| entries[i].value)
    }

    /// Whether `key` is present
    pub fn map_contains(&self, map: ObjRef, key: Value) -> bool {
        self.map_get(map, key).is_some()
    }

    /// Insert or overwrite `key`
    pub fn map_set(&mut self, map: ObjRef, key: Value, value: Value) {
        let (count, tombstones, capacity) = {
            let m = self.map(map);
            (m.count, m.tombstones, m.capacity())
        };
        if count + tombstones + 1 > capacity * LOAD_PERCENT / 100 {
            let new_capacity = (capacity * GROW_FACTOR).max(MIN_CAPACITY);
            self.map_resize(map, new_capacity);
        }

        let hash = self.hash_value(key);
        let slot = {
            let entries = self.map(map).entries();
            find_entry(entries, key, hash, |k| self.values_equal(k, key))
        };

        let m = self.map_mut(map);
        match slot {
            Ok(index) => m.entries[index].value = value,
            Err(Some(index)) => {
                if m.entries[index].is_tombstone() {
                    m.tombstones -= 1;
                }
                m.entries[index] = MapEntry { key, value };
                m.count += 1;
            }
            Err(None) => unreachable!("map has no free slot after resize"),
        }
    }

    /// Remove `key`, returning its value if it was present
    pub fn map_remove(&mut self, map: ObjRef, key: Value) -> Option<Value> {
        let hash = self.hash_value(key);
        let index = {
            let entries = self.map(map).entries();
            find_entry(entries, key, hash, |k| self.values_equal(k, key)).ok()?
        };

        let m = self.map_mut(map);
        let value = m.entries[index].value;
        m.entries[index] = MapEntry::TOMBSTONE;
        m.count -= 1;
        m.tombstones += 1;

        let (count, capacity) = (m.count, m.capacity());
        if count == 0 {
            self.map_clear(map);
        } else if capacity > MIN_CAPACITY && count < capacity / GROW_FACTOR * LOAD_PERCENT / 100 {
            let new_capacity = (capacity / GROW_FACTOR).max(MIN_CAPACITY);
            self.map_resize(map, new_capacity);
        }
        Some(value)
    }

    /// Drop every entry and release the table
    pub fn map_clear(&mut self, map: ObjRef) {
        let m = self.map_mut(map);
        m.entries = Vec::new();
        m.count = 0;
        m.tombstones = 0;
    }

    /// Rebuild the table at `capacity`, keeping live entries only
    fn map_resize(&mut self, map: ObjRef, capacity: usize) {
        let old = std::mem::take(&mut self.map_mut(map).entries);
        let mut entries = vec![MapEntry::EMPTY; capacity];

        for entry in old.iter().filter(|e| e.is_live()) {
            let hash = self.hash_value(entry.key);
            // Keys are already unique, so any free slot in the chain will do.
            match find_entry(&entries, entry.key, hash, |_| false) {
                Err(Some(index)) => entries[index] = *entry,
                _ => unreachable!("resized map must have room for every live entry"),
            }
        }

        self.track_bytes(capacity * std::mem::size_of::<MapEntry>());
        let m = self.map_mut(map);
        m.entries = entries;
        m.tombstones = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::{ObjRange, ObjString};

    fn new_map(heap: &mut Heap) -> ObjRef {
        heap.insert(None, Obj::Map(ObjMap::new()))
    }

    fn string(heap: &mut Heap, text: &str) -> Value {
        Value::from(heap.insert(None, Obj::String(ObjString::new(text.as_bytes()))))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        for i in 0..100 {
            heap.map_set(map, Value::num(i as f64), Value::num((i * 10) as f64));
        }

        assert_eq!(heap.map(map).count(), 100);
        for i in 0..100 {
            assert_eq!(heap.map_get(map, Value::num(i as f64)), Some(Value::num((i * 10) as f64)));
        }
        assert_eq!(heap.map_get(map, Value::num(100.0)), None);
    }

    #[test]
    fn test_load_factor_counts_tombstones() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        for i in 0..200 {
            heap.map_set(map, Value::num(i as f64), Value::TRUE);
            if i % 3 == 0 {
                heap.map_remove(map, Value::num(i as f64));
            }
            let m = heap.map(map);
            assert!(m.count() + m.tombstones() <= m.capacity() * LOAD_PERCENT / 100);
        }
    }

    #[test]
    fn test_remove_leaves_probe_chain_intact() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        let keys: Vec<Value> = (0..40).map(|i| Value::num(i as f64 * 0.5)).collect();
        for &key in &keys {
            heap.map_set(map, key, key);
        }
        for &key in keys.iter().step_by(2) {
            assert_eq!(heap.map_remove(map, key), Some(key));
        }

        assert_eq!(heap.map(map).count(), 20);
        for (i, &key) in keys.iter().enumerate() {
            let expected = if i % 2 == 0 { None } else { Some(key) };
            assert_eq!(heap.map_get(map, key), expected);
        }
        assert_eq!(heap.map_remove(map, Value::num(1000.0)), None);
    }

    #[test]
    fn test_resize_purges_tombstones() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        for i in 0..12 {
            heap.map_set(map, Value::num(i as f64), Value::NULL);
        }
        for i in 0..11 {
            heap.map_remove(map, Value::num(i as f64));
        }
        // Force growth: the rebuilt table carries only live entries.
        for i in 100..120 {
            heap.map_set(map, Value::num(i as f64), Value::NULL);
        }

        let m = heap.map(map);
        assert_eq!(m.count(), 21);
        assert_eq!(m.iter().count(), 21);
        assert!(m.tombstones() < m.capacity());
    }

    #[test]
    fn test_removing_last_entry_frees_table() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        heap.map_set(map, Value::TRUE, Value::num(1.0));
        assert_eq!(heap.map(map).capacity(), MIN_CAPACITY);
        heap.map_remove(map, Value::TRUE);
        assert_eq!(heap.map(map).capacity(), 0);
        assert_eq!(heap.map(map).count(), 0);
    }

    #[test]
    fn test_string_and_range_keys_compare_by_content() {
        let mut heap = Heap::new();
        let map = new_map(&mut heap);

        let a = string(&mut heap, "key");
        let b = string(&mut heap, "key");
        assert_ne!(a, b);

        heap.map_set(map, a, Value::num(1.0));
        heap.map_set(map, b, Value::num(2.0));
        assert_eq!(heap.map(map).count(), 1);
        assert_eq!(heap.map_get(map, a), Some(Value::num(2.0)));

        let range = |heap: &mut Heap| {
            Value::from(heap.insert(
                None,
                Obj::Range(ObjRange {
                    from: 1.0,
                    to: 3.0,
                    is_inclusive: true,
                }),
            ))
        };
        let r1 = range(&mut heap);
        let r2 = range(&mut heap);
        heap.map_set(map, r1, Value::TRUE);
        assert_eq!(heap.map_get(map, r2), Some(Value::TRUE));
    }

    #[test]
    fn test_valid_keys() {
        let mut heap = Heap::new();
        let list = Value::from(heap.insert(None, Obj::List(Default::default())));
        let text = string(&mut heap, "ok");

        assert!(heap.is_valid_key(Value::NULL));
        assert!(heap.is_valid_key(Value::num(3.0)));
        assert!(heap.is_valid_key(text));
        assert!(!heap.is_valid_key(list));
    }
}
