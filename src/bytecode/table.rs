//! Open-addressing hash table keyed by interned strings.
//!
//! One table type serves two roles: the interning pool (content -> canonical
//! string, values unused) and the globals namespace (interned name -> value).
//! Keys are compared by identity; only `find_string` compares bytes, which is
//! how a handle is found before one exists.

use std::rc::Rc;

use super::buffer::grow_capacity;
use super::value::{hash_str, HeapString, ObjectRef, Value};

/// Live entries may fill at most this share of the slots.
const MAX_LOAD_NUMERATOR: usize = 3;
const MAX_LOAD_DENOMINATOR: usize = 4;

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Tombstone,
    Occupied { key: ObjectRef, value: Value },
}

/// Result of probing for a key.
enum Probe {
    Found(usize),
    /// Key absent; the index is where it should be inserted.
    Vacant(usize),
    /// Key absent and no slot is free (only possible with zero capacity).
    Full,
}

#[derive(Debug, Clone, Default)]
pub struct StringTable {
    slots: Vec<Slot>,
    /// Occupied slots. Tombstones are not counted.
    count: usize,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Insert or overwrite. Returns `true` when an existing binding was replaced.
    pub fn set(&mut self, key: ObjectRef, value: Value) -> bool {
        if (self.count + 1) * MAX_LOAD_DENOMINATOR > self.capacity() * MAX_LOAD_NUMERATOR {
            self.grow();
        }

        match self.probe(&key) {
            Probe::Found(index) => {
                self.slots[index] = Slot::Occupied { key, value };
                true
            }
            Probe::Vacant(index) => {
                self.slots[index] = Slot::Occupied { key, value };
                self.count += 1;
                false
            }
            // grow() above guarantees a free slot
            Probe::Full => false,
        }
    }

    pub fn get(&self, key: &ObjectRef) -> Option<Value> {
        match self.probe(key) {
            Probe::Found(index) => match &self.slots[index] {
                Slot::Occupied { value, .. } => Some(value.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Remove a binding, leaving a tombstone. Returns whether it existed.
    pub fn delete(&mut self, key: &ObjectRef) -> bool {
        match self.probe(key) {
            Probe::Found(index) => {
                self.slots[index] = Slot::Tombstone;
                self.count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Look a string up by content. Used by the interner before a handle exists.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<ObjectRef> {
        let capacity = self.capacity();
        if capacity == 0 {
            return None;
        }
        let mask = capacity - 1;
        let mut index = hash as usize & mask;
        for _ in 0..capacity {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { key, .. } => {
                    if key.hash() == hash && key.as_str() == chars {
                        return Some(key.clone());
                    }
                }
            }
            index = (index + 1) & mask;
        }
        None
    }

    /// Return the canonical string for `chars`, allocating it on first use.
    pub fn intern(&mut self, chars: &str) -> ObjectRef {
        let hash = hash_str(chars);
        if let Some(existing) = self.find_string(chars, hash) {
            return existing;
        }
        let string = Rc::new(HeapString::new(chars));
        self.set(string.clone(), Value::Nil);
        string
    }

    /// Intern an owned string without copying when it is new.
    pub fn intern_owned(&mut self, chars: String) -> ObjectRef {
        let hash = hash_str(&chars);
        if let Some(existing) = self.find_string(&chars, hash) {
            return existing;
        }
        let string = Rc::new(HeapString::new(chars));
        self.set(string.clone(), Value::Nil);
        string
    }

    /// Canonicalize a handle that may come from another pool. A string with
    /// the same content already interned wins; otherwise `string` itself
    /// becomes canonical.
    pub fn adopt(&mut self, string: &ObjectRef) -> ObjectRef {
        if let Some(existing) = self.find_string(string.as_str(), string.hash()) {
            return existing;
        }
        self.set(string.clone(), Value::Nil);
        string.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectRef, &Value)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value } => Some((key, value)),
            _ => None,
        })
    }

    /// Drop every entry and release the slot array.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.count = 0;
    }

    fn probe(&self, key: &ObjectRef) -> Probe {
        let capacity = self.capacity();
        if capacity == 0 {
            return Probe::Full;
        }
        let mask = capacity - 1;
        let mut index = key.hash() as usize & mask;
        let mut first_tombstone = None;
        for _ in 0..capacity {
            match &self.slots[index] {
                Slot::Empty => return Probe::Vacant(first_tombstone.unwrap_or(index)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied { key: existing, .. } => {
                    if Rc::ptr_eq(existing, key) {
                        return Probe::Found(index);
                    }
                }
            }
            index = (index + 1) & mask;
        }
        match first_tombstone {
            Some(index) => Probe::Vacant(index),
            None => Probe::Full,
        }
    }

    /// Rehash live entries into a table of doubled capacity.
    fn grow(&mut self) {
        let capacity = grow_capacity(self.capacity());
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.count = 0;
        for slot in old {
            if let Slot::Occupied { key, value } = slot {
                if let Probe::Vacant(index) = self.probe(&key) {
                    self.slots[index] = Slot::Occupied { key, value };
                    self.count += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_intern_returns_same_handle() {
        let mut strings = StringTable::new();
        let a = strings.intern("hello");
        let b = strings.intern("hello");
        let c = strings.intern_owned("hel".to_string() + "lo");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&a, &c));
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn test_distinct_contents_distinct_handles() {
        let mut strings = StringTable::new();
        let a = strings.intern("a");
        let b = strings.intern("b");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_set_reports_replacement() {
        let mut strings = StringTable::new();
        let mut globals = StringTable::new();
        let x = strings.intern("x");
        assert!(!globals.set(x.clone(), Value::Int(1)));
        assert!(globals.set(x.clone(), Value::Int(2)));
        assert_eq!(globals.get(&x), Some(Value::Int(2)));
        assert_eq!(globals.len(), 1);
    }

    #[test]
    fn test_keys_compare_by_identity() {
        let mut globals = StringTable::new();
        let interned = Rc::new(HeapString::new("x"));
        let impostor = Rc::new(HeapString::new("x"));
        globals.set(interned.clone(), Value::Bool(true));
        assert!(globals.get(&impostor).is_none());
        assert!(globals.get(&interned).is_some());
    }

    #[test]
    fn test_delete_leaves_probe_chain_intact() {
        let mut strings = StringTable::new();
        let mut globals = StringTable::new();
        let keys: Vec<_> = (0..6).map(|i| strings.intern(&format!("k{}", i))).collect();
        for (i, key) in keys.iter().enumerate() {
            globals.set(key.clone(), Value::Int(i as i32));
        }
        assert!(globals.delete(&keys[2]));
        assert!(!globals.delete(&keys[2]));
        assert_eq!(globals.len(), 5);
        for (i, key) in keys.iter().enumerate() {
            if i == 2 {
                assert_eq!(globals.get(key), None);
            } else {
                assert_eq!(globals.get(key), Some(Value::Int(i as i32)));
            }
        }
        // tombstone slot is reused
        globals.set(keys[2].clone(), Value::Nil);
        assert_eq!(globals.len(), 6);
    }

    #[test]
    fn test_grows_at_three_quarters() {
        let mut strings = StringTable::new();
        let mut globals = StringTable::new();
        for i in 0..6 {
            globals.set(strings.intern(&i.to_string()), Value::Nil);
        }
        assert_eq!(globals.capacity(), 8);
        globals.set(strings.intern("6"), Value::Nil);
        assert_eq!(globals.capacity(), 16);
        assert_eq!(globals.len(), 7);
    }

    #[test]
    fn test_churn_with_tombstones_never_loops() {
        let mut strings = StringTable::new();
        let mut globals = StringTable::new();
        for round in 0..200 {
            let key = strings.intern(&format!("churn{}", round));
            globals.set(key.clone(), Value::Int(round));
            globals.delete(&key);
            assert!(globals.get(&key).is_none());
        }
        assert!(globals.is_empty());
        // growth tracks live entries, not tombstones
        assert_eq!(globals.capacity(), 8);
    }

    #[test]
    fn test_adopt_prefers_existing_handle() {
        let mut strings = StringTable::new();
        let canonical = strings.intern("shared");
        let foreign = Rc::new(HeapString::new("shared"));
        assert!(Rc::ptr_eq(&strings.adopt(&foreign), &canonical));

        let fresh = Rc::new(HeapString::new("fresh"));
        assert!(Rc::ptr_eq(&strings.adopt(&fresh), &fresh));
        assert!(Rc::ptr_eq(&strings.intern("fresh"), &fresh));
    }

    #[test]
    fn test_clear_releases() {
        let mut strings = StringTable::new();
        let s = strings.intern("gone");
        assert_eq!(Rc::strong_count(&s), 2);
        strings.clear();
        assert_eq!(Rc::strong_count(&s), 1);
        assert_eq!(strings.capacity(), 0);
    }

    proptest! {
        #[test]
        fn prop_interning_is_canonical(words in proptest::collection::vec("[a-z]{0,6}", 1..64)) {
            let mut strings = StringTable::new();
            let handles: Vec<_> = words.iter().map(|w| strings.intern(w)).collect();
            for (i, a) in words.iter().enumerate() {
                for (j, b) in words.iter().enumerate() {
                    prop_assert_eq!(Rc::ptr_eq(&handles[i], &handles[j]), a == b);
                }
            }
        }
    }
}
