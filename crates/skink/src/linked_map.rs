//! Insertion-ordered hash table backing script `Map` and `Set`.
//!
//! A hashbrown `HashTable` maps SameValueZero key hashes to node indices,
//! and the nodes are threaded on a doubly-linked list in insertion order.
//! The structure deliberately diverges from fail-fast collections: iterators
//! survive concurrent mutation. Deletion clears a node's `prev` link but
//! keeps `next` intact, so an iterator parked on a deleted node keeps
//! advancing through the survivors; `clear()` severs the old list in place
//! and starts a fresh head, so old iterators terminate gracefully instead
//! of raising.

use hashbrown::HashTable;

use crate::value::{Value, same_value_zero, same_zero_hash};

#[derive(Debug)]
struct MapNode {
    key: Value,
    value: Value,
    hash: u64,
    prev: Option<u32>,
    next: Option<u32>,
    deleted: bool,
}

/// Iterator cursor over a [`LinkedMap`]. Owned by iterator objects so it
/// must stay valid across arbitrary map mutations.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MapCursor {
    /// Before the first entry.
    Start,
    /// Parked on the node last yielded (which may since have been deleted).
    At(u32),
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct LinkedMap {
    table: HashTable<u32>,
    nodes: Vec<MapNode>,
    head: Option<u32>,
    tail: Option<u32>,
    live: usize,
}

impl LinkedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn find_node(&self, key: &Value) -> Option<u32> {
        let hash = same_zero_hash(key);
        self.table
            .find(hash, |&idx| {
                let node = &self.nodes[idx as usize];
                !node.deleted && same_value_zero(&node.key, key)
            })
            .copied()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.find_node(key).map(|idx| &self.nodes[idx as usize].value)
    }

    pub fn has(&self, key: &Value) -> bool {
        self.find_node(key).is_some()
    }

    /// Inserts or updates. An existing key keeps its position in insertion
    /// order; a new key is appended at the tail.
    pub fn set(&mut self, key: Value, value: Value) {
        if let Some(idx) = self.find_node(&key) {
            self.nodes[idx as usize].value = value;
            return;
        }
        let hash = same_zero_hash(&key);
        let idx = self.nodes.len() as u32;
        self.nodes.push(MapNode {
            key,
            value,
            hash,
            prev: self.tail,
            next: None,
            deleted: false,
        });
        if let Some(tail) = self.tail {
            self.nodes[tail as usize].next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
        self.live += 1;
        self.table.insert_unique(hash, idx, |&i| self.nodes[i as usize].hash);
    }

    /// Removes a key. The node becomes a tombstone: unlinked from its
    /// neighbors' view of the list, with `prev` cleared but `next` retained
    /// so parked iterators can continue past it.
    pub fn delete(&mut self, key: &Value) -> bool {
        let Some(idx) = self.find_node(key) else {
            return false;
        };
        let hash = self.nodes[idx as usize].hash;
        if let Ok(entry) = self.table.find_entry(hash, |&i| i == idx) {
            entry.remove();
        }
        let (prev, next) = {
            let node = &self.nodes[idx as usize];
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.nodes[prev as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next as usize].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[idx as usize];
        node.deleted = true;
        node.prev = None;
        node.value = Value::Undefined;
        self.live -= 1;
        true
    }

    /// Empties the map while keeping parked iterators safe: every node is
    /// tombstoned with its forward link severed, so an old iterator's next
    /// step finds nothing live and finishes. Subsequent insertions start a
    /// fresh chain old iterators cannot reach.
    pub fn clear(&mut self) {
        for node in &mut self.nodes {
            node.deleted = true;
            node.prev = None;
            node.next = None;
            node.value = Value::Undefined;
        }
        self.table.clear();
        self.head = None;
        self.tail = None;
        self.live = 0;
    }

    /// Advances a cursor, returning the next live entry in insertion order.
    ///
    /// A cursor parked on a deleted node follows the retained `next` links,
    /// skipping tombstones, which is exactly the tolerant behavior the
    /// collection contract requires.
    pub fn advance(&self, cursor: &mut MapCursor) -> Option<(Value, Value)> {
        let mut candidate = match *cursor {
            MapCursor::Done => return None,
            MapCursor::Start => self.head,
            MapCursor::At(idx) => self.nodes[idx as usize].next,
        };
        while let Some(idx) = candidate {
            let node = &self.nodes[idx as usize];
            if node.deleted {
                candidate = node.next;
            } else {
                *cursor = MapCursor::At(idx);
                return Some((node.key.clone(), node.value.clone()));
            }
        }
        *cursor = MapCursor::Done;
        None
    }

    /// Snapshot of the live entries in insertion order, for `forEach` and
    /// conversion helpers that want a stable view.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.live);
        let mut cursor = MapCursor::Start;
        while let Some(entry) = self.advance(&mut cursor) {
            out.push(entry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut map = LinkedMap::new();
        map.set(key(3.0), key(30.0));
        map.set(key(1.0), key(10.0));
        map.set(key(2.0), key(20.0));
        // Updating an existing key keeps its slot in the order.
        map.set(key(3.0), key(33.0));
        let keys: Vec<f64> = map
            .entries()
            .iter()
            .map(|(k, _)| match k {
                Value::Number(n) => *n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn iterators_tolerate_deletion() {
        let mut map = LinkedMap::new();
        for i in 0..6 {
            map.set(key(f64::from(i)), key(0.0));
        }
        let mut cursor = MapCursor::Start;
        // Yield 0, then delete every second entry including the one the
        // cursor is parked on.
        let first = map.advance(&mut cursor).unwrap();
        assert!(same_value_zero(&first.0, &key(0.0)));
        for i in [0, 2, 4] {
            assert!(map.delete(&key(f64::from(i))));
        }
        let rest: Vec<f64> = std::iter::from_fn(|| map.advance(&mut cursor))
            .map(|(k, _)| match k {
                Value::Number(n) => n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(rest, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn iterators_survive_clear() {
        let mut map = LinkedMap::new();
        map.set(key(1.0), key(10.0));
        map.set(key(2.0), key(20.0));
        let mut cursor = MapCursor::Start;
        map.advance(&mut cursor).unwrap();
        map.clear();
        // Entries added after the clear belong to the fresh chain; the old
        // iterator terminates without observing them.
        map.set(key(9.0), key(90.0));
        assert!(map.advance(&mut cursor).is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn same_value_zero_keys() {
        let mut map = LinkedMap::new();
        map.set(key(f64::NAN), key(1.0));
        assert!(map.has(&key(f64::NAN)));
        map.set(key(0.0), key(2.0));
        assert!(map.has(&key(-0.0)));
        assert_eq!(map.len(), 2);
    }
}
