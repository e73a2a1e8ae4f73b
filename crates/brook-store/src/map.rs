//! Byte-keyed map with spill-capable value storage.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use brook_common::{BrookError, Result};

use crate::chunks::Chunks;

const NO_NODE: u64 = u64::MAX;

/// Per-key bookkeeping. The value list lives in the map's internal arena as
/// a chain of nodes; the entry itself stays resident and small.
#[derive(Debug, Clone, Copy)]
pub struct MapEntry {
    head: u64,
    /// Number of values in the entry's list.
    pub list_len: u32,
    /// Caller-defined signed counters (set operators use one per input).
    pub counts: [i64; 2],
    /// Outer-join bookkeeping: set when a probe matched this entry.
    pub matched: bool,
}

impl MapEntry {
    fn new() -> Self {
        Self {
            head: NO_NODE,
            list_len: 0,
            counts: [0, 0],
            matched: false,
        }
    }
}

/// Map from byte keys to byte-value lists plus counters.
///
/// Keys stay resident in a hash index; values are appended into an internal
/// [`Chunks`] arena and therefore spill with it. Replaced values are
/// orphaned in the arena until `reset`.
#[derive(Debug)]
pub struct SpillMap {
    index: HashMap<Vec<u8>, MapEntry>,
    vals: Chunks,
    key_bytes: usize,
}

impl SpillMap {
    /// A new map whose value arena spills like the given [`Chunks`].
    pub fn new(vals: Chunks) -> Self {
        Self {
            index: HashMap::new(),
            vals,
            key_bytes: 0,
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Resident bytes held by keys plus the arena tail.
    pub fn bytes_in_memory(&self) -> usize {
        self.key_bytes + self.vals.bytes_in_memory()
    }

    /// Replace the key's value with `val` (single-value semantics).
    pub fn put(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        let node = Self::append_node(&mut self.vals, NO_NODE, val)?;
        let entry = self.entry_mut(key);
        entry.head = node;
        entry.list_len = 1;
        Ok(())
    }

    /// Append `val` to the key's value list.
    pub fn push(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        let prev = self.index.get(key).map(|e| e.head).unwrap_or(NO_NODE);
        let node = Self::append_node(&mut self.vals, prev, val)?;
        let entry = self.entry_mut(key);
        entry.head = node;
        entry.list_len += 1;
        Ok(())
    }

    /// Add to one of the key's counters, creating the entry if needed.
    pub fn add_count(&mut self, key: &[u8], side: usize, delta: i64) {
        self.entry_mut(key).counts[side] += delta;
    }

    /// Mark the key's entry as matched; false when the key is absent.
    pub fn set_matched(&mut self, key: &[u8]) -> bool {
        match self.index.get_mut(key) {
            Some(entry) => {
                entry.matched = true;
                true
            }
            None => false,
        }
    }

    /// A copy of the key's bookkeeping, if present.
    pub fn lookup(&self, key: &[u8]) -> Option<MapEntry> {
        self.index.get(key).copied()
    }

    /// Read the key's single value into `out`; false when absent.
    pub fn get_into(&mut self, key: &[u8], out: &mut Vec<u8>) -> Result<bool> {
        let Some(entry) = self.index.get(key).copied() else {
            return Ok(false);
        };
        if entry.head == NO_NODE {
            out.clear();
            return Ok(true);
        }
        Self::read_node(&mut self.vals, entry.head, out)?;
        Ok(true)
    }

    /// Read the entry's whole value list, oldest first.
    pub fn read_list(&mut self, entry: &MapEntry, out: &mut Vec<Vec<u8>>) -> Result<()> {
        Self::read_list_from(&mut self.vals, entry, out)
    }

    /// Visit every entry in unspecified order. The callback receives the
    /// key, its bookkeeping, and the value arena for list reads.
    pub fn for_each_entry(
        &mut self,
        mut f: impl FnMut(&[u8], &MapEntry, &mut Chunks) -> Result<()>,
    ) -> Result<()> {
        for (key, entry) in self.index.iter() {
            f(key, entry, &mut self.vals)?;
        }
        Ok(())
    }

    /// Read one entry's value list directly from the arena (for use inside
    /// [`SpillMap::for_each_entry`]).
    pub fn read_list_from(vals: &mut Chunks, entry: &MapEntry, out: &mut Vec<Vec<u8>>) -> Result<()> {
        out.clear();
        let mut node = entry.head;
        let mut scratch = Vec::new();
        while node != NO_NODE {
            node = Self::read_node(vals, node, &mut scratch)?;
            out.push(scratch.clone());
        }
        out.reverse();
        Ok(())
    }

    /// Drop every key and truncate the value arena for reuse.
    pub fn reset(&mut self) -> Result<()> {
        self.index.clear();
        self.key_bytes = 0;
        self.vals.reset()
    }

    fn entry_mut(&mut self, key: &[u8]) -> &mut MapEntry {
        match self.index.entry(key.to_vec()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                self.key_bytes += key.len();
                vacant.insert(MapEntry::new())
            }
        }
    }

    fn append_node(vals: &mut Chunks, prev: u64, bytes: &[u8]) -> Result<u64> {
        let mut node = Vec::with_capacity(12 + bytes.len());
        node.extend_from_slice(&prev.to_le_bytes());
        node.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        node.extend_from_slice(bytes);
        vals.append(&node)
    }

    // Reads the node's payload into `scratch` and returns the previous
    // node's offset (NO_NODE at the end of the chain).
    fn read_node(vals: &mut Chunks, node: u64, scratch: &mut Vec<u8>) -> Result<u64> {
        vals.read_into(node, 12, scratch)?;
        if scratch.len() != 12 {
            return Err(BrookError::Execution("corrupt map value node".to_string()));
        }
        let mut prev8 = [0u8; 8];
        prev8.copy_from_slice(&scratch[..8]);
        let mut len4 = [0u8; 4];
        len4.copy_from_slice(&scratch[8..12]);
        let prev = u64::from_le_bytes(prev8);
        let len = u32::from_le_bytes(len4) as usize;
        vals.read_into(node + 12, len, scratch)?;
        Ok(prev)
    }
}
