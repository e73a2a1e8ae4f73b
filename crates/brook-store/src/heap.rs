//! Byte-item binary heap under a caller-supplied ordering.

use std::cmp::Ordering;

use brook_common::{BrookError, Result};

use crate::chunks::Chunks;

/// Caller-supplied ordering over encoded items.
pub type LessFn = Box<dyn Fn(&[u8], &[u8]) -> Ordering + Send>;

/// Min-heap of byte items. Item bytes live in an internal [`Chunks`] arena
/// and spill with it; only the offset table and two compare scratch buffers
/// stay resident. `pop_into` yields items least-first under the supplied
/// ordering.
pub struct SpillHeap {
    items: Chunks,
    slots: Vec<(u64, u32)>,
    less: Option<LessFn>,
    scratch_a: Vec<u8>,
    scratch_b: Vec<u8>,
}

impl std::fmt::Debug for SpillHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillHeap")
            .field("len", &self.slots.len())
            .field("bytes", &self.items.len())
            .finish()
    }
}

impl SpillHeap {
    /// A new heap storing items in the given arena. An ordering must be
    /// supplied through [`SpillHeap::set_order`] before the first push.
    pub fn new(items: Chunks) -> Self {
        Self {
            items,
            slots: Vec::new(),
            less: None,
            scratch_a: Vec::new(),
            scratch_b: Vec::new(),
        }
    }

    /// Install the ordering used by subsequent pushes and pops.
    pub fn set_order(&mut self, less: LessFn) {
        self.less = Some(less);
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the heap holds no items.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Push one encoded item.
    pub fn push(&mut self, item: &[u8]) -> Result<()> {
        if self.less.is_none() {
            return Err(BrookError::Execution(
                "heap ordering not configured".to_string(),
            ));
        }
        let offset = self.items.append(item)?;
        self.slots.push((offset, item.len() as u32));
        self.sift_up(self.slots.len() - 1)
    }

    /// Read the least item into `out` without removing it; false when empty.
    pub fn peek_into(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        if self.slots.is_empty() {
            return Ok(false);
        }
        let (offset, len) = self.slots[0];
        self.items.read_into(offset, len as usize, out)?;
        Ok(true)
    }

    /// Pop the least item into `out`; false when empty.
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        if !self.peek_into(out)? {
            return Ok(false);
        }
        let last = self.slots.len() - 1;
        self.slots.swap(0, last);
        self.slots.pop();
        if !self.slots.is_empty() {
            self.sift_down(0)?;
        }
        Ok(true)
    }

    /// Drop every item and truncate the arena for reuse. The ordering is
    /// cleared; the next user installs its own.
    pub fn reset(&mut self) -> Result<()> {
        self.slots.clear();
        self.less = None;
        self.items.reset()
    }

    fn compare_slots(&mut self, i: usize, j: usize) -> Result<Ordering> {
        let (off_i, len_i) = self.slots[i];
        let (off_j, len_j) = self.slots[j];
        self.items
            .read_into(off_i, len_i as usize, &mut self.scratch_a)?;
        self.items
            .read_into(off_j, len_j as usize, &mut self.scratch_b)?;
        match &self.less {
            Some(less) => Ok(less(&self.scratch_a, &self.scratch_b)),
            None => Err(BrookError::Execution(
                "heap ordering not configured".to_string(),
            )),
        }
    }

    fn sift_up(&mut self, mut i: usize) -> Result<()> {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.compare_slots(i, parent)? == Ordering::Less {
                self.slots.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn sift_down(&mut self, mut i: usize) -> Result<()> {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut least = i;
            if left < self.slots.len() && self.compare_slots(left, least)? == Ordering::Less {
                least = left;
            }
            if right < self.slots.len() && self.compare_slots(right, least)? == Ordering::Less {
                least = right;
            }
            if least == i {
                return Ok(());
            }
            self.slots.swap(i, least);
            i = least;
        }
    }
}
