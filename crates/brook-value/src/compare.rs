//! Total-order comparison of JSON value bytes.

use std::cmp::Ordering;

use crate::sortkey;

/// Compares any two value byte slices under the engine's total order.
///
/// The comparator encodes both sides into reusable scratch buffers and
/// compares the encodings bytewise, so its order agrees with the canonical
/// sort-key order by construction and repeated comparisons stop allocating
/// once the buffers are warm.
///
/// Not shareable across logical threads; use [`ValComparer::fresh`] to give
/// a branch its own instance.
#[derive(Debug, Default)]
pub struct ValComparer {
    key_a: Vec<u8>,
    key_b: Vec<u8>,
}

impl ValComparer {
    /// A ready-to-use comparator.
    pub fn new() -> Self {
        Self::default()
    }

    /// An independent comparator for another logical thread of control.
    pub fn fresh(&self) -> Self {
        Self::new()
    }

    /// Compare two values. Parse failures order least and compare equal to
    /// each other and to MISSING.
    pub fn compare(&mut self, a: &[u8], b: &[u8]) -> Ordering {
        self.key_a.clear();
        self.key_b.clear();
        sortkey::encode_val(a, &mut self.key_a);
        sortkey::encode_val(b, &mut self.key_b);
        self.key_a.cmp(&self.key_b)
    }
}
