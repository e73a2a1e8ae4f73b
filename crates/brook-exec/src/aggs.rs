//! Aggregators: per-group state as opaque byte blobs.
//!
//! A hash-map slot's bytes hold the concatenated state of every aggregator
//! in plan order. `update` and `result` thread through that buffer: each
//! returns how many bytes of the old state it consumed, and the group
//! operator hands the remainder to the next aggregator. This keeps
//! multi-aggregator groups to a single map value with no per-group
//! allocation beyond the slot itself.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use brook_common::{BrookError, Result};
use brook_value::{kind, ValComparer};

/// The init/update/result contract one named aggregator implements.
pub trait Aggregator: Send + Sync {
    /// Extend `agg` with this aggregator's initial state bytes.
    fn init(&self, agg: &mut Vec<u8>);

    /// Consume one input value: read this aggregator's state from the front
    /// of `old_agg`, append the updated state to `new_agg`, and return how
    /// many bytes of `old_agg` were read.
    fn update(
        &self,
        val: &[u8],
        new_agg: &mut Vec<u8>,
        old_agg: &[u8],
        comparer: &mut ValComparer,
    ) -> Result<usize>;

    /// Append the final value to `out` and return how many state bytes were
    /// read.
    fn result(&self, agg: &[u8], out: &mut Vec<u8>) -> Result<usize>;
}

/// The built-in catalog: `count`, `sum`, `min`, `max`, `avg`.
pub fn builtin_catalog() -> HashMap<String, Arc<dyn Aggregator>> {
    let mut catalog: HashMap<String, Arc<dyn Aggregator>> = HashMap::new();
    catalog.insert("count".to_string(), Arc::new(AggCount));
    catalog.insert("sum".to_string(), Arc::new(AggSum));
    catalog.insert(
        "min".to_string(),
        Arc::new(AggExtreme {
            keep: Ordering::Less,
        }),
    );
    catalog.insert(
        "max".to_string(),
        Arc::new(AggExtreme {
            keep: Ordering::Greater,
        }),
    );
    catalog.insert("avg".to_string(), Arc::new(AggAvg));
    catalog
}

fn read_u64(agg: &[u8], what: &str) -> Result<u64> {
    if agg.len() < 8 {
        return Err(BrookError::Execution(format!("truncated {what} state")));
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(&agg[..8]);
    Ok(u64::from_le_bytes(word))
}

fn fmt_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(format!("{v}").as_bytes());
}

/// `count`: an 8-byte little-endian counter of inputs that carry a value.
struct AggCount;

impl Aggregator for AggCount {
    fn init(&self, agg: &mut Vec<u8>) {
        agg.extend_from_slice(&0u64.to_le_bytes());
    }

    fn update(
        &self,
        val: &[u8],
        new_agg: &mut Vec<u8>,
        old_agg: &[u8],
        _comparer: &mut ValComparer,
    ) -> Result<usize> {
        let mut count = read_u64(old_agg, "count")?;
        if kind::has_value(val) {
            count += 1;
        }
        new_agg.extend_from_slice(&count.to_le_bytes());
        Ok(8)
    }

    fn result(&self, agg: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let count = read_u64(agg, "count")?;
        out.extend_from_slice(format!("{count}").as_bytes());
        Ok(8)
    }
}

/// `sum`: an 8-byte IEEE-754 double; non-numeric inputs are ignored.
struct AggSum;

impl Aggregator for AggSum {
    fn init(&self, agg: &mut Vec<u8>) {
        agg.extend_from_slice(&0f64.to_bits().to_le_bytes());
    }

    fn update(
        &self,
        val: &[u8],
        new_agg: &mut Vec<u8>,
        old_agg: &[u8],
        _comparer: &mut ValComparer,
    ) -> Result<usize> {
        let mut sum = f64::from_bits(read_u64(old_agg, "sum")?);
        if let Some(x) = kind::parse_f64(val) {
            sum += x;
        }
        new_agg.extend_from_slice(&sum.to_bits().to_le_bytes());
        Ok(8)
    }

    fn result(&self, agg: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let sum = f64::from_bits(read_u64(agg, "sum")?);
        fmt_f64(out, sum);
        Ok(8)
    }
}

/// `min`/`max`: an 8-byte length prefix plus the stored value bytes. Every
/// input participates through the comparator's total order, so MISSING and
/// NULL inputs rank along the ladder like any other value. The length word
/// holds [`EXTREME_UNSET`] until the first input, which keeps a stored
/// MISSING (length zero) distinct from no-input-yet.
struct AggExtreme {
    keep: Ordering,
}

const EXTREME_UNSET: u64 = u64::MAX;

impl Aggregator for AggExtreme {
    fn init(&self, agg: &mut Vec<u8>) {
        agg.extend_from_slice(&EXTREME_UNSET.to_le_bytes());
    }

    fn update(
        &self,
        val: &[u8],
        new_agg: &mut Vec<u8>,
        old_agg: &[u8],
        comparer: &mut ValComparer,
    ) -> Result<usize> {
        let word = read_u64(old_agg, "min/max")?;
        if word == EXTREME_UNSET {
            new_agg.extend_from_slice(&(val.len() as u64).to_le_bytes());
            new_agg.extend_from_slice(val);
            return Ok(8);
        }
        let stored_len = word as usize;
        if old_agg.len() < 8 + stored_len {
            return Err(BrookError::Execution("truncated min/max state".to_string()));
        }
        let stored = &old_agg[8..8 + stored_len];
        if comparer.compare(val, stored) == self.keep {
            new_agg.extend_from_slice(&(val.len() as u64).to_le_bytes());
            new_agg.extend_from_slice(val);
        } else {
            new_agg.extend_from_slice(&old_agg[..8 + stored_len]);
        }
        Ok(8 + stored_len)
    }

    fn result(&self, agg: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let word = read_u64(agg, "min/max")?;
        if word == EXTREME_UNSET {
            return Ok(8);
        }
        let stored_len = word as usize;
        if agg.len() < 8 + stored_len {
            return Err(BrookError::Execution("truncated min/max state".to_string()));
        }
        out.extend_from_slice(&agg[8..8 + stored_len]);
        Ok(8 + stored_len)
    }
}

/// `avg`: running sum plus count, finalized as `sum / count`; an empty group
/// finalizes to `null`.
struct AggAvg;

impl Aggregator for AggAvg {
    fn init(&self, agg: &mut Vec<u8>) {
        agg.extend_from_slice(&0f64.to_bits().to_le_bytes());
        agg.extend_from_slice(&0u64.to_le_bytes());
    }

    fn update(
        &self,
        val: &[u8],
        new_agg: &mut Vec<u8>,
        old_agg: &[u8],
        _comparer: &mut ValComparer,
    ) -> Result<usize> {
        let mut sum = f64::from_bits(read_u64(old_agg, "avg")?);
        let mut count = read_u64(&old_agg[8..], "avg")?;
        if let Some(x) = kind::parse_f64(val) {
            sum += x;
            count += 1;
        }
        new_agg.extend_from_slice(&sum.to_bits().to_le_bytes());
        new_agg.extend_from_slice(&count.to_le_bytes());
        Ok(16)
    }

    fn result(&self, agg: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let sum = f64::from_bits(read_u64(agg, "avg")?);
        let count = read_u64(&agg[8..], "avg")?;
        if count == 0 {
            out.extend_from_slice(b"null");
        } else {
            fmt_f64(out, sum / count as f64);
        }
        Ok(16)
    }
}
