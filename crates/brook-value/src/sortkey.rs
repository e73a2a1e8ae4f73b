//! Canonical sort-key encoding: bytewise order over encodings equals the
//! comparator's order over the source values.
//!
//! Layout per value: a ladder tag byte, then a type-specific body.
//! - numbers: sign-transformed IEEE-754 bits, big-endian
//! - strings: `0x00`-escaped bytes with a `0x00 0x00` terminator
//! - arrays: concatenated element encodings with a `0x00` terminator
//! - objects: big-endian pair count, then sorted `(inverted key, value)`
//!   pairs with a `0x00` terminator; inverting key bytes makes the side
//!   holding the smaller unmatched key order greater, matching the
//!   comparator's tie-break
//!
//! MISSING and unparseable bytes share the least tag and compare equal to
//! each other.

use std::cmp::Ordering;

use brook_common::{BrookError, Result};
use serde_json::Value;

use crate::vals::read_field;

const TAG_LEAST: u8 = 0x00; // MISSING or unparseable
const TAG_NULL: u8 = 0x01;
const TAG_BOOL: u8 = 0x02;
const TAG_NUMBER: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_OBJECT: u8 = 0x06;

const TERM: u8 = 0x00;

/// Requested ordering direction for one key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending (the natural encoded order).
    Asc,
    /// Descending (the encoded comparison is flipped).
    Desc,
}

impl Direction {
    /// Parse `"asc"` / `"desc"`.
    pub fn parse(s: &str) -> Result<Direction> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(BrookError::Plan(format!(
                "unknown ordering direction: {other:?}"
            ))),
        }
    }
}

/// Encode raw value bytes into `out`. Empty or unparseable bytes take the
/// least tag.
pub fn encode_val(val: &[u8], out: &mut Vec<u8>) {
    if val.is_empty() {
        out.push(TAG_LEAST);
        return;
    }
    match serde_json::from_slice::<Value>(val) {
        Ok(v) => encode_value(&v, out),
        Err(_) => out.push(TAG_LEAST),
    }
}

/// Encode a parsed value into `out`.
pub fn encode_value(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Value::Number(n) => {
            out.push(TAG_NUMBER);
            push_f64(out, n.as_f64().unwrap_or(0.0));
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            push_terminated_str(out, s.as_bytes());
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            for item in items {
                encode_value(item, out);
            }
            out.push(TERM);
        }
        Value::Object(map) => {
            out.push(TAG_OBJECT);
            // Size decides first; serde_json's map iterates keys in sorted
            // order, which the pair walk below depends on.
            out.extend_from_slice(&(map.len() as u64).to_be_bytes());
            for (key, val) in map {
                push_inverted_str(out, key.as_bytes());
                encode_value(val, out);
            }
            out.push(TERM);
        }
    }
}

/// Compare two field-framed key records under per-field directions.
///
/// Records are sequences of length-prefixed fields (see [`crate::vals`]);
/// bodies are compared bytewise, flipped for descending fields. Truncated
/// records compare as if padded with empty fields.
pub fn compare_records(mut a: &[u8], mut b: &[u8], dirs: &[Direction]) -> Ordering {
    for dir in dirs {
        let (fa, ra) = read_field(a).unwrap_or((&[], &[]));
        let (fb, rb) = read_field(b).unwrap_or((&[], &[]));
        let ord = match dir {
            Direction::Asc => fa.cmp(fb),
            Direction::Desc => fb.cmp(fa),
        };
        if ord != Ordering::Equal {
            return ord;
        }
        a = ra;
        b = rb;
    }
    Ordering::Equal
}

fn push_f64(out: &mut Vec<u8>, f: f64) {
    let f = if f == 0.0 { 0.0 } else { f }; // collapse -0.0
    let bits = f.to_bits();
    let key = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    };
    out.extend_from_slice(&key.to_be_bytes());
}

fn push_terminated_str(out: &mut Vec<u8>, s: &[u8]) {
    for &b in s {
        if b == 0x00 {
            out.push(0x00);
            out.push(0xFF);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

fn push_inverted_str(out: &mut Vec<u8>, s: &[u8]) {
    let mark = out.len();
    push_terminated_str(out, s);
    for b in &mut out[mark..] {
        *b = !*b;
    }
}
