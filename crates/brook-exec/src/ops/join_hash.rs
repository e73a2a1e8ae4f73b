//! Hash join and the map-backed set operators.
//!
//! The build phase drains the right child into a pooled map keyed by the
//! encoded key expression; the probe phase streams the left child against
//! it. Left-outer emission happens inline at probe time, and matched build
//! entries are flagged. Set operators reuse the same map with one signed
//! counter per input, keyed by the full-tuple encoding.

use brook_common::{BrookError, Result};
use brook_plan::OpNode;
use brook_store::Pooled;
use brook_value::vals;
use tracing::debug;

use crate::expr::compile_expr;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec_join(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let (child_a, child_b) = op.child_pair()?;
    let left_outer = op.kind.ends_with("leftOuter");
    let probe_key = compile_expr(op.param(0)?, &child_a.labels, vars.ctx())?;
    let build_key = compile_expr(op.param(1)?, &child_b.labels, vars.ctx())?;
    let b_arity = child_b.labels.len();

    let mut map = Pooled::alloc(&vars.ctx().pools.map)?;

    // Build.
    {
        let map = &mut map;
        let mut key = Vec::new();
        let mut row = Vec::new();
        let mut on_b = |b_vals: &[&[u8]]| -> Result<()> {
            let key_val = build_key(vars, b_vals)?;
            if key_val.is_empty() {
                // MISSING keys never participate in matches.
                return Ok(());
            }
            key.clear();
            vals::push_field(&mut key, &key_val);
            row.clear();
            vals::encode_vals(&mut row, b_vals);
            map.push(&key, &row)
        };
        exec_op(child_b, vars, &mut on_b)?;
    }
    debug!(kind = %op.kind, keys = map.len(), "hash join build complete");

    // Probe.
    let mut key = Vec::new();
    let mut matches: Vec<Vec<u8>> = Vec::new();
    let mut on_a = |a_vals: &[&[u8]]| -> Result<()> {
        let key_val = probe_key(vars, a_vals)?;
        let mut hit = false;
        if !key_val.is_empty() {
            key.clear();
            vals::push_field(&mut key, &key_val);
            if let Some(entry) = map.lookup(&key) {
                if entry.list_len > 0 {
                    map.read_list(&entry, &mut matches)?;
                    map.set_matched(&key);
                    hit = true;
                    for b_row in &matches {
                        let b_vals = vals::decode_vals(b_row)?;
                        let mut joined: Vec<&[u8]> =
                            Vec::with_capacity(a_vals.len() + b_vals.len());
                        joined.extend_from_slice(a_vals);
                        joined.extend_from_slice(&b_vals);
                        (*out)(&joined)?;
                    }
                }
            }
        }
        if left_outer && !hit {
            let mut joined: Vec<&[u8]> = Vec::with_capacity(a_vals.len() + b_arity);
            joined.extend_from_slice(a_vals);
            joined.resize(a_vals.len() + b_arity, b"");
            (*out)(&joined)?;
        }
        Ok(())
    };
    exec_op(child_a, vars, &mut on_a)
}

pub(crate) fn exec_set_op(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let (child_l, child_r) = op.child_pair()?;
    let mut map = Pooled::alloc(&vars.ctx().pools.map)?;

    for (side, child) in [(0usize, child_l), (1usize, child_r)] {
        let map = &mut map;
        let mut key = Vec::new();
        let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
            key.clear();
            vals::encode_vals(&mut key, tuple);
            map.add_count(&key, side, 1);
            Ok(())
        };
        exec_op(child, vars, &mut on_vals)?;
    }

    let kind = op.kind.as_str();
    map.for_each_entry(|key, entry, _| {
        let [left, right] = entry.counts;
        let times = match kind {
            "intersect-distinct" => i64::from(left >= 1 && right >= 1),
            "intersect-all" => left.min(right).max(0),
            "except-distinct" => i64::from(left >= 1 && right == 0),
            "except-all" => (left - right).max(0),
            other => {
                return Err(BrookError::Plan(format!(
                    "unknown set operator kind: {other:?}"
                )))
            }
        };
        if times == 0 {
            return Ok(());
        }
        let tuple = vals::decode_vals(key)?;
        for _ in 0..times {
            (*out)(&tuple)?;
        }
        Ok(())
    })
}
