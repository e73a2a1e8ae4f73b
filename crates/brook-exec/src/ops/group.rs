//! Hash aggregation and distinct.
//!
//! A pooled map slots canonical-encoded grouping keys to the concatenated
//! state of every aggregator; distinct is group-by with no aggregates.
//! Emission order is map iteration order (unspecified); plans wanting
//! ordered output put an order operator above.

use std::sync::Arc;

use brook_common::{BrookError, ExecStats, Result};
use brook_plan::{shape, OpNode};
use brook_store::{Pooled, SpillMap};
use brook_value::vals;
use tracing::debug;

use crate::aggs::Aggregator;
use crate::expr::compile_exprs;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let group_exprs = compile_exprs(
        shape::as_array(op.param(0)?, "grouping expressions")?,
        &child.labels,
        vars.ctx(),
    )?;

    let (agg_exprs, aggs) = if op.kind == "group" {
        let agg_exprs = compile_exprs(
            shape::as_array(op.param(1)?, "aggregate input expressions")?,
            &child.labels,
            vars.ctx(),
        )?;
        let names = shape::as_array(op.param(2)?, "aggregator names")?;
        if names.len() != agg_exprs.len() {
            return Err(BrookError::Plan(format!(
                "{} aggregate inputs but {} aggregators",
                agg_exprs.len(),
                names.len()
            )));
        }
        let aggs = names
            .iter()
            .map(|name| {
                let name = shape::as_str(
                    shape::as_array(name, "aggregator entry")?
                        .first()
                        .ok_or_else(|| BrookError::Plan("empty aggregator entry".to_string()))?,
                    "aggregator name",
                )?;
                vars.ctx().agg_catalog.get(name).cloned().ok_or_else(|| {
                    BrookError::Plan(format!("unknown aggregator: {name:?}"))
                })
            })
            .collect::<Result<Vec<Arc<dyn Aggregator>>>>()?;
        (agg_exprs, aggs)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut map = Pooled::alloc(&vars.ctx().pools.map)?;
    let mut rows_in = 0u64;
    {
        let map = &mut map;
        let mut key = Vec::new();
        let mut old_state = Vec::new();
        let mut new_state = Vec::new();
        let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
            rows_in += 1;
            key.clear();
            for expr in &group_exprs {
                let v = expr(vars, tuple)?;
                vals::push_field(&mut key, &v);
            }
            if aggs.is_empty() {
                // Distinct: presence is the whole state.
                map.add_count(&key, 0, 1);
                return Ok(());
            }
            // Evaluate every aggregate input before touching the comparator;
            // input expressions may borrow it themselves.
            let inputs = agg_exprs
                .iter()
                .map(|expr| expr(vars, tuple))
                .collect::<Result<Vec<_>>>()?;
            if !map.get_into(&key, &mut old_state)? {
                old_state.clear();
                for agg in &aggs {
                    agg.init(&mut old_state);
                }
            }
            new_state.clear();
            let mut comparer = vars.ctx().comparer.borrow_mut();
            let mut rest: &[u8] = &old_state;
            for (agg, input) in aggs.iter().zip(&inputs) {
                let used = agg.update(input, &mut new_state, rest, &mut comparer)?;
                rest = &rest[used..];
            }
            drop(comparer);
            map.put(&key, &new_state)
        };
        exec_op(child, vars, &mut on_vals)?;
    }

    debug!(kind = %op.kind, groups = map.len(), rows = rows_in, "aggregation input drained");

    // An aggregate-only group over empty input still emits one row of
    // aggregate identities.
    if group_exprs.is_empty() && !aggs.is_empty() && map.is_empty() {
        let mut state = Vec::new();
        for agg in &aggs {
            agg.init(&mut state);
        }
        emit_group(&[], &state, &aggs, out)?;
        report(vars, rows_in, 1);
        return Ok(());
    }

    let mut rows_out = 0u64;
    let mut state_list: Vec<Vec<u8>> = Vec::new();
    map.for_each_entry(|key, entry, chunk_vals| {
        let state: &[u8] = if aggs.is_empty() {
            &[]
        } else {
            SpillMap::read_list_from(chunk_vals, entry, &mut state_list)?;
            state_list.first().map(Vec::as_slice).unwrap_or(&[])
        };
        emit_group(key, state, &aggs, out)?;
        rows_out += 1;
        Ok(())
    })?;
    report(vars, rows_in, rows_out);
    Ok(())
}

fn emit_group(
    key: &[u8],
    state: &[u8],
    aggs: &[Arc<dyn Aggregator>],
    out: &mut Emit<'_>,
) -> Result<()> {
    let mut fields: Vec<Vec<u8>> = vals::decode_vals(key)?
        .iter()
        .map(|v| v.to_vec())
        .collect();
    let mut rest = state;
    for agg in aggs {
        let mut result = Vec::new();
        let used = agg.result(rest, &mut result)?;
        rest = &rest[used..];
        fields.push(result);
    }
    let refs: Vec<&[u8]> = fields.iter().map(Vec::as_slice).collect();
    (*out)(&refs)
}

fn report(vars: &Vars, rows_in: u64, rows_out: u64) {
    if let Some(yield_stats) = &vars.ctx().yield_stats {
        yield_stats(&ExecStats {
            phase: "group",
            rows_in,
            rows_out,
            bytes_out: 0,
        });
    }
}
