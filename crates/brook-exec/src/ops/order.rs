//! Order with offset/limit.
//!
//! Strategy per §"order-offset-limit" semantics:
//! - no ordering expressions: order-preserving offset/limit pass;
//! - a limit small enough (`offset + limit <= order_heap_max`): bounded
//!   heap of the best `offset + limit` records;
//! - otherwise: sorted runs spilled to a pooled arena, multi-way merged.
//!
//! Records are framed as canonical key fields, an input sequence number
//! (ties stay in arrival order), then the encoded tuple.

use brook_common::{BrookError, ExecStats, Result};
use brook_plan::{shape, OpNode};
use brook_store::Pooled;
use brook_value::{sortkey, vals, Direction};
use tracing::debug;

use crate::expr::{compile_exprs, ExprFunc};
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let offset = op.param_u64_opt(2)?.unwrap_or(0) as usize;
    let limit = op.param_u64_opt(3)?.map(|l| l as usize);

    let Some(exprs_param) = op.param_opt(0) else {
        return exec_passthrough(child, vars, offset, limit, out);
    };
    let key_exprs = compile_exprs(
        shape::as_array(exprs_param, "ordering expressions")?,
        &child.labels,
        vars.ctx(),
    )?;
    let dirs_param = shape::as_array(op.param(1)?, "ordering directions")?;
    if dirs_param.len() != key_exprs.len() {
        return Err(BrookError::Plan(format!(
            "{} ordering expressions but {} directions",
            key_exprs.len(),
            dirs_param.len()
        )));
    }
    let mut dirs = dirs_param
        .iter()
        .map(|d| Direction::parse(shape::as_str(d, "ordering direction")?))
        .collect::<Result<Vec<_>>>()?;
    // The appended sequence field; compared ascending so ties keep arrival
    // order.
    dirs.push(Direction::Asc);

    let heap_fits = match limit {
        Some(limit) => offset + limit <= vars.ctx().cfg.order_heap_max,
        None => false,
    };
    if heap_fits {
        exec_bounded_heap(child, vars, &key_exprs, &dirs, offset, limit.unwrap_or(0), out)
    } else {
        exec_spill_merge(child, vars, &key_exprs, &dirs, offset, limit, out)
    }
}

fn exec_passthrough(
    child: &OpNode,
    vars: &Vars,
    offset: usize,
    limit: Option<usize>,
    out: &mut Emit<'_>,
) -> Result<()> {
    let mut seen = 0usize;
    let mut emitted = 0usize;
    let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
        if seen < offset {
            seen += 1;
            return Ok(());
        }
        seen += 1;
        if let Some(limit) = limit {
            if emitted >= limit {
                return Ok(());
            }
        }
        emitted += 1;
        (*out)(tuple)
    };
    exec_op(child, vars, &mut on_vals)
}

fn encode_record(
    record: &mut Vec<u8>,
    key_buf: &mut Vec<u8>,
    key_exprs: &[ExprFunc],
    vars: &Vars,
    tuple: &[&[u8]],
    seq: u64,
) -> Result<()> {
    record.clear();
    for expr in key_exprs {
        let key_val = expr(vars, tuple)?;
        key_buf.clear();
        sortkey::encode_val(&key_val, key_buf);
        vals::push_field(record, key_buf);
    }
    vals::push_field(record, &seq.to_be_bytes());
    vals::encode_vals(record, tuple);
    Ok(())
}

fn emit_record(record: &[u8], key_fields: usize, out: &mut Emit<'_>) -> Result<()> {
    let payload = vals::skip_fields(record, key_fields)?;
    let tuple = vals::decode_vals(payload)?;
    (*out)(&tuple)
}

fn report(vars: &Vars, rows_in: u64, rows_out: u64) {
    if let Some(yield_stats) = &vars.ctx().yield_stats {
        yield_stats(&ExecStats {
            phase: "order",
            rows_in,
            rows_out,
            bytes_out: 0,
        });
    }
}

fn exec_bounded_heap(
    child: &OpNode,
    vars: &Vars,
    key_exprs: &[ExprFunc],
    dirs: &[Direction],
    offset: usize,
    limit: usize,
    out: &mut Emit<'_>,
) -> Result<()> {
    let keep = offset + limit;
    if keep == 0 {
        // Nothing can be emitted; still drain the child.
        return exec_op(child, vars, &mut |_| Ok(()));
    }
    let mut heap = Pooled::alloc(&vars.ctx().pools.heap)?;
    let heap_dirs = dirs.to_vec();
    // Inverted order: the heap's least item is the worst kept record, so
    // overflow pops evict it.
    heap.set_order(Box::new(move |a, b| {
        sortkey::compare_records(a, b, &heap_dirs).reverse()
    }));

    let mut seq = 0u64;
    let mut record = Vec::new();
    let mut key_buf = Vec::new();
    let mut evicted = Vec::new();
    {
        let heap = &mut heap;
        let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
            encode_record(&mut record, &mut key_buf, key_exprs, vars, tuple, seq)?;
            seq += 1;
            heap.push(&record)?;
            if heap.len() > keep {
                heap.pop_into(&mut evicted)?;
            }
            Ok(())
        };
        exec_op(child, vars, &mut on_vals)?;
    }

    // Drain worst-first, then replay in requested order past the offset.
    let mut drained: Vec<Vec<u8>> = Vec::with_capacity(heap.len());
    let mut item = Vec::new();
    while heap.pop_into(&mut item)? {
        drained.push(item.clone());
    }
    let mut emitted = 0u64;
    for record in drained.iter().rev().skip(offset) {
        emit_record(record, key_exprs.len() + 1, out)?;
        emitted += 1;
    }
    report(vars, seq, emitted);
    Ok(())
}

fn exec_spill_merge(
    child: &OpNode,
    vars: &Vars,
    key_exprs: &[ExprFunc],
    dirs: &[Direction],
    offset: usize,
    limit: Option<usize>,
    out: &mut Emit<'_>,
) -> Result<()> {
    let budget = vars.ctx().cfg.mem_budget_bytes;
    let mut chunks = Pooled::alloc(&vars.ctx().pools.chunks)?;
    let mut runs: Vec<Vec<(u64, u32)>> = Vec::new();
    let mut buffer: Vec<Vec<u8>> = Vec::new();
    let mut buffered_bytes = 0usize;

    let mut seq = 0u64;
    {
        let chunks = &mut chunks;
        let mut record = Vec::new();
        let mut key_buf = Vec::new();
        let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
            encode_record(&mut record, &mut key_buf, key_exprs, vars, tuple, seq)?;
            seq += 1;
            buffered_bytes += record.len();
            buffer.push(record.clone());
            if buffered_bytes > budget {
                flush_run(&mut buffer, &mut buffered_bytes, &mut **chunks, &mut runs, dirs)?;
            }
            Ok(())
        };
        exec_op(child, vars, &mut on_vals)?;
    }

    let key_fields = key_exprs.len() + 1;
    let limit = limit.unwrap_or(usize::MAX);
    let mut emitted = 0u64;

    if runs.is_empty() {
        buffer.sort_unstable_by(|a, b| sortkey::compare_records(a, b, dirs));
        for record in buffer.iter().skip(offset).take(limit) {
            emit_record(record, key_fields, out)?;
            emitted += 1;
        }
        report(vars, seq, emitted);
        return Ok(());
    }

    if !buffer.is_empty() {
        flush_run(&mut buffer, &mut buffered_bytes, &mut *chunks, &mut runs, dirs)?;
    }
    debug!(runs = runs.len(), rows = seq, "order merging spilled runs");

    // K-way merge: hold one head record per run, emit the least.
    let mut cursors = vec![0usize; runs.len()];
    let mut heads: Vec<Option<Vec<u8>>> = Vec::with_capacity(runs.len());
    let mut read_buf = Vec::new();
    for (run_idx, run) in runs.iter().enumerate() {
        heads.push(load_record(&mut *chunks, run, cursors[run_idx], &mut read_buf)?);
    }
    let mut skipped = 0usize;
    loop {
        let mut least: Option<usize> = None;
        for (idx, head) in heads.iter().enumerate() {
            let Some(candidate) = head else { continue };
            let better = match least {
                None => true,
                Some(cur) => {
                    let current = heads[cur].as_deref().unwrap_or(&[]);
                    sortkey::compare_records(candidate, current, dirs).is_lt()
                }
            };
            if better {
                least = Some(idx);
            }
        }
        let Some(run_idx) = least else { break };
        if skipped < offset {
            skipped += 1;
        } else {
            if emitted as usize >= limit {
                break;
            }
            if let Some(record) = &heads[run_idx] {
                emit_record(record, key_fields, out)?;
            }
            emitted += 1;
        }
        cursors[run_idx] += 1;
        heads[run_idx] = load_record(&mut *chunks, &runs[run_idx], cursors[run_idx], &mut read_buf)?;
    }
    report(vars, seq, emitted);
    Ok(())
}

fn flush_run(
    buffer: &mut Vec<Vec<u8>>,
    buffered_bytes: &mut usize,
    chunks: &mut brook_store::Chunks,
    runs: &mut Vec<Vec<(u64, u32)>>,
    dirs: &[Direction],
) -> Result<()> {
    // The sequence field makes record comparison total, so an unstable sort
    // cannot reorder equal keys.
    buffer.sort_unstable_by(|a, b| sortkey::compare_records(a, b, dirs));
    let mut run = Vec::with_capacity(buffer.len());
    for record in buffer.drain(..) {
        let offset = chunks.append(&record)?;
        run.push((offset, record.len() as u32));
    }
    debug!(rows = run.len(), "order run flushed");
    runs.push(run);
    *buffered_bytes = 0;
    Ok(())
}

fn load_record(
    chunks: &mut brook_store::Chunks,
    run: &[(u64, u32)],
    cursor: usize,
    read_buf: &mut Vec<u8>,
) -> Result<Option<Vec<u8>>> {
    match run.get(cursor) {
        Some(&(offset, len)) => {
            chunks.read_into(offset, len as usize, read_buf)?;
            Ok(Some(read_buf.clone()))
        }
        None => Ok(None),
    }
}
