//! Window operators: partition detection and frame materialization.
//!
//! `window-partition` consumes a sorted stream, buffers each partition into
//! its temp slot (tracking row number / rank / dense rank per row), and
//! replays the partition downstream once its boundary is seen, so
//! following-row frames are computable. `window-frames` decorates the
//! replay: for each row it computes every configured frame's extent and
//! exclusion into its own slot, which the frame-derived projection
//! expressions read.

use brook_common::{BrookError, Result};
use brook_plan::{shape, OpNode};
use brook_store::Pooled;
use brook_value::vals;
use serde_json::Value;

use crate::expr::compile_exprs;
use crate::ops::exec_op;
use crate::vars::{as_partition, Emit, SlotGuard, TempSlot, Vars};
use crate::window_state::{Exclude, FrameState, Tracking, WindowFrames, WindowPartition};

pub(crate) fn exec_partition(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let slot = op.param_u64(0)? as usize;
    let key_exprs = compile_exprs(
        shape::as_array(op.param(1)?, "partitioning expressions")?,
        &child.labels,
        vars.ctx(),
    )?;
    let partition_arity = op.param_u64(2)? as usize;
    if partition_arity > key_exprs.len() {
        return Err(BrookError::Plan(format!(
            "partition arity {partition_arity} exceeds {} expressions",
            key_exprs.len()
        )));
    }
    let tracking = Tracking::parse(op.param_str(3)?)?;

    let chunks = Pooled::alloc(&vars.ctx().pools.chunks)?.take();
    vars.set_slot(
        slot,
        TempSlot::Partition(WindowPartition::new(chunks, tracking)),
    );
    let _guard = SlotGuard::new(vars, slot);

    let mut part_key = Vec::new();
    let mut full_key = Vec::new();
    let mut row_enc = Vec::new();
    let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
        part_key.clear();
        full_key.clear();
        for (i, expr) in key_exprs.iter().enumerate() {
            let v = expr(vars, tuple)?;
            if i < partition_arity {
                vals::push_field(&mut part_key, &v);
            }
            vals::push_field(&mut full_key, &v);
        }
        let boundary = vars.with_slot_mut(slot, |state| {
            Ok(as_partition(state, slot)?.is_boundary(&part_key))
        })?;
        if boundary {
            replay(vars, slot, out)?;
        }
        vars.with_slot_mut(slot, |state| {
            let partition = as_partition(state, slot)?;
            if boundary || partition.is_empty() {
                partition.start_partition(&part_key)?;
            }
            let (rank, dense_rank) = partition.next_counters(&full_key);
            row_enc.clear();
            vals::encode_vals(&mut row_enc, tuple);
            match partition.tracking {
                Tracking::None => {}
                Tracking::RowNumber => {
                    vals::push_field(&mut row_enc, &(partition.len() as u64 + 1).to_le_bytes())
                }
                Tracking::Rank => vals::push_field(&mut row_enc, &rank.to_le_bytes()),
                Tracking::DenseRank => vals::push_field(&mut row_enc, &dense_rank.to_le_bytes()),
            }
            partition.push_row(&full_key, &row_enc, rank, dense_rank)
        })
    };
    exec_op(child, vars, &mut on_vals)?;
    replay(vars, slot, out)
}

// Replay the buffered partition downstream, row by row, with `cur` set so
// frame computation and projections see the row being emitted.
fn replay(vars: &Vars, slot: usize, out: &mut Emit<'_>) -> Result<()> {
    let count = vars.with_slot_mut(slot, |state| Ok(as_partition(state, slot)?.len()))?;
    let mut row_bytes = Vec::new();
    for i in 0..count {
        vars.with_slot_mut(slot, |state| {
            let partition = as_partition(state, slot)?;
            partition.cur = i;
            partition.read_row(i, &mut row_bytes)
        })?;
        let tuple = vals::decode_vals(&row_bytes)?;
        (*out)(&tuple)?;
    }
    Ok(())
}

pub(crate) fn exec_frames(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let partition_slot = op.param_u64(0)? as usize;
    let frames_slot = op.param_u64(1)? as usize;
    let specs = shape::as_array(op.param(2)?, "frame configurations")?
        .iter()
        .map(parse_spec)
        .collect::<Result<Vec<_>>>()?;
    let _guard = SlotGuard::new(vars, frames_slot);

    let mut scratch = Vec::new();
    let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
        let frames = vars.with_slot_mut(partition_slot, |state| {
            let partition = as_partition(state, partition_slot)?;
            specs
                .iter()
                .map(|spec| compute_frame(partition, spec, &mut scratch))
                .collect::<Result<Vec<_>>>()
        })?;
        vars.set_slot(
            frames_slot,
            TempSlot::Frames(WindowFrames {
                partition_slot,
                frames,
            }),
        );
        (*out)(tuple)
    };
    exec_op(child, vars, &mut on_vals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Rows,
    Groups,
    Range,
}

#[derive(Debug, Clone)]
struct FrameSpec {
    kind: FrameKind,
    // Bound offsets relative to the current row/group/value; `None` is
    // unbounded toward that partition edge.
    preceding: Option<f64>,
    following: Option<f64>,
    exclude: Exclude,
    val_idx: usize,
}

fn parse_spec(cfg: &Value) -> Result<FrameSpec> {
    let parts = shape::as_array(cfg, "frame configuration")?;
    if parts.len() < 7 {
        return Err(BrookError::Plan(format!(
            "frame configuration needs 7 entries, got {}",
            parts.len()
        )));
    }
    let kind = match shape::as_str(&parts[0], "frame kind")? {
        "rows" => FrameKind::Rows,
        "groups" => FrameKind::Groups,
        "range" => FrameKind::Range,
        other => {
            return Err(BrookError::Plan(format!("unknown frame kind: {other:?}")))
        }
    };
    Ok(FrameSpec {
        kind,
        preceding: parse_bound(&parts[1], &parts[2])?,
        following: parse_bound(&parts[3], &parts[4])?,
        exclude: Exclude::parse(shape::as_str(&parts[5], "frame exclusion")?)?,
        val_idx: shape::as_i64(&parts[6], "frame value index")? as usize,
    })
}

fn parse_bound(kind: &Value, n: &Value) -> Result<Option<f64>> {
    match shape::as_str(kind, "frame bound kind")? {
        "num" => Ok(Some(shape::as_f64(n, "frame bound")?)),
        "unbounded" => Ok(None),
        other => Err(BrookError::Plan(format!(
            "unknown frame bound kind: {other:?}"
        ))),
    }
}

fn compute_frame(
    partition: &mut WindowPartition,
    spec: &FrameSpec,
    scratch: &mut Vec<u8>,
) -> Result<FrameState> {
    let cur = partition.cur;
    let n = partition.len();
    let cur_dense = partition.meta(cur)?.dense_rank;

    let mut peer_begin = cur;
    while peer_begin > 0 && partition.meta(peer_begin - 1)?.dense_rank == cur_dense {
        peer_begin -= 1;
    }
    let mut peer_end = cur + 1;
    while peer_end < n && partition.meta(peer_end)?.dense_rank == cur_dense {
        peer_end += 1;
    }

    let (begin, end) = match spec.kind {
        FrameKind::Rows => {
            let begin = match spec.preceding {
                None => 0,
                Some(delta) => clamp_idx(cur as i64 + delta as i64, n),
            };
            let end = match spec.following {
                None => n,
                Some(delta) => clamp_idx(cur as i64 + delta as i64 + 1, n),
            };
            (begin, end)
        }
        FrameKind::Groups => {
            // Sorted input keeps dense ranks nondecreasing, so both bounds
            // are short walks from the current row.
            let mut begin = cur;
            match spec.preceding {
                None => begin = 0,
                Some(delta) => {
                    let lo = cur_dense as i64 + delta as i64;
                    while begin > 0 && partition.meta(begin - 1)?.dense_rank as i64 >= lo {
                        begin -= 1;
                    }
                    while begin < n && (partition.meta(begin)?.dense_rank as i64) < lo {
                        begin += 1;
                    }
                }
            }
            let mut end = cur;
            match spec.following {
                None => end = n,
                Some(delta) => {
                    let hi = cur_dense as i64 + delta as i64;
                    while end < n && partition.meta(end)?.dense_rank as i64 <= hi {
                        end += 1;
                    }
                    while end > 0 && partition.meta(end - 1)?.dense_rank as i64 > hi {
                        end -= 1;
                    }
                }
            }
            (begin, end)
        }
        FrameKind::Range => {
            let cur_val = partition.f64_at(cur, spec.val_idx, scratch)?;
            let mut begin = cur;
            match spec.preceding {
                None => begin = 0,
                Some(delta) => {
                    let lo = cur_val + delta;
                    while begin > 0 && partition.f64_at(begin - 1, spec.val_idx, scratch)? >= lo {
                        begin -= 1;
                    }
                    while begin < n && partition.f64_at(begin, spec.val_idx, scratch)? < lo {
                        begin += 1;
                    }
                }
            }
            let mut end = cur;
            match spec.following {
                None => end = n,
                Some(delta) => {
                    let hi = cur_val + delta;
                    while end < n && partition.f64_at(end, spec.val_idx, scratch)? <= hi {
                        end += 1;
                    }
                    while end > 0 && partition.f64_at(end - 1, spec.val_idx, scratch)? > hi {
                        end -= 1;
                    }
                }
            }
            (begin, end)
        }
    };

    let end = end.max(begin);
    Ok(FrameState {
        begin,
        end,
        cur,
        exclude: spec.exclude,
        peer_begin,
        peer_end,
    })
}

fn clamp_idx(i: i64, n: usize) -> usize {
    i.clamp(0, n as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_spec_accepts_the_plan_shape() {
        let spec = parse_spec(&json!([
            "rows", "num", -1, "num", 1, "no-others", 0
        ]))
        .expect("parse");
        assert_eq!(spec.kind, FrameKind::Rows);
        assert_eq!(spec.preceding, Some(-1.0));
        assert_eq!(spec.following, Some(1.0));
        assert_eq!(spec.exclude, Exclude::NoOthers);

        let spec = parse_spec(&json!([
            "range", "unbounded", 0, "num", 1.5, "ties", 2
        ]))
        .expect("parse");
        assert_eq!(spec.kind, FrameKind::Range);
        assert_eq!(spec.preceding, None);
        assert_eq!(spec.following, Some(1.5));
        assert_eq!(spec.val_idx, 2);
    }

    #[test]
    fn parse_spec_rejects_bad_shapes() {
        assert!(parse_spec(&json!(["rows", "num", -1])).is_err());
        assert!(parse_spec(&json!(["cube", "num", -1, "num", 1, "no-others", 0])).is_err());
        assert!(parse_spec(&json!(["rows", "num", -1, "num", 1, "some", 0])).is_err());
    }
}
