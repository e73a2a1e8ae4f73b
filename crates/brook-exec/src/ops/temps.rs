//! Temp-slot plumbing operators: capture a child's rows into a slot, replay
//! a captured slot, or yield a single slot-held value. These carry
//! sub-plan results across the branches of a `sequence`.

use brook_common::{BrookError, Result};
use brook_plan::OpNode;
use brook_store::Pooled;
use brook_value::vals;

use crate::ops::exec_op;
use crate::vars::{CapturedRows, Emit, TempSlot, Vars};

pub(crate) fn exec_capture(op: &OpNode, vars: &Vars, _out: &mut Emit<'_>) -> Result<()> {
    let slot = op.param_u64(0)? as usize;
    let child = op.child()?;
    let chunks = Pooled::alloc(&vars.ctx().pools.chunks)?.take();
    let mut captured = CapturedRows {
        chunks,
        rows: Vec::new(),
    };
    let mut encoded = Vec::new();
    let result = {
        let captured = &mut captured;
        let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
            encoded.clear();
            vals::encode_vals(&mut encoded, tuple);
            let offset = captured.chunks.append(&encoded)?;
            captured.rows.push((offset, encoded.len() as u32));
            Ok(())
        };
        exec_op(child, vars, &mut on_vals)
    };
    match result {
        Ok(()) => {
            vars.set_slot(slot, TempSlot::Rows(captured));
            Ok(())
        }
        Err(err) => {
            (vars.ctx().pools.chunks.recycle)(captured.chunks);
            Err(err)
        }
    }
}

pub(crate) fn exec_yield(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let slot = op.param_u64(0)? as usize;
    let count = vars.with_slot_mut(slot, |state| match state {
        TempSlot::Rows(captured) => Ok(captured.rows.len()),
        _ => Err(BrookError::Execution(format!(
            "temp slot {slot} holds no captured rows"
        ))),
    })?;
    let mut row_bytes = Vec::new();
    for i in 0..count {
        vars.with_slot_mut(slot, |state| match state {
            TempSlot::Rows(captured) => {
                let (offset, len) = captured.rows[i];
                captured.chunks.read_into(offset, len as usize, &mut row_bytes)
            }
            _ => Err(BrookError::Execution(format!(
                "temp slot {slot} holds no captured rows"
            ))),
        })?;
        let tuple = vals::decode_vals(&row_bytes)?;
        (*out)(&tuple)?;
    }
    Ok(())
}

pub(crate) fn exec_yield_var(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let slot = op.param_u64(0)? as usize;
    let value = vars.with_slot_mut(slot, |state| match state {
        TempSlot::Val(value) => Ok(Some(value.clone())),
        TempSlot::Empty => Ok(None),
        _ => Err(BrookError::Execution(format!(
            "temp slot {slot} holds no value"
        ))),
    })?;
    match value {
        Some(value) => (*out)(&[&value]),
        None => Ok(()),
    }
}
