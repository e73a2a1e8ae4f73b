//! Operator dispatch: one match arm per kind, one module per operator
//! family. Unknown kinds go to the context's external dispatch hook.

use brook_common::{BrookError, Result};
use brook_plan::OpNode;
use tracing::info_span;

use crate::vars::{Emit, Vars};

pub mod filter;
pub mod group;
pub mod join_hash;
pub mod join_nl;
pub mod order;
pub mod project;
pub mod scan;
pub mod temps;
pub mod unnest;
pub mod window;

/// Run the root operator to completion, invoking `on_vals` once per output
/// tuple. Yielded slices are valid only during the callback; returning an
/// error from it (for example [`BrookError::Cancelled`]) stops the pipeline.
pub fn execute(
    op: &OpNode,
    vars: &Vars,
    mut on_vals: impl FnMut(&[&[u8]]) -> Result<()>,
) -> Result<()> {
    let span = info_span!("execute", root = %op.kind);
    let _enter = span.enter();
    exec_op(op, vars, &mut on_vals)
}

/// Dispatch one operator node.
pub fn exec_op(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    match op.kind.as_str() {
        "nil" => Ok(()),
        "noop" => match op.children.first() {
            Some(child) => exec_op(child, vars, out),
            None => Ok(()),
        },
        "scan" => scan::exec(op, vars, out),
        "filter" => filter::exec(op, vars, out),
        "project" => project::exec(op, vars, out),
        "order-offset-limit" => order::exec(op, vars, out),
        "joinNL-inner" | "joinNL-leftOuter" => join_nl::exec_join(op, vars, out),
        "nestNL-inner" | "nestNL-leftOuter" => join_nl::exec_nest(op, vars, out),
        "unnest-inner" | "unnest-leftOuter" => unnest::exec(op, vars, out),
        "joinHash-inner" | "joinHash-leftOuter" => join_hash::exec_join(op, vars, out),
        "intersect-distinct" | "intersect-all" | "except-distinct" | "except-all" => {
            join_hash::exec_set_op(op, vars, out)
        }
        "group" | "distinct" => group::exec(op, vars, out),
        "union-all" | "sequence" => exec_each_child(op, vars, out),
        "temp-capture" => temps::exec_capture(op, vars, out),
        "temp-yield" => temps::exec_yield(op, vars, out),
        "temp-yield-var" => temps::exec_yield_var(op, vars, out),
        "window-partition" => window::exec_partition(op, vars, out),
        "window-frames" => window::exec_frames(op, vars, out),
        _ => match &vars.ctx().exec_op_ex {
            Some(dispatch) => dispatch(op, vars, out),
            None => Err(BrookError::Unsupported(format!(
                "unknown operator kind: {:?}",
                op.kind
            ))),
        },
    }
}

// union-all and sequence share the shape: drain children in order, tuples
// forwarded unchanged (sequence's capture children yield nothing anyway).
fn exec_each_child(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    for child in &op.children {
        exec_op(child, vars, &mut *out)?;
    }
    Ok(())
}
