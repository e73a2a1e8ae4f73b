//! Project: evaluate N expressions per tuple into a reused output row.

use brook_common::Result;
use brook_plan::OpNode;

use crate::expr::compile_exprs;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let exprs = compile_exprs(&op.params, &child.labels, vars.ctx())?;
    // Output buffers are reused across tuples; consumers must not retain
    // the yielded slices.
    let mut row: Vec<Vec<u8>> = vec![Vec::new(); exprs.len()];
    let mut on_vals = |vals: &[&[u8]]| -> Result<()> {
        for (buf, expr) in row.iter_mut().zip(&exprs) {
            *buf = expr(vars, vals)?;
        }
        let refs: Vec<&[u8]> = row.iter().map(Vec::as_slice).collect();
        (*out)(&refs)
    };
    exec_op(child, vars, &mut on_vals)
}
