//! Unnest: flatten an array-valued expression into one output row per
//! element, the element appended after the original tuple.

use brook_common::Result;
use brook_plan::OpNode;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::expr::compile_expr;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    let left_outer = op.kind.ends_with("leftOuter");
    let array_expr = compile_expr(&Value::Array(op.params.clone()), &child.labels, vars.ctx())?;

    let mut on_vals = |tuple: &[&[u8]]| -> Result<()> {
        let value = array_expr(vars, tuple)?;
        let elements: Option<Vec<&RawValue>> = if value.is_empty() {
            None
        } else {
            serde_json::from_slice(&value).ok()
        };
        match elements {
            Some(elements) if !elements.is_empty() => {
                let mut row: Vec<&[u8]> = Vec::with_capacity(tuple.len() + 1);
                row.extend_from_slice(tuple);
                row.push(b"");
                for element in elements {
                    row[tuple.len()] = element.get().as_bytes();
                    (*out)(&row)?;
                }
                Ok(())
            }
            // Missing, non-array, or empty: inner drops the tuple,
            // left-outer keeps it with a MISSING element.
            _ if left_outer => {
                let mut row: Vec<&[u8]> = Vec::with_capacity(tuple.len() + 1);
                row.extend_from_slice(tuple);
                row.push(b"");
                (*out)(&row)
            }
            _ => Ok(()),
        }
    };
    exec_op(child, vars, &mut on_vals)
}
