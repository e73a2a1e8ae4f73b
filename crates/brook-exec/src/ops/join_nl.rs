//! Nested-loop join and nest: the inner child is re-driven from the start
//! for every outer tuple, so children must be restartable.

use brook_common::Result;
use brook_plan::OpNode;
use brook_value::kind;
use serde_json::Value;

use crate::expr::compile_expr;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec_join(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let (child_a, child_b) = op.child_pair()?;
    let left_outer = op.kind.ends_with("leftOuter");
    let labels_ab = concat_labels(child_a, child_b);
    let predicate = compile_expr(&Value::Array(op.params.clone()), &labels_ab, vars.ctx())?;
    let b_arity = child_b.labels.len();

    let mut on_a = |a_vals: &[&[u8]]| -> Result<()> {
        let mut matched = false;
        {
            let matched = &mut matched;
            let mut on_b = |b_vals: &[&[u8]]| -> Result<()> {
                let mut joined: Vec<&[u8]> = Vec::with_capacity(a_vals.len() + b_vals.len());
                joined.extend_from_slice(a_vals);
                joined.extend_from_slice(b_vals);
                if kind::is_true(&predicate(vars, &joined)?) {
                    *matched = true;
                    (*out)(&joined)
                } else {
                    Ok(())
                }
            };
            exec_op(child_b, vars, &mut on_b)?;
        }
        if left_outer && !matched {
            let mut joined: Vec<&[u8]> = Vec::with_capacity(a_vals.len() + b_arity);
            joined.extend_from_slice(a_vals);
            joined.resize(a_vals.len() + b_arity, b"");
            (*out)(&joined)?;
        }
        Ok(())
    };
    exec_op(child_a, vars, &mut on_a)
}

/// Nest: collect the matching inner tuples' nested value into one JSON
/// array per outer tuple. The nested value is the inner child's last
/// column; a MISSING one encodes as `null` so the array stays parseable.
/// Inner nest drops outer tuples with no match; left-outer emits them with
/// an empty array.
pub(crate) fn exec_nest(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let (child_a, child_b) = op.child_pair()?;
    let left_outer = op.kind.ends_with("leftOuter");
    let labels_ab = concat_labels(child_a, child_b);
    let predicate = compile_expr(&Value::Array(op.params.clone()), &labels_ab, vars.ctx())?;
    let nested_idx = child_b.labels.len().saturating_sub(1);

    let mut on_a = |a_vals: &[&[u8]]| -> Result<()> {
        let mut nested = Vec::from(b"[".as_slice());
        let mut any = false;
        {
            let nested = &mut nested;
            let any = &mut any;
            let mut on_b = |b_vals: &[&[u8]]| -> Result<()> {
                let mut joined: Vec<&[u8]> = Vec::with_capacity(a_vals.len() + b_vals.len());
                joined.extend_from_slice(a_vals);
                joined.extend_from_slice(b_vals);
                if kind::is_true(&predicate(vars, &joined)?) {
                    if *any {
                        nested.push(b',');
                    }
                    let nested_val = b_vals.get(nested_idx).copied().unwrap_or(b"");
                    if nested_val.is_empty() {
                        nested.extend_from_slice(b"null");
                    } else {
                        nested.extend_from_slice(nested_val);
                    }
                    *any = true;
                }
                Ok(())
            };
            exec_op(child_b, vars, &mut on_b)?;
        }
        if !any && !left_outer {
            return Ok(());
        }
        nested.push(b']');
        let mut row: Vec<&[u8]> = Vec::with_capacity(a_vals.len() + 1);
        row.extend_from_slice(a_vals);
        row.push(&nested);
        (*out)(&row)
    };
    exec_op(child_a, vars, &mut on_a)
}

fn concat_labels(a: &OpNode, b: &OpNode) -> Vec<String> {
    a.labels
        .iter()
        .chain(b.labels.iter())
        .cloned()
        .collect()
}
