//! Filter: forward tuples whose predicate evaluates to TRUE.

use brook_common::Result;
use brook_plan::OpNode;
use brook_value::kind;
use serde_json::Value;

use crate::expr::compile_expr;
use crate::ops::exec_op;
use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    let child = op.child()?;
    // The whole parameter list is one flattened predicate expression.
    let predicate = compile_expr(&Value::Array(op.params.clone()), &child.labels, vars.ctx())?;
    let mut on_vals = |vals: &[&[u8]]| -> Result<()> {
        if kind::is_true(&predicate(vars, vals)?) {
            (*out)(vals)
        } else {
            Ok(())
        }
    };
    exec_op(child, vars, &mut on_vals)
}
