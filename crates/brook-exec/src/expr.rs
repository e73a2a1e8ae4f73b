//! Expression compilation and evaluation.
//!
//! Expressions arrive as JSON arrays (`["eq", ["labelPath", "a"], ["json",
//! "10"]]`) and are compiled once per operator into [`ExprFunc`] closures
//! evaluated per tuple. Evaluation is pure: a type mismatch yields MISSING
//! (the empty value), never an error.
//!
//! Label paths resolve the first step against the tuple's labels and the
//! remainder by raw-slice indexing through the stored JSON bytes, so deep
//! steps return the original sub-document text. Extracted values are always
//! valid JSON (string extraction keeps the quotes).

use std::cmp::Ordering;
use std::collections::HashMap;

use brook_common::{BrookError, Result};
use brook_plan::shape;
use brook_value::kind;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::vars::{Ctx, Vars};
use crate::window_state::FrameState;

/// A compiled expression: `(vars, tuple) -> value bytes`. The empty vector
/// is MISSING.
pub type ExprFunc = Box<dyn Fn(&Vars, &[&[u8]]) -> Result<Vec<u8>>>;

const TRUE: &[u8] = b"true";
const FALSE: &[u8] = b"false";

/// Compile one expression against the labels of the tuples it will see.
pub fn compile_expr(expr: &Value, labels: &[String], ctx: &Ctx) -> Result<ExprFunc> {
    let parts = shape::as_array(expr, "expression")?;
    let head = parts
        .first()
        .ok_or_else(|| BrookError::Plan("empty expression".to_string()))?;
    let head = shape::as_str(head, "expression head")?;
    match head {
        "json" | "literal" => compile_literal(arg(parts, 1, head)?),
        "labelPath" => compile_label_path(&parts[1..], labels),
        "labelUint64" => compile_label_uint64(arg(parts, 1, head)?, labels),
        "eq" => compile_cmp(parts, labels, ctx, [Ordering::Equal; 2]),
        "lt" => compile_cmp(parts, labels, ctx, [Ordering::Less; 2]),
        "le" => compile_cmp(parts, labels, ctx, [Ordering::Less, Ordering::Equal]),
        "gt" => compile_cmp(parts, labels, ctx, [Ordering::Greater; 2]),
        "ge" => compile_cmp(parts, labels, ctx, [Ordering::Greater, Ordering::Equal]),
        "and" | "or" => compile_bool(head, &parts[1..], labels, ctx),
        "not" => compile_not(arg(parts, 1, head)?, labels, ctx),
        "add" | "sub" | "mul" | "div" => compile_arith(head, parts, labels, ctx),
        "exprStr" => compile_expr_str(arg(parts, 1, head)?, ctx),
        "window-partition-row-number" => compile_row_number(parts),
        "window-frame-count" => compile_frame_count(parts),
        "window-frame-step-value" => compile_step_value(parts, labels, ctx),
        other => Err(BrookError::Plan(format!(
            "unknown expression head: {other:?}"
        ))),
    }
}

/// Compile a list of expressions.
pub fn compile_exprs(exprs: &[Value], labels: &[String], ctx: &Ctx) -> Result<Vec<ExprFunc>> {
    exprs
        .iter()
        .map(|e| compile_expr(e, labels, ctx))
        .collect()
}

fn arg<'v>(parts: &'v [Value], idx: usize, head: &str) -> Result<&'v Value> {
    parts.get(idx).ok_or_else(|| {
        BrookError::Plan(format!("expression {head:?} missing operand {idx}"))
    })
}

fn compile_literal(lit: &Value) -> Result<ExprFunc> {
    let bytes = match lit {
        Value::String(s) => s.clone().into_bytes(),
        other => serde_json::to_vec(other)
            .map_err(|e| BrookError::Plan(format!("bad literal: {e}")))?,
    };
    Ok(Box::new(move |_, _| Ok(bytes.clone())))
}

enum Step {
    Key(String),
    Index(usize),
}

fn compile_label_path(parts: &[Value], labels: &[String]) -> Result<ExprFunc> {
    let label = shape::as_str(
        parts
            .first()
            .ok_or_else(|| BrookError::Plan("labelPath without a label".to_string()))?,
        "labelPath label",
    )?;
    let Some(idx) = labels.iter().position(|l| l == label) else {
        // Unknown labels resolve to MISSING, matching scan-over-anything
        // semantics.
        return Ok(Box::new(|_, _| Ok(Vec::new())));
    };
    let steps = parts[1..]
        .iter()
        .map(|step| match step {
            Value::String(key) => Ok(Step::Key(key.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| Step::Index(i as usize))
                .ok_or_else(|| BrookError::Plan(format!("bad labelPath index: {n}"))),
            other => Err(BrookError::Plan(format!("bad labelPath step: {other}"))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(move |_, vals| {
        let Some(mut raw) = vals.get(idx).copied() else {
            return Ok(Vec::new());
        };
        for step in &steps {
            match dive(raw, step) {
                Some(inner) => raw = inner,
                None => return Ok(Vec::new()),
            }
        }
        Ok(raw.to_vec())
    }))
}

fn dive<'v>(raw: &'v [u8], step: &Step) -> Option<&'v [u8]> {
    if raw.is_empty() {
        return None;
    }
    match step {
        Step::Key(key) => {
            let map: HashMap<String, &'v RawValue> = serde_json::from_slice(raw).ok()?;
            let inner: &'v RawValue = map.get(key)?;
            Some(inner.get().as_bytes())
        }
        Step::Index(index) => {
            let items: Vec<&'v RawValue> = serde_json::from_slice(raw).ok()?;
            let inner: &'v RawValue = items.get(*index)?;
            Some(inner.get().as_bytes())
        }
    }
}

fn compile_label_uint64(label: &Value, labels: &[String]) -> Result<ExprFunc> {
    let label = shape::as_str(label, "labelUint64 label")?;
    let Some(idx) = labels.iter().position(|l| l == label) else {
        return Ok(Box::new(|_, _| Ok(Vec::new())));
    };
    Ok(Box::new(move |_, vals| {
        let Some(raw) = vals.get(idx).copied() else {
            return Ok(Vec::new());
        };
        if raw.len() != 8 {
            return Ok(Vec::new());
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(raw);
        Ok(u64::from_le_bytes(word).to_string().into_bytes())
    }))
}

fn compile_cmp(
    parts: &[Value],
    labels: &[String],
    ctx: &Ctx,
    accept: [Ordering; 2],
) -> Result<ExprFunc> {
    let head = shape::as_str(&parts[0], "expression head")?;
    let lhs = compile_expr(arg(parts, 1, head)?, labels, ctx)?;
    let rhs = compile_expr(arg(parts, 2, head)?, labels, ctx)?;
    Ok(Box::new(move |vars, vals| {
        let a = lhs(vars, vals)?;
        let b = rhs(vars, vals)?;
        let ord = vars.ctx().comparer.borrow_mut().compare(&a, &b);
        let hit = ord == accept[0] || ord == accept[1];
        Ok(if hit { TRUE.to_vec() } else { FALSE.to_vec() })
    }))
}

fn compile_bool(head: &str, operands: &[Value], labels: &[String], ctx: &Ctx) -> Result<ExprFunc> {
    if operands.is_empty() {
        return Err(BrookError::Plan(format!("{head:?} needs operands")));
    }
    let compiled = compile_exprs(operands, labels, ctx)?;
    let want_all = head == "and";
    Ok(Box::new(move |vars, vals| {
        for operand in &compiled {
            let v = operand(vars, vals)?;
            if kind::is_true(&v) != want_all {
                // Short-circuit: AND met a non-true, OR met a true.
                return Ok(if want_all { FALSE.to_vec() } else { TRUE.to_vec() });
            }
        }
        Ok(if want_all { TRUE.to_vec() } else { FALSE.to_vec() })
    }))
}

fn compile_not(operand: &Value, labels: &[String], ctx: &Ctx) -> Result<ExprFunc> {
    let inner = compile_expr(operand, labels, ctx)?;
    Ok(Box::new(move |vars, vals| {
        let v = inner(vars, vals)?;
        Ok(if kind::is_true(&v) {
            FALSE.to_vec()
        } else {
            TRUE.to_vec()
        })
    }))
}

fn compile_arith(head: &str, parts: &[Value], labels: &[String], ctx: &Ctx) -> Result<ExprFunc> {
    let lhs = compile_expr(arg(parts, 1, head)?, labels, ctx)?;
    let rhs = compile_expr(arg(parts, 2, head)?, labels, ctx)?;
    let op = head.to_string();
    Ok(Box::new(move |vars, vals| {
        let a = lhs(vars, vals)?;
        let b = rhs(vars, vals)?;
        let (Some(x), Some(y)) = (kind::parse_f64(&a), kind::parse_f64(&b)) else {
            return Ok(Vec::new());
        };
        let out = match op.as_str() {
            "add" => x + y,
            "sub" => x - y,
            "mul" => x * y,
            _ => x / y,
        };
        if out.is_finite() {
            Ok(format!("{out}").into_bytes())
        } else {
            Ok(Vec::new())
        }
    }))
}

fn compile_expr_str(text: &Value, ctx: &Ctx) -> Result<ExprFunc> {
    let text = shape::as_str(text, "exprStr text")?.to_string();
    let eval = ctx
        .expr_catalog
        .get("exprStr")
        .cloned()
        .ok_or_else(|| {
            BrookError::Plan("no exprStr evaluator registered in the expression catalog".to_string())
        })?;
    Ok(Box::new(move |vars, vals| eval(vars, vals, &text)))
}

// ---- window projections: read frame state from temp slots ----

fn frame_args(parts: &[Value]) -> Result<(usize, usize)> {
    let head = shape::as_str(&parts[0], "expression head")?;
    let slot = shape::as_i64(arg(parts, 1, head)?, "frames slot")? as usize;
    let idx = shape::as_i64(arg(parts, 2, head)?, "frame index")? as usize;
    Ok((slot, idx))
}

fn frame_at(vars: &Vars, slot: usize, idx: usize) -> Result<(FrameState, usize)> {
    let frames = vars.frames_snapshot(slot)?;
    let frame = frames.frames.get(idx).copied().ok_or_else(|| {
        BrookError::Execution(format!("window frame {idx} not configured in slot {slot}"))
    })?;
    Ok((frame, frames.partition_slot))
}

fn compile_row_number(parts: &[Value]) -> Result<ExprFunc> {
    let (slot, idx) = frame_args(parts)?;
    Ok(Box::new(move |vars, _| {
        let (frame, _) = frame_at(vars, slot, idx)?;
        Ok((frame.cur as u64 + 1).to_string().into_bytes())
    }))
}

fn compile_frame_count(parts: &[Value]) -> Result<ExprFunc> {
    let (slot, idx) = frame_args(parts)?;
    Ok(Box::new(move |vars, _| {
        let (frame, _) = frame_at(vars, slot, idx)?;
        Ok(frame.count().to_string().into_bytes())
    }))
}

fn compile_step_value(parts: &[Value], labels: &[String], ctx: &Ctx) -> Result<ExprFunc> {
    let (slot, idx) = frame_args(parts)?;
    let start = shape::as_i64(arg(parts, 3, "window-frame-step-value")?, "step start")?;
    let ascending = shape::as_bool(arg(parts, 4, "window-frame-step-value")?, "step direction")?;
    let steps = shape::as_i64(arg(parts, 5, "window-frame-step-value")?, "step count")? as u64;
    let value_expr = compile_expr(arg(parts, 6, "window-frame-step-value")?, labels, ctx)?;
    Ok(Box::new(move |vars, _| {
        let (frame, partition_slot) = frame_at(vars, slot, idx)?;
        let Some(row) = frame.step(start, ascending, steps) else {
            return Ok(Vec::new());
        };
        let owned: Vec<Vec<u8>> = vars.with_slot_mut(partition_slot, |state| {
            let partition = crate::vars::as_partition(state, partition_slot)?;
            let mut raw = Vec::new();
            partition.read_row(row, &mut raw)?;
            Ok(brook_value::vals::decode_vals(&raw)?
                .iter()
                .map(|v| v.to_vec())
                .collect())
        })?;
        let refs: Vec<&[u8]> = owned.iter().map(|v| v.as_slice()).collect();
        value_expr(vars, &refs)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_common::EngineConfig;
    use serde_json::json;

    fn vars() -> Vars {
        Vars::from_config(EngineConfig::default())
    }

    fn eval(expr: serde_json::Value, labels: &[&str], tuple: &[&[u8]]) -> Vec<u8> {
        let vars = vars();
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let f = compile_expr(&expr, &labels, vars.ctx()).expect("compile");
        f(&vars, tuple).expect("eval")
    }

    #[test]
    fn literals_pass_through_as_bytes() {
        assert_eq!(eval(json!(["json", "3000"]), &[], &[]), b"3000");
        assert_eq!(eval(json!(["json", 3000]), &[], &[]), b"3000");
        assert_eq!(eval(json!(["literal", {"a": 1}]), &[], &[]), b"{\"a\":1}");
    }

    #[test]
    fn label_path_reads_tuple_slots() {
        assert_eq!(
            eval(json!(["labelPath", "b"]), &["a", "b"], &[b"1", b"2"]),
            b"2"
        );
        assert_eq!(eval(json!(["labelPath", "xxx"]), &["a"], &[b"1"]), b"");
    }

    #[test]
    fn label_path_dives_into_raw_slices() {
        let doc = br#"{"addr": {"city": "sf"}, "tags": [10, 20]}"#;
        assert_eq!(
            eval(json!(["labelPath", ".", "addr"]), &["."], &[doc]),
            br#"{"city": "sf"}"#
        );
        assert_eq!(
            eval(json!(["labelPath", ".", "addr", "city"]), &["."], &[doc]),
            br#""sf""#
        );
        assert_eq!(
            eval(json!(["labelPath", ".", "tags", 1]), &["."], &[doc]),
            b"20"
        );
        assert_eq!(
            eval(json!(["labelPath", ".", "nope", "city"]), &["."], &[doc]),
            b""
        );
    }

    #[test]
    fn comparisons_return_json_booleans() {
        let labels = ["a", "b"];
        let tuple: &[&[u8]] = &[b"10", b"20"];
        assert_eq!(
            eval(
                json!(["eq", ["labelPath", "a"], ["json", "10"]]),
                &labels,
                tuple
            ),
            b"true"
        );
        assert_eq!(
            eval(
                json!(["lt", ["labelPath", "a"], ["labelPath", "b"]]),
                &labels,
                tuple
            ),
            b"true"
        );
        assert_eq!(
            eval(
                json!(["ge", ["labelPath", "a"], ["json", "11"]]),
                &labels,
                tuple
            ),
            b"false"
        );
        // Cross-type: numbers order before strings.
        assert_eq!(
            eval(
                json!(["lt", ["labelPath", "a"], ["json", "\"hello\""]]),
                &labels,
                tuple
            ),
            b"true"
        );
    }

    #[test]
    fn and_or_short_circuit() {
        let expr = json!(["or", ["json", "true"], ["labelPath", "boom"]]);
        assert_eq!(eval(expr, &[], &[]), b"true");
        let expr = json!(["and", ["json", "false"], ["labelPath", "boom"]]);
        assert_eq!(eval(expr, &[], &[]), b"false");
        let expr = json!(["and", ["json", "true"], ["json", "true"]]);
        assert_eq!(eval(expr, &[], &[]), b"true");
        let expr = json!(["not", ["json", "false"]]);
        assert_eq!(eval(expr, &[], &[]), b"true");
    }

    #[test]
    fn arithmetic_is_numeric_or_missing() {
        assert_eq!(eval(json!(["add", ["json", "1"], ["json", "2"]]), &[], &[]), b"3");
        assert_eq!(
            eval(json!(["mul", ["json", "2.5"], ["json", "4"]]), &[], &[]),
            b"10"
        );
        assert_eq!(
            eval(json!(["add", ["json", "\"x\""], ["json", "2"]]), &[], &[]),
            b""
        );
        assert_eq!(
            eval(json!(["div", ["json", "1"], ["json", "0"]]), &[], &[]),
            b""
        );
    }

    #[test]
    fn label_uint64_decodes_counter_slots() {
        let counter = 7u64.to_le_bytes();
        assert_eq!(
            eval(json!(["labelUint64", "rank"]), &["rank"], &[&counter]),
            b"7"
        );
        assert_eq!(
            eval(json!(["labelUint64", "rank"]), &["rank"], &[b"xx"]),
            b""
        );
    }

    #[test]
    fn expr_str_dispatches_through_the_catalog() {
        let mut ctx = Ctx::new(EngineConfig::default());
        ctx.expr_catalog.insert(
            "exprStr".to_string(),
            std::sync::Arc::new(|_: &Vars, vals: &[&[u8]], text: &str| {
                Ok(if text == "TRUE" || vals.is_empty() {
                    b"true".to_vec()
                } else {
                    b"false".to_vec()
                })
            }),
        );
        let vars = Vars::new(std::sync::Arc::new(ctx));
        let f = compile_expr(&json!(["exprStr", "TRUE"]), &[], vars.ctx()).expect("compile");
        assert_eq!(f(&vars, &[b"x"]).expect("eval"), b"true");

        // Without a registered evaluator, compilation fails.
        let empty = Vars::from_config(EngineConfig::default());
        assert!(compile_expr(&json!(["exprStr", "TRUE"]), &[], empty.ctx()).is_err());
    }
}
