#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use brook_common::{EngineConfig, Result};
use brook_exec::vars::{Ctx, Vars};
use brook_exec::execute;
use brook_plan::OpNode;
use serde_json::{json, Value};

pub fn unique_dir(prefix: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{nanos}"))
}

pub fn test_config(prefix: &str) -> EngineConfig {
    EngineConfig {
        temp_dir: unique_dir(prefix).to_string_lossy().into_owned(),
        ..EngineConfig::default()
    }
}

/// A config with budgets tiny enough to force every spill path.
pub fn spilly_config(prefix: &str) -> EngineConfig {
    EngineConfig {
        temp_dir: unique_dir(prefix).to_string_lossy().into_owned(),
        mem_budget_bytes: 64,
        spill_chunk_bytes: 64,
        order_heap_max: 4,
        stats_interval_rows: 0,
    }
}

pub fn op(kind: &str, labels: &[&str], params: Value, children: Vec<OpNode>) -> OpNode {
    OpNode {
        kind: kind.to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        params: match params {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        },
        children,
    }
}

pub fn scan_csv(labels: &[&str], data: &str) -> OpNode {
    op("scan", labels, json!(["csvData", data]), vec![])
}

pub fn scan_jsons(data: &str) -> OpNode {
    op("scan", &["."], json!(["jsonsData", data]), vec![])
}

/// Ascending order over every label, to pin down operators with
/// unspecified emission order.
pub fn order_all(labels: &[&str], child: OpNode) -> OpNode {
    let exprs: Vec<Value> = labels.iter().map(|l| json!(["labelPath", l])).collect();
    let dirs: Vec<Value> = labels.iter().map(|_| json!("asc")).collect();
    op(
        "order-offset-limit",
        labels,
        json!([exprs, dirs]),
        vec![child],
    )
}

pub fn run(plan: &OpNode) -> Vec<Vec<String>> {
    run_with_config(test_config("brook_exec_test"), plan)
}

pub fn run_with_config(cfg: EngineConfig, plan: &OpNode) -> Vec<Vec<String>> {
    let vars = Vars::from_config(cfg);
    run_with_vars(&vars, plan).expect("execute")
}

pub fn run_with_vars(vars: &Vars, plan: &OpNode) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    execute(plan, vars, |vals| {
        rows.push(
            vals.iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect(),
        );
        Ok(())
    })?;
    Ok(rows)
}

pub fn rows(expected: &[&[&str]]) -> Vec<Vec<String>> {
    expected
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// A context with a small `exprStr` evaluator good enough for tests:
/// `TRUE`, `FALSE`, and `<path> = <json literal>` over the `.` document.
pub fn ctx_with_expr_str(cfg: EngineConfig) -> Ctx {
    let mut ctx = Ctx::new(cfg);
    ctx.register_expr_eval("exprStr", |_vars, vals, text| {
        let verdict = eval_expr_str(vals, text);
        Ok(if verdict {
            b"true".to_vec()
        } else {
            b"false".to_vec()
        })
    });
    ctx
}

fn eval_expr_str(vals: &[&[u8]], text: &str) -> bool {
    match text.trim() {
        "TRUE" => return true,
        "FALSE" => return false,
        _ => {}
    }
    for clause in text.split(" or ") {
        let Some((path, literal)) = clause.split_once('=') else {
            return false;
        };
        let Ok(expected) = serde_json::from_str::<Value>(literal.trim()) else {
            return false;
        };
        let Some(doc) = vals.first() else { return false };
        let Ok(mut value) = serde_json::from_slice::<Value>(doc) else {
            return false;
        };
        for step in path.trim().split('.') {
            value = value.get(step).cloned().unwrap_or(Value::Null);
        }
        if value == expected {
            return true;
        }
    }
    false
}
