//! Plan types: a rooted tree of operator nodes.
//!
//! Plans are plain serde data produced by an upstream planner. Operator
//! parameters stay polymorphic (`serde_json::Value`): sub-expressions are
//! JSON arrays, slot references are integers, scan sources are strings.
//! The typed accessors here turn shape mismatches into
//! [`brook_common::BrookError::Plan`] errors at compile time rather than
//! panics mid-stream.

use brook_common::{BrookError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of an operator tree. Trees are immutable during execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpNode {
    /// Operator kind tag, e.g. `"scan"`, `"joinHash-leftOuter"`.
    pub kind: String,
    /// Output labels, one per tuple position this operator emits.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Polymorphic parameters; shapes are per-kind.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Child operators.
    #[serde(default)]
    pub children: Vec<OpNode>,
}

impl OpNode {
    /// The only child of a single-input operator.
    pub fn child(&self) -> Result<&OpNode> {
        self.children.first().ok_or_else(|| {
            BrookError::Plan(format!("operator {:?} requires a child", self.kind))
        })
    }

    /// Both children of a two-input operator.
    pub fn child_pair(&self) -> Result<(&OpNode, &OpNode)> {
        match self.children.as_slice() {
            [a, b, ..] => Ok((a, b)),
            _ => Err(BrookError::Plan(format!(
                "operator {:?} requires two children",
                self.kind
            ))),
        }
    }

    /// Parameter at `idx`, required to exist.
    pub fn param(&self, idx: usize) -> Result<&Value> {
        self.params.get(idx).ok_or_else(|| {
            BrookError::Plan(format!(
                "operator {:?} missing parameter {idx}",
                self.kind
            ))
        })
    }

    /// Parameter at `idx` when present and non-null.
    pub fn param_opt(&self, idx: usize) -> Option<&Value> {
        self.params.get(idx).filter(|v| !v.is_null())
    }

    /// String parameter at `idx`.
    pub fn param_str(&self, idx: usize) -> Result<&str> {
        self.param(idx)?.as_str().ok_or_else(|| {
            BrookError::Plan(format!(
                "operator {:?} parameter {idx} must be a string",
                self.kind
            ))
        })
    }

    /// Array parameter at `idx`.
    pub fn param_array(&self, idx: usize) -> Result<&[Value]> {
        self.param(idx)?.as_array().map(Vec::as_slice).ok_or_else(|| {
            BrookError::Plan(format!(
                "operator {:?} parameter {idx} must be an array",
                self.kind
            ))
        })
    }

    /// Unsigned integer parameter at `idx` (slot indexes, counts).
    pub fn param_u64(&self, idx: usize) -> Result<u64> {
        self.param(idx)?.as_u64().ok_or_else(|| {
            BrookError::Plan(format!(
                "operator {:?} parameter {idx} must be a non-negative integer",
                self.kind
            ))
        })
    }

    /// Optional non-negative integer parameter (offsets, limits); `None`
    /// when absent or null.
    pub fn param_u64_opt(&self, idx: usize) -> Result<Option<u64>> {
        match self.param_opt(idx) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                BrookError::Plan(format!(
                    "operator {:?} parameter {idx} must be a non-negative integer",
                    self.kind
                ))
            }),
        }
    }

    /// Position of a label in this operator's output, if present.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Shape helpers for values nested inside parameters.
pub mod shape {
    use super::*;

    /// Require an array.
    pub fn as_array<'v>(v: &'v Value, what: &str) -> Result<&'v [Value]> {
        v.as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| BrookError::Plan(format!("{what} must be an array, got {v}")))
    }

    /// Require a string.
    pub fn as_str<'a>(v: &'a Value, what: &str) -> Result<&'a str> {
        v.as_str()
            .ok_or_else(|| BrookError::Plan(format!("{what} must be a string, got {v}")))
    }

    /// Require a signed integer.
    pub fn as_i64(v: &Value, what: &str) -> Result<i64> {
        v.as_i64()
            .ok_or_else(|| BrookError::Plan(format!("{what} must be an integer, got {v}")))
    }

    /// Require a number usable as a frame bound.
    pub fn as_f64(v: &Value, what: &str) -> Result<f64> {
        v.as_f64()
            .ok_or_else(|| BrookError::Plan(format!("{what} must be a number, got {v}")))
    }

    /// Require a boolean.
    pub fn as_bool(v: &Value, what: &str) -> Result<bool> {
        v.as_bool()
            .ok_or_else(|| BrookError::Plan(format!("{what} must be a boolean, got {v}")))
    }
}
