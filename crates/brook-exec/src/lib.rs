//! Operator runtime: evaluates a plan tree over streams of JSON-encoded
//! tuples.
//!
//! The pipeline is push-based and single-threaded: the call stack is the
//! pipeline, and a "yield" is a direct callback invocation. Each operator
//! wraps the downstream callback in a closure and recurses into its child.
//! An `Err` from any operator or from the consumer's callback unwinds the
//! whole pipeline; the first error is terminal.
//!
//! Entry point: [`execute`]. Extensibility seams live on [`Ctx`]: the
//! expression catalog (for planner-opaque `exprStr` expressions), the
//! aggregator catalog, and the external-operator dispatch hook for kinds the
//! core does not recognize (datastore scans and fetches).

pub mod aggs;
pub mod expr;
pub mod ops;
pub mod vars;
pub mod window_state;

pub use aggs::Aggregator;
pub use expr::{compile_expr, ExprFunc};
pub use ops::{exec_op, execute};
pub use vars::{Ctx, Emit, ExecOpExFn, ExprCatalogFn, TempSlot, Vars};
