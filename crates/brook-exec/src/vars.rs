//! Per-request runtime context: the immutable [`Ctx`] shared across a
//! request and the mutable [`Vars`] record handed down the operator tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use brook_common::{BrookError, EngineConfig, Result, YieldStats};
use brook_plan::OpNode;
use brook_store::{Chunks, Pools};
use brook_value::ValComparer;

use crate::aggs::{self, Aggregator};
use crate::window_state::{WindowFrames, WindowPartition};

/// Downstream tuple sink. Yielded slices are valid only for the duration of
/// the call; consumers that buffer must copy.
pub type Emit<'a> = dyn FnMut(&[&[u8]]) -> Result<()> + 'a;

/// Evaluator for planner-opaque `exprStr` expressions: `(vars, tuple,
/// expression text) -> value bytes`.
pub type ExprCatalogFn = dyn Fn(&Vars, &[&[u8]], &str) -> Result<Vec<u8>> + Send + Sync;

/// Dispatch hook for operator kinds the core does not recognize
/// (datastore scans, fetches, and other host-provided operators).
pub type ExecOpExFn = dyn for<'a> Fn(
        &OpNode,
        &Vars,
        &mut (dyn FnMut(&[&[u8]]) -> Result<()> + 'a),
    ) -> Result<()>
    + Send
    + Sync;

/// Immutable per-request context. Shared by every operator of one request;
/// [`Ctx::branch`] produces a copy safe for another logical thread of
/// control (the comparator is the only non-shareable piece).
pub struct Ctx {
    /// Request timestamp.
    pub now: SystemTime,
    /// Engine configuration (spill dir, budgets, thresholds).
    pub cfg: EngineConfig,
    /// Named evaluators for `exprStr` expressions. Read-only during
    /// execution.
    pub expr_catalog: HashMap<String, Arc<ExprCatalogFn>>,
    /// Named aggregators for group-by. Read-only during execution.
    pub agg_catalog: HashMap<String, Arc<dyn Aggregator>>,
    /// The request's value comparator. Not shareable across branches.
    pub comparer: RefCell<ValComparer>,
    /// Optional periodic statistics sink.
    pub yield_stats: Option<YieldStats>,
    /// Optional external-operator dispatch.
    pub exec_op_ex: Option<Arc<ExecOpExFn>>,
    /// Container pools; the engine never allocates containers directly.
    pub pools: Pools,
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("now", &self.now)
            .field("cfg", &self.cfg)
            .field("expr_catalog", &self.expr_catalog.keys())
            .field("agg_catalog", &self.agg_catalog.keys())
            .finish_non_exhaustive()
    }
}

impl Ctx {
    /// A context with the built-in aggregator catalog and direct pools.
    pub fn new(cfg: EngineConfig) -> Self {
        let pools = Pools::direct(&cfg);
        Self {
            now: SystemTime::now(),
            cfg,
            expr_catalog: HashMap::new(),
            agg_catalog: aggs::builtin_catalog(),
            comparer: RefCell::new(ValComparer::new()),
            yield_stats: None,
            exec_op_ex: None,
            pools,
        }
    }

    /// Install the external-operator dispatch hook.
    pub fn set_exec_op_ex(
        &mut self,
        hook: impl for<'a> Fn(
                &OpNode,
                &Vars,
                &mut (dyn FnMut(&[&[u8]]) -> Result<()> + 'a),
            ) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) {
        self.exec_op_ex = Some(Arc::new(hook));
    }

    /// Register a named `exprStr` evaluator.
    pub fn register_expr_eval(
        &mut self,
        name: impl Into<String>,
        eval: impl Fn(&Vars, &[&[u8]], &str) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.expr_catalog.insert(name.into(), Arc::new(eval));
    }

    /// A copy safe for another logical thread of control: everything is
    /// shared except the comparator, which is rebuilt.
    pub fn branch(&self) -> Self {
        Self {
            now: self.now,
            cfg: self.cfg.clone(),
            expr_catalog: self.expr_catalog.clone(),
            agg_catalog: self.agg_catalog.clone(),
            comparer: RefCell::new(self.comparer.borrow().fresh()),
            yield_stats: self.yield_stats.clone(),
            exec_op_ex: self.exec_op_ex.clone(),
            pools: self.pools.clone(),
        }
    }
}

/// One mutable side-state slot. Cooperating operators reference slots by
/// small integers instead of holding pointers to each other.
pub enum TempSlot {
    /// Nothing stored.
    Empty,
    /// A plain captured value (e.g. evaluated join keys from a host).
    Val(Vec<u8>),
    /// Rows captured by `temp-capture` for later replay.
    Rows(CapturedRows),
    /// Window partition state.
    Partition(WindowPartition),
    /// Window frame state for the current row.
    Frames(WindowFrames),
}

/// Rows captured into a pooled arena, replayable by `temp-yield`.
pub struct CapturedRows {
    /// Encoded tuples.
    pub chunks: Chunks,
    /// Per-row `(offset, len)` into `chunks`.
    pub rows: Vec<(u64, u32)>,
}

/// Per-request mutable record: the context plus a slot table, chainable for
/// lexical shadowing during sub-plans.
pub struct Vars {
    ctx: Arc<Ctx>,
    temps: RefCell<Vec<TempSlot>>,
    next: Option<Arc<Vars>>,
}

impl Vars {
    /// A root record over the given context.
    pub fn new(ctx: Arc<Ctx>) -> Self {
        Self {
            ctx,
            temps: RefCell::new(Vec::new()),
            next: None,
        }
    }

    /// Convenience constructor from a configuration.
    pub fn from_config(cfg: EngineConfig) -> Self {
        Self::new(Arc::new(Ctx::new(cfg)))
    }

    /// The request context.
    pub fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    /// A child record shadowing `parent`: fresh slots, a branch-safe
    /// context, and reads falling through to the parent chain.
    pub fn chain_extend(parent: &Arc<Vars>) -> Vars {
        Vars {
            ctx: Arc::new(parent.ctx.branch()),
            temps: RefCell::new(Vec::new()),
            next: Some(Arc::clone(parent)),
        }
    }

    /// Store into a local slot, recycling whatever the slot held.
    pub fn set_slot(&self, idx: usize, slot: TempSlot) {
        let prev = {
            let mut temps = self.temps.borrow_mut();
            if temps.len() <= idx {
                temps.resize_with(idx + 1, || TempSlot::Empty);
            }
            std::mem::replace(&mut temps[idx], slot)
        };
        self.recycle_contents(prev);
    }

    /// Store a plain value into a local slot.
    pub fn set_var(&self, idx: usize, val: Vec<u8>) {
        self.set_slot(idx, TempSlot::Val(val));
    }

    /// Clear a local slot, recycling its contents.
    pub fn clear_slot(&self, idx: usize) {
        let prev = {
            let mut temps = self.temps.borrow_mut();
            if idx < temps.len() {
                std::mem::replace(&mut temps[idx], TempSlot::Empty)
            } else {
                TempSlot::Empty
            }
        };
        self.recycle_contents(prev);
    }

    /// Run `f` over the slot, resolving through the shadowing chain: a
    /// non-empty local slot wins, then the nearest ancestor's, and an empty
    /// local slot is created otherwise. The borrow lasts only for `f`; `f`
    /// must not re-enter slot access on the same record.
    pub fn with_slot_mut<R>(
        &self,
        idx: usize,
        f: impl FnOnce(&mut TempSlot) -> Result<R>,
    ) -> Result<R> {
        {
            let mut temps = self.temps.borrow_mut();
            if idx < temps.len() && !matches!(temps[idx], TempSlot::Empty) {
                return f(&mut temps[idx]);
            }
        }
        if let Some(parent) = &self.next {
            if parent.slot_occupied(idx) {
                return parent.with_slot_mut(idx, f);
            }
        }
        let mut temps = self.temps.borrow_mut();
        if temps.len() <= idx {
            temps.resize_with(idx + 1, || TempSlot::Empty);
        }
        f(&mut temps[idx])
    }

    /// Clone of the slot's window-frame state.
    pub fn frames_snapshot(&self, idx: usize) -> Result<WindowFrames> {
        self.with_slot_mut(idx, |slot| match slot {
            TempSlot::Frames(frames) => Ok(frames.clone()),
            _ => Err(BrookError::Execution(format!(
                "temp slot {idx} does not hold window frames"
            ))),
        })
    }

    fn slot_occupied(&self, idx: usize) -> bool {
        {
            let temps = self.temps.borrow();
            if idx < temps.len() && !matches!(temps[idx], TempSlot::Empty) {
                return true;
            }
        }
        match &self.next {
            Some(parent) => parent.slot_occupied(idx),
            None => false,
        }
    }

    fn recycle_contents(&self, slot: TempSlot) {
        match slot {
            TempSlot::Rows(captured) => (self.ctx.pools.chunks.recycle)(captured.chunks),
            TempSlot::Partition(partition) => {
                (self.ctx.pools.chunks.recycle)(partition.into_chunks())
            }
            TempSlot::Empty | TempSlot::Val(_) | TempSlot::Frames(_) => {}
        }
    }
}

impl Drop for Vars {
    fn drop(&mut self) {
        let slots: Vec<TempSlot> = self.temps.get_mut().drain(..).collect();
        for slot in slots {
            self.recycle_contents(slot);
        }
    }
}

/// Clears one slot when dropped, so operators release slot-held containers
/// on every exit path.
pub struct SlotGuard<'a> {
    vars: &'a Vars,
    idx: usize,
}

impl<'a> SlotGuard<'a> {
    /// Guard the given local slot.
    pub fn new(vars: &'a Vars, idx: usize) -> Self {
        Self { vars, idx }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.vars.clear_slot(self.idx);
    }
}

/// Downcast helper: the slot must hold window-partition state.
pub fn as_partition<'s>(slot: &'s mut TempSlot, idx: usize) -> Result<&'s mut WindowPartition> {
    match slot {
        TempSlot::Partition(partition) => Ok(partition),
        _ => Err(BrookError::Execution(format!(
            "temp slot {idx} does not hold a window partition"
        ))),
    }
}
