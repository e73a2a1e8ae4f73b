use std::sync::Arc;

/// A point-in-time statistics report from one operator phase.
///
/// Reports are advisory: operators emit them periodically (scans) or on
/// phase completion (blocking operators). Consumers must tolerate any
/// interleaving relative to tuple yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Operator phase that produced the report, e.g. `"scan"` or
    /// `"order.merge"`.
    pub phase: &'static str,
    /// Tuples consumed by the phase so far.
    pub rows_in: u64,
    /// Tuples produced by the phase so far.
    pub rows_out: u64,
    /// Bytes produced by the phase so far.
    pub bytes_out: u64,
}

/// Callback invoked with periodic [`ExecStats`] reports.
pub type YieldStats = Arc<dyn Fn(&ExecStats) + Send + Sync>;
