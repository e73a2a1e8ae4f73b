//! Side state shared between the window operators through temp slots.
//!
//! `window-partition` buffers the current partition's rows (with rank
//! counters) into its slot; `window-frames` computes the current row's frame
//! descriptors into another slot; frame-derived projection expressions read
//! both by slot index.

use brook_common::{BrookError, Result};
use brook_store::Chunks;
use brook_value::{kind, vals};

/// Which per-row counter the partition decorates its output tuples with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// No tracking column.
    None,
    /// 1-based position within the partition.
    RowNumber,
    /// Rank with gaps (ties share, next rank skips).
    Rank,
    /// Rank without gaps.
    DenseRank,
}

impl Tracking {
    /// Parse the plan parameter (`""` means none).
    pub fn parse(s: &str) -> Result<Tracking> {
        match s {
            "" => Ok(Tracking::None),
            "rowNumber" => Ok(Tracking::RowNumber),
            "rank" => Ok(Tracking::Rank),
            "denseRank" => Ok(Tracking::DenseRank),
            other => Err(BrookError::Plan(format!(
                "unknown window tracking kind: {other:?}"
            ))),
        }
    }
}

/// Location and rank counters of one buffered partition row.
#[derive(Debug, Clone, Copy)]
pub struct RowMeta {
    offset: u64,
    len: u32,
    /// Rank with gaps at this row.
    pub rank: u64,
    /// Dense rank at this row.
    pub dense_rank: u64,
}

/// Buffered rows and counters for the partition currently streaming through.
pub struct WindowPartition {
    chunks: Chunks,
    rows: Vec<RowMeta>,
    /// Row index being replayed downstream.
    pub cur: usize,
    /// Tracking column appended to buffered rows.
    pub tracking: Tracking,
    part_key: Vec<u8>,
    rank_key: Vec<u8>,
}

impl WindowPartition {
    /// Fresh state backed by a pooled arena.
    pub fn new(chunks: Chunks, tracking: Tracking) -> Self {
        Self {
            chunks,
            rows: Vec::new(),
            cur: 0,
            tracking,
            part_key: Vec::new(),
            rank_key: Vec::new(),
        }
    }

    /// Give the arena back for recycling.
    pub fn into_chunks(self) -> Chunks {
        self.chunks
    }

    /// Buffered row count.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the partition holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether an incoming row with this partition key starts a new
    /// partition.
    pub fn is_boundary(&self, part_key: &[u8]) -> bool {
        !self.rows.is_empty() && self.part_key != part_key
    }

    /// Reset for a new partition keyed by `part_key`.
    pub fn start_partition(&mut self, part_key: &[u8]) -> Result<()> {
        self.rows.clear();
        self.cur = 0;
        self.part_key.clear();
        self.part_key.extend_from_slice(part_key);
        self.rank_key.clear();
        self.chunks.reset()
    }

    /// Rank counters the next row would get, given its full (partition +
    /// order) key: ties repeat the previous counters, a new key advances
    /// them.
    pub fn next_counters(&self, full_key: &[u8]) -> (u64, u64) {
        match self.rows.last() {
            None => (1, 1),
            Some(last) if full_key == self.rank_key => (last.rank, last.dense_rank),
            Some(last) => (self.rows.len() as u64 + 1, last.dense_rank + 1),
        }
    }

    /// Buffer one encoded row with its counters.
    pub fn push_row(&mut self, full_key: &[u8], row: &[u8], rank: u64, dense_rank: u64) -> Result<()> {
        let offset = self.chunks.append(row)?;
        self.rows.push(RowMeta {
            offset,
            len: row.len() as u32,
            rank,
            dense_rank,
        });
        self.rank_key.clear();
        self.rank_key.extend_from_slice(full_key);
        Ok(())
    }

    /// Counters of a buffered row.
    pub fn meta(&self, row: usize) -> Result<RowMeta> {
        self.rows.get(row).copied().ok_or_else(|| {
            BrookError::Execution(format!("window partition row {row} out of range"))
        })
    }

    /// Read a buffered row's encoded tuple into `out`.
    pub fn read_row(&mut self, row: usize, out: &mut Vec<u8>) -> Result<()> {
        let meta = self.meta(row)?;
        self.chunks.read_into(meta.offset, meta.len as usize, out)
    }

    /// A buffered row's value at `val_idx`, parsed as a double. Missing and
    /// non-numeric values order first.
    pub fn f64_at(&mut self, row: usize, val_idx: usize, scratch: &mut Vec<u8>) -> Result<f64> {
        self.read_row(row, scratch)?;
        let fields = vals::decode_vals(scratch)?;
        let field = fields.get(val_idx).copied().unwrap_or(b"");
        Ok(kind::parse_f64(field).unwrap_or(f64::NEG_INFINITY))
    }
}

impl std::fmt::Debug for WindowPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowPartition")
            .field("rows", &self.rows.len())
            .field("cur", &self.cur)
            .field("tracking", &self.tracking)
            .finish_non_exhaustive()
    }
}

/// Frame exclusion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclude {
    /// Keep every frame row, current included.
    NoOthers,
    /// Exclude the current row.
    CurrentRow,
    /// Exclude the current row's whole peer group.
    Group,
    /// Exclude peers but keep the current row.
    Ties,
}

impl Exclude {
    /// Parse the plan parameter.
    pub fn parse(s: &str) -> Result<Exclude> {
        match s {
            "no-others" => Ok(Exclude::NoOthers),
            "current-row" => Ok(Exclude::CurrentRow),
            "group" => Ok(Exclude::Group),
            "ties" => Ok(Exclude::Ties),
            other => Err(BrookError::Plan(format!(
                "unknown frame exclusion: {other:?}"
            ))),
        }
    }
}

/// One frame's extent for the current row, in partition row indexes.
/// `begin..end` is the frame; `peer_begin..peer_end` is the current row's
/// peer group (used by `group`/`ties` exclusion).
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    /// First frame row.
    pub begin: usize,
    /// One past the last frame row.
    pub end: usize,
    /// The current row.
    pub cur: usize,
    /// Exclusion mode.
    pub exclude: Exclude,
    /// First row of the current peer group.
    pub peer_begin: usize,
    /// One past the last row of the current peer group.
    pub peer_end: usize,
}

impl FrameState {
    /// Whether the frame row at `pos` is excluded.
    pub fn excluded(&self, pos: usize) -> bool {
        match self.exclude {
            Exclude::NoOthers => false,
            Exclude::CurrentRow => pos == self.cur,
            Exclude::Group => self.peer_begin <= pos && pos < self.peer_end,
            Exclude::Ties => self.peer_begin <= pos && pos < self.peer_end && pos != self.cur,
        }
    }

    /// Count of non-excluded rows in the frame.
    pub fn count(&self) -> u64 {
        let total = self.end.saturating_sub(self.begin);
        let cur_in_frame = self.begin <= self.cur && self.cur < self.end;
        let peer_overlap = self.peer_end.min(self.end).saturating_sub(self.peer_begin.max(self.begin));
        let excluded = match self.exclude {
            Exclude::NoOthers => 0,
            Exclude::CurrentRow => usize::from(cur_in_frame),
            Exclude::Group => peer_overlap,
            Exclude::Ties => peer_overlap.saturating_sub(usize::from(cur_in_frame)),
        };
        (total - excluded) as u64
    }

    /// Walk the frame from an edge or the current row: `start` is `-1`
    /// (before the frame), `1` (after it), or `0` (the current row); each of
    /// the `steps` moves lands on the next non-excluded row in the walk
    /// direction. Returns the landed row, or `None` when the walk leaves the
    /// frame.
    pub fn step(&self, start: i64, ascending: bool, steps: u64) -> Option<usize> {
        let begin = self.begin as i64;
        let end = self.end as i64;
        let mut pos = match start {
            -1 => begin - 1,
            1 => end,
            _ => self.cur as i64,
        };
        let delta = if ascending { 1 } else { -1 };
        for _ in 0..steps {
            loop {
                pos += delta;
                if pos < begin || pos >= end {
                    return None;
                }
                if !self.excluded(pos as usize) {
                    break;
                }
            }
        }
        if pos < begin || pos >= end {
            None
        } else {
            Some(pos as usize)
        }
    }
}

/// The current row's frames, plus where the partition state lives.
#[derive(Debug, Clone)]
pub struct WindowFrames {
    /// Slot index of the owning partition state.
    pub partition_slot: usize,
    /// One state per configured frame.
    pub frames: Vec<FrameState>,
}
