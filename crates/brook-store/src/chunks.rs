//! Append-only chunked byte arena with optional disk spill.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use brook_common::Result;
use tracing::debug;

static NEXT_SPILL_ID: AtomicU64 = AtomicU64::new(1);

/// Append-only byte arena. Every append returns a stable byte offset; once
/// the in-memory tail exceeds the configured chunk size it is flushed to a
/// spill file, so only the tail is resident.
#[derive(Debug)]
pub struct Chunks {
    dir: PathBuf,
    suffix: String,
    chunk_bytes: usize,

    tail: Vec<u8>,
    tail_base: u64,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl Chunks {
    /// A new arena spilling under `dir` with files named `<counter>.<suffix>`.
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>, chunk_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            chunk_bytes: chunk_bytes.max(1),
            tail: Vec::new(),
            tail_base: 0,
            file: None,
            path: None,
        }
    }

    /// Total bytes appended since the last reset.
    pub fn len(&self) -> u64 {
        self.tail_base + self.tail.len() as u64
    }

    /// Whether nothing has been appended since the last reset.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held in memory.
    pub fn bytes_in_memory(&self) -> usize {
        self.tail.len()
    }

    /// Whether any bytes have gone to disk since the last reset.
    pub fn spilled(&self) -> bool {
        self.tail_base > 0
    }

    /// Append bytes, returning the stable offset of the first byte.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len();
        self.tail.extend_from_slice(bytes);
        if self.tail.len() >= self.chunk_bytes {
            self.flush_tail()?;
        }
        Ok(offset)
    }

    /// Read `len` bytes starting at `offset` into `out` (cleared first).
    pub fn read_into(&mut self, offset: u64, len: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.reserve(len);
        let mut offset = offset;
        let mut remaining = len;
        if offset < self.tail_base {
            let from_file = remaining.min((self.tail_base - offset) as usize);
            let file = self.file.as_mut().ok_or_else(|| {
                brook_common::BrookError::Execution("chunks spill file missing".to_string())
            })?;
            file.seek(SeekFrom::Start(offset))?;
            let start = out.len();
            out.resize(start + from_file, 0);
            file.read_exact(&mut out[start..])?;
            offset += from_file as u64;
            remaining -= from_file;
        }
        if remaining > 0 {
            let start = (offset - self.tail_base) as usize;
            let end = start + remaining;
            if end > self.tail.len() {
                return Err(brook_common::BrookError::Execution(format!(
                    "chunks read past end: offset {offset} len {remaining}"
                )));
            }
            out.extend_from_slice(&self.tail[start..end]);
        }
        Ok(())
    }

    /// Truncate to empty for reuse. The spill file, if any, stays open and
    /// is truncated with the arena.
    pub fn reset(&mut self) -> Result<()> {
        self.tail.clear();
        self.tail_base = 0;
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?;
        }
        Ok(())
    }

    fn flush_tail(&mut self) -> Result<()> {
        if self.tail.is_empty() {
            return Ok(());
        }
        if self.file.is_none() {
            fs::create_dir_all(&self.dir)?;
            let id = NEXT_SPILL_ID.fetch_add(1, AtomicOrdering::Relaxed);
            let path = self.dir.join(format!("{id}.{}", self.suffix));
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .read(true)
                .write(true)
                .open(&path)?;
            debug!(path = %path.display(), "chunks spill file opened");
            self.file = Some(file);
            self.path = Some(path);
        }
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(self.tail_base))?;
            file.write_all(&self.tail)?;
        }
        debug!(
            bytes = self.tail.len(),
            base = self.tail_base,
            "chunks tail spilled"
        );
        self.tail_base += self.tail.len() as u64;
        self.tail.clear();
        Ok(())
    }
}

impl Drop for Chunks {
    fn drop(&mut self) {
        self.file.take();
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}
