//! Spill-capable containers for blocking operators.
//!
//! Three container kinds, all keyed by or holding raw bytes:
//! - [`Chunks`]: append-only byte arena with stable offsets
//! - [`SpillMap`]: byte-keyed map with per-entry list chains, counters, and
//!   a matched flag
//! - [`SpillHeap`]: byte items under a caller-supplied ordering
//!
//! Containers are obtained through [`Pools`] rather than constructed by
//! operators, and every acquired container must go back to its pool on every
//! exit path. Spill files live under the engine temp dir and are deleted
//! best-effort when a container drops.

pub mod chunks;
pub mod heap;
pub mod map;
pub mod pool;

pub use chunks::Chunks;
pub use heap::{LessFn, SpillHeap};
pub use map::{MapEntry, SpillMap};
pub use pool::{Pool, Pooled, Pools};
