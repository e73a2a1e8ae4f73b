//! Container pools: the engine never constructs containers directly.

use std::sync::Arc;

use brook_common::{EngineConfig, Result};

use crate::chunks::Chunks;
use crate::heap::SpillHeap;
use crate::map::SpillMap;

/// An `(alloc, recycle)` pair for one container kind. `alloc` may fail;
/// `recycle` accepts the container back and decides between reuse and drop.
pub struct Pool<T> {
    /// Produce a ready-to-use container.
    pub alloc: Arc<dyn Fn() -> Result<T> + Send + Sync>,
    /// Return a container after use.
    pub recycle: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            alloc: Arc::clone(&self.alloc),
            recycle: Arc::clone(&self.recycle),
        }
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").finish_non_exhaustive()
    }
}

/// The three pools every execution context carries.
#[derive(Debug, Clone)]
pub struct Pools {
    /// Byte-keyed maps.
    pub map: Pool<SpillMap>,
    /// Byte heaps.
    pub heap: Pool<SpillHeap>,
    /// Chunked byte arenas.
    pub chunks: Pool<Chunks>,
}

impl Pools {
    /// Pools that allocate fresh containers from the engine configuration
    /// and drop them on recycle. Callers wanting reuse supply their own
    /// closures.
    pub fn direct(cfg: &EngineConfig) -> Pools {
        let map_cfg = cfg.clone();
        let heap_cfg = cfg.clone();
        let chunks_cfg = cfg.clone();
        Pools {
            map: Pool {
                alloc: Arc::new(move || {
                    Ok(SpillMap::new(Chunks::new(
                        &map_cfg.temp_dir,
                        "map",
                        map_cfg.spill_chunk_bytes,
                    )))
                }),
                recycle: Arc::new(drop),
            },
            heap: Pool {
                alloc: Arc::new(move || {
                    Ok(SpillHeap::new(Chunks::new(
                        &heap_cfg.temp_dir,
                        "heap",
                        heap_cfg.spill_chunk_bytes,
                    )))
                }),
                recycle: Arc::new(drop),
            },
            chunks: Pool {
                alloc: Arc::new(move || {
                    Ok(Chunks::new(
                        &chunks_cfg.temp_dir,
                        "chunks",
                        chunks_cfg.spill_chunk_bytes,
                    ))
                }),
                recycle: Arc::new(drop),
            },
        }
    }
}

/// RAII guard tying a pooled container to a scope: on drop, the container
/// goes back through the pool's recycle closure, covering error exits.
pub struct Pooled<T> {
    pool: Pool<T>,
    inner: Option<T>,
}

impl<T> Pooled<T> {
    /// Allocate from the pool.
    pub fn alloc(pool: &Pool<T>) -> Result<Self> {
        Ok(Self {
            pool: pool.clone(),
            inner: Some((pool.alloc)()?),
        })
    }

    /// Detach the container from the guard; the caller now owns its return.
    pub fn take(mut self) -> T {
        self.inner.take().expect("pooled container already taken")
    }
}

impl<T> std::ops::Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner.as_ref().expect("pooled container already taken")
    }
}

impl<T> std::ops::DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner.as_mut().expect("pooled container already taken")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(container) = self.inner.take() {
            (self.pool.recycle)(container);
        }
    }
}
