use serde::{Deserialize, Serialize};

/// Engine/session configuration shared by containers and operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory used for container spill files.
    pub temp_dir: String,
    /// Soft in-memory byte budget a single container holds before spilling.
    pub mem_budget_bytes: usize,
    /// Flush size for the chunked byte arena's in-memory tail.
    pub spill_chunk_bytes: usize,
    /// Largest `offset + limit` served by the bounded-heap ordering
    /// strategy; larger requests take the spill-and-merge path.
    pub order_heap_max: usize,
    /// Rows between periodic scan stats reports; `0` disables them.
    #[serde(default)]
    pub stats_interval_rows: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir()
                .join("brook_spill")
                .to_string_lossy()
                .into_owned(),
            mem_budget_bytes: 64 * 1024 * 1024, // 64MB
            spill_chunk_bytes: 4 * 1024 * 1024, // 4MB
            order_heap_max: 8192,
            stats_interval_rows: 0,
        }
    }
}
