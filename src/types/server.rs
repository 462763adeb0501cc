use std::collections::HashMap;

use bytes::Bytes;

use super::connection::{ConnId, ConnectionState};
use super::function::Function;
use super::job::{FunctionName, Job, JobHandle, Unique};

/// Per-function, per-unique coalescing index.
pub type UniqueKey = (FunctionName, Unique);

/// Process-wide job-dispatch state. Owned exclusively by
/// the dispatcher task — see `dispatcher::Dispatcher` — so every field
/// here can be a plain (non-atomic, non-locked) collection.
pub struct Server {
    pub host_id: String,
    pub functions: HashMap<FunctionName, Function>,
    pub jobs: HashMap<JobHandle, Job>,
    pub unique_index: HashMap<UniqueKey, JobHandle>,
    pub connections: HashMap<ConnId, ConnectionState>,

    handle_counter: u64,
    unique_counter: u64,

    pub draining: bool,
    pub started: std::time::Instant,

    /// Command counters for the `status`/admin surface, named to
    /// match the gearman admin protocol's own `cmd-*` families.
    pub stats: ServerStats,
}

#[derive(Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub cmd_submit_job: u64,
    pub cmd_get_status: u64,
}

impl Server {
    pub fn new(host_id: String) -> Self {
        Self {
            host_id,
            functions: HashMap::new(),
            jobs: HashMap::new(),
            unique_index: HashMap::new(),
            connections: HashMap::new(),
            handle_counter: 0,
            unique_counter: 0,
            draining: false,
            started: std::time::Instant::now(),
            stats: ServerStats::default(),
        }
    }

    pub fn function_mut(&mut self, name: &FunctionName) -> &mut Function {
        self.functions
            .entry(name.clone())
            .or_insert_with(|| Function::new(name.clone()))
    }

    /// Allocates a fresh, process-unique job handle.
    pub fn next_handle(&mut self) -> JobHandle {
        self.handle_counter += 1;
        JobHandle::from(format!("H:{}:{}", self.host_id, self.handle_counter))
    }

    /// Synthesizes a fresh unique key when the client didn't supply one.
    /// Not a cryptographic UUID — just a mixer over a monotonic counter
    /// and the current time, which is all the coalescing-key contract
    /// needs: it must not collide with another live unique for this
    /// function.
    pub fn synthesize_unique(&mut self) -> Bytes {
        self.unique_counter += 1;
        let t = crate::time::unix_epoch_secs();
        let mut x = self
            .unique_counter
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(t);
        // SplitMix64 finalizer.
        x ^= x >> 30;
        x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^= x >> 31;
        Bytes::from(format!("{x:016x}"))
    }
}
