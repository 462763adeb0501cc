//! Persistent-queue adapter: the core sees only this trait.
//! Real deployments would implement it against SQL, Redis, etc.; this
//! crate ships a no-op default and one concrete file-backed
//! implementation so the replay testable property has something to
//! exercise.

mod file;
mod null;

pub use file::FileQueue;
pub use null::NullQueue;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::job::{FunctionName, JobHandle, Priority, Unique};

/// One job as recovered from persistence at startup.
#[derive(Clone, Debug)]
pub struct RecoveredJob {
    pub handle: JobHandle,
    pub function: FunctionName,
    pub unique: Unique,
    pub data: Bytes,
    pub priority: Priority,
    /// Epoch seconds the job becomes ready at; `None` means it was
    /// already ready (or running) when persisted.
    pub when: Option<u64>,
}

#[async_trait]
pub trait PersistentQueue: Send + Sync {
    /// Records a job before `JOB_CREATED` is acknowledged.
    async fn add(
        &self,
        handle: &JobHandle,
        function: &FunctionName,
        unique: &Unique,
        data: &Bytes,
        priority: Priority,
        when: Option<u64>,
    ) -> anyhow::Result<()>;

    /// Removes a job's record on terminal completion/failure, or on
    /// abandonment while still queued.
    async fn done(&self, handle: &JobHandle) -> anyhow::Result<()>;

    /// Flushes any buffered state; called during graceful shutdown.
    async fn flush(&self) -> anyhow::Result<()>;

    /// Called once at startup, before accepting connections, to recover
    /// any jobs left over from a previous run.
    async fn replay(&self) -> anyhow::Result<Vec<RecoveredJob>>;
}
