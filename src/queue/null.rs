use async_trait::async_trait;
use bytes::Bytes;

use super::{PersistentQueue, RecoveredJob};
use crate::types::job::{FunctionName, JobHandle, Priority, Unique};

/// The default backend: persists nothing. Background jobs and
/// in-flight foreground jobs do not survive a restart.
#[derive(Default)]
pub struct NullQueue;

#[async_trait]
impl PersistentQueue for NullQueue {
    async fn add(
        &self,
        _handle: &JobHandle,
        _function: &FunctionName,
        _unique: &Unique,
        _data: &Bytes,
        _priority: Priority,
        _when: Option<u64>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn done(&self, _handle: &JobHandle) -> anyhow::Result<()> {
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn replay(&self) -> anyhow::Result<Vec<RecoveredJob>> {
        Ok(Vec::new())
    }
}
