//! Append-only, file-backed [`PersistentQueue`]. Every call appends a
//! record; nothing is ever rewritten in place, so `add`/`done` cost one
//! `write` each and `replay` pays the cost of reconstructing live state
//! from the full log. A real deployment would compact this or swap in a
//! database-backed implementation of the same trait.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{PersistentQueue, RecoveredJob};
use crate::types::job::{FunctionName, JobHandle, Priority, Unique};

const TAG_ADD: u8 = 1;
const TAG_DONE: u8 = 2;

/// Guards the single append-only file handle; all operations serialize
/// through it since the log's correctness depends on append order.
pub struct FileQueue {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileQueue {
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    fn encode_add(
        handle: &JobHandle,
        function: &FunctionName,
        unique: &Unique,
        data: &Bytes,
        priority: Priority,
        when: Option<u64>,
    ) -> BytesMut {
        let handle = handle.as_bytes();
        let mut buf = BytesMut::with_capacity(
            1 + 1 + 1 + 9 + 4 + handle.len() + 4 + function.len() + 4 + unique.len() + 4
                + data.len(),
        );
        buf.put_u8(TAG_ADD);
        buf.put_u8(priority.index() as u8);
        buf.put_u8(when.is_some() as u8);
        buf.put_u64(when.unwrap_or(0));
        buf.put_u32(handle.len() as u32);
        buf.put_slice(handle);
        buf.put_u32(function.len() as u32);
        buf.put_slice(function);
        buf.put_u32(unique.len() as u32);
        buf.put_slice(unique);
        buf.put_u32(data.len() as u32);
        buf.put_slice(data);
        buf
    }

    fn encode_done(handle: &JobHandle) -> BytesMut {
        let handle = handle.as_bytes();
        let mut buf = BytesMut::with_capacity(1 + 4 + handle.len());
        buf.put_u8(TAG_DONE);
        buf.put_u32(handle.len() as u32);
        buf.put_slice(handle);
        buf
    }
}

fn priority_from_index(i: u8) -> Priority {
    match i {
        0 => Priority::High,
        2 => Priority::Low,
        _ => Priority::Normal,
    }
}

#[async_trait]
impl PersistentQueue for FileQueue {
    async fn add(
        &self,
        handle: &JobHandle,
        function: &FunctionName,
        unique: &Unique,
        data: &Bytes,
        priority: Priority,
        when: Option<u64>,
    ) -> anyhow::Result<()> {
        let buf = Self::encode_add(handle, function, unique, data, priority, when);
        let mut file = self.file.lock().await;
        file.write_all(&buf).await?;
        Ok(())
    }

    async fn done(&self, handle: &JobHandle) -> anyhow::Result<()> {
        let buf = Self::encode_done(handle);
        let mut file = self.file.lock().await;
        file.write_all(&buf).await?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn replay(&self) -> anyhow::Result<Vec<RecoveredJob>> {
        let raw = tokio::fs::read(&self.path).await?;
        let mut buf = Bytes::from(raw);
        let mut live: HashMap<String, RecoveredJob> = HashMap::new();

        while buf.has_remaining() {
            let tag = buf.get_u8();
            match tag {
                TAG_ADD => {
                    let priority = priority_from_index(buf.get_u8());
                    let has_when = buf.get_u8() != 0;
                    let when_raw = buf.get_u64();
                    let when = has_when.then_some(when_raw);

                    let hlen = buf.get_u32() as usize;
                    let handle = buf.split_to(hlen);
                    let flen = buf.get_u32() as usize;
                    let function = buf.split_to(flen);
                    let ulen = buf.get_u32() as usize;
                    let unique = buf.split_to(ulen);
                    let dlen = buf.get_u32() as usize;
                    let data = buf.split_to(dlen);

                    let handle_str = String::from_utf8_lossy(&handle).into_owned();
                    live.insert(
                        handle_str,
                        RecoveredJob {
                            handle: JobHandle::from(String::from_utf8_lossy(&handle).into_owned()),
                            function,
                            unique,
                            data,
                            priority,
                            when,
                        },
                    );
                },
                TAG_DONE => {
                    let hlen = buf.get_u32() as usize;
                    let handle = buf.split_to(hlen);
                    let handle_str = String::from_utf8_lossy(&handle).into_owned();
                    live.remove(&handle_str);
                },
                other => {
                    anyhow::bail!("corrupt persistence log: unknown record tag {other}");
                },
            }
        }

        Ok(live.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gearman-rs-test-{}-{name}.log", std::process::id()))
    }

    #[tokio::test]
    async fn replay_reconstructs_jobs_without_a_done_record() {
        let path = scratch_path("replay");
        let _ = tokio::fs::remove_file(&path).await;
        let queue = FileQueue::open(path.clone()).await.unwrap();

        for i in 0..100 {
            let handle = JobHandle::from(format!("H:host:{i}"));
            queue
                .add(
                    &handle,
                    &Bytes::from_static(b"f"),
                    &Bytes::from(format!("u{i}")),
                    &Bytes::from_static(b"payload"),
                    Priority::Normal,
                    None,
                )
                .await
                .unwrap();
        }
        // One of the hundred finishes before the crash; it must not
        // reappear on replay.
        queue.done(&JobHandle::from("H:host:0".to_string())).await.unwrap();

        let recovered = queue.replay().await.unwrap();
        assert_eq!(recovered.len(), 99);
        assert!(!recovered.iter().any(|j| &*j.handle == "H:host:0"));
        assert!(recovered.iter().any(|j| &*j.handle == "H:host:42"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn replay_preserves_delayed_when() {
        let path = scratch_path("delayed");
        let _ = tokio::fs::remove_file(&path).await;
        let queue = FileQueue::open(path.clone()).await.unwrap();

        let handle = JobHandle::from("H:host:1".to_string());
        queue
            .add(&handle, &Bytes::from_static(b"f"), &Bytes::from_static(b"u"), &Bytes::from_static(b"p"), Priority::High, Some(4_102_444_800))
            .await
            .unwrap();

        let recovered = queue.replay().await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].when, Some(4_102_444_800));
        assert_eq!(recovered[0].priority, Priority::High);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
