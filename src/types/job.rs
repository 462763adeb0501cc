use std::sync::Arc;

use bytes::Bytes;
use tokio::time::Instant;

use super::connection::ConnId;

/// Scheduling priority. `Ord` so that iterating `High, Normal, Low` in
/// declaration order is already "strict HIGH > NORMAL > LOW".
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

/// Server-assigned, ASCII, unique-for-the-lifetime-of-this-process job
/// identifier (`H:<host>:<n>`). Cheap to clone since it's reference
/// counted: the handle is copied into every client's outstanding-job
/// list and the unique-key index.
pub type JobHandle = Arc<str>;

/// A function name, including any namespace prefix. Kept as `Bytes`
/// rather than `String` since Gearman function
/// names are opaque byte strings, not necessarily UTF-8.
pub type FunctionName = Bytes;

/// The coalescing key within a function. Empty means
/// "the client didn't supply one" only transiently during `SUBMIT_JOB`
/// parsing — by the time a [`Job`] exists, a unique has always been
/// synthesized if needed.
pub type Unique = Bytes;

/// Where a job currently lives. Every live job is in exactly one of
/// these states.
#[derive(Debug)]
pub enum JobLocation {
    /// Queued on `function`'s priority FIFO.
    Queued,
    /// Held in the function's delayed set until `when` elapses.
    Delayed { when: Instant },
    /// Assigned to `worker`, currently executing.
    Running {
        worker: ConnId,
        deadline: Option<Instant>,
    },
}

/// Aggregation state for a `SUBMIT_REDUCE_JOB` parent. The mapper
/// worker spawns child jobs (ordinary `SUBMIT_JOB*` calls naming the
/// reducer function); this tracks which of them are still outstanding
/// and the payloads collected so far, in completion order.
#[derive(Debug, Default)]
pub struct ReduceState {
    pub reducer: FunctionName,
    pub outstanding_children: usize,
    pub collected: Vec<Bytes>,
}

#[derive(Debug)]
pub struct Job {
    pub handle: JobHandle,
    pub function: FunctionName,
    pub unique: Unique,
    pub priority: Priority,
    pub data: Bytes,
    pub background: bool,
    pub created: Instant,

    pub location: JobLocation,

    /// `(numerator, denominator)` from the most recent `WORK_STATUS`.
    pub status: (u32, u32),

    /// Clients attached to this job (foreground submitters sharing the
    /// same `(function, unique)` key, or the single submitter of a
    /// non-coalesced job). Empty for background jobs.
    pub clients: Vec<ConnId>,

    /// Set when the last attached client disconnects while the job is
    /// still queued or running: the job is dropped instead of
    /// delivered once it would otherwise complete.
    pub ignore: bool,

    /// Present iff this job is the parent of a `SUBMIT_REDUCE_JOB`.
    pub reduce: Option<ReduceState>,

    /// Present iff this job is itself a reducer child: the parent it
    /// reports its completion to.
    pub reduce_parent: Option<JobHandle>,
}

impl Job {
    pub fn is_running(&self) -> bool {
        matches!(self.location, JobLocation::Running { .. })
    }
}
