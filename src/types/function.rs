use std::collections::{BTreeSet, VecDeque};

use tokio::time::Instant;

use super::connection::ConnId;
use super::job::{FunctionName, JobHandle, Priority};

/// Default `max_queue_size` per priority level (0 = unbounded), matching
/// `GEARMAN_DEFAULT_MAX_QUEUE_SIZE`: unbounded by default, operators opt
/// in via the `maxqueue` admin command.
pub const DEFAULT_MAX_QUEUE_SIZE: u32 = 0;

/// One registered function. Created lazily on first reference
/// (`CAN_DO` or any `SUBMIT_JOB*`) and never torn down, since tearing one
/// down would race a concurrent submit for the same name.
pub struct Function {
    pub name: FunctionName,

    /// One FIFO per priority level; `ready[p.index()]` is that
    /// priority's queue, in submission order.
    ready: [VecDeque<JobHandle>; 3],
    /// Per-priority cap; 0 means unbounded.
    pub max_queue_size: [u32; 3],

    /// Jobs scheduled for the future (`SUBMIT_JOB_EPOCH`/`_SCHED`),
    /// ordered by due time then handle so duplicate instants don't
    /// collide (`Instant` ordering is only non-decreasing, not strict).
    pub delayed: BTreeSet<(Instant, JobHandle)>,

    /// Workers currently registered for this function, in registration
    /// order — the grab-job algorithm favors the worker that registered
    /// earliest.
    pub workers: Vec<ConnId>,

    pub job_total: u64,
    pub job_running: u64,
}

impl Function {
    pub fn new(name: FunctionName) -> Self {
        Self {
            name,
            ready: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            max_queue_size: [DEFAULT_MAX_QUEUE_SIZE; 3],
            delayed: BTreeSet::new(),
            workers: Vec::new(),
            job_total: 0,
            job_running: 0,
        }
    }

    pub fn job_count(&self) -> u64 {
        self.ready.iter().map(|q| q.len() as u64).sum::<u64>() + self.job_running
    }

    pub fn is_full(&self, pri: Priority) -> bool {
        let cap = self.max_queue_size[pri.index()];
        cap != 0 && self.ready[pri.index()].len() as u32 >= cap
    }

    pub fn push_ready(&mut self, pri: Priority, handle: JobHandle) {
        self.ready[pri.index()].push_back(handle);
    }

    /// Re-queues a job at the *head* of its priority FIFO, used when a
    /// worker disconnects or times out mid-job: the job should be
    /// the next one handed out, not sent to the back to starve behind
    /// newer submissions.
    pub fn requeue_head(&mut self, pri: Priority, handle: JobHandle) {
        self.ready[pri.index()].push_front(handle);
    }

    /// Pops the next job across priorities, HIGH then NORMAL then LOW.
    pub fn pop_ready(&mut self) -> Option<JobHandle> {
        for pri in Priority::ALL {
            if let Some(h) = self.ready[pri.index()].pop_front() {
                return Some(h);
            }
        }
        None
    }

    /// Removes a specific job from its priority FIFO before it was ever
    /// handed to a worker, e.g. when every client abandons it while
    /// still queued.
    pub fn remove_queued(&mut self, pri: Priority, handle: &JobHandle) {
        self.ready[pri.index()].retain(|h| h != handle);
    }

    pub fn remove_worker(&mut self, conn: ConnId) {
        self.workers.retain(|&c| c != conn);
    }

    pub fn add_worker(&mut self, conn: ConnId) {
        if !self.workers.contains(&conn) {
            self.workers.push(conn);
        }
    }
}
