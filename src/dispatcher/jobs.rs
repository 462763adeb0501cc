//! Job lifecycle: submission, grabbing, in-progress forwarding,
//! completion, status queries, and the periodic promotion/expiry sweep.

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Dispatcher, GrabKind};
use crate::queue::{PersistentQueue, RecoveredJob};
use crate::types::connection::{ConnId, Role, WorkerState};
use crate::types::job::{FunctionName, Job, JobHandle, JobLocation, Priority, ReduceState, Unique};
use crate::types::server::Server;
use crate::wire::protocol::{Response, SubmitJob};

/// Applies a connection's namespace prefix to a bare function name
///, so two tenants sharing one server never collide in the
/// registry.
fn namespaced(server: &Server, conn: ConnId, function: &FunctionName) -> FunctionName {
    match server.connections.get(&conn).and_then(|c| c.namespace.as_ref()) {
        Some(ns) => {
            let mut out = BytesMut::with_capacity(ns.len() + function.len());
            out.extend_from_slice(ns);
            out.extend_from_slice(function);
            out.freeze()
        },
        None => function.clone(),
    }
}

/// Reconstructs a [`Job`] recovered from the persistent queue at
/// startup, re-inserting it into the registry exactly as if it
/// had just been submitted, minus the client that originally submitted
/// it (which is long gone by the time the server restarts).
pub fn recover_job(server: &mut Server, recovered: RecoveredJob) {
    let RecoveredJob { handle, function, unique, data, priority, when } = recovered;

    let location = match when {
        Some(epoch) if epoch > crate::time::unix_epoch_secs() => {
            let delta = epoch - crate::time::unix_epoch_secs();
            JobLocation::Delayed { when: Instant::now() + std::time::Duration::from_secs(delta) }
        },
        _ => JobLocation::Queued,
    };

    let job = Job {
        handle: handle.clone(),
        function: function.clone(),
        unique: unique.clone(),
        priority,
        data,
        background: true,
        created: Instant::now(),
        location,
        status: (0, 0),
        clients: Vec::new(),
        ignore: false,
        reduce: None,
        reduce_parent: None,
    };

    let f = server.function_mut(&function);
    match &job.location {
        JobLocation::Queued => f.push_ready(priority, handle.clone()),
        JobLocation::Delayed { when } => {
            f.delayed.insert((*when, handle.clone()));
        },
        JobLocation::Running { .. } => unreachable!("recovered jobs are never running"),
    }
    f.job_total += 1;

    server.unique_index.insert((function, unique), handle.clone());
    server.jobs.insert(handle, job);
}

impl Dispatcher {
    pub(super) async fn on_can_do(&mut self, id: ConnId, function: FunctionName, timeout: Option<u32>) {
        let function = namespaced(&self.server, id, &function);
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.role = Role::Worker;
            conn.add_ability(function.clone(), timeout);
        }
        self.server.function_mut(&function).add_worker(id);
    }

    pub(super) async fn on_cant_do(&mut self, id: ConnId, function: FunctionName) {
        let function = namespaced(&self.server, id, &function);
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.remove_ability(&function);
        }
        if let Some(f) = self.server.functions.get_mut(&function) {
            f.remove_worker(id);
        }
    }

    pub(super) async fn on_reset_abilities(&mut self, id: ConnId) {
        let functions: Vec<FunctionName> = self
            .server
            .connections
            .get(&id)
            .map(|c| c.can_do.iter().map(|(f, _)| f.clone()).collect())
            .unwrap_or_default();

        for function in &functions {
            if let Some(f) = self.server.functions.get_mut(function) {
                f.remove_worker(id);
            }
        }
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.can_do.clear();
        }
    }

    pub(super) async fn on_pre_sleep(&mut self, id: ConnId) {
        let has_ready_work = self
            .server
            .connections
            .get(&id)
            .map(|c| {
                c.can_do
                    .iter()
                    .any(|(f, _)| self.server.functions.get(f).is_some_and(|f| f.job_count() > f.job_running))
            })
            .unwrap_or(false);

        let Some(conn) = self.server.connections.get_mut(&id) else { return };
        conn.worker_state = WorkerState::Sleeping;

        if has_ready_work && !conn.noop_sent {
            conn.noop_sent = true;
            conn.send(Response::Noop).await;
        }
    }

    pub(super) async fn on_grab_job(&mut self, id: ConnId, kind: GrabKind) {
        let Some(conn) = self.server.connections.get(&id) else { return };
        let abilities: Vec<FunctionName> = conn.can_do.iter().map(|(f, _)| f.clone()).collect();

        let mut found = None;
        for function in &abilities {
            if let Some(f) = self.server.functions.get_mut(function) {
                if let Some(handle) = f.pop_ready() {
                    found = Some((function.clone(), handle));
                    break;
                }
            }
        }

        let Some((function, handle)) = found else {
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(Response::NoJob).await;
            }
            return;
        };

        let timeout = self.server.connections.get(&id).and_then(|c| c.ability_timeout(&function));
        let deadline = timeout.map(|secs| Instant::now() + std::time::Duration::from_secs(secs as u64));

        let Some(job) = self.server.jobs.get_mut(&handle) else { return };
        job.location = JobLocation::Running { worker: id, deadline };

        let resp = match kind {
            GrabKind::Plain => {
                Response::JobAssign { handle: handle_bytes(&handle), function: function.clone(), workload: job.data.clone() }
            },
            GrabKind::Uniq => Response::JobAssignUniq {
                handle: handle_bytes(&handle),
                function: function.clone(),
                unique: job.unique.clone(),
                workload: job.data.clone(),
            },
            GrabKind::All => Response::JobAssignAll {
                handle: handle_bytes(&handle),
                function: function.clone(),
                unique: job.unique.clone(),
                reducer: job.reduce.as_ref().map(|r| r.reducer.clone()).unwrap_or_default(),
                workload: job.data.clone(),
            },
        };

        if let Some(f) = self.server.functions.get_mut(&function) {
            f.job_running += 1;
        }
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.worker_state = WorkerState::ActiveAwake;
            conn.noop_sent = false;
            conn.running_jobs.insert(handle.clone());
            conn.send(resp).await;
        }
    }

    pub(super) async fn on_submit_job(&mut self, id: ConnId, req: SubmitJob) {
        let SubmitJob { function, unique, priority, background, when, reducer, workload } = req;
        let function = namespaced(&self.server, id, &function);

        if self.server.draining {
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(Response::error("draining", "server is shutting down")).await;
            }
            return;
        }

        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.role = Role::Client;
        }

        let unique: Unique = if unique.is_empty() { self.server.synthesize_unique() } else { unique };

        let key = (function.clone(), unique.clone());
        if let Some(existing) = self.server.unique_index.get(&key).cloned() {
            if self.server.jobs.contains_key(&existing) {
                if !background {
                    if let Some(job) = self.server.jobs.get_mut(&existing) {
                        job.clients.push(id);
                    }
                    if let Some(conn) = self.server.connections.get_mut(&id) {
                        conn.waiting_jobs.insert(existing.clone());
                    }
                }
                if let Some(conn) = self.server.connections.get(&id) {
                    conn.send(Response::JobCreated { handle: handle_bytes(&existing) }).await;
                }
                return;
            }
        }

        if self.server.function_mut(&function).is_full(priority) {
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(Response::error("queue_full", "function queue is at capacity")).await;
            }
            return;
        }

        let handle = self.server.next_handle();

        if let Err(error) = self.queue.add(&handle, &function, &unique, &workload, priority, when).await {
            warn!(%error, "failed to persist job before acknowledging");
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(Response::error("persistence_failed", "could not record job")).await;
            }
            return;
        }

        let now_epoch = crate::time::unix_epoch_secs();
        let location = match when {
            Some(epoch) if epoch > now_epoch => {
                JobLocation::Delayed { when: Instant::now() + std::time::Duration::from_secs(epoch - now_epoch) }
            },
            _ => JobLocation::Queued,
        };

        let clients = if background { Vec::new() } else { vec![id] };

        let job = Job {
            handle: handle.clone(),
            function: function.clone(),
            unique: unique.clone(),
            priority,
            data: workload,
            background,
            created: Instant::now(),
            location,
            status: (0, 0),
            clients,
            ignore: false,
            reduce: reducer.map(|reducer| ReduceState { reducer, outstanding_children: 0, collected: Vec::new() }),
            reduce_parent: None,
        };

        let became_ready = matches!(job.location, JobLocation::Queued);

        let f = self.server.function_mut(&function);
        match &job.location {
            JobLocation::Queued => f.push_ready(priority, handle.clone()),
            JobLocation::Delayed { when } => {
                f.delayed.insert((*when, handle.clone()));
            },
            JobLocation::Running { .. } => unreachable!(),
        }
        f.job_total += 1;

        self.server.unique_index.insert(key, handle.clone());
        self.server.jobs.insert(handle.clone(), job);
        self.server.stats.cmd_submit_job += 1;

        if !background {
            if let Some(conn) = self.server.connections.get_mut(&id) {
                conn.waiting_jobs.insert(handle.clone());
            }
        }

        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(Response::JobCreated { handle: handle_bytes(&handle) }).await;
        }

        if became_ready {
            self.wake_sleeping_workers(&function).await;
        }
    }

    /// Sends one `NOOP` to every sleeping worker registered for
    /// `function` that hasn't already been sent one this cycle.
    pub(super) async fn wake_sleeping_workers(&mut self, function: &FunctionName) {
        let Some(f) = self.server.functions.get(function) else { return };
        let workers = f.workers.clone();
        for worker in workers {
            if let Some(conn) = self.server.connections.get_mut(&worker) {
                if conn.worker_state == WorkerState::Sleeping && !conn.noop_sent {
                    conn.noop_sent = true;
                    conn.send(Response::Noop).await;
                }
            }
        }
    }

    pub(super) async fn on_work_data(&mut self, id: ConnId, handle: Bytes, data: Bytes) {
        self.forward_in_progress(id, &handle, |h, d| Response::WorkData { handle: h, data: d }, data).await;
    }

    pub(super) async fn on_work_warning(&mut self, id: ConnId, handle: Bytes, data: Bytes) {
        self.forward_in_progress(id, &handle, |h, d| Response::WorkWarning { handle: h, data: d }, data).await;
    }

    pub(super) async fn on_work_status(&mut self, id: ConnId, handle: Bytes, numerator: u32, denominator: u32) {
        let Some(job_handle) = self.lookup_running(id, &handle) else { return };
        if let Some(job) = self.server.jobs.get_mut(&job_handle) {
            job.status = (numerator, denominator);
            let clients = job.clients.clone();
            for client in clients {
                if let Some(conn) = self.server.connections.get(&client) {
                    conn.send(Response::WorkStatus { handle: handle_bytes(&job_handle), numerator, denominator })
                        .await;
                }
            }
        }
    }

    async fn forward_in_progress(
        &mut self,
        id: ConnId,
        handle: &Bytes,
        make: impl Fn(Bytes, Bytes) -> Response,
        data: Bytes,
    ) {
        let Some(job_handle) = self.lookup_running(id, handle) else { return };
        let Some(job) = self.server.jobs.get(&job_handle) else { return };
        let clients = job.clients.clone();
        for client in clients {
            if let Some(conn) = self.server.connections.get(&client) {
                conn.send(make(handle_bytes(&job_handle), data.clone())).await;
            }
        }
    }

    pub(super) async fn on_work_exception(&mut self, id: ConnId, handle: Bytes, data: Bytes) {
        let Some(job_handle) = self.lookup_running(id, &handle) else { return };
        let Some(job) = self.server.jobs.get(&job_handle) else { return };
        let clients = job.clients.clone();
        for client in clients {
            if let Some(conn) = self.server.connections.get(&client) {
                if conn.exceptions {
                    conn.send(Response::WorkException { handle: handle_bytes(&job_handle), data: data.clone() })
                        .await;
                }
            }
        }
    }

    pub(super) async fn on_work_complete(&mut self, id: ConnId, handle: Bytes, data: Bytes) {
        let Some(job_handle) = self.lookup_running(id, &handle) else { return };
        self.finish_job(job_handle, id, true, data).await;
    }

    pub(super) async fn on_work_fail(&mut self, id: ConnId, handle: Bytes) {
        let Some(job_handle) = self.lookup_running(id, &handle) else { return };
        self.finish_job(job_handle, id, false, Bytes::new()).await;
    }

    /// Resolves an opaque wire handle to a [`JobHandle`] this worker is
    /// actually running, rejecting spoofed or stale handles.
    fn lookup_running(&self, id: ConnId, handle: &Bytes) -> Option<JobHandle> {
        let conn = self.server.connections.get(&id)?;
        let candidate = bytes_to_handle(handle);
        conn.running_jobs.get(&candidate).cloned()
    }

    /// Common tail of `WORK_COMPLETE`/`WORK_FAIL`: detach the job from
    /// its worker, deliver (or drop, per `ignore`) the result to
    /// attached clients, retire it from persistence, and — if this was
    /// the last outstanding child of a reduce job — kick off the reduce
    /// phase.
    async fn finish_job(&mut self, job_handle: JobHandle, worker: ConnId, ok: bool, data: Bytes) {
        let is_map_phase_of_reduce =
            ok && self.server.jobs.get(&job_handle).is_some_and(|j| j.reduce.is_some());

        if let Some(conn) = self.server.connections.get_mut(&worker) {
            conn.running_jobs.remove(&job_handle);
        }

        if is_map_phase_of_reduce {
            // The job record stays in `self.server.jobs` — it still owns
            // the original clients, which only learn the final result
            // once the synthesized reduce-phase child finishes.
            if let Some(job) = self.server.jobs.get(&job_handle) {
                if let Some(f) = self.server.functions.get_mut(&job.function) {
                    f.job_running = f.job_running.saturating_sub(1);
                }
                self.server.unique_index.remove(&(job.function.clone(), job.unique.clone()));
            }
            if let Err(error) = self.queue.done(&job_handle).await {
                warn!(%error, handle = %job_handle, "failed to retire persisted job record");
            }
            self.spawn_reduce_child_if_needed(&job_handle, data).await;
            return;
        }

        let Some(job) = self.server.jobs.remove(&job_handle) else { return };

        if let Some(f) = self.server.functions.get_mut(&job.function) {
            f.job_running = f.job_running.saturating_sub(1);
        }
        self.server.unique_index.remove(&(job.function.clone(), job.unique.clone()));
        if let Err(error) = self.queue.done(&job_handle).await {
            warn!(%error, handle = %job_handle, "failed to retire persisted job record");
        }

        if job.ignore {
            debug!(handle = %job_handle, "job finished but was already abandoned by its clients");
            return;
        }

        if let Some(parent_handle) = job.reduce_parent.clone() {
            self.on_reduce_child_finished(parent_handle, ok, data).await;
            return;
        }

        let resp = if ok {
            Response::WorkComplete { handle: handle_bytes(&job_handle), data }
        } else {
            Response::WorkFail { handle: handle_bytes(&job_handle) }
        };
        for client in &job.clients {
            if let Some(conn) = self.server.connections.get(client) {
                conn.send(resp.clone()).await;
            }
        }
    }

    /// Called once the single synthesized child of a reduce job
    /// finishes: delivers its result as the reduce job's own
    /// completion, since this crate's reduce phase is a single
    /// map-then-reduce hop rather than a fan of independent children.
    async fn on_reduce_child_finished(&mut self, parent_handle: JobHandle, ok: bool, data: Bytes) {
        let Some(parent) = self.server.jobs.get(&parent_handle) else { return };
        let clients = parent.clients.clone();
        let resp = if ok {
            Response::WorkComplete { handle: handle_bytes(&parent_handle), data }
        } else {
            Response::WorkFail { handle: handle_bytes(&parent_handle) }
        };
        for client in &clients {
            if let Some(conn) = self.server.connections.get(client) {
                conn.send(resp.clone()).await;
            }
        }
        self.server.jobs.remove(&parent_handle);
    }

    /// Invoked when a plain (non-reduce-child) job assigned to a reduce
    /// parent's map function completes: spawns the single reduce-phase
    /// child job against the parent's `reducer` function, carrying the
    /// map output as its workload.
    pub(super) async fn spawn_reduce_child_if_needed(&mut self, parent_handle: &JobHandle, map_output: Bytes) {
        let Some(parent) = self.server.jobs.get_mut(parent_handle) else { return };
        let Some(reduce) = parent.reduce.as_mut() else { return };
        reduce.outstanding_children = 1;
        let reducer = reduce.reducer.clone();

        let child_handle = self.server.next_handle();
        let child_unique = self.server.synthesize_unique();
        let child = Job {
            handle: child_handle.clone(),
            function: reducer.clone(),
            unique: child_unique.clone(),
            priority: parent.priority,
            data: map_output,
            background: false,
            created: Instant::now(),
            location: JobLocation::Queued,
            status: (0, 0),
            clients: Vec::new(),
            ignore: false,
            reduce: None,
            reduce_parent: Some(parent_handle.clone()),
        };

        let f = self.server.function_mut(&reducer);
        f.push_ready(child.priority, child_handle.clone());
        f.job_total += 1;
        self.server.unique_index.insert((reducer.clone(), child_unique), child_handle.clone());
        self.server.jobs.insert(child_handle, child);

        self.wake_sleeping_workers(&reducer).await;
    }

    pub(super) async fn on_get_status(&mut self, id: ConnId, handle: Bytes) {
        self.server.stats.cmd_get_status += 1;
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.role = Role::Client;
        }
        let resp = match self.server.jobs.get(&bytes_to_handle(&handle)) {
            Some(job) => Response::StatusRes {
                handle: handle.clone(),
                known: true,
                running: job.is_running(),
                numerator: job.status.0,
                denominator: job.status.1,
            },
            None => Response::StatusRes { handle, known: false, running: false, numerator: 0, denominator: 0 },
        };
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(resp).await;
        }
    }

    pub(super) async fn on_get_status_unique(&mut self, id: ConnId, function: Bytes, unique: Bytes) {
        self.server.stats.cmd_get_status += 1;
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.role = Role::Client;
        }
        let function = namespaced(&self.server, id, &function);
        let resp = match self.server.unique_index.get(&(function, unique.clone())) {
            Some(handle) => match self.server.jobs.get(handle) {
                Some(job) => Response::StatusRes {
                    handle: handle_bytes(handle),
                    known: true,
                    running: job.is_running(),
                    numerator: job.status.0,
                    denominator: job.status.1,
                },
                None => Response::StatusRes { handle: unique, known: false, running: false, numerator: 0, denominator: 0 },
            },
            None => Response::StatusRes { handle: unique, known: false, running: false, numerator: 0, denominator: 0 },
        };
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(resp).await;
        }
    }

    pub(super) async fn on_option_req(&mut self, id: ConnId, option: Bytes) {
        if option.as_ref() == b"exceptions" {
            if let Some(conn) = self.server.connections.get_mut(&id) {
                conn.exceptions = true;
                conn.role = Role::Client;
            }
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(Response::OptionRes { option }).await;
            }
        } else if let Some(conn) = self.server.connections.get(&id) {
            conn.send(Response::error("unknown_option", "unsupported option")).await;
        }
    }

    pub(super) async fn on_echo_req(&mut self, id: ConnId, data: Bytes) {
        if let Some(conn) = self.server.connections.get_mut(&id) {
            conn.role = Role::Client;
        }
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(Response::EchoRes { data }).await;
        }
    }

    /// Moves every delayed job whose time has come onto its function's
    /// ready FIFO, waking sleeping workers for it.
    pub(super) async fn promote_delayed_jobs(&mut self, now: Instant) {
        let mut woken = Vec::new();
        for (name, f) in self.server.functions.iter_mut() {
            let mut ready = Vec::new();
            loop {
                let due = match f.delayed.iter().next() {
                    Some((when, _)) if *when <= now => true,
                    _ => false,
                };
                if !due {
                    break;
                }
                let (_, handle) = f.delayed.pop_first().expect("just checked non-empty and due");
                ready.push(handle);
            }
            if !ready.is_empty() {
                woken.push(name.clone());
            }
            for handle in ready {
                if let Some(job) = self.server.jobs.get_mut(&handle) {
                    job.location = JobLocation::Queued;
                    f.push_ready(job.priority, handle);
                }
            }
        }
        for function in woken {
            self.wake_sleeping_workers(&function).await;
        }
    }

    /// Requeues (at the head of its priority FIFO) and disconnects the
    /// worker for any job whose `CAN_DO_TIMEOUT` deadline has passed.
    pub(super) async fn expire_timed_out_jobs(&mut self, now: Instant) {
        let expired: Vec<(JobHandle, FunctionName, Priority, ConnId)> = self
            .server
            .jobs
            .values()
            .filter_map(|job| match job.location {
                JobLocation::Running { worker, deadline: Some(deadline) } if deadline <= now => {
                    Some((job.handle.clone(), job.function.clone(), job.priority, worker))
                },
                _ => None,
            })
            .collect();

        for (handle, function, priority, worker) in expired {
            warn!(handle = %handle, conn = worker, "worker exceeded CAN_DO_TIMEOUT, requeueing and disconnecting");
            if let Some(job) = self.server.jobs.get_mut(&handle) {
                job.location = JobLocation::Queued;
            }
            if let Some(f) = self.server.functions.get_mut(&function) {
                f.job_running = f.job_running.saturating_sub(1);
                f.requeue_head(priority, handle.clone());
            }
            if let Some(conn) = self.server.connections.get_mut(&worker) {
                conn.running_jobs.remove(&handle);
                conn.disconnect.cancel();
            }
            self.wake_sleeping_workers(&function).await;
        }
    }

    /// On a worker's disconnect, its still-running jobs go back to the
    /// head of their queue rather than being lost.
    pub(super) async fn requeue_after_disconnect(&mut self, handle: JobHandle) {
        let Some(job) = self.server.jobs.get_mut(&handle) else { return };
        if !job.is_running() {
            return;
        }
        job.location = JobLocation::Queued;
        let (function, priority) = (job.function.clone(), job.priority);
        if let Some(f) = self.server.functions.get_mut(&function) {
            f.job_running = f.job_running.saturating_sub(1);
            f.requeue_head(priority, handle);
        }
        self.wake_sleeping_workers(&function).await;
    }

    /// On a client's disconnect, detaches it from every job it was
    /// still waiting on; a job with no clients left is abandoned rather
    /// than delivered once it completes.
    pub(super) async fn drop_client_from_job(&mut self, handle: JobHandle, client: ConnId) {
        let Some(job) = self.server.jobs.get_mut(&handle) else { return };
        job.clients.retain(|&c| c != client);
        if job.clients.is_empty() && !job.background {
            job.ignore = true;
            if !job.is_running() {
                self.abandon_queued_job(handle).await;
            }
        }
    }

    /// Removes a queued (not yet running) job that every client has
    /// abandoned, before any worker ever sees it.
    async fn abandon_queued_job(&mut self, handle: JobHandle) {
        let Some(job) = self.server.jobs.remove(&handle) else { return };
        self.server.unique_index.remove(&(job.function.clone(), job.unique.clone()));
        match &job.location {
            JobLocation::Queued => {
                if let Some(f) = self.server.functions.get_mut(&job.function) {
                    f.remove_queued(job.priority, &job.handle);
                }
            },
            JobLocation::Delayed { when } => {
                if let Some(f) = self.server.functions.get_mut(&job.function) {
                    f.delayed.remove(&(*when, job.handle.clone()));
                }
            },
            JobLocation::Running { .. } => {},
        }
        if let Err(error) = self.queue.done(&handle).await {
            warn!(%error, %handle, "failed to retire abandoned job record");
        }
    }
}

fn handle_bytes(h: &JobHandle) -> Bytes {
    Bytes::copy_from_slice(h.as_bytes())
}

/// Reconstructs a [`JobHandle`] from its wire representation for a
/// hash-map lookup. `JobHandle` hashes and compares by content, not
/// pointer identity, so this never needs to match the original `Arc`.
fn bytes_to_handle(b: &Bytes) -> JobHandle {
    JobHandle::from(String::from_utf8_lossy(b).into_owned())
}
