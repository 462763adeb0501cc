use std::collections::HashSet;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::job::{FunctionName, JobHandle};
use crate::wire::protocol::Response;

/// Opaque connection identifier, assigned by the acceptor and used as
/// the dispatcher's only handle on a connection — the dispatcher never
/// touches a socket directly.
pub type ConnId = u64;

/// A connection's role. Transitions are one-way, `Unknown -> X`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    Unknown,
    Client,
    Worker,
    Admin,
}

/// Sub-state of a `Worker`-role connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WorkerState {
    ActiveAwake,
    Sleeping,
}

/// Per-connection state, owned exclusively by the dispatcher task.
/// Membership in a function's worker list is just this struct's presence
/// in `Function::workers`, keyed by `ConnId` — no intrusive linked list
/// needed since the dispatcher already owns every connection's state.
pub struct ConnectionState {
    pub id: ConnId,
    pub peer_addr: Option<SocketAddr>,
    pub role: Role,
    pub outbound: mpsc::Sender<Response>,
    /// Cancelled by the dispatcher to force this connection closed (e.g.
    /// a `CAN_DO_TIMEOUT` violation); the connection task watches this
    /// alongside the process-wide shutdown token.
    pub disconnect: CancellationToken,

    /// `OPTION_REQ exceptions`: forward `WORK_EXCEPTION` to this
    /// client if set.
    pub exceptions: bool,
    /// `SET_CLIENT_ID`.
    pub client_id: Option<Bytes>,
    /// Namespace prefix applied to function names on this connection,
    /// if the deployment is multi-tenant.
    pub namespace: Option<Bytes>,

    // --- Client-role fields ---
    /// Jobs this client is attached to and awaiting a terminal result
    /// for.
    pub waiting_jobs: HashSet<JobHandle>,

    // --- Worker-role fields ---
    /// Functions this worker can perform, and an optional per-function
    /// timeout, in registration order: the grab-job algorithm walks this
    /// list front-to-back, so this is a `Vec`, not a `HashMap`.
    pub can_do: Vec<(FunctionName, Option<u32>)>,
    pub worker_state: WorkerState,
    /// Jobs currently assigned to and running on this worker.
    pub running_jobs: HashSet<JobHandle>,
    /// Set once a `NOOP` has been sent while sleeping and not yet
    /// answered by a fresh `GRAB_JOB*`, to avoid needless duplicate
    /// wakeups within a single sleep cycle.
    pub noop_sent: bool,
}

impl ConnectionState {
    pub fn new(
        id: ConnId,
        peer_addr: Option<SocketAddr>,
        outbound: mpsc::Sender<Response>,
        disconnect: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            role: Role::Unknown,
            outbound,
            disconnect,
            exceptions: false,
            client_id: None,
            namespace: None,
            waiting_jobs: HashSet::new(),
            can_do: Vec::new(),
            worker_state: WorkerState::ActiveAwake,
            running_jobs: HashSet::new(),
            noop_sent: false,
        }
    }

    /// Delivers a response to this connection's writer task, applying
    /// backpressure from the bounded outbound channel rather than
    /// dropping frames. If the connection has already gone away the send
    /// fails silently — the dispatcher will process its `Disconnect`
    /// shortly regardless.
    pub async fn send(&self, resp: Response) {
        let _ = self.outbound.send(resp).await;
    }

    /// Registers (or updates the timeout of) an ability, preserving
    /// registration order on first sight.
    pub fn add_ability(&mut self, function: FunctionName, timeout: Option<u32>) {
        if let Some(entry) = self.can_do.iter_mut().find(|(f, _)| *f == function) {
            entry.1 = timeout;
        } else {
            self.can_do.push((function, timeout));
        }
    }

    pub fn remove_ability(&mut self, function: &FunctionName) {
        self.can_do.retain(|(f, _)| f != function);
    }

    pub fn ability_timeout(&self, function: &FunctionName) -> Option<u32> {
        self.can_do.iter().find(|(f, _)| f == function).and_then(|(_, t)| *t)
    }
}
