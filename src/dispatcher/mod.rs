//! The dispatcher: a single task that owns all scheduler state.
//!
//! Every other task — one reader and one writer per connection — talks
//! to it only by sending a [`DispatcherMsg`] over a bounded `mpsc`
//! channel. Because exactly one task ever touches [`Server`], none of
//! its fields need a lock or an atomic; ordering falls out of the
//! channel's own FIFO contract.

mod admin;
mod jobs;
#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::queue::PersistentQueue;
use crate::types::connection::{ConnId, ConnectionState, Role};
use crate::types::server::Server;
use crate::wire::protocol::Command;

/// How often the dispatcher wakes on its own, independent of incoming
/// messages, to promote delayed jobs and expire worker timeouts. No
/// dedicated OS thread is needed for this — see `time.rs`.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Everything a connection task can tell the dispatcher.
pub enum DispatcherMsg {
    Connect {
        id: ConnId,
        peer_addr: Option<SocketAddr>,
        outbound: mpsc::Sender<crate::wire::protocol::Response>,
        disconnect: CancellationToken,
    },
    Command {
        id: ConnId,
        cmd: Command,
    },
    Disconnect {
        id: ConnId,
    },
}

/// A cheaply-cloneable way for connection tasks to reach the
/// dispatcher.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::Sender<DispatcherMsg>,
}

impl Handle {
    pub async fn connect(
        &self,
        id: ConnId,
        peer_addr: Option<SocketAddr>,
        outbound: mpsc::Sender<crate::wire::protocol::Response>,
        disconnect: CancellationToken,
    ) {
        let _ = self.tx.send(DispatcherMsg::Connect { id, peer_addr, outbound, disconnect }).await;
    }

    pub async fn command(&self, id: ConnId, cmd: Command) {
        let _ = self.tx.send(DispatcherMsg::Command { id, cmd }).await;
    }

    pub async fn disconnect(&self, id: ConnId) {
        let _ = self.tx.send(DispatcherMsg::Disconnect { id }).await;
    }
}

pub struct Dispatcher {
    server: Server,
    queue: Box<dyn PersistentQueue>,
    /// Cancelled by the dispatcher itself once a graceful drain finishes
    /// with no jobs left running; the acceptor and every
    /// connection task watch the same token to know when to exit.
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Builds the dispatcher, its message channel, and the handle
    /// connection tasks use to reach it. Replays any jobs left over from
    /// a previous run before returning, so `run` can be spawned
    /// immediately after.
    pub async fn new(
        host_id: String,
        queue: Box<dyn PersistentQueue>,
        shutdown: CancellationToken,
        channel_capacity: usize,
    ) -> anyhow::Result<(Self, Handle, mpsc::Receiver<DispatcherMsg>)> {
        let mut server = Server::new(host_id);

        for recovered in queue.replay().await? {
            jobs::recover_job(&mut server, recovered);
        }

        let (tx, rx) = mpsc::channel(channel_capacity);
        Ok((Self { server, queue, shutdown }, Handle { tx }, rx))
    }

    /// Runs until its message channel is closed (i.e. every connect
    /// handle has been dropped, which only happens at process exit).
    pub async fn run(mut self, mut rx: mpsc::Receiver<DispatcherMsg>) {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle_msg(msg).await,
                    None => {
                        debug!("dispatcher channel closed, exiting");
                        return;
                    },
                },
                _ = tick.tick() => self.handle_tick(Instant::now()).await,
            }
        }
    }

    async fn handle_msg(&mut self, msg: DispatcherMsg) {
        match msg {
            DispatcherMsg::Connect { id, peer_addr, outbound, disconnect } => {
                self.on_connect(id, peer_addr, outbound, disconnect).await;
            },
            DispatcherMsg::Command { id, cmd } => self.on_command(id, cmd).await,
            DispatcherMsg::Disconnect { id } => self.on_disconnect(id).await,
        }
    }

    async fn on_connect(
        &mut self,
        id: ConnId,
        peer_addr: Option<SocketAddr>,
        outbound: mpsc::Sender<crate::wire::protocol::Response>,
        disconnect: CancellationToken,
    ) {
        self.server.stats.total_connections += 1;
        self.server.connections.insert(id, ConnectionState::new(id, peer_addr, outbound, disconnect));
    }

    #[instrument(name = "dispatcher_command", skip(self, cmd), fields(conn = id))]
    async fn on_command(&mut self, id: ConnId, cmd: Command) {
        use crate::wire::protocol::AdminCommand;

        if !self.server.connections.contains_key(&id) {
            return;
        }

        match cmd {
            Command::CanDo { function } => self.on_can_do(id, function, None).await,
            Command::CanDoTimeout { function, timeout } => {
                self.on_can_do(id, function, Some(timeout)).await
            },
            Command::CantDo { function } => self.on_cant_do(id, function).await,
            Command::ResetAbilities => self.on_reset_abilities(id).await,
            Command::PreSleep => self.on_pre_sleep(id).await,
            Command::GrabJob => self.on_grab_job(id, GrabKind::Plain).await,
            Command::GrabJobUniq => self.on_grab_job(id, GrabKind::Uniq).await,
            Command::GrabJobAll => self.on_grab_job(id, GrabKind::All).await,
            Command::WorkData { handle, data } => self.on_work_data(id, handle, data).await,
            Command::WorkWarning { handle, data } => self.on_work_warning(id, handle, data).await,
            Command::WorkStatus { handle, numerator, denominator } => {
                self.on_work_status(id, handle, numerator, denominator).await
            },
            Command::WorkComplete { handle, data } => self.on_work_complete(id, handle, data).await,
            Command::WorkFail { handle } => self.on_work_fail(id, handle).await,
            Command::WorkException { handle, data } => self.on_work_exception(id, handle, data).await,
            Command::SetClientId { id: client_id } => {
                if let Some(conn) = self.server.connections.get_mut(&id) {
                    conn.role = Role::Worker;
                    conn.client_id = Some(client_id);
                }
            },
            Command::AllYours => {},
            Command::SubmitJob(req) => self.on_submit_job(id, req).await,
            Command::GetStatus { handle } => self.on_get_status(id, handle).await,
            Command::GetStatusUnique { function, unique } => {
                self.on_get_status_unique(id, function, unique).await
            },
            Command::OptionReq { option } => self.on_option_req(id, option).await,
            Command::EchoReq { data } => self.on_echo_req(id, data).await,
            Command::Admin(admin_cmd) => {
                if let Some(conn) = self.server.connections.get_mut(&id) {
                    conn.role = Role::Admin;
                }
                match admin_cmd {
                    AdminCommand::Status => self.admin_status(id).await,
                    AdminCommand::Workers => self.admin_workers(id).await,
                    AdminCommand::MaxQueue { function, sizes } => {
                        self.admin_maxqueue(id, function, sizes).await
                    },
                    AdminCommand::Shutdown { graceful } => self.admin_shutdown(id, graceful).await,
                    AdminCommand::Version => self.admin_version(id).await,
                    AdminCommand::GetPid => self.admin_getpid(id).await,
                    AdminCommand::Unknown(verb) => self.admin_unknown(id, verb).await,
                }
            },
        }
    }

    async fn on_disconnect(&mut self, id: ConnId) {
        let Some(conn) = self.server.connections.remove(&id) else { return };

        for (function, _) in &conn.can_do {
            if let Some(f) = self.server.functions.get_mut(function) {
                f.remove_worker(id);
            }
        }

        for handle in conn.running_jobs.iter().cloned().collect::<Vec<_>>() {
            self.requeue_after_disconnect(handle).await;
        }

        for handle in conn.waiting_jobs.iter().cloned().collect::<Vec<_>>() {
            self.drop_client_from_job(handle, id).await;
        }

        debug!(conn = id, "connection removed from registry");
    }

    async fn handle_tick(&mut self, now: Instant) {
        self.promote_delayed_jobs(now).await;
        self.expire_timed_out_jobs(now).await;

        if self.server.draining {
            let anything_left = self
                .server
                .functions
                .values()
                .any(|f| f.job_count() > 0 || !f.delayed.is_empty());
            if !anything_left {
                info!("drain complete, no jobs remain running or queued; shutting down");
                let _ = self.queue.flush().await;
                self.shutdown.cancel();
            }
        }
    }
}

#[derive(Copy, Clone)]
enum GrabKind {
    Plain,
    Uniq,
    All,
}
