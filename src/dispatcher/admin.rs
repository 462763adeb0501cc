//! The line-based admin protocol: a handful of operator verbs answered
//! directly out of the in-memory registry, as Gearman's tab-separated
//! rows.

use bytes::Bytes;
use tracing::info;

use super::Dispatcher;
use crate::types::connection::{ConnId, Role};

impl Dispatcher {
    pub(super) async fn admin_status(&mut self, id: ConnId) {
        let mut rows: Vec<Bytes> = self
            .server
            .functions
            .values()
            .map(|f| {
                Bytes::from(format!(
                    "{}\t{}\t{}\t{}",
                    String::from_utf8_lossy(&f.name),
                    f.job_count(),
                    f.job_running,
                    f.workers.len(),
                ))
            })
            .collect();
        rows.sort();

        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminTable(rows)).await;
        }
    }

    pub(super) async fn admin_workers(&mut self, id: ConnId) {
        let mut rows: Vec<Bytes> = self
            .server
            .connections
            .values()
            .filter(|c| c.role == Role::Worker)
            .map(|c| {
                let addr = c.peer_addr.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
                let client_id = c.client_id.as_deref().map(String::from_utf8_lossy).unwrap_or_default();
                let functions = c
                    .can_do
                    .iter()
                    .map(|(f, _)| String::from_utf8_lossy(f).into_owned())
                    .collect::<Vec<_>>()
                    .join(" ");
                Bytes::from(format!("{}\t{}\t{}\t{}", c.id, addr, client_id, functions))
            })
            .collect();
        rows.sort();

        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminTable(rows)).await;
        }
    }

    pub(super) async fn admin_maxqueue(&mut self, id: ConnId, function: Bytes, sizes: Vec<u32>) {
        let caps = match sizes.as_slice() {
            [] => [0, 0, 0],
            [one] => [*one, *one, *one],
            [high, normal, low, ..] => [*high, *normal, *low],
        };
        self.server.function_mut(&function).max_queue_size = caps;

        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminLine(Bytes::from_static(b"OK"))).await;
        }
    }

    pub(super) async fn admin_shutdown(&mut self, id: ConnId, graceful: bool) {
        if graceful {
            info!("admin requested graceful shutdown, draining");
            self.server.draining = true;
            if let Some(conn) = self.server.connections.get(&id) {
                conn.send(crate::wire::protocol::Response::AdminLine(Bytes::from_static(b"OK"))).await;
            }
        } else {
            info!("admin requested immediate shutdown");
            self.shutdown.cancel();
        }
    }

    pub(super) async fn admin_version(&mut self, id: ConnId) {
        let line = Bytes::from(format!("OK {}", env!("CARGO_PKG_VERSION")));
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminLine(line)).await;
        }
    }

    pub(super) async fn admin_getpid(&mut self, id: ConnId) {
        let line = Bytes::from(format!("OK {}", std::process::id()));
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminLine(line)).await;
        }
    }

    pub(super) async fn admin_unknown(&mut self, id: ConnId, _verb: Bytes) {
        if let Some(conn) = self.server.connections.get(&id) {
            conn.send(crate::wire::protocol::Response::AdminLine(Bytes::from_static(b"ERROR"))).await;
        }
    }
}
