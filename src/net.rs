//! Acceptor & per-connection I/O.
//!
//! A multi-threaded Tokio runtime already gives us a pool of I/O workers
//! each driving a readiness loop over a subset of connections — every
//! connection's task is free to land on whichever worker thread the
//! scheduler picks, so no hand-rolled worker pool is needed on top of
//! it. What this module builds explicitly is the one task per connection
//! that owns a single `Framed` for its whole life, reading and writing
//! through it with `select!`, generalized to also drain a
//! per-connection outbound channel the dispatcher feeds.
//!
//! [`serve_tcp`] and [`serve_unix`] share the same per-connection
//! handling via [`spawn_connection`]/[`run_connection`], since TCP and a
//! `UnixListener` differ only in how a connection is accepted.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use futures::sink::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::select;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::Handle;
use crate::wire::events::GearmanEvent;
use crate::wire::{self, decoder};

/// Outbound FIFO depth per connection. Once full,
/// `ConnectionState::send`'s `Sender::send().await` inside the
/// dispatcher blocks — back-pressure propagates from this connection's
/// slow reader all the way to the one dispatcher task without it ever
/// needing to poll a socket directly.
const OUTBOUND_CAPACITY: usize = 256;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Accepts connections from a [`TcpListener`] until `shutdown` fires,
/// spawning one task per connection.
pub async fn serve_tcp(
    listener: TcpListener,
    handle: Handle,
    shutdown: CancellationToken,
    max_frame_len: usize,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening for TCP connections");
    loop {
        let accepted = select! {
            a = listener.accept() => a,
            _ = shutdown.cancelled() => return Ok(()),
        };

        match accepted {
            Ok((conn, peer)) => {
                if let Err(error) = conn.set_nodelay(true) {
                    warn!(%error, "failed to set TCP_NODELAY");
                }
                spawn_connection(conn, Some(peer), handle.clone(), shutdown.clone(), max_frame_len);
            },
            Err(error) => warn!(%error, "failed to accept TCP connection"),
        }
    }
}

/// Same as [`serve_tcp`] but for a UNIX domain socket.
pub async fn serve_unix(
    listener: UnixListener,
    handle: Handle,
    shutdown: CancellationToken,
    max_frame_len: usize,
) -> Result<()> {
    info!("listening for UNIX socket connections");
    loop {
        let accepted = select! {
            a = listener.accept() => a,
            _ = shutdown.cancelled() => return Ok(()),
        };

        match accepted {
            Ok((conn, _)) => spawn_connection(conn, None, handle.clone(), shutdown.clone(), max_frame_len),
            Err(error) => warn!(%error, "failed to accept UNIX connection"),
        }
    }
}

fn spawn_connection<T>(
    stream: T,
    peer_addr: Option<SocketAddr>,
    handle: Handle,
    shutdown: CancellationToken,
    max_frame_len: usize,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = run_connection(stream, peer_addr, handle, shutdown, max_frame_len).await {
            debug!(%error, "connection task ended with an error");
        }
    });
}

/// Drives one connection for its whole life: decode frames, forward
/// commands to the dispatcher, and write back whatever the dispatcher
/// sends on this connection's outbound channel — one reader, one
/// writer, one `mpsc` in each direction.
#[instrument(name = "connection", skip_all, fields(peer = peer_addr.map(|a| a.to_string()).unwrap_or_else(|| "unix".to_string())))]
async fn run_connection<T>(
    stream: T,
    peer_addr: Option<SocketAddr>,
    handle: Handle,
    shutdown: CancellationToken,
    max_frame_len: usize,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let disconnect = CancellationToken::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

    debug!(conn = id, "accepted connection");
    handle.connect(id, peer_addr, outbound_tx, disconnect.clone()).await;

    let mut framed = wire::framed(stream, max_frame_len);

    let result = loop {
        select! {
            incoming = framed.next() => match incoming {
                None => {
                    debug!(conn = id, "connection dropped by peer");
                    break Ok(());
                },
                Some(Ok(GearmanEvent::Discarded)) => continue,
                Some(Ok(GearmanEvent::Command(cmd))) => handle.command(id, cmd).await,
                Some(Err(decoder::Error::IO(e))) => break Err(e.into()),
                Some(Err(decoder::Error::Client(resp))) => {
                    let _ = framed.send(resp).await;
                    break Err(anyhow::anyhow!("client sent a malformed request and was disconnected"));
                },
            },
            outgoing = outbound_rx.recv() => match outgoing {
                None => break Ok(()),
                Some(resp) => {
                    if let Err(error) = framed.send(resp).await {
                        break Err(error.into());
                    }
                },
            },
            _ = disconnect.cancelled() => {
                debug!(conn = id, "disconnected by dispatcher");
                break Ok(());
            },
            _ = shutdown.cancelled() => break Ok(()),
        }
    };

    handle.disconnect(id).await;
    let _ = framed.into_inner().shutdown().await.context("during connection shutdown");

    result
}
