mod args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::{TcpListener, UnixListener};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use crate::args::Args;
use gearman_rs::dispatcher::Dispatcher;
use gearman_rs::net;
use gearman_rs::queue::{FileQueue, NullQueue, PersistentQueue};

fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt().with_max_level(Level::TRACE).init();
    } else {
        tracing_subscriber::fmt().json().init();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.io_threads.max(1))
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(error) => {
            error!(%error, "failed to build async runtime");
            return ExitCode::from(111);
        },
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "encountered runtime error");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let host_id = args.host_id.clone().unwrap_or_else(|| {
        std::env::var("HOSTNAME").unwrap_or_else(|_| format!("pid{}", std::process::id()))
    });

    let queue: Box<dyn PersistentQueue> = match &args.queue_file {
        Some(path) => {
            info!(path = %path.display(), "opening persistent queue");
            Box::new(FileQueue::open(path.clone()).await.context("opening persistent queue")?)
        },
        None => Box::new(NullQueue::default()),
    };

    // Every exit path (SIGINT/SIGTERM, admin `shutdown`, graceful drain
    // completing) cancels this one token; every listener and connection
    // task watches it.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange happened installing the ctrl-c handler");
            }
            info!("received interrupt, shutting down");
            shutdown.cancel();
        });
    }
    #[cfg(unix)]
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let Ok(mut term) = signal::unix::signal(signal::unix::SignalKind::terminate()) else {
                return;
            };
            term.recv().await;
            info!("received SIGTERM, shutting down");
            shutdown.cancel();
        });
    }

    let (dispatcher, handle, rx) =
        Dispatcher::new(host_id, queue, shutdown.clone(), args.dispatcher_queue)
            .await
            .context("replaying persistent queue at startup")?;

    let dispatcher_task = tokio::spawn(dispatcher.run(rx));

    let tcp_listener = TcpListener::bind((args.listen, args.port))
        .await
        .context("binding TCP listener")?;
    let tcp_task = tokio::spawn(net::serve_tcp(
        tcp_listener,
        handle.clone(),
        shutdown.clone(),
        args.max_job_size as usize,
    ));

    let unix_task = match &args.unix_socket {
        Some(path) => {
            let _ = std::fs::remove_file(path);
            let listener = UnixListener::bind(path).context("binding UNIX socket listener")?;
            Some(tokio::spawn(net::serve_unix(
                listener,
                handle.clone(),
                shutdown.clone(),
                args.max_job_size as usize,
            )))
        },
        None => None,
    };

    // The dispatcher's channel only closes once every `Handle` clone is
    // gone; this is the main task's own
    // copy, kept alive only long enough to spawn the listeners above.
    drop(handle);

    if let Err(error) = tcp_task.await.context("TCP acceptor task panicked")? {
        warn!(%error, "TCP acceptor exited with an error");
    }
    if let Some(unix_task) = unix_task {
        if let Err(error) = unix_task.await.context("UNIX acceptor task panicked")? {
            warn!(%error, "UNIX acceptor exited with an error");
        }
    }

    dispatcher_task.await.context("dispatcher task panicked")?;

    Ok(())
}
