use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))]
    pub listen: IpAddr,
    /// (TCP) port to listen on.
    #[arg(short, long, default_value_t = 4730)]
    pub port: u16,
    /// Additionally listen on this UNIX domain socket path.
    #[arg(long)]
    pub unix_socket: Option<PathBuf>,
    /// Number of Tokio I/O worker threads; the work-stealing runtime
    /// handles distributing connections across them.
    #[arg(short = 'j', long, default_value_t = 4)]
    pub io_threads: usize,
    /// Sets the maximum allowed job/frame size, in bytes.
    #[arg(short = 'z', long, default_value_t = 4 * 1024 * 1024)]
    pub max_job_size: u32,
    /// Enables a file-backed persistent queue at this path;
    /// without this flag, submitted jobs do not survive a restart.
    #[arg(short = 'q', long)]
    pub queue_file: Option<PathBuf>,
    /// Identifier embedded in every job handle this server assigns.
    /// Defaults to the local hostname.
    #[arg(long)]
    pub host_id: Option<String>,
    /// Capacity of the dispatcher's inbound command channel, shared
    /// across every connection.
    #[arg(long, default_value_t = 4096)]
    pub dispatcher_queue: usize,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub debug: bool,
}
