//! Monotonic time source shared by the dispatcher.
//!
//! The original server (`libgearman-server/timer.cc`) ran a dedicated
//! thread that woke once a second via `poll()` and cached
//! `gettimeofday()` so the rest of the server could read "now" without a
//! syscall. Tokio already caches its own clock reading per scheduler
//! tick, so a dedicated thread buys nothing here — we just read
//! [`tokio::time::Instant::now`] directly wherever "now" is needed.

use tokio::time::Instant;

/// Returns the current monotonic instant, for use in delayed-job and
/// worker-timeout comparisons.
pub fn now() -> Instant {
    Instant::now()
}

/// Seconds-since-UNIX-epoch, used for `SUBMIT_JOB_EPOCH`/`SUBMIT_JOB_SCHED`
/// wire values, which are expressed as wall-clock epoch seconds rather
/// than a monotonic instant.
pub fn unix_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
