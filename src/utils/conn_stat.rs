// Connection stats bookkeeping

use std::sync::atomic::{AtomicU64, Ordering};

/// Connection stats
///
/// Records the read/write deadlines a session was configured with and
/// accumulates the outbound traffic counters. Enforcement of the deadlines
/// is up to the transport layer owning the socket.
pub struct ConnStat {
    // Configured read timeout (seconds, 0 = none)
    read_timeout_sec: AtomicU64,

    // Configured write timeout (seconds, 0 = none)
    write_timeout_sec: AtomicU64,

    // Total bytes written to the socket
    wrote_bytes: AtomicU64,

    // Number of buffers written to the socket
    wrote_count: AtomicU64,
}

impl ConnStat {
    /// Creates new ConnStat
    pub fn new() -> ConnStat {
        ConnStat {
            read_timeout_sec: AtomicU64::new(0),
            write_timeout_sec: AtomicU64::new(0),
            wrote_bytes: AtomicU64::new(0),
            wrote_count: AtomicU64::new(0),
        }
    }

    /// Records the timeouts the session runs with
    pub fn start(&self, read_timeout_sec: u64, write_timeout_sec: u64) {
        self.read_timeout_sec
            .store(read_timeout_sec, Ordering::Relaxed);
        self.write_timeout_sec
            .store(write_timeout_sec, Ordering::Relaxed);
    }

    /// Accounts a completed socket write of n bytes
    pub fn write(&self, n: usize) {
        self.wrote_bytes.fetch_add(n as u64, Ordering::Relaxed);
        self.wrote_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the configured write timeout (seconds)
    pub fn write_timeout_sec(&self) -> u64 {
        self.write_timeout_sec.load(Ordering::Relaxed)
    }

    /// Gets the total bytes written so far
    pub fn wrote_bytes(&self) -> u64 {
        self.wrote_bytes.load(Ordering::Relaxed)
    }

    /// Gets the number of buffers written so far
    pub fn wrote_count(&self) -> u64 {
        self.wrote_count.load(Ordering::Relaxed)
    }
}

impl Default for ConnStat {
    fn default() -> ConnStat {
        ConnStat::new()
    }
}
