//! Bounded request audit log
//!
//! Entries are kept oldest-first in a ring buffer guarded by a single mutex,
//! so append, clear, stats and snapshot are each atomic with respect to the
//! others. The capacity may change at runtime; a smaller capacity takes
//! effect on the next append.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tracing::{debug, trace};

/// Capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 100;

/// One handled request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// When the request was handled (UTC)
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// HTTP method, upper case
    pub method: String,
    /// Request path
    pub path: String,
    /// HTTP status code sent back
    pub status_code: u16,
    /// Peer address, if the transport exposed one
    pub client_addr: Option<SocketAddr>,
}

impl RequestLogEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        status_code: u16,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            method: method.into(),
            path: path.into(),
            status_code,
            client_addr,
        }
    }

    /// Status code in [200, 300)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl std::fmt::Display for RequestLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}]", self.method, self.path, self.status_code)?;
        if let Some(addr) = self.client_addr {
            write!(f, " from {}", addr)?;
        }
        Ok(())
    }
}

/// Summary counts over the current log contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
    /// Entries in the log
    pub total: usize,
    /// Entries with a 2xx status
    pub successful: usize,
    /// Everything else
    pub failed: usize,
}

impl std::fmt::Display for RequestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total: {}, Success: {}, Failed: {}",
            self.total, self.successful, self.failed
        )
    }
}

/// Thread-safe, capacity-bounded request log with FIFO eviction
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<RequestLogEntry>>,
    capacity: AtomicUsize,
}

impl AuditLog {
    /// Create an empty log holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Current capacity
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Change the capacity. Excess entries are evicted on the next append.
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        self.capacity.store(capacity, Ordering::Release);
        debug!("Audit log capacity set to {}", capacity);
    }

    /// Append an entry, evicting the oldest while over capacity
    pub fn append(&self, entry: RequestLogEntry) {
        trace!("Request logged: {}", entry);

        let mut entries = self.lock();
        entries.push_back(entry);

        let capacity = self.capacity();
        while entries.len() > capacity {
            entries.pop_front();
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.lock().clear();
        debug!("Request logs cleared");
    }

    /// Count successful and failed entries
    pub fn stats(&self) -> RequestStats {
        let entries = self.lock();
        let successful = entries.iter().filter(|e| e.is_success()).count();

        RequestStats {
            total: entries.len(),
            successful,
            failed: entries.len() - successful,
        }
    }

    /// Copy of the log, oldest first
    pub fn snapshot(&self) -> Vec<RequestLogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Entries are never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<RequestLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
