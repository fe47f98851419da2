//! Monitoring and observability
//!
//! This module provides the request audit log: a bounded, insertion-ordered
//! record of every request the control server handled, plus the summary
//! statistics a front-end displays next to it.

mod audit;

pub use audit::{AuditLog, RequestLogEntry, RequestStats, DEFAULT_CAPACITY};
