//! Injectable clock for time-based quarantine.
//!
//! Quarantine expiry is computed lazily at selection time against an
//! absolute deadline, so no background sweeper is needed and the pools
//! stay trivially testable with a manual clock.

use chrono::{DateTime, Utc};

/// Source of the current time for pool bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
