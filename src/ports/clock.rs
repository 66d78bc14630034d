//! Clock port for timestamping pipeline artifacts.

use chrono::{DateTime, Utc};

/// Provides the current time.
///
/// Review history and outcome timestamps come from this port so replayed
/// runs produce byte-identical artifacts.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
