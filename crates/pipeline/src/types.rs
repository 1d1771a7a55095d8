//! Value types shared by envelopes, payloads, and the clock port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Clock steps
// ---------------------------------------------------------------------------

/// A position on the external step clock.
///
/// The in-process [`crate::Clock`] implementations cycle through `1..=30`,
/// but the domain does not enforce that range: the stage router maps any step
/// outside its table to `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockStep(u32);

impl ClockStep {
    /// Creates a [`ClockStep`] from a raw integer.
    pub fn new(step: u32) -> Self {
        Self(step)
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClockStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock instant recorded on envelopes and payloads.
///
/// Serialized as RFC 3339. Used for audit fields only; ordering and latency
/// measurements never depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Nanoseconds since the Unix epoch, saturating for dates outside the
    /// representable range.
    pub fn unix_nanos(self) -> i64 {
        self.0.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}
