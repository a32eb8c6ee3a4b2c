pub mod diff;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub use self::diff::{SnapshotDiff, diff};

/// Numeric id of an account following us.
///
/// Assigned by the remote service, never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(u64);

impl Identity {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Identity {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Identity> for u64 {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Identity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Seconds since the Unix epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        )
    }

    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = i64::try_from(self.0)
            .ok()
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            .and_then(|dt| dt.format(&Rfc3339).ok());

        match formatted {
            Some(s) => f.write_str(&s),
            None => self.0.fmt(f),
        }
    }
}

/// What we know about a follower.
///
/// Stored as JSON, so field names are part of the on-disk format. Missing
/// fields decode to their defaults and unknown ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "screen_name")]
    pub handle: String,
    /// Set once, the first run the identity lands in the active bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<Timestamp>,
    /// Refreshed every run the identity is still following
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Timestamp>,
}

impl Descriptor {
    /// A descriptor carrying only display attributes, not yet stamped.
    pub fn new(display_name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            handle: handle.into(),
            first_seen: None,
            last_seen: None,
        }
    }

    /// Stamp the run timestamp, keeping `first_seen` if `previous` had one.
    pub fn stamp(&mut self, now: Timestamp, previous: Option<&Descriptor>) {
        self.first_seen = Some(previous.and_then(|p| p.first_seen).unwrap_or(now));
        self.last_seen = Some(now);
    }
}
