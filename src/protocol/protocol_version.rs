use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// a chain protocol version.  Versions are totally ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub struct ProtocolVersion(pub u64);

impl ProtocolVersion {
    pub const GENESIS: Self = Self(0);

    /// exclusive upper bound of every version range.
    pub const MAX_SUPPORTED: Self = Self(u64::MAX);

    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ProtocolVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('v')
            .unwrap_or(s)
            .parse::<u64>()
            .map(Self)
            .map_err(|e| format!("Failed to parse {} as protocol version: {}", s, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid protocol version range: end {end} must be greater than start {start}")]
pub struct InvalidVersionRange {
    pub start: ProtocolVersion,
    pub end: ProtocolVersion,
}

/// half-open range `[start, end)` of protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolVersionRange {
    start: ProtocolVersion,
    end: ProtocolVersion,
}

impl ProtocolVersionRange {
    pub fn new(start: ProtocolVersion, end: ProtocolVersion) -> Result<Self, InvalidVersionRange> {
        if end <= start {
            return Err(InvalidVersionRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// range from `start` up to [ProtocolVersion::MAX_SUPPORTED].
    pub fn starting_at(start: ProtocolVersion) -> Result<Self, InvalidVersionRange> {
        Self::new(start, ProtocolVersion::MAX_SUPPORTED)
    }

    pub fn start(&self) -> ProtocolVersion {
        self.start
    }

    pub fn end(&self) -> ProtocolVersion {
        self.end
    }

    pub fn contains(&self, version: ProtocolVersion) -> bool {
        self.start <= version && version < self.end
    }
}

impl fmt::Display for ProtocolVersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
