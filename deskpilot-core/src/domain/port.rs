//! Node port ranges

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Semantic tag of a port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Vnc,
    Web,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Vnc => write!(f, "vnc"),
            PortKind::Web => write!(f, "web"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortRangeError {
    #[error("port range {start}-{end} is empty")]
    Empty { start: u16, end: u16 },

    #[error("invalid port range '{0}', expected START-END")]
    Malformed(String),
}

/// Inclusive-exclusive interval of node ports, `[start, end)`
///
/// Immutable once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    kind: PortKind,
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn new(kind: PortKind, start: u16, end: u16) -> Result<Self, PortRangeError> {
        if start >= end {
            return Err(PortRangeError::Empty { start, end });
        }
        Ok(Self { kind, start, end })
    }

    /// Parses `START-END` (end exclusive) and tags it with `kind`
    pub fn parse(kind: PortKind, s: &str) -> Result<Self, PortRangeError> {
        let bounds: RawBounds = s.parse()?;
        Self::new(kind, bounds.start, bounds.end)
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port < self.end
    }

    /// Ports in ascending order
    pub fn iter(&self) -> std::ops::Range<u16> {
        self.start..self.end
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}, {})", self.kind, self.start, self.end)
    }
}

struct RawBounds {
    start: u16,
    end: u16,
}

impl FromStr for RawBounds {
    type Err = PortRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PortRangeError::Malformed(s.to_string());

        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let start = start.trim().parse::<u16>().map_err(|_| malformed())?;
        let end = end.trim().parse::<u16>().map_err(|_| malformed())?;

        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_end_exclusive() {
        let range = PortRange::new(PortKind::Vnc, 31000, 32000).unwrap();
        assert!(range.contains(31000));
        assert!(range.contains(31999));
        assert!(!range.contains(32000));
        assert!(!range.contains(30999));
        assert_eq!(range.iter().count(), 1000);
        assert_eq!(range.iter().next(), Some(31000));
        assert_eq!(range.iter().last(), Some(31999));
    }

    #[test]
    fn test_empty_range_rejected() {
        assert_eq!(
            PortRange::new(PortKind::Web, 32001, 32001),
            Err(PortRangeError::Empty {
                start: 32001,
                end: 32001
            })
        );
    }

    #[test]
    fn test_parse() {
        let range = PortRange::parse(PortKind::Web, " 32001-33001 ").unwrap();
        assert_eq!(range.kind(), PortKind::Web);
        assert_eq!(range.start(), 32001);
        assert_eq!(range.end(), 33001);

        assert!(matches!(
            PortRange::parse(PortKind::Web, "32001"),
            Err(PortRangeError::Malformed(_))
        ));
        assert!(matches!(
            PortRange::parse(PortKind::Web, "abc-33001"),
            Err(PortRangeError::Malformed(_))
        ));
    }

    #[test]
    fn test_overlap() {
        let vnc = PortRange::new(PortKind::Vnc, 31000, 32000).unwrap();
        let web = PortRange::new(PortKind::Web, 32001, 33001).unwrap();
        let clash = PortRange::new(PortKind::Web, 31999, 32500).unwrap();

        assert!(!vnc.overlaps(&web));
        assert!(vnc.overlaps(&clash));
    }
}
