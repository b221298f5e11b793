use serde::{Deserialize, Serialize};

/// Chromosome / record identifier used as the key of every per-chromosome map
pub type ChromId = String;

/// Strand of a feature or read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    /// Parse a strand column (`+`, `-`, `.`, `?`). Anything but `-` is forward.
    pub fn parse(s: &str) -> Self {
        if s.trim() == "-" {
            Self::Reverse
        } else {
            Self::Forward
        }
    }

    /// Signed representation (`+1` / `-1`)
    #[must_use]
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}

/// A 1-based, fully closed interval. Used by annotation features.
///
/// `start == end` is a single base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneBasedSpan {
    pub start: u64,
    pub end: u64,
}

impl OneBasedSpan {
    /// Build a span, swapping the bounds if they arrive reversed.
    /// Returns `None` for position 0, which does not exist in 1-based space.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        if start == 0 {
            return None;
        }
        Some(Self { start, end })
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether this span shares at least one base with the 0-based half-open query
    #[must_use]
    pub fn overlaps(&self, query: &ZeroBasedSpan) -> bool {
        let zero = ZeroBasedSpan::from(*self);
        zero.overlaps(query)
    }
}

/// A 0-based, half-open interval. Used by variants, reads and track bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZeroBasedSpan {
    pub start: u64,
    pub end: u64,
}

impl ZeroBasedSpan {
    /// Build a span; `end` is clamped so it never precedes `start`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Half-open overlap test. Empty spans overlap a query that contains their position.
    #[must_use]
    pub fn overlaps(&self, other: &ZeroBasedSpan) -> bool {
        if self.is_empty() {
            return self.start >= other.start && self.start < other.end.max(other.start + 1);
        }
        self.start < other.end && other.start < self.end
    }
}

impl From<OneBasedSpan> for ZeroBasedSpan {
    fn from(span: OneBasedSpan) -> Self {
        Self {
            start: span.start - 1,
            end: span.end,
        }
    }
}

/// Converting a non-empty 0-based half-open interval into the feature convention:
/// `start + 1`, `end` unchanged.
impl TryFrom<ZeroBasedSpan> for OneBasedSpan {
    type Error = ZeroBasedSpan;

    fn try_from(span: ZeroBasedSpan) -> Result<Self, Self::Error> {
        if span.is_empty() {
            return Err(span);
        }
        Ok(Self {
            start: span.start + 1,
            end: span.end,
        })
    }
}
