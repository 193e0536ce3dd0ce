use std::cmp::{max, min};
use std::fmt;

use super::U256;

/// Errors raised when constructing or combining ranges
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The end of the range is not strictly greater than its start
    #[error("end({end}) must be greater than start({start})")]
    Empty { start: U256, end: U256 },

    /// Arithmetic on range bounds overflowed 256 bits
    #[error("range arithmetic overflowed")]
    Overflow,
}

/// Half-open interval `[start, end)` of coin ids
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: U256,
    pub end: U256,
}

impl Range {
    /// Create a range, rejecting empty or inverted bounds
    pub fn new(start: U256, end: U256) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Convenience constructor for small ranges in tests and fixtures
    pub fn from_u64(start: u64, end: u64) -> Result<Self, RangeError> {
        Self::new(U256::from(start), U256::from(end))
    }

    /// Create the range `[start, start + amount)`
    pub fn with_amount(start: U256, amount: U256) -> Result<Self, RangeError> {
        let end = start.checked_add(amount).ok_or(RangeError::Overflow)?;
        Self::new(start, end)
    }

    /// Number of coins covered by this range
    pub fn amount(&self) -> U256 {
        self.end - self.start
    }

    /// `max(a.start, b.start) < min(a.end, b.end)`
    pub fn intersects(&self, other: &Range) -> bool {
        max(self.start, other.start) < min(self.end, other.end)
    }

    /// The overlapping part of two ranges, if any
    pub fn intersection(&self, other: &Range) -> Option<Range> {
        let start = max(self.start, other.start);
        let end = min(self.end, other.end);
        if start < end {
            Some(Range { start, end })
        } else {
            None
        }
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
