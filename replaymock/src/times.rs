// vim: tw=80
//! Invocation count constraints.

use std::{
    fmt,
    ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo,
          RangeToInclusive}
};

use crate::error::{Error, Misuse};

/// How many times an expectation may be, and must be, invoked.
///
/// `max == None` means unbounded.  Construct with the named constructors or
/// convert from a `usize` (exact count) or any integer range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Times {
    min: usize,
    max: Option<usize>
}

impl Times {
    /// Any number of calls, including none.
    pub const fn any() -> Self {
        Times{min: 0, max: None}
    }

    pub const fn at_least(n: usize) -> Self {
        Times{min: n, max: None}
    }

    pub const fn at_most(n: usize) -> Self {
        Times{min: 0, max: Some(n)}
    }

    /// Inclusive bounds, as written in a test: `between(2, 3)`.
    ///
    /// Fails if `min > max`.
    pub fn between(min: usize, max: usize) -> Result<Self, Error> {
        if min > max {
            return Err(Misuse::new(format!(
                "Invalid invocation count range: minimum {} exceeds maximum {}",
                min, max)).into());
        }
        Ok(Times{min, max: Some(max)})
    }

    /// Same as `times(0)`.
    pub const fn never() -> Self {
        Times{min: 0, max: Some(0)}
    }

    pub const fn once() -> Self {
        Times::exactly(1)
    }

    pub const fn exactly(n: usize) -> Self {
        Times{min: n, max: Some(n)}
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Has an expectation called `count` times been called the maximum
    /// allowed number of times?
    pub fn is_exhausted(&self, count: usize) -> bool {
        self.max.map(|max| count >= max).unwrap_or(false)
    }

    /// Is it required that the expectation be called an exact number of
    /// times?
    pub fn is_exact(&self) -> bool {
        self.max == Some(self.min)
    }

    /// Has an expectation called `count` times been called the minimum
    /// required number of times?
    pub fn is_satisfied(&self, count: usize) -> bool {
        count >= self.min
    }

    /// May this expectation never be consumed at all?
    pub fn is_never(&self) -> bool {
        self.max == Some(0)
    }

    /// Scale both bounds for a block repeated `n` times.
    pub fn scaled(self, n: usize) -> Self {
        Times {
            min: self.min.saturating_mul(n),
            max: self.max.map(|m| m.saturating_mul(n))
        }
    }
}

impl Default for Times {
    /// Exactly once.
    fn default() -> Self {
        Times::once()
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {}", max),
            Some(max) if self.min == 0 => write!(f, "at most {}", max),
            Some(max) => write!(f, "between {} and {}", self.min, max),
            None if self.min == 0 => f.write_str("any number of times"),
            None => write!(f, "at least {}", self.min)
        }
    }
}

impl From<usize> for Times {
    fn from(n: usize) -> Self {
        Times::exactly(n)
    }
}

impl From<Range<usize>> for Times {
    /// An empty range, like `3..3`, means "never".
    fn from(r: Range<usize>) -> Self {
        if r.end <= r.start {
            Times::never()
        } else {
            Times{min: r.start, max: Some(r.end - 1)}
        }
    }
}

impl From<RangeFrom<usize>> for Times {
    fn from(r: RangeFrom<usize>) -> Self {
        Times::at_least(r.start)
    }
}

impl From<RangeFull> for Times {
    fn from(_: RangeFull) -> Self {
        Times::any()
    }
}

impl From<RangeInclusive<usize>> for Times {
    fn from(r: RangeInclusive<usize>) -> Self {
        let (start, end) = r.into_inner();
        if end < start {
            Times::never()
        } else {
            Times{min: start, max: Some(end)}
        }
    }
}

impl From<RangeTo<usize>> for Times {
    fn from(r: RangeTo<usize>) -> Self {
        Times::from(0..r.end)
    }
}

impl From<RangeToInclusive<usize>> for Times {
    fn from(r: RangeToInclusive<usize>) -> Self {
        Times::at_most(r.end)
    }
}
