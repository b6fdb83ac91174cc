// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{fmt, ops, time::Duration};

/// An absolute point in time, relative to an epoch chosen by the endpoint's clock
///
/// Timer deadlines are reported as timestamps so tracers can correlate them
/// with other events without needing access to the clock itself.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Creates a timestamp from the time elapsed since the clock's epoch
    #[inline]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the time elapsed since the clock's epoch
    #[inline]
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Returns the duration elapsed since `earlier`, or zero if `earlier` is in the future
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns `true` if the timestamp has passed at `current_time`
    #[inline]
    pub fn has_elapsed(self, current_time: Self) -> bool {
        self <= current_time
    }
}

impl ops::Add<Duration> for Timestamp {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl ops::AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let start = Timestamp::from_duration(Duration::from_secs(1));
        let deadline = start + Duration::from_millis(100);
        assert_eq!(
            deadline.saturating_duration_since(start),
            Duration::from_millis(100)
        );
        assert_eq!(start.saturating_duration_since(deadline), Duration::ZERO);
        assert!(start.has_elapsed(deadline));
        assert!(!deadline.has_elapsed(start));
        assert_eq!(format!("{deadline:?}"), "Timestamp(1.1s)");
    }
}
