// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{cmp::max, time::Duration};

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.2
//# When no previous RTT is available, the initial RTT
//# SHOULD be set to 333 milliseconds.
pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
//# The RECOMMENDED value of the timer granularity (kGranularity) is 1 millisecond.
pub const K_GRANULARITY: Duration = Duration::from_millis(1);

/// A snapshot of the round trip time statistics of a path
///
/// Handed to tracers on every metrics update; the congestion controller keeps
/// the authoritative estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RttStats {
    /// Latest RTT sample
    pub latest_rtt: Duration,
    /// The minimum value observed over the lifetime of the connection
    pub min_rtt: Duration,
    /// An exponentially-weighted moving average
    pub smoothed_rtt: Duration,
    /// The variance in the observed RTT samples
    pub rtt_variance: Duration,
    pub max_ack_delay: Duration,
}

impl Default for RttStats {
    fn default() -> Self {
        //= https://www.rfc-editor.org/rfc/rfc9002#section-5.3
        //# smoothed_rtt = kInitialRtt
        //# rttvar = kInitialRtt / 2
        Self {
            latest_rtt: Duration::ZERO,
            min_rtt: Duration::ZERO,
            smoothed_rtt: DEFAULT_INITIAL_RTT,
            rtt_variance: DEFAULT_INITIAL_RTT / 2,
            max_ack_delay: Duration::ZERO,
        }
    }
}

impl RttStats {
    /// Computes the probe timeout period
    ///
    //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.1
    //# PTO = smoothed_rtt + max(4*rttvar, kGranularity) + max_ack_delay
    //
    //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.1
    //# When the PTO is armed for Initial or Handshake packet number spaces,
    //# the max_ack_delay in the PTO period computation is set to 0
    #[inline]
    pub fn pto_period(&self, include_max_ack_delay: bool) -> Duration {
        let mut pto = self.smoothed_rtt + max(4 * self.rtt_variance, K_GRANULARITY);
        if include_max_ack_delay {
            pto += self.max_ack_delay;
        }
        pto
    }

    /// Records a new RTT sample, ignoring acknowledgement delay
    pub fn update(&mut self, sample: Duration) {
        let first_sample = self.min_rtt.is_zero();
        self.latest_rtt = sample;
        if first_sample {
            //= https://www.rfc-editor.org/rfc/rfc9002#section-5.3
            //# smoothed_rtt = latest_rtt
            //# rttvar = latest_rtt / 2
            self.min_rtt = sample;
            self.smoothed_rtt = sample;
            self.rtt_variance = sample / 2;
            return;
        }

        self.min_rtt = self.min_rtt.min(sample);

        //= https://www.rfc-editor.org/rfc/rfc9002#section-5.3
        //# rttvar_sample = abs(smoothed_rtt - adjusted_rtt)
        //# rttvar = 3/4 * rttvar + 1/4 * rttvar_sample
        //# smoothed_rtt = 7/8 * smoothed_rtt + 1/8 * adjusted_rtt
        let rttvar_sample = if self.smoothed_rtt > sample {
            self.smoothed_rtt - sample
        } else {
            sample - self.smoothed_rtt
        };
        self.rtt_variance = (self.rtt_variance * 3 + rttvar_sample) / 4;
        self.smoothed_rtt = (self.smoothed_rtt * 7 + sample) / 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pto() {
        let stats = RttStats::default();
        // 333ms + 4 * 166.5ms
        assert_eq!(stats.pto_period(false), Duration::from_millis(999));
    }

    #[test]
    fn samples() {
        let mut stats = RttStats {
            max_ack_delay: Duration::from_millis(25),
            ..Default::default()
        };
        stats.update(Duration::from_millis(100));
        assert_eq!(stats.smoothed_rtt, Duration::from_millis(100));
        assert_eq!(stats.rtt_variance, Duration::from_millis(50));
        assert_eq!(stats.pto_period(true), Duration::from_millis(325));

        stats.update(Duration::from_millis(60));
        assert_eq!(stats.min_rtt, Duration::from_millis(60));
        assert_eq!(stats.latest_rtt, Duration::from_millis(60));
        assert_eq!(stats.smoothed_rtt, Duration::from_millis(95));
        assert_eq!(stats.rtt_variance, Duration::from_micros(47_500));
    }
}
