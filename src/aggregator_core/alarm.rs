//! Aggregate traffic-rate alarm with recovery hysteresis

/// Over-threshold signal for the rolling hit total
///
/// The alarm trips when the hits seen over the horizon exceed
/// `threshold × horizon_secs` and recovers the first time the total drops
/// back to or below that bound. The bound is computed by multiplication so an
/// average rate is never truncated by integer division.
#[derive(Debug, Clone)]
pub struct TrafficAlarm {
    threshold: u64,
    horizon_secs: u64,
    is_triggered: bool,
}

impl TrafficAlarm {
    pub fn new(threshold: u64, horizon_secs: u64) -> Self {
        Self {
            threshold,
            horizon_secs,
            is_triggered: false,
        }
    }

    /// Hit count the rolling total must exceed to trip the alarm
    pub fn limit(&self) -> u64 {
        self.threshold.saturating_mul(self.horizon_secs)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn horizon_secs(&self) -> u64 {
        self.horizon_secs
    }

    pub fn is_triggered(&self) -> bool {
        self.is_triggered
    }

    /// Recompute the state; returns the new state only when it flipped
    pub fn update(&mut self, rolling_hits: u64) -> Option<bool> {
        let over = rolling_hits > self.limit();
        if over == self.is_triggered {
            return None;
        }
        self.is_triggered = over;
        Some(over)
    }
}
