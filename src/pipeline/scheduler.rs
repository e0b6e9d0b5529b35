//! Interval scheduler deciding when a reporting interval has settled
//!
//! Log timestamps are not strictly increasing. Once an interval boundary is
//! crossed the interval is only *scheduled*; it becomes ready after records
//! more than `late_buffer_secs` past the boundary have been seen, by which
//! point stragglers for the interval are assumed to have arrived. This is a
//! heuristic: anything later than the buffer lands in its slot but is not
//! added to an interval that was already reported.

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    Unscheduled,
    Scheduled(u64),
}

#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    /// Last second already covered by a report
    last_processed_time: Option<u64>,
    interval_secs: u64,
    late_buffer_secs: u64,
    window_retention_secs: u64,
    pending_time: Option<u64>,
}

impl IntervalScheduler {
    /// Validate the interval against the retained window
    ///
    /// The window must hold two intervals, and the late buffer may not exceed
    /// the interval so a settled interval is still retained when reported.
    pub fn new(
        interval_secs: u64,
        late_buffer_secs: u64,
        window_retention_secs: u64,
    ) -> Result<Self, ConfigError> {
        if interval_secs < 1 || window_retention_secs < 1 {
            return Err(ConfigError::InvalidValue(
                "interval and window retention must both be positive".to_string(),
            ));
        }
        if interval_secs.saturating_mul(2) > window_retention_secs {
            return Err(ConfigError::InvalidValue(format!(
                "window retention {}s must hold at least two {}s intervals",
                window_retention_secs, interval_secs
            )));
        }
        if late_buffer_secs > interval_secs {
            return Err(ConfigError::InvalidValue(format!(
                "late buffer {}s cannot exceed the {}s interval",
                late_buffer_secs, interval_secs
            )));
        }

        Ok(Self {
            last_processed_time: None,
            interval_secs,
            late_buffer_secs,
            window_retention_secs,
            pending_time: None,
        })
    }

    /// Anchor the schedule explicitly instead of at the first observation
    pub fn with_start_time(mut self, start_time: u64) -> Self {
        self.last_processed_time = Some(start_time);
        self
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn late_buffer_secs(&self) -> u64 {
        self.late_buffer_secs
    }

    /// Window length the interval was validated against
    pub fn window_retention_secs(&self) -> u64 {
        self.window_retention_secs
    }

    pub fn last_processed_time(&self) -> Option<u64> {
        self.last_processed_time
    }

    pub fn pending_time(&self) -> Option<u64> {
        self.pending_time
    }

    pub fn status(&self) -> ScheduleStatus {
        match self.pending_time {
            Some(pending) => ScheduleStatus::Scheduled(pending),
            None => ScheduleStatus::Unscheduled,
        }
    }

    /// Observe `next_time`; true when the pending interval is ready to report
    ///
    /// Without an explicit start, the first observation anchors the schedule
    /// one second before itself, backdated by the late buffer so early
    /// stragglers still fall into the first interval.
    pub fn ready_to_process(&mut self, next_time: u64) -> bool {
        let late_buffer = self.late_buffer_secs;
        let last = *self
            .last_processed_time
            .get_or_insert_with(|| next_time.saturating_sub(late_buffer.saturating_add(1)));

        if self.pending_time.is_none() && next_time.saturating_sub(last) >= self.interval_secs {
            log::debug!("Interval scheduled at {} (last processed {})", next_time, last);
            self.pending_time = Some(next_time);
        }

        matches!(self.pending_time, Some(pending) if next_time.saturating_sub(pending) > late_buffer)
    }

    /// `(end, span)` of the unreported range up to the pending time
    pub fn pending_range(&self) -> Option<(u64, u64)> {
        let pending = self.pending_time?;
        let last = self.last_processed_time?;
        Some((pending, pending.saturating_sub(last)))
    }

    /// Close the pending interval; returns the time it ended at
    pub fn mark_processed(&mut self) -> Option<u64> {
        let pending = self.pending_time.take()?;
        self.last_processed_time = Some(pending);
        Some(pending)
    }
}
