//! Circular per-second window of hit counts
//!
//! Slots are indexed by `timestamp % window_secs`. A slot only holds data for
//! the most recent second that mapped to it; advancing the latest time zeroes
//! every slot the window rotates past, including seconds skipped by a gap.

use super::alarm::TrafficAlarm;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One second of aggregate traffic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub section_counts: HashMap<String, u64>,
    pub total_hits: u64,
}

impl TimeSlot {
    pub fn hits_for(&self, section: &str) -> u64 {
        self.section_counts.get(section).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total_hits == 0
    }

    fn record(&mut self, section: &str) {
        self.total_hits += 1;
        match self.section_counts.get_mut(section) {
            Some(count) => *count += 1,
            None => {
                self.section_counts.insert(section.to_string(), 1);
            }
        }
    }

    // Keeps the map's allocation for reuse
    fn clear(&mut self) {
        self.section_counts.clear();
        self.total_hits = 0;
    }
}

/// Fixed-capacity window store with an incrementally maintained alarm total
#[derive(Debug, Clone)]
pub struct WindowStore {
    slots: Vec<TimeSlot>,
    latest_time: u64,
    rolling_hits: u64,
    alarm: TrafficAlarm,
}

impl WindowStore {
    /// Create a store retaining `window_secs` seconds
    ///
    /// `alarm_threshold` is in hits/second averaged over `alarm_horizon_secs`;
    /// the horizon must fit inside the retained window.
    pub fn new(
        window_secs: u64,
        alarm_threshold: u64,
        alarm_horizon_secs: u64,
    ) -> Result<Self, ConfigError> {
        if window_secs < 1 {
            return Err(ConfigError::InvalidValue(
                "window retention must be at least 1 second".to_string(),
            ));
        }
        if alarm_threshold < 1 {
            return Err(ConfigError::InvalidValue(format!(
                "{} is an invalid alarm threshold",
                alarm_threshold
            )));
        }
        if alarm_horizon_secs < 1 || alarm_horizon_secs > window_secs {
            return Err(ConfigError::InvalidValue(format!(
                "alarm horizon {}s must be between 1 and the window retention ({}s)",
                alarm_horizon_secs, window_secs
            )));
        }

        Ok(Self {
            slots: vec![TimeSlot::default(); window_secs as usize],
            latest_time: 0,
            rolling_hits: 0,
            alarm: TrafficAlarm::new(alarm_threshold, alarm_horizon_secs),
        })
    }

    pub fn window_secs(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn latest_time(&self) -> u64 {
        self.latest_time
    }

    /// Hits over the alarm horizon ending at the latest time
    pub fn rolling_hits(&self) -> u64 {
        self.rolling_hits
    }

    pub fn alarm(&self) -> &TrafficAlarm {
        &self.alarm
    }

    pub fn has_alarm(&self) -> bool {
        self.alarm.is_triggered()
    }

    /// Record one hit for `section` at `timestamp`
    ///
    /// Precondition: `timestamp` is inside the retained window
    /// (`> latest_time - window_secs`). Older entries cannot be attributed to
    /// a slot without clobbering a newer second, so they are dropped and
    /// logged rather than counted.
    ///
    /// Returns the new alarm state when this entry flipped it.
    pub fn add_entry(&mut self, section: &str, timestamp: u64) -> Option<bool> {
        if timestamp > self.latest_time {
            self.rotate_to(timestamp);
        } else if !self.is_retained(timestamp) {
            log::warn!(
                "⚠️  Dropping entry for {} at {}: older than retained window (latest {})",
                section,
                timestamp,
                self.latest_time
            );
            return None;
        }

        let idx = self.index(timestamp);
        self.slots[idx].record(section);

        if self.in_horizon(timestamp) {
            self.rolling_hits += 1;
        }
        self.alarm.update(self.rolling_hits)
    }

    /// Total hits cached for the slot `timestamp` maps to
    ///
    /// Meaningful only for `[latest_time - window_secs + 1, latest_time]`.
    pub fn hits_at(&self, timestamp: u64) -> u64 {
        self.slots[self.index(timestamp)].total_hits
    }

    /// Slots covering `(end_inclusive - last_n, end_inclusive]`, oldest first
    ///
    /// Returned as two physical slices to concatenate in order; the second is
    /// empty unless the range wraps past index 0. `last_n` is clamped to the
    /// window length.
    pub fn range_slices(&self, end_inclusive: u64, last_n: u64) -> (&[TimeSlot], &[TimeSlot]) {
        let window = self.slots.len();
        let n = last_n.min(window as u64) as usize;
        if n == 0 {
            return (&[], &[]);
        }

        let start = (self.index(end_inclusive) + 1 + window - n) % window;
        if start + n <= window {
            (&self.slots[start..start + n], &[])
        } else {
            (&self.slots[start..], &self.slots[..start + n - window])
        }
    }

    /// Owned copy of `range_slices` in logical order
    pub fn range_query(&self, end_inclusive: u64, last_n: u64) -> Vec<TimeSlot> {
        let (head, tail) = self.range_slices(end_inclusive, last_n);
        head.iter().chain(tail.iter()).cloned().collect()
    }

    fn index(&self, timestamp: u64) -> usize {
        (timestamp % self.slots.len() as u64) as usize
    }

    // Both compare by distance back from the latest time, which cannot
    // overflow for timestamps near u64::MAX
    fn is_retained(&self, timestamp: u64) -> bool {
        self.latest_time.saturating_sub(timestamp) < self.window_secs()
    }

    fn in_horizon(&self, timestamp: u64) -> bool {
        self.latest_time.saturating_sub(timestamp) < self.alarm.horizon_secs()
    }

    fn rotate_to(&mut self, new_latest: u64) {
        let gap = new_latest - self.latest_time;

        if gap >= self.window_secs() {
            // Everything retained, and therefore the whole horizon, aged out
            for slot in &mut self.slots {
                slot.clear();
            }
            self.rolling_hits = 0;
        } else {
            let horizon = self.alarm.horizon_secs();
            for second in self.latest_time + 1..=new_latest {
                // horizon <= window, so the aged slot is read before this
                // loop can clear it
                if let Some(aged) = second.checked_sub(horizon) {
                    let aged_hits = self.slots[self.index(aged)].total_hits;
                    self.rolling_hits = self.rolling_hits.saturating_sub(aged_hits);
                }
                let idx = self.index(second);
                self.slots[idx].clear();
            }
        }

        self.latest_time = new_latest;
    }
}
