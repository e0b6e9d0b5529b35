//! Reporting events emitted by the aggregation pipeline

use crate::aggregator_core::TimeSlot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrafficEvent {
    /// The traffic alarm flipped
    AlarmTransition {
        triggered: bool,
        rolling_hits: u64,
        at_time: u64,
    },
    /// A settled range of per-second slots, oldest first, ending at `range_end_time`
    WindowReport {
        range_end_time: u64,
        slots: Vec<TimeSlot>,
    },
}

impl TrafficEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TrafficEvent::AlarmTransition { .. } => "alarm_transition",
            TrafficEvent::WindowReport { .. } => "window_report",
        }
    }

    /// First second covered by a window report
    pub fn range_start_time(&self) -> Option<u64> {
        match self {
            TrafficEvent::WindowReport {
                range_end_time,
                slots,
            } => Some((range_end_time + 1).saturating_sub(slots.len() as u64)),
            TrafficEvent::AlarmTransition { .. } => None,
        }
    }
}
