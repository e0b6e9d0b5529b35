//! Per-section ranking over the slots of a window report

use crate::aggregator_core::TimeSlot;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_TOP_SECTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionHits {
    pub section: String,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub total_hits: u64,
    pub section_count: usize,
    pub top_sections: Vec<SectionHits>,
}

impl SectionSummary {
    /// Sum every slot and keep the `top_n` busiest sections
    ///
    /// Ordered by hits descending, then section name, so equal counts always
    /// print in the same order.
    pub fn from_slots(slots: &[TimeSlot], top_n: usize) -> Self {
        let mut per_section: HashMap<&str, u64> = HashMap::new();
        let mut total_hits = 0;

        for slot in slots {
            total_hits += slot.total_hits;
            for (section, hits) in &slot.section_counts {
                *per_section.entry(section.as_str()).or_insert(0) += hits;
            }
        }

        let section_count = per_section.len();
        let mut ranked: Vec<SectionHits> = per_section
            .into_iter()
            .map(|(section, hits)| SectionHits {
                section: section.to_string(),
                hits,
            })
            .collect();
        ranked.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.section.cmp(&b.section)));
        ranked.truncate(top_n);

        Self {
            total_hits,
            section_count,
            top_sections: ranked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(entries: &[(&str, u64)]) -> TimeSlot {
        let mut slot = TimeSlot::default();
        for (section, hits) in entries {
            slot.section_counts.insert(section.to_string(), *hits);
            slot.total_hits += hits;
        }
        slot
    }

    #[test]
    fn test_ranks_across_slots() {
        let slots = vec![
            slot(&[("/api", 3), ("/home", 1)]),
            TimeSlot::default(),
            slot(&[("/home", 4), ("/report", 2)]),
        ];
        let summary = SectionSummary::from_slots(&slots, DEFAULT_TOP_SECTIONS);

        assert_eq!(summary.total_hits, 10);
        assert_eq!(summary.section_count, 3);
        let names: Vec<&str> = summary.top_sections.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, vec!["/home", "/api", "/report"]);
        assert_eq!(summary.top_sections[0].hits, 5);
    }

    #[test]
    fn test_truncates_and_breaks_ties_by_name() {
        let slots = vec![slot(&[
            ("/f", 1),
            ("/e", 1),
            ("/d", 1),
            ("/c", 1),
            ("/b", 1),
            ("/a", 1),
            ("/z", 2),
        ])];
        let summary = SectionSummary::from_slots(&slots, 5);

        assert_eq!(summary.section_count, 7);
        let names: Vec<&str> = summary.top_sections.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, vec!["/z", "/a", "/b", "/c", "/d"]);
    }

    #[test]
    fn test_empty_report() {
        let summary = SectionSummary::from_slots(&vec![TimeSlot::default(); 3], 5);
        assert_eq!(summary.total_hits, 0);
        assert!(summary.top_sections.is_empty());
    }
}
