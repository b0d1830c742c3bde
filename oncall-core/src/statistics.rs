use crate::models::{LogEntry, SeverityCounts, Statistics};

/// Tally entries by their severity string, exactly as received.
pub fn compute_statistics(entries: &[LogEntry], hours_back: u32) -> Statistics {
    let mut by_severity = SeverityCounts::new();
    for entry in entries {
        by_severity.increment(&entry.severity);
    }

    Statistics {
        total_logs: entries.len(),
        by_severity,
        time_range_hours: hours_back,
    }
}
