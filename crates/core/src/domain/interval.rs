use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` range of absolute instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Builds a range, rejecting empty or inverted bounds.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Touching ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Sorts and merges overlapping or touching ranges into a disjoint union.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.sort();
    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                if range.end > last.end {
                    last.end = range.end;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Removes the union of `busy` from `window`, returning the free pieces in order.
pub fn subtract_ranges(window: TimeRange, busy: &[TimeRange]) -> Vec<TimeRange> {
    let mut free = Vec::new();
    let mut cursor = window.start;

    for blocked in merge_ranges(busy.iter().copied().filter(|b| b.overlaps(&window)).collect()) {
        if blocked.start > cursor {
            free.push(TimeRange { start: cursor, end: blocked.start.min(window.end) });
        }
        if blocked.end > cursor {
            cursor = blocked.end;
        }
        if cursor >= window.end {
            break;
        }
    }

    if cursor < window.end {
        free.push(TimeRange { start: cursor, end: window.end });
    }
    free
}
