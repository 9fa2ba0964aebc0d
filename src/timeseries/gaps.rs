/// Gap detection and cross-channel gap merging
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, TimeSeriesSet};

/// A contiguous span of missing samples in a channel.
///
/// `start` and `end` are the first and last missing sample times
/// (inclusive); `next_start` is the expected time of the first sample after
/// the gap. Always `start <= end < next_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub next_start: DateTime<Utc>,
}

/// Scan one channel for spans of missing samples.
///
/// Walks the sample grid with a two-state machine: entering a gap on the
/// first missing sample, leaving it on the first present one. A series
/// that ends while still in a gap emits a trailing gap whose `next_start`
/// is one interval past the last sample.
pub fn channel_gaps(channel: &Channel) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let delta = channel.delta();
    let mut gap_start: Option<DateTime<Utc>> = None;
    for (i, value) in channel.data.iter().enumerate() {
        if value.is_nan() {
            if gap_start.is_none() {
                // start of a gap
                gap_start = Some(channel.time_at(i));
            }
        } else if let Some(start) = gap_start.take() {
            gaps.push(Gap {
                start,
                end: channel.time_at(i - 1),
                next_start: channel.time_at(i),
            });
        }
    }
    // check for gap at end
    if let Some(start) = gap_start {
        let last = channel.time_at(channel.len() - 1);
        gaps.push(Gap {
            start,
            end: last,
            next_start: last + delta,
        });
    }
    gaps
}

/// Gaps for every channel in a set, keyed by channel code
pub fn set_gaps(set: &TimeSeriesSet) -> HashMap<String, Vec<Gap>> {
    let mut gaps = HashMap::new();
    for channel in set.iter() {
        gaps.entry(channel.channel.clone())
            .or_insert_with(Vec::new)
            .extend(channel_gaps(channel));
    }
    gaps
}

/// Merge per-channel gaps into one sorted, pairwise-disjoint timeline.
///
/// A gap absorbs any later gap whose start falls at or before the current
/// gap's `next_start`, extending `end`/`next_start` only when the absorbed
/// gap reaches further; this avoids refetching the same span once per
/// channel when channel gaps are not aligned.
pub fn merge_gaps(gaps: &HashMap<String, Vec<Gap>>) -> Vec<Gap> {
    let mut sorted: Vec<Gap> = gaps.values().flatten().cloned().collect();
    sorted.sort_by_key(|gap| gap.start);
    let mut merged: Vec<Gap> = Vec::new();
    let mut current: Option<Gap> = None;
    for gap in sorted {
        match current.as_mut() {
            None => current = Some(gap),
            Some(acc) => {
                if gap.start > acc.next_start {
                    // next gap starts after current gap ends
                    merged.push(acc.clone());
                    current = Some(gap);
                } else if gap.end > acc.end {
                    // overlapping gap reaches further, extend
                    acc.end = gap.end;
                    acc.next_start = gap.next_start;
                }
            }
        }
    }
    if let Some(acc) = current {
        merged.push(acc);
    }
    merged
}
