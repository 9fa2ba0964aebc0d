/// Shared helpers for padding, trimming, and range queries over sets
use chrono::{DateTime, Utc};

use crate::types::TimeSeriesSet;

/// Earliest start and latest end across all channels in the set
pub fn start_end_times(set: &TimeSeriesSet) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for channel in set.iter() {
        let Some(end) = channel.end_time() else {
            continue;
        };
        range = Some(match range {
            None => (channel.start, end),
            Some((s, e)) => (s.min(channel.start), e.max(end)),
        });
    }
    range
}

/// Like `start_end_times`, but considering only present samples
pub fn start_end_times_without_gaps(
    set: &TimeSeriesSet,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for channel in set.iter() {
        let (Some(first), Some(last)) =
            (channel.first_present_time(), channel.last_present_time())
        else {
            continue;
        };
        range = Some(match range {
            None => (first, last),
            Some((s, e)) => (s.min(first), e.max(last)),
        });
    }
    range
}

/// Pad every channel with missing markers to cover `[start, end]`
pub fn pad_set(set: &mut TimeSeriesSet, start: DateTime<Utc>, end: DateTime<Utc>) {
    for channel in set.iter_mut() {
        channel.pad(start, end);
    }
}

/// Trim every channel to `[start, end]`
pub fn trim_set(set: &mut TimeSeriesSet, start: DateTime<Utc>, end: DateTime<Utc>) {
    for channel in set.iter_mut() {
        channel.trim(start, end);
    }
    set.drop_empty();
}

/// Slice every channel to `[start, end]`, returning a new set
pub fn slice_set(set: &TimeSeriesSet, start: DateTime<Utc>, end: DateTime<Utc>) -> TimeSeriesSet {
    let mut out = TimeSeriesSet::new();
    for channel in set.iter() {
        let sliced = channel.slice(start, end);
        if !sliced.is_empty() {
            // identities are already unique, insert cannot fail
            let _ = out.insert(sliced);
        }
    }
    out
}

/// Whether any channel holds at least one present sample
pub fn has_any_data(set: &TimeSeriesSet) -> bool {
    set.iter().any(|c| c.data.iter().any(|v| !v.is_nan()))
}
