/// Core type definitions for geomagnetic timeseries processing
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Uniform sampling cadence of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleInterval {
    Day,
    Hour,
    Minute,
    Second,
    Tenhertz,
}

impl SampleInterval {
    pub fn as_str(&self) -> &str {
        match self {
            SampleInterval::Day => "day",
            SampleInterval::Hour => "hour",
            SampleInterval::Minute => "minute",
            SampleInterval::Second => "second",
            SampleInterval::Tenhertz => "tenhertz",
        }
    }

    /// Time between consecutive samples
    pub fn delta(&self) -> Duration {
        match self {
            SampleInterval::Day => Duration::days(1),
            SampleInterval::Hour => Duration::hours(1),
            SampleInterval::Minute => Duration::minutes(1),
            SampleInterval::Second => Duration::seconds(1),
            SampleInterval::Tenhertz => Duration::milliseconds(100),
        }
    }

    pub fn delta_ms(&self) -> i64 {
        self.delta().num_milliseconds()
    }
}

/// Processing level of stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Variation,
    Reported,
    Provisional,
    Adjusted,
    QuasiDefinitive,
    Definitive,
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            DataType::Variation => "variation",
            DataType::Reported => "reported",
            DataType::Provisional => "provisional",
            DataType::Adjusted => "adjusted",
            DataType::QuasiDefinitive => "quasi-definitive",
            DataType::Definitive => "definitive",
        }
    }
}

/// Identity of a channel within a set (station + channel code)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub station: String,
    pub channel: String,
}

/// One scalar series sampled at a uniform interval.
///
/// Samples are stored as `f64` with `NaN` marking an absent sample, so a
/// channel always spans a contiguous grid of sample times starting at
/// `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub station: String,
    pub channel: String,
    pub data_type: DataType,
    pub interval: SampleInterval,
    pub start: DateTime<Utc>,
    pub data: Vec<f64>,
}

fn div_floor(a: i64, b: i64) -> i64 {
    let d = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        d - 1
    } else {
        d
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    -div_floor(-a, b)
}

impl Channel {
    pub fn new(
        station: impl Into<String>,
        channel: impl Into<String>,
        data_type: DataType,
        interval: SampleInterval,
        start: DateTime<Utc>,
        data: Vec<f64>,
    ) -> Self {
        Channel {
            station: station.into(),
            channel: channel.into(),
            data_type,
            interval,
            start,
            data,
        }
    }

    pub fn id(&self) -> ChannelId {
        ChannelId {
            station: self.station.clone(),
            channel: self.channel.clone(),
        }
    }

    pub fn delta(&self) -> Duration {
        self.interval.delta()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time of sample `i`
    pub fn time_at(&self, i: usize) -> DateTime<Utc> {
        self.start + self.delta() * (i as i32)
    }

    /// Time of the last sample
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.time_at(self.data.len() - 1))
        }
    }

    /// Expected time of the sample after the last one
    pub fn next_time(&self) -> Option<DateTime<Utc>> {
        self.end_time().map(|t| t + self.delta())
    }

    /// Index of the sample at exactly `time`, if it falls on the grid
    pub fn index_of(&self, time: DateTime<Utc>) -> Option<usize> {
        let offset = (time - self.start).num_milliseconds();
        let delta = self.interval.delta_ms();
        if offset < 0 || offset % delta != 0 {
            return None;
        }
        let i = (offset / delta) as usize;
        if i < self.data.len() {
            Some(i)
        } else {
            None
        }
    }

    /// Time of the last sample that is not a missing marker
    pub fn last_present_time(&self) -> Option<DateTime<Utc>> {
        for (i, v) in self.data.iter().enumerate().rev() {
            if !v.is_nan() {
                return Some(self.time_at(i));
            }
        }
        None
    }

    /// Time of the first sample that is not a missing marker
    pub fn first_present_time(&self) -> Option<DateTime<Utc>> {
        for (i, v) in self.data.iter().enumerate() {
            if !v.is_nan() {
                return Some(self.time_at(i));
            }
        }
        None
    }

    /// Clip to the samples inside `[start, end]` (inclusive both ends)
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Channel {
        let mut out = Channel {
            data: Vec::new(),
            ..self.clone()
        };
        if self.data.is_empty() || end < start {
            return out;
        }
        let delta = self.interval.delta_ms();
        let first = div_ceil((start - self.start).num_milliseconds(), delta).max(0);
        let last = div_floor((end - self.start).num_milliseconds(), delta)
            .min(self.data.len() as i64 - 1);
        if first > last || first >= self.data.len() as i64 || last < 0 {
            return out;
        }
        out.start = self.time_at(first as usize);
        out.data = self.data[first as usize..=last as usize].to_vec();
        out
    }

    /// Trim in place to `[start, end]`
    pub fn trim(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        *self = self.slice(start, end);
    }

    /// Extend with missing markers so the channel covers `[start, end]`.
    ///
    /// Pad boundaries stay aligned to the channel's existing sample grid;
    /// an empty channel is anchored at `start`.
    pub fn pad(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        if self.data.is_empty() {
            if end < start {
                return;
            }
            let delta = self.interval.delta_ms();
            let n = div_floor((end - start).num_milliseconds(), delta) + 1;
            self.start = start;
            self.data = vec![f64::NAN; n as usize];
            return;
        }
        let delta = self.interval.delta_ms();
        if start < self.start {
            let k = div_floor((self.start - start).num_milliseconds(), delta);
            if k > 0 {
                let mut front = vec![f64::NAN; k as usize];
                front.extend_from_slice(&self.data);
                self.data = front;
                self.start = self.start - self.delta() * (k as i32);
            }
        }
        if let Some(last) = self.end_time() {
            if end > last {
                let m = div_floor((end - last).num_milliseconds(), delta);
                for _ in 0..m {
                    self.data.push(f64::NAN);
                }
            }
        }
    }

    /// Coalesce another segment of the same channel into this one.
    ///
    /// The merged channel covers the union of both time ranges; a present
    /// sample from `other` overwrites whatever was at the same instant,
    /// while a missing marker never erases existing data.
    pub fn merge(&mut self, other: &Channel) -> Result<()> {
        if other.data.is_empty() {
            return Ok(());
        }
        if self.data.is_empty() {
            self.start = other.start;
            self.data = other.data.clone();
            return Ok(());
        }
        if self.interval != other.interval {
            return Err(PipelineError::Internal(format!(
                "Cannot merge {}/{}: interval {} != {}",
                self.station,
                self.channel,
                self.interval.as_str(),
                other.interval.as_str()
            )));
        }
        let delta = self.interval.delta_ms();
        if (other.start - self.start).num_milliseconds() % delta != 0 {
            return Err(PipelineError::Internal(format!(
                "Cannot merge {}/{}: sample grids are misaligned",
                self.station, self.channel
            )));
        }
        let new_start = self.start.min(other.start);
        let self_end = self.end_time().unwrap();
        let other_end = other.end_time().unwrap();
        let new_end = self_end.max(other_end);
        let n = (div_floor((new_end - new_start).num_milliseconds(), delta) + 1) as usize;
        let mut merged = vec![f64::NAN; n];
        let self_off = ((self.start - new_start).num_milliseconds() / delta) as usize;
        merged[self_off..self_off + self.data.len()].copy_from_slice(&self.data);
        let other_off = ((other.start - new_start).num_milliseconds() / delta) as usize;
        for (i, v) in other.data.iter().enumerate() {
            if !v.is_nan() {
                merged[other_off + i] = *v;
            }
        }
        self.start = new_start;
        self.data = merged;
        Ok(())
    }
}

/// Unordered set of channels sharing processing context, one per identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeriesSet {
    channels: Vec<Channel>,
}

impl TimeSeriesSet {
    pub fn new() -> Self {
        TimeSeriesSet { channels: Vec::new() }
    }

    pub fn from_channels(channels: Vec<Channel>) -> Result<Self> {
        let mut set = TimeSeriesSet::new();
        for channel in channels {
            set.insert(channel)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    /// Insert a channel, coalescing with an existing segment of the same
    /// identity
    pub fn insert(&mut self, channel: Channel) -> Result<()> {
        let id = channel.id();
        if let Some(existing) = self.channels.iter_mut().find(|c| c.id() == id) {
            existing.merge(&channel)
        } else {
            self.channels.push(channel);
            Ok(())
        }
    }

    /// Merge every channel of another set into this one
    pub fn extend(&mut self, other: TimeSeriesSet) -> Result<()> {
        for channel in other.channels {
            self.insert(channel)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| &c.id() == id)
    }

    /// Select channels by optional station and channel code
    pub fn select(&self, station: Option<&str>, channel: Option<&str>) -> Vec<&Channel> {
        self.channels
            .iter()
            .filter(|c| station.map_or(true, |s| c.station == s))
            .filter(|c| channel.map_or(true, |ch| c.channel == ch))
            .collect()
    }

    /// Channel codes present in the set
    pub fn channel_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.channels.iter().map(|c| c.channel.clone()).collect();
        codes.dedup();
        codes
    }

    /// Relabel channel codes in place (pure rename, data untouched)
    pub fn rename_channels(&mut self, renames: &std::collections::HashMap<String, String>) {
        for channel in &mut self.channels {
            if let Some(to) = renames.get(&channel.channel) {
                channel.channel = to.clone();
            }
        }
    }

    pub fn retain<F: FnMut(&Channel) -> bool>(&mut self, f: F) {
        self.channels.retain(f);
    }

    pub fn drop_empty(&mut self) {
        self.channels.retain(|c| !c.is_empty());
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Variation
    }
}

/// How a configured job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Batch,
    Update,
}

/// Configuration for the processing service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Logging
    pub log_filter: Option<String>,

    // Station metadata
    #[serde(default, rename = "station")]
    pub stations: Vec<StationConfig>,

    // Batch/update jobs
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,

    // Streaming graph
    #[serde(default, rename = "controller")]
    pub controllers: Vec<ControllerConfig>,
    #[serde(default, rename = "edge")]
    pub edges: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub code: String,
    pub agency: Option<String>,
    #[serde(default, rename = "epoch")]
    pub epochs: Vec<crate::metadata::MetadataEpoch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub mode: JobMode,
    pub stations: Vec<String>,
    pub output_stations: Option<Vec<String>>,
    pub input_channels: Option<Vec<String>>,
    pub output_channels: Option<Vec<String>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub input_interval: Option<SampleInterval>,
    pub output_interval: Option<SampleInterval>,
    pub data_type: Option<DataType>,
    pub algorithm: crate::algorithm::AlgorithmSpec,
    pub rename_input: Option<std::collections::HashMap<String, String>>,
    pub rename_output: Option<std::collections::HashMap<String, String>>,
    pub trim: Option<bool>,
    pub realtime_window_secs: Option<i64>,
    /// Backward step bound for update jobs; 0 disables the limit
    pub update_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub name: String,
    pub components: Vec<crate::streaming::ComponentSelector>,
    pub algorithm: crate::algorithm::AlgorithmSpec,
    #[serde(default)]
    pub left_pad: usize,
    #[serde(default)]
    pub right_pad: usize,
    pub max_delay_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub rename: std::collections::HashMap<String, String>,
}
