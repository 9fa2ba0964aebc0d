/// In-memory timeseries store for tests and local pipelines
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::{Channel, ChannelId, DataType, SampleInterval, TimeSeriesSet};

use super::TimeseriesFactory;

struct MemoryStore {
    channels: HashMap<ChannelId, Channel>,
    get_calls: usize,
    put_calls: usize,
    put_ranges: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Thread-safe in-memory factory. Reads clip stored data to the requested
/// range; writes coalesce into whatever is already stored. Call counters
/// and put ranges are tracked for observability.
#[derive(Clone)]
pub struct MemoryFactory {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        MemoryFactory {
            store: Arc::new(RwLock::new(MemoryStore {
                channels: HashMap::new(),
                get_calls: 0,
                put_calls: 0,
                put_ranges: Vec::new(),
            })),
        }
    }

    /// Insert a channel directly, bypassing call counters
    pub async fn seed(&self, channel: Channel) -> Result<()> {
        let mut store = self.store.write().await;
        let id = channel.id();
        match store.channels.get_mut(&id) {
            Some(existing) => existing.merge(&channel),
            None => {
                store.channels.insert(id, channel);
                Ok(())
            }
        }
    }

    /// Copy of a stored channel, if present
    pub async fn snapshot(&self, station: &str, channel: &str) -> Option<Channel> {
        let store = self.store.read().await;
        store
            .channels
            .get(&ChannelId {
                station: station.to_string(),
                channel: channel.to_string(),
            })
            .cloned()
    }

    pub async fn get_count(&self) -> usize {
        self.store.read().await.get_calls
    }

    pub async fn put_count(&self) -> usize {
        self.store.read().await.put_calls
    }

    /// Ranges of every put call, in call order
    pub async fn put_ranges(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.store.read().await.put_ranges.clone()
    }
}

impl Default for MemoryFactory {
    fn default() -> Self {
        MemoryFactory::new()
    }
}

#[async_trait]
impl TimeseriesFactory for MemoryFactory {
    async fn get_timeseries(
        &self,
        station: &str,
        channels: &[String],
        interval: SampleInterval,
        _data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeriesSet> {
        let mut store = self.store.write().await;
        store.get_calls += 1;
        let mut set = TimeSeriesSet::new();
        for channel in channels {
            let id = ChannelId {
                station: station.to_string(),
                channel: channel.clone(),
            };
            let Some(stored) = store.channels.get(&id) else {
                continue;
            };
            if stored.interval != interval {
                continue;
            }
            let sliced = stored.slice(start, end);
            if !sliced.is_empty() {
                set.insert(sliced)?;
            }
        }
        debug!(
            "Memory get: {} {:?} [{} - {}] -> {} channels",
            station,
            channels,
            start,
            end,
            set.len()
        );
        Ok(set)
    }

    async fn put_timeseries(
        &self,
        set: &TimeSeriesSet,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channels: &[String],
    ) -> Result<()> {
        let mut store = self.store.write().await;
        store.put_calls += 1;
        store.put_ranges.push((start, end));
        for channel in set.iter() {
            if !channels.is_empty() && !channels.contains(&channel.channel) {
                continue;
            }
            let clipped = channel.slice(start, end);
            if clipped.is_empty() {
                continue;
            }
            let id = clipped.id();
            match store.channels.get_mut(&id) {
                Some(existing) => existing.merge(&clipped)?,
                None => {
                    store.channels.insert(id, clipped);
                }
            }
        }
        Ok(())
    }
}
