/// Pull/push interface to timeseries stores
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{DataType, SampleInterval, TimeSeriesSet};

pub use memory::MemoryFactory;

/// Source/sink abstraction over a timeseries store.
///
/// `get_timeseries` may return partial data (fewer channels or shorter
/// ranges than requested) rather than padding; callers that need full
/// coverage pad the result themselves. I/O failures surface as
/// `PipelineError::Factory` and are not retried here.
#[async_trait]
pub trait TimeseriesFactory: Send + Sync {
    async fn get_timeseries(
        &self,
        station: &str,
        channels: &[String],
        interval: SampleInterval,
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeriesSet>;

    async fn put_timeseries(
        &self,
        set: &TimeSeriesSet,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channels: &[String],
    ) -> Result<()>;
}
