/// Transform abstraction between input source and output sink
pub mod identity;
pub mod scale;
pub mod sum;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};
use crate::timeseries::{channel_gaps, merge_gaps};
use crate::types::TimeSeriesSet;

pub use identity::IdentityAlgorithm;
pub use scale::ScaleAlgorithm;
pub use sum::SumAlgorithm;

/// A pluggable transform over timeseries sets.
///
/// Implementations are stateless pure functions of their input window
/// unless they report a continuation time via `next_starttime`. Default
/// method implementations give stateless, always-capable behavior so
/// filter/identity/stateful variants share one contract.
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Transform an input set into an output set
    fn process(&self, set: &TimeSeriesSet) -> Result<TimeSeriesSet>;

    /// Channels the transform reads by default
    fn input_channels(&self) -> Vec<String>;

    /// Channels the transform writes by default
    fn output_channels(&self) -> Vec<String>;

    /// Channels that must carry data for output to be producible
    fn required_channels(&self) -> Vec<String> {
        self.input_channels()
    }

    /// Continuation time for stateful transforms; `None` means stateless
    fn next_starttime(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Negotiate the input span needed to produce `[start, end]` for one
    /// station. Returning `None` refuses the span and skips the fetch.
    fn input_interval(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _station: &str,
        _channels: &[String],
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((start, end))
    }

    /// Whether the transform can produce output for `[start, end]` given
    /// the candidate input.
    ///
    /// The default rejects only when one merged gap in the required input
    /// channels swallows the entire requested range.
    fn can_produce_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        input: &TimeSeriesSet,
    ) -> bool {
        let required = self.required_channels();
        let mut by_channel = std::collections::HashMap::new();
        for channel in input.iter() {
            if !required.is_empty() && !required.contains(&channel.channel) {
                continue;
            }
            by_channel
                .entry(channel.channel.clone())
                .or_insert_with(Vec::new)
                .extend(channel_gaps(channel));
        }
        for gap in merge_gaps(&by_channel) {
            if start >= gap.start && start <= gap.end && end < gap.next_start {
                return false;
            }
        }
        true
    }
}

/// Declarative algorithm selection, used by configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlgorithmSpec {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
    pub factor: Option<f64>,
    pub output_channel: Option<String>,
}

/// Build an algorithm from its declarative spec
pub fn from_spec(spec: &AlgorithmSpec) -> Result<Arc<dyn Algorithm>> {
    match spec.name.as_str() {
        "identity" => Ok(Arc::new(IdentityAlgorithm::new(spec.channels.clone()))),
        "scale" => {
            let factor = spec.factor.ok_or_else(|| {
                PipelineError::Config("scale algorithm requires a factor".to_string())
            })?;
            Ok(Arc::new(ScaleAlgorithm::new(spec.channels.clone(), factor)))
        }
        "sum" => {
            let output = spec.output_channel.clone().ok_or_else(|| {
                PipelineError::Config("sum algorithm requires an output_channel".to_string())
            })?;
            Ok(Arc::new(SumAlgorithm::new(spec.channels.clone(), output)))
        }
        other => Err(PipelineError::Config(format!(
            "Unknown algorithm: {}",
            other
        ))),
    }
}
