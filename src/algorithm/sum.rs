/// Pointwise sum of aligned channels into a single output channel
use crate::error::{PipelineError, Result};
use crate::types::{Channel, TimeSeriesSet};

use super::Algorithm;

/// Sums all configured input channels sample by sample. Input channels
/// must share interval, start, and length; a missing sample in any input
/// makes the output sample missing.
pub struct SumAlgorithm {
    channels: Vec<String>,
    output_channel: String,
}

impl SumAlgorithm {
    pub fn new(channels: Vec<String>, output_channel: impl Into<String>) -> Self {
        SumAlgorithm {
            channels,
            output_channel: output_channel.into(),
        }
    }
}

impl Algorithm for SumAlgorithm {
    fn name(&self) -> &str {
        "sum"
    }

    fn process(&self, set: &TimeSeriesSet) -> Result<TimeSeriesSet> {
        let inputs: Vec<&Channel> = set
            .iter()
            .filter(|c| self.channels.is_empty() || self.channels.contains(&c.channel))
            .collect();
        if inputs.is_empty() {
            return Err(PipelineError::Algorithm(
                "Sum has no input channels to combine".to_string(),
            ));
        }
        let first = inputs[0];
        for other in &inputs[1..] {
            if other.interval != first.interval
                || other.start != first.start
                || other.len() != first.len()
            {
                return Err(PipelineError::Algorithm(format!(
                    "Sum inputs are not aligned: {}/{} vs {}/{}",
                    first.station, first.channel, other.station, other.channel
                )));
            }
        }
        let mut data = vec![0.0; first.len()];
        for input in &inputs {
            for (acc, v) in data.iter_mut().zip(&input.data) {
                *acc += v;
            }
        }
        let output = Channel::new(
            first.station.clone(),
            self.output_channel.clone(),
            first.data_type,
            first.interval,
            first.start,
            data,
        );
        TimeSeriesSet::from_channels(vec![output])
    }

    fn input_channels(&self) -> Vec<String> {
        self.channels.clone()
    }

    fn output_channels(&self) -> Vec<String> {
        vec![self.output_channel.clone()]
    }
}
