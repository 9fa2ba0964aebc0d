/// Linear scaling transform (e.g. volts/bins to nanoteslas)
use crate::error::Result;
use crate::types::TimeSeriesSet;

use super::Algorithm;

/// Multiplies every sample by a constant conversion factor. Missing
/// markers stay missing (`NaN * factor == NaN`).
pub struct ScaleAlgorithm {
    channels: Vec<String>,
    factor: f64,
}

impl ScaleAlgorithm {
    pub fn new(channels: Vec<String>, factor: f64) -> Self {
        ScaleAlgorithm { channels, factor }
    }
}

impl Algorithm for ScaleAlgorithm {
    fn name(&self) -> &str {
        "scale"
    }

    fn process(&self, set: &TimeSeriesSet) -> Result<TimeSeriesSet> {
        let mut out = set.clone();
        if !self.channels.is_empty() {
            out.retain(|c| self.channels.contains(&c.channel));
        }
        for channel in out.iter_mut() {
            for value in &mut channel.data {
                *value *= self.factor;
            }
        }
        Ok(out)
    }

    fn input_channels(&self) -> Vec<String> {
        self.channels.clone()
    }

    fn output_channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, DataType, SampleInterval};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_scale_multiplies_and_keeps_missing() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let set = TimeSeriesSet::from_channels(vec![Channel::new(
            "LLO",
            "U_Volt",
            DataType::Variation,
            SampleInterval::Minute,
            start,
            vec![1.0, f64::NAN, 3.0],
        )])
        .unwrap();
        let algorithm = ScaleAlgorithm::new(vec!["U_Volt".to_string()], 100.0);
        let out = algorithm.process(&set).unwrap();
        let ch = out.select(None, Some("U_Volt"))[0];
        assert_eq!(ch.data[0], 100.0);
        assert!(ch.data[1].is_nan());
        assert_eq!(ch.data[2], 300.0);
    }
}
