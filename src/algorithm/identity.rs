/// Pass-through transform
use crate::error::Result;
use crate::types::TimeSeriesSet;

use super::Algorithm;

/// Copies input to output unchanged, optionally restricted to a channel
/// list. An empty channel list passes everything through.
pub struct IdentityAlgorithm {
    channels: Vec<String>,
}

impl IdentityAlgorithm {
    pub fn new(channels: Vec<String>) -> Self {
        IdentityAlgorithm { channels }
    }
}

impl Algorithm for IdentityAlgorithm {
    fn name(&self) -> &str {
        "identity"
    }

    fn process(&self, set: &TimeSeriesSet) -> Result<TimeSeriesSet> {
        if self.channels.is_empty() {
            return Ok(set.clone());
        }
        let mut out = set.clone();
        out.retain(|c| self.channels.contains(&c.channel));
        Ok(out)
    }

    fn input_channels(&self) -> Vec<String> {
        self.channels.clone()
    }

    fn output_channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}
