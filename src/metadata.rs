/// Station metadata registry, built once at startup and passed by reference
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{Config, SampleInterval};

/// One validity period of a station's instrumentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEpoch {
    pub start: DateTime<Utc>,
    /// Open-ended when absent
    pub end: Option<DateTime<Utc>>,
    pub interval: SampleInterval,
    pub channels: Vec<String>,
}

impl MetadataEpoch {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && self.end.map_or(true, |end| time < end)
    }
}

/// Static description of one observatory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationMetadata {
    pub station: String,
    pub agency: Option<String>,
    pub epochs: Vec<MetadataEpoch>,
}

/// Lookup table from station code to metadata epochs.
///
/// Constructed explicitly at startup; there is no process-wide registry.
pub struct MetadataRegistry {
    stations: HashMap<String, StationMetadata>,
}

impl MetadataRegistry {
    pub fn new(stations: Vec<StationMetadata>) -> Self {
        MetadataRegistry {
            stations: stations
                .into_iter()
                .map(|s| (s.station.clone(), s))
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let stations = config
            .stations
            .iter()
            .map(|s| StationMetadata {
                station: s.code.clone(),
                agency: s.agency.clone(),
                epochs: s.epochs.clone(),
            })
            .collect();
        MetadataRegistry::new(stations)
    }

    pub fn get(&self, station: &str) -> Option<&StationMetadata> {
        self.stations.get(station)
    }

    /// Epoch in effect at `time`; latest matching epoch wins
    pub fn epoch_for(&self, station: &str, time: DateTime<Utc>) -> Result<&MetadataEpoch> {
        let metadata = self
            .stations
            .get(station)
            .ok_or_else(|| PipelineError::UnknownStation(station.to_string()))?;
        metadata
            .epochs
            .iter()
            .filter(|epoch| epoch.contains(time))
            .max_by_key(|epoch| epoch.start)
            .ok_or_else(|| {
                PipelineError::Metadata(format!(
                    "No metadata epoch for {} at {}",
                    station, time
                ))
            })
    }

    pub fn default_channels(&self, station: &str, time: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self.epoch_for(station, time)?.channels.clone())
    }

    pub fn default_interval(&self, station: &str, time: DateTime<Utc>) -> Result<SampleInterval> {
        Ok(self.epoch_for(station, time)?.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new(vec![StationMetadata {
            station: "BOU".to_string(),
            agency: Some("USGS".to_string()),
            epochs: vec![
                MetadataEpoch {
                    start: Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
                    end: Some(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()),
                    interval: SampleInterval::Second,
                    channels: vec!["H".to_string(), "E".to_string()],
                },
                MetadataEpoch {
                    start: Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(),
                    end: None,
                    interval: SampleInterval::Minute,
                    channels: vec!["H".to_string(), "E".to_string(), "Z".to_string()],
                },
            ],
        }])
    }

    #[test]
    fn test_epoch_resolution_picks_containing_epoch() {
        let registry = registry();
        let old = registry
            .epoch_for("BOU", Utc.with_ymd_and_hms(2012, 6, 1, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(old.interval, SampleInterval::Second);

        let current = registry
            .epoch_for("BOU", Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(current.interval, SampleInterval::Minute);
        assert_eq!(current.channels.len(), 3);
    }

    #[test]
    fn test_unknown_station_is_an_error() {
        let registry = registry();
        let time = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            registry.epoch_for("XYZ", time),
            Err(PipelineError::UnknownStation(_))
        ));
    }

    #[test]
    fn test_time_before_all_epochs_is_an_error() {
        let registry = registry();
        let time = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert!(registry.epoch_for("BOU", time).is_err());
    }
}
