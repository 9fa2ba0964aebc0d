/// Push-driven windowed processing over a per-controller buffer
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::error::{PipelineError, Result};
use crate::timeseries::slice_set;
use crate::types::{Channel, SampleInterval, TimeSeriesSet};

/// Which channel must be present for a controller to act
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSelector {
    pub station: Option<String>,
    pub channel: String,
}

impl ComponentSelector {
    pub fn new(station: Option<String>, channel: impl Into<String>) -> Self {
        ComponentSelector {
            station,
            channel: channel.into(),
        }
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        self.station.as_deref().map_or(true, |s| channel.station == s)
            && channel.channel == self.channel
    }
}

/// Stateful controller that buffers pushed data per configured component,
/// runs the transform once all components overlap by more than the
/// configured pads, and trims the buffer down to the trailing look-back
/// window afterwards.
///
/// `on_data` takes `&mut self`: calls on one controller are serialized in
/// arrival order by construction. Use `SharedController` when several
/// producers feed the same instance.
pub struct StreamController {
    components: Vec<ComponentSelector>,
    algorithm: Arc<dyn Algorithm>,
    /// Wall-clock staleness bound for buffered data while some component
    /// has not arrived yet; `None` disables the bound
    max_delay: Option<Duration>,
    /// Context samples required before a processing point
    left_pad: usize,
    /// Context samples required after a processing point
    right_pad: usize,
    buffer: TimeSeriesSet,
}

impl StreamController {
    pub fn new(
        components: Vec<ComponentSelector>,
        algorithm: Arc<dyn Algorithm>,
        max_delay: Option<Duration>,
        left_pad: usize,
        right_pad: usize,
    ) -> Self {
        StreamController {
            components,
            algorithm,
            max_delay,
            left_pad,
            right_pad,
            buffer: TimeSeriesSet::new(),
        }
    }

    /// Buffered data retained since the last trim
    pub fn buffer(&self) -> &TimeSeriesSet {
        &self.buffer
    }

    /// Range covered by every configured component, with the shared
    /// sample interval; `None` while any component has no data yet
    fn overlap(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, SampleInterval)>> {
        let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        let mut interval: Option<SampleInterval> = None;
        for selector in &self.components {
            let matched: Vec<&Channel> = self
                .buffer
                .iter()
                .filter(|c| selector.matches(c) && !c.is_empty())
                .collect();
            if matched.len() > 1 {
                return Err(PipelineError::Streaming(format!(
                    "Expected one channel for component {:?}/{}",
                    selector.station, selector.channel
                )));
            }
            let Some(channel) = matched.first() else {
                return Ok(None);
            };
            match interval {
                None => interval = Some(channel.interval),
                Some(existing) if existing != channel.interval => {
                    return Err(PipelineError::Streaming(
                        "Components have mixed sample intervals".to_string(),
                    ));
                }
                Some(_) => {}
            }
            let end = channel.end_time().unwrap();
            range = Some(match range {
                None => (channel.start, end),
                Some((s, e)) => (s.max(channel.start), e.min(end)),
            });
        }
        match (range, interval) {
            (Some((start, end)), Some(interval)) => Ok(Some((start, end, interval))),
            _ => Ok(None),
        }
    }

    fn trim_before(&mut self, cutoff: DateTime<Utc>) {
        for channel in self.buffer.iter_mut() {
            if let Some(end) = channel.end_time() {
                channel.trim(cutoff, end);
            }
        }
        self.buffer.drop_empty();
    }

    /// Feed new samples into the controller.
    ///
    /// Returns the transform output for the overlapping window, or an
    /// empty set while the configured components do not yet overlap by
    /// more than `left_pad + right_pad` sample intervals.
    pub fn on_data(&mut self, incoming: &TimeSeriesSet) -> Result<TimeSeriesSet> {
        for channel in incoming.iter() {
            if self.components.iter().any(|s| s.matches(channel)) {
                self.buffer.insert(channel.clone())?;
            }
        }
        match self.overlap()? {
            Some((start, end, interval)) => {
                let delta = interval.delta();
                let required = delta * ((self.left_pad + self.right_pad) as i32);
                if end - start <= required {
                    return Ok(TimeSeriesSet::new());
                }
                let window = slice_set(&self.buffer, start, end);
                let output = self.algorithm.process(&window)?;
                // keep only the trailing look-back needed for continuity
                let cutoff = std::cmp::max(start, end - delta * (self.left_pad as i32));
                self.trim_before(cutoff);
                debug!(
                    "Processed window [{} - {}], buffer trimmed to {}",
                    start, end, cutoff
                );
                Ok(output)
            }
            None => {
                if let Some(max_delay) = self.max_delay {
                    // bound memory while a component never arrives
                    let pad = self
                        .buffer
                        .iter()
                        .next()
                        .map(|c| c.delta() * (self.left_pad as i32))
                        .unwrap_or_else(Duration::zero);
                    let cutoff = Utc::now() - pad - max_delay;
                    self.trim_before(cutoff);
                }
                Ok(TimeSeriesSet::new())
            }
        }
    }
}

/// Serializes `on_data` calls from multiple producers onto one controller
pub struct SharedController {
    inner: Arc<Mutex<StreamController>>,
}

impl SharedController {
    pub fn new(controller: StreamController) -> Self {
        SharedController {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub async fn on_data(&self, incoming: &TimeSeriesSet) -> Result<TimeSeriesSet> {
        let mut controller = self.inner.lock().await;
        controller.on_data(incoming)
    }
}

impl Clone for SharedController {
    fn clone(&self) -> Self {
        SharedController {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{IdentityAlgorithm, SumAlgorithm};
    use crate::types::DataType;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, minute, 0).unwrap()
    }

    fn channel(name: &str, start_min: u32, data: Vec<f64>) -> Channel {
        Channel::new(
            "LLO",
            name,
            DataType::Variation,
            SampleInterval::Minute,
            ts(start_min),
            data,
        )
    }

    fn set(channels: Vec<Channel>) -> TimeSeriesSet {
        TimeSeriesSet::from_channels(channels).unwrap()
    }

    fn two_component_controller(left_pad: usize, right_pad: usize) -> StreamController {
        StreamController::new(
            vec![
                ComponentSelector::new(Some("LLO".to_string()), "BEU"),
                ComponentSelector::new(Some("LLO".to_string()), "BYU"),
            ],
            Arc::new(IdentityAlgorithm::new(vec![])),
            None,
            left_pad,
            right_pad,
        )
    }

    #[test]
    fn test_no_output_until_all_components_overlap() {
        let mut controller = two_component_controller(0, 0);

        let out = controller
            .on_data(&set(vec![channel("BEU", 1, vec![1.0, 2.0, 3.0, 4.0, 5.0])]))
            .unwrap();
        assert!(out.is_empty());

        let out = controller
            .on_data(&set(vec![channel("BYU", 2, vec![2.0, 3.0, 4.0, 5.0, 6.0])]))
            .unwrap();
        assert!(!out.is_empty());
        let ch = out.select(None, Some("BEU"))[0];
        assert_eq!(ch.start, ts(2));
        assert_eq!(ch.len(), 4);
    }

    #[test]
    fn test_overlap_must_exceed_pads() {
        let mut controller = two_component_controller(2, 2);

        // 5-sample overlap spans 4 intervals, not more than left+right=4
        controller
            .on_data(&set(vec![channel("BEU", 0, vec![1.0; 5])]))
            .unwrap();
        let out = controller
            .on_data(&set(vec![channel("BYU", 0, vec![1.0; 5])]))
            .unwrap();
        assert!(out.is_empty());

        // one more sample pushes the overlap past the pads
        let out = controller
            .on_data(&set(vec![channel("BEU", 5, vec![9.0]), channel("BYU", 5, vec![9.0])]))
            .unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_buffer_trimmed_to_lookback_and_still_usable() {
        let mut controller = two_component_controller(2, 0);

        controller
            .on_data(&set(vec![channel("BEU", 0, vec![1.0; 6])]))
            .unwrap();
        let out = controller
            .on_data(&set(vec![channel("BYU", 0, vec![2.0; 6])]))
            .unwrap();
        assert!(!out.is_empty());

        // retained tail starts at overlap.end - left_pad intervals
        for ch in controller.buffer().iter() {
            assert_eq!(ch.start, ts(3));
            assert_eq!(ch.len(), 3);
        }

        // new data appended to the tail still forms a processable window
        let out = controller
            .on_data(&set(vec![channel("BEU", 6, vec![3.0; 3]), channel("BYU", 6, vec![4.0; 3])]))
            .unwrap();
        assert!(!out.is_empty());
        let ch = out.select(None, Some("BEU"))[0];
        assert_eq!(ch.start, ts(3));
    }

    #[test]
    fn test_unconfigured_channels_are_ignored() {
        let mut controller = two_component_controller(0, 0);
        controller
            .on_data(&set(vec![channel("XYZ", 0, vec![1.0; 5])]))
            .unwrap();
        assert!(controller.buffer().is_empty());
    }

    #[test]
    fn test_stale_data_trimmed_while_component_missing() {
        let mut controller = StreamController::new(
            vec![
                ComponentSelector::new(None, "BEU"),
                ComponentSelector::new(None, "BYU"),
            ],
            Arc::new(IdentityAlgorithm::new(vec![])),
            Some(Duration::minutes(10)),
            0,
            0,
        );

        // hour-old data for one component, the other never arrives
        let old_start = Utc::now() - Duration::minutes(60);
        let old = Channel::new(
            "LLO",
            "BEU",
            DataType::Variation,
            SampleInterval::Minute,
            old_start,
            vec![1.0; 5],
        );
        let out = controller
            .on_data(&TimeSeriesSet::from_channels(vec![old]).unwrap())
            .unwrap();
        assert!(out.is_empty());
        assert!(controller.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_shared_controller_serializes_producers() {
        let shared = SharedController::new(two_component_controller(0, 0));
        let other = shared.clone();

        let out = shared
            .on_data(&set(vec![channel("BEU", 0, vec![1.0; 5])]))
            .await
            .unwrap();
        assert!(out.is_empty());

        let out = other
            .on_data(&set(vec![channel("BYU", 0, vec![2.0; 5])]))
            .await
            .unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_sum_pipeline_scenario() {
        let mut controller = StreamController::new(
            vec![
                ComponentSelector::new(Some("LLO".to_string()), "BYU"),
                ComponentSelector::new(Some("LLO".to_string()), "BEU"),
            ],
            Arc::new(SumAlgorithm::new(
                vec!["BYU".to_string(), "BEU".to_string()],
                "U",
            )),
            None,
            0,
            0,
        );

        let out = controller
            .on_data(&set(vec![channel("BYU", 2, vec![10.0, 20.0, 30.0, 40.0, 50.0])]))
            .unwrap();
        assert!(out.is_empty());

        let out = controller
            .on_data(&set(vec![channel("BEU", 2, vec![1.0, 2.0, 3.0, 4.0, 5.0])]))
            .unwrap();
        let ch = out.select(None, Some("U"))[0];
        assert_eq!(ch.start, ts(2));
        assert_eq!(ch.data, vec![11.0, 22.0, 33.0, 44.0, 55.0]);
    }
}
