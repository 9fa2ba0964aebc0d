/// Single bounded processing pass: fetch, transform, store
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::error::{PipelineError, Result};
use crate::factory::TimeseriesFactory;
use crate::timeseries::{pad_set, start_end_times_without_gaps, trim_set};
use crate::types::{DataType, SampleInterval, TimeSeriesSet};

/// Options for one `[start, end]` batch pass
#[derive(Clone)]
pub struct RunOptions {
    pub stations: Vec<String>,
    pub input_channels: Option<Vec<String>>,
    pub output_channels: Option<Vec<String>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub input_interval: SampleInterval,
    pub data_type: DataType,
    pub rename_input: HashMap<String, String>,
    pub rename_output: HashMap<String, String>,
    pub trim: bool,
    /// Realtime window for stateful transforms; the fetched input is
    /// padded with missing markers from the continuation time up to
    /// `max(last present sample, end - window)`
    pub realtime_window: Option<Duration>,
    /// Prefetched input, used by update mode to avoid a double read
    pub input_timeseries: Option<TimeSeriesSet>,
}

impl RunOptions {
    pub fn new(stations: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        RunOptions {
            stations,
            input_channels: None,
            output_channels: None,
            start,
            end,
            input_interval: SampleInterval::Minute,
            data_type: DataType::Variation,
            rename_input: HashMap::new(),
            rename_output: HashMap::new(),
            trim: true,
            realtime_window: None,
            input_timeseries: None,
        }
    }
}

/// Executes one bounded pass between an input source and an output sink.
///
/// The sink is never called when the combined fetch is empty, and a
/// transform failure aborts the pass before anything is stored.
#[derive(Clone)]
pub struct BatchRunner {
    algorithm: Arc<dyn Algorithm>,
    input_factory: Arc<dyn TimeseriesFactory>,
    output_factory: Arc<dyn TimeseriesFactory>,
}

impl BatchRunner {
    pub fn new(
        algorithm: Arc<dyn Algorithm>,
        input_factory: Arc<dyn TimeseriesFactory>,
        output_factory: Arc<dyn TimeseriesFactory>,
    ) -> Self {
        BatchRunner {
            algorithm,
            input_factory,
            output_factory,
        }
    }

    pub fn algorithm(&self) -> &Arc<dyn Algorithm> {
        &self.algorithm
    }

    pub fn output_factory(&self) -> &Arc<dyn TimeseriesFactory> {
        &self.output_factory
    }

    /// Fetch input for all stations, letting the transform negotiate the
    /// span per station. A station whose negotiation returns `None` is
    /// skipped entirely.
    pub(crate) async fn fetch_input(
        &self,
        stations: &[String],
        channels: &[String],
        interval: SampleInterval,
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeriesSet> {
        let mut set = TimeSeriesSet::new();
        for station in stations {
            let Some((input_start, input_end)) =
                self.algorithm.input_interval(start, end, station, channels)
            else {
                debug!("Transform refused span for {}, skipping fetch", station);
                continue;
            };
            let fetched = self
                .input_factory
                .get_timeseries(station, channels, interval, data_type, input_start, input_end)
                .await?;
            set.extend(fetched)?;
        }
        Ok(set)
    }

    /// Run one pass over `[options.start, options.end]`
    pub async fn run(&self, options: &RunOptions) -> Result<()> {
        let input_channels = match &options.input_channels {
            Some(channels) => channels.clone(),
            None => self.algorithm.input_channels(),
        };
        if input_channels.is_empty() {
            return Err(PipelineError::Config(
                "No input channels configured".to_string(),
            ));
        }
        let output_channels = match &options.output_channels {
            Some(channels) => channels.clone(),
            None => self.algorithm.output_channels(),
        };
        let next_starttime = self.algorithm.next_starttime();
        let start = next_starttime.unwrap_or(options.start);
        let end = options.end;

        // input
        let mut timeseries = match &options.input_timeseries {
            Some(prefetched) => prefetched.clone(),
            None => {
                self.fetch_input(
                    &options.stations,
                    &input_channels,
                    options.input_interval,
                    options.data_type,
                    start,
                    end,
                )
                .await?
            }
        };
        if timeseries.is_empty() {
            // no data to process, the sink is never called on empty input
            debug!("No input data for [{} - {}]", start, end);
            return Ok(());
        }

        // pre-process: anchor stateful transforms at their resume point
        if let (Some(resume), Some(window)) = (next_starttime, options.realtime_window) {
            let realtime_gap = end - window;
            let mut usable_end = realtime_gap;
            if let Some((_, last_present)) = start_end_times_without_gaps(&timeseries) {
                if last_present > usable_end {
                    usable_end = last_present;
                }
            }
            pad_set(&mut timeseries, resume, usable_end);
        }

        // process
        if !options.rename_input.is_empty() {
            timeseries.rename_channels(&options.rename_input);
        }
        let mut processed = self.algorithm.process(&timeseries)?;
        if options.trim {
            trim_set(&mut processed, start, end);
        }
        if !options.rename_output.is_empty() {
            processed.rename_channels(&options.rename_output);
        }

        // output
        self.output_factory
            .put_timeseries(&processed, start, end, &output_channels)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::IdentityAlgorithm;
    use crate::factory::MemoryFactory;
    use crate::types::Channel;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, minute / 60, minute % 60, 0).unwrap()
    }

    fn channel(name: &str, start_min: u32, data: Vec<f64>) -> Channel {
        Channel::new(
            "BOU",
            name,
            DataType::Variation,
            SampleInterval::Minute,
            ts(start_min),
            data,
        )
    }

    fn runner(
        algorithm: Arc<dyn Algorithm>,
    ) -> (BatchRunner, MemoryFactory, MemoryFactory) {
        let input = MemoryFactory::new();
        let output = MemoryFactory::new();
        let runner = BatchRunner::new(algorithm, Arc::new(input.clone()), Arc::new(output.clone()));
        (runner, input, output)
    }

    /// Identity transform carrying a continuation time
    struct StatefulStub {
        resume: DateTime<Utc>,
    }

    impl Algorithm for StatefulStub {
        fn name(&self) -> &str {
            "stateful-stub"
        }
        fn process(&self, set: &TimeSeriesSet) -> Result<TimeSeriesSet> {
            Ok(set.clone())
        }
        fn input_channels(&self) -> Vec<String> {
            vec!["H".to_string()]
        }
        fn output_channels(&self) -> Vec<String> {
            vec!["H".to_string()]
        }
        fn next_starttime(&self) -> Option<DateTime<Utc>> {
            Some(self.resume)
        }
    }

    /// Transform that always fails
    struct FailingStub;

    impl Algorithm for FailingStub {
        fn name(&self) -> &str {
            "failing-stub"
        }
        fn process(&self, _set: &TimeSeriesSet) -> Result<TimeSeriesSet> {
            Err(PipelineError::Algorithm("deliberate failure".to_string()))
        }
        fn input_channels(&self) -> Vec<String> {
            vec!["H".to_string()]
        }
        fn output_channels(&self) -> Vec<String> {
            vec!["H".to_string()]
        }
    }

    #[tokio::test]
    async fn test_run_copies_input_to_output() {
        let algorithm = Arc::new(IdentityAlgorithm::new(vec!["H".to_string()]));
        let (runner, input, output) = runner(algorithm);
        input.seed(channel("H", 0, vec![1.0, 2.0, 3.0])).await.unwrap();

        let options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(2));
        runner.run(&options).await.unwrap();

        let stored = output.snapshot("BOU", "H").await.unwrap();
        assert_eq!(stored.data, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_run_is_noop_on_empty_input() {
        let algorithm = Arc::new(IdentityAlgorithm::new(vec!["H".to_string()]));
        let (runner, _input, output) = runner(algorithm);

        let options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(10));
        runner.run(&options).await.unwrap();

        assert_eq!(output.put_count().await, 0);
    }

    #[tokio::test]
    async fn test_transform_failure_stores_nothing() {
        let (runner, input, output) = runner(Arc::new(FailingStub));
        input.seed(channel("H", 0, vec![1.0, 2.0])).await.unwrap();

        let options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(1));
        let result = runner.run(&options).await;

        assert!(matches!(result, Err(PipelineError::Algorithm(_))));
        assert_eq!(output.put_count().await, 0);
    }

    #[tokio::test]
    async fn test_trim_clips_output_to_requested_range() {
        let algorithm = Arc::new(IdentityAlgorithm::new(vec!["H".to_string()]));
        let (runner, input, output) = runner(algorithm);
        input
            .seed(channel("H", 0, vec![1.0, 2.0, 3.0, 4.0, 5.0]))
            .await
            .unwrap();

        let mut options = RunOptions::new(vec!["BOU".to_string()], ts(1), ts(3));
        options.input_timeseries = Some(
            TimeSeriesSet::from_channels(vec![channel("H", 0, vec![1.0, 2.0, 3.0, 4.0, 5.0])])
                .unwrap(),
        );
        runner.run(&options).await.unwrap();

        let stored = output.snapshot("BOU", "H").await.unwrap();
        assert_eq!(stored.start, ts(1));
        assert_eq!(stored.data, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_renames_relabel_input_and_output() {
        let algorithm = Arc::new(IdentityAlgorithm::new(vec!["H_Volt".to_string()]));
        let (runner, input, output) = runner(algorithm);
        input.seed(channel("H", 0, vec![7.0, 8.0])).await.unwrap();

        let mut options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(1));
        options.input_channels = Some(vec!["H".to_string()]);
        options.output_channels = Some(vec!["H_Adj".to_string()]);
        options
            .rename_input
            .insert("H".to_string(), "H_Volt".to_string());
        options
            .rename_output
            .insert("H_Volt".to_string(), "H_Adj".to_string());
        runner.run(&options).await.unwrap();

        let stored = output.snapshot("BOU", "H_Adj").await.unwrap();
        assert_eq!(stored.data, vec![7.0, 8.0]);
    }

    #[tokio::test]
    async fn test_continuation_time_overrides_requested_start() {
        let resume = ts(3);
        let (runner, input, output) = runner(Arc::new(StatefulStub { resume }));
        input
            .seed(channel("H", 0, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .await
            .unwrap();

        let options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(5));
        runner.run(&options).await.unwrap();

        // only data from the continuation time onward is stored
        let stored = output.snapshot("BOU", "H").await.unwrap();
        assert_eq!(stored.start, resume);
        assert_eq!(stored.data, vec![4.0, 5.0, 6.0]);
    }

    #[tokio::test]
    async fn test_realtime_window_pads_to_contiguous_span() {
        let resume = ts(0);
        let (runner, input, output) = runner(Arc::new(StatefulStub { resume }));
        // fetched data ends at minute 2, well before the requested end
        input.seed(channel("H", 0, vec![1.0, 2.0, 3.0])).await.unwrap();

        let mut options = RunOptions::new(vec!["BOU".to_string()], ts(0), ts(10));
        options.realtime_window = Some(Duration::minutes(4));
        runner.run(&options).await.unwrap();

        // padded up to end - window = minute 6
        let stored = output.snapshot("BOU", "H").await.unwrap();
        assert_eq!(stored.len(), 7);
        assert_eq!(stored.data[..3], [1.0, 2.0, 3.0]);
        assert!(stored.data[3..].iter().all(|v| v.is_nan()));
        assert_eq!(output.put_ranges().await, vec![(ts(0), ts(10))]);
    }
}
