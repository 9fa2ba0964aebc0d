/// Gap-aware update: discover missing output spans and recompute them
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::timeseries::{merge_gaps, pad_set, set_gaps, Gap};
use crate::types::{DataType, SampleInterval, TimeSeriesSet};

use super::batch::{BatchRunner, RunOptions};

/// Options for a gap-scanning update over `[start, end]`
#[derive(Clone)]
pub struct UpdateOptions {
    pub stations: Vec<String>,
    /// Stations to scan on the output side; defaults to `stations`
    pub output_stations: Option<Vec<String>>,
    pub input_channels: Option<Vec<String>>,
    pub output_channels: Option<Vec<String>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub input_interval: SampleInterval,
    pub output_interval: SampleInterval,
    pub data_type: DataType,
    pub rename_input: HashMap<String, String>,
    pub rename_output: HashMap<String, String>,
    pub trim: bool,
    pub realtime_window: Option<Duration>,
    /// Maximum number of backward steps; 0 disables the limit entirely,
    /// which can walk arbitrarily far into the past when input keeps
    /// being available
    pub update_limit: usize,
}

impl UpdateOptions {
    pub fn new(stations: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        UpdateOptions {
            stations,
            output_stations: None,
            input_channels: None,
            output_channels: None,
            start,
            end,
            input_interval: SampleInterval::Minute,
            output_interval: SampleInterval::Minute,
            data_type: DataType::Variation,
            rename_input: HashMap::new(),
            rename_output: HashMap::new(),
            trim: true,
            realtime_window: None,
            update_limit: 1,
        }
    }
}

/// One fillable gap with the input already fetched for its span
struct GapPlan {
    gap: Gap,
    input: TimeSeriesSet,
}

/// One scanned window and its fillable gaps
struct Frame {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    plans: Vec<GapPlan>,
}

/// Drives a `BatchRunner` once per discovered output gap, extending
/// backward through preceding windows when the front of the range is
/// itself missing.
///
/// Backward extension is tracked as an explicit stack of window frames
/// rather than call-stack recursion, so an unlimited walk cannot overflow
/// the stack. Frames execute deepest-first, which keeps every batch pass
/// strictly ordered oldest to newest.
pub struct UpdateOrchestrator {
    runner: BatchRunner,
}

impl UpdateOrchestrator {
    pub fn new(runner: BatchRunner) -> Self {
        UpdateOrchestrator { runner }
    }

    async fn fetch_output(
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
            let fetched = self
                .runner
                .output_factory()
                .get_timeseries(station, channels, interval, data_type, start, end)
                .await?;
            set.extend(fetched)?;
        }
        Ok(set)
    }

    /// Scan `[start, end]` for output gaps and recompute every gap whose
    /// input can produce data, oldest first.
    ///
    /// Gaps the transform declines are left untouched; hitting the
    /// backward limit stops the walk. Neither is an error.
    pub async fn run_as_update(&self, options: &UpdateOptions) -> Result<()> {
        let algorithm = self.runner.algorithm();
        if algorithm.next_starttime().is_some() {
            return Err(PipelineError::Algorithm(
                "Stateful algorithms cannot run in update mode".to_string(),
            ));
        }
        let input_channels = match &options.input_channels {
            Some(channels) => channels.clone(),
            None => algorithm.input_channels(),
        };
        let output_channels = match &options.output_channels {
            Some(channels) => channels.clone(),
            None => algorithm.output_channels(),
        };
        let output_stations = options
            .output_stations
            .clone()
            .unwrap_or_else(|| options.stations.clone());

        // discovery: walk windows backward, planning fillable gaps
        let mut frames: Vec<Frame> = Vec::new();
        let mut window_start = options.start;
        let mut window_end = options.end;
        let mut depth: usize = 0;
        loop {
            if options.update_limit > 0 && depth >= options.update_limit {
                // silent stop, bounded work beats completeness here
                debug!("Backward limit {} reached", options.update_limit);
                break;
            }
            info!(
                "🔍 Checking gaps [{} - {}] {:?} {:?}",
                window_start, window_end, output_stations, output_channels
            );
            let mut output = self
                .fetch_output(
                    &output_stations,
                    &output_channels,
                    options.output_interval,
                    options.data_type,
                    window_start,
                    window_end,
                )
                .await?;
            let gaps = if output.is_empty() {
                // nothing stored yet, the whole window is one gap
                vec![Gap {
                    start: window_start,
                    end: window_end,
                    next_start: window_end + options.output_interval.delta(),
                }]
            } else {
                // returned channels may cover less than the window;
                // pad so leading/trailing holes show up as gaps
                pad_set(&mut output, window_start, window_end);
                merge_gaps(&set_gaps(&output))
            };

            let mut plans = Vec::new();
            let mut descend = false;
            for gap in gaps {
                let input = self
                    .runner
                    .fetch_input(
                        &options.stations,
                        &input_channels,
                        options.input_interval,
                        options.data_type,
                        gap.start,
                        gap.end,
                    )
                    .await?;
                if !algorithm.can_produce_data(gap.start, gap.end, &input) {
                    debug!("Input cannot produce [{} - {}], skipping", gap.start, gap.end);
                    continue;
                }
                if gap.start == window_start {
                    // fillable gap at the window front, the preceding
                    // window may be fillable too
                    descend = true;
                }
                plans.push(GapPlan { gap, input });
            }
            frames.push(Frame {
                start: window_start,
                end: window_end,
                plans,
            });
            if !descend {
                break;
            }
            let span = window_end - window_start;
            window_end = window_start - Duration::seconds(1);
            window_start = window_start - span;
            depth += 1;
        }

        // execution: deepest window first keeps passes oldest-to-newest
        for frame in frames.iter().rev() {
            for plan in &frame.plans {
                info!(
                    "📊 Processing gap [{} - {}] {:?} {:?}",
                    plan.gap.start, plan.gap.end, output_stations, output_channels
                );
                let run_options = RunOptions {
                    stations: options.stations.clone(),
                    input_channels: Some(input_channels.clone()),
                    output_channels: Some(output_channels.clone()),
                    start: plan.gap.start,
                    end: plan.gap.end,
                    input_interval: options.input_interval,
                    data_type: options.data_type,
                    rename_input: options.rename_input.clone(),
                    rename_output: options.rename_output.clone(),
                    trim: options.trim,
                    realtime_window: options.realtime_window,
                    input_timeseries: Some(plan.input.clone()),
                };
                self.runner.run(&run_options).await?;
            }
            debug!(
                "✅ Window [{} - {}] complete: {} gap(s) filled",
                frame.start,
                frame.end,
                frame.plans.len()
            );
        }
        Ok(())
    }
}
