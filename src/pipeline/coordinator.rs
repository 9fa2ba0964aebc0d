/// Fork-join execution of independent processing jobs
use std::sync::Arc;

use chrono::Duration;
use futures_util::future::join_all;
use tracing::{error, info};

use crate::algorithm;
use crate::error::{PipelineError, Result};
use crate::factory::TimeseriesFactory;
use crate::metadata::MetadataRegistry;
use crate::types::{Config, JobMode};

use super::batch::{BatchRunner, RunOptions};
use super::update::{UpdateOptions, UpdateOrchestrator};

/// What a single task should run
pub enum JobSpec {
    Batch(RunOptions),
    Update(UpdateOptions),
}

/// One independent pipeline: its own transform, factories, and span
pub struct PipelineTask {
    pub name: String,
    pub runner: BatchRunner,
    pub spec: JobSpec,
}

/// Outcome of one task
pub struct JobReport {
    pub name: String,
    pub result: Result<()>,
}

/// Run all tasks concurrently and wait for every one to finish.
///
/// Tasks are independent: a failed task is reported and does not abort its
/// siblings. There is no ordering guarantee between tasks.
pub async fn run_all(tasks: Vec<PipelineTask>) -> Vec<JobReport> {
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(tokio::spawn(async move {
            let name = task.name;
            let result = match task.spec {
                JobSpec::Batch(options) => task.runner.run(&options).await,
                JobSpec::Update(options) => {
                    UpdateOrchestrator::new(task.runner)
                        .run_as_update(&options)
                        .await
                }
            };
            match &result {
                Ok(()) => info!("✅ Job finished: {}", name),
                Err(e) => error!("❌ Job failed: {} - {} ({})", name, e, e.error_code()),
            }
            JobReport { name, result }
        }));
    }
    let mut reports = Vec::new();
    for joined in join_all(handles).await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => reports.push(JobReport {
                name: "<panicked>".to_string(),
                result: Err(PipelineError::Internal(format!("Task panicked: {}", e))),
            }),
        }
    }
    reports
}

/// Build runnable tasks from configured jobs.
///
/// Channels and interval default from the station registry when a job
/// omits them; the first listed station's epoch at the job start decides.
pub fn tasks_from_config(
    config: &Config,
    registry: &MetadataRegistry,
    input_factory: Arc<dyn TimeseriesFactory>,
    output_factory: Arc<dyn TimeseriesFactory>,
) -> Result<Vec<PipelineTask>> {
    let mut tasks = Vec::new();
    for job in &config.jobs {
        let algorithm = algorithm::from_spec(&job.algorithm)?;
        let station = job.stations.first().ok_or_else(|| {
            PipelineError::Config(format!("Job {} has no stations", job.name))
        })?;

        let input_channels = match &job.input_channels {
            Some(channels) => Some(channels.clone()),
            None if algorithm.input_channels().is_empty() => {
                Some(registry.default_channels(station, job.start)?)
            }
            None => None,
        };
        let interval = match job.input_interval {
            Some(interval) => interval,
            None => registry.default_interval(station, job.start)?,
        };
        let output_interval = job.output_interval.unwrap_or(interval);

        let runner = BatchRunner::new(
            algorithm,
            Arc::clone(&input_factory),
            Arc::clone(&output_factory),
        );
        let spec = match job.mode {
            JobMode::Batch => {
                let mut options = RunOptions::new(job.stations.clone(), job.start, job.end);
                options.input_channels = input_channels;
                options.output_channels = job.output_channels.clone();
                options.input_interval = interval;
                options.data_type = job.data_type.unwrap_or_default();
                options.rename_input = job.rename_input.clone().unwrap_or_default();
                options.rename_output = job.rename_output.clone().unwrap_or_default();
                options.trim = job.trim.unwrap_or(true);
                options.realtime_window = job.realtime_window_secs.map(Duration::seconds);
                JobSpec::Batch(options)
            }
            JobMode::Update => {
                let mut options = UpdateOptions::new(job.stations.clone(), job.start, job.end);
                options.output_stations = job.output_stations.clone();
                options.input_channels = input_channels;
                options.output_channels = job.output_channels.clone();
                options.input_interval = interval;
                options.output_interval = output_interval;
                options.data_type = job.data_type.unwrap_or_default();
                options.rename_input = job.rename_input.clone().unwrap_or_default();
                options.rename_output = job.rename_output.clone().unwrap_or_default();
                options.trim = job.trim.unwrap_or(true);
                options.realtime_window = job.realtime_window_secs.map(Duration::seconds);
                options.update_limit = job.update_limit.unwrap_or(1);
                JobSpec::Update(options)
            }
        };
        tasks.push(PipelineTask {
            name: job.name.clone(),
            runner,
            spec,
        });
    }
    Ok(tasks)
}
