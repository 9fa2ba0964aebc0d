/// Configuration loading from TOML file
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::types::{Config, JobMode};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("Failed to read config file: {}", e)))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;

    // Validate config
    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    // Validate station epochs
    for station in &config.stations {
        if station.code.is_empty() {
            return Err(PipelineError::Config("Station code is empty".to_string()));
        }
        for epoch in &station.epochs {
            if let Some(end) = epoch.end {
                if end <= epoch.start {
                    return Err(PipelineError::Config(format!(
                        "Station {} has an epoch ending before it starts",
                        station.code
                    )));
                }
            }
        }
    }

    // Validate jobs
    for job in &config.jobs {
        if job.name.is_empty() {
            return Err(PipelineError::Config("Job name is empty".to_string()));
        }
        if job.stations.is_empty() {
            return Err(PipelineError::Config(format!(
                "Job {} has no stations",
                job.name
            )));
        }
        if job.end <= job.start {
            return Err(PipelineError::Config(format!(
                "Job {}: end must be after start",
                job.name
            )));
        }
        if let Some(window) = job.realtime_window_secs {
            if window <= 0 {
                return Err(PipelineError::Config(format!(
                    "Job {}: realtime_window_secs must be positive",
                    job.name
                )));
            }
        }
        if job.mode == JobMode::Batch && job.update_limit.is_some() {
            return Err(PipelineError::Config(format!(
                "Job {}: update_limit only applies to update mode",
                job.name
            )));
        }
    }

    // Validate streaming graph
    for controller in &config.controllers {
        if controller.components.is_empty() {
            return Err(PipelineError::Config(format!(
                "Controller {} has no components",
                controller.name
            )));
        }
    }
    for edge in &config.edges {
        let known = |name: &str| config.controllers.iter().any(|c| c.name == name);
        if !known(&edge.from) || !known(&edge.to) {
            return Err(PipelineError::Config(format!(
                "Edge {} -> {} references an unknown controller",
                edge.from, edge.to
            )));
        }
    }

    Ok(())
}
