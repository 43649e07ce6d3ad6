//! Configuration

use crate::worker::producer::SubmissionMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, warn};

/// Configuration for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of producer threads
    pub producer_count: usize,

    /// Number of consumer threads
    pub consumer_count: usize,

    /// Tasks generated by each producer
    pub tasks_per_producer: usize,

    /// Whether producers wait for each result
    pub submission_mode: SubmissionMode,

    /// Which solver plugin consumers run
    pub solver: SolverKind,

    /// Simulated latency of the compute solver in milliseconds
    pub compute_latency_ms: u64,

    /// Pause between submissions of one producer in milliseconds
    pub produce_interval_ms: u64,

    /// How long the pipeline runs before it is stopped, in milliseconds
    pub run_duration_ms: u64,

    /// Reuse results of compute tasks whose id was already solved
    pub memoize: bool,
}

/// Solver plugins available to the binary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Quadratic equation solver
    Quadratic,
    /// Slow integer-squaring stand-in
    #[serde(alias = "compute")]
    Square,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            producer_count: 3,
            consumer_count: 2,
            tasks_per_producer: 5,
            submission_mode: SubmissionMode::AwaitResult,
            solver: SolverKind::Quadratic,
            compute_latency_ms: 2000,
            produce_interval_ms: 0,
            run_duration_ms: 5000,
            memoize: false,
        }
    }
}

impl Config {
    /// Create a new configuration with custom pool sizes
    pub fn new(producer_count: usize, consumer_count: usize) -> Self {
        Self {
            producer_count,
            consumer_count,
            ..Default::default()
        }
    }

    /// Load configuration from file, environment variables, or defaults
    pub fn load() -> crate::Result<Self> {
        if let Ok(config_path) = env::var("PIPELINE_CONFIG") {
            info!("Loading config from PIPELINE_CONFIG: {}", config_path);
            return Self::from_file(&config_path);
        }

        let default_paths = [
            "pipeline.yaml",
            "pipeline.toml",
            "config/pipeline.yaml",
            "config/pipeline.toml",
        ];

        for path in default_paths {
            if Path::new(path).exists() {
                info!("Loading config from: {}", path);
                return Self::from_file(path);
            }
        }

        if let Some(config) = Self::read_env()? {
            info!("Loaded config from environment variables");
            return Ok(config);
        }

        warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| {
                crate::PipelineError::ConfigError(format!("Failed to load config file: {}", e))
            })?;

        let config: Config = settings.try_deserialize().map_err(|e| {
            crate::PipelineError::ConfigError(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `PIPELINE_*` environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::read_env()?.ok_or_else(|| {
            crate::PipelineError::ConfigError("No environment variables found".to_string())
        })
    }

    // `None` when no variable is set at all; a malformed one is an error.
    fn read_env() -> crate::Result<Option<Self>> {
        let mut config = Self::default();
        let mut found_any = false;

        if let Some(val) = env_count("PIPELINE_PRODUCER_COUNT")? {
            config.producer_count = val;
            found_any = true;
        }

        if let Some(val) = env_count("PIPELINE_CONSUMER_COUNT")? {
            config.consumer_count = val;
            found_any = true;
        }

        if let Some(val) = env_count("PIPELINE_TASKS_PER_PRODUCER")? {
            config.tasks_per_producer = val;
            found_any = true;
        }

        if let Some(val) = env_number("PIPELINE_COMPUTE_LATENCY_MS")? {
            config.compute_latency_ms = val;
            found_any = true;
        }

        if let Some(val) = env_number("PIPELINE_PRODUCE_INTERVAL_MS")? {
            config.produce_interval_ms = val;
            found_any = true;
        }

        if let Some(val) = env_number("PIPELINE_RUN_DURATION_MS")? {
            config.run_duration_ms = val;
            found_any = true;
        }

        if let Ok(val) = env::var("PIPELINE_SUBMISSION_MODE") {
            config.submission_mode = match val.to_lowercase().as_str() {
                "fire_and_forget" | "fire-and-forget" => SubmissionMode::FireAndForget,
                "await_result" | "await-result" => SubmissionMode::AwaitResult,
                _ => {
                    return Err(crate::PipelineError::ConfigError(format!(
                        "Invalid SUBMISSION_MODE: {}",
                        val
                    )))
                }
            };
            found_any = true;
        }

        if let Ok(val) = env::var("PIPELINE_SOLVER") {
            config.solver = match val.to_lowercase().as_str() {
                "quadratic" => SolverKind::Quadratic,
                "square" | "compute" => SolverKind::Square,
                _ => {
                    return Err(crate::PipelineError::ConfigError(format!(
                        "Invalid SOLVER: {}",
                        val
                    )))
                }
            };
            found_any = true;
        }

        if let Ok(val) = env::var("PIPELINE_MEMOIZE") {
            config.memoize = match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(crate::PipelineError::ConfigError(format!(
                        "Invalid MEMOIZE: {}",
                        val
                    )))
                }
            };
            found_any = true;
        }

        if !found_any {
            return Ok(None);
        }

        config.validate()?;
        Ok(Some(config))
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.producer_count == 0 {
            return Err(crate::PipelineError::ConfigError(
                "Producer count must be greater than 0".to_string(),
            ));
        }

        if self.consumer_count == 0 {
            return Err(crate::PipelineError::ConfigError(
                "Consumer count must be greater than 0".to_string(),
            ));
        }

        if self.tasks_per_producer == 0 {
            return Err(crate::PipelineError::ConfigError(
                "Tasks per producer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_number(key: &str) -> crate::Result<Option<u64>> {
    match env::var(key) {
        Ok(val) => val.parse().map(Some).map_err(|e| {
            crate::PipelineError::ConfigError(format!(
                "Invalid {}: {}",
                key.trim_start_matches("PIPELINE_"),
                e
            ))
        }),
        Err(_) => Ok(None),
    }
}

fn env_count(key: &str) -> crate::Result<Option<usize>> {
    env_number(key)?
        .map(|val| {
            usize::try_from(val).map_err(|_| {
                crate::PipelineError::ConfigError(format!(
                    "Invalid {}: {} does not fit this platform",
                    key.trim_start_matches("PIPELINE_"),
                    val
                ))
            })
        })
        .transpose()
}
