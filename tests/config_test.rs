use std::time::Duration;
use task_pipeline_rs::config::{Config, SolverKind};
use task_pipeline_rs::worker::pool::PipelineOptions;
use task_pipeline_rs::worker::producer::SubmissionMode;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.producer_count, 3);
    assert_eq!(config.consumer_count, 2);
    assert_eq!(config.tasks_per_producer, 5);
    assert_eq!(config.submission_mode, SubmissionMode::AwaitResult);
    assert_eq!(config.solver, SolverKind::Quadratic);
    assert!(!config.memoize);
}

#[test]
fn test_config_validation() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.producer_count = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.tasks_per_producer = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_custom_config() {
    let config = Config::new(8, 4);
    assert_eq!(config.producer_count, 8);
    assert_eq!(config.consumer_count, 4);
}

#[test]
fn test_pipeline_options_from_config() {
    let mut config = Config::new(2, 3);
    config.produce_interval_ms = 15;
    config.submission_mode = SubmissionMode::FireAndForget;

    let options = PipelineOptions::from(&config);
    assert_eq!(options.producer_count, 2);
    assert_eq!(options.consumer_count, 3);
    assert_eq!(options.tasks_per_producer, 5);
    assert_eq!(options.mode, SubmissionMode::FireAndForget);
    assert_eq!(options.produce_interval, Duration::from_millis(15));
}
