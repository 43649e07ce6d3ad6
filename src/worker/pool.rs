use crate::config::Config;
use crate::storage::Store;
use crate::task::solver::Solver;
use crate::worker::producer::{Producer, ProducerReport, SkipFilter, SubmissionMode, TaskSource};
use crate::worker::{Consumer, ConsumerReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Sizing and behaviour of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Number of producer threads
    pub producer_count: usize,
    /// Number of consumer threads
    pub consumer_count: usize,
    /// Tasks generated by each producer
    pub tasks_per_producer: usize,
    /// How producers treat their tickets
    pub mode: SubmissionMode,
    /// Pause between submissions of one producer
    pub produce_interval: Duration,
}

impl PipelineOptions {
    /// Options with the given sizes and default behaviour
    pub fn new(producer_count: usize, consumer_count: usize, tasks_per_producer: usize) -> Self {
        Self {
            producer_count,
            consumer_count,
            tasks_per_producer,
            mode: SubmissionMode::default(),
            produce_interval: Duration::ZERO,
        }
    }

    /// Set the submission mode
    pub fn with_mode(mut self, mode: SubmissionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            producer_count: config.producer_count,
            consumer_count: config.consumer_count,
            tasks_per_producer: config.tasks_per_producer,
            mode: config.submission_mode,
            produce_interval: Duration::from_millis(config.produce_interval_ms),
        }
    }
}

/// Everything the pipeline's threads reported on shutdown
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport<R> {
    /// Identifier of this pipeline run
    pub run_id: Uuid,
    /// When the threads were spawned
    pub started_at: DateTime<Utc>,
    /// When the last thread was joined
    pub finished_at: DateTime<Utc>,
    /// Per-producer reports
    pub producers: Vec<ProducerReport<R>>,
    /// Per-consumer reports
    pub consumers: Vec<ConsumerReport>,
    /// Threads that panicked instead of returning a report
    pub panicked: usize,
}

impl<R> PipelineReport<R> {
    /// Tickets issued to all producers
    pub fn submitted(&self) -> usize {
        self.producers.iter().map(|p| p.tickets.len()).sum()
    }

    /// Tasks dropped by producers' skip filters
    pub fn skipped(&self) -> usize {
        self.producers.iter().map(|p| p.skipped).sum()
    }

    /// Outcomes published by all consumers
    pub fn processed(&self) -> usize {
        self.consumers.iter().map(|c| c.processed).sum()
    }

    /// Failed outcomes published by all consumers
    pub fn failed(&self) -> usize {
        self.consumers.iter().map(|c| c.failed).sum()
    }
}

/// Producers and consumers running against one shared store
pub struct Pipeline<S: Store, V> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    store: Arc<S>,
    producers: Vec<Arc<Producer<S>>>,
    consumers: Vec<Arc<Consumer<S, V>>>,
    producer_handles: Vec<JoinHandle<ProducerReport<S::Output>>>,
    consumer_handles: Vec<JoinHandle<ConsumerReport>>,
    stopped: bool,
}

impl<S, V> Pipeline<S, V>
where
    S: Store + 'static,
    S::Task: 'static,
    S::Output: 'static,
    V: Solver<Task = S::Task, Output = S::Output> + 'static,
{
    /// Spawn the producer and consumer threads
    pub fn start(
        options: PipelineOptions,
        store: Arc<S>,
        solver: Arc<V>,
        source: TaskSource<S::Task>,
    ) -> crate::Result<Self> {
        Self::start_with_skip(options, store, solver, source, None)
    }

    /// Like [`start`](Self::start), with every producer dropping tasks
    /// matched by `skip`
    pub fn start_with_skip(
        options: PipelineOptions,
        store: Arc<S>,
        solver: Arc<V>,
        source: TaskSource<S::Task>,
        skip: Option<SkipFilter<S::Task>>,
    ) -> crate::Result<Self> {
        let mut pipeline = Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            store,
            producers: Vec::with_capacity(options.producer_count),
            consumers: Vec::with_capacity(options.consumer_count),
            producer_handles: Vec::with_capacity(options.producer_count),
            consumer_handles: Vec::with_capacity(options.consumer_count),
            stopped: false,
        };

        info!(
            "Starting pipeline {} with {} producer(s) and {} consumer(s)",
            pipeline.run_id, options.producer_count, options.consumer_count
        );

        for i in 0..options.consumer_count {
            let consumer = Arc::new(Consumer::new(
                i,
                Arc::clone(&pipeline.store),
                Arc::clone(&solver),
            ));
            pipeline.consumers.push(Arc::clone(&consumer));
            let handle = spawn_named(format!("consumer-{i}"), move || consumer.run())?;
            pipeline.consumer_handles.push(handle);
        }

        for i in 0..options.producer_count {
            let mut producer = Producer::new(
                i,
                options.tasks_per_producer,
                Arc::clone(&pipeline.store),
                Arc::clone(&source),
            )
            .with_mode(options.mode)
            .with_interval(options.produce_interval);
            if let Some(skip) = &skip {
                producer = producer.with_skip(Arc::clone(skip));
            }
            let producer = Arc::new(producer);
            pipeline.producers.push(Arc::clone(&producer));
            let handle = spawn_named(format!("producer-{i}"), move || producer.run())?;
            pipeline.producer_handles.push(handle);
        }

        Ok(pipeline)
    }
}

impl<S: Store, V> Pipeline<S, V> {
    /// Shared store, for reading results after `stop`
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run identifier
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Check if `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop every thread and collect their reports.
    ///
    /// Producers stop first and the store closes to new tasks; consumers
    /// then drain what is already queued before the store is shut down and
    /// any producer still waiting on a result is released. Calling this
    /// again returns an empty report.
    pub fn stop(&mut self) -> PipelineReport<S::Output> {
        let mut report = PipelineReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.started_at,
            producers: Vec::new(),
            consumers: Vec::new(),
            panicked: 0,
        };
        if self.stopped {
            return report;
        }
        self.stopped = true;
        info!("Stopping pipeline {}", self.run_id);

        for producer in &self.producers {
            producer.stop();
        }
        self.store.close();
        for consumer in &self.consumers {
            consumer.stop();
        }

        for handle in self.consumer_handles.drain(..) {
            match handle.join() {
                Ok(consumer_report) => report.consumers.push(consumer_report),
                Err(_) => {
                    warn!("A consumer thread panicked");
                    report.panicked += 1;
                }
            }
        }

        self.store.shutdown();

        for handle in self.producer_handles.drain(..) {
            match handle.join() {
                Ok(producer_report) => report.producers.push(producer_report),
                Err(_) => {
                    warn!("A producer thread panicked");
                    report.panicked += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Pipeline {} stopped: {} submitted, {} processed, {} failed",
            self.run_id,
            report.submitted(),
            report.processed(),
            report.failed()
        );
        report
    }
}

impl<S: Store, V> Drop for Pipeline<S, V> {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

fn spawn_named<T, F>(name: String, f: F) -> crate::Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|e| crate::PipelineError::WorkerPoolError(format!("failed to spawn {name}: {e}")))
}
