//! Producer

use crate::storage::Store;
use crate::task::{Outcome, Ticket};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a producer treats the tickets it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Submit every task without waiting
    FireAndForget,
    /// Wait for each result before generating the next task.
    ///
    /// Producer throughput is then bounded by consumer latency.
    #[default]
    AwaitResult,
}

/// Builds the `index`-th task of producer `producer_id`
pub type TaskSource<T> = Arc<dyn Fn(usize, usize) -> T + Send + Sync>;

/// Returns `true` for a task that should not be submitted
pub type SkipFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// What a producer did before exiting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerReport<R> {
    /// Producer identifier
    pub producer_id: usize,
    /// Tickets received, in submission order
    pub tickets: Vec<Ticket>,
    /// Outcomes collected in [`SubmissionMode::AwaitResult`]
    pub results: Vec<(Ticket, Outcome<R>)>,
    /// Tasks generated but dropped by the skip filter
    pub skipped: usize,
}

/// Generates tasks and submits them to a store
pub struct Producer<S: Store> {
    id: usize,
    task_count: usize,
    mode: SubmissionMode,
    interval: Duration,
    store: Arc<S>,
    source: TaskSource<S::Task>,
    skip: Option<SkipFilter<S::Task>>,
    running: AtomicBool,
}

impl<S: Store> Producer<S> {
    /// Create a producer that submits `task_count` tasks built by `source`
    pub fn new(id: usize, task_count: usize, store: Arc<S>, source: TaskSource<S::Task>) -> Self {
        Self {
            id,
            task_count,
            mode: SubmissionMode::default(),
            interval: Duration::ZERO,
            store,
            source,
            skip: None,
            running: AtomicBool::new(true),
        }
    }

    /// Set the submission mode
    pub fn with_mode(mut self, mode: SubmissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Pause for `interval` after each submission
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Drop generated tasks for which `skip` returns `true`
    pub fn with_skip(mut self, skip: SkipFilter<S::Task>) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Producer identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Stop before the next task is generated. Submitted tasks are not
    /// cancelled.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Check if the producer has not been stopped
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Generate and submit tasks until done, stopped, or the store closes
    pub fn run(&self) -> ProducerReport<S::Output> {
        info!(
            "Producer {} started ({} task(s), {:?})",
            self.id, self.task_count, self.mode
        );
        let mut report = ProducerReport {
            producer_id: self.id,
            tickets: Vec::with_capacity(self.task_count),
            results: Vec::new(),
            skipped: 0,
        };

        for index in 0..self.task_count {
            if !self.is_running() {
                debug!("Producer {} stopped before task {}", self.id, index);
                break;
            }

            let task = (self.source)(self.id, index);
            if self.skip.as_ref().is_some_and(|skip| skip(&task)) {
                debug!("Producer {} skipped task {}", self.id, index);
                report.skipped += 1;
                continue;
            }
            let ticket = match self.store.add_task(task) {
                Ok(ticket) => ticket,
                Err(e) => {
                    info!("Producer {} cannot submit: {}", self.id, e);
                    break;
                }
            };
            report.tickets.push(ticket);
            debug!("Producer {} created task {}", self.id, ticket);

            if self.mode == SubmissionMode::AwaitResult {
                match self.store.get_result(ticket) {
                    Ok(outcome) => {
                        if outcome.is_solved() {
                            debug!("Producer {} got result of task {}", self.id, ticket);
                        } else {
                            warn!("Producer {} task {} failed", self.id, ticket);
                        }
                        report.results.push((ticket, outcome));
                    }
                    Err(e) => {
                        warn!("Producer {} gave up on task {}: {}", self.id, ticket, e);
                        break;
                    }
                }
            }

            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }

        info!(
            "Producer {} exiting after {} task(s)",
            self.id,
            report.tickets.len()
        );
        report
    }
}
