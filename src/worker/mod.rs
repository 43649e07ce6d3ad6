/// Pipeline orchestration
pub mod pool;
/// Task producers
pub mod producer;

use crate::storage::Store;
use crate::task::solver::Solver;
use crate::task::Outcome;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    /// Accepting and processing tasks
    Running,
    /// Stop requested; finishing queued work
    Draining,
    /// Loop has returned
    Exited,
}

impl ConsumerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConsumerState::Running,
            1 => ConsumerState::Draining,
            _ => ConsumerState::Exited,
        }
    }
}

/// What a consumer did before exiting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerReport {
    /// Consumer identifier
    pub consumer_id: usize,
    /// Tasks whose outcome was published
    pub processed: usize,
    /// Of those, how many were failures
    pub failed: usize,
}

/// A worker that drains tasks from a store and publishes their outcomes
pub struct Consumer<S, V> {
    id: usize,
    store: Arc<S>,
    solver: Arc<V>,
    state: AtomicU8,
}

impl<S, V> Consumer<S, V> {
    /// Create a new consumer with the given ID
    pub fn new(id: usize, store: Arc<S>, solver: Arc<V>) -> Self {
        Self {
            id,
            store,
            solver,
            state: AtomicU8::new(ConsumerState::Running as u8),
        }
    }

    /// Consumer identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Ask the loop to finish. Takes effect between tasks; queued work is
    /// still drained.
    pub fn stop(&self) {
        let _ = self.state.compare_exchange(
            ConsumerState::Running as u8,
            ConsumerState::Draining as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn is_running(&self) -> bool {
        self.state() == ConsumerState::Running
    }
}

impl<S, V> Consumer<S, V>
where
    S: Store,
    V: Solver<Task = S::Task, Output = S::Output>,
{
    /// Process tasks until stopped and drained, or until the store closes
    /// with nothing left to hand out.
    pub fn run(&self) -> ConsumerReport {
        info!("Consumer {} started", self.id);
        let mut report = ConsumerReport {
            consumer_id: self.id,
            ..Default::default()
        };

        while self.is_running() || self.store.has_task() {
            let (ticket, task) = match self.store.get_task() {
                Ok(entry) => entry,
                Err(crate::PipelineError::StoreClosed) => break,
                Err(e) => {
                    error!("Consumer {} failed to fetch a task: {}", self.id, e);
                    break;
                }
            };
            debug!("Consumer {} got task {}", self.id, ticket);

            let outcome = self.solve(&task);
            let failed = !outcome.is_solved();
            if let Outcome::Failed(reason) = &outcome {
                warn!("Consumer {} task {} failed: {}", self.id, ticket, reason);
            }

            match self.store.save_result(ticket, outcome) {
                Ok(()) => {
                    report.processed += 1;
                    if failed {
                        report.failed += 1;
                    }
                    debug!("Consumer {} saved result of task {}", self.id, ticket);
                }
                Err(e) => error!("Consumer {} failed to save task {}: {}", self.id, ticket, e),
            }
        }

        self.state
            .store(ConsumerState::Exited as u8, Ordering::Release);
        info!(
            "Consumer {} exiting after {} task(s)",
            self.id, report.processed
        );
        report
    }

    // Panics are turned into a failed outcome so the ticket still resolves.
    fn solve(&self, task: &S::Task) -> Outcome<S::Output> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.solver.solve(task))) {
            Ok(result) => result.into(),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Failed(format!("solver panicked: {reason}"))
            }
        }
    }
}
