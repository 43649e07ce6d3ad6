//! Task Pipeline RS - a ticket-based concurrent task store
//!
//! Producers submit tasks into a shared store and get a [`Ticket`] back, a
//! pool of consumer threads drains the store and runs each task through a
//! [`Solver`], and results are published under the same ticket for the
//! producer (or anyone else holding the ticket) to collect.

/// Configuration management for the pipeline
pub mod config;
/// Thread-safe FIFO queue
pub mod queue;
/// Ticket store, result cache and the store trait
pub mod storage;
/// Task data model and solver plugins
pub mod task;
/// Consumers, producers and the orchestrating pipeline
pub mod worker;

pub use config::Config;
pub use queue::ThreadSafeQueue;
pub use storage::cache::ThreadSafeMap;
pub use storage::memory::MemoryStore;
pub use storage::Store;
pub use task::memo::Memoized;
pub use task::solver::{QuadraticSolver, Solver, SquareSolver};
pub use task::{Coefficients, ComputeTask, Keyed, Outcome, Roots, Ticket};
pub use worker::pool::Pipeline;
pub use worker::producer::{Producer, SubmissionMode};
pub use worker::Consumer;

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Store no longer accepts or hands out tasks
    #[error("Store is closed")]
    StoreClosed,

    /// Ticket was never issued by this store
    #[error("Unknown ticket: {0}")]
    UnknownTicket(Ticket),

    /// Ticket has not been handed to a consumer yet
    #[error("Ticket {0} has not been claimed by a consumer")]
    TicketNotClaimed(Ticket),

    /// A result was already published for this ticket
    #[error("Result already published for ticket {0}")]
    DuplicateResult(Ticket),

    /// Store shut down before a result was published
    #[error("Result unavailable for ticket {0}")]
    ResultUnavailable(Ticket),

    /// Waiting for a result took longer than allowed
    #[error("Timed out waiting for result of ticket {0}")]
    ResultTimeout(Ticket),

    /// Solver could not produce a result
    #[error("Solver failed: {0}")]
    SolverFailed(String),

    /// Worker threads could not be spawned or joined
    #[error("Worker pool error: {0}")]
    WorkerPoolError(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let err = PipelineError::StoreClosed;
        assert_eq!(err.to_string(), "Store is closed");

        let err = PipelineError::ResultUnavailable(Ticket(7));
        assert_eq!(err.to_string(), "Result unavailable for ticket #7");
    }
}
