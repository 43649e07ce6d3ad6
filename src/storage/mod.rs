/// Result cache
pub mod cache;
/// In-memory ticket store
pub mod memory;

use crate::task::{Outcome, Ticket};
use std::time::Duration;

/// Ticket-keyed store shared by producers and consumers.
///
/// Producers call [`add_task`](Store::add_task) and wait on
/// [`get_result`](Store::get_result); consumers loop on
/// [`get_task`](Store::get_task) and [`save_result`](Store::save_result).
/// Results are take-once: `get_result` removes the entry it returns.
pub trait Store: Send + Sync {
    /// Task type held in the queue
    type Task: Send;
    /// Result type published per ticket
    type Output: Send;

    /// Enqueue a task and return its ticket
    fn add_task(&self, task: Self::Task) -> crate::Result<Ticket>;

    /// Block until a task is available.
    ///
    /// Fails with `StoreClosed` once the store is closed and drained.
    fn get_task(&self) -> crate::Result<(Ticket, Self::Task)>;

    /// Check if tasks are queued. Advisory only.
    fn has_task(&self) -> bool;

    /// Publish the outcome for a ticket
    fn save_result(&self, ticket: Ticket, outcome: Outcome<Self::Output>) -> crate::Result<()>;

    /// Block until the outcome for `ticket` is published, then take it.
    ///
    /// Fails with `ResultUnavailable` if the store shuts down first.
    fn get_result(&self, ticket: Ticket) -> crate::Result<Outcome<Self::Output>>;

    /// Like `get_result`, failing with `ResultTimeout` after `timeout`
    fn get_result_timeout(
        &self,
        ticket: Ticket,
        timeout: Duration,
    ) -> crate::Result<Outcome<Self::Output>>;

    /// Stop accepting tasks; queued tasks are still handed out
    fn close(&self);

    /// Close and release every caller blocked in `get_result`
    fn shutdown(&self);

    /// Check if the store has been closed
    fn is_closed(&self) -> bool;
}
