//! Memory

use crate::queue::ThreadSafeQueue;
use crate::storage::cache::{ThreadSafeMap, Waited};
use crate::storage::Store;
use crate::task::{Outcome, Ticket};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// In-memory store pairing a ticket-keyed queue with a result cache
pub struct MemoryStore<T, R> {
    tasks: ThreadSafeQueue<(Ticket, T)>,
    results: ThreadSafeMap<Ticket, Outcome<R>>,
    // Only advanced inside the queue lock (see `add_task`), so ticket
    // order and queue order agree. Atomic so readers need no lock.
    next_ticket: AtomicU64,
    claims: Mutex<Claims>,
}

// Tickets handed to consumers. Queue order equals ticket order, so every
// ticket below `dequeued` has left the queue; those not `in_flight` have
// been published already.
#[derive(Default)]
struct Claims {
    in_flight: HashSet<Ticket>,
    dequeued: u64,
}

impl<T, R> MemoryStore<T, R> {
    /// Create an empty store; its first ticket is `#0`
    pub fn new() -> Self {
        Self {
            tasks: ThreadSafeQueue::new(),
            results: ThreadSafeMap::new(),
            next_ticket: AtomicU64::new(0),
            claims: Mutex::new(Claims::default()),
        }
    }

    /// Number of tasks waiting for a consumer
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Number of published results not yet taken
    pub fn cached_results(&self) -> usize {
        self.results.len()
    }

    /// Number of tickets issued so far
    pub fn issued(&self) -> u64 {
        self.next_ticket.load(Ordering::Acquire)
    }

    /// Check if `ticket` has a published result waiting
    pub fn has_result(&self, ticket: Ticket) -> bool {
        self.results.contains(&ticket)
    }

    /// Read a published result without taking it
    pub fn peek_result(&self, ticket: Ticket) -> Option<Outcome<R>>
    where
        R: Clone,
    {
        self.results.get(&ticket)
    }

    /// Check if the store has been shut down
    pub fn is_shut_down(&self) -> bool {
        self.results.is_released()
    }

    /// Number of tickets claimed by a consumer and not yet published
    pub fn in_flight(&self) -> usize {
        self.claims().in_flight.len()
    }

    fn claims(&self) -> MutexGuard<'_, Claims> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_issued(&self, ticket: Ticket) -> crate::Result<()> {
        if ticket.0 < self.issued() {
            Ok(())
        } else {
            Err(crate::PipelineError::UnknownTicket(ticket))
        }
    }

    fn wait_result(&self, ticket: Ticket, timeout: Option<Duration>) -> crate::Result<Outcome<R>> {
        self.check_issued(ticket)?;
        match self.results.wait_take(&ticket, timeout) {
            Waited::Value(outcome) => Ok(outcome),
            Waited::Released => {
                debug!("Store shut down before ticket {} was published", ticket);
                Err(crate::PipelineError::ResultUnavailable(ticket))
            }
            Waited::TimedOut => Err(crate::PipelineError::ResultTimeout(ticket)),
        }
    }
}

impl<T, R> Default for MemoryStore<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send, R: Send + Sync> Store for MemoryStore<T, R> {
    type Task = T;
    type Output = R;

    fn add_task(&self, task: T) -> crate::Result<Ticket> {
        let ticket = self
            .tasks
            .push_with(|| {
                let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::AcqRel));
                ((ticket, task), ticket)
            })
            .ok_or(crate::PipelineError::StoreClosed)?;

        debug!("Task {} enqueued", ticket);
        Ok(ticket)
    }

    fn get_task(&self) -> crate::Result<(Ticket, T)> {
        // Lock order: queue, then claims
        let (ticket, task) = self
            .tasks
            .pop_with(|(ticket, _)| {
                let mut claims = self.claims();
                claims.in_flight.insert(*ticket);
                claims.dequeued = ticket.0 + 1;
            })
            .ok_or(crate::PipelineError::StoreClosed)?;

        debug!("Task {} claimed", ticket);
        Ok((ticket, task))
    }

    fn has_task(&self) -> bool {
        !self.tasks.is_empty()
    }

    fn save_result(&self, ticket: Ticket, outcome: Outcome<R>) -> crate::Result<()> {
        self.check_issued(ticket)?;
        let mut claims = self.claims();
        if !claims.in_flight.remove(&ticket) {
            if ticket.0 < claims.dequeued {
                warn!("Duplicate result for ticket {} ignored", ticket);
                return Err(crate::PipelineError::DuplicateResult(ticket));
            }
            warn!("Result for ticket {} rejected: task still queued", ticket);
            return Err(crate::PipelineError::TicketNotClaimed(ticket));
        }
        drop(claims);

        if !self.results.insert(ticket, outcome) {
            warn!("Duplicate result for ticket {} ignored", ticket);
            return Err(crate::PipelineError::DuplicateResult(ticket));
        }
        debug!("Result for ticket {} published", ticket);
        Ok(())
    }

    fn get_result(&self, ticket: Ticket) -> crate::Result<Outcome<R>> {
        self.wait_result(ticket, None)
    }

    fn get_result_timeout(&self, ticket: Ticket, timeout: Duration) -> crate::Result<Outcome<R>> {
        self.wait_result(ticket, Some(timeout))
    }

    fn close(&self) {
        if !self.tasks.is_stopped() {
            info!("Store closed with {} task(s) still queued", self.tasks.len());
        }
        self.tasks.stop();
    }

    fn shutdown(&self) {
        self.close();
        if !self.results.is_released() {
            info!(
                "Store shut down, {} result(s) left in cache",
                self.results.len()
            );
        }
        self.results.release_waiters();
    }

    fn is_closed(&self) -> bool {
        self.tasks.is_stopped()
    }
}
