//! Thread-safe FIFO queue with blocking and non-blocking consumers

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Unbounded FIFO shared between producer and consumer threads.
///
/// All mutations go through a single mutex. `stop` closes intake for good,
/// but items already queued are still handed out, so blocking consumers
/// see `None` only once the queue is both stopped and empty.
pub struct ThreadSafeQueue<T> {
    inner: Mutex<QueueState<T>>,
    available: Condvar,
}

struct QueueState<T> {
    items: VecDeque<T>,
    stopped: bool,
}

impl<T> ThreadSafeQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty queue with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    // Every critical section leaves the state consistent, so a panic on
    // another thread doesn't invalidate it.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item; hands the item back if the queue is stopped
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut guard = self.lock();
        if guard.stopped {
            return Err(item);
        }
        guard.items.push_back(item);
        drop(guard);
        self.available.notify_one();
        Ok(())
    }

    /// Build an item under the queue lock and append it.
    ///
    /// `make` runs only if the queue accepts the item, so anything it
    /// allocates (a ticket, a sequence number) lands in the queue in the
    /// same order it was allocated. Returns `None` if the queue is stopped.
    pub fn push_with<R>(&self, make: impl FnOnce() -> (T, R)) -> Option<R> {
        let mut guard = self.lock();
        if guard.stopped {
            return None;
        }
        let (item, ret) = make();
        guard.items.push_back(item);
        drop(guard);
        self.available.notify_one();
        Some(ret)
    }

    /// Pop without blocking
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Block until an item is available or the queue is stopped and empty
    pub fn pop(&self) -> Option<T> {
        self.pop_with(|_| ())
    }

    /// Like [`pop`](Self::pop), running `on_pop` on the item before the
    /// queue lock is released.
    ///
    /// Bookkeeping done in `on_pop` is ordered with every other push and
    /// pop, so nobody can observe the item as neither queued nor taken.
    pub fn pop_with(&self, on_pop: impl FnOnce(&T)) -> Option<T> {
        let mut guard = self.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                on_pop(&item);
                return Some(item);
            }
            if guard.stopped {
                return None;
            }
            guard = self
                .available
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            if guard.stopped || now >= deadline {
                return None;
            }
            guard = self
                .available
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Close the queue and wake every blocked consumer. Idempotent.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.available.notify_all();
    }

    /// Check if the queue has been stopped
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Number of queued items. Advisory: may be stale on return.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Check if the queue is empty. Advisory: may be stale on return.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for ThreadSafeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = ThreadSafeQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        let drained: Vec<_> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_items_are_consumed_once() {
        let queue = Arc::new(ThreadSafeQueue::new());
        for i in 0..200u32 {
            queue.push(i).unwrap();
        }
        queue.stop();

        let consumers = 4;
        let barrier = Arc::new(Barrier::new(consumers));
        let handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    std::iter::from_fn(|| queue.pop()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for item in handle.join().unwrap() {
                assert!(seen.insert(item), "item {item} popped twice");
            }
        }
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn test_pop_wakes_on_push() {
        let queue = Arc::new(ThreadSafeQueue::new());
        let (ready_tx, ready_rx) = mpsc::channel();

        let queue_clone = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            ready_tx.send(()).unwrap();
            queue_clone.pop()
        });

        ready_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        queue.push(99).unwrap();
        assert_eq!(handle.join().unwrap(), Some(99));
    }

    #[test]
    fn test_stop_unblocks_waiters() {
        let queue: Arc<ThreadSafeQueue<u32>> = Arc::new(ThreadSafeQueue::new());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.stop();
        queue.stop();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), None);
        }
    }

    #[test]
    fn test_stop_still_drains() {
        let queue = ThreadSafeQueue::new();
        queue.push("a").unwrap();
        queue.stop();

        assert_eq!(queue.push("b"), Err("b"));
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_stopped());
    }

    #[test]
    fn test_push_with_skips_builder_when_stopped() {
        let queue = ThreadSafeQueue::new();
        let mut counter = 0;
        assert_eq!(
            queue.push_with(|| {
                counter += 1;
                (counter, counter)
            }),
            Some(1)
        );

        queue.stop();
        assert_eq!(
            queue.push_with(|| {
                counter += 1;
                (counter, counter)
            }),
            None
        );
        assert_eq!(counter, 1);
    }

    #[test]
    fn test_pop_timeout_expires() {
        let queue: ThreadSafeQueue<u8> = ThreadSafeQueue::new();
        let start = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_pop_with_sees_item_before_release() {
        let queue = ThreadSafeQueue::new();
        queue.push(7).unwrap();

        let mut seen = None;
        assert_eq!(queue.pop_with(|item| seen = Some(*item)), Some(7));
        assert_eq!(seen, Some(7));

        queue.stop();
        let mut called = false;
        assert_eq!(queue.pop_with(|_| called = true), None);
        assert!(!called);
    }
}
