//! Memo

use crate::storage::cache::ThreadSafeMap;
use crate::task::solver::Solver;
use crate::task::Keyed;
use crate::worker::producer::SkipFilter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Solver wrapper that remembers solved values by task key.
///
/// Consumers sharing one `Memoized` solver call the inner solver at most
/// once per key unless two of them race on the same key. Failures are not
/// remembered, so a failed key is solved again next time.
pub struct Memoized<V>
where
    V: Solver,
    V::Task: Keyed,
{
    inner: V,
    cache: Arc<ThreadSafeMap<<V::Task as Keyed>::Key, V::Output>>,
    hits: AtomicUsize,
}

impl<V> Memoized<V>
where
    V: Solver,
    V::Task: Keyed,
{
    /// Wrap `inner` with an empty memo
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            cache: Arc::new(ThreadSafeMap::new()),
            hits: AtomicUsize::new(0),
        }
    }

    /// Check if a value is remembered for `key`
    pub fn is_cached(&self, key: &<V::Task as Keyed>::Key) -> bool {
        self.cache.contains(key)
    }

    /// Number of remembered keys
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of solves answered from the memo
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Filter for [`Producer::with_skip`](crate::worker::producer::Producer::with_skip)
    /// that drops tasks whose key is already remembered
    pub fn skip_filter(&self) -> SkipFilter<V::Task>
    where
        V::Task: 'static,
        V::Output: Sync + 'static,
        <V::Task as Keyed>::Key: 'static,
    {
        let cache = Arc::clone(&self.cache);
        Arc::new(move |task: &V::Task| cache.contains(&task.key()))
    }
}

impl<V> Solver for Memoized<V>
where
    V: Solver,
    V::Task: Keyed,
    V::Output: Clone + Sync,
{
    type Task = V::Task;
    type Output = V::Output;

    fn solve(&self, task: &V::Task) -> crate::Result<V::Output> {
        let key = task.key();
        if let Some(value) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Reusing remembered result for task {}", key);
            return Ok(value);
        }

        let value = self.inner.solve(task)?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}
