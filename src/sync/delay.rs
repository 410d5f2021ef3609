//! Registry of delayed and suspended actions
//!
//! Every timer or background wait the engine starts goes through a
//! [`DelayRegistry`], so teardown can abort all of them at once and no stale
//! callback fires against cleared engine state.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

pub type TaskId = u64;

#[derive(Default)]
struct DelayInner {
    next_id: TaskId,
    tasks: HashMap<TaskId, JoinHandle<()>>,
}

/// Tracks spawned delayed actions until they finish or are cancelled
///
/// Cheap to clone; clones share the same set of tasks. Must be used from
/// within a Tokio runtime.
#[derive(Clone, Default)]
pub struct DelayRegistry {
    inner: Arc<Mutex<DelayInner>>,
}

impl DelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked task; it forgets itself once it completes
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // The lock is held across spawn so a task finishing immediately
        // cannot try to deregister before it was registered
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let registry: Weak<Mutex<DelayInner>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            future.await;
            if let Some(registry) = registry.upgrade() {
                registry.lock().tasks.remove(&id);
            }
        });

        inner.tasks.insert(id, handle);
        id
    }

    /// Run `action` after `delay` unless cancelled first
    pub fn delay<A>(&self, delay: Duration, action: A) -> TaskId
    where
        A: FnOnce() + Send + 'static,
    {
        trace!("Scheduling delayed action in {:?}", delay);
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        })
    }

    /// Cancel one task; returns whether it was still pending
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.inner.lock().tasks.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending task; returns how many were aborted
    pub fn cancel_all(&self) -> usize {
        let tasks: Vec<JoinHandle<()>> = self.inner.lock().tasks.drain().map(|(_, h)| h).collect();
        let count = tasks.len();
        for handle in tasks {
            handle.abort();
        }
        if count > 0 {
            debug!("Cancelled {} pending delayed actions", count);
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().tasks.len()
    }
}
