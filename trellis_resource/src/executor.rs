// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Where decode work runs, and how it is cancelled.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs decode tasks. Results come back over a channel, never through the
/// executor, so an implementation only has to eventually call each task.
///
/// An executor that drops a task without calling it is tolerated: the load
/// is reported as [`LoadError::Dropped`](crate::LoadError::Dropped).
pub trait Executor {
    /// Schedule `task`.
    fn spawn(&self, task: Task);
}

/// Runs tasks on a rayon thread pool.
///
/// The default uses rayon's global pool; [`with_threads`](Self::with_threads)
/// builds a dedicated one.
#[derive(Clone, Debug, Default)]
pub struct ThreadExecutor {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ThreadExecutor {
    /// Run tasks on rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run tasks on a dedicated pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("trellis-decode-{i}"))
            .build()?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }
}

impl Executor for ThreadExecutor {
    fn spawn(&self, task: Task) {
        match &self.pool {
            Some(pool) => pool.spawn(task),
            None => rayon::spawn(task),
        }
    }
}

/// Runs each task immediately on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn spawn(&self, task: Task) {
        task();
    }
}

/// Queues tasks until the host calls [`run_pending`](Self::run_pending).
///
/// Clones share one queue, so a host can keep a handle after giving one to
/// the texture cache.
#[derive(Clone, Default)]
pub struct DeferredExecutor {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl DeferredExecutor {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run every queued task, including ones queued while running. Returns how
    /// many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.queue.borrow_mut().pop_front() else {
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

impl core::fmt::Debug for DeferredExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeferredExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Executor for DeferredExecutor {
    fn spawn(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}

/// Shared cancellation flag between the cache and a running task.
///
/// Cancelling is idempotent and can happen from any thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
