//! Concurrency-limited async task queue.
//!
//! Tasks are admitted in FIFO order and at most `concurrency` of them run at
//! once. A finished task (whatever its outcome, panics included) frees its slot
//! and the head of the waiting list is launched in its place.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::trace;

use crate::{Result, VaultError};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Default)]
struct QueueState {
    running: usize,
    waiting: VecDeque<Job>,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.running == 0 && self.waiting.is_empty()
    }
}

struct Inner {
    concurrency: usize,
    state: Mutex<QueueState>,
}

/// Bounded FIFO task runner shared by folder creations and file uploads.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// Create a queue running at most `concurrency` tasks at once.
    ///
    /// A ceiling of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Get the concurrency ceiling.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Get the number of tasks currently running.
    pub fn running(&self) -> usize {
        self.state().running
    }

    /// Get the number of tasks waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.state().waiting.len()
    }

    /// Submit a task. The returned handle resolves to the task's own result.
    ///
    /// Never fails at submission; a failing task does not stop the queue.
    pub fn enqueue<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = task.await;
            // The caller may have dropped its handle.
            let _ = tx.send(result);
        });

        let launch = {
            let mut state = self.state();
            state.waiting.push_back(job);
            self.admit(&mut state)
        };
        self.launch(launch);

        TaskHandle { rx }
    }

    /// Resolve once no task is running or waiting.
    ///
    /// Tasks submitted after this call but before the queue drains are waited
    /// for too. Resolves immediately on an idle queue.
    pub async fn wait_idle(&self) {
        let rx = {
            let mut state = self.state();
            if state.is_idle() {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.idle_waiters.push(tx);
            rx
        };
        let _ = rx.await;
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop as many waiting jobs as there are free slots.
    fn admit(&self, state: &mut QueueState) -> Vec<Job> {
        let mut launch = Vec::new();
        while state.running < self.inner.concurrency {
            let Some(job) = state.waiting.pop_front() else {
                break;
            };
            state.running += 1;
            launch.push(job);
        }
        if !launch.is_empty() {
            trace!(
                admitted = launch.len(),
                running = state.running,
                waiting = state.waiting.len(),
                "Dispatching queued tasks"
            );
        }
        launch
    }

    fn launch(&self, jobs: Vec<Job>) {
        if jobs.is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            // No runtime to run on (outside Tokio or shutting down). Dropping
            // the jobs resolves their handles with `TaskDropped`.
            let mut state = self.state();
            state.running = state.running.saturating_sub(jobs.len());
            return;
        };
        for job in jobs {
            let slot = Slot {
                queue: self.clone(),
            };
            handle.spawn(async move {
                let _slot = slot;
                job.await;
            });
        }
    }

    fn release(&self) {
        let (launch, waiters) = {
            let mut state = self.state();
            state.running = state.running.saturating_sub(1);
            let launch = self.admit(&mut state);
            let waiters = if state.is_idle() {
                std::mem::take(&mut state.idle_waiters)
            } else {
                Vec::new()
            };
            (launch, waiters)
        };

        self.launch(launch);
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("TaskQueue")
            .field("concurrency", &self.inner.concurrency)
            .field("running", &state.running)
            .field("waiting", &state.waiting.len())
            .finish()
    }
}

/// Occupied execution slot; frees itself when the task ends or unwinds.
struct Slot {
    queue: TaskQueue,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.queue.release();
    }
}

/// Handle to the result of a queued task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(VaultError::TaskDropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}
