//! Serialized execution context owning one backend.
//!
//! # Responsibility
//! - Run every store operation on one dedicated worker thread, in arrival order.
//! - Hand results back to async or blocking callers.
//! - Close the backend when the context shuts down.
//!
//! # Invariants
//! - The backend is only touched from the worker thread.
//! - A job that reached the worker runs to completion even if its caller left.
//! - Shutdown drains queued jobs before the backend is closed.

use super::{StoreError, StoreResult};
use crate::backend::SlotBackend;
use crate::db::{DbError, DbResult};
use crate::model::record::StoreId;
use log::{debug, warn};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};

type Job<B> = Box<dyn FnOnce(&mut WorkerState<B>) + Send + 'static>;

/// State owned by the worker thread.
pub(crate) struct WorkerState<B> {
    pub(crate) backend: B,
    pub(crate) store_id: StoreId,
    pub(crate) commits: u64,
}

pub(crate) struct ExecutionContext<B: SlotBackend> {
    sender: Option<mpsc::UnboundedSender<Job<B>>>,
    worker: Option<JoinHandle<DbResult<()>>>,
}

impl<B: SlotBackend> ExecutionContext<B> {
    /// Moves `backend` onto a new worker thread.
    pub(crate) fn spawn(backend: B, store_id: StoreId) -> StoreResult<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job<B>>();
        let short_id = store_id.simple().to_string();

        let worker = thread::Builder::new()
            .name(format!("slotstore-{}", &short_id[..8]))
            .spawn(move || {
                let mut state = WorkerState {
                    backend,
                    store_id,
                    commits: 0,
                };
                while let Some(job) = receiver.blocking_recv() {
                    job(&mut state);
                }
                debug!(
                    "event=context_drained module=store status=ok store_id={} commits={}",
                    state.store_id, state.commits
                );
                state.backend.close()
            })
            .map_err(|err| StoreError::FailedToLoadBackend(DbError::Io(err)))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queues `job` and returns the receiver for its result.
    fn submit<R, F>(&self, job: F) -> oneshot::Receiver<StoreResult<R>>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorkerState<B>) -> StoreResult<R> + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: Job<B> = Box::new(move |state| {
            // The caller may have stopped waiting; the job has still run.
            let _ = reply.send(job(state));
        });

        // A failed send drops `reply`, which the receiver reports as closed.
        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }
        receiver
    }

    /// Runs `job` on the worker and awaits its result.
    pub(crate) async fn run<R, F>(&self, job: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorkerState<B>) -> StoreResult<R> + Send + 'static,
    {
        self.submit(job)
            .await
            .unwrap_or_else(|_| Err(StoreError::ContextClosed))
    }

    /// Runs `job` on the worker, blocking the calling thread.
    ///
    /// Must not be called from within an async runtime.
    pub(crate) fn run_blocking<R, F>(&self, job: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorkerState<B>) -> StoreResult<R> + Send + 'static,
    {
        self.submit(job)
            .blocking_recv()
            .unwrap_or_else(|_| Err(StoreError::ContextClosed))
    }

    /// Stops accepting jobs, drains the queue and closes the backend.
    ///
    /// Blocks until the worker exits. Calling it again is a no-op.
    pub(crate) fn shutdown(&mut self) -> StoreResult<()> {
        drop(self.sender.take());
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        match worker.join() {
            Ok(closed) => closed.map_err(StoreError::Backend),
            Err(_) => Err(StoreError::ContextClosed),
        }
    }
}

impl<B: SlotBackend> Drop for ExecutionContext<B> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(
                "event=store_close module=store status=error error_code={} error={}",
                err.code(),
                err
            );
        }
    }
}
