//! Scoped job lock
//!
//! Acquire, run the body, release. The release step runs on every exit path
//! of the body: success, error or panic.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error};

use crate::persistence::{LockError, LockRecord, LockStore};
use crate::pipeline::PipelineError;

/// A named job lock bound to one holder
#[derive(Clone)]
pub struct JobLock {
    store: Arc<dyn LockStore>,
    job_name: String,
    holder: String,
    task: String,
}

impl JobLock {
    pub fn new(
        store: Arc<dyn LockStore>,
        job_name: impl Into<String>,
        holder: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            store,
            job_name: job_name.into(),
            holder: holder.into(),
            task: task.into(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Run `body` while holding the lock
    ///
    /// Returns `Ok(None)` without polling `body` when another holder has the
    /// lock. A panic inside `body` is reported as [`PipelineError::Panicked`]
    /// after the lock is released. When both the body and the release fail,
    /// the body's error is returned and the release failure is logged.
    pub async fn run<T, Fut>(&self, body: Fut) -> Result<Option<T>, PipelineError>
    where
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let record = LockRecord::new(&self.job_name, &self.holder, &self.task);
        match self.store.acquire(record).await {
            Ok(()) => {
                debug!(job = %self.job_name, holder = %self.holder, "lock acquired");
            }
            Err(LockError::AlreadyLocked { job }) => {
                debug!(%job, "lock held by another run, skipping");
                return Ok(None);
            }
            Err(LockError::Store(e)) => return Err(PipelineError::Store(e)),
        }

        let outcome = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(PipelineError::Panicked(panic_message(payload.as_ref()))),
        };

        let released = self.store.release(&self.job_name).await;
        if released.is_ok() {
            debug!(job = %self.job_name, "lock released");
        }

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(Some(value)),
            (Ok(_), Err(e)) => Err(PipelineError::Release(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                error!(
                    job = %self.job_name,
                    error = %release_error,
                    "Failed to release lock after failed run"
                );
                Err(e)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
