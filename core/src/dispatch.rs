//! Listener dispatch with per-listener error capture.

use crate::common::ListenerError;
use crate::taskpool::TaskPool;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A single listener invocation, already bound to its event.
pub(crate) type ListenerJob = Box<dyn FnOnce() -> Result<(), ListenerError> + Send + 'static>;

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that failed, panicked or were cancelled
    pub failed: usize,
    /// Listeners still running when the wait deadline passed
    pub timed_out: usize,
    pub errors: Vec<ListenerError>,
}

impl DispatchReport {
    fn record(&mut self, outcome: Result<(), ListenerError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(error) => {
                self.failed += 1;
                self.errors.push(error);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.failed + self.timed_out
    }
}

/// Handle to listeners notified by one emit.
///
/// Dropping it leaves the listeners running; awaiting [`Dispatch::wait`]
/// collects their outcomes up to a deadline.
#[derive(Debug, Default)]
#[must_use = "drop the dispatch to fire and forget, or wait on it"]
pub struct Dispatch {
    pending: Vec<JoinHandle<Option<Result<(), ListenerError>>>>,
    completed: DispatchReport,
}

impl Dispatch {
    /// Number of listeners covered by this dispatch.
    pub fn len(&self) -> usize {
        self.pending.len() + self.completed.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold another dispatch into this one.
    pub(crate) fn absorb(&mut self, other: Dispatch) {
        self.pending.extend(other.pending);
        self.completed.delivered += other.completed.delivered;
        self.completed.failed += other.completed.failed;
        self.completed.timed_out += other.completed.timed_out;
        self.completed.errors.extend(other.completed.errors);
    }

    /// Wait for every listener, giving up on the ones that outlive `timeout`.
    pub async fn wait(self, timeout: Duration) -> DispatchReport {
        let mut report = self.completed;
        let deadline = tokio::time::Instant::now() + timeout;

        for handle in self.pending {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Some(outcome))) => report.record(outcome),
                Ok(Ok(None)) => report.record(Err(ListenerError::Cancelled)),
                Ok(Err(join_error)) => report.record(Err(ListenerError::Panicked {
                    reason: join_error.to_string(),
                })),
                Err(_) => report.timed_out += 1,
            }
        }

        report
    }
}

/// Send every job to the pool. Never runs a listener on the calling thread.
pub(crate) fn dispatch_jobs(pool: &TaskPool, label: &str, jobs: Vec<ListenerJob>) -> Dispatch {
    let mut dispatch = Dispatch::default();
    if jobs.is_empty() {
        return dispatch;
    }

    log::trace!("Notifying {} '{label}' listeners", jobs.len());
    for job in jobs {
        let label = label.to_string();
        match pool.execute(async move { run_listener(&label, job) }) {
            Some(handle) => dispatch.pending.push(handle),
            None => dispatch.completed.record(Err(ListenerError::Cancelled)),
        }
    }

    dispatch
}

fn run_listener(label: &str, job: ListenerJob) -> Result<(), ListenerError> {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::Panicked {
            reason: panic_message(payload.as_ref()),
        }),
    };

    if let Err(e) = &outcome {
        log::warn!("'{label}' listener failed: {e}");
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ok_job() -> ListenerJob {
        Box::new(|| Ok(()))
    }

    fn failing_job() -> ListenerJob {
        Box::new(|| Err(ListenerError::failed("boom")))
    }

    fn panicking_job() -> ListenerJob {
        Box::new(|| panic!("listener exploded"))
    }

    #[tokio::test]
    async fn test_dispatch_captures_each_outcome() {
        let pool = TaskPool::new(4);
        let dispatch = dispatch_jobs(&pool, "test", vec![ok_job(), failing_job(), panicking_job()]);
        assert_eq!(dispatch.len(), 3);

        let report = dispatch.wait(Duration::from_secs(5)).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 2);
        assert!(report.errors.contains(&ListenerError::Panicked {
            reason: "listener exploded".to_string()
        }));
    }

    #[test]
    fn test_dispatch_without_runtime_returns_before_listeners_finish() {
        let pool = TaskPool::new(2);
        let slow: ListenerJob = Box::new(|| {
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        });

        let started = Instant::now();
        let dispatch = dispatch_jobs(&pool, "test", vec![slow, failing_job()]);
        assert!(started.elapsed() < Duration::from_millis(200));

        let waiter = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let report = waiter.block_on(dispatch.wait(Duration::from_secs(5)));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_async_dispatch_reports_after_wait() {
        let pool = TaskPool::new(4);
        let dispatch = dispatch_jobs(&pool, "test", vec![ok_job(), ok_job(), failing_job()]);

        let report = dispatch.wait(Duration::from_secs(5)).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_listener_times_out() {
        let pool = TaskPool::new(4);
        let slow: ListenerJob = Box::new(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        let dispatch = dispatch_jobs(&pool, "test", vec![slow]);

        let report = dispatch.wait(Duration::from_millis(10)).await;
        assert_eq!(report.timed_out, 1);
    }

    #[test]
    fn test_empty_dispatch() {
        let pool = TaskPool::new(1);
        assert!(dispatch_jobs(&pool, "test", Vec::new()).is_empty());
    }
}
