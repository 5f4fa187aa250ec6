use std::sync::Arc;

use futures_util::Future;
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bounded pool for listener notifications.
///
/// At most `n_tasks` jobs run at once; the rest wait for a permit. Jobs are
/// spawned on the ambient tokio runtime. Callers outside any runtime get a
/// private runtime, built on first use and owned by the pool, so `execute`
/// never runs a job on the calling thread. Dropping the pool cancels every
/// job that has not finished.
#[derive(Debug)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    cancel_token: CancellationToken,
    n_tasks: usize,
    fallback: OnceCell<Runtime>,
}

impl TaskPool {
    pub fn new(n_tasks: usize) -> TaskPool {
        let n_tasks = n_tasks.max(1);
        let semaphore = Arc::new(Semaphore::new(n_tasks));
        let cancel_token = CancellationToken::new();

        TaskPool {
            semaphore,
            cancel_token,
            n_tasks,
            fallback: OnceCell::new(),
        }
    }

    /// Ambient runtime if there is one, else the pool's own.
    fn spawn_handle(&self) -> Option<Handle> {
        if let Ok(handle) = Handle::try_current() {
            return Some(handle);
        }

        let runtime = self.fallback.get_or_try_init(|| {
            log::debug!(
                "No async runtime on this thread, starting listener runtime with {} workers",
                self.n_tasks
            );
            Builder::new_multi_thread()
                .worker_threads(self.n_tasks)
                .thread_name("theme-listener")
                .enable_time()
                .build()
        });

        match runtime {
            Ok(runtime) => Some(runtime.handle().clone()),
            Err(e) => {
                log::error!("Failed to start listener runtime: {e}");
                None
            }
        }
    }

    /// Whether the pool has started its own runtime.
    pub fn owns_runtime(&self) -> bool {
        self.fallback.get().is_some()
    }

    /// Spawn `func` once a permit is available.
    ///
    /// The handle resolves to `None` when the pool was shut down before the
    /// job completed. Returns `None` only when no runtime could be started.
    pub fn execute<F, T>(&self, func: F) -> Option<JoinHandle<Option<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.spawn_handle()?;
        let semaphore = self.semaphore.clone();
        let token = self.cancel_token.clone();

        Some(handle.spawn(async move {
            let main = async {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                Some(func.await)
            };

            tokio::select! {
                result = main => result,
                () = token.cancelled() => None,
            }
        }))
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Cancel all pending and running jobs.
    pub fn shutdown(&self) {
        self.semaphore.close();
        self.cancel_token.cancel();
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
        // May run inside async code, where a blocking runtime drop panics.
        if let Some(runtime) = self.fallback.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_execute_without_runtime_uses_own_runtime() {
        let pool = TaskPool::new(2);
        assert!(Handle::try_current().is_err());

        let (tx, rx) = std::sync::mpsc::channel();
        pool.execute(async move { tx.send(std::thread::current().id()) })
            .expect("listener runtime started");

        let worker = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert_ne!(worker, std::thread::current().id());
        assert!(pool.owns_runtime());
    }

    #[tokio::test]
    async fn test_execute_runs_job() {
        let pool = TaskPool::new(2);
        let handle = pool.execute(async { 41 + 1 }).expect("runtime available");
        assert_eq!(handle.await.expect("join"), Some(42));
        assert!(!pool.owns_runtime());
    }

    #[tokio::test]
    async fn test_pool_with_own_runtime_drops_inside_async_code() {
        let pool = std::thread::spawn(|| {
            let pool = TaskPool::new(1);
            pool.execute(async {}).expect("listener runtime started");
            pool
        })
        .join()
        .expect("thread");

        assert!(pool.owns_runtime());
        drop(pool);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = TaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.execute(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .expect("runtime available")
            })
            .collect();

        for handle in handles {
            handle.await.expect("join");
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_jobs() {
        let pool = TaskPool::new(1);
        let handle = pool
            .execute(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            })
            .expect("runtime available");

        pool.shutdown();
        assert_eq!(handle.await.expect("join"), None);
    }
}
