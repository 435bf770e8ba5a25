/// Background sweeper tasks
///
/// Periodically reclaims idle entries from the request guards. Each task is
/// owned by a `SweeperHandle` and stops only when `shutdown` is called.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct SweeperHandle {
    name: &'static str,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task to stop and wait for it to exit
    pub async fn shutdown(self) {
        if let Err(e) = self.shutdown_tx.send(()).await {
            tracing::debug!(sweeper = self.name, error = ?e, "Sweeper already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::warn!(sweeper = self.name, error = %e, "Sweeper task ended abnormally");
        }
    }
}

/// Run `sweep` every `period` until the returned handle is shut down
///
/// `sweep` receives the current instant and returns how many entries it
/// removed. Must be called from within a Tokio runtime.
pub fn spawn_sweeper<F>(name: &'static str, period: Duration, sweep: F) -> SweeperHandle
where
    F: Fn(Instant) -> usize + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = sweep(Instant::now());
                    if removed > 0 {
                        tracing::debug!(sweeper = name, removed, "Swept idle entries");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!(sweeper = name, "Sweeper received shutdown signal");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        name,
        shutdown_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweeper_runs_periodically_and_stops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let handle = spawn_sweeper("test", Duration::from_millis(10), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        let after_shutdown = runs.load(Ordering::SeqCst);
        assert!(after_shutdown >= 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
    }
}
