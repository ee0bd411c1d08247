//! Delay-coalesced history persistence.
//!
//! [`HistoryRecorder`] is the [`HistoryStore`] handed to the registry. It
//! queues entries on an unbounded channel and never blocks the caller. A
//! background task collects them and writes them as one batch once no new
//! entry arrived for the quiet period. Entries still buffered when the
//! process crashes are lost.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

use minido_domain::history::HistoryEntry;

use crate::ports::{HistoryRepository, HistoryStore};

/// Quiet period used unless configured otherwise.
pub const DEFAULT_COMMIT_DELAY: Duration = Duration::from_secs(5);

/// Sending half of the recorder.
#[derive(Clone)]
pub struct HistoryRecorder {
    sender: mpsc::UnboundedSender<HistoryEntry>,
}

/// Control handle of the background task.
pub struct RecorderTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl HistoryRecorder {
    /// Start the background task writing to `repository`.
    ///
    /// The task ends after [`RecorderTask::shutdown`] or once every sender is
    /// dropped, writing the final batch either way.
    pub fn spawn<R>(repository: R, quiet: Duration) -> (Self, RecorderTask)
    where
        R: HistoryRepository + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(run(repository, receiver, stopped, quiet));
        (Self { sender }, RecorderTask { stop, handle })
    }
}

impl HistoryStore for HistoryRecorder {
    fn record(&self, entry: HistoryEntry) {
        if self.sender.send(entry).is_err() {
            tracing::warn!("history recorder stopped, entry dropped");
        }
    }
}

impl RecorderTask {
    /// Write everything queued so far and stop, even while senders are alive.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] of the task if it panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.stop.send(());
        self.handle.await
    }

    /// Wait for the task to end on its own, after the last sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] of the task if it panicked.
    pub async fn join(self) -> Result<(), JoinError> {
        let Self { stop, handle } = self;
        let result = handle.await;
        drop(stop);
        result
    }
}

async fn run<R: HistoryRepository>(
    repository: R,
    mut receiver: mpsc::UnboundedReceiver<HistoryEntry>,
    mut stopped: oneshot::Receiver<()>,
    quiet: Duration,
) {
    let mut pending = Vec::new();
    let mut detached = false;
    loop {
        let idle = pending.is_empty();
        let window = async move {
            if idle {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(quiet).await;
            }
        };
        tokio::select! {
            entry = receiver.recv() => match entry {
                Some(entry) => pending.push(entry),
                None => break,
            },
            () = window => commit(&repository, &mut pending).await,
            signal = &mut stopped, if !detached => {
                if signal.is_ok() {
                    receiver.close();
                    while let Ok(entry) = receiver.try_recv() {
                        pending.push(entry);
                    }
                    break;
                }
                // Control handle dropped without a shutdown request.
                detached = true;
            }
        }
    }
    if !pending.is_empty() {
        commit(&repository, &mut pending).await;
    }
    tracing::debug!("history recorder stopped");
}

async fn commit<R: HistoryRepository>(repository: &R, pending: &mut Vec<HistoryEntry>) {
    let batch = std::mem::take(pending);
    let count = batch.len();
    match repository.append_batch(batch).await {
        Ok(()) => tracing::debug!(count, "history committed"),
        Err(error) => tracing::error!(%error, count, "history commit failed, batch dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use minido_domain::error::{BoxError, MinidoError};
    use minido_domain::id::{Channel, ModuleId};
    use minido_domain::time::{Timestamp, now};

    #[derive(Default)]
    struct InMemoryHistoryRepo {
        batches: Mutex<Vec<Vec<HistoryEntry>>>,
        fail_next: AtomicBool,
    }

    impl InMemoryHistoryRepo {
        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    impl HistoryRepository for InMemoryHistoryRepo {
        fn append_batch(
            &self,
            entries: Vec<HistoryEntry>,
        ) -> impl Future<Output = Result<(), MinidoError>> + Send {
            let result = if self.fail_next.swap(false, Ordering::SeqCst) {
                let err: BoxError = "disk full".into();
                Err(MinidoError::Storage(err))
            } else {
                self.batches.lock().unwrap().push(entries);
                Ok(())
            };
            async { result }
        }

        fn load_all(&self) -> impl Future<Output = Result<Vec<HistoryEntry>, MinidoError>> + Send {
            let all: Vec<HistoryEntry> = self.batches.lock().unwrap().concat();
            async { Ok(all) }
        }

        fn purge_before(
            &self,
            _cutoff: Timestamp,
        ) -> impl Future<Output = Result<u64, MinidoError>> + Send {
            async { Ok(0) }
        }
    }

    fn entry(value: u8) -> HistoryEntry {
        HistoryEntry::output(
            ModuleId::new(1).unwrap(),
            Channel::new(1).unwrap(),
            value,
            now(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn should_commit_burst_as_single_batch_after_quiet_period() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        let (recorder, _handle) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);

        recorder.record(entry(1));
        recorder.record(entry(2));
        recorder.record(entry(3));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(repo.batch_sizes().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(repo.batch_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_restart_window_on_each_new_entry() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        let (recorder, _handle) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);

        recorder.record(entry(1));
        tokio::time::sleep(Duration::from_secs(3)).await;
        recorder.record(entry(2));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(repo.batch_sizes().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(repo.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_flush_pending_entries_when_recorder_is_dropped() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        let (recorder, task) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);

        recorder.record(entry(1));
        recorder.record(entry(2));
        drop(recorder);
        task.join().await.unwrap();

        assert_eq!(repo.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_flush_on_shutdown_while_senders_are_alive() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        let (recorder, task) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);
        let other = recorder.clone();

        recorder.record(entry(1));
        other.record(entry(2));
        task.shutdown().await.unwrap();

        assert_eq!(repo.batch_sizes(), vec![2]);
        // Later entries are refused without panicking.
        other.record(entry(3));
        assert_eq!(repo.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_running_when_control_handle_is_dropped() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        let (recorder, task) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);
        drop(task);

        recorder.record(entry(1));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(repo.batch_sizes(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_running_after_failed_commit() {
        let repo = Arc::new(InMemoryHistoryRepo::default());
        repo.fail_next.store(true, Ordering::SeqCst);
        let (recorder, _handle) = HistoryRecorder::spawn(Arc::clone(&repo), DEFAULT_COMMIT_DELAY);

        recorder.record(entry(1));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(repo.batch_sizes().is_empty());

        recorder.record(entry(2));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(repo.batch_sizes(), vec![1]);
        assert_eq!(repo.load_all().await.unwrap()[0].value, 2);
    }
}
