//! Background writer draining the activity queue into a sink

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::entry::ActivityEntry;
use super::sink::ActivitySink;

/// Counters reported when the writer exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Entries the sink accepted
    pub written: u64,
    /// Entries the sink rejected
    pub failed: u64,
}

/// Handle to the background writer task
pub struct ActivityWorker {
    handle: JoinHandle<WorkerStats>,
    shutdown: CancellationToken,
    drain_timeout: Duration,
}

impl ActivityWorker {
    pub(crate) fn start(
        receiver: mpsc::Receiver<ActivityEntry>,
        sink: Arc<dyn ActivitySink>,
        drain_timeout: Duration,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(receiver, sink, shutdown.clone()));
        Self {
            handle,
            shutdown,
            drain_timeout,
        }
    }

    /// True once the writer task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop accepting entries and write everything already queued
    ///
    /// Waits at most the configured drain timeout; entries still queued after
    /// that are dropped. Returns `None` when the drain did not complete.
    pub async fn shutdown(self) -> Option<WorkerStats> {
        self.shutdown.cancel();

        let mut handle = self.handle;
        match tokio::time::timeout(self.drain_timeout, &mut handle).await {
            Ok(Ok(stats)) => {
                tracing::info!(
                    written = stats.written,
                    failed = stats.failed,
                    "Activity log drained"
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                tracing::error!("Activity writer task failed: {}", e);
                None
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Activity log drain timed out, remaining entries dropped"
                );
                None
            }
        }
    }
}

async fn run(
    mut receiver: mpsc::Receiver<ActivityEntry>,
    sink: Arc<dyn ActivitySink>,
    shutdown: CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        tokio::select! {
            biased;
            entry = receiver.recv() => match entry {
                Some(entry) => write(sink.as_ref(), &entry, &mut stats).await,
                None => break,
            },
            () = shutdown.cancelled() => {
                receiver.close();
                while let Some(entry) = receiver.recv().await {
                    write(sink.as_ref(), &entry, &mut stats).await;
                }
                break;
            }
        }
    }

    stats
}

async fn write(sink: &dyn ActivitySink, entry: &ActivityEntry, stats: &mut WorkerStats) {
    match sink.append(entry).await {
        Ok(()) => stats.written += 1,
        Err(e) => {
            stats.failed += 1;
            tracing::warn!(
                activity_id = %entry.id,
                user_id = %entry.user_id,
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = ?entry.entity_id,
                "Failed to write activity entry: {}",
                e
            );
        }
    }
}
