//! Request-side handle of the activity log

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::entry::{ActivityDraft, ActivityEntry};
use super::sink::ActivitySink;
use super::worker::ActivityWorker;
use crate::config::ActivityConfig;
use crate::context::RequestContext;

/// Fire-and-forget activity recorder
///
/// Cloning is cheap; every clone feeds the same queue. [`record`](Self::record)
/// never blocks and never fails: a full or closed queue only produces a
/// warning, so the audit trail is best-effort and at-most-once.
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    sender: Option<mpsc::Sender<ActivityEntry>>,
}

impl ActivityLogger {
    /// Start a background writer feeding `sink` and return its logger
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn ActivitySink>, config: &ActivityConfig) -> (Self, ActivityWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = ActivityWorker::start(receiver, sink, config.drain_timeout());
        tracing::debug!(
            queue_capacity = config.queue_capacity,
            "Activity writer started"
        );
        (
            Self {
                sender: Some(sender),
            },
            worker,
        )
    }

    /// A logger that drops every entry
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queue an entry attributed to the context's user
    ///
    /// Anonymous requests are not recorded.
    pub fn record(&self, ctx: &RequestContext, draft: ActivityDraft) {
        let Some(user_id) = ctx.user_id.as_deref() else {
            tracing::trace!(
                request_id = %ctx.request_id,
                action = %draft.action,
                "No user on request, activity not recorded"
            );
            return;
        };
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(draft.into_entry(user_id)) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = ?entry.entity_id,
                    "Activity queue full, entry dropped"
                );
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = ?entry.entity_id,
                    "Activity writer stopped, entry dropped"
                );
            }
        }
    }

    /// True when entries are forwarded to a writer
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// True while the writer is still accepting entries
    pub fn is_accepting(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Entries waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender
            .as_ref()
            .map_or(0, |s| s.max_capacity() - s.capacity())
    }
}
