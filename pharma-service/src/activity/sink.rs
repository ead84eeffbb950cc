//! Activity sink trait and bundled implementations

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::entry::ActivityEntry;

/// Failure to persist an activity entry
#[derive(Debug, Clone, thiserror::Error)]
#[error("activity sink error: {message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    /// Create a sink error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Append-only destination for activity entries
///
/// Called from the background writer only, never from a request handler.
/// Implementations must not update or delete entries they already stored.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Persist one entry
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SinkError>;
}

/// Writes each entry as a structured `tracing` event on the `activity` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivitySink;

#[async_trait]
impl ActivitySink for TracingActivitySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SinkError> {
        let metadata = Value::Object(entry.metadata.clone());
        tracing::info!(
            target: "activity",
            id = %entry.id,
            user_id = %entry.user_id,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = ?entry.entity_id,
            metadata = %metadata,
            created_at = %entry.created_at.to_rfc3339(),
            "{}",
            entry.description
        );
        Ok(())
    }
}

/// Keeps entries in memory; useful for development and tests
#[derive(Debug, Default)]
pub struct MemoryActivitySink {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl MemoryActivitySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, in append order
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().await.clone()
    }

    /// Number of entries appended so far
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True when nothing was appended
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl ActivitySink for MemoryActivitySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SinkError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityAction, ActivityDraft};

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemoryActivitySink::new();
        for id in 1..=3 {
            let entry = ActivityDraft::new(ActivityAction::Create, "Customer", format!("#{id}"))
                .with_entity_id(id)
                .into_entry("u");
            sink.append(&entry).await.unwrap();
        }

        let ids: Vec<_> = sink.entries().await.iter().map(|e| e.entity_id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(sink.len().await, 3);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let entry = ActivityDraft::new(ActivityAction::Sync, "Product", "Synced catalogue").into_entry("u");
        assert!(TracingActivitySink.append(&entry).await.is_ok());
    }

    #[tokio::test]
    async fn test_tracing_sink_writes_metadata() {
        let entry = ActivityDraft::new(ActivityAction::Update, "Order", "Order #4 updated")
            .with_entity_id(4)
            .with_metadata("changes", serde_json::json!({ "status": "shipped" }))
            .into_entry("u");
        assert!(TracingActivitySink.append(&entry).await.is_ok());
    }
}
