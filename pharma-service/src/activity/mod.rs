//! Activity log: best-effort audit trail of mutating actions
//!
//! Handlers call [`ActivityLogger::record`], which only enqueues the entry on
//! a bounded channel. A dedicated [`ActivityWorker`] task appends queued
//! entries to an [`ActivitySink`]. Neither a slow sink nor a failing one can
//! delay or fail a request; on shutdown the worker drains what is already
//! queued.
//!
//! ```rust,ignore
//! let (logger, worker) = ActivityLogger::spawn(Arc::new(TracingActivitySink), &config.activity);
//! logger.record(&ctx, ActivityDraft::new(ActivityAction::Sync, "Product", "Synced catalogue"));
//! worker.shutdown().await;
//! ```

mod entry;
mod logger;
mod sink;
mod worker;

pub use entry::{ActivityAction, ActivityDraft, ActivityEntry};
pub use logger::ActivityLogger;
pub use sink::{ActivitySink, MemoryActivitySink, SinkError, TracingActivitySink};
pub use worker::{ActivityWorker, WorkerStats};
