//! Stage-observer trait for per-upload pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ExtractionConfigBuilder::observer`] to receive an event
//! each time an upload moves through the state machine:
//!
//! ```text
//! Received → Classified → TextExtracted → ModelQueried → Parsed → Rendered → Persisted
//! ```
//!
//! Image uploads stop after `TextExtracted`; unsupported uploads stop after
//! `Received`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2csv::{ExtractionConfig, PipelineObserver, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     stages: Mutex<Vec<Stage>>,
//! }
//!
//! impl PipelineObserver for Recorder {
//!     fn on_stage(&self, _filename: &str, stage: Stage) {
//!         self.stages.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .observer(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline states, in the order an upload passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Received,
    Classified,
    TextExtracted,
    ModelQueried,
    Parsed,
    Rendered,
    Persisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Received => "received",
            Stage::Classified => "classified",
            Stage::TextExtracted => "text extracted",
            Stage::ModelQueried => "model queried",
            Stage::Parsed => "parsed",
            Stage::Rendered => "rendered",
            Stage::Persisted => "persisted",
        };
        f.write_str(label)
    }
}

/// Called by the orchestrator as an upload advances.
///
/// All methods default to no-ops so implementors override only what they
/// need. Implementations must be `Send + Sync`; a single pipeline may serve
/// uploads from several tasks.
pub trait PipelineObserver: Send + Sync {
    /// Called after the upload has entered `stage`.
    fn on_stage(&self, filename: &str, stage: Stage) {
        let _ = (filename, stage);
    }

    /// Called when the completion service could not produce a reply.
    fn on_reply_unavailable(&self, filename: &str, reason: &str) {
        let _ = (filename, reason);
    }

    /// Called when the upload fails with a fatal error.
    fn on_failed(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ObserverHandle = Arc<dyn PipelineObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        stages: AtomicUsize,
        unavailable: AtomicUsize,
        failures: AtomicUsize,
    }

    impl PipelineObserver for Counting {
        fn on_stage(&self, _filename: &str, _stage: Stage) {
            self.stages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_reply_unavailable(&self, _filename: &str, _reason: &str) {
            self.unavailable.fetch_add(1, Ordering::SeqCst);
        }

        fn on_failed(&self, _filename: &str, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_stage("a.pdf", Stage::Received);
        obs.on_reply_unavailable("a.pdf", "timeout");
        obs.on_failed("a.pdf", "bad");
    }

    #[test]
    fn counting_observer_receives_events() {
        let obs = Counting::default();
        obs.on_stage("a.pdf", Stage::Received);
        obs.on_stage("a.pdf", Stage::Classified);
        obs.on_reply_unavailable("a.pdf", "503");
        assert_eq!(obs.stages.load(Ordering::SeqCst), 2);
        assert_eq!(obs.unavailable.load(Ordering::SeqCst), 1);
        assert_eq!(obs.failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Received < Stage::Classified);
        assert!(Stage::Rendered < Stage::Persisted);
        assert_eq!(Stage::TextExtracted.to_string(), "text extracted");
    }
}
