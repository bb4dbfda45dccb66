use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Where a run currently is. Stages advance monotonically at defined
/// checkpoints; observers only ever see a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Extracting,
    Filtering,
    Fingerprinting,
    Clustering,
    Materializing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub archives_seen: usize,
    pub images_extracted: usize,
    pub images_retained: usize,
    pub images_fingerprinted: usize,
    pub groups_found: usize,
    pub files_written: usize,
}

/// Shared, checkpoint-updated run status. The pipeline is the single
/// writer; external observers read snapshots. Replaces the global mutable
/// status map of earlier designs.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                stage: Stage::Idle,
                started_at: Utc::now(),
                archives_seen: 0,
                images_extracted: 0,
                images_retained: 0,
                images_fingerprinted: 0,
                groups_found: 0,
                files_written: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().expect("status lock poisoned").clone()
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut StatusSnapshot)) {
        let mut guard = self.inner.write().expect("status lock poisoned");
        apply(&mut guard);
    }

    pub(crate) fn set_stage(&self, stage: Stage) {
        self.update(|s| s.stage = stage);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
