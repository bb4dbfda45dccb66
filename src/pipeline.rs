use crate::classify::{self, Classifier};
use crate::cluster::{self, Group};
use crate::config::AppConfig;
use crate::error::Error;
use crate::extract::{self, ImageDescriptor, ScratchArea};
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::materialize;
use crate::progress::ProgressReporter;
use crate::status::{Stage, StatusBoard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cooperative stop request, checked between archives and between groups.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// No archives, no images, or nothing survived filtering. Reported, not
    /// an error.
    NothingToDo,
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub archives_found: usize,
    pub images_extracted: usize,
    pub images_retained: usize,
    pub images_fingerprinted: usize,
    pub groups_written: usize,
    pub files_written: usize,
    pub audit_path: Option<PathBuf>,
    pub duration: Duration,
}

/// Everything up to clustering: the surviving descriptor/fingerprint arena
/// and the multi-member groups over it. Holds the scratch areas alive so
/// callers can still read the extracted bytes; dropping it reclaims them.
pub struct Analysis {
    pub items: Vec<ImageDescriptor>,
    pub fingerprints: Vec<Fingerprint>,
    pub groups: Vec<Group>,
    pub archives_found: usize,
    pub images_extracted: usize,
    pub images_retained: usize,
    _scratch: Vec<ScratchArea>,
}

/// The ingestion → fingerprint → cluster → materialize engine.
pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Extract, filter, fingerprint and cluster, without writing any
    /// output. Backs the `scan` command and the first half of [`run`].
    pub fn analyze(
        &self,
        classifier: Option<&dyn Classifier>,
        reporter: &dyn ProgressReporter,
        status: &StatusBoard,
        cancel: &CancelToken,
    ) -> Result<Analysis, Error> {
        status.set_stage(Stage::Extracting);
        let extraction = extract::extract_archives(
            Path::new(&self.config.input_dir),
            &self.config,
            cancel,
            reporter,
        )?;
        let images_extracted = extraction.descriptors.len();
        status.update(|s| {
            s.archives_seen = extraction.archives_found;
            s.images_extracted = images_extracted;
        });

        status.set_stage(Stage::Filtering);
        let (retained, dropped) = match classifier {
            Some(classifier) => classify::filter_descriptors(
                extraction.descriptors,
                classifier,
                self.config.classifier_threshold,
            ),
            None => (extraction.descriptors, 0),
        };
        let images_retained = retained.len();
        status.update(|s| s.images_retained = images_retained);
        reporter.on_filter_complete(images_retained, dropped);

        status.set_stage(Stage::Fingerprinting);
        reporter.on_hash_start(retained.len());
        let engine = Fingerprinter::new(self.config.hash_size);
        let hashes = engine.fingerprint_all(&retained);

        let mut items = Vec::with_capacity(retained.len());
        let mut fingerprints = Vec::with_capacity(retained.len());
        let mut hash_failures = 0usize;
        for (descriptor, hash) in retained.into_iter().zip(hashes) {
            match hash {
                Some(fingerprint) => {
                    items.push(descriptor);
                    fingerprints.push(fingerprint);
                }
                None => hash_failures += 1,
            }
        }
        status.update(|s| s.images_fingerprinted = items.len());
        reporter.on_hash_complete(items.len(), hash_failures);

        status.set_stage(Stage::Clustering);
        let groups =
            cluster::discard_singletons(cluster::cluster(&fingerprints, self.config.hash_threshold));
        status.update(|s| s.groups_found = groups.len());
        reporter.on_cluster_complete(groups.len());
        info!(
            "{} groups of near-duplicates among {} fingerprinted images",
            groups.len(),
            items.len()
        );

        Ok(Analysis {
            items,
            fingerprints,
            groups,
            archives_found: extraction.archives_found,
            images_extracted,
            images_retained,
            _scratch: extraction.scratch,
        })
    }

    /// Full pipeline run. Scratch storage is reclaimed on every exit path,
    /// success or failure, because the `Analysis` (and with it every
    /// `ScratchArea`) is dropped before this function returns.
    pub fn run(
        &self,
        classifier: Option<&dyn Classifier>,
        reporter: &dyn ProgressReporter,
        status: &StatusBoard,
        cancel: &CancelToken,
    ) -> Result<RunSummary, Error> {
        let started = Instant::now();
        let result = self.run_inner(classifier, reporter, status, cancel, started);
        match &result {
            Ok(_) => status.set_stage(Stage::Done),
            Err(_) => status.set_stage(Stage::Failed),
        }
        result
    }

    fn run_inner(
        &self,
        classifier: Option<&dyn Classifier>,
        reporter: &dyn ProgressReporter,
        status: &StatusBoard,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<RunSummary, Error> {
        let analysis = self.analyze(classifier, reporter, status, cancel)?;

        if analysis.items.is_empty() {
            warn!("no images to process, nothing to do");
            return Ok(self.empty_summary(&analysis, started));
        }
        if analysis.groups.is_empty() {
            info!("no group has two or more members, nothing to write");
            return Ok(self.empty_summary(&analysis, started));
        }

        status.set_stage(Stage::Materializing);
        let outcome = materialize::materialize(
            &analysis.groups,
            &analysis.items,
            Path::new(&self.config.output_dir),
            cancel,
            reporter,
        )?;
        status.update(|s| s.files_written = outcome.files_written);

        Ok(RunSummary {
            outcome: RunOutcome::Completed,
            archives_found: analysis.archives_found,
            images_extracted: analysis.images_extracted,
            images_retained: analysis.images_retained,
            images_fingerprinted: analysis.items.len(),
            groups_written: analysis.groups.len(),
            files_written: outcome.files_written,
            audit_path: Some(outcome.audit_path),
            duration: started.elapsed(),
        })
    }

    fn empty_summary(&self, analysis: &Analysis, started: Instant) -> RunSummary {
        RunSummary {
            outcome: RunOutcome::NothingToDo,
            archives_found: analysis.archives_found,
            images_extracted: analysis.images_extracted,
            images_retained: analysis.images_retained,
            images_fingerprinted: analysis.items.len(),
            groups_written: 0,
            files_written: 0,
            audit_path: None,
            duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use tempfile::TempDir;

    #[test]
    fn empty_input_is_nothing_to_do() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let output_root = output.path().join("results");

        let config = AppConfig {
            input_dir: input.path().to_string_lossy().into_owned(),
            output_dir: output_root.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };

        let pipeline = Pipeline::new(config);
        let status = StatusBoard::new();
        let summary = pipeline
            .run(None, &SilentReporter, &status, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::NothingToDo);
        assert_eq!(summary.groups_written, 0);
        assert_eq!(summary.files_written, 0);
        // No output subdirectories may appear for an empty run.
        assert!(!output_root.exists());
        assert_eq!(status.snapshot().stage, Stage::Done);
    }

    #[test]
    fn missing_input_root_fails() {
        let config = AppConfig {
            input_dir: "/no/such/root".to_string(),
            ..AppConfig::default()
        };
        let pipeline = Pipeline::new(config);
        let status = StatusBoard::new();
        let result = pipeline.run(None, &SilentReporter, &status, &CancelToken::new());
        assert!(matches!(result, Err(Error::InputRoot(_))));
        assert_eq!(status.snapshot().stage, Stage::Failed);
    }
}
