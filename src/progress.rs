/// Stage callbacks for observers of a pipeline run.
///
/// The CLI implements this with indicatif spinners and bars; tests and
/// embedders use [`SilentReporter`]. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    fn on_extract_start(&self, _archives: usize) {}
    fn on_archive_done(&self, _archive: &str, _images_so_far: usize) {}
    fn on_extract_complete(&self, _images: usize) {}
    fn on_filter_complete(&self, _retained: usize, _dropped: usize) {}
    fn on_hash_start(&self, _total: usize) {}
    fn on_hash_complete(&self, _hashed: usize, _failed: usize) {}
    fn on_cluster_complete(&self, _groups: usize) {}
    fn on_materialize_start(&self, _groups: usize) {}
    fn on_group_written(&self, _group_id: u32, _files: usize) {}
    fn on_materialize_complete(&self, _files: usize) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
