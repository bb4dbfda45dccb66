use crate::extract::ImageDescriptor;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ClassifyError(pub String);

/// External image classifier, treated as a black-box confidence score over
/// an image file. The model lives outside this crate.
pub trait Classifier: Sync {
    fn classify(&self, image: &Path) -> Result<f32, ClassifyError>;
}

impl<F> Classifier for F
where
    F: Fn(&Path) -> Result<f32, ClassifyError> + Sync,
{
    fn classify(&self, image: &Path) -> Result<f32, ClassifyError> {
        self(image)
    }
}

/// Keep descriptors whose classifier score reaches `threshold`. Classifier
/// errors drop the single descriptor, never the batch. Input order is
/// preserved. Returns the retained set and the dropped count.
pub fn filter_descriptors(
    descriptors: Vec<ImageDescriptor>,
    classifier: &dyn Classifier,
    threshold: f32,
) -> (Vec<ImageDescriptor>, usize) {
    let total = descriptors.len();
    let mut retained = Vec::with_capacity(total);
    for descriptor in descriptors {
        match classifier.classify(&descriptor.path) {
            Ok(score) if score >= threshold => retained.push(descriptor),
            Ok(score) => {
                info!(
                    archive = %descriptor.source_archive,
                    member = %descriptor.relative_path,
                    score,
                    "dropped by classifier"
                );
            }
            Err(err) => {
                warn!(
                    archive = %descriptor.source_archive,
                    member = %descriptor.relative_path,
                    "classifier failed, dropping image: {err}"
                );
            }
        }
    }
    let dropped = total - retained.len();
    (retained, dropped)
}
