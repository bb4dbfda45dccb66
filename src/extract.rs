use crate::config::AppConfig;
use crate::encoding;
use crate::error::Error;
use crate::pipeline::CancelToken;
use crate::progress::ProgressReporter;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// One extracted image. `path` points into the owning scratch area;
/// `relative_path` is the member path inside the archive after best-effort
/// encoding recovery, `/`-separated.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub path: PathBuf,
    pub source_archive: String,
    pub relative_path: String,
}

/// RAII handle for one archive's isolated scratch directory. Dropping it
/// deletes the extracted bytes, so these handles must outlive
/// materialization.
pub struct ScratchArea {
    dir: TempDir,
    pub archive: String,
}

impl ScratchArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Recursively discover archive files under `root`, in a stable
/// path-sorted order. A missing root is the one fatal discovery error.
pub fn discover_archives(root: &Path, config: &AppConfig) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::InputRoot(root.to_path_buf()));
    }

    let mut archives = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if config.is_archive_name(name) {
                archives.push(path.to_path_buf());
            }
        }
    }
    Ok(archives)
}

pub struct ExtractOutcome {
    pub descriptors: Vec<ImageDescriptor>,
    pub scratch: Vec<ScratchArea>,
    pub archives_found: usize,
}

/// Extract every image member of every archive under `root` into per-archive
/// scratch areas. Unopenable archives and unextractable members are skipped
/// with logs; the returned descriptors are sorted by (archive, member path)
/// so downstream ordering is reproducible.
pub fn extract_archives(
    root: &Path,
    config: &AppConfig,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<ExtractOutcome, Error> {
    let archives = discover_archives(root, config)?;
    reporter.on_extract_start(archives.len());

    let mut descriptors = Vec::new();
    let mut scratch_areas = Vec::new();

    for archive_path in &archives {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match extract_archive(archive_path, config) {
            Ok((mut extracted, scratch)) => {
                info!(
                    archive = %scratch.archive,
                    images = extracted.len(),
                    "extracted archive"
                );
                descriptors.append(&mut extracted);
                scratch_areas.push(scratch);
            }
            // Unreadable archive: skip it, keep going.
            Err(Error::ArchiveOpen { archive, source }) => {
                error!("skipping unreadable archive {archive}: {source}");
            }
            // Anything else (e.g. scratch storage exhausted) is fatal.
            Err(err) => return Err(err),
        }
        reporter.on_archive_done(
            &archive_path.file_name().unwrap_or_default().to_string_lossy(),
            descriptors.len(),
        );
    }

    descriptors.sort_by(|a, b| {
        (&a.source_archive, &a.relative_path).cmp(&(&b.source_archive, &b.relative_path))
    });
    info!("extracted {} images from {} archives", descriptors.len(), archives.len());
    reporter.on_extract_complete(descriptors.len());
    Ok(ExtractOutcome {
        descriptors,
        scratch: scratch_areas,
        archives_found: archives.len(),
    })
}

fn extract_archive(
    archive_path: &Path,
    config: &AppConfig,
) -> Result<(Vec<ImageDescriptor>, ScratchArea), Error> {
    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_path.to_string_lossy().into_owned());
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Scratch creation failures bubble up as Io: no scratch means no run.
    let scratch_prefix: String = format!("grouprs_{stem}_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let dir = tempfile::Builder::new().prefix(&scratch_prefix).tempdir()?;

    let file = File::open(archive_path).map_err(|e| Error::ArchiveOpen {
        archive: archive_name.clone(),
        source: zip::result::ZipError::Io(e),
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| Error::ArchiveOpen {
        archive: archive_name.clone(),
        source: e,
    })?;

    let mut descriptors = Vec::new();
    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    archive = %archive_name,
                    index,
                    "skipping unreadable member: {err}"
                );
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let recovered = encoding::recover_name(entry.name_raw());
        if recovered.encoding.is_none() {
            warn!(
                archive = %archive_name,
                member = %recovered.text,
                "no candidate encoding matched member name, keeping raw form"
            );
        }
        // Some archives store backslash separators; normalize before the
        // per-segment repair pass.
        let normalized = recovered.text.replace('\\', "/");
        let relative_path = encoding::repair_relative_path(&normalized);

        if !config.is_image_name(&relative_path) {
            continue;
        }

        let Some(safe_relative) = sanitize_member_path(&relative_path) else {
            warn!(
                archive = %archive_name,
                member = %relative_path,
                "skipping member with unusable path"
            );
            continue;
        };

        let dest = dir.path().join(&safe_relative);
        if let Err(err) = write_member(&mut entry, &dest) {
            warn!(
                archive = %archive_name,
                member = %relative_path,
                "skipping member that failed to extract: {err}"
            );
            continue;
        }

        descriptors.push(ImageDescriptor {
            path: dest,
            source_archive: archive_name.clone(),
            relative_path,
        });
    }

    Ok((
        descriptors,
        ScratchArea {
            dir,
            archive: archive_name,
        },
    ))
}

fn write_member<R: io::Read>(entry: &mut R, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(dest)?;
    io::copy(entry, &mut out)?;
    Ok(())
}

/// Rebuild a member path from its plain components, dropping `..`, `.`,
/// empty segments and any absolute prefix so extraction cannot escape the
/// scratch area. Returns `None` when nothing usable remains.
fn sanitize_member_path(relative: &str) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        // Strip anything resembling a drive or root prefix.
        let segment = segment.trim_end_matches(':');
        if segment.is_empty() {
            continue;
        }
        cleaned.push(segment);
    }
    if cleaned.as_os_str().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
