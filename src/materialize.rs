use crate::caseid;
use crate::cluster::Group;
use crate::error::Error;
use crate::extract::ImageDescriptor;
use crate::pipeline::CancelToken;
use crate::progress::ProgressReporter;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const AUDIT_FILE_NAME: &str = "grouping_audit.csv";

/// Characters allowed in a derived output file name besides alphanumerics.
const ALLOWED_PUNCTUATION: [char; 6] = ['_', '-', '.', '(', ')', '['];

/// One audit row per materialized file, mapping it back to its archive of
/// origin. Append-only; never read back by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub group: String,
    pub position: usize,
    pub case_id: String,
    pub original_name: String,
    pub output_name: String,
    pub source_archive: String,
    pub relative_path: String,
    pub group_size: usize,
}

#[derive(Debug)]
pub struct MaterializeOutcome {
    pub files_written: usize,
    pub audit_path: PathBuf,
}

/// Copy every member of every surviving group into
/// `output_root/group_<id>/` under a derived, sanitized file name, and
/// append one audit row per copy. A failed copy skips that member only.
pub fn materialize(
    groups: &[Group],
    items: &[ImageDescriptor],
    output_root: &Path,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<MaterializeOutcome, Error> {
    fs::create_dir_all(output_root)?;
    let audit_path = output_root.join(AUDIT_FILE_NAME);
    let mut audit_file = File::create(&audit_path)?;
    // UTF-8 BOM so spreadsheet tools pick the right encoding for CJK names.
    audit_file.write_all(b"\xEF\xBB\xBF")?;
    let mut audit = csv::Writer::from_writer(audit_file);

    reporter.on_materialize_start(groups.len());
    let mut files_written = 0usize;

    for group in groups {
        if cancel.is_cancelled() {
            audit.flush()?;
            return Err(Error::Cancelled);
        }

        let group_dir = output_root.join(format!("group_{}", group.id));
        fs::create_dir_all(&group_dir)?;
        let group_size = group.members.len();
        let mut written_in_group = 0usize;

        for (position, &member) in group.members.iter().enumerate() {
            let descriptor = &items[member];
            let position = position + 1;
            let original_name = base_name(&descriptor.relative_path);
            let case_id = caseid::extract_case_id(&descriptor.source_archive);
            let output_name = derive_output_name(group.id, position, &case_id, original_name);
            let dest = group_dir.join(&output_name);

            if let Err(err) = fs::copy(&descriptor.path, &dest) {
                warn!(
                    archive = %descriptor.source_archive,
                    member = %descriptor.relative_path,
                    dest = %dest.display(),
                    "skipping member that failed to copy: {err}"
                );
                continue;
            }

            audit.serialize(AuditRecord {
                group: format!("group_{}", group.id),
                position,
                case_id,
                original_name: original_name.to_string(),
                output_name,
                source_archive: descriptor.source_archive.clone(),
                relative_path: descriptor.relative_path.clone(),
                group_size,
            })?;
            files_written += 1;
            written_in_group += 1;
        }

        reporter.on_group_written(group.id, written_in_group);
    }

    audit.flush()?;
    info!(
        "materialized {} files across {} groups, audit at {}",
        files_written,
        groups.len(),
        audit_path.display()
    );
    reporter.on_materialize_complete(files_written);
    Ok(MaterializeOutcome {
        files_written,
        audit_path,
    })
}

fn base_name(relative_path: &str) -> &str {
    relative_path.rsplit('/').next().unwrap_or(relative_path)
}

/// Zero-padded group id and position, the archive-derived case id, then the
/// original base name, with disallowed characters stripped.
fn derive_output_name(group_id: u32, position: usize, case_id: &str, original: &str) -> String {
    let raw = format!("{group_id:03}_{position:03}_{case_id}_{original}");
    sanitize_file_name(&raw)
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || ALLOWED_PUNCTUATION.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn item(scratch: &Path, name: &str, bytes: &[u8]) -> ImageDescriptor {
        let path = scratch.join(name);
        fs::write(&path, bytes).unwrap();
        ImageDescriptor {
            path,
            source_archive: "DQIHWXO80125054932__20250805105326.zip".to_string(),
            relative_path: format!("photos/{name}"),
        }
    }

    fn read_audit(path: &Path) -> Vec<AuditRecord> {
        let bytes = fs::read(path).unwrap();
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(&bytes);
        let mut reader = csv::Reader::from_reader(body);
        reader.deserialize().collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_file_name("a b/c:d*e.png"), "abcde.png");
        assert_eq!(sanitize_file_name("照片(1)[a].jpg"), "照片(1)[a].jpg");
    }

    #[test]
    fn derive_name_is_zero_padded() {
        let name = derive_output_name(3, 1, "CASE123", "img.png");
        assert_eq!(name, "003_001_CASE123_img.png");
    }

    #[test]
    fn writes_groups_and_matching_audit_rows() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output_root = out.path().join("results");

        let items = vec![
            item(scratch.path(), "a.png", b"aaa"),
            item(scratch.path(), "b.png", b"bbb"),
            item(scratch.path(), "c.png", b"ccc"),
        ];
        // Ids with a gap, as the clustering stage can produce.
        let groups = vec![
            Group { id: 1, members: vec![0, 2] },
            Group { id: 3, members: vec![1] },
        ];

        let cancel = CancelToken::new();
        let outcome =
            materialize(&groups, &items, &output_root, &cancel, &SilentReporter).unwrap();
        assert_eq!(outcome.files_written, 3);

        let rows = read_audit(&outcome.audit_path);
        assert_eq!(rows.len(), 3);

        // Bijection: every audit row names exactly one file on disk, and
        // every written file has a row.
        let mut on_disk = HashSet::new();
        for group_name in ["group_1", "group_3"] {
            for entry in fs::read_dir(output_root.join(group_name)).unwrap() {
                on_disk.insert(format!(
                    "{group_name}/{}",
                    entry.unwrap().file_name().to_string_lossy()
                ));
            }
        }
        let from_audit: HashSet<String> = rows
            .iter()
            .map(|r| format!("{}/{}", r.group, r.output_name))
            .collect();
        assert_eq!(on_disk, from_audit);

        // Group size recorded at write time.
        let g1: Vec<_> = rows.iter().filter(|r| r.group == "group_1").collect();
        assert_eq!(g1.len(), 2);
        assert!(g1.iter().all(|r| r.group_size == 2));
        assert_eq!(g1[0].case_id, "DQIHWXO80125054932__20250805105326");

        // Sources are never moved, only copied.
        assert!(items.iter().all(|i| i.path.is_file()));
    }

    #[test]
    fn copy_failure_skips_member_and_audit_row() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output_root = out.path().join("results");

        let good = item(scratch.path(), "good.png", b"ok");
        let missing = item(scratch.path(), "gone.png", b"tmp");
        fs::remove_file(&missing.path).unwrap();

        let items = vec![good, missing];
        let groups = vec![Group { id: 1, members: vec![0, 1] }];

        let cancel = CancelToken::new();
        let outcome =
            materialize(&groups, &items, &output_root, &cancel, &SilentReporter).unwrap();
        assert_eq!(outcome.files_written, 1);

        let rows = read_audit(&outcome.audit_path);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[0].original_name, "good.png");
    }

    #[test]
    fn audit_file_starts_with_utf8_bom() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output_root = out.path().join("results");
        let items = vec![
            item(scratch.path(), "a.png", b"a"),
            item(scratch.path(), "b.png", b"b"),
        ];
        let groups = vec![Group { id: 1, members: vec![0, 1] }];
        let cancel = CancelToken::new();
        let outcome =
            materialize(&groups, &items, &output_root, &cancel, &SilentReporter).unwrap();

        let bytes = fs::read(outcome.audit_path).unwrap();
        assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
    }
}
