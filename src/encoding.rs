use codepage_437::{CP437_CONTROL, FromCp437, ToCp437};
use encoding_rs::{BIG5, Encoding, GB18030, GBK, UTF_8};
use tracing::debug;

/// Candidate encodings tried against raw member-name bytes, in priority
/// order. GBK also covers names labelled GB2312.
const CANDIDATES: [&Encoding; 4] = [UTF_8, GBK, GB18030, BIG5];

/// Characters that show up when GBK bytes were mis-decoded through the
/// archive format's legacy CP437 assumption.
const MOJIBAKE_MARKERS: [char; 3] = ['╨', '╧', '╥'];

/// A member name after best-effort text recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredName {
    pub text: String,
    /// Name of the encoding that decoded cleanly, or `None` when every
    /// candidate failed and the raw CP437 interpretation was kept.
    pub encoding: Option<&'static str>,
}

/// Re-interpret raw member-name bytes through the candidate encodings,
/// accepting the first that decodes without error. If none succeed the bytes
/// are decoded through CP437 (which cannot fail), preserving the garbled
/// name rather than dropping the member.
pub fn recover_name(raw: &[u8]) -> RecoveredName {
    for encoding in CANDIDATES {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            return RecoveredName {
                text: text.into_owned(),
                encoding: Some(encoding.name()),
            };
        }
    }
    RecoveredName {
        text: String::from_cp437(raw.to_vec(), &CP437_CONTROL),
        encoding: None,
    }
}

pub fn contains_mojibake_markers(text: &str) -> bool {
    text.chars().any(|c| MOJIBAKE_MARKERS.contains(&c))
}

/// Narrow repair pass for one path segment: if it carries the mojibake
/// marker characters, round-trip it through CP437 and re-decode as GBK.
/// Returns `None` when the segment has no markers or the round trip fails.
/// Heuristic only; a segment that legitimately contains the markers will be
/// mangled, which is why this stays separate from [`recover_name`].
pub fn repair_mojibake(segment: &str) -> Option<String> {
    if !contains_mojibake_markers(segment) {
        return None;
    }
    let bytes = segment.to_cp437(&CP437_CONTROL).ok()?;
    let (text, _, had_errors) = GBK.decode(&bytes);
    if had_errors {
        debug!("mojibake repair left undecodable bytes in {segment:?}");
    }
    Some(text.into_owned())
}

/// Apply [`repair_mojibake`] to each `/`-separated segment of a relative
/// path, leaving unaffected segments untouched.
pub fn repair_relative_path(path: &str) -> String {
    path.split('/')
        .map(|segment| repair_mojibake(segment).unwrap_or_else(|| segment.to_string()))
        .collect::<Vec<_>>()
        .join("/")
}
