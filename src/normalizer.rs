//! Autofixes a freshly parsed [`Patch`] in place, returning the warning count.

use log::warn;

use crate::error::Warning;
use crate::model::{LineKind, Patch};
use crate::pathops;

/// Runs all autofixes for one patch and returns how many warnings they raised.
pub fn normalize(patch: &mut Patch) -> usize {
    let mut warnings = 0;
    warnings += normalize_path(&mut patch.source);
    warnings += normalize_path(&mut patch.target);

    if patch.source != patch.target
        && patch.source != b"/dev/null"
        && patch.target != b"/dev/null"
    {
        warn!(
            "{}: {:?} vs {:?}",
            Warning::NameMismatch.message(),
            String::from_utf8_lossy(&patch.source),
            String::from_utf8_lossy(&patch.target)
        );
        warnings += 1;
    }

    for hunk in &mut patch.hunks {
        warnings += normalize_hunk_counts(hunk);
        if hunk_has_trailing_whitespace(hunk) {
            warn!("{}", Warning::TrailingWhitespace.message());
            warnings += 1;
        }
    }

    warnings
}

fn normalize_path(path: &mut Vec<u8>) -> usize {
    if path.as_slice() == b"/dev/null" {
        return 0;
    }
    let mut warnings = 0;
    if pathops::is_absolute(path) {
        *path = pathops::strip_absolute(path);
        warn!("{}", Warning::AbsolutePath.message());
        warnings += 1;
    }
    let normalised = pathops::normalise(path);
    if normalised == b".." || normalised.starts_with(b"../") {
        *path = clamp_escape(&normalised);
        warn!("{}", Warning::ParentEscape.message());
        warnings += 1;
    } else {
        *path = normalised;
    }
    warnings
}

/// Strips every leading `..` component, keeping the longest safe suffix.
fn clamp_escape(p: &[u8]) -> Vec<u8> {
    let parts: Vec<&[u8]> = p.split(|&b| b == b'/').collect();
    let mut idx = 0;
    while idx < parts.len() && parts[idx] == b".." {
        idx += 1;
    }
    parts[idx..].join(&b'/')
}

fn normalize_hunk_counts(hunk: &mut crate::model::Hunk) -> usize {
    let mut warnings = 0;
    let actual_src = hunk
        .text
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Remove))
        .count();
    let actual_tgt = hunk
        .text
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Add))
        .count();

    if actual_src != hunk.linessrc && actual_src.abs_diff(hunk.linessrc) == 1 {
        hunk.linessrc = actual_src;
        warn!("{}", Warning::HunkCountDrift.message());
        warnings += 1;
    }
    if actual_tgt != hunk.linestgt && actual_tgt.abs_diff(hunk.linestgt) == 1 {
        hunk.linestgt = actual_tgt;
        warn!("{}", Warning::HunkCountDrift.message());
        warnings += 1;
    }
    warnings
}

fn hunk_has_trailing_whitespace(hunk: &crate::model::Hunk) -> bool {
    hunk.text.iter().any(|l| {
        matches!(l.kind, LineKind::Context | LineKind::Add) && {
            let c = &l.content;
            let trimmed = trim_end_all(c);
            trimmed.len() != trim_end_newline(c).len()
        }
    })
}

fn trim_end_newline(c: &[u8]) -> &[u8] {
    if c.ends_with(b"\r\n") {
        &c[..c.len() - 2]
    } else if c.ends_with(b"\n") || c.ends_with(b"\r") {
        &c[..c.len() - 1]
    } else {
        c
    }
}

fn trim_end_all(c: &[u8]) -> &[u8] {
    let mut end = c.len();
    while end > 0 && matches!(c[end - 1], b' ' | b'\t' | b'\r' | b'\n') {
        end -= 1;
    }
    &c[..end]
}
