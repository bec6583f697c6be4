//! Applies or reverts a [`PatchSet`] against a file tree.
//!
//! Each file is handled all-or-nothing: every hunk's location is resolved
//! before any byte is written, and a write goes out via a same-directory
//! temp file plus rename so a crash mid-write never leaves a half-patched
//! file behind. A hunk that can't be located fails only that file; an I/O
//! or path-traversal error aborts the whole run, matching the fact that
//! such errors mean the target tree itself can't be trusted.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::Builder as TempBuilder;

use crate::error::{PatchError, Warning};
use crate::matcher;
use crate::model::{Hunk, HunkLine, LineKind, Patch, PatchSet};
use crate::pathops;

/// Maximum number of leading/trailing pure-context lines a fuzzy match may
/// ignore, combined across both edges. Never exceeds half the hunk.
const MAX_FUZZ_EDGE: usize = 2;

/// Controls how paths are resolved and whether changes are actually written.
pub struct ApplyOptions {
    pub root: PathBuf,
    /// Number of leading path components to discard, as in `patch -pN`.
    pub strip: usize,
    /// When true, computes and reports the outcome without touching disk.
    pub dry_run: bool,
}

impl ApplyOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            strip: 0,
            dry_run: false,
        }
    }
}

/// The outcome of trying to apply or revert a single patch's changes.
#[derive(Debug)]
pub enum FileOutcome {
    Applied { path: PathBuf, warnings: usize },
    Failed { path: PathBuf, error: PatchError },
}

/// Applies every patch in `set` against the tree rooted at `opts.root`.
pub fn apply(set: &PatchSet, opts: &ApplyOptions) -> Result<Vec<FileOutcome>, PatchError> {
    run(set, opts, true)
}

/// Reverts every patch in `set`, undoing a prior forward application.
pub fn revert(set: &PatchSet, opts: &ApplyOptions) -> Result<Vec<FileOutcome>, PatchError> {
    run(set, opts, false)
}

fn run(set: &PatchSet, opts: &ApplyOptions, forward: bool) -> Result<Vec<FileOutcome>, PatchError> {
    let mut outcomes = Vec::with_capacity(set.len());
    for patch in &set.patches {
        let display_path = resolved_display_path(patch, opts, forward);
        match apply_one(patch, opts, forward) {
            Ok(warnings) => {
                info!("{} {}", if forward { "applied" } else { "reverted" }, display_path.display());
                outcomes.push(FileOutcome::Applied {
                    path: display_path,
                    warnings,
                });
            }
            Err(PatchError::Match { path, hunk }) => {
                warn!("could not locate hunk {hunk} of {}", path.display());
                outcomes.push(FileOutcome::Failed {
                    path,
                    error: PatchError::Match {
                        path: display_path,
                        hunk,
                    },
                });
            }
            Err(PatchError::AlreadyExists(path)) => {
                warn!("refusing to overwrite existing non-empty file {}", path.display());
                outcomes.push(FileOutcome::Failed {
                    path,
                    error: PatchError::AlreadyExists(display_path),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcomes)
}

/// Whichever of source/target names the real file on disk, after `strip`.
///
/// Uses the `/dev/null` sentinel directly rather than `Patch::is_creation`/
/// `is_deletion` — those also classify content-only (non-sentinel) creation
/// and deletion, which always names the same file on both sides, and
/// resolving that classification needs the very path this function computes.
fn working_path_bytes(patch: &Patch, forward: bool, strip: usize) -> Vec<u8> {
    let sentinel_creates = if forward {
        patch.source == b"/dev/null"
    } else {
        patch.target == b"/dev/null"
    };
    let raw: &[u8] = if sentinel_creates {
        if forward { &patch.target } else { &patch.source }
    } else if patch.source != b"/dev/null" {
        &patch.source
    } else {
        &patch.target
    };
    pathops::strip_components(raw, strip)
}

fn resolved_display_path(patch: &Patch, opts: &ApplyOptions, forward: bool) -> PathBuf {
    let bytes = working_path_bytes(patch, forward, opts.strip);
    pathops::bytes_to_path(&pathops::normalise(&bytes))
}

fn resolve_path(patch: &Patch, opts: &ApplyOptions, forward: bool) -> Result<PathBuf, PatchError> {
    let bytes = working_path_bytes(patch, forward, opts.strip);
    pathops::join_under(&opts.root, &bytes).map_err(|_| {
        PatchError::PathTraversal(String::from_utf8_lossy(&bytes).into_owned())
    })
}

fn apply_one(patch: &Patch, opts: &ApplyOptions, forward: bool) -> Result<usize, PatchError> {
    let path = resolve_path(patch, opts, forward)?;
    let exists = path.exists();
    let creates = if forward { patch.is_creation(exists) } else { patch.is_deletion() };
    let deletes = if forward { patch.is_deletion() } else { patch.is_creation(exists) };

    if creates {
        if exists_and_nonempty(&path)? {
            return Err(PatchError::AlreadyExists(path));
        }
        let hunk = patch.hunks.first().ok_or(PatchError::Match { path: path.clone(), hunk: 0 })?;
        let content: Vec<u8> = hunk.replacement(forward).concat();
        if !opts.dry_run {
            write_new_file(&path, &content)?;
        }
        return Ok(0);
    }

    if deletes {
        verify_removal(&path, patch, forward)?;
        if !opts.dry_run {
            remove_file(&path)?;
        }
        return Ok(0);
    }

    let original = read_file(&path)?;
    let lines = crate::linereader::split_lines(&original);
    let (new_lines, warnings) = splice(&lines, &patch.hunks, forward)
        .map_err(|hunk| PatchError::Match { path: path.clone(), hunk })?;
    if !opts.dry_run {
        let content = crate::linereader::assemble(&new_lines);
        write_atomic(&path, &content)?;
    }
    Ok(warnings)
}

/// Resolves every hunk's location against `lines` and produces the full
/// replacement content. Fails on the first unlocatable hunk without
/// mutating anything, returning that hunk's 1-based index.
fn splice(lines: &[Vec<u8>], hunks: &[Hunk], forward: bool) -> Result<(Vec<Vec<u8>>, usize), usize> {
    let mut out = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    let mut warnings = 0usize;

    for (i, hunk) in hunks.iter().enumerate() {
        let declared = if forward {
            hunk.startsrc.saturating_sub(1)
        } else {
            hunk.starttgt.saturating_sub(1)
        };
        let relative_declared = declared.saturating_sub(cursor);
        let remaining = &lines[cursor..];

        match locate_hunk(remaining, hunk, forward, relative_declared) {
            Some(HunkMatch {
                start,
                len,
                replacement,
                warned,
            }) => {
                if warned {
                    warnings += 1;
                }
                out.extend(remaining[..start].iter().cloned());
                out.extend(replacement);
                cursor += start + len;
            }
            None => return Err(i + 1),
        }
    }
    out.extend(lines[cursor..].iter().cloned());
    Ok((out, warnings))
}

struct HunkMatch {
    start: usize,
    len: usize,
    replacement: Vec<Vec<u8>>,
    warned: bool,
}

/// Tries, in order: exact/shifted match of the full hunk, a fuzzy match that
/// ignores up to [`MAX_FUZZ_EDGE`] pure-context lines from the hunk's edges,
/// then a whitespace-insensitive match of the full hunk.
fn locate_hunk(file: &[Vec<u8>], hunk: &Hunk, forward: bool, declared_start: usize) -> Option<HunkMatch> {
    let block = hunk.side(forward);
    if let Some(start) = matcher::nearest_exact(file, &block, declared_start) {
        return Some(HunkMatch {
            start,
            len: block.len(),
            replacement: hunk.replacement(forward),
            warned: false,
        });
    }

    if let Some(found) = fuzzy_locate(file, hunk, forward, declared_start) {
        warn!("{}", Warning::FuzzyMatch.message());
        return Some(found);
    }

    if let Some(start) = matcher::find_whitespace(file, &block) {
        warn!("{}", Warning::WhitespaceMatch.message());
        return Some(HunkMatch {
            start,
            len: block.len(),
            replacement: hunk.replacement(forward),
            warned: true,
        });
    }

    None
}

/// Tries every way of dropping up to [`MAX_FUZZ_EDGE`] pure-context lines
/// (combined) from the top and/or bottom of the hunk, keeping the candidate
/// whose match lands closest to `declared_start`.
fn fuzzy_locate(file: &[Vec<u8>], hunk: &Hunk, forward: bool, declared_start: usize) -> Option<HunkMatch> {
    let text = &hunk.text;
    let n = text.len();
    let max_edge = MAX_FUZZ_EDGE.min(n / 2);
    if max_edge == 0 {
        return None;
    }

    let leading_context = text.iter().take_while(|l| l.kind == LineKind::Context).count();
    let trailing_context = text
        .iter()
        .rev()
        .take_while(|l| l.kind == LineKind::Context)
        .count();

    let mut best: Option<(usize, HunkMatch)> = None;

    for top in 0..=max_edge.min(leading_context) {
        for bot in 0..=(max_edge - top).min(trailing_context) {
            if top == 0 && bot == 0 {
                continue;
            }
            let reduced = &text[top..n - bot];
            if reduced.is_empty() {
                continue;
            }
            let block = side_of(reduced, forward);
            if block.is_empty() {
                continue;
            }
            if let Some(start) = matcher::nearest_exact(file, &block, declared_start + top) {
                let effective_start = start.saturating_sub(top);
                let dist = effective_start.abs_diff(declared_start);
                let candidate = HunkMatch {
                    start,
                    len: block.len(),
                    replacement: replacement_of(reduced, forward),
                    warned: true,
                };
                if best.as_ref().is_none_or(|(d, _)| dist < *d) {
                    best = Some((dist, candidate));
                }
            }
        }
    }

    best.map(|(_, m)| m)
}

fn side_of(text: &[HunkLine], forward: bool) -> Vec<&[u8]> {
    text.iter()
        .filter(|l| {
            matches!(
                (forward, l.kind),
                (true, LineKind::Context | LineKind::Remove) | (false, LineKind::Context | LineKind::Add)
            )
        })
        .map(|l| l.content.as_slice())
        .collect()
}

fn replacement_of(text: &[HunkLine], forward: bool) -> Vec<Vec<u8>> {
    text.iter()
        .filter(|l| {
            matches!(
                (forward, l.kind),
                (true, LineKind::Context | LineKind::Add) | (false, LineKind::Context | LineKind::Remove)
            )
        })
        .map(|l| l.content.clone())
        .collect()
}

fn exists_and_nonempty(path: &Path) -> Result<bool, PatchError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PatchError::Io { path: path.to_path_buf(), source }),
    }
}

/// Confirms the file's current content matches every hunk's remove side,
/// at its declared offset, before a deletion is allowed to go through.
fn verify_removal(path: &Path, patch: &Patch, forward: bool) -> Result<(), PatchError> {
    let content = read_file(path)?;
    let lines = crate::linereader::split_lines(&content);
    for (i, hunk) in patch.hunks.iter().enumerate() {
        let declared = if forward {
            hunk.startsrc.saturating_sub(1)
        } else {
            hunk.starttgt.saturating_sub(1)
        };
        let block = hunk.side(forward);
        if !matcher::exact_block(&lines, &block, declared) {
            return Err(PatchError::Match {
                path: path.to_path_buf(),
                hunk: i + 1,
            });
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, PatchError> {
    fs::read(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_new_file(path: &Path, content: &[u8]) -> Result<(), PatchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PatchError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_atomic(path, content)
}

fn remove_file(path: &Path) -> Result<(), PatchError> {
    fs::remove_file(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `content` via a temp file in the same directory, then renames it
/// into place, so readers never observe a partially written file.
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PatchError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = TempBuilder::new()
        .prefix(".patchkit-")
        .tempfile_in(dir)
        .map_err(|source| PatchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    use std::io::Write;
    tmp.write_all(content).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|e| PatchError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Tri-state result of probing whether a patch's forward changes still apply cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanPatch {
    /// The tree is in the expected pre-image state; forward apply should succeed.
    Applicable,
    /// The tree already carries the patch's post-image changes.
    AlreadyApplied,
    /// Neither the pre- nor post-image was found.
    Neither,
}

/// Checks a single patch against the tree without writing anything.
pub fn can_patch(patch: &Patch, opts: &ApplyOptions) -> Result<CanPatch, PatchError> {
    let path = resolve_path(patch, opts, true)?;
    let exists = path.exists();

    if patch.is_creation(exists) {
        return Ok(if exists {
            CanPatch::AlreadyApplied
        } else {
            CanPatch::Applicable
        });
    }
    if patch.is_deletion() {
        return Ok(if exists {
            CanPatch::Applicable
        } else {
            CanPatch::AlreadyApplied
        });
    }

    let lines = match fs::read(&path) {
        Ok(data) => crate::linereader::split_lines(&data),
        Err(_) => return Ok(CanPatch::Neither),
    };

    let forward_ok = patch.hunks.iter().all(|h| {
        let block = h.side(true);
        let declared = h.startsrc.saturating_sub(1);
        matcher::exact_block(&lines, &block, declared)
    });
    if forward_ok {
        return Ok(CanPatch::Applicable);
    }

    let reverse_ok = patch.hunks.iter().all(|h| {
        let block = h.side(false);
        let declared = h.starttgt.saturating_sub(1);
        matcher::exact_block(&lines, &block, declared)
    });
    if reverse_ok {
        return Ok(CanPatch::AlreadyApplied);
    }

    Ok(CanPatch::Neither)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn applies_simple_modification() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "one\ntwo\nthree\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        assert!(matches!(outcomes[0], FileOutcome::Applied { .. }));
        let result = fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "one\nTWO\nthree\n");
    }

    #[test]
    fn fuzzy_match_trims_mismatched_edge_context() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "totally different top\nold line\nshared bottom\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n declared top context\n-old line\n+new line\n shared bottom\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        match &outcomes[0] {
            FileOutcome::Applied { warnings, .. } => assert!(*warnings >= 1),
            FileOutcome::Failed { error, .. } => panic!("expected fuzzy match: {error}"),
        }
        let result = fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "totally different top\nnew line\nshared bottom\n");
    }

    #[test]
    fn revert_undoes_forward_apply() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "one\ntwo\nthree\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        apply(&set, &opts).unwrap();
        revert(&set, &opts).unwrap();
        let result = fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "one\ntwo\nthree\n");
    }

    #[test]
    fn creates_new_file() {
        let dir = tempdir().unwrap();
        let diff = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        apply(&set, &opts).unwrap();
        let result = fs::read_to_string(dir.path().join("new.txt")).unwrap();
        assert_eq!(result, "hello\nworld\n");
    }

    #[test]
    fn deletes_existing_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "gone.txt", "bye\n");
        let diff = "--- a/gone.txt\n+++ /dev/null\n@@ -1,1 +0,0 @@\n-bye\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        apply(&set, &opts).unwrap();
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[test]
    fn deletion_refuses_when_contents_dont_match_removes() {
        let dir = tempdir().unwrap();
        write(dir.path(), "gone.txt", "still here\n");
        let diff = "--- a/gone.txt\n+++ /dev/null\n@@ -1,1 +0,0 @@\n-bye\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        assert!(matches!(outcomes[0], FileOutcome::Failed { .. }));
        assert!(dir.path().join("gone.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("gone.txt")).unwrap(),
            "still here\n"
        );
    }

    #[test]
    fn creation_refuses_to_overwrite_existing_nonempty_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "new.txt", "already has content\n");
        let diff = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,1 @@\n+hello\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        match &outcomes[0] {
            FileOutcome::Failed { error, .. } => assert!(matches!(error, PatchError::AlreadyExists(_))),
            FileOutcome::Applied { .. } => panic!("expected creation to be refused"),
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("new.txt")).unwrap(),
            "already has content\n"
        );
    }

    #[test]
    fn content_based_creation_without_sentinel_is_detected() {
        let dir = tempdir().unwrap();
        let diff = "--- a/fresh.txt\n+++ b/fresh.txt\n@@ -0,0 +1,1 @@\n+brand new\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        assert!(matches!(outcomes[0], FileOutcome::Applied { .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("fresh.txt")).unwrap(),
            "brand new\n"
        );
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let diff = "--- a/../../etc/passwd\n+++ b/../../etc/passwd\n@@ -1 +1 @@\n-x\n+y\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let err = apply(&set, &opts).unwrap_err();
        assert!(matches!(err, PatchError::PathTraversal(_)));
    }

    #[test]
    fn unlocatable_hunk_fails_only_that_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "completely unrelated content\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,1 +1,1 @@\n-does not exist\n+replacement\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let outcomes = apply(&set, &opts).unwrap();
        assert!(matches!(outcomes[0], FileOutcome::Failed { .. }));
        // file is untouched
        let result = fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "completely unrelated content\n");
    }

    #[test]
    fn can_patch_reports_already_applied() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "one\nTWO\nthree\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let result = can_patch(&set.patches[0], &opts).unwrap();
        assert_eq!(result, CanPatch::AlreadyApplied);
    }

    #[test]
    fn can_patch_reports_applicable() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "one\ntwo\nthree\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let opts = ApplyOptions::new(dir.path());
        let result = can_patch(&set.patches[0], &opts).unwrap();
        assert_eq!(result, CanPatch::Applicable);
    }

    #[test]
    fn dry_run_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        write(dir.path(), "f.txt", "one\ntwo\nthree\n");
        let diff = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let set = parser::parse(diff.as_bytes()).unwrap();
        let mut opts = ApplyOptions::new(dir.path());
        opts.dry_run = true;
        apply(&set, &opts).unwrap();
        let result = fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "one\ntwo\nthree\n");
    }
}
