//! Error and warning taxonomy for the patch engine.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort parsing of a single patch section, or of the whole stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The byte stream contained no recognisable `---`/`+++` header pair.
    #[error("no recognisable patch header ('---'/'+++' pair) found in input")]
    NoPatchFound,
    /// A context-diff (`*** ... ****`) preamble was found instead of a unified diff.
    #[error("context-diff (non-unified) input is not supported")]
    ContextFormat,
    /// A `--- ` line was not followed by a `+++ ` line.
    #[error("expected '+++ ' header line after '--- ' header")]
    MissingPlusLine,
    /// A hunk header line could not be parsed as `@@ -s,l +s,l @@`.
    #[error("unparseable hunk header: {text:?}")]
    BadHunkHeader { text: String },
    /// A hunk's body diverged from its declared line counts by more than one line.
    #[error("hunk body truncated or corrupt: expected {expected} lines, found {found}")]
    TruncatedHunk { expected: usize, found: usize },
    /// A `--- `/`+++ ` pair was found with no following hunks.
    #[error("patch section for a file contains no hunks")]
    EmptyPatch,
}

/// Failures surfaced while applying or reverting a `PatchSet` against a tree.
#[derive(Error, Debug)]
pub enum PatchError {
    /// Failure while parsing the patch stream itself.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A patch-declared path resolves outside the target root after normalisation.
    #[error("path '{0}' resolves outside the target directory")]
    PathTraversal(String),
    /// A hunk could not be located in the candidate file by any matching strategy.
    #[error("could not locate hunk {hunk} of {path}")]
    Match { path: PathBuf, hunk: usize },
    /// A creation patch's target already exists on disk and is non-empty.
    #[error("refusing to create {0:?}: file already exists and is not empty")]
    AlreadyExists(PathBuf),
    /// An I/O error while reading, writing or renaming a file.
    #[error("I/O error while processing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal, counted diagnostics recorded while parsing or normalising a patch.
///
/// These never stop a parse; they only increment `PatchSet::warnings` and are
/// logged via `log::warn!` at the point they're discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Source or target path was absolute and was stripped to a relative one.
    AbsolutePath,
    /// A path normalised to something that escaped its own root via `..` and was clamped.
    ParentEscape,
    /// Source and target basenames disagree and neither is `/dev/null`.
    NameMismatch,
    /// Declared hunk line count was off by exactly one from the actual body.
    HunkCountDrift,
    /// Trailing whitespace was found in a context/add line.
    TrailingWhitespace,
    /// A hunk was located only via the fuzzy-match strategy.
    FuzzyMatch,
    /// A hunk was located only via the whitespace-insensitive strategy.
    WhitespaceMatch,
}

impl Warning {
    /// A short, log-friendly description of the autofix or tolerance applied.
    pub fn message(&self) -> &'static str {
        match self {
            Warning::AbsolutePath => "absolute path stripped to a relative one",
            Warning::ParentEscape => "path escaping its root was clamped",
            Warning::NameMismatch => "source/target basenames differ; using source",
            Warning::HunkCountDrift => "declared hunk line count adjusted by one",
            Warning::TrailingWhitespace => "trailing whitespace found in context/add line",
            Warning::FuzzyMatch => "hunk located via fuzzy (edge-trimmed) match",
            Warning::WhitespaceMatch => "hunk located via whitespace-insensitive match",
        }
    }
}
