//! A tolerant unified-diff patch engine.
//!
//! Parses plain, Git, Subversion and Mercurial unified-diff streams into a
//! [`PatchSet`], autofixes the common defects real-world patches carry, and
//! applies or reverts the result against a file tree using a hierarchy of
//! matching strategies so that hand-edited or slightly stale hunks still
//! land where they mean to.
//!
//! ```no_run
//! use patchkit::{parse, apply, ApplyOptions};
//!
//! let data = std::fs::read("changes.patch").unwrap();
//! let set = parse(&data).unwrap();
//! let outcomes = apply(&set, &ApplyOptions::new(".")).unwrap();
//! for outcome in outcomes {
//!     println!("{outcome:?}");
//! }
//! ```

pub mod applier;
pub mod diffstat;
pub mod error;
pub mod linereader;
pub mod matcher;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod pathops;

pub use applier::{apply, can_patch, revert, ApplyOptions, CanPatch, FileOutcome};
pub use diffstat::DiffStat;
pub use error::{ParseError, PatchError, Warning};
pub use matcher::{MatchResult, MatchType};
pub use model::{Dialect, Hunk, HunkLine, LineKind, Patch, PatchSet};
pub use parser::parse;

// `apply`/`revert` operate on a whole `PatchSet`; `can_patch` takes a single
// `Patch` since "already applied" is only meaningful per file.
