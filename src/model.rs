//! The parsed representation of a patch stream: [`PatchSet`], [`Patch`] and [`Hunk`].

/// The tool dialect a patch (or patch set) was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Plain,
    Git,
    Hg,
    Svn,
    /// A `PatchSet` whose per-patch dialects disagree.
    Mixed,
}

/// The role of a single line inside a hunk's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Remove,
    /// A `\ No newline at end of file` marker, always immediately following
    /// the line it describes; never stands alone.
    NoNewline,
}

/// One line of a hunk body: its role plus its raw payload (terminator
/// included, tag character stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    pub content: Vec<u8>,
}

/// A contiguous region of change within a single file, delimited by an `@@` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub startsrc: usize,
    pub linessrc: usize,
    pub starttgt: usize,
    pub linestgt: usize,
    /// Trailing text on the hunk header line, e.g. the enclosing function signature.
    pub desc: Option<Vec<u8>>,
    pub text: Vec<HunkLine>,
}

impl Hunk {
    /// Lines that carry forward-direction `context`+`remove` content, or, for
    /// reverse application, `context`+`add` content.
    pub fn side(&self, forward: bool) -> Vec<&[u8]> {
        self.text
            .iter()
            .filter(|l| {
                matches!(
                    (forward, l.kind),
                    (true, LineKind::Context | LineKind::Remove)
                        | (false, LineKind::Context | LineKind::Add)
                )
            })
            .map(|l| l.content.as_slice())
            .collect()
    }

    /// The opposite side: what the matched region should be replaced with.
    pub fn replacement(&self, forward: bool) -> Vec<Vec<u8>> {
        self.text
            .iter()
            .filter(|l| {
                matches!(
                    (forward, l.kind),
                    (true, LineKind::Context | LineKind::Add)
                        | (false, LineKind::Context | LineKind::Remove)
                )
            })
            .map(|l| l.content.clone())
            .collect()
    }

    /// True if this hunk carries any actual change (not pure context).
    pub fn has_changes(&self) -> bool {
        self.text
            .iter()
            .any(|l| matches!(l.kind, LineKind::Add | LineKind::Remove))
    }
}

/// One file-level edit: the changes described for a single source/target pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub source: Vec<u8>,
    pub target: Vec<u8>,
    /// Raw VCS metadata lines captured before the `---`/`+++` pair.
    pub header: Vec<Vec<u8>>,
    pub hunks: Vec<Hunk>,
    pub dialect: Dialect,
}

impl Patch {
    fn remove_count(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.text.iter())
            .filter(|l| l.kind == LineKind::Remove)
            .count()
    }

    fn add_count(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.text.iter())
            .filter(|l| l.kind == LineKind::Add)
            .count()
    }

    /// True for a patch declared via the `/dev/null` source sentinel, or one
    /// that adds content without removing any against a target that doesn't
    /// exist yet.
    pub fn is_creation(&self, target_exists: bool) -> bool {
        self.source == b"/dev/null"
            || (!target_exists && self.remove_count() == 0 && self.add_count() > 0)
    }

    /// True for a patch declared via the `/dev/null` target sentinel, or one
    /// that removes content without adding any.
    pub fn is_deletion(&self) -> bool {
        self.target == b"/dev/null" || (self.add_count() == 0 && self.remove_count() > 0)
    }
}

/// An ordered sequence of [`Patch`] items plus aggregate diagnostic counters.
#[derive(Debug, Default, Clone)]
pub struct PatchSet {
    pub patches: Vec<Patch>,
    pub errors: usize,
    pub warnings: usize,
    pub dialect: Dialect,
}

impl PatchSet {
    /// A `PatchSet` is valid when no patch section was fatally unparseable.
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    /// A `PatchSet` is clean when it is valid and no autofixes were needed.
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }
}

impl<'a> IntoIterator for &'a PatchSet {
    type Item = &'a Patch;
    type IntoIter = std::slice::Iter<'a, Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(lines: &[(LineKind, &str)]) -> Hunk {
        Hunk {
            startsrc: 1,
            linessrc: 1,
            starttgt: 1,
            linestgt: 1,
            desc: None,
            text: lines
                .iter()
                .map(|(kind, s)| HunkLine {
                    kind: *kind,
                    content: s.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    fn patch(source: &str, target: &str, hunks: Vec<Hunk>) -> Patch {
        Patch {
            source: source.as_bytes().to_vec(),
            target: target.as_bytes().to_vec(),
            header: Vec::new(),
            hunks,
            dialect: Dialect::Plain,
        }
    }

    #[test]
    fn sentinel_creation_ignores_disk_state() {
        let p = patch("/dev/null", "new.txt", vec![hunk(&[(LineKind::Add, "x\n")])]);
        assert!(p.is_creation(true));
        assert!(p.is_creation(false));
    }

    #[test]
    fn content_only_creation_requires_absent_target_and_no_removes() {
        let p = patch("f.txt", "f.txt", vec![hunk(&[(LineKind::Add, "x\n")])]);
        assert!(p.is_creation(false));
        assert!(!p.is_creation(true));
    }

    #[test]
    fn content_only_deletion_requires_no_adds() {
        let p = patch("f.txt", "f.txt", vec![hunk(&[(LineKind::Remove, "x\n")])]);
        assert!(p.is_deletion());
    }

    #[test]
    fn modification_is_neither_creation_nor_deletion() {
        let p = patch(
            "f.txt",
            "f.txt",
            vec![hunk(&[(LineKind::Remove, "x\n"), (LineKind::Add, "y\n")])],
        );
        assert!(!p.is_creation(false));
        assert!(!p.is_deletion());
    }
}

pub(crate) fn aggregate_dialect(seen: &[Dialect]) -> Dialect {
    let mut iter = seen.iter();
    let Some(&first) = iter.next() else {
        return Dialect::Plain;
    };
    if iter.all(|&d| d == first) {
        first
    } else {
        Dialect::Mixed
    }
}
