//! Renders a `git diff --stat`-style summary of a [`PatchSet`].

use std::fmt::Write as _;

use crate::model::{LineKind, Patch, PatchSet};
use crate::pathops;

const BAR_WIDTH: usize = 24;

/// Per-file insertion/deletion counts plus the formatted footer line.
pub struct DiffStat {
    rows: Vec<(String, usize, usize)>,
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub byte_delta: i64,
}

impl DiffStat {
    /// Walks every patch in `set` and tallies line and byte changes.
    pub fn compute(set: &PatchSet) -> Self {
        let mut rows = Vec::with_capacity(set.len());
        let mut total_ins = 0usize;
        let mut total_del = 0usize;
        let mut byte_delta: i64 = 0;

        for patch in &set.patches {
            let (ins, del, bytes) = tally(patch);
            let name = String::from_utf8_lossy(pathops::basename(display_path(patch))).into_owned();
            rows.push((name, ins, del));
            total_ins += ins;
            total_del += del;
            byte_delta += bytes;
        }

        Self {
            files_changed: rows.len(),
            insertions: total_ins,
            deletions: total_del,
            byte_delta,
            rows,
        }
    }

    /// Renders the per-file bar chart followed by the summary footer, in the
    /// conventional `N files changed, M insertions(+), K deletions(-)` shape.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let max_changes = self
            .rows
            .iter()
            .map(|(_, i, d)| i + d)
            .max()
            .unwrap_or(0)
            .max(1);

        for (name, ins, del) in &self.rows {
            let total = ins + del;
            let _ = writeln!(
                out,
                " {:<30} | {:>4} {}",
                name,
                total,
                bar(*ins, *del, total, max_changes)
            );
        }

        let _ = write!(
            out,
            " {} file{} changed, {} insertion{}(+), {} deletion{}(-)",
            self.files_changed,
            plural(self.files_changed),
            self.insertions,
            plural(self.insertions),
            self.deletions,
            plural(self.deletions),
        );
        if self.byte_delta != 0 {
            let _ = write!(
                out,
                ", {}{} bytes",
                if self.byte_delta > 0 { "+" } else { "" },
                self.byte_delta
            );
        }
        out
    }
}

fn display_path(patch: &Patch) -> &[u8] {
    if patch.target != b"/dev/null" {
        &patch.target
    } else {
        &patch.source
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn bar(ins: usize, del: usize, total: usize, max_changes: usize) -> String {
    if total == 0 {
        return String::new();
    }
    let scale = BAR_WIDTH as f64 / max_changes as f64;
    let plus_width = ((ins as f64 * scale).round() as usize).max(if ins > 0 { 1 } else { 0 });
    let minus_width = ((del as f64 * scale).round() as usize).max(if del > 0 { 1 } else { 0 });
    format!("{}{}", "+".repeat(plus_width), "-".repeat(minus_width))
}

/// Counts insertions, deletions and the net byte delta a patch applies.
fn tally(patch: &Patch) -> (usize, usize, i64) {
    let mut ins = 0usize;
    let mut del = 0usize;
    let mut bytes: i64 = 0;

    for hunk in &patch.hunks {
        for line in &hunk.text {
            match line.kind {
                LineKind::Add => {
                    ins += 1;
                    bytes += line.content.len() as i64;
                }
                LineKind::Remove => {
                    del += 1;
                    bytes -= line.content.len() as i64;
                }
                LineKind::Context | LineKind::NoNewline => {}
            }
        }
    }
    (ins, del, bytes)
}
