//! The tolerant patch parser: a line-oriented state machine over byte streams.
//!
//! Per-patch parsing collects diagnostics and keeps going whenever it can, so
//! a single pass produces a full batch report instead of stopping at the
//! first malformed section. Only a stream that never shows a single `---`
//! header, or that opens with a context-diff preamble, fails the whole parse.

use log::warn;

use crate::error::ParseError;
use crate::linereader::LineReader;
use crate::model::{aggregate_dialect, Dialect, Hunk, HunkLine, LineKind, Patch, PatchSet};
use crate::normalizer;

/// Parses a full patch stream into a [`PatchSet`].
///
/// Per-patch defects (bad hunk headers, truncated bodies, ...) are counted in
/// `PatchSet::errors` and otherwise skipped; only the complete absence of any
/// patch header, or a context-diff preamble, is a hard failure.
pub fn parse(data: &[u8]) -> Result<PatchSet, ParseError> {
    let mut reader = LineReader::new(data);
    let mut set = PatchSet::default();
    let mut header: Vec<Vec<u8>> = Vec::new();
    let mut any_patch_header = false;
    let mut saw_context_marker = false;
    let mut dialects_seen: Vec<Dialect> = Vec::new();

    while let Some(line) = reader.next_line() {
        if line.starts_with(b"--- ") {
            any_patch_header = true;
            reader.push_back(line);
            match parse_one_patch(&mut reader, std::mem::take(&mut header)) {
                Ok(mut patch) => {
                    dialects_seen.push(patch.dialect);
                    set.warnings += normalizer::normalize(&mut patch);
                    set.patches.push(patch);
                }
                Err(e) => {
                    set.errors += 1;
                    warn!("skipping unparseable patch section: {e}");
                }
            }
        } else {
            if line.starts_with(b"*** ") {
                saw_context_marker = true;
            }
            header.push(line);
        }
    }

    if !any_patch_header {
        return Err(if saw_context_marker {
            ParseError::ContextFormat
        } else {
            ParseError::NoPatchFound
        });
    }

    set.dialect = aggregate_dialect(&dialects_seen);
    Ok(set)
}

fn parse_one_patch(
    reader: &mut LineReader<'_>,
    header: Vec<Vec<u8>>,
) -> Result<Patch, ParseError> {
    let src_line = reader.next_line().ok_or(ParseError::NoPatchFound)?;
    let source_raw = src_line
        .strip_prefix(b"--- ")
        .ok_or(ParseError::NoPatchFound)?;
    let source = extract_path(source_raw, b"a/");

    let tgt_line = reader.next_line().ok_or(ParseError::MissingPlusLine)?;
    let target_raw = tgt_line
        .strip_prefix(b"+++ ")
        .ok_or(ParseError::MissingPlusLine)?;
    let target = extract_path(target_raw, b"b/");

    let mut hunks = Vec::new();
    loop {
        let Some(peeked) = reader.peek_line() else {
            break;
        };
        if !peeked.starts_with(b"@@") {
            break;
        }
        let header_line = reader.next_line().expect("peeked line must exist");
        let (startsrc, linessrc, starttgt, linestgt, desc) =
            parse_hunk_header(&header_line).ok_or_else(|| ParseError::BadHunkHeader {
                text: String::from_utf8_lossy(&header_line).trim_end().to_string(),
            })?;

        let text = read_hunk_body(reader, linessrc, linestgt);
        let (actual_src, actual_tgt) = count_lines(&text);
        if diverges_by_more_than_one(actual_src, linessrc) || diverges_by_more_than_one(actual_tgt, linestgt) {
            return Err(ParseError::TruncatedHunk {
                expected: linessrc + linestgt,
                found: actual_src + actual_tgt,
            });
        }

        hunks.push(Hunk {
            startsrc,
            linessrc,
            starttgt,
            linestgt,
            desc,
            text,
        });
    }

    if hunks.is_empty() {
        return Err(ParseError::EmptyPatch);
    }

    let dialect = detect_dialect(&header);
    Ok(Patch {
        source,
        target,
        header,
        hunks,
        dialect,
    })
}

fn diverges_by_more_than_one(actual: usize, declared: usize) -> bool {
    (actual as i64 - declared as i64).abs() > 1
}

/// Strips a trailing tab-separated timestamp field and the VCS `a/`/`b/`
/// prefix, but leaves the `/dev/null` sentinel untouched.
fn extract_path(raw: &[u8], vcs_prefix: &[u8]) -> Vec<u8> {
    let mut s = raw;
    if let Some(tab_pos) = s.iter().position(|&b| b == b'\t') {
        s = &s[..tab_pos];
    }
    while let Some(&b) = s.last() {
        if b == b'\n' || b == b'\r' || b == b' ' {
            s = &s[..s.len() - 1];
        } else {
            break;
        }
    }
    if s == b"/dev/null" {
        return s.to_vec();
    }
    match s.strip_prefix(vcs_prefix) {
        Some(stripped) => stripped.to_vec(),
        None => s.to_vec(),
    }
}

fn classify(raw: &[u8]) -> (LineKind, Vec<u8>) {
    match raw.first() {
        Some(b' ') => (LineKind::Context, raw[1..].to_vec()),
        Some(b'+') => (LineKind::Add, raw[1..].to_vec()),
        Some(b'-') => (LineKind::Remove, raw[1..].to_vec()),
        Some(b'\\') => (LineKind::NoNewline, raw[1..].to_vec()),
        _ => (LineKind::Context, raw.to_vec()),
    }
}

/// Reads hunk-body lines bounded by the header's declared `linessrc`/
/// `linestgt` counts, rather than by tag-sniffing alone: a plain-dialect
/// patch's own `--- `/`+++ ` lines start with `-`/`+` too, so a greedy
/// tag-only reader would swallow the next file's header as bogus body
/// lines whenever two patches sit back-to-back with no intervening VCS
/// marker. Boundary-sniffing (stopping on `@@` or `--- `) is only the
/// fallback for a stream that runs out before the declared count is met.
fn read_hunk_body(reader: &mut LineReader<'_>, linessrc: usize, linestgt: usize) -> Vec<HunkLine> {
    let mut lines = Vec::new();
    let mut src_count = 0usize;
    let mut tgt_count = 0usize;

    while src_count < linessrc || tgt_count < linestgt {
        let Some(peeked) = reader.peek_line() else {
            break;
        };
        if peeked.starts_with(b"@@") || peeked.starts_with(b"--- ") {
            break;
        }
        let raw = reader.next_line().expect("peeked line must exist");
        let (kind, content) = classify(&raw);
        match kind {
            LineKind::Context => {
                src_count += 1;
                tgt_count += 1;
            }
            LineKind::Remove => src_count += 1,
            LineKind::Add => tgt_count += 1,
            LineKind::NoNewline => {}
        }
        push_body_line(&mut lines, kind, content);
    }

    // A `\ No newline` marker describes the line just read even though it
    // doesn't count toward either budget, so it can still be waiting right
    // after the declared counts are already satisfied.
    if let Some(peeked) = reader.peek_line() {
        if peeked.starts_with(b"\\") {
            let raw = reader.next_line().expect("peeked line must exist");
            let (kind, content) = classify(&raw);
            push_body_line(&mut lines, kind, content);
        }
    }

    lines
}

fn push_body_line(lines: &mut Vec<HunkLine>, kind: LineKind, content: Vec<u8>) {
    if kind == LineKind::NoNewline {
        // The marker describes the line immediately before it: that
        // line's captured content still carries a terminator copied
        // from the patch text, but the real file has none there.
        if let Some(last) = lines.last_mut() {
            strip_terminator(last);
        }
        lines.push(HunkLine {
            kind,
            content: Vec::new(),
        });
    } else {
        lines.push(HunkLine { kind, content });
    }
}

fn strip_terminator(line: &mut HunkLine) {
    let c = &mut line.content;
    if c.ends_with(b"\r\n") {
        c.truncate(c.len() - 2);
    } else if c.ends_with(b"\n") || c.ends_with(b"\r") {
        c.truncate(c.len() - 1);
    }
}

fn count_lines(text: &[HunkLine]) -> (usize, usize) {
    text.iter().fold((0, 0), |(s, t), l| match l.kind {
        LineKind::Context => (s + 1, t + 1),
        LineKind::Remove => (s + 1, t),
        LineKind::Add => (s, t + 1),
        LineKind::NoNewline => (s, t),
    })
}

/// Parses `@@ -s[,l] +s[,l] @@ desc` into its four coordinates and the
/// optional trailing description text.
fn parse_hunk_header(line: &[u8]) -> Option<(usize, usize, usize, usize, Option<Vec<u8>>)> {
    let s = std::str::from_utf8(line).ok()?;
    let s = s.trim_end_matches(['\n', '\r']);
    let rest = s.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    let middle = &rest[..end];
    let desc = rest[end + 3..].trim_start();

    let mut parts = middle.split_whitespace();
    let src = parts.next()?.strip_prefix('-')?;
    let tgt = parts.next()?.strip_prefix('+')?;
    let (startsrc, linessrc) = parse_range(src)?;
    let (starttgt, linestgt) = parse_range(tgt)?;
    let desc = if desc.is_empty() {
        None
    } else {
        Some(desc.as_bytes().to_vec())
    };
    Some((startsrc, linessrc, starttgt, linestgt, desc))
}

fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((a, b)) => Some((a.parse().ok()?, b.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Lexical dialect detection over a patch's accumulated header lines.
fn detect_dialect(header: &[Vec<u8>]) -> Dialect {
    for (i, line) in header.iter().enumerate() {
        if line.starts_with(b"Index:") && header.get(i + 1).is_some_and(|l| l.starts_with(b"=")) {
            return Dialect::Svn;
        }
        if line.starts_with(b"diff --git ") {
            return Dialect::Git;
        }
        if line.starts_with(b"diff -r ") || line.starts_with(b"# HG changeset patch") {
            return Dialect::Hg;
        }
    }
    Dialect::Plain
}
