//! Locates a hunk's match block inside a candidate file via a sequence of
//! increasingly tolerant strategies: exact offset, shifted search, fuzzy
//! (edge-trimmed) search, and finally whitespace-insensitive search.
//!
//! Fuzzy edge-trimming needs to know which trimmed lines are pure context
//! (so the same trim can be applied to the replacement side without
//! fabricating content) — that requires hunk structure the generic matching
//! primitives here don't have, so the fuzzy strategy itself lives in
//! `applier`, built on top of [`nearest_exact`] and [`find_whitespace`].

use log::trace;

/// Which strategy ultimately produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Shifted,
    Fuzzy,
    Whitespace,
}

/// The located region `[start, start+len)` in the candidate file's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub start: usize,
    pub len: usize,
    pub kind: MatchType,
}

/// Finds `block` at `declared_start`, or at the nearest offset from it,
/// comparing byte-for-byte. Ties in distance prefer the earlier-in-file
/// (negative) direction, matching traditional patch behaviour.
pub fn nearest_exact(file: &[Vec<u8>], block: &[&[u8]], declared_start: usize) -> Option<usize> {
    let n = block.len();
    if n == 0 {
        return if file.is_empty() { Some(0) } else { None };
    }
    if exact_at(file, block, declared_start) {
        return Some(declared_start);
    }
    let max_k = file.len().max(declared_start);
    for k in 1..=max_k {
        if declared_start >= k && exact_at(file, block, declared_start - k) {
            return Some(declared_start - k);
        }
        if exact_at(file, block, declared_start + k) {
            return Some(declared_start + k);
        }
    }
    None
}

/// Exact-match entry point used by `can_patch`: does `block` appear
/// verbatim at `start`, with no shifting?
pub fn exact_block(file: &[Vec<u8>], block: &[&[u8]], start: usize) -> bool {
    exact_at(file, block, start)
}

/// Combines [`nearest_exact`] with the distinction the caller usually wants:
/// whether the hit landed exactly on the declared offset or had to shift.
pub fn locate(
    block: &[&[u8]],
    file: &[Vec<u8>],
    declared_start: usize,
) -> Option<(MatchResult, Option<crate::error::Warning>)> {
    let n = block.len();
    let start = nearest_exact(file, block, declared_start)?;
    let kind = if start == declared_start {
        MatchType::Exact
    } else {
        MatchType::Shifted
    };
    trace!("matched block of {n} line(s) at {start} via {kind:?}");
    Some((MatchResult { start, len: n, kind }, None))
}

fn exact_at(file: &[Vec<u8>], block: &[&[u8]], start: usize) -> bool {
    let n = block.len();
    if start + n > file.len() {
        return false;
    }
    file[start..start + n]
        .iter()
        .zip(block.iter())
        .all(|(f, b)| f.as_slice() == *b)
}

fn trim_trailing_ws(b: &[u8]) -> &[u8] {
    let mut end = b.len();
    while end > 0 && matches!(b[end - 1], b' ' | b'\t' | b'\r' | b'\n') {
        end -= 1;
    }
    &b[..end]
}

fn ws_equal(a: &[u8], b: &[u8]) -> bool {
    trim_trailing_ws(a) == trim_trailing_ws(b)
}

fn whitespace_at(file: &[Vec<u8>], block: &[&[u8]], start: usize) -> bool {
    let n = block.len();
    if start + n > file.len() {
        return false;
    }
    file[start..start + n]
        .iter()
        .zip(block.iter())
        .all(|(f, b)| ws_equal(f, b))
}

/// Last-resort whole-file search ignoring trailing whitespace differences.
pub fn find_whitespace(file: &[Vec<u8>], block: &[&[u8]]) -> Option<usize> {
    let n = block.len();
    if n == 0 || n > file.len() {
        return None;
    }
    (0..=file.len() - n).find(|&start| whitespace_at(file, block, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<Vec<u8>> {
        v.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn exact_match_at_declared_offset() {
        let file = lines(&["a\n", "b\n", "c\n"]);
        let block: Vec<&[u8]> = vec![b"b\n"];
        let (m, _) = locate(&block, &file, 1).unwrap();
        assert_eq!(m.start, 1);
        assert_eq!(m.kind, MatchType::Exact);
    }

    #[test]
    fn shifted_match_prefers_negative_direction_on_tie() {
        let file = lines(&["x\n", "b\n", "y\n", "b\n"]);
        let block: Vec<&[u8]> = vec![b"b\n"];
        let (m, _) = locate(&block, &file, 2).unwrap();
        assert_eq!(m.start, 1);
        assert_eq!(m.kind, MatchType::Shifted);
    }

    #[test]
    fn whitespace_insensitive_last_resort() {
        let file = lines(&["line with trailing spaces   \n"]);
        let block: Vec<&[u8]> = vec![b"line with trailing spaces\n"];
        assert_eq!(find_whitespace(&file, &block), Some(0));
    }

    #[test]
    fn no_match_returns_none() {
        let file = lines(&["completely\n", "different\n"]);
        let block: Vec<&[u8]> = vec![b"nope\n"];
        assert!(locate(&block, &file, 0).is_none());
        assert!(find_whitespace(&file, &block).is_none());
    }

    #[test]
    fn empty_block_matches_only_empty_file() {
        assert!(locate(&[], &[], 0).is_some());
        let file = lines(&["a\n"]);
        assert!(locate(&[], &file, 0).is_none());
    }
}
