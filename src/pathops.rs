//! Portable, byte-level path normalisation.
//!
//! Patches carry whatever path conventions their producer's OS used, so none
//! of these functions consult `std::path` or the host filesystem; they work
//! on raw byte strings and are deliberately independent of host OS rules.

use std::path::{Path, PathBuf};

/// True if `p` begins with `/`, `\`, or a drive letter followed by `:` and a separator.
pub fn is_absolute(p: &[u8]) -> bool {
    match p.first() {
        Some(b'/') | Some(b'\\') => true,
        Some(c) if c.is_ascii_alphabetic() => {
            p.len() >= 3 && p[1] == b':' && (p[2] == b'/' || p[2] == b'\\')
        }
        _ => false,
    }
}

/// Lexically normalises `p`: backslashes become slashes, `.` segments are
/// dropped, and `..` segments pop the preceding real segment without ever
/// crossing a leading run of `..` segments. Does not touch the filesystem.
pub fn normalise(p: &[u8]) -> Vec<u8> {
    let mut out: Vec<&[u8]> = Vec::new();
    for seg in split_segments(p) {
        if seg.is_empty() || seg == b"." {
            continue;
        }
        if seg == b".." {
            match out.last() {
                Some(&last) if last != b".." => {
                    out.pop();
                }
                _ => out.push(b".."),
            }
        } else {
            out.push(seg);
        }
    }
    out.join(&b'/')
}

fn split_segments(p: &[u8]) -> Vec<&[u8]> {
    // Split on both separators without allocating an owned copy: walk the
    // byte string and slice between separator positions.
    let mut segs = Vec::new();
    let mut start = 0;
    for (i, &b) in p.iter().enumerate() {
        if b == b'/' || b == b'\\' {
            segs.push(&p[start..i]);
            start = i + 1;
        }
    }
    segs.push(&p[start..]);
    segs
}

/// If `p` is absolute, strips any drive letter and all leading separators,
/// returning the relative remainder (possibly empty). Relative paths pass
/// through unchanged.
pub fn strip_absolute(p: &[u8]) -> Vec<u8> {
    if !is_absolute(p) {
        return p.to_vec();
    }
    let mut s = p;
    if s.len() >= 2 && s[0].is_ascii_alphabetic() && s[1] == b':' {
        s = &s[2..];
    }
    while let Some(&b) = s.first() {
        if b == b'/' || b == b'\\' {
            s = &s[1..];
        } else {
            break;
        }
    }
    s.to_vec()
}

/// Removes the first `n` path components of `p`. If `p` has fewer than `n`
/// components, the result is empty.
pub fn strip_components(p: &[u8], n: usize) -> Vec<u8> {
    let segs = split_segments(p);
    if segs.len() <= n {
        return Vec::new();
    }
    segs[n..].join(&b'/')
}

/// Interprets `p` relative to `root`, rejecting any result that would escape
/// `root` after lexical normalisation.
pub fn join_under(root: &Path, p: &[u8]) -> Result<PathBuf, ()> {
    let normalised = normalise(p);
    if normalised == b".." || normalised.starts_with(b"../") {
        return Err(());
    }
    Ok(root.join(bytes_to_path(&normalised)))
}

#[cfg(unix)]
pub fn bytes_to_path(b: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(b))
}

#[cfg(not(unix))]
pub fn bytes_to_path(b: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(b).into_owned())
}

/// The final path component of a byte path, for display and diffstat rows.
pub fn basename(p: &[u8]) -> &[u8] {
    match p.iter().rposition(|&b| b == b'/' || b == b'\\') {
        Some(i) => &p[i + 1..],
        None => p,
    }
}
