// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing console output: whitespace-insensitive equality and unified diffs.

use bstr::{BString, ByteSlice};
use similar::{Algorithm, DiffOp, DiffTag, capture_diff_slices, group_diff_ops};
use std::ops::Range;
use swrite::{SWrite, swrite};
use tracing::debug;

/// The number of context lines around each hunk.
const CONTEXT_LINES: usize = 3;

/// A unified diff, one line per entry, without line terminators.
///
/// An empty diff means the two inputs were identical.
pub type Diff = Vec<BString>;

/// Normalizes whitespace for [`whitespace_equal`].
///
/// Removes all spaces and tabs, collapses runs of newlines into a single newline, and strips a
/// single leading newline.
pub fn normalize(bytes: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b' ' | b'\t' => {}
            b'\n' if normalized.last() == Some(&b'\n') => {}
            _ => normalized.push(byte),
        }
    }
    if normalized.first() == Some(&b'\n') {
        normalized.remove(0);
    }
    normalized
}

/// Returns true if `a` and `b` are the same after [`normalize`].
pub fn whitespace_equal(a: &[u8], b: &[u8]) -> bool {
    normalize(a) == normalize(b)
}

/// Computes the unified diff between `left` and `right`, labelled `left_label` and
/// `right_label`.
///
/// Returns an empty diff if the two are byte-for-byte identical.
pub fn diff(left_label: &str, left: &[u8], right_label: &str, right: &[u8]) -> Diff {
    if left == right {
        debug!("diff '{left_label}' and '{right_label}' fast match");
        return Vec::new();
    }

    let left_lines: Vec<&[u8]> = left.lines().collect();
    let right_lines: Vec<&[u8]> = right.lines().collect();
    let ops = capture_diff_slices(Algorithm::Myers, &left_lines, &right_lines);
    let groups = group_diff_ops(ops, CONTEXT_LINES);
    if groups.is_empty() {
        // Only line terminators differ.
        debug!("diff '{left_label}' and '{right_label}' match line-by-line");
        return Vec::new();
    }

    let mut diff = vec![
        BString::from(format!("--- {left_label}")),
        BString::from(format!("+++ {right_label}")),
    ];
    for group in &groups {
        diff.push(hunk_header(group).into());
        for op in group {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => push_lines(&mut diff, b' ', &left_lines[old_range]),
                DiffTag::Delete => push_lines(&mut diff, b'-', &left_lines[old_range]),
                DiffTag::Insert => push_lines(&mut diff, b'+', &right_lines[new_range]),
                DiffTag::Replace => {
                    push_lines(&mut diff, b'-', &left_lines[old_range]);
                    push_lines(&mut diff, b'+', &right_lines[new_range]);
                }
            }
        }
    }
    debug!(
        "diff '{left_label}' and '{right_label}': {} lines",
        diff.len()
    );
    diff
}

fn push_lines(diff: &mut Diff, prefix: u8, lines: &[&[u8]]) {
    for line in lines {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.push(prefix);
        out.extend_from_slice(line);
        diff.push(BString::from(out));
    }
}

fn hunk_header(group: &[DiffOp]) -> String {
    // group_diff_ops never produces empty groups.
    let (first, last) = match (group.first(), group.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return "@@ -0,0 +0,0 @@".to_owned(),
    };
    let old = first.old_range().start..last.old_range().end;
    let new = first.new_range().start..last.new_range().end;

    let mut header = String::from("@@ -");
    push_range(&mut header, old);
    header.push_str(" +");
    push_range(&mut header, new);
    header.push_str(" @@");
    header
}

// Ranges are 1-based; a single line omits the length, and an empty range names the line before.
fn push_range(out: &mut String, range: Range<usize>) {
    let length = range.len();
    match length {
        0 => swrite!(out, "{},0", range.start),
        1 => swrite!(out, "{}", range.start + 1),
        _ => swrite!(out, "{},{}", range.start + 1, length),
    }
}
