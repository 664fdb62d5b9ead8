//! Turns the payload of a range request into complete CSV lines.
//!
//! Chunks are cut at arbitrary byte offsets, so the last segment of a chunk is
//! usually the start of a line whose remainder sits in the next range. That
//! segment is handed back as the tail; the caller moves its cursor back by the
//! tail length and reads it again as the head of the next chunk.

use crate::reading::day::DAY_FIELDS;

/// The complete lines found in a chunk and the unconsumed bytes after them.
#[derive(Debug, PartialEq)]
pub struct Framed<'a> {
    pub lines: Vec<&'a [u8]>,
    pub tail: &'a [u8],
}

/// Splits `chunk` on `\n`.
///
/// The final segment is only emitted when it is the end of the blob
/// (`at_end`) and has all [`DAY_FIELDS`] fields. Anything else is a
/// truncated line and becomes the tail.
pub fn split_records(chunk: &[u8], at_end: bool) -> Framed<'_> {
    let mut lines: Vec<&[u8]> = chunk.split(|&b| b == b'\n').collect();
    // split always yields at least one segment
    let last = lines.pop().unwrap_or_default();

    if at_end && field_count(last) >= DAY_FIELDS {
        lines.push(last);
        Framed { lines, tail: &[] }
    } else {
        Framed { lines, tail: last }
    }
}

fn field_count(segment: &[u8]) -> usize {
    segment.iter().filter(|&&b| b == b',').count() + 1
}

// -- Tests -------------------------------------------------------------------
