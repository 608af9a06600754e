//! Header/body split and multipart boundary scanning.
//!
//! A delimiter matches wherever `--boundary` starts a line, including when
//! it is only a prefix of a longer token. Literal boundary bytes inside a
//! body part are therefore mistaken for a delimiter; generated boundaries
//! are random enough that this only affects hostile or broken input.

/// One part located by [`find_boundary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRange {
    /// Offset of the first byte after the delimiter line.
    pub start: usize,
    /// Length up to the EOL before the next delimiter, or `None` if no
    /// further delimiter was found.
    pub length: Option<usize>,
}

impl BoundaryRange {
    /// Returns the end offset, using `limit` for an open range.
    #[must_use]
    pub fn end(&self, limit: usize) -> usize {
        self.length.map_or(limit, |len| self.start + len)
    }
}

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Splits an entity into headers and body.
///
/// Returns `(header_end, body_start)`. The header block excludes the EOL of
/// its last line; the body starts after the blank line. A `\r\n\r\n`
/// separator is preferred over `\n\n`. Text without a blank line is all
/// header.
#[must_use]
pub fn find_header_boundary(text: &[u8]) -> (usize, usize) {
    if text.starts_with(b"\r\n") {
        return (0, 2);
    }
    if text.starts_with(b"\n") {
        return (0, 1);
    }
    if let Some(pos) = find_bytes(text, b"\r\n\r\n", 0) {
        return (pos, pos + 4);
    }
    if let Some(pos) = find_bytes(text, b"\n\n", 0) {
        return (pos, pos + 2);
    }
    (text.len(), text.len())
}

/// Locates the parts of a multipart body.
///
/// Scans `text` from `start` for lines beginning with `--boundary`. Each
/// delimiter opens a part on the following line and closes the previous
/// one; the EOL before a delimiter belongs to the delimiter. A `-` right
/// after the token marks the closing delimiter and ends the scan. With
/// `stop_after`, scanning ends once the part at that index is closed.
#[must_use]
pub fn find_boundary(
    text: &[u8],
    start: usize,
    boundary: &str,
    stop_after: Option<usize>,
) -> Vec<BoundaryRange> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary.as_bytes());

    let mut ranges: Vec<BoundaryRange> = Vec::new();
    let mut pos = start;

    while let Some(found) = find_bytes(text, &delimiter, pos) {
        pos = found + delimiter.len();
        if found > start && text[found - 1] != b'\n' {
            continue;
        }

        let mut line_start = found;
        if line_start > start && text[line_start - 1] == b'\n' {
            line_start -= 1;
            if line_start > start && text[line_start - 1] == b'\r' {
                line_start -= 1;
            }
        }
        if let Some(open) = ranges.last_mut().filter(|r| r.length.is_none()) {
            open.length = Some(line_start.saturating_sub(open.start));
            if stop_after.is_some_and(|stop| ranges.len() > stop) {
                return ranges;
            }
        }

        if text.get(pos) == Some(&b'-') {
            return ranges;
        }
        let next = text[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(text.len(), |nl| pos + nl + 1);
        ranges.push(BoundaryRange {
            start: next,
            length: None,
        });
        pos = next;
    }
    ranges
}
