//! Dotted MIME IDs and their assignment.
//!
//! Numbering rules:
//!
//! - A lone leaf at the root is `1`.
//! - A multipart root is `0` and its children are `1`, `2`, ...
//! - A `message/rfc822` root with a child is `1.0`; the child is `1`.
//! - A `message/rfc822` part `N` numbers its first child in a new scope:
//!   `N.0` if the child is multipart (its children `N.1`, `N.2`, ...),
//!   otherwise `N.1`.
//! - Numbering from an ID ending in `0` gives children the parent prefix,
//!   so `2.0` has children `2.1`, `2.2`, ...

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A dotted-decimal MIME ID such as `1.2.3`.
///
/// Comparison is by segments, so `2.0` and `2` are different IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MimeId(Vec<u32>);

impl MimeId {
    /// Creates an ID from its segments.
    #[must_use]
    pub const fn new(segments: Vec<u32>) -> Self {
        Self(segments)
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Returns true if this ID ends in `0`, i.e. addresses an envelope.
    #[must_use]
    pub fn is_envelope(&self) -> bool {
        self.0.last() == Some(&0)
    }

    /// Returns true if `self` is a proper prefix of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Prefix under which this node's children are numbered.
    fn child_prefix(&self) -> Vec<u32> {
        let mut prefix = self.0.clone();
        if prefix.last() == Some(&0) {
            prefix.pop();
        }
        prefix
    }
}

impl fmt::Display for MimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for MimeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidMimeId(s.to_string()));
        }
        s.split('.')
            .map(|seg| {
                if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::InvalidMimeId(s.to_string()));
                }
                seg.parse::<u32>()
                    .map_err(|_| Error::InvalidMimeId(s.to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl TryFrom<&str> for MimeId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

/// A tree node that can carry a MIME ID.
pub(crate) trait Numbered: Sized {
    fn is_multipart(&self) -> bool;
    fn is_rfc822(&self) -> bool;
    fn id(&self) -> Option<&MimeId>;
    fn assign_id(&mut self, id: MimeId);
    fn children(&self) -> &[Self];
    fn children_mut(&mut self) -> &mut [Self];
}

/// Returns the index path from `node` to the descendant with `id`.
///
/// IDs are compared exactly. The search descends into a child whose ID is
/// a prefix of `id`, or whose ID ends in `0`.
pub(crate) fn find_path<T: Numbered>(node: &T, id: &MimeId) -> Option<Vec<usize>> {
    if node.id() == Some(id) {
        return Some(Vec::new());
    }
    for (i, child) in node.children().iter().enumerate() {
        let Some(child_id) = child.id() else {
            continue;
        };
        if child_id == id {
            return Some(vec![i]);
        }
        if (child_id.is_ancestor_of(id) || child_id.is_envelope())
            && let Some(mut path) = find_path(child, id)
        {
            path.insert(0, i);
            return Some(path);
        }
    }
    None
}

fn with_segment(prefix: &[u32], n: usize) -> MimeId {
    let mut segments = prefix.to_vec();
    segments.push(u32::try_from(n).unwrap_or(u32::MAX));
    MimeId(segments)
}

/// Numbers a tree from its root.
pub(crate) fn number_root<T: Numbered>(node: &mut T) {
    number_scope(node, &[]);
}

/// Numbers the root of an RFC 822 scope under `prefix`.
fn number_scope<T: Numbered>(node: &mut T, prefix: &[u32]) {
    if node.children_mut().is_empty() && !node.is_multipart() {
        node.assign_id(with_segment(prefix, 1));
        return;
    }
    let id = if prefix.is_empty() && node.is_rfc822() {
        MimeId(vec![1, 0])
    } else {
        with_segment(prefix, 0)
    };
    node.assign_id(id);
    for (i, child) in node.children_mut().iter_mut().enumerate() {
        number_from(child, with_segment(prefix, i + 1));
    }
}

/// Numbers a node as `id` and its descendants below it.
pub(crate) fn number_from<T: Numbered>(node: &mut T, id: MimeId) {
    let prefix = id.child_prefix();
    node.assign_id(id);
    if node.is_rfc822() {
        if let Some(first) = node.children_mut().first_mut() {
            number_scope(first, &prefix);
        }
    } else {
        for (i, child) in node.children_mut().iter_mut().enumerate() {
            number_from(child, with_segment(&prefix, i + 1));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        let id: MimeId = "1.2.3".parse().unwrap();
        assert_eq!(id.segments(), &[1, 2, 3]);
        assert_eq!(id.to_string(), "1.2.3");
        assert_eq!(MimeId::try_from("0").unwrap().to_string(), "0");
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "1.", ".1", "1..2", "a", "1.x", "-1"] {
            assert!(matches!(bad.parse::<MimeId>(), Err(Error::InvalidMimeId(_))), "{bad}");
        }
    }

    #[test]
    fn test_envelope_is_distinct() {
        let envelope: MimeId = "2.0".parse().unwrap();
        let part: MimeId = "2".parse().unwrap();
        assert_ne!(envelope, part);
        assert!(envelope.is_envelope());
        assert!(part.is_ancestor_of(&"2.1".parse().unwrap()));
        assert!(!part.is_ancestor_of(&part));
        assert!(!"2".parse::<MimeId>().unwrap().is_ancestor_of(&"21".parse().unwrap()));
    }
}
