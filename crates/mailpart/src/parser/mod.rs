//! Structural MIME parser.
//!
//! Parsing happens in two steps. [`parse_structure`] scans the raw text and
//! returns a [`Structure`] tree of byte ranges without copying any body;
//! [`parse_message`] then builds a [`Part`] tree from it, decoding every
//! leaf body. Malformed input degrades to a best-effort tree: a boundary
//! that never recurs yields a childless multipart and an unknown transfer
//! encoding yields an `application/octet-stream` part.

mod boundary;
mod structure;

pub use boundary::{BoundaryRange, find_boundary, find_header_boundary};
pub use structure::{Structure, parse_structure};

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{Error, Result};
use crate::part::{MimeId, Part, TransferEncoding};

/// Options for [`parse_message`] and [`parse_structure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest nesting level descended into.
    pub max_depth: usize,
    /// Charset for 8-bit header bytes that are not UTF-8.
    pub default_charset: String,
    /// Parse as MIME even without a `MIME-Version` header.
    pub force_mime: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_charset: "us-ascii".to_string(),
            force_mime: false,
        }
    }
}

impl ParseOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nesting limit.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the fallback header charset.
    #[must_use]
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = charset.into();
        self
    }

    /// Parses as MIME regardless of `MIME-Version`.
    #[must_use]
    pub const fn force_mime(mut self, force: bool) -> Self {
        self.force_mime = force;
        self
    }
}

/// Which section of an entity [`get_raw_part_text`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPart {
    /// The header block, without its final EOL.
    Header,
    /// The body.
    Body,
}

/// Parses a raw message into a numbered [`Part`] tree.
///
/// Without `MIME-Version` (and without `force_mime`) the whole body becomes
/// a single `text/plain` part. The root is marked as the base part.
///
/// # Errors
///
/// Returns [`Error::MissingBoundary`] for a multipart entity without a
/// boundary parameter.
///
/// # Example
///
/// ```
/// use mailpart::parser::{ParseOptions, parse_message};
///
/// let raw = b"MIME-Version: 1.0\r\n\
/// Content-Type: multipart/mixed; boundary=\"X\"\r\n\
/// \r\n\
/// --X\r\n\
/// Content-Type: text/plain\r\n\
/// \r\n\
/// one\r\n\
/// --X\r\n\
/// Content-Type: text/plain\r\n\
/// \r\n\
/// two\r\n\
/// --X--\r\n";
///
/// let part = parse_message(raw, &ParseOptions::new())?;
/// assert_eq!(part.primary_type(), "multipart");
/// assert_eq!(part.parts()[1].contents(), b"two");
/// # Ok::<(), mailpart::Error>(())
/// ```
pub fn parse_message(text: &[u8], opts: &ParseOptions) -> Result<Part> {
    let structure = parse_structure(text, opts)?;
    let mut part = build_part(text, &structure);
    part.set_base_part(true);
    part.build_mime_ids();
    Ok(part)
}

fn build_part(text: &[u8], s: &Structure) -> Part {
    let mut part = Part::with_type(&s.mime_type());
    for (name, value) in s.params.iter() {
        part.set_content_type_parameter(name, value);
    }
    part.set_disposition(s.disposition);
    for (name, value) in s.disposition_params.iter() {
        part.set_disposition_parameter(name, value);
    }
    if let Some(description) = &s.description {
        part.set_description(description);
    }
    if !s.language.is_empty() {
        part.set_language(&s.language);
    }
    if let Some(cid) = &s.content_id {
        part.set_content_id(cid);
    }
    part.set_duration(s.duration);

    let body = &text[s.body.clone()];
    if part.is_multipart() {
        if s.parts.is_empty() && !body.is_empty() {
            part.set_contents(body, TransferEncoding::SevenBit);
        }
        part.set_transfer_encoding(&s.encoding);
    } else if body.is_empty() {
        part.set_transfer_encoding(&s.encoding);
    } else {
        let encoding = s
            .encoding
            .parse::<TransferEncoding>()
            .unwrap_or(TransferEncoding::Binary);
        part.set_contents(body, encoding);
        part.set_transfer_encoding(&s.encoding);
    }

    for child in &s.parts {
        part.add_part(build_part(text, child));
    }
    part
}

/// Returns the raw header block or body of the entity with `id`, located
/// without building a [`Part`] tree.
///
/// # Errors
///
/// Returns [`Error::PartNotFound`] if no entity has this ID, or
/// [`Error::MissingBoundary`] if the message is malformed.
pub fn get_raw_part_text<'a>(text: &'a [u8], which: RawPart, id: &MimeId) -> Result<&'a [u8]> {
    let structure = parse_structure(text, &ParseOptions::new())?;
    let entity = structure
        .find(id)
        .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
    let range = match which {
        RawPart::Header => entity.header.clone(),
        RawPart::Body => entity.body.clone(),
    };
    Ok(&text[range])
}
