//! Declarative description of a parsed message.

use super::ParseOptions;
use super::boundary::{find_boundary, find_header_boundary};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::param::ParamMap;
use crate::part::{Disposition, MimeId, Numbered, TransferEncoding, find_path, number_root};
use std::ops::Range;
use tracing::{debug, warn};

/// The structure of one entity, with byte ranges into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Structure {
    /// Primary type, lowercase.
    pub primary: String,
    /// Subtype, lowercase.
    pub sub: String,
    /// Content-Type parameters.
    pub params: ParamMap,
    /// Content-Disposition.
    pub disposition: Disposition,
    /// Content-Disposition parameters.
    pub disposition_params: ParamMap,
    /// Content-Transfer-Encoding as written, lowercase.
    pub encoding: String,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Language tags.
    pub language: Vec<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Content-Duration in seconds.
    pub duration: Option<u64>,
    /// Body size with every line ending counted as CRLF.
    pub size: usize,
    /// Header block, without the EOL of its last line.
    pub header: Range<usize>,
    /// Body.
    pub body: Range<usize>,
    /// MIME ID.
    pub id: Option<MimeId>,
    /// Child entities.
    pub parts: Vec<Structure>,
}

impl Structure {
    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    /// Returns the entity with `id`.
    #[must_use]
    pub fn find(&self, id: &MimeId) -> Option<&Self> {
        find_path(self, id)?
            .iter()
            .try_fold(self, |node, &i| node.parts.get(i))
    }

    fn from_headers(headers: &Headers, default_type: &str) -> Self {
        let mut s = Self {
            encoding: "7bit".to_string(),
            ..Self::default()
        };

        let declared = headers
            .value_base("Content-Type")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v.contains('/'));
        match declared {
            Some(mime_type) => {
                let (primary, sub) = mime_type.split_once('/').unwrap_or(("text", "plain"));
                s.primary = primary.trim().to_string();
                s.sub = sub.trim().to_string();
                if let Some(params) = headers.params("Content-Type") {
                    s.params = params.clone();
                }
            }
            None => {
                let (primary, sub) = default_type.split_once('/').unwrap_or(("text", "plain"));
                s.primary = primary.to_string();
                s.sub = sub.to_string();
                if default_type == "text/plain" {
                    s.params.insert("charset", "us-ascii");
                }
            }
        }

        if let Some(encoding) = headers.value_base("Content-Transfer-Encoding") {
            s.encoding = encoding.trim().to_ascii_lowercase();
        }
        if let Some(disposition) = headers.value_base("Content-Disposition") {
            s.disposition = Disposition::parse(disposition);
            if let Some(params) = headers.params("Content-Disposition") {
                s.disposition_params = params.clone();
            }
        }
        s.description = headers
            .value("Content-Description")
            .filter(|v| !v.is_empty());
        if let Some(language) = headers.value_base("Content-Language") {
            s.language = language
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        s.content_id = headers.value_base("Content-ID").map(|cid| {
            cid.trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        });
        s.duration = headers
            .value_base("Content-Duration")
            .and_then(|d| d.trim().parse().ok());
        s
    }
}

impl Numbered for Structure {
    fn is_multipart(&self) -> bool {
        self.primary == "multipart"
    }

    fn is_rfc822(&self) -> bool {
        self.primary == "message" && self.sub == "rfc822"
    }

    fn id(&self) -> Option<&MimeId> {
        self.id.as_ref()
    }

    fn assign_id(&mut self, id: MimeId) {
        self.id = Some(id);
    }

    fn children(&self) -> &[Self] {
        &self.parts
    }

    fn children_mut(&mut self) -> &mut [Self] {
        &mut self.parts
    }
}

/// Length of `data` with every bare LF counted as CRLF.
fn crlf_len(data: &[u8]) -> usize {
    let mut len = data.len();
    let mut prev = 0u8;
    for &b in data {
        if b == b'\n' && prev != b'\r' {
            len += 1;
        }
        prev = b;
    }
    len
}

/// Parses the structure of a whole message and numbers it.
///
/// # Errors
///
/// Returns [`Error::MissingBoundary`] for a multipart entity without a
/// boundary parameter.
pub fn parse_structure(text: &[u8], opts: &ParseOptions) -> Result<Structure> {
    let mut structure = parse_entity(text, 0..text.len(), "text/plain", opts, 0, !opts.force_mime)?;
    number_root(&mut structure);
    Ok(structure)
}

fn parse_entity(
    text: &[u8],
    range: Range<usize>,
    default_type: &str,
    opts: &ParseOptions,
    depth: usize,
    require_mime: bool,
) -> Result<Structure> {
    let (header_end, body_start) = find_header_boundary(&text[range.clone()]);
    let header = range.start..range.start + header_end;
    let body = range.start + body_start..range.end;
    let headers = Headers::parse_headers(&text[header.clone()], &opts.default_charset);

    if require_mime && !headers.contains("MIME-Version") {
        debug!("No MIME-Version header, treating message as text/plain");
        let mut params = ParamMap::new();
        params.insert("charset", opts.default_charset.clone());
        return Ok(Structure {
            primary: "text".to_string(),
            sub: "plain".to_string(),
            params,
            encoding: "7bit".to_string(),
            size: crlf_len(&text[body.clone()]),
            header,
            body,
            ..Structure::default()
        });
    }

    let mut structure = Structure::from_headers(&headers, default_type);
    structure.size = crlf_len(&text[body.clone()]);
    structure.header = header;
    structure.body = body.clone();

    let descend = structure.is_multipart() || structure.is_rfc822();
    if descend && structure.encoding.parse::<TransferEncoding>().is_err() {
        warn!(
            encoding = %structure.encoding,
            mime_type = %structure.mime_type(),
            "Unknown transfer encoding, keeping entity as a leaf"
        );
        return Ok(structure);
    }
    if descend && depth >= opts.max_depth {
        warn!(depth, mime_type = %structure.mime_type(), "MIME nesting limit reached, keeping entity as a leaf");
        return Ok(structure);
    }

    if structure.is_multipart() {
        let boundary = structure
            .params
            .get("boundary")
            .ok_or(Error::MissingBoundary)?
            .to_string();
        let child_type = if structure.sub == "digest" {
            "message/rfc822"
        } else {
            "text/plain"
        };
        let ranges = find_boundary(&text[..body.end], body.start, &boundary, None);
        if ranges.is_empty() {
            warn!(boundary = %boundary, "Multipart boundary not found in body");
        }
        debug!(boundary = %boundary, parts = ranges.len(), "Scanned multipart body");
        for r in ranges {
            let child_range = r.start.min(body.end)..r.end(body.end);
            structure
                .parts
                .push(parse_entity(text, child_range, child_type, opts, depth + 1, false)?);
        }
    } else if structure.is_rfc822() {
        structure
            .parts
            .push(parse_entity(text, body, "text/plain", opts, depth + 1, false)?);
    }
    Ok(structure)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(s: &str) -> MimeId {
        s.parse().unwrap()
    }

    const NESTED: &[u8] = b"MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=outer\r\n\
\r\n\
--outer\r\n\
Content-Type: text/plain; format=flowed\r\n\
\r\n\
Hello\r\n\
--outer\r\n\
Content-Type: message/rfc822\r\n\
\r\n\
Subject: inner\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
\r\n\
Test text.\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>x</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: image/png; name=index.png\r\n\
Content-Disposition: attachment; filename=index.png\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--outer--\r\n";

    #[test]
    fn test_nested_structure() {
        let s = parse_structure(NESTED, &ParseOptions::new()).unwrap();
        assert_eq!(s.mime_type(), "multipart/mixed");
        assert_eq!(s.id, Some(id("0")));
        assert_eq!(s.parts.len(), 3);
        assert_eq!(s.parts[0].params.get("format"), Some("flowed"));

        let message = s.find(&id("2")).unwrap();
        assert_eq!(message.mime_type(), "message/rfc822");
        assert_eq!(s.find(&id("2.0")).unwrap().mime_type(), "multipart/alternative");

        let first = s.find(&id("2.1")).unwrap();
        assert_eq!(first.mime_type(), "text/plain");
        assert_eq!(first.params.get("charset"), Some("us-ascii"));
        assert_eq!(&NESTED[first.body.clone()], b"Test text.");
        assert_eq!(s.find(&id("2.2")).unwrap().mime_type(), "text/html");

        let image = s.find(&id("3")).unwrap();
        assert_eq!(image.encoding, "base64");
        assert_eq!(image.disposition, Disposition::Attachment);
        assert_eq!(image.disposition_params.get("filename"), Some("index.png"));
        assert_eq!(
            &NESTED[image.header.clone()],
            &b"Content-Type: image/png; name=index.png\r\n\
Content-Disposition: attachment; filename=index.png\r\n\
Content-Transfer-Encoding: base64"[..]
        );
        assert!(s.find(&id("4")).is_none());
    }

    #[test]
    fn test_non_mime_message() {
        let text = b"Subject: plain\nContent-Type: multipart/mixed; boundary=X\n\n--X\nbody";
        let s = parse_structure(text, &ParseOptions::new()).unwrap();
        assert_eq!(s.mime_type(), "text/plain");
        assert!(s.parts.is_empty());
        assert_eq!(s.id, Some(id("1")));

        let forced = parse_structure(text, &ParseOptions::new().force_mime(true)).unwrap();
        assert_eq!(forced.mime_type(), "multipart/mixed");
        assert_eq!(forced.parts.len(), 1);
    }

    #[test]
    fn test_missing_boundary_parameter() {
        let text = b"MIME-Version: 1.0\nContent-Type: multipart/mixed\n\nbody";
        assert!(matches!(
            parse_structure(text, &ParseOptions::new()),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_boundary_never_recurs() {
        let text = b"MIME-Version: 1.0\nContent-Type: multipart/mixed; boundary=X\n\nno parts";
        let s = parse_structure(text, &ParseOptions::new()).unwrap();
        assert!(s.parts.is_empty());
        assert_eq!(s.id, Some(id("0")));
    }

    #[test]
    fn test_digest_children_default_to_message() {
        let text = b"MIME-Version: 1.0\n\
Content-Type: multipart/digest; boundary=D\n\
\n\
--D\n\
\n\
Subject: one\n\
\n\
first\n\
--D--\n";
        let s = parse_structure(text, &ParseOptions::new()).unwrap();
        assert_eq!(s.parts[0].mime_type(), "message/rfc822");
        assert_eq!(s.parts[0].parts[0].mime_type(), "text/plain");
    }

    #[test]
    fn test_depth_limit() {
        let s = parse_structure(NESTED, &ParseOptions::new().max_depth(1)).unwrap();
        let message = &s.parts[1];
        assert_eq!(message.mime_type(), "message/rfc822");
        assert!(message.parts.is_empty());
    }

    #[test]
    fn test_size_counts_crlf() {
        let text = b"MIME-Version: 1.0\n\na\nb\n";
        let s = parse_structure(text, &ParseOptions::new()).unwrap();
        assert_eq!(s.size, 6);
    }
}
