//! MIME entity tree.
//!
//! A [`Part`] carries a content type with parameters, an optional
//! disposition, decoded contents and ordered child parts. Contents are
//! always stored decoded; the transfer encoding is chosen when the part is
//! serialized, based on the contents and the allowed [`EncodeMask`].

mod contents;
mod id;
mod render;

pub use contents::ByteSource;
pub use id::MimeId;
pub use render::RenderOptions;

pub(crate) use id::{Numbered, find_path, number_from, number_root};

use crate::config::MimeConfig;
use crate::encoding::{decode_base64, decode_quoted_printable, decode_uuencode, has_long_lines, is_8bit};
use crate::error::{Error, Result};
use crate::param::ParamMap;
use bytes::Bytes;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::cell::OnceCell;
use std::fmt;
use std::io::Read;
use std::ops::BitOr;
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Primary types kept as given; anything else becomes `x-unknown`.
const KNOWN_PRIMARY_TYPES: &[&str] = &[
    "text",
    "multipart",
    "message",
    "application",
    "audio",
    "image",
    "video",
    "model",
];

/// Longest line allowed in 7bit and 8bit bodies (RFC 2822 section 2.1.1).
const MAX_LINE_OCTETS: usize = 998;

/// Returns a random alphanumeric string.
pub(crate) fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn strip_nul(s: &str) -> String {
    s.replace('\0', "")
}

/// Content-Disposition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Disposition {
    /// No disposition set.
    #[default]
    None,
    /// Displayed inline.
    Inline,
    /// Attachment.
    Attachment,
}

impl Disposition {
    /// Parses a disposition value. Unknown values yield [`Disposition::None`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            _ => Self::None,
        }
    }

    /// Returns the header value, or `None` for [`Disposition::None`].
    #[must_use]
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Inline => Some("inline"),
            Self::Attachment => Some("attachment"),
        }
    }
}

/// Content-Transfer-Encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data with short lines.
    EightBit,
    /// Arbitrary octets.
    #[default]
    Binary,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// uuencode; accepted as a source encoding only.
    UuEncode,
    /// Unrecognized encoding.
    XUnknown,
}

impl TransferEncoding {
    /// Returns the header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::UuEncode => "x-uuencode",
            Self::XUnknown => "x-unknown",
        }
    }
}

impl FromStr for TransferEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Ok(Self::SevenBit),
            "8bit" => Ok(Self::EightBit),
            "binary" => Ok(Self::Binary),
            "base64" => Ok(Self::Base64),
            "quoted-printable" => Ok(Self::QuotedPrintable),
            "uuencode" | "x-uuencode" | "x-uue" => Ok(Self::UuEncode),
            other => Err(Error::InvalidEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of transfer encodings allowed when serializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeMask(u8);

impl EncodeMask {
    /// 7bit only (base64 and quoted-printable for everything else).
    pub const SEVEN_BIT: Self = Self(1);
    /// 8bit allowed.
    pub const EIGHT_BIT: Self = Self(2);
    /// binary allowed.
    pub const BINARY: Self = Self(4);

    /// Returns true if every encoding in `other` is allowed.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if 8-bit data may be sent unencoded.
    #[must_use]
    pub const fn allows_8bit(self) -> bool {
        self.0 & (Self::EIGHT_BIT.0 | Self::BINARY.0) != 0
    }

    const fn index(self) -> usize {
        (self.0 & 7) as usize
    }
}

impl Default for EncodeMask {
    fn default() -> Self {
        Self::SEVEN_BIT
    }
}

impl BitOr for EncodeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A MIME entity.
#[derive(Debug, Clone)]
pub struct Part {
    primary: String,
    sub: String,
    type_params: ParamMap,
    disposition: Disposition,
    disposition_params: ParamMap,
    transfer_encoding: TransferEncoding,
    contents: ByteSource,
    parts: Vec<Part>,
    mime_id: Option<MimeId>,
    content_id: Option<String>,
    description: Option<String>,
    language: Vec<String>,
    duration: Option<u64>,
    bytes: Option<u64>,
    base_part: bool,
    reindex: bool,
    root_numbered: bool,
    encoding_cache: [OnceCell<TransferEncoding>; 8],
}

impl Default for Part {
    fn default() -> Self {
        Self {
            primary: "application".to_string(),
            sub: "octet-stream".to_string(),
            type_params: ParamMap::new(),
            disposition: Disposition::None,
            disposition_params: ParamMap::new(),
            transfer_encoding: TransferEncoding::Binary,
            contents: ByteSource::default(),
            parts: Vec::new(),
            mime_id: None,
            content_id: None,
            description: None,
            language: Vec::new(),
            duration: None,
            bytes: None,
            base_part: false,
            reindex: false,
            root_numbered: false,
            encoding_cache: Default::default(),
        }
    }
}

impl Part {
    /// Creates an `application/octet-stream` part.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a part of the given MIME type.
    #[must_use]
    pub fn with_type(mime_type: &str) -> Self {
        let mut part = Self::new();
        part.set_type(mime_type);
        part
    }

    // Content type

    /// Sets the MIME type (`type/subtype`).
    ///
    /// Ignored if the string has no `/` or the part's transfer encoding is
    /// unrecognized. Unknown primary types become `x-unknown/x-unknown`.
    /// Multipart types get a generated boundary; other types lose any
    /// boundary parameter.
    pub fn set_type(&mut self, mime_type: &str) {
        if self.transfer_encoding == TransferEncoding::XUnknown {
            return;
        }
        let mime_type = strip_nul(mime_type).trim().to_ascii_lowercase();
        let Some((primary, sub)) = mime_type.split_once('/') else {
            return;
        };

        if KNOWN_PRIMARY_TYPES.contains(&primary) {
            self.primary = primary.to_string();
            self.sub = sub.to_string();
            if primary == "multipart" {
                if !self.type_params.contains_key("boundary") {
                    self.type_params
                        .insert("boundary", format!("=_{}", random_token(24)));
                }
            } else {
                self.type_params.remove("boundary");
            }
        } else {
            self.primary = "x-unknown".to_string();
            self.sub = "x-unknown".to_string();
            self.type_params.remove("boundary");
        }
        self.clear_encoding_cache();
    }

    /// Returns the primary type, e.g. `text`.
    #[must_use]
    pub fn primary_type(&self) -> &str {
        &self.primary
    }

    /// Returns the subtype, e.g. `plain`.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub
    }

    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    /// Returns true for `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.primary == "multipart"
    }

    /// Returns the multipart boundary.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.type_params.get("boundary")
    }

    /// Sets a Content-Type parameter.
    pub fn set_content_type_parameter(&mut self, name: &str, value: &str) {
        self.type_params.insert(strip_nul(name), strip_nul(value));
    }

    /// Returns a Content-Type parameter.
    #[must_use]
    pub fn content_type_parameter(&self, name: &str) -> Option<&str> {
        self.type_params.get(name)
    }

    /// Removes a Content-Type parameter.
    pub fn clear_content_type_parameter(&mut self, name: &str) -> Option<String> {
        self.type_params.remove(name)
    }

    /// Returns every Content-Type parameter.
    #[must_use]
    pub const fn content_type_params(&self) -> &ParamMap {
        &self.type_params
    }

    /// Sets the charset parameter (lowercased).
    pub fn set_charset(&mut self, charset: &str) {
        self.type_params
            .insert("charset", strip_nul(charset).trim().to_ascii_lowercase());
    }

    /// Returns the charset parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.type_params.get("charset")
    }

    // Disposition

    /// Sets the disposition.
    pub fn set_disposition(&mut self, disposition: Disposition) {
        self.disposition = disposition;
    }

    /// Returns the disposition.
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// Sets a Content-Disposition parameter.
    pub fn set_disposition_parameter(&mut self, name: &str, value: &str) {
        self.disposition_params
            .insert(strip_nul(name), strip_nul(value));
    }

    /// Returns a Content-Disposition parameter.
    #[must_use]
    pub fn disposition_parameter(&self, name: &str) -> Option<&str> {
        self.disposition_params.get(name)
    }

    /// Returns every Content-Disposition parameter.
    #[must_use]
    pub const fn disposition_params(&self) -> &ParamMap {
        &self.disposition_params
    }

    /// Sets the file name (`filename` disposition and `name` type parameter).
    pub fn set_name(&mut self, name: &str) {
        let name = strip_nul(name);
        self.disposition_params.insert("filename", name.clone());
        self.type_params.insert("name", name);
    }

    /// Returns the file name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.disposition_params
            .get("filename")
            .or_else(|| self.type_params.get("name"))
    }

    // Descriptive fields

    /// Sets the Content-Description.
    pub fn set_description(&mut self, description: &str) {
        self.description = Some(strip_nul(description));
    }

    /// Returns the Content-Description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the Content-Language tags.
    pub fn set_language<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.language = tags
            .into_iter()
            .map(|t| strip_nul(t.as_ref()).trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    /// Returns the Content-Language tags.
    #[must_use]
    pub fn language(&self) -> &[String] {
        &self.language
    }

    /// Sets the Content-Duration in seconds.
    pub const fn set_duration(&mut self, seconds: Option<u64>) {
        self.duration = seconds;
    }

    /// Returns the Content-Duration in seconds.
    #[must_use]
    pub const fn duration(&self) -> Option<u64> {
        self.duration
    }

    /// Sets an explicit size, emitted as the `size` disposition parameter.
    pub const fn set_bytes(&mut self, bytes: u64) {
        self.bytes = Some(bytes);
    }

    /// Returns the explicit size, or the length of the decoded contents.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
            .unwrap_or_else(|| u64::try_from(self.contents.len()).unwrap_or(u64::MAX))
    }

    /// Marks this part as the outermost entity of a message.
    pub const fn set_base_part(&mut self, base: bool) {
        self.base_part = base;
    }

    /// Returns true if this part emits `MIME-Version`.
    #[must_use]
    pub const fn is_base_part(&self) -> bool {
        self.base_part
    }

    // Content-ID

    /// Sets the Content-ID (angle brackets are stripped).
    pub fn set_content_id(&mut self, cid: &str) {
        let cid = strip_nul(cid);
        let cid = cid.trim().trim_start_matches('<').trim_end_matches('>');
        self.content_id = Some(cid.to_string());
    }

    /// Returns the Content-ID without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Returns the Content-ID, generating `random@hostname` if unset.
    pub fn ensure_content_id(&mut self, config: &MimeConfig) -> &str {
        self.content_id
            .get_or_insert_with(|| format!("{}@{}", random_token(24), config.hostname))
    }

    // Transfer encoding

    /// Sets the declared transfer encoding.
    ///
    /// An unrecognized value makes the part `application/octet-stream`
    /// with encoding `x-unknown`.
    pub fn set_transfer_encoding(&mut self, encoding: &str) {
        match encoding.parse::<TransferEncoding>() {
            Ok(enc) => self.transfer_encoding = enc,
            Err(_) => self.poison_encoding(encoding),
        }
    }

    fn poison_encoding(&mut self, encoding: &str) {
        warn!(encoding, "Unknown transfer encoding, treating part as octet-stream");
        self.set_type("application/octet-stream");
        self.transfer_encoding = TransferEncoding::XUnknown;
    }

    /// Returns the declared (source) transfer encoding.
    #[must_use]
    pub const fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }

    /// Returns the transfer encoding used when sending under `mask`.
    ///
    /// Multipart and message parts declare the strongest of `8bit` or
    /// `binary` needed by their descendants, else `7bit`.
    #[must_use]
    pub fn send_transfer_encoding(&self, mask: EncodeMask) -> TransferEncoding {
        if self.primary == "multipart" || self.primary == "message" {
            return self.envelope_encoding(mask);
        }
        *self.encoding_cache[mask.index()].get_or_init(|| {
            let enc = self.select_leaf_encoding(mask);
            trace!(mime_type = %self.mime_type(), encoding = %enc, "Selected transfer encoding");
            enc
        })
    }

    fn envelope_encoding(&self, mask: EncodeMask) -> TransferEncoding {
        if !mask.allows_8bit() {
            return TransferEncoding::SevenBit;
        }
        let mut enc = TransferEncoding::SevenBit;
        if self.primary == "message" && !self.contents.is_empty() {
            let data = self.contents.as_slice();
            if data.contains(&0) && mask.contains(EncodeMask::BINARY) {
                return TransferEncoding::Binary;
            }
            if is_8bit(data) {
                enc = TransferEncoding::EightBit;
            }
        }
        for child in &self.parts {
            match child.send_transfer_encoding(mask) {
                TransferEncoding::Binary => return TransferEncoding::Binary,
                TransferEncoding::EightBit => enc = TransferEncoding::EightBit,
                _ => {}
            }
        }
        enc
    }

    fn select_leaf_encoding(&self, mask: EncodeMask) -> TransferEncoding {
        let data = self.contents.as_slice();
        if data.is_empty() {
            return TransferEncoding::SevenBit;
        }
        let enc = if self.primary == "text" {
            if is_8bit(data) {
                if mask.allows_8bit() {
                    TransferEncoding::EightBit
                } else {
                    TransferEncoding::QuotedPrintable
                }
            } else if has_long_lines(data, MAX_LINE_OCTETS) {
                TransferEncoding::QuotedPrintable
            } else {
                TransferEncoding::SevenBit
            }
        } else if mask.allows_8bit() {
            TransferEncoding::EightBit
        } else {
            TransferEncoding::Base64
        };

        if matches!(enc, TransferEncoding::SevenBit | TransferEncoding::EightBit) && data.contains(&0)
        {
            return if mask.contains(EncodeMask::BINARY) {
                TransferEncoding::Binary
            } else {
                TransferEncoding::Base64
            };
        }
        enc
    }

    fn clear_encoding_cache(&mut self) {
        self.encoding_cache = Default::default();
    }

    // Contents

    /// Replaces the contents with `data`, decoding it from `encoding`.
    ///
    /// Base64, quoted-printable and uuencode data is decoded; anything else
    /// is stored as is. Base64 that fails to decode is kept raw.
    pub fn set_contents(&mut self, data: impl Into<Vec<u8>>, encoding: TransferEncoding) {
        let data = data.into();
        self.contents = ByteSource::Owned(Self::transfer_decode(data, encoding));
        self.after_contents_set(encoding);
    }

    /// Replaces the contents with shared bytes.
    ///
    /// Data that needs no transfer decoding is stored without copying.
    pub fn set_contents_shared(&mut self, data: Bytes, encoding: TransferEncoding) {
        self.contents = if Self::needs_decoding(encoding) {
            ByteSource::Owned(Self::transfer_decode(data.to_vec(), encoding))
        } else {
            ByteSource::Shared(data)
        };
        self.after_contents_set(encoding);
    }

    /// Replaces the contents with everything read from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails; the contents are unchanged.
    pub fn set_contents_reader<R: Read>(
        &mut self,
        mut reader: R,
        encoding: TransferEncoding,
    ) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.set_contents(data, encoding);
        Ok(())
    }

    /// Appends data, decoding it from `encoding`.
    pub fn append_contents(&mut self, data: impl Into<Vec<u8>>, encoding: TransferEncoding) {
        if self.contents.is_empty() {
            self.set_contents(data, encoding);
            return;
        }
        let decoded = Self::transfer_decode(data.into(), encoding);
        self.contents.append(&decoded);
        self.clear_encoding_cache();
    }

    /// Removes the contents.
    pub fn clear_contents(&mut self) {
        self.contents = ByteSource::default();
        self.clear_encoding_cache();
    }

    /// Returns the decoded contents.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        self.contents.as_slice()
    }

    /// Returns a reader over the decoded contents.
    #[must_use]
    pub fn contents_reader(&self) -> impl Read + '_ {
        self.contents.reader()
    }

    /// Returns the contents storage.
    #[must_use]
    pub const fn byte_source(&self) -> &ByteSource {
        &self.contents
    }

    const fn needs_decoding(encoding: TransferEncoding) -> bool {
        matches!(
            encoding,
            TransferEncoding::Base64 | TransferEncoding::QuotedPrintable | TransferEncoding::UuEncode
        )
    }

    fn transfer_decode(data: Vec<u8>, encoding: TransferEncoding) -> Vec<u8> {
        match encoding {
            TransferEncoding::Base64 => decode_base64(&data).unwrap_or_else(|e| {
                warn!(error = %e, "Undecodable base64 contents, keeping raw data");
                data
            }),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(&data),
            TransferEncoding::UuEncode => decode_uuencode(&data),
            _ => data,
        }
    }

    fn after_contents_set(&mut self, encoding: TransferEncoding) {
        self.clear_encoding_cache();
        if self.contents.is_empty() {
            return;
        }
        if encoding == TransferEncoding::XUnknown {
            self.poison_encoding(encoding.as_str());
        } else {
            self.transfer_encoding = encoding;
        }
    }

    // Tree

    /// Appends a child part.
    pub fn add_part(&mut self, part: Self) {
        self.parts.push(part);
        self.reindex = true;
    }

    /// Returns the child parts.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        &self.parts
    }

    /// Returns the MIME ID, if assigned.
    #[must_use]
    pub const fn mime_id(&self) -> Option<&MimeId> {
        self.mime_id.as_ref()
    }

    /// Numbers this part as a message root, and every descendant.
    pub fn build_mime_ids(&mut self) {
        number_root(self);
        self.root_numbered = true;
        debug!(id = ?self.mime_id.as_ref().map(ToString::to_string), "Built MIME IDs");
    }

    /// Numbers this part as `id`, and every descendant below it.
    pub fn build_mime_ids_from(&mut self, id: MimeId) {
        number_from(self, id);
        self.root_numbered = false;
    }

    /// Renumbers any subtree changed since it was last numbered.
    pub fn ensure_mime_ids(&mut self) {
        if self.reindex {
            match self.mime_id.clone() {
                Some(id) if !self.root_numbered => number_from(self, id),
                _ => {
                    number_root(self);
                    self.root_numbered = true;
                }
            }
            return;
        }
        for child in &mut self.parts {
            child.ensure_mime_ids();
        }
    }

    /// Returns the index path to the part with `id`.
    fn find_path(&self, id: &MimeId) -> Option<Vec<usize>> {
        find_path(self, id)
    }

    fn node_at(&self, path: &[usize]) -> Option<&Self> {
        path.iter().try_fold(self, |node, &i| node.parts.get(i))
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Self> {
        path.iter().try_fold(self, |node, &i| node.parts.get_mut(i))
    }

    /// Returns the part with `id` using the current numbering.
    ///
    /// Call [`Part::ensure_mime_ids`] (or any `&mut` lookup) after
    /// [`Part::add_part`] so the numbering is current.
    #[must_use]
    pub fn get_part(&self, id: &MimeId) -> Option<&Self> {
        self.node_at(&self.find_path(id)?)
    }

    /// Returns the part with `id`, or [`Error::PartNotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if no part has this ID.
    pub fn try_part(&self, id: &MimeId) -> Result<&Self> {
        self.get_part(id)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))
    }

    /// Returns the part with `id` for mutation, renumbering first.
    pub fn get_part_mut(&mut self, id: &MimeId) -> Option<&mut Self> {
        self.ensure_mime_ids();
        let path = self.find_path(id)?;
        if let Some((_, ancestors)) = path.split_last() {
            self.clear_message_ancestors(ancestors);
        }
        self.node_at_mut(&path)
    }

    /// Removes and returns the part with `id`, then renumbers the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartNotFound`] if no descendant has this ID.
    pub fn remove_part(&mut self, id: &MimeId) -> Result<Self> {
        self.ensure_mime_ids();
        let (parent_path, index) = self.child_location(id)?;
        self.clear_message_ancestors(&parent_path);
        let parent = self
            .node_at_mut(&parent_path)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        let removed = parent.parts.remove(index);
        parent.reindex = true;
        self.ensure_mime_ids();
        Ok(removed)
    }

    /// Replaces the part with `id`, returning the old part, then renumbers
    /// the tree.
    ///
    /// The new part is numbered where the old one stood, so a multipart
    /// placed at the root of an embedded message becomes `N.0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartNotFound`] if no descendant has this ID.
    pub fn alter_part(&mut self, id: &MimeId, part: Self) -> Result<Self> {
        self.ensure_mime_ids();
        let (parent_path, index) = self.child_location(id)?;
        self.clear_message_ancestors(&parent_path);
        let parent = self
            .node_at_mut(&parent_path)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        let old = std::mem::replace(&mut parent.parts[index], part);
        parent.reindex = true;
        self.ensure_mime_ids();
        Ok(old)
    }

    fn child_location(&self, id: &MimeId) -> Result<(Vec<usize>, usize)> {
        let mut path = self
            .find_path(id)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        let index = path
            .pop()
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        Ok((path, index))
    }

    /// Drops raw contents of `message/*` nodes from here down along `path`
    /// so edits below them are rendered from the tree.
    fn clear_message_ancestors(&mut self, path: &[usize]) {
        if self.primary == "message" && !self.contents.is_empty() {
            self.clear_contents();
        }
        if let Some((&first, rest)) = path.split_first()
            && let Some(child) = self.parts.get_mut(first)
        {
            child.clear_message_ancestors(rest);
        }
    }

    /// Returns `(MIME ID, type)` pairs for every numbered part, in tree
    /// order.
    #[must_use]
    pub fn content_type_map(&self) -> Vec<(MimeId, String)> {
        let mut out = Vec::new();
        self.collect_types(&mut out);
        out
    }

    fn collect_types(&self, out: &mut Vec<(MimeId, String)>) {
        if let Some(id) = &self.mime_id {
            out.push((id.clone(), self.mime_type()));
        }
        for child in &self.parts {
            child.collect_types(out);
        }
    }

    /// Returns the first non-attachment `text/*` part in tree order,
    /// optionally restricted to `subtype`.
    #[must_use]
    pub fn find_body(&self, subtype: Option<&str>) -> Option<&Self> {
        if self.primary == "text"
            && self.disposition != Disposition::Attachment
            && subtype.is_none_or(|s| self.sub.eq_ignore_ascii_case(s))
        {
            return Some(self);
        }
        self.parts.iter().find_map(|child| child.find_body(subtype))
    }
}

impl Numbered for Part {
    fn is_multipart(&self) -> bool {
        self.primary == "multipart"
    }

    fn is_rfc822(&self) -> bool {
        self.primary == "message" && self.sub == "rfc822"
    }

    fn id(&self) -> Option<&MimeId> {
        self.mime_id.as_ref()
    }

    fn assign_id(&mut self, id: MimeId) {
        self.mime_id = Some(id);
        self.reindex = false;
        self.root_numbered = false;
    }

    fn children(&self) -> &[Self] {
        &self.parts
    }

    fn children_mut(&mut self) -> &mut [Self] {
        &mut self.parts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(s: &str) -> MimeId {
        s.parse().unwrap()
    }

    fn text(body: &str) -> Part {
        let mut part = Part::with_type("text/plain");
        part.set_contents(body, TransferEncoding::Binary);
        part
    }

    fn ids(part: &Part) -> Vec<String> {
        part.content_type_map()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }

    #[test]
    fn test_set_type() {
        let mut part = Part::with_type("Text/HTML");
        assert_eq!(part.mime_type(), "text/html");
        assert!(part.boundary().is_none());

        part.set_type("no-slash");
        assert_eq!(part.mime_type(), "text/html");

        part.set_type("foo/bar");
        assert_eq!(part.mime_type(), "x-unknown/x-unknown");

        part.set_type("multipart/mixed");
        let boundary = part.boundary().unwrap().to_string();
        assert!(boundary.starts_with("=_"));
        assert_eq!(boundary.len(), 26);

        part.set_type("multipart/alternative");
        assert_eq!(part.boundary(), Some(boundary.as_str()));

        part.set_type("image/png");
        assert!(part.boundary().is_none());
    }

    #[test]
    fn test_boundaries_differ() {
        let a = Part::with_type("multipart/mixed");
        let b = Part::with_type("multipart/mixed");
        assert_ne!(a.boundary(), b.boundary());
    }

    #[test]
    fn test_nul_stripped_from_header_values() {
        let mut part = Part::with_type("text/pl\0ain");
        part.set_content_type_parameter("na\0me", "fo\0o");
        part.set_description("a\0b");
        part.set_content_id("<x\0y@z>");
        assert_eq!(part.mime_type(), "text/plain");
        assert_eq!(part.content_type_parameter("name"), Some("foo"));
        assert_eq!(part.description(), Some("ab"));
        assert_eq!(part.content_id(), Some("xy@z"));
    }

    #[test]
    fn test_unknown_transfer_encoding() {
        let mut part = Part::with_type("text/plain");
        part.set_transfer_encoding("x-foo");
        assert_eq!(part.mime_type(), "application/octet-stream");
        assert_eq!(part.transfer_encoding(), TransferEncoding::XUnknown);

        part.set_type("text/plain");
        assert_eq!(part.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_contents_decoded_on_set() {
        let mut part = Part::with_type("text/plain");
        part.set_contents("SGVsbG8=", TransferEncoding::Base64);
        assert_eq!(part.contents(), b"Hello");
        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);

        part.set_contents("caf=C3=A9=\n!", TransferEncoding::QuotedPrintable);
        assert_eq!(part.contents(), "café!".as_bytes());

        part.append_contents(" more", TransferEncoding::SevenBit);
        assert_eq!(part.contents(), "café! more".as_bytes());

        part.clear_contents();
        assert!(part.contents().is_empty());
        assert_eq!(part.bytes(), 0);
    }

    #[test]
    fn test_shared_contents_not_copied() {
        let data = Bytes::from_static(b"shared");
        let mut part = Part::new();
        part.set_contents_shared(data, TransferEncoding::Binary);
        assert!(matches!(part.byte_source(), ByteSource::Shared(_)));

        part.set_contents_shared(Bytes::from_static(b"c2hhcmVk"), TransferEncoding::Base64);
        assert_eq!(part.contents(), b"shared");
    }

    #[test]
    fn test_contents_reader() {
        let mut part = Part::new();
        part.set_contents_reader(&b"streamed"[..], TransferEncoding::Binary)
            .unwrap();
        let mut out = Vec::new();
        part.contents_reader().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"streamed");
    }

    #[test]
    fn test_encoding_selection() {
        let ascii = text("hello\n");
        assert_eq!(ascii.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::SevenBit);

        let long = text(&"a".repeat(1000));
        assert_eq!(long.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::QuotedPrintable);
        assert_eq!(long.send_transfer_encoding(EncodeMask::EIGHT_BIT), TransferEncoding::QuotedPrintable);

        let utf8 = text("héllo");
        assert_eq!(utf8.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::QuotedPrintable);
        assert_eq!(utf8.send_transfer_encoding(EncodeMask::EIGHT_BIT), TransferEncoding::EightBit);

        let mut binary = Part::with_type("application/zip");
        binary.set_contents(b"PK".to_vec(), TransferEncoding::Binary);
        assert_eq!(binary.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::Base64);
        assert_eq!(binary.send_transfer_encoding(EncodeMask::EIGHT_BIT), TransferEncoding::EightBit);

        let empty = Part::with_type("image/png");
        assert_eq!(empty.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_nul_never_7bit_or_8bit() {
        let nul = text("a\0b");
        for mask in [
            EncodeMask::SEVEN_BIT,
            EncodeMask::EIGHT_BIT,
            EncodeMask::SEVEN_BIT | EncodeMask::EIGHT_BIT,
        ] {
            assert_eq!(nul.send_transfer_encoding(mask), TransferEncoding::Base64);
        }
        assert_eq!(nul.send_transfer_encoding(EncodeMask::BINARY), TransferEncoding::Binary);
    }

    #[test]
    fn test_mime_ids_single_leaf() {
        let mut part = text("x");
        part.build_mime_ids();
        assert_eq!(ids(&part), ["1"]);
    }

    #[test]
    fn test_mime_ids_multipart() {
        let mut inner = Part::with_type("multipart/alternative");
        inner.add_part(text("a"));
        inner.add_part(text("b"));
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("x"));
        root.add_part(inner);
        root.build_mime_ids();
        assert_eq!(ids(&root), ["0", "1", "2", "2.1", "2.2"]);

        let before = ids(&root);
        root.build_mime_ids();
        assert_eq!(ids(&root), before);
    }

    #[test]
    fn test_mime_ids_message_rfc822() {
        let mut body = Part::with_type("multipart/mixed");
        body.add_part(text("a"));
        body.add_part(text("b"));
        let mut message = Part::with_type("message/rfc822");
        message.add_part(body);
        let mut leaf_message = Part::with_type("message/rfc822");
        leaf_message.add_part(text("c"));

        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("x"));
        root.add_part(message);
        root.add_part(leaf_message);
        root.build_mime_ids();
        assert_eq!(ids(&root), ["0", "1", "2", "2.0", "2.1", "2.2", "3", "3.1"]);

        let mut top = Part::with_type("message/rfc822");
        top.add_part(text("y"));
        top.build_mime_ids();
        assert_eq!(ids(&top), ["1.0", "1"]);
    }

    #[test]
    fn test_get_part_envelope_vs_part() {
        let mut body = Part::with_type("multipart/alternative");
        body.add_part(Part::with_type("text/plain"));
        body.add_part(Part::with_type("text/html"));
        let mut message = Part::with_type("message/rfc822");
        message.add_part(body);
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("x"));
        root.add_part(message);
        root.build_mime_ids();

        assert_eq!(root.get_part(&id("2")).unwrap().mime_type(), "message/rfc822");
        assert_eq!(root.get_part(&id("2.0")).unwrap().mime_type(), "multipart/alternative");
        assert_eq!(root.get_part(&id("2.1")).unwrap().mime_type(), "text/plain");
        assert_eq!(root.get_part(&id("2.2")).unwrap().mime_type(), "text/html");
        assert_eq!(root.get_part(&id("0")).unwrap().mime_type(), "multipart/mixed");
        assert!(root.get_part(&id("2.3")).is_none());
        assert!(matches!(root.try_part(&id("5")), Err(Error::PartNotFound(_))));
    }

    #[test]
    fn test_remove_part_renumbers() {
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("a"));
        root.add_part(text("b"));
        root.add_part(text("c"));
        root.build_mime_ids();

        let removed = root.remove_part(&id("2")).unwrap();
        assert_eq!(removed.contents(), b"b");
        assert!(root.get_part_mut(&id("3")).is_none());
        assert_eq!(root.get_part(&id("2")).unwrap().contents(), b"c");
        assert!(matches!(root.remove_part(&id("9")), Err(Error::PartNotFound(_))));
    }

    #[test]
    fn test_add_part_marks_reindex() {
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("a"));
        root.build_mime_ids();
        root.add_part(text("b"));
        assert!(root.get_part(&id("2")).is_none());
        root.ensure_mime_ids();
        assert_eq!(root.get_part(&id("2")).unwrap().contents(), b"b");
    }

    #[test]
    fn test_alter_part() {
        let mut message = Part::with_type("message/rfc822");
        message.add_part(text("inner"));
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("a"));
        root.add_part(message);
        root.build_mime_ids();
        root.get_part_mut(&id("2"))
            .unwrap()
            .set_contents("Subject: raw\n\ninner", TransferEncoding::SevenBit);

        let mut replacement = Part::with_type("multipart/alternative");
        replacement.add_part(text("p"));
        replacement.add_part(text("q"));
        let old = root.alter_part(&id("2.1"), replacement).unwrap();
        assert_eq!(old.contents(), b"inner");

        let message = root.get_part(&id("2")).unwrap();
        assert!(message.contents().is_empty());
        assert_eq!(root.get_part(&id("2.0")).unwrap().mime_type(), "multipart/alternative");
        assert_eq!(root.get_part(&id("2.1")).unwrap().contents(), b"p");
        assert_eq!(root.get_part(&id("2.2")).unwrap().contents(), b"q");
        assert!(root.get_part(&id("2.1.1")).is_none());

        let altered = root.content_type_map();
        root.build_mime_ids();
        assert_eq!(root.content_type_map(), altered);
    }

    #[test]
    fn test_build_mime_ids_from() {
        let mut alternative = Part::with_type("multipart/alternative");
        alternative.add_part(text("p"));
        alternative.add_part(text("q"));

        alternative.build_mime_ids_from(id("3"));
        assert_eq!(alternative.mime_id(), Some(&id("3")));
        assert_eq!(alternative.get_part(&id("3.2")).unwrap().contents(), b"q");

        alternative.build_mime_ids_from(id("2.0"));
        assert_eq!(alternative.get_part(&id("2.1")).unwrap().contents(), b"p");
        assert_eq!(alternative.get_part(&id("2.2")).unwrap().contents(), b"q");
    }

    #[test]
    fn test_alter_part_leaf_keeps_id() {
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(text("a"));
        root.add_part(text("b"));
        root.build_mime_ids();

        let mut image = Part::with_type("image/png");
        image.set_contents(vec![1, 2, 3], TransferEncoding::Binary);
        root.alter_part(&id("2"), image).unwrap();
        assert_eq!(root.get_part(&id("2")).unwrap().mime_type(), "image/png");
        assert_eq!(root.get_part(&id("1")).unwrap().contents(), b"a");
    }

    #[test]
    fn test_find_body() {
        let mut attachment = text("file");
        attachment.set_disposition(Disposition::Attachment);
        let mut html = Part::with_type("text/html");
        html.set_contents("<p>hi</p>", TransferEncoding::Binary);
        let mut alternative = Part::with_type("multipart/alternative");
        alternative.add_part(text("plain"));
        alternative.add_part(html);
        let mut root = Part::with_type("multipart/mixed");
        root.add_part(attachment);
        root.add_part(alternative);

        assert_eq!(root.find_body(None).unwrap().contents(), b"plain");
        assert_eq!(root.find_body(Some("html")).unwrap().contents(), b"<p>hi</p>");
        assert!(root.find_body(Some("enriched")).is_none());
    }

    #[test]
    fn test_content_id() {
        let config = MimeConfig::builder().hostname("mail.example.com").build();
        let mut part = Part::new();
        let cid = part.ensure_content_id(&config).to_string();
        assert!(cid.ends_with("@mail.example.com"));
        assert_eq!(part.ensure_content_id(&config), cid);
    }

    #[test]
    fn test_name_and_bytes() {
        let mut part = Part::with_type("application/pdf");
        part.set_contents(b"12345".to_vec(), TransferEncoding::Binary);
        part.set_name("a.pdf");
        assert_eq!(part.name(), Some("a.pdf"));
        assert_eq!(part.content_type_parameter("name"), Some("a.pdf"));
        assert_eq!(part.bytes(), 5);
        part.set_bytes(100);
        assert_eq!(part.bytes(), 100);
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!("Base64".parse::<TransferEncoding>().unwrap(), TransferEncoding::Base64);
        assert_eq!(" 7BIT ".parse::<TransferEncoding>().unwrap(), TransferEncoding::SevenBit);
        assert_eq!("x-uue".parse::<TransferEncoding>().unwrap(), TransferEncoding::UuEncode);
        assert!("gzip".parse::<TransferEncoding>().is_err());
    }
}
