//! MIME header handling.
//!
//! [`Headers`] is an ordered, case-insensitive multi-map. Every name belongs
//! to a [`HeaderKind`] that decides how values are decoded, stored and
//! re-encoded: address fields go through the address-list parser and writer,
//! `Content-Type`/`Content-Disposition` through [`ContentParam`], and
//! everything else through RFC 2047 encoded words.

use crate::charset;
use crate::encoding::{Eol, decode_rfc2047, encode_rfc2047};
use crate::error::Result;
use crate::param::{ContentParam, ParamEncodeOptions, ParamMap};
use crate::part::random_token;
use chrono::{DateTime, FixedOffset, TimeZone};
use mailpart_address::{Address, AddressEntry, ParseOptions, parse_address_list, write_address, write_group};
use std::fmt;
use tracing::debug;

/// Maximum folded line length.
const FOLD_COLUMNS: usize = 76;

const ADDRESS_FIELDS: &[&str] = &[
    "from",
    "to",
    "cc",
    "bcc",
    "reply-to",
    "resent-to",
    "resent-cc",
    "resent-bcc",
    "resent-from",
    "resent-sender",
    "sender",
    "return-path",
    "disposition-notification-to",
    "mail-reply-to",
    "mail-followup-to",
];

const SINGLE_FIELDS: &[&str] = &[
    "content-alternative",
    "content-base",
    "content-description",
    "content-duration",
    "content-features",
    "content-id",
    "content-language",
    "content-location",
    "content-md5",
    "content-transfer-encoding",
    "date",
    "importance",
    "in-reply-to",
    "message-id",
    "mime-version",
    "references",
    "subject",
    "x-confirm-reading-to",
    "x-mimeole",
    "x-priority",
];

const PARAM_FIELDS: &[&str] = &["content-type", "content-disposition"];

/// How a header's values are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Address list, written through the address writer.
    Address,
    /// Single-valued; the first stored value wins.
    Single,
    /// Base value plus a parameter map.
    Params,
    /// Repeatable free text.
    Text,
}

impl HeaderKind {
    /// Returns the kind of a header name (case-insensitive).
    #[must_use]
    pub fn of(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let name = name.as_str();
        if ADDRESS_FIELDS.contains(&name) {
            Self::Address
        } else if PARAM_FIELDS.contains(&name) {
            Self::Params
        } else if SINGLE_FIELDS.contains(&name) {
            Self::Single
        } else {
            Self::Text
        }
    }
}

/// What [`Headers::get_value`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// The full value, with encoded parameters appended.
    #[default]
    String,
    /// The base value without parameters.
    Base,
    /// Only the parameter map.
    Params,
}

/// A value returned by [`Headers::get_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// One value.
    Single(String),
    /// Every value of a repeated header, in insertion order.
    Multiple(Vec<String>),
    /// Parameters of a parameter field.
    Params(ParamMap),
}

impl HeaderValue {
    /// Returns the value as text: the single value, or the first of several.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multiple(v) => v.first().map(String::as_str),
            Self::Params(_) => None,
        }
    }
}

/// Options for header serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEncodeOptions {
    /// Charset for RFC 2047 and RFC 2231 encoding.
    pub charset: String,
    /// Domain appended to addresses without a host.
    pub default_domain: Option<String>,
    /// Disable line folding.
    pub nowrap: bool,
    /// Line terminator.
    pub eol: Eol,
    /// Emit RFC 2047 duplicates of RFC 2231 parameters.
    pub broken_rfc2231: bool,
}

impl Default for HeaderEncodeOptions {
    fn default() -> Self {
        Self {
            charset: "utf-8".to_string(),
            default_domain: None,
            nowrap: false,
            eol: Eol::Lf,
            broken_rfc2231: false,
        }
    }
}

impl HeaderEncodeOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the charset.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the default domain.
    #[must_use]
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = Some(domain.into());
        self
    }

    /// Disables folding.
    #[must_use]
    pub const fn nowrap(mut self, nowrap: bool) -> Self {
        self.nowrap = nowrap;
        self
    }

    /// Sets the EOL.
    #[must_use]
    pub const fn eol(mut self, eol: Eol) -> Self {
        self.eol = eol;
        self
    }

    /// Enables RFC 2047 parameter duplicates.
    #[must_use]
    pub const fn broken_rfc2231(mut self, enabled: bool) -> Self {
        self.broken_rfc2231 = enabled;
        self
    }

    fn param_options(&self) -> ParamEncodeOptions {
        ParamEncodeOptions::new()
            .charset(self.charset.clone())
            .broken_rfc2231(self.broken_rfc2231)
    }
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    name: String,
    kind: HeaderKind,
    values: Vec<String>,
    params: ParamMap,
}

/// Collection of email headers.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a header with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut HeaderEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Adds a header value as is.
    ///
    /// Parameter fields are always split into a base value and parameters.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if HeaderKind::of(&name) == HeaderKind::Params {
            let cp = ContentParam::decode(&value);
            self.push(name, cp.value, cp.params);
        } else {
            self.push(name, value, ParamMap::new());
        }
    }

    /// Adds a header value, decoding it first.
    ///
    /// Address fields are parsed and their display names RFC 2047 decoded;
    /// other fields are RFC 2047 decoded as a whole.
    pub fn add_header_decoded(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match HeaderKind::of(&name) {
            HeaderKind::Address => {
                let decoded = decode_address_list(&value);
                self.push(name, decoded, ParamMap::new());
            }
            HeaderKind::Params => self.add_header(name, value),
            HeaderKind::Single | HeaderKind::Text => {
                self.push(name, decode_rfc2047(&value), ParamMap::new());
            }
        }
    }

    /// Adds a header with an explicit parameter map, used verbatim.
    pub fn add_header_with_params(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        params: ParamMap,
    ) {
        self.push(name.into(), value.into(), params);
    }

    fn push(&mut self, name: String, value: String, params: ParamMap) {
        if let Some(entry) = self.find_mut(&name) {
            if entry.kind == HeaderKind::Params {
                debug!(header = %entry.name, "Ignoring repeated parameter header");
                return;
            }
            entry.values.push(value);
            return;
        }
        let kind = HeaderKind::of(&name);
        self.entries.push(HeaderEntry {
            name,
            kind,
            values: vec![value],
            params,
        });
    }

    /// Replaces every value of a header, keeping its position if it exists.
    pub fn replace_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let (value, params) = if HeaderKind::of(&name) == HeaderKind::Params {
            let cp = ContentParam::decode(&value);
            (cp.value, cp.params)
        } else {
            (value, ParamMap::new())
        };
        match self.find_mut(&name) {
            Some(entry) => {
                entry.values = vec![value];
                entry.params = params;
            }
            None => self.push(name, value, params),
        }
    }

    /// Replaces a header only if it already exists. Returns true if set.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        if !self.contains(name) {
            return false;
        }
        self.replace_header(name, value);
        true
    }

    /// Removes a header. Returns true if it existed.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    /// Returns a header value in the requested mode, or `None` for an
    /// unknown header.
    #[must_use]
    pub fn get_value(&self, name: &str, mode: ValueMode) -> Option<HeaderValue> {
        let entry = self.find(name)?;
        let first = entry.values.first().cloned().unwrap_or_default();
        let value = match (entry.kind, mode) {
            (HeaderKind::Params, ValueMode::Params) => HeaderValue::Params(entry.params.clone()),
            (_, ValueMode::Params) => HeaderValue::Params(ParamMap::new()),
            (HeaderKind::Params, ValueMode::String) => HeaderValue::Single(
                ContentParam::from_parts(first, entry.params.clone())
                    .to_header_string(&ParamEncodeOptions::default()),
            ),
            (HeaderKind::Params | HeaderKind::Single, _) => HeaderValue::Single(first),
            (HeaderKind::Address, _) => HeaderValue::Single(
                entry
                    .values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            (HeaderKind::Text, _) if entry.values.len() == 1 => HeaderValue::Single(first),
            (HeaderKind::Text, _) => HeaderValue::Multiple(entry.values.clone()),
        };
        Some(value)
    }

    /// Returns the header as a single string (first value for repeated
    /// text headers).
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        match self.get_value(name, ValueMode::String)? {
            HeaderValue::Single(v) => Some(v),
            HeaderValue::Multiple(v) => v.into_iter().next(),
            HeaderValue::Params(_) => None,
        }
    }

    /// Returns the base value of a header, without parameters.
    #[must_use]
    pub fn value_base(&self, name: &str) -> Option<&str> {
        self.find(name)
            .and_then(|e| e.values.first())
            .map(String::as_str)
    }

    /// Returns the parameters of a parameter field.
    #[must_use]
    pub fn params(&self, name: &str) -> Option<&ParamMap> {
        self.find(name)
            .filter(|e| e.kind == HeaderKind::Params)
            .map(|e| &e.params)
    }

    /// Returns a parameter field as a [`ContentParam`].
    #[must_use]
    pub fn content_param(&self, name: &str) -> Option<ContentParam> {
        let entry = self.find(name)?;
        Some(ContentParam::from_parts(
            entry.values.first().cloned().unwrap_or_default(),
            entry.params.clone(),
        ))
    }

    /// Parses and validates an address field into mailboxes and groups.
    ///
    /// Returns an empty list if the header is absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Address`] if the stored value is not a valid
    /// address list.
    pub fn address_list(&self, name: &str) -> Result<Vec<AddressEntry>> {
        let Some(HeaderValue::Single(value)) = self.get_value(name, ValueMode::String) else {
            return Ok(Vec::new());
        };
        if value.trim().is_empty() {
            return Ok(Vec::new());
        }
        let opts = ParseOptions::new().nest_groups(true).validate(true);
        Ok(parse_address_list(&value, &opts)?)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    ///
    /// Parameter fields yield their full string form.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.entries.iter().flat_map(|entry| {
            let values: Vec<String> = match entry.kind {
                HeaderKind::Params => vec![
                    ContentParam::from_parts(
                        entry.values.first().cloned().unwrap_or_default(),
                        entry.params.clone(),
                    )
                    .to_string(),
                ],
                HeaderKind::Single => entry.values.iter().take(1).cloned().collect(),
                HeaderKind::Address | HeaderKind::Text => entry.values.clone(),
            };
            values.into_iter().map(move |v| (entry.name.as_str(), v))
        })
    }

    /// Sets the `Date` header.
    pub fn add_date_header<Tz: TimeZone>(&mut self, date: &DateTime<Tz>)
    where
        Tz::Offset: fmt::Display,
    {
        self.replace_header("Date", date.to_rfc2822());
    }

    /// Parses the `Date` header.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let value = self.value_base("date")?;
        DateTime::parse_from_rfc2822(value.trim()).ok()
    }

    /// Sets a new random `Message-ID` for `hostname` and returns it.
    pub fn add_message_id_header(&mut self, hostname: &str) -> String {
        let id = format!("<{}@{hostname}>", random_token(24));
        self.replace_header("Message-ID", id.clone());
        id
    }

    /// Encodes every header for the wire, in insertion order.
    ///
    /// Repeated headers produce one pair per value; single-valued fields
    /// produce only their first value.
    #[must_use]
    pub fn to_array(&self, opts: &HeaderEncodeOptions) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry.kind {
                HeaderKind::Params => {
                    let cp = ContentParam::from_parts(
                        entry.values.first().cloned().unwrap_or_default(),
                        entry.params.clone(),
                    );
                    out.push((entry.name.clone(), cp.to_header_string(&opts.param_options())));
                }
                HeaderKind::Single => {
                    if let Some(value) = entry.values.first() {
                        out.push((entry.name.clone(), encode_rfc2047(value, &opts.charset)));
                    }
                }
                HeaderKind::Address => {
                    for value in entry.values.iter().filter(|v| !v.is_empty()) {
                        out.push((entry.name.clone(), encode_address_list(value, opts)));
                    }
                }
                HeaderKind::Text => {
                    for value in &entry.values {
                        out.push((entry.name.clone(), encode_rfc2047(value, &opts.charset)));
                    }
                }
            }
        }
        out
    }

    /// Serializes the headers, each line terminated by `opts.eol` and folded
    /// unless `opts.nowrap` is set. No blank line is appended.
    #[must_use]
    pub fn to_string_with(&self, opts: &HeaderEncodeOptions) -> String {
        let mut out = String::new();
        for (name, value) in self.to_array(opts) {
            let value: String = value
                .chars()
                .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
                .collect();
            let line = format!("{name}: {value}");
            if opts.nowrap {
                out.push_str(&line);
            } else {
                out.push_str(&fold(&line, opts.eol));
            }
            out.push_str(opts.eol.as_str());
        }
        out
    }

    /// Parses a header block, unfolding continuation lines.
    ///
    /// Parsing stops at the first empty line. Lines that are not valid UTF-8
    /// are converted from `default_charset`. Values are decoded as by
    /// [`Headers::add_header_decoded`]; empty values are dropped.
    #[must_use]
    pub fn parse_headers(text: &[u8], default_charset: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<Vec<u8>> = None;

        for line in text.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if matches!(line[0], b' ' | b'\t') {
                if let Some(buf) = current.as_mut() {
                    buf.extend_from_slice(line);
                }
                continue;
            }
            if let Some(buf) = current.take() {
                headers.add_raw_line(&buf, default_charset);
            }
            current = Some(line.to_vec());
        }
        if let Some(buf) = current {
            headers.add_raw_line(&buf, default_charset);
        }
        headers
    }

    /// Parses a header block held in a string.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::parse_headers(text.as_bytes(), "us-ascii")
    }

    fn add_raw_line(&mut self, line: &[u8], default_charset: &str) {
        let line = match std::str::from_utf8(line) {
            Ok(s) => s.to_string(),
            Err(_) => charset::decode_to_string(line, default_charset),
        };
        let Some((name, value)) = line.split_once(':') else {
            debug!(line = %line, "Skipping header line without colon");
            return;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            return;
        }
        self.add_header_decoded(name, value);
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(&HeaderEncodeOptions::default()))
    }
}

/// Folds a header line at whitespace so that lines stay within 76 columns
/// where possible. Continuation lines begin with the whitespace they were
/// broken at.
fn fold(line: &str, eol: Eol) -> String {
    if line.len() <= FOLD_COLUMNS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 16);
    let mut rest = line;
    while rest.len() > FOLD_COLUMNS {
        // Never break at position 0: a continuation line starts with its space.
        let window = &rest[..floor_char_boundary(rest, FOLD_COLUMNS + 1)];
        let split = window
            .char_indices()
            .skip(1)
            .filter(|&(_, c)| c == ' ' || c == '\t')
            .map(|(i, _)| i)
            .last()
            .or_else(|| {
                rest.char_indices()
                    .skip(1)
                    .find(|&(_, c)| c == ' ' || c == '\t')
                    .map(|(i, _)| i)
            });
        let Some(split) = split else {
            break;
        };
        out.push_str(&rest[..split]);
        out.push_str(eol.as_str());
        rest = &rest[split..];
    }
    out.push_str(rest);
    out
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Parses an address list and rewrites it with decoded display names.
/// Empty groups are dropped. Unparseable input is RFC 2047 decoded as text.
fn decode_address_list(value: &str) -> String {
    let Ok(entries) = parse_address_list(value, &ParseOptions::new().nest_groups(true)) else {
        debug!(value, "Unparseable address list, decoding as text");
        return decode_rfc2047(value);
    };
    let decode_personal = |addr: &Address| {
        let personal = addr.personal.as_deref().map(|p| {
            let decoded = decode_rfc2047(p);
            let trimmed = decoded.trim();
            trimmed
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(trimmed)
                .to_string()
        });
        Address {
            mailbox: addr.mailbox.clone(),
            host: addr.host.clone(),
            personal,
        }
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            AddressEntry::Mailbox(addr) => Some(decode_personal(addr).to_string()),
            AddressEntry::Group(group) if group.addresses.is_empty() => None,
            AddressEntry::Group(group) => {
                let members: Vec<Address> = group.addresses.iter().map(decode_personal).collect();
                Some(write_group(&decode_rfc2047(&group.name), &members))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes an address list with RFC 2047 encoded display names.
fn encode_address_list(value: &str, opts: &HeaderEncodeOptions) -> String {
    let mut parse_opts = ParseOptions::new().nest_groups(true);
    if let Some(domain) = &opts.default_domain {
        parse_opts = parse_opts.default_domain(domain.clone());
    }
    let Ok(entries) = parse_address_list(value, &parse_opts) else {
        debug!(value, "Unparseable address list, encoding as text");
        return encode_rfc2047(value, &opts.charset);
    };
    let encode_addr = |addr: &Address| {
        let personal = addr
            .personal
            .as_deref()
            .map(|p| encode_rfc2047(p, &opts.charset));
        write_address(&addr.mailbox, addr.host.as_deref(), personal.as_deref())
    };
    entries
        .iter()
        .map(|entry| match entry {
            AddressEntry::Mailbox(addr) => encode_addr(addr),
            AddressEntry::Group(group) => {
                let members: Vec<String> = group.addresses.iter().map(encode_addr).collect();
                let name = encode_rfc2047(&group.name, &opts.charset);
                if members.is_empty() {
                    write_group(&name, &[])
                } else {
                    format!("{}: {};", group_name(&name), members.join(", "))
                }
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quotes a group display name the way the address writer does.
fn group_name(name: &str) -> String {
    write_group(name, &[])
        .strip_suffix(":;")
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_headers_add_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.add_header("Subject", "Test");
        assert_eq!(headers.value("subject").as_deref(), Some("Test"));
        assert_eq!(headers.value("SUBJECT").as_deref(), Some("Test"));
        assert!(headers.value("X-Missing").is_none());
    }

    #[test]
    fn test_single_field_first_wins() {
        let headers = Headers::parse("Importance: High\nImportance: Low\n");
        assert_eq!(headers.value("importance").as_deref(), Some("High"));
        let headers = Headers::parse("X-Priority: 1\nX-priority: 5\n");
        assert_eq!(headers.value("X-Priority").as_deref(), Some("1"));
    }

    #[test]
    fn test_repeated_text_headers_accumulate() {
        let mut headers = Headers::new();
        headers.add_header("Received", "from a");
        headers.add_header("Received", "from b");
        assert_eq!(
            headers.get_value("received", ValueMode::String),
            Some(HeaderValue::Multiple(vec!["from a".into(), "from b".into()]))
        );
        let text = headers.to_string();
        assert_eq!(text, "Received: from a\nReceived: from b\n");
    }

    #[test]
    fn test_address_headers_join() {
        let headers = Headers::parse("To: recipient1@example.com\nTo: recipient2@example.com");
        assert_eq!(
            headers.value("to").as_deref(),
            Some("recipient1@example.com, recipient2@example.com")
        );
    }

    #[test]
    fn test_address_personal_decoded() {
        let mut headers = Headers::new();
        headers.add_header_decoded(
            "To",
            "=?windows-1250?B?IklsZ2EginVwbGluc2thIg==?= <foo@example.com>",
        );
        assert_eq!(
            headers.value("to").as_deref(),
            Some("Ilga \u{160}uplinska <foo@example.com>")
        );
    }

    #[test]
    fn test_undisclosed_group_is_empty() {
        let mut headers = Headers::new();
        headers.add_header_decoded("To", "undisclosed-recipients:;");
        assert_eq!(headers.value("to").as_deref(), Some(""));
        assert!(headers.to_array(&HeaderEncodeOptions::new()).is_empty());
    }

    #[test]
    fn test_group_roundtrip() {
        let mut headers = Headers::new();
        headers.add_header_decoded("To", "Test: foo@example.com, bar@example.com;");
        assert_eq!(
            headers.value("to").as_deref(),
            Some("Test: foo@example.com, bar@example.com;")
        );
    }

    #[test]
    fn test_address_list_typed() {
        let mut headers = Headers::new();
        headers.add_header("To", "Jane <jane@example.com>, Team: a@example.com;");
        headers.add_header("Cc", "Foo <unterminated");
        let to = headers.address_list("to").unwrap();
        assert_eq!(to.len(), 2);
        assert!(matches!(&to[0], AddressEntry::Mailbox(a) if a.personal.as_deref() == Some("Jane")));
        assert!(matches!(&to[1], AddressEntry::Group(g) if g.name == "Team"));
        assert!(headers.address_list("Bcc").unwrap().is_empty());
        assert!(matches!(
            headers.address_list("Cc"),
            Err(crate::error::Error::Address(_))
        ));
    }

    #[test]
    fn test_text_header_decoded() {
        let mut headers = Headers::new();
        headers.add_header_decoded("Test", "=?iso-8859-15?b?VmVyc2nzbg==?=");
        assert_eq!(headers.value("test").as_deref(), Some("Versión"));
    }

    #[test]
    fn test_params_header() {
        let headers = Headers::parse("Content-Type: multipart/mixed; BOUNDARY=\"foo\"");
        assert_eq!(headers.params("content-type").unwrap().get("boundary"), Some("foo"));
        assert_eq!(
            headers.get_value("Content-Type", ValueMode::Base),
            Some(HeaderValue::Single("multipart/mixed".into()))
        );
        assert_eq!(
            headers.value("Content-Type").as_deref(),
            Some("multipart/mixed; boundary=foo")
        );
        assert_eq!(
            headers.get_value("Subject", ValueMode::Params),
            None
        );
    }

    #[test]
    fn test_repeated_content_type_keeps_first() {
        let headers = Headers::parse("Content-Type: multipart/mixed\nContent-Type: text/plain\n");
        assert_eq!(headers.value_base("content-type"), Some("multipart/mixed"));
    }

    #[test]
    fn test_replace_remove_set_value() {
        let mut headers = Headers::new();
        headers.add_header("A", "1");
        headers.add_header("B", "2");
        headers.replace_header("a", "3");
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(headers.value("A").as_deref(), Some("3"));

        assert!(!headers.set_value("C", "x"));
        assert!(headers.set_value("b", "x"));
        assert_eq!(headers.value("B").as_deref(), Some("x"));

        assert!(headers.remove_header("A"));
        assert!(!headers.remove_header("A"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_parse_unfolds_and_drops_empty() {
        let text = concat!(
            "Subject: Hello\r\n",
            "  world\r\n",
            "X-Empty:\r\n",
            "Content-Disposition: attachment; size=147502;\r\n",
            " filename*=utf-8''Factura%20n%C2%BA%2010.pdf\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );
        let headers = Headers::parse(text);
        assert_eq!(headers.value("subject").as_deref(), Some("Hello  world"));
        assert!(!headers.contains("x-empty"));
        assert!(!headers.contains("body"));
        let params = headers.params("content-disposition").unwrap();
        assert_eq!(params.get("filename"), Some("Factura nº 10.pdf"));
    }

    #[test]
    fn test_parse_default_charset() {
        let headers = Headers::parse_headers(b"Test: Runners\x92 Alert!", "us-ascii");
        assert_eq!(headers.value("test").as_deref(), Some("Runners\u{2019} Alert!"));
    }

    #[test]
    fn test_parse_raw_utf8() {
        let headers = Headers::parse("From: © VIAGRA ® Official Site <foo@example.com>");
        assert_eq!(
            headers.value("from").as_deref(),
            Some("© VIAGRA ® Official Site <foo@example.com>")
        );
    }

    #[test]
    fn test_encode_address_personal() {
        let mut headers = Headers::new();
        headers.add_header("Resent-To", "Empfänger <recipient@example.com>");
        headers.add_header("Resent-To", "Foo <foo@example.com>");
        let array = headers.to_array(&HeaderEncodeOptions::new().charset("iso-8859-1"));
        assert_eq!(
            array,
            vec![
                (
                    "Resent-To".to_string(),
                    "=?iso-8859-1?b?RW1wZuRuZ2Vy?= <recipient@example.com>".to_string()
                ),
                ("Resent-To".to_string(), "Foo <foo@example.com>".to_string()),
            ]
        );
    }

    #[test]
    fn test_encode_default_domain() {
        let mut headers = Headers::new();
        headers.add_header("To", "jane");
        let array = headers.to_array(&HeaderEncodeOptions::new().default_domain("example.com"));
        assert_eq!(array[0].1, "jane@example.com");
    }

    #[test]
    fn test_encode_text_header() {
        let mut headers = Headers::new();
        headers.add_header("Content-Description", "AüA");
        assert_eq!(headers.to_string(), "Content-Description: =?utf-8?b?QcO8QQ==?=\n");
    }

    #[test]
    fn test_fold_long_line() {
        let mut headers = Headers::new();
        let subject = "word ".repeat(30);
        headers.add_header("Subject", subject.trim());
        let text = headers.to_string_with(&HeaderEncodeOptions::new().eol(Eol::Crlf));
        assert!(text.ends_with("\r\n"));
        for line in text.trim_end().split("\r\n") {
            assert!(line.len() <= 76, "{line}");
        }
        let reparsed = Headers::parse(&text);
        assert_eq!(reparsed.value("subject").as_deref(), Some(subject.trim()));

        let unwrapped = headers.to_string_with(&HeaderEncodeOptions::new().nowrap(true));
        assert_eq!(unwrapped.lines().count(), 1);
    }

    #[test]
    fn test_date_header() {
        let mut headers = Headers::new();
        let now = Utc::now();
        headers.add_date_header(&now);
        assert_eq!(headers.date().unwrap().timestamp(), now.timestamp());
    }

    #[test]
    fn test_message_id_header() {
        let mut headers = Headers::new();
        let id = headers.add_message_id_header("example.com");
        assert!(id.starts_with('<') && id.ends_with("@example.com>"));
        assert_eq!(headers.value("message-id"), Some(id));
    }
}
