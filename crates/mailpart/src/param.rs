//! MIME header parameters (RFC 2045 / RFC 2231).
//!
//! [`ContentParam`] splits a header such as `Content-Type` into its base
//! value and an ordered parameter map. Decoding reassembles RFC 2231
//! continuations and charset-tagged values; encoding produces the reverse,
//! splitting long values into `name*N` segments.

use crate::charset;
use crate::encoding::{decode_rfc2047, encode_rfc2047};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use std::fmt;

/// Bytes left unescaped in RFC 2231 extended values.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Column limit for a single `name=value` segment, including the `; `
/// separator.
const MAX_PARAM_COLUMNS: usize = 75;

/// Characters allowed in an unquoted parameter value.
fn is_unquoted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`{|}~".contains(c)
}

/// Quotes a parameter value unless every character is in the unquoted set.
fn quote_value(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_unquoted_char) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Ordered, case-insensitive parameter map.
///
/// Names are stored lowercase. Inserting an existing name replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamMap {
    entries: Vec<(String, String)>,
}

impl ParamMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `name` is present.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name` to `value`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            return Some(std::mem::replace(v, value));
        }
        self.entries.push((name, value));
        None
    }

    /// Removes `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Options for [`ContentParam::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEncodeOptions {
    /// Charset for non-ASCII values.
    pub charset: String,
    /// Language tag written into extended values.
    pub lang: Option<String>,
    /// Also emit an RFC 2047 duplicate under the bare name.
    pub broken_rfc2231: bool,
}

impl Default for ParamEncodeOptions {
    fn default() -> Self {
        Self {
            charset: "utf-8".to_string(),
            lang: None,
            broken_rfc2231: false,
        }
    }
}

impl ParamEncodeOptions {
    /// Creates default options (UTF-8, no language).
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

    /// Sets the language tag.
    #[must_use]
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Enables the RFC 2047 duplicate parameter.
    #[must_use]
    pub const fn broken_rfc2231(mut self, enabled: bool) -> Self {
        self.broken_rfc2231 = enabled;
        self
    }
}

/// A header value with its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentParam {
    /// Base value, e.g. `text/plain` or `attachment`.
    pub value: String,
    /// Decoded parameters.
    pub params: ParamMap,
}

/// One raw `name[*N][*]=value` segment.
struct Segment {
    index: u32,
    encoded: bool,
    value: String,
}

impl ContentParam {
    /// Creates a value with no parameters.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: ParamMap::new(),
        }
    }

    /// Creates a value from already decoded parameters, used verbatim.
    #[must_use]
    pub fn from_parts(value: impl Into<String>, params: ParamMap) -> Self {
        Self {
            value: value.into(),
            params,
        }
    }

    /// Decodes a raw header value.
    ///
    /// RFC 2231 continuations are joined in index order and extended values
    /// are converted from their declared charset. If no parameter uses RFC
    /// 2231 syntax at all, every value is decoded as RFC 2047 text instead.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let mut tokens = split_unquoted(raw, ';').into_iter();
        let value = decode_rfc2047(tokens.next().unwrap_or_default().trim());

        let mut groups: Vec<(String, Vec<Segment>)> = Vec::new();
        let mut any_2231 = false;
        for token in tokens {
            let Some((name, val)) = token.split_once('=') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            any_2231 |= name.contains('*');
            let (base, segment) = parse_segment(&name, unquote(val.trim()));
            match groups.iter_mut().find(|(b, _)| *b == base) {
                Some((_, segments)) => segments.push(segment),
                None => groups.push((base, vec![segment])),
            }
        }

        let mut params = ParamMap::new();
        for (base, mut segments) in groups {
            segments.sort_by_key(|s| s.index);
            let decoded = if any_2231 {
                join_segments(&segments)
            } else {
                decode_rfc2047(&segments.iter().map(|s| s.value.as_str()).collect::<String>())
            };
            params.insert(base, decoded);
        }

        Self { value, params }
    }

    /// Encodes the parameters as wire tokens (`name=value`), in order.
    #[must_use]
    pub fn encode(&self, opts: &ParamEncodeOptions) -> Vec<String> {
        self.params
            .iter()
            .flat_map(|(name, value)| encode_param(name, value, opts))
            .collect()
    }

    /// Returns the full header value: the base value followed by the
    /// encoded parameters, separated by `; `.
    #[must_use]
    pub fn to_header_string(&self, opts: &ParamEncodeOptions) -> String {
        let mut out = self.value.clone();
        for token in self.encode(opts) {
            out.push_str("; ");
            out.push_str(&token);
        }
        out
    }
}

impl fmt::Display for ContentParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_string(&ParamEncodeOptions::default()))
    }
}

/// Splits on `sep` outside of double quotes.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

/// Strips surrounding quotes and backslash escapes.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"') else {
        return s.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits `name*N*` into the base name and its segment description.
fn parse_segment(name: &str, value: String) -> (String, Segment) {
    let (name, encoded) = match name.strip_suffix('*') {
        Some(stripped) => (stripped, true),
        None => (name, false),
    };
    let (base, index) = match name.rsplit_once('*') {
        Some((base, idx)) if !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()) => {
            (base, idx.parse().unwrap_or(u32::MAX))
        }
        _ => (name, 0),
    };
    (
        base.to_string(),
        Segment {
            index,
            encoded,
            value,
        },
    )
}

/// Joins RFC 2231 segments, decoding extended ones from their charset.
fn join_segments(segments: &[Segment]) -> String {
    if !segments.iter().any(|s| s.encoded) {
        return segments.iter().map(|s| s.value.as_str()).collect();
    }

    let mut charset = String::from("us-ascii");
    let mut bytes = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if !segment.encoded {
            bytes.extend_from_slice(segment.value.as_bytes());
            continue;
        }
        let mut data = segment.value.as_str();
        if i == 0 {
            let mut fields = data.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (fields.next(), fields.next(), fields.next())
            {
                if !cs.is_empty() {
                    charset = cs.to_string();
                }
                data = rest;
            }
        }
        bytes.extend(percent_decode_str(data));
    }
    charset::decode_to_string(&bytes, &charset)
}

/// Encodes one parameter into one or more wire tokens.
fn encode_param(name: &str, value: &str, opts: &ParamEncodeOptions) -> Vec<String> {
    if value.is_ascii() && opts.lang.is_none() {
        let single = format!("{name}={}", quote_value(value));
        if single.len() + 2 <= MAX_PARAM_COLUMNS {
            return vec![single];
        }
        return split_plain(name, value);
    }

    let (cs, bytes) = match charset::try_encode(value, &opts.charset) {
        Some(bytes) => (opts.charset.to_ascii_lowercase(), bytes),
        None => ("utf-8".to_string(), value.as_bytes().to_vec()),
    };
    let lang = opts.lang.as_deref().unwrap_or_default();
    let escaped = percent_encode(&bytes, ATTR_CHAR).to_string();

    let mut out = Vec::new();
    if opts.broken_rfc2231 {
        out.push(format!("{name}=\"{}\"", encode_rfc2047(value, &cs)));
    }
    let single = format!("{name}*={cs}'{lang}'{escaped}");
    if single.len() + 2 <= MAX_PARAM_COLUMNS {
        out.push(single);
    } else {
        out.extend(split_extended(name, &format!("{cs}'{lang}'"), &escaped));
    }
    out
}

/// Splits a plain ASCII value into `name*N=` continuations.
fn split_plain(name: &str, value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        let mut candidate = chunk.clone();
        candidate.push(c);
        let token = format!("{name}*{}={}", out.len(), quote_value(&candidate));
        if !chunk.is_empty() && token.len() + 2 > MAX_PARAM_COLUMNS {
            out.push(format!("{name}*{}={}", out.len(), quote_value(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    out.push(format!("{name}*{}={}", out.len(), quote_value(&chunk)));
    out
}

/// Splits a percent-encoded value into `name*N*=` continuations without
/// breaking `%XX` triplets. The first segment carries the charset prefix.
fn split_extended(name: &str, prefix: &str, escaped: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut rest = escaped;
    while !rest.is_empty() {
        let len = if rest.starts_with('%') { 3.min(rest.len()) } else { 1 };
        let (unit, tail) = rest.split_at(len);
        units.push(unit);
        rest = tail;
    }

    let mut out: Vec<String> = Vec::new();
    let mut current = String::from(prefix);
    let mut has_unit = false;
    for unit in units {
        let head = format!("{name}*{}*=", out.len());
        if has_unit && head.len() + current.len() + unit.len() + 2 > MAX_PARAM_COLUMNS {
            out.push(format!("{head}{current}"));
            current.clear();
        }
        current.push_str(unit);
        has_unit = true;
    }
    out.push(format!("{name}*{}*={current}", out.len()));
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect
)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let cp = ContentParam::decode("text/plain; charset=utf-8");
        assert_eq!(cp.value, "text/plain");
        assert_eq!(cp.params.get("charset"), Some("utf-8"));
    }

    #[test]
    fn test_decode_no_params() {
        let cp = ContentParam::decode("  inline  ");
        assert_eq!(cp.value, "inline");
        assert!(cp.params.is_empty());
    }

    #[test]
    fn test_decode_quoted_and_case() {
        let cp = ContentParam::decode("multipart/mixed; BOUNDARY=\"----=_Part;123\"");
        assert_eq!(cp.params.get("boundary"), Some("----=_Part;123"));
        assert_eq!(cp.params.get("Boundary"), Some("----=_Part;123"));

        let cp = ContentParam::decode(r#"attachment; filename="a \"b\" c""#);
        assert_eq!(cp.params.get("filename"), Some(r#"a "b" c"#));
    }

    #[test]
    fn test_decode_rfc2231_charset() {
        let cp = ContentParam::decode("text/plain; charset*=utf-8''caf%C3%A9");
        assert_eq!(cp.params.get("charset"), Some("café"));
    }

    #[test]
    fn test_decode_rfc2231_continuations_out_of_order() {
        let cp = ContentParam::decode(
            "attachment; filename*1*=%A9.txt; filename*0*=utf-8'en'caf%C3",
        );
        assert_eq!(cp.params.get("filename"), Some("café.txt"));
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded_segments() {
        let cp = ContentParam::decode(
            "attachment; filename*0*=iso-8859-1''Gr%FC; filename*1=\"n e\"; size=10",
        );
        assert_eq!(cp.params.get("filename"), Some("Grün e"));
        assert_eq!(cp.params.get("size"), Some("10"));
        let names: Vec<&str> = cp.params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["filename", "size"]);
    }

    #[test]
    fn test_decode_disposition_with_fold() {
        let cp = ContentParam::decode(
            "attachment; size=147502;\n filename*=utf-8''Factura%20n%C2%BA%2010.pdf",
        );
        assert_eq!(cp.value, "attachment");
        assert_eq!(cp.params.get("size"), Some("147502"));
        assert_eq!(cp.params.get("filename"), Some("Factura nº 10.pdf"));
    }

    #[test]
    fn test_decode_rfc2047_fallback() {
        let cp = ContentParam::decode("text/plain; name=\"=?iso-8859-15?b?VmVyc2nzbg==?=\"");
        assert_eq!(cp.params.get("name"), Some("Versión"));
    }

    #[test]
    fn test_rfc2047_fallback_is_whole_header() {
        let cp = ContentParam::decode(
            "text/plain; name=\"=?utf-8?q?caf=C3=A9?=\"; charset*=utf-8''x",
        );
        assert_eq!(cp.params.get("name"), Some("=?utf-8?q?caf=C3=A9?="));
    }

    #[test]
    fn test_encode_plain() {
        let mut params = ParamMap::new();
        params.insert("charset", "us-ascii");
        params.insert("name", "my file.txt");
        let cp = ContentParam::from_parts("text/plain", params);
        assert_eq!(
            cp.encode(&ParamEncodeOptions::new()),
            vec!["charset=us-ascii", "name=\"my file.txt\""]
        );
        assert_eq!(cp.to_string(), "text/plain; charset=us-ascii; name=\"my file.txt\"");
    }

    #[test]
    fn test_encode_extended() {
        let cp = ContentParam::from_parts("attachment", [("filename", "café.txt")].into_iter().collect());
        assert_eq!(
            cp.encode(&ParamEncodeOptions::new()),
            vec!["filename*=utf-8''caf%C3%A9.txt"]
        );
        assert_eq!(
            cp.encode(&ParamEncodeOptions::new().charset("iso-8859-1").lang("fr")),
            vec!["filename*=iso-8859-1'fr'caf%E9.txt"]
        );
    }

    #[test]
    fn test_encode_broken_rfc2231() {
        let cp = ContentParam::from_parts("attachment", [("filename", "AüA")].into_iter().collect());
        assert_eq!(
            cp.encode(&ParamEncodeOptions::new().broken_rfc2231(true)),
            vec!["filename=\"=?utf-8?b?QcO8QQ==?=\"", "filename*=utf-8''A%C3%BCA"]
        );
    }

    #[test]
    fn test_encode_long_extended_value_splits() {
        let name = "é".repeat(40);
        let cp = ContentParam::from_parts("attachment", [("filename", name.as_str())].into_iter().collect());
        let tokens = cp.encode(&ParamEncodeOptions::new());
        assert!(tokens.len() >= 3);
        assert!(tokens[0].starts_with("filename*0*=utf-8''"));
        assert!(tokens[1].starts_with("filename*1*="));
        for token in &tokens {
            assert!(token.len() + 2 <= 75, "{token}");
            let value = token.split_once('=').unwrap().1;
            assert!(!value.ends_with('%'));
            assert!(value.rsplit('%').next().unwrap().len() >= 2 || !value.contains('%'));
        }
        let header = format!("attachment; {}", tokens.join("; "));
        assert_eq!(ContentParam::decode(&header).params.get("filename"), Some(name.as_str()));
    }

    #[test]
    fn test_encode_long_plain_value_splits() {
        let name = "a".repeat(150);
        let cp = ContentParam::from_parts("attachment", [("filename", name.as_str())].into_iter().collect());
        let tokens = cp.encode(&ParamEncodeOptions::new());
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].starts_with("filename*0=aaa"));
        let header = format!("attachment; {}", tokens.join("; "));
        assert_eq!(ContentParam::decode(&header).params.get("filename"), Some(name.as_str()));
    }

    #[test]
    fn test_encode_unrepresentable_falls_back_to_utf8() {
        let cp = ContentParam::from_parts("attachment", [("filename", "\u{4e2d}")].into_iter().collect());
        assert_eq!(
            cp.encode(&ParamEncodeOptions::new().charset("iso-8859-1")),
            vec!["filename*=utf-8''%E4%B8%AD"]
        );
    }

    #[test]
    fn test_param_map_order_and_replace() {
        let mut map = ParamMap::new();
        map.insert("B", "1");
        map.insert("a", "2");
        assert_eq!(map.insert("b", "3"), Some("1".to_string()));
        let pairs: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "2")]);
        assert_eq!(map.remove("A"), Some("2".to_string()));
        assert_eq!(map.len(), 1);
    }
}
