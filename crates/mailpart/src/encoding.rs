//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, uuencode (decode only), RFC 2047
//! header encoding and end-of-line normalization.

use crate::charset;
use crate::error::Result;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Lenient decoder: mail in the wild drops padding and leaves trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Maximum line length for Base64 and Quoted-Printable output.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded word.
const MAX_ENCODED_WORD: usize = 75;

/// End-of-line sequence used when writing wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Eol {
    /// Bare line feed.
    #[default]
    Lf,
    /// Carriage return + line feed (RFC 2045 canonical form).
    Crlf,
}

impl Eol {
    /// Returns the EOL bytes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }

    /// Returns the EOL length in bytes.
    #[must_use]
    pub const fn len(self) -> usize {
        self.as_str().len()
    }
}

/// Rewrites every `\r\n` or bare `\n` to `eol`.
#[must_use]
pub fn replace_eol(data: &[u8], eol: Eol) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' if data.get(i + 1) == Some(&b'\n') => {
                out.extend_from_slice(eol.as_str().as_bytes());
                i += 2;
            }
            b'\n' => {
                out.extend_from_slice(eol.as_str().as_bytes());
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Returns true if the data contains any byte >= 0x80.
#[must_use]
pub fn is_8bit(data: &[u8]) -> bool {
    !data.is_ascii()
}

/// Returns true if any line (excluding its EOL) is longer than `max` bytes.
#[must_use]
pub fn has_long_lines(data: &[u8], max: usize) -> bool {
    data.split(|&b| b == b'\n').any(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        line.len() > max
    })
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 folded into 76-column lines joined by `eol`.
///
/// No EOL follows the last line.
#[must_use]
pub fn encode_base64_lines(data: &[u8], eol: Eol) -> Vec<u8> {
    let encoded = STANDARD.encode(data);
    let lines: Vec<&[u8]> = encoded.as_bytes().chunks(MAX_LINE_LENGTH).collect();
    lines.join(eol.as_str().as_bytes())
}

/// Decodes Base64 data, ignoring whitespace and tolerating missing padding.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Encodes data using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input become hard breaks written as `eol`; trailing
/// whitespace is encoded and long lines get soft breaks.
#[must_use]
pub fn encode_quoted_printable(data: &[u8], eol: Eol) -> Vec<u8> {
    let eol = eol.as_str().as_bytes();
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);

    for (n, line) in data.split(|&b| b == b'\n').enumerate() {
        if n > 0 {
            out.extend_from_slice(eol);
        }
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut column = 0;
        for (i, &byte) in line.iter().enumerate() {
            let last = i + 1 == line.len();
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                b' ' | b'\t' => !last,
                _ => false,
            };
            let width = if literal { 1 } else { 3 };
            // Leave room for the soft break "=" unless this is the final token.
            let limit = if last { MAX_LINE_LENGTH } else { MAX_LINE_LENGTH - 1 };
            if column + width > limit {
                out.push(b'=');
                out.extend_from_slice(eol);
                column = 0;
            }
            if literal {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("={byte:02X}").as_bytes());
            }
            column += width;
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Malformed escape sequences are kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'=' {
            out.push(data[i]);
            i += 1;
            continue;
        }
        // Soft line break, possibly with trailing whitespace before the EOL.
        let mut j = i + 1;
        while j < data.len() && (data[j] == b' ' || data[j] == b'\t') {
            j += 1;
        }
        match data.get(j) {
            Some(b'\n') => {
                i = j + 1;
                continue;
            }
            Some(b'\r') if data.get(j + 1) == Some(&b'\n') => {
                i = j + 2;
                continue;
            }
            None if j > i + 1 || j == data.len() => {
                i = j;
                continue;
            }
            _ => {}
        }
        match (
            data.get(i + 1).copied().and_then(hex_value),
            data.get(i + 2).copied().and_then(hex_value),
        ) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

/// Decodes uuencoded data (`begin <mode> <name>` ... `end`).
///
/// Text before the `begin` line is ignored. If there is no `begin` line the
/// whole input is treated as encoded lines.
#[must_use]
pub fn decode_uuencode(data: &[u8]) -> Vec<u8> {
    let mut lines = data
        .split(|&b| b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .peekable();
    let has_begin = data
        .split(|&b| b == b'\n')
        .any(|l| l.starts_with(b"begin "));
    if has_begin {
        for line in lines.by_ref() {
            if line.starts_with(b"begin ") {
                break;
            }
        }
    }

    let mut out = Vec::new();
    for line in lines {
        if line == b"end" || line.is_empty() {
            break;
        }
        let len = usize::from(line[0].wrapping_sub(b' ') & 0x3f);
        if len == 0 {
            break;
        }
        let mut decoded = Vec::with_capacity(len + 2);
        for group in line[1..].chunks(4) {
            let mut c = [0u8; 4];
            for (k, &b) in group.iter().enumerate() {
                c[k] = b.wrapping_sub(b' ') & 0x3f;
            }
            decoded.push((c[0] << 2) | (c[1] >> 4));
            decoded.push((c[1] << 4) | (c[2] >> 2));
            decoded.push((c[2] << 6) | c[3]);
        }
        decoded.truncate(len);
        out.extend_from_slice(&decoded);
    }
    out
}

/// Encodes a header value using RFC 2047 encoded words.
///
/// Text that is plain ASCII is returned unchanged. Otherwise the run of
/// words from the first to the last one needing encoding is converted to
/// `charset` and written as one or more `=?charset?b?...?=` words, each at
/// most 75 characters long and never splitting a character.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    let needs = |w: &str| !w.is_ascii() || w.contains("=?") || w.chars().any(char::is_control);
    let words: Vec<&str> = text.split(' ').collect();
    let (Some(first), Some(last)) = (
        words.iter().position(|w| needs(w)),
        words.iter().rposition(|w| needs(w)),
    ) else {
        return text.to_string();
    };

    let span = words[first..=last].join(" ");
    let charset = if charset::try_encode(&span, charset).is_some() {
        charset.to_ascii_lowercase()
    } else {
        "utf-8".to_string()
    };
    let mut out: Vec<String> = words[..first].iter().map(ToString::to_string).collect();
    out.extend(encode_words(&span, &charset));
    out.extend(words[last + 1..].iter().map(ToString::to_string));
    out.join(" ")
}

fn encode_words(text: &str, charset: &str) -> Vec<String> {
    let overhead = charset.len() + "=?".len() + "?b?".len() + "?=".len();
    let max_bytes = (MAX_ENCODED_WORD.saturating_sub(overhead) / 4).max(1) * 3;

    let mut words = Vec::new();
    let mut chunk: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let bytes = charset::encode_from_str(c.encode_utf8(&mut buf), charset);
        if !chunk.is_empty() && chunk.len() + bytes.len() > max_bytes {
            words.push(format!("=?{charset}?b?{}?=", encode_base64(&chunk)));
            chunk.clear();
        }
        chunk.extend_from_slice(&bytes);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?b?{}?=", encode_base64(&chunk)));
    }
    words
}

/// Decodes RFC 2047 encoded words anywhere in a header value.
///
/// Whitespace between adjacent encoded words is dropped. Malformed words
/// are left as they are.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }
    out.push_str(rest);
    out
}

/// Decodes one `=?charset?enc?text?=` word at the start of `s`, returning
/// the text and the number of bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let q1 = inner.find('?')?;
    let charset = &inner[..q1];
    let tail = &inner[q1 + 1..];
    let enc = *tail.as_bytes().first()?;
    if tail.as_bytes().get(1) != Some(&b'?') {
        return None;
    }
    let payload_area = &tail[2..];
    let end = payload_area.find("?=")?;
    let payload = &payload_area[..end];
    if charset.is_empty() || payload.contains(' ') {
        return None;
    }

    let bytes = match enc.to_ascii_uppercase() {
        b'B' => decode_base64(payload.as_bytes()).ok()?,
        b'Q' => {
            let raw: Vec<u8> = payload
                .bytes()
                .map(|b| if b == b'_' { b' ' } else { b })
                .collect();
            decode_quoted_printable(&raw)
        }
        _ => return None,
    };
    // RFC 2231 section 5 allows a language suffix: "charset*lang".
    let charset = charset.split('*').next().unwrap_or(charset);
    let consumed = 2 + q1 + 1 + 2 + end + 2;
    Some((charset::decode_to_string(&bytes, charset), consumed))
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

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lenient() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8").unwrap(), b"Hello");
        assert!(decode_base64(b"S*Vs").is_err());
    }

    #[test]
    fn test_base64_lines() {
        let data = vec![b'x'; 100];
        let encoded = encode_base64_lines(&data, Eol::Crlf);
        let text = String::from_utf8(encoded).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert!(!text.ends_with("\r\n"));
    }

    #[test]
    fn test_replace_eol() {
        assert_eq!(replace_eol(b"a\r\nb\nc", Eol::Crlf), b"a\r\nb\r\nc");
        assert_eq!(replace_eol(b"a\r\nb\nc", Eol::Lf), b"a\nb\nc");
    }

    #[test]
    fn test_long_lines() {
        let mut data = vec![b'a'; 998];
        assert!(!has_long_lines(&data, 998));
        data.push(b'a');
        assert!(has_long_lines(&data, 998));
        assert!(!has_long_lines(b"short\r\nlines\r\n", 998));
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!", Eol::Lf), b"Hello, World!");
        assert_eq!(
            encode_quoted_printable("A\r\nBā\r\nC".as_bytes(), Eol::Crlf),
            b"A\r\nB=C4=81\r\nC"
        );
        assert_eq!(encode_quoted_printable(b"a=b \n", Eol::Lf), b"a=3Db=20\n");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let data = vec![b'a'; 200];
        let encoded = encode_quoted_printable(&data, Eol::Lf);
        for line in encoded.split(|&b| b == b'\n') {
            assert!(line.len() <= 76);
        }
        assert_eq!(decode_quoted_printable(&encoded), data);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"50=%"), b"50=%");
    }

    #[test]
    fn test_uuencode_decode() {
        let data = b"begin 644 cat.txt\n#0V%T\n`\nend\n";
        assert_eq!(decode_uuencode(data), b"Cat");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");
        assert_eq!(encode_rfc2047("AüA", "utf-8"), "=?utf-8?b?QcO8QQ==?=");
        assert_eq!(
            encode_rfc2047("Empfänger", "ISO-8859-1"),
            "=?iso-8859-1?b?RW1wZuRuZ2Vy?="
        );
        assert_eq!(
            encode_rfc2047("Re: Grüße aus Köln", "utf-8"),
            "Re: =?utf-8?b?R3LDvMOfZSBhdXMgS8O2bG4=?="
        );
    }

    #[test]
    fn test_rfc2047_long_text_splits() {
        let text = "é".repeat(60);
        let encoded = encode_rfc2047(&text, "utf-8");
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= 75));
        assert_eq!(decode_rfc2047(&encoded), text);
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?iso-8859-15?b?VmVyc2nzbg==?="), "Versión");
    }

    #[test]
    fn test_rfc2047_adjacent_words() {
        assert_eq!(decode_rfc2047("=?utf-8?q?a?= =?utf-8?q?b?="), "ab");
        assert_eq!(decode_rfc2047("x =?utf-8?q?a?= y"), "x a y");
    }

    #[test]
    fn test_rfc2047_malformed_left_alone() {
        assert_eq!(decode_rfc2047("=?broken"), "=?broken");
        assert_eq!(decode_rfc2047("a =?utf-8?x?zz?= b"), "a =?utf-8?x?zz?= b");
    }

    #[test]
    fn test_rfc2047_address_personal() {
        assert_eq!(
            decode_rfc2047("=?windows-1250?B?IklsZ2EginVwbGluc2thIg==?= <foo@example.com>"),
            "\"Ilga \u{160}uplinska\" <foo@example.com>"
        );
    }
}
