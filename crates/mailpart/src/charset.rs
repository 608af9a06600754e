//! Charset conversion.
//!
//! All conversions are best effort: mail must stay displayable even when it
//! declares the wrong charset, so failures fall back to the input instead of
//! returning an error.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::warn;

/// Resolves a charset label.
///
/// `iso-8859-1` (and its aliases) resolve to `windows-1252`, which is what
/// mailers claiming Latin-1 actually send.
#[must_use]
pub fn lookup(charset: &str) -> Option<&'static Encoding> {
    let label = charset.trim().trim_matches('"');
    match label.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(UTF_8),
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(WINDOWS_1252),
        _ => Encoding::for_label(label.as_bytes()),
    }
}

/// Decodes bytes in `charset` to a string, replacing malformed sequences.
///
/// Unknown charsets are decoded as lossy UTF-8.
#[must_use]
pub fn decode_to_string(bytes: &[u8], charset: &str) -> String {
    match lookup(charset) {
        Some(encoding) => {
            let (decoded, _) = encoding.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Encodes a string into `charset`.
///
/// Unknown charsets, and characters the charset cannot represent, yield the
/// UTF-8 bytes of the input.
#[must_use]
pub fn encode_from_str(text: &str, charset: &str) -> Vec<u8> {
    try_encode(text, charset).unwrap_or_else(|| {
        warn!(charset, "Text not representable in charset, keeping UTF-8");
        text.as_bytes().to_vec()
    })
}

/// Encodes a string into `charset`, or `None` if the charset is unknown or
/// cannot represent every character.
#[must_use]
pub fn try_encode(text: &str, charset: &str) -> Option<Vec<u8>> {
    let encoding = lookup(charset)?;
    // encoding_rs encodes UTF-16 labels as UTF-8.
    if encoding.output_encoding() != encoding {
        return None;
    }
    let (encoded, _, had_errors) = encoding.encode(text);
    (!had_errors).then(|| encoded.into_owned())
}

/// Converts bytes from one charset to another.
///
/// Returns the original bytes if either charset is unknown or the input is
/// not valid in `from`.
#[must_use]
pub fn convert(bytes: &[u8], from: &str, to: &str) -> Vec<u8> {
    let (Some(src), Some(dst)) = (lookup(from), lookup(to)) else {
        warn!(from, to, "Unknown charset in conversion, keeping original bytes");
        return bytes.to_vec();
    };
    if src == dst {
        return bytes.to_vec();
    }
    let Some(text) = src.decode_without_bom_handling_and_without_replacement(bytes) else {
        warn!(from, "Malformed input for charset, keeping original bytes");
        return bytes.to_vec();
    };
    let (encoded, _, had_errors) = dst.encode(&text);
    if had_errors {
        warn!(to, "Unmappable characters in conversion, keeping original bytes");
        return bytes.to_vec();
    }
    encoded.into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_is_windows_1252() {
        assert_eq!(lookup("ISO-8859-1"), Some(WINDOWS_1252));
        // 0x92 is a right single quote in windows-1252 but a C1 control in Latin-1.
        assert_eq!(decode_to_string(b"Runners\x92", "iso-8859-1"), "Runners\u{2019}");
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_to_string("café".as_bytes(), "UTF-8"), "café");
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        assert_eq!(decode_to_string(b"abc", "x-no-such-charset"), "abc");
        assert_eq!(convert(b"\xff", "x-no-such-charset", "utf-8"), b"\xff");
    }

    #[test]
    fn test_encode_latin1() {
        assert_eq!(encode_from_str("Empfänger", "iso-8859-1"), b"Empf\xe4nger");
        assert_eq!(try_encode("\u{4e2d}", "iso-8859-1"), None);
        assert_eq!(encode_from_str("\u{4e2d}", "iso-8859-1"), "\u{4e2d}".as_bytes());
    }

    #[test]
    fn test_convert_roundtrip() {
        let latin = convert("blåbær".as_bytes(), "utf-8", "iso-8859-1");
        assert_eq!(latin, b"bl\xe5b\xe6r");
        assert_eq!(convert(&latin, "iso-8859-1", "utf-8"), "blåbær".as_bytes());
    }

    #[test]
    fn test_convert_malformed_keeps_original() {
        assert_eq!(convert(b"\xc3", "utf-8", "iso-8859-1"), b"\xc3");
    }
}
