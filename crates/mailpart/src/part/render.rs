//! Serialization of a part tree to wire text.

use super::{Disposition, EncodeMask, MimeId, Part, TransferEncoding};
use crate::encoding::{Eol, encode_base64_lines, encode_quoted_printable, replace_eol};
use crate::error::{Error, Result};
use crate::header::{HeaderEncodeOptions, Headers};
use std::io::{self, Write};

/// Body text of a multipart with no preamble of its own.
const MIME_PREAMBLE: &str = "This message is in MIME format.";

/// Options for [`Part::write_to`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Include the part's headers.
    pub headers: bool,
    /// Rewrite every line ending of the output to CRLF.
    pub canonical: bool,
    /// Allowed transfer encodings.
    pub encode: EncodeMask,
    /// Render only the part with this ID.
    pub id: Option<MimeId>,
    /// Line terminator for generated text.
    pub eol: Eol,
    /// Charset for encoded header text when a part has none of its own.
    pub charset: String,
    /// Emit RFC 2047 duplicates of RFC 2231 parameters.
    pub broken_rfc2231: bool,
    /// Headers written before the MIME headers of the rendered part.
    pub message_headers: Option<Headers>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            headers: true,
            canonical: false,
            encode: EncodeMask::SEVEN_BIT,
            id: None,
            eol: Eol::Lf,
            charset: "utf-8".to_string(),
            broken_rfc2231: false,
            message_headers: None,
        }
    }
}

impl RenderOptions {
    /// Creates default options: headers on, 7bit, LF.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes or omits headers.
    #[must_use]
    pub const fn headers(mut self, headers: bool) -> Self {
        self.headers = headers;
        self
    }

    /// Enables CRLF output.
    #[must_use]
    pub const fn canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Sets the allowed transfer encodings.
    #[must_use]
    pub const fn encode(mut self, mask: EncodeMask) -> Self {
        self.encode = mask;
        self
    }

    /// Renders only the part with `id`.
    #[must_use]
    pub fn id(mut self, id: MimeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the EOL.
    #[must_use]
    pub const fn eol(mut self, eol: Eol) -> Self {
        self.eol = eol;
        self
    }

    /// Sets the header charset.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Enables RFC 2047 parameter duplicates.
    #[must_use]
    pub const fn broken_rfc2231(mut self, enabled: bool) -> Self {
        self.broken_rfc2231 = enabled;
        self
    }

    /// Sets headers written ahead of the MIME headers.
    #[must_use]
    pub fn message_headers(mut self, headers: Headers) -> Self {
        self.message_headers = Some(headers);
        self
    }
}

/// Rewrites bare LF to CRLF on the way through.
struct CrlfWriter<W: Write> {
    inner: W,
    last: u8,
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + buf.len() / 16);
        for &b in buf {
            if b == b'\n' && self.last != b'\r' {
                out.push(b'\r');
            }
            out.push(b);
            self.last = b;
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn encode_body(data: &[u8], encoding: TransferEncoding, eol: Eol) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => encode_base64_lines(data, eol),
        TransferEncoding::QuotedPrintable => encode_quoted_printable(data, eol),
        TransferEncoding::SevenBit | TransferEncoding::EightBit => replace_eol(data, eol),
        _ => data.to_vec(),
    }
}

impl Part {
    /// Returns the MIME headers of this part.
    #[must_use]
    pub fn mime_headers(&self, opts: &RenderOptions) -> Headers {
        let mut headers = Headers::new();
        self.add_mime_headers(&mut headers, opts);
        headers
    }

    /// Adds this part's MIME headers to `headers`, replacing existing ones.
    ///
    /// `MIME-Version` is added only for a base part. `message/*` parts get
    /// no Content-Disposition or Content-Transfer-Encoding; the latter is
    /// also omitted when it would be `7bit`.
    pub fn add_mime_headers(&self, headers: &mut Headers, opts: &RenderOptions) {
        self.build_mime_headers(headers, opts, self.base_part);
    }

    fn build_mime_headers(&self, headers: &mut Headers, opts: &RenderOptions, base: bool) {
        if base {
            headers.replace_header("MIME-Version", "1.0");
        }

        let mut type_params = self.type_params.clone();
        let emit_charset = self.primary == "text"
            && self
                .charset()
                .is_some_and(|cs| !cs.eq_ignore_ascii_case("us-ascii"));
        if !emit_charset {
            type_params.remove("charset");
        }
        headers.remove_header("Content-Type");
        headers.add_header_with_params("Content-Type", self.mime_type(), type_params);

        if !self.language.is_empty() {
            headers.replace_header("Content-Language", self.language.join(", "));
        }
        if let Some(description) = &self.description {
            headers.replace_header("Content-Description", description.clone());
        }
        if let Some(duration) = self.duration {
            headers.replace_header("Content-Duration", duration.to_string());
        }

        if self.primary == "message" {
            return;
        }

        let name = self.name();
        if self.disposition != Disposition::None || name.is_some() {
            let mut params = self.disposition_params.clone();
            if let Some(name) = name
                && !params.contains_key("filename")
            {
                params.insert("filename", name);
            }
            if let Some(bytes) = self.bytes {
                params.insert("size", bytes.to_string());
            }
            headers.remove_header("Content-Disposition");
            headers.add_header_with_params(
                "Content-Disposition",
                self.disposition.as_str().unwrap_or("attachment"),
                params,
            );
        }

        let encoding = self.send_transfer_encoding(opts.encode);
        if encoding != TransferEncoding::SevenBit {
            headers.replace_header("Content-Transfer-Encoding", encoding.as_str());
        }

        if let Some(cid) = &self.content_id {
            headers.replace_header("Content-ID", format!("<{cid}>"));
        }
    }

    fn header_options(&self, opts: &RenderOptions) -> HeaderEncodeOptions {
        let charset = self
            .charset()
            .filter(|cs| !cs.eq_ignore_ascii_case("us-ascii"))
            .unwrap_or(opts.charset.as_str());
        HeaderEncodeOptions::new()
            .charset(charset)
            .eol(opts.eol)
            .broken_rfc2231(opts.broken_rfc2231)
    }

    /// Serializes the part (or the part selected by `opts.id`) to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartNotFound`] for an unknown `opts.id`,
    /// [`Error::MissingBoundary`] for a multipart without a boundary, or
    /// an I/O error from the writer.
    pub fn write_to<W: Write>(&self, writer: W, opts: &RenderOptions) -> Result<()> {
        if opts.canonical {
            let mut writer = CrlfWriter {
                inner: writer,
                last: 0,
            };
            self.write_selected(&mut writer, opts)?;
            writer.flush()?;
        } else {
            let mut writer = writer;
            self.write_selected(&mut writer, opts)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Serializes the part to a byte vector.
    ///
    /// # Errors
    ///
    /// See [`Part::write_to`].
    pub fn to_bytes(&self, opts: &RenderOptions) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out, opts)?;
        Ok(out)
    }

    /// Serializes the part with CRLF line endings.
    ///
    /// # Errors
    ///
    /// See [`Part::write_to`].
    pub fn to_canonical_bytes(&self, opts: &RenderOptions) -> Result<Vec<u8>> {
        self.to_bytes(&opts.clone().canonical(true))
    }

    fn write_selected<W: Write>(&self, w: &mut W, opts: &RenderOptions) -> Result<()> {
        let Some(id) = &opts.id else {
            return self.write_entity(w, opts, opts.headers, opts.message_headers.as_ref(), false);
        };

        let path = self
            .find_path(id)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        let target = self
            .node_at(&path)
            .ok_or_else(|| Error::PartNotFound(id.to_string()))?;
        let parent = path
            .split_last()
            .and_then(|(&index, parent_path)| Some((index, self.node_at(parent_path)?)))
            .filter(|(_, parent)| parent.is_multipart());

        match parent {
            Some((index, parent)) => {
                let boundary = parent.boundary().ok_or(Error::MissingBoundary)?;
                let eol = opts.eol.as_str();
                write!(w, "--{boundary}{eol}")?;
                target.write_entity(w, opts, opts.headers, None, false)?;
                if index + 1 == parent.parts.len() {
                    write!(w, "{eol}--{boundary}--")?;
                }
                Ok(())
            }
            None => target.write_entity(w, opts, opts.headers, opts.message_headers.as_ref(), false),
        }
    }

    fn write_entity<W: Write>(
        &self,
        w: &mut W,
        opts: &RenderOptions,
        with_headers: bool,
        extra: Option<&Headers>,
        force_base: bool,
    ) -> Result<()> {
        let eol = opts.eol.as_str();

        if with_headers {
            let mut headers = extra.cloned().unwrap_or_default();
            self.build_mime_headers(&mut headers, opts, force_base || self.base_part);
            w.write_all(headers.to_string_with(&self.header_options(opts)).as_bytes())?;
            w.write_all(eol.as_bytes())?;
        }

        if self.primary == "message" {
            if !self.contents.is_empty() {
                self.contents.write_to(&mut *w)?;
            } else if let Some(child) = self.parts.first() {
                child.write_entity(w, opts, true, None, true)?;
            }
            return Ok(());
        }

        if !self.contents.is_empty() {
            let encoding = if self.is_multipart() {
                TransferEncoding::SevenBit
            } else {
                self.send_transfer_encoding(opts.encode)
            };
            w.write_all(&encode_body(self.contents.as_slice(), encoding, opts.eol))?;
        }

        if self.is_multipart() {
            let boundary = self.boundary().ok_or(Error::MissingBoundary)?;
            if self.contents.is_empty() {
                write!(w, "{MIME_PREAMBLE}{eol}")?;
            }
            for child in &self.parts {
                write!(w, "{eol}--{boundary}{eol}")?;
                child.write_entity(w, opts, true, None, false)?;
            }
            write!(w, "{eol}--{boundary}--")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect
)]
mod tests {
    use super::*;
    use crate::config::MimeConfig;

    fn text(body: &str) -> Part {
        let mut part = Part::with_type("text/plain");
        part.set_contents(body, TransferEncoding::Binary);
        part
    }

    fn render(part: &Part, opts: &RenderOptions) -> String {
        String::from_utf8(part.to_bytes(opts).unwrap()).unwrap()
    }

    fn mixed(children: Vec<Part>) -> Part {
        let mut root = Part::with_type("multipart/mixed");
        root.set_content_type_parameter("boundary", "XYZ");
        for child in children {
            root.add_part(child);
        }
        root.build_mime_ids();
        root
    }

    #[test]
    fn test_simple_text_part() {
        let mut part = text("Hello");
        part.set_base_part(true);
        assert_eq!(
            render(&part, &RenderOptions::new()),
            "MIME-Version: 1.0\nContent-Type: text/plain\n\nHello"
        );
        assert_eq!(render(&part, &RenderOptions::new().headers(false)), "Hello");
    }

    #[test]
    fn test_8bit_text_uses_quoted_printable() {
        let mut part = text("café");
        part.set_charset("UTF-8");
        assert_eq!(
            render(&part, &RenderOptions::new()),
            "Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: quoted-printable\n\ncaf=C3=A9"
        );
        let eight = render(&part, &RenderOptions::new().encode(EncodeMask::EIGHT_BIT));
        assert!(eight.contains("Content-Transfer-Encoding: 8bit\n"));
        assert!(eight.ends_with("\n\ncafé"));
    }

    #[test]
    fn test_us_ascii_charset_omitted() {
        let mut part = text("x");
        part.set_charset("us-ascii");
        assert_eq!(render(&part, &RenderOptions::new()), "Content-Type: text/plain\n\nx");
    }

    #[test]
    fn test_multipart_layout() {
        let root = mixed(vec![text("A"), text("B")]);
        assert_eq!(
            render(&root, &RenderOptions::new()),
            "Content-Type: multipart/mixed; boundary=XYZ\n\
             \n\
             This message is in MIME format.\n\
             \n--XYZ\nContent-Type: text/plain\n\nA\
             \n--XYZ\nContent-Type: text/plain\n\nB\
             \n--XYZ--"
        );
    }

    #[test]
    fn test_render_single_id() {
        let root = mixed(vec![text("A"), text("B")]);
        let first = render(&root, &RenderOptions::new().id("1".parse().unwrap()));
        assert_eq!(first, "--XYZ\nContent-Type: text/plain\n\nA");
        let last = render(&root, &RenderOptions::new().id("2".parse().unwrap()));
        assert_eq!(last, "--XYZ\nContent-Type: text/plain\n\nB\n--XYZ--");
        assert!(matches!(
            root.to_bytes(&RenderOptions::new().id("7".parse().unwrap())),
            Err(Error::PartNotFound(_))
        ));
    }

    #[test]
    fn test_canonical_crlf() {
        let root = mixed(vec![text("line one\nline two\r\n"), text("B")]);
        let bytes = root.to_canonical_bytes(&RenderOptions::new()).unwrap();
        let mut prev = 0u8;
        for &b in &bytes {
            if b == b'\n' {
                assert_eq!(prev, b'\r');
            }
            prev = b;
        }
        assert!(String::from_utf8(bytes).unwrap().contains("line one\r\nline two\r\n"));
    }

    #[test]
    fn test_attachment_headers() {
        let mut part = Part::with_type("application/pdf");
        part.set_name("report.pdf");
        part.set_bytes(1234);
        part.set_contents(b"%PDF".to_vec(), TransferEncoding::Binary);
        part.set_content_id("<abc@example.com>");
        let out = render(&part, &RenderOptions::new());
        assert_eq!(
            out,
            "Content-Type: application/pdf; name=report.pdf\n\
             Content-Disposition: attachment; filename=report.pdf; size=1234\n\
             Content-Transfer-Encoding: base64\n\
             Content-ID: <abc@example.com>\n\
             \n\
             JVBERg=="
        );
    }

    #[test]
    fn test_inline_without_name() {
        let mut part = text("x");
        part.set_disposition(Disposition::Inline);
        part.set_description("Résumé");
        part.set_language(["en", "fr"]);
        let out = render(&part, &RenderOptions::new());
        assert_eq!(
            out,
            "Content-Type: text/plain\n\
             Content-Language: en, fr\n\
             Content-Description: =?utf-8?b?UsOpc3Vtw6k=?=\n\
             Content-Disposition: inline\n\nx"
        );
    }

    #[test]
    fn test_nul_forces_binary_or_base64() {
        let mut part = text("a\0b");
        assert_eq!(part.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::Base64);
        assert_eq!(
            part.send_transfer_encoding(EncodeMask::SEVEN_BIT | EncodeMask::BINARY),
            TransferEncoding::Binary
        );
        part.set_type("image/png");
        assert_eq!(part.send_transfer_encoding(EncodeMask::EIGHT_BIT), TransferEncoding::Base64);
    }

    #[test]
    fn test_multipart_declares_strongest_child_encoding() {
        let mut root = mixed(vec![text("plain"), text("caf\u{e9}")]);
        assert_eq!(root.send_transfer_encoding(EncodeMask::SEVEN_BIT), TransferEncoding::SevenBit);
        assert_eq!(root.send_transfer_encoding(EncodeMask::EIGHT_BIT), TransferEncoding::EightBit);
        root.add_part(text("x\0"));
        assert_eq!(
            root.send_transfer_encoding(EncodeMask::EIGHT_BIT | EncodeMask::BINARY),
            TransferEncoding::Binary
        );
        let out = render(&root, &RenderOptions::new().encode(EncodeMask::EIGHT_BIT));
        assert!(out.starts_with("Content-Type: multipart/mixed; boundary=XYZ\nContent-Transfer-Encoding: 8bit\n"));
    }

    #[test]
    fn test_message_rfc822_renders_child_as_message() {
        let mut message = Part::with_type("message/rfc822");
        message.add_part(text("Inner"));
        assert_eq!(
            render(&message, &RenderOptions::new()),
            "Content-Type: message/rfc822\n\nMIME-Version: 1.0\nContent-Type: text/plain\n\nInner"
        );

        message.set_contents("Subject: raw\n\nRaw body", TransferEncoding::SevenBit);
        assert_eq!(
            render(&message, &RenderOptions::new()),
            "Content-Type: message/rfc822\n\nSubject: raw\n\nRaw body"
        );
    }

    #[test]
    fn test_message_headers_come_first() {
        let mut headers = Headers::new();
        headers.add_header("Subject", "Hi");
        let mut part = text("x");
        part.set_base_part(true);
        let out = render(&part, &RenderOptions::new().message_headers(headers));
        assert_eq!(out, "Subject: Hi\nMIME-Version: 1.0\nContent-Type: text/plain\n\nx");
    }

    #[test]
    fn test_config_render_options() {
        let config = MimeConfig::builder().eol(Eol::Crlf).build();
        let out = render(&text("x"), &config.render_options());
        assert_eq!(out, "Content-Type: text/plain\r\n\r\nx");
    }
}
