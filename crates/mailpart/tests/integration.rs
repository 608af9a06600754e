//! Integration tests for parsing, editing and serializing messages.

use mailpart::{
    ContentParam, Disposition, EncodeMask, Eol, Headers, MimeConfig, MimeId, ParseOptions, Part,
    RawPart, RenderOptions, TransferEncoding, get_raw_part_text, parse_message, parse_structure,
};

fn id(s: &str) -> MimeId {
    s.parse().unwrap()
}

fn render(part: &Part, opts: &RenderOptions) -> String {
    String::from_utf8(part.to_bytes(opts).unwrap()).unwrap()
}

const MIXED: &[u8] = b"MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"X\"\r\n\
\r\n\
--X\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--X\r\n\
Content-Type: text/plain\r\n\
\r\n\
second\r\n\
--X--\r\n";

const FORWARD: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Fwd: report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=outer\r\n\
\r\n\
--outer\r\n\
Content-Type: text/plain; charset=us-ascii\r\n\
\r\n\
See below.\r\n\
--outer\r\n\
Content-Type: message/rfc822\r\n\
Content-Disposition: inline\r\n\
\r\n\
From: Carol <carol@example.com>\r\n\
Subject: report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: 8bit\r\n\
\r\n\
Gr\xc3\xbc\xc3\x9fe\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hi</p>\r\n\
--inner--\r\n\
--outer--\r\n";

#[test]
fn test_multipart_mixed_two_children() {
    let part = parse_message(MIXED, &ParseOptions::new()).unwrap();
    assert_eq!(part.primary_type(), "multipart");
    assert_eq!(part.parts().len(), 2);
    let child_ids: Vec<String> = part
        .parts()
        .iter()
        .map(|p| p.mime_id().unwrap().to_string())
        .collect();
    assert_eq!(child_ids, ["1", "2"]);
    assert_eq!(part.get_part(&id("1")).unwrap().contents(), b"first");
    assert_eq!(part.get_part(&id("2")).unwrap().contents(), b"second");
}

#[test]
fn test_descend_into_embedded_message() {
    let part = parse_message(FORWARD, &ParseOptions::new()).unwrap();
    let envelope = part.get_part(&id("2")).unwrap();
    assert_eq!(envelope.mime_type(), "message/rfc822");
    assert_eq!(envelope.disposition(), Disposition::Inline);

    let body = part.get_part(&id("2.0")).unwrap();
    assert_eq!(body.mime_type(), "multipart/alternative");

    let plain = part.get_part(&id("2.1")).unwrap();
    assert_eq!(plain.contents(), "Grüße".as_bytes());
    assert_eq!(plain.transfer_encoding(), TransferEncoding::EightBit);
    assert_eq!(part.get_part(&id("2.2")).unwrap().mime_type(), "text/html");

    assert_eq!(
        part.find_body(Some("html")).unwrap().mime_id(),
        Some(&id("2.2"))
    );
}

#[test]
fn test_raw_text_of_embedded_message() {
    let header = get_raw_part_text(FORWARD, RawPart::Header, &id("2.0")).unwrap();
    assert!(header.starts_with(b"From: Carol <carol@example.com>\r\n"));
    assert!(header.ends_with(b"boundary=inner"));

    let html = get_raw_part_text(FORWARD, RawPart::Body, &id("2.2")).unwrap();
    assert_eq!(html, b"<p>Hi</p>");

    let structure = parse_structure(FORWARD, &ParseOptions::new()).unwrap();
    assert_eq!(structure.find(&id("2.1")).unwrap().size, 7);
}

#[test]
fn test_content_param_rfc2231_charset() {
    let cp = ContentParam::decode("text/plain; charset*=utf-8''caf%C3%A9");
    assert_eq!(cp.value, "text/plain");
    assert_eq!(cp.params.get("charset"), Some("café"));
}

#[test]
fn test_edit_inside_embedded_message() {
    let mut part = parse_message(FORWARD, &ParseOptions::new()).unwrap();
    let untouched = render(&part, &RenderOptions::new().encode(EncodeMask::EIGHT_BIT));
    assert!(untouched.contains("From: Carol <carol@example.com>"));

    let mut note = Part::with_type("text/plain");
    note.set_contents("replaced", TransferEncoding::SevenBit);
    part.alter_part(&id("2.2"), note).unwrap();

    let edited = render(&part, &RenderOptions::new().encode(EncodeMask::EIGHT_BIT));
    assert!(!edited.contains("<p>Hi</p>"));
    assert!(edited.contains("\n\nreplaced\n"));

    let reparsed = parse_message(edited.as_bytes(), &ParseOptions::new()).unwrap();
    assert_eq!(reparsed.get_part(&id("2.2")).unwrap().contents(), b"replaced");
    assert_eq!(reparsed.get_part(&id("2.1")).unwrap().contents(), "Grüße".as_bytes());
}

#[test]
fn test_remove_part_then_render() {
    let mut part = parse_message(MIXED, &ParseOptions::new()).unwrap();
    part.remove_part(&id("1")).unwrap();
    part.ensure_mime_ids();
    assert_eq!(part.get_part(&id("1")).unwrap().contents(), b"second");

    let out = part.to_canonical_bytes(&RenderOptions::new()).unwrap();
    let reparsed = parse_message(&out, &ParseOptions::new()).unwrap();
    assert_eq!(reparsed.parts().len(), 1);
}

#[test]
fn test_nul_contents_never_7bit() {
    let mut part = Part::with_type("text/plain");
    part.set_contents(b"before\0after".to_vec(), TransferEncoding::Binary);

    let seven = render(&part, &RenderOptions::new());
    assert!(seven.contains("Content-Transfer-Encoding: base64\n"));

    let mut out = Vec::new();
    part.write_to(&mut out, &RenderOptions::new().encode(EncodeMask::BINARY))
        .unwrap();
    assert!(out.windows(31).any(|w| w == b"Content-Transfer-Encoding: bina"));
    assert!(out.ends_with(b"before\0after"));
}

#[test]
fn test_long_line_quoted_printable() {
    let mut part = Part::with_type("text/plain");
    part.set_contents("x".repeat(1000), TransferEncoding::Binary);
    let out = render(&part, &RenderOptions::new());
    assert!(out.contains("Content-Transfer-Encoding: quoted-printable\n"));
    assert!(out.lines().all(|line| line.len() <= 76));
}

#[test]
fn test_compose_with_message_headers() {
    let config = MimeConfig::builder()
        .hostname("mail.example.com")
        .eol(Eol::Crlf)
        .build();

    let mut headers = Headers::new();
    headers.add_header("From", "Empfänger <sender@example.com>");
    headers.add_header("To", "a@example.com");
    headers.add_header("To", "b@example.com");
    headers.add_header("Subject", "Grüße");
    let message_id = headers.add_message_id_header(&config.hostname);
    assert!(message_id.ends_with("@mail.example.com>"));

    let mut body = Part::with_type("text/plain");
    body.set_charset("utf-8");
    body.set_contents("Hallo Welt", TransferEncoding::Binary);
    let mut image = Part::with_type("image/png");
    image.set_contents(vec![0x89, b'P', b'N', b'G'], TransferEncoding::Binary);
    let cid = image.ensure_content_id(&config).to_string();

    let mut root = Part::with_type("multipart/related");
    root.set_base_part(true);
    root.add_part(body);
    root.add_part(image);
    root.build_mime_ids();

    let wire = root
        .to_bytes(&config.render_options().message_headers(headers))
        .unwrap();
    let text = String::from_utf8(wire.clone()).unwrap();
    assert!(text.starts_with("From: =?utf-8?b?RW1wZsOkbmdlcg==?= <sender@example.com>\r\n"));
    assert!(text.contains("To: a@example.com\r\nTo: b@example.com\r\n"));
    assert!(text.contains("Subject: =?utf-8?b?R3LDvMOfZQ==?=\r\n"));
    assert!(text.contains(&format!("Content-ID: <{cid}>\r\n")));

    let parsed = parse_message(&wire, &config.parse_options()).unwrap();
    assert_eq!(parsed.mime_type(), "multipart/related");
    assert_eq!(parsed.get_part(&id("2")).unwrap().contents(), &[0x89, b'P', b'N', b'G']);
    assert_eq!(parsed.get_part(&id("2")).unwrap().content_id(), Some(cid.as_str()));
}

#[test]
fn test_non_mime_message_kept_verbatim() {
    let raw = b"Subject: old\n\nplain =?not-encoded?= body\n";
    let part = parse_message(raw, &ParseOptions::new()).unwrap();
    assert_eq!(part.mime_type(), "text/plain");
    assert_eq!(part.contents(), b"plain =?not-encoded?= body\n");
    assert_eq!(part.mime_id(), Some(&id("1")));
}
