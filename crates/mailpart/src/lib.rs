//! # mailpart
//!
//! MIME entity model, structural parser and encoder.
//!
//! ## Features
//!
//! - **Entity tree**: [`Part`] with content type, disposition, decoded contents and children
//! - **MIME IDs**: dotted part addressing (`1`, `2.0`, `2.1`) with lookup, removal and replacement
//! - **Parsing**: raw message text to a [`Structure`] of byte ranges, or to a full [`Part`] tree
//! - **Serialization**: transfer encoding chosen from the contents and an [`EncodeMask`]
//! - **Headers**: ordered, case-insensitive [`Headers`] with RFC 2047 and address-list handling
//! - **Parameters**: RFC 2231 [`ContentParam`] decoding and encoding with continuations
//!
//! ## Quick Start
//!
//! ### Parsing
//!
//! ```
//! use mailpart::{MimeId, ParseOptions, parse_message};
//!
//! let raw = b"MIME-Version: 1.0\r\n\
//! Content-Type: multipart/mixed; boundary=X\r\n\
//! \r\n\
//! --X\r\n\
//! Content-Type: text/plain; charset*=utf-8''caf%C3%A9\r\n\
//! \r\n\
//! Hello\r\n\
//! --X--\r\n";
//!
//! let message = parse_message(raw, &ParseOptions::new())?;
//! let body = message.try_part(&"1".parse::<MimeId>()?)?;
//! assert_eq!(body.content_type_parameter("charset"), Some("café"));
//! assert_eq!(body.contents(), b"Hello");
//! # Ok::<(), mailpart::Error>(())
//! ```
//!
//! ### Building
//!
//! ```
//! use mailpart::{Disposition, Part, RenderOptions, TransferEncoding};
//!
//! let mut text = Part::with_type("text/plain");
//! text.set_charset("utf-8");
//! text.set_contents("Grüße", TransferEncoding::Binary);
//!
//! let mut file = Part::with_type("application/pdf");
//! file.set_name("report.pdf");
//! file.set_disposition(Disposition::Attachment);
//! file.set_contents(b"%PDF-1.7".to_vec(), TransferEncoding::Binary);
//!
//! let mut message = Part::with_type("multipart/mixed");
//! message.set_base_part(true);
//! message.add_part(text);
//! message.add_part(file);
//! message.build_mime_ids();
//!
//! let wire = message.to_canonical_bytes(&RenderOptions::new())?;
//! assert!(wire.starts_with(b"MIME-Version: 1.0\r\n"));
//! # Ok::<(), mailpart::Error>(())
//! ```
//!
//! ### Parameters
//!
//! ```
//! use mailpart::{ContentParam, ParamEncodeOptions};
//!
//! let cp = ContentParam::decode("attachment; filename*=utf-8''Factura%20n%C2%BA%2010.pdf");
//! assert_eq!(cp.params.get("filename"), Some("Factura nº 10.pdf"));
//!
//! let encoded = cp.to_header_string(&ParamEncodeOptions::new());
//! assert_eq!(encoded, "attachment; filename*=utf-8''Factura%20n%C2%BA%2010.pdf");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod header;
mod param;
mod part;

pub mod charset;
pub mod encoding;
pub mod parser;

pub use config::{DEFAULT_MAX_DEPTH, MimeConfig, MimeConfigBuilder};
pub use encoding::Eol;
pub use error::{Error, Result};
pub use header::{HeaderEncodeOptions, HeaderKind, HeaderValue, Headers, ValueMode};
pub use param::{ContentParam, ParamEncodeOptions, ParamMap};
pub use parser::{ParseOptions, RawPart, Structure, get_raw_part_text, parse_message, parse_structure};
pub use part::{ByteSource, Disposition, EncodeMask, MimeId, Part, RenderOptions, TransferEncoding};
