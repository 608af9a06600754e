//! Caller-held configuration shared by parsing and serialization.

use crate::encoding::Eol;
use crate::header::HeaderEncodeOptions;
use crate::parser::ParseOptions;
use crate::part::{EncodeMask, RenderOptions};

/// Default nesting depth descended by the structural parser.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// MIME configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MimeConfig {
    /// Charset assumed for 8-bit header bytes that are not valid UTF-8.
    pub default_charset: String,
    /// Right-hand side of generated Content-ID and Message-ID values.
    pub hostname: String,
    /// EOL used by non-canonical serialization.
    pub eol: Eol,
    /// Emit RFC 2047 duplicates of RFC 2231 parameters for broken clients.
    pub broken_rfc2231: bool,
    /// Maximum MIME nesting depth descended by the parser.
    pub max_depth: usize,
    /// Transfer encodings allowed when serializing.
    pub encode_mask: EncodeMask,
}

impl Default for MimeConfig {
    fn default() -> Self {
        Self {
            default_charset: "us-ascii".to_string(),
            hostname: "localhost".to_string(),
            eol: Eol::Lf,
            broken_rfc2231: false,
            max_depth: DEFAULT_MAX_DEPTH,
            encode_mask: EncodeMask::SEVEN_BIT,
        }
    }
}

impl MimeConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> MimeConfigBuilder {
        MimeConfigBuilder::new()
    }

    /// Creates the default configuration, overriding `hostname` from
    /// `HOSTNAME` and `default_charset` from `MAILPART_DEFAULT_CHARSET`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("HOSTNAME")
            && !host.trim().is_empty()
        {
            config.hostname = host.trim().to_string();
        }
        if let Ok(charset) = std::env::var("MAILPART_DEFAULT_CHARSET")
            && !charset.trim().is_empty()
        {
            config.default_charset = charset.trim().to_ascii_lowercase();
        }
        config
    }

    /// Serialization options derived from this configuration.
    #[must_use]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::new()
            .eol(self.eol)
            .encode(self.encode_mask)
            .broken_rfc2231(self.broken_rfc2231)
    }

    /// Structural parser options derived from this configuration.
    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::new()
            .max_depth(self.max_depth)
            .default_charset(self.default_charset.clone())
    }

    /// Header serialization options derived from this configuration.
    #[must_use]
    pub fn header_options(&self) -> HeaderEncodeOptions {
        HeaderEncodeOptions::new()
            .eol(self.eol)
            .default_domain(self.hostname.clone())
            .broken_rfc2231(self.broken_rfc2231)
    }
}

/// Builder for [`MimeConfig`].
#[derive(Debug, Clone, Default)]
pub struct MimeConfigBuilder {
    config: MimeConfig,
}

impl MimeConfigBuilder {
    /// Creates a builder holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default header charset.
    #[must_use]
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.config.default_charset = charset.into().to_ascii_lowercase();
        self
    }

    /// Sets the hostname used in generated identifiers.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = hostname.into();
        self
    }

    /// Sets the serialization EOL.
    #[must_use]
    pub const fn eol(mut self, eol: Eol) -> Self {
        self.config.eol = eol;
        self
    }

    /// Enables RFC 2047 duplicates of RFC 2231 parameters.
    #[must_use]
    pub const fn broken_rfc2231(mut self, enabled: bool) -> Self {
        self.config.broken_rfc2231 = enabled;
        self
    }

    /// Sets the maximum parser nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Sets the allowed transfer encodings.
    #[must_use]
    pub const fn encode_mask(mut self, mask: EncodeMask) -> Self {
        self.config.encode_mask = mask;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> MimeConfig {
        self.config
    }
}
