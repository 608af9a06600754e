//! Address-list tokenizer and parser (RFC 2822 section 3.4).
//!
//! The parser is lenient by default: stray characters are skipped, a
//! missing `>` or `;` is tolerated at end of input, and a bare local part
//! picks up the default domain. With [`ParseOptions::validate`] set, those
//! situations become errors instead.

use crate::address::{Address, AddressEntry, Group, is_atext};
use crate::error::{Error, Result};

/// Options for [`parse_address_list`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Domain appended to addresses that have no `@host`.
    pub default_domain: Option<String>,
    /// Keep groups as [`AddressEntry::Group`]; otherwise members are flattened.
    pub nest_groups: bool,
    /// Reject malformed input instead of skipping over it.
    pub validate: bool,
}

impl ParseOptions {
    /// Creates lenient options with no default domain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default domain.
    #[must_use]
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = Some(domain.into());
        self
    }

    /// Keeps groups nested.
    #[must_use]
    pub const fn nest_groups(mut self, nest: bool) -> Self {
        self.nest_groups = nest;
        self
    }

    /// Enables strict validation.
    #[must_use]
    pub const fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Comment(String),
    Literal(String),
    Special(char),
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    validate: bool,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str, validate: bool) -> Self {
        Self {
            input,
            pos: 0,
            validate,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '"' => {
                    let s = self.read_delimited('"', '"', false)?;
                    tokens.push((start, Token::Quoted(s)));
                }
                '(' => {
                    let s = self.read_delimited('(', ')', true)?;
                    tokens.push((start, Token::Comment(s)));
                }
                '[' => {
                    let s = self.read_delimited('[', ']', false)?;
                    tokens.push((start, Token::Literal(s)));
                }
                '<' | '>' | '@' | ',' | ':' | ';' => {
                    self.advance();
                    tokens.push((start, Token::Special(c)));
                }
                _ if c == '.' || is_atext(c) => {
                    let mut word = String::new();
                    while let Some(c) = self.peek() {
                        if c == '.' || is_atext(c) {
                            word.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    tokens.push((start, Token::Word(word)));
                }
                _ => {
                    if self.validate {
                        return Err(Error::UnexpectedChar { ch: c, pos: start });
                    }
                    self.advance();
                }
            }
        }
        Ok(tokens)
    }

    /// Reads a quoted string, comment or domain literal. Comments nest.
    fn read_delimited(&mut self, open: char, close: char, nests: bool) -> Result<String> {
        self.advance();
        let mut depth = 1usize;
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some(c) => out.push(c),
                    None => return self.unterminated(out),
                },
                Some(c) if nests && c == open => {
                    depth += 1;
                    out.push(c);
                }
                Some(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(c);
                }
                Some('\r' | '\n') if open == '"' => {}
                Some(c) => out.push(c),
                None => return self.unterminated(out),
            }
        }
    }

    fn unterminated(&self, partial: String) -> Result<String> {
        if self.validate {
            Err(Error::UnexpectedEnd)
        } else {
            Ok(partial)
        }
    }
}

struct Parser<'o> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    opts: &'o ParseOptions,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(usize::MAX, |(p, _)| *p)
    }

    fn unexpected(&self, ch: char) -> Error {
        Error::UnexpectedChar {
            ch,
            pos: self.offset(),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<AddressEntry>> {
        let mut out = Vec::new();
        while self.peek().is_some() {
            if let Some(entry) = self.parse_entry(true)? {
                out.push(entry);
            }
            match self.peek() {
                Some(Token::Special(',')) => {
                    self.pos += 1;
                }
                Some(Token::Special(c)) => {
                    if self.opts.validate {
                        return Err(self.unexpected(*c));
                    }
                    self.pos += 1;
                }
                // A word right after an entry starts the next one.
                Some(_) | None => {}
            }
        }
        Ok(out)
    }

    /// Parses one mailbox or (when `allow_group`) one group.
    fn parse_entry(&mut self, allow_group: bool) -> Result<Option<AddressEntry>> {
        let mut words: Vec<String> = Vec::new();
        let mut comment: Option<String> = None;

        loop {
            match self.peek().cloned() {
                Some(Token::Word(w) | Token::Quoted(w)) => {
                    words.push(w);
                    self.pos += 1;
                }
                Some(Token::Comment(c)) => {
                    comment.get_or_insert(c);
                    self.pos += 1;
                }
                Some(Token::Special('<')) => {
                    self.pos += 1;
                    let personal = (!words.is_empty()).then(|| words.join(" "));
                    let mut addr = self.parse_angle_addr()?;
                    addr.personal = personal.or_else(|| self.trailing_comment());
                    return Ok(Some(AddressEntry::Mailbox(addr)));
                }
                Some(Token::Special(':')) if allow_group => {
                    self.pos += 1;
                    return self.parse_group(words.join(" ")).map(Some);
                }
                Some(Token::Special('@')) => {
                    self.pos += 1;
                    let local = words.concat();
                    let host = self.parse_domain()?;
                    let mut addr = self.finish_addr_spec(local, Some(host))?;
                    addr.personal = comment.or_else(|| self.trailing_comment());
                    return Ok(Some(AddressEntry::Mailbox(addr)));
                }
                Some(Token::Special(',' | ';')) | None => {
                    if words.is_empty() {
                        return Ok(None);
                    }
                    let local = words.concat();
                    let addr = self.finish_addr_spec(local, None)?;
                    return Ok(Some(AddressEntry::Mailbox(Address {
                        personal: comment,
                        ..addr
                    })));
                }
                Some(Token::Special(c)) => {
                    if self.opts.validate {
                        return Err(self.unexpected(c));
                    }
                    self.pos += 1;
                }
                Some(Token::Literal(_)) => {
                    if self.opts.validate {
                        return Err(self.unexpected('['));
                    }
                    self.pos += 1;
                }
            }
        }
    }

    fn trailing_comment(&mut self) -> Option<String> {
        let mut found = None;
        while let Some(Token::Comment(c)) = self.peek().cloned() {
            found.get_or_insert(c);
            self.pos += 1;
        }
        found.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
    }

    fn parse_angle_addr(&mut self) -> Result<Address> {
        let mut local = String::new();
        let mut host = None;
        loop {
            match self.next() {
                Some(Token::Word(w) | Token::Quoted(w)) => {
                    // Obsolete route syntax: "<@a,@b:user@host>".
                    local.push_str(&w);
                }
                Some(Token::Special('@')) => {
                    if local.is_empty() {
                        self.skip_route();
                        continue;
                    }
                    host = Some(self.parse_domain()?);
                }
                Some(Token::Special('>')) => break,
                Some(Token::Comment(_)) => {}
                None => {
                    if self.opts.validate {
                        return Err(Error::UnexpectedEnd);
                    }
                    break;
                }
                Some(Token::Special(c)) => {
                    if self.opts.validate {
                        self.pos -= 1;
                        return Err(self.unexpected(c));
                    }
                }
                Some(Token::Literal(_)) => {
                    if self.opts.validate {
                        self.pos -= 1;
                        return Err(self.unexpected('['));
                    }
                }
            }
        }
        self.finish_addr_spec(local, host)
    }

    fn skip_route(&mut self) {
        while let Some(tok) = self.next() {
            if tok == Token::Special(':') {
                return;
            }
        }
    }

    fn parse_domain(&mut self) -> Result<String> {
        let mut domain = String::new();
        while let Some(tok) = self.peek() {
            match tok {
                Token::Word(w) => domain.push_str(w),
                Token::Literal(l) => {
                    domain.push('[');
                    domain.push_str(l);
                    domain.push(']');
                }
                Token::Comment(_) if domain.is_empty() => {}
                _ => break,
            }
            self.pos += 1;
        }
        if domain.is_empty() && self.opts.validate {
            return Err(Error::InvalidDomain(domain));
        }
        Ok(domain)
    }

    fn finish_addr_spec(&self, mailbox: String, host: Option<String>) -> Result<Address> {
        let host = host
            .filter(|h| !h.is_empty())
            .or_else(|| self.opts.default_domain.clone());
        if self.opts.validate {
            validate_mailbox(&mailbox)?;
            if let Some(host) = &host {
                validate_domain(host)?;
            }
        }
        Ok(Address {
            mailbox,
            host,
            personal: None,
        })
    }

    fn parse_group(&mut self, name: String) -> Result<AddressEntry> {
        let mut addresses = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Special(';')) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Special(',')) => {
                    self.pos += 1;
                }
                None => {
                    if self.opts.validate {
                        return Err(Error::UnexpectedEnd);
                    }
                    break;
                }
                Some(_) => {
                    let before = self.pos;
                    if let Some(AddressEntry::Mailbox(addr)) = self.parse_entry(false)? {
                        addresses.push(addr);
                    }
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
        Ok(AddressEntry::Group(Group { name, addresses }))
    }
}

fn validate_mailbox(mailbox: &str) -> Result<()> {
    if mailbox.is_empty() || mailbox.chars().any(char::is_control) {
        return Err(Error::InvalidMailbox(mailbox.to_string()));
    }
    Ok(())
}

fn validate_domain(domain: &str) -> Result<()> {
    if domain.starts_with('[') && domain.ends_with(']') {
        return Ok(());
    }
    let valid = !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || !c.is_ascii())
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDomain(domain.to_string()))
    }
}

/// Parses an RFC 2822 address list.
///
/// # Errors
///
/// Returns an error only when [`ParseOptions::validate`] is set and the
/// input is malformed.
pub fn parse_address_list(text: &str, opts: &ParseOptions) -> Result<Vec<AddressEntry>> {
    let tokens = Lexer::new(text, opts.validate).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        opts,
    };
    let entries = parser.parse_list()?;
    tracing::trace!(count = entries.len(), "Parsed address list");

    if opts.nest_groups {
        return Ok(entries);
    }
    Ok(entries
        .into_iter()
        .flat_map(|entry| match entry {
            AddressEntry::Mailbox(addr) => vec![AddressEntry::Mailbox(addr)],
            AddressEntry::Group(group) => group
                .addresses
                .into_iter()
                .map(AddressEntry::Mailbox)
                .collect(),
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    fn mailbox(entry: &AddressEntry) -> &Address {
        match entry {
            AddressEntry::Mailbox(addr) => addr,
            AddressEntry::Group(_) => panic!("Expected mailbox"),
        }
    }

    #[test]
    fn test_parse_simple() {
        let list = parse_address_list("user@example.com", &ParseOptions::new()).unwrap();
        assert_eq!(list.len(), 1);
        let addr = mailbox(&list[0]);
        assert_eq!(addr.mailbox, "user");
        assert_eq!(addr.host.as_deref(), Some("example.com"));
        assert_eq!(addr.personal, None);
    }

    #[test]
    fn test_parse_name_addr() {
        let list = parse_address_list(
            "Jane Doe <jane@example.com>, \"Doe, John\" <john@example.com>",
            &ParseOptions::new(),
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(mailbox(&list[0]).personal.as_deref(), Some("Jane Doe"));
        assert_eq!(mailbox(&list[1]).personal.as_deref(), Some("Doe, John"));
        assert_eq!(mailbox(&list[1]).mailbox, "john");
    }

    #[test]
    fn test_parse_comment_personal() {
        let list = parse_address_list("jane@example.com (Jane Doe)", &ParseOptions::new()).unwrap();
        assert_eq!(mailbox(&list[0]).personal.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_parse_default_domain() {
        let opts = ParseOptions::new().default_domain("example.org");
        let list = parse_address_list("postmaster", &opts).unwrap();
        assert_eq!(mailbox(&list[0]).host.as_deref(), Some("example.org"));
    }

    #[test]
    fn test_parse_group_flattened() {
        let list = parse_address_list(
            "Team: a@example.com, b@example.com;, c@example.com",
            &ParseOptions::new(),
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(mailbox(&list[2]).mailbox, "c");
    }

    #[test]
    fn test_parse_group_nested() {
        let opts = ParseOptions::new().nest_groups(true);
        let list = parse_address_list("Team: a@example.com, B <b@example.com>;", &opts).unwrap();
        assert_eq!(list.len(), 1);
        match &list[0] {
            AddressEntry::Group(group) => {
                assert_eq!(group.name, "Team");
                assert_eq!(group.addresses.len(), 2);
                assert_eq!(group.addresses[1].personal.as_deref(), Some("B"));
            }
            AddressEntry::Mailbox(_) => panic!("Expected group"),
        }
    }

    #[test]
    fn test_parse_empty_group() {
        let opts = ParseOptions::new().nest_groups(true);
        let list = parse_address_list("undisclosed-recipients:;", &opts).unwrap();
        assert_eq!(
            list,
            vec![AddressEntry::Group(Group {
                name: "undisclosed-recipients".to_string(),
                addresses: Vec::new(),
            })]
        );
    }

    #[test]
    fn test_parse_encoded_word_personal() {
        let list = parse_address_list(
            "=?utf-8?B?IklsZ2EginVwbGluc2thIg==?= <foo@example.com>",
            &ParseOptions::new(),
        )
        .unwrap();
        assert_eq!(
            mailbox(&list[0]).personal.as_deref(),
            Some("=?utf-8?B?IklsZ2EginVwbGluc2thIg==?=")
        );
    }

    #[test]
    fn test_parse_route() {
        let list = parse_address_list("<@relay.example:user@example.com>", &ParseOptions::new())
            .unwrap();
        assert_eq!(mailbox(&list[0]).mailbox, "user");
        assert_eq!(mailbox(&list[0]).host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_lenient_unterminated() {
        let list = parse_address_list("Jane <jane@example.com", &ParseOptions::new()).unwrap();
        assert_eq!(mailbox(&list[0]).host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_validate_rejects_unterminated() {
        let opts = ParseOptions::new().validate(true);
        assert_eq!(
            parse_address_list("Jane <jane@example.com", &opts),
            Err(Error::UnexpectedEnd)
        );
    }

    #[test]
    fn test_validate_rejects_bad_domain() {
        let opts = ParseOptions::new().validate(true);
        assert!(matches!(
            parse_address_list("jane@-bad-.example", &opts),
            Err(Error::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_address_list("  ", &ParseOptions::new()).unwrap().is_empty());
    }
}
