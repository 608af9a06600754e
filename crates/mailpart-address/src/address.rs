//! Address types and the address writer.

use std::fmt;

/// A single mailbox (`personal <mailbox@host>`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Local part, unquoted.
    pub mailbox: String,
    /// Domain, if any.
    pub host: Option<String>,
    /// Display name, unquoted.
    pub personal: Option<String>,
}

impl Address {
    /// Creates an address from a local part and a host.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            host: Some(host.into()),
            personal: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_personal(mut self, personal: impl Into<String>) -> Self {
        self.personal = Some(personal.into());
        self
    }

    /// Returns the bare `mailbox@host` form.
    #[must_use]
    pub fn bare_address(&self) -> String {
        write_address(&self.mailbox, self.host.as_deref(), None)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write_address(
            &self.mailbox,
            self.host.as_deref(),
            self.personal.as_deref(),
        ))
    }
}

/// A named group of mailboxes (`name: a@b, c@d;`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    /// Group display name.
    pub name: String,
    /// Group members.
    pub addresses: Vec<Address>,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write_group(&self.name, &self.addresses))
    }
}

/// One element of an address list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressEntry {
    /// A single mailbox.
    Mailbox(Address),
    /// A group of mailboxes.
    Group(Group),
}

impl AddressEntry {
    /// Returns every mailbox in this entry, flattening groups.
    #[must_use]
    pub fn mailboxes(&self) -> Vec<&Address> {
        match self {
            Self::Mailbox(addr) => vec![addr],
            Self::Group(group) => group.addresses.iter().collect(),
        }
    }
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mailbox(addr) => addr.fmt(f),
            Self::Group(group) => group.fmt(f),
        }
    }
}

/// RFC 2822 `specials`; a phrase containing any of these must be quoted.
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// Checks if a character may appear in an unquoted `dot-atom` local part.
pub(crate) fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c) || !c.is_ascii()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn needs_local_quoting(mailbox: &str) -> bool {
    mailbox.is_empty()
        || mailbox.starts_with('.')
        || mailbox.ends_with('.')
        || mailbox.contains("..")
        || !mailbox.chars().all(|c| c == '.' || is_atext(c))
}

/// Writes a mailbox as wire text.
///
/// The local part is quoted when it is not a valid `dot-atom`; the
/// personal name is quoted when it contains RFC 2822 specials. Encoding
/// non-ASCII personal names (RFC 2047) is the caller's concern.
#[must_use]
pub fn write_address(mailbox: &str, host: Option<&str>, personal: Option<&str>) -> String {
    let mut addr = if needs_local_quoting(mailbox) {
        quote(mailbox)
    } else {
        mailbox.to_string()
    };
    if let Some(host) = host.filter(|h| !h.is_empty()) {
        addr.push('@');
        addr.push_str(host);
    }

    match personal.map(str::trim).filter(|p| !p.is_empty()) {
        Some(personal) => {
            let personal = if personal.contains(SPECIALS) {
                quote(personal)
            } else {
                personal.to_string()
            };
            format!("{personal} <{addr}>")
        }
        None => addr,
    }
}

/// Writes a group as wire text (`name: a@b, c@d;`).
#[must_use]
pub fn write_group(name: &str, addresses: &[Address]) -> String {
    let name = if name.contains(SPECIALS) {
        quote(name)
    } else {
        name.to_string()
    };
    let members: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    if members.is_empty() {
        format!("{name}:;")
    } else {
        format!("{name}: {};", members.join(", "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    #[test]
    fn test_write_bare_address() {
        assert_eq!(
            write_address("user", Some("example.com"), None),
            "user@example.com"
        );
    }

    #[test]
    fn test_write_personal() {
        assert_eq!(
            write_address("user", Some("example.com"), Some("Jane Doe")),
            "Jane Doe <user@example.com>"
        );
    }

    #[test]
    fn test_write_personal_with_specials() {
        assert_eq!(
            write_address("user", Some("example.com"), Some("Doe, Jane")),
            "\"Doe, Jane\" <user@example.com>"
        );
        assert_eq!(
            write_address("user", Some("example.com"), Some("Jane \"JD\" Doe")),
            "\"Jane \\\"JD\\\" Doe\" <user@example.com>"
        );
    }

    #[test]
    fn test_write_encoded_word_personal_is_not_quoted() {
        assert_eq!(
            write_address("a", Some("b.c"), Some("=?utf-8?b?w6k=?=")),
            "=?utf-8?b?w6k=?= <a@b.c>"
        );
    }

    #[test]
    fn test_write_quoted_local_part() {
        assert_eq!(
            write_address("john doe", Some("example.com"), None),
            "\"john doe\"@example.com"
        );
    }

    #[test]
    fn test_write_group() {
        let members = vec![Address::new("a", "example.com"), Address::new("b", "example.com")];
        assert_eq!(
            write_group("Team", &members),
            "Team: a@example.com, b@example.com;"
        );
        assert_eq!(write_group("Undisclosed recipients", &[]), "Undisclosed recipients:;");
    }

    #[test]
    fn test_entry_mailboxes() {
        let entry = AddressEntry::Group(Group {
            name: "g".to_string(),
            addresses: vec![Address::new("a", "x.y"), Address::new("b", "x.y")],
        });
        assert_eq!(entry.mailboxes().len(), 2);
    }
}
