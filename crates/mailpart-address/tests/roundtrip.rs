//! Write-then-parse tests for the address writer.

use mailpart_address::{Address, AddressEntry, ParseOptions, parse_address_list, write_address};
use proptest::prelude::*;

fn parse_one(text: &str) -> mailpart_address::Address {
    let list = parse_address_list(text, &ParseOptions::new()).unwrap();
    assert_eq!(list.len(), 1, "{text}");
    match list.into_iter().next().unwrap() {
        AddressEntry::Mailbox(addr) => addr,
        AddressEntry::Group(_) => panic!("Expected mailbox"),
    }
}

#[test]
fn test_quoted_local_part_survives() {
    let text = write_address("john doe", Some("example.com"), Some("John"));
    let addr = parse_one(&text);
    assert_eq!(addr.mailbox, "john doe");
    assert_eq!(addr.personal.as_deref(), Some("John"));
}

#[test]
fn test_display_quotes_personal_with_specials() {
    let addr = Address::new("jane", "example.com").with_personal("Doe, Jane");
    assert_eq!(addr.to_string(), "\"Doe, Jane\" <jane@example.com>");
    assert_eq!(parse_one(&addr.to_string()), addr);
}

proptest! {
    #[test]
    fn personal_names_survive(
        personal in "[A-Za-z][A-Za-z ,.;:@()<>\"\\\\]{0,30}[A-Za-z]",
        local in "[a-z][a-z0-9._+-]{0,15}[a-z0-9]",
    ) {
        prop_assume!(!local.contains(".."));
        // Unquoted phrases collapse runs of whitespace.
        prop_assume!(!personal.contains("  "));
        let text = write_address(&local, Some("example.com"), Some(&personal));
        let addr = parse_one(&text);
        prop_assert_eq!(addr.mailbox, local);
        prop_assert_eq!(addr.host.as_deref(), Some("example.com"));
        prop_assert_eq!(addr.personal.as_deref(), Some(personal.trim()));
    }
}
