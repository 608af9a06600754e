//! # mailpart-address
//!
//! RFC 2822 address-list parsing and formatting, used by `mailpart` when
//! reading and writing address header fields (`From`, `To`, `Cc`, ...).
//!
//! ## Quick Start
//!
//! ```
//! use mailpart_address::{AddressEntry, ParseOptions, parse_address_list, write_address};
//!
//! let list = parse_address_list(
//!     "Jane Doe <jane@example.com>, team: a@example.com, b@example.com;",
//!     &ParseOptions::new().nest_groups(true),
//! )?;
//! assert_eq!(list.len(), 2);
//!
//! if let AddressEntry::Mailbox(addr) = &list[0] {
//!     assert_eq!(addr.personal.as_deref(), Some("Jane Doe"));
//! }
//!
//! assert_eq!(
//!     write_address("jane", Some("example.com"), Some("Doe, Jane")),
//!     "\"Doe, Jane\" <jane@example.com>"
//! );
//! # Ok::<(), mailpart_address::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod error;
mod parser;

pub use address::{Address, AddressEntry, Group, write_address, write_group};
pub use error::{Error, Result};
pub use parser::{ParseOptions, parse_address_list};
