//! Decoded part contents.

use bytes::Bytes;
use std::io::{self, Cursor, Read, Write};

/// Storage for a part's decoded contents.
///
/// `Shared` holds caller-provided [`Bytes`] without copying; the first
/// append turns it into an owned buffer.
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// Owned buffer.
    Owned(Vec<u8>),
    /// Shared, reference-counted buffer.
    Shared(Bytes),
}

impl Default for ByteSource {
    fn default() -> Self {
        Self::Owned(Vec::new())
    }
}

impl ByteSource {
    /// Returns the contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v.as_slice(),
            Self::Shared(b) => b.as_ref(),
        }
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if there are no contents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Returns a reader over the contents.
    #[must_use]
    pub fn reader(&self) -> impl Read + '_ {
        Cursor::new(self.as_slice())
    }

    /// Appends data.
    pub fn append(&mut self, data: &[u8]) {
        match self {
            Self::Owned(v) => v.extend_from_slice(data),
            Self::Shared(b) => {
                let mut owned = Vec::with_capacity(b.len() + data.len());
                owned.extend_from_slice(b);
                owned.extend_from_slice(data);
                *self = Self::Owned(owned);
            }
        }
    }

    /// Copies the contents to a writer.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.as_slice())
    }

    /// Converts into [`Bytes`], without copying shared contents.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Owned(v) => Bytes::from(v),
            Self::Shared(b) => b,
        }
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(v: Vec<u8>) -> Self {
        Self::Owned(v)
    }
}

impl From<Bytes> for ByteSource {
    fn from(b: Bytes) -> Self {
        Self::Shared(b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_append_becomes_owned() {
        let mut source = ByteSource::from(Bytes::from_static(b"abc"));
        assert!(matches!(source, ByteSource::Shared(_)));
        source.append(b"def");
        assert!(matches!(source, ByteSource::Owned(_)));
        assert_eq!(source.as_slice(), b"abcdef");
    }

    #[test]
    fn test_reader_and_writer() {
        let source = ByteSource::from(b"hello".to_vec());
        let mut read = String::new();
        source.reader().read_to_string(&mut read).unwrap();
        assert_eq!(read, "hello");

        let mut out = Vec::new();
        source.write_to(&mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(source.into_bytes(), Bytes::from_static(b"hello"));
    }
}
