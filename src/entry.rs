use std::borrow::Cow;
use std::fmt;

use crate::zip::{CompressionMethod, DOS_EPOCH_DATE, DOS_EPOCH_TIME};

/// Name of an archive member, exactly as stored in its headers.
///
/// ZIP names are byte strings. Older tools write them in a code page and
/// leave the UTF-8 flag clear, so names are compared, hashed and ordered by
/// their raw bytes and never re-encoded.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryName(Vec<u8>);

impl EntryName {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_directory(&self) -> bool {
        self.0.ends_with(b"/")
    }

    /// Whether a writer should set the language encoding flag for this name.
    pub fn is_utf8_non_ascii(&self) -> bool {
        !self.0.is_ascii() && std::str::from_utf8(&self.0).is_ok()
    }

    /// Printable form for messages; invalid bytes become U+FFFD.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(name) => fmt::Debug::fmt(name, f),
            Err(_) => write!(f, "{:02x?}", self.0),
        }
    }
}

impl From<&str> for EntryName {
    fn from(name: &str) -> Self {
        Self(name.as_bytes().to_vec())
    }
}

impl From<String> for EntryName {
    fn from(name: String) -> Self {
        Self(name.into_bytes())
    }
}

impl PartialEq<str> for EntryName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for EntryName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// Where a record came from, used to break ties between equal names.
///
/// Ordering is lexicographic: command-line input first, then the position of
/// the file in the sorted traversal of that input, then the position of the
/// entry inside a nested archive. The greatest origin wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Origin {
    pub input: usize,
    pub file: usize,
    pub entry: usize,
}

impl Origin {
    pub fn new(input: usize, file: usize) -> Self {
        Self {
            input,
            file,
            entry: 0,
        }
    }

    pub fn with_entry(self, entry: usize) -> Self {
        Self { entry, ..self }
    }
}

/// One archive member, already in its final compressed form.
///
/// Created once by a producer and read-only afterwards. `payload` holds
/// exactly `compressed_size` bytes; the CRC and uncompressed size describe the
/// content before compression and are never derived from `payload` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub name: EntryName,
    /// General purpose bit 11: `name` is UTF-8
    pub utf8_name: bool,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub payload: Vec<u8>,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub origin: Origin,
}

impl EntryRecord {
    /// A freshly compressed file, stamped with the DOS epoch so builds are reproducible.
    pub fn new(
        name: EntryName,
        compression_method: CompressionMethod,
        crc32: u32,
        uncompressed_size: u64,
        payload: Vec<u8>,
        origin: Origin,
    ) -> Self {
        Self {
            utf8_name: name.is_utf8_non_ascii(),
            name,
            compression_method,
            crc32,
            uncompressed_size,
            compressed_size: payload.len() as u64,
            payload,
            last_mod_time: DOS_EPOCH_TIME,
            last_mod_date: DOS_EPOCH_DATE,
            origin,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.name.is_directory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_by_raw_bytes() {
        let a = EntryName::from_bytes(b"\x81.txt".to_vec());
        let b = EntryName::from_bytes(b"\x82.txt".to_vec());
        assert_ne!(a, b);
        assert!(a < b);
        // Both render the same, but stay distinct
        assert_eq!(a.to_string(), b.to_string());
        assert!(!a.is_utf8_non_ascii());
    }

    #[test]
    fn utf8_flag_only_for_non_ascii_utf8() {
        assert!(!EntryName::from("plain.txt").is_utf8_non_ascii());
        assert!(EntryName::from("naïve.txt").is_utf8_non_ascii());
        let record = EntryRecord::new(
            "ü/".into(),
            CompressionMethod::Stored,
            0,
            0,
            Vec::new(),
            Origin::default(),
        );
        assert!(record.utf8_name);
        assert!(record.is_directory());
    }
}
