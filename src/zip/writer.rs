use std::io::{self, Write};
use thiserror::Error;

use crate::entry::EntryRecord;

use super::structures::*;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("archive requires ZIP64: {0}")]
    Zip64Required(String),
}

/// Totals reported once the end of central directory is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub cd_offset: u64,
    pub cd_size: u64,
    pub total_size: u64,
}

/// Serial ZIP writer for records whose payload is already compressed.
///
/// Every record becomes a local file header followed by its payload verbatim.
/// The writer keeps one central directory header per record, pointing back at
/// the offset where its local header started, and emits them all on
/// [`finish`](Self::finish).
pub struct ArchiveWriter<W: Write> {
    writer: W,
    offset: u64,
    central: Vec<CentralDirectoryHeader>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            offset: 0,
            central: Vec::new(),
        }
    }

    /// Append one record; its local header starts at the current offset.
    pub fn write_entry(&mut self, record: &EntryRecord) -> Result<(), WriteError> {
        let lfh_offset = to_u32(self.offset, || {
            format!("local header of {} starts beyond 4 GiB", record.name)
        })?;
        let compressed_size = to_u32(record.payload.len() as u64, || {
            format!("{} has a compressed size beyond 4 GiB", record.name)
        })?;
        let uncompressed_size = to_u32(record.uncompressed_size, || {
            format!("{} has an uncompressed size beyond 4 GiB", record.name)
        })?;
        if record.name.len() > u16::MAX as usize {
            return Err(WriteError::Zip64Required(format!(
                "name of {} bytes does not fit a 16-bit length",
                record.name.len()
            )));
        }

        let flags = if record.utf8_name { FLAG_UTF8 } else { 0 };
        let version_needed = record.compression_method.version_needed();
        let file_name = record.name.as_bytes().to_vec();

        let header = LocalFileHeader {
            version_needed,
            flags,
            compression_method: record.compression_method,
            last_mod_time: record.last_mod_time,
            last_mod_date: record.last_mod_date,
            crc32: record.crc32,
            compressed_size,
            uncompressed_size,
            file_name: file_name.clone(),
            extra_field: Vec::new(),
        };
        header.write_to(&mut self.writer)?;
        self.writer.write_all(&record.payload)?;

        self.central.push(CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed,
            flags,
            compression_method: record.compression_method,
            last_mod_time: record.last_mod_time,
            last_mod_date: record.last_mod_date,
            crc32: record.crc32,
            compressed_size,
            uncompressed_size,
            external_attrs: if record.is_directory() {
                DOS_DIRECTORY_ATTR
            } else {
                0
            },
            lfh_offset,
            file_name,
        });

        tracing::trace!(name = %record.name, offset = self.offset, "wrote local entry");
        self.offset += header.encoded_len() + record.payload.len() as u64;
        Ok(())
    }

    /// Write the central directory and end record, then flush.
    pub fn finish(mut self) -> Result<(W, ArchiveSummary), WriteError> {
        let entries = self.central.len();
        let total_entries = u16::try_from(entries).map_err(|_| {
            WriteError::Zip64Required(format!("{entries} entries exceed the 65535 limit"))
        })?;

        let cd_offset = self.offset;
        for header in &self.central {
            header.write_to(&mut self.writer)?;
            self.offset += header.encoded_len();
        }
        let cd_size = self.offset - cd_offset;

        let eocd = EndOfCentralDirectory::new(
            total_entries,
            to_u32(cd_size, || "central directory is larger than 4 GiB".to_string())?,
            to_u32(cd_offset, || "central directory starts beyond 4 GiB".to_string())?,
        );
        eocd.write_to(&mut self.writer)?;
        self.offset += EndOfCentralDirectory::SIZE as u64;
        self.writer.flush()?;

        Ok((
            self.writer,
            ArchiveSummary {
                entries,
                cd_offset,
                cd_size,
                total_size: self.offset,
            },
        ))
    }
}

fn to_u32(value: u64, context: impl FnOnce() -> String) -> Result<u32, WriteError> {
    // ZIP64_SENTINEL itself is reserved
    match u32::try_from(value) {
        Ok(v) if v != ZIP64_SENTINEL => Ok(v),
        _ => Err(WriteError::Zip64Required(context())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryName, Origin};
    use std::io::Cursor;

    fn stored(name: &str, data: &[u8]) -> EntryRecord {
        EntryRecord::new(
            name.into(),
            CompressionMethod::Stored,
            crc32fast::hash(data),
            data.len() as u64,
            data.to_vec(),
            Origin::default(),
        )
    }

    fn write_all(records: &[EntryRecord]) -> (Vec<u8>, ArchiveSummary) {
        let mut writer = ArchiveWriter::new(Vec::new());
        for record in records {
            writer.write_entry(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn empty_archive_is_a_bare_end_record() {
        let (bytes, summary) = write_all(&[]);
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(summary.entries, 0);
        assert_eq!(
            EndOfCentralDirectory::from_bytes(&bytes).unwrap(),
            EndOfCentralDirectory::new(0, 0, 0)
        );
    }

    #[test]
    fn central_directory_points_at_matching_local_headers() {
        let records = [
            stored("a.txt", b"hello"),
            stored("b/c.txt", b"world!"),
            stored("b/", b""),
        ];
        let (bytes, summary) = write_all(&records);
        assert_eq!(summary.total_size, bytes.len() as u64);

        let eocd_start = bytes.len() - EndOfCentralDirectory::SIZE;
        let eocd = EndOfCentralDirectory::from_bytes(&bytes[eocd_start..]).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.disk_entries, 3);
        assert_eq!(eocd.cd_offset as u64, summary.cd_offset);
        assert_eq!(eocd.cd_size as u64, summary.cd_size);
        assert_eq!(eocd.cd_offset as usize + eocd.cd_size as usize, eocd_start);

        let mut cursor = Cursor::new(&bytes[eocd.cd_offset as usize..eocd_start]);
        for record in &records {
            let cdfh = CentralDirectoryHeader::read_from(&mut cursor).unwrap();
            assert_eq!(cdfh.file_name, record.name.as_bytes());

            let lfh_at = cdfh.lfh_offset as usize;
            assert_eq!(&bytes[lfh_at..lfh_at + 4], LFH_SIGNATURE);
            let lfh = LocalFileHeader::read_after_signature(&mut &bytes[lfh_at + 4..]).unwrap();
            assert_eq!(lfh.file_name, cdfh.file_name);
            assert_eq!(lfh.crc32, cdfh.crc32);
            assert!(!lfh.has_data_descriptor());

            let data_at = lfh_at + lfh.encoded_len() as usize;
            assert_eq!(&bytes[data_at..data_at + record.payload.len()], &record.payload[..]);
        }
        assert_eq!(cursor.position() as u64, summary.cd_size);
    }

    #[test]
    fn directory_and_utf8_names_are_flagged() {
        let (bytes, summary) = write_all(&[stored("dir/", b""), stored("naïve.txt", b"x")]);
        let mut cursor = Cursor::new(&bytes[summary.cd_offset as usize..]);

        let dir = CentralDirectoryHeader::read_from(&mut cursor).unwrap();
        assert_eq!(dir.external_attrs, DOS_DIRECTORY_ATTR);
        assert_eq!(dir.flags & FLAG_UTF8, 0);

        let utf8 = CentralDirectoryHeader::read_from(&mut cursor).unwrap();
        assert_eq!(utf8.external_attrs, 0);
        assert_eq!(utf8.flags & FLAG_UTF8, FLAG_UTF8);
    }

    #[test]
    fn oversized_entries_need_zip64() {
        let mut record = stored("huge", b"");
        record.uncompressed_size = u32::MAX as u64 + 1;
        let mut writer = ArchiveWriter::new(Vec::new());
        assert!(matches!(
            writer.write_entry(&record),
            Err(WriteError::Zip64Required(_))
        ));
        let (bytes, summary) = writer.finish().unwrap();
        assert_eq!(summary.entries, 0);
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
    }

    #[test]
    fn too_many_entries_need_zip64() {
        let record = stored("e", b"");
        let mut writer = ArchiveWriter::new(Vec::new());
        for _ in 0..=u16::MAX as usize {
            writer.write_entry(&record).unwrap();
        }
        assert!(matches!(
            writer.finish(),
            Err(WriteError::Zip64Required(reason)) if reason.contains("65536")
        ));
    }

    #[test]
    fn names_are_written_byte_for_byte() {
        let mut cp437 = stored("", b"x");
        cp437.name = EntryName::from_bytes(b"\x81.txt".to_vec());
        let mut flagged = stored("", b"y");
        flagged.name = EntryName::from_bytes(b"\x82.txt".to_vec());
        // A flag carried over from a nested archive is kept even if the bytes disagree
        flagged.utf8_name = true;

        let (bytes, summary) = write_all(&[cp437, flagged]);
        let mut cursor = Cursor::new(&bytes[summary.cd_offset as usize..]);

        let first = CentralDirectoryHeader::read_from(&mut cursor).unwrap();
        assert_eq!(first.file_name, b"\x81.txt");
        assert_eq!(first.flags & FLAG_UTF8, 0);

        let second = CentralDirectoryHeader::read_from(&mut cursor).unwrap();
        assert_eq!(second.file_name, b"\x82.txt");
        assert_eq!(second.flags & FLAG_UTF8, FLAG_UTF8);
        let lfh_at = second.lfh_offset as usize + 4;
        let lfh = LocalFileHeader::read_after_signature(&mut &bytes[lfh_at..]).unwrap();
        assert_eq!(lfh.flags, second.flags);
    }
}
