//! Streaming ZIP entry parser.
//!
//! This module walks the local file headers of an archive from front to back,
//! reading from any [`Read`] source, and yields each entry together with the
//! exact bytes of its compressed payload.
//!
//! ## Parsing Strategy
//!
//! Unlike a random-access reader, a stream parser cannot consult the central
//! directory first, and a local header may defer its CRC and sizes to a data
//! descriptor that follows the payload. The payload boundary is therefore
//! found by running the data through a decompressor:
//!
//! 1. The source is wrapped in a [`RecordingReader`], which keeps a copy of
//!    every byte it delivers.
//! 2. After the header is parsed the recording is cleared.
//! 3. DEFLATE input is fed to the inflater in chunks of at most
//!    [`PUSHBACK_WINDOW`] bytes. When the inflater reports the end of the
//!    stream, the bytes of the last chunk it did not consume are unread.
//! 4. The recording now holds exactly the compressed payload, whether or not
//!    a data descriptor follows.
//!
//! The inflated output is only hashed and counted to validate the entry; it
//! is never kept.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use std::io::{self, Read};
use thiserror::Error;

use crate::entry::{EntryName, EntryRecord, Origin};
use crate::io::{PUSHBACK_WINDOW, RecordingReader, Unread};

use super::structures::*;

/// Size of the scratch buffer that receives inflated output during validation.
const INFLATE_BUFFER_SIZE: usize = 32 * 1024;

/// Errors raised while walking a nested archive.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("archive ends inside entry #{index}")]
    Truncated { index: usize },
    #[error("unexpected signature {0:02x?} where a local file header was expected")]
    BadSignature([u8; 4]),
    #[error("entry {name} is encrypted")]
    Encrypted { name: String },
    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },
    #[error("entry {name} requires ZIP64")]
    Zip64 { name: String },
    #[error("stored entry {name} has a data descriptor")]
    StoredWithDescriptor { name: String },
    #[error("entry {name} has an invalid deflate stream: {source}")]
    Inflate {
        name: String,
        #[source]
        source: DecompressError,
    },
    #[error("entry {name} has a deflate stream that stops making progress")]
    Stalled { name: String },
    #[error("entry {name} has crc {actual:#010x}, header records {expected:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    #[error("entry {name} has {field} {actual}, header records {expected}")]
    SizeMismatch {
        name: String,
        field: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// One entry lifted out of a nested archive, payload still compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub name: EntryName,
    /// Language encoding flag as the source archive set it
    pub utf8_name: bool,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub payload: Vec<u8>,
}

impl ExtractedEntry {
    pub fn into_record(self, origin: Origin) -> EntryRecord {
        EntryRecord {
            name: self.name,
            utf8_name: self.utf8_name,
            compression_method: self.compression_method,
            crc32: self.crc32,
            uncompressed_size: self.uncompressed_size,
            compressed_size: self.compressed_size,
            payload: self.payload,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            origin,
        }
    }
}

/// Values describing an entry's content, from a header or a data descriptor.
struct Checksums {
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
}

/// Forward-only ZIP parser that copies compressed payloads verbatim.
///
/// ## Example
///
/// ```ignore
/// let mut parser = ZipStreamParser::new(BufReader::new(File::open("x.zip")?));
/// while let Some(entry) = parser.next_entry()? {
///     println!("{} ({} bytes compressed)", entry.name, entry.payload.len());
/// }
/// ```
pub struct ZipStreamParser<R: Read> {
    /// Source, recording what the current entry consumes
    reader: RecordingReader<R>,
    /// Input chunk handed to the inflater
    chunk: Vec<u8>,
    /// Inflated output, hashed then discarded
    scratch: Vec<u8>,
    /// Number of entries returned so far
    index: usize,
    done: bool,
}

impl<R: Read> ZipStreamParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: RecordingReader::new(reader),
            chunk: vec![0u8; PUSHBACK_WINDOW],
            scratch: vec![0u8; INFLATE_BUFFER_SIZE],
            index: 0,
            done: false,
        }
    }

    /// Number of entries returned so far, which is also the index of the next one.
    pub fn entries_read(&self) -> usize {
        self.index
    }

    /// Parse the next local entry.
    ///
    /// # Returns
    ///
    /// `Ok(None)` once the stream is exhausted or the central directory (or
    /// any other trailing record) is reached.
    ///
    /// # Errors
    ///
    /// Any malformed header, unsupported feature, truncated payload or
    /// checksum mismatch. The parser should not be used after an error.
    pub fn next_entry(&mut self) -> Result<Option<ExtractedEntry>, ParseError> {
        if self.done {
            return Ok(None);
        }
        self.reader.clear();

        let Some(sig) = self.read_signature()? else {
            self.done = true;
            return Ok(None);
        };
        if sig != LFH_SIGNATURE {
            if TRAILING_SIGNATURES.iter().any(|trailer| *trailer == &sig[..]) {
                self.done = true;
                return Ok(None);
            }
            return Err(ParseError::BadSignature(sig));
        }

        let header =
            LocalFileHeader::read_after_signature(&mut self.reader).map_err(|e| self.io_err(e))?;
        let name = EntryName::from_bytes(header.file_name.clone());
        check_header(&header, &name)?;

        // Everything recorded from here on is payload
        self.reader.clear();

        let (payload, actual) = match header.compression_method {
            CompressionMethod::Stored => self.read_stored(&header)?,
            CompressionMethod::Deflate => self.read_deflated(&name)?,
            CompressionMethod::Unknown(method) => {
                return Err(ParseError::UnsupportedMethod {
                    name: name.to_string(),
                    method,
                });
            }
        };

        let recorded = if header.has_data_descriptor() {
            self.read_data_descriptor()?
        } else {
            Checksums {
                crc32: header.crc32,
                compressed_size: header.compressed_size as u64,
                uncompressed_size: header.uncompressed_size as u64,
            }
        };
        verify(&name, &recorded, &actual)?;

        tracing::trace!(
            name = %name,
            compressed = payload.len(),
            uncompressed = recorded.uncompressed_size,
            "parsed nested entry"
        );

        self.index += 1;
        Ok(Some(ExtractedEntry {
            name,
            utf8_name: header.flags & FLAG_UTF8 != 0,
            compression_method: header.compression_method,
            crc32: recorded.crc32,
            compressed_size: payload.len() as u64,
            uncompressed_size: recorded.uncompressed_size,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            payload,
        }))
    }

    /// Read a record signature, or `None` on a clean end of stream.
    fn read_signature(&mut self) -> Result<Option<[u8; 4]>, ParseError> {
        let mut sig = [0u8; 4];
        let mut filled = 0;
        while filled < sig.len() {
            match self.reader.read(&mut sig[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(None),
            4 => Ok(Some(sig)),
            _ => Err(ParseError::Truncated { index: self.index }),
        }
    }

    /// Copy a STORED payload whose size the header states up front.
    fn read_stored(
        &mut self,
        header: &LocalFileHeader,
    ) -> Result<(Vec<u8>, Checksums), ParseError> {
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = header.compressed_size as usize;

        while remaining > 0 {
            let want = remaining.min(self.chunk.len());
            self.reader
                .read_exact(&mut self.chunk[..want])
                .map_err(|e| self.io_err(e))?;
            hasher.update(&self.chunk[..want]);
            remaining -= want;
        }

        let payload = self.reader.take_recorded();
        let size = payload.len() as u64;
        Ok((
            payload,
            Checksums {
                crc32: hasher.finalize(),
                compressed_size: size,
                uncompressed_size: size,
            },
        ))
    }

    /// Inflate until the end of the DEFLATE stream, giving back any overshoot.
    fn read_deflated(&mut self, name: &EntryName) -> Result<(Vec<u8>, Checksums), ParseError> {
        let mut inflater = Decompress::new(false);
        let mut hasher = crc32fast::Hasher::new();

        'stream: loop {
            let filled = loop {
                match self.reader.read(&mut self.chunk) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };
            if filled == 0 {
                return Err(ParseError::Truncated { index: self.index });
            }

            let mut pos = 0;
            loop {
                let in_before = inflater.total_in();
                let out_before = inflater.total_out();
                let status = inflater
                    .decompress(&self.chunk[pos..filled], &mut self.scratch, FlushDecompress::None)
                    .map_err(|source| ParseError::Inflate {
                        name: name.to_string(),
                        source,
                    })?;
                let consumed = (inflater.total_in() - in_before) as usize;
                let produced = (inflater.total_out() - out_before) as usize;
                hasher.update(&self.scratch[..produced]);
                pos += consumed;

                if status == Status::StreamEnd {
                    self.reader.unread(filled - pos)?;
                    break 'stream;
                }
                if pos == filled {
                    continue 'stream;
                }
                if consumed == 0 && produced == 0 {
                    return Err(ParseError::Stalled {
                        name: name.to_string(),
                    });
                }
            }
        }

        let payload = self.reader.take_recorded();
        Ok((
            payload,
            Checksums {
                crc32: hasher.finalize(),
                compressed_size: inflater.total_in(),
                uncompressed_size: inflater.total_out(),
            },
        ))
    }

    /// Read a 32-bit data descriptor, with or without its optional signature.
    fn read_data_descriptor(&mut self) -> Result<Checksums, ParseError> {
        let mut first = [0u8; 4];
        self.reader
            .read_exact(&mut first)
            .map_err(|e| self.io_err(e))?;

        let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
            self.reader
                .read_u32::<LittleEndian>()
                .map_err(|e| self.io_err(e))?
        } else {
            u32::from_le_bytes(first)
        };
        let compressed_size = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|e| self.io_err(e))?;
        let uncompressed_size = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|e| self.io_err(e))?;

        Ok(Checksums {
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
        })
    }

    fn io_err(&self, err: io::Error) -> ParseError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ParseError::Truncated { index: self.index }
        } else {
            ParseError::Io(err)
        }
    }
}

/// Reject features this parser cannot copy faithfully.
fn check_header(header: &LocalFileHeader, name: &EntryName) -> Result<(), ParseError> {
    if header.is_encrypted() {
        return Err(ParseError::Encrypted {
            name: name.to_string(),
        });
    }
    if header.compressed_size == ZIP64_SENTINEL || header.uncompressed_size == ZIP64_SENTINEL {
        return Err(ParseError::Zip64 {
            name: name.to_string(),
        });
    }
    if header.compression_method == CompressionMethod::Stored && header.has_data_descriptor() {
        return Err(ParseError::StoredWithDescriptor {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn verify(name: &EntryName, recorded: &Checksums, actual: &Checksums) -> Result<(), ParseError> {
    if recorded.compressed_size != actual.compressed_size {
        return Err(ParseError::SizeMismatch {
            name: name.to_string(),
            field: "compressed size",
            expected: recorded.compressed_size,
            actual: actual.compressed_size,
        });
    }
    if recorded.uncompressed_size != actual.uncompressed_size {
        return Err(ParseError::SizeMismatch {
            name: name.to_string(),
            field: "uncompressed size",
            expected: recorded.uncompressed_size,
            actual: actual.uncompressed_size,
        });
    }
    if recorded.crc32 != actual.crc32 {
        return Err(ParseError::CrcMismatch {
            name: name.to_string(),
            expected: recorded.crc32,
            actual: actual.crc32,
        });
    }
    Ok(())
}
