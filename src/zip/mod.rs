//! ZIP format reading and writing.
//!
//! This module implements the parts of the ZIP format needed to merge
//! archives without a ZIP library: a forward-only parser that lifts entries
//! out of an existing archive with their compressed bytes intact, and a
//! writer that lays out already-compressed records and builds the central
//! directory for them.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (headers, EOCD)
//! - [`parser`]: Streaming local-header parser that copies compressed payloads verbatim
//! - [`writer`]: Serial archive writer that assigns local header offsets
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - STORED (no compression) method
//! - DEFLATE compression method
//! - Data descriptors (with or without signature) when reading
//!
//! ## Limitations
//!
//! - No encryption support
//! - No ZIP64 support; archives and entries are limited to 4 GiB and 65535 entries
//! - No BZIP2, LZMA, or other compression methods

mod parser;
mod structures;
mod writer;

pub use parser::{ExtractedEntry, ParseError, ZipStreamParser};
pub use structures::*;
pub use writer::{ArchiveSummary, ArchiveWriter, WriteError};
