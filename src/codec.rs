//! Compression primitive used for freshly read files.

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Write};

use crate::zip::CompressionMethod;

/// Output of a [`Codec`]: the payload exactly as it will appear in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub method: CompressionMethod,
    pub data: Vec<u8>,
    pub crc32: u32,
    pub uncompressed_size: u64,
}

pub trait Codec: Send + Sync {
    fn compress(&self, data: &[u8]) -> io::Result<Compressed>;
}

/// Raw DEFLATE at a fixed level.
///
/// Level 0 stores. Data that does not shrink under DEFLATE is stored as well.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Codec for DeflateCodec {
    fn compress(&self, data: &[u8]) -> io::Result<Compressed> {
        let crc32 = crc32fast::hash(data);
        let uncompressed_size = data.len() as u64;

        if self.level.level() > 0 {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
            encoder.write_all(data)?;
            let deflated = encoder.finish()?;
            if deflated.len() < data.len() {
                return Ok(Compressed {
                    method: CompressionMethod::Deflate,
                    data: deflated,
                    crc32,
                    uncompressed_size,
                });
            }
        }

        Ok(Compressed {
            method: CompressionMethod::Stored,
            data: data.to_vec(),
            crc32,
            uncompressed_size,
        })
    }
}
