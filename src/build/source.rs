use async_trait::async_trait;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::{Codec, DeflateCodec};
use crate::entry::{EntryName, EntryRecord, Origin};
use crate::error::{Error, Result};
use crate::store::{EntryStore, Insertion};
use crate::zip::{ParseError, ZipStreamParser};

use super::BuildOptions;

/// State shared by every producer of one build.
pub struct Context {
    pub store: EntryStore,
    pub codec: Box<dyn Codec>,
    /// Fail on duplicate names instead of keeping the greatest origin
    pub strict: bool,
}

impl Context {
    pub fn new(options: &BuildOptions) -> Self {
        let codec = DeflateCodec::new(options.level);
        tracing::debug!(level = codec.level(), strict = options.strict, "build context");
        Self {
            store: EntryStore::new(),
            codec: Box::new(codec),
            strict: options.strict,
        }
    }

    /// Insert a finished record, applying the duplicate-name policy.
    pub fn accept(&self, record: EntryRecord) -> Result<()> {
        let name = record.name.clone();
        let origin = record.origin;
        let (dropped, winner) = match self.store.insert(record) {
            Insertion::Inserted => return Ok(()),
            _ if self.strict => {
                return Err(Error::DuplicateEntryName {
                    name: name.to_string(),
                });
            }
            Insertion::Replaced { previous } => (previous, origin),
            Insertion::Kept { existing } => (origin, existing),
        };
        tracing::warn!(%name, ?dropped, ?winner, "duplicate entry name, keeping later input");
        Ok(())
    }
}

/// Something that turns one input path into archive entries.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    /// Produce this source's records into the shared store.
    ///
    /// # Returns
    ///
    /// The number of records produced, duplicates included.
    async fn produce(&self, context: Arc<Context>) -> Result<usize>;
}

/// A regular file, read whole and compressed into a single entry.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: EntryName,
    origin: Origin,
}

impl FileSource {
    pub fn new(path: PathBuf, name: EntryName, origin: Origin) -> Self {
        Self { path, name, origin }
    }
}

#[async_trait]
impl Source for FileSource {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn produce(&self, context: Arc<Context>) -> Result<usize> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::input(&self.path, e))?;
        if data.len() as u64 >= u32::MAX as u64 {
            return Err(Error::EntryTooLarge {
                path: self.path.clone(),
                size: data.len() as u64,
            });
        }

        let ctx = Arc::clone(&context);
        let compressed = tokio::task::spawn_blocking(move || ctx.codec.compress(&data))
            .await?
            .map_err(|e| Error::input(&self.path, e))?;

        tracing::debug!(
            name = %self.name,
            method = ?compressed.method,
            size = compressed.uncompressed_size,
            compressed = compressed.data.len(),
            "compressed file"
        );

        context.accept(EntryRecord::new(
            self.name.clone(),
            compressed.method,
            compressed.crc32,
            compressed.uncompressed_size,
            compressed.data,
            self.origin,
        ))?;
        Ok(1)
    }
}

/// An existing ZIP archive whose entries are copied in without recompression.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
    origin: Origin,
}

impl ArchiveSource {
    pub fn new(path: PathBuf, origin: Origin) -> Self {
        Self { path, origin }
    }
}

#[async_trait]
impl Source for ArchiveSource {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn produce(&self, context: Arc<Context>) -> Result<usize> {
        let path = self.path.clone();
        let origin = self.origin;

        tokio::task::spawn_blocking(move || {
            let file = File::open(&path).map_err(|e| Error::input(&path, e))?;
            let mut parser = ZipStreamParser::new(BufReader::new(file));

            loop {
                let index = parser.entries_read();
                let entry = match parser.next_entry() {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(ParseError::Io(e)) => return Err(Error::input(&path, e)),
                    Err(source) => {
                        return Err(Error::MalformedNestedArchive { path, source });
                    }
                };
                context.accept(entry.into_record(origin.with_entry(index)))?;
            }

            let count = parser.entries_read();
            tracing::debug!(path = %path.display(), entries = count, "merged nested archive");
            Ok(count)
        })
        .await?
    }
}
