//! Archive build pipeline.
//!
//! A build runs in three phases:
//!
//! 1. [`discover`] expands the input roots into one [`Source`] per file.
//! 2. [`collect`] runs every source concurrently on the tokio runtime; each
//!    inserts its finished records into a shared [`EntryStore`].
//! 3. [`write_archive`] sorts the records by name and writes them serially,
//!    staging the output in a temporary file that replaces the destination
//!    only once the archive is complete.
//!
//! The first failing source aborts the build before anything is written.

mod source;
mod walk;

pub use source::{ArchiveSource, Context, FileSource, Source};
pub use walk::{archive_name, discover};

use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::entry::EntryRecord;
use crate::error::{Error, Result};
use crate::store::EntryStore;
use crate::zip::{ArchiveSummary, ArchiveWriter, WriteError};

/// Knobs for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of sources producing at once
    pub jobs: usize,
    /// DEFLATE level, 0 stores
    pub level: u32,
    /// Merge `.zip` inputs entry by entry instead of compressing them as files
    pub merge_archives: bool,
    /// Fail on duplicate names
    pub strict: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            level: 6,
            merge_archives: true,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildSummary {
    pub archive: ArchiveSummary,
    pub elapsed: Duration,
}

/// Run every source, at most `options.jobs` at a time, into a fresh store.
///
/// # Errors
///
/// The first error any source reports. Remaining sources are aborted.
pub async fn collect(sources: Vec<Box<dyn Source>>, options: &BuildOptions) -> Result<EntryStore> {
    let context = Arc::new(Context::new(options));
    let permits = Arc::new(Semaphore::new(options.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for source in sources {
        let context = Arc::clone(&context);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|_| Error::Cancelled)?;
            tracing::trace!(path = %source.path().display(), "producing");
            source.produce(context).await
        });
    }

    let mut produced = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(count)) => produced += count,
            Ok(Err(err)) => {
                tasks.abort_all();
                return Err(err);
            }
            Err(err) => {
                tasks.abort_all();
                return Err(err.into());
            }
        }
    }

    let context = Arc::into_inner(context).ok_or(Error::Cancelled)?;
    tracing::info!(produced, entries = context.store.len(), "all sources finished");
    Ok(context.store)
}

/// Write `records`, in the given order, to `destination`.
///
/// The archive is staged next to the destination and renamed over it after
/// the end of central directory has been flushed and synced. On any error the
/// staged file is removed and an existing destination is left untouched.
pub fn write_archive(destination: &Path, records: &[EntryRecord]) -> Result<ArchiveSummary> {
    let fail = |source: io::Error| Error::OutputWriteFailure {
        path: destination.to_path_buf(),
        source,
    };
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(fail)?;

    let staged = NamedTempFile::new_in(parent).map_err(fail)?;
    let mut writer = ArchiveWriter::new(BufWriter::new(staged));
    for record in records {
        writer
            .write_entry(record)
            .map_err(|e| write_error(destination, e))?;
    }
    let (buffered, summary) = writer.finish().map_err(|e| write_error(destination, e))?;

    let staged = buffered.into_inner().map_err(|e| fail(e.into_error()))?;
    // Temp files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(fail)?;
    }
    staged.as_file().sync_all().map_err(fail)?;
    staged.persist(destination).map_err(|e| fail(e.error))?;

    tracing::info!(
        path = %destination.display(),
        entries = summary.entries,
        bytes = summary.total_size,
        "archive written"
    );
    Ok(summary)
}

fn write_error(destination: &Path, err: WriteError) -> Error {
    match err {
        WriteError::Io(source) => Error::OutputWriteFailure {
            path: destination.to_path_buf(),
            source,
        },
        WriteError::Zip64Required(reason) => Error::Zip64Required(reason),
    }
}

/// Discover, collect and write in one call.
pub async fn build(
    destination: &Path,
    inputs: &[PathBuf],
    options: &BuildOptions,
) -> Result<BuildSummary> {
    build_with_progress(destination, inputs, options, |_| {}).await
}

/// Like [`build`], calling `on_collected` with the number of distinct entries
/// once every source has finished and before the archive is written.
pub async fn build_with_progress<F>(
    destination: &Path,
    inputs: &[PathBuf],
    options: &BuildOptions,
    on_collected: F,
) -> Result<BuildSummary>
where
    F: FnOnce(usize),
{
    let started = Instant::now();

    let sources = {
        let inputs = inputs.to_vec();
        let options = options.clone();
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || discover(&inputs, &options, Some(&destination)))
            .await??
    };
    let store = collect(sources, options).await?;
    on_collected(store.len());

    // Sorting makes the output independent of task completion order
    let records = store.into_sorted();
    let destination = destination.to_path_buf();
    let archive = tokio::task::spawn_blocking(move || write_archive(&destination, &records))
        .await??;

    Ok(BuildSummary {
        archive,
        elapsed: started.elapsed(),
    })
}
