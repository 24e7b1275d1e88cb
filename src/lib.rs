//! # parzip
//!
//! A parallel ZIP archive builder.
//!
//! Every input file is read and compressed on its own task, producing a
//! self-contained entry record. Inputs that are ZIP archives themselves are
//! merged entry by entry with their compressed bytes copied verbatim, so no
//! entry is ever decompressed and recompressed. Once every producer has
//! finished, the records are sorted by name and written out in a single pass
//! together with a freshly computed central directory.
//!
//! ## Features
//!
//! - Concurrent compression bounded by a configurable number of jobs
//! - Merging of nested ZIP archives without recompression, including entries
//!   that use data descriptors
//! - Reproducible output: entries are ordered by name and fresh files carry a
//!   fixed timestamp
//! - Deterministic duplicate handling: the later input on the command line wins
//! - Atomic output: the destination only appears once the archive is complete
//!
//! ## Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use parzip::build::{build, BuildOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let inputs = vec![PathBuf::from("/data/docs"), PathBuf::from("/data/old.zip")];
//!     let summary = build(Path::new("/tmp/out.zip"), &inputs, &BuildOptions::default()).await?;
//!     println!("{} entries", summary.archive.entries);
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod cli;
pub mod codec;
pub mod entry;
pub mod error;
pub mod io;
pub mod store;
pub mod zip;

pub use build::{BuildOptions, BuildSummary};
pub use cli::Cli;
pub use codec::{Codec, Compressed, DeflateCodec};
pub use entry::{EntryName, EntryRecord, Origin};
pub use error::{Error, Result};
pub use store::{EntryStore, Insertion};
pub use crate::zip::{ArchiveWriter, ZipStreamParser};
