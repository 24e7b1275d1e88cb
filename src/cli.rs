use clap::Parser;
use std::path::{Path, PathBuf};

use crate::build::BuildOptions;

#[derive(Parser, Debug)]
#[command(name = "parzip")]
#[command(version)]
#[command(
    about = "Build a ZIP archive in parallel, merging nested archives without recompression",
    long_about = None
)]
#[command(after_help = "Examples:\n  \
  parzip out.zip src docs        compress two directories\n  \
  parzip all.zip a.zip b.zip     merge archives, later ones win on name clashes\n  \
  parzip -j 1 out.zip src        sequential run for comparison")]
pub struct Cli {
    /// Destination archive
    #[arg(value_name = "OUTPUT")]
    pub output: String,

    /// Files, directories or ZIP archives to add
    #[arg(value_name = "INPUTS", required = true)]
    pub inputs: Vec<String>,

    /// Compression level (0 = store)
    #[arg(
        short = 'l',
        long,
        default_value_t = 6,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    pub level: u32,

    /// Maximum number of files processed at once (default: number of CPUs)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Add .zip inputs as ordinary files instead of merging their entries
    #[arg(long)]
    pub no_merge: bool,

    /// Fail when two inputs produce the same entry name
    #[arg(long)]
    pub strict: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Quiet mode, no status lines
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn output_path(&self) -> PathBuf {
        absolute(&expand_home(&self.output))
    }

    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|input| absolute(&expand_home(input)))
            .collect()
    }

    pub fn build_options(&self) -> BuildOptions {
        let defaults = BuildOptions::default();
        BuildOptions {
            jobs: self.jobs.map_or(defaults.jobs, |jobs| jobs as usize),
            level: self.level,
            merge_archives: !self.no_merge,
            strict: self.strict,
        }
    }
}

/// Replace a leading `~` with the home directory.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
