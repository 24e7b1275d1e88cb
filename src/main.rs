//! Main entry point for the parzip CLI application.
//!
//! This binary compresses the given files and directories in parallel,
//! merges any ZIP archives among them, and writes one archive.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use parzip::Cli;
use parzip::build::build_with_progress;

/// Application entry point.
///
/// Runs the build, printing a status line after the parallel phase and
/// after the archive is written.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let output = cli.output_path();
    let inputs = cli.input_paths();
    let options = cli.build_options();
    let quiet = cli.is_quiet();

    let summary = build_with_progress(&output, &inputs, &options, |entries| {
        if !quiet {
            println!("{entries} entries loaded and compressed");
        }
    })
    .await?;

    if !quiet {
        println!(
            "{} created in {:.3} sec ({} entries, {} bytes)",
            output.display(),
            summary.elapsed.as_secs_f64(),
            summary.archive.entries,
            summary.archive.total_size
        );
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides `--log-level`.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
