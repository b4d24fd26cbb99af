//! Convert FASTA/FASTQ input into the reads blob and interval table.
//!
//! ```text
//! compute_reads <in1> <in2|-> <fastq|fasta|se> <out.reads>
//! ```
//!
//! Paired FASTQ writes `mate1 ~ revcomp(mate2)` per line; FASTA also
//! writes the `.header` sidecar mapping offsets back to record names.

use anyhow::{bail, Context};
use clap::Parser;
use kanchor_lib::builder::reads_build::{convert_reads, ReadsFormat};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "compute_reads")]
#[command(version, about = "Convert fasta or fastq reads to the concatenated reads blob")]
struct Args {
    /// First input file
    in1: PathBuf,

    /// Second input file for paired fastq, `-` otherwise
    in2: String,

    /// Input layout: fastq (paired), fasta, or se
    format: String,

    /// Output reads blob (`.ridx` / `.header` land next to it)
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let format: ReadsFormat = args
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let in2 = match args.in2.as_str() {
        "-" => None,
        path => Some(PathBuf::from(path)),
    };
    if format == ReadsFormat::Fastq && in2.is_none() {
        bail!("paired fastq conversion needs a second input file, got `-`");
    }

    let report = convert_reads(&args.in1, in2.as_deref(), format, &args.out)
        .with_context(|| format!("converting reads from {}", args.in1.display()))?;

    info!("done: {} reads, {} bytes", report.n_reads, report.bytes);
    Ok(())
}
