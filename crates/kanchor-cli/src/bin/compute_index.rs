//! Build the perfect-hash index family from a distinct-k-mer list.
//!
//! ```text
//! compute_index <kmer_tf_tsv> <pf_file> <out_prefix> <threads> <cutoff>
//! ```
//!
//! Reads `<kmer>\t<tf>` lines from any external counter, merges strand
//! twins, drops entries below the cutoff, and writes `<pf_file>`,
//! `<out_prefix>.kmers.bin`, and `<out_prefix>.tf.bin`.

use anyhow::Context;
use clap::Parser;
use kanchor_lib::builder::config::BuildOptions;
use kanchor_lib::builder::index_build::build_hash_index;
use kanchor_lib::IndexPaths;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "compute_index")]
#[command(version, about = "Build the perfect-hash k-mer index from a <kmer>\\t<tf> list")]
struct Args {
    /// Input text file: one `<kmer>\t<tf>` record per line
    kmer_tf_tsv: PathBuf,

    /// Output path of the serialized perfect hash
    pf_file: PathBuf,

    /// Prefix for the `.kmers.bin` and `.tf.bin` outputs
    out_prefix: PathBuf,

    /// Worker threads (0 = AINDEX_THREADS or all cores)
    threads: usize,

    /// Minimum term frequency kept (0 keeps everything)
    cutoff: u32,
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
    let options = BuildOptions {
        threads: args.threads,
        cutoff: args.cutoff,
        ..BuildOptions::default()
    };

    let paths = IndexPaths::new(&args.out_prefix);
    let report = build_hash_index(
        &args.kmer_tf_tsv,
        &args.pf_file,
        &paths.kmers(),
        &paths.tf(),
        &options,
    )
    .with_context(|| format!("building hash index from {}", args.kmer_tf_tsv.display()))?;

    info!(
        "done: {} canonical {}-mers, total tf {}, {} records skipped",
        report.n, report.k, report.total_tf, report.skipped
    );
    Ok(())
}
