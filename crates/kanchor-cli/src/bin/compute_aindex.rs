//! Build the positional index: recount tf over the reads store, then
//! fill the positions array.
//!
//! ```text
//! compute_aindex <reads> <pf> <kmers_prefix> <out_prefix> <threads> <k> <tf_file>
//! ```
//!
//! With `k = 13` the direct-addressed path is used and `<pf>` /
//! `<kmers_prefix>` may be `-`. Writes `<tf_file>`,
//! `<out_prefix>.indices.bin`, `<out_prefix>.pos.bin`, and the
//! `.pos.meta` cap sidecar.

use anyhow::{bail, Context};
use clap::Parser;
use kanchor_lib::builder::config::BuildOptions;
use kanchor_lib::builder::pos_build::{build_positions, write_position_files};
use kanchor_lib::builder::tf_count::{count_tf, write_tf};
use kanchor_lib::constants::DIRECT_K;
use kanchor_lib::files::ridx_for;
use kanchor_lib::{IndexPaths, KmerResolver, MphfResolver, ReadsStore};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "compute_aindex")]
#[command(version, about = "Build the positional k-mer index over a reads blob")]
struct Args {
    /// The reads blob (its `.ridx` companion must sit next to it)
    reads: PathBuf,

    /// Serialized perfect hash, or `-` for the 13-mer direct path
    pf: String,

    /// Prefix of the `.kmers.bin` checker, or `-` for the direct path
    kmers_prefix: String,

    /// Prefix for the `.indices.bin` / `.pos.bin` outputs
    out_prefix: PathBuf,

    /// Worker threads (0 = AINDEX_THREADS or all cores)
    threads: usize,

    /// K-mer length of the index (13 selects direct addressing)
    k: usize,

    /// Output path of the recounted `.tf.bin`
    tf_file: PathBuf,
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
        k: args.k,
        threads: args.threads,
        ..BuildOptions::default()
    };
    options.validate().map_err(|e| anyhow::anyhow!(e))?;
    options.print();
    let threads = options.worker_threads();

    let ridx = ridx_for(&args.reads);
    let store = ReadsStore::open(&args.reads, &ridx)
        .with_context(|| format!("opening reads store {}", args.reads.display()))?;

    let resolver = if args.k == DIRECT_K {
        KmerResolver::Direct
    } else {
        if args.pf == "-" || args.kmers_prefix == "-" {
            bail!("k = {} needs a perfect hash: pass <pf> and <kmers_prefix>", args.k);
        }
        let kmers = IndexPaths::new(&args.kmers_prefix).kmers();
        let resolver = MphfResolver::open(std::path::Path::new(&args.pf), &kmers)
            .with_context(|| format!("loading perfect hash {}", args.pf))?;
        let resolver = KmerResolver::Mphf(resolver);
        if resolver.k() != args.k {
            bail!(
                "hash was built for k = {}, but k = {} was requested",
                resolver.k(),
                args.k
            );
        }
        resolver
    };

    let tf = count_tf(&store, &resolver, threads).context("counting term frequencies")?;
    write_tf(&args.tf_file, &tf).context("writing tf array")?;

    let (indices, positions, report) =
        build_positions(&store, &resolver, &tf, options.max_tf, threads)
            .context("building positional index")?;
    write_position_files(&IndexPaths::new(&args.out_prefix), &indices, &positions, options.max_tf)
        .context("writing positional index")?;

    info!(
        "done: {} slots, {} filled, {} capped ids",
        report.total_slots, report.filled, report.capped_ids
    );
    Ok(())
}
