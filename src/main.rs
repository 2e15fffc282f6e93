//! CLI entry point for the DOU extractor.

use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use dou_extractor::config::{Config, SectionList};
use dou_extractor::export::write_json;
use dou_extractor::pipeline::DouExtractor;
use dou_extractor::session::Credentials;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(start = %args.start, end = %args.end, config = %args.config.display(), "CLI arguments parsed");

    let config = Config::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let sections = args
        .sections
        .as_deref()
        .map(SectionList::parse_csv)
        .transpose()
        .context("parsing --sections")?;

    let extractor = DouExtractor::new(config, Credentials::new(&args.email, &args.password))
        .strict(args.strict)
        .show_progress(!args.quiet && std::io::stderr().is_terminal());

    let extraction = extractor
        .extract(args.start.as_str(), args.end.as_str(), sections.as_ref())
        .await?;

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    write_json(&extraction.records, &mut writer)
        .with_context(|| format!("writing {}", args.output.display()))?;
    writer.flush()?;

    let report = extraction.report;
    info!(
        records = report.records,
        dates = report.dates,
        bundles = report.bundles_saved,
        not_found = report.bundles_not_found,
        skipped = report.bundles_skipped,
        corrupt = report.corrupt_archives,
        failed_documents = report.failed_documents,
        output = %args.output.display(),
        "Extraction complete"
    );

    Ok(())
}
