//! stats-summary - print aggregate figures for a statistics report.
//!
//! Usage:
//!   stats-summary <report.json> [--csv]
//!
//! With `--csv`, prints one `frame,iframe,size,proctime` row per frame
//! instead, ready for plotting.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vplenc::{ReportDocument, ReportSummary};

#[derive(Debug, Parser)]
#[command(name = "stats-summary", version, about = "Summarize a vplenc statistics report")]
struct Args {
    /// Report written by hello-encode --stats
    #[arg(value_name = "REPORT")]
    report: PathBuf,

    /// Print per-frame CSV rows instead of the summary
    #[arg(long)]
    csv: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stats_summary=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let file = File::open(&args.report)
        .with_context(|| format!("failed to open {}", args.report.display()))?;
    let doc = ReportDocument::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", args.report.display()))?;

    if doc.framecount != doc.frames.len() as u64 {
        tracing::warn!(
            "framecount is {} but the report lists {} frames",
            doc.framecount,
            doc.frames.len()
        );
    }

    let mut out = io::stdout().lock();
    if args.csv {
        writeln!(out, "frame,iframe,size,proctime")?;
        for frame in &doc.frames {
            writeln!(
                out,
                "{},{},{},{}",
                frame.frame, frame.iframe, frame.size, frame.proctime
            )?;
        }
    } else {
        writeln!(out, "Report:          {}", args.report.display())?;
        let settings = &doc.settings;
        writeln!(
            out,
            "Codec:           {} {}x{} @ {} fps",
            settings.codec, settings.width, settings.height, settings.fps
        )?;
        writeln!(out, "{}", ReportSummary::from_document(&doc))?;
    }
    Ok(())
}
