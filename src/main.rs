extern crate best_data_review;

use best_data_review::output::FileOutput;
use best_data_review::timeseries::Timestamp;
use best_data_review::{run_review, ReviewRequest};
use chrono::DateTime;
use clap::Parser;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct ReviewArgs {
    /// Wide telemetry CSV, first column the interval-start timestamp
    data_file: String,
    /// Project configuration JSON (site, systems, augmentation settings)
    #[arg(long, short)]
    config: String,
    /// Keep rows at or after this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    start: Option<Timestamp>,
    /// Keep rows before this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    end: Option<Timestamp>,
    /// Comma-separated columns to keep in the outputs
    #[arg(long, value_delimiter = ',')]
    variables: Vec<String>,
    /// Directory for the outputs; defaults to the data file's directory
    #[arg(long, short)]
    output_dir: Option<PathBuf>,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn parse_timestamp(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value)
}

fn main() -> anyhow::Result<()> {
    let args = ReviewArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_file = Path::new(args.data_file.as_str());
    let data_file_stem = data_file
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("review");
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        data_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });
    let output = FileOutput::new(output_dir.clone(), format!("{data_file_stem}_{{}}.csv"));

    let request = ReviewRequest {
        start: args.start,
        end: args.end,
        variables: (!args.variables.is_empty()).then_some(args.variables),
    };

    let result = run_review(
        BufReader::new(File::open(data_file)?),
        BufReader::new(File::open(Path::new(args.config.as_str()))?),
        &output,
        &request,
    )?;

    info!(
        rows = result.wide.len(),
        directory = %output_dir.display(),
        "wrote {data_file_stem}_augmented.csv and {data_file_stem}_long.csv"
    );

    Ok(())
}
