use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use time::Date;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use receipts::models::parse_iso_date;
use receipts::report::{category_totals, expenses_in_range, render_category_summary, render_expenses};
use receipts::{
    ImageSource, OpenAiClientBuilder, ReceiptError, ReceiptExtractor, print_json,
    process_directory, write_json,
};

/// receipts - extract vendor, date, total and category from receipt images
#[derive(Parser)]
#[command(name = "receipts")]
#[command(about = "Extract structured fields from a directory of receipt images")]
#[command(version)]
struct Cli {
    /// Directory containing receipt images
    #[arg(value_name = "DIR")]
    dirpath: PathBuf,

    /// Print the extracted results as JSON
    #[arg(long)]
    print: bool,

    /// Write the extracted results as JSON to a file
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print total expenses within an inclusive date range
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    expenses: Option<Vec<String>>,

    /// Print spending totals per category
    #[arg(long)]
    summary: bool,

    /// Model name (overrides OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = run(&cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Installs a stderr logger so that JSON on stdout stays clean.
fn init_logging(verbose: u8) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Maps the `-v` count to a log level. `RUST_LOG`, when set, takes precedence.
fn log_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()))
}

/// Determines if an error is a configuration error (vs an internal failure).
///
/// Configuration errors are a missing directory, a missing or rejected credential,
/// and malformed command-line dates.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<ReceiptError>()
            .is_some_and(ReceiptError::is_fatal)
            || cause.downcast_ref::<RangeError>().is_some()
    })
}

fn run(cli: &Cli) -> Result<()> {
    let range = cli
        .expenses
        .as_deref()
        .map(parse_range)
        .transpose()?;

    // Credential first: a missing key must fail before the filesystem is touched.
    let mut builder = OpenAiClientBuilder::new();
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build().map_err(ReceiptError::from)?;
    info!("Using model {} at {}", client.model(), client.base_url());

    let source = ImageSource::open(&cli.dirpath)?;
    let extractor = ReceiptExtractor::new(Arc::new(client));
    let batch = process_directory(&source, &extractor)?;

    if cli.print {
        print_json(&batch).context("Failed to print results")?;
    }

    if let Some(path) = &cli.output {
        write_json(&batch, path)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
    }

    if let Some((start, end)) = range {
        let rows = expenses_in_range(&batch, start, end);
        print!("{}", render_expenses(&rows, start, end));
    }

    if cli.summary {
        print!("{}", render_category_summary(&category_totals(&batch)));
    }

    Ok(())
}

/// Parses the `--expenses START END` pair.
/// A malformed `--expenses` argument.
#[derive(Debug, thiserror::Error)]
enum RangeError {
    #[error("--expenses takes exactly two dates")]
    Arity,
    #[error("Dates must be in YYYY-MM-DD format (e.g., 2026-01-19), got '{0}'")]
    Date(String),
}

fn parse_range(values: &[String]) -> Result<(Date, Date), RangeError> {
    let [start, end] = values else {
        return Err(RangeError::Arity);
    };
    let parse = |s: &str| parse_iso_date(s).ok_or_else(|| RangeError::Date(s.to_string()));
    Ok((parse(start)?, parse(end)?))
}
