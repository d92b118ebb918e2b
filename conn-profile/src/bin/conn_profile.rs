//! conn-profile command line
//!
//! Profiles one or more connection-log files, prints each report and
//! writes it under `analysis_reports/`. Exits with status 1 when no file
//! could be profiled.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use conn_profile::config::ProfilerConfig;
use conn_profile::formatters::{formatter_for, FormatterConfig, ReportFormat, ReportFormatter};
use conn_profile::logging::setup::{init_logging, LoggingConfig};
use conn_profile::logging::LogConfig;
use conn_profile::runner::ProfileRunner;
use conn_profile::sink::{DirectoryReportSink, ReportSink};
use conn_profile::snapshot::{ProfileSnapshot, MERGED_SOURCE};
use conn_profile::sources::discover_inputs;
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(
    name = "conn-profile",
    version,
    about = "Streaming statistical profiler for labeled connection logs"
)]
struct Cli {
    /// Files, directories (all *.csv inside) or glob patterns
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Rows per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Leading rows sampled for schema discovery
    #[arg(long)]
    sample_rows: Option<usize>,

    /// Field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    format: ReportFormat,

    /// Directory for report files instead of analysis_reports/ beside the input
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print reports without writing report files
    #[arg(long)]
    no_write: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also report the merge of every profiled file
    #[arg(long)]
    merge: bool,

    /// Files profiled concurrently
    #[arg(long)]
    jobs: Option<usize>,

    /// Maximum rows shown per frequency table
    #[arg(long)]
    max_categories: Option<usize>,

    /// Log level for the profiler
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn profiler_config(&self) -> Result<ProfilerConfig> {
        let mut config = match &self.config {
            Some(path) => ProfilerConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ProfilerConfig::default(),
        };

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(rows) = self.sample_rows {
            config.schema_sample_rows = rows;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_files = jobs;
        }

        config.validate()?;
        Ok(config)
    }

    fn log_config(&self) -> LogConfig {
        if self.log_level >= Level::DEBUG {
            LogConfig::verbose()
        } else if self.log_level <= Level::WARN {
            LogConfig::production()
        } else {
            LogConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::default()
            .with_profiler_level(cli.log_level)
            .with_json_format(cli.json_logs),
    )?;

    let config = cli.profiler_config()?;
    let inputs = discover_inputs(&cli.paths)?;

    let runner = ProfileRunner::new(config)
        .with_log_config(cli.log_config())
        .on_progress(|progress| {
            info!(
                completed = progress.completed,
                total = progress.total,
                path = %progress.path.display(),
                succeeded = progress.succeeded,
                "File finished"
            );
        });
    let summary = runner.profile_paths(inputs).await;

    let formatter = formatter_for(
        cli.format,
        FormatterConfig::default().with_max_categories(cli.max_categories),
    );
    let sink = match &cli.output_dir {
        Some(dir) => DirectoryReportSink::with_output_dir(dir),
        None => DirectoryReportSink::new(),
    };

    for outcome in summary.outcomes() {
        match &outcome.result {
            Ok(snapshot) => {
                emit(&cli, formatter.as_ref(), &sink, &outcome.path, snapshot).await?;
            }
            Err(e) => eprintln!("Error analyzing {}: {e}", outcome.path.display()),
        }
    }

    if cli.merge && summary.succeeded() > 1 {
        let merged = summary.merged()?;
        // Merged report lands beside the first profiled file's report
        let anchor = summary
            .outcomes()
            .iter()
            .find(|o| o.result.is_ok())
            .map(|o| o.path.with_file_name(MERGED_SOURCE))
            .unwrap_or_else(|| PathBuf::from(MERGED_SOURCE));
        emit(&cli, formatter.as_ref(), &sink, &anchor, &merged).await?;
    }

    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "Analysis completed in {:.2} seconds",
        summary.elapsed().as_secs_f64()
    );

    if !summary.any_succeeded() {
        process::exit(1);
    }
    Ok(())
}

async fn emit(
    cli: &Cli,
    formatter: &dyn ReportFormatter,
    sink: &dyn ReportSink,
    input: &Path,
    snapshot: &ProfileSnapshot,
) -> Result<()> {
    let report = formatter.format(snapshot)?;

    if cli.format == ReportFormat::Human {
        println!("\n--- Analysis of {} ---", snapshot.source());
    }
    println!("{report}");

    if !cli.no_write {
        match sink
            .write_report(input, formatter.extension(), &report)
            .await
        {
            Ok(path) => info!(report = %path.display(), "Report written"),
            Err(e) => warn!(error = %e, "Could not write report"),
        }
    }
    Ok(())
}
