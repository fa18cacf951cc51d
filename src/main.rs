use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use msgflow::config::{AnalysisOptions, IndicatorSets};
use msgflow::core::{CorrelationSummary, FlowAnalyzer};
use msgflow::formatters::{CypherFormatter, JsonFormatter, MarkdownFormatter, OutputFormat};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "msgflow",
    version,
    about = "Extracts event publishers, consumers and subscriptions across repositories"
)]
struct Cli {
    /// Root directory holding the repositories to analyze
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Directory the reports are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Comma-separated export formats: json, markdown, cypher
    #[arg(
        short,
        long,
        value_name = "FORMATS",
        value_enum,
        value_delimiter = ',',
        default_value = "json,markdown"
    )]
    format: Vec<OutputFormat>,

    /// Capture handler body snippets
    #[arg(long)]
    details: bool,

    /// Keep only publishers and consumers running inside background jobs
    #[arg(long)]
    background_jobs_only: bool,

    /// Skip test projects and test assemblies
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    exclude_tests: bool,

    /// Take publish sites from compiled module dumps under bin/ instead of source text
    #[arg(long)]
    bytecode: bool,

    /// JSON file overriding the indicator token lists
    #[arg(long, value_name = "FILE")]
    indicators: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli)
}

fn init_logging(cli: &Cli) {
    let level = if let Some(level_str) = &cli.log_level {
        parse_level(level_str)
    } else if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("MSGFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("msgflow={level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        input,
        output_dir,
        format,
        details,
        background_jobs_only,
        exclude_tests,
        bytecode,
        indicators,
        ..
    } = cli;

    let start_time = Instant::now();

    let indicators = match indicators {
        Some(path) => IndicatorSets::from_json_file(&path)
            .with_context(|| format!("loading indicators from {}", path.display()))?,
        None => IndicatorSets::default(),
    };
    let options = AnalysisOptions {
        include_details: details,
        background_jobs_only,
        exclude_tests,
        bytecode_publishers: bytecode,
    };

    info!(input = %input.display(), ?options, "msgflow starting");

    let analyzer = FlowAnalyzer::new(indicators, options)?;
    let outcome = analyzer.analyze(&input)?;
    let report = &outcome.report;

    for failure in &outcome.failures {
        warn!(unit = %failure.path.display(), reason = %failure.reason, "unit skipped");
    }

    let summary = CorrelationSummary::from_report(report);
    info!(
        repositories = report.repository_count,
        projects = report.project_count,
        events = report.events.len(),
        orphaned = summary.orphaned.len(),
        dead_letters = summary.dead_letters.len(),
        "correlation complete"
    );

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    for format in OutputFormat::distinct(format) {
        let path = output_dir.join(format.file_name());
        match format {
            OutputFormat::Json => JsonFormatter::new().format_to_file(report, &path)?,
            OutputFormat::Markdown => MarkdownFormatter::new().format_to_file(report, &path)?,
            OutputFormat::Cypher => CypherFormatter::new().format_to_file(report, &path)?,
        }
        info!(output = %path.display(), "report written");
    }

    info!(elapsed_secs = start_time.elapsed().as_secs_f64(), "done");
    Ok(())
}
