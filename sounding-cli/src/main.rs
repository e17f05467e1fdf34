#![deny(missing_docs)]
//! Sounding command-line interface.
//!
//! Analyzes a source tree and renders the code health report as text, JSON,
//! Markdown or HTML.

mod completion;

use clap::{Args, Parser, Subcommand, ValueEnum};
use completion::HttpCompletionClient;
use log::{LevelFilter, info};
use sounding_core::config::ReportingConfig;
use sounding_core::{
    CompletionClient, Config, LlmSummarizer, Pipeline, Report, Severity, StdFileSystem,
    SummaryCache, complexity_label, format_language_stats, format_size, maintainability_label,
    render_html, render_json, render_markdown, report_schema_json,
};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "sounding", version, about = "Code health analysis for source trees")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug, Default)]
struct LlmArgs {
    /// API key for the completion service.
    #[arg(long, env = "SOUNDING_LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Base URL of the completion service.
    #[arg(long, env = "SOUNDING_LLM_BASE_URL")]
    base_url: Option<String>,
    /// Model name sent with each request.
    #[arg(long, env = "SOUNDING_LLM_MODEL")]
    model: Option<String>,
    /// Skip summarization even when enabled in the configuration.
    #[arg(long)]
    no_llm: bool,
    /// Directory for cached summaries.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Delete cached summaries before the run.
    #[arg(long)]
    clear_cache: bool,
}

#[derive(Args, Clone, Debug, Default)]
struct OutputArgs {
    /// Output format; defaults to the first of `reporting.output_formats`.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
    Html,
}

#[derive(Args, Clone, Debug)]
struct AnalyzeArgs {
    /// Root of the source tree.
    path: PathBuf,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Worker pool size for metrics and route extraction.
    #[arg(short = 'j', long)]
    max_workers: Option<usize>,
    #[command(flatten)]
    llm: LlmArgs,
    #[command(flatten)]
    report: OutputArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a source tree and render the report.
    Analyze(AnalyzeArgs),
    /// Write a default configuration file.
    Init {
        /// Destination path.
        #[arg(short, long, default_value = "sounding.json")]
        output: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the OpenAPI schema of the JSON report.
    Schema {
        /// Write the schema to a file instead of stdout.
        #[arg(long = "report-output")]
        report_output: Option<PathBuf>,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await?,
        Commands::Init { output, force } => run_init(&output, force)?,
        Commands::Schema { report_output } => run_schema(report_output).await?,
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

#[cfg_attr(test, allow(dead_code))]
fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.format_timestamp(None).try_init();
}

async fn run_analyze(args: AnalyzeArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args.llm, args.max_workers);
    config.validate()?;

    let mut pipeline = Pipeline::new(config.clone());
    if config.llm.enabled {
        let cache = Arc::new(SummaryCache::new(
            &config.llm.cache_dir,
            config.performance.cache_ttl,
        ));
        if args.llm.clear_cache {
            let removed = cache.clear().await?;
            info!("cleared {removed} cached summaries");
        }
        let client: Arc<dyn CompletionClient> = Arc::new(HttpCompletionClient::new(&config.llm)?);
        pipeline = pipeline.with_summarizer(LlmSummarizer::new(config.llm.clone(), client, cache));
    }

    let report = pipeline.run(&StdFileSystem::new(), &args.path).await?;
    emit_report(&report, &config.reporting, &args.report).await
}

/// Apply command-line and environment values on top of the file config.
fn apply_overrides(config: &mut Config, llm: &LlmArgs, max_workers: Option<usize>) {
    if let Some(api_key) = &llm.api_key {
        config.llm.api_key = api_key.clone();
    }
    if let Some(base_url) = &llm.base_url {
        config.llm.base_url = base_url.clone();
    }
    if let Some(model) = &llm.model {
        config.llm.model = model.clone();
    }
    if let Some(cache_dir) = &llm.cache_dir {
        config.llm.cache_dir = cache_dir.clone();
    }
    if llm.no_llm {
        config.llm.enabled = false;
    }
    if let Some(max_workers) = max_workers {
        config.performance.max_workers = max_workers;
    }
}

fn run_init(output: &Path, force: bool) -> CliResult<()> {
    if output.exists() && !force {
        return Err(format!(
            "{} already exists; pass --force to overwrite",
            output.display()
        )
        .into());
    }
    Config::default().save(output)?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}

async fn run_schema(report_output: Option<PathBuf>) -> CliResult<()> {
    let output = OutputArgs {
        format: None,
        report_output,
    };
    emit_output(&output, report_schema_json()?).await
}

fn resolve_format(output: &OutputArgs, reporting: &ReportingConfig) -> OutputFormat {
    output.format.unwrap_or_else(|| {
        reporting
            .output_formats
            .iter()
            .find_map(|name| OutputFormat::from_str(name, true).ok())
            .unwrap_or(OutputFormat::Text)
    })
}

async fn emit_report(
    report: &Report,
    reporting: &ReportingConfig,
    output: &OutputArgs,
) -> CliResult<()> {
    let contents = match resolve_format(output, reporting) {
        OutputFormat::Text => render_text(report, reporting),
        OutputFormat::Json => render_json(report)?,
        OutputFormat::Markdown => render_markdown(report, reporting),
        OutputFormat::Html => render_html(report, reporting),
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        info!("report written to {}", path.display());
    } else {
        print!("{contents}");
    }
    Ok(())
}

fn render_text(report: &Report, options: &ReportingConfig) -> String {
    let mut output = String::new();
    let info = &report.project_info;
    let totals = &report.metrics.totals;
    let _ = writeln!(output, "Project: {} ({})", info.name, info.root);
    if let Some(description) = &info.description {
        let _ = writeln!(output, "Description: {description}");
    }
    let _ = writeln!(output, "Health score: {}/100", report.test_coverage.health_score);
    let _ = writeln!(
        output,
        "Files: {} ({}), {} measured, {} lines",
        totals.files,
        format_size(totals.total_size),
        totals.measured_files,
        totals.lines_of_code
    );

    if report.structure.languages.is_empty() {
        let _ = writeln!(output, "Languages: none detected");
    } else {
        let _ = writeln!(output, "Languages:");
        for (language, percent) in format_language_stats(&report.structure.languages) {
            let _ = writeln!(output, "- {language}: {percent:.2}%");
        }
    }

    if options.include_metrics {
        let _ = writeln!(output, "Metrics:");
        for entry in &report.metrics.files {
            let Some(snapshot) = &entry.metrics else {
                continue;
            };
            let _ = writeln!(
                output,
                "- {}: {} lines, complexity {} ({}), maintainability {:.1} ({})",
                entry.file.path,
                snapshot.lines_of_code,
                snapshot.complexity,
                complexity_label(snapshot.complexity),
                snapshot.maintainability,
                maintainability_label(snapshot.maintainability)
            );
        }
    }

    let frameworks: Vec<String> = [&report.frameworks.frontend, &report.frameworks.backend]
        .into_iter()
        .flatten()
        .map(|framework| format!("{} {}", framework.name, framework.version))
        .collect();
    if !frameworks.is_empty() {
        let _ = writeln!(output, "Frameworks: {}", frameworks.join(", "));
    }
    if !report.k8s_resources.is_empty() {
        let _ = writeln!(output, "Kubernetes:");
        for resource in &report.k8s_resources {
            let _ = writeln!(
                output,
                "- {} {} in {} ({})",
                resource.kind, resource.name, resource.namespace, resource.file
            );
        }
    }

    let _ = writeln!(
        output,
        "Tests: {} files, {} cases, coverage {:.0}%",
        report.test_coverage.test_files,
        report.test_info.total_test_cases,
        report.test_coverage.test_coverage * 100.0
    );

    if options.include_routes {
        let topology = &report.route_topology;
        let _ = writeln!(
            output,
            "Routes: {} server, {} client, {} matched",
            topology.server.len(),
            topology.client.len(),
            topology.pairs.len()
        );
        for route in &topology.server {
            let _ = writeln!(
                output,
                "- {} {} ({}:{})",
                route.method, route.path, route.file, route.line
            );
        }
        for route in &topology.client {
            let _ = writeln!(output, "- {} ({}:{})", route.path, route.file, route.line);
        }
    }

    if options.include_summaries && !report.llm_summaries.is_empty() {
        let _ = writeln!(output, "Summaries:");
        for summary in &report.llm_summaries {
            let _ = writeln!(output, "- {}: {}", summary.path, summary.text);
        }
    }

    let count = |severity: Severity| {
        report
            .issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    };
    if report.issues.is_empty() {
        let _ = writeln!(output, "Issues: none");
    } else {
        let _ = writeln!(
            output,
            "Issues: {} errors, {} warnings, {} info",
            count(Severity::Error),
            count(Severity::Warning),
            count(Severity::Info)
        );
        for issue in &report.issues {
            let location = match (&issue.file, issue.line) {
                (Some(file), Some(line)) => format!("{file}:{line}: "),
                (Some(file), None) => format!("{file}: "),
                _ => String::new(),
            };
            let _ = writeln!(output, "- [{}] {location}{}", issue.severity, issue.message);
        }
    }
    output
}
