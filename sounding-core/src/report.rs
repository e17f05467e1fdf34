//! Report assembly and the JSON, Markdown and HTML renderers.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ReportingConfig;
use crate::domain::{
    CoverageReport, FileRecord, Issue, LanguageDistribution, LlmSummary, MetricsSnapshot,
    RouteMetadata, RouteTopology, Structure, TestInfo,
};
use crate::error::{Result, SoundingError};
use crate::inspector::{inspect_coverage, inspect_structure};
use crate::k8s::K8sResource;
use crate::manifest::{Dependencies, DetectedFrameworks, FrameworkInfo, ManifestInfo};

/// Identification of the analyzed project and of this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    /// Name of the root directory.
    pub name: String,
    /// Analyzed root as given.
    pub root: String,
    /// RFC 3339 generation time.
    pub generated_at: String,
    /// Unique id of the run.
    pub run_id: String,
    /// Version of the analyzer.
    pub tool_version: String,
    /// Description from the project manifest.
    pub description: Option<String>,
    /// Version from the project manifest.
    pub version: Option<String>,
    /// Manifest the description and version came from.
    pub manifest: Option<String>,
}

/// One file with its metrics, if it was measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Classification result.
    pub file: FileRecord,
    /// Metrics for backend, frontend and test files.
    pub metrics: Option<MetricsSnapshot>,
}

/// Sums and averages over every measured file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsTotals {
    /// Files in the report.
    pub files: usize,
    /// Files with metrics.
    pub measured_files: usize,
    /// Bytes across all files.
    pub total_size: u64,
    /// Total lines across measured files.
    pub lines_of_code: usize,
    /// Code lines.
    pub code_lines: usize,
    /// Comment lines.
    pub comment_lines: usize,
    /// Blank lines.
    pub blank_lines: usize,
    /// Functions.
    pub functions: usize,
    /// Classes.
    pub classes: usize,
    /// Mean complexity per measured file.
    pub average_complexity: f64,
    /// Mean maintainability index per measured file.
    pub average_maintainability: f64,
}

/// Per-file metrics and their totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSection {
    /// Files sorted by path.
    pub files: Vec<FileEntry>,
    /// Aggregates.
    pub totals: MetricsTotals,
}

/// The complete result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Project and run identification.
    pub project_info: ProjectInfo,
    /// File list with metrics.
    pub metrics: MetricsSection,
    /// Every issue raised during the run, sorted by location.
    pub issues: Vec<Issue>,
    /// Tree layout.
    pub structure: Structure,
    /// Client and server routes.
    pub route_topology: RouteTopology,
    /// Test suite overview.
    pub test_info: TestInfo,
    /// Coverage heuristics and health score.
    pub test_coverage: CoverageReport,
    /// Summaries sorted by path.
    pub llm_summaries: Vec<LlmSummary>,
    /// Dependencies declared by the root manifests.
    pub dependencies: Dependencies,
    /// Frameworks implied by the dependencies.
    pub frameworks: DetectedFrameworks,
    /// Kubernetes resources, sorted by file.
    pub k8s_resources: Vec<K8sResource>,
}

/// Values that identify one run. Captured once by the caller so that
/// assembling a report is a pure function of its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Name of the analyzed root directory.
    pub project_name: String,
    /// RFC 3339 generation time.
    pub generated_at: String,
    /// Unique id of the run.
    pub run_id: String,
}

impl RunContext {
    /// Resolve the project name from `root` and stamp the current time and
    /// a fresh run id.
    pub fn capture(root: &Path) -> Self {
        let project_name = root
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(root)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self {
            project_name,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Everything the pipeline computed, ready to be merged.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutputs {
    /// Analyzed root.
    pub root: PathBuf,
    /// Run identification.
    pub run: RunContext,
    /// Manifest values for the project.
    pub manifest: ManifestInfo,
    /// Declared dependencies.
    pub dependencies: Dependencies,
    /// Detected frameworks.
    pub frameworks: DetectedFrameworks,
    /// Kubernetes resources.
    pub k8s_resources: Vec<K8sResource>,
    /// One record per walked file.
    pub records: Vec<FileRecord>,
    /// Metrics for measurable files.
    pub snapshots: Vec<MetricsSnapshot>,
    /// Reconciled routes.
    pub topology: RouteTopology,
    /// Successful summaries.
    pub summaries: Vec<LlmSummary>,
    /// Walk, read and summarization issues.
    pub issues: Vec<Issue>,
    /// Test suite overview.
    pub test_info: TestInfo,
}

/// Merges stage outputs into a [`Report`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportAggregator;

impl ReportAggregator {
    /// Assemble the report; fails only when no files were classified.
    ///
    /// Metric and route issues are copied into the report-level issue list
    /// next to the stage issues.
    pub fn assemble(&self, outputs: AnalysisOutputs) -> Result<Report> {
        if outputs.records.is_empty() {
            return Err(SoundingError::NoInput);
        }
        let AnalysisOutputs {
            root,
            run,
            manifest,
            dependencies,
            frameworks,
            mut k8s_resources,
            mut records,
            snapshots,
            topology,
            mut summaries,
            mut issues,
            test_info,
        } = outputs;

        records.sort_by(|a, b| a.path.cmp(&b.path));
        summaries.sort_by(|a, b| a.path.cmp(&b.path));
        k8s_resources.sort_by(|a, b| a.file.cmp(&b.file));

        for snapshot in &snapshots {
            issues.extend(snapshot.issues.iter().cloned());
        }
        issues.extend(topology.issues.iter().cloned());
        issues.sort_by(|a, b| {
            (&a.file, a.line, a.severity, &a.message).cmp(&(&b.file, b.line, b.severity, &b.message))
        });

        let structure = inspect_structure(&records, &snapshots);
        let test_coverage = inspect_coverage(&records, &issues);
        let totals = compute_totals(&records, &snapshots);

        let mut by_path: HashMap<String, MetricsSnapshot> = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.path.clone(), snapshot))
            .collect();
        let files = records
            .into_iter()
            .map(|file| {
                let metrics = by_path.remove(&file.path);
                FileEntry { file, metrics }
            })
            .collect();

        Ok(Report {
            project_info: project_info(&root, run, manifest),
            metrics: MetricsSection { files, totals },
            issues,
            structure,
            route_topology: topology,
            test_info,
            test_coverage,
            llm_summaries: summaries,
            dependencies,
            frameworks,
            k8s_resources,
        })
    }
}

fn project_info(root: &Path, run: RunContext, manifest: ManifestInfo) -> ProjectInfo {
    ProjectInfo {
        name: run.project_name,
        root: root.display().to_string(),
        generated_at: run.generated_at,
        run_id: run.run_id,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        description: manifest.description,
        version: manifest.version,
        manifest: manifest.source,
    }
}

fn compute_totals(records: &[FileRecord], snapshots: &[MetricsSnapshot]) -> MetricsTotals {
    let mut totals = MetricsTotals {
        files: records.len(),
        measured_files: snapshots.len(),
        total_size: records.iter().map(|record| record.size).sum(),
        ..MetricsTotals::default()
    };
    let mut complexity = 0u64;
    let mut maintainability = 0.0;
    for snapshot in snapshots {
        totals.lines_of_code += snapshot.lines_of_code;
        totals.code_lines += snapshot.code_lines;
        totals.comment_lines += snapshot.comment_lines;
        totals.blank_lines += snapshot.blank_lines;
        totals.functions += snapshot.functions;
        totals.classes += snapshot.classes;
        complexity += u64::from(snapshot.complexity);
        maintainability += snapshot.maintainability;
    }
    if !snapshots.is_empty() {
        let count = snapshots.len() as f64;
        totals.average_complexity = complexity as f64 / count;
        totals.average_maintainability = maintainability / count;
    }
    totals
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Format language stats sorted by percentage.
pub fn format_language_stats(stats: &LanguageDistribution) -> Vec<(String, f64)> {
    let mut items: Vec<(String, f64)> = stats.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items
}

/// `Low`, `Medium` or `High`.
pub fn complexity_label(complexity: u32) -> &'static str {
    match complexity {
        0..=5 => "Low",
        6..=10 => "Medium",
        _ => "High",
    }
}

/// `Good`, `Fair` or `Poor`.
pub fn maintainability_label(index: f64) -> &'static str {
    if index >= 80.0 {
        "Good"
    } else if index >= 60.0 {
        "Fair"
    } else {
        "Poor"
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Render the report as Markdown.
pub fn render_markdown(report: &Report, options: &ReportingConfig) -> String {
    let mut output = String::new();
    let info = &report.project_info;
    let _ = writeln!(output, "# Code Health Report: {}\n", info.name);
    let _ = writeln!(output, "- Root: `{}`", info.root);
    if let Some(description) = &info.description {
        let _ = writeln!(output, "- Description: {description}");
    }
    if let Some(version) = &info.version {
        let _ = writeln!(output, "- Version: {version}");
    }
    let _ = writeln!(output, "- Generated: {}", info.generated_at);
    let _ = writeln!(output, "- Run: {}", info.run_id);
    let _ = writeln!(output, "- Health score: {}/100\n", report.test_coverage.health_score);

    append_overview(&mut output, report);
    append_language_stats(&mut output, &report.structure.languages);
    if options.include_metrics {
        append_metrics(&mut output, &report.metrics);
    }
    append_stack(&mut output, report);
    append_tests(&mut output, report);
    if options.include_routes {
        append_routes(&mut output, &report.route_topology);
    }
    if options.include_summaries {
        append_summaries(&mut output, &report.llm_summaries);
    }
    append_k8s(&mut output, &report.k8s_resources);
    append_issues(&mut output, &report.issues);
    output
}

fn append_overview(output: &mut String, report: &Report) {
    let totals = &report.metrics.totals;
    let _ = writeln!(output, "## Overview\n");
    let _ = writeln!(output, "- Files: {} ({})", totals.files, format_size(totals.total_size));
    let _ = writeln!(output, "- Measured files: {}", totals.measured_files);
    let _ = writeln!(output, "- Lines of code: {}", totals.lines_of_code);
    let _ = writeln!(
        output,
        "- Average complexity: {:.1}",
        totals.average_complexity
    );
    let _ = writeln!(
        output,
        "- Average maintainability: {:.1}",
        totals.average_maintainability
    );
    for (category, count) in &report.structure.categories {
        let _ = writeln!(output, "- {category}: {count}");
    }
    let _ = writeln!(output);
}

fn append_language_stats(output: &mut String, stats: &LanguageDistribution) {
    if stats.is_empty() {
        let _ = writeln!(output, "## Languages\nNo languages detected.\n");
        return;
    }
    let _ = writeln!(output, "## Languages");
    for (language, percent) in format_language_stats(stats) {
        let _ = writeln!(output, "- {language}: {percent:.2}%");
    }
    let _ = writeln!(output);
}

fn append_metrics(output: &mut String, metrics: &MetricsSection) {
    let measured: Vec<(&FileRecord, &MetricsSnapshot)> = metrics
        .files
        .iter()
        .filter_map(|entry| entry.metrics.as_ref().map(|m| (&entry.file, m)))
        .collect();
    if measured.is_empty() {
        let _ = writeln!(output, "## Metrics\nNo files measured.\n");
        return;
    }
    let _ = writeln!(output, "## Metrics\n");
    let _ = writeln!(
        output,
        "| File | Language | Size | LOC | Code | Comments | Functions | Complexity | Maintainability |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
    for (file, snapshot) in measured {
        let _ = writeln!(
            output,
            "| `{}` | {} | {} | {} | {} | {} | {} | {} ({}) | {:.1} ({}) |",
            file.path,
            snapshot.language.as_deref().unwrap_or("-"),
            format_size(file.size),
            snapshot.lines_of_code,
            snapshot.code_lines,
            snapshot.comment_lines,
            snapshot.functions,
            snapshot.complexity,
            complexity_label(snapshot.complexity),
            snapshot.maintainability,
            maintainability_label(snapshot.maintainability),
        );
    }
    let _ = writeln!(output);
}

fn framework_label(framework: Option<&FrameworkInfo>) -> String {
    match framework {
        Some(framework) => format!("{} {}", framework.name, framework.version),
        None => "none detected".to_string(),
    }
}

fn append_stack(output: &mut String, report: &Report) {
    let dependencies = &report.dependencies;
    let _ = writeln!(output, "## Stack\n");
    let _ = writeln!(
        output,
        "- Frontend framework: {}",
        framework_label(report.frameworks.frontend.as_ref())
    );
    let _ = writeln!(
        output,
        "- Backend framework: {}",
        framework_label(report.frameworks.backend.as_ref())
    );
    let groups = [
        ("Python", &dependencies.python),
        ("Node", &dependencies.node.dependencies),
        ("Node (dev)", &dependencies.node.dev_dependencies),
        ("Rust", &dependencies.rust),
    ];
    for (label, declared) in groups {
        if declared.is_empty() {
            continue;
        }
        let listed: Vec<String> = declared
            .iter()
            .map(|(name, version)| format!("{name} {version}"))
            .collect();
        let _ = writeln!(output, "- {label} dependencies: {}", listed.join(", "));
    }
    let _ = writeln!(output);
}

fn append_k8s(output: &mut String, resources: &[K8sResource]) {
    if resources.is_empty() {
        return;
    }
    let _ = writeln!(output, "## Kubernetes\n");
    let _ = writeln!(output, "| File | Kind | Name | Namespace |");
    let _ = writeln!(output, "|---|---|---|---|");
    for resource in resources {
        let _ = writeln!(
            output,
            "| `{}` | {} | {} | {} |",
            resource.file, resource.kind, resource.name, resource.namespace
        );
    }
    let _ = writeln!(output);
}

fn append_tests(output: &mut String, report: &Report) {
    let coverage = &report.test_coverage;
    let _ = writeln!(output, "## Tests\n");
    let _ = writeln!(
        output,
        "- Test files: {} of {} code files ({:.0}%)",
        coverage.test_files,
        coverage.code_files,
        coverage.test_coverage * 100.0
    );
    let _ = writeln!(
        output,
        "- Doc files: {} ({:.0}%)",
        coverage.doc_files,
        coverage.doc_coverage * 100.0
    );
    let _ = writeln!(output, "- Test cases: {}", report.test_info.total_test_cases);
    if !report.test_info.frameworks.is_empty() {
        let _ = writeln!(
            output,
            "- Frameworks: {}",
            report.test_info.frameworks.join(", ")
        );
    }
    if coverage.low_test_coverage {
        let _ = writeln!(output, "- Warning: low test coverage");
    }
    if coverage.low_doc_coverage {
        let _ = writeln!(output, "- Warning: low documentation coverage");
    }
    let _ = writeln!(output);
}

fn append_routes(output: &mut String, topology: &RouteTopology) {
    let _ = writeln!(output, "## Routes\n");
    if topology.server.is_empty() {
        let _ = writeln!(output, "### Server\nNo server routes found.\n");
    } else {
        let _ = writeln!(output, "### Server\n");
        for route in &topology.server {
            let _ = writeln!(
                output,
                "- `{} {}` ({}, {}:{}){}",
                route.method,
                route.path,
                route.framework,
                route.file,
                route.line,
                if route.metadata.auth_required { " auth" } else { "" }
            );
            append_handler(output, &route.metadata);
        }
        let _ = writeln!(output);
    }
    if topology.client.is_empty() {
        let _ = writeln!(output, "### Client\nNo client routes found.\n");
    } else {
        let _ = writeln!(output, "### Client\n");
        for route in &topology.client {
            let _ = writeln!(
                output,
                "- `{}` ({}, {}:{}){}",
                route.path,
                route.framework,
                route.file,
                route.line,
                if route.metadata.lazy { " lazy" } else { "" }
            );
        }
        let _ = writeln!(output);
    }
    if !topology.pairs.is_empty() {
        let _ = writeln!(output, "### Matches\n");
        for pair in &topology.pairs {
            let _ = writeln!(
                output,
                "- `{}` -> `{} {}` (score {:.2})",
                pair.client_path, pair.server_method, pair.server_path, pair.match_score
            );
        }
        let _ = writeln!(output);
    }
}

fn append_handler(output: &mut String, metadata: &RouteMetadata) {
    let Some(handler) = &metadata.component else {
        return;
    };
    if metadata.parameters.is_empty() && metadata.docstring.is_none() {
        return;
    }
    let parameters: Vec<String> = metadata
        .parameters
        .iter()
        .map(|p| {
            let optional = if p.required { "" } else { "?" };
            format!("{}{optional}: {}", p.name, p.type_name)
        })
        .collect();
    let summary = metadata
        .docstring
        .as_deref()
        .and_then(|doc| doc.lines().next())
        .map(|line| format!(" {line}"))
        .unwrap_or_default();
    let _ = writeln!(output, "  - `{handler}({})`{summary}", parameters.join(", "));
}

fn append_summaries(output: &mut String, summaries: &[LlmSummary]) {
    if summaries.is_empty() {
        let _ = writeln!(output, "## Summaries\nNo summaries generated.\n");
        return;
    }
    let _ = writeln!(output, "## Summaries\n");
    for summary in summaries {
        let _ = writeln!(output, "### `{}`\n\n{}\n", summary.path, summary.text);
    }
}

fn append_issues(output: &mut String, issues: &[Issue]) {
    if issues.is_empty() {
        let _ = writeln!(output, "## Issues\nNo issues found.\n");
        return;
    }
    let _ = writeln!(output, "## Issues");
    for issue in issues {
        let _ = writeln!(output, "- [{}] {}{}", issue.severity, location(issue), issue.message);
    }
    let _ = writeln!(output);
}

fn location(issue: &Issue) -> String {
    match (&issue.file, issue.line) {
        (Some(file), Some(line)) => format!("{file}:{line}: "),
        (Some(file), None) => format!("{file}: "),
        _ => String::new(),
    }
}

const HTML_STYLE: &str = "body{font-family:sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
.warning{color:#a60}.error{color:#b00}.info{color:#555}pre{white-space:pre-wrap}";

fn esc(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Render the report as a standalone HTML page.
pub fn render_html(report: &Report, options: &ReportingConfig) -> String {
    let mut output = String::new();
    let info = &report.project_info;
    let _ = writeln!(
        output,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Code Health Report: {}</title>\n<style>{HTML_STYLE}</style>\n</head>\n<body>",
        esc(&info.name)
    );
    let _ = writeln!(output, "<h1>Code Health Report: {}</h1>", esc(&info.name));
    let _ = writeln!(output, "<ul>");
    let _ = writeln!(output, "<li>Root: <code>{}</code></li>", esc(&info.root));
    if let Some(description) = &info.description {
        let _ = writeln!(output, "<li>Description: {}</li>", esc(description));
    }
    let _ = writeln!(output, "<li>Generated: {}</li>", esc(&info.generated_at));
    let _ = writeln!(
        output,
        "<li>Health score: {}/100</li>",
        report.test_coverage.health_score
    );
    let totals = &report.metrics.totals;
    let _ = writeln!(
        output,
        "<li>Files: {} ({})</li>\n<li>Lines of code: {}</li>\n</ul>",
        totals.files,
        format_size(totals.total_size),
        totals.lines_of_code
    );

    let _ = writeln!(output, "<h2>Languages</h2>\n<ul>");
    for (language, percent) in format_language_stats(&report.structure.languages) {
        let _ = writeln!(output, "<li>{}: {percent:.2}%</li>", esc(&language));
    }
    let _ = writeln!(output, "</ul>");

    if options.include_metrics {
        let _ = writeln!(
            output,
            "<h2>Metrics</h2>\n<table>\n<tr><th>File</th><th>Language</th><th>LOC</th><th>Complexity</th><th>Maintainability</th></tr>"
        );
        for entry in &report.metrics.files {
            let Some(snapshot) = &entry.metrics else {
                continue;
            };
            let _ = writeln!(
                output,
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{} ({})</td><td>{:.1} ({})</td></tr>",
                esc(&entry.file.path),
                esc(snapshot.language.as_deref().unwrap_or("-")),
                snapshot.lines_of_code,
                snapshot.complexity,
                complexity_label(snapshot.complexity),
                snapshot.maintainability,
                maintainability_label(snapshot.maintainability)
            );
        }
        let _ = writeln!(output, "</table>");
    }

    if options.include_routes {
        let topology = &report.route_topology;
        let _ = writeln!(
            output,
            "<h2>Routes</h2>\n<table>\n<tr><th>Side</th><th>Method</th><th>Path</th><th>Framework</th><th>Location</th></tr>"
        );
        for route in topology.server.iter().chain(topology.client.iter()) {
            let _ = writeln!(
                output,
                "<tr><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td><td>{}:{}</td></tr>",
                route.side,
                esc(&route.method),
                esc(&route.path),
                route.framework,
                esc(&route.file),
                route.line
            );
        }
        let _ = writeln!(output, "</table>");
    }

    let _ = writeln!(
        output,
        "<h2>Stack</h2>\n<ul>\n<li>Frontend framework: {}</li>\n<li>Backend framework: {}</li>\n</ul>",
        esc(&framework_label(report.frameworks.frontend.as_ref())),
        esc(&framework_label(report.frameworks.backend.as_ref()))
    );

    if !report.k8s_resources.is_empty() {
        let _ = writeln!(
            output,
            "<h2>Kubernetes</h2>\n<table>\n<tr><th>File</th><th>Kind</th><th>Name</th><th>Namespace</th></tr>"
        );
        for resource in &report.k8s_resources {
            let _ = writeln!(
                output,
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                esc(&resource.file),
                esc(&resource.kind),
                esc(&resource.name),
                esc(&resource.namespace)
            );
        }
        let _ = writeln!(output, "</table>");
    }

    if options.include_summaries && !report.llm_summaries.is_empty() {
        let _ = writeln!(output, "<h2>Summaries</h2>");
        for summary in &report.llm_summaries {
            let _ = writeln!(
                output,
                "<h3><code>{}</code></h3>\n<pre>{}</pre>",
                esc(&summary.path),
                esc(&summary.text)
            );
        }
    }

    let _ = writeln!(output, "<h2>Issues</h2>");
    if report.issues.is_empty() {
        let _ = writeln!(output, "<p>No issues found.</p>");
    } else {
        let _ = writeln!(output, "<ul>");
        for issue in &report.issues {
            let _ = writeln!(
                output,
                "<li class=\"{}\">[{}] {}{}</li>",
                issue.severity,
                issue.severity,
                esc(&location(issue)),
                esc(&issue.message)
            );
        }
        let _ = writeln!(output, "</ul>");
    }
    let _ = writeln!(output, "</body>\n</html>");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CacheStatus, Category, Framework, RouteEntry, RouteMetadata, RouteParameter, Severity,
        Side,
    };

    fn record(path: &str, category: Category, size: u64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            category,
            size,
            content_hash: Some(format!("hash-{path}")),
            route_source: None,
        }
    }

    fn snapshot(path: &str, complexity: u32, maintainability: f64) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::empty(path);
        snapshot.language = Some("Python".to_string());
        snapshot.lines_of_code = 10;
        snapshot.code_lines = 8;
        snapshot.blank_lines = 2;
        snapshot.complexity = complexity;
        snapshot.maintainability = maintainability;
        snapshot
    }

    fn sample_outputs() -> AnalysisOutputs {
        let mut measured = snapshot("app/views.py", 12, 55.0);
        measured.issues.push(
            Issue::warning("app/views.py", "complexity 12 exceeds threshold 10").at_line(1),
        );
        let mut dependencies = Dependencies::default();
        dependencies.python.insert("Flask".to_string(), "3.0.2".to_string());
        AnalysisOutputs {
            root: PathBuf::from("/work/shop"),
            run: RunContext {
                project_name: "shop".to_string(),
                generated_at: "2026-01-02T03:04:05Z".to_string(),
                run_id: "run-1".to_string(),
            },
            frameworks: crate::manifest::detect_frameworks(&dependencies),
            dependencies,
            k8s_resources: vec![K8sResource {
                file: "deploy/web.yaml".to_string(),
                kind: "Deployment".to_string(),
                name: "web".to_string(),
                namespace: "shop".to_string(),
            }],
            manifest: ManifestInfo {
                source: Some("pyproject.toml".to_string()),
                description: Some("Shop <backend>".to_string()),
                version: Some("0.1.0".to_string()),
            },
            records: vec![
                record("app/views.py", Category::Backend, 2048),
                record("README.md", Category::Docs, 100),
                record("app/models.py", Category::Backend, 10),
            ],
            snapshots: vec![measured, snapshot("app/models.py", 2, 90.0)],
            topology: RouteTopology {
                server: vec![RouteEntry {
                    path: "/users/:id".to_string(),
                    raw_path: "/users/<int:id>".to_string(),
                    method: "GET".to_string(),
                    side: Side::Server,
                    framework: Framework::Flask,
                    file: "app/views.py".to_string(),
                    line: 4,
                    metadata: RouteMetadata {
                        component: Some("show_user".to_string()),
                        parameters: vec![RouteParameter {
                            name: "id".to_string(),
                            type_name: "int".to_string(),
                            required: true,
                        }],
                        docstring: Some("Show one user.\n\nDetails.".to_string()),
                        ..RouteMetadata::default()
                    },
                }],
                issues: vec![
                    Issue::info(
                        "app/views.py",
                        "server route GET /users/:id is not referenced by any client route",
                    )
                    .at_line(4),
                ],
                ..RouteTopology::default()
            },
            summaries: vec![LlmSummary {
                path: "app/views.py".to_string(),
                text: "Serves <users>.".to_string(),
                cache_status: CacheStatus::Miss,
                source_hash: "hash-app/views.py".to_string(),
            }],
            issues: vec![Issue::error("app/models.py", "summary failed: rate limited")],
            test_info: TestInfo::default(),
        }
    }

    #[test]
    fn assemble_requires_files() {
        let err = ReportAggregator
            .assemble(AnalysisOutputs::default())
            .expect_err("no input");
        assert!(matches!(err, SoundingError::NoInput));
    }

    #[test]
    fn assemble_sorts_and_merges() {
        let report = ReportAggregator.assemble(sample_outputs()).expect("report");

        let paths: Vec<&str> = report
            .metrics
            .files
            .iter()
            .map(|entry| entry.file.path.as_str())
            .collect();
        assert_eq!(paths, vec!["README.md", "app/models.py", "app/views.py"]);
        assert!(report.metrics.files[0].metrics.is_none());
        assert_eq!(report.metrics.files[2].metrics.as_ref().map(|m| m.complexity), Some(12));

        assert_eq!(report.metrics.totals.files, 3);
        assert_eq!(report.metrics.totals.measured_files, 2);
        assert_eq!(report.metrics.totals.total_size, 2158);
        assert_eq!(report.metrics.totals.lines_of_code, 20);
        assert_eq!(report.metrics.totals.average_complexity, 7.0);

        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.issues[0].file.as_deref(), Some("app/models.py"));
        assert_eq!(report.issues[1].line, Some(1));
        assert_eq!(report.issues[2].severity, Severity::Info);

        assert_eq!(report.project_info.name, "shop");
        assert_eq!(report.project_info.run_id, "run-1");
        assert_eq!(report.project_info.generated_at, "2026-01-02T03:04:05Z");
        assert_eq!(report.project_info.version.as_deref(), Some("0.1.0"));
        assert_eq!(report.structure.categories.get(&Category::Backend), Some(&2));
    }

    #[test]
    fn assembly_is_deterministic() {
        let first = ReportAggregator.assemble(sample_outputs()).expect("report");
        let second = ReportAggregator.assemble(sample_outputs()).expect("report");

        assert_eq!(first, second);
    }

    #[test]
    fn run_context_names_the_root_and_stamps_each_run() {
        let first = RunContext::capture(Path::new("/no/such/place/shop"));
        let second = RunContext::capture(Path::new("/no/such/place/shop"));

        assert_eq!(first.project_name, "shop");
        assert!(first.generated_at.ends_with('Z'));
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn stack_and_kubernetes_sections_are_rendered() {
        let report = ReportAggregator.assemble(sample_outputs()).expect("report");

        let markdown = render_markdown(&report, &ReportingConfig::default());
        assert!(markdown.contains("- Backend framework: Flask 3.0.2"));
        assert!(markdown.contains("- Frontend framework: none detected"));
        assert!(markdown.contains("- Python dependencies: Flask 3.0.2"));
        assert!(markdown.contains("| `deploy/web.yaml` | Deployment | web | shop |"));
        assert!(markdown.contains("  - `show_user(id: int)` Show one user."));

        let html = render_html(&report, &ReportingConfig::default());
        assert!(html.contains("<li>Backend framework: Flask 3.0.2</li>"));
        assert!(html.contains("<td>Deployment</td>"));
    }

    #[test]
    fn json_uses_documented_shape() {
        let report = ReportAggregator.assemble(sample_outputs()).expect("report");
        let json = render_json(&report).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");

        for key in [
            "projectInfo",
            "metrics",
            "issues",
            "structure",
            "routeTopology",
            "testInfo",
            "testCoverage",
            "llmSummaries",
            "dependencies",
            "frameworks",
            "k8sResources",
        ] {
            assert!(parsed.get(key).is_some(), "missing {key}");
        }
        assert_eq!(parsed["llmSummaries"][0]["cacheStatus"], "miss");
        assert_eq!(parsed["routeTopology"]["server"][0]["rawPath"], "/users/<int:id>");
    }

    #[test]
    fn markdown_respects_include_flags() {
        let report = ReportAggregator.assemble(sample_outputs()).expect("report");

        let full = render_markdown(&report, &ReportingConfig::default());
        assert!(full.contains("# Code Health Report: shop"));
        assert!(full.contains("| `app/views.py` | Python | 2.0 KB |"));
        assert!(full.contains("12 (High)"));
        assert!(full.contains("55.0 (Poor)"));
        assert!(full.contains("`GET /users/:id`"));
        assert!(full.contains("Serves <users>."));
        assert!(full.contains("[error] app/models.py: summary failed: rate limited"));

        let options = ReportingConfig {
            include_metrics: false,
            include_routes: false,
            include_summaries: false,
            ..ReportingConfig::default()
        };
        let trimmed = render_markdown(&report, &options);
        assert!(!trimmed.contains("## Metrics"));
        assert!(!trimmed.contains("## Routes"));
        assert!(!trimmed.contains("## Summaries"));
        assert!(trimmed.contains("## Issues"));
    }

    #[test]
    fn html_escapes_text() {
        let report = ReportAggregator.assemble(sample_outputs()).expect("report");
        let html = render_html(&report, &ReportingConfig::default());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Shop &lt;backend&gt;"));
        assert!(html.contains("<pre>Serves &lt;users&gt;.</pre>"));
        assert!(html.contains("<li class=\"error\">"));
    }

    #[test]
    fn labels_follow_thresholds() {
        assert_eq!(complexity_label(5), "Low");
        assert_eq!(complexity_label(6), "Medium");
        assert_eq!(complexity_label(10), "Medium");
        assert_eq!(complexity_label(11), "High");
        assert_eq!(maintainability_label(80.0), "Good");
        assert_eq!(maintainability_label(79.9), "Fair");
        assert_eq!(maintainability_label(59.9), "Poor");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn formats_language_stats_sorted() {
        let mut stats = LanguageDistribution::new();
        stats.insert("Go".to_string(), 10.0);
        stats.insert("Rust".to_string(), 30.0);
        let ordered = format_language_stats(&stats);
        assert_eq!(ordered[0].0, "Rust");
    }
}
