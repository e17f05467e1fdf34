//! Domain entities for Sounding.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A mapping of language names to their percentage of total lines.
pub type LanguageDistribution = BTreeMap<String, f64>;

/// Category assigned to every file by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Server-side source code.
    Backend,
    /// Client-side source code.
    Frontend,
    /// Test sources.
    Test,
    /// Documentation.
    Docs,
    /// Database schemas and migrations.
    Database,
    /// Container build files.
    Docker,
    /// Kubernetes manifests.
    K8s,
    /// Anything no rule matched.
    Other,
}

impl Category {
    /// Stable lowercase name used in reports and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
            Self::Test => "test",
            Self::Docs => "docs",
            Self::Database => "database",
            Self::Docker => "docker",
            Self::K8s => "k8s",
            Self::Other => "other",
        }
    }

    /// Whether files of this category get line metrics.
    pub fn has_metrics(self) -> bool {
        matches!(self, Self::Backend | Self::Frontend | Self::Test)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of an application a route belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Client-side navigation routes.
    Client,
    /// Server-side API endpoints.
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Routing frameworks with a dedicated route extractor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Framework {
    /// FastAPI decorators.
    #[serde(rename = "fastapi")]
    FastApi,
    /// Flask `route` decorators.
    #[serde(rename = "flask")]
    Flask,
    /// Express `app`/`router` method calls.
    #[serde(rename = "express")]
    Express,
    /// Axum `Router::route` calls.
    #[serde(rename = "axum")]
    Axum,
    /// React Router elements and route objects.
    #[serde(rename = "react")]
    ReactRouter,
    /// Vue Router route records.
    #[serde(rename = "vue")]
    VueRouter,
}

impl Framework {
    /// The side of the application this framework declares routes for.
    pub fn side(self) -> Side {
        match self {
            Self::FastApi | Self::Flask | Self::Express | Self::Axum => Side::Server,
            Self::ReactRouter | Self::VueRouter => Side::Client,
        }
    }

    /// Stable lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FastApi => "fastapi",
            Self::Flask => "flask",
            Self::Express => "express",
            Self::Axum => "axum",
            Self::ReactRouter => "react",
            Self::VueRouter => "vue",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified file. Created once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the analyzed root, `/`-separated.
    pub path: String,
    /// Assigned category.
    pub category: Category,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the file bytes, absent when the file could not be read.
    pub content_hash: Option<String>,
    /// Route extractor selected for this file, if any.
    pub route_source: Option<Framework>,
}

/// Issue severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Something worth a look.
    Warning,
    /// A failure for a single file.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A diagnostic produced anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// How serious the issue is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// File the issue refers to.
    pub file: Option<String>,
    /// 1-based line number within `file`.
    pub line: Option<usize>,
}

impl Issue {
    /// Create an issue without a location.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Informational issue for a file.
    pub fn info(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message).in_file(file)
    }

    /// Warning issue for a file.
    pub fn warning(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message).in_file(file)
    }

    /// Error issue for a file.
    pub fn error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message).in_file(file)
    }

    /// Attach a file location.
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a line number.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Per-file size and complexity metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Path of the measured file.
    pub path: String,
    /// Language detected by `tokei`, if any.
    pub language: Option<String>,
    /// Total lines; always `code_lines + comment_lines + blank_lines`.
    pub lines_of_code: usize,
    /// Lines containing code.
    pub code_lines: usize,
    /// Full-line comments and lines inside block comments.
    pub comment_lines: usize,
    /// Whitespace-only lines.
    pub blank_lines: usize,
    /// Detected function declarations.
    pub functions: usize,
    /// Detected class-like declarations.
    pub classes: usize,
    /// Approximate cyclomatic complexity.
    pub complexity: u32,
    /// Approximate maintainability index, 0-100.
    pub maintainability: f64,
    /// Issues raised while measuring this file.
    pub issues: Vec<Issue>,
}

impl MetricsSnapshot {
    /// An all-zero snapshot for files that could not be measured.
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: None,
            lines_of_code: 0,
            code_lines: 0,
            comment_lines: 0,
            blank_lines: 0,
            functions: 0,
            classes: 0,
            complexity: 0,
            maintainability: 0.0,
            issues: Vec::new(),
        }
    }
}

/// Metadata markers found near a route declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetadata {
    /// An auth keyword was found near the declaration.
    pub auth_required: bool,
    /// Guard names found near the declaration.
    pub guards: Vec<String>,
    /// A rate-limit keyword was found.
    pub rate_limited: bool,
    /// A cache keyword was found.
    pub cached: bool,
    /// The client route loads its component lazily.
    pub lazy: bool,
    /// Component or handler named by the declaration.
    pub component: Option<String>,
    /// Handler signature parameters, for decorator-declared server routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RouteParameter>,
    /// First docstring of the handler body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

/// One parameter of a route handler signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteParameter {
    /// Parameter name.
    pub name: String,
    /// Annotation text, `Any` when unannotated.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Positional parameters are required; keyword-only ones are not.
    pub required: bool,
}

/// A single route declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    /// Normalized path pattern, parameters rendered as `:name`.
    pub path: String,
    /// Path exactly as declared.
    pub raw_path: String,
    /// HTTP method for server routes, `NAV` for client routes.
    pub method: String,
    /// Client or server.
    pub side: Side,
    /// Framework that declared the route.
    pub framework: Framework,
    /// Declaring file.
    pub file: String,
    /// 1-based declaration line.
    pub line: usize,
    /// Nearby markers.
    pub metadata: RouteMetadata,
}

/// A client route linked to the server endpoint it calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePair {
    /// Normalized client path.
    pub client_path: String,
    /// Client declaring file.
    pub client_file: String,
    /// Client declaring line.
    pub client_line: usize,
    /// Server HTTP method.
    pub server_method: String,
    /// Normalized server path.
    pub server_path: String,
    /// Server declaring file.
    pub server_file: String,
    /// Server declaring line.
    pub server_line: usize,
    /// Share of segments that agree literally, 0-100.
    pub match_score: f64,
}

/// Merged client and server routes with cross-references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTopology {
    /// Client routes sorted by file then line.
    pub client: Vec<RouteEntry>,
    /// Server routes sorted by file then line.
    pub server: Vec<RouteEntry>,
    /// Matched client/server pairs.
    pub pairs: Vec<RoutePair>,
    /// Duplicate, unmatched, and ambiguity findings.
    pub issues: Vec<Issue>,
}

/// Whether a summary came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Reused from a previous run.
    Hit,
    /// Freshly generated.
    Miss,
}

/// Natural-language summary of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LlmSummary {
    /// Summarized file.
    pub path: String,
    /// Generated text.
    pub text: String,
    /// Cache hit or miss.
    pub cache_status: CacheStatus,
    /// Content hash the summary was generated for.
    pub source_hash: String,
}

/// Coverage heuristics for test and documentation files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    /// Number of code files detected.
    pub code_files: usize,
    /// Number of test files detected.
    pub test_files: usize,
    /// Number of documentation files detected.
    pub doc_files: usize,
    /// Test coverage ratio (test files / code files).
    pub test_coverage: f64,
    /// Documentation coverage ratio (doc files / code files).
    pub doc_coverage: f64,
    /// Whether test coverage is below the heuristic threshold.
    pub low_test_coverage: bool,
    /// Whether documentation coverage is below the heuristic threshold.
    pub low_doc_coverage: bool,
    /// Aggregate health score, 0-100.
    pub health_score: u8,
}

/// Filename-based groupings of notable files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpecialFiles {
    /// Configuration files such as `settings.py` or `.env`.
    pub config: Vec<String>,
    /// Files named like tests.
    pub test: Vec<String>,
    /// Prose documentation.
    pub documentation: Vec<String>,
}

/// Shape of the analyzed tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    /// Number of files per category.
    pub categories: BTreeMap<Category, usize>,
    /// Number of files per lowercase extension, `(none)` for bare names.
    pub extensions: BTreeMap<String, usize>,
    /// Percentage of measured lines per language.
    pub languages: LanguageDistribution,
    /// Every directory containing at least one file, `.` for the root.
    pub directories: Vec<String>,
    /// Notable files grouped by kind.
    pub special_files: SpecialFiles,
}

/// Test cases found in one test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestFileInfo {
    /// Relative path.
    pub path: String,
    /// Number of test cases detected.
    pub test_cases: usize,
    /// Frameworks the file appears to use.
    pub frameworks: Vec<String>,
}

/// Test suite overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    /// Per-file details, sorted by path.
    pub files: Vec<TestFileInfo>,
    /// Sum of test cases over all files.
    pub total_test_cases: usize,
    /// Every framework seen, sorted.
    pub frameworks: Vec<String>,
}
