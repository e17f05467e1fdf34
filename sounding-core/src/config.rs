//! Run configuration.
//!
//! Every section derives `Default` and is deserialized with `#[serde(default)]`,
//! so a configuration file only needs the keys it overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::domain::{Category, Framework};
use crate::error::{Result, SoundingError};
use crate::fs::WalkOptions;

/// Top-level configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Walker and classifier settings.
    pub analyzer: AnalyzerConfig,
    /// Metric thresholds.
    pub metrics: MetricsConfig,
    /// Route extraction settings.
    pub routes: RouteConfig,
    /// Completion service settings.
    pub llm: LlmConfig,
    /// Concurrency and resource limits.
    pub performance: PerformanceConfig,
    /// Renderer options.
    pub reporting: ReportingConfig,
}

impl Config {
    /// Parse a JSON configuration file.
    ///
    /// Cross-field checks are left to [`Config::validate`], which callers run
    /// once any command-line or environment overrides are applied.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|err| SoundingError::Config(format!("{}: {err}", path.display())))
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Check cross-field constraints and glob syntax.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.analyzer.categories {
            for pattern in &rule.patterns {
                check_glob(pattern)?;
            }
        }
        for source in &self.routes.sources {
            for pattern in &source.patterns {
                check_glob(pattern)?;
            }
        }
        if self.performance.max_workers == 0 {
            return Err(config_error("performance.max_workers must be at least 1"));
        }
        if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&self.llm.retry_delay) {
            return Err(config_error(format!(
                "llm.retry_delay must be between 0 and {MAX_RETRY_DELAY_SECS} seconds"
            )));
        }
        if self.llm.enabled {
            if self.llm.api_key.trim().is_empty() {
                return Err(config_error("llm.api_key is required when llm is enabled"));
            }
            if self.llm.base_url.trim().is_empty() {
                return Err(config_error("llm.base_url is required when llm is enabled"));
            }
            if self.llm.batch_size == 0 {
                return Err(config_error("llm.batch_size must be at least 1"));
            }
            if self.llm.concurrent_requests == 0 {
                return Err(config_error("llm.concurrent_requests must be at least 1"));
            }
            if self.llm.retry_count == 0 {
                return Err(config_error("llm.retry_count must be at least 1"));
            }
            crate::llm::prompt::ensure_placeholders(&self.llm.prompt_template)?;
        }
        Ok(())
    }

    /// Walker limits derived from the analyzer and performance sections.
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            excluded_dirs: self.analyzer.excluded_dirs.clone(),
            max_file_size: self.analyzer.max_file_size,
            memory_budget: self
                .performance
                .memory_limit
                .map(|mib| mib.saturating_mul(1024 * 1024)),
        }
    }
}

/// Upper bound for `llm.retry_delay`, in seconds.
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

fn check_glob(pattern: &str) -> Result<()> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|err| config_error(format!("invalid glob {pattern:?}: {err}")))
}

fn config_error(message: impl Into<String>) -> SoundingError {
    SoundingError::Config(message.into())
}

/// Extension and glob rules for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category assigned on match.
    pub category: Category,
    /// File extensions without the leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Glob patterns matched against the relative path.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl CategoryRule {
    fn new(category: Category, extensions: &[&str], patterns: &[&str]) -> Self {
        Self {
            category,
            extensions: to_strings(extensions),
            patterns: to_strings(patterns),
        }
    }
}

/// Walker and classifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Category rules in precedence order.
    pub categories: Vec<CategoryRule>,
    /// Directory names skipped by the walker.
    pub excluded_dirs: Vec<String>,
    /// Files above this many bytes are skipped.
    pub max_file_size: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryRule::new(
                    Category::Test,
                    &[],
                    &[
                        "**/test/**",
                        "**/tests/**",
                        "**/__tests__/**",
                        "**/test_*.*",
                        "**/*_test.*",
                        "**/*.test.*",
                        "**/*.spec.*",
                        "**/*_spec.*",
                    ],
                ),
                CategoryRule::new(
                    Category::Backend,
                    &["py", "rs", "go", "java", "kt", "rb", "php", "cs", "scala"],
                    &[
                        "**/server/**/*.{js,ts}",
                        "**/backend/**/*.{js,ts}",
                        "**/api/**/*.{js,ts}",
                    ],
                ),
                CategoryRule::new(
                    Category::Frontend,
                    &["js", "jsx", "ts", "tsx", "vue", "svelte", "css", "scss", "html"],
                    &[],
                ),
                CategoryRule::new(
                    Category::Docs,
                    &["md", "mdx", "rst", "adoc", "txt"],
                    &["**/docs/**"],
                ),
                CategoryRule::new(
                    Category::Database,
                    &["sql", "prisma"],
                    &["**/migrations/**"],
                ),
                CategoryRule::new(
                    Category::Docker,
                    &[],
                    &[
                        "**/Dockerfile",
                        "**/Dockerfile.*",
                        "**/docker-compose*.{yml,yaml}",
                    ],
                ),
                CategoryRule::new(
                    Category::K8s,
                    &[],
                    &[
                        "**/k8s/**/*.{yml,yaml}",
                        "**/kubernetes/**/*.{yml,yaml}",
                        "**/helm/**/*.{yml,yaml}",
                        "**/charts/**/*.{yml,yaml}",
                    ],
                ),
            ],
            excluded_dirs: to_strings(&[
                "node_modules",
                "target",
                "dist",
                "build",
                "venv",
                "__pycache__",
                "vendor",
                "coverage",
            ]),
            max_file_size: 1024 * 1024,
        }
    }
}

/// Thresholds for metric warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whole-file complexity above which a warning is raised.
    pub complexity_threshold: u32,
    /// Longest allowed function, in lines.
    pub max_function_length: usize,
    /// Longest allowed class, in lines.
    pub max_class_length: usize,
    /// Longest allowed file, in lines.
    pub max_file_length: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 50,
            max_function_length: 50,
            max_class_length: 300,
            max_file_length: 1000,
        }
    }
}

/// Globs that tag files as route sources for one framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSourceRule {
    /// Extractor used for matching files.
    pub framework: Framework,
    /// Glob patterns matched against the relative path.
    pub patterns: Vec<String>,
}

impl RouteSourceRule {
    fn new(framework: Framework, patterns: &[&str]) -> Self {
        Self {
            framework,
            patterns: to_strings(patterns),
        }
    }
}

/// Route extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Route source rules; the first matching rule wins.
    pub sources: Vec<RouteSourceRule>,
    /// Prefixes stripped from server paths before matching.
    pub api_prefixes: Vec<String>,
    /// Markers implying an auth requirement.
    pub auth_keywords: Vec<String>,
    /// Markers naming a guard.
    pub guard_keywords: Vec<String>,
    /// Markers implying rate limiting.
    pub rate_limit_keywords: Vec<String>,
    /// Markers implying response caching.
    pub cache_keywords: Vec<String>,
    /// Lines scanned on each side of a declaration for markers.
    pub metadata_window: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                RouteSourceRule::new(
                    Framework::VueRouter,
                    &["**/src/router/**/*.{js,ts}"],
                ),
                RouteSourceRule::new(
                    Framework::ReactRouter,
                    &[
                        "**/src/App.{js,jsx,ts,tsx}",
                        "**/src/{router,routes,pages}/**/*.{js,jsx,ts,tsx}",
                    ],
                ),
                RouteSourceRule::new(
                    Framework::Flask,
                    &["**/{routes,views,controllers}/**/*.py"],
                ),
                RouteSourceRule::new(
                    Framework::FastApi,
                    &[
                        "**/{api,routers}/**/*.py",
                        "**/main.py",
                    ],
                ),
                RouteSourceRule::new(
                    Framework::Express,
                    &["**/{routes,server}/**/*.{js,ts}", "**/server.{js,ts}"],
                ),
                RouteSourceRule::new(
                    Framework::Axum,
                    &["**/src/{routes,handlers,api}/**/*.rs", "**/src/main.rs"],
                ),
            ],
            api_prefixes: to_strings(&["/api"]),
            auth_keywords: to_strings(&[
                "login_required",
                "auth_required",
                "requires_auth",
                "jwt_required",
                "token_required",
                "authenticated",
                "Depends(get_current_user",
                "requireAuth",
                "isAuthenticated",
                "RequireAuth",
                "requiresAuth",
            ]),
            guard_keywords: to_strings(&["beforeEnter", "canActivate", "guard", "middleware"]),
            rate_limit_keywords: to_strings(&["rate_limit", "ratelimit", "rateLimit", "limiter", "throttle"]),
            cache_keywords: to_strings(&["cache", "cached", "lru_cache"]),
            metadata_window: 3,
        }
    }
}

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
}

/// Completion service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether summaries are generated at all.
    pub enabled: bool,
    /// Bearer token for the completion endpoint.
    pub api_key: String,
    /// Base URL; requests go to `{base_url}/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request streamed tokens.
    pub stream: bool,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Prompt with `{file_path}`, `{language}` and `{file_content}` placeholders.
    pub prompt_template: String,
    /// Total attempts per file for retryable failures.
    pub retry_count: u32,
    /// Seconds between attempts.
    pub retry_delay: f64,
    /// How the delay grows.
    pub retry_backoff: Backoff,
    /// Files per batch.
    pub batch_size: usize,
    /// Requests in flight within a batch.
    pub concurrent_requests: usize,
    /// Categories eligible for summaries.
    pub include_categories: Vec<Category>,
    /// Content beyond this many characters is truncated.
    pub max_content_chars: usize,
    /// Directory holding cached summaries.
    pub cache_dir: PathBuf,
    /// JSON-lines file receiving retryable error details.
    pub error_log: Option<PathBuf>,
}

impl LlmConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    /// Base delay between attempts.
    pub fn retry_delay(&self) -> Duration {
        let secs = if self.retry_delay.is_nan() {
            0.0
        } else {
            self.retry_delay.clamp(0.0, MAX_RETRY_DELAY_SECS)
        };
        Duration::from_secs_f64(secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            stream: false,
            timeout: 60,
            prompt_template: crate::llm::prompt::DEFAULT_TEMPLATE.to_string(),
            retry_count: 3,
            retry_delay: 1.0,
            retry_backoff: Backoff::Fixed,
            batch_size: 10,
            concurrent_requests: 4,
            include_categories: vec![Category::Backend, Category::Frontend],
            max_content_chars: 12_000,
            cache_dir: PathBuf::from(".sounding/cache"),
            error_log: None,
        }
    }
}

/// Concurrency and resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker pool size for metrics and route extraction.
    pub max_workers: usize,
    /// Seconds a cached summary stays valid.
    pub cache_ttl: u64,
    /// MiB of file content held in memory per run.
    pub memory_limit: Option<u64>,
    /// Seconds before outstanding summaries are abandoned.
    pub run_timeout: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            cache_ttl: 7 * 24 * 60 * 60,
            memory_limit: Some(1024),
            run_timeout: Some(600),
        }
    }
}

/// Renderer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Formats written by default.
    pub output_formats: Vec<String>,
    /// Include per-file metrics tables.
    pub include_metrics: bool,
    /// Include the route topology section.
    pub include_routes: bool,
    /// Include LLM summaries.
    pub include_summaries: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            output_formats: to_strings(&["text"]),
            include_metrics: true,
            include_routes: true,
            include_summaries: true,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
