#![deny(missing_docs)]
//! Sounding core library.
//!
//! Classifies the files of a source tree, measures them, extracts and
//! reconciles client and server routes, summarizes files through a
//! language model and assembles everything into one code health report.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs;
pub mod inspector;
pub mod k8s;
pub mod llm;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod schema;

pub use classifier::FileClassifier;
pub use config::Config;
pub use domain::{
    CacheStatus, Category, CoverageReport, FileRecord, Framework, Issue, LanguageDistribution,
    LlmSummary, MetricsSnapshot, RouteEntry, RouteTopology, Severity, Side,
};
pub use error::{Result, SoundingError};
pub use fs::{FileSystem, StdFileSystem};
pub use llm::{
    Completion, CompletionClient, CompletionError, CompletionFuture, LlmSummarizer, StreamEvent,
    SummaryCache,
};
pub use metrics::MetricsExtractor;
pub use pipeline::Pipeline;
pub use report::{
    Report, ReportAggregator, RunContext, complexity_label, format_language_stats, format_size,
    maintainability_label, render_html, render_json, render_markdown,
};
pub use routes::RouteAnalyzer;
pub use schema::report_schema_json;
