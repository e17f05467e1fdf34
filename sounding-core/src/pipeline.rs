//! End-to-end analysis run.
//!
//! The walk and classification happen up front. Metrics and route
//! extraction then share a bounded blocking pool while summarization runs
//! beside them under its own request limit; the two are joined before the
//! report is assembled.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::classifier::FileClassifier;
use crate::config::Config;
use crate::domain::{FileRecord, Issue, MetricsSnapshot, Severity};
use crate::error::{Result, SoundingError};
use crate::fs::{FileContents, FileSystem, SourceFile, collect_sources};
use crate::inspector::inspect_tests;
use crate::k8s::inspect_k8s;
use crate::llm::{LlmSummarizer, SummaryBatch, SummaryJob};
use crate::manifest::{detect_frameworks, read_dependencies, read_manifest};
use crate::metrics::MetricsExtractor;
use crate::report::{AnalysisOutputs, Report, ReportAggregator, RunContext};
use crate::routes::{FileRoutes, RouteAnalyzer};

/// Runs every analysis stage over a tree.
#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    summarizer: Option<LlmSummarizer>,
}

struct LocalOutputs {
    snapshots: Vec<MetricsSnapshot>,
    routes: Vec<FileRoutes>,
    issues: Vec<Issue>,
}

impl Pipeline {
    /// Create a pipeline without summarization.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            summarizer: None,
        }
    }

    /// Summarize in-scope files with `summarizer` when `llm.enabled` is set.
    pub fn with_summarizer(mut self, summarizer: LlmSummarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze `root` and assemble the report.
    ///
    /// Fails on invalid configuration, an unreadable root, or an empty tree.
    /// Everything else degrades into issues on the report.
    pub async fn run<F: FileSystem>(&self, fs: &F, root: &Path) -> Result<Report> {
        self.config.validate()?;
        let run = RunContext::capture(root);
        let deadline = self
            .config
            .performance
            .run_timeout
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        let sources = collect_sources(fs, root, &self.config.walk_options())?;
        if sources.is_empty() {
            return Err(SoundingError::NoInput);
        }
        info!("walked {} files under {}", sources.len(), root.display());

        let classifier = FileClassifier::new(&self.config.analyzer, &self.config.routes)?;
        let records = classifier.classify(&sources);
        let mut issues = walk_issues(&sources, &records);

        let jobs = self.summary_jobs(&sources, &records);
        let summarize = async {
            match (&self.summarizer, jobs.is_empty()) {
                (Some(summarizer), false) => {
                    info!("summarizing {} files", jobs.len());
                    summarizer.summarize(jobs, deadline).await
                }
                _ => SummaryBatch::default(),
            }
        };
        let local = self.analyze_local(&sources, &records);
        let (local, batch) = tokio::join!(local, summarize);
        let local = local?;

        let analyzer = RouteAnalyzer::new(self.config.routes.clone());
        let topology = analyzer.reconcile(local.routes);
        info!(
            "found {} client and {} server routes, {} matched",
            topology.client.len(),
            topology.server.len(),
            topology.pairs.len()
        );

        issues.extend(local.issues);
        issues.extend(batch.issues);
        let texts = || {
            records
                .iter()
                .zip(sources.iter().map(|source| source.contents.text()))
        };
        let test_info = inspect_tests(texts());
        let (k8s_resources, k8s_issues) = inspect_k8s(texts());
        issues.extend(k8s_issues);
        let dependencies = read_dependencies(fs, root);

        ReportAggregator.assemble(AnalysisOutputs {
            root: root.to_path_buf(),
            run,
            manifest: read_manifest(fs, root),
            frameworks: detect_frameworks(&dependencies),
            dependencies,
            k8s_resources,
            records,
            snapshots: local.snapshots,
            topology,
            summaries: batch.summaries,
            issues,
            test_info,
        })
    }

    fn summary_jobs(&self, sources: &[SourceFile], records: &[FileRecord]) -> Vec<SummaryJob> {
        let Some(summarizer) = &self.summarizer else {
            return Vec::new();
        };
        if !self.config.llm.enabled {
            return Vec::new();
        }
        sources
            .iter()
            .zip(records)
            .filter(|(_, record)| summarizer.in_scope(record.category))
            .filter_map(|(source, record)| SummaryJob::new(record, source.contents.text()?))
            .collect()
    }

    async fn analyze_local(
        &self,
        sources: &[SourceFile],
        records: &[FileRecord],
    ) -> Result<LocalOutputs> {
        let extractor = Arc::new(MetricsExtractor::new(self.config.metrics.clone()));
        let analyzer = Arc::new(RouteAnalyzer::new(self.config.routes.clone()));
        let semaphore = Arc::new(Semaphore::new(self.config.performance.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for (source, record) in sources.iter().zip(records) {
            if !record.category.has_metrics() {
                continue;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| SoundingError::Other(err.to_string()))?;
            let extractor = Arc::clone(&extractor);
            let analyzer = Arc::clone(&analyzer);
            let record = record.clone();
            let contents = source.contents.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let snapshot = extractor.extract(&record, &contents);
                let routes = contents
                    .text()
                    .map(|text| analyzer.extract(&record, text))
                    .unwrap_or_default();
                (snapshot, routes)
            });
        }

        let mut outputs = LocalOutputs {
            snapshots: Vec::new(),
            routes: Vec::new(),
            issues: Vec::new(),
        };
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((snapshot, routes)) => {
                    outputs.snapshots.push(snapshot);
                    outputs.routes.push(routes);
                }
                Err(err) => {
                    warn!("analysis task failed: {err}");
                    outputs.issues.push(Issue::new(
                        Severity::Error,
                        format!("analysis task failed: {err}"),
                    ));
                }
            }
        }
        outputs.snapshots.sort_by(|a, b| a.path.cmp(&b.path));
        info!("measured {} files", outputs.snapshots.len());
        Ok(outputs)
    }
}

/// Read failures for files the metrics stage never sees.
///
/// Measured categories report their own read failures.
fn walk_issues(sources: &[SourceFile], records: &[FileRecord]) -> Vec<Issue> {
    sources
        .iter()
        .zip(records)
        .filter(|(_, record)| !record.category.has_metrics())
        .filter_map(|(source, record)| match &source.contents {
            FileContents::Unreadable(message) => Some(Issue::error(
                &record.path,
                format!("cannot read file: {message}"),
            )),
            FileContents::Deferred => Some(Issue::warning(
                &record.path,
                "memory limit reached; classified from size only",
            )),
            FileContents::Loaded(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::config::Config;
    use crate::domain::{CacheStatus, Category, Severity};
    use crate::error::SoundingError;
    use crate::fs::MockFileSystem;
    use crate::llm::{
        Completion, CompletionClient, CompletionFuture, LlmSummarizer, SummaryCache,
    };
    use std::collections::BTreeMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SERVER: &str = r#"from fastapi import APIRouter

router = APIRouter()


@router.get("/api/users/{id}")
def read_user(id: int):
    if id < 0:
        return None
    return {"id": id}
"#;

    const CLIENT: &str = r#"import { Routes, Route } from "react-router-dom";

export default function App() {
  return (
    <Routes>
      <Route path="/users/:id" element={<UserPage />} />
    </Routes>
  );
}
"#;

    const TEST: &str = "import pytest\n\n\ndef test_read_user():\n    assert True\n";

    fn tree(files: &[(&str, &str)]) -> MockFileSystem {
        let contents: Arc<BTreeMap<PathBuf, Vec<u8>>> = Arc::new(
            files
                .iter()
                .map(|(path, text)| (Path::new("/repo").join(path), text.as_bytes().to_vec()))
                .collect(),
        );
        let mut fs = MockFileSystem::new();
        let listing = Arc::clone(&contents);
        fs.expect_list_files()
            .returning(move |_, _| Ok(listing.keys().cloned().collect()));
        let sizes = Arc::clone(&contents);
        fs.expect_file_size()
            .returning(move |path| Ok(sizes.get(path).map(|bytes| bytes.len() as u64).unwrap_or(0)));
        let bytes = Arc::clone(&contents);
        fs.expect_read_bytes().returning(move |path| {
            bytes
                .get(path)
                .cloned()
                .ok_or_else(|| SoundingError::Io(io::Error::new(io::ErrorKind::NotFound, "missing")))
        });
        let text = Arc::clone(&contents);
        fs.expect_read_to_string().returning(move |path| {
            text.get(path)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .ok_or_else(|| SoundingError::Io(io::Error::new(io::ErrorKind::NotFound, "missing")))
        });
        fs
    }

    fn sample_tree() -> MockFileSystem {
        tree(&[
            ("api/users.py", SERVER),
            ("web/src/App.jsx", CLIENT),
            ("tests/test_users.py", TEST),
            ("README.md", "# Shop\n"),
        ])
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.performance.max_workers = 2;
        config
    }

    struct CountingClient {
        calls: AtomicUsize,
    }

    impl CompletionClient for CountingClient {
        fn complete<'a>(&'a self, _prompt: &'a str) -> CompletionFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Completion::Text("<think>hm</think>Handles users.".to_string())) })
        }
    }

    #[tokio::test]
    async fn run_links_routes_and_measures_files() {
        let report = Pipeline::new(config())
            .run(&sample_tree(), Path::new("/repo"))
            .await
            .expect("report");

        let paths: Vec<&str> = report
            .metrics
            .files
            .iter()
            .map(|entry| entry.file.path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["README.md", "api/users.py", "tests/test_users.py", "web/src/App.jsx"]
        );
        assert_eq!(report.metrics.totals.measured_files, 3);

        let topology = &report.route_topology;
        assert_eq!(topology.server.len(), 1);
        assert_eq!(topology.client.len(), 1);
        assert_eq!(topology.pairs.len(), 1);
        assert_eq!(topology.pairs[0].server_path, "/api/users/:id");
        assert!(
            !report
                .issues
                .iter()
                .any(|issue| issue.message.contains("no matching server endpoint")
                    || issue.message.contains("not referenced"))
        );

        assert_eq!(report.test_info.total_test_cases, 1);
        assert_eq!(report.test_info.frameworks, vec!["pytest"]);
        assert_eq!(report.structure.categories.get(&Category::Test), Some(&1));
        assert!(report.llm_summaries.is_empty());
    }

    #[tokio::test]
    async fn run_reports_stack_kubernetes_and_handlers() {
        let fs = tree(&[
            ("api/users.py", SERVER),
            ("requirements.txt", "fastapi==0.110.0\nuvicorn\n"),
            (
                "deploy/api.yaml",
                "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: api\n",
            ),
        ]);

        let report = Pipeline::new(config())
            .run(&fs, Path::new("/repo"))
            .await
            .expect("report");

        let backend = report.frameworks.backend.as_ref().expect("backend");
        assert_eq!((backend.name.as_str(), backend.version.as_str()), ("FastAPI", "0.110.0"));
        assert_eq!(report.dependencies.python.get("uvicorn").map(String::as_str), Some("latest"));

        assert_eq!(report.k8s_resources.len(), 1);
        assert_eq!(report.k8s_resources[0].kind, "Deployment");
        assert_eq!(report.k8s_resources[0].namespace, "default");

        let handler = &report.route_topology.server[0].metadata;
        assert_eq!(handler.component.as_deref(), Some("read_user"));
        assert_eq!(handler.parameters.len(), 1);
        assert_eq!(handler.parameters[0].type_name, "int");
        assert_eq!(report.project_info.name, "repo");
    }

    #[tokio::test]
    async fn metrics_are_identical_across_runs() {
        let pipeline = Pipeline::new(config());
        let first = pipeline
            .run(&sample_tree(), Path::new("/repo"))
            .await
            .expect("first");
        let second = pipeline
            .run(&sample_tree(), Path::new("/repo"))
            .await
            .expect("second");

        assert_eq!(first.metrics, second.metrics);
        assert_eq!(first.route_topology, second.route_topology);
    }

    #[tokio::test]
    async fn empty_tree_is_no_input() {
        let err = Pipeline::new(config())
            .run(&tree(&[]), Path::new("/repo"))
            .await
            .expect_err("empty");
        assert!(matches!(err, SoundingError::NoInput));
    }

    #[tokio::test]
    async fn binary_files_become_issues() {
        let fs = tree(&[("api/blob.py", "\0\0\0"), ("README.md", "# x\n")]);
        let report = Pipeline::new(config())
            .run(&fs, Path::new("/repo"))
            .await
            .expect("report");

        let issue = report
            .issues
            .iter()
            .find(|issue| issue.file.as_deref() == Some("api/blob.py"))
            .expect("issue");
        assert_eq!(issue.severity, Severity::Error);
    }

    #[tokio::test]
    async fn second_run_hits_the_summary_cache() {
        let dir = temp_dir();
        let mut config = config();
        config.llm.enabled = true;
        config.llm.api_key = "test".to_string();
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(SummaryCache::new(&dir, 3600));
        let summarizer = LlmSummarizer::new(config.llm.clone(), client.clone(), cache);
        let pipeline = Pipeline::new(config).with_summarizer(summarizer);

        let first = pipeline
            .run(&sample_tree(), Path::new("/repo"))
            .await
            .expect("first");
        let second = pipeline
            .run(&sample_tree(), Path::new("/repo"))
            .await
            .expect("second");

        let summarized: Vec<&str> = first
            .llm_summaries
            .iter()
            .map(|summary| summary.path.as_str())
            .collect();
        assert_eq!(summarized, vec!["api/users.py", "web/src/App.jsx"]);
        assert_eq!(first.llm_summaries[0].text, "Handles users.");
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert!(
            second
                .llm_summaries
                .iter()
                .all(|summary| summary.cache_status == CacheStatus::Hit)
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_walking() {
        let mut config = config();
        config.performance.max_workers = 0;
        let err = Pipeline::new(config)
            .run(&MockFileSystem::new(), Path::new("/repo"))
            .await
            .expect_err("invalid");
        assert!(matches!(err, SoundingError::Config(_)));
    }

    fn temp_dir() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        std::env::temp_dir().join(format!("sounding_pipeline_test_{nanos}_{id}"))
    }
}
