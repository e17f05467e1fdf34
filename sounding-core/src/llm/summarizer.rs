//! Concurrent file summarization.
//!
//! Jobs consult the cache first. Misses go to the completion client under a
//! request semaphore, with retries spaced by the configured backoff and
//! failures appended to the error log. Reaching the run deadline abandons
//! whatever is still in flight.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::{Backoff, LlmConfig};
use crate::domain::{CacheStatus, Category, FileRecord, Issue, LlmSummary};
use crate::llm::prompt::{PromptContext, render_prompt, strip_reasoning};
use crate::llm::{
    Completion, CompletionClient, CompletionError, Sleeper, SummaryCache, TokioSleeper,
};
use crate::metrics::language_name;

/// A file queued for summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    /// Relative path.
    pub path: String,
    /// Language name used in the prompt.
    pub language: Option<String>,
    /// Hash of `text`, the cache key.
    pub content_hash: String,
    /// File contents.
    pub text: Arc<str>,
}

impl SummaryJob {
    /// Build a job for a classified file; files without a hash yield `None`.
    pub fn new(record: &FileRecord, text: &str) -> Option<Self> {
        Some(Self {
            path: record.path.clone(),
            language: language_name(&record.path),
            content_hash: record.content_hash.clone()?,
            text: Arc::from(text),
        })
    }
}

/// Summaries and per-file failures from one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryBatch {
    /// Successful summaries, sorted by path.
    pub summaries: Vec<LlmSummary>,
    /// Failures, one per file.
    pub issues: Vec<Issue>,
}

struct Outcome {
    path: String,
    result: Result<LlmSummary, Issue>,
}

/// Produces one [`LlmSummary`] per file through a [`CompletionClient`].
#[derive(Clone)]
pub struct LlmSummarizer {
    config: Arc<LlmConfig>,
    client: Arc<dyn CompletionClient>,
    cache: Arc<SummaryCache>,
    sleeper: Arc<dyn Sleeper>,
    error_log: Arc<Mutex<()>>,
}

impl LlmSummarizer {
    /// Create a summarizer that waits between retries with tokio timers.
    pub fn new(config: LlmConfig, client: Arc<dyn CompletionClient>, cache: Arc<SummaryCache>) -> Self {
        Self {
            config: Arc::new(config),
            client,
            cache,
            sleeper: Arc::new(TokioSleeper),
            error_log: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the retry sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Whether files of `category` are summarized.
    pub fn in_scope(&self, category: Category) -> bool {
        self.config.include_categories.contains(&category)
    }

    /// Summarize `jobs` in batches, giving up on unfinished files at
    /// `deadline`.
    ///
    /// Every job ends up either in `summaries` or with exactly one issue.
    pub async fn summarize(&self, jobs: Vec<SummaryJob>, deadline: Option<Instant>) -> SummaryBatch {
        let paths: Vec<String> = jobs.iter().map(|job| job.path.clone()).collect();
        let mut batch = SummaryBatch::default();
        let mut settled = HashSet::new();

        let run = self.run_batches(jobs, &mut batch, &mut settled);
        let finished = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, run).await.is_ok(),
            None => {
                run.await;
                true
            }
        };
        if !finished {
            warn!("run deadline reached, abandoning in-flight summaries");
        }

        for path in paths {
            if settled.contains(&path) {
                continue;
            }
            batch.issues.push(if finished {
                Issue::error(&path, "summary task failed")
            } else {
                Issue::warning(&path, "summary timed out")
            });
        }

        batch.summaries.sort_by(|a, b| a.path.cmp(&b.path));
        batch.issues.sort_by(|a, b| a.file.cmp(&b.file));
        info!(
            "summarized {} files ({} cached), {} failed",
            batch.summaries.len(),
            batch
                .summaries
                .iter()
                .filter(|summary| summary.cache_status == CacheStatus::Hit)
                .count(),
            batch.issues.len()
        );
        batch
    }

    async fn run_batches(
        &self,
        jobs: Vec<SummaryJob>,
        batch: &mut SummaryBatch,
        settled: &mut HashSet<String>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_requests.max(1)));
        let batch_size = self.config.batch_size.max(1);
        let mut pending = jobs.into_iter().peekable();
        let mut number = 0;

        while pending.peek().is_some() {
            number += 1;
            let chunk: Vec<SummaryJob> = pending.by_ref().take(batch_size).collect();
            debug!("summary batch {number}: {} files", chunk.len());

            let mut tasks = JoinSet::new();
            for job in chunk {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let worker = self.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    worker.summarize_one(job).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => {
                        settled.insert(outcome.path);
                        match outcome.result {
                            Ok(summary) => batch.summaries.push(summary),
                            Err(issue) => batch.issues.push(issue),
                        }
                    }
                    Err(err) => warn!("summary task failed: {err}"),
                }
            }
        }
    }

    async fn summarize_one(&self, job: SummaryJob) -> Outcome {
        let result = self.summary_for(&job).await;
        Outcome {
            path: job.path,
            result,
        }
    }

    async fn summary_for(&self, job: &SummaryJob) -> Result<LlmSummary, Issue> {
        match self.cache.get(&job.path, &job.content_hash).await {
            Ok(Some(entry)) => {
                debug!("cache hit for {}", job.path);
                return Ok(LlmSummary {
                    path: job.path.clone(),
                    text: entry.summary,
                    cache_status: CacheStatus::Hit,
                    source_hash: job.content_hash.clone(),
                });
            }
            Ok(None) => {}
            Err(err) => warn!("cache read failed for {}: {err}", job.path),
        }

        let prompt = render_prompt(
            &self.config.prompt_template,
            &PromptContext {
                file_path: &job.path,
                language: job.language.as_deref().unwrap_or_default(),
                file_content: &job.text,
            },
            self.config.max_content_chars,
        );
        let text = self.complete_with_retry(&job.path, &prompt).await?;
        let text = strip_reasoning(&text);

        if let Err(err) = self.cache.put(&job.path, &job.content_hash, &text).await {
            warn!("cache write failed for {}: {err}", job.path);
        }
        Ok(LlmSummary {
            path: job.path.clone(),
            text,
            cache_status: CacheStatus::Miss,
            source_hash: job.content_hash.clone(),
        })
    }

    /// At most `retry_count` attempts in total; terminal errors stop at once.
    async fn complete_with_retry(&self, path: &str, prompt: &str) -> Result<String, Issue> {
        let attempts = self.config.retry_count.max(1);
        let mut delay = self.config.retry_delay();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result =
                match tokio::time::timeout(self.config.request_timeout(), self.client.complete(prompt))
                    .await
                {
                    Ok(result) => result.and_then(Completion::into_text),
                    Err(_) => Err(CompletionError::Timeout),
                };
            let err = match result {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(Issue::error(path, format!("summary failed: {err}")));
            }

            self.log_retryable(path, attempt, &err).await;
            if attempt >= attempts {
                return Err(Issue::error(
                    path,
                    format!("summary failed after {attempts} attempts: {err}"),
                ));
            }
            warn!("{path}: attempt {attempt}/{attempts} failed ({err}), retrying in {delay:?}");
            self.sleeper.sleep(delay).await;
            if self.config.retry_backoff == Backoff::Exponential {
                delay = delay.saturating_mul(2);
            }
        }
    }

    async fn log_retryable(&self, path: &str, attempt: u32, err: &CompletionError) {
        let Some(log_path) = self.config.error_log.as_deref() else {
            return;
        };
        let record = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "file": path,
            "attempt": attempt,
            "kind": err.kind(),
            "message": err.to_string(),
        });
        let _guard = self.error_log.lock().await;
        if let Err(err) = append_line(log_path, &record.to_string()).await {
            warn!("cannot write error log {}: {err}", log_path.display());
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}
