//! File classification by extension and glob rules.

use std::fmt::Write;

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use ring::digest;

use crate::config::{AnalyzerConfig, RouteConfig};
use crate::domain::{Category, FileRecord, Framework};
use crate::error::{Result, SoundingError};
use crate::fs::{FileContents, SourceFile};

struct CompiledRule {
    category: Category,
    extensions: Vec<String>,
    patterns: Vec<(GlobMatcher, usize)>,
}

impl CompiledRule {
    /// Length of the most specific extension or pattern matching `path`.
    fn specificity(&self, path: &str, extension: Option<&str>) -> Option<usize> {
        let by_extension = extension.and_then(|ext| {
            self.extensions
                .iter()
                .any(|candidate| candidate == ext)
                // An extension `rs` weighs the same as the glob `*.rs`.
                .then_some(ext.len() + 2)
        });
        let by_pattern = self
            .patterns
            .iter()
            .filter(|(matcher, _)| matcher.is_match(path))
            .map(|(_, len)| *len)
            .max();
        by_extension.max(by_pattern)
    }
}

struct CompiledSource {
    framework: Framework,
    patterns: GlobSet,
}

/// Tags files with a [`Category`] and, for route sources, a [`Framework`].
pub struct FileClassifier {
    rules: Vec<CompiledRule>,
    sources: Vec<CompiledSource>,
}

impl FileClassifier {
    /// Compile the configured category and route-source rules.
    pub fn new(analyzer: &AnalyzerConfig, routes: &RouteConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(analyzer.categories.len());
        for rule in &analyzer.categories {
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for pattern in &rule.patterns {
                patterns.push((compile(pattern)?.compile_matcher(), pattern.len()));
            }
            rules.push(CompiledRule {
                category: rule.category,
                extensions: rule
                    .extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase())
                    .collect(),
                patterns,
            });
        }

        let mut sources = Vec::with_capacity(routes.sources.len());
        for source in &routes.sources {
            let mut builder = GlobSetBuilder::new();
            for pattern in &source.patterns {
                builder.add(compile(pattern)?);
            }
            let patterns = builder
                .build()
                .map_err(|err| SoundingError::Config(err.to_string()))?;
            sources.push(CompiledSource {
                framework: source.framework,
                patterns,
            });
        }

        Ok(Self { rules, sources })
    }

    /// Classify every walked file, preserving input order.
    pub fn classify(&self, files: &[SourceFile]) -> Vec<FileRecord> {
        files.iter().map(|file| self.classify_file(file)).collect()
    }

    /// Classify one file.
    pub fn classify_file(&self, file: &SourceFile) -> FileRecord {
        let category = self.category_for(&file.path);
        let content_hash = match &file.contents {
            FileContents::Loaded(bytes) => Some(content_hash(bytes)),
            FileContents::Unreadable(_) | FileContents::Deferred => None,
        };
        FileRecord {
            path: file.path.clone(),
            category,
            size: file.size,
            content_hash,
            route_source: self.route_source_for(&file.path, category),
        }
    }

    /// Resolve the category for a relative path.
    ///
    /// Test rules beat backend and frontend rules outright. Otherwise the
    /// longest matching extension or glob wins, then configuration order.
    pub fn category_for(&self, path: &str) -> Category {
        let extension = extension_of(path);
        let mut candidates: Vec<(usize, Category, usize)> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(order, rule)| {
                rule.specificity(path, extension.as_deref())
                    .map(|specificity| (order, rule.category, specificity))
            })
            .collect();

        if candidates
            .iter()
            .any(|(_, category, _)| *category == Category::Test)
        {
            candidates.retain(|(_, category, _)| {
                !matches!(category, Category::Backend | Category::Frontend)
            });
        }

        candidates
            .into_iter()
            .max_by(|a, b| a.2.cmp(&b.2).then(b.0.cmp(&a.0)))
            .map(|(_, category, _)| category)
            .unwrap_or(Category::Other)
    }

    /// The route extractor for a path, if any route-source glob matches.
    pub fn route_source_for(&self, path: &str, category: Category) -> Option<Framework> {
        if !matches!(category, Category::Backend | Category::Frontend) {
            return None;
        }
        self.sources
            .iter()
            .find(|source| source.patterns.is_match(path))
            .map(|source| source.framework)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = digest::digest(&digest::SHA256, bytes);
    let mut hex = String::with_capacity(digest.as_ref().len() * 2);
    for byte in digest.as_ref() {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|err| SoundingError::Config(format!("invalid glob {pattern:?}: {err}")))
}

fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{FileClassifier, content_hash};
    use crate::config::{AnalyzerConfig, CategoryRule, Config, RouteConfig};
    use crate::domain::{Category, Framework};
    use crate::fs::{FileContents, SourceFile};

    fn classifier() -> FileClassifier {
        let config = Config::default();
        FileClassifier::new(&config.analyzer, &config.routes).expect("classifier")
    }

    #[test]
    fn test_patterns_beat_backend_rules() {
        let classifier = classifier();
        assert_eq!(classifier.category_for("app/users_test.py"), Category::Test);
        assert_eq!(classifier.category_for("tests/test_api.py"), Category::Test);
        assert_eq!(
            classifier.category_for("web/src/App.test.tsx"),
            Category::Test
        );
    }

    #[test]
    fn longer_pattern_beats_extension() {
        let classifier = classifier();
        assert_eq!(
            classifier.category_for("server/routes/users.js"),
            Category::Backend
        );
        assert_eq!(
            classifier.category_for("web/src/components/Nav.js"),
            Category::Frontend
        );
        assert_eq!(
            classifier.category_for("db/migrations/0001_init.py"),
            Category::Database
        );
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let analyzer = AnalyzerConfig {
            categories: vec![
                CategoryRule {
                    category: Category::Docs,
                    extensions: vec!["txt".to_string()],
                    patterns: Vec::new(),
                },
                CategoryRule {
                    category: Category::Database,
                    extensions: vec!["txt".to_string()],
                    patterns: Vec::new(),
                },
            ],
            ..AnalyzerConfig::default()
        };
        let classifier =
            FileClassifier::new(&analyzer, &RouteConfig::default()).expect("classifier");
        assert_eq!(classifier.category_for("notes.txt"), Category::Docs);
    }

    #[test]
    fn unmatched_paths_are_other() {
        let classifier = classifier();
        assert_eq!(classifier.category_for("LICENSE"), Category::Other);
        assert_eq!(classifier.category_for("assets/logo.png"), Category::Other);
        assert_eq!(classifier.category_for("deploy/Dockerfile"), Category::Docker);
        assert_eq!(
            classifier.category_for("k8s/base/deployment.yaml"),
            Category::K8s
        );
    }

    #[test]
    fn route_sources_are_tagged_at_classification() {
        let classifier = classifier();
        let files = vec![
            SourceFile::from_text("client/src/App.tsx", "<Route path=\"/\" />"),
            SourceFile::from_text("server/app/api/users.py", "@app.get('/users')"),
            SourceFile::from_text("server/tests/test_users.py", "def test_x(): pass"),
        ];
        let records = classifier.classify(&files);

        assert_eq!(records[0].route_source, Some(Framework::ReactRouter));
        assert_eq!(records[1].route_source, Some(Framework::FastApi));
        assert_eq!(records[2].category, Category::Test);
        assert_eq!(records[2].route_source, None);
    }

    #[test]
    fn content_hash_is_stable_and_absent_when_unreadable() {
        let classifier = classifier();
        let first = classifier.classify_file(&SourceFile::from_text("a.py", "x = 1\n"));
        let second = classifier.classify_file(&SourceFile::from_text("a.py", "x = 1\n"));
        let changed = classifier.classify_file(&SourceFile::from_text("a.py", "x = 2\n"));
        assert_eq!(first.content_hash, second.content_hash);
        assert_ne!(first.content_hash, changed.content_hash);

        let unreadable = classifier.classify_file(&SourceFile {
            path: "b.py".to_string(),
            size: 3,
            contents: FileContents::Unreadable("denied".to_string()),
        });
        assert_eq!(unreadable.content_hash, None);
        assert_eq!(unreadable.category, Category::Backend);
    }

    #[test]
    fn content_hash_matches_known_digest() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
