//! Repository-wide heuristics: coverage, structure and test suites.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{
    Category, CoverageReport, FileRecord, Issue, LanguageDistribution, MetricsSnapshot, Severity,
    SpecialFiles, Structure, TestFileInfo, TestInfo,
};

/// Test coverage below this ratio is flagged.
const LOW_TEST_COVERAGE: f64 = 0.20;
/// Documentation coverage below this ratio is flagged.
const LOW_DOC_COVERAGE: f64 = 0.10;

/// Share of measured lines per language, in percent.
pub fn language_distribution(snapshots: &[MetricsSnapshot]) -> LanguageDistribution {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;

    for snapshot in snapshots {
        let Some(language) = &snapshot.language else {
            continue;
        };
        if snapshot.lines_of_code == 0 {
            continue;
        }
        total += snapshot.lines_of_code;
        *counts.entry(language.clone()).or_insert(0) += snapshot.lines_of_code;
    }

    if total == 0 {
        return BTreeMap::new();
    }

    counts
        .into_iter()
        .map(|(language, count)| (language, (count as f64 / total as f64) * 100.0))
        .collect()
}

/// Test and documentation coverage heuristics plus the health score.
///
/// Counts come from each record's category: backend, frontend and test
/// files are code, test files are tests, docs files are documentation.
/// Warnings and errors in `issues` lower the score; info issues do not.
pub fn inspect_coverage(records: &[FileRecord], issues: &[Issue]) -> CoverageReport {
    let count = |wanted: &[Category]| {
        records
            .iter()
            .filter(|record| wanted.contains(&record.category))
            .count()
    };
    let code_files = count(&[Category::Backend, Category::Frontend, Category::Test]);
    let test_files = count(&[Category::Test]);
    let doc_files = count(&[Category::Docs]);

    let ratio = |part: usize| {
        if code_files == 0 {
            0.0
        } else {
            (part as f64 / code_files as f64).min(1.0)
        }
    };
    let test_coverage = ratio(test_files);
    let doc_coverage = ratio(doc_files);

    let mut coverage = CoverageReport {
        code_files,
        test_files,
        doc_files,
        test_coverage,
        doc_coverage,
        low_test_coverage: code_files > 0 && test_coverage < LOW_TEST_COVERAGE,
        low_doc_coverage: code_files > 0 && doc_coverage < LOW_DOC_COVERAGE,
        health_score: 100,
    };
    let findings = issues
        .iter()
        .filter(|issue| issue.severity >= Severity::Warning)
        .count();
    coverage.health_score = compute_health_score(&coverage, findings);
    coverage
}

/// Compute a heuristic health score from coverage and the number of
/// warnings and errors.
pub fn compute_health_score(coverage: &CoverageReport, findings: usize) -> u8 {
    let mut penalty = 0usize;
    if coverage.code_files > 0 {
        penalty += tiered_penalty(coverage.test_coverage, &[(0.10, 35), (0.20, 25), (0.40, 10)]);
        penalty += tiered_penalty(coverage.doc_coverage, &[(0.05, 25), (0.10, 15), (0.20, 5)]);
    }
    // Two points per warning or error, at most thirty.
    penalty += findings.min(15) * 2;

    100u8.saturating_sub(penalty.min(100) as u8)
}

/// Penalty of the first tier whose bound `ratio` falls below.
fn tiered_penalty(ratio: f64, tiers: &[(f64, usize)]) -> usize {
    tiers
        .iter()
        .find(|(bound, _)| ratio < *bound)
        .map_or(0, |(_, penalty)| *penalty)
}

/// Summarize the tree's layout.
pub fn inspect_structure(records: &[FileRecord], snapshots: &[MetricsSnapshot]) -> Structure {
    let mut structure = Structure {
        languages: language_distribution(snapshots),
        ..Structure::default()
    };
    let mut directories = BTreeSet::new();

    for record in records {
        *structure.categories.entry(record.category).or_insert(0) += 1;
        *structure
            .extensions
            .entry(extension_key(&record.path))
            .or_insert(0) += 1;
        directories.insert(match record.path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        });

        let name = file_name(&record.path);
        if is_config_name(&name) {
            structure.special_files.config.push(record.path.clone());
        } else if is_test_name(&name) {
            structure.special_files.test.push(record.path.clone());
        } else if name.ends_with(".md") || name.ends_with(".rst") || name.ends_with(".txt") {
            structure.special_files.documentation.push(record.path.clone());
        }
    }

    structure.directories = directories.into_iter().collect();
    sort_special_files(&mut structure.special_files);
    structure
}

/// Count test cases and detect frameworks in every `test` file.
///
/// `files` pairs each record with its text; unreadable files count as zero
/// cases but are still listed.
pub fn inspect_tests<'a, I>(files: I) -> TestInfo
where
    I: IntoIterator<Item = (&'a FileRecord, Option<&'a str>)>,
{
    let mut info = TestInfo::default();
    let mut frameworks = BTreeSet::new();

    for (record, text) in files {
        if record.category != Category::Test {
            continue;
        }
        let text = text.unwrap_or_default();
        let detected = detect_test_frameworks(&record.path, text);
        frameworks.extend(detected.iter().cloned());
        let test_cases = count_test_cases(&record.path, text);
        info.total_test_cases += test_cases;
        info.files.push(TestFileInfo {
            path: record.path.clone(),
            test_cases,
            frameworks: detected,
        });
    }

    info.files.sort_by(|a, b| a.path.cmp(&b.path));
    info.frameworks = frameworks.into_iter().collect();
    info
}

fn regex_python_test() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:async\s+)?def\s+test_\w*").expect("valid regex"))
}

fn regex_rust_test() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\[(?:tokio::)?test(?:\(|\])").expect("valid regex"))
}

fn regex_js_test() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(?:^|[^\w.])(?:it|test)(?:\.only)?\s*\(").expect("valid regex"))
}

fn regex_go_test() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^func\s+Test\w*\s*\(").expect("valid regex"))
}

/// Number of test cases declared in `text`, chosen by the file's extension.
pub fn count_test_cases(path: &str, text: &str) -> usize {
    match extension_key(path).as_str() {
        ".py" => regex_python_test().find_iter(text).count(),
        ".rs" => regex_rust_test().find_iter(text).count(),
        ".go" => regex_go_test().find_iter(text).count(),
        ".js" | ".jsx" | ".ts" | ".tsx" | ".mjs" | ".cjs" => {
            regex_js_test().find_iter(text).count()
        }
        _ => 0,
    }
}

/// Test frameworks a file appears to use, sorted.
pub fn detect_test_frameworks(path: &str, text: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    match extension_key(path).as_str() {
        ".py" => {
            if text.contains("import pytest") || text.contains("from pytest") {
                found.insert("pytest");
            }
            if text.contains("import unittest") || text.contains("from unittest") {
                found.insert("unittest");
            }
            if found.is_empty() && regex_python_test().is_match(text) {
                found.insert("pytest");
            }
        }
        ".rs" => {
            if regex_rust_test().is_match(text) {
                found.insert("cargo-test");
            }
        }
        ".go" => {
            if regex_go_test().is_match(text) {
                found.insert("go-test");
            }
        }
        ".js" | ".jsx" | ".ts" | ".tsx" | ".mjs" | ".cjs" => {
            if text.contains("from 'vitest'") || text.contains("from \"vitest\"") {
                found.insert("vitest");
            } else if text.contains("require('mocha')")
                || text.contains("from 'mocha'")
                || text.contains("from 'chai'")
                || text.contains("require('chai')")
            {
                found.insert("mocha");
            } else if text.contains("jest") || regex_js_test().is_match(text) {
                found.insert("jest");
            }
        }
        _ => {}
    }
    found.into_iter().map(str::to_string).collect()
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_lowercase()
}

fn extension_key(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[dot..].to_string(),
        _ => "(none)".to_string(),
    }
}

fn is_config_name(name: &str) -> bool {
    matches!(
        name,
        "config.py"
            | "settings.py"
            | ".env"
            | "config.json"
            | "config.yaml"
            | "config.yml"
            | "config.toml"
            | "tsconfig.json"
            | "vite.config.js"
            | "vite.config.ts"
            | "webpack.config.js"
    )
}

fn is_test_name(name: &str) -> bool {
    name.starts_with("test_")
        || name.ends_with("_test.py")
        || name.ends_with("_test.go")
        || name.ends_with("_test.rs")
        || name.contains(".test.")
        || name.contains(".spec.")
}

fn sort_special_files(files: &mut SpecialFiles) {
    files.config.sort();
    files.test.sort();
    files.documentation.sort();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, category: Category) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            category,
            size: 10,
            content_hash: Some("h".to_string()),
            route_source: None,
        }
    }

    fn snapshot(path: &str, language: &str, lines: usize) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::empty(path);
        snapshot.language = Some(language.to_string());
        snapshot.lines_of_code = lines;
        snapshot.code_lines = lines;
        snapshot
    }

    #[test]
    fn distribution_weights_languages_by_lines() {
        let distribution = language_distribution(&[
            snapshot("src/main.rs", "Rust", 30),
            snapshot("app.py", "Python", 10),
            snapshot("empty.rs", "Rust", 0),
        ]);

        assert_eq!(distribution.get("Rust").copied(), Some(75.0));
        assert_eq!(distribution.get("Python").copied(), Some(25.0));
    }

    #[test]
    fn distribution_is_empty_without_lines() {
        assert!(language_distribution(&[snapshot("a.rs", "Rust", 0)]).is_empty());
    }

    #[test]
    fn coverage_flags_low_when_tests_and_docs_missing() {
        let records = vec![
            record("src/main.rs", Category::Backend),
            record("src/lib.rs", Category::Backend),
        ];

        let coverage = inspect_coverage(&records, &[]);

        assert_eq!(coverage.code_files, 2);
        assert_eq!(coverage.test_files, 0);
        assert_eq!(coverage.doc_files, 0);
        assert!(coverage.low_test_coverage);
        assert!(coverage.low_doc_coverage);
        assert_eq!(coverage.health_score, 40);
    }

    #[test]
    fn coverage_counts_tests_and_docs() {
        let records = vec![
            record("src/main.rs", Category::Backend),
            record("tests/main_test.rs", Category::Test),
            record("README.md", Category::Docs),
            record("docs/overview.md", Category::Docs),
        ];

        let coverage = inspect_coverage(&records, &[]);

        assert_eq!(coverage.code_files, 2);
        assert_eq!(coverage.test_files, 1);
        assert_eq!(coverage.doc_files, 2);
        assert_eq!(coverage.test_coverage, 0.5);
        assert!(!coverage.low_test_coverage);
        assert!(!coverage.low_doc_coverage);
        assert_eq!(coverage.health_score, 100);
    }

    #[test]
    fn coverage_follows_categories_for_any_language() {
        let records = vec![
            record("src/Main.scala", Category::Backend),
            record("web/App.svelte", Category::Frontend),
            record("tests/MainSpec.scala", Category::Test),
            record("app/fixtures/test_data.py", Category::Backend),
            record("docs/test_plan.md", Category::Docs),
            record("Dockerfile", Category::Docker),
        ];

        let coverage = inspect_coverage(&records, &[]);

        assert_eq!(coverage.code_files, 4);
        assert_eq!(coverage.test_files, 1);
        assert_eq!(coverage.doc_files, 1);
        assert_eq!(coverage.test_coverage, 0.25);
        assert_eq!(coverage.doc_coverage, 0.25);
        assert!(!coverage.low_test_coverage);
        assert!(!coverage.low_doc_coverage);
    }

    #[test]
    fn coverage_is_not_flagged_without_code() {
        let coverage = inspect_coverage(&[record("README.md", Category::Docs)], &[]);

        assert_eq!(coverage.code_files, 0);
        assert_eq!(coverage.doc_coverage, 0.0);
        assert!(!coverage.low_test_coverage);
        assert!(!coverage.low_doc_coverage);
        assert_eq!(coverage.health_score, 100);
    }

    #[test]
    fn health_score_ignores_info_issues() {
        let records = vec![
            record("src/main.rs", Category::Backend),
            record("tests/main_test.rs", Category::Test),
            record("README.md", Category::Docs),
        ];
        let issues = vec![
            Issue::info("src/main.rs", "note"),
            Issue::warning("src/main.rs", "long function"),
            Issue::error("src/lib.rs", "cannot read file"),
        ];

        assert_eq!(inspect_coverage(&records, &issues).health_score, 96);
    }

    #[test]
    fn finding_penalty_is_capped() {
        let coverage = CoverageReport {
            code_files: 0,
            test_files: 0,
            doc_files: 0,
            test_coverage: 0.0,
            doc_coverage: 0.0,
            low_test_coverage: false,
            low_doc_coverage: false,
            health_score: 0,
        };

        assert_eq!(compute_health_score(&coverage, 1000), 70);
    }

    #[test]
    fn structure_groups_files() {
        let records = vec![
            record("README.md", Category::Docs),
            record("app/settings.py", Category::Backend),
            record("app/views.py", Category::Backend),
            record("tests/test_views.py", Category::Test),
            record("Dockerfile", Category::Docker),
        ];

        let structure = inspect_structure(&records, &[snapshot("app/views.py", "Python", 4)]);

        assert_eq!(structure.categories.get(&Category::Backend), Some(&2));
        assert_eq!(structure.extensions.get(".py"), Some(&3));
        assert_eq!(structure.extensions.get("(none)"), Some(&1));
        assert_eq!(structure.directories, vec![".", "app", "tests"]);
        assert_eq!(structure.special_files.config, vec!["app/settings.py"]);
        assert_eq!(structure.special_files.test, vec!["tests/test_views.py"]);
        assert_eq!(structure.special_files.documentation, vec!["README.md"]);
        assert_eq!(structure.languages.get("Python").copied(), Some(100.0));
    }

    #[test]
    fn counts_test_cases_per_language() {
        let python = "import pytest\n\ndef test_a():\n    pass\n\nasync def test_b():\n    pass\n\ndef helper():\n    pass\n";
        let rust = "#[test]\nfn a() {}\n#[tokio::test]\nasync fn b() {}\n#[test]\nfn c() {}\n";
        let js = "import { describe, it } from 'vitest';\ndescribe('x', () => {\n  it('a', () => {});\n  test('b', () => {});\n});\n";
        let go = "package x\n\nfunc TestA(t *testing.T) {}\nfunc helper() {}\n";

        assert_eq!(count_test_cases("tests/test_a.py", python), 2);
        assert_eq!(count_test_cases("tests/a.rs", rust), 3);
        assert_eq!(count_test_cases("src/a.test.ts", js), 2);
        assert_eq!(count_test_cases("a_test.go", go), 1);
        assert_eq!(count_test_cases("notes.txt", python), 0);
    }

    #[test]
    fn test_info_collects_frameworks() {
        let py = record("tests/test_api.py", Category::Test);
        let js = record("web/app.test.js", Category::Test);
        let src = record("src/lib.rs", Category::Backend);
        let broken = record("tests/broken.py", Category::Test);

        let info = inspect_tests([
            (&py, Some("import unittest\n\ndef test_one():\n    pass\n")),
            (&js, Some("test('renders', () => { expect(1).toBe(1); });\n")),
            (&src, Some("#[test]\nfn ignored() {}\n")),
            (&broken, None),
        ]);

        assert_eq!(info.total_test_cases, 2);
        assert_eq!(info.frameworks, vec!["jest", "unittest"]);
        assert_eq!(info.files.len(), 3);
        assert_eq!(info.files[0].path, "tests/broken.py");
        assert_eq!(info.files[0].test_cases, 0);
    }
}
