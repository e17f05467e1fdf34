//! Lexical size and complexity metrics.
//!
//! Nothing here parses source code. Each file gets one pass that:
//!
//! - sorts lines into blank, comment, and code using `tokei`'s comment
//!   delimiters;
//! - counts function and class declarations with per-language signature
//!   patterns, measuring their spans by brace matching (or indentation for
//!   Python, `end` keywords for Ruby);
//! - estimates cyclomatic complexity as `1 +` the branching keywords found
//!   on code lines;
//! - derives a maintainability index from those numbers.
//!
//! A line holding code followed by a trailing comment counts as code, and a
//! block comment only opens when its delimiter starts the line. Keywords
//! inside string literals are counted. These approximations are accepted.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tokei::LanguageType;

use crate::config::MetricsConfig;
use crate::domain::{FileRecord, Issue, MetricsSnapshot};
use crate::fs::FileContents;

/// Computes a [`MetricsSnapshot`] for a single file.
#[derive(Debug, Clone)]
pub struct MetricsExtractor {
    thresholds: MetricsConfig,
}

impl MetricsExtractor {
    /// Create an extractor applying the given thresholds.
    pub fn new(thresholds: MetricsConfig) -> Self {
        Self { thresholds }
    }

    /// Measure a classified file. Unreadable or binary content yields an
    /// empty snapshot carrying an error issue.
    pub fn extract(&self, record: &FileRecord, contents: &FileContents) -> MetricsSnapshot {
        match contents {
            FileContents::Deferred => {
                let mut snapshot = MetricsSnapshot::empty(&record.path);
                snapshot.issues.push(Issue::warning(
                    &record.path,
                    "skipped: memory limit reached",
                ));
                snapshot
            }
            _ => match contents.text() {
                Some(text) => self.measure(&record.path, text),
                None => {
                    let mut snapshot = MetricsSnapshot::empty(&record.path);
                    snapshot
                        .issues
                        .push(Issue::error(&record.path, "cannot read file"));
                    snapshot
                }
            },
        }
    }

    /// Measure `text` as the contents of `path`.
    pub fn measure(&self, path: &str, text: &str) -> MetricsSnapshot {
        let language = LanguageType::from_path(Path::new(path), &tokei::Config::default());
        let family = Family::of(language);
        let syntax = CommentSyntax::of(language);

        let lines: Vec<&str> = text.lines().collect();
        let kinds = classify_lines(&lines, &syntax);
        let code_lines = kinds.iter().filter(|k| **k == LineKind::Code).count();
        let comment_lines = kinds.iter().filter(|k| **k == LineKind::Comment).count();
        let blank_lines = kinds.iter().filter(|k| **k == LineKind::Blank).count();

        let complexity = cyclomatic_complexity(&lines, &kinds, family);
        let functions = family
            .function_pattern()
            .map(|pattern| find_declarations(&lines, &kinds, pattern, family))
            .unwrap_or_default();
        let classes = family
            .class_pattern()
            .map(|pattern| find_declarations(&lines, &kinds, pattern, family))
            .unwrap_or_default();

        let mut issues = Vec::new();
        for span in &functions {
            if span.length() > self.thresholds.max_function_length {
                issues.push(
                    Issue::warning(
                        path,
                        format!(
                            "function `{}` is {} lines long (max {})",
                            span.name,
                            span.length(),
                            self.thresholds.max_function_length
                        ),
                    )
                    .at_line(span.start + 1),
                );
            }
        }
        for span in &classes {
            if span.length() > self.thresholds.max_class_length {
                issues.push(
                    Issue::warning(
                        path,
                        format!(
                            "class `{}` is {} lines long (max {})",
                            span.name,
                            span.length(),
                            self.thresholds.max_class_length
                        ),
                    )
                    .at_line(span.start + 1),
                );
            }
        }
        if lines.len() > self.thresholds.max_file_length {
            issues.push(Issue::warning(
                path,
                format!(
                    "file is {} lines long (max {})",
                    lines.len(),
                    self.thresholds.max_file_length
                ),
            ));
        }
        if complexity > self.thresholds.complexity_threshold {
            issues.push(Issue::warning(
                path,
                format!(
                    "complexity {complexity} exceeds threshold {}",
                    self.thresholds.complexity_threshold
                ),
            ));
        }

        MetricsSnapshot {
            path: path.to_string(),
            language: language.map(|language| language.to_string()),
            lines_of_code: lines.len(),
            code_lines,
            comment_lines,
            blank_lines,
            functions: functions.len(),
            classes: classes.len(),
            complexity,
            maintainability: maintainability_index(complexity, code_lines, comment_lines),
            issues,
        }
    }
}

/// Display name of the language `tokei` associates with `path`.
pub fn language_name(path: &str) -> Option<String> {
    LanguageType::from_path(Path::new(path), &tokei::Config::default())
        .map(|language| language.to_string())
}

/// Maintainability index on a 0-100 scale.
///
/// `MI = (171 - 5.2 ln V - 0.23 CC - 16.2 ln LOC + 50 sin(sqrt(2.4 CR))) * 100 / 171`
/// where `LOC` is code lines, `V = LOC * ln(LOC + 1)` stands in for Halstead
/// volume and `CR` is `comment / (code + comment)`. Logarithm arguments are
/// floored at 1, the result is clamped to `[0, 100]` and rounded to two
/// decimals. A file without code or comments scores 100.
pub fn maintainability_index(complexity: u32, code_lines: usize, comment_lines: usize) -> f64 {
    if code_lines == 0 && comment_lines == 0 {
        return 100.0;
    }
    let code = code_lines.max(1) as f64;
    let volume = (code * (code + 1.0).ln()).max(1.0);
    let comment_ratio = comment_lines as f64 / (code_lines + comment_lines) as f64;
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * complexity as f64 - 16.2 * code.ln()
        + 50.0 * (2.4 * comment_ratio).sqrt().sin();
    let scaled = (raw * 100.0 / 171.0).clamp(0.0, 100.0);
    (scaled * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Code,
}

struct CommentSyntax {
    line: Vec<&'static str>,
    block: Vec<(&'static str, &'static str)>,
}

impl CommentSyntax {
    fn of(language: Option<LanguageType>) -> Self {
        match language {
            Some(language) => {
                let mut block = language.multi_line_comments().to_vec();
                if language == LanguageType::Python {
                    block.push(("\"\"\"", "\"\"\""));
                    block.push(("'''", "'''"));
                }
                Self {
                    line: language.line_comments().to_vec(),
                    block,
                }
            }
            None => Self {
                line: vec!["//", "#"],
                block: vec![("/*", "*/")],
            },
        }
    }
}

fn classify_lines(lines: &[&str], syntax: &CommentSyntax) -> Vec<LineKind> {
    let mut kinds = Vec::with_capacity(lines.len());
    let mut open_block: Option<&str> = None;

    for line in lines {
        let trimmed = line.trim();
        if let Some(close) = open_block {
            kinds.push(LineKind::Comment);
            if trimmed.contains(close) {
                open_block = None;
            }
            continue;
        }
        if trimmed.is_empty() {
            kinds.push(LineKind::Blank);
        } else if syntax.line.iter().any(|prefix| trimmed.starts_with(prefix)) {
            kinds.push(LineKind::Comment);
        } else if let Some((open, close)) = syntax
            .block
            .iter()
            .find(|(open, _)| trimmed.starts_with(open))
        {
            kinds.push(LineKind::Comment);
            if !trimmed[open.len()..].contains(close) {
                open_block = Some(close);
            }
        } else {
            kinds.push(LineKind::Code);
        }
    }

    kinds
}

/// Language groups sharing declaration and branching syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Rust,
    Python,
    Script,
    Go,
    Swift,
    Kotlin,
    CLike,
    Ruby,
    Php,
    Plain,
}

impl Family {
    fn of(language: Option<LanguageType>) -> Self {
        match language {
            Some(LanguageType::Rust) => Self::Rust,
            Some(LanguageType::Python) => Self::Python,
            Some(
                LanguageType::JavaScript
                | LanguageType::TypeScript
                | LanguageType::Jsx
                | LanguageType::Tsx
                | LanguageType::Vue
                | LanguageType::Svelte,
            ) => Self::Script,
            Some(LanguageType::Go) => Self::Go,
            Some(LanguageType::Swift) => Self::Swift,
            Some(LanguageType::Kotlin) => Self::Kotlin,
            Some(
                LanguageType::Java
                | LanguageType::CSharp
                | LanguageType::C
                | LanguageType::CHeader
                | LanguageType::Cpp
                | LanguageType::CppHeader
                | LanguageType::Scala,
            ) => Self::CLike,
            Some(LanguageType::Ruby) => Self::Ruby,
            Some(LanguageType::Php) => Self::Php,
            _ => Self::Plain,
        }
    }

    fn branch_pattern(self) -> Option<&'static Regex> {
        match self {
            Self::Python => Some(regex_branch_python()),
            Self::Ruby => Some(regex_branch_ruby()),
            Self::Rust => Some(regex_branch_rust()),
            Self::Plain => None,
            _ => Some(regex_branch_c()),
        }
    }

    fn function_pattern(self) -> Option<&'static Regex> {
        match self {
            Self::Rust => Some(regex_fn_rust()),
            Self::Python => Some(regex_fn_python()),
            Self::Script => Some(regex_fn_script()),
            Self::Go | Self::Swift => Some(regex_fn_func()),
            Self::Kotlin => Some(regex_fn_kotlin()),
            Self::CLike => Some(regex_fn_c()),
            Self::Ruby => Some(regex_fn_ruby()),
            Self::Php => Some(regex_fn_php()),
            Self::Plain => None,
        }
    }

    fn class_pattern(self) -> Option<&'static Regex> {
        match self {
            Self::Rust => Some(regex_class_rust()),
            Self::Python => Some(regex_class_python()),
            Self::Script => Some(regex_class_script()),
            Self::Go => Some(regex_class_go()),
            Self::Swift | Self::Kotlin | Self::CLike | Self::Php => Some(regex_class_c()),
            Self::Ruby => Some(regex_class_ruby()),
            Self::Plain => None,
        }
    }
}

fn regex_branch_c() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:if|for|while|case|catch)\b|&&|\|\|").expect("valid regex")
    })
}

fn regex_branch_rust() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:if|for|while|case|catch)\b|&&|\|\||=>").expect("valid regex")
    })
}

fn regex_branch_python() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:if|elif|for|while|except|and|or)\b").expect("valid regex")
    })
}

fn regex_branch_ruby() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:if|elsif|unless|for|while|until|when|rescue)\b|&&|\|\|")
            .expect("valid regex")
    })
}

fn regex_fn_rust() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|const|extern\s+"[^"]*")\s+)*fn\s+(?P<name>\w+)"#,
        )
        .expect("valid regex")
    })
}

fn regex_fn_python() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:async\s+)?def\s+(?P<name>\w+)\s*\(").expect("valid regex"))
}

fn regex_fn_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w*)\s*\(",
            r"|^\s*(?:export\s+)?(?:const|let|var)\s+(?P<arrow>\w+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*(?::[^=]+)?=>",
            r"|^\s*(?:(?:public|private|protected|static|readonly|async|get|set)\s+)*(?P<method>\w+)\s*\([^)]*\)\s*(?::[^{]+)?\{\s*$",
        ))
        .expect("valid regex")
    })
}

fn regex_fn_func() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[a-z]+\s+)*func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)").expect("valid regex")
    })
}

fn regex_fn_kotlin() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[a-z]+\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?(?P<name>\w+)\s*\(")
            .expect("valid regex")
    })
}

fn regex_fn_c() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:[\w<>\[\],.*&:?]+\s+)+[*&]*(?P<name>~?\w+)\s*\([^;{}]*\)\s*(?:const\s*)?(?:throws\s+[\w.,\s]+)?\{\s*$",
        )
        .expect("valid regex")
    })
}

fn regex_fn_ruby() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*def\s+(?:self\.)?(?P<name>[\w?!=]+)").expect("valid regex"))
}

fn regex_fn_php() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?(?P<name>\w+)",
        )
        .expect("valid regex")
    })
}

fn regex_class_rust() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?:struct|enum|trait|union)\s+(?P<name>\w+)|^\s*(?:unsafe\s+)?impl\b(?:<[^>]*>)?\s+(?:[\w:<>,\s]+\s+for\s+)?(?P<impl>[\w:]+)",
        )
        .expect("valid regex")
    })
}

fn regex_class_python() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*class\s+(?P<name>\w+)").expect("valid regex"))
}

fn regex_class_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface)\s+(?P<name>\w+)",
        )
        .expect("valid regex")
    })
}

fn regex_class_go() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*type\s+(?P<name>\w+)\s+(?:struct|interface)\b").expect("valid regex")
    })
}

fn regex_class_c() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:public|private|protected|internal|static|abstract|final|sealed|partial|data|open|export)\s+)*(?:class|interface|struct|enum|record|trait|protocol|object)\s+(?P<name>\w+)",
        )
        .expect("valid regex")
    })
}

fn regex_class_ruby() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:class|module)\s+(?P<name>[\w:]+)").expect("valid regex"))
}

const CONTROL_WORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "do", "with", "new", "typeof",
    "foreach", "using", "lock", "synchronized",
];

fn cyclomatic_complexity(lines: &[&str], kinds: &[LineKind], family: Family) -> u32 {
    let Some(pattern) = family.branch_pattern() else {
        return 1;
    };
    let branches: usize = lines
        .iter()
        .zip(kinds)
        .filter(|(_, kind)| **kind == LineKind::Code)
        .map(|(line, _)| pattern.find_iter(line).count())
        .sum();
    1 + branches as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclarationSpan {
    name: String,
    start: usize,
    end: usize,
}

impl DeclarationSpan {
    fn length(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }
}

/// Every declaration matching `pattern` on a code line, including nested
/// ones. Declarations without a body (trait signatures, prototypes) are
/// skipped.
fn find_declarations(
    lines: &[&str],
    kinds: &[LineKind],
    pattern: &Regex,
    family: Family,
) -> Vec<DeclarationSpan> {
    let mut spans = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if kinds[index] != LineKind::Code {
            continue;
        }
        let Some(captures) = pattern.captures(line) else {
            continue;
        };
        let (group, name) = ["name", "arrow", "method", "impl"]
            .iter()
            .find_map(|group| captures.name(group).map(|m| (*group, m.as_str())))
            .unwrap_or(("name", ""));
        // Only the keyword-less method shapes can mistake a call or
        // statement for a declaration.
        let keywordless = group == "method" || family == Family::CLike;
        if keywordless && CONTROL_WORDS.contains(&name) {
            continue;
        }
        let end = match family {
            Family::Python => Some(find_indent_end(lines, index)),
            Family::Ruby => find_keyword_end(lines, index),
            _ => find_brace_end(lines, index),
        };
        if let Some(end) = end {
            spans.push(DeclarationSpan {
                name: if name.is_empty() {
                    "<anonymous>".to_string()
                } else {
                    name.to_string()
                },
                start: index,
                end,
            });
        }
    }
    spans
}

/// Line holding the brace that closes the first block opened at or after
/// `start`. A `;` before any `{` means there is no body.
fn find_brace_end(lines: &[&str], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut opened = false;
    for (index, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if opened => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(index);
                    }
                }
                ';' if !opened => return None,
                _ => {}
            }
        }
    }
    None
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Last non-blank line indented deeper than the declaration at `start`.
fn find_indent_end(lines: &[&str], start: usize) -> usize {
    let base = indent_of(lines[start]);
    let mut last = start;
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if indent_of(line) <= base {
            break;
        }
        last = index;
    }
    last
}

/// Line holding the `end` keyword at the declaration's own indentation.
fn find_keyword_end(lines: &[&str], start: usize) -> Option<usize> {
    let base = indent_of(lines[start]);
    if lines[start].trim_end().ends_with(" end") || lines[start].contains(';') {
        return Some(start);
    }
    lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| line.trim() == "end" && indent_of(line) == base)
        .map(|(index, _)| index)
}
