//! Prompt templating and completion clean-up.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, SoundingError};

/// Placeholder replaced with the file's relative path.
pub const FILE_PATH: &str = "{file_path}";
/// Placeholder replaced with the detected language name.
pub const LANGUAGE: &str = "{language}";
/// Placeholder replaced with the (possibly truncated) file contents.
pub const FILE_CONTENT: &str = "{file_content}";

/// Template used when the configuration does not provide one.
pub const DEFAULT_TEMPLATE: &str = "\
You are reviewing a source file from an unfamiliar codebase.
Explain in a few short paragraphs what the file does, its main types and
functions, and anything that looks fragile or hard to maintain.

File: {file_path}
Language: {language}

```
{file_content}
```
";

const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Values substituted into a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptContext<'a> {
    /// Relative path of the file.
    pub file_path: &'a str,
    /// Language name, or an empty string when unknown.
    pub language: &'a str,
    /// Full file text.
    pub file_content: &'a str,
}

/// Render `template`, truncating content longer than `max_content_chars`.
pub fn render_prompt(template: &str, context: &PromptContext<'_>, max_content_chars: usize) -> String {
    let content = truncate_chars(context.file_content, max_content_chars);
    let mut prompt = template.to_string();
    if prompt.contains(FILE_PATH) {
        prompt = prompt.replace(FILE_PATH, context.file_path);
    }
    if prompt.contains(LANGUAGE) {
        prompt = prompt.replace(LANGUAGE, context.language);
    }
    if prompt.contains(FILE_CONTENT) {
        prompt = prompt.replace(FILE_CONTENT, &content);
    }
    prompt
}

/// Reject templates that would send no file content.
pub fn ensure_placeholders(template: &str) -> Result<()> {
    if template.contains(FILE_CONTENT) {
        Ok(())
    } else {
        Err(SoundingError::Config(format!(
            "llm.prompt_template is missing placeholder {FILE_CONTENT}"
        )))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

fn regex_think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"))
}

fn regex_blank_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"))
}

/// Remove model reasoning from a completion.
///
/// Closed `<think>` blocks are dropped, as is everything before a stray
/// `</think>` and everything after an unterminated `<think>`. Runs of blank
/// lines collapse to one and the result is trimmed.
pub fn strip_reasoning(text: &str) -> String {
    let mut cleaned = regex_think_block().replace_all(text, "").into_owned();
    if let Some(close) = cleaned.rfind("</think>") {
        cleaned = cleaned[close + "</think>".len()..].to_string();
    }
    if let Some(open) = cleaned.find("<think>") {
        cleaned.truncate(open);
    }
    regex_blank_run()
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}
