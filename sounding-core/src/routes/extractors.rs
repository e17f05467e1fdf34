//! Framework-specific route declaration scanners.
//!
//! Each extractor is a handful of regexes over the raw file text. A path
//! argument must be a plain string literal; anything else is reported and
//! skipped.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::RouteConfig;
use crate::domain::{Framework, Issue, RouteEntry, RouteMetadata, RouteParameter, Side};
use crate::routes::pattern::PathPattern;

/// Method recorded for client navigation routes.
pub const NAVIGATION: &str = "NAV";

/// Routes and ambiguities found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRoutes {
    /// Declarations found.
    pub entries: Vec<RouteEntry>,
    /// Declarations that could not be resolved.
    pub issues: Vec<Issue>,
}

/// Scan `text` with the extractor for `framework`.
pub fn extract(framework: Framework, file: &str, text: &str, config: &RouteConfig) -> FileRoutes {
    let mut scan = Scan {
        framework,
        file,
        text,
        config,
        found: FileRoutes::default(),
    };
    match framework {
        Framework::FastApi => scan.python_decorators(regex_fastapi_router_prefix()),
        Framework::Flask => {
            scan.flask_routes();
            scan.python_decorators(regex_flask_blueprint_prefix());
        }
        Framework::Express => scan.express_routes(),
        Framework::Axum => scan.axum_routes(),
        Framework::ReactRouter => {
            scan.jsx_routes();
            scan.object_routes();
        }
        Framework::VueRouter => scan.object_routes(),
    }
    scan.found
        .entries
        .sort_by(|a, b| (a.line, &a.method).cmp(&(b.line, &b.method)));
    scan.found
}

const ARG: &str = r#"(?P<arg>[rRuUbBfF]{0,2}"[^"\n]*"|[rRuUbBfF]{0,2}'[^'\n]*'|`[^`\n]*`|[^\s,)}\]>][^,)}\]>\n]*)"#;

fn regex_python_method() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"@\s*(?P<object>\w+)\.(?P<method>get|post|put|patch|delete|head|options)\s*\(\s*{ARG}"
        ))
        .expect("valid regex")
    })
}

fn regex_flask_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"@\s*(?P<object>\w+)\.route\s*\(\s*{ARG}(?P<rest>[^\n]*)"
        ))
        .expect("valid regex")
    })
}

fn regex_flask_methods() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"methods\s*=\s*[\[(](?P<list>[^\])]*)[\])]").expect("valid regex")
    })
}

fn regex_quoted_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'](?P<word>\w+)["']"#).expect("valid regex"))
}

fn regex_fastapi_router_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"APIRouter\s*\([^)]*?\bprefix\s*=\s*["'](?P<prefix>[^"']*)["']"#)
            .expect("valid regex")
    })
}

fn regex_flask_blueprint_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Blueprint\s*\([^)]*?\burl_prefix\s*=\s*["'](?P<prefix>[^"']*)["']"#)
            .expect("valid regex")
    })
}

fn regex_python_def() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:async\s+)?def\s+(?P<name>\w+)\s*\(").expect("valid regex")
    })
}

fn regex_express_method() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\b(?P<object>app|router|\w+Router|\w+_router)\s*\.\s*(?P<method>get|post|put|patch|delete|all|head|options)\s*\(\s*{ARG}"
        ))
        .expect("valid regex")
    })
}

fn regex_express_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\b(?:app|router|\w+Router|\w+_router)\s*\.\s*route\s*\(\s*{ARG}"
        ))
        .expect("valid regex")
    })
}

fn regex_axum_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\.\s*route\s*\(\s*{ARG}")).expect("valid regex"))
}

fn regex_axum_method() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[\s.(,:])(?P<method>get|post|put|patch|delete|head|options|trace|any)\s*\(",
        )
        .expect("valid regex")
    })
}

fn regex_jsx_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"<Route\b[^>]*?\bpath\s*=\s*\{{?\s*{ARG}")).expect("valid regex")
    })
}

fn regex_object_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\bpath\s*:\s*{ARG}")).expect("valid regex"))
}

fn regex_component() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\b(?:component|element|Component)\s*[:=]\s*\{?\s*(?:<\s*)?(?:(?:(?:React\.)?lazy\s*\(\s*)?\(\s*\)\s*=>\s*import\s*\(\s*['"](?P<module>[^'"]+)['"]|(?P<name>[A-Z]\w*))"#,
        )
        .expect("valid regex")
    })
}

fn regex_lazy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\blazy\s*\(|\bimport\s*\(|defineAsyncComponent\s*\(").expect("valid regex")
    })
}

struct Scan<'a> {
    framework: Framework,
    file: &'a str,
    text: &'a str,
    config: &'a RouteConfig,
    found: FileRoutes,
}

impl Scan<'_> {
    /// `@app.get("/p")` style decorators, for FastAPI and Flask 2.
    fn python_decorators(&mut self, router_prefix: &Regex) {
        let prefix = router_prefix
            .captures(self.text)
            .and_then(|captures| captures.name("prefix"))
            .map(|m| PathPattern::parse(m.as_str()));
        for captures in regex_python_method().captures_iter(self.text) {
            let method = captures["method"].to_uppercase();
            let object_prefix = prefix.as_ref().filter(|_| &captures["object"] != "app");
            let handler = python_handler_after(self.text, &captures);
            self.push_python(&captures, &[method], object_prefix, handler);
        }
    }

    /// `@app.route("/p", methods=[...])`, defaulting to GET.
    fn flask_routes(&mut self) {
        let prefix = regex_flask_blueprint_prefix()
            .captures(self.text)
            .and_then(|captures| captures.name("prefix"))
            .map(|m| PathPattern::parse(m.as_str()));
        for captures in regex_flask_route().captures_iter(self.text) {
            let mut methods: Vec<String> = captures
                .name("rest")
                .and_then(|rest| regex_flask_methods().captures(rest.as_str()))
                .map(|list| {
                    regex_quoted_word()
                        .captures_iter(&list["list"])
                        .map(|word| word["word"].to_uppercase())
                        .collect()
                })
                .unwrap_or_default();
            if methods.is_empty() {
                methods.push("GET".to_string());
            }
            let object_prefix = prefix.as_ref().filter(|_| &captures["object"] != "app");
            let handler = python_handler_after(self.text, &captures);
            self.push_python(&captures, &methods, object_prefix, handler);
        }
    }

    fn push_python(
        &mut self,
        captures: &Captures<'_>,
        methods: &[String],
        prefix: Option<&PathPattern>,
        handler: Option<PythonHandler>,
    ) {
        let Some(handler) = handler else {
            self.push(captures, methods, prefix, None);
            return;
        };
        for entry in self.push(captures, methods, prefix, Some(handler.name)) {
            entry.metadata.parameters = handler.parameters.clone();
            entry.metadata.docstring = handler.docstring.clone();
        }
    }

    /// `app.get('/p', ...)` and `router.route('/p').get(...).post(...)`.
    fn express_routes(&mut self) {
        for captures in regex_express_method().captures_iter(self.text) {
            if !self.looks_like_path(&captures) {
                continue;
            }
            let method = match &captures["method"] {
                "all" => "ANY".to_string(),
                other => other.to_uppercase(),
            };
            self.push(&captures, &[method], None, None);
        }
        for captures in regex_express_route().captures_iter(self.text) {
            let Some(open) = call_open(self.text, &captures) else {
                continue;
            };
            let mut methods = Vec::new();
            let mut cursor = skip_call(self.text, open);
            while let Some((name, next)) = chained_call(self.text, cursor) {
                match name {
                    "get" | "post" | "put" | "patch" | "delete" | "head" | "options" => {
                        methods.push(name.to_uppercase())
                    }
                    "all" => methods.push("ANY".to_string()),
                    _ => break,
                }
                cursor = next;
            }
            if methods.is_empty() {
                methods.push("ANY".to_string());
            }
            self.push(&captures, &methods, None, None);
        }
    }

    /// `.route("/p", get(handler).post(other))`.
    fn axum_routes(&mut self) {
        for captures in regex_axum_route().captures_iter(self.text) {
            let Some(open) = call_open(self.text, &captures) else {
                continue;
            };
            let close = skip_call(self.text, open);
            let arg_end = captures.name("arg").map(|m| m.end()).unwrap_or(close);
            let router = &self.text[arg_end.min(close)..close];
            let mut methods: Vec<String> = regex_axum_method()
                .captures_iter(router)
                .map(|m| m["method"].to_uppercase())
                .collect();
            methods.dedup();
            if methods.is_empty() {
                methods.push("ANY".to_string());
            }
            self.push(&captures, &methods, None, None);
        }
    }

    /// `<Route path="/p" element={<Page />} />`.
    fn jsx_routes(&mut self) {
        for captures in regex_jsx_route().captures_iter(self.text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let tag_end = self.text[whole.end()..]
                .find('>')
                .map_or(self.text.len(), |offset| whole.end() + offset);
            let component = component_in(&self.text[whole.start()..tag_end]);
            self.push(&captures, &[NAVIGATION.to_string()], None, component);
        }
    }

    /// `{ path: '/p', component: Page }` route tables.
    fn object_routes(&mut self) {
        for captures in regex_object_route().captures_iter(self.text) {
            let start = captures.get(0).map(|m| m.start()).unwrap_or_default();
            let end = object_end(self.text, start);
            let component = component_in(&self.text[start..end]);
            self.push(&captures, &[NAVIGATION.to_string()], None, component);
        }
    }

    fn looks_like_path(&self, captures: &Captures<'_>) -> bool {
        match string_literal(&captures["arg"]) {
            Some(path) => path.starts_with('/') || path.starts_with('*'),
            None => true,
        }
    }

    fn push(
        &mut self,
        captures: &Captures<'_>,
        methods: &[String],
        prefix: Option<&PathPattern>,
        component: Option<String>,
    ) -> &mut [RouteEntry] {
        let first_new = self.found.entries.len();
        let start = captures.get(0).map(|m| m.start()).unwrap_or_default();
        let line = line_of(self.text, start);
        let arg = &captures["arg"];
        let Some(raw_path) = string_literal(arg) else {
            self.found.issues.push(
                Issue::info(
                    self.file,
                    format!("route path `{}` is not a string literal; skipped", arg.trim()),
                )
                .at_line(line),
            );
            return &mut self.found.entries[first_new..];
        };

        let pattern = PathPattern::parse(&raw_path);
        let pattern = match prefix {
            Some(prefix) => prefix.join(&pattern),
            None => pattern,
        };
        let mut metadata = self.metadata_near(line);
        metadata.component = component;

        let side = self.framework.side();
        if side == Side::Client {
            metadata.lazy = regex_lazy().is_match(&self.text[start..object_end(self.text, start)]);
        }
        for method in methods {
            self.found.entries.push(RouteEntry {
                path: pattern.to_string(),
                raw_path: raw_path.clone(),
                method: method.clone(),
                side,
                framework: self.framework,
                file: self.file.to_string(),
                line,
                metadata: metadata.clone(),
            });
        }
        &mut self.found.entries[first_new..]
    }

    /// Keyword scan over `metadata_window` lines either side of `line`.
    fn metadata_near(&self, line: usize) -> RouteMetadata {
        let window = self.config.metadata_window;
        let first = line.saturating_sub(window + 1);
        let context: Vec<&str> = self
            .text
            .lines()
            .skip(first)
            .take(line - first + window)
            .collect();
        let context = context.join("\n");

        let mut guards = Vec::new();
        for keyword in &self.config.guard_keywords {
            if let Some(name) = guard_name(&context, keyword) {
                if !guards.contains(&name) {
                    guards.push(name);
                }
            }
        }

        RouteMetadata {
            auth_required: contains_any(&context, &self.config.auth_keywords),
            guards,
            rate_limited: contains_any(&context, &self.config.rate_limit_keywords),
            cached: contains_any(&context, &self.config.cache_keywords),
            lazy: false,
            component: None,
            parameters: Vec::new(),
            docstring: None,
        }
    }
}

/// Name, signature and docstring of the `def` following a decorator.
struct PythonHandler {
    name: String,
    parameters: Vec<RouteParameter>,
    docstring: Option<String>,
}

fn python_handler_after(text: &str, captures: &Captures<'_>) -> Option<PythonHandler> {
    let end = captures.get(0).map(|m| m.end()).unwrap_or_default();
    let def = regex_python_def().captures(&text[end..])?;
    let whole = def.get(0)?;
    let open = end + whole.end() - 1;
    let close = skip_call(text, open);
    let signature = text.get(open + 1..close.saturating_sub(1)).unwrap_or_default();
    let body_start = text[close..].find('\n').map_or(text.len(), |at| close + at + 1);
    Some(PythonHandler {
        name: def["name"].to_string(),
        parameters: python_parameters(signature),
        docstring: python_docstring(&text[body_start..]),
    })
}

/// Positional parameters are required, those after `*` or `*args` are
/// keyword-only and optional. Variadics and the `/` marker are dropped.
fn python_parameters(signature: &str) -> Vec<RouteParameter> {
    let mut parameters = Vec::new();
    let mut keyword_only = false;
    for raw in split_top_level(signature) {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" || raw.starts_with("**") {
            continue;
        }
        if raw.starts_with('*') {
            keyword_only = true;
            continue;
        }
        let (head, _default) = raw.split_once('=').unwrap_or((raw, ""));
        let (name, annotation) = match head.split_once(':') {
            Some((name, annotation)) => (name.trim(), annotation.trim()),
            None => (head.trim(), ""),
        };
        parameters.push(RouteParameter {
            name: name.to_string(),
            type_name: if annotation.is_empty() {
                "Any".to_string()
            } else {
                annotation.to_string()
            },
            required: !keyword_only,
        });
    }
    parameters
}

/// Split on commas outside brackets and string literals.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (offset, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(open), ch) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&text[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// The triple-quoted string opening a function body, dedented.
fn python_docstring(body: &str) -> Option<String> {
    let first = body.trim_start();
    let first = first.trim_start_matches(['r', 'R', 'u', 'U']);
    let delimiter = ["\"\"\"", "'''"]
        .into_iter()
        .find(|delimiter| first.starts_with(*delimiter))?;
    let inner = &first[delimiter.len()..];
    let inner = &inner[..inner.find(delimiter)?];

    let mut lines = inner.lines();
    let head = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut cleaned = vec![head.to_string()];
    cleaned.extend(
        rest.iter()
            .map(|line| line.get(indent..).unwrap_or("").trim_end().to_string()),
    );
    let doc = cleaned.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn contains_any(context: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && context.contains(keyword.as_str()))
}

/// The identifier a guard keyword points at, or the keyword itself.
fn guard_name(context: &str, keyword: &str) -> Option<String> {
    let index = context.find(keyword)?;
    let after = context[index + keyword.len()..].trim_start();
    let after = after
        .strip_prefix([':', '=', '('])
        .map(|rest| rest.trim_start().trim_start_matches(['[', '{']).trim_start());
    let name: Option<String> = after.map(|rest| {
        rest.chars()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_' || *ch == '.')
            .collect()
    });
    match name {
        Some(name) if !name.is_empty() => Some(name),
        _ => Some(keyword.to_string()),
    }
}

fn component_in(snippet: &str) -> Option<String> {
    let captures = regex_component().captures(snippet)?;
    captures
        .name("name")
        .or_else(|| captures.name("module"))
        .map(|m| m.as_str().to_string())
}

/// The string value of a quoted literal, or `None` for anything computed.
pub(crate) fn string_literal(arg: &str) -> Option<String> {
    let arg = arg.trim();
    let quote_at = arg.find(['"', '\'', '`'])?;
    let (prefix, quoted) = arg.split_at(quote_at);
    if !prefix.chars().all(|ch| "rRuUbB".contains(ch)) {
        return None;
    }
    let quote = quoted.chars().next()?;
    let inner = quoted.strip_prefix(quote)?.strip_suffix(quote)?;
    if quote == '`' && inner.contains("${") {
        return None;
    }
    Some(inner.to_string())
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Byte offset of the `(` opening the call matched by `captures`.
fn call_open(text: &str, captures: &Captures<'_>) -> Option<usize> {
    let arg_start = captures.name("arg")?.start();
    text[..arg_start].rfind('(')
}

/// Offset just past the `)` balancing the `(` at `open`.
fn skip_call(text: &str, open: usize) -> usize {
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return open + offset + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

/// A `.name(...)` call starting at `cursor`, returning the name and the
/// offset past its closing paren.
fn chained_call(text: &str, cursor: usize) -> Option<(&str, usize)> {
    let after_dot = text[cursor..].trim_start().strip_prefix('.')?.trim_start();
    let name_start = text.len() - after_dot.len();
    let name_len = after_dot
        .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .unwrap_or(after_dot.len());
    let name = &text[name_start..name_start + name_len];
    let open = text[name_start + name_len..].find('(')? + name_start + name_len;
    if name_len == 0 || !text[name_start + name_len..open].trim().is_empty() {
        return None;
    }
    Some((name, skip_call(text, open)))
}

/// End of the object literal or JSX tag enclosing `start`, bounded to the
/// next sibling declaration.
fn object_end(text: &str, start: usize) -> usize {
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return start + offset;
                }
            }
            '>' if depth == 0 && text[start..start + offset].ends_with('/') => {
                return start + offset;
            }
            _ => {}
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::{NAVIGATION, extract, string_literal};
    use crate::config::RouteConfig;
    use crate::domain::{Framework, Severity, Side};

    fn scan(framework: Framework, text: &str) -> super::FileRoutes {
        extract(framework, "src/file", text, &RouteConfig::default())
    }

    #[test]
    fn string_literal_accepts_only_plain_strings() {
        assert_eq!(string_literal("\"/users\""), Some("/users".to_string()));
        assert_eq!(string_literal("'/users'"), Some("/users".to_string()));
        assert_eq!(string_literal("r\"/raw\""), Some("/raw".to_string()));
        assert_eq!(string_literal("`/static`"), Some("/static".to_string()));
        assert_eq!(string_literal("`/users/${id}`"), None);
        assert_eq!(string_literal("f\"/users/{uid}\""), None);
        assert_eq!(string_literal("ROUTES.home"), None);
    }

    #[test]
    fn fastapi_decorators_with_router_prefix_and_auth() {
        let text = r#"
from fastapi import APIRouter, Depends

router = APIRouter(prefix="/api/users")

@router.get("/{user_id}")
async def read_user(user_id: int, current=Depends(get_current_user)):
    return {}

@router.post("/")
def create_user():
    pass
"#;
        let routes = scan(Framework::FastApi, text);
        assert!(routes.issues.is_empty());
        assert_eq!(routes.entries.len(), 2);

        let read = &routes.entries[0];
        assert_eq!(read.method, "GET");
        assert_eq!(read.path, "/api/users/:user_id");
        assert_eq!(read.raw_path, "/{user_id}");
        assert_eq!(read.line, 6);
        assert_eq!(read.side, Side::Server);
        assert!(read.metadata.auth_required);
        assert_eq!(read.metadata.component.as_deref(), Some("read_user"));

        let create = &routes.entries[1];
        assert_eq!(create.method, "POST");
        assert_eq!(create.path, "/api/users");
        assert_eq!(create.metadata.component.as_deref(), Some("create_user"));
    }

    #[test]
    fn python_handlers_record_parameters_and_docstring() {
        let text = r#"
@app.get("/items/{item_id}")
async def read_item(
    item_id: int,
    q: Optional[str] = None,
    *,
    limit: Dict[str, int] = {"a": 1, "b": 2},
    verbose=False,
    **extra,
) -> Item:
    """Fetch one item.

        Continuation lines are dedented.
    """
    return {}

@app.post("/plain")
def plain(body):
    return body
"#;
        let routes = scan(Framework::FastApi, text);
        assert_eq!(routes.entries.len(), 2);

        let read = &routes.entries[0].metadata;
        assert_eq!(read.component.as_deref(), Some("read_item"));
        let parameters: Vec<(&str, &str, bool)> = read
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_name.as_str(), p.required))
            .collect();
        assert_eq!(
            parameters,
            vec![
                ("item_id", "int", true),
                ("q", "Optional[str]", true),
                ("limit", "Dict[str, int]", false),
                ("verbose", "Any", false),
            ]
        );
        assert_eq!(
            read.docstring.as_deref(),
            Some("Fetch one item.\n\nContinuation lines are dedented.")
        );

        let plain = &routes.entries[1].metadata;
        assert_eq!(plain.parameters.len(), 1);
        assert_eq!(plain.parameters[0].type_name, "Any");
        assert!(plain.docstring.is_none());
    }

    #[test]
    fn flask_routes_default_to_get_and_expand_methods() {
        let text = r#"
@app.route("/login", methods=["GET", "POST"])
def login():
    pass


@app.route('/health')
def health():
    return "ok"
"#;
        let routes = scan(Framework::Flask, text);
        let summary: Vec<(&str, &str)> = routes
            .entries
            .iter()
            .map(|entry| (entry.method.as_str(), entry.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("GET", "/login"), ("POST", "/login"), ("GET", "/health")]
        );
    }

    #[test]
    fn flask_blueprint_prefix_applies_to_blueprint_routes() {
        let text = r#"
bp = Blueprint("orders", __name__, url_prefix="/api/orders")

@bp.route("/<int:order_id>")
@login_required
def show(order_id):
    pass
"#;
        let routes = scan(Framework::Flask, text);
        assert_eq!(routes.entries.len(), 1);
        assert_eq!(routes.entries[0].path, "/api/orders/:order_id");
        assert!(routes.entries[0].metadata.auth_required);
    }

    #[test]
    fn express_methods_and_route_chains() {
        let text = r#"
const router = express.Router();
app.set('port', 3000);
app.get('env');
router.get('/users/:id', limiter, (req, res) => res.json({}));
router.route('/books')
  .get(listBooks)
  .post(createBook);
app.get(BASE_PATH, handler);
"#;
        let routes = scan(Framework::Express, text);
        let summary: Vec<(&str, &str, usize)> = routes
            .entries
            .iter()
            .map(|entry| (entry.method.as_str(), entry.path.as_str(), entry.line))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GET", "/users/:id", 5),
                ("GET", "/books", 6),
                ("POST", "/books", 6),
            ]
        );
        assert!(routes.entries[0].metadata.rate_limited);

        assert_eq!(routes.issues.len(), 1);
        assert_eq!(routes.issues[0].severity, Severity::Info);
        assert_eq!(routes.issues[0].line, Some(9));
        assert!(routes.issues[0].message.contains("BASE_PATH"));
    }

    #[test]
    fn axum_routes_collect_every_method_router() {
        let text = r#"
let app = Router::new()
    .route("/api/users", get(list_users).post(create_user))
    .route(
        "/api/users/{id}",
        get(show_user).delete(delete_user),
    )
    .route("/health", axum::routing::get(health));
"#;
        let routes = scan(Framework::Axum, text);
        let summary: Vec<(&str, &str)> = routes
            .entries
            .iter()
            .map(|entry| (entry.method.as_str(), entry.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GET", "/api/users"),
                ("POST", "/api/users"),
                ("DELETE", "/api/users/:id"),
                ("GET", "/api/users/:id"),
                ("GET", "/health"),
            ]
        );
    }

    #[test]
    fn react_jsx_and_object_routes() {
        let text = r#"
const Settings = lazy(() => import("./Settings"));

export function App() {
  return (
    <Routes>
      <Route path="/users/:id" element={<UserPage />} />
      <Route path={"/settings"} element={<Settings />} />
    </Routes>
  );
}

const router = createBrowserRouter([{ path: '/about', element: <About /> }]);
"#;
        let routes = scan(Framework::ReactRouter, text);
        let paths: Vec<&str> = routes.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/users/:id", "/settings", "/about"]);
        assert!(routes.entries.iter().all(|e| e.method == NAVIGATION));
        assert_eq!(
            routes.entries[0].metadata.component.as_deref(),
            Some("UserPage")
        );
        assert_eq!(
            routes.entries[2].metadata.component.as_deref(),
            Some("About")
        );
    }

    #[test]
    fn vue_routes_capture_guards_and_lazy_components() {
        let text = r#"
const routes = [
  { path: '/', name: 'home', component: Home },
  {
    path: '/admin',
    component: () => import('../views/Admin.vue'),
    beforeEnter: requireAdmin,
    meta: { requiresAuth: true },
  },
  { path: dynamicPath, component: Other },
];
"#;
        let routes = scan(Framework::VueRouter, text);
        assert_eq!(routes.entries.len(), 2);

        let home = &routes.entries[0];
        assert_eq!(home.path, "/");
        assert_eq!(home.metadata.component.as_deref(), Some("Home"));

        assert!(!home.metadata.lazy);

        let admin = &routes.entries[1];
        assert_eq!(admin.path, "/admin");
        assert!(admin.metadata.lazy);
        assert_eq!(
            admin.metadata.component.as_deref(),
            Some("../views/Admin.vue")
        );
        assert!(admin.metadata.auth_required);
        assert_eq!(admin.metadata.guards, vec!["requireAdmin".to_string()]);

        assert_eq!(routes.issues.len(), 1);
        assert_eq!(routes.issues[0].line, Some(10));
    }
}
