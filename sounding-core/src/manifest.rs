//! Project manifests at the repository root: description and version,
//! declared dependencies, and the application frameworks they imply.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::fs::FileSystem;

/// Version recorded for a dependency declared without a pin.
pub const LATEST: &str = "latest";

/// Description and version found in a project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInfo {
    /// Manifest file the values were read from.
    pub source: Option<String>,
    /// Project description.
    pub description: Option<String>,
    /// Project version.
    pub version: Option<String>,
}

/// `package.json` dependency tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeDependencies {
    /// Runtime dependencies.
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies.
    pub dev_dependencies: BTreeMap<String, String>,
}

/// Dependencies declared by the root manifests, name to version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// From `requirements.txt`.
    pub python: BTreeMap<String, String>,
    /// From `package.json`.
    pub node: NodeDependencies,
    /// From the `[dependencies]` table of `Cargo.toml`.
    pub rust: BTreeMap<String, String>,
}

/// A detected application framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkInfo {
    /// Display name.
    pub name: String,
    /// Declared version, `latest` when unpinned.
    pub version: String,
}

/// Frontend and backend frameworks implied by the dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFrameworks {
    /// UI framework.
    pub frontend: Option<FrameworkInfo>,
    /// Server framework.
    pub backend: Option<FrameworkInfo>,
}

/// Read description and version from the first manifest found in `root`.
///
/// Looks at `package.json`, `Cargo.toml` and `pyproject.toml` in that
/// order; missing or unparseable manifests yield empty fields.
pub fn read_manifest<F: FileSystem>(fs: &F, root: &Path) -> ManifestInfo {
    for name in ["package.json", "Cargo.toml", "pyproject.toml"] {
        let Ok(text) = fs.read_to_string(&root.join(name)) else {
            continue;
        };
        let parsed = if name == "package.json" {
            parse_package_json(&text)
        } else {
            parse_toml_manifest(&text, if name == "Cargo.toml" { "package" } else { "project" })
        };
        match parsed {
            Some((description, version)) => {
                return ManifestInfo {
                    source: Some(name.to_string()),
                    description,
                    version,
                };
            }
            None => debug!("ignoring unparseable manifest {name}"),
        }
    }
    ManifestInfo::default()
}

type ManifestFields = (Option<String>, Option<String>);

fn parse_package_json(text: &str) -> Option<ManifestFields> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Some((field("description"), field("version")))
}

/// Fields of `[package]` or `[project]`. `field.workspace = true` is
/// resolved against `[workspace.package]` in the same file.
fn parse_toml_manifest(text: &str, table: &str) -> Option<ManifestFields> {
    let document: toml::Value = toml::from_str(text)
        .map_err(|err| debug!("invalid TOML manifest: {err}"))
        .ok()?;
    let package = document.get(table)?;
    let inherited = document.get("workspace").and_then(|w| w.get("package"));

    let field = |key: &str| -> Option<String> {
        match package.get(key)? {
            toml::Value::String(value) => Some(value.clone()),
            toml::Value::Table(spec) => {
                let inherits = spec.get("workspace").and_then(toml::Value::as_bool);
                if inherits != Some(true) {
                    return None;
                }
                inherited?.get(key)?.as_str().map(str::to_string)
            }
            _ => None,
        }
    };
    Some((field("description"), field("version")))
}

/// Collect dependencies from `requirements.txt`, `package.json` and
/// `Cargo.toml` in `root`. Absent or unparseable files contribute nothing.
pub fn read_dependencies<F: FileSystem>(fs: &F, root: &Path) -> Dependencies {
    let mut dependencies = Dependencies::default();

    if let Ok(text) = fs.read_to_string(&root.join("requirements.txt")) {
        dependencies.python = parse_requirements(&text);
    }
    if let Ok(text) = fs.read_to_string(&root.join("package.json")) {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(package) => {
                dependencies.node = NodeDependencies {
                    dependencies: json_string_map(package.get("dependencies")),
                    dev_dependencies: json_string_map(package.get("devDependencies")),
                }
            }
            Err(err) => debug!("ignoring package.json dependencies: {err}"),
        }
    }
    if let Ok(text) = fs.read_to_string(&root.join("Cargo.toml")) {
        match toml::from_str::<toml::Value>(&text) {
            Ok(document) => dependencies.rust = cargo_dependencies(&document),
            Err(err) => debug!("ignoring Cargo.toml dependencies: {err}"),
        }
    }
    dependencies
}

fn regex_requirement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(?P<spec>[^;]*)")
            .expect("valid regex")
    })
}

/// `name==1.0` pins are recorded as `1.0`, other specifiers verbatim and
/// bare names as `latest`. Options and comments are skipped.
pub fn parse_requirements(text: &str) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for line in text.lines() {
        let line = match line.find(" #") {
            Some(at) => &line[..at],
            None => line,
        }
        .trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        let Some(captures) = regex_requirement().captures(line) else {
            continue;
        };
        let spec = captures["spec"].trim();
        let version = match spec.strip_prefix("==") {
            Some(pinned) => pinned.trim().to_string(),
            None if spec.is_empty() => LATEST.to_string(),
            None => spec.to_string(),
        };
        found.insert(captures["name"].to_string(), version);
    }
    found
}

fn json_string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    let Some(object) = value.and_then(serde_json::Value::as_object) else {
        return BTreeMap::new();
    };
    object
        .iter()
        .map(|(name, version)| {
            let version = version.as_str().unwrap_or(LATEST).to_string();
            (name.clone(), version)
        })
        .collect()
}

fn cargo_dependencies(document: &toml::Value) -> BTreeMap<String, String> {
    let Some(table) = document.get("dependencies").and_then(toml::Value::as_table) else {
        return BTreeMap::new();
    };
    table
        .iter()
        .map(|(name, spec)| {
            let version = match spec {
                toml::Value::String(version) => version.clone(),
                toml::Value::Table(spec) => spec
                    .get("version")
                    .and_then(toml::Value::as_str)
                    .unwrap_or(LATEST)
                    .to_string(),
                _ => LATEST.to_string(),
            };
            (name.clone(), version)
        })
        .collect()
}

/// Pick the frontend framework from Node runtime dependencies (React
/// before Vue) and the backend framework from Python, then Node, then
/// Rust dependencies.
pub fn detect_frameworks(dependencies: &Dependencies) -> DetectedFrameworks {
    let node = &dependencies.node.dependencies;
    let frontend = [("react", "React"), ("vue", "Vue")]
        .into_iter()
        .find_map(|(package, name)| framework(node, package, name));

    let backend = [("fastapi", "FastAPI"), ("flask", "Flask"), ("django", "Django")]
        .into_iter()
        .find_map(|(package, name)| framework(&dependencies.python, package, name))
        .or_else(|| framework(node, "express", "Express"))
        .or_else(|| framework(&dependencies.rust, "axum", "Axum"));

    DetectedFrameworks { frontend, backend }
}

fn framework(declared: &BTreeMap<String, String>, package: &str, name: &str) -> Option<FrameworkInfo> {
    declared
        .iter()
        .find(|(declared, _)| declared.eq_ignore_ascii_case(package))
        .map(|(_, version)| FrameworkInfo {
            name: name.to_string(),
            version: version.clone(),
        })
}
