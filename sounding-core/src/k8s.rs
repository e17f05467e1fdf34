//! Kubernetes manifests found among the scanned YAML files.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use utoipa::ToSchema;

use crate::domain::{FileRecord, Issue};

/// One resource declared in a Kubernetes manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct K8sResource {
    /// Declaring file.
    pub file: String,
    /// `kind`, or `Unknown`.
    pub kind: String,
    /// `metadata.name`, or `Unknown`.
    pub name: String,
    /// `metadata.namespace`, or `default`.
    pub namespace: String,
}

/// Whether `path` and `text` look like a Kubernetes manifest.
pub fn is_k8s_manifest(path: &str, text: &str) -> bool {
    let lower = path.to_lowercase();
    (lower.ends_with(".yaml") || lower.ends_with(".yml"))
        && text.contains("apiVersion:")
        && text.contains("kind:")
}

/// Resources declared by every manifest in `files`.
///
/// Multi-document files yield one resource per mapping document. A file
/// that fails to parse contributes the documents before the failure and a
/// warning.
pub fn inspect_k8s<'a, I>(files: I) -> (Vec<K8sResource>, Vec<Issue>)
where
    I: IntoIterator<Item = (&'a FileRecord, Option<&'a str>)>,
{
    let mut resources = Vec::new();
    let mut issues = Vec::new();

    for (record, text) in files {
        let Some(text) = text else {
            continue;
        };
        if !is_k8s_manifest(&record.path, text) {
            continue;
        }
        for document in serde_yaml::Deserializer::from_str(text) {
            match Value::deserialize(document) {
                Ok(value) => {
                    if let Some(resource) = resource(&record.path, &value) {
                        resources.push(resource);
                    }
                }
                Err(err) => {
                    issues.push(Issue::warning(
                        &record.path,
                        format!("invalid Kubernetes manifest: {err}"),
                    ));
                    break;
                }
            }
        }
    }

    resources.sort_by(|a, b| (&a.file, &a.kind, &a.name).cmp(&(&b.file, &b.kind, &b.name)));
    (resources, issues)
}

fn resource(file: &str, value: &Value) -> Option<K8sResource> {
    value.as_mapping()?;
    let text = |value: Option<&Value>, default: &str| {
        value
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let metadata = value.get("metadata");
    Some(K8sResource {
        file: file.to_string(),
        kind: text(value.get("kind"), "Unknown"),
        name: text(metadata.and_then(|m| m.get("name")), "Unknown"),
        namespace: text(metadata.and_then(|m| m.get("namespace")), "default"),
    })
}
