//! OpenAPI components describing the JSON report.

use utoipa::OpenApi;

use crate::domain::{
    CacheStatus, Category, CoverageReport, FileRecord, Framework, Issue, LlmSummary,
    MetricsSnapshot, RouteEntry, RouteMetadata, RouteParameter, RoutePair, RouteTopology, Severity, Side,
    SpecialFiles, Structure, TestFileInfo, TestInfo,
};
use crate::error::Result;
use crate::k8s::K8sResource;
use crate::manifest::{Dependencies, DetectedFrameworks, FrameworkInfo, NodeDependencies};
use crate::report::{FileEntry, MetricsSection, MetricsTotals, ProjectInfo, Report};

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            Report,
            ProjectInfo,
            MetricsSection,
            MetricsTotals,
            FileEntry,
            FileRecord,
            Category,
            Framework,
            Side,
            MetricsSnapshot,
            Issue,
            Severity,
            Structure,
            SpecialFiles,
            RouteTopology,
            RouteEntry,
            RouteMetadata,
            RouteParameter,
            RoutePair,
            TestInfo,
            TestFileInfo,
            CoverageReport,
            LlmSummary,
            CacheStatus,
            Dependencies,
            NodeDependencies,
            DetectedFrameworks,
            FrameworkInfo,
            K8sResource
        )
    ),
    tags((name = "report", description = "Code health report model"))
)]
/// OpenAPI document holding the report schemas.
pub struct ReportSchema;

/// The report schemas as pretty-printed OpenAPI JSON.
pub fn report_schema_json() -> Result<String> {
    Ok(ReportSchema::openapi().to_pretty_json()?)
}

#[cfg(test)]
mod tests {
    use super::{ReportSchema, report_schema_json};
    use utoipa::OpenApi;

    #[test]
    fn schema_includes_report_components() {
        let doc = ReportSchema::openapi();
        let schemas = doc.components.expect("components").schemas;

        for name in [
            "Report",
            "RouteTopology",
            "RouteParameter",
            "MetricsSnapshot",
            "LlmSummary",
            "Issue",
            "Dependencies",
            "K8sResource",
        ] {
            assert!(schemas.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn schema_serializes() {
        let json = report_schema_json().expect("schema json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert!(parsed["components"]["schemas"]["Report"].is_object());
    }
}
