//! Route extraction and client/server reconciliation.

mod extractors;
pub mod pattern;

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::config::RouteConfig;
use crate::domain::{FileRecord, Issue, RouteEntry, RoutePair, RouteTopology, Side};
pub use extractors::{FileRoutes, NAVIGATION};
use pattern::PathPattern;

/// Extracts route declarations per file and merges them into a topology.
#[derive(Debug, Clone)]
pub struct RouteAnalyzer {
    config: RouteConfig,
    prefixes: Vec<PathPattern>,
}

impl RouteAnalyzer {
    /// Create an analyzer for the given route configuration.
    pub fn new(config: RouteConfig) -> Self {
        let prefixes = config
            .api_prefixes
            .iter()
            .map(|prefix| PathPattern::parse(prefix))
            .collect();
        Self { config, prefixes }
    }

    /// Scan one file with the extractor selected at classification time.
    ///
    /// Files without a route source tag yield nothing.
    pub fn extract(&self, record: &FileRecord, text: &str) -> FileRoutes {
        match record.route_source {
            Some(framework) => {
                let routes = extractors::extract(framework, &record.path, text, &self.config);
                debug!(
                    "{}: {} {} routes",
                    record.path,
                    routes.entries.len(),
                    framework
                );
                routes
            }
            None => FileRoutes::default(),
        }
    }

    /// Merge per-file results into one topology.
    ///
    /// Entries are ordered by file, line, and method first, so the outcome
    /// does not depend on the order files were scanned in.
    pub fn reconcile(&self, files: Vec<FileRoutes>) -> RouteTopology {
        let mut entries = Vec::new();
        let mut issues = Vec::new();
        for file in files {
            entries.extend(file.entries);
            issues.extend(file.issues);
        }
        entries.sort_by(|a, b| {
            (&a.file, a.line, &a.method, &a.path).cmp(&(&b.file, b.line, &b.method, &b.path))
        });

        let (client, server): (Vec<RouteEntry>, Vec<RouteEntry>) = entries
            .into_iter()
            .partition(|entry| entry.side == Side::Client);
        report_duplicates(&client, &mut issues);
        report_duplicates(&server, &mut issues);

        let server_patterns: Vec<PathPattern> = server
            .iter()
            .map(|entry| PathPattern::parse(&entry.path).strip_prefix(&self.prefixes))
            .collect();

        let mut pairs = Vec::new();
        let mut referenced = BTreeSet::new();
        for entry in &client {
            let pattern = PathPattern::parse(&entry.path);
            let candidates: Vec<(usize, usize)> = server_patterns
                .iter()
                .enumerate()
                .filter_map(|(index, server)| {
                    pattern
                        .literal_agreements(server)
                        .map(|agreements| (index, agreements))
                })
                .collect();
            let Some(best) = candidates.iter().map(|(_, agreements)| *agreements).max() else {
                issues.push(
                    Issue::info(
                        &entry.file,
                        format!(
                            "client route has no matching server endpoint: {}",
                            entry.path
                        ),
                    )
                    .at_line(entry.line),
                );
                continue;
            };

            let segments = pattern.segments().len();
            for (index, _) in candidates
                .iter()
                .filter(|(_, agreements)| *agreements == best)
            {
                let target = &server[*index];
                referenced.insert(*index);
                pairs.push(RoutePair {
                    client_path: entry.path.clone(),
                    client_file: entry.file.clone(),
                    client_line: entry.line,
                    server_method: target.method.clone(),
                    server_path: target.path.clone(),
                    server_file: target.file.clone(),
                    server_line: target.line,
                    match_score: if segments == 0 {
                        1.0
                    } else {
                        best as f64 / segments as f64
                    },
                });
            }
        }

        for (index, entry) in server.iter().enumerate() {
            if !referenced.contains(&index) {
                issues.push(
                    Issue::info(
                        &entry.file,
                        format!(
                            "server route {} {} is not referenced by any client route",
                            entry.method, entry.path
                        ),
                    )
                    .at_line(entry.line),
                );
            }
        }

        issues.sort_by(|a, b| {
            (&a.file, a.line, a.severity, &a.message).cmp(&(&b.file, b.line, b.severity, &b.message))
        });

        RouteTopology {
            client,
            server,
            pairs,
            issues,
        }
    }
}

/// Warn about identities declared again in another file.
///
/// Every entry stays in the topology; repeats inside the file that first
/// declared an identity are left alone. `entries` must already be sorted.
fn report_duplicates(entries: &[RouteEntry], issues: &mut Vec<Issue>) {
    let mut first_seen: BTreeMap<(String, &str), (&str, usize)> = BTreeMap::new();
    for entry in entries {
        let identity = (PathPattern::parse(&entry.path).shape(), entry.method.as_str());
        match first_seen.get(&identity) {
            Some((file, line)) if *file != entry.file => {
                issues.push(
                    Issue::warning(
                        &entry.file,
                        format!(
                            "duplicate route {} {} (first declared at {file}:{line})",
                            entry.method, entry.path
                        ),
                    )
                    .at_line(entry.line),
                );
            }
            Some(_) => {}
            None => {
                first_seen.insert(identity, (entry.file.as_str(), entry.line));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileRoutes, RouteAnalyzer};
    use crate::config::RouteConfig;
    use crate::domain::{Category, FileRecord, Framework, Severity};

    fn analyzer() -> RouteAnalyzer {
        RouteAnalyzer::new(RouteConfig::default())
    }

    fn record(path: &str, category: Category, framework: Option<Framework>) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            category,
            size: 0,
            content_hash: None,
            route_source: framework,
        }
    }

    fn scan_all(files: &[(&str, Framework, &str)]) -> Vec<FileRoutes> {
        let analyzer = analyzer();
        files
            .iter()
            .map(|(path, framework, text)| {
                let category = match framework.side() {
                    crate::domain::Side::Client => Category::Frontend,
                    crate::domain::Side::Server => Category::Backend,
                };
                analyzer.extract(&record(path, category, Some(*framework)), text)
            })
            .collect()
    }

    #[test]
    fn server_api_route_pairs_with_client_route() {
        let files = scan_all(&[
            (
                "server/routes/users.js",
                Framework::Express,
                "router.get('/api/users/:id', (req, res) => res.json({}));\n",
            ),
            (
                "web/src/App.tsx",
                Framework::ReactRouter,
                "<Route path=\"/users/:id\" element={<User />} />\n",
            ),
        ]);
        let topology = analyzer().reconcile(files);

        assert_eq!(topology.pairs.len(), 1);
        let pair = &topology.pairs[0];
        assert_eq!(pair.client_path, "/users/:id");
        assert_eq!(pair.server_path, "/api/users/:id");
        assert_eq!(pair.server_method, "GET");
        assert_eq!(pair.match_score, 0.5);
        assert!(topology.issues.is_empty(), "{:?}", topology.issues);
    }

    #[test]
    fn most_literal_agreements_win() {
        let files = scan_all(&[
            (
                "api/main.py",
                Framework::FastApi,
                "@app.get(\"/users/{user_id}\")\ndef a(): pass\n\n\n\n\n@app.get(\"/users/me\")\ndef b(): pass\n",
            ),
            (
                "web/src/App.jsx",
                Framework::ReactRouter,
                "<Route path=\"/users/me\" element={<Me />} />\n",
            ),
        ]);
        let topology = analyzer().reconcile(files);

        assert_eq!(topology.pairs.len(), 1);
        assert_eq!(topology.pairs[0].server_path, "/users/me");
        assert_eq!(topology.pairs[0].match_score, 1.0);
        assert_eq!(topology.issues.len(), 1);
        assert!(topology.issues[0].message.contains("/users/:user_id"));
    }

    #[test]
    fn unmatched_routes_raise_info_on_both_sides() {
        let files = scan_all(&[
            (
                "api/main.py",
                Framework::FastApi,
                "@app.post(\"/webhooks/stripe\")\ndef hook(): pass\n",
            ),
            (
                "web/src/router/index.js",
                Framework::VueRouter,
                "export default [{ path: '/dashboard', component: Dashboard }];\n",
            ),
        ]);
        let topology = analyzer().reconcile(files);

        assert!(topology.pairs.is_empty());
        let messages: Vec<(&str, Severity)> = topology
            .issues
            .iter()
            .map(|issue| (issue.message.as_str(), issue.severity))
            .collect();
        assert_eq!(
            messages,
            vec![
                (
                    "server route POST /webhooks/stripe is not referenced by any client route",
                    Severity::Info
                ),
                (
                    "client route has no matching server endpoint: /dashboard",
                    Severity::Info
                ),
            ]
        );
    }

    #[test]
    fn cross_file_duplicates_are_reported_and_kept() {
        let files = scan_all(&[
            (
                "server/routes/b.js",
                Framework::Express,
                "app.get('/health', ok);\n",
            ),
            (
                "server/routes/a.js",
                Framework::Express,
                "app.get('/Health/', ok);\napp.post('/health', ok);\n",
            ),
        ]);
        let topology = analyzer().reconcile(files);

        assert_eq!(topology.server.len(), 3);
        assert_eq!(topology.server[0].file, "server/routes/a.js");
        assert_eq!(topology.server[2].file, "server/routes/b.js");
        let duplicates: Vec<_> = topology
            .issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].file.as_deref(), Some("server/routes/b.js"));
        assert!(duplicates[0].message.contains("server/routes/a.js:1"));
    }

    #[test]
    fn same_file_repeats_are_not_duplicates() {
        let files = scan_all(&[(
            "server/routes/a.js",
            Framework::Express,
            "app.get('/health', ok);\napp.get('/health', again);\n",
        )]);
        let topology = analyzer().reconcile(files);

        assert_eq!(topology.server.len(), 2);
        assert!(
            topology
                .issues
                .iter()
                .all(|issue| !issue.message.contains("duplicate route"))
        );
    }

    #[test]
    fn reconciliation_ignores_scan_order() {
        let inputs = [
            (
                "server/routes/users.js",
                Framework::Express,
                "router.get('/api/users/:id', h);\nrouter.get('/api/users', h);\n",
            ),
            (
                "web/src/App.tsx",
                Framework::ReactRouter,
                "<Route path=\"/users\" element={<List />} />\n<Route path=\"/users/:id\" element={<User />} />\n",
            ),
            (
                "web/src/pages/Extra.tsx",
                Framework::ReactRouter,
                "<Route path=\"/users\" element={<List />} />\n",
            ),
        ];
        let forward = analyzer().reconcile(scan_all(&inputs));
        let mut reversed_inputs = inputs;
        reversed_inputs.reverse();
        let backward = analyzer().reconcile(scan_all(&reversed_inputs));

        assert_eq!(forward, backward);
        assert_eq!(forward.pairs.len(), 3);
    }

    #[test]
    fn untagged_files_yield_no_routes() {
        let routes = analyzer().extract(
            &record("docs/routes.md", Category::Docs, None),
            "app.get('/x', h)",
        );
        assert_eq!(routes, FileRoutes::default());
    }
}
