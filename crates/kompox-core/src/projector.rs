//! Projection of a [`Sink`] into domain records
//!
//! Records are created in dependency order (workspaces, providers, clusters,
//! apps, then boxes when a box port is supplied), each kind in FQN order.
//! Nested structures are checked on the way; the first violation aborts the
//! run and records created before it are left in place.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::document::{Kind, Provenance};
use crate::error::{Error, Result};
use crate::fqn::Fqn;
use crate::model;
use crate::quantity::parse_size;
use crate::repository::Repositories;
use crate::resources::{self, AppSpec, ClusterSpec, NetworkPolicySpec};
use crate::sink::Sink;

/// Prefix that makes `spec.compose` a file reference
const COMPOSE_FILE_PREFIX: &str = "file:";

/// Compose volume entries that bind-mount a host path, e.g. `- ./data:/data`
static BIND_MOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*-\s+(\.{1,2}/[^:]+|/[^:]+):[^:]+").expect("valid bind mount pattern")
});

type Check<T> = std::result::Result<T, String>;

impl Sink {
    /// Create domain records for every indexed resource.
    ///
    /// `primary_source` names the file whose apps may refer to the local
    /// filesystem: `file:` compose references are read relative to its
    /// directory. Apps defined anywhere else must carry inline compose
    /// content without host bind mounts.
    pub async fn to_models(
        &self,
        repos: &Repositories,
        primary_source: Option<&Path>,
    ) -> Result<()> {
        let primary = primary_source.and_then(|p| std::path::absolute(p).ok());

        for (fqn, ws) in self.workspaces() {
            let record = model::Workspace {
                id: fqn.to_string(),
                name: ws.metadata.name,
            };
            repos
                .workspace
                .create(record)
                .await
                .map_err(|source| repository_error(Kind::Workspace, &fqn, source))?;
            debug!("Created workspace {}", fqn);
        }

        for (fqn, prv) in self.providers() {
            let record = model::Provider {
                id: fqn.to_string(),
                name: prv.metadata.name,
                workspace_id: fqn.parent().to_string(),
                driver: prv.spec.driver,
                settings: prv.spec.settings,
            };
            repos
                .provider
                .create(record)
                .await
                .map_err(|source| repository_error(Kind::Provider, &fqn, source))?;
            debug!("Created provider {}", fqn);
        }

        for (fqn, cls) in self.clusters() {
            let record = self.cluster_record(&fqn, cls.metadata.name, cls.spec)?;
            repos
                .cluster
                .create(record)
                .await
                .map_err(|source| repository_error(Kind::Cluster, &fqn, source))?;
            debug!("Created cluster {}", fqn);
        }

        for (fqn, app) in self.apps() {
            let base = self.local_base(&fqn, primary.as_deref());
            let record = self.app_record(&fqn, app.metadata.name, app.spec, base.as_deref())?;
            repos
                .app
                .create(record)
                .await
                .map_err(|source| repository_error(Kind::App, &fqn, source))?;
            debug!("Created app {}", fqn);
        }

        let boxes = match &repos.box_ {
            Some(port) => {
                let boxes = self.boxes();
                for (fqn, b) in &boxes {
                    let network_policy = network_policy(b.spec.network_policy.as_ref())
                        .map_err(|message| self.projection_error(Kind::Box, fqn, message))?;
                    let record = model::AppBox {
                        id: fqn.to_string(),
                        name: b.metadata.name.clone(),
                        app_id: fqn.parent().to_string(),
                        component: b.spec.component.clone(),
                        image: b.spec.image.clone(),
                        command: b.spec.command.clone(),
                        args: b.spec.args.clone(),
                        network_policy,
                    };
                    let component = record.component_name().to_string();
                    let standalone = record.is_standalone();
                    port.create(record)
                        .await
                        .map_err(|source| repository_error(Kind::Box, fqn, source))?;
                    debug!(component = %component, standalone, "Created box {}", fqn);
                }
                boxes.len()
            }
            None => 0,
        };

        info!(
            "Projected {} workspaces, {} providers, {} clusters, {} apps, {} boxes",
            self.fqns(Kind::Workspace).len(),
            self.fqns(Kind::Provider).len(),
            self.fqns(Kind::Cluster).len(),
            self.fqns(Kind::App).len(),
            boxes
        );
        Ok(())
    }

    fn cluster_record(
        &self,
        fqn: &Fqn,
        name: String,
        spec: ClusterSpec,
    ) -> Result<model::Cluster> {
        let protection = spec
            .protection
            .map(|p| -> Check<model::ClusterProtection> {
                Ok(model::ClusterProtection {
                    provisioning: p
                        .provisioning
                        .parse()
                        .map_err(|e| format!("spec.protection.provisioning: {e}"))?,
                    installation: p
                        .installation
                        .parse()
                        .map_err(|e| format!("spec.protection.installation: {e}"))?,
                })
            })
            .transpose()
            .map_err(|message| self.projection_error(Kind::Cluster, fqn, message))?;

        let ingress = spec.ingress.map(|i| model::ClusterIngress {
            namespace: i.namespace,
            controller: i.controller,
            service_account: i.service_account,
            domain: i.domain,
            cert_resolver: i.cert_resolver,
            cert_email: i.cert_email,
            certificates: i
                .certificates
                .into_iter()
                .map(|c| model::ClusterIngressCertificate {
                    name: c.name,
                    source: c.source,
                })
                .collect(),
        });

        Ok(model::Cluster {
            id: fqn.to_string(),
            name,
            provider_id: fqn.parent().to_string(),
            existing: spec.existing,
            ingress,
            protection,
            settings: spec.settings,
        })
    }

    fn app_record(
        &self,
        fqn: &Fqn,
        name: String,
        spec: AppSpec,
        base: Option<&Path>,
    ) -> Result<model::App> {
        let fail = |message: String| self.projection_error(Kind::App, fqn, message);

        let compose = resolve_compose(&spec.compose, base).map_err(fail)?;
        let ingress = app_ingress(spec.ingress).map_err(fail)?;
        let volumes = app_volumes(spec.volumes).map_err(fail)?;
        let network_policy = network_policy(spec.network_policy.as_ref()).map_err(fail)?;
        let deployment = spec
            .deployment
            .map(|d| model::AppDeployment {
                pool: d.pool,
                pools: d.pools,
                zone: d.zone,
                zones: d.zones,
            })
            .unwrap_or_default();

        Ok(model::App {
            id: fqn.to_string(),
            name,
            cluster_id: fqn.parent().to_string(),
            compose,
            ingress,
            volumes,
            deployment,
            network_policy,
            resources: spec.resources,
            settings: spec.settings,
        })
    }

    /// Directory that local references of the app at `fqn` resolve against,
    /// if it was defined in the primary source.
    fn local_base(&self, fqn: &Fqn, primary: Option<&Path>) -> Option<PathBuf> {
        let primary = primary?;
        let provenance = self.provenance(fqn)?;
        let source = std::path::absolute(&provenance.path).ok()?;
        if source != primary {
            return None;
        }
        source.parent().map(Path::to_path_buf)
    }

    fn projection_error(&self, kind: Kind, fqn: &Fqn, message: String) -> Error {
        Error::Projection {
            kind,
            fqn: fqn.clone(),
            message,
            provenance: self.provenance(fqn).unwrap_or_else(Provenance::default),
        }
    }
}

fn repository_error(kind: Kind, fqn: &Fqn, source: crate::error::RepositoryError) -> Error {
    Error::Repository {
        kind,
        fqn: fqn.clone(),
        source,
    }
}

fn resolve_compose(compose: &str, base: Option<&Path>) -> Check<String> {
    let Some(base) = base else {
        if compose.contains(COMPOSE_FILE_PREFIX) {
            return Err(
                "spec.compose refers to a local file, which is only allowed for apps defined in the primary source"
                    .to_string(),
            );
        }
        if BIND_MOUNT.is_match(compose) {
            return Err(
                "spec.compose bind-mounts a host path, which is only allowed for apps defined in the primary source"
                    .to_string(),
            );
        }
        return Ok(compose.to_string());
    };

    let Some(reference) = compose.trim().strip_prefix(COMPOSE_FILE_PREFIX) else {
        return Ok(compose.to_string());
    };
    let path = Path::new(reference.trim());
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    std::fs::read_to_string(&path)
        .map_err(|err| format!("reading compose file {}: {err}", path.display()))
}

fn app_ingress(spec: Option<resources::AppIngressSpec>) -> Check<model::AppIngress> {
    let Some(spec) = spec else {
        return Ok(model::AppIngress::default());
    };
    let mut rules = Vec::with_capacity(spec.rules.len());
    for (i, rule) in spec.rules.into_iter().enumerate() {
        if rule.name.is_empty() {
            return Err(format!("spec.ingress.rules[{i}].name must not be empty"));
        }
        let port = port_number(rule.port).ok_or_else(|| {
            format!("spec.ingress.rules[{i}].port {} out of range 1-65535", rule.port)
        })?;
        rules.push(model::AppIngressRule {
            name: rule.name,
            port,
            hosts: rule.hosts,
        });
    }
    Ok(model::AppIngress {
        cert_resolver: spec.cert_resolver,
        rules,
    })
}

fn app_volumes(specs: Vec<resources::AppVolumeSpec>) -> Check<Vec<model::AppVolume>> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            if v.name.is_empty() {
                return Err(format!("spec.volumes[{i}].name must not be empty"));
            }
            let volume_type = v
                .volume_type
                .parse()
                .map_err(|e| format!("spec.volumes[{i}].type: {e}"))?;
            let size = if v.size.is_null() {
                0
            } else {
                parse_size(&v.size).map_err(|e| format!("spec.volumes[{i}].size: {e}"))?
            };
            Ok(model::AppVolume {
                name: v.name,
                size,
                volume_type,
                options: v.options,
            })
        })
        .collect()
}

fn network_policy(spec: Option<&NetworkPolicySpec>) -> Check<model::NetworkPolicy> {
    let Some(spec) = spec else {
        return Ok(model::NetworkPolicy::default());
    };
    let mut ingress_rules = Vec::with_capacity(spec.ingress_rules.len());
    for (i, rule) in spec.ingress_rules.iter().enumerate() {
        let at = format!("spec.networkPolicy.ingressRules[{i}]");
        if rule.from.is_empty() {
            return Err(format!("{at}.from must have at least one peer"));
        }

        let mut from = Vec::with_capacity(rule.from.len());
        for (j, peer) in rule.from.iter().enumerate() {
            let selector = match &peer.namespace_selector {
                Some(selector) if !selector.is_empty() => selector,
                _ => return Err(format!("{at}.from[{j}].namespaceSelector must not be empty")),
            };
            let namespace_selector =
                label_selector(selector, &format!("{at}.from[{j}].namespaceSelector"))?;
            from.push(model::NetworkPolicyPeer { namespace_selector });
        }

        let mut ports = Vec::with_capacity(rule.ports.len());
        for (k, p) in rule.ports.iter().enumerate() {
            let protocol = p
                .protocol
                .parse()
                .map_err(|e| format!("{at}.ports[{k}].protocol: {e}"))?;
            let port = port_number(p.port)
                .ok_or_else(|| format!("{at}.ports[{k}].port {} out of range 1-65535", p.port))?;
            ports.push(model::NetworkPolicyPort { protocol, port });
        }

        ingress_rules.push(model::NetworkPolicyIngressRule { from, ports });
    }
    Ok(model::NetworkPolicy { ingress_rules })
}

fn label_selector(selector: &resources::LabelSelector, at: &str) -> Check<model::LabelSelector> {
    let mut match_expressions = Vec::with_capacity(selector.match_expressions.len());
    for (n, expr) in selector.match_expressions.iter().enumerate() {
        let at = format!("{at}.matchExpressions[{n}]");
        if expr.key.is_empty() {
            return Err(format!("{at}.key must not be empty"));
        }
        let operator: model::SelectorOperator =
            expr.operator.parse().map_err(|e| format!("{at}: {e}"))?;
        if operator.takes_values() && expr.values.is_empty() {
            return Err(format!("{at}: operator {} requires at least one value", expr.operator));
        }
        if !operator.takes_values() && !expr.values.is_empty() {
            return Err(format!("{at}: operator {} must not have values", expr.operator));
        }
        match_expressions.push(model::LabelSelectorRequirement {
            key: expr.key.clone(),
            operator,
            values: expr.values.clone(),
        });
    }
    Ok(model::LabelSelector {
        match_labels: selector.match_labels.clone(),
        match_expressions,
    })
}

fn port_number(value: i64) -> Option<u16> {
    u16::try_from(value).ok().filter(|p| *p != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;
    use crate::model::{Protocol, SelectorOperator, VolumeType};
    use crate::repository::{AppRepository, InMemoryRepository};
    use rstest::rstest;
    use std::sync::Arc;

    const HEAD: &str = r#"
apiVersion: ops.kompox.dev/v1alpha1
kind: Workspace
metadata:
  name: ws1
---
apiVersion: ops.kompox.dev/v1alpha1
kind: Provider
metadata:
  name: prv1
  annotations:
    ops.kompox.dev/path: ws1
spec:
  driver: aks
---
apiVersion: ops.kompox.dev/v1alpha1
kind: Cluster
metadata:
  name: cls1
  annotations:
    ops.kompox.dev/path: ws1/prv1
"#;

    fn sink_with(extra: &str) -> Sink {
        let content = format!("{HEAD}---\n{extra}");
        let result = Loader::new().load_str(&content, Path::new("kom.yml"));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        Sink::new(result.documents).unwrap()
    }

    fn app(spec: &str) -> String {
        format!(
            "apiVersion: ops.kompox.dev/v1alpha1\nkind: App\nmetadata:\n  name: app1\n  annotations:\n    ops.kompox.dev/path: ws1/prv1/cls1\nspec:\n{spec}"
        )
    }

    async fn project(sink: &Sink) -> (Repositories, Result<()>) {
        let repos = Repositories::in_memory();
        let result = sink.to_models(&repos, None).await;
        (repos, result)
    }

    fn projection_message(result: Result<()>) -> String {
        match result {
            Err(Error::Projection { message, .. }) => message,
            other => panic!("Expected projection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_projects_hierarchy_with_parent_ids() {
        let sink = sink_with(&format!(
            "{}---\napiVersion: ops.kompox.dev/v1alpha1\nkind: Box\nmetadata:\n  name: api\n  annotations:\n    ops.kompox.dev/path: ws1/prv1/cls1/app1\n",
            app("  compose: \"services: {}\"\n")
        ));
        let (repos, result) = project(&sink).await;
        result.unwrap();

        let providers = repos.provider.list().await.unwrap();
        assert_eq!(providers[0].id, "ws1/prv1");
        assert_eq!(providers[0].workspace_id, "ws1");
        assert_eq!(providers[0].driver, "aks");

        let clusters = repos.cluster.list().await.unwrap();
        assert_eq!(clusters[0].provider_id, "ws1/prv1");

        let apps = repos.app.list().await.unwrap();
        assert_eq!(apps[0].id, "ws1/prv1/cls1/app1");
        assert_eq!(apps[0].cluster_id, "ws1/prv1/cls1");
        assert_eq!(apps[0].compose, "services: {}");

        let boxes = repos.box_.as_ref().unwrap().list().await.unwrap();
        assert_eq!(boxes[0].id, "ws1/prv1/cls1/app1/api");
        assert_eq!(boxes[0].app_id, "ws1/prv1/cls1/app1");
    }

    #[tokio::test]
    async fn test_boxes_skipped_without_port() {
        let sink = sink_with(&format!(
            "{}---\napiVersion: ops.kompox.dev/v1alpha1\nkind: Box\nmetadata:\n  name: api\n  annotations:\n    ops.kompox.dev/path: ws1/prv1/cls1/app1\n",
            app("  compose: \"services: {}\"\n")
        ));
        let mut repos = Repositories::in_memory();
        repos.box_ = None;
        sink.to_models(&repos, None).await.unwrap();
        assert_eq!(repos.app.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_volume_sizes() {
        let sink = sink_with(&app(
            "  volumes:\n    - name: db\n      size: 10Gi\n    - name: cache\n      size: 500Mi\n      type: files\n    - name: raw\n      size: 1024\n    - name: empty\n",
        ));
        let (repos, result) = project(&sink).await;
        result.unwrap();

        let volumes = &repos.app.list().await.unwrap()[0].volumes;
        let sizes: Vec<i64> = volumes.iter().map(|v| v.size).collect();
        assert_eq!(sizes, vec![10_737_418_240, 524_288_000, 1024, 0]);
        assert_eq!(volumes[0].volume_type, VolumeType::Disk);
        assert_eq!(volumes[1].volume_type, VolumeType::Files);
    }

    #[tokio::test]
    async fn test_rejects_non_numeric_volume_size() {
        let sink = sink_with(&app("  volumes:\n    - name: db\n      size: large\n"));
        let (repos, result) = project(&sink).await;
        assert!(projection_message(result).contains("spec.volumes[0].size"));
        // Earlier kinds stay created
        assert_eq!(repos.cluster.list().await.unwrap().len(), 1);
        assert!(repos.app.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_ingress_port_out_of_range() {
        let sink = sink_with(&app(
            "  ingress:\n    rules:\n      - name: http\n        port: 70000\n",
        ));
        let (_, result) = project(&sink).await;
        assert!(projection_message(result).contains("out of range"));
    }

    #[tokio::test]
    async fn test_network_policy_protocol_defaults_to_tcp() {
        let sink = sink_with(&app(
            "  networkPolicy:\n    ingressRules:\n      - from:\n          - namespaceSelector:\n              matchExpressions:\n                - key: team\n                  operator: In\n                  values: [web]\n        ports:\n          - port: 8080\n          - port: 53\n            protocol: UDP\n",
        ));
        let (repos, result) = project(&sink).await;
        result.unwrap();

        let policy = &repos.app.list().await.unwrap()[0].network_policy;
        let rule = &policy.ingress_rules[0];
        assert_eq!(rule.ports[0].protocol, Protocol::Tcp);
        assert_eq!(rule.ports[1].protocol, Protocol::Udp);
        assert_eq!(
            rule.from[0].namespace_selector.match_expressions[0].operator,
            SelectorOperator::In
        );
    }

    #[rstest]
    #[case::port_out_of_range(
        "      - from:\n          - namespaceSelector:\n              matchLabels: {team: web}\n        ports:\n          - port: 70000\n",
        "out of range"
    )]
    #[case::exists_with_values(
        "      - from:\n          - namespaceSelector:\n              matchExpressions:\n                - key: team\n                  operator: Exists\n                  values: [web]\n",
        "must not have values"
    )]
    #[case::in_without_values(
        "      - from:\n          - namespaceSelector:\n              matchExpressions:\n                - key: team\n                  operator: In\n",
        "requires at least one value"
    )]
    #[case::unknown_operator(
        "      - from:\n          - namespaceSelector:\n              matchExpressions:\n                - key: team\n                  operator: Matches\n                  values: [web]\n",
        "unsupported operator"
    )]
    #[case::empty_key(
        "      - from:\n          - namespaceSelector:\n              matchExpressions:\n                - key: \"\"\n                  operator: Exists\n",
        "key must not be empty"
    )]
    #[case::no_peers(
        "      - ports:\n          - port: 80\n",
        "at least one peer"
    )]
    #[case::empty_selector(
        "      - from:\n          - namespaceSelector: {}\n",
        "namespaceSelector must not be empty"
    )]
    #[case::bad_protocol(
        "      - from:\n          - namespaceSelector:\n              matchLabels: {team: web}\n        ports:\n          - port: 80\n            protocol: HTTP\n",
        "unsupported protocol"
    )]
    #[tokio::test]
    async fn test_network_policy_rejections(#[case] rules: &str, #[case] expected: &str) {
        let sink = sink_with(&app(&format!("  networkPolicy:\n    ingressRules:\n{rules}")));
        let (_, result) = project(&sink).await;
        let message = projection_message(result);
        assert!(message.contains(expected), "{message}");
    }

    #[tokio::test]
    async fn test_box_network_policy_is_checked() {
        let sink = sink_with(&format!(
            "{}---\napiVersion: ops.kompox.dev/v1alpha1\nkind: Box\nmetadata:\n  name: api\n  annotations:\n    ops.kompox.dev/path: ws1/prv1/cls1/app1\nspec:\n  networkPolicy:\n    ingressRules:\n      - from: []\n",
            app("  compose: \"services: {}\"\n")
        ));
        let (_, result) = project(&sink).await;
        match result {
            Err(Error::Projection { kind, fqn, .. }) => {
                assert_eq!(kind, Kind::Box);
                assert_eq!(fqn.as_str(), "ws1/prv1/cls1/app1/api");
            }
            other => panic!("Expected projection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_unknown_protection_level() {
        let result = Loader::new().load_str(
            &HEAD.replace(
                "    ops.kompox.dev/path: ws1/prv1\n",
                "    ops.kompox.dev/path: ws1/prv1\nspec:\n  protection:\n    provisioning: locked\n",
            ),
            Path::new("kom.yml"),
        );
        let sink = Sink::new(result.documents).unwrap();
        let (_, result) = project(&sink).await;
        assert!(projection_message(result).contains("spec.protection.provisioning"));
    }

    #[tokio::test]
    async fn test_local_references_outside_primary_source() {
        let sink = sink_with(&app("  compose: \"file:compose.yml\"\n"));
        let (_, result) = project(&sink).await;
        assert!(projection_message(result).contains("local file"));

        let sink = sink_with(&app(
            "  compose: |\n    services:\n      db:\n        volumes:\n          - ./data:/var/lib/db\n",
        ));
        let (_, result) = project(&sink).await;
        assert!(projection_message(result).contains("bind-mounts"));
    }

    #[tokio::test]
    async fn test_primary_source_reads_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("kom.yml");
        std::fs::write(
            dir.path().join("compose.yml"),
            "services:\n  web:\n    volumes:\n      - ./html:/usr/share/nginx/html\n",
        )
        .unwrap();
        let content = format!("{HEAD}---\n{}", app("  compose: \"file:compose.yml\"\n"));
        std::fs::write(&source, content).unwrap();

        let result = Loader::new().load(&source).unwrap();
        let sink = Sink::new(result.documents).unwrap();
        let repos = Repositories::in_memory();
        sink.to_models(&repos, Some(source.as_path())).await.unwrap();

        let apps = repos.app.list().await.unwrap();
        assert!(apps[0].compose.contains("./html:/usr/share/nginx/html"));
    }

    #[tokio::test]
    async fn test_repository_failure_is_wrapped() {
        let sink = sink_with(&app("  compose: \"services: {}\"\n"));
        let app_repo: Arc<dyn AppRepository> =
            Arc::new(InMemoryRepository::<model::App>::default());
        app_repo
            .create(model::App {
                id: "ws1/prv1/cls1/app1".to_string(),
                name: "app1".to_string(),
                cluster_id: "ws1/prv1/cls1".to_string(),
                compose: String::new(),
                ingress: Default::default(),
                volumes: Vec::new(),
                deployment: Default::default(),
                network_policy: Default::default(),
                resources: Default::default(),
                settings: Default::default(),
            })
            .await
            .unwrap();

        let mut repos = Repositories::in_memory();
        repos.app = app_repo;
        let err = sink.to_models(&repos, None).await.unwrap_err();
        assert!(matches!(err, Error::Repository { kind: Kind::App, .. }));
        assert!(err.to_string().contains("already exists"));
    }
}
