//! Resource definitions for the `ops.kompox.dev/v1alpha1` API group
//!
//! These are the wire shapes of the documents read by the
//! [`Loader`](crate::loader::Loader). They follow Kubernetes conventions
//! (`metadata` + `spec`, camelCase keys) so the same files can later be
//! served as custom resources.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: ops.kompox.dev/v1alpha1
//! kind: Cluster
//! metadata:
//!   name: cls1
//!   annotations:
//!     ops.kompox.dev/path: ws1/prv1
//! spec:
//!   existing: false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group of Kompox resources
pub const GROUP: &str = "ops.kompox.dev";

/// API version of Kompox resources
pub const VERSION: &str = "v1alpha1";

/// Expected `apiVersion` value
pub const API_VERSION: &str = "ops.kompox.dev/v1alpha1";

/// Annotation holding the parent FQN of a resource.
pub const ANNOTATION_PATH: &str = "ops.kompox.dev/path";

/// Annotation stamped by the loader with the source file path.
pub const ANNOTATION_DOC_PATH: &str = "ops.kompox.dev/doc-path";

/// Annotation stamped by the loader with the 1-based index of the document
/// within its source file.
pub const ANNOTATION_DOC_INDEX: &str = "ops.kompox.dev/doc-index";

/// Name of the implicit default box of every App; user boxes cannot take it.
pub const RESERVED_BOX_NAME: &str = "app";

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    /// Resource name (last FQN segment)
    pub name: String,

    /// Labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations, including the parent path and provenance stamps
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Value of an annotation, if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

// ============================================================================
// Workspace / Provider
// ============================================================================

/// A logical workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: WorkspaceSpec,
}

/// Workspace spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSpec {
    /// Workspace-level settings
    pub settings: BTreeMap<String, String>,
}

/// An infrastructure provider (e.g. AKS, k3s)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: ProviderSpec,
}

/// Provider spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSpec {
    /// Driver name (e.g. "aks", "k3s")
    pub driver: String,
    /// Provider-level settings
    pub settings: BTreeMap<String, String>,
}

// ============================================================================
// Cluster
// ============================================================================

/// A Kubernetes cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: ClusterSpec,
}

/// Cluster spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Whether the cluster exists already and is not provisioned by Kompox
    pub existing: bool,
    /// Cluster-level ingress
    pub ingress: Option<ClusterIngressSpec>,
    /// Lifecycle operation guards
    pub protection: Option<ClusterProtectionSpec>,
    /// Cluster-level settings
    pub settings: BTreeMap<String, String>,
}

/// Cluster ingress controller configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterIngressSpec {
    /// Namespace of the ingress controller
    pub namespace: String,
    /// Ingress controller type
    pub controller: String,
    /// Service account of the ingress controller
    pub service_account: String,
    /// Default DNS domain for generated app hosts
    pub domain: String,
    /// ACME resolver ("staging", "production")
    pub cert_resolver: String,
    /// ACME account email
    pub cert_email: String,
    /// Static TLS certificates
    pub certificates: Vec<ClusterIngressCertificate>,
}

/// Static certificate reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterIngressCertificate {
    /// Certificate name, also the TLS secret name
    pub name: String,
    /// Provider-specific locator
    pub source: String,
}

/// Protection levels for cluster operations.
///
/// Accepted values: `""`, `none`, `cannotDelete`, `readOnly`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterProtectionSpec {
    /// Guards provision/deprovision
    pub provisioning: String,
    /// Guards install/uninstall/updates
    pub installation: String,
}

// ============================================================================
// App
// ============================================================================

/// An application deployed to a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: AppSpec,
}

/// App spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSpec {
    /// Inline compose content, or `file:<path>`
    pub compose: String,
    /// Ingress settings and rules
    pub ingress: Option<AppIngressSpec>,
    /// Persistent volumes
    pub volumes: Vec<AppVolumeSpec>,
    /// Deployment placement
    pub deployment: Option<AppDeploymentSpec>,
    /// Additional ingress network policy
    pub network_policy: Option<NetworkPolicySpec>,
    /// Resource settings
    pub resources: BTreeMap<String, String>,
    /// App-level settings
    pub settings: BTreeMap<String, String>,
}

/// App ingress settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppIngressSpec {
    /// Overrides the cluster-level resolver when set
    pub cert_resolver: String,
    /// Exposure rules
    pub rules: Vec<AppIngressRule>,
}

/// External exposure of one port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressRule {
    /// Rule name
    pub name: String,
    /// Service port
    pub port: i64,
    /// Hostnames
    pub hosts: Vec<String>,
}

/// A persistent volume requested by an app
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppVolumeSpec {
    /// Volume name
    pub name: String,
    /// Size as a byte count or a quantity string like `"10Gi"`
    pub size: serde_json::Value,
    /// `disk` (default, RWO) or `files` (RWX)
    #[serde(rename = "type")]
    pub volume_type: String,
    /// Provider-specific options
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Deployment placement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDeploymentSpec {
    /// Node pool (the driver falls back to "user")
    pub pool: String,
    /// Multiple node pools
    pub pools: Vec<String>,
    /// Availability zone
    pub zone: String,
    /// Multiple availability zones
    pub zones: Vec<String>,
    /// Reserved for scheduling extensions
    pub selectors: BTreeMap<String, String>,
}

// ============================================================================
// Network policy
// ============================================================================

/// Network policy of an App or a Box
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    /// Additional allowed ingress
    pub ingress_rules: Vec<NetworkPolicyIngressRule>,
}

/// One allowed ingress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicyIngressRule {
    /// Allowed sources
    pub from: Vec<NetworkPolicyPeer>,
    /// Allowed ports
    pub ports: Vec<NetworkPolicyPort>,
}

/// A source selected by namespace labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkPolicyPeer {
    /// Namespace selector
    pub namespace_selector: Option<LabelSelector>,
}

/// A port and protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicyPort {
    /// `TCP`, `UDP` or `SCTP`; empty means `TCP`
    pub protocol: String,
    /// Port number
    pub port: i64,
}

/// Kubernetes-style label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelSelector {
    /// Exact label matches
    pub match_labels: BTreeMap<String, String>,
    /// Set-based requirements
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// True if the selector constrains nothing
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

/// One set-based requirement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,
    /// `In`, `NotIn`, `Exists` or `DoesNotExist`
    pub operator: String,
    /// Values for `In` / `NotIn`
    pub values: Vec<String>,
}

// ============================================================================
// Box
// ============================================================================

/// A deployable unit within an App.
///
/// A box with `spec.image` is a standalone box; without it the box is derived
/// from a service of the App's compose content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppBox {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: BoxSpec,
}

impl AppBox {
    /// True if this box runs its own image
    pub fn is_standalone(&self) -> bool {
        !self.spec.image.is_empty()
    }
}

/// Box spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoxSpec {
    /// Component name; must equal `metadata.name` when set
    pub component: String,
    /// Container image (standalone boxes only)
    pub image: String,
    /// Entrypoint override (standalone boxes only)
    pub command: Vec<String>,
    /// Arguments (standalone boxes only)
    pub args: Vec<String>,
    /// Reserved; must not be specified
    pub ingress: Option<BoxIngressSpec>,
    /// Box-level network policy
    pub network_policy: Option<NetworkPolicySpec>,
}

/// Reserved for future use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxIngressSpec {}

// ============================================================================
// Defaults
// ============================================================================

/// Loader-only defaults; never persisted and never indexed by the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Default settings
    pub spec: DefaultsSpec,
}

/// Defaults spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultsSpec {
    /// Local files or directories to load resource documents from
    pub kom_path: Vec<String>,
    /// FQN of the App used when none is given explicitly
    pub app_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_app_spec() {
        let yaml = r#"
metadata:
  name: app1
  annotations:
    ops.kompox.dev/path: ws1/prv1/cls1
spec:
  compose: "services: {}"
  ingress:
    certResolver: staging
    rules:
      - name: http
        port: 8080
        hosts: [app.example.com]
  volumes:
    - name: data
      size: 10Gi
      type: disk
      options:
        sku: Premium_LRS
  networkPolicy:
    ingressRules:
      - from:
          - namespaceSelector:
              matchLabels:
                team: web
        ports:
          - port: 443
"#;
        let app: App = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(app.metadata.name, "app1");
        assert_eq!(app.metadata.annotation(ANNOTATION_PATH), Some("ws1/prv1/cls1"));
        let ingress = app.spec.ingress.unwrap();
        assert_eq!(ingress.cert_resolver, "staging");
        assert_eq!(ingress.rules[0].port, 8080);
        assert_eq!(app.spec.volumes[0].size, serde_json::json!("10Gi"));
        assert_eq!(app.spec.volumes[0].volume_type, "disk");
        let policy = app.spec.network_policy.unwrap();
        let rule = &policy.ingress_rules[0];
        assert!(!rule.from[0].namespace_selector.as_ref().unwrap().is_empty());
        assert_eq!(rule.ports[0].protocol, "");
    }

    #[test]
    fn test_parse_box_shapes() {
        let standalone: AppBox = serde_yaml::from_str(
            "metadata: {name: worker}\nspec:\n  image: busybox\n  command: [sh]\n",
        )
        .unwrap();
        assert!(standalone.is_standalone());
        assert!(standalone.spec.ingress.is_none());

        let derived: AppBox =
            serde_yaml::from_str("metadata: {name: api}\nspec:\n  ingress: {}\n").unwrap();
        assert!(!derived.is_standalone());
        assert!(derived.spec.ingress.is_some());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let ws: Workspace =
            serde_yaml::from_str("metadata: {name: ws1, namespace: x}\nstatus: {}\n").unwrap();
        assert_eq!(ws.metadata.name, "ws1");
    }
}
