//! Domain records produced by projection
//!
//! Every record is keyed by its FQN string (`id`) and points at its parent
//! through the parent's FQN string. Free-form values from the resource
//! documents are replaced with checked types here: sizes are byte counts,
//! protocols and selector operators are enums.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A workspace record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    /// FQN, e.g. `ws1`
    pub id: String,
    /// Name
    pub name: String,
}

/// A provider record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    /// FQN, e.g. `ws1/prv1`
    pub id: String,
    /// Name
    pub name: String,
    /// FQN of the owning workspace
    pub workspace_id: String,
    /// Driver name
    pub driver: String,
    /// Provider-level settings
    pub settings: BTreeMap<String, String>,
}

/// A cluster record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    /// FQN, e.g. `ws1/prv1/cls1`
    pub id: String,
    /// Name
    pub name: String,
    /// FQN of the owning provider
    pub provider_id: String,
    /// Whether the cluster is managed outside Kompox
    pub existing: bool,
    /// Ingress controller configuration
    pub ingress: Option<ClusterIngress>,
    /// Lifecycle operation guards
    pub protection: Option<ClusterProtection>,
    /// Cluster-level settings
    pub settings: BTreeMap<String, String>,
}

/// Cluster ingress controller configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterIngress {
    /// Namespace of the ingress controller
    pub namespace: String,
    /// Ingress controller type
    pub controller: String,
    /// Service account of the ingress controller
    pub service_account: String,
    /// Default DNS domain
    pub domain: String,
    /// ACME resolver
    pub cert_resolver: String,
    /// ACME account email
    pub cert_email: String,
    /// Static certificates
    pub certificates: Vec<ClusterIngressCertificate>,
}

/// Static certificate reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterIngressCertificate {
    /// Certificate name
    pub name: String,
    /// Provider-specific locator
    pub source: String,
}

/// Protection levels of a cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterProtection {
    /// Guards provision/deprovision
    pub provisioning: ProtectionLevel,
    /// Guards install/uninstall/updates
    pub installation: ProtectionLevel,
}

/// How strongly a cluster operation is guarded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionLevel {
    /// No guard
    #[default]
    None,
    /// Deletion is blocked
    CannotDelete,
    /// Updates and deletion are blocked
    ReadOnly,
}

impl FromStr for ProtectionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Self::None),
            "cannotDelete" => Ok(Self::CannotDelete),
            "readOnly" => Ok(Self::ReadOnly),
            other => Err(format!(
                "unknown protection level {other:?} (expected none, cannotDelete or readOnly)"
            )),
        }
    }
}

/// An app record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct App {
    /// FQN, e.g. `ws1/prv1/cls1/app1`
    pub id: String,
    /// Name
    pub name: String,
    /// FQN of the owning cluster
    pub cluster_id: String,
    /// Compose content, with `file:` references already resolved
    pub compose: String,
    /// Ingress settings
    pub ingress: AppIngress,
    /// Persistent volumes
    pub volumes: Vec<AppVolume>,
    /// Placement
    pub deployment: AppDeployment,
    /// Additional ingress network policy
    pub network_policy: NetworkPolicy,
    /// Resource settings
    pub resources: BTreeMap<String, String>,
    /// App-level settings
    pub settings: BTreeMap<String, String>,
}

/// App ingress settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppIngress {
    /// Resolver override
    pub cert_resolver: String,
    /// Exposure rules
    pub rules: Vec<AppIngressRule>,
}

/// External exposure of one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppIngressRule {
    /// Rule name
    pub name: String,
    /// Service port
    pub port: u16,
    /// Hostnames
    pub hosts: Vec<String>,
}

/// A persistent volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppVolume {
    /// Volume name
    pub name: String,
    /// Size in bytes
    pub size: i64,
    /// Access mode class
    pub volume_type: VolumeType,
    /// Provider-specific options
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Volume type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// Block storage, ReadWriteOnce
    #[default]
    Disk,
    /// Shared file storage, ReadWriteMany
    Files,
}

impl FromStr for VolumeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "disk" => Ok(Self::Disk),
            "files" => Ok(Self::Files),
            other => Err(format!("unknown volume type {other:?} (expected disk or files)")),
        }
    }
}

/// Placement of an app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppDeployment {
    /// Node pool
    pub pool: String,
    /// Node pools
    pub pools: Vec<String>,
    /// Availability zone
    pub zone: String,
    /// Availability zones
    pub zones: Vec<String>,
}

/// Checked network policy of an app or a box
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkPolicy {
    /// Additional allowed ingress
    pub ingress_rules: Vec<NetworkPolicyIngressRule>,
}

/// One allowed ingress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPolicyIngressRule {
    /// Allowed sources; never empty
    pub from: Vec<NetworkPolicyPeer>,
    /// Allowed ports
    pub ports: Vec<NetworkPolicyPort>,
}

/// A namespace-selected source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPolicyPeer {
    /// Namespace selector; never empty
    pub namespace_selector: LabelSelector,
}

/// Label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSelector {
    /// Exact label matches
    pub match_labels: BTreeMap<String, String>,
    /// Set-based requirements
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// One set-based requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,
    /// Operator
    pub operator: SelectorOperator,
    /// Values; empty for `Exists` and `DoesNotExist`
    pub values: Vec<String>,
}

/// Label selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectorOperator {
    /// Label value is one of the values
    In,
    /// Label value is none of the values
    NotIn,
    /// Label is present
    Exists,
    /// Label is absent
    DoesNotExist,
}

impl SelectorOperator {
    /// Whether the operator takes a value list
    pub fn takes_values(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl FromStr for SelectorOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(format!("unsupported operator {other:?}")),
        }
    }
}

/// A port and protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkPolicyPort {
    /// Protocol
    pub protocol: Protocol,
    /// Port number
    pub port: u16,
}

/// Transport protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            "SCTP" => Ok(Self::Sctp),
            other => Err(format!("unsupported protocol {other:?} (expected TCP, UDP or SCTP)")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        })
    }
}

/// A box record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppBox {
    /// FQN, e.g. `ws1/prv1/cls1/app1/api`
    pub id: String,
    /// Name
    pub name: String,
    /// FQN of the owning app
    pub app_id: String,
    /// Component name override
    pub component: String,
    /// Image of a standalone box
    pub image: String,
    /// Entrypoint override
    pub command: Vec<String>,
    /// Arguments
    pub args: Vec<String>,
    /// Box-level network policy
    pub network_policy: NetworkPolicy,
}

impl AppBox {
    /// Component name, falling back to the box name
    pub fn component_name(&self) -> &str {
        if self.component.is_empty() {
            &self.name
        } else {
            &self.component
        }
    }

    /// True if the box runs its own image rather than a compose service
    pub fn is_standalone(&self) -> bool {
        !self.image.is_empty()
    }
}
