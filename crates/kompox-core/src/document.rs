//! Parsed documents
//!
//! A [`Document`] is one resource read from a source file, tagged with its
//! [`Kind`], its [`Fqn`] and the [`Provenance`] needed to point diagnostics
//! at the exact file and position it came from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::fqn::Fqn;
use crate::resources::{App, AppBox, Cluster, Defaults, ObjectMeta, Provider, Workspace};

/// Resource kind.
///
/// Variants are declared in topological order, so the derived `Ord` is the
/// dependency order Workspace < Provider < Cluster < App < Box. Defaults has
/// no hierarchy position and sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// Root of the hierarchy
    Workspace,
    /// Infrastructure provider
    Provider,
    /// Kubernetes cluster
    Cluster,
    /// Application
    App,
    /// Deployable unit of an application
    Box,
    /// Loader-only default settings
    Defaults,
}

/// Error returned when parsing an unknown kind name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported kind: {0}")]
pub struct UnknownKind(pub String);

impl Kind {
    /// Hierarchical kinds in topological order
    pub const HIERARCHY: [Kind; 5] = [
        Kind::Workspace,
        Kind::Provider,
        Kind::Cluster,
        Kind::App,
        Kind::Box,
    ];

    /// Kind name as written in documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Workspace => "Workspace",
            Kind::Provider => "Provider",
            Kind::Cluster => "Cluster",
            Kind::App => "App",
            Kind::Box => "Box",
            Kind::Defaults => "Defaults",
        }
    }

    /// Number of FQN segments for this kind; `None` for Defaults.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Kind::Workspace => Some(1),
            Kind::Provider => Some(2),
            Kind::Cluster => Some(3),
            Kind::App => Some(4),
            Kind::Box => Some(5),
            Kind::Defaults => None,
        }
    }

    /// Kind designated by an FQN depth
    pub fn from_depth(depth: usize) -> Option<Kind> {
        Kind::HIERARCHY.get(depth.checked_sub(1)?).copied()
    }

    /// Topological rank, 1 for Workspace through 5 for Box.
    pub fn rank(&self) -> u8 {
        *self as u8 + 1
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Workspace" => Ok(Kind::Workspace),
            "Provider" => Ok(Kind::Provider),
            "Cluster" => Ok(Kind::Cluster),
            "App" => Ok(Kind::App),
            "Box" => Ok(Kind::Box),
            "Defaults" => Ok(Kind::Defaults),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Where a document came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Source file path
    pub path: PathBuf,
    /// 1-based position within the source's document stream
    pub index: usize,
}

impl Provenance {
    /// Create a provenance record
    pub fn new(path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index > 0 {
            write!(f, "{} (document {})", self.path.display(), self.index)
        } else {
            write!(f, "{}", self.path.display())
        }
    }
}

/// Typed payload of a document, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    /// Workspace payload
    Workspace(Workspace),
    /// Provider payload
    Provider(Provider),
    /// Cluster payload
    Cluster(Cluster),
    /// App payload
    App(App),
    /// Box payload
    Box(AppBox),
    /// Defaults payload
    Defaults(Defaults),
}

impl Resource {
    /// Kind of the payload
    pub fn kind(&self) -> Kind {
        match self {
            Resource::Workspace(_) => Kind::Workspace,
            Resource::Provider(_) => Kind::Provider,
            Resource::Cluster(_) => Kind::Cluster,
            Resource::App(_) => Kind::App,
            Resource::Box(_) => Kind::Box,
            Resource::Defaults(_) => Kind::Defaults,
        }
    }

    /// Metadata of the payload
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Workspace(r) => &r.metadata,
            Resource::Provider(r) => &r.metadata,
            Resource::Cluster(r) => &r.metadata,
            Resource::App(r) => &r.metadata,
            Resource::Box(r) => &r.metadata,
            Resource::Defaults(r) => &r.metadata,
        }
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Resource::Workspace(r) => &mut r.metadata,
            Resource::Provider(r) => &mut r.metadata,
            Resource::Cluster(r) => &mut r.metadata,
            Resource::App(r) => &mut r.metadata,
            Resource::Box(r) => &mut r.metadata,
            Resource::Defaults(r) => &mut r.metadata,
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.metadata().name
    }
}

/// One parsed resource document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Resource identifier; empty for Defaults
    pub fqn: Fqn,
    /// Typed payload
    pub resource: Resource,
    /// Source file and position
    pub provenance: Provenance,
}

impl Document {
    /// Create a document
    pub fn new(fqn: Fqn, resource: Resource, provenance: Provenance) -> Self {
        Self {
            fqn,
            resource,
            provenance,
        }
    }

    /// Kind of the document
    pub fn kind(&self) -> Kind {
        self.resource.kind()
    }
}
