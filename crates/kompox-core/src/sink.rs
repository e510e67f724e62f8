//! Immutable, kind-indexed snapshot of a validated batch
//!
//! A [`Sink`] is built once from a batch that passes validation in full;
//! there is no partial sink. It has no mutation surface and every accessor
//! hands out an owned copy, so it can be shared freely between readers.

use std::collections::BTreeMap;
use tracing::info;

use crate::document::{Document, Kind, Provenance, Resource};
use crate::error::{Error, Result};
use crate::fqn::Fqn;
use crate::resources::{App, AppBox, Cluster, Provider, Workspace};
use crate::validator::validate;

/// Validated resources indexed by FQN, one table per kind
#[derive(Debug, Clone, Default)]
pub struct Sink {
    workspaces: BTreeMap<Fqn, Workspace>,
    providers: BTreeMap<Fqn, Provider>,
    clusters: BTreeMap<Fqn, Cluster>,
    apps: BTreeMap<Fqn, App>,
    boxes: BTreeMap<Fqn, AppBox>,
    provenance: BTreeMap<Fqn, Provenance>,
}

impl Sink {
    /// Validate `documents` and index them.
    ///
    /// Fails with [`Error::Validation`] carrying every collected error if any
    /// document is rejected. Defaults documents are accepted but not indexed.
    pub fn new(documents: Vec<Document>) -> Result<Self> {
        let valid = validate(documents)
            .into_result()
            .map_err(Error::Validation)?;

        let mut sink = Self::default();
        for doc in valid {
            match doc.resource {
                Resource::Workspace(r) => {
                    sink.workspaces.insert(doc.fqn.clone(), r);
                }
                Resource::Provider(r) => {
                    sink.providers.insert(doc.fqn.clone(), r);
                }
                Resource::Cluster(r) => {
                    sink.clusters.insert(doc.fqn.clone(), r);
                }
                Resource::App(r) => {
                    sink.apps.insert(doc.fqn.clone(), r);
                }
                Resource::Box(r) => {
                    sink.boxes.insert(doc.fqn.clone(), r);
                }
                Resource::Defaults(_) => continue,
            }
            sink.provenance.insert(doc.fqn, doc.provenance);
        }

        info!(
            workspaces = sink.workspaces.len(),
            providers = sink.providers.len(),
            clusters = sink.clusters.len(),
            apps = sink.apps.len(),
            boxes = sink.boxes.len(),
            "Built sink"
        );
        Ok(sink)
    }

    /// Copy of the resource of `kind` at `fqn`
    pub fn get(&self, kind: Kind, fqn: &Fqn) -> Option<Resource> {
        match kind {
            Kind::Workspace => self.workspace(fqn).map(Resource::Workspace),
            Kind::Provider => self.provider(fqn).map(Resource::Provider),
            Kind::Cluster => self.cluster(fqn).map(Resource::Cluster),
            Kind::App => self.app(fqn).map(Resource::App),
            Kind::Box => self.app_box(fqn).map(Resource::Box),
            Kind::Defaults => None,
        }
    }

    /// Copies of every resource of `kind`, in FQN order
    pub fn list(&self, kind: Kind) -> Vec<Resource> {
        match kind {
            Kind::Workspace => copies(&self.workspaces, Resource::Workspace),
            Kind::Provider => copies(&self.providers, Resource::Provider),
            Kind::Cluster => copies(&self.clusters, Resource::Cluster),
            Kind::App => copies(&self.apps, Resource::App),
            Kind::Box => copies(&self.boxes, Resource::Box),
            Kind::Defaults => Vec::new(),
        }
    }

    /// FQNs of every resource of `kind`, in FQN order
    pub fn fqns(&self, kind: Kind) -> Vec<Fqn> {
        match kind {
            Kind::Workspace => self.workspaces.keys().cloned().collect(),
            Kind::Provider => self.providers.keys().cloned().collect(),
            Kind::Cluster => self.clusters.keys().cloned().collect(),
            Kind::App => self.apps.keys().cloned().collect(),
            Kind::Box => self.boxes.keys().cloned().collect(),
            Kind::Defaults => Vec::new(),
        }
    }

    /// Copy of a workspace
    pub fn workspace(&self, fqn: &Fqn) -> Option<Workspace> {
        self.workspaces.get(fqn).cloned()
    }

    /// Copy of a provider
    pub fn provider(&self, fqn: &Fqn) -> Option<Provider> {
        self.providers.get(fqn).cloned()
    }

    /// Copy of a cluster
    pub fn cluster(&self, fqn: &Fqn) -> Option<Cluster> {
        self.clusters.get(fqn).cloned()
    }

    /// Copy of an app
    pub fn app(&self, fqn: &Fqn) -> Option<App> {
        self.apps.get(fqn).cloned()
    }

    /// Copy of a box
    pub fn app_box(&self, fqn: &Fqn) -> Option<AppBox> {
        self.boxes.get(fqn).cloned()
    }

    /// Copies of all workspaces with their FQNs
    pub fn workspaces(&self) -> Vec<(Fqn, Workspace)> {
        entries(&self.workspaces)
    }

    /// Copies of all providers with their FQNs
    pub fn providers(&self) -> Vec<(Fqn, Provider)> {
        entries(&self.providers)
    }

    /// Copies of all clusters with their FQNs
    pub fn clusters(&self) -> Vec<(Fqn, Cluster)> {
        entries(&self.clusters)
    }

    /// Copies of all apps with their FQNs
    pub fn apps(&self) -> Vec<(Fqn, App)> {
        entries(&self.apps)
    }

    /// Copies of all boxes with their FQNs
    pub fn boxes(&self) -> Vec<(Fqn, AppBox)> {
        entries(&self.boxes)
    }

    /// Where the resource at `fqn` was defined
    pub fn provenance(&self, fqn: &Fqn) -> Option<Provenance> {
        self.provenance.get(fqn).cloned()
    }

    /// Total number of indexed resources
    pub fn count(&self) -> usize {
        self.workspaces.len()
            + self.providers.len()
            + self.clusters.len()
            + self.apps.len()
            + self.boxes.len()
    }

    /// True if nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

fn copies<T: Clone>(table: &BTreeMap<Fqn, T>, wrap: fn(T) -> Resource) -> Vec<Resource> {
    table.values().cloned().map(wrap).collect()
}

fn entries<T: Clone>(table: &BTreeMap<Fqn, T>) -> Vec<(Fqn, T)> {
    table
        .iter()
        .map(|(fqn, value)| (fqn.clone(), value.clone()))
        .collect()
}
