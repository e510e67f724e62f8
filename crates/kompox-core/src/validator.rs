//! Batch validation
//!
//! [`validate`] takes an unordered batch of documents, sorts it in
//! topological order and checks every document against the documents
//! accepted before it in the same pass:
//!
//! 1. the FQN matches the kind (depth, labels, `metadata.name`)
//! 2. the FQN was not accepted already (first occurrence wins)
//! 3. the parent was accepted already (except for workspaces)
//! 4. kind-specific rules (boxes, defaults)
//!
//! A document that fails one check is rejected and the pass moves on, so a
//! single call reports every problem. Because parents are looked up among
//! accepted documents only, a rejected ancestor rejects its whole subtree.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::document::{Document, Kind, Provenance, Resource};
use crate::fqn::{Fqn, validate_dns1123_label};
use crate::resources::{AppBox, Defaults, RESERVED_BOX_NAME};

/// A rejected document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// FQN of the rejected document
    pub fqn: Fqn,
    /// Kind of the rejected document
    pub kind: Kind,
    /// Why it was rejected
    pub message: String,
    /// Where it was defined
    pub provenance: Provenance,
}

impl ValidationError {
    fn new(doc: &Document, message: String) -> Self {
        Self {
            fqn: doc.fqn.clone(),
            kind: doc.kind(),
            message,
            provenance: doc.provenance.clone(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" validation error: {}",
            self.kind.as_str().to_lowercase(),
            self.fqn,
            self.message
        )?;
        if !self.provenance.path.as_os_str().is_empty() {
            write!(f, " from {}", self.provenance)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Every error of one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// Number of errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no errors
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the errors
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of a validation pass: a partition of the input
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Accepted documents in topological order
    pub valid_documents: Vec<Document>,
    /// Rejections in topological order
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// True if any document was rejected
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The accepted documents if nothing was rejected, every error otherwise.
    pub fn into_result(self) -> Result<Vec<Document>, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(self.valid_documents)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// Sort documents by kind rank, then alphabetically by FQN.
///
/// The sort is stable, so documents sharing an FQN keep their input order.
pub fn sort_by_topology(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.fqn.cmp(&b.fqn)));
    documents
}

/// Validate a batch of documents in topological order.
pub fn validate(documents: Vec<Document>) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut pass = Pass::default();

    for doc in sort_by_topology(documents) {
        match pass.check(&doc) {
            Ok(()) => {
                pass.accept(&doc);
                result.valid_documents.push(doc);
            }
            Err(message) => {
                debug!(kind = %doc.kind(), fqn = %doc.fqn, "Rejected: {}", message);
                result.errors.push(ValidationError::new(&doc, message));
            }
        }
    }

    info!(
        valid = result.valid_documents.len(),
        errors = result.errors.len(),
        "Validated resource documents"
    );
    result
}

/// Accumulated state of one pass
#[derive(Default)]
struct Pass {
    /// Accepted hierarchical documents, available as parents
    accepted: BTreeMap<Fqn, Provenance>,
    /// Accepted Defaults documents per source file
    defaults: BTreeMap<PathBuf, Provenance>,
}

impl Pass {
    fn accept(&mut self, doc: &Document) {
        if doc.kind() == Kind::Defaults {
            self.defaults
                .insert(doc.provenance.path.clone(), doc.provenance.clone());
        } else {
            self.accepted
                .insert(doc.fqn.clone(), doc.provenance.clone());
        }
    }

    fn check(&self, doc: &Document) -> Result<(), String> {
        let kind = doc.kind();

        if let Resource::Defaults(defaults) = &doc.resource {
            return self.check_defaults(doc, defaults);
        }

        doc.fqn.validate_for(kind).map_err(|err| err.to_string())?;
        if doc.resource.name() != doc.fqn.name() {
            return Err(format!(
                "metadata.name {:?} does not match FQN name {:?}",
                doc.resource.name(),
                doc.fqn.name()
            ));
        }

        if let Some(first) = self.accepted.get(&doc.fqn) {
            return Err(format!(
                "duplicate FQN, already defined at {}",
                describe_previous(first, &doc.provenance)
            ));
        }

        if kind != Kind::Workspace {
            let parent = doc.fqn.parent();
            if !self.accepted.contains_key(&parent) {
                return Err(format!("parent {:?} does not exist", parent.as_str()));
            }
        }

        match &doc.resource {
            Resource::Box(app_box) => check_box(app_box),
            _ => Ok(()),
        }
    }

    fn check_defaults(&self, doc: &Document, defaults: &Defaults) -> Result<(), String> {
        if let Some(first) = self.defaults.get(&doc.provenance.path) {
            return Err(format!(
                "only one Defaults document is allowed per file, already defined at {}",
                describe_previous(first, &doc.provenance)
            ));
        }

        let app_id = defaults.spec.app_id.as_str();
        if !app_id.is_empty() {
            match Fqn::parse(app_id) {
                Ok((_, Kind::App)) => {}
                Ok((_, kind)) => {
                    return Err(format!(
                        "spec.appId {app_id:?} designates a {kind}, expected an App"
                    ));
                }
                Err(err) => return Err(format!("invalid spec.appId: {err}")),
            }
        }
        Ok(())
    }
}

fn describe_previous(first: &Provenance, current: &Provenance) -> String {
    if first.path == current.path {
        format!("document {}", first.index)
    } else {
        first.to_string()
    }
}

/// Box rules: naming, and the standalone/compose shapes.
fn check_box(app_box: &AppBox) -> Result<(), String> {
    let name = app_box.metadata.name.as_str();
    let spec = &app_box.spec;

    let reasons = validate_dns1123_label(name);
    if !reasons.is_empty() {
        return Err(format!("invalid box name {name:?}: {}", reasons.join(", ")));
    }
    if name == RESERVED_BOX_NAME {
        return Err(format!(
            "box name {name:?} is reserved for the default box of the app"
        ));
    }
    if !spec.component.is_empty() && spec.component != name {
        return Err(format!(
            "spec.component {:?} must match metadata.name {name:?}",
            spec.component
        ));
    }

    if app_box.is_standalone() {
        if spec.ingress.is_some() {
            return Err(
                "spec.ingress is reserved for future use and must not be set on a standalone box"
                    .to_string(),
            );
        }
    } else {
        let forbidden: Vec<&str> = [
            ("spec.command", !spec.command.is_empty()),
            ("spec.args", !spec.args.is_empty()),
            ("spec.ingress", spec.ingress.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();
        if !forbidden.is_empty() {
            return Err(format!(
                "{} not allowed on a compose box (spec.image is not set)",
                forbidden.join(", ")
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{
        App, BoxIngressSpec, BoxSpec, Cluster, DefaultsSpec, ObjectMeta, Provider, Workspace,
    };
    use rstest::rstest;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn doc(fqn: &str, index: usize) -> Document {
        let (fqn, kind) = Fqn::parse(fqn).unwrap();
        let m = meta(fqn.name());
        let resource = match kind {
            Kind::Workspace => Resource::Workspace(Workspace {
                metadata: m,
                ..Default::default()
            }),
            Kind::Provider => Resource::Provider(Provider {
                metadata: m,
                ..Default::default()
            }),
            Kind::Cluster => Resource::Cluster(Cluster {
                metadata: m,
                ..Default::default()
            }),
            Kind::App => Resource::App(App {
                metadata: m,
                ..Default::default()
            }),
            Kind::Box | Kind::Defaults => Resource::Box(AppBox {
                metadata: m,
                ..Default::default()
            }),
        };
        Document::new(fqn, resource, Provenance::new("kom.yml", index))
    }

    fn box_doc(name: &str, spec: BoxSpec) -> Document {
        let fqn = Fqn::build(Kind::Box, "ws1/prv1/cls1/app1", name).unwrap();
        Document::new(
            fqn,
            Resource::Box(AppBox {
                metadata: meta(name),
                spec,
            }),
            Provenance::new("kom.yml", 9),
        )
    }

    fn chain() -> Vec<Document> {
        vec![
            doc("ws1", 1),
            doc("ws1/prv1", 2),
            doc("ws1/prv1/cls1", 3),
            doc("ws1/prv1/cls1/app1", 4),
        ]
    }

    fn with_box(b: Document) -> Vec<Document> {
        let mut docs = chain();
        docs.push(b);
        docs
    }

    #[test]
    fn test_happy_path() {
        let mut docs = chain();
        docs.push(doc("ws1/prv1/cls1/app1/box1", 5));
        let result = validate(docs);
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert_eq!(result.valid_documents.len(), 5);
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        let docs = vec![
            doc("ws1/prv1/cls1/app1/box1", 1),
            doc("ws1/prv1/cls1", 2),
            doc("ws1", 3),
            doc("ws1/prv1/cls1/app1", 4),
            doc("ws1/prv1", 5),
        ];
        let result = validate(docs);
        assert!(!result.has_errors(), "{:?}", result.errors);
        let order: Vec<&str> = result
            .valid_documents
            .iter()
            .map(|d| d.fqn.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "ws1",
                "ws1/prv1",
                "ws1/prv1/cls1",
                "ws1/prv1/cls1/app1",
                "ws1/prv1/cls1/app1/box1"
            ]
        );
    }

    #[test]
    fn test_duplicate_first_occurrence_wins() {
        let docs = vec![doc("ws1", 1), doc("ws1/prv1", 2), doc("ws1/prv1", 7)];
        let result = validate(docs);
        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.provenance.index, 7);
        assert_eq!(err.message, "duplicate FQN, already defined at document 2");
        assert_eq!(result.valid_documents.len(), 2);
        assert_eq!(result.valid_documents[1].provenance.index, 2);
    }

    #[test]
    fn test_duplicate_across_files_names_the_file() {
        let mut other = doc("ws1", 1);
        other.provenance = Provenance::new("other.yml", 3);
        let result = validate(vec![doc("ws1", 1), other]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("kom.yml (document 1)"));
    }

    #[test]
    fn test_missing_parent_cascades() {
        let docs = vec![
            doc("ws1", 1),
            doc("ws1/prv1/cls1", 2),
            doc("ws1/prv1/cls1/app1", 3),
            doc("ws1/prv1/cls1/app1/box1", 4),
        ];
        let result = validate(docs);
        assert_eq!(result.valid_documents.len(), 1);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.errors[0].kind, Kind::Cluster);
        assert_eq!(result.errors[0].message, "parent \"ws1/prv1\" does not exist");
        assert_eq!(result.errors[1].kind, Kind::App);
        assert!(result.errors[1].message.contains("does not exist"));
        assert_eq!(result.errors[2].kind, Kind::Box);
        assert!(result.errors[2].message.contains("does not exist"));
    }

    #[test]
    fn test_depth_mismatch() {
        let mut bad = doc("ws1/prv1", 2);
        bad.resource = Resource::Cluster(Cluster {
            metadata: meta("prv1"),
            ..Default::default()
        });
        let result = validate(vec![doc("ws1", 1), bad]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("expects 3 segments"));
    }

    #[test]
    fn test_name_mismatch() {
        let mut bad = doc("ws1", 1);
        bad.resource = Resource::Workspace(Workspace {
            metadata: meta("ws2"),
            ..Default::default()
        });
        let result = validate(vec![bad]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("does not match"));
    }

    #[test]
    fn test_sort_by_topology() {
        let docs = vec![
            doc("ws2/prv1/cls1/app1/box1", 1),
            doc("ws2/prv1/cls1/app2", 2),
            doc("ws2", 3),
            doc("ws1/prv1/cls1", 4),
            doc("ws2/prv1/cls1/app1", 5),
            doc("ws1", 6),
            doc("ws1/prv1", 7),
        ];
        let sorted = sort_by_topology(docs);
        let kinds: Vec<Kind> = sorted.iter().map(Document::kind).collect();
        assert!(kinds.windows(2).all(|w| w[0] <= w[1]));
        assert!(
            sorted
                .windows(2)
                .filter(|w| w[0].kind() == w[1].kind())
                .all(|w| w[0].fqn <= w[1].fqn)
        );
        assert_eq!(sorted[0].fqn.as_str(), "ws1");
        assert_eq!(sorted[1].fqn.as_str(), "ws2");
        assert_eq!(sorted[4].fqn.as_str(), "ws2/prv1/cls1/app1");
        assert_eq!(sorted[5].fqn.as_str(), "ws2/prv1/cls1/app2");
    }

    #[test]
    fn test_compose_box_is_valid() {
        let result = validate(with_box(box_doc(
            "api",
            BoxSpec {
                component: "api".to_string(),
                ..Default::default()
            },
        )));
        assert!(!result.has_errors(), "{:?}", result.errors);
    }

    #[test]
    fn test_standalone_box_is_valid() {
        let result = validate(with_box(box_doc(
            "worker",
            BoxSpec {
                image: "busybox:1.36".to_string(),
                command: vec!["sh".to_string()],
                args: vec!["-c".to_string(), "sleep 3600".to_string()],
                ..Default::default()
            },
        )));
        assert!(!result.has_errors(), "{:?}", result.errors);
    }

    #[rstest]
    #[case::reserved_name("app", BoxSpec::default(), "reserved")]
    #[case::reserved_name_standalone(
        "app",
        BoxSpec { image: "nginx".to_string(), ..Default::default() },
        "reserved"
    )]
    #[case::component_mismatch(
        "api",
        BoxSpec { component: "web".to_string(), ..Default::default() },
        "spec.component"
    )]
    #[case::standalone_with_ingress(
        "worker",
        BoxSpec { image: "nginx".to_string(), ingress: Some(BoxIngressSpec {}), ..Default::default() },
        "spec.ingress"
    )]
    #[case::compose_with_command(
        "api",
        BoxSpec { command: vec!["sh".to_string()], ..Default::default() },
        "spec.command"
    )]
    #[case::compose_with_args(
        "api",
        BoxSpec { args: vec!["-v".to_string()], ..Default::default() },
        "spec.args"
    )]
    #[case::compose_with_ingress(
        "api",
        BoxSpec { ingress: Some(BoxIngressSpec {}), ..Default::default() },
        "spec.ingress"
    )]
    fn test_invalid_box(#[case] name: &str, #[case] spec: BoxSpec, #[case] needle: &str) {
        let result = validate(with_box(box_doc(name, spec)));
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert_eq!(result.errors[0].kind, Kind::Box);
        assert!(
            result.errors[0].message.contains(needle),
            "{}",
            result.errors[0].message
        );
    }

    fn defaults_doc(app_id: &str, path: &str, index: usize) -> Document {
        Document::new(
            Fqn::default(),
            Resource::Defaults(Defaults {
                metadata: meta("defaults"),
                spec: DefaultsSpec {
                    app_id: app_id.to_string(),
                    ..Default::default()
                },
            }),
            Provenance::new(path, index),
        )
    }

    #[test]
    fn test_defaults_pass_through() {
        let mut docs = chain();
        docs.push(defaults_doc("ws1/prv1/cls1/app1", "kompoxapp.yml", 1));
        let result = validate(docs);
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert_eq!(result.valid_documents.last().unwrap().kind(), Kind::Defaults);
    }

    #[test]
    fn test_defaults_rules() {
        let docs = vec![
            defaults_doc("", "a.yml", 1),
            defaults_doc("", "a.yml", 2),
            defaults_doc("ws1/prv1", "b.yml", 1),
            defaults_doc("ws1/Prv1/cls1/app1", "c.yml", 1),
        ];
        let result = validate(docs);
        assert_eq!(result.valid_documents.len(), 1);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].message.contains("only one Defaults"));
        assert!(result.errors[1].message.contains("expected an App"));
        assert!(result.errors[2].message.contains("invalid spec.appId"));
    }

    #[test]
    fn test_error_display() {
        let result = validate(vec![doc("ws1/prv1", 4)]);
        assert_eq!(
            result.errors[0].to_string(),
            "provider \"ws1/prv1\" validation error: parent \"ws1\" does not exist from kom.yml (document 4)"
        );
        let errors = result.into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.to_string().starts_with("  - provider"));
    }
}
