//! Canonical hierarchical identifiers
//!
//! An FQN locates a resource from the root of the hierarchy:
//!
//! ```text
//! ws1                       Workspace
//! ws1/prv1                  Provider
//! ws1/prv1/cls1             Cluster
//! ws1/prv1/cls1/app1        App
//! ws1/prv1/cls1/app1/api    Box
//! ```
//!
//! The kind of a resource is encoded by the depth of its FQN. Every segment
//! must be a DNS-1123 label.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::document::Kind;

/// Separator between FQN segments
pub const SEPARATOR: char = '/';

/// Maximum length of a DNS-1123 label
pub const DNS1123_LABEL_MAX_LENGTH: usize = 63;

/// Errors produced while building or parsing an FQN
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FqnError {
    /// The kind has no position in the hierarchy (Defaults)
    #[error("kind {0} has no position in the resource hierarchy")]
    NotHierarchical(Kind),

    /// A Workspace was given a parent
    #[error("{0} cannot have a parent")]
    UnexpectedParent(Kind),

    /// A non-root kind was given no parent
    #[error("kind {0} requires a parent path")]
    MissingParent(Kind),

    /// Segment count does not match the kind
    #[error("kind {kind} expects {expected} segments but FQN {fqn:?} has {actual}")]
    WrongDepth {
        /// Kind the FQN was built for
        kind: Kind,
        /// Depth required by the kind
        expected: usize,
        /// Depth of the FQN
        actual: usize,
        /// The offending FQN
        fqn: String,
    },

    /// Segment count does not designate any kind
    #[error("FQN {fqn:?} has {depth} segments, expected between 1 and 5")]
    UnsupportedDepth {
        /// The offending FQN
        fqn: String,
        /// Its segment count
        depth: usize,
    },

    /// A segment is not a DNS-1123 label
    #[error("invalid name {segment:?} in FQN {fqn:?}: {}", .reasons.join(", "))]
    InvalidLabel {
        /// The offending FQN
        fqn: String,
        /// The offending segment
        segment: String,
        /// Every rule the segment violates
        reasons: Vec<String>,
    },
}

/// Fully qualified name of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fqn(String);

impl Fqn {
    /// Build the FQN of a `kind` resource called `name` under `parent`.
    ///
    /// Workspaces take an empty parent, every other kind requires one. The
    /// result is checked for depth first and for label syntax second, so the
    /// two mistakes produce different errors.
    ///
    /// ```rust
    /// use kompox_core::{Fqn, Kind};
    ///
    /// let fqn = Fqn::build(Kind::Cluster, "ws1/prv1", "cls1").unwrap();
    /// assert_eq!(fqn.as_str(), "ws1/prv1/cls1");
    /// assert_eq!(fqn.parent().as_str(), "ws1/prv1");
    /// ```
    pub fn build(kind: Kind, parent: &str, name: &str) -> Result<Self, FqnError> {
        if kind.depth().is_none() {
            return Err(FqnError::NotHierarchical(kind));
        }

        let raw = match (kind, parent.is_empty()) {
            (Kind::Workspace, true) => name.to_string(),
            (Kind::Workspace, false) => return Err(FqnError::UnexpectedParent(kind)),
            (_, true) => return Err(FqnError::MissingParent(kind)),
            (_, false) => format!("{parent}{SEPARATOR}{name}"),
        };

        let fqn = Self(raw);
        fqn.validate_for(kind)?;
        Ok(fqn)
    }

    /// Parse an FQN string, inferring its kind from the segment count.
    pub fn parse(s: &str) -> Result<(Self, Kind), FqnError> {
        let fqn = Self(s.to_string());
        let depth = fqn.depth();
        let kind = Kind::from_depth(depth).ok_or_else(|| FqnError::UnsupportedDepth {
            fqn: s.to_string(),
            depth,
        })?;
        fqn.validate_labels()?;
        Ok((fqn, kind))
    }

    /// Check that this FQN has the depth of `kind` and only valid labels.
    pub fn validate_for(&self, kind: Kind) -> Result<(), FqnError> {
        let expected = kind.depth().ok_or(FqnError::NotHierarchical(kind))?;
        let actual = self.depth();
        if actual != expected {
            return Err(FqnError::WrongDepth {
                kind,
                expected,
                actual,
                fqn: self.0.clone(),
            });
        }
        self.validate_labels()
    }

    fn validate_labels(&self) -> Result<(), FqnError> {
        for segment in self.segments() {
            let reasons = validate_dns1123_label(segment);
            if !reasons.is_empty() {
                return Err(FqnError::InvalidLabel {
                    fqn: self.0.clone(),
                    segment: segment.to_string(),
                    reasons,
                });
            }
        }
        Ok(())
    }

    /// The FQN as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty FQN (no parent, or a Defaults document)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ordered name segments, empty for the empty FQN
    pub fn segments(&self) -> Vec<&str> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0.split(SEPARATOR).collect()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.split(SEPARATOR).count()
        }
    }

    /// The FQN with its last segment removed; empty for a Workspace.
    pub fn parent(&self) -> Fqn {
        match self.0.rsplit_once(SEPARATOR) {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::default(),
        }
    }

    /// Last segment, i.e. the resource's own name
    pub fn name(&self) -> &str {
        match self.0.rsplit_once(SEPARATOR) {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    fn segment(&self, position: usize) -> &str {
        self.0.split(SEPARATOR).nth(position).unwrap_or("")
    }

    /// Workspace segment
    pub fn workspace_name(&self) -> &str {
        self.segment(0)
    }

    /// Provider segment, empty if the FQN is too shallow
    pub fn provider_name(&self) -> &str {
        self.segment(1)
    }

    /// Cluster segment, empty if the FQN is too shallow
    pub fn cluster_name(&self) -> &str {
        self.segment(2)
    }

    /// App segment, empty if the FQN is too shallow
    pub fn app_name(&self) -> &str {
        self.segment(3)
    }

    /// Box segment, empty if the FQN is too shallow
    pub fn box_name(&self) -> &str {
        self.segment(4)
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fqn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check `value` against the DNS-1123 label rules.
///
/// Returns every violated rule; an empty vector means the label is valid.
pub fn validate_dns1123_label(value: &str) -> Vec<String> {
    let mut reasons = Vec::new();

    if value.is_empty() {
        reasons.push("must not be empty".to_string());
        return reasons;
    }
    if value.len() > DNS1123_LABEL_MAX_LENGTH {
        reasons.push(format!(
            "must be no more than {DNS1123_LABEL_MAX_LENGTH} characters"
        ));
    }

    let allowed = value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let edges_ok = !value.starts_with('-') && !value.ends_with('-');
    if !allowed || !edges_ok {
        reasons.push(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', \
             and must start and end with an alphanumeric character"
                .to_string(),
        );
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Kind::Workspace, "", "ws1", "ws1")]
    #[case(Kind::Provider, "ws1", "prv1", "ws1/prv1")]
    #[case(Kind::Cluster, "ws1/prv1", "cls1", "ws1/prv1/cls1")]
    #[case(Kind::App, "ws1/prv1/cls1", "app1", "ws1/prv1/cls1/app1")]
    #[case(Kind::Box, "ws1/prv1/cls1/app1", "api", "ws1/prv1/cls1/app1/api")]
    fn test_build_then_parent(
        #[case] kind: Kind,
        #[case] parent: &str,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        let fqn = Fqn::build(kind, parent, name).unwrap();
        assert_eq!(fqn.as_str(), expected);
        assert_eq!(fqn.parent().as_str(), parent);
        assert_eq!(fqn.depth(), kind.depth().unwrap());
        assert_eq!(fqn.name(), name);
    }

    #[test]
    fn test_build_workspace_with_parent() {
        let err = Fqn::build(Kind::Workspace, "ws0", "ws1").unwrap_err();
        assert_eq!(err, FqnError::UnexpectedParent(Kind::Workspace));
    }

    #[test]
    fn test_build_missing_parent() {
        let err = Fqn::build(Kind::Cluster, "", "cls1").unwrap_err();
        assert_eq!(err, FqnError::MissingParent(Kind::Cluster));
    }

    #[test]
    fn test_build_defaults_is_not_hierarchical() {
        let err = Fqn::build(Kind::Defaults, "", "defaults").unwrap_err();
        assert_eq!(err, FqnError::NotHierarchical(Kind::Defaults));
    }

    #[test]
    fn test_build_wrong_depth_is_distinct_from_bad_label() {
        let depth = Fqn::build(Kind::Cluster, "ws1", "cls1").unwrap_err();
        assert!(matches!(
            depth,
            FqnError::WrongDepth {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert!(depth.to_string().contains("expects 3 segments"));

        let label = Fqn::build(Kind::Provider, "ws1", "Prv_1").unwrap_err();
        assert!(matches!(label, FqnError::InvalidLabel { ref segment, .. } if segment == "Prv_1"));
        assert!(label.to_string().contains("invalid name"));
    }

    #[test]
    fn test_build_invalid_parent_segment() {
        let err = Fqn::build(Kind::Cluster, "ws1/-prv", "cls1").unwrap_err();
        assert!(matches!(err, FqnError::InvalidLabel { ref segment, .. } if segment == "-prv"));
    }

    #[test]
    fn test_segments_and_accessors() {
        let fqn = Fqn::build(Kind::Box, "ws1/prv1/cls1/app1", "api").unwrap();
        assert_eq!(fqn.segments(), vec!["ws1", "prv1", "cls1", "app1", "api"]);
        assert_eq!(fqn.workspace_name(), "ws1");
        assert_eq!(fqn.provider_name(), "prv1");
        assert_eq!(fqn.cluster_name(), "cls1");
        assert_eq!(fqn.app_name(), "app1");
        assert_eq!(fqn.box_name(), "api");

        let shallow = Fqn::build(Kind::Provider, "ws1", "prv1").unwrap();
        assert_eq!(shallow.cluster_name(), "");
        assert_eq!(shallow.app_name(), "");
        assert_eq!(shallow.box_name(), "");
    }

    #[test]
    fn test_parent_of_workspace_is_empty() {
        let ws = Fqn::build(Kind::Workspace, "", "ws1").unwrap();
        assert!(ws.parent().is_empty());
        assert!(Fqn::default().segments().is_empty());
        assert_eq!(Fqn::default().depth(), 0);
    }

    #[rstest]
    #[case("ws1", Kind::Workspace)]
    #[case("ws1/prv1/cls1/app1", Kind::App)]
    #[case("ws1/prv1/cls1/app1/box1", Kind::Box)]
    fn test_parse_infers_kind(#[case] input: &str, #[case] kind: Kind) {
        let (fqn, parsed) = Fqn::parse(input).unwrap();
        assert_eq!(fqn.as_str(), input);
        assert_eq!(parsed, kind);
    }

    #[rstest]
    #[case("")]
    #[case("a/b/c/d/e/f")]
    #[case("ws1//cls1")]
    #[case("/ws1")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Fqn::parse(input).is_err());
    }

    #[rstest]
    #[case("a", true)]
    #[case("my-name", true)]
    #[case("123-abc", true)]
    #[case("", false)]
    #[case("-abc", false)]
    #[case("abc-", false)]
    #[case("ABC", false)]
    #[case("a_b", false)]
    #[case("a.b", false)]
    fn test_dns1123_label(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(validate_dns1123_label(value).is_empty(), valid);
    }

    #[test]
    fn test_dns1123_label_length() {
        assert!(validate_dns1123_label(&"a".repeat(63)).is_empty());
        let reasons = validate_dns1123_label(&"a".repeat(64));
        assert_eq!(reasons, vec!["must be no more than 63 characters"]);
    }
}
