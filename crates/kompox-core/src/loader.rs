//! Document loading
//!
//! The loader reads one file or recursively walks one directory, decodes
//! multi-document YAML streams and turns every `ops.kompox.dev/v1alpha1`
//! document into a [`Document`]. Documents of other API groups are skipped
//! so resource files can share a stream with unrelated manifests.
//!
//! Failures are split in two classes:
//! - fatal errors ([`Error`]) abort the call: a missing top-level path, or an
//!   oversized/unreadable file loaded directly;
//! - per-document and per-file errors ([`LoadError`]) are collected next to
//!   the documents that did parse.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{Document, Kind, Provenance, Resource};
use crate::error::{Error, Result};
use crate::fqn::Fqn;
use crate::resources::{
    ANNOTATION_DOC_INDEX, ANNOTATION_DOC_PATH, ANNOTATION_PATH, API_VERSION, Defaults,
};

/// Default maximum size of a single source file (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// File extensions picked up when walking a directory
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// A non-fatal error for one file or one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// Source file
    pub path: PathBuf,
    /// 1-based document index, `None` when the whole file failed
    pub index: Option<usize>,
    /// What went wrong
    pub message: String,
}

impl LoadError {
    fn file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            index: None,
            message: message.into(),
        }
    }

    fn document(path: impl Into<PathBuf>, index: usize, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            index: Some(index),
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(
                f,
                "document {} in {}: {}",
                index,
                self.path.display(),
                self.message
            ),
            None => write!(f, "loading {}: {}", self.path.display(), self.message),
        }
    }
}

impl std::error::Error for LoadError {}

/// Documents and collected errors of one load
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Parsed documents in read order
    pub documents: Vec<Document>,
    /// Collected non-fatal errors in read order
    pub errors: Vec<LoadError>,
}

impl LoadResult {
    /// True if any non-fatal error was collected
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Append another result
    pub fn extend(&mut self, other: LoadResult) {
        self.documents.extend(other.documents);
        self.errors.extend(other.errors);
    }

    /// Defaults documents of this result, in read order
    pub fn defaults(&self) -> impl Iterator<Item = &Defaults> {
        self.documents.iter().filter_map(|doc| match &doc.resource {
            Resource::Defaults(defaults) => Some(defaults),
            _ => None,
        })
    }
}

/// Loads resource documents from files and directories
#[derive(Debug, Clone)]
pub struct Loader {
    max_file_size: u64,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Loader {
    /// Create a loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-file size limit
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Per-file size limit in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Load documents from a file or, recursively, from a directory.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let result = Loader::new().load("./kom")?;
    /// for err in &result.errors {
    ///     eprintln!("{err}");
    /// }
    /// ```
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadResult> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|source| Error::PathNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let result = if meta.is_dir() {
            self.load_directory(path)
        } else {
            self.load_file(path)?
        };

        info!(
            path = %path.display(),
            documents = result.documents.len(),
            errors = result.errors.len(),
            "Loaded resource documents"
        );
        Ok(result)
    }

    /// Load several paths in order; the first fatal error aborts.
    pub fn load_all<I, P>(&self, paths: I) -> Result<LoadResult>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut result = LoadResult::default();
        for path in paths {
            result.extend(self.load(path)?);
        }
        Ok(result)
    }

    fn load_directory(&self, dir: &Path) -> LoadResult {
        let mut result = LoadResult::default();

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(dir).to_path_buf();
                    warn!(path = %path.display(), "Walk error: {}", err);
                    result
                        .errors
                        .push(LoadError::file(path, format!("walk error: {err}")));
                    continue;
                }
            };

            if !entry.file_type().is_file() || !has_accepted_extension(entry.path()) {
                continue;
            }

            match self.load_file(entry.path()) {
                Ok(file_result) => result.extend(file_result),
                Err(err) => {
                    warn!(path = %entry.path().display(), "Skipping file: {}", err);
                    result
                        .errors
                        .push(LoadError::file(entry.path(), err.to_string()));
                }
            }
        }

        result
    }

    fn load_file(&self, path: &Path) -> Result<LoadResult> {
        let meta = std::fs::metadata(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if meta.len() > self.max_file_size {
            return Err(Error::FileTooLarge {
                path: path.to_path_buf(),
                size: meta.len(),
                limit: self.max_file_size,
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), bytes = content.len(), "Decoding file");
        Ok(self.load_str(&content, path))
    }

    /// Decode a multi-document stream as if it had been read from `path`.
    ///
    /// Documents are split on `---` separators before decoding, so a syntax
    /// error stays confined to its own document.
    pub fn load_str(&self, content: &str, path: &Path) -> LoadResult {
        let mut result = LoadResult::default();

        for (i, chunk) in split_documents(content).into_iter().enumerate() {
            let index = i + 1;
            if !has_content(chunk) {
                continue;
            }
            let value = match serde_yaml::from_str::<serde_yaml::Value>(chunk) {
                Ok(value) => value,
                Err(err) => {
                    result.errors.push(LoadError::document(
                        path,
                        index,
                        format!("decoding document: {err}"),
                    ));
                    continue;
                }
            };

            match parse_document(value, path, index) {
                Ok(Some(doc)) => result.documents.push(doc),
                Ok(None) => {}
                Err(message) => result
                    .errors
                    .push(LoadError::document(path, index, message)),
            }
        }

        result
    }
}

/// Split a YAML stream into documents at `---` lines.
///
/// A leading chunk without content (blank lines, comments, directives) is
/// not a document of its own when a separator follows it.
fn split_documents(content: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if is_separator(line.trim_end_matches(['\n', '\r'])) {
            documents.push(&content[start..offset]);
            start = offset + "---".len();
        }
        offset += line.len();
    }
    documents.push(&content[start..]);

    if documents.len() > 1 && !has_content(documents[0]) {
        documents.remove(0);
    }
    documents
}

fn is_separator(line: &str) -> bool {
    line.strip_prefix("---")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

fn has_content(chunk: &str) -> bool {
    chunk.lines().map(str::trim).any(|line| {
        !line.is_empty() && !line.starts_with('#') && !line.starts_with('%') && line != "..."
    })
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Turn one decoded value into a document.
///
/// `Ok(None)` means the document is empty or belongs to another API group.
fn parse_document(
    value: serde_yaml::Value,
    path: &Path,
    index: usize,
) -> std::result::Result<Option<Document>, String> {
    let mapping = match &value {
        serde_yaml::Value::Null => return Ok(None),
        serde_yaml::Value::Mapping(mapping) if mapping.is_empty() => return Ok(None),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err("document is not a mapping".to_string()),
    };

    let api_version = mapping
        .get("apiVersion")
        .and_then(serde_yaml::Value::as_str)
        .ok_or("missing or invalid apiVersion")?
        .to_string();
    let kind_name = mapping
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .ok_or("missing or invalid kind")?
        .to_string();

    if api_version != API_VERSION {
        debug!(
            path = %path.display(),
            index,
            api_version = %api_version,
            "Skipping foreign document"
        );
        return Ok(None);
    }

    let kind = kind_name.parse::<Kind>().map_err(|err| err.to_string())?;
    let mut resource = decode_resource(kind, value)?;

    let name = resource.name().to_string();
    if name.is_empty() {
        return Err("missing or invalid metadata.name".to_string());
    }

    let fqn = match kind {
        Kind::Defaults => Fqn::default(),
        Kind::Workspace => {
            let parent = resource.metadata().annotation(ANNOTATION_PATH).unwrap_or("");
            Fqn::build(kind, parent, &name).map_err(|err| err.to_string())?
        }
        _ => {
            let parent = resource
                .metadata()
                .annotation(ANNOTATION_PATH)
                .filter(|parent| !parent.is_empty())
                .ok_or_else(|| format!("missing required annotation {ANNOTATION_PATH:?}"))?;
            Fqn::build(kind, parent, &name).map_err(|err| err.to_string())?
        }
    };

    let provenance = Provenance::new(path, index);
    stamp(&mut resource, &provenance);

    Ok(Some(Document::new(fqn, resource, provenance)))
}

fn decode_resource(kind: Kind, value: serde_yaml::Value) -> std::result::Result<Resource, String> {
    let decoded = match kind {
        Kind::Workspace => serde_yaml::from_value(value).map(Resource::Workspace),
        Kind::Provider => serde_yaml::from_value(value).map(Resource::Provider),
        Kind::Cluster => serde_yaml::from_value(value).map(Resource::Cluster),
        Kind::App => serde_yaml::from_value(value).map(Resource::App),
        Kind::Box => serde_yaml::from_value(value).map(Resource::Box),
        Kind::Defaults => serde_yaml::from_value(value).map(Resource::Defaults),
    };
    decoded.map_err(|err| format!("parsing {kind}: {err}"))
}

fn stamp(resource: &mut Resource, provenance: &Provenance) {
    let annotations = &mut resource.metadata_mut().annotations;
    annotations.insert(
        ANNOTATION_DOC_PATH.to_string(),
        provenance.path.display().to_string(),
    );
    annotations.insert(ANNOTATION_DOC_INDEX.to_string(), provenance.index.to_string());
}
