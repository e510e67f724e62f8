//! Resolution of Defaults `komPath` entries
//!
//! Entries are local paths relative to the app file's directory. Every entry
//! must resolve, symlinks included, inside the base root: the nearest
//! ancestor holding `.git` or `.kompoxroot`, else the parent of the app
//! file's directory. Directories are expanded to their `.yml`/`.yaml` files,
//! skipping tool and dependency directories, within fixed limits.

use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Most files a komPath expansion may yield
pub const MAX_FILES: usize = 5000;

/// Largest combined size of all expanded files (32 MiB)
pub const MAX_TOTAL_SIZE: u64 = 32 * 1024 * 1024;

/// Deepest directory level scanned below a komPath directory
pub const MAX_DEPTH: usize = 10;

/// Directory names never scanned
pub const IGNORED_COMPONENTS: [&str; 8] = [
    ".git",
    ".github",
    "node_modules",
    "vendor",
    ".direnv",
    ".venv",
    "dist",
    "build",
];

/// Markers that make a directory the base root
const ROOT_MARKERS: [&str; 2] = [".git", ".kompoxroot"];

/// Expand `entries` into the files to load, in order and without repeats.
///
/// `max_file_size` bounds every single file.
pub fn expand(entries: &[String], app_dir: &Path, max_file_size: u64) -> Result<Vec<PathBuf>> {
    let app_dir = std::path::absolute(app_dir)
        .with_context(|| format!("Failed to resolve {}", app_dir.display()))?;
    let base_root = find_base_root(&app_dir);
    let base_root = std::fs::canonicalize(&base_root).unwrap_or(base_root);
    tracing::debug!(base_root = %base_root.display(), "Resolving komPath entries");

    let mut scan = Scan::new(max_file_size);
    for entry in entries {
        let path = resolve(entry, &app_dir, &base_root)?;
        if path.is_dir() {
            scan.directory(&path, &base_root)
                .with_context(|| format!("Failed to scan komPath {entry:?}"))?;
        } else {
            scan.file(path)?;
        }
    }
    Ok(scan.files)
}

/// Nearest ancestor of `dir` (itself included) holding a root marker
fn find_base_root(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|candidate| ROOT_MARKERS.iter().any(|m| candidate.join(m).exists()))
        .or_else(|| dir.parent())
        .unwrap_or(dir)
        .to_path_buf()
}

/// Resolve one entry to a canonical path inside `base_root`
fn resolve(entry: &str, app_dir: &Path, base_root: &Path) -> Result<PathBuf> {
    if entry.contains("://") {
        bail!("komPath {entry:?}: URLs are not supported");
    }

    let joined = app_dir.join(entry);
    let real = std::fs::canonicalize(&joined)
        .with_context(|| format!("komPath {entry:?}: cannot resolve {}", joined.display()))?;
    if !real.starts_with(base_root) {
        bail!(
            "komPath {entry:?} resolves to {} outside base root {}",
            real.display(),
            base_root.display()
        );
    }

    if real.is_file() && !has_yaml_extension(&real) {
        bail!("komPath {entry:?}: file must have a .yml or .yaml extension");
    }
    Ok(real)
}

fn has_yaml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yml" || ext == "yaml")
}

fn is_ignored(name: &str) -> bool {
    IGNORED_COMPONENTS.contains(&name)
}

/// Running totals of one expansion
struct Scan {
    files: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
    total_size: u64,
    max_file_size: u64,
}

impl Scan {
    fn new(max_file_size: u64) -> Self {
        Self {
            files: Vec::new(),
            seen: HashSet::new(),
            total_size: 0,
            max_file_size,
        }
    }

    fn directory(&mut self, dir: &Path, base_root: &Path) -> Result<()> {
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_str().is_some_and(is_ignored)
            });

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() {
                if entry.depth() > MAX_DEPTH {
                    bail!(
                        "maximum directory depth ({MAX_DEPTH}) exceeded at {}",
                        entry.path().display()
                    );
                }
                continue;
            }
            if !entry.file_type().is_file() || !has_yaml_extension(entry.path()) {
                continue;
            }

            let real = std::fs::canonicalize(entry.path())
                .with_context(|| format!("Failed to resolve {}", entry.path().display()))?;
            if !real.starts_with(base_root) {
                bail!(
                    "{} links to {} outside base root {}",
                    entry.path().display(),
                    real.display(),
                    base_root.display()
                );
            }
            self.file(real)?;
        }
        Ok(())
    }

    fn file(&mut self, path: PathBuf) -> Result<()> {
        if self.seen.contains(&path) {
            return Ok(());
        }

        let size = std::fs::metadata(&path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if self.files.len() >= MAX_FILES {
            bail!("maximum file count ({MAX_FILES}) exceeded");
        }
        if size > self.max_file_size {
            bail!(
                "{} exceeds maximum size ({} bytes)",
                path.display(),
                self.max_file_size
            );
        }
        if self.total_size + size > MAX_TOTAL_SIZE {
            bail!("total size limit ({MAX_TOTAL_SIZE} bytes) exceeded");
        }

        self.total_size += size;
        self.seen.insert(path.clone());
        self.files.push(path);
        Ok(())
    }
}
