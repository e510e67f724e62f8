//! Where resource documents come from
//!
//! Paths are taken from the command line or `KOMPOX_CRD_PATH`. The primary
//! app file (`--app` or `KOMPOX_CRD_APP`) is loaded last; when no paths are
//! given, the `komPath` entries of its Defaults document are used instead,
//! resolved against the app file's directory and confined to its base root
//! (see [`crate::kom`]).

use anyhow::{Context, Result, bail};
use clap::Args;
use kompox_core::loader::DEFAULT_MAX_FILE_SIZE;
use kompox_core::{Fqn, Kind, LoadResult, Loader};
use std::path::{Path, PathBuf};

use crate::kom;

/// Resource sources shared by every command
#[derive(Args, Debug, Clone)]
pub struct Sources {
    /// Resource files or directories
    #[arg(env = "KOMPOX_CRD_PATH", value_delimiter = ',')]
    pub paths: Vec<PathBuf>,

    /// Primary app file; only its apps may refer to local files
    #[arg(long, env = "KOMPOX_CRD_APP")]
    pub app: Option<PathBuf>,

    /// Largest accepted resource file in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,
}

/// Everything loaded for one command
#[derive(Debug)]
pub struct Loaded {
    /// Documents and collected per-document errors
    pub result: LoadResult,
    /// The primary app file, if one was given
    pub primary: Option<PathBuf>,
    /// App used when a command needs one and none is named
    pub default_app: Option<Fqn>,
}

impl Sources {
    /// Load every source; fatal loader errors abort.
    pub fn load(&self) -> Result<Loaded> {
        let loader = Loader::new().with_max_file_size(self.max_file_size);

        let app_result = match &self.app {
            Some(app) => Some(
                loader
                    .load(app)
                    .with_context(|| format!("Failed to load app file {}", app.display()))?,
            ),
            None => None,
        };

        let mut paths = self.paths.clone();
        if paths.is_empty()
            && let (Some(app), Some(app_result)) = (&self.app, &app_result)
        {
            paths = kom_paths(app, app_result, self.max_file_size)?;
        }
        if paths.is_empty() && app_result.is_none() {
            bail!("No resource paths given (pass PATHS, set KOMPOX_CRD_PATH or use --app)");
        }

        let mut result = LoadResult::default();
        for path in &paths {
            if self.app.as_deref().is_some_and(|app| same_path(app, path)) {
                continue;
            }
            tracing::debug!("Loading {}", path.display());
            let loaded = loader
                .load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            result.extend(loaded);
        }

        let default_app = app_result.as_ref().and_then(default_app);
        if let Some(app_result) = app_result {
            result.extend(app_result);
        }

        Ok(Loaded {
            result,
            primary: self.app.clone(),
            default_app,
        })
    }
}

/// Files named by the `komPath` entries of the app file's Defaults
fn kom_paths(app: &Path, app_result: &LoadResult, max_file_size: u64) -> Result<Vec<PathBuf>> {
    let entries: Vec<String> = app_result
        .defaults()
        .flat_map(|d| d.spec.kom_path.iter().cloned())
        .collect();
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let app_dir = app
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    kom::expand(&entries, app_dir, max_file_size).context("Invalid Defaults.spec.komPath")
}

/// Defaults `appId`, else the only App defined in the app file
fn default_app(app_result: &LoadResult) -> Option<Fqn> {
    if let Some(id) = app_result
        .defaults()
        .map(|d| d.spec.app_id.as_str())
        .find(|id| !id.is_empty())
    {
        return Fqn::parse(id)
            .ok()
            .filter(|(_, kind)| *kind == Kind::App)
            .map(|(fqn, _)| fqn);
    }

    let mut apps = app_result
        .documents
        .iter()
        .filter(|doc| doc.kind() == Kind::App);
    match (apps.next(), apps.next()) {
        (Some(only), None) => Some(only.fqn.clone()),
        _ => None,
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| std::fs::canonicalize(p).or_else(|_| std::path::absolute(p));
    match (resolve(a), resolve(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
