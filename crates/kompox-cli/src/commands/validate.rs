//! Validate resource definitions command

use anyhow::{Context, Result, bail};
use kompox_core::{Kind, Repositories, Sink};

use crate::sources::Sources;

/// Run the validate command
pub async fn run(sources: &Sources) -> Result<()> {
    let loaded = sources.load()?;

    if loaded.result.has_errors() {
        for err in &loaded.result.errors {
            eprintln!("  - {err}");
        }
        bail!(
            "{} document(s) could not be loaded",
            loaded.result.errors.len()
        );
    }

    let sink = Sink::new(loaded.result.documents).context("Resource validation failed")?;

    // Dry run: project into throwaway in-memory repositories
    let repos = Repositories::in_memory();
    sink.to_models(&repos, loaded.primary.as_deref())
        .await
        .context("Resource projection failed")?;

    println!("✓ {} resources are valid", sink.count());
    for kind in Kind::HIERARCHY {
        let count = sink.fqns(kind).len();
        if count > 0 {
            println!("  {kind}: {count}");
        }
    }
    if let Some(app) = &loaded.default_app {
        if sink.app(app).is_some() {
            println!("Default app: {app}");
        } else {
            bail!("Default app {app} is not defined");
        }
    }
    Ok(())
}
