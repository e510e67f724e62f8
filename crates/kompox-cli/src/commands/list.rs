//! List resources command

use anyhow::{Context, Result, bail};
use kompox_core::{Fqn, Kind, Sink};

use crate::sources::Sources;

/// Run the list command
pub async fn run(
    sources: &Sources,
    kind: Option<Kind>,
    scope: Option<&str>,
    json: bool,
) -> Result<()> {
    if kind == Some(Kind::Defaults) {
        bail!("Defaults documents are not indexed; use one of Workspace, Provider, Cluster, App, Box");
    }
    let scope = scope
        .map(|s| Fqn::parse(s).map(|(fqn, _)| fqn))
        .transpose()
        .context("Invalid --scope")?;

    let loaded = sources.load()?;
    for err in &loaded.result.errors {
        tracing::warn!("{}", err);
    }
    let sink = Sink::new(loaded.result.documents).context("Resource validation failed")?;

    let kinds: Vec<Kind> = match kind {
        Some(kind) => vec![kind],
        None => Kind::HIERARCHY.to_vec(),
    };

    let mut rows = Vec::new();
    for kind in kinds {
        for fqn in sink.fqns(kind) {
            if scope.as_ref().is_some_and(|scope| !within(&fqn, scope)) {
                continue;
            }
            let source = sink
                .provenance(&fqn)
                .map(|p| p.to_string())
                .unwrap_or_default();
            rows.push((kind, fqn, source));
        }
    }

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(kind, fqn, source)| {
                serde_json::json!({
                    "kind": kind.as_str(),
                    "fqn": fqn.as_str(),
                    "source": source,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for (kind, fqn, source) in &rows {
            println!("{:<10} {:<40} {}", kind.as_str(), fqn.as_str(), source);
        }
    }

    Ok(())
}

/// True if `fqn` is `scope` or one of its descendants
fn within(fqn: &Fqn, scope: &Fqn) -> bool {
    fqn.segments().starts_with(&scope.segments())
}
