//! Lock file rewriting.
//!
//! Once local dependencies are replaced by packed archives, any lock entry still
//! pointing at the local directory would make npm resolve the old path again.
//! Those entries are dropped before the install runs.

use anyhow::{Context, Result};
use log::debug;
use serde_json::{Map, Value};
use std::path::Path;

use super::local::{is_local_version, resolve_local_version};
use super::manifest::{DependencyKind, to_pretty_json};
use crate::runtime::Runtime;

/// Remove local-path entries from the lock file at `lock_path`.
///
/// Returns the number of removed entries; an absent lock file removes nothing.
#[tracing::instrument(skip(runtime))]
pub fn remove_local_deps_from_lock<R: Runtime>(runtime: &R, lock_path: &Path) -> Result<usize> {
    if !runtime.exists(lock_path) {
        debug!("No lock file at {:?}", lock_path);
        return Ok(0);
    }

    let content = runtime.read_to_string(lock_path)?;
    let mut lock: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse lock file {:?}", lock_path))?;
    let Value::Object(doc) = &mut lock else {
        anyhow::bail!("Lock file {:?} is not a JSON object", lock_path);
    };

    let removed = remove_local_entries(doc);
    debug!("Removed {} local entries from {:?}", removed, lock_path);

    runtime
        .write(lock_path, to_pretty_json(&lock)?.as_bytes())
        .with_context(|| format!("Failed to write lock file {:?}", lock_path))?;
    Ok(removed)
}

fn remove_local_entries(doc: &mut Map<String, Value>) -> usize {
    let mut removed = 0;

    // lockfileVersion 1: { "dependencies": { "<name>": { "version": "file:../b" } } }
    for kind in DependencyKind::ALL {
        if let Some(Value::Object(entries)) = doc.get_mut(kind.field()) {
            let before = entries.len();
            entries.retain(|_, info| {
                !info
                    .get("version")
                    .and_then(Value::as_str)
                    .is_some_and(is_local_version)
            });
            removed += before - entries.len();
        }
    }

    // lockfileVersion 2/3: { "packages": { "": {...}, "node_modules/b": { "link": true }, "../b": {...} } }
    if let Some(Value::Object(packages)) = doc.get_mut("packages") {
        let before = packages.len();
        packages.retain(|key, info| {
            let linked = info.get("link").and_then(Value::as_bool).unwrap_or(false);
            !linked && resolve_local_version(key).is_none()
        });
        removed += before - packages.len();

        if let Some(Value::Object(root)) = packages.get_mut("") {
            for kind in DependencyKind::ALL {
                if let Some(Value::Object(deps)) = root.get_mut(kind.field()) {
                    let before = deps.len();
                    deps.retain(|_, version| !version.as_str().is_some_and(is_local_version));
                    removed += before - deps.len();
                }
            }
        }
    }

    removed
}
