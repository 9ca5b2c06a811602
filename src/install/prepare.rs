//! Packing local dependencies and pointing the root manifest at the archives.

use anyhow::{Context, Result};
use futures_util::future::join_all;
use log::{debug, error};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{
    package::{DependencyGraph, DependencyKind, Manifest, PackageNode},
    runtime::Runtime,
    transaction::{Transaction, UndoAction},
};

/// What happened to each local dependency during [`prepare_dependencies`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    /// Dependencies whose archive is staged and referenced from the root manifest.
    pub packaged: Vec<String>,
    /// Dependencies whose manifest disappeared before packing.
    pub skipped: Vec<String>,
    /// Dependencies that failed to pack and stay referenced by local path.
    pub failed: Vec<String>,
}

enum Outcome {
    Packaged,
    Skipped,
    Failed,
}

/// Pack every local dependency reachable from `manifest_path` and rewrite the
/// root manifest to reference the staged archives.
///
/// Dependencies are packed concurrently. A dependency that fails to pack is
/// logged and left unrewritten. Every dependency manifest touched here is
/// registered for restoration on `transaction`; interim archives are removed
/// before this returns, so only the copies under `staging_dir` remain.
#[tracing::instrument(skip(runtime, transaction))]
pub async fn prepare_dependencies<R: Runtime>(
    runtime: &R,
    transaction: &Transaction,
    manifest_path: &Path,
    staging_dir: &Path,
    npm: &str,
) -> Result<PrepareReport> {
    let root = Manifest::load(runtime, manifest_path)?;
    let graph = DependencyGraph::build(runtime, manifest_path)?;
    let dependencies = graph.dependencies_of(&graph.root().name);

    let names: Vec<&str> = dependencies.iter().map(|n| n.name.as_str()).collect();
    if names.is_empty() {
        println!("       found no local dependencies");
    } else {
        println!("       found {}", names.join(", "));
    }

    let root = Mutex::new(root);
    let outcomes = join_all(dependencies.iter().map(|node| {
        prepare_dependency(runtime, transaction, node, staging_dir, npm, &root)
    }))
    .await;

    let mut report = PrepareReport::default();
    for (node, outcome) in dependencies.iter().zip(outcomes) {
        let bucket = match outcome {
            Outcome::Packaged => &mut report.packaged,
            Outcome::Skipped => &mut report.skipped,
            Outcome::Failed => &mut report.failed,
        };
        bucket.push(node.name.clone());
    }

    root.into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .save(runtime, manifest_path)?;

    Ok(report)
}

async fn prepare_dependency<R: Runtime>(
    runtime: &R,
    transaction: &Transaction,
    node: &PackageNode,
    staging_dir: &Path,
    npm: &str,
    root: &Mutex<Manifest>,
) -> Outcome {
    println!("   preparing {}", node.name);
    if !runtime.exists(&node.manifest_path) {
        println!("     skipped {}: {} does not exist", node.name, node.manifest_path.display());
        return Outcome::Skipped;
    }

    let content = match runtime.read_to_string(&node.manifest_path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to prepare {}: {:?}", node.name, e);
            return Outcome::Failed;
        }
    };
    transaction.add(UndoAction::restore_file(&node.manifest_path, content.as_str()));

    let scope = transaction.nested();
    let result = pack_into_staging(runtime, &scope, node, &content, staging_dir, npm).await;
    let outcome = match result {
        Ok(archive) => {
            let kind = node.kind.unwrap_or(DependencyKind::Runtime);
            root.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_dependency(kind, &node.name, archive.to_string_lossy());
            println!("      packed {} {}", node.name, archive.display());
            Outcome::Packaged
        }
        Err(e) => {
            error!("Failed to prepare {}: {:?}", node.name, e);
            Outcome::Failed
        }
    };

    // Restores the stripped manifest and drops the archive left next to the sources.
    scope.undo(runtime).await;
    outcome
}

async fn pack_into_staging<R: Runtime>(
    runtime: &R,
    scope: &Transaction,
    node: &PackageNode,
    content: &str,
    staging_dir: &Path,
    npm: &str,
) -> Result<PathBuf> {
    let manifest = Manifest::parse(content)
        .with_context(|| format!("Failed to parse manifest {:?}", node.manifest_path))?;
    let archive_name = manifest.archive_file_name()?;
    let package_dir = node.dir();

    let mut stripped = manifest;
    let removed = stripped.remove_local_dependencies();
    debug!("Stripped {} local reference(s) from {}", removed, node.name);
    scope.add(UndoAction::restore_file(&node.manifest_path, content));
    stripped.save(runtime, &node.manifest_path)?;

    let packed = package_dir.join(&archive_name);
    scope.add(UndoAction::remove_path(&packed));

    runtime
        .run_command(npm, &["pack".to_string()], package_dir)
        .await
        .with_context(|| format!("Failed to pack {}", node.name))?;

    let staged_dir = staging_dir.join(&node.name);
    runtime.create_dir_all(&staged_dir)?;
    let staged = staged_dir.join(&archive_name);
    debug!("Moving {:?} to {:?}", packed, staged);
    runtime.move_file(&packed, &staged)?;

    Ok(staged)
}
