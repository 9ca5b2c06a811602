use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::{
    package::{LOCK_FILE, MANIFEST_FILE, Manifest, remove_local_deps_from_lock},
    runtime::Runtime,
    transaction::{Transaction, UndoAction},
};

pub mod config;
mod paths;
mod prepare;

pub use config::{Config, DEFAULT_NPM, split_install_args};
pub use prepare::{PrepareReport, prepare_dependencies};

use paths::{rebase_file_reference, staging_dir};

/// Exit status used when a run is interrupted.
pub const INTERRUPTED_EXIT_CODE: i32 = 1;

/// Install the target directory with every local dependency replaced by a
/// packed archive.
///
/// Every manifest and lock file touched during the run is restored before this
/// returns, whether the install succeeded or not. Ctrl-C triggers the same
/// rollback and then exits the process.
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime + 'static>(runtime: Arc<R>, config: Config) -> Result<()> {
    preflight(runtime.as_ref(), &config)?;

    let transaction = Arc::new(Transaction::new());

    // Register Ctrl-C handler
    let ctrl_c_handler = {
        let runtime = Arc::clone(&runtime);
        let transaction = Arc::clone(&transaction);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, rolling back...");
                let code = on_interrupt(runtime.as_ref(), &transaction).await;
                std::process::exit(code);
            }
        })
    };

    let result = run(runtime.as_ref(), &transaction, &config).await;

    ctrl_c_handler.abort();
    transaction.undo(runtime.as_ref()).await;

    result.context("Link install failed")
}

/// Roll back everything registered on `transaction` and return the exit
/// status the process should terminate with.
pub async fn on_interrupt<R: Runtime>(runtime: &R, transaction: &Transaction) -> i32 {
    transaction.undo(runtime).await;
    INTERRUPTED_EXIT_CODE
}

/// Checks that need no rollback: nothing has been modified yet when they fail.
fn preflight<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    if !runtime.is_dir(&config.target_dir) {
        anyhow::bail!("Directory {} does not exist", config.target_dir.display());
    }
    ensure_manifest_files(runtime, config)
}

/// Bring a manifest and lock file into the target directory from the current
/// directory when the target has none.
fn ensure_manifest_files<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    let lock_path = config.lock_path();
    let cwd_lock = config.current_dir_file(LOCK_FILE);
    if !runtime.exists(&lock_path) && runtime.exists(&cwd_lock) {
        info!("Copy {} from current directory", LOCK_FILE);
        runtime
            .copy(&cwd_lock, &lock_path)
            .with_context(|| format!("Failed to copy {:?}", cwd_lock))?;
    }

    let manifest_path = config.manifest_path();
    if runtime.exists(&manifest_path) {
        return Ok(());
    }

    let cwd_manifest = config.current_dir_file(MANIFEST_FILE);
    if config.installs_in_current_dir() || !runtime.exists(&cwd_manifest) {
        anyhow::bail!("{} file does not exist in {}", MANIFEST_FILE, config.target_dir.display());
    }

    info!("{} does not exist in the install directory, copy from current directory", MANIFEST_FILE);
    let mut manifest = Manifest::load(runtime, &cwd_manifest)?;
    manifest.rewrite_local_dependencies(|local| {
        rebase_file_reference(&config.current_dir, &config.target_dir, local)
    });
    manifest.save(runtime, &manifest_path)
}

async fn run<R: Runtime>(runtime: &R, transaction: &Transaction, config: &Config) -> Result<()> {
    let manifest_path = config.manifest_path();
    let lock_path = config.lock_path();

    let original_manifest = runtime.read_to_string(&manifest_path)?;
    transaction.add(UndoAction::restore_file(&manifest_path, original_manifest));
    if runtime.exists(&lock_path) {
        let original_lock = runtime.read_to_string(&lock_path)?;
        transaction.add(UndoAction::restore_file(&lock_path, original_lock));
    }

    let staging_dir = staging_dir(&config.target_dir)?;
    runtime.create_dir_all(&staging_dir)?;
    transaction.add(UndoAction::remove_path(&staging_dir));

    let report =
        prepare_dependencies(runtime, transaction, &manifest_path, &staging_dir, &config.npm)
            .await?;
    if !report.failed.is_empty() {
        warn!(
            "Could not pack {}; they stay referenced by local path",
            report.failed.join(", ")
        );
    }

    remove_local_deps_from_lock(runtime, &lock_path)?;

    println!("  installing {}", config.target_dir.display());
    let mut args = vec!["install".to_string()];
    args.extend(config.installer_args.iter().cloned());
    runtime
        .run_command(&config.npm, &args, &config.target_dir)
        .await
        .context("Install command failed")
}
