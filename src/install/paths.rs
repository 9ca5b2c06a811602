use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::runtime::{relative_path_from_dir, resolve_against};

/// Fresh staging directory path under `target_dir`: `tmp-<unix millis>`.
pub(crate) fn staging_dir(target_dir: &Path) -> Result<PathBuf> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_millis();
    Ok(target_dir.join(format!("tmp-{}", millis)))
}

/// Re-anchor a local reference written relative to `from_dir` so it resolves
/// to the same package from `to_dir`.
pub(crate) fn rebase_file_reference(from_dir: &Path, to_dir: &Path, local: &str) -> String {
    let package_dir = resolve_against(from_dir, Path::new(local));
    let reference = relative_path_from_dir(to_dir, &package_dir).unwrap_or(package_dir);
    format!("file:{}", reference.display())
}
