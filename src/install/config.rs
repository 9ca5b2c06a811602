use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::{
    package::{LOCK_FILE, MANIFEST_FILE},
    runtime::{Runtime, resolve_against},
};

/// Default package-manager executable.
pub const DEFAULT_NPM: &str = "npm";

/// Settings of one link-install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Absolute directory the install runs in.
    pub target_dir: PathBuf,
    /// Fallback source for a missing manifest or lock file.
    pub current_dir: PathBuf,
    /// Executable used for both `pack` and `install`.
    pub npm: String,
    /// Arguments appended to `npm install`.
    pub installer_args: Vec<String>,
}

impl Config {
    pub fn new<R: Runtime>(runtime: &R, args: Vec<String>, npm: String) -> Result<Self> {
        let current_dir = runtime.current_dir()?;
        let (target, installer_args) = split_install_args(args);
        let target_dir = match target {
            Some(target) => resolve_against(&current_dir, &target),
            None => current_dir.clone(),
        };
        debug!("Target directory {:?}, installer args {:?}", target_dir, installer_args);

        Ok(Self {
            target_dir,
            current_dir,
            npm,
            installer_args,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.target_dir.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.target_dir.join(LOCK_FILE)
    }

    pub fn installs_in_current_dir(&self) -> bool {
        self.target_dir == self.current_dir
    }

    pub fn current_dir_file(&self, name: &str) -> PathBuf {
        self.current_dir.join(name)
    }
}

/// Split raw arguments into the optional target directory and the arguments
/// forwarded to the installer. The first argument is the target directory
/// unless it starts with `--`.
pub fn split_install_args(mut args: Vec<String>) -> (Option<PathBuf>, Vec<String>) {
    match args.first() {
        Some(first) if !first.starts_with("--") => {
            let target = PathBuf::from(args.remove(0));
            (Some(target), args)
        }
        _ => (None, args),
    }
}
