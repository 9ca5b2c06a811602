pub mod install;
pub mod package;
pub mod runtime;
pub mod transaction;

/// Test utilities shared by unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::package::{MANIFEST_FILE, Manifest};
    use crate::runtime::{RealRuntime, Runtime};
    use anyhow::{Context, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Create `<root>/<dir>/package.json` with `manifest` and return its path.
    pub fn write_package(root: &Path, dir: &str, manifest: &str) -> PathBuf {
        let pkg_dir = root.join(dir);
        fs::create_dir_all(&pkg_dir).unwrap();
        let path = pkg_dir.join(MANIFEST_FILE);
        fs::write(&path, manifest).unwrap();
        path
    }

    /// Snapshot of the target directory taken when `npm install` ran.
    #[derive(Debug, Clone)]
    pub struct InstallCall {
        pub cwd: PathBuf,
        pub args: Vec<String>,
        pub manifest: String,
        pub lock: Option<String>,
    }

    /// Runtime backed by the real filesystem with a scripted `npm`.
    ///
    /// - `pack` writes `<name>-<version>.tgz` into the working directory; the
    ///   archive content is the manifest as it was at pack time.
    /// - `install` records an [`InstallCall`].
    #[derive(Default)]
    pub struct FakeNpmRuntime {
        fail_pack: HashSet<String>,
        fail_install: bool,
        fail_move: HashSet<String>,
        pack_dirs: Mutex<Vec<PathBuf>>,
        installs: Mutex<Vec<InstallCall>>,
    }

    impl FakeNpmRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        /// Packing fails in directories named after any of `dirs`.
        pub fn failing_pack(dirs: &[&str]) -> Self {
            Self {
                fail_pack: dirs.iter().map(|d| d.to_string()).collect(),
                ..Self::default()
            }
        }

        /// `pack` succeeds, but moving the archive out of any of `dirs` fails.
        pub fn failing_move(dirs: &[&str]) -> Self {
            Self {
                fail_move: dirs.iter().map(|d| d.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn failing_install() -> Self {
            Self {
                fail_install: true,
                ..Self::default()
            }
        }

        pub fn pack_dirs(&self) -> Vec<PathBuf> {
            self.pack_dirs.lock().unwrap().clone()
        }

        pub fn installs(&self) -> Vec<InstallCall> {
            self.installs.lock().unwrap().clone()
        }

        fn pack(&self, cwd: &Path) -> Result<()> {
            self.pack_dirs.lock().unwrap().push(cwd.to_path_buf());
            let dir_name = cwd
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.fail_pack.contains(&dir_name) {
                anyhow::bail!("npm pack failed in {:?}", cwd);
            }
            let content = fs::read_to_string(cwd.join(MANIFEST_FILE))?;
            let archive = Manifest::parse(&content)?.archive_file_name()?;
            fs::write(cwd.join(archive), content)?;
            Ok(())
        }

        fn install(&self, cwd: &Path, args: &[String]) -> Result<()> {
            let lock_path = cwd.join(crate::package::LOCK_FILE);
            self.installs.lock().unwrap().push(InstallCall {
                cwd: cwd.to_path_buf(),
                args: args.to_vec(),
                manifest: fs::read_to_string(cwd.join(MANIFEST_FILE))
                    .context("install without manifest")?,
                lock: fs::read_to_string(lock_path).ok(),
            });
            if self.fail_install {
                anyhow::bail!("npm install failed");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Runtime for FakeNpmRuntime {
        fn current_dir(&self) -> Result<PathBuf> {
            RealRuntime.current_dir()
        }

        fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
            RealRuntime.write(path, contents)
        }

        fn read_to_string(&self, path: &Path) -> Result<String> {
            RealRuntime.read_to_string(path)
        }

        fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
            RealRuntime.copy(from, to)
        }

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            RealRuntime.create_dir_all(path)
        }

        fn remove_file(&self, path: &Path) -> Result<()> {
            RealRuntime.remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> Result<()> {
            RealRuntime.remove_dir_all(path)
        }

        fn exists(&self, path: &Path) -> bool {
            RealRuntime.exists(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            RealRuntime.is_dir(path)
        }

        fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
            let source_dir = from
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.fail_move.contains(&source_dir) {
                anyhow::bail!("cannot move {:?}", from);
            }
            RealRuntime.move_file(from, to)
        }

        async fn run_command(&self, _program: &str, args: &[String], cwd: &Path) -> Result<()> {
            match args.first().map(String::as_str) {
                Some("pack") => self.pack(cwd),
                Some("install") => self.install(cwd, &args[1..]),
                other => anyhow::bail!("unexpected npm command {:?}", other),
            }
        }
    }
}
