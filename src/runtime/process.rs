//! External command execution.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use tokio::process::Command;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) async fn run_command_impl(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<()> {
        info!("Executing command {} {} in {:?}", program, args.join(" "), cwd);
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .status()
            .await
            .with_context(|| format!("Failed to spawn {}", program))?;

        if !status.success() {
            anyhow::bail!(
                "Command `{} {}` failed in {:?} with {}",
                program,
                args.join(" "),
                cwd,
                status
            );
        }
        Ok(())
    }
}
