use anyhow::Result;
use clap::Parser;
use link_install::install::{Config, DEFAULT_NPM, install};
use link_install::runtime::RealRuntime;
use std::sync::Arc;

/// link-install - install a package with its local dependencies packed
///
/// Every `file:` dependency is packed into an archive and the install runs
/// against those archives, so the result matches what a registry install
/// would produce. All touched package.json and package-lock.json files are
/// restored afterwards.
///
/// Examples:
///   link-install                       # Install the current directory
///   link-install ../app --production   # Install ../app, forwarding --production
#[derive(Parser, Debug)]
#[command(author, version = env!("LINK_INSTALL_VERSION"), about)]
struct Cli {
    /// Package manager executable used for pack and install (also via LINK_INSTALL_NPM)
    #[arg(long = "npm", env = "LINK_INSTALL_NPM", default_value = DEFAULT_NPM, value_name = "PROGRAM")]
    npm: String,

    /// Target directory followed by arguments forwarded to `npm install`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let config = Config::new(&runtime, cli.args, cli.npm)?;
    install(Arc::new(runtime), config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_no_args() {
        let cli = Cli::try_parse_from(["link-install"]).unwrap();
        assert!(cli.args.is_empty());
    }

    #[test]
    fn test_cli_target_and_installer_args() {
        let cli =
            Cli::try_parse_from(["link-install", "../app", "--production", "--no-audit"]).unwrap();
        assert_eq!(cli.args, vec!["../app", "--production", "--no-audit"]);
    }

    #[test]
    fn test_cli_npm_override() {
        let cli = Cli::try_parse_from(["link-install", "--npm", "/usr/bin/pnpm", "app"]).unwrap();
        assert_eq!(cli.npm, "/usr/bin/pnpm");
        assert_eq!(cli.args, vec!["app"]);
    }

    #[test]
    fn test_cli_flags_after_target_are_forwarded() {
        let cli = Cli::try_parse_from(["link-install", "app", "--npm", "yarn"]).unwrap();
        assert_eq!(cli.args, vec!["app", "--npm", "yarn"]);
    }
}
