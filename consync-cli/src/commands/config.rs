//! `consync config init|show`

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use consync_core::config::{self, config_path_at, PASSWORD_ENV};
use consync_core::Config;

use super::home;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a starter config to ~/.consync/config.yaml.
    Init(ConfigInitArgs),
    /// Print the effective config with the password masked.
    Show,
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Base URL of the remote CRM API, e.g. https://crm.example.com
    #[arg(long)]
    pub base_url: String,

    /// API login name.
    #[arg(long)]
    pub username: String,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = home()?;

    match command {
        ConfigCommand::Init(args) => {
            let path = config_path_at(&home);
            if path.exists() && !args.force {
                bail!(
                    "config already exists at {}; pass --force to overwrite",
                    path.display()
                );
            }
            let config = Config::template(&args.base_url, &args.username);
            config.validate().context("invalid config values")?;
            let path = config::save_at(&home, &config).context("failed to write config")?;

            println!("✓ Wrote {}", path.display());
            println!("  Set api.password in the file or export {PASSWORD_ENV}.");
        }
        ConfigCommand::Show => {
            let mut config = config::load_at(&home).context("failed to load config")?;
            if !config.api.password.is_empty() {
                config.api.password = "********".to_string();
            }
            let yaml = serde_yaml::to_string(&config).context("failed to render config")?;
            println!("# {}", config_path_at(&home).display());
            print!("{yaml}");
        }
    }

    Ok(())
}
