//! Rucio connection settings from flags, environment and config file.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use urc_rucio::RucioConfig;

/// Rucio connection flags.
///
/// Flags and their environment variables override values from `--rucio-config`.
#[derive(Args, Debug, Default)]
pub struct RucioArgs {
    /// TOML file with Rucio connection settings.
    #[arg(long, value_name = "TOML")]
    pub rucio_config: Option<PathBuf>,

    /// Rucio server URL.
    #[arg(long, env = "RUCIO_HOST")]
    pub rucio_host: Option<String>,

    /// Rucio authentication server URL (default: the server URL).
    #[arg(long, env = "RUCIO_AUTH_HOST")]
    pub rucio_auth_host: Option<String>,

    /// Rucio account.
    #[arg(long, env = "RUCIO_ACCOUNT")]
    pub rucio_account: Option<String>,

    /// Pre-issued auth token.
    #[arg(long, env = "RUCIO_AUTH_TOKEN", hide_env_values = true)]
    pub rucio_token: Option<String>,

    /// Username for userpass authentication.
    #[arg(long, env = "RUCIO_USERNAME")]
    pub rucio_username: Option<String>,

    /// Password for userpass authentication.
    #[arg(long, env = "RUCIO_PASSWORD", hide_env_values = true)]
    pub rucio_password: Option<String>,
}

impl RucioArgs {
    /// Merge file and flag settings into a validated configuration.
    pub fn resolve(&self) -> Result<RucioConfig> {
        let mut config = match (&self.rucio_config, &self.rucio_host) {
            (Some(path), _) => RucioConfig::from_file(path)
                .with_context(|| format!("loading Rucio configuration {}", path.display()))?,
            (None, Some(host)) => RucioConfig::new(host.clone()),
            (None, None) => {
                bail!("no Rucio server configured: pass --rucio-config or --rucio-host (RUCIO_HOST)")
            }
        };

        if let Some(host) = &self.rucio_host {
            config.host.clone_from(host);
        }
        overlay(&mut config.auth_host, self.rucio_auth_host.as_ref());
        overlay(&mut config.account, self.rucio_account.as_ref());
        overlay(&mut config.auth_token, self.rucio_token.as_ref());
        overlay(&mut config.username, self.rucio_username.as_ref());
        overlay(&mut config.password, self.rucio_password.as_ref());

        config.validate().context("invalid Rucio configuration")?;
        Ok(config)
    }
}

fn overlay(slot: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}
