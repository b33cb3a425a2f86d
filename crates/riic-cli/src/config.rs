//! Operator configuration and environment guards
//!
//! Credentials come from flags or their `RIIC_*` environment variables. The
//! password and decryption passphrase have no short flags; setting them in
//! the environment keeps them out of the shell history.

use std::path::Path;

use clap::Args;
use riic::opsman::OpsManConfig;

use crate::{Error, Result};

/// Present only on the Operations Manager VM
pub const TEMPEST_WORKSPACES: &str = "/var/tempest/workspaces";

/// Operations Manager as seen from its own VM
pub const DEFAULT_OPSMAN_URL: &str = "https://127.0.0.1";

/// `cf` minor versions this tool knows how to rotate
const SUPPORTED_CF_MINORS: [&str; 3] = ["4", "5", "6"];

/// Flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// The Operations Manager username
    #[arg(short = 'u', long, env = "RIIC_USERNAME", global = true)]
    pub username: Option<String>,

    /// The Operations Manager password
    #[arg(long, env = "RIIC_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// The Operations Manager decryption passphrase
    #[arg(
        long,
        env = "RIIC_DECRYPTION_PASSPHRASE",
        hide_env_values = true,
        global = true
    )]
    pub decryption_passphrase: Option<String>,

    /// Use client ID/secret instead of password auth
    #[arg(short = 'c', long, env = "RIIC_USE_CLIENT_SECRET", global = true)]
    pub use_client_secret: bool,

    /// Bypass checks that verify we're running on Operations Manager
    #[arg(short = 'x', long, env = "RIIC_RUN_EXTERNALLY", hide = true, global = true)]
    pub run_externally: bool,

    /// Operations Manager URL
    #[arg(
        long,
        env = "RIIC_OPSMAN_URL",
        default_value = DEFAULT_OPSMAN_URL,
        hide = true,
        global = true
    )]
    pub opsman_url: String,
}

impl GlobalArgs {
    /// Connection settings, failing if any credential is missing or blank.
    pub fn opsman_config(&self) -> Result<OpsManConfig> {
        Ok(OpsManConfig {
            url: self.opsman_url.clone(),
            username: required(
                &self.username,
                "Operations Manager Username",
                "--username",
                "RIIC_USERNAME",
            )?,
            password: required(
                &self.password,
                "Operations Manager Password",
                "--password",
                "RIIC_PASSWORD",
            )?,
            decryption_passphrase: required(
                &self.decryption_passphrase,
                "Operations Manager Decryption Passphrase",
                "--decryption-passphrase",
                "RIIC_DECRYPTION_PASSPHRASE",
            )?,
            use_client_secret: self.use_client_secret,
        })
    }

    /// Refuse to run away from the Operations Manager VM unless told to
    pub fn ensure_on_opsman(&self) -> Result<()> {
        if self.run_externally {
            return Ok(());
        }
        ensure_workspace(Path::new(TEMPEST_WORKSPACES))
    }
}

fn required(value: &Option<String>, what: &str, flag: &str, env: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::validation(format!(
            "the {} is not set. Please set it via the flag ({}) or environment variable ({})",
            what, flag, env
        ))),
    }
}

fn ensure_workspace(workspace: &Path) -> Result<()> {
    if workspace.is_dir() {
        Ok(())
    } else {
        Err(Error::validation(
            "This tool must run on the Operations Manager VM.",
        ))
    }
}

/// Accept only `cf` 2.4.x, 2.5.x and 2.6.x.
pub fn check_cf_version(version: &str) -> Result<()> {
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some("2"), Some(minor)) if SUPPORTED_CF_MINORS.contains(&minor) => Ok(()),
        _ => Err(Error::validation(format!("invalid cf version {}", version))),
    }
}
