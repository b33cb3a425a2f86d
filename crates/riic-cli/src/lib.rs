//! riic CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use crate::commands::Platform;
use crate::config::GlobalArgs;

/// riic rotates Diego instance-identity certificates
#[derive(Parser, Debug)]
#[command(name = "riic")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "To run non-interactively set the $RIIC_PASSWORD and $RIIC_DECRYPTION_PASSPHRASE environment variables"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the certificate expiration date
    CheckExpiry,
    /// Perform the certificate rotation
    Rotate(commands::rotate::RotateArgs),
    /// Validate that the certs in CredHub match what's deployed to VMs
    Validate,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let opsman = self.global.opsman_config()?;
        self.global.ensure_on_opsman()?;
        let platform = Platform::connect(opsman).await?;

        match self.command {
            Commands::CheckExpiry => commands::check_expiry::run(&platform).await,
            Commands::Rotate(args) => commands::rotate::run(args, &platform).await,
            Commands::Validate => commands::validate::run(&platform).await,
        }
    }
}
