//! Rotate command

use clap::Args;
use riic::rotate::CertRotator;

use super::Platform;
use crate::{Error, Result};

const BANNER: &str = r"       O O
  _ __ _ _  ___
 | '__| | |/ __|
 | |  | | | (__
 |_|  |_|_|\___|
";

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// Specify the starting point (bosh|credhub|apply|cleanup)
    #[arg(long, default_value = "bosh", hide = true)]
    pub start_phase: String,
}

pub async fn run(args: RotateArgs, platform: &Platform) -> Result<()> {
    println!("{}", BANNER);

    let rotator = CertRotator::new(
        platform.control_plane(),
        platform.orchestrator(),
        platform.secrets(),
        platform.manifests(),
        platform.agent_verifier(),
        platform.proxy_verifier(),
    );
    rotator
        .rotate(&args.start_phase)
        .await
        .map_err(Error::Rotation)?;

    println!("\n\nFinished rotating certs\n");
    Ok(())
}
