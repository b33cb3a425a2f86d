//! Validate command

use riic::validate::InstanceScope;
use tracing::info;

use super::Platform;
use crate::Result;

/// Check every cell and router of every deployment against CredHub.
/// Any failure, mismatch or not, fails the command.
pub async fn run(platform: &Platform) -> Result<()> {
    let manifests = platform.manifests().rotatable_manifests().await?;
    let agent = platform.agent_verifier();
    let proxy = platform.proxy_verifier();

    for manifest in &manifests {
        agent.verify(manifest, InstanceScope::All).await?;
        proxy.verify(manifest, InstanceScope::All).await?;
        info!(deployment = %manifest.deployment_name(), "certificates match credhub");
    }
    Ok(())
}
