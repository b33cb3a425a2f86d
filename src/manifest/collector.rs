//! Collects the manifests of every deployment with Diego cells

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::bosh::Orchestrator;
use crate::error::ResultExt;
use crate::opsman::ControlPlane;
use crate::{Error, Result};

use super::{Manifest, Topology};

/// Source of the manifests a rotation operates on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Load the manifest of every rotatable deployment.
    ///
    /// Fails on the first deployment that can't be loaded; partial results
    /// are never returned.
    async fn rotatable_manifests(&self) -> Result<Vec<Manifest>>;
}

/// Lists deployments through BOSH and loads their manifests from Ops Manager
pub struct DeploymentCollector {
    control_plane: Arc<dyn ControlPlane>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl DeploymentCollector {
    /// Create a collector over the given collaborators
    pub fn new(control_plane: Arc<dyn ControlPlane>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            control_plane,
            orchestrator,
        }
    }

    async fn load(&self, deployment: &str) -> Result<Manifest> {
        let raw = self
            .control_plane
            .manifest(deployment)
            .await
            .context(format!("could not get bosh manifest for deployment {}", deployment))?;

        let director = self
            .control_plane
            .director_name()
            .await
            .context("could not get bosh director name")?;

        let manifest = Manifest::load(director, &raw)
            .context(format!("could not load manifest for deployment {}", deployment))?;

        // a deployment renamed between listing and fetching must not be rotated
        if manifest.deployment_name() != deployment {
            return Err(Error::configuration(
                deployment,
                format!(
                    "the manifest's deployment name didn't match, expected {} but got {}",
                    deployment,
                    manifest.deployment_name()
                ),
            ));
        }
        Ok(manifest)
    }
}

#[async_trait]
impl ManifestSource for DeploymentCollector {
    async fn rotatable_manifests(&self) -> Result<Vec<Manifest>> {
        let deployments = self
            .orchestrator
            .deployment_names()
            .await
            .context("could not get diego deployments from bosh")?;

        let mut manifests = Vec::new();
        for deployment in deployments {
            if Topology::classify(&deployment).is_err() {
                debug!(deployment = %deployment, "skipping deployment without diego cells");
                continue;
            }
            manifests.push(self.load(&deployment).await?);
        }

        info!(count = manifests.len(), "collected rotatable deployments");
        Ok(manifests)
    }
}
