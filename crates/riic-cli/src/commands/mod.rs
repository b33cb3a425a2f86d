//! CLI commands

use std::sync::Arc;

use riic::bosh::{BoshCli, Orchestrator};
use riic::credhub::{CredhubCli, SecretsStore};
use riic::manifest::{DeploymentCollector, ManifestSource};
use riic::opsman::{ControlPlane, OpsManClient, OpsManConfig};
use riic::validate::{AgentVerifier, CertVerifier, ProxyVerifier};
use tracing::info;

use crate::config::check_cf_version;
use crate::{Error, Result};

pub mod check_expiry;
pub mod rotate;
pub mod validate;

/// Clients for the platform's control plane, orchestrator and secrets store.
///
/// The `bosh` and `credhub` CLIs authenticate with the director's command
/// line credentials, read from Ops Manager on connect.
pub struct Platform {
    opsman: Arc<OpsManClient>,
    bosh: Arc<BoshCli>,
    credhub: Arc<CredhubCli>,
}

impl Platform {
    /// Connect to Ops Manager, check the platform version and fetch director credentials
    pub async fn connect(config: OpsManConfig) -> Result<Self> {
        let opsman = Arc::new(OpsManClient::new(config)?);

        let version = opsman
            .deployed_product_version("cf")
            .await
            .map_err(|e| Error::command_failed(format!("couldn't check cf version: {}", e)))?;
        check_cf_version(&version)?;
        info!(version = %version, "found supported cf version");

        let env = opsman.director_credentials().await.map_err(|e| {
            Error::command_failed(format!("could not get director credentials: {}", e))
        })?;

        Ok(Self {
            opsman,
            bosh: Arc::new(BoshCli::new(env.clone())),
            credhub: Arc::new(CredhubCli::new(env)),
        })
    }

    pub fn control_plane(&self) -> Arc<dyn ControlPlane> {
        self.opsman.clone()
    }

    pub fn orchestrator(&self) -> Arc<dyn Orchestrator> {
        self.bosh.clone()
    }

    pub fn secrets(&self) -> Arc<dyn SecretsStore> {
        self.credhub.clone()
    }

    /// Collects the manifests of every deployment with Diego cells
    pub fn manifests(&self) -> Arc<dyn ManifestSource> {
        Arc::new(DeploymentCollector::new(
            self.control_plane(),
            self.orchestrator(),
        ))
    }

    pub fn agent_verifier(&self) -> Arc<dyn CertVerifier> {
        Arc::new(AgentVerifier::new(self.orchestrator(), self.secrets()))
    }

    pub fn proxy_verifier(&self) -> Arc<dyn CertVerifier> {
        Arc::new(ProxyVerifier::new(self.orchestrator(), self.secrets()))
    }
}
