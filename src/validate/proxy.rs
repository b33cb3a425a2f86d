use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::bosh::{Instance, Orchestrator};
use crate::credhub::SecretsStore;
use crate::error::ResultExt;
use crate::manifest::Manifest;
use crate::{Error, Result};

use super::{selected_instances, CertVerifier, InstanceScope};

const ROUTER_PREFIXES: [&str; 2] = ["router", "isolated_router"];

const ROUTER_CONFIG_PATH: &str = "/var/vcap/jobs/gorouter/config/gorouter.yml";

#[derive(Debug, Deserialize)]
struct RouterConfig {
    #[serde(default)]
    ca_certs: String,
}

/// Checks each router trusts the CA that issued the deployment's intermediate
pub struct ProxyVerifier {
    orchestrator: Arc<dyn Orchestrator>,
    secrets: Arc<dyn SecretsStore>,
}

impl ProxyVerifier {
    /// Create a verifier over the given collaborators
    pub fn new(orchestrator: Arc<dyn Orchestrator>, secrets: Arc<dyn SecretsStore>) -> Self {
        Self {
            orchestrator,
            secrets,
        }
    }

    /// Verify every router `filter` admits.
    pub async fn verify_with<F>(&self, manifest: &Manifest, filter: F) -> Result<()>
    where
        F: FnMut(&Instance) -> bool + Send,
    {
        self.check_routers(manifest, filter)
            .await
            .context("validating certs on routers")
    }

    async fn check_routers<F>(&self, manifest: &Manifest, filter: F) -> Result<()>
    where
        F: FnMut(&Instance) -> bool + Send,
    {
        let intermediate = self
            .secrets
            .certificate(&manifest.intermediate_cert_path())
            .await?;
        let expected = intermediate.value.ca.trim();

        info!(deployment = %manifest.deployment_name(), "validating router certificates");
        let routers = selected_instances(
            self.orchestrator.as_ref(),
            manifest.deployment_name(),
            &ROUTER_PREFIXES,
            filter,
        )
        .await?;

        for router in routers {
            info!(instance = %router.name, "validating cert on instance");
            let raw = self
                .orchestrator
                .fetch_file(&router, ROUTER_CONFIG_PATH)
                .await?;
            let config: RouterConfig = serde_yaml::from_str(&raw).map_err(|e| {
                Error::serialization(format!("failed to parse router config from {}: {}", router, e))
            })?;

            // the bundle holds several concatenated CAs
            if !config.ca_certs.contains(expected) {
                return Err(Error::cert_mismatch(
                    router.to_string(),
                    expected,
                    config.ca_certs,
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CertVerifier for ProxyVerifier {
    async fn verify(&self, manifest: &Manifest, scope: InstanceScope) -> Result<()> {
        self.verify_with(manifest, scope.filter()).await
    }
}
