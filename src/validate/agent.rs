use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::bosh::{Instance, Orchestrator};
use crate::credhub::SecretsStore;
use crate::error::ResultExt;
use crate::manifest::Manifest;
use crate::{Error, Result};

use super::{selected_instances, CertVerifier, InstanceScope};

const CELL_PREFIXES: [&str; 3] = ["diego_cell", "windows_diego_cell", "isolated_diego_cell"];

const IDENTITY_CERT_PATH: &str = "/var/vcap/jobs/rep/config/certs/rep/instance_identity.crt";
const WINDOWS_IDENTITY_CERT_PATH: &str =
    "/var/vcap/jobs/rep_windows/config/certs/rep/instance_identity.crt";

/// Checks each Diego cell presents the deployment's current intermediate
pub struct AgentVerifier {
    orchestrator: Arc<dyn Orchestrator>,
    secrets: Arc<dyn SecretsStore>,
}

impl AgentVerifier {
    /// Create a verifier over the given collaborators
    pub fn new(orchestrator: Arc<dyn Orchestrator>, secrets: Arc<dyn SecretsStore>) -> Self {
        Self {
            orchestrator,
            secrets,
        }
    }

    /// Verify every cell `filter` admits.
    pub async fn verify_with<F>(&self, manifest: &Manifest, filter: F) -> Result<()>
    where
        F: FnMut(&Instance) -> bool + Send,
    {
        self.check_cells(manifest, filter)
            .await
            .context("validating certs on diego cells")
    }

    async fn check_cells<F>(&self, manifest: &Manifest, filter: F) -> Result<()>
    where
        F: FnMut(&Instance) -> bool + Send,
    {
        let intermediate = self
            .secrets
            .certificate(&manifest.intermediate_cert_path())
            .await?;
        let expected = intermediate.value.certificate.trim();

        info!(deployment = %manifest.deployment_name(), "validating diego cell certificates");
        let cells = selected_instances(
            self.orchestrator.as_ref(),
            manifest.deployment_name(),
            &CELL_PREFIXES,
            filter,
        )
        .await?;

        for cell in cells {
            info!(instance = %cell.name, "validating cert on instance");
            let live = self
                .orchestrator
                .fetch_file(&cell, identity_cert_path(&cell))
                .await?;
            let actual = live.trim();

            if actual != expected {
                return Err(Error::cert_mismatch(cell.to_string(), expected, actual));
            }
        }
        Ok(())
    }
}

fn identity_cert_path(cell: &Instance) -> &'static str {
    if cell.group().starts_with("windows") {
        WINDOWS_IDENTITY_CERT_PATH
    } else {
        IDENTITY_CERT_PATH
    }
}

#[async_trait]
impl CertVerifier for AgentVerifier {
    async fn verify(&self, manifest: &Manifest, scope: InstanceScope) -> Result<()> {
        self.verify_with(manifest, scope.filter()).await
    }
}
