//! Certificate rotation
//!
//! A rotation runs the phases in [`Phase::ORDER`], each falling through to
//! the next. All durable state lives in BOSH, CredHub and Ops Manager, so a
//! run that stops part way can be resumed from the failed phase.
//!
//! Before any phase runs, Ops Manager must have no pending changes: the apply
//! phase re-renders manifests from Ops Manager's state and would otherwise
//! deploy someone else's staged changes along with ours.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bosh::Orchestrator;
use crate::credhub::SecretsStore;
use crate::error::ResultExt;
use crate::manifest::{
    Manifest, ManifestSource, Topology, ROOT_CERT_NAME, ROOT_CERT_REGEN_NAME,
};
use crate::opsman::ControlPlane;
use crate::validate::{CertVerifier, InstanceScope};
use crate::{Error, Result};

mod phase;

pub use phase::Phase;

/// Runs the rotation phases against the control plane, orchestrator and secrets store
pub struct CertRotator {
    control_plane: Arc<dyn ControlPlane>,
    orchestrator: Arc<dyn Orchestrator>,
    secrets: Arc<dyn SecretsStore>,
    manifests: Arc<dyn ManifestSource>,
    agent_verifier: Arc<dyn CertVerifier>,
    proxy_verifier: Arc<dyn CertVerifier>,
}

impl CertRotator {
    /// Create a rotator over the given collaborators
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        orchestrator: Arc<dyn Orchestrator>,
        secrets: Arc<dyn SecretsStore>,
        manifests: Arc<dyn ManifestSource>,
        agent_verifier: Arc<dyn CertVerifier>,
        proxy_verifier: Arc<dyn CertVerifier>,
    ) -> Self {
        Self {
            control_plane,
            orchestrator,
            secrets,
            manifests,
            agent_verifier,
            proxy_verifier,
        }
    }

    /// Rotate starting at the named phase; unknown names start at `bosh`.
    pub async fn rotate(&self, start_phase: &str) -> Result<()> {
        self.run(Phase::resolve(start_phase)).await
    }

    /// Rotate starting at `start`.
    pub async fn run(&self, start: Phase) -> Result<()> {
        self.check_pending_changes().await?;
        let manifests = self.sorted_manifests().await?;

        for phase in start.remaining() {
            info!(phase = %phase, "starting phase");
            self.run_phase(phase, &manifests)
                .await
                .context(format!("phase {}", phase))?;
        }
        Ok(())
    }

    async fn run_phase(&self, phase: Phase, manifests: &[Manifest]) -> Result<()> {
        match phase {
            Phase::Bosh => self.deploy_regen_certs(manifests).await,
            Phase::Credhub => {
                self.promote_regen_certs(manifests).await?;
                self.verify_rotation(manifests).await
            }
            Phase::Apply => {
                self.apply_changes(manifests).await?;
                self.verify_rotation(manifests).await
            }
            Phase::Cleanup => self.delete_regen_certs(manifests).await,
        }
    }

    async fn check_pending_changes(&self) -> Result<()> {
        info!("checking for pending changes");
        if self
            .control_plane
            .has_pending_changes()
            .await
            .context("cannot check for pending changes")?
        {
            return Err(Error::PendingChanges);
        }
        Ok(())
    }

    /// Rotatable manifests, the primary deployment first, then by name
    async fn sorted_manifests(&self) -> Result<Vec<Manifest>> {
        info!("retrieving BOSH manifests for all Diego deployments");
        let mut manifests = self.manifests.rotatable_manifests().await?;
        manifests.sort_by(deployment_order);
        Ok(manifests)
    }

    async fn deploy_regen_certs(&self, manifests: &[Manifest]) -> Result<()> {
        for manifest in manifests {
            let deployment = manifest.deployment_name();
            info!(deployment, "creating BOSH manifest with regen certs");

            let mut file = tempfile::Builder::new()
                .prefix(&format!("{}-intermediate-regen-", deployment))
                .suffix(".yml")
                .tempfile()?;
            manifest
                .clone()
                .update(&mut file)
                .context(format!("could not update manifest for {}", deployment))?;

            let flags = manifest
                .topology()
                .deploy_flags()
                .iter()
                .map(|f| f.to_string())
                .collect();

            info!(deployment, "BOSH deploying with new identity certs");
            self.orchestrator
                .deploy(deployment, file.path(), flags)
                .await
                .context("bosh deploy with new identity certs failed")?;
        }
        Ok(())
    }

    async fn promote_regen_certs(&self, manifests: &[Manifest]) -> Result<()> {
        info!("rotating identity certs in CredHub");
        let root = self
            .secrets
            .certificate(ROOT_CERT_REGEN_NAME)
            .await?
            .renamed(ROOT_CERT_NAME);

        let mut certificates = vec![root];
        for manifest in manifests {
            info!(
                deployment = %manifest.deployment_name(),
                "updating CredHub references to overwrite old certificates"
            );
            let intermediate = self
                .secrets
                .certificate(&manifest.intermediate_cert_regen_path())
                .await?
                .renamed(manifest.intermediate_cert_path());
            certificates.push(intermediate);
        }

        self.secrets
            .import(certificates)
            .await
            .context("could not overwrite values in credhub")
    }

    async fn apply_changes(&self, manifests: &[Manifest]) -> Result<()> {
        info!("removing temporary regen certificate entries from BOSH deployments");
        for manifest in manifests {
            let product = manifest.product_name();
            info!(product, "applying changes");
            self.control_plane
                .apply_changes(vec![product.to_string()])
                .await?;
        }
        Ok(())
    }

    /// Spot check one instance per deployment. Only a mismatch is fatal;
    /// instances being unreachable says nothing about the rotation.
    async fn verify_rotation(&self, manifests: &[Manifest]) -> Result<()> {
        match self.verify_first_instances(manifests).await {
            Err(e) if e.is_cert_mismatch() => Err(e),
            Err(e) => {
                warn!(error = %e, "could not validate certs");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn verify_first_instances(&self, manifests: &[Manifest]) -> Result<()> {
        for manifest in manifests {
            self.agent_verifier
                .verify(manifest, InstanceScope::FirstOnly)
                .await?;
            self.proxy_verifier
                .verify(manifest, InstanceScope::FirstOnly)
                .await?;
        }
        Ok(())
    }

    async fn delete_regen_certs(&self, manifests: &[Manifest]) -> Result<()> {
        info!("removing regen certificates from CredHub");
        for manifest in manifests {
            self.secrets
                .delete(&manifest.intermediate_cert_regen_path())
                .await?;
        }
        self.secrets.delete(ROOT_CERT_REGEN_NAME).await
    }
}

fn deployment_order(a: &Manifest, b: &Manifest) -> Ordering {
    let key = |m: &Manifest| (m.topology() != Topology::Primary, m.deployment_name().to_string());
    key(a).cmp(&key(b))
}
