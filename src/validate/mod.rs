//! Live certificate verification
//!
//! After a rotation the only proof that it worked is on the VMs themselves.
//! The verifiers pull the relevant file off each selected instance and compare
//! it against what CredHub holds for the deployment:
//!
//! - [`AgentVerifier`] checks the cell's instance identity certificate equals
//!   the deployment's intermediate certificate
//! - [`ProxyVerifier`] checks the router's CA bundle contains the CA that
//!   signed the intermediate
//!
//! A difference is reported as [`Error::CertMismatch`](crate::Error::CertMismatch),
//! which rotation treats as fatal. Anything else (SSH trouble, a VM being
//! recreated) is an ordinary error the caller may choose to tolerate.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::bosh::{Instance, Orchestrator};
use crate::manifest::Manifest;
use crate::Result;

mod agent;
mod expiration;
mod filter;
mod proxy;

pub use agent::AgentVerifier;
pub use expiration::{not_after, CertExpiration, ExpiryStatus, EXPIRY_WARNING_DAYS};
pub use filter::{all_instances, first_instance_only, InstanceScope};
pub use proxy::ProxyVerifier;

/// Compares live certificates on a deployment's instances with CredHub
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CertVerifier: Send + Sync {
    /// Verify the instances of `manifest`'s deployment selected by `scope`.
    async fn verify(&self, manifest: &Manifest, scope: InstanceScope) -> Result<()>;
}

/// Instances of a deployment whose address starts with one of `prefixes` and
/// that `filter` admits.
///
/// The filter only sees instances that matched a prefix.
async fn selected_instances<F>(
    orchestrator: &dyn Orchestrator,
    deployment: &str,
    prefixes: &[&str],
    mut filter: F,
) -> Result<Vec<Instance>>
where
    F: FnMut(&Instance) -> bool + Send,
{
    let instances = orchestrator.instances(deployment).await?;
    Ok(instances
        .into_iter()
        .filter(|i| i.has_prefix(prefixes) && filter(i))
        .collect())
}
