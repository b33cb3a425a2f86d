//! Expiration of the live certificates in CredHub

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use x509_parser::prelude::*;

use crate::credhub::SecretsStore;
use crate::error::ResultExt;
use crate::manifest::{Manifest, ROOT_CERT_NAME};
use crate::{Error, Result};

/// Certificates expiring within this many days warrant a rotation
pub const EXPIRY_WARNING_DAYS: i64 = 90;

/// How close a certificate is to expiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// Already expired
    Expired,
    /// Expires within [`EXPIRY_WARNING_DAYS`]
    ExpiringSoon,
    /// Comfortably valid
    Valid,
}

impl ExpiryStatus {
    /// Classify an expiration relative to `now`
    pub fn at(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if expiration <= now {
            Self::Expired
        } else if expiration - now <= Duration::days(EXPIRY_WARNING_DAYS) {
            Self::ExpiringSoon
        } else {
            Self::Valid
        }
    }
}

/// Reads expiration dates of the live root and intermediate certificates
pub struct CertExpiration {
    secrets: Arc<dyn SecretsStore>,
}

impl CertExpiration {
    /// Create a checker over the given secrets store
    pub fn new(secrets: Arc<dyn SecretsStore>) -> Self {
        Self { secrets }
    }

    /// Expiration of the fleet-wide root CA
    pub async fn root_expiration(&self) -> Result<DateTime<Utc>> {
        let root = self
            .secrets
            .certificate(ROOT_CERT_NAME)
            .await
            .context("failed to retrieve root CA certificate from credhub")?;
        not_after(&root.value.certificate).context("failed to compute root expiration")
    }

    /// Expiration of a deployment's intermediate CA
    pub async fn intermediate_expiration(&self, manifest: &Manifest) -> Result<DateTime<Utc>> {
        let intermediate = self
            .secrets
            .certificate(&manifest.intermediate_cert_path())
            .await
            .context("failed to retrieve intermediate certificate from credhub")?;
        not_after(&intermediate.value.certificate)
            .context("failed to compute intermediate expiration")
    }
}

/// `notAfter` of the first certificate in a PEM document
pub fn not_after(pem_data: &str) -> Result<DateTime<Utc>> {
    let block = ::pem::parse(pem_data)
        .map_err(|e| Error::serialization(format!("failed to parse certificate PEM: {}", e)))?;

    let (_, cert) = X509Certificate::from_der(block.contents())
        .map_err(|e| Error::serialization(format!("failed to parse certificate: {}", e)))?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        Error::serialization(format!("certificate expiry {} is out of range", timestamp))
    })
}
