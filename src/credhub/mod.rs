//! CredHub CLI integration

use std::io::Write;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

mod certificate;

pub use certificate::{Certificate, CertificateValue};

/// The secrets store holding the live and regen certificates
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Read the current version of a certificate credential
    async fn certificate(&self, path: &str) -> Result<Certificate>;

    /// Write new versions of several certificates in one call
    async fn import(&self, certificates: Vec<Certificate>) -> Result<()>;

    /// Delete a credential and all its versions
    async fn delete(&self, path: &str) -> Result<()>;
}

/// [`SecretsStore`] backed by the `credhub` CLI
#[derive(Debug, Clone, Default)]
pub struct CredhubCli {
    env: Vec<(String, String)>,
}

#[derive(Serialize)]
struct ImportFile<'a> {
    credentials: &'a [Certificate],
}

impl CredhubCli {
    /// Create a runner that passes `env` (CREDHUB_SERVER, CREDHUB_CLIENT, ...) to every command
    pub fn new(env: Vec<(String, String)>) -> Self {
        Self { env }
    }

    async fn run(&self, operation: &str, target: &str, args: &[&str]) -> Result<Vec<u8>> {
        debug!(command = %format!("credhub {}", args.join(" ")), "running credhub command");
        let output = Command::new("credhub")
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| {
                Error::external(operation, target, format!("could not execute credhub: {}", e))
            })?;

        if !output.status.success() {
            return Err(Error::external(
                operation,
                target,
                format!(
                    "credhub {}: {}\n{}{}",
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }
        Ok(output.stdout)
    }
}

/// Render certificates as a `credhub import` file
fn import_document(certificates: &[Certificate]) -> Result<String> {
    Ok(serde_yaml::to_string(&ImportFile {
        credentials: certificates,
    })?)
}

#[async_trait]
impl SecretsStore for CredhubCli {
    async fn certificate(&self, path: &str) -> Result<Certificate> {
        let output = self
            .run("credhub get", path, &["get", "-n", path, "--output-json"])
            .await?;
        serde_json::from_slice(&output).map_err(|e| {
            Error::serialization(format!("could not parse certificate from {}: {}", path, e))
        })
    }

    async fn import(&self, certificates: Vec<Certificate>) -> Result<()> {
        let names: Vec<&str> = certificates.iter().map(|c| c.name.as_str()).collect();
        let document = import_document(&certificates)?;

        // removed when dropped
        let mut file = tempfile::Builder::new()
            .prefix("credhub-import-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(document.as_bytes())?;
        file.flush()?;

        let path = file.path().to_string_lossy().into_owned();
        self.run("credhub import", &names.join(", "), &["import", "-f", &path])
            .await?;
        info!(credentials = ?names, "imported certificates into credhub");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.run("credhub delete", path, &["delete", "-n", path])
            .await?;
        info!(path, "deleted credential from credhub");
        Ok(())
    }
}
