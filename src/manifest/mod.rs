//! Deployment manifest model
//!
//! A [`Manifest`] owns one deployment's BOSH manifest as an untyped document
//! and knows how to rewrite it so the deployment starts using a freshly
//! generated intermediate CA signed by a freshly generated root CA.
//!
//! The live certificate variables are never edited. Instead each one is
//! cloned into a `-riic-regen` variable and only the clones are referenced
//! from the instance identity and trust store properties. Once the clones
//! have been generated and promoted over the live CredHub paths, an Ops
//! Manager apply changes drops the clones from the manifest again.

use std::io::Write;

use riic_common::document;
use serde_yaml::Value;

use crate::error::UNKNOWN_CONTEXT;
use crate::{Error, Result};

pub mod collector;
pub mod topology;

#[cfg(test)]
pub(crate) mod fixtures;

pub use collector::{DeploymentCollector, ManifestSource};
#[cfg(test)]
pub use collector::MockManifestSource;
pub use topology::{instance_group_suffix, Topology};

/// Name of the per-deployment intermediate CA variable
pub const INTERMEDIATE_CERT_NAME: &str = "diego-instance-identity-intermediate-ca-2018";

/// Name of the cloned intermediate CA variable signed by the regen root
pub const INTERMEDIATE_CERT_REGEN_NAME: &str =
    "diego-instance-identity-intermediate-ca-2018-riic-regen";

/// Manifest reference to the regen intermediate certificate
pub const INTERMEDIATE_CERT_REGEN_VARIABLE: &str =
    "((diego-instance-identity-intermediate-ca-2018-riic-regen.certificate))";

/// Manifest reference to the regen intermediate private key
pub const INTERMEDIATE_PRIVATE_KEY_REGEN_VARIABLE: &str =
    "((diego-instance-identity-intermediate-ca-2018-riic-regen.private_key))";

/// Absolute name (and CredHub path) of the fleet-wide root CA variable
pub const ROOT_CERT_NAME: &str = "/cf/diego-instance-identity-root-ca";

/// Absolute name (and CredHub path) of the cloned root CA variable
pub const ROOT_CERT_REGEN_NAME: &str = "/cf/diego-instance-identity-root-ca-riic-regen";

/// Manifest reference to the regen root certificate
pub const ROOT_CERT_REGEN_VARIABLE: &str =
    "((/cf/diego-instance-identity-root-ca-riic-regen.certificate))";

const INSTANCE_IDENTITY_CA_CERT_PATH: &str = "/diego/executor/instance_identity_ca_cert";
const INSTANCE_IDENTITY_KEY_PATH: &str = "/diego/executor/instance_identity_key";

/// A deployment's BOSH manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    director_name: String,
    deployment_name: String,
    content: Value,
    topology: Topology,
}

impl Manifest {
    /// Parse a manifest owned by the given BOSH director.
    ///
    /// Fails if the document has no string `name`, or if the name doesn't
    /// belong to a known topology.
    pub fn load(director_name: impl Into<String>, raw: &[u8]) -> Result<Self> {
        let content: Value = serde_yaml::from_slice(raw).map_err(|e| {
            Error::configuration(
                UNKNOWN_CONTEXT,
                format!("could not deserialize bosh manifest: {}", e),
            )
        })?;

        let deployment_name = content
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::configuration(UNKNOWN_CONTEXT, "bosh manifest has no string name")
            })?
            .to_string();

        let topology = Topology::classify(&deployment_name)?;

        Ok(Self {
            director_name: director_name.into(),
            deployment_name,
            content,
            topology,
        })
    }

    /// Name of the BOSH director that owns this deployment
    pub fn director_name(&self) -> &str {
        &self.director_name
    }

    /// BOSH deployment name
    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    /// Topology the deployment name classified as
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The manifest document
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Ops Manager product name, as accepted by a targeted apply changes
    pub fn product_name(&self) -> &'static str {
        self.topology.product_name()
    }

    /// Rewrite the manifest to use regen certificates and write it to `out`.
    ///
    /// The intermediate is cloned before the root. Both clones are prepended
    /// to `variables`, so the regen root ends up declared ahead of the regen
    /// intermediate it signs; the config server generates variables in
    /// declaration order and fails on forward references.
    ///
    /// Nothing is written to `out` unless every mutation succeeds. The
    /// in-memory document may be partially rewritten on error, so the
    /// manifest must be discarded rather than updated again.
    pub fn update<W: Write>(&mut self, mut out: W) -> Result<()> {
        let topology = self.topology;
        topology.apply_new_intermediate(self)?;
        topology.apply_new_root(self)?;

        let rendered = serde_yaml::to_string(&self.content).map_err(|e| {
            Error::serialization(format!(
                "could not serialize updated manifest for {}: {}",
                self.deployment_name, e
            ))
        })?;
        out.write_all(rendered.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Full CredHub path of this deployment's live intermediate CA
    pub fn intermediate_cert_path(&self) -> String {
        self.credhub_deployment_path(INTERMEDIATE_CERT_NAME)
    }

    /// Full CredHub path of this deployment's regen intermediate CA
    pub fn intermediate_cert_regen_path(&self) -> String {
        self.credhub_deployment_path(INTERMEDIATE_CERT_REGEN_NAME)
    }

    fn credhub_deployment_path(&self, cert_name: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.director_name, self.deployment_name, cert_name
        )
    }

    /// Copy the first variable named `source` as `new_name` and prepend the copy
    /// to `variables`.
    ///
    /// Returns the copy so callers can rewire it.
    pub fn clone_variable(&mut self, source: &str, new_name: &str) -> Result<&mut Value> {
        let deployment = self.deployment_name.clone();
        let variables = match self.content.get_mut("variables") {
            Some(Value::Sequence(seq)) => seq,
            Some(other) => {
                return Err(Error::configuration(
                    deployment,
                    format!(
                        "expected a sequence at /variables, but got a {}",
                        document::kind(other)
                    ),
                ))
            }
            None => {
                return Err(Error::configuration(
                    deployment,
                    "manifest is missing /variables section",
                ))
            }
        };

        let mut found = None;
        for variable in variables.iter() {
            let Value::Mapping(fields) = variable else {
                return Err(Error::configuration(
                    deployment,
                    format!("variable has unexpected type {}", document::kind(variable)),
                ));
            };
            let name = fields.get("name").and_then(Value::as_str).ok_or_else(|| {
                Error::configuration(&deployment, "expected variable to have a string name")
            })?;
            if name == source {
                found = Some(fields.clone());
                break;
            }
        }

        let mut copy = found.ok_or_else(|| {
            Error::configuration(
                &deployment,
                format!("could not find variable {} in manifest", source),
            )
        })?;
        copy.insert(Value::from("name"), Value::from(new_name));
        variables.insert(0, Value::Mapping(copy));
        Ok(&mut variables[0])
    }

    /// Add the regen intermediate, signed by the regen root.
    pub(crate) fn add_intermediate_cert_regen_variable(&mut self) -> Result<()> {
        let deployment = self.deployment_name.clone();
        let intermediate =
            self.clone_variable(INTERMEDIATE_CERT_NAME, INTERMEDIATE_CERT_REGEN_NAME)?;
        for path in ["/ca", "/options/ca"] {
            document::set(intermediate, path, Value::from(ROOT_CERT_REGEN_NAME)).map_err(|e| {
                Error::configuration(
                    &deployment,
                    format!("could not set {} on new intermediate cert: {}", path, e),
                )
            })?;
        }
        Ok(())
    }

    /// Add the regen root.
    pub(crate) fn add_root_cert_regen_variable(&mut self) -> Result<()> {
        self.clone_variable(ROOT_CERT_NAME, ROOT_CERT_REGEN_NAME)
            .map(|_| ())
    }

    /// Point a rep job's instance identity at the regen intermediate.
    pub(crate) fn use_regen_intermediate(&mut self, instance_group: &str, job: &str) -> Result<()> {
        let deployment = self.deployment_name.clone();
        let props = self
            .job_properties_mut(instance_group, job)
            .ok_or_else(|| missing_job(&deployment, instance_group, job))?;

        for (path, reference) in [
            (INSTANCE_IDENTITY_CA_CERT_PATH, INTERMEDIATE_CERT_REGEN_VARIABLE),
            (INSTANCE_IDENTITY_KEY_PATH, INTERMEDIATE_PRIVATE_KEY_REGEN_VARIABLE),
        ] {
            document::set(props, path, Value::from(reference)).map_err(|e| {
                Error::configuration(
                    &deployment,
                    format!("{}/{}: cannot set {}: {}", instance_group, job, path, e),
                )
            })?;
        }
        Ok(())
    }

    /// Add the regen root to a trust store property.
    ///
    /// With `required` unset a missing job is skipped; a job that is present
    /// but lacks the property is always an error.
    pub(crate) fn trust_root_regen(
        &mut self,
        instance_group: &str,
        job: &str,
        path: &str,
        required: bool,
    ) -> Result<()> {
        let deployment = self.deployment_name.clone();
        let Some(props) = self.job_properties_mut(instance_group, job) else {
            if required {
                return Err(missing_job(&deployment, instance_group, job));
            }
            tracing::debug!(
                deployment = %deployment,
                instance_group,
                job,
                "optional job not present, skipping trust store"
            );
            return Ok(());
        };

        prepend_reference(props, path, ROOT_CERT_REGEN_VARIABLE).map_err(|message| {
            Error::configuration(&deployment, format!("{}/{}: {}", instance_group, job, message))
        })
    }

    /// Whether a job's `/backends/tls/enabled` property is explicitly `true`.
    pub(crate) fn backend_tls_enabled(&self, instance_group: &str, job: &str) -> bool {
        let path = format!(
            "/instance_groups/name={}/jobs/name={}/properties/backends/tls/enabled",
            instance_group, job
        );
        matches!(document::get(&self.content, &path), Ok(Value::Bool(true)))
    }

    fn job_properties_mut(&mut self, instance_group: &str, job: &str) -> Option<&mut Value> {
        let path = format!(
            "/instance_groups/name={}/jobs/name={}/properties",
            instance_group, job
        );
        document::get_mut(&mut self.content, &path)
            .ok()
            .filter(|props| props.is_mapping())
    }
}

/// Prepend `reference` to the trusted CAs held at `path`.
///
/// String properties hold a PEM bundle, so the reference is joined with a
/// newline; sequence properties get the reference as a new first element.
pub fn prepend_reference(
    props: &mut Value,
    path: &str,
    reference: &str,
) -> std::result::Result<(), String> {
    let current = document::get_mut(props, path)
        .map_err(|e| format!("cannot add cert to {}: {}", path, e))?;

    match current {
        Value::String(existing) => {
            *existing = format!("{}\n{}", reference, existing);
            Ok(())
        }
        Value::Sequence(entries) => {
            entries.insert(0, Value::from(reference));
            Ok(())
        }
        other => Err(format!(
            "cannot add cert to {}: unexpected type {}",
            path,
            document::kind(other)
        )),
    }
}

fn missing_job(deployment: &str, instance_group: &str, job: &str) -> Error {
    Error::configuration(
        deployment,
        format!(
            "could not find properties for job {} in instance group {}",
            job, instance_group
        ),
    )
}
