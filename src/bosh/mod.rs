//! BOSH CLI integration
//!
//! Deploys, instance listings and file retrieval all go through the `bosh`
//! binary. Director credentials are handed to every invocation as process
//! environment.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

mod instance;

pub use instance::Instance;

/// The infrastructure orchestrator that owns deployments and their VMs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Names of every deployment on the director
    async fn deployment_names(&self) -> Result<Vec<String>>;

    /// Deploy `manifest_path` as `deployment`, passing extra CLI flags.
    async fn deploy(&self, deployment: &str, manifest_path: &Path, flags: Vec<String>)
        -> Result<()>;

    /// Every instance of a deployment
    async fn instances(&self, deployment: &str) -> Result<Vec<Instance>>;

    /// Contents of a file on an instance
    async fn fetch_file(&self, instance: &Instance, remote_path: &str) -> Result<String>;
}

/// [`Orchestrator`] backed by the `bosh` CLI
#[derive(Debug, Clone, Default)]
pub struct BoshCli {
    env: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct TableOutput<R> {
    #[serde(rename = "Tables", default = "Vec::new")]
    tables: Vec<Table<R>>,
}

#[derive(Debug, Deserialize)]
struct Table<R> {
    #[serde(rename = "Rows", default = "Vec::new")]
    rows: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct DeploymentRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VmRow {
    instance: String,
}

impl BoshCli {
    /// Create a runner that passes `env` (BOSH_ENVIRONMENT, BOSH_CLIENT, ...) to every command
    pub fn new(env: Vec<(String, String)>) -> Self {
        Self { env }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("bosh");
        cmd.args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }

    /// Run a command and return its stdout
    async fn run(&self, operation: &str, target: &str, args: &[&str]) -> Result<Vec<u8>> {
        debug!(command = %format!("bosh {}", args.join(" ")), "running bosh command");
        let output = self.command(args).output().await.map_err(|e| {
            Error::external(operation, target, format!("could not execute bosh: {}", e))
        })?;

        if !output.status.success() {
            return Err(Error::external(
                operation,
                target,
                format!(
                    "bosh {}: {}\n{}{}",
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

/// Rows of the first table in `bosh --json` output
fn first_table_rows<R: DeserializeOwned>(output: &[u8], what: &str) -> Result<Vec<R>> {
    let parsed: TableOutput<R> = serde_json::from_slice(output)
        .map_err(|e| Error::serialization(format!("invalid json from bosh {}: {}", what, e)))?;

    parsed
        .tables
        .into_iter()
        .next()
        .map(|t| t.rows)
        .ok_or_else(|| Error::serialization(format!("bosh {} returned no tables", what)))
}

fn parse_deployments(output: &[u8]) -> Result<Vec<String>> {
    let rows: Vec<DeploymentRow> = first_table_rows(output, "deployments")?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

fn parse_instances(deployment: &str, output: &[u8]) -> Result<Vec<Instance>> {
    let rows: Vec<VmRow> = first_table_rows(output, "vms")?;
    Ok(rows
        .into_iter()
        .map(|r| Instance::new(deployment, r.instance))
        .collect())
}

/// Re-emit each line of a child's output through tracing
async fn stream_lines<R: AsyncRead + Unpin>(output: R, deployment: &str) -> std::io::Result<()> {
    let mut lines = BufReader::new(output).lines();
    while let Some(line) = lines.next_line().await? {
        info!(deployment, "{}", line);
    }
    Ok(())
}

#[async_trait]
impl Orchestrator for BoshCli {
    async fn deployment_names(&self) -> Result<Vec<String>> {
        let output = self
            .run("bosh deployments", "director", &["deployments", "--json"])
            .await?;
        parse_deployments(&output)
    }

    async fn deploy(
        &self,
        deployment: &str,
        manifest_path: &Path,
        flags: Vec<String>,
    ) -> Result<()> {
        let manifest = manifest_path.to_string_lossy();
        let mut args = vec![
            "deploy",
            &*manifest,
            "--deployment",
            deployment,
            "--non-interactive",
        ];
        args.extend(flags.iter().map(String::as_str));

        info!(command = %format!("bosh {}", args.join(" ")), "running bosh deploy");
        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                Error::external("bosh deploy", deployment, format!("could not execute bosh: {}", e))
            })?;

        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(stdout, deployment).await,
            None => Ok(()),
        };

        // wait even when reading its output failed
        let status = child.wait().await?;
        streamed.map_err(|e| {
            Error::external(
                "bosh deploy",
                deployment,
                format!("could not read bosh output: {}", e),
            )
        })?;
        if !status.success() {
            return Err(Error::external(
                "bosh deploy",
                deployment,
                format!("bosh {}: {}", args.join(" "), status),
            ));
        }
        Ok(())
    }

    async fn instances(&self, deployment: &str) -> Result<Vec<Instance>> {
        let output = self
            .run("bosh vms", deployment, &["vms", "-d", deployment, "--json"])
            .await?;
        parse_instances(deployment, &output)
    }

    async fn fetch_file(&self, instance: &Instance, remote_path: &str) -> Result<String> {
        let local = tempfile::Builder::new()
            .prefix("riic-scp-")
            .tempfile()?;
        let source = format!("{}:{}", instance.name, remote_path);
        let target = local.path().to_string_lossy().into_owned();

        self.run(
            "bosh scp",
            &instance.to_string(),
            &["-d", &instance.deployment_name, "scp", &source, &target],
        )
        .await?;

        Ok(tokio::fs::read_to_string(local.path()).await?)
    }
}
