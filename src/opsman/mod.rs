//! Ops Manager HTTP API client
//!
//! Ops Manager is the control plane: it renders the deployed manifests,
//! knows the BOSH director, and re-renders a deployment's manifest from its
//! own state on apply changes. Every call first makes sure the installation
//! is unlocked, since Ops Manager boots locked after a restart.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use riic_common::document;

use crate::error::ResultExt;
use crate::retry::{retry_while, RetryConfig};
use crate::{Error, Result};

mod credentials;
mod install;
mod products;

pub use credentials::parse_director_credentials;
pub use products::DeployedProduct;

use install::{product_guids, ApplyChangesRequest, InstallLog, LogLine, StagedErrands};
use products::PendingChanges;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const UNLOCK_ATTEMPTS: u32 = 30;
const DIRECTOR_NAME_PATH: &str = "/instance_groups/name=bosh/properties/director/name";

/// The control plane that owns the platform's configuration
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Whether there are staged changes that haven't been applied
    async fn has_pending_changes(&self) -> Result<bool>;

    /// Raw manifest of a deployed product
    async fn manifest(&self, deployment: &str) -> Result<Vec<u8>>;

    /// Name of the BOSH director
    async fn director_name(&self) -> Result<String>;

    /// Apply changes to just the named products and wait for the installation.
    async fn apply_changes(&self, products: Vec<String>) -> Result<()>;
}

/// Connection settings for [`OpsManClient`]
#[derive(Debug, Clone)]
pub struct OpsManConfig {
    /// Base URL, e.g. `https://127.0.0.1`
    pub url: String,
    /// Ops Manager user, or UAA client ID with `use_client_secret`
    pub username: String,
    /// Password, or client secret with `use_client_secret`
    pub password: String,
    /// Passphrase that unlocks the installation
    pub decryption_passphrase: String,
    /// Authenticate with client credentials instead of a password grant
    pub use_client_secret: bool,
}

/// Failure of a single HTTP exchange
#[derive(Debug, thiserror::Error)]
enum CallFailure {
    #[error("expected 2xx status code, got {status} with body {body}")]
    BadStatus { status: StatusCode, body: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl CallFailure {
    /// Whether Ops Manager answered at all; answered requests aren't retried
    fn is_transient(&self) -> bool {
        !matches!(self, Self::BadStatus { .. })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CredentialResponse {
    credential: Option<String>,
}

/// [`ControlPlane`] backed by the Ops Manager API
pub struct OpsManClient {
    config: OpsManConfig,
    http: reqwest::Client,
    unlock_retry: RetryConfig,
}

impl OpsManClient {
    /// Create a client. Ops Manager serves a self-signed certificate, so
    /// certificate verification is disabled.
    pub fn new(config: OpsManConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::external("create http client", &config.url, e.to_string())
            })?;

        Ok(Self {
            config: OpsManConfig {
                url: config.url.trim_end_matches('/').to_string(),
                ..config
            },
            http,
            unlock_retry: RetryConfig::with_max_attempts(UNLOCK_ATTEMPTS),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path)
    }

    async fn send(request: RequestBuilder) -> std::result::Result<Vec<u8>, CallFailure> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(CallFailure::BadStatus {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    async fn token(&self) -> std::result::Result<String, CallFailure> {
        let request = self
            .http
            .post(self.url("/uaa/oauth/token"))
            .header(ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT);

        let request = if self.config.use_client_secret {
            request
                .basic_auth(&self.config.username, Some(&self.config.password))
                .form(&[("grant_type", "client_credentials"), ("scope", "opsman.admin")])
        } else {
            request.basic_auth("opsman", Some("")).form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
        };

        let body = Self::send(request).await?;
        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(|e| CallFailure::Decode(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn unlock(&self) -> std::result::Result<(), CallFailure> {
        let token = self.token().await?;
        let request = self
            .http
            .put(self.url("/api/v0/unlock"))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "passphrase": self.config.decryption_passphrase }));
        Self::send(request).await.map(|_| ())
    }

    async fn ensure_available(&self) -> Result<()> {
        retry_while(
            &self.unlock_retry,
            "unlock ops manager",
            CallFailure::is_transient,
            || self.unlock(),
        )
        .await
        .map_err(|e| Error::external("unlock", &self.config.url, e.to_string()))
    }

    /// Authenticated request with the standard timeout
    async fn authorized(&self, request: RequestBuilder) -> std::result::Result<Vec<u8>, CallFailure> {
        let token = self.token().await?;
        Self::send(request.bearer_auth(token).timeout(REQUEST_TIMEOUT)).await
    }

    async fn get(&self, operation: &str, path: &str) -> Result<Vec<u8>> {
        self.ensure_available().await?;
        self.authorized(self.http.get(self.url(path)))
            .await
            .map_err(|e| Error::external(operation, path, e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        let body = self.get(operation, path).await?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::serialization(format!("unexpected response from {}: {}", path, e))
        })
    }

    /// Every product Ops Manager has deployed
    pub async fn deployed_products(&self) -> Result<Vec<DeployedProduct>> {
        self.get_json("list deployed products", "/api/v0/deployed/products")
            .await
    }

    /// Installed version of a deployed product
    pub async fn deployed_product_version(&self, product: &str) -> Result<String> {
        if product == "p-bosh" {
            return Err(Error::external(
                "get product version",
                product,
                "cannot return the version of the BOSH director",
            ));
        }

        self.deployed_products()
            .await?
            .into_iter()
            .find(|p| p.name == product)
            .map(|p| p.product_version)
            .ok_or_else(|| {
                Error::external(
                    "get product version",
                    product,
                    format!("unable to find deployed product with name {}", product),
                )
            })
    }

    /// Environment for the `bosh` and `credhub` CLIs
    pub async fn director_credentials(&self) -> Result<Vec<(String, String)>> {
        let response: CredentialResponse = self
            .get_json(
                "get director credentials",
                "/api/v0/deployed/director/credentials/bosh_commandline_credentials",
            )
            .await?;

        let credential = response.credential.ok_or_else(|| {
            Error::external(
                "get director credentials",
                "bosh_commandline_credentials",
                "empty credential field",
            )
        })?;
        parse_director_credentials(&credential)
    }

    async fn staged_errands(&self, guid: &str) -> Result<StagedErrands> {
        self.get_json(
            "get staged errands",
            &format!("/api/v0/staged/products/{}/errands", guid),
        )
        .await
    }

    async fn start_installation(&self, request: &ApplyChangesRequest) -> Result<()> {
        let path = "/api/v0/installations";
        self.ensure_available().await?;
        self.authorized(self.http.post(self.url(path)).json(request))
            .await
            .map_err(|e| Error::external("apply changes", path, e.to_string()))?;
        Ok(())
    }

    /// Follow the installation log until the installation exits.
    ///
    /// Installations take far longer than the request timeout, so the stream
    /// is read without one.
    async fn follow_installation(&self) -> Result<()> {
        let path = "/api/v0/installations/current_log";
        let fail = |e: CallFailure| Error::external("follow installation log", path, e.to_string());

        let token = self.token().await.map_err(fail)?;
        let mut response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| fail(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(CallFailure::BadStatus {
                status,
                body: String::new(),
            }));
        }

        let mut log = InstallLog::default();
        let mut pending = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| fail(e.into()))? {
            pending.extend_from_slice(&chunk);
            while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=end).collect();
                if self.emit(&mut log, &line)? {
                    return Ok(());
                }
            }
        }

        if !pending.is_empty() {
            self.emit(&mut log, &pending)?;
        }
        Ok(())
    }

    /// Handle one log line; true once the installation has finished
    fn emit(&self, log: &mut InstallLog, line: &[u8]) -> Result<bool> {
        match log.feed(&String::from_utf8_lossy(line))? {
            LogLine::Output(text) => {
                info!("{}", text);
                Ok(false)
            }
            LogLine::Finished => Ok(true),
            LogLine::Skip => Ok(false),
        }
    }
}

#[async_trait]
impl ControlPlane for OpsManClient {
    async fn has_pending_changes(&self) -> Result<bool> {
        let pending: PendingChanges = self
            .get_json("check pending changes", "/api/v0/staged/pending_changes")
            .await
            .context("cannot check for pending changes")?;

        let changed = pending.changed();
        if !changed.is_empty() {
            debug!(products = ?changed, "products with pending changes");
        }
        Ok(!changed.is_empty())
    }

    async fn manifest(&self, deployment: &str) -> Result<Vec<u8>> {
        self.get(
            "get manifest",
            &format!("/api/v0/deployed/products/{}/manifest", deployment),
        )
        .await
    }

    async fn director_name(&self) -> Result<String> {
        let body = self
            .get("get director manifest", "/api/v0/deployed/director/manifest")
            .await?;
        director_name_from_manifest(&body)
    }

    async fn apply_changes(&self, products: Vec<String>) -> Result<()> {
        let deployed = self.deployed_products().await?;
        let guids = product_guids(&products, &deployed)?;

        let mut request = ApplyChangesRequest::targeted(guids.clone());
        for guid in &guids {
            if let Some(errands) = self.staged_errands(guid).await?.disable_post_deploy() {
                request.skip_errands(guid, errands);
            }
        }

        info!(products = ?products, "applying changes");
        self.start_installation(&request).await?;
        self.follow_installation()
            .await
            .context(format!("applying changes to {}", products.join(", ")))
    }
}

/// Director name from the director's own manifest (JSON is valid YAML)
fn director_name_from_manifest(body: &[u8]) -> Result<String> {
    let manifest: serde_yaml::Value = serde_yaml::from_slice(body)?;
    document::get(&manifest, DIRECTOR_NAME_PATH)
        .ok()
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::external(
                "get director name",
                "director manifest",
                "could not determine bosh director name from its manifest",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn director_name_comes_from_the_bosh_instance_group() {
        let body = br#"{
            "name": "p-bosh",
            "instance_groups": [
                {"name": "uaa", "properties": {}},
                {"name": "bosh", "properties": {"director": {"name": "p-bosh", "address": "10.0.0.5"}}}
            ]
        }"#;
        assert_eq!(director_name_from_manifest(body).unwrap(), "p-bosh");
    }

    #[test]
    fn director_manifest_without_a_name_is_an_error() {
        let body = br#"{"instance_groups": [{"name": "bosh", "properties": {"director": {}}}]}"#;
        let err = director_name_from_manifest(body).unwrap_err();
        assert!(err.to_string().contains("could not determine bosh director name"));
    }

    #[test]
    fn answered_requests_are_not_retried() {
        let rejected = CallFailure::BadStatus {
            status: StatusCode::UNAUTHORIZED,
            body: "bad credentials".to_string(),
        };
        assert!(!rejected.is_transient());
        assert!(rejected.to_string().contains("401"));
        assert!(CallFailure::Decode("eof".to_string()).is_transient());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = OpsManClient::new(OpsManConfig {
            url: "https://opsman.example.com/".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            decryption_passphrase: "pp".to_string(),
            use_client_secret: false,
        })
        .unwrap();
        assert_eq!(
            client.url("/api/v0/unlock"),
            "https://opsman.example.com/api/v0/unlock"
        );
    }
}
