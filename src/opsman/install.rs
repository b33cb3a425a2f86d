//! Installations (apply changes) and their log stream

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::products::DeployedProduct;
use crate::{Error, Result};

/// Body of `POST /api/v0/installations`
#[derive(Debug, Serialize)]
pub(super) struct ApplyChangesRequest {
    ignore_warnings: String,
    deploy_products: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errands: BTreeMap<String, ErrandConfig>,
}

impl ApplyChangesRequest {
    /// Deploy only `guids`, ignoring verifier warnings
    pub(super) fn targeted(guids: Vec<String>) -> Self {
        Self {
            ignore_warnings: "true".to_string(),
            deploy_products: guids,
            errands: BTreeMap::new(),
        }
    }

    pub(super) fn skip_errands(&mut self, guid: &str, errands: ErrandConfig) {
        self.errands.insert(guid.to_string(), errands);
    }
}

/// Per-product errand overrides
#[derive(Debug, PartialEq, Serialize)]
pub(super) struct ErrandConfig {
    run_post_deploy: BTreeMap<String, bool>,
}

/// Body of `GET /api/v0/staged/products/{guid}/errands`
#[derive(Debug, Deserialize)]
pub(super) struct StagedErrands {
    #[serde(default)]
    errands: Vec<StagedErrand>,
}

#[derive(Debug, Deserialize)]
struct StagedErrand {
    name: String,
    // bool or "when-changed"
    #[serde(default)]
    post_deploy: Option<serde_json::Value>,
}

impl StagedErrands {
    /// Overrides turning off every post-deploy errand, if the product has any
    pub(super) fn disable_post_deploy(&self) -> Option<ErrandConfig> {
        let run_post_deploy: BTreeMap<String, bool> = self
            .errands
            .iter()
            .filter(|e| e.post_deploy.is_some())
            .map(|e| (e.name.clone(), false))
            .collect();

        (!run_post_deploy.is_empty()).then_some(ErrandConfig { run_post_deploy })
    }
}

/// GUIDs of the named products, in order
pub(super) fn product_guids(products: &[String], deployed: &[DeployedProduct]) -> Result<Vec<String>> {
    products
        .iter()
        .map(|name| {
            deployed
                .iter()
                .find(|d| &d.name == name)
                .map(|d| d.guid.clone())
                .ok_or_else(|| {
                    Error::external("apply changes", name, format!("unknown product {}", name))
                })
        })
        .collect()
}

/// What a line of the installation log stream means
#[derive(Debug, PartialEq, Eq)]
pub(super) enum LogLine {
    /// Installation output to show the operator
    Output(String),
    /// Installation finished successfully
    Finished,
    /// Framing with nothing to show
    Skip,
}

/// Parser for the `current_log` server-sent event stream.
///
/// Every `data:` line is installation output until an `event:exit` line;
/// the `data:` after it carries the exit code as `{"code": n}`.
#[derive(Debug, Default)]
pub(super) struct InstallLog {
    exiting: bool,
}

impl InstallLog {
    pub(super) fn feed(&mut self, line: &str) -> Result<LogLine> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim() == "event:exit" {
            self.exiting = true;
            return Ok(LogLine::Skip);
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Ok(LogLine::Skip);
        };

        if !self.exiting {
            return Ok(LogLine::Output(data.to_string()));
        }

        let exit: serde_json::Value = serde_json::from_str(data).map_err(|e| {
            Error::serialization(format!("could not parse installation exit status: {}", e))
        })?;
        match exit.get("code").and_then(serde_json::Value::as_i64) {
            Some(code) if code != 0 => Err(Error::external(
                "apply changes",
                "installation",
                format!("installation failed with code {}", code),
            )),
            _ => Ok(LogLine::Finished),
        }
    }
}
