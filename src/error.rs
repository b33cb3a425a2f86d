//! Error types for certificate rotation
//!
//! Errors fall into four families that callers handle differently:
//! configuration problems (a manifest or topology we don't understand),
//! failed calls to external systems, certificate mismatches found on live
//! instances, and the pending-changes precondition. Each error can be wrapped
//! with the deployment or phase that produced it without losing its family.

use riic_common::PathError;
use thiserror::Error;

/// Default context value when no specific deployment is known
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for rotation operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Manifest or topology the tool doesn't understand. Never retried.
    #[error("configuration error for {deployment}: {message}")]
    Configuration {
        /// Deployment whose manifest is at fault
        deployment: String,
        /// What is wrong with it
        message: String,
    },

    /// A control plane, orchestrator or secrets store call failed
    #[error("{operation} failed for {target}: {message}")]
    ExternalCall {
        /// Operation being performed (e.g. "bosh deploy", "credhub get")
        operation: String,
        /// Deployment, path or product the operation targeted
        target: String,
        /// Underlying failure, including command output where available
        message: String,
    },

    /// Certificate on a live instance doesn't match the secrets store
    #[error("certificate on instance doesn't match credhub value: for instance {instance}, expected:\n{expected}\nbut got:\n{actual}")]
    CertMismatch {
        /// Instance (group/id) whose certificate differs
        instance: String,
        /// Value held by the secrets store
        expected: String,
        /// Value found on the instance
        actual: String,
    },

    /// The control plane has staged changes that haven't been applied
    #[error("cannot continue while there are pending changes")]
    PendingChanges,

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Local filesystem error (temp manifests, import files, fetched files)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error annotated with the deployment or phase that produced it
    #[error("{context}: {source}")]
    Context {
        /// Where the error happened
        context: String,
        /// The wrapped error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error for a deployment
    pub fn configuration(deployment: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            deployment: deployment.into(),
            message: msg.into(),
        }
    }

    /// Create an external call error
    pub fn external(
        operation: impl Into<String>,
        target: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::ExternalCall {
            operation: operation.into(),
            target: target.into(),
            message: msg.into(),
        }
    }

    /// Create a certificate mismatch error
    pub fn cert_mismatch(
        instance: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::CertMismatch {
            instance: instance.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Wrap this error with context
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error, or any error it wraps, is a certificate mismatch
    pub fn is_cert_mismatch(&self) -> bool {
        match self {
            Self::CertMismatch { .. } => true,
            Self::Context { source, .. } => source.is_cert_mismatch(),
            _ => false,
        }
    }

    /// Whether this error, or any error it wraps, is the pending changes precondition
    pub fn is_pending_changes(&self) -> bool {
        match self {
            Self::PendingChanges => true,
            Self::Context { source, .. } => source.is_pending_changes(),
            _ => false,
        }
    }
}

impl From<PathError> for Error {
    fn from(e: PathError) -> Self {
        Self::configuration(UNKNOWN_CONTEXT, e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

/// Extension for attaching context to results
pub trait ResultExt<T> {
    /// Wrap the error, if any, with context
    fn context(self, context: impl Into<String>) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context(self, context: impl Into<String>) -> Result<T, Error> {
        self.map_err(|e| e.context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story: Callers branch on the mismatch sentinel
    // ==========================================================================

    #[test]
    fn mismatch_is_detected_through_context_wrappers() {
        let err = Error::cert_mismatch("diego_cell/0", "new", "old")
            .context("validating certs on diego cells")
            .context("phase credhub");
        assert!(err.is_cert_mismatch());
        assert!(err.to_string().contains("phase credhub"));
        assert!(err.to_string().contains("diego_cell/0"));
    }

    #[test]
    fn connectivity_failures_are_not_mismatches() {
        let err = Error::external("bosh scp", "cf-1234", "connection reset").context("validate");
        assert!(!err.is_cert_mismatch());
    }

    #[test]
    fn mismatch_message_shows_both_values() {
        let msg = Error::cert_mismatch("router/1", "EXPECTED", "ACTUAL").to_string();
        assert!(msg.contains("expected:\nEXPECTED"));
        assert!(msg.contains("but got:\nACTUAL"));
    }

    #[test]
    fn pending_changes_survives_wrapping() {
        let err = Error::PendingChanges.context("precondition");
        assert!(err.is_pending_changes());
        assert!(!err.is_cert_mismatch());
    }

    #[test]
    fn result_context_leaves_ok_untouched() {
        let ok: Result<u8, Error> = Ok(3);
        assert_eq!(ok.context("unused").unwrap(), 3);

        let err: Result<u8, Error> = Err(Error::configuration("cf-1", "bad"));
        let msg = err.context("loading").unwrap_err().to_string();
        assert_eq!(msg, "loading: configuration error for cf-1: bad");
    }

    #[test]
    fn path_errors_become_configuration_errors() {
        let err: Error = PathError::NotFound {
            path: "/variables".to_string(),
            segment: "variables".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
