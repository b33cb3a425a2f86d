//! CredHub certificate credentials

use serde::{Deserialize, Serialize};

/// A certificate credential as read from or imported into CredHub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Full credential path
    pub name: String,
    /// Credential type, always `certificate` for the credentials we touch
    #[serde(rename = "type")]
    pub kind: String,
    /// Certificate material
    pub value: CertificateValue,
}

/// PEM material of a certificate credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateValue {
    /// The certificate
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate: String,
    /// Its private key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,
    /// The issuing CA certificate
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca: String,
}

impl Certificate {
    /// Create a certificate credential
    pub fn new(name: impl Into<String>, value: CertificateValue) -> Self {
        Self {
            name: name.into(),
            kind: "certificate".to_string(),
            value,
        }
    }

    /// The same material under a different credential path
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
