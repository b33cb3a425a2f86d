//! BOSH instances

use std::fmt;

/// A VM in a BOSH deployment, addressed as `<instance group>/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Deployment the instance belongs to
    pub deployment_name: String,
    /// Instance address, e.g. `diego_cell/2f8e...`
    pub name: String,
}

impl Instance {
    /// Create an instance reference
    pub fn new(deployment_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            name: name.into(),
        }
    }

    /// Instance group part of the address
    pub fn group(&self) -> &str {
        self.name
            .split_once('/')
            .map_or(self.name.as_str(), |(group, _)| group)
    }

    /// Whether the instance address starts with any of `prefixes`
    pub fn has_prefix(&self, prefixes: &[&str]) -> bool {
        prefixes.iter().any(|p| self.name.starts_with(p))
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.deployment_name, self.name)
    }
}
