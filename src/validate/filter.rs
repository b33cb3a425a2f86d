//! Instance selection for verifiers

use crate::bosh::Instance;

/// Which instances of a deployment a verification looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceScope {
    /// Every matching instance
    All,
    /// Only the first matching instance, as a cheap sanity check
    FirstOnly,
}

impl InstanceScope {
    /// A fresh filter for one verification call
    pub fn filter(self) -> Box<dyn FnMut(&Instance) -> bool + Send> {
        match self {
            Self::All => Box::new(all_instances()),
            Self::FirstOnly => Box::new(first_instance_only()),
        }
    }
}

/// Admits every instance
pub fn all_instances() -> impl FnMut(&Instance) -> bool + Send {
    |_| true
}

/// Admits exactly one instance: the first it is asked about
pub fn first_instance_only() -> impl FnMut(&Instance) -> bool + Send {
    let mut seen = 0usize;
    move |_| {
        seen += 1;
        seen == 1
    }
}
