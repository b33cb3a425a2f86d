use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::UNKNOWN_CONTEXT;
use crate::Error;

/// A resumable step of the rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Deploy manifests carrying the regen certificate variables
    Bosh,
    /// Promote the regen certificates over the live CredHub paths
    Credhub,
    /// Apply changes so deployments drop the regen variables
    Apply,
    /// Delete the regen certificates from CredHub
    Cleanup,
}

impl Phase {
    /// Phases in the order a rotation runs them
    pub const ORDER: [Phase; 4] = [Phase::Bosh, Phase::Credhub, Phase::Apply, Phase::Cleanup];

    /// Name accepted by `--start-phase`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bosh => "bosh",
            Self::Credhub => "credhub",
            Self::Apply => "apply",
            Self::Cleanup => "cleanup",
        }
    }

    /// Resolve a requested start phase. Unknown names start from the beginning.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(phase = %name, "unknown start phase, starting at beginning");
            Self::Bosh
        })
    }

    /// This phase and every phase after it
    pub fn remaining(self) -> impl Iterator<Item = Phase> {
        Self::ORDER.into_iter().skip_while(move |p| *p != self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::configuration(UNKNOWN_CONTEXT, format!("unknown phase {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for phase in Phase::ORDER {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn unknown_start_phase_starts_at_bosh() {
        assert_eq!(Phase::resolve("deploy"), Phase::Bosh);
        assert_eq!(Phase::resolve(""), Phase::Bosh);
        assert_eq!(Phase::resolve("Credhub"), Phase::Bosh);
        assert_eq!(Phase::resolve("apply"), Phase::Apply);
    }

    #[test]
    fn remaining_falls_through_to_cleanup() {
        let from_credhub: Vec<Phase> = Phase::Credhub.remaining().collect();
        assert_eq!(from_credhub, [Phase::Credhub, Phase::Apply, Phase::Cleanup]);

        let from_cleanup: Vec<Phase> = Phase::Cleanup.remaining().collect();
        assert_eq!(from_cleanup, [Phase::Cleanup]);

        assert_eq!(Phase::Bosh.remaining().count(), 4);
    }
}
