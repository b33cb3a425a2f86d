//! Deployment topologies
//!
//! Each topology knows which instance groups and jobs carry the instance
//! identity credentials and which trust stores must learn about the new root.

use std::fmt;

use crate::error::UNKNOWN_CONTEXT;
use crate::{Error, Result};

use super::Manifest;

/// Shape of a deployment with Diego cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// The platform deployment itself; owns the root CA
    Primary,
    /// An isolation segment tile
    IsolationSegment,
    /// A Windows cells tile
    WindowsSegment,
}

/// A trust store property that must hold the regen root
struct TrustStore {
    instance_group: String,
    job: &'static str,
    path: &'static str,
    required: bool,
}

impl TrustStore {
    fn required(instance_group: impl Into<String>, job: &'static str, path: &'static str) -> Self {
        Self {
            instance_group: instance_group.into(),
            job,
            path,
            required: true,
        }
    }

    fn optional(instance_group: impl Into<String>, job: &'static str, path: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(instance_group, job, path)
        }
    }
}

const LINUX_ROOTFS_JOBS: [(&str, &str); 2] = [
    ("cflinuxfs2-rootfs-setup", "/cflinuxfs2-rootfs/trusted_certs"),
    ("cflinuxfs3-rootfs-setup", "/cflinuxfs3-rootfs/trusted_certs"),
];

const WINDOWS_ROOTFS_JOBS: [&str; 2] = ["windows1803fs", "windows2019fs"];

const CONTAINER_TRUST_PATH: &str = "/containers/trusted_ca_certificates";
const ROUTER_TRUST_PATH: &str = "/router/ca_certs";

impl Topology {
    /// Every topology, primary first
    pub const ALL: [Topology; 3] = [
        Topology::Primary,
        Topology::IsolationSegment,
        Topology::WindowsSegment,
    ];

    /// Classify a deployment by its name prefix.
    pub fn classify(deployment_name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| deployment_name.starts_with(t.deployment_prefix()))
            .ok_or_else(|| {
                Error::configuration(
                    UNKNOWN_CONTEXT,
                    format!(
                        "deployment {} does not match any known topology",
                        deployment_name
                    ),
                )
            })
    }

    /// Prefix of BOSH deployment names with this topology
    pub fn deployment_prefix(self) -> &'static str {
        match self {
            Self::Primary => "cf-",
            Self::IsolationSegment => "p-isolation-segment-",
            Self::WindowsSegment => "pas-windows-",
        }
    }

    /// Ops Manager product name for this topology
    pub fn product_name(self) -> &'static str {
        match self {
            Self::Primary => "cf",
            Self::IsolationSegment => "p-isolation-segment",
            Self::WindowsSegment => "pas-windows",
        }
    }

    /// Extra `bosh deploy` flags
    ///
    /// Windows cells only pick up new certificates on recreate.
    pub fn deploy_flags(self) -> &'static [&'static str] {
        match self {
            Self::WindowsSegment => &["--recreate"],
            Self::Primary | Self::IsolationSegment => &[],
        }
    }

    /// (instance group, job) running the Diego cell agent
    fn agent_job(self, suffix: &str) -> (String, &'static str) {
        match self {
            Self::Primary => ("diego_cell".to_string(), "rep"),
            Self::IsolationSegment => (format!("isolated_diego_cell{}", suffix), "rep"),
            Self::WindowsSegment => (format!("windows_diego_cell{}", suffix), "rep_windows"),
        }
    }

    fn trust_stores(self, suffix: &str) -> Vec<TrustStore> {
        let (cell, agent) = self.agent_job(suffix);
        let mut stores = Vec::new();

        match self {
            Self::Primary => {
                stores.push(TrustStore::required("router", "gorouter", ROUTER_TRUST_PATH));
                stores.push(TrustStore::required(
                    "credhub",
                    "credhub",
                    "/credhub/authentication/mutual_tls/trusted_cas",
                ));
                stores.push(TrustStore::required(&cell, agent, CONTAINER_TRUST_PATH));
                for (job, path) in LINUX_ROOTFS_JOBS {
                    stores.push(TrustStore::optional(&cell, job, path));
                }
                stores.push(TrustStore::required(
                    "diego_brain",
                    "ssh_proxy",
                    "/diego/ssh_proxy/bbs/ca_cert",
                ));
            }
            Self::IsolationSegment => {
                stores.push(TrustStore::required(
                    format!("isolated_router{}", suffix),
                    "gorouter",
                    ROUTER_TRUST_PATH,
                ));
                stores.push(TrustStore::required(&cell, agent, CONTAINER_TRUST_PATH));
                for (job, path) in LINUX_ROOTFS_JOBS {
                    stores.push(TrustStore::optional(&cell, job, path));
                }
            }
            Self::WindowsSegment => {
                stores.push(TrustStore::required(&cell, agent, CONTAINER_TRUST_PATH));
                for job in WINDOWS_ROOTFS_JOBS {
                    stores.push(TrustStore::optional(&cell, job, "/windows-rootfs/trusted_certs"));
                }
            }
        }
        stores
    }

    /// Add the regen intermediate and point the cell agent at it.
    pub(crate) fn apply_new_intermediate(self, manifest: &mut Manifest) -> Result<()> {
        let suffix = self.instance_group_suffix(manifest.deployment_name());
        let (cell, agent) = self.agent_job(&suffix);

        manifest.add_intermediate_cert_regen_variable()?;
        manifest.use_regen_intermediate(&cell, agent)
    }

    /// Trust the regen root everywhere the live root is trusted.
    ///
    /// Only the primary deployment declares the regen root; segments refer to
    /// it by its absolute name.
    pub(crate) fn apply_new_root(self, manifest: &mut Manifest) -> Result<()> {
        let suffix = self.instance_group_suffix(manifest.deployment_name());

        if self == Self::Primary {
            manifest.add_root_cert_regen_variable()?;
        }

        for store in self.trust_stores(&suffix) {
            manifest.trust_root_regen(&store.instance_group, store.job, store.path, store.required)?;
        }

        if self == Self::Primary && manifest.backend_tls_enabled("diego_brain", "ssh_proxy") {
            manifest.trust_root_regen(
                "diego_brain",
                "ssh_proxy",
                "/backends/tls/ca_certificates",
                true,
            )?;
        }
        Ok(())
    }

    fn instance_group_suffix(self, deployment_name: &str) -> String {
        match self {
            Self::Primary => String::new(),
            Self::IsolationSegment | Self::WindowsSegment => {
                instance_group_suffix(deployment_name, self.product_name())
            }
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product_name())
    }
}

/// Suffix Ops Manager appends to instance group names of a segment deployment.
///
/// The deployment name is `<product>-<segment name>-<guid>`; a named segment's
/// instance groups end in `_<segment name>` with dashes and spaces turned into
/// underscores. An unnamed segment (`<product>-<guid>`) has no suffix.
pub fn instance_group_suffix(deployment_name: &str, product: &str) -> String {
    let prefix = format!("{}-", product);
    let segment = deployment_name
        .strip_prefix(&prefix)
        .unwrap_or(deployment_name);

    match segment.rfind('-') {
        Some(idx) => format!("_{}", normalize_name(&segment[..idx])),
        None => String::new(),
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '_' | ' ' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story: Classifying deployments
    // ==========================================================================

    #[test]
    fn deployments_classify_by_prefix() {
        assert_eq!(Topology::classify("cf-1234").unwrap(), Topology::Primary);
        assert_eq!(
            Topology::classify("p-isolation-segment-iso1-5678").unwrap(),
            Topology::IsolationSegment
        );
        assert_eq!(
            Topology::classify("pas-windows-9abc").unwrap(),
            Topology::WindowsSegment
        );
    }

    #[test]
    fn unknown_deployments_are_configuration_errors() {
        for name in ["p-redis-1234", "cf", "p-isolation-segment", ""] {
            let err = Topology::classify(name).unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "{name}");
        }
    }

    #[test]
    fn only_windows_deploys_recreate() {
        assert_eq!(Topology::WindowsSegment.deploy_flags(), &["--recreate"]);
        assert!(Topology::Primary.deploy_flags().is_empty());
        assert!(Topology::IsolationSegment.deploy_flags().is_empty());
    }

    #[test]
    fn display_uses_product_name() {
        assert_eq!(Topology::IsolationSegment.to_string(), "p-isolation-segment");
    }

    // ==========================================================================
    // Story: Instance group suffixes for segments
    // ==========================================================================

    #[test]
    fn named_segments_get_a_suffix() {
        assert_eq!(
            instance_group_suffix(
                "p-isolation-segment-iso1-pub-065aba009c17a59d5cc9",
                "p-isolation-segment"
            ),
            "_iso1_pub"
        );
    }

    #[test]
    fn unnamed_segments_have_no_suffix() {
        assert_eq!(
            instance_group_suffix("pas-windows-065aba009c17a59d5cc9", "pas-windows"),
            ""
        );
        assert_eq!(
            instance_group_suffix("p-isolation-segment-065aba009c17a59d5cc9", "p-isolation-segment"),
            ""
        );
    }

    #[test]
    fn suffix_is_lowercased_with_separators_normalized() {
        assert_eq!(
            instance_group_suffix("pas-windows-_PasWin_Pub-065aba009c17a59d5cc9", "pas-windows"),
            "__paswin_pub"
        );
        assert_eq!(
            instance_group_suffix("p-isolation-segment-My Seg-abc", "p-isolation-segment"),
            "_my_seg"
        );
        for name in [
            "p-isolation-segment-iso1-pub-065aba009c17a59d5cc9",
            "p-isolation-segment-iso1_pub-065aba009c17a59d5cc9",
            "p-isolation-segment-iso1 pub-065aba009c17a59d5cc9",
        ] {
            assert_eq!(
                instance_group_suffix(name, "p-isolation-segment"),
                "_iso1_pub",
                "{name}"
            );
        }
    }

    #[test]
    fn segment_agent_jobs_carry_the_suffix() {
        assert_eq!(
            Topology::IsolationSegment.agent_job("_iso1"),
            ("isolated_diego_cell_iso1".to_string(), "rep")
        );
        assert_eq!(
            Topology::WindowsSegment.agent_job(""),
            ("windows_diego_cell".to_string(), "rep_windows")
        );
    }

    #[test]
    fn rootfs_trust_stores_are_optional() {
        let stores = Topology::Primary.trust_stores("");
        for store in &stores {
            assert_eq!(store.required, !store.job.contains("rootfs"), "{}", store.job);
        }
        assert!(Topology::WindowsSegment
            .trust_stores("")
            .iter()
            .filter(|s| s.job.starts_with("windows"))
            .all(|s| !s.required));
    }
}
