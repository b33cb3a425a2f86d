//! Deployed and staged product listings

use serde::Deserialize;

/// A product Ops Manager has deployed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployedProduct {
    /// Product installation GUID, also its BOSH deployment name
    pub guid: String,
    /// Product name (`cf`, `p-isolation-segment`, ...)
    #[serde(rename = "type")]
    pub name: String,
    /// Installed version
    #[serde(default)]
    pub product_version: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PendingChanges {
    #[serde(default)]
    product_changes: Vec<ProductChange>,
}

#[derive(Debug, Deserialize)]
struct ProductChange {
    #[serde(default)]
    guid: String,
    action: String,
}

impl PendingChanges {
    /// Products with staged changes that haven't been applied
    pub(super) fn changed(&self) -> Vec<&str> {
        self.product_changes
            .iter()
            .filter(|p| p.action != "unchanged")
            .map(|p| p.guid.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployed_products_use_type_as_name() {
        let json = r#"[
            {"installation_name": "p-bosh", "guid": "p-bosh-7e0a", "type": "p-bosh", "product_version": "2.6.1"},
            {"installation_name": "cf", "guid": "cf-0f4a", "type": "cf", "product_version": "2.6.3"}
        ]"#;
        let products: Vec<DeployedProduct> = serde_json::from_str(json).unwrap();
        assert_eq!(products[1].name, "cf");
        assert_eq!(products[1].guid, "cf-0f4a");
        assert_eq!(products[1].product_version, "2.6.3");
    }

    #[test]
    fn only_non_unchanged_actions_are_pending() {
        let json = r#"{"product_changes": [
            {"guid": "cf-0f4a", "action": "unchanged"},
            {"guid": "p-isolation-segment-1", "action": "update"},
            {"guid": "p-redis-2", "action": "install"}
        ]}"#;
        let pending: PendingChanges = serde_json::from_str(json).unwrap();
        assert_eq!(pending.changed(), ["p-isolation-segment-1", "p-redis-2"]);
    }

    #[test]
    fn fully_applied_foundation_has_nothing_pending() {
        let pending: PendingChanges = serde_json::from_str(
            r#"{"product_changes": [{"guid": "cf-0f4a", "action": "unchanged"}]}"#,
        )
        .unwrap();
        assert!(pending.changed().is_empty());

        let empty: PendingChanges = serde_json::from_str("{}").unwrap();
        assert!(empty.changed().is_empty());
    }
}
