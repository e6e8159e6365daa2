//! Installation CRD
//!
//! Cluster-scoped record of one embedded-cluster install or upgrade. A new
//! record is created per operation; the name is the creation timestamp, so
//! the latest record is the lexicographically greatest name.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "embeddedcluster.io",
    version = "v1beta1",
    kind = "Installation",
    status = "InstallationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Unique identifier assigned to the cluster at first install
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    /// Name of the vendor binary that produced this cluster
    #[serde(default)]
    pub binary_name: String,

    /// Whether the cluster was installed from an airgap bundle
    #[serde(default)]
    pub air_gap: bool,

    /// Whether the high availability transition has been recorded
    #[serde(default)]
    pub high_availability: bool,

    /// Cluster network configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSpec>,

    /// Proxy configuration applied to outbound traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySpec>,

    /// Entitlements carried by the installed license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_info: Option<LicenseInfo>,

    /// End-user configuration, including add-on value overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// CIDR assigned to pods
    #[serde(default, rename = "podCIDR")]
    pub pod_cidr: String,

    /// CIDR assigned to cluster services
    #[serde(default, rename = "serviceCIDR")]
    pub service_cidr: String,

    /// Port range reserved for NodePort services
    #[serde(default)]
    pub node_port_range: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    /// Proxy for plain HTTP traffic
    #[serde(default)]
    pub http_proxy: String,

    /// Proxy for TLS traffic
    #[serde(default)]
    pub https_proxy: String,

    /// Comma-separated list of hosts that bypass the proxy
    #[serde(default)]
    pub no_proxy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    /// Whether the license entitles the cluster to disaster recovery
    #[serde(default)]
    pub is_disaster_recovery_supported: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// Escape hatch for overriding built-in add-on Helm values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported_overrides: Option<UnsupportedOverrides>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedOverrides {
    /// Per-add-on Helm value overrides, merged over the generated values
    #[serde(default)]
    pub built_in_extensions: Vec<BuiltInExtension>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInExtension {
    /// Add-on name the override applies to
    #[serde(default)]
    pub name: String,

    /// YAML document merged over the add-on's generated values
    #[serde(default)]
    pub values: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: InstallationState,

    /// Human-readable detail for the current state
    #[serde(default)]
    pub reason: String,
}

/// Installation lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum InstallationState {
    /// Cluster installation started
    #[default]
    Installing,

    /// Kubernetes is up, add-ons not yet applied
    KubernetesInstalled,

    /// Add-on sequencing in progress
    AddonsInstalling,

    /// All add-ons applied and ready
    AddonsInstalled,

    /// Installation finished successfully
    Installed,

    /// Installation failed; see reason
    Failed,
}

impl Installation {
    /// Builds the resource name for a record created at `created`.
    pub fn name_for(created: DateTime<Utc>) -> String {
        created.format("%Y%m%d%H%M%S").to_string()
    }

    /// Builds a resource name for a record created now.
    pub fn generate_name() -> String {
        Self::name_for(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn name_for_sorts_by_creation_time() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 6).unwrap();
        assert_eq!(Installation::name_for(earlier), "20240102150405");
        assert!(Installation::name_for(earlier) < Installation::name_for(later));
    }

    #[test]
    fn spec_uses_upstream_wire_names() {
        let spec = InstallationSpec {
            cluster_id: "bbf0afbb-9b70-445c-9d06-cca4bf5b286b".to_string(),
            air_gap: true,
            network: Some(NetworkSpec {
                service_cidr: "10.96.0.0/12".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["clusterID"], "bbf0afbb-9b70-445c-9d06-cca4bf5b286b");
        assert_eq!(value["airGap"], true);
        assert_eq!(value["network"]["serviceCIDR"], "10.96.0.0/12");
    }

    #[test]
    fn state_serializes_pascal_case() {
        let status = InstallationStatus {
            state: InstallationState::KubernetesInstalled,
            reason: String::new(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "KubernetesInstalled");
    }
}
