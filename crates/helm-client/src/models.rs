//! Option and response types for Helm operations

use serde::Deserialize;

/// Options for `helm install`.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Namespace the release is installed into, created if absent
    pub namespace: String,
    /// Release name
    pub release_name: String,
    /// Chart location, repo-qualified or OCI
    pub chart_location: String,
    /// Chart version, latest when empty
    pub chart_version: String,
    /// Fully merged values document
    pub values: serde_json::Value,
}

/// Options for `helm upgrade`.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Namespace the release lives in
    pub namespace: String,
    /// Release name
    pub release_name: String,
    /// Chart location, repo-qualified or OCI
    pub chart_location: String,
    /// Chart version, latest when empty
    pub chart_version: String,
    /// Fully merged values document
    pub values: serde_json::Value,
    /// Whether to replace resources through delete/recreate
    pub force: bool,
}

/// One entry of `helm list --output json`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledRelease {
    /// Release name
    #[serde(default)]
    pub name: String,
    /// Namespace the release lives in
    #[serde(default)]
    pub namespace: String,
    /// Release revision counter
    #[serde(default)]
    pub revision: String,
    /// Release status reported by helm
    #[serde(default)]
    pub status: String,
    /// Chart the release was rendered from, `name-version` form
    #[serde(default)]
    pub chart: String,
    /// Application version advertised by the chart
    #[serde(default)]
    pub app_version: String,
}

impl InstalledRelease {
    /// Returns the chart version parsed out of the `name-version` chart field.
    pub fn chart_version(&self) -> Option<&str> {
        self.chart.rsplit_once('-').map(|(_, version)| version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_helm_list_output() {
        let raw = r#"[{"name":"registry","namespace":"registry","revision":"2",
            "updated":"2024-05-01 10:00:00.000000000 +0000 UTC","status":"deployed",
            "chart":"docker-registry-2.8.3","app_version":"2.8.3"}]"#;
        let releases: Vec<InstalledRelease> = serde_json::from_str(raw).unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].name, "registry");
        assert_eq!(releases[0].status, "deployed");
        assert_eq!(releases[0].chart_version(), Some("2.8.3"));
    }
}
