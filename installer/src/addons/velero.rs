//! Velero backup agent
//!
//! Installed when the license covers disaster recovery. Backups stay
//! disabled until a snapshot location is configured through the vendor
//! console; the agent only needs to be present and ready.

use crate::addons::proxy_env_map;
use crate::error::Error;
use crate::wait;
use cluster_client::ClusterClientTrait;
use crds::ProxySpec;
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "velero";
pub(crate) const NAMESPACE: &str = "velero";
pub(crate) const CHART_LOCATION: &str = "oci://charts.embeddedcluster.io/velero";
pub(crate) const CHART_VERSION: &str = "7.2.1";

/// Where the node agent finds pod volumes under the embedded kubelet.
const POD_VOLUME_PATH: &str = "/var/lib/embedded-cluster/k0s/kubelet/pods";

/// Velero backup agent add-on.
#[derive(Debug, Clone, Default)]
pub struct Velero {
    pub proxy: Option<ProxySpec>,
}

impl Velero {
    /// Generated chart values.
    pub fn helm_values(&self) -> Value {
        let mut values = json!({
            "backupsEnabled": false,
            "snapshotsEnabled": false,
            "deployNodeAgent": true,
            "nodeAgent": {
                "podVolumePath": POD_VOLUME_PATH,
            },
        });
        if self.proxy.is_some() {
            values["configuration"] = json!({
                "extraEnvVars": proxy_env_map(self.proxy.as_ref()),
            });
        }
        values
    }

    pub async fn install(
        &self,
        cluster: &dyn ClusterClientTrait,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        let mut values = self.helm_values();
        values::apply_overrides(&mut values, overrides)?;
        helm.install(InstallOptions {
            namespace: NAMESPACE.to_string(),
            release_name: RELEASE_NAME.to_string(),
            chart_location: CHART_LOCATION.to_string(),
            chart_version: CHART_VERSION.to_string(),
            values,
        })
        .await?;
        wait::wait_for_deployment(cluster, NAMESPACE, RELEASE_NAME).await
    }

    pub async fn upgrade(
        &self,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        let mut values = self.helm_values();
        values::apply_overrides(&mut values, overrides)?;
        helm.upgrade(UpgradeOptions {
            namespace: NAMESPACE.to_string(),
            release_name: RELEASE_NAME.to_string(),
            chart_location: CHART_LOCATION.to_string(),
            chart_version: CHART_VERSION.to_string(),
            values,
            force: false,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backups_start_disabled() {
        let values = Velero::default().helm_values();
        assert_eq!(values["backupsEnabled"], false);
        assert_eq!(values["snapshotsEnabled"], false);
        assert_eq!(values["nodeAgent"]["podVolumePath"], POD_VOLUME_PATH);
        assert!(values.get("configuration").is_none());
    }

    #[test]
    fn proxy_settings_reach_the_pod_environment() {
        let values = Velero {
            proxy: Some(ProxySpec {
                http_proxy: "http://proxy.example.com".to_string(),
                https_proxy: "https://proxy.example.com".to_string(),
                no_proxy: "localhost,127.0.0.1".to_string(),
            }),
        }
        .helm_values();
        let env = &values["configuration"]["extraEnvVars"];
        assert_eq!(env["HTTP_PROXY"], "http://proxy.example.com");
        assert_eq!(env["HTTPS_PROXY"], "https://proxy.example.com");
        assert_eq!(env["NO_PROXY"], "localhost,127.0.0.1");
    }
}
