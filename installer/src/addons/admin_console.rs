//! Admin console
//!
//! The vendor console operators manage the application through. Always the
//! last add-on applied, once everything it depends on is in place. On
//! airgapped clusters it also receives pull credentials for the in-cluster
//! registry.

use crate::addons::{from_json, proxy_env, registry};
use crate::error::Error;
use crate::wait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cluster_client::ClusterClientTrait;
use crds::ProxySpec;
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use k8s_openapi::api::core::v1::Secret;
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "admin-console";
pub(crate) const NAMESPACE: &str = "admin-console";
pub(crate) const CHART_LOCATION: &str = "oci://charts.embeddedcluster.io/admin-console";
pub(crate) const CHART_VERSION: &str = "1.117.0";

/// Pull secret the console uses against the in-cluster registry.
const PULL_SECRET_NAME: &str = "registry-creds";

/// NodePort the console is reachable on from outside the cluster.
const CONSOLE_NODE_PORT: u16 = 30000;

/// Admin console add-on.
#[derive(Debug, Clone, Default)]
pub struct AdminConsole {
    pub is_airgap: bool,
    pub is_ha: bool,
    pub proxy: Option<ProxySpec>,
    pub service_cidr: Option<String>,
}

impl AdminConsole {
    /// The in-cluster registry endpoint, airgapped clusters only.
    fn registry_pull_endpoint(&self) -> Result<Option<String>, Error> {
        if !self.is_airgap {
            return Ok(None);
        }
        match self.service_cidr.as_deref() {
            Some(cidr) => Ok(Some(registry::registry_endpoint(cidr)?)),
            None => Ok(None),
        }
    }

    /// Generated chart values.
    pub fn helm_values(&self) -> Result<Value, Error> {
        let mut values = json!({
            "isAirgap": self.is_airgap,
            "isHA": self.is_ha,
            "isHelmManaged": false,
            "service": {
                "enabled": false,
            },
            "kurlProxy": {
                "enabled": true,
                "nodePort": CONSOLE_NODE_PORT,
            },
        });
        if self.proxy.is_some() {
            values["extraEnv"] = json!(proxy_env(self.proxy.as_ref()));
        }
        if let Some(endpoint) = self.registry_pull_endpoint()? {
            values["registryEndpoint"] = json!(endpoint);
        }
        Ok(values)
    }

    /// Stores the registry credentials as a dockerconfigjson pull secret so
    /// the console can pull application images from the in-cluster registry.
    async fn ensure_registry_pull_secret(
        &self,
        cluster: &dyn ClusterClientTrait,
        endpoint: &str,
    ) -> Result<(), Error> {
        let (username, password) = registry::registry_credentials(cluster).await?;
        let auth = STANDARD.encode(format!("{username}:{password}"));
        let dockerconfig = json!({
            "auths": {
                endpoint: {
                    "username": username,
                    "password": password,
                    "auth": auth,
                },
            },
        });
        let secret: Secret = from_json(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": PULL_SECRET_NAME,
                "namespace": NAMESPACE,
            },
            "stringData": {
                ".dockerconfigjson": dockerconfig.to_string(),
            },
            "type": "kubernetes.io/dockerconfigjson",
        }))?;
        cluster.apply_secret(NAMESPACE, &secret).await?;
        Ok(())
    }

    pub async fn install(
        &self,
        cluster: &dyn ClusterClientTrait,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        cluster.ensure_namespace(NAMESPACE).await?;
        if let Some(endpoint) = self.registry_pull_endpoint()? {
            self.ensure_registry_pull_secret(cluster, &endpoint).await?;
        }
        let mut values = self.helm_values()?;
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
        let mut values = self.helm_values()?;
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
    use crate::addons::secret_value;
    use cluster_client::MockClusterClient;
    use helm_client::MockHelmClient;

    #[test]
    fn online_values_have_no_registry_wiring() {
        let values = AdminConsole::default().helm_values().unwrap();
        assert_eq!(values["isAirgap"], false);
        assert_eq!(values["isHA"], false);
        assert_eq!(values["kurlProxy"]["nodePort"], 30000);
        assert!(values.get("registryEndpoint").is_none());
        assert!(values.get("extraEnv").is_none());
    }

    #[test]
    fn airgap_ha_values_carry_everything() {
        let values = AdminConsole {
            is_airgap: true,
            is_ha: true,
            proxy: Some(ProxySpec {
                http_proxy: "http://proxy.example.com".to_string(),
                https_proxy: "https://proxy.example.com".to_string(),
                no_proxy: "localhost,127.0.0.1".to_string(),
            }),
            service_cidr: Some("10.96.0.0/12".to_string()),
        }
        .helm_values()
        .unwrap();
        assert_eq!(values["isAirgap"], true);
        assert_eq!(values["isHA"], true);
        assert_eq!(values["registryEndpoint"], "10.96.0.11:5000");
        let env = values["extraEnv"].as_array().unwrap();
        let has_http_proxy = env
            .iter()
            .any(|var| var["name"] == "HTTP_PROXY" && var["value"] == "http://proxy.example.com");
        assert!(has_http_proxy);
    }

    #[tokio::test]
    async fn airgap_install_creates_the_pull_secret() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(NAMESPACE, RELEASE_NAME, true);
        let helm = MockHelmClient::new();
        let addon = AdminConsole {
            is_airgap: true,
            service_cidr: Some("10.96.0.0/12".to_string()),
            ..Default::default()
        };

        addon.install(&cluster, &helm, &[]).await.unwrap();

        assert!(helm.has_release(NAMESPACE, RELEASE_NAME));
        let secret = cluster.secret(NAMESPACE, PULL_SECRET_NAME).unwrap();
        assert_eq!(
            secret.type_.as_deref(),
            Some("kubernetes.io/dockerconfigjson")
        );
        let config = secret_value(&secret, ".dockerconfigjson").unwrap();
        assert!(config.contains("10.96.0.11:5000"));
        assert!(config.contains("embedded-cluster"));
    }

    #[tokio::test]
    async fn online_install_skips_registry_wiring() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(NAMESPACE, RELEASE_NAME, true);
        let helm = MockHelmClient::new();

        AdminConsole::default()
            .install(&cluster, &helm, &[])
            .await
            .unwrap();

        assert!(cluster.secret(NAMESPACE, PULL_SECRET_NAME).is_none());
        assert!(cluster.secret(registry::NAMESPACE, "registry-auth").is_none());
    }
}
