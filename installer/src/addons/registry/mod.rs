//! In-cluster image registry
//!
//! Airgapped clusters pull application images from this registry instead of
//! an upstream one. It starts out single-replica on hostpath storage; when
//! the cluster goes highly available it is rescaled onto the object store,
//! with [`migrate`] moving the existing data across.

pub mod migrate;

use crate::addons::{from_json, random_key, seaweedfs, secret_value};
use crate::error::Error;
use crate::netutils::lower_band_ip;
use crate::wait;
use cluster_client::{ClusterClientTrait, ClusterError};
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use k8s_openapi::api::core::v1::Secret;
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "registry";
pub(crate) const NAMESPACE: &str = "registry";
pub(crate) const CHART_LOCATION: &str = "oci://charts.embeddedcluster.io/docker-registry";
pub(crate) const CHART_VERSION: &str = "2.2.3";

/// Registry image tag shipped with the chart.
const IMAGE_TAG: &str = "2.8.3";

/// Secret holding the htpasswd credentials the registry authenticates with.
const AUTH_SECRET_NAME: &str = "registry-auth";
/// Username written into the auth secret.
const AUTH_USERNAME: &str = "embedded-cluster";
/// Secret the S3 credentials are copied into for the highly available
/// registry and the data migration job.
pub(crate) const S3_CREDENTIALS_SECRET: &str = "registry-s3-credentials";

/// Offset of the registry service address within the service CIDR.
const REGISTRY_SERVICE_IP_INDEX: u32 = 10;
const REGISTRY_PORT: u16 = 5000;

/// Image registry add-on.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub service_cidr: String,
    pub is_ha: bool,
}

/// Returns the `host:port` endpoint the registry service is pinned to.
pub(crate) fn registry_endpoint(service_cidr: &str) -> Result<String, Error> {
    let ip = lower_band_ip(service_cidr, REGISTRY_SERVICE_IP_INDEX)?;
    Ok(format!("{ip}:{REGISTRY_PORT}"))
}

/// Returns the registry credentials, generating and storing them on first
/// use. Re-runs hand back the stored pair rather than rotating it.
pub(crate) async fn registry_credentials(
    cluster: &dyn ClusterClientTrait,
) -> Result<(String, String), Error> {
    if let Some(existing) = cluster.get_secret(NAMESPACE, AUTH_SECRET_NAME).await? {
        let read_key = |key: &str| {
            secret_value(&existing, key).ok_or_else(|| {
                Error::Cluster(ClusterError::NotFound(format!(
                    "key {key} in secret {NAMESPACE}/{AUTH_SECRET_NAME}"
                )))
            })
        };
        return Ok((read_key("username")?, read_key("password")?));
    }

    let username = AUTH_USERNAME.to_string();
    let password = random_key(20);
    // TODO render a bcrypt htpasswd entry instead of storing the pair raw
    let htpasswd = format!("{username}:{password}");
    let secret: Secret = from_json(json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": AUTH_SECRET_NAME,
            "namespace": NAMESPACE,
        },
        "stringData": {
            "username": username,
            "password": password,
            "htpasswd": htpasswd,
        },
        "type": "Opaque",
    }))?;
    cluster.apply_secret(NAMESPACE, &secret).await?;
    Ok((username, password))
}

impl Registry {
    /// Generated chart values. The base configuration runs one replica on
    /// hostpath storage; highly available clusters switch to two replicas
    /// backed by the object store.
    pub fn helm_values(&self) -> Result<Value, Error> {
        let cluster_ip = lower_band_ip(&self.service_cidr, REGISTRY_SERVICE_IP_INDEX)?;
        let mut values = json!({
            "replicaCount": 1,
            "fullnameOverride": "registry",
            "image": {
                "tag": IMAGE_TAG,
            },
            // Not a backend the chart recognizes; keeps the chart's own
            // storage volumes out of the pod.
            "storage": "hostpath",
            "configData": {
                "auth": {
                    "htpasswd": {
                        "realm": "Registry",
                        "path": "/auth/htpasswd",
                    },
                },
                "storage": {
                    "filesystem": {
                        "rootdirectory": "/var/lib/registry",
                    },
                },
            },
            "service": {
                "clusterIP": cluster_ip.to_string(),
            },
            "extraVolumeMounts": [
                {"name": "auth", "mountPath": "/auth"},
                {"name": "registry-data", "mountPath": "/var/lib/registry"},
            ],
            "extraVolumes": [
                {"name": "auth", "secret": {"secretName": AUTH_SECRET_NAME}},
                {"name": "registry-data", "hostPath": {"path": "/var/lib/embedded-cluster/registry"}},
            ],
        });
        if self.is_ha {
            values["replicaCount"] = json!(2);
            values["storage"] = json!("s3");
            values["configData"]["storage"] = json!({
                "s3": {
                    "region": "us-east-1",
                    "regionendpoint": seaweedfs::s3_endpoint(&self.service_cidr)?,
                    "bucket": "registry",
                    "encrypt": false,
                    "secure": false,
                },
            });
            values["secrets"] = json!({
                "s3": {"secretRef": S3_CREDENTIALS_SECRET},
            });
            values["extraVolumeMounts"] = json!([
                {"name": "auth", "mountPath": "/auth"},
            ]);
            values["extraVolumes"] = json!([
                {"name": "auth", "secret": {"secretName": AUTH_SECRET_NAME}},
            ]);
        }
        Ok(values)
    }

    pub async fn install(
        &self,
        cluster: &dyn ClusterClientTrait,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        cluster.ensure_namespace(NAMESPACE).await?;
        registry_credentials(cluster).await?;
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
    use cluster_client::MockClusterClient;

    #[test]
    fn endpoint_is_pinned_inside_the_cidr() {
        assert_eq!(registry_endpoint("10.96.0.0/12").unwrap(), "10.96.0.11:5000");
    }

    #[test]
    fn base_values_run_one_replica_on_hostpath() {
        let values = Registry {
            service_cidr: "10.96.0.0/12".to_string(),
            is_ha: false,
        }
        .helm_values()
        .unwrap();
        assert_eq!(values["replicaCount"], 1);
        assert_eq!(values["service"]["clusterIP"], "10.96.0.11");
        assert_eq!(
            values["configData"]["storage"]["filesystem"]["rootdirectory"],
            "/var/lib/registry"
        );
        assert!(values["configData"]["storage"].get("s3").is_none());
    }

    #[test]
    fn ha_values_scale_out_onto_the_object_store() {
        let values = Registry {
            service_cidr: "10.96.0.0/12".to_string(),
            is_ha: true,
        }
        .helm_values()
        .unwrap();
        assert_eq!(values["replicaCount"], 2);
        assert_eq!(values["storage"], "s3");
        assert_eq!(
            values["configData"]["storage"]["s3"]["regionendpoint"],
            "http://10.96.0.12:8333"
        );
        assert_eq!(values["secrets"]["s3"]["secretRef"], S3_CREDENTIALS_SECRET);
        // the hostpath data volume is gone, only the auth mount remains
        assert_eq!(values["extraVolumes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn values_reject_a_bad_cidr() {
        let err = Registry {
            service_cidr: "bogus".to_string(),
            is_ha: false,
        }
        .helm_values()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCidr { .. }));
    }

    #[tokio::test]
    async fn credentials_are_stable_across_calls() {
        let cluster = MockClusterClient::new();
        let (user, pass) = registry_credentials(&cluster).await.unwrap();
        assert_eq!(user, "embedded-cluster");
        assert_eq!(pass.len(), 20);

        let (_, again) = registry_credentials(&cluster).await.unwrap();
        assert_eq!(again, pass);

        let secret = cluster.secret(NAMESPACE, AUTH_SECRET_NAME).unwrap();
        assert_eq!(
            secret_value(&secret, "htpasswd").unwrap(),
            format!("{user}:{pass}")
        );
    }
}
