//! SeaweedFS object store
//!
//! Backs the image registry with replicated S3 storage once the cluster
//! runs highly available. Only installed on airgapped HA clusters.

use crate::addons::{from_json, random_key, secret_value};
use crate::error::Error;
use crate::netutils::lower_band_ip;
use crate::wait;
use cluster_client::{ClusterClientTrait, ClusterError};
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use k8s_openapi::api::core::v1::{Secret, Service};
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "seaweedfs";
pub(crate) const NAMESPACE: &str = "seaweedfs";
pub(crate) const CHART_LOCATION: &str = "oci://charts.embeddedcluster.io/seaweedfs";
pub(crate) const CHART_VERSION: &str = "3.71.0";

/// Secret holding the generated S3 credentials and the filer auth config.
pub(crate) const S3_SECRET_NAME: &str = "seaweedfs-s3-secret";
/// Service pinning the S3 endpoint to a known address.
const S3_SERVICE_NAME: &str = "seaweedfs-s3";
/// Offset of the S3 service address within the service CIDR.
const S3_SERVICE_IP_INDEX: u32 = 11;
const S3_PORT: u16 = 8333;

/// StatefulSet the readiness wait keys on.
const MASTER_STATEFULSET: &str = "seaweedfs-master";

/// SeaweedFS object store add-on.
#[derive(Debug, Clone, Default)]
pub struct SeaweedFs {
    pub service_cidr: String,
}

/// Returns the S3 endpoint URL pinned inside the service CIDR.
pub(crate) fn s3_endpoint(service_cidr: &str) -> Result<String, Error> {
    let ip = lower_band_ip(service_cidr, S3_SERVICE_IP_INDEX)?;
    Ok(format!("http://{ip}:{S3_PORT}"))
}

/// Copies the generated S3 credentials into another namespace so workloads
/// there can reach the object store.
pub(crate) async fn copy_s3_credentials(
    cluster: &dyn ClusterClientTrait,
    dest_namespace: &str,
    dest_name: &str,
) -> Result<(), Error> {
    let source = cluster
        .get_secret(NAMESPACE, S3_SECRET_NAME)
        .await?
        .ok_or_else(|| {
            Error::Cluster(ClusterError::NotFound(format!(
                "secret {NAMESPACE}/{S3_SECRET_NAME}"
            )))
        })?;
    let read_key = |key: &str| {
        secret_value(&source, key).ok_or_else(|| {
            Error::Cluster(ClusterError::NotFound(format!(
                "key {key} in secret {NAMESPACE}/{S3_SECRET_NAME}"
            )))
        })
    };
    let secret: Secret = from_json(json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": dest_name,
            "namespace": dest_namespace,
        },
        "stringData": {
            "s3AccessKey": read_key("s3AccessKey")?,
            "s3SecretKey": read_key("s3SecretKey")?,
        },
        "type": "Opaque",
    }))?;
    cluster.apply_secret(dest_namespace, &secret).await?;
    Ok(())
}

impl SeaweedFs {
    /// Generated chart values: three replicas of every component, hostpath
    /// storage, and an S3 filer gateway with one bucket for the registry.
    pub fn helm_values(&self) -> Value {
        json!({
            "master": {
                "replicas": 3,
                "data": {
                    "type": "hostPath",
                    "hostPathPrefix": "/var/lib/embedded-cluster/seaweedfs/ssd",
                },
                "logs": {
                    "type": "hostPath",
                    "hostPathPrefix": "/var/lib/embedded-cluster/seaweedfs/storage",
                },
            },
            "volume": {
                "replicas": 3,
                "dataDirs": [{
                    "name": "data",
                    "type": "hostPath",
                    "hostPathPrefix": "/var/lib/embedded-cluster/seaweedfs/ssd",
                    "maxVolumes": 50,
                }],
            },
            "filer": {
                "replicas": 3,
                "data": {
                    "type": "hostPath",
                    "hostPathPrefix": "/var/lib/embedded-cluster/seaweedfs/ssd",
                },
                "logs": {
                    "type": "hostPath",
                    "hostPathPrefix": "/var/lib/embedded-cluster/seaweedfs/storage",
                },
                "s3": {
                    "enabled": true,
                    "enableAuth": true,
                    "existingConfigSecret": S3_SECRET_NAME,
                    "createBuckets": [{
                        "name": "registry",
                        "anonymousRead": false,
                    }],
                },
            },
        })
    }

    /// Creates the S3 credentials secret unless it already exists, so a
    /// re-run never rotates credentials out from under the registry.
    pub(crate) async fn ensure_s3_secret(
        &self,
        cluster: &dyn ClusterClientTrait,
    ) -> Result<(), Error> {
        if cluster.get_secret(NAMESPACE, S3_SECRET_NAME).await?.is_some() {
            return Ok(());
        }
        let access_key = random_key(20);
        let secret_key = random_key(40);
        let filer_config = json!({
            "identities": [{
                "name": "admin",
                "credentials": [{
                    "accessKey": access_key,
                    "secretKey": secret_key,
                }],
                "actions": ["Admin", "Read", "Write"],
            }],
        });
        let secret: Secret = from_json(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": S3_SECRET_NAME,
                "namespace": NAMESPACE,
                "labels": {
                    "app.kubernetes.io/name": "seaweedfs",
                },
            },
            "stringData": {
                "s3AccessKey": access_key,
                "s3SecretKey": secret_key,
                "seaweedfs_s3_config": filer_config.to_string(),
            },
            "type": "Opaque",
        }))?;
        cluster.apply_secret(NAMESPACE, &secret).await?;
        Ok(())
    }

    /// Applies the S3 Service with its cluster IP pinned inside the service
    /// CIDR, so the registry can be pointed at a stable address.
    async fn ensure_s3_service(&self, cluster: &dyn ClusterClientTrait) -> Result<(), Error> {
        let ip = lower_band_ip(&self.service_cidr, S3_SERVICE_IP_INDEX)?;
        let service: Service = from_json(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": S3_SERVICE_NAME,
                "namespace": NAMESPACE,
                "labels": {
                    "app.kubernetes.io/name": "seaweedfs",
                },
            },
            "spec": {
                "type": "ClusterIP",
                "clusterIP": ip.to_string(),
                "ports": [{
                    "name": "swfs-s3",
                    "port": S3_PORT,
                    "targetPort": S3_PORT,
                    "protocol": "TCP",
                }],
                "selector": {
                    "app.kubernetes.io/name": "seaweedfs",
                    "app.kubernetes.io/component": "filer",
                },
            },
        }))?;
        cluster.apply_service(NAMESPACE, &service).await?;
        Ok(())
    }

    pub async fn install(
        &self,
        cluster: &dyn ClusterClientTrait,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        cluster.ensure_namespace(NAMESPACE).await?;
        self.ensure_s3_secret(cluster).await?;
        self.ensure_s3_service(cluster).await?;
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
        wait::wait_for_statefulset(cluster, NAMESPACE, MASTER_STATEFULSET).await
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
