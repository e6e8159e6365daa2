//! OpenEBS storage provisioner
//!
//! Provides the hostpath storage class that every other add-on's persistent
//! volumes land on, which is why it always applies first.

use crate::error::Error;
use crate::wait;
use cluster_client::ClusterClientTrait;
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "openebs";
pub(crate) const NAMESPACE: &str = "openebs";
pub(crate) const CHART_LOCATION: &str = "oci://charts.embeddedcluster.io/openebs";
pub(crate) const CHART_VERSION: &str = "3.10.0";

/// Deployment the readiness wait keys on.
const PROVISIONER_DEPLOYMENT: &str = "openebs-localpv-provisioner";

/// OpenEBS storage provisioner add-on.
#[derive(Debug, Clone, Default)]
pub struct OpenEbs;

impl OpenEbs {
    /// Generated chart values. The node disk manager stays off; only the
    /// localpv provisioner runs, and its hostpath class is the default.
    pub fn helm_values(&self) -> Value {
        json!({
            "ndmOperator": {
                "enabled": false,
            },
            "ndm": {
                "enabled": false,
            },
            "localprovisioner": {
                "hostpathClass": {
                    "enabled": true,
                    "isDefaultClass": true,
                },
            },
        })
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
        wait::wait_for_deployment(cluster, NAMESPACE, PROVISIONER_DEPLOYMENT).await
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
