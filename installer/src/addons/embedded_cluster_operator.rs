//! Embedded-cluster operator
//!
//! The in-cluster controller that reconciles the Installation record after
//! the installer exits. Chart location, chart version, and images come from
//! the vendor release metadata rather than the built-in constants, so the
//! operator always matches the release being applied.

use crate::addons::proxy_env;
use crate::error::Error;
use crate::wait;
use cluster_client::ClusterClientTrait;
use crds::{ProxySpec, ReleaseMetadata, split_image};
use helm_client::{HelmClientTrait, InstallOptions, UpgradeOptions, values};
use serde_json::{Value, json};

pub(crate) const RELEASE_NAME: &str = "embedded-cluster-operator";
pub(crate) const NAMESPACE: &str = "embedded-cluster";
pub(crate) const CHART_LOCATION: &str =
    "oci://charts.embeddedcluster.io/embedded-cluster-operator";
pub(crate) const CHART_VERSION: &str = "1.22.0";

/// Chart entry looked up in the release metadata.
const OPERATOR_CHART_NAME: &str = "embedded-cluster-operator";
/// Image reference looked up in the release metadata.
const OPERATOR_IMAGE_NAME: &str = "embedded-cluster-operator-image";
/// Utility image looked up in the release metadata, optional.
const UTILS_IMAGE_NAME: &str = "ec-utils";

/// Default vendor binary name reported when no override is set.
const DEFAULT_BINARY_NAME: &str = "embedded-cluster";

/// Embedded-cluster operator add-on.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedClusterOperator {
    pub is_airgap: bool,
    pub proxy: Option<ProxySpec>,
    pub cluster_id: String,
    pub binary_name_override: Option<String>,
    pub chart_location_override: Option<String>,
    pub chart_version_override: Option<String>,
    pub image_repo_override: Option<String>,
    pub image_tag_override: Option<String>,
    pub utils_image_override: Option<String>,
}

/// Returns the operator image reference pinned by the release metadata.
pub fn operator_image(metadata: &ReleaseMetadata) -> Result<&str, Error> {
    metadata
        .find_image(OPERATOR_IMAGE_NAME)
        .ok_or_else(|| Error::ImageNotFound {
            name: OPERATOR_IMAGE_NAME.to_string(),
        })
}

impl EmbeddedClusterOperator {
    /// Builds the descriptor from the release metadata and installation
    /// identity. Fails when the metadata names no operator chart or image.
    pub fn from_metadata(
        metadata: &ReleaseMetadata,
        cluster_id: &str,
        binary_name: &str,
        is_airgap: bool,
        proxy: Option<ProxySpec>,
    ) -> Result<Self, Error> {
        let chart = metadata
            .find_chart(OPERATOR_CHART_NAME)
            .ok_or_else(|| Error::ChartNotFound {
                name: OPERATOR_CHART_NAME.to_string(),
            })?;
        let (image_repo, image_tag) = split_image(operator_image(metadata)?);
        Ok(Self {
            is_airgap,
            proxy,
            cluster_id: cluster_id.to_string(),
            binary_name_override: (!binary_name.is_empty()).then(|| binary_name.to_string()),
            chart_location_override: Some(chart.chart_name.clone()),
            chart_version_override: Some(chart.version.clone()),
            image_repo_override: Some(image_repo),
            image_tag_override: (!image_tag.is_empty()).then_some(image_tag),
            utils_image_override: metadata.find_image(UTILS_IMAGE_NAME).map(str::to_string),
        })
    }

    pub(crate) fn chart_location(&self) -> &str {
        self.chart_location_override.as_deref().unwrap_or(CHART_LOCATION)
    }

    pub(crate) fn chart_version(&self) -> &str {
        self.chart_version_override.as_deref().unwrap_or(CHART_VERSION)
    }

    /// Generated chart values.
    pub fn helm_values(&self) -> Value {
        let mut values = json!({
            "isAirgap": self.is_airgap,
            "embeddedClusterID": self.cluster_id,
            "embeddedBinaryName": self
                .binary_name_override
                .as_deref()
                .unwrap_or(DEFAULT_BINARY_NAME),
        });
        let mut image = serde_json::Map::new();
        if let Some(repo) = &self.image_repo_override {
            image.insert("repository".to_string(), json!(repo));
        }
        if let Some(tag) = &self.image_tag_override {
            image.insert("tag".to_string(), json!(tag));
        }
        if !image.is_empty() {
            values["image"] = Value::Object(image);
        }
        if let Some(utils) = &self.utils_image_override {
            values["utilsImage"] = json!(utils);
        }
        if self.proxy.is_some() {
            values["extraEnv"] = json!(proxy_env(self.proxy.as_ref()));
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
            chart_location: self.chart_location().to_string(),
            chart_version: self.chart_version().to_string(),
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
            chart_location: self.chart_location().to_string(),
            chart_version: self.chart_version().to_string(),
            values,
            force: false,
        })
        .await?;
        Ok(())
    }
}
