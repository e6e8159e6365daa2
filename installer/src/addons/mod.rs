//! Built-in add-ons and their apply sequencing
//!
//! Every cluster runs a fixed set of add-ons chosen by the installation's
//! shape: storage first, then the operator, the airgap registry pieces,
//! disaster recovery, and the admin console last. The set is closed, so the
//! add-on is an enum; [`select_addons`] picks and orders the variants and
//! [`apply_addons`] installs or upgrades each one in turn.

pub mod admin_console;
pub mod embedded_cluster_operator;
pub mod highavailability;
pub mod openebs;
pub mod registry;
pub mod seaweedfs;
pub mod velero;

pub use admin_console::AdminConsole;
pub use embedded_cluster_operator::EmbeddedClusterOperator;
pub use openebs::OpenEbs;
pub use registry::Registry;
pub use seaweedfs::SeaweedFs;
pub use velero::Velero;

use crate::error::Error;
use cluster_client::ClusterClientTrait;
use crds::{
    ChartRef, ConfigSpec, Installation, InstallationSpec, LicenseInfo, NetworkSpec, ProxySpec,
    ReleaseMetadata, Repository,
};
use helm_client::{HelmClientTrait, values};
use k8s_openapi::api::core::v1::Secret;
use rand::{Rng, distributions::Alphanumeric};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

/// One built-in add-on, carrying the configuration its variant needs.
#[derive(Debug, Clone)]
pub enum AddOn {
    OpenEbs(OpenEbs),
    EmbeddedClusterOperator(EmbeddedClusterOperator),
    Registry(Registry),
    SeaweedFs(SeaweedFs),
    Velero(Velero),
    AdminConsole(AdminConsole),
}

impl AddOn {
    /// Display name; also the Helm release name.
    pub fn name(&self) -> &str {
        self.release_name()
    }

    pub fn release_name(&self) -> &str {
        match self {
            Self::OpenEbs(_) => openebs::RELEASE_NAME,
            Self::EmbeddedClusterOperator(_) => embedded_cluster_operator::RELEASE_NAME,
            Self::Registry(_) => registry::RELEASE_NAME,
            Self::SeaweedFs(_) => seaweedfs::RELEASE_NAME,
            Self::Velero(_) => velero::RELEASE_NAME,
            Self::AdminConsole(_) => admin_console::RELEASE_NAME,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::OpenEbs(_) => openebs::NAMESPACE,
            Self::EmbeddedClusterOperator(_) => embedded_cluster_operator::NAMESPACE,
            Self::Registry(_) => registry::NAMESPACE,
            Self::SeaweedFs(_) => seaweedfs::NAMESPACE,
            Self::Velero(_) => velero::NAMESPACE,
            Self::AdminConsole(_) => admin_console::NAMESPACE,
        }
    }

    /// Chart version applied for this add-on. The operator's version comes
    /// from the release metadata; everything else is built in.
    pub fn version(&self) -> &str {
        match self {
            Self::OpenEbs(_) => openebs::CHART_VERSION,
            Self::EmbeddedClusterOperator(operator) => operator.chart_version(),
            Self::Registry(_) => registry::CHART_VERSION,
            Self::SeaweedFs(_) => seaweedfs::CHART_VERSION,
            Self::Velero(_) => velero::CHART_VERSION,
            Self::AdminConsole(_) => admin_console::CHART_VERSION,
        }
    }

    pub fn chart_location(&self) -> &str {
        match self {
            Self::OpenEbs(_) => openebs::CHART_LOCATION,
            Self::EmbeddedClusterOperator(operator) => operator.chart_location(),
            Self::Registry(_) => registry::CHART_LOCATION,
            Self::SeaweedFs(_) => seaweedfs::CHART_LOCATION,
            Self::Velero(_) => velero::CHART_LOCATION,
            Self::AdminConsole(_) => admin_console::CHART_LOCATION,
        }
    }

    /// Position in the apply order, storage first and the console last.
    pub fn order(&self) -> i32 {
        match self {
            Self::OpenEbs(_) => 1,
            Self::EmbeddedClusterOperator(_) => 2,
            Self::Registry(_) => 3,
            Self::SeaweedFs(_) => 4,
            Self::Velero(_) => 5,
            Self::AdminConsole(_) => 6,
        }
    }

    pub fn helm_values(&self) -> Result<Value, Error> {
        match self {
            Self::OpenEbs(addon) => Ok(addon.helm_values()),
            Self::EmbeddedClusterOperator(addon) => Ok(addon.helm_values()),
            Self::Registry(addon) => addon.helm_values(),
            Self::SeaweedFs(addon) => Ok(addon.helm_values()),
            Self::Velero(addon) => Ok(addon.helm_values()),
            Self::AdminConsole(addon) => addon.helm_values(),
        }
    }

    /// Chart entry for the cluster config, values rendered to YAML. All
    /// charts ship in the embedded OCI registry, so the repository list is
    /// always empty.
    pub fn generate_helm_config(&self) -> Result<(ChartRef, Vec<Repository>), Error> {
        let chart = ChartRef {
            name: self.release_name().to_string(),
            chart_name: self.chart_location().to_string(),
            version: self.version().to_string(),
            values: values::render(&self.helm_values()?)?,
            namespace: self.namespace().to_string(),
            order: self.order(),
        };
        Ok((chart, Vec::new()))
    }

    pub async fn install(
        &self,
        cluster: &dyn ClusterClientTrait,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        match self {
            Self::OpenEbs(addon) => addon.install(cluster, helm, overrides).await,
            Self::EmbeddedClusterOperator(addon) => addon.install(cluster, helm, overrides).await,
            Self::Registry(addon) => addon.install(cluster, helm, overrides).await,
            Self::SeaweedFs(addon) => addon.install(cluster, helm, overrides).await,
            Self::Velero(addon) => addon.install(cluster, helm, overrides).await,
            Self::AdminConsole(addon) => addon.install(cluster, helm, overrides).await,
        }
    }

    pub async fn upgrade(
        &self,
        helm: &dyn HelmClientTrait,
        overrides: &[String],
    ) -> Result<(), Error> {
        match self {
            Self::OpenEbs(addon) => addon.upgrade(helm, overrides).await,
            Self::EmbeddedClusterOperator(addon) => addon.upgrade(helm, overrides).await,
            Self::Registry(addon) => addon.upgrade(helm, overrides).await,
            Self::SeaweedFs(addon) => addon.upgrade(helm, overrides).await,
            Self::Velero(addon) => addon.upgrade(helm, overrides).await,
            Self::AdminConsole(addon) => addon.upgrade(helm, overrides).await,
        }
    }
}

/// What a fresh install needs to know about the cluster being created.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub cluster_id: String,
    pub binary_name: String,
    pub airgap: bool,
    pub proxy: Option<ProxySpec>,
    pub service_cidr: String,
    pub disaster_recovery: bool,
}

impl InstallOptions {
    /// The Installation spec a fresh install records. High availability is
    /// never on at install time; it is a separate transition later.
    pub fn installation_spec(&self) -> InstallationSpec {
        InstallationSpec {
            cluster_id: self.cluster_id.clone(),
            binary_name: self.binary_name.clone(),
            air_gap: self.airgap,
            high_availability: false,
            network: (!self.service_cidr.is_empty()).then(|| NetworkSpec {
                service_cidr: self.service_cidr.clone(),
                ..Default::default()
            }),
            proxy: self.proxy.clone(),
            license_info: self.disaster_recovery.then(|| LicenseInfo {
                is_disaster_recovery_supported: true,
            }),
            config: None,
        }
    }
}

/// Picks and orders the add-ons for an installation shape.
///
/// OpenEBS is always first and the admin console always last. The registry
/// appears on airgapped clusters, the object store once such a cluster is
/// also highly available, and Velero when the license covers disaster
/// recovery. Fails when the release metadata is missing the operator chart
/// or image.
fn select_addons(spec: &InstallationSpec, metadata: &ReleaseMetadata) -> Result<Vec<AddOn>, Error> {
    let service_cidr = spec
        .network
        .as_ref()
        .map(|network| network.service_cidr.clone())
        .unwrap_or_default();

    let mut addons = vec![AddOn::OpenEbs(OpenEbs)];
    addons.push(AddOn::EmbeddedClusterOperator(
        EmbeddedClusterOperator::from_metadata(
            metadata,
            &spec.cluster_id,
            &spec.binary_name,
            spec.air_gap,
            spec.proxy.clone(),
        )?,
    ));
    if spec.air_gap {
        addons.push(AddOn::Registry(Registry {
            service_cidr: service_cidr.clone(),
            is_ha: spec.high_availability,
        }));
        if spec.high_availability {
            addons.push(AddOn::SeaweedFs(SeaweedFs {
                service_cidr: service_cidr.clone(),
            }));
        }
    }
    if spec
        .license_info
        .as_ref()
        .is_some_and(|license| license.is_disaster_recovery_supported)
    {
        addons.push(AddOn::Velero(Velero {
            proxy: spec.proxy.clone(),
        }));
    }
    addons.push(AddOn::AdminConsole(AdminConsole {
        is_airgap: spec.air_gap,
        is_ha: spec.high_availability,
        proxy: spec.proxy.clone(),
        service_cidr: (!service_cidr.is_empty()).then(|| service_cidr.clone()),
    }));
    Ok(addons)
}

/// The add-ons an upgrade of `installation` applies, in order.
pub fn get_addons_for_upgrade(
    installation: &Installation,
    metadata: &ReleaseMetadata,
) -> Result<Vec<AddOn>, Error> {
    select_addons(&installation.spec, metadata)
}

/// The add-ons a fresh install applies, in order.
pub fn get_addons_for_install(
    opts: &InstallOptions,
    metadata: &ReleaseMetadata,
) -> Result<Vec<AddOn>, Error> {
    select_addons(&opts.installation_spec(), metadata)
}

/// Applies each add-on in order: install when its release is absent,
/// upgrade when it exists. Stops at the first failure; a re-run resumes
/// from wherever the cluster actually is, because the existence check
/// routes already-installed add-ons to upgrade.
pub async fn apply_addons(
    cluster: &dyn ClusterClientTrait,
    helm: &dyn HelmClientTrait,
    config: Option<&ConfigSpec>,
    addons: &[AddOn],
) -> Result<(), Error> {
    for addon in addons {
        let overrides = addon_overrides(config, addon.name());
        let exists = helm
            .release_exists(addon.namespace(), addon.release_name())
            .await
            .map_err(|err| Error::step("check", addon.name(), err.into()))?;
        if exists {
            info!("upgrading {}", addon.name());
            addon
                .upgrade(helm, &overrides)
                .await
                .map_err(|err| Error::step("upgrade", addon.name(), err))?;
        } else {
            info!("installing {}", addon.name());
            addon
                .install(cluster, helm, &overrides)
                .await
                .map_err(|err| Error::step("install", addon.name(), err))?;
        }
    }
    Ok(())
}

/// Selects and applies the add-ons for an upgrade of `installation`.
pub async fn upgrade_all(
    cluster: &dyn ClusterClientTrait,
    helm: &dyn HelmClientTrait,
    installation: &Installation,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    let addons = get_addons_for_upgrade(installation, metadata)?;
    apply_addons(cluster, helm, installation.spec.config.as_ref(), &addons).await
}

/// Selects and applies the add-ons for a fresh install.
pub async fn install_all(
    cluster: &dyn ClusterClientTrait,
    helm: &dyn HelmClientTrait,
    opts: &InstallOptions,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    let addons = get_addons_for_install(opts, metadata)?;
    apply_addons(cluster, helm, None, &addons).await
}

/// Override documents configured for the named add-on, in declaration order.
pub(crate) fn addon_overrides(config: Option<&ConfigSpec>, name: &str) -> Vec<String> {
    config
        .and_then(|config| config.unsupported_overrides.as_ref())
        .map(|overrides| {
            overrides
                .built_in_extensions
                .iter()
                .filter(|extension| extension.name == name)
                .map(|extension| extension.values.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Proxy settings as container env entries, for charts that take a list.
pub(crate) fn proxy_env(proxy: Option<&ProxySpec>) -> Vec<Value> {
    let proxy = match proxy {
        Some(proxy) => proxy,
        None => return Vec::new(),
    };
    vec![
        json!({"name": "HTTP_PROXY", "value": proxy.http_proxy}),
        json!({"name": "HTTPS_PROXY", "value": proxy.https_proxy}),
        json!({"name": "NO_PROXY", "value": proxy.no_proxy}),
    ]
}

/// Proxy settings as a `NAME: value` map, for charts that take one.
pub(crate) fn proxy_env_map(proxy: Option<&ProxySpec>) -> Value {
    let mut map = serde_json::Map::new();
    if let Some(proxy) = proxy {
        map.insert("HTTP_PROXY".to_string(), json!(proxy.http_proxy));
        map.insert("HTTPS_PROXY".to_string(), json!(proxy.https_proxy));
        map.insert("NO_PROXY".to_string(), json!(proxy.no_proxy));
    }
    Value::Object(map)
}

/// Generates an alphanumeric credential of the given length.
pub(crate) fn random_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Reads one key out of a Secret, preferring `stringData` over `data`.
pub(crate) fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret
        .string_data
        .as_ref()
        .and_then(|data| data.get(key))
    {
        return Some(value.clone());
    }
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
}

/// Builds a typed Kubernetes object from a JSON literal.
pub(crate) fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|err| Error::Cluster(err.into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cluster_client::MockClusterClient;
    use crds::{BuiltInExtension, HelmExtensions, UnsupportedOverrides};
    use helm_client::MockHelmClient;

    /// Metadata the way a vendor release ships it.
    pub(crate) fn release_metadata() -> ReleaseMetadata {
        ReleaseMetadata {
            images: vec![
                "proxy.replicated.com/anonymous/replicated/embedded-cluster-operator-image:1.22.0-k8s-1.30-amd64@sha256:929b6cb42add383a69e3b26790c06320bd4eac0ecd60b509212c1864d69c6a88".to_string(),
                "proxy.replicated.com/anonymous/replicated/ec-utils:latest-amd64@sha256:f499ed26bd5899bc5a1ae14d9d13853d1fc615ae21bde86fe250960772fd2c70".to_string(),
            ],
            configs: HelmExtensions {
                charts: vec![ChartRef {
                    name: "embedded-cluster-operator".to_string(),
                    chart_name: "replicated/embedded-cluster-operator".to_string(),
                    version: "1.22.0+k8s-1.30".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn proxy() -> ProxySpec {
        ProxySpec {
            http_proxy: "http://proxy.example.com".to_string(),
            https_proxy: "https://proxy.example.com".to_string(),
            no_proxy: "localhost,127.0.0.1".to_string(),
        }
    }

    fn names(addons: &[AddOn]) -> Vec<&str> {
        addons.iter().map(AddOn::name).collect()
    }

    fn upgrade_installation(spec: InstallationSpec) -> Installation {
        Installation::new("20240102150405", spec)
    }

    #[test]
    fn online_cluster_gets_the_minimal_set() {
        let installation = upgrade_installation(InstallationSpec {
            cluster_id: "e79f0701".to_string(),
            binary_name: "test-binary-name".to_string(),
            ..Default::default()
        });

        let addons = get_addons_for_upgrade(&installation, &release_metadata()).unwrap();
        assert_eq!(
            names(&addons),
            vec!["openebs", "embedded-cluster-operator", "admin-console"]
        );

        let AddOn::EmbeddedClusterOperator(operator) = &addons[1] else {
            panic!("expected the operator second");
        };
        assert!(!operator.is_airgap);
        assert_eq!(operator.cluster_id, "e79f0701");
        assert_eq!(
            operator.binary_name_override.as_deref(),
            Some("test-binary-name")
        );
        assert_eq!(
            operator.chart_location_override.as_deref(),
            Some("replicated/embedded-cluster-operator")
        );
        assert_eq!(
            operator.chart_version_override.as_deref(),
            Some("1.22.0+k8s-1.30")
        );
        assert_eq!(
            operator.image_repo_override.as_deref(),
            Some("proxy.replicated.com/anonymous/replicated/embedded-cluster-operator-image")
        );
        assert_eq!(
            operator.image_tag_override.as_deref(),
            Some("1.22.0-k8s-1.30-amd64@sha256:929b6cb42add383a69e3b26790c06320bd4eac0ecd60b509212c1864d69c6a88")
        );

        let AddOn::AdminConsole(console) = addons.last().unwrap() else {
            panic!("expected the console last");
        };
        assert!(!console.is_airgap);
        assert!(console.service_cidr.is_none());
        assert!(console.proxy.is_none());
    }

    #[test]
    fn airgap_cluster_adds_the_registry() {
        let installation = upgrade_installation(InstallationSpec {
            air_gap: true,
            network: Some(NetworkSpec {
                service_cidr: "10.96.0.0/12".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });

        let addons = get_addons_for_upgrade(&installation, &release_metadata()).unwrap();
        assert_eq!(
            names(&addons),
            vec![
                "openebs",
                "embedded-cluster-operator",
                "registry",
                "admin-console"
            ]
        );

        let AddOn::Registry(registry) = &addons[2] else {
            panic!("expected the registry third");
        };
        assert!(!registry.is_ha);
        assert_eq!(registry.service_cidr, "10.96.0.0/12");

        let AddOn::AdminConsole(console) = addons.last().unwrap() else {
            panic!("expected the console last");
        };
        assert!(console.is_airgap);
        assert_eq!(console.service_cidr.as_deref(), Some("10.96.0.0/12"));
    }

    #[test]
    fn disaster_recovery_adds_velero_even_online() {
        let installation = upgrade_installation(InstallationSpec {
            network: Some(NetworkSpec {
                service_cidr: "10.96.0.0/12".to_string(),
                ..Default::default()
            }),
            license_info: Some(LicenseInfo {
                is_disaster_recovery_supported: true,
            }),
            ..Default::default()
        });

        let addons = get_addons_for_upgrade(&installation, &release_metadata()).unwrap();
        assert_eq!(
            names(&addons),
            vec![
                "openebs",
                "embedded-cluster-operator",
                "velero",
                "admin-console"
            ]
        );

        let AddOn::Velero(velero) = &addons[2] else {
            panic!("expected velero third");
        };
        assert!(velero.proxy.is_none());

        // the service CIDR rides along even though the cluster is online
        let AddOn::AdminConsole(console) = addons.last().unwrap() else {
            panic!("expected the console last");
        };
        assert_eq!(console.service_cidr.as_deref(), Some("10.96.0.0/12"));
    }

    #[test]
    fn airgap_ha_dr_cluster_gets_all_six_in_order() {
        let installation = upgrade_installation(InstallationSpec {
            air_gap: true,
            high_availability: true,
            network: Some(NetworkSpec {
                service_cidr: "10.96.0.0/12".to_string(),
                ..Default::default()
            }),
            proxy: Some(proxy()),
            license_info: Some(LicenseInfo {
                is_disaster_recovery_supported: true,
            }),
            ..Default::default()
        });

        let addons = get_addons_for_upgrade(&installation, &release_metadata()).unwrap();
        assert_eq!(
            names(&addons),
            vec![
                "openebs",
                "embedded-cluster-operator",
                "registry",
                "seaweedfs",
                "velero",
                "admin-console"
            ]
        );

        let AddOn::EmbeddedClusterOperator(operator) = &addons[1] else {
            panic!("expected the operator second");
        };
        assert!(operator.is_airgap);
        assert!(operator.proxy.is_some());

        let AddOn::Registry(registry) = &addons[2] else {
            panic!("expected the registry third");
        };
        assert!(registry.is_ha);

        let AddOn::SeaweedFs(seaweedfs) = &addons[3] else {
            panic!("expected the object store fourth");
        };
        assert_eq!(seaweedfs.service_cidr, "10.96.0.0/12");

        let AddOn::Velero(velero) = &addons[4] else {
            panic!("expected velero fifth");
        };
        assert!(velero.proxy.is_some());

        let AddOn::AdminConsole(console) = addons.last().unwrap() else {
            panic!("expected the console last");
        };
        assert!(console.is_airgap);
        assert!(console.is_ha);
        assert!(console.proxy.is_some());
        assert_eq!(console.service_cidr.as_deref(), Some("10.96.0.0/12"));
    }

    #[test]
    fn missing_operator_chart_fails_selection() {
        let mut metadata = release_metadata();
        metadata.configs.charts.clear();
        let installation = upgrade_installation(InstallationSpec::default());

        let err = get_addons_for_upgrade(&installation, &metadata).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no embedded-cluster-operator chart found in release metadata"
        );
    }

    #[test]
    fn missing_operator_image_fails_selection() {
        let mut metadata = release_metadata();
        metadata.images.clear();
        let installation = upgrade_installation(InstallationSpec::default());

        let err = get_addons_for_upgrade(&installation, &metadata).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no embedded-cluster-operator-image found in release metadata"
        );
    }

    #[test]
    fn install_options_select_like_an_installation() {
        let opts = InstallOptions {
            cluster_id: "e79f0701".to_string(),
            binary_name: "test-binary-name".to_string(),
            airgap: true,
            proxy: None,
            service_cidr: "10.96.0.0/12".to_string(),
            disaster_recovery: true,
        };

        let addons = get_addons_for_install(&opts, &release_metadata()).unwrap();
        assert_eq!(
            names(&addons),
            vec![
                "openebs",
                "embedded-cluster-operator",
                "registry",
                "velero",
                "admin-console"
            ]
        );

        // a fresh install is never highly available
        let AddOn::Registry(registry) = &addons[2] else {
            panic!("expected the registry third");
        };
        assert!(!registry.is_ha);
    }

    #[test]
    fn helm_config_carries_the_apply_order() {
        let spec = InstallationSpec {
            air_gap: true,
            high_availability: true,
            network: Some(NetworkSpec {
                service_cidr: "10.96.0.0/12".to_string(),
                ..Default::default()
            }),
            license_info: Some(LicenseInfo {
                is_disaster_recovery_supported: true,
            }),
            ..Default::default()
        };
        let installation = upgrade_installation(spec);
        let addons = get_addons_for_upgrade(&installation, &release_metadata()).unwrap();

        let mut orders = Vec::new();
        for addon in &addons {
            let (chart, repositories) = addon.generate_helm_config().unwrap();
            assert_eq!(chart.name, addon.release_name());
            assert_eq!(chart.namespace, addon.namespace());
            assert!(!chart.values.is_empty());
            assert!(repositories.is_empty());
            orders.push(chart.order);
        }
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn sequencer_routes_on_release_existence() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(admin_console::NAMESPACE, admin_console::RELEASE_NAME, true);
        let helm = MockHelmClient::new();
        helm.seed_release(openebs::NAMESPACE, openebs::RELEASE_NAME, "3.10.0");

        let addons = vec![
            AddOn::OpenEbs(OpenEbs),
            AddOn::AdminConsole(AdminConsole::default()),
        ];
        apply_addons(&cluster, &helm, None, &addons).await.unwrap();

        assert_eq!(
            helm.operations(),
            vec![
                ("upgrade".to_string(), "openebs".to_string()),
                ("install".to_string(), "admin-console".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn sequencer_stops_at_the_first_failure() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(openebs::NAMESPACE, "openebs-localpv-provisioner", true);
        let helm = MockHelmClient::new();
        helm.fail_release(embedded_cluster_operator::RELEASE_NAME, "boom");

        let addons = vec![
            AddOn::OpenEbs(OpenEbs),
            AddOn::EmbeddedClusterOperator(EmbeddedClusterOperator::default()),
            AddOn::AdminConsole(AdminConsole::default()),
        ];
        let err = apply_addons(&cluster, &helm, None, &addons)
            .await
            .unwrap_err();

        assert!(
            err.to_string()
                .starts_with("install embedded-cluster-operator:")
        );
        // nothing after the failed step ran
        assert_eq!(
            helm.operations(),
            vec![("install".to_string(), "openebs".to_string())]
        );
    }

    #[tokio::test]
    async fn rerun_resumes_as_upgrades() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(openebs::NAMESPACE, "openebs-localpv-provisioner", true);
        let helm = MockHelmClient::new();

        let addons = vec![AddOn::OpenEbs(OpenEbs)];
        apply_addons(&cluster, &helm, None, &addons).await.unwrap();
        apply_addons(&cluster, &helm, None, &addons).await.unwrap();

        assert_eq!(
            helm.operations(),
            vec![
                ("install".to_string(), "openebs".to_string()),
                ("upgrade".to_string(), "openebs".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn value_overrides_reach_the_chart() {
        let cluster = MockClusterClient::new();
        cluster.set_deployment_ready(openebs::NAMESPACE, "openebs-localpv-provisioner", true);
        let helm = MockHelmClient::new();
        let config = ConfigSpec {
            unsupported_overrides: Some(UnsupportedOverrides {
                built_in_extensions: vec![BuiltInExtension {
                    name: "openebs".to_string(),
                    values: "localprovisioner:\n  enabled: false\n".to_string(),
                }],
            }),
        };

        let addons = vec![AddOn::OpenEbs(OpenEbs)];
        apply_addons(&cluster, &helm, Some(&config), &addons)
            .await
            .unwrap();

        let install = helm.installs().into_iter().next().unwrap();
        assert_eq!(install.values["localprovisioner"]["enabled"], false);
        // the generated values underneath the override are still there
        assert_eq!(
            install.values["localprovisioner"]["hostpathClass"]["isDefaultClass"],
            true
        );
    }
}
