//! High availability transition
//!
//! Once a cluster has three control plane nodes it can be switched to run
//! highly available. The switch is forward-only: eligibility is checked up
//! front, then each phase builds on the previous one, and a failure leaves
//! the cluster partway through for a retry to resume. Nothing here rolls
//! back.

use crate::addons::registry::{self, Registry, migrate};
use crate::addons::seaweedfs::{self, SeaweedFs};
use crate::addons::{addon_overrides, admin_console, embedded_cluster_operator};
use crate::error::Error;
use cluster_client::ClusterClientTrait;
use crds::{ConfigSpec, ProxySpec, ReleaseMetadata};
use helm_client::HelmClientTrait;
use std::sync::Arc;
use tracing::{error, info};

/// Namespace the restore marker lives in.
const RESTORE_STATE_NAMESPACE: &str = "embedded-cluster";
/// ConfigMap a disaster recovery restore parks its state in. While it
/// exists, a restore is underway.
const RESTORE_STATE_CONFIGMAP: &str = "ec-restore-state";

const REASON_ALREADY_ENABLED: &str = "already enabled";
const REASON_RESTORE_IN_PROGRESS: &str = "a restore is in progress";
const REASON_NOT_ENOUGH_CONTROLLERS: &str = "number of control plane nodes is less than 3";

/// Whether high availability can be enabled, and if not, why not.
///
/// The reason is advisory output for the caller to display; it is not a
/// lock, and a later enable call re-derives nothing from it.
#[derive(Debug, Clone)]
pub struct HaStatus {
    pub can_enable: bool,
    pub reason: String,
}

impl HaStatus {
    fn blocked(reason: &str) -> Self {
        Self {
            can_enable: false,
            reason: reason.to_string(),
        }
    }
}

/// Phases of the transition, in the order they run. Airgapped clusters go
/// through all of them; online clusters skip the two registry phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HaPhase {
    Ineligible,
    Eligible,
    Migrating,
    RegistryScaling,
    AdminConsoleUpdating,
    Recorded,
    Failed,
}

/// Checks the three eligibility guards in order and reports the first one
/// that blocks the transition.
pub async fn can_enable_ha(cluster: &dyn ClusterClientTrait) -> Result<HaStatus, Error> {
    let status = check_eligibility(cluster).await?;
    if !status.can_enable {
        info!(phase = ?HaPhase::Ineligible, "high availability is blocked: {}", status.reason);
    }
    Ok(status)
}

async fn check_eligibility(cluster: &dyn ClusterClientTrait) -> Result<HaStatus, Error> {
    let installation = cluster.get_latest_installation().await?;
    if installation.spec.high_availability {
        return Ok(HaStatus::blocked(REASON_ALREADY_ENABLED));
    }
    if cluster
        .configmap_exists(RESTORE_STATE_NAMESPACE, RESTORE_STATE_CONFIGMAP)
        .await?
    {
        return Ok(HaStatus::blocked(REASON_RESTORE_IN_PROGRESS));
    }
    if cluster.count_control_plane_nodes().await? < 3 {
        return Ok(HaStatus::blocked(REASON_NOT_ENOUGH_CONTROLLERS));
    }
    Ok(HaStatus {
        can_enable: true,
        reason: String::new(),
    })
}

/// Switches the cluster to high availability.
///
/// Airgapped clusters first get the object store and have their registry
/// data migrated onto it, then the registry and admin console are rescaled,
/// and finally the Installation record is updated. The caller is expected
/// to have checked [`can_enable_ha`].
pub async fn enable_ha(
    cluster: Arc<dyn ClusterClientTrait>,
    helm: &dyn HelmClientTrait,
    is_airgap: bool,
    service_cidr: &str,
    proxy: Option<&ProxySpec>,
    config: Option<&ConfigSpec>,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    if let Err(err) = enable_ha_inner(
        cluster, helm, is_airgap, service_cidr, proxy, config, metadata,
    )
    .await
    {
        error!(phase = ?HaPhase::Failed, "failed to enable high availability: {err}");
        return Err(err);
    }
    Ok(())
}

async fn enable_ha_inner(
    cluster: Arc<dyn ClusterClientTrait>,
    helm: &dyn HelmClientTrait,
    is_airgap: bool,
    service_cidr: &str,
    proxy: Option<&ProxySpec>,
    config: Option<&ConfigSpec>,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    info!(phase = ?HaPhase::Eligible, "enabling high availability");

    if is_airgap {
        let object_store = SeaweedFs {
            service_cidr: service_cidr.to_string(),
        };
        let exists = helm
            .release_exists(seaweedfs::NAMESPACE, seaweedfs::RELEASE_NAME)
            .await
            .map_err(|err| Error::step("check", seaweedfs::RELEASE_NAME, err.into()))?;
        if !exists {
            info!(phase = ?HaPhase::Migrating, "installing the object store");
            let overrides = addon_overrides(config, seaweedfs::RELEASE_NAME);
            object_store
                .install(cluster.as_ref(), helm, &overrides)
                .await
                .map_err(|err| Error::step("install", seaweedfs::RELEASE_NAME, err))?;
        }

        info!(phase = ?HaPhase::Migrating, "migrating registry data to the object store");
        let operator_image = embedded_cluster_operator::operator_image(metadata)?.to_string();
        let (progress, errors) =
            migrate::run_data_migration_job(Arc::clone(&cluster), &operator_image, service_cidr)
                .await?;
        migrate::wait_for_job_and_log_progress(progress, errors).await?;

        info!(phase = ?HaPhase::RegistryScaling, "scaling the registry onto the object store");
        let registry_addon = Registry {
            service_cidr: service_cidr.to_string(),
            is_ha: true,
        };
        let overrides = addon_overrides(config, registry::RELEASE_NAME);
        registry_addon
            .upgrade(helm, &overrides)
            .await
            .map_err(|err| Error::step("upgrade", registry::RELEASE_NAME, err))?;
    }

    info!(phase = ?HaPhase::AdminConsoleUpdating, "updating the admin console");
    enable_admin_console_ha(helm, is_airgap, service_cidr, proxy, config).await?;

    info!(phase = ?HaPhase::Recorded, "recording high availability on the installation");
    let mut installation = cluster.get_latest_installation().await?;
    installation.spec.high_availability = true;
    cluster.update_installation(&installation).await?;

    info!("high availability enabled");
    Ok(())
}

/// Upgrades the admin console in place with high availability on.
async fn enable_admin_console_ha(
    helm: &dyn HelmClientTrait,
    is_airgap: bool,
    service_cidr: &str,
    proxy: Option<&ProxySpec>,
    config: Option<&ConfigSpec>,
) -> Result<(), Error> {
    let console = admin_console::AdminConsole {
        is_airgap,
        is_ha: true,
        proxy: proxy.cloned(),
        service_cidr: (!service_cidr.is_empty()).then(|| service_cidr.to_string()),
    };
    let overrides = addon_overrides(config, admin_console::RELEASE_NAME);
    console
        .upgrade(helm, &overrides)
        .await
        .map_err(|err| Error::step("upgrade", admin_console::RELEASE_NAME, err))
}
