//! Embedded-cluster add-on installer
//!
//! Sequences the built-in add-ons of an embedded cluster: installs them on
//! first boot, upgrades them when a new vendor release is applied, and
//! drives the transition to high availability once enough controllers have
//! joined. The outcome of every run is recorded on the cluster's
//! Installation resource.

mod addons;
mod error;
mod netutils;
mod wait;

use crate::addons::{InstallOptions, highavailability};
use crate::error::Error;
use cluster_client::ClusterClient;
use crds::{Installation, InstallationState, ProxySpec, ReleaseMetadata};
use helm_client::HelmClient;
use std::env;
use std::fs;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What one run of the installer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Install,
    Upgrade,
    EnableHa,
}

fn parse_action(value: &str) -> Result<Action, Error> {
    match value {
        "install" => Ok(Action::Install),
        "upgrade" => Ok(Action::Upgrade),
        "enable-ha" => Ok(Action::EnableHa),
        other => Err(Error::InvalidConfig(format!(
            "unknown action {other:?}, expected install, upgrade, or enable-ha"
        ))),
    }
}

/// Reads a boolean flag from the environment; absent means false.
fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.as_str(), "1" | "true"))
        .unwrap_or(false)
}

fn proxy_from_vars(http_proxy: String, https_proxy: String, no_proxy: String) -> Option<ProxySpec> {
    if http_proxy.is_empty() && https_proxy.is_empty() && no_proxy.is_empty() {
        return None;
    }
    Some(ProxySpec {
        http_proxy,
        https_proxy,
        no_proxy,
    })
}

/// Loads the vendor release metadata document shipped with the binary.
fn load_metadata(path: &str) -> Result<ReleaseMetadata, Error> {
    let raw = fs::read_to_string(path).map_err(|err| Error::Metadata {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    serde_yaml::from_str(&raw).map_err(|err| Error::Metadata {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    info!("Starting embedded-cluster installer");

    // Load configuration from environment variables
    let action = env::var("EC_ACTION").map_err(|_| {
        Error::InvalidConfig("EC_ACTION environment variable is required".to_string())
    })?;
    let action = parse_action(&action)?;
    let metadata_path = env::var("EC_METADATA_PATH").map_err(|_| {
        Error::InvalidConfig("EC_METADATA_PATH environment variable is required".to_string())
    })?;
    let binary_name =
        env::var("EC_BINARY_NAME").unwrap_or_else(|_| "embedded-cluster".to_string());
    let service_cidr = env::var("EC_SERVICE_CIDR").unwrap_or_else(|_| "10.96.0.0/12".to_string());
    let airgap = env_flag("EC_AIRGAP");
    let disaster_recovery = env_flag("EC_DISASTER_RECOVERY");
    let proxy = proxy_from_vars(
        env::var("EC_HTTP_PROXY").unwrap_or_default(),
        env::var("EC_HTTPS_PROXY").unwrap_or_default(),
        env::var("EC_NO_PROXY").unwrap_or_default(),
    );

    info!("Configuration:");
    info!("  Action: {action:?}");
    info!("  Metadata path: {metadata_path}");
    info!("  Binary name: {binary_name}");
    info!("  Service CIDR: {service_cidr}");
    info!("  Airgap: {airgap}");
    info!("  Disaster recovery: {disaster_recovery}");
    info!(
        "  Proxy: {}",
        if proxy.is_some() { "configured" } else { "none" }
    );

    let metadata = load_metadata(&metadata_path)?;
    let cluster = ClusterClient::try_default().await?;
    let helm = HelmClient::new()?;

    match action {
        Action::Install => {
            let opts = InstallOptions {
                cluster_id: uuid::Uuid::new_v4().to_string(),
                binary_name,
                airgap,
                proxy,
                service_cidr,
                disaster_recovery,
            };
            run_install(&cluster, &helm, &opts, &metadata).await
        }
        Action::Upgrade => run_upgrade(&cluster, &helm, &metadata).await,
        Action::EnableHa => run_enable_ha(&cluster, &helm, &metadata).await,
    }
}

/// Creates the Installation record for a fresh cluster and applies every
/// add-on its shape selects.
async fn run_install(
    cluster: &ClusterClient,
    helm: &HelmClient,
    opts: &InstallOptions,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    let name = Installation::generate_name();
    let installation = Installation::new(&name, opts.installation_spec());
    cluster.create_installation(&installation).await?;
    info!("created installation {name}");
    cluster
        .update_installation_status(
            &name,
            InstallationState::KubernetesInstalled,
            "Kubernetes is ready",
        )
        .await?;
    cluster
        .update_installation_status(&name, InstallationState::AddonsInstalling, "Installing addons")
        .await?;

    let outcome = addons::install_all(cluster, helm, opts, metadata).await;
    record_outcome(cluster, &name, outcome).await
}

/// Re-applies every add-on of the latest installation at the versions the
/// given release metadata pins.
async fn run_upgrade(
    cluster: &ClusterClient,
    helm: &HelmClient,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    let installation = cluster.get_latest_installation().await?;
    let name = installation.metadata.name.clone().unwrap_or_default();
    info!("upgrading installation {name}");
    cluster
        .update_installation_status(&name, InstallationState::AddonsInstalling, "Upgrading addons")
        .await?;

    let outcome = addons::upgrade_all(cluster, helm, &installation, metadata).await;
    record_outcome(cluster, &name, outcome).await
}

/// Transitions the cluster to high availability, refusing when the cluster
/// is not eligible.
async fn run_enable_ha(
    cluster: &ClusterClient,
    helm: &HelmClient,
    metadata: &ReleaseMetadata,
) -> Result<(), Error> {
    let status = highavailability::can_enable_ha(cluster).await?;
    if !status.can_enable {
        error!("cannot enable high availability: {}", status.reason);
        return Err(Error::InvalidConfig(format!(
            "cannot enable high availability: {}",
            status.reason
        )));
    }

    let installation = cluster.get_latest_installation().await?;
    let service_cidr = installation
        .spec
        .network
        .as_ref()
        .map(|network| network.service_cidr.clone())
        .unwrap_or_default();
    highavailability::enable_ha(
        Arc::new(cluster.clone()),
        helm,
        installation.spec.air_gap,
        &service_cidr,
        installation.spec.proxy.as_ref(),
        installation.spec.config.as_ref(),
        metadata,
    )
    .await
}

/// Records the outcome of a sequencing run on the Installation status. A
/// failure is recorded best-effort and then propagated.
async fn record_outcome(
    cluster: &ClusterClient,
    name: &str,
    outcome: Result<(), Error>,
) -> Result<(), Error> {
    match outcome {
        Ok(()) => {
            cluster
                .update_installation_status(name, InstallationState::AddonsInstalled, "Addons are ready")
                .await?;
            cluster
                .update_installation_status(
                    name,
                    InstallationState::Installed,
                    "Installation is complete",
                )
                .await?;
            info!("installation {name} is complete");
            Ok(())
        }
        Err(err) => {
            if let Err(status_err) = cluster
                .update_installation_status(name, InstallationState::Failed, &err.to_string())
                .await
            {
                warn!("failed to record failure on installation {name}: {status_err}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_by_name() {
        assert_eq!(parse_action("install").unwrap(), Action::Install);
        assert_eq!(parse_action("upgrade").unwrap(), Action::Upgrade);
        assert_eq!(parse_action("enable-ha").unwrap(), Action::EnableHa);
        assert!(parse_action("reinstall").is_err());
    }

    #[test]
    fn proxy_is_none_when_nothing_is_set() {
        assert!(proxy_from_vars(String::new(), String::new(), String::new()).is_none());
        let proxy = proxy_from_vars(
            "http://proxy.example.com".to_string(),
            String::new(),
            String::new(),
        )
        .unwrap();
        assert_eq!(proxy.http_proxy, "http://proxy.example.com");
        assert_eq!(proxy.no_proxy, "");
    }
}
