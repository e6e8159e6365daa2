//! Mock HelmClient for unit testing
//!
//! In-memory implementation of `HelmClientTrait` so orchestration code can
//! be tested without a helm binary or a cluster. Records every install and
//! upgrade so tests can assert routing and ordering.

use crate::error::HelmError;
use crate::helm_trait::HelmClientTrait;
use crate::models::{InstallOptions, UpgradeOptions};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock HelmClient for testing
#[derive(Clone, Debug, Default)]
pub struct MockHelmClient {
    // (namespace, release) -> chart version
    releases: Arc<Mutex<HashMap<(String, String), String>>>,
    // (operation, release) in call order
    operations: Arc<Mutex<Vec<(String, String)>>>,
    installs: Arc<Mutex<Vec<InstallOptions>>>,
    upgrades: Arc<Mutex<Vec<UpgradeOptions>>>,
    // release -> injected failure message
    failures: Arc<Mutex<HashMap<String, String>>>,
}

impl MockHelmClient {
    /// Create a new mock client with no releases
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing release (for test setup)
    pub fn seed_release(&self, namespace: &str, release_name: &str, chart_version: &str) {
        self.releases.lock().unwrap().insert(
            (namespace.to_string(), release_name.to_string()),
            chart_version.to_string(),
        );
    }

    /// Make any install or upgrade of the release fail (for test setup)
    pub fn fail_release(&self, release_name: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(release_name.to_string(), message.to_string());
    }

    /// Operations performed so far as `(operation, release)` pairs
    pub fn operations(&self) -> Vec<(String, String)> {
        self.operations.lock().unwrap().clone()
    }

    /// Install calls recorded so far
    pub fn installs(&self) -> Vec<InstallOptions> {
        self.installs.lock().unwrap().clone()
    }

    /// Upgrade calls recorded so far
    pub fn upgrades(&self) -> Vec<UpgradeOptions> {
        self.upgrades.lock().unwrap().clone()
    }

    /// Whether the release currently exists in the mock store
    pub fn has_release(&self, namespace: &str, release_name: &str) -> bool {
        self.releases
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), release_name.to_string()))
    }

    fn injected_failure(&self, op: &str, opts_namespace: &str, release_name: &str) -> Option<HelmError> {
        self.failures
            .lock()
            .unwrap()
            .get(release_name)
            .map(|message| HelmError::Command {
                context: format!("{op} {opts_namespace}/{release_name}"),
                stderr: message.clone(),
            })
    }
}

#[async_trait::async_trait]
impl HelmClientTrait for MockHelmClient {
    async fn release_exists(&self, namespace: &str, release_name: &str) -> Result<bool, HelmError> {
        Ok(self.has_release(namespace, release_name))
    }

    async fn latest_release_version(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<String, HelmError> {
        self.releases
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), release_name.to_string()))
            .cloned()
            .ok_or_else(|| HelmError::ReleaseNotFound {
                namespace: namespace.to_string(),
                release_name: release_name.to_string(),
            })
    }

    async fn install(&self, opts: InstallOptions) -> Result<(), HelmError> {
        if let Some(err) = self.injected_failure("install", &opts.namespace, &opts.release_name) {
            return Err(err);
        }
        self.operations
            .lock()
            .unwrap()
            .push(("install".to_string(), opts.release_name.clone()));
        self.releases.lock().unwrap().insert(
            (opts.namespace.clone(), opts.release_name.clone()),
            opts.chart_version.clone(),
        );
        self.installs.lock().unwrap().push(opts);
        Ok(())
    }

    async fn upgrade(&self, opts: UpgradeOptions) -> Result<(), HelmError> {
        if let Some(err) = self.injected_failure("upgrade", &opts.namespace, &opts.release_name) {
            return Err(err);
        }
        let key = (opts.namespace.clone(), opts.release_name.clone());
        let mut releases = self.releases.lock().unwrap();
        if !releases.contains_key(&key) {
            return Err(HelmError::Command {
                context: format!("upgrade {}/{}", opts.namespace, opts.release_name),
                stderr: "has no deployed releases".to_string(),
            });
        }
        releases.insert(key, opts.chart_version.clone());
        drop(releases);
        self.operations
            .lock()
            .unwrap()
            .push(("upgrade".to_string(), opts.release_name.clone()));
        self.upgrades.lock().unwrap().push(opts);
        Ok(())
    }

    async fn uninstall(&self, namespace: &str, release_name: &str) -> Result<(), HelmError> {
        self.releases
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), release_name.to_string()));
        self.operations
            .lock()
            .unwrap()
            .push(("uninstall".to_string(), release_name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn install_opts(release_name: &str, chart_version: &str) -> InstallOptions {
        InstallOptions {
            namespace: "registry".to_string(),
            release_name: release_name.to_string(),
            chart_location: "oci://charts.embeddedcluster.io/docker-registry".to_string(),
            chart_version: chart_version.to_string(),
            values: json!({}),
        }
    }

    #[tokio::test]
    async fn releases_come_and_go_with_install_and_uninstall() {
        let mock = MockHelmClient::new();
        assert!(!mock.release_exists("registry", "registry").await.unwrap());

        mock.install(install_opts("registry", "2.2.3")).await.unwrap();
        assert!(mock.release_exists("registry", "registry").await.unwrap());
        assert_eq!(
            mock.latest_release_version("registry", "registry")
                .await
                .unwrap(),
            "2.2.3"
        );

        mock.uninstall("registry", "registry").await.unwrap();
        assert!(!mock.release_exists("registry", "registry").await.unwrap());
        assert!(matches!(
            mock.latest_release_version("registry", "registry").await,
            Err(HelmError::ReleaseNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upgrade_requires_a_deployed_release() {
        let mock = MockHelmClient::new();
        let err = mock
            .upgrade(UpgradeOptions {
                namespace: "registry".to_string(),
                release_name: "registry".to_string(),
                chart_location: "oci://charts.embeddedcluster.io/docker-registry".to_string(),
                chart_version: "2.2.3".to_string(),
                values: json!({}),
                force: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("has no deployed releases"));
        // the aborted call is not recorded
        assert!(mock.operations().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_fire_before_recording() {
        let mock = MockHelmClient::new();
        mock.fail_release("registry", "boom");
        let err = mock
            .install(install_opts("registry", "2.2.3"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "helm install registry/registry: boom");
        assert!(mock.operations().is_empty());
        assert!(!mock.has_release("registry", "registry"));
    }
}
