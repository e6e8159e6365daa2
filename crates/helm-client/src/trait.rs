//! HelmClient trait for mocking
//!
//! Abstracts the Helm client so orchestration code can run against an
//! in-memory implementation in unit tests.

use crate::error::HelmError;
use crate::models::{InstallOptions, UpgradeOptions};

/// Trait for Helm release operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait HelmClientTrait: Send + Sync {
    /// Returns whether a release exists in the namespace, in any deployed,
    /// failed, or pending state.
    async fn release_exists(&self, namespace: &str, release_name: &str) -> Result<bool, HelmError>;

    /// Returns the chart version of the deployed release.
    async fn latest_release_version(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<String, HelmError>;

    /// Installs a new release.
    async fn install(&self, opts: InstallOptions) -> Result<(), HelmError>;

    /// Upgrades an existing release.
    async fn upgrade(&self, opts: UpgradeOptions) -> Result<(), HelmError>;

    /// Uninstalls a release.
    async fn uninstall(&self, namespace: &str, release_name: &str) -> Result<(), HelmError>;
}
