//! ClusterClient trait for mocking
//!
//! Abstracts the Kubernetes object store so orchestration code can be
//! tested against an in-memory implementation.

use crate::error::ClusterError;
use crds::{Installation, InstallationState};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};

/// Trait for the Kubernetes object-store operations the installer performs
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // Installation records
    /// Returns the Installation with the greatest name; names are creation
    /// timestamps, so this is the most recent record.
    async fn get_latest_installation(&self) -> Result<Installation, ClusterError>;
    /// Creates a new Installation record.
    async fn create_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError>;
    /// Replaces an existing Installation record.
    async fn update_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError>;
    /// Patches the status subresource of an Installation record.
    async fn update_installation_status(
        &self,
        name: &str,
        state: InstallationState,
        reason: &str,
    ) -> Result<(), ClusterError>;

    // Cluster state lookups
    /// Whether a ConfigMap exists, without reading it.
    async fn configmap_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;
    /// Reads a ConfigMap, `None` when absent.
    async fn get_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError>;
    /// Counts nodes labelled as control plane members.
    async fn count_control_plane_nodes(&self) -> Result<usize, ClusterError>;
    /// Whether a namespace exists.
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError>;
    /// Creates a namespace unless it already exists.
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ClusterError>;

    // Secrets
    /// Reads a Secret, `None` when absent.
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, ClusterError>;
    /// Server-side applies a Secret.
    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError>;

    // Services
    /// Server-side applies a Service.
    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<(), ClusterError>;

    // Jobs
    /// Server-side applies a Job.
    async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), ClusterError>;
    /// Reads a Job, `None` when absent.
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError>;

    // Workload readiness
    /// Whether the deployment's ready replica count matches its desired count.
    async fn deployment_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;
    /// Whether the statefulset's ready replica count matches its desired count.
    async fn statefulset_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;
}
