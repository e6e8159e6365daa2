//! Mock ClusterClient for unit testing
//!
//! Stores resources in memory and mirrors the not-found semantics of the
//! real client, so orchestration code can be tested without a cluster.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{Installation, InstallationState, InstallationStatus};
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    // Keyed by name; BTreeMap ordering makes "latest" the last entry
    installations: Arc<Mutex<BTreeMap<String, Installation>>>,
    configmaps: Arc<Mutex<HashMap<(String, String), ConfigMap>>>,
    secrets: Arc<Mutex<HashMap<(String, String), Secret>>>,
    services: Arc<Mutex<HashMap<(String, String), Service>>>,
    jobs: Arc<Mutex<HashMap<(String, String), Job>>>,
    control_plane_nodes: Arc<Mutex<usize>>,
    deployments: Arc<Mutex<HashMap<(String, String), bool>>>,
    statefulsets: Arc<Mutex<HashMap<(String, String), bool>>>,
    namespaces: Arc<Mutex<HashSet<String>>>,
}

impl MockClusterClient {
    /// Create a new empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an Installation record (for test setup)
    pub fn add_installation(&self, installation: Installation) {
        self.installations
            .lock()
            .unwrap()
            .insert(installation.name_any(), installation);
    }

    /// Fetch an Installation record by name (for assertions)
    pub fn installation(&self, name: &str) -> Option<Installation> {
        self.installations.lock().unwrap().get(name).cloned()
    }

    /// Add a ConfigMap with the given data (for test setup)
    pub fn add_configmap(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        self.configmaps
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), cm);
    }

    /// Remove a ConfigMap (for test setup)
    pub fn remove_configmap(&self, namespace: &str, name: &str) {
        self.configmaps
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Set the number of control plane nodes (for test setup)
    pub fn set_control_plane_nodes(&self, count: usize) {
        *self.control_plane_nodes.lock().unwrap() = count;
    }

    /// Mark a deployment ready or unready (for test setup)
    pub fn set_deployment_ready(&self, namespace: &str, name: &str, ready: bool) {
        self.deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), ready);
    }

    /// Mark a statefulset ready or unready (for test setup)
    pub fn set_statefulset_ready(&self, namespace: &str, name: &str, ready: bool) {
        self.statefulsets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), ready);
    }

    /// Set a Job's terminal counters, creating the Job if needed (for test setup)
    pub fn set_job_state(&self, namespace: &str, name: &str, succeeded: i32, failed: i32) {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .entry((namespace.to_string(), name.to_string()))
            .or_insert_with(|| Job {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            });
        job.status = Some(JobStatus {
            succeeded: Some(succeeded),
            failed: Some(failed),
            ..Default::default()
        });
    }

    /// Fetch a stored Secret (for assertions)
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Fetch a stored Service (for assertions)
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Fetch a stored Job (for assertions)
    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_latest_installation(&self) -> Result<Installation, ClusterError> {
        self.installations
            .lock()
            .unwrap()
            .last_key_value()
            .map(|(_, installation)| installation.clone())
            .ok_or_else(|| ClusterError::NotFound("no installations found".to_string()))
    }

    async fn create_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        self.add_installation(installation.clone());
        Ok(installation.clone())
    }

    async fn update_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        let name = installation.name_any();
        let mut installations = self.installations.lock().unwrap();
        if !installations.contains_key(&name) {
            return Err(ClusterError::NotFound(format!("installation {name}")));
        }
        installations.insert(name, installation.clone());
        Ok(installation.clone())
    }

    async fn update_installation_status(
        &self,
        name: &str,
        state: InstallationState,
        reason: &str,
    ) -> Result<(), ClusterError> {
        let mut installations = self.installations.lock().unwrap();
        let installation = installations
            .get_mut(name)
            .ok_or_else(|| ClusterError::NotFound(format!("installation {name}")))?;
        installation.status = Some(InstallationStatus {
            state,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn configmap_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        Ok(self
            .configmaps
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string())))
    }

    async fn get_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError> {
        Ok(self
            .configmaps
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn count_control_plane_nodes(&self) -> Result<usize, ClusterError> {
        Ok(*self.control_plane_nodes.lock().unwrap())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError> {
        Ok(self.namespaces.lock().unwrap().contains(namespace))
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        self.namespaces.lock().unwrap().insert(namespace.to_string());
        Ok(())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), secret.name_any()), secret.clone());
        Ok(())
    }

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<(), ClusterError> {
        self.services
            .lock()
            .unwrap()
            .insert((namespace.to_string(), service.name_any()), service.clone());
        Ok(())
    }

    async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), ClusterError> {
        let key = (namespace.to_string(), job.name_any());
        let mut jobs = self.jobs.lock().unwrap();
        // Server-side apply does not clear status owned by the controller
        let status = jobs.get(&key).and_then(|existing| existing.status.clone());
        let mut applied = job.clone();
        if applied.status.is_none() {
            applied.status = status;
        }
        jobs.insert(key, applied);
        Ok(())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn deployment_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
            .unwrap_or(false))
    }

    async fn statefulset_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        Ok(self
            .statefulsets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
            .unwrap_or(false))
    }
}
