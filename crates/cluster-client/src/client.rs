//! Kubernetes object-store client backed by `kube::Client`

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{Installation, InstallationState};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Secret, Service};
use kube::api::{ListParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Label selector identifying control plane nodes.
const CONTROL_PLANE_SELECTOR: &str = "node-role.kubernetes.io/control-plane=true";

/// Field manager used for server-side applies.
const FIELD_MANAGER: &str = "embedded-cluster-installer";

/// Kubernetes object-store client
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl ClusterClient {
    /// Wraps an existing kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient kubeconfig or in-cluster environment.
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// Returns the Installation with the greatest name.
    pub async fn get_latest_installation(&self) -> Result<Installation, ClusterError> {
        let api: Api<Installation> = Api::all(self.client.clone());
        let installations = api.list(&ListParams::default()).await?;
        installations
            .items
            .into_iter()
            .max_by(|a, b| a.name_any().cmp(&b.name_any()))
            .ok_or_else(|| ClusterError::NotFound("no installations found".to_string()))
    }

    /// Creates a new Installation record.
    pub async fn create_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        let api: Api<Installation> = Api::all(self.client.clone());
        debug!(name = %installation.name_any(), "creating installation record");
        Ok(api.create(&PostParams::default(), installation).await?)
    }

    /// Replaces an existing Installation record.
    pub async fn update_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        let api: Api<Installation> = Api::all(self.client.clone());
        Ok(api
            .replace(&installation.name_any(), &PostParams::default(), installation)
            .await?)
    }

    /// Patches the status subresource of an Installation record.
    pub async fn update_installation_status(
        &self,
        name: &str,
        state: InstallationState,
        reason: &str,
    ) -> Result<(), ClusterError> {
        let api: Api<Installation> = Api::all(self.client.clone());
        let status_patch = serde_json::json!({
            "status": {
                "state": state,
                "reason": reason,
            }
        });
        let pp = PatchParams::default();
        api.patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await?;
        Ok(())
    }

    /// Whether a ConfigMap exists.
    pub async fn configmap_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        Ok(self.get_configmap(namespace, name).await?.is_some())
    }

    /// Reads a ConfigMap, `None` when absent.
    pub async fn get_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    /// Counts nodes carrying the control plane role label.
    pub async fn count_control_plane_nodes(&self) -> Result<usize, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default().labels(CONTROL_PLANE_SELECTOR))
            .await?;
        Ok(nodes.items.len())
    }

    /// Whether a namespace exists.
    pub async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(namespace).await?.is_some())
    }

    /// Server-side applies a namespace, a no-op when it already exists.
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.patch(
            namespace,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&ns),
        )
        .await?;
        Ok(())
    }

    /// Reads a Secret, `None` when absent.
    pub async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    /// Server-side applies a Secret so re-runs converge.
    pub async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&secret.name_any(), &pp, &Patch::Apply(secret))
            .await?;
        Ok(())
    }

    /// Server-side applies a Service so re-runs converge.
    pub async fn apply_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<(), ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&service.name_any(), &pp, &Patch::Apply(service))
            .await?;
        Ok(())
    }

    /// Server-side applies a Job so re-runs converge.
    pub async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), ClusterError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&job.name_any(), &pp, &Patch::Apply(job)).await?;
        Ok(())
    }

    /// Reads a Job, `None` when absent.
    pub async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    /// Whether the deployment's ready replicas match its desired replicas.
    pub async fn deployment_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let Some(deployment) = api.get_opt(name).await? else {
            return Ok(false);
        };
        let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let ready = deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        Ok(ready == desired)
    }

    /// Whether the statefulset's ready replicas match its desired replicas.
    pub async fn statefulset_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let Some(statefulset) = api.get_opt(name).await? else {
            return Ok(false);
        };
        let desired = statefulset.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let ready = statefulset
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        Ok(ready == desired)
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for ClusterClient {
    async fn get_latest_installation(&self) -> Result<Installation, ClusterError> {
        self.get_latest_installation().await
    }

    async fn create_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        self.create_installation(installation).await
    }

    async fn update_installation(
        &self,
        installation: &Installation,
    ) -> Result<Installation, ClusterError> {
        self.update_installation(installation).await
    }

    async fn update_installation_status(
        &self,
        name: &str,
        state: InstallationState,
        reason: &str,
    ) -> Result<(), ClusterError> {
        self.update_installation_status(name, state, reason).await
    }

    async fn configmap_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.configmap_exists(namespace, name).await
    }

    async fn get_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError> {
        self.get_configmap(namespace, name).await
    }

    async fn count_control_plane_nodes(&self) -> Result<usize, ClusterError> {
        self.count_control_plane_nodes().await
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError> {
        self.namespace_exists(namespace).await
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        self.ensure_namespace(namespace).await
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterError> {
        self.get_secret(namespace, name).await
    }

    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        self.apply_secret(namespace, secret).await
    }

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<(), ClusterError> {
        self.apply_service(namespace, service).await
    }

    async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), ClusterError> {
        self.apply_job(namespace, job).await
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        self.get_job(namespace, name).await
    }

    async fn deployment_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.deployment_ready(namespace, name).await
    }

    async fn statefulset_ready(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.statefulset_ready(namespace, name).await
    }
}
