//! Registry data migration
//!
//! Moves the registry's hostpath data into the object store before the
//! registry is rescaled for high availability. The copy itself runs as an
//! in-cluster Job; this module starts it and relays its progress.
//!
//! [`run_data_migration_job`] hands back a progress channel and an error
//! channel. Both close when the job succeeds; a failure is delivered on the
//! error channel first. [`wait_for_job_and_log_progress`] consumes the pair.

use crate::addons::registry::{NAMESPACE, S3_CREDENTIALS_SECRET};
use crate::addons::{from_json, seaweedfs};
use crate::error::Error;
use cluster_client::ClusterClientTrait;
use k8s_openapi::api::batch::v1::Job;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub(crate) const JOB_NAME: &str = "registry-data-migration";
/// ConfigMap the job writes copy progress snapshots into.
pub(crate) const PROGRESS_CONFIGMAP: &str = "registry-data-migration-progress";
const PROGRESS_KEY: &str = "progress";

/// Pod retries the job allows before it is marked failed.
const JOB_BACKOFF_LIMIT: i32 = 2;

/// How often the monitor re-reads the job and its progress.
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Starts the data migration job and a monitor task that relays its state.
///
/// Returns the progress and error channels. Closure of both channels without
/// an error means the job succeeded.
pub async fn run_data_migration_job(
    cluster: Arc<dyn ClusterClientTrait>,
    operator_image: &str,
    service_cidr: &str,
) -> Result<(mpsc::Receiver<String>, mpsc::Receiver<Error>), Error> {
    seaweedfs::copy_s3_credentials(cluster.as_ref(), NAMESPACE, S3_CREDENTIALS_SECRET).await?;

    let job: Job = from_json(json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": JOB_NAME,
            "namespace": NAMESPACE,
            "labels": {
                "app": JOB_NAME,
            },
        },
        "spec": {
            "backoffLimit": JOB_BACKOFF_LIMIT,
            "template": {
                "spec": {
                    "restartPolicy": "OnFailure",
                    "containers": [{
                        "name": "migrate-registry-data",
                        "image": operator_image,
                        "command": ["/manager", "migrate", "registry-data"],
                        "env": [
                            {
                                "name": "S3_ENDPOINT",
                                "value": seaweedfs::s3_endpoint(service_cidr)?,
                            },
                            {
                                "name": "S3_REGION",
                                "value": "us-east-1",
                            },
                            {
                                "name": "S3_BUCKET_NAME",
                                "value": "registry",
                            },
                            {
                                "name": "S3_ACCESS_KEY_ID",
                                "valueFrom": {
                                    "secretKeyRef": {
                                        "name": S3_CREDENTIALS_SECRET,
                                        "key": "s3AccessKey",
                                    },
                                },
                            },
                            {
                                "name": "S3_SECRET_ACCESS_KEY",
                                "valueFrom": {
                                    "secretKeyRef": {
                                        "name": S3_CREDENTIALS_SECRET,
                                        "key": "s3SecretKey",
                                    },
                                },
                            },
                        ],
                        "volumeMounts": [{
                            "name": "registry-data",
                            "mountPath": "/registry",
                        }],
                    }],
                    "volumes": [{
                        "name": "registry-data",
                        "hostPath": {
                            "path": "/var/lib/embedded-cluster/registry",
                        },
                    }],
                },
            },
        },
    }))?;
    cluster.apply_job(NAMESPACE, &job).await?;
    info!("started registry data migration job");

    let (progress_tx, progress_rx) = mpsc::channel(32);
    let (error_tx, error_rx) = mpsc::channel(1);
    tokio::spawn(monitor_job(cluster, progress_tx, error_tx));
    Ok((progress_rx, error_rx))
}

/// Polls the job and its progress ConfigMap until the job finishes.
///
/// Success is signalled by returning, which drops both senders and closes
/// both channels. Lookup errors are transient here; the job's own backoff
/// limit bounds how long a genuinely broken migration keeps us polling.
async fn monitor_job(
    cluster: Arc<dyn ClusterClientTrait>,
    progress: mpsc::Sender<String>,
    errors: mpsc::Sender<Error>,
) {
    let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
    let mut last_snapshot = String::new();
    loop {
        ticker.tick().await;

        match cluster.get_configmap(NAMESPACE, PROGRESS_CONFIGMAP).await {
            Ok(Some(configmap)) => {
                let snapshot = configmap
                    .data
                    .and_then(|data| data.get(PROGRESS_KEY).cloned())
                    .unwrap_or_default();
                if !snapshot.is_empty() && snapshot != last_snapshot {
                    if progress.send(snapshot.clone()).await.is_err() {
                        return;
                    }
                    last_snapshot = snapshot;
                }
            }
            Ok(None) => {}
            Err(err) => debug!("failed to read migration progress: {err}"),
        }

        match cluster.get_job(NAMESPACE, JOB_NAME).await {
            Ok(Some(job)) => {
                let status = job.status.unwrap_or_default();
                if status.succeeded.unwrap_or(0) > 0 {
                    return;
                }
                let failed = status.failed.unwrap_or(0);
                if failed > JOB_BACKOFF_LIMIT {
                    let _ = errors
                        .send(Error::Migration(format!(
                            "job failed after {failed} attempts"
                        )))
                        .await;
                    return;
                }
            }
            Ok(None) => debug!("migration job not visible yet"),
            Err(err) => debug!("failed to read migration job: {err}"),
        }
    }
}

/// Drains the migration channels, logging every progress snapshot.
///
/// Returns the first error observed, or `Ok` once the error channel closes
/// without delivering one.
pub async fn wait_for_job_and_log_progress(
    mut progress: mpsc::Receiver<String>,
    mut errors: mpsc::Receiver<Error>,
) -> Result<(), Error> {
    let mut progress_open = true;
    loop {
        tokio::select! {
            biased;
            err = errors.recv() => {
                return match err {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            snapshot = progress.recv(), if progress_open => {
                match snapshot {
                    Some(snapshot) => info!("registry data migration: {snapshot}"),
                    None => progress_open = false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::seaweedfs::SeaweedFs;
    use cluster_client::MockClusterClient;

    async fn start_job(
        cluster: &Arc<MockClusterClient>,
    ) -> (mpsc::Receiver<String>, mpsc::Receiver<Error>) {
        SeaweedFs::default()
            .ensure_s3_secret(cluster.as_ref())
            .await
            .unwrap();
        let shared = Arc::clone(cluster) as Arc<dyn ClusterClientTrait>;
        run_data_migration_job(shared, "registry.local/operator:1.22.0", "10.96.0.0/12")
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_the_job_succeeds() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.add_configmap(NAMESPACE, PROGRESS_CONFIGMAP, &[("progress", "3 of 120")]);
        let (mut progress, errors) = start_job(&cluster).await;

        assert_eq!(progress.recv().await.unwrap(), "3 of 120");
        cluster.set_job_state(NAMESPACE, JOB_NAME, 1, 0);

        wait_for_job_and_log_progress(progress, errors)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reports_failure_on_the_error_channel() {
        let cluster = Arc::new(MockClusterClient::new());
        let (progress, errors) = start_job(&cluster).await;
        cluster.set_job_state(NAMESPACE, JOB_NAME, 0, 3);

        let err = wait_for_job_and_log_progress(progress, errors)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("job failed after 3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_snapshots_are_forwarded_once() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.add_configmap(NAMESPACE, PROGRESS_CONFIGMAP, &[("progress", "50 of 100")]);
        let (mut progress, errors) = start_job(&cluster).await;

        assert_eq!(progress.recv().await.unwrap(), "50 of 100");
        // several more polls of the unchanged snapshot produce nothing
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(progress.try_recv().is_err());

        cluster.add_configmap(NAMESPACE, PROGRESS_CONFIGMAP, &[("progress", "80 of 100")]);
        assert_eq!(progress.recv().await.unwrap(), "80 of 100");

        cluster.set_job_state(NAMESPACE, JOB_NAME, 1, 0);
        wait_for_job_and_log_progress(progress, errors)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_fail_before_the_job_starts() {
        let cluster = Arc::new(MockClusterClient::new());
        let shared = Arc::clone(&cluster) as Arc<dyn ClusterClientTrait>;
        let err = run_data_migration_job(shared, "registry.local/operator:1.22.0", "10.96.0.0/12")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("seaweedfs-s3-secret"));
        assert!(cluster.job(NAMESPACE, JOB_NAME).is_none());
    }
}
