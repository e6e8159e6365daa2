//! Helm CLI client
//!
//! Runs the `helm` binary as a subprocess. Listing goes through
//! `--output json`; install and upgrade stream the values document through
//! stdin so nothing touches the filesystem.

use crate::error::HelmError;
use crate::helm_trait::HelmClientTrait;
use crate::models::{InstallOptions, InstalledRelease, UpgradeOptions};
use crate::values;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default helm binary resolved from PATH.
const HELM: &str = "helm";

/// Helm CLI client
#[derive(Debug)]
pub struct HelmClient {
    bin: PathBuf,
}

impl HelmClient {
    /// Creates a client after verifying the helm binary runs.
    pub fn new() -> Result<Self, HelmError> {
        Self::with_binary(PathBuf::from(HELM))
    }

    /// Creates a client around a specific helm binary, for hosts where the
    /// bundled binary is not on PATH.
    pub fn with_binary(bin: PathBuf) -> Result<Self, HelmError> {
        let output = std::process::Command::new(&bin)
            .args(["version", "--short"])
            .output()?;
        if !output.status.success() {
            return Err(HelmError::Command {
                context: "version".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "helm binary verified"
        );
        Ok(Self { bin })
    }

    /// Returns whether a release exists in the namespace, counting deployed,
    /// failed, and pending states so interrupted installs are still seen.
    pub async fn release_exists(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<bool, HelmError> {
        let releases = self.list(namespace, release_name).await?;
        Ok(!releases.is_empty())
    }

    /// Returns the chart version of the deployed release.
    pub async fn latest_release_version(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<String, HelmError> {
        let releases = self.list(namespace, release_name).await?;
        let release = releases
            .into_iter()
            .next()
            .ok_or_else(|| HelmError::ReleaseNotFound {
                namespace: namespace.to_string(),
                release_name: release_name.to_string(),
            })?;
        Ok(release.chart_version().unwrap_or_default().to_string())
    }

    /// Installs a new release, creating the namespace if needed. Readiness
    /// is the caller's concern, so helm's own wait stays off.
    pub async fn install(&self, opts: InstallOptions) -> Result<(), HelmError> {
        let rendered = values::render(&opts.values)?;
        let mut args = vec![
            "install".to_string(),
            opts.release_name.clone(),
            opts.chart_location.clone(),
            "--namespace".to_string(),
            opts.namespace.clone(),
            "--create-namespace".to_string(),
            "--values".to_string(),
            "-".to_string(),
            "--wait=false".to_string(),
        ];
        if !opts.chart_version.is_empty() {
            args.push("--version".to_string());
            args.push(opts.chart_version.clone());
        }
        let context = format!("install {}/{}", opts.namespace, opts.release_name);
        self.run(&context, &args, Some(&rendered)).await?;
        Ok(())
    }

    /// Upgrades an existing release in place.
    pub async fn upgrade(&self, opts: UpgradeOptions) -> Result<(), HelmError> {
        let rendered = values::render(&opts.values)?;
        let mut args = vec![
            "upgrade".to_string(),
            opts.release_name.clone(),
            opts.chart_location.clone(),
            "--namespace".to_string(),
            opts.namespace.clone(),
            "--values".to_string(),
            "-".to_string(),
            "--wait=false".to_string(),
        ];
        if !opts.chart_version.is_empty() {
            args.push("--version".to_string());
            args.push(opts.chart_version.clone());
        }
        if opts.force {
            args.push("--force".to_string());
        }
        let context = format!("upgrade {}/{}", opts.namespace, opts.release_name);
        self.run(&context, &args, Some(&rendered)).await?;
        Ok(())
    }

    /// Uninstalls a release.
    pub async fn uninstall(&self, namespace: &str, release_name: &str) -> Result<(), HelmError> {
        let args = vec![
            "uninstall".to_string(),
            release_name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        let context = format!("uninstall {namespace}/{release_name}");
        self.run(&context, &args, None).await?;
        Ok(())
    }

    async fn list(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<Vec<InstalledRelease>, HelmError> {
        let args = vec![
            "list".to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--filter".to_string(),
            format!("^{release_name}$"),
            "--deployed".to_string(),
            "--failed".to_string(),
            "--pending".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let stdout = self.run("list", &args, None).await?;
        let releases: Vec<InstalledRelease> = serde_json::from_slice(&stdout)?;
        Ok(releases)
    }

    async fn run(
        &self,
        context: &str,
        args: &[String],
        stdin_payload: Option<&str>,
    ) -> Result<Vec<u8>, HelmError> {
        debug!(context, "running helm");
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin_payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        let mut child = cmd.spawn()?;
        if let Some(payload) = stdin_payload {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(payload.as_bytes()).await?;
            }
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(HelmError::Command {
                context: context.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait::async_trait]
impl HelmClientTrait for HelmClient {
    async fn release_exists(&self, namespace: &str, release_name: &str) -> Result<bool, HelmError> {
        self.release_exists(namespace, release_name).await
    }

    async fn latest_release_version(
        &self,
        namespace: &str,
        release_name: &str,
    ) -> Result<String, HelmError> {
        self.latest_release_version(namespace, release_name).await
    }

    async fn install(&self, opts: InstallOptions) -> Result<(), HelmError> {
        self.install(opts).await
    }

    async fn upgrade(&self, opts: UpgradeOptions) -> Result<(), HelmError> {
        self.upgrade(opts).await
    }

    async fn uninstall(&self, namespace: &str, release_name: &str) -> Result<(), HelmError> {
        self.uninstall(namespace, release_name).await
    }
}
