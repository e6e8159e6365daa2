//! Installer-specific error types.
//!
//! One crate-wide enum; seam errors from the cluster and Helm clients
//! convert in, and sequencer steps wrap exactly one layer of context.

use cluster_client::ClusterError;
use helm_client::HelmError;
use thiserror::Error;

/// Errors that can occur while sequencing add-ons.
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes object-store error
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Helm release operation error
    #[error("helm error: {0}")]
    Helm(#[from] HelmError),

    /// The release metadata names no such chart
    #[error("no {name} chart found in release metadata")]
    ChartNotFound {
        /// Chart release name that was looked up
        name: String,
    },

    /// The release metadata names no such image
    #[error("no {name} found in release metadata")]
    ImageNotFound {
        /// Image substring that was looked up
        name: String,
    },

    /// A sequencer step failed; carries the operation and add-on name
    #[error("{op} {name}: {source}")]
    Step {
        /// Operation that was attempted
        op: &'static str,
        /// Add-on or job the operation applied to
        name: String,
        /// Underlying failure
        source: Box<Error>,
    },

    /// A readiness wait ran out of attempts
    #[error("timed out waiting for {what}: {last_error}")]
    Timeout {
        /// What was being waited on
        what: String,
        /// The last transient error observed, or "not ready"
        last_error: String,
    },

    /// The registry data migration ended in failure
    #[error("registry data migration failed: {0}")]
    Migration(String),

    /// A service CIDR could not be parsed or indexed
    #[error("invalid service cidr {cidr}: {reason}")]
    InvalidCidr {
        /// The CIDR as given
        cidr: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The release metadata document could not be loaded
    #[error("failed to load release metadata from {path}: {reason}")]
    Metadata {
        /// Path that was read
        path: String,
        /// Why loading failed
        reason: String,
    },
}

impl Error {
    /// Wraps a step failure with one layer of context.
    pub fn step(op: &'static str, name: &str, source: Error) -> Self {
        Self::Step {
            op,
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}
