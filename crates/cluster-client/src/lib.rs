//! Kubernetes object-store client
//!
//! Thin typed wrapper around `kube::Client` carrying exactly the operations
//! the installer needs: Installation records, the restore marker, node
//! counting, secrets, the migration job, and workload readiness probes.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::ClusterClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = ClusterClient::try_default().await?;
//! let installation = cluster.get_latest_installation().await?;
//! println!("cluster {} airgap={}", installation.spec.cluster_id, installation.spec.air_gap);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
#[cfg(feature = "test-util")]
pub use mock::MockClusterClient;
