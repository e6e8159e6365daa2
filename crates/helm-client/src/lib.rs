//! Helm release management client
//!
//! Drives the `helm` CLI as a subprocess to query, install, and upgrade
//! chart releases. Values are passed through stdin so nothing is written to
//! disk, and list output is consumed as JSON.
//!
//! # Example
//!
//! ```no_run
//! use helm_client::{HelmClient, InstallOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let helm = HelmClient::new()?;
//!
//! if !helm.release_exists("openebs", "openebs").await? {
//!     helm.install(InstallOptions {
//!         namespace: "openebs".to_string(),
//!         release_name: "openebs".to_string(),
//!         chart_location: "oci://charts.embeddedcluster.io/openebs".to_string(),
//!         chart_version: "4.1.1".to_string(),
//!         values: serde_json::json!({}),
//!     })
//!     .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod values;
#[path = "trait.rs"]
pub mod helm_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::HelmClient;
pub use error::HelmError;
pub use helm_trait::HelmClientTrait;
pub use models::{InstallOptions, InstalledRelease, UpgradeOptions};
#[cfg(feature = "test-util")]
pub use mock::MockHelmClient;
