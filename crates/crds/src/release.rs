//! Vendor release metadata
//!
//! Every vendor release ships a metadata document describing the images and
//! Helm charts pinned to it. The add-on selector reads the operator chart
//! and images out of it; nothing here talks to the cluster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata document attached to a vendor release.
///
/// Top-level keys are PascalCase on the wire; the nested chart list uses the
/// k0s extension field names.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseMetadata {
    /// Component versions pinned by the release
    #[serde(default)]
    pub versions: BTreeMap<String, String>,

    /// Fully qualified image references, `repo:tag@digest` form permitted
    #[serde(default)]
    pub images: Vec<String>,

    /// Vendor chart list applied on top of the built-in add-ons
    #[serde(default)]
    pub configs: HelmExtensions,

    /// Airgap artifact digests, opaque to the sequencer
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
}

/// Helm chart extensions in k0s cluster-config form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HelmExtensions {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub charts: Vec<ChartRef>,
}

/// One chart entry in k0s cluster-config form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChartRef {
    /// Release name
    #[serde(default)]
    pub name: String,

    /// Chart location, repo-qualified or OCI
    #[serde(default, rename = "chartname")]
    pub chart_name: String,

    /// Chart version
    #[serde(default)]
    pub version: String,

    /// Rendered values document
    #[serde(default)]
    pub values: String,

    /// Namespace the release is installed into
    #[serde(default)]
    pub namespace: String,

    /// Apply ordering hint, lower applies first
    #[serde(default)]
    pub order: i32,
}

/// One chart repository entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Repository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl ReleaseMetadata {
    /// Returns the vendor chart entry with the given release name.
    pub fn find_chart(&self, name: &str) -> Option<&ChartRef> {
        self.configs.charts.iter().find(|c| c.name == name)
    }

    /// Returns the first image whose reference contains `needle`.
    pub fn find_image(&self, needle: &str) -> Option<&str> {
        self.images
            .iter()
            .map(String::as_str)
            .find(|image| image.contains(needle))
    }
}

/// Splits an image reference into repository and tag.
///
/// The tag starts after the first `:` in the final path segment, so
/// registry ports are never mistaken for tags, and a digest suffix stays
/// attached to the tag. References with no tag return an empty tag.
pub fn split_image(image: &str) -> (String, String) {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    let name = &image[name_start..];
    let tag_colon = match name.find('@') {
        Some(at) => name[..at].find(':'),
        None => name.find(':'),
    };
    match tag_colon {
        Some(c) => (
            image[..name_start + c].to_string(),
            image[name_start + c + 1..].to_string(),
        ),
        None => (image.to_string(), String::new()),
    }
}
