//! Helm client errors

use thiserror::Error;

/// Errors that can occur when driving the helm CLI
#[derive(Debug, Error)]
pub enum HelmError {
    /// The helm binary could not be launched
    #[error("failed to run helm: {0}")]
    Launch(#[from] std::io::Error),

    /// A helm command exited non-zero
    #[error("helm {context}: {stderr}")]
    Command {
        /// The subcommand and release it was applied to
        context: String,
        /// Trailing stderr emitted by helm
        stderr: String,
    },

    /// Helm emitted output that was not valid UTF-8
    #[error("helm output was not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Helm emitted JSON that could not be parsed
    #[error("failed to parse helm output: {0}")]
    Json(#[from] serde_json::Error),

    /// Values could not be rendered or merged
    #[error("failed to render values: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The queried release does not exist
    #[error("release {namespace}/{release_name} not found")]
    ReleaseNotFound {
        /// Namespace the release was looked up in
        namespace: String,
        /// Release name that was looked up
        release_name: String,
    },
}
