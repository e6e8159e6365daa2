//! Embedded-cluster CRD definitions
//!
//! The `Installation` custom resource records one install or upgrade of an
//! embedded cluster, plus the release metadata types shipped alongside a
//! vendor release.

pub mod installation;
pub mod release;

pub use installation::*;
pub use release::*;
