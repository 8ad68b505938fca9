//! Provides the deploy, configure, cleanup and status operations of `loadgenctl`.
#![warn(missing_docs)]

/// Apply module for applying the manifests in order.
pub mod apply;
/// Cleanup module for tearing everything down.
pub mod cleanup;
/// Cluster module for the Kubernetes operations behind the interactive commands.
pub mod cluster;
/// Configure module for the interactive configuration menu.
pub mod configure;
/// Deploy module for the full deploy pipeline.
pub mod deploy;
/// Error module for the error type and its severity.
pub mod error;
/// Exec module for running external command line tools.
pub mod exec;
/// Gmp module for the managed Prometheus toggle.
pub mod gmp;
/// Image module for building, pushing and removing the workload image.
pub mod image;
/// Labels module for managing resource labels.
pub(crate) mod labels;
/// Locator module for resolving the target cluster.
pub mod locator;
/// Manifests module for the typed Kubernetes objects.
pub mod manifests;
/// Well known names, namespaces and ports.
pub mod names;
/// Prereq module for checking installed tools.
pub mod prereq;
/// Prompt module for operator input.
pub mod prompt;
/// Readiness module for bounded deployment waits.
pub mod readiness;
/// Status module for the read only report.
pub mod status;
/// Store module for the persisted load configuration.
pub mod store;
/// Utils module for shared functions talking to the Kubernetes API.
pub mod utils;

pub use error::{Error, Result, Severity};

/// Field manager and managed-by label value of everything the driver writes.
pub(crate) const MANAGER_NAME: &str = "loadgenctl";
