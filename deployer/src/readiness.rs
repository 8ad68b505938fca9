//! Bounded waits on deployment readiness.
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::wait::Condition;
use tracing::info;

use crate::{
    cluster::Cluster,
    error::Result,
    names::{GRAFANA_APP, LOADGEN_APP, LOADGEN_NAMESPACE, MONITORING_NAMESPACE},
};

/// Default bound on each wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// State a deployment is waited for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The `Available=True` condition is reported.
    Available,
    /// The latest generation is observed and every replica is updated and available.
    RolledOut,
}

impl Readiness {
    /// True when `obj` is in this state. A missing deployment never is.
    pub fn matches(self, obj: Option<&Deployment>) -> bool {
        match self {
            Readiness::Available => is_available().matches_object(obj),
            Readiness::RolledOut => is_rolled_out().matches_object(obj),
        }
    }
}

/// Matches a deployment reporting the `Available=True` condition.
pub fn is_available() -> impl Condition<Deployment> {
    |obj: Option<&Deployment>| {
        obj.and_then(|d| d.status.as_ref())
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Available" && c.status == "True")
            })
            .unwrap_or(false)
    }
}

/// Matches a deployment whose latest generation is fully rolled out.
pub fn is_rolled_out() -> impl Condition<Deployment> {
    |obj: Option<&Deployment>| {
        let Some(deployment) = obj else {
            return false;
        };
        let Some(status) = deployment.status.as_ref() else {
            return false;
        };
        let generation = deployment.metadata.generation.unwrap_or_default();
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        status.observed_generation.unwrap_or_default() >= generation
            && status.updated_replicas.unwrap_or_default() == desired
            && status.available_replicas.unwrap_or_default() == desired
            && status.replicas.unwrap_or_default() == desired
    }
}

/// Wait until the deployment reports `Available=True`.
pub async fn wait_available(
    cluster: &impl Cluster,
    ns: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    info!(ns, name, timeout_secs = timeout.as_secs(), "waiting for deployment to become available");
    cluster
        .wait_deployment(ns, name, Readiness::Available, timeout)
        .await?;
    info!(ns, name, "deployment available");
    Ok(())
}

/// Wait until the latest rollout of the deployment completed.
pub async fn wait_rolled_out(
    cluster: &impl Cluster,
    ns: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    info!(ns, name, timeout_secs = timeout.as_secs(), "waiting for rollout");
    cluster
        .wait_deployment(ns, name, Readiness::RolledOut, timeout)
        .await?;
    info!(ns, name, "rollout complete");
    Ok(())
}

/// Wait for the workload, then the monitoring stack. The second wait never starts when the
/// first one fails.
pub async fn wait_all_available(cluster: &impl Cluster, timeout: Duration) -> Result<()> {
    wait_available(cluster, LOADGEN_NAMESPACE, LOADGEN_APP, timeout).await?;
    wait_available(cluster, MONITORING_NAMESPACE, GRAFANA_APP, timeout).await
}
