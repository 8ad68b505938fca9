//! Read only report of what is deployed.
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use loadgen_common::config::LoadConfig;

use crate::{
    cluster::Cluster,
    configure::render,
    error::Result,
    names::{GRAFANA_APP, LOADGEN_APP, LOADGEN_NAMESPACE, MONITORING_NAMESPACE},
    store::ConfigStore,
};

/// Replica counts of a deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replicas {
    /// Replicas passing their readiness probe.
    pub ready: i32,
    /// Replicas the deployment asks for.
    pub desired: i32,
}

impl From<&Deployment> for Replicas {
    fn from(deployment: &Deployment) -> Self {
        Self {
            ready: deployment
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or_default(),
            desired: deployment
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(1),
        }
    }
}

/// State of one namespace and the deployment the driver runs in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceStatus {
    /// Namespace name.
    pub namespace: &'static str,
    /// Deployment name.
    pub app: &'static str,
    /// Whether the namespace exists.
    pub exists: bool,
    /// `None` when the deployment does not exist.
    pub replicas: Option<Replicas>,
}

/// Everything `status` prints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// Load generator first, then monitoring.
    pub namespaces: Vec<NamespaceStatus>,
    /// The stored record, when the load generator namespace holds one.
    pub config: Option<LoadConfig>,
}

/// Gather the report. Missing namespaces and objects are reported, not errors.
pub async fn collect(cluster: &impl Cluster, store: &impl ConfigStore) -> Result<Report> {
    let mut namespaces = Vec::new();
    for (namespace, app) in [(LOADGEN_NAMESPACE, LOADGEN_APP), (MONITORING_NAMESPACE, GRAFANA_APP)] {
        let exists = cluster.namespace_exists(namespace).await?;
        let replicas = if exists {
            cluster
                .deployment(namespace, app)
                .await?
                .as_ref()
                .map(Replicas::from)
        } else {
            None
        };
        namespaces.push(NamespaceStatus {
            namespace,
            app,
            exists,
            replicas,
        });
    }
    let config = if namespaces[0].exists {
        store.get().await?
    } else {
        None
    };
    Ok(Report { namespaces, config })
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ns in &self.namespaces {
            if !ns.exists {
                writeln!(f, "namespace {}: absent", ns.namespace)?;
                continue;
            }
            match &ns.replicas {
                Some(Replicas { ready, desired }) => writeln!(
                    f,
                    "namespace {}: deployment {} {ready}/{desired} ready",
                    ns.namespace, ns.app
                )?,
                None => writeln!(
                    f,
                    "namespace {}: deployment {} missing",
                    ns.namespace, ns.app
                )?,
            }
        }
        match &self.config {
            Some(config) => write!(f, "{}", render(config)),
            None => write!(f, "No load configuration stored."),
        }
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use loadgen_common::config::WorkloadType;
    use mockall::predicate;

    use super::*;
    use crate::{cluster::MockCluster, store::test::MemoryStore};

    #[tokio::test]
    async fn reports_replicas_and_config() {
        let mut cluster = MockCluster::new();
        cluster
            .expect_namespace_exists()
            .with(predicate::eq("loadgen"))
            .returning(|_| Ok(true));
        cluster
            .expect_namespace_exists()
            .with(predicate::eq("monitoring"))
            .returning(|_| Ok(false));
        cluster
            .expect_deployment()
            .with(predicate::eq("loadgen"), predicate::eq("loadgen"))
            .returning(|_, _| {
                Ok(Some(Deployment {
                    spec: Some(DeploymentSpec {
                        replicas: Some(1),
                        ..Default::default()
                    }),
                    status: Some(DeploymentStatus {
                        ready_replicas: Some(1),
                        ..Default::default()
                    }),
                    ..Default::default()
                }))
            });
        let store = MemoryStore::with(LoadConfig::default().with_workload_type(WorkloadType::Cpu));

        let report = collect(&cluster, &store).await.unwrap();

        expect![[r#"
            namespace loadgen: deployment loadgen 1/1 ready
            namespace monitoring: absent
            Current configuration:
              workload-type: cpu
              load-intensity: (default)
              cpu-threads: (default)
              memory-chunk-size-mb: (default)
              network-concurrent-requests: (default)
              storage-file-size-mb: (default)
              duration: (default)
              burst-pattern: (default)"#]]
        .assert_eq(&report.to_string());
    }

    #[tokio::test]
    async fn nothing_deployed_skips_the_store() {
        let mut cluster = MockCluster::new();
        cluster.expect_namespace_exists().returning(|_| Ok(false));
        let store = crate::store::MockConfigStore::new();

        let report = collect(&cluster, &store).await.unwrap();

        assert!(report.namespaces.iter().all(|ns| !ns.exists));
        assert_eq!(report.config, None);
    }
}
