//! The cluster operations used by the readiness waiter, configurator, cleanup and status report.
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Namespace, PersistentVolumeClaim, Pod, Service},
};
use kube::{
    api::ListParams,
    client::Client,
    runtime::wait::await_condition,
    Api,
};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::{
    error::{is_not_found, Error, Result},
    labels::MANAGED_BY_LABEL_SELECTOR,
    readiness::Readiness,
    utils::{delete_opt, Deletion},
};

/// Define the behavior we consume from the Kubernetes API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Cluster: Send + Sync {
    /// True when the namespace exists.
    async fn namespace_exists(&self, ns: &str) -> Result<bool>;

    /// Fetch a deployment, `None` when it does not exist.
    async fn deployment(&self, ns: &str, name: &str) -> Result<Option<Deployment>>;

    /// Watch a deployment until it reaches `readiness`, failing with [`Error::Timeout`] once
    /// `timeout` elapsed.
    async fn wait_deployment(
        &self,
        ns: &str,
        name: &str,
        readiness: Readiness,
        timeout: Duration,
    ) -> Result<()>;

    /// Trigger a rolling restart of a deployment.
    async fn restart_deployment(&self, ns: &str, name: &str) -> Result<()>;

    /// Pods in a namespace matching a label selector.
    async fn pods(&self, ns: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Delete the deployments, services and config maps the driver manages in a namespace.
    async fn delete_workloads(&self, ns: &str) -> Result<()>;

    /// Delete every persistent volume claim in a namespace.
    async fn delete_claims(&self, ns: &str) -> Result<()>;

    /// Delete a namespace.
    async fn delete_namespace(&self, ns: &str) -> Result<Deletion>;
}

/// [`Cluster`] backed by a kube client.
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap a kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn namespace_exists(&self, ns: &str) -> Result<bool> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces.get_opt(ns).await?.is_some())
    }

    async fn deployment(&self, ns: &str, name: &str) -> Result<Option<Deployment>> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), ns);
        Ok(deployments.get_opt(name).await?)
    }

    async fn wait_deployment(
        &self,
        ns: &str,
        name: &str,
        readiness: Readiness,
        timeout: Duration,
    ) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), ns);
        let condition = move |obj: Option<&Deployment>| readiness.matches(obj);
        match tokio::time::timeout(timeout, await_condition(deployments, name, condition)).await {
            Ok(reached) => {
                reached?;
                Ok(())
            }
            Err(_) => Err(Error::Timeout {
                namespace: ns.to_owned(),
                name: name.to_owned(),
                timeout,
            }),
        }
    }

    async fn restart_deployment(&self, ns: &str, name: &str) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), ns);
        deployments.restart(name).await?;
        info!(ns, name, "restart requested");
        Ok(())
    }

    async fn pods(&self, ns: &str, selector: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), ns);
        Ok(pods.list(&ListParams::default().labels(selector)).await?.items)
    }

    async fn delete_workloads(&self, ns: &str) -> Result<()> {
        let managed = ListParams::default().labels(MANAGED_BY_LABEL_SELECTOR);
        delete_all(
            &Api::<Deployment>::namespaced(self.client.clone(), ns),
            &managed,
        )
        .await?;
        delete_all(
            &Api::<Service>::namespaced(self.client.clone(), ns),
            &managed,
        )
        .await?;
        delete_all(
            &Api::<ConfigMap>::namespaced(self.client.clone(), ns),
            &managed,
        )
        .await?;
        Ok(())
    }

    async fn delete_claims(&self, ns: &str) -> Result<()> {
        delete_all(
            &Api::<PersistentVolumeClaim>::namespaced(self.client.clone(), ns),
            &ListParams::default(),
        )
        .await
    }

    async fn delete_namespace(&self, ns: &str) -> Result<Deletion> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(delete_opt(&namespaces, ns).await?)
    }
}

/// Delete every matching object of a kind, one by one so missing objects are skipped.
async fn delete_all<K>(api: &Api<K>, params: &ListParams) -> Result<()>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    let objects = match api.list(params).await {
        Ok(list) => list.items,
        Err(err) if is_not_found(&err) => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    for object in objects {
        let Some(name) = object.meta().name.clone() else {
            continue;
        };
        let deletion = delete_opt(api, &name).await?;
        debug!(%name, ?deletion, "delete");
    }
    Ok(())
}
