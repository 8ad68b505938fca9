//! Utils is shared functions for talking to the Kubernetes API.
#[cfg(test)]
pub mod test;

use std::fmt::Debug;

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{
    api::{DeleteParams, Patch, PatchParams},
    client::Client,
    core::{ApiResource, DynamicObject},
    Api, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{error::is_not_found, MANAGER_NAME};

/// Outcome of a delete that tolerates missing targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deletion {
    /// The object existed and deletion was requested.
    Deleted,
    /// The object was already gone.
    AlreadyAbsent,
}

/// Server-side apply params owned by the driver.
pub fn serverside() -> PatchParams {
    PatchParams::apply(MANAGER_NAME).force()
}

/// Server-side apply a namespaced object into the namespace named in its metadata.
pub async fn apply_namespaced<K>(client: &Client, object: &K) -> Result<K, kube::Error>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned,
{
    let ns = object.namespace().unwrap_or_else(|| client.default_namespace().to_owned());
    let api: Api<K> = Api::namespaced(client.clone(), &ns);
    api.patch(&object.name_any(), &serverside(), &Patch::Apply(object))
        .await
}

/// Server-side apply a cluster scoped object.
pub async fn apply_cluster<K>(client: &Client, object: &K) -> Result<K, kube::Error>
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned,
{
    let api: Api<K> = Api::all(client.clone());
    api.patch(&object.name_any(), &serverside(), &Patch::Apply(object))
        .await
}

/// Server-side apply a namespaced custom resource whose type is only known at runtime.
pub async fn apply_dynamic(
    client: &Client,
    object: &DynamicObject,
    resource: &ApiResource,
) -> Result<DynamicObject, kube::Error> {
    let ns = object.namespace().unwrap_or_else(|| client.default_namespace().to_owned());
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), &ns, resource);
    api.patch(&object.name_any(), &serverside(), &Patch::Apply(object))
        .await
}

/// Delete an object by name, treating NotFound as success.
pub async fn delete_opt<K>(api: &Api<K>, name: &str) -> Result<Deletion, kube::Error>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(Deletion::Deleted),
        Err(err) if is_not_found(&err) => Ok(Deletion::AlreadyAbsent),
        Err(err) => Err(err),
    }
}
