//! Client for the persisted load configuration record.
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Patch, PatchParams},
    client::Client,
    Api,
};
use loadgen_common::config::LoadConfig;
use serde_json::json;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::{Error, Result},
    names::{CONFIG_MAP_NAME, LOADGEN_NAMESPACE},
    MANAGER_NAME,
};

/// Get and merge-patch access to the load configuration record.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the record, `None` when the configuration object does not exist.
    async fn get(&self) -> Result<Option<LoadConfig>>;

    /// Merge the keys set in `patch` into the record. Keys absent from `patch` are untouched.
    async fn merge_patch(&self, patch: &LoadConfig) -> Result<()>;
}

/// Record stored in the data of a ConfigMap.
pub struct ConfigMapStore {
    config_maps: Api<ConfigMap>,
    name: String,
}

impl ConfigMapStore {
    /// Store backed by the well known configuration object.
    pub fn new(client: Client) -> Self {
        Self {
            config_maps: Api::namespaced(client, LOADGEN_NAMESPACE),
            name: CONFIG_MAP_NAME.to_owned(),
        }
    }
}

#[async_trait]
impl ConfigStore for ConfigMapStore {
    async fn get(&self) -> Result<Option<LoadConfig>> {
        let Some(config_map) = self.config_maps.get_opt(&self.name).await? else {
            return Ok(None);
        };
        let data = config_map.data.unwrap_or_default();
        let config = serde_json::from_value(serde_json::to_value(data)?)?;
        Ok(Some(config))
    }

    async fn merge_patch(&self, patch: &LoadConfig) -> Result<()> {
        debug!(?patch, "merge patching load configuration");
        let params = PatchParams {
            field_manager: Some(MANAGER_NAME.to_owned()),
            ..Default::default()
        };
        match self
            .config_maps
            .patch(&self.name, &params, &Patch::Merge(json!({ "data": patch })))
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if crate::error::is_not_found(&err) => Err(Error::NotDeployed {
                what: format!("configuration object {LOADGEN_NAMESPACE}/{}", self.name),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Mutex;

    use super::*;

    /// In memory store applying merge patches the way the API server does.
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub record: Mutex<Option<LoadConfig>>,
        pub patches: Mutex<Vec<LoadConfig>>,
    }

    impl MemoryStore {
        pub fn with(record: LoadConfig) -> Self {
            Self {
                record: Mutex::new(Some(record)),
                patches: Mutex::default(),
            }
        }

        pub fn snapshot(&self) -> LoadConfig {
            self.record.lock().unwrap().clone().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ConfigStore for MemoryStore {
        async fn get(&self) -> Result<Option<LoadConfig>> {
            Ok(self.record.lock().unwrap().clone())
        }

        async fn merge_patch(&self, patch: &LoadConfig) -> Result<()> {
            let mut record = self.record.lock().unwrap();
            let Some(current) = record.as_mut() else {
                return Err(Error::NotDeployed {
                    what: "configuration object".to_owned(),
                });
            };
            let mut data = current.to_data();
            data.extend(patch.to_data());
            *current = LoadConfig::from_data(&data).expect("record data should be valid");
            self.patches.lock().unwrap().push(patch.clone());
            Ok(())
        }
    }
}
