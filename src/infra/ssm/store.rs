use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

use super::{ParameterApi, ParameterStore, SdkParameterApi};
use crate::config::SsmConfig;
use crate::error::SetAllError;
use crate::namespace::{EnvId, EnvVar};
use crate::paths::validate_segment;
use crate::services::store::Store;

/// [`Store`] over a parameter store. Holds no state beyond the client.
pub struct SsmStore<A> {
    store: ParameterStore<A>,
}

impl SsmStore<SdkParameterApi> {
    /// Connects to SSM with the credentials and region in `config`.
    pub async fn connect(config: &SsmConfig) -> Result<Self> {
        let sdk_config = config.sdk_config().await;
        let api = SdkParameterApi::new(&sdk_config).with_kms_key_id(config.kms_key_id.clone());
        Ok(Self::new(api))
    }
}

impl<A: ParameterApi> SsmStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            store: ParameterStore::new(api),
        }
    }

    pub fn parameters(&self) -> &ParameterStore<A> {
        &self.store
    }
}

// Every call re-checks the namespace so a malformed scope can never alias
// another namespace's paths.
fn validate_request(env_id: &EnvId, names: &[String]) -> Result<()> {
    env_id.validate()?;
    for name in names {
        validate_segment("secret name", name)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl<A: ParameterApi> Store for SsmStore<A> {
    async fn list(&self, env_id: &EnvId) -> Result<Vec<EnvVar>> {
        env_id.validate()?;
        self.store.list_by_tags(env_id).await
    }

    async fn get(&self, env_id: &EnvId, name: &str) -> Result<String> {
        let vars = self.get_all(env_id, &[name.to_string()]).await?;
        Ok(vars.into_iter().next().map(|v| v.value).unwrap_or_default())
    }

    async fn get_all(&self, env_id: &EnvId, names: &[String]) -> Result<Vec<EnvVar>> {
        validate_request(env_id, names)?;
        self.store.get_all(env_id, names).await
    }

    async fn set(&self, env_id: &EnvId, name: &str, value: &str) -> Result<()> {
        env_id.validate()?;
        validate_segment("secret name", name)?;
        self.store.new_parameter(env_id, name, value).await
    }

    // One call per entry; a native batch API would replace this loop.
    async fn set_all(&self, env_id: &EnvId, values: &HashMap<String, String>) -> Result<()> {
        let mut failures = Vec::new();
        for (name, value) in values {
            if let Err(e) = self.set(env_id, name, value).await {
                warn!(name = %name, error = %format!("{e:#}"), "Failed to set secret");
                failures.push((name.clone(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SetAllError {
                attempted: values.len(),
                failures,
            }
            .into())
        }
    }

    async fn delete(&self, env_id: &EnvId, name: &str) -> Result<()> {
        self.delete_all(env_id, &[name.to_string()]).await
    }

    async fn delete_all(&self, env_id: &EnvId, names: &[String]) -> Result<()> {
        validate_request(env_id, names)?;
        self.store.delete_all(env_id, names).await
    }
}
