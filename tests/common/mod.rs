#![allow(dead_code)]

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use envsec::infra::awsfed::{Credentials, IdentityPool};
use envsec::infra::ssm::{CreateOutcome, Parameter, ParameterApi};
use envsec::paths::{ParameterFilter, Tag};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct StoredParameter {
    pub value: String,
    pub tags: Vec<Tag>,
}

/// In-process parameter store with the filter semantics of the remote one.
#[derive(Default)]
pub struct MemoryParameterApi {
    params: Mutex<BTreeMap<String, StoredParameter>>,
    failing_names: Mutex<HashSet<String>>,
    failing_tags: Mutex<HashSet<String>>,
    /// Every create or overwrite attempt, successful or not.
    pub puts: AtomicUsize,
    pub overwrites: AtomicUsize,
}

impl MemoryParameterApi {
    /// Makes every write to a path ending in `/<name>` fail.
    pub fn fail_writes_to(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    /// Makes creating a tagged parameter at a path ending in `/<name>` fail.
    /// Like the remote store, a failed create stores nothing.
    pub fn fail_tagging_of(&self, name: &str) {
        self.failing_tags.lock().unwrap().insert(name.to_string());
    }

    /// Stores a parameter directly, bypassing the write path.
    pub fn insert_raw(&self, path: &str, value: &str, tags: Vec<Tag>) {
        self.params.lock().unwrap().insert(
            path.to_string(),
            StoredParameter {
                value: value.to_string(),
                tags,
            },
        );
    }

    fn check_write(&self, path: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let name = path.rsplit('/').next().unwrap_or_default();
        if self.failing_names.lock().unwrap().contains(name) {
            bail!("ThrottlingException: rate exceeded for '{path}'");
        }
        Ok(())
    }

    pub fn stored(&self, path: &str) -> Option<StoredParameter> {
        self.params.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.params.lock().unwrap().keys().cloned().collect()
    }
}

fn matches(path: &str, param: &StoredParameter, filter: &ParameterFilter) -> bool {
    match filter.tag_key() {
        Some(key) => param
            .tags
            .iter()
            .any(|t| t.key == key && filter.values.contains(&t.value)),
        None if filter.key == "Path" => filter.values.iter().any(|prefix| path.starts_with(prefix.as_str())),
        None => false,
    }
}

#[async_trait::async_trait]
impl ParameterApi for MemoryParameterApi {
    async fn describe_parameters(&self, filters: &[ParameterFilter]) -> Result<Vec<String>> {
        let params = self.params.lock().unwrap();
        Ok(params
            .iter()
            .filter(|(path, param)| filters.iter().all(|f| matches(path, param, f)))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn get_parameters(&self, paths: &[String]) -> Result<Vec<Parameter>> {
        let params = self.params.lock().unwrap();
        Ok(paths
            .iter()
            .filter_map(|path| {
                params.get(path).map(|p| Parameter {
                    path: path.clone(),
                    value: p.value.clone(),
                })
            })
            .collect())
    }

    async fn create_parameter(&self, path: &str, value: &str, tags: &[Tag]) -> Result<CreateOutcome> {
        self.check_write(path)?;
        if self.params.lock().unwrap().contains_key(path) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let name = path.rsplit('/').next().unwrap_or_default();
        if !tags.is_empty() && self.failing_tags.lock().unwrap().contains(name) {
            bail!("AccessDeniedException: not authorized to perform ssm:AddTagsToResource on '{path}'");
        }
        self.insert_raw(path, value, tags.to_vec());
        Ok(CreateOutcome::Created)
    }

    async fn overwrite_parameter(&self, path: &str, value: &str) -> Result<()> {
        self.check_write(path)?;
        self.overwrites.fetch_add(1, Ordering::SeqCst);
        match self.params.lock().unwrap().get_mut(path) {
            Some(param) => {
                param.value = value.to_string();
                Ok(())
            }
            None => bail!("ParameterNotFound: '{path}'"),
        }
    }

    async fn delete_parameters(&self, paths: &[String]) -> Result<()> {
        let mut params = self.params.lock().unwrap();
        for path in paths {
            params.remove(path);
        }
        Ok(())
    }
}

/// Identity pool that hands out fixed credentials and records every call.
pub struct ScriptedPool {
    pub get_id_calls: AtomicUsize,
    pub get_credentials_calls: AtomicUsize,
    pub logins_seen: Mutex<Vec<HashMap<String, String>>>,
    pub expiration: DateTime<Utc>,
    pub fail_with: Option<String>,
}

impl ScriptedPool {
    pub fn new() -> Self {
        Self::expiring_at(Utc::now() + Duration::hours(1))
    }

    pub fn expiring_at(expiration: DateTime<Utc>) -> Self {
        Self {
            get_id_calls: AtomicUsize::new(0),
            get_credentials_calls: AtomicUsize::new(0),
            logins_seen: Mutex::new(Vec::new()),
            expiration,
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn exchanges(&self) -> usize {
        self.get_credentials_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityPool for ScriptedPool {
    async fn get_id(
        &self,
        _account_id: &str,
        _identity_pool_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<String> {
        self.get_id_calls.fetch_add(1, Ordering::SeqCst);
        self.logins_seen.lock().unwrap().push(logins.clone());
        if let Some(message) = &self.fail_with {
            bail!("{message}");
        }
        Ok("us-west-2:identity-1".to_string())
    }

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        _logins: &HashMap<String, String>,
    ) -> Result<Credentials> {
        let n = self.get_credentials_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credentials {
            access_key_id: format!("AKIA{n}"),
            secret_key: format!("secret-for-{identity_id}"),
            session_token: "session".to_string(),
            expiration: self.expiration,
        })
    }
}
